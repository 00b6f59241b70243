use chrono::Local;

const IMPLEMENTATION_DATE: &str = "2026-08-05";
const IMPLEMENTATION_LICENSE: &str = "MIT License";
const IMPLEMENTATION_LICENSE_URL: &str = "https://opensource.org/licenses/MIT";

const NOT_SET: &str = "Not Set";

/// Per-session table of `$TOKEN$` placeholders filled into template output.
/// Substitution is a literal whole-token replacement applied once over the
/// full text; tokens absent from the output are no-ops, and unknown tokens
/// in the output are left alone.
#[derive(Debug, Clone)]
pub struct Substitutions {
    entries: Vec<(&'static str, String)>,
}

impl Substitutions {
    pub fn new() -> Self {
        let entries = vec![
            ("$TEMPLATENAME$", NOT_SET.to_owned()),
            ("$TEMPLATELOCATION$", NOT_SET.to_owned()),
            ("$IMPLEMENTATIONNAME$", env!("CARGO_PKG_NAME").to_owned()),
            (
                "$IMPLEMENTATIONVERSION$",
                env!("CARGO_PKG_VERSION").to_owned(),
            ),
            ("$IMPLEMENTATIONDATE$", IMPLEMENTATION_DATE.to_owned()),
            (
                "$IMPLEMENTATIONAUTHOR$",
                env!("CARGO_PKG_AUTHORS").to_owned(),
            ),
            (
                "$IMPLEMENTATIONURL$",
                env!("CARGO_PKG_REPOSITORY").to_owned(),
            ),
            ("$IMPLEMENTATIONLICENSE$", IMPLEMENTATION_LICENSE.to_owned()),
            ("$IMPLEMENTATIONSPDXLID$", env!("CARGO_PKG_LICENSE").to_owned()),
            (
                "$IMPLEMENTATIONLICENSEURL$",
                IMPLEMENTATION_LICENSE_URL.to_owned(),
            ),
            ("$EXECUTIONDATETIME$", NOT_SET.to_owned()),
            ("$TSDRSTARTDATETIME$", NOT_SET.to_owned()),
            ("$TSDRCOMPLETEDATETIME$", NOT_SET.to_owned()),
            ("$XMLSOURCE$", NOT_SET.to_owned()),
        ];
        Self { entries }
    }

    fn set(&mut self, token: &'static str, value: String) {
        for entry in &mut self.entries {
            if entry.0 == token {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((token, value));
    }

    /// Records the URL or path the XML came from.
    pub fn set_source(&mut self, source: &str) {
        self.set("$XMLSOURCE$", source.to_owned());
    }

    pub fn set_template_info(&mut self, name: &str, location: &str) {
        self.set("$TEMPLATENAME$", name.to_owned());
        self.set("$TEMPLATELOCATION$", location.to_owned());
    }

    /// Stamps the fetch start, to microsecond precision, and the
    /// second-resolution execution timestamp.
    pub fn stamp_start(&mut self) {
        let now = Local::now();
        self.set(
            "$TSDRSTARTDATETIME$",
            now.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        );
        self.set(
            "$EXECUTIONDATETIME$",
            now.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
    }

    pub fn stamp_complete(&mut self) {
        let now = Local::now();
        self.set(
            "$TSDRCOMPLETEDATETIME$",
            now.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        );
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for (token, value) in &self.entries {
            out = out.replace(token, value);
        }
        out
    }
}

impl Default for Substitutions {
    fn default() -> Self {
        Self::new()
    }
}
