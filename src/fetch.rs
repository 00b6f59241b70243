use std::io::{Cursor, Read as _};
use std::time::Duration;

use anyhow::Context as _;

pub const API_KEY_HEADER: &str = "USPTO-API-KEY";

/// Entry names inside a TSDR `content.zip` download.
pub const ZIP_STATUS_ENTRY: &str = "status_st66.xml";
pub const ZIP_IMAGE_FULL_ENTRY: &str = "markImage.jpg";
pub const ZIP_IMAGE_THUMB_ENTRY: &str = "markThumbnailImage.jpg";

/// Payload format to request from TSDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchFormat {
    St66,
    #[default]
    St96,
    /// ST.66 XML plus mark images, packaged as a zip archive.
    Zip,
}

/// Which register an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Application serial number, 8 digits.
    Serial,
    /// Registration number, 7 digits.
    Registration,
}

impl IdKind {
    pub fn wire_code(self) -> &'static str {
        match self {
            IdKind::Serial => "s",
            IdKind::Registration => "r",
        }
    }

    fn expected_digits(self) -> usize {
        match self {
            IdKind::Serial => 8,
            IdKind::Registration => 7,
        }
    }
}

/// Caller contract check, enforced before any pacing wait or network call.
pub fn validate_identifier(number: &str, kind: IdKind) -> anyhow::Result<()> {
    if !number.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("invalid identifier '{number}': must be all digits");
    }
    let expected = kind.expected_digits();
    if number.len() != expected {
        anyhow::bail!(
            "invalid identifier '{number}': {} numbers must be {expected} digits",
            match kind {
                IdKind::Serial => "serial",
                IdKind::Registration => "registration",
            }
        );
    }
    Ok(())
}

/// TSDR URL templates. The default points at the production API; tests swap
/// in a local stub server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
}

const TSDR_BASE: &str = "https://tsdrapi.uspto.gov/ts/cd";

impl Endpoints {
    pub fn tsdr() -> Self {
        Self::with_base(TSDR_BASE)
    }

    pub fn with_base(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn url_for(&self, format: FetchFormat, number: &str, kind: IdKind) -> String {
        let base = &self.base;
        let kind = kind.wire_code();
        match format {
            FetchFormat::St66 => format!("{base}/status66/{kind}n{number}/info.xml"),
            FetchFormat::St96 => format!("{base}/casestatus/{kind}n{number}/info.xml"),
            FetchFormat::Zip => format!("{base}/casestatus/{kind}n{number}/content.zip"),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::tsdr()
    }
}

/// A fetch either yields the body bytes or reports the one HTTP status that
/// is an expected data condition rather than a hard failure.
pub enum PtoResponse {
    Payload(Vec<u8>),
    NotFound,
}

pub fn download(url: &str, api_key: Option<&str>) -> anyhow::Result<PtoResponse> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("build TSDR http client")?;

    let mut request = client.get(url);
    if let Some(key) = api_key {
        request = request.header(API_KEY_HEADER, key);
    }

    let response = request.send().with_context(|| format!("GET {url}"))?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(PtoResponse::NotFound);
    }
    if !response.status().is_success() {
        anyhow::bail!("GET {url} returned status {}", response.status());
    }

    let bytes = response
        .bytes()
        .with_context(|| format!("read response body: {url}"))?;
    Ok(PtoResponse::Payload(bytes.to_vec()))
}

/// What a fetch produced once unpacked: status XML plus, for zip payloads,
/// the original archive bytes and any mark images it carried.
#[derive(Debug)]
pub struct Payload {
    pub xml: String,
    pub zip_bytes: Option<Vec<u8>>,
    pub image_full: Option<Vec<u8>>,
    pub image_thumb: Option<Vec<u8>>,
}

/// Unpacks raw fetch bytes. Anything the zip reader rejects is taken to be
/// plain XML; whether it really is XML is the sanity check's job.
pub fn unpack(bytes: Vec<u8>) -> anyhow::Result<Payload> {
    match zip::ZipArchive::new(Cursor::new(&bytes)) {
        Ok(mut archive) => {
            let xml = {
                let mut entry = archive
                    .by_name(ZIP_STATUS_ENTRY)
                    .with_context(|| format!("zip payload is missing {ZIP_STATUS_ENTRY}"))?;
                let mut xml = String::new();
                entry
                    .read_to_string(&mut xml)
                    .with_context(|| format!("read {ZIP_STATUS_ENTRY}"))?;
                xml
            };
            let image_full = read_optional_entry(&mut archive, ZIP_IMAGE_FULL_ENTRY)?;
            let image_thumb = read_optional_entry(&mut archive, ZIP_IMAGE_THUMB_ENTRY)?;
            Ok(Payload {
                xml,
                zip_bytes: Some(bytes),
                image_full,
                image_thumb,
            })
        }
        Err(_) => Ok(Payload {
            xml: String::from_utf8_lossy(&bytes).into_owned(),
            zip_bytes: None,
            image_full: None,
            image_thumb: None,
        }),
    }
}

fn read_optional_entry(
    archive: &mut zip::ZipArchive<Cursor<&Vec<u8>>>,
    name: &str,
) -> anyhow::Result<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .with_context(|| format!("read {name}"))?;
            Ok(Some(data))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("open {name}")),
    }
}

/// Quick well-formedness pass over purported XML; not a schema check.
/// Returns the human-readable reason on failure. The streaming reader does
/// not itself insist on a root element or balanced tags, so track those here.
pub fn xml_sanity_check(xml: &str) -> Result<(), String> {
    use quick_xml::events::Event;

    if xml.trim().is_empty() {
        return Err("XML data is missing or empty".to_owned());
    }
    let mut reader = quick_xml::reader::Reader::from_str(xml);
    let mut depth = 0usize;
    let mut seen_root = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                seen_root = true;
            }
            Ok(Event::Empty(_)) => seen_root = true,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return Err("closing tag without a matching opening tag".to_owned());
                }
                depth -= 1;
            }
            Ok(Event::Eof) => {
                if !seen_root {
                    return Err("no root element found".to_owned());
                }
                if depth != 0 {
                    return Err("unclosed element at end of input".to_owned());
                }
                return Ok(());
            }
            Ok(_) => continue,
            Err(err) => return Err(format!("purported XML data does not parse: {err}")),
        }
    }
}
