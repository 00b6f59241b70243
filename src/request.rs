use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context as _;

use crate::codes::{ErrorCode, Fault};
use crate::decode;
use crate::dialect;
use crate::fetch::{self, Endpoints, FetchFormat, IdKind, PtoResponse};
use crate::pacing::Pacer;
use crate::placeholders::Substitutions;
use crate::record::StatusRecord;
use crate::templates::{Template, TemplateRegistry};
use crate::validate;

/// One retrieval/decode lifecycle: fetch the status XML, derive the
/// key/value text from it, decode that into a `StatusRecord`. Stages must
/// run in that order; each is gated on the validity flag of the one before
/// it, and re-running an earlier stage clears everything downstream of it.
///
/// Expected data conditions (record not found, malformed XML, bad template
/// output) never return `Err`: they leave the stage's flag false and record
/// a `Fault` for the caller to inspect. `Err` is reserved for contract
/// violations and infrastructure failures.
pub struct StatusRequest {
    // configuration
    api_key: Option<String>,
    template_override: Option<Box<dyn Template>>,
    fetch_format: FetchFormat,
    endpoints: Endpoints,
    templates: TemplateRegistry,
    pacer: Arc<Mutex<Pacer>>,
    subs: Substitutions,
    // stage data
    xml: Option<String>,
    zip_bytes: Option<Vec<u8>>,
    image_full: Option<Vec<u8>>,
    image_thumb: Option<Vec<u8>>,
    csv: Option<String>,
    record: StatusRecord,
    // stage validity
    xml_valid: bool,
    csv_valid: bool,
    record_valid: bool,
    fault: Option<Fault>,
}

impl StatusRequest {
    pub fn new() -> Self {
        Self::with_pacer(Arc::new(Mutex::new(Pacer::new())))
    }

    /// Builds a session sharing a pacer with other sessions, so several
    /// independent requests draw on one call budget.
    pub fn with_pacer(pacer: Arc<Mutex<Pacer>>) -> Self {
        Self {
            api_key: None,
            template_override: None,
            fetch_format: FetchFormat::default(),
            endpoints: Endpoints::tsdr(),
            templates: TemplateRegistry::builtin(),
            pacer,
            subs: Substitutions::new(),
            xml: None,
            zip_bytes: None,
            image_full: None,
            image_thumb: None,
            csv: None,
            record: StatusRecord::default(),
            xml_valid: false,
            csv_valid: false,
            record_valid: false,
            fault: None,
        }
    }

    /// Returns the session to its initial state: configuration cleared and
    /// all stage data dropped. The pacer handle (and its last-call stamp)
    /// survives; pacing is shared state, not session data.
    pub fn reset(&mut self) {
        self.api_key = None;
        self.template_override = None;
        self.fetch_format = FetchFormat::default();
        self.endpoints = Endpoints::tsdr();
        self.subs = Substitutions::new();
        self.reset_xml_data();
    }

    pub fn set_api_key(&mut self, key: impl Into<String>) {
        self.api_key = Some(key.into());
    }

    pub fn clear_api_key(&mut self) {
        self.api_key = None;
    }

    /// Overrides dialect detection: the supplied template is applied to
    /// whatever XML was fetched.
    pub fn set_template(&mut self, template: Box<dyn Template>) {
        self.template_override = Some(template);
    }

    pub fn clear_template(&mut self) {
        self.template_override = None;
    }

    pub fn set_fetch_format(&mut self, format: FetchFormat) {
        self.fetch_format = format;
    }

    pub fn clear_fetch_format(&mut self) {
        self.fetch_format = FetchFormat::default();
    }

    /// Points fetches at a different base URL; tests aim this at a stub.
    pub fn set_endpoints(&mut self, endpoints: Endpoints) {
        self.endpoints = endpoints;
    }

    pub fn pacer(&self) -> Arc<Mutex<Pacer>> {
        Arc::clone(&self.pacer)
    }

    pub fn set_pacing_interval(&mut self, secs: f64) {
        self.pacer_guard().set_interval(secs);
    }

    pub fn reset_pacing_interval(&mut self) {
        self.pacer_guard().reset_interval();
    }

    pub fn xml_valid(&self) -> bool {
        self.xml_valid
    }

    pub fn csv_valid(&self) -> bool {
        self.csv_valid
    }

    pub fn record_valid(&self) -> bool {
        self.record_valid
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.fault.as_ref().map(|fault| fault.code)
    }

    pub fn xml(&self) -> Option<&str> {
        self.xml.as_deref()
    }

    pub fn csv(&self) -> Option<&str> {
        self.csv.as_deref()
    }

    pub fn record(&self) -> &StatusRecord {
        &self.record
    }

    pub fn zip_bytes(&self) -> Option<&[u8]> {
        self.zip_bytes.as_deref()
    }

    pub fn image_full(&self) -> Option<&[u8]> {
        self.image_full.as_deref()
    }

    pub fn image_thumb(&self) -> Option<&[u8]> {
        self.image_thumb.as_deref()
    }

    /// Fetches the status record from TSDR by serial or registration number.
    /// Identifier validation happens before the pacing wait; the pacing
    /// stamp advances even if the fetch then fails.
    pub fn fetch_from_pto(&mut self, number: &str, kind: IdKind) -> anyhow::Result<()> {
        fetch::validate_identifier(number, kind)?;
        self.pacer_guard().pace();
        self.reset_xml_data();

        let url = self.endpoints.url_for(self.fetch_format, number, kind);
        tracing::debug!(%url, "fetching status record");
        match fetch::download(&url, self.api_key.as_deref())? {
            PtoResponse::NotFound => {
                tracing::debug!(%url, "record not found");
                self.fault = Some(Fault::new(
                    ErrorCode::Fetch404,
                    format!("no such record at TSDR: 404 (not found) for {url}"),
                ));
            }
            PtoResponse::Payload(bytes) => {
                self.subs.set_source(&url);
                self.subs.stamp_start();
                self.ingest_payload(bytes)?;
                self.subs.stamp_complete();
            }
        }
        Ok(())
    }

    /// Reads a saved status payload (XML or zip) from disk. The read stands
    /// in for a TSDR call, so it draws on the same pacing budget. A missing
    /// file is a hard error, not a data condition.
    pub fn fetch_from_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        self.pacer_guard().pace();
        self.reset_xml_data();

        tracing::debug!(path = %path.display(), "reading status record from file");
        let bytes = std::fs::read(path)
            .with_context(|| format!("read status file: {}", path.display()))?;
        self.subs.set_source(&path.display().to_string());
        self.subs.stamp_start();
        self.ingest_payload(bytes)?;
        self.subs.stamp_complete();
        Ok(())
    }

    /// Transforms the fetched XML into validated key/value lines.
    pub fn derive_csv(&mut self) -> anyhow::Result<()> {
        self.reset_csv_data();
        self.fault = None;
        if !self.xml_valid {
            self.fault = Some(Fault::new(ErrorCode::NoValidXml, "no valid XML data found"));
            return Ok(());
        }
        let xml = self
            .xml
            .clone()
            .context("xml_valid is set but no XML data is present")?;

        let template: &dyn Template = if let Some(template) = self.template_override.as_deref() {
            template
        } else {
            match dialect::detect(&xml) {
                Some(found) => match self.templates.get(found) {
                    Some(template) => template,
                    None => {
                        self.fault = Some(Fault::new(
                            ErrorCode::UnsupportedXml,
                            format!("recognized but unsupported XML dialect: {found}"),
                        ));
                        return Ok(());
                    }
                },
                None => {
                    self.fault = Some(Fault::new(
                        ErrorCode::UnsupportedXml,
                        "unrecognized XML dialect (unknown root namespace)",
                    ));
                    return Ok(());
                }
            }
        };
        self.subs
            .set_template_info(template.name(), template.location());
        tracing::debug!(template = template.name(), "applying template");
        let raw = template.apply(&xml).context("apply template")?;

        let substituted = self.subs.apply(&raw);
        let csv = validate::normalize_blank_lines(&substituted);
        match validate::validate_csv(&csv) {
            Ok(()) => {
                self.csv = Some(csv);
                self.csv_valid = true;
            }
            Err(fault) => {
                tracing::debug!(code = %fault.code, "template output failed validation");
                self.csv = Some(csv);
                self.fault = Some(fault);
            }
        }
        Ok(())
    }

    /// Decodes the validated key/value lines into the structured record.
    pub fn decode_record(&mut self) -> anyhow::Result<()> {
        self.reset_record_data();
        self.fault = None;
        if !self.csv_valid {
            self.fault = Some(Fault::new(
                ErrorCode::NoValidCsv,
                "no valid key/value data found",
            ));
            return Ok(());
        }
        let csv = self
            .csv
            .as_deref()
            .context("csv_valid is set but no key/value data is present")?;
        self.record = decode::decode(csv).context("decode key/value text")?;
        self.record_valid = true;
        Ok(())
    }

    /// Runs fetch, transform, and decode in sequence, stopping at the first
    /// stage whose flag stays false.
    pub fn retrieve_from_pto(&mut self, number: &str, kind: IdKind) -> anyhow::Result<()> {
        self.fetch_from_pto(number, kind)?;
        if self.xml_valid {
            self.derive_csv()?;
            if self.csv_valid {
                self.decode_record()?;
            }
        }
        Ok(())
    }

    pub fn retrieve_from_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        self.fetch_from_file(path)?;
        if self.xml_valid {
            self.derive_csv()?;
            if self.csv_valid {
                self.decode_record()?;
            }
        }
        Ok(())
    }

    fn ingest_payload(&mut self, bytes: Vec<u8>) -> anyhow::Result<()> {
        let payload = fetch::unpack(bytes)?;
        self.zip_bytes = payload.zip_bytes;
        self.image_full = payload.image_full;
        self.image_thumb = payload.image_thumb;
        match fetch::xml_sanity_check(&payload.xml) {
            Ok(()) => {
                self.xml = Some(payload.xml);
                self.xml_valid = true;
            }
            Err(reason) => {
                tracing::debug!(%reason, "payload failed the XML sanity check");
                self.xml = Some(payload.xml);
                self.fault = Some(Fault::new(ErrorCode::NoValidXml, reason));
            }
        }
        Ok(())
    }

    fn reset_xml_data(&mut self) {
        self.xml = None;
        self.zip_bytes = None;
        self.image_full = None;
        self.image_thumb = None;
        self.xml_valid = false;
        self.fault = None;
        self.reset_csv_data();
    }

    fn reset_csv_data(&mut self) {
        self.csv = None;
        self.csv_valid = false;
        self.reset_record_data();
    }

    fn reset_record_data(&mut self) {
        self.record = StatusRecord::default();
        self.record_valid = false;
    }

    fn pacer_guard(&self) -> MutexGuard<'_, Pacer> {
        self.pacer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StatusRequest {
    fn default() -> Self {
        Self::new()
    }
}
