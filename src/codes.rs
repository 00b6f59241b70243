use std::fmt;

/// Stable error codes surfaced to callers when a pipeline stage fails on
/// bad data. Programmer errors (bad identifiers, broken templates) are
/// reported as `Err` instead and never get a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Remote source not found.
    Fetch404,
    /// XML payload missing or not well-formed.
    NoValidXml,
    /// Recognized-but-unsupported or unrecognized XML dialect.
    UnsupportedXml,
    /// Transform produced fewer than 2 non-blank lines.
    ShortCsv,
    /// A line has no comma separator.
    InvalidKeyValuePair,
    /// A key contains a disallowed character.
    InvalidKey,
    /// A value is not properly quoted.
    InvalidValue,
    /// Decode attempted without valid key/value text.
    NoValidCsv,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Fetch404 => "Fetch-404",
            ErrorCode::NoValidXml => "CSV-NoValidXML",
            ErrorCode::UnsupportedXml => "CSV-UnsupportedXML",
            ErrorCode::ShortCsv => "CSV-ShortCSV",
            ErrorCode::InvalidKeyValuePair => "CSV-InvalidKeyValuePair",
            ErrorCode::InvalidKey => "CSV-InvalidKey",
            ErrorCode::InvalidValue => "CSV-InvalidValue",
            ErrorCode::NoValidCsv => "Map-NoValidCSV",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One expected, data-dependent failure: the code a program inspects plus a
/// message a human reads.
#[derive(Debug, Clone)]
pub struct Fault {
    pub code: ErrorCode,
    pub message: String,
}

impl Fault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_their_stable_strings() {
        assert_eq!(ErrorCode::Fetch404.as_str(), "Fetch-404");
        assert_eq!(ErrorCode::NoValidXml.as_str(), "CSV-NoValidXML");
        assert_eq!(ErrorCode::UnsupportedXml.as_str(), "CSV-UnsupportedXML");
        assert_eq!(ErrorCode::ShortCsv.as_str(), "CSV-ShortCSV");
        assert_eq!(
            ErrorCode::InvalidKeyValuePair.as_str(),
            "CSV-InvalidKeyValuePair"
        );
        assert_eq!(ErrorCode::InvalidKey.as_str(), "CSV-InvalidKey");
        assert_eq!(ErrorCode::InvalidValue.as_str(), "CSV-InvalidValue");
        assert_eq!(ErrorCode::NoValidCsv.as_str(), "Map-NoValidCSV");
    }

    #[test]
    fn fault_display_joins_code_and_message() {
        let fault = Fault::new(ErrorCode::ShortCsv, "too short");
        assert_eq!(fault.to_string(), "CSV-ShortCSV: too short");
    }
}
