use std::fmt;

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

pub const ST66_NAMESPACE: &str = "http://www.wipo.int/standards/XMLSchema/trademarks";
pub const ST96_NAMESPACE: &str = "http://www.wipo.int/standards/XMLSchema/ST96/Trademark";
/// Namespace of the withdrawn ST.96 1_D3 draft. Recognized so callers get a
/// precise "unsupported" report instead of a generic unknown-format one.
pub const ST96_LEGACY_NAMESPACE: &str = "http://www.wipo.int/standards/XMLSchema/Trademark/1";

/// XML dialects TSDR is known to have served, keyed by root namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    St66,
    St96,
    /// Superseded ST.96 1_D3 format; recognized but no template exists.
    St96Legacy,
}

impl Dialect {
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            ST66_NAMESPACE => Some(Dialect::St66),
            ST96_NAMESPACE => Some(Dialect::St96),
            ST96_LEGACY_NAMESPACE => Some(Dialect::St96Legacy),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Dialect::St66 => "ST66",
            Dialect::St96 => "ST96",
            Dialect::St96Legacy => "ST96-1_D3",
        };
        f.write_str(label)
    }
}

/// Classifies a document by the namespace of its root element. Returns
/// `None` for an unrecognized namespace, an unbound root, or markup that
/// does not parse far enough to reach a root element.
pub fn detect(xml: &str) -> Option<Dialect> {
    let mut reader = NsReader::from_str(xml);
    loop {
        match reader.read_resolved_event() {
            Ok((ResolveResult::Bound(namespace), Event::Start(_) | Event::Empty(_))) => {
                let namespace = std::str::from_utf8(namespace.into_inner()).ok()?;
                return Dialect::from_namespace(namespace);
            }
            Ok((ResolveResult::Unbound, Event::Start(_) | Event::Empty(_))) => return None,
            Ok((_, Event::Eof)) => return None,
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn st66_namespace_is_detected() {
        let xml = r#"<?xml version="1.0"?>
<Transaction xmlns="http://www.wipo.int/standards/XMLSchema/trademarks"><a/></Transaction>"#;
        assert_eq!(detect(xml), Some(Dialect::St66));
    }

    #[test]
    fn st96_namespace_is_detected_through_a_prefix() {
        let xml = r#"<ns2:TrademarkApplication
  xmlns:ns2="http://www.wipo.int/standards/XMLSchema/ST96/Trademark"/>"#;
        assert_eq!(detect(xml), Some(Dialect::St96));
    }

    #[test]
    fn legacy_st96_draft_gets_its_own_tag() {
        let xml = r#"<Trademark xmlns="http://www.wipo.int/standards/XMLSchema/Trademark/1"/>"#;
        assert_eq!(detect(xml), Some(Dialect::St96Legacy));
    }

    #[test]
    fn unknown_namespace_is_unrecognized() {
        let xml = r#"<doc xmlns="http://example.com/unrelated"/>"#;
        assert_eq!(detect(xml), None);
    }

    #[test]
    fn missing_namespace_is_unrecognized() {
        assert_eq!(detect("<doc><child/></doc>"), None);
    }
}
