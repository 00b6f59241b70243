use std::collections::HashMap;

use anyhow::Context as _;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::decode::{BEGIN_REPEATED_FIELD, END_REPEATED_FIELD};
use crate::dialect::Dialect;

/// Converts status XML into the line-oriented `KEY,"VALUE"` text. A template
/// may leave `$TOKEN$` placeholders in its output; the session substitutes
/// them afterwards. Callers can supply their own implementation to override
/// dialect detection entirely.
pub trait Template {
    fn name(&self) -> &str;
    fn location(&self) -> &str;
    fn apply(&self, xml: &str) -> anyhow::Result<String>;
}

/// Dialect-to-template table, built explicitly at session construction.
pub struct TemplateRegistry {
    entries: HashMap<Dialect, Box<dyn Template>>,
}

impl TemplateRegistry {
    /// The two shipped templates. Note there is no entry for
    /// `Dialect::St96Legacy`: the withdrawn draft is detected but never
    /// transformed.
    pub fn builtin() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        registry.register(Dialect::St66, Box::new(RuleTemplate::st66()));
        registry.register(Dialect::St96, Box::new(RuleTemplate::st96()));
        registry
    }

    pub fn register(&mut self, dialect: Dialect, template: Box<dyn Template>) {
        self.entries.insert(dialect, template);
    }

    pub fn get(&self, dialect: Dialect) -> Option<&dyn Template> {
        self.entries.get(&dialect).map(Box::as_ref)
    }
}

struct ScalarRule {
    element: &'static str,
    key: &'static str,
    /// Emits a second line holding the first ten characters of the value,
    /// e.g. the date part of `2004-03-23-05:00`.
    truncated_key: Option<&'static str>,
}

struct FieldRule {
    element: &'static str,
    key: &'static str,
}

struct GroupRule {
    element: &'static str,
    group: &'static str,
    fields: &'static [FieldRule],
}

/// A built-in template: a declarative table of element-name rules executed
/// by a single streaming pass over the document. Scalar rules apply outside
/// repeated sections; inside a group element only that group's field rules
/// apply, bracketed by the repeated-field sentinel lines.
pub struct RuleTemplate {
    name: &'static str,
    format_label: &'static str,
    scalars: &'static [ScalarRule],
    groups: &'static [GroupRule],
}

const BUILTIN_LOCATION: &str = "compiled into markstatus";

const ST66_SCALARS: &[ScalarRule] = &[
    ScalarRule {
        element: "ApplicationNumber",
        key: "ApplicationNumber",
        truncated_key: None,
    },
    ScalarRule {
        element: "ApplicationDate",
        key: "ApplicationDate",
        truncated_key: Some("ApplicationDateTruncated"),
    },
    ScalarRule {
        element: "RegistrationNumber",
        key: "RegistrationNumber",
        truncated_key: None,
    },
    ScalarRule {
        element: "RegistrationDate",
        key: "RegistrationDate",
        truncated_key: Some("RegistrationDateTruncated"),
    },
    ScalarRule {
        element: "MarkCurrentStatusDate",
        key: "MarkCurrentStatusDate",
        truncated_key: Some("MarkCurrentStatusDateTruncated"),
    },
    ScalarRule {
        element: "MarkCurrentStatusExternalDescriptionText",
        key: "MarkCurrentStatusExternalDescriptionText",
        truncated_key: None,
    },
    ScalarRule {
        element: "MarkVerbalElementText",
        key: "MarkVerbalElementText",
        truncated_key: None,
    },
];

const ST66_GROUPS: &[GroupRule] = &[
    GroupRule {
        element: "Applicant",
        group: "Applicant",
        fields: &[
            FieldRule {
                element: "ApplicantName",
                key: "ApplicantName",
            },
            FieldRule {
                element: "ApplicantCity",
                key: "ApplicantCity",
            },
            FieldRule {
                element: "ApplicantCountryCode",
                key: "ApplicantCountry",
            },
        ],
    },
    GroupRule {
        element: "ClassDescription",
        group: "GoodsAndServices",
        fields: &[
            FieldRule {
                element: "ClassNumber",
                key: "ClassNumber",
            },
            FieldRule {
                element: "GoodsServicesDescription",
                key: "GoodsServicesDescription",
            },
        ],
    },
    GroupRule {
        element: "MarkEvent",
        group: "MarkEvent",
        fields: &[
            FieldRule {
                element: "MarkEventDate",
                key: "MarkEventDate",
            },
            FieldRule {
                element: "MarkEventDescriptionText",
                key: "MarkEventDescriptionText",
            },
        ],
    },
    GroupRule {
        element: "Assignment",
        group: "Assignment",
        fields: &[
            FieldRule {
                element: "AssignorEntityName",
                key: "AssignorEntityName",
            },
            FieldRule {
                element: "AssignmentDocumentURL",
                key: "AssignmentDocumentURL",
            },
        ],
    },
];

const ST96_SCALARS: &[ScalarRule] = &[
    ScalarRule {
        element: "ApplicationNumberText",
        key: "ApplicationNumber",
        truncated_key: None,
    },
    ScalarRule {
        element: "ApplicationDate",
        key: "ApplicationDate",
        truncated_key: Some("ApplicationDateTruncated"),
    },
    ScalarRule {
        element: "RegistrationNumber",
        key: "RegistrationNumber",
        truncated_key: None,
    },
    ScalarRule {
        element: "RegistrationDate",
        key: "RegistrationDate",
        truncated_key: Some("RegistrationDateTruncated"),
    },
    ScalarRule {
        element: "MarkCurrentStatusDate",
        key: "MarkCurrentStatusDate",
        truncated_key: Some("MarkCurrentStatusDateTruncated"),
    },
    ScalarRule {
        element: "MarkCurrentStatusExternalDescriptionText",
        key: "MarkCurrentStatusExternalDescriptionText",
        truncated_key: None,
    },
    ScalarRule {
        element: "MarkVerbalElementText",
        key: "MarkVerbalElementText",
        truncated_key: None,
    },
];

const ST96_GROUPS: &[GroupRule] = &[
    GroupRule {
        element: "Applicant",
        group: "Applicant",
        fields: &[
            FieldRule {
                element: "EntityName",
                key: "ApplicantName",
            },
            FieldRule {
                element: "CityName",
                key: "ApplicantCity",
            },
            FieldRule {
                element: "CountryCode",
                key: "ApplicantCountry",
            },
        ],
    },
    GroupRule {
        element: "ClassDescription",
        group: "GoodsAndServices",
        fields: &[
            FieldRule {
                element: "ClassNumber",
                key: "ClassNumber",
            },
            FieldRule {
                element: "GoodsServicesDescriptionText",
                key: "GoodsServicesDescription",
            },
        ],
    },
    GroupRule {
        element: "MarkEvent",
        group: "MarkEvent",
        fields: &[
            FieldRule {
                element: "MarkEventDate",
                key: "MarkEventDate",
            },
            FieldRule {
                element: "MarkEventDescriptionText",
                key: "MarkEventDescriptionText",
            },
        ],
    },
    GroupRule {
        element: "Assignment",
        group: "Assignment",
        fields: &[
            FieldRule {
                element: "AssignorEntityName",
                key: "AssignorEntityName",
            },
            FieldRule {
                element: "AssignmentDocumentURL",
                key: "AssignmentDocumentURL",
            },
        ],
    },
];

impl RuleTemplate {
    pub fn st66() -> Self {
        Self {
            name: "st66-status (built-in)",
            format_label: "ST.66",
            scalars: ST66_SCALARS,
            groups: ST66_GROUPS,
        }
    }

    pub fn st96() -> Self {
        Self {
            name: "st96-status (built-in)",
            format_label: "ST.96",
            scalars: ST96_SCALARS,
            groups: ST96_GROUPS,
        }
    }

    fn push_prologue(&self, out: &mut String) {
        push_line(out, "DiagnosticInfoTemplateFormat", self.format_label);
        push_line(out, "DiagnosticInfoTemplateName", "$TEMPLATENAME$");
        push_line(out, "DiagnosticInfoTemplateLocation", "$TEMPLATELOCATION$");
        push_line(
            out,
            "DiagnosticInfoImplementationName",
            "$IMPLEMENTATIONNAME$",
        );
        push_line(
            out,
            "DiagnosticInfoImplementationVersion",
            "$IMPLEMENTATIONVERSION$",
        );
        push_line(
            out,
            "DiagnosticInfoImplementationDate",
            "$IMPLEMENTATIONDATE$",
        );
        push_line(
            out,
            "DiagnosticInfoImplementationAuthor",
            "$IMPLEMENTATIONAUTHOR$",
        );
        push_line(out, "DiagnosticInfoImplementationURL", "$IMPLEMENTATIONURL$");
        push_line(
            out,
            "DiagnosticInfoImplementationLicense",
            "$IMPLEMENTATIONLICENSE$",
        );
        push_line(
            out,
            "DiagnosticInfoImplementationSPDXLicenseIdentifier",
            "$IMPLEMENTATIONSPDXLID$",
        );
        push_line(
            out,
            "DiagnosticInfoImplementationLicenseURL",
            "$IMPLEMENTATIONLICENSEURL$",
        );
        push_line(out, "DiagnosticInfoXMLSource", "$XMLSOURCE$");
        push_line(out, "DiagnosticInfoExecutionDateTime", "$EXECUTIONDATETIME$");
        push_line(
            out,
            "DiagnosticInfoTSDRStartDateTime",
            "$TSDRSTARTDATETIME$",
        );
        push_line(
            out,
            "DiagnosticInfoTSDRCompleteDateTime",
            "$TSDRCOMPLETEDATETIME$",
        );
    }

    fn emit_text(
        &self,
        out: &mut String,
        active_group: Option<&GroupRule>,
        leaf: &str,
        text: &str,
    ) {
        let value = normalize_space(text);
        if value.is_empty() {
            return;
        }
        match active_group {
            Some(rule) => {
                if let Some(field) = rule.fields.iter().find(|f| f.element == leaf) {
                    push_line(out, field.key, &value);
                }
            }
            None => {
                if let Some(rule) = self.scalars.iter().find(|r| r.element == leaf) {
                    push_line(out, rule.key, &value);
                    if let Some(truncated_key) = rule.truncated_key {
                        push_line(out, truncated_key, value.get(..10).unwrap_or(&value));
                    }
                }
            }
        }
    }
}

impl Template for RuleTemplate {
    fn name(&self) -> &str {
        self.name
    }

    fn location(&self) -> &str {
        BUILTIN_LOCATION
    }

    fn apply(&self, xml: &str) -> anyhow::Result<String> {
        let mut out = String::new();
        self.push_prologue(&mut out);

        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<String> = Vec::new();
        let mut active_group: Option<(&GroupRule, usize)> = None;

        loop {
            match reader.read_event().context("read status XML event")? {
                Event::Start(start) => {
                    let local = std::str::from_utf8(start.local_name().into_inner())
                        .context("element name is not UTF-8")?
                        .to_owned();
                    stack.push(local);
                    let leaf = stack.last().map(String::as_str).unwrap_or_default();
                    if active_group.is_none()
                        && let Some(rule) = self.groups.iter().find(|g| g.element == leaf)
                    {
                        push_line(&mut out, BEGIN_REPEATED_FIELD, rule.group);
                        active_group = Some((rule, stack.len()));
                    }
                }
                Event::End(_) => {
                    if let Some((rule, depth)) = active_group
                        && depth == stack.len()
                    {
                        push_line(&mut out, END_REPEATED_FIELD, rule.group);
                        active_group = None;
                    }
                    stack.pop();
                }
                Event::Text(text) => {
                    let text = text.unescape().context("unescape text node")?;
                    if let Some(leaf) = stack.last() {
                        self.emit_text(&mut out, active_group.map(|(g, _)| g), leaf, &text);
                    }
                }
                Event::CData(cdata) => {
                    let text = String::from_utf8_lossy(&cdata).into_owned();
                    if let Some(leaf) = stack.last() {
                        self.emit_text(&mut out, active_group.map(|(g, _)| g), leaf, &text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(out)
    }
}

fn push_line(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(",\"");
    out.push_str(value);
    out.push_str("\"\n");
}

/// Collapses runs of whitespace (including newlines inside element text) to
/// single spaces so values cannot break the one-pair-per-line format.
fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;
    use crate::validate;

    const ST66_SAMPLE: &str = include_str!("../tests/fixtures/st66-status.xml");

    #[test]
    fn st66_output_passes_validation_and_decodes() {
        let out = RuleTemplate::st66().apply(ST66_SAMPLE).unwrap();
        let normalized = validate::normalize_blank_lines(&out);
        validate::validate_csv(&normalized).unwrap();

        let record = decode::decode(&normalized).unwrap();
        assert_eq!(record.scalar("ApplicationNumber"), Some("76044902"));
        assert_eq!(record.scalar("ApplicationDate"), Some("2000-05-09-04:00"));
        assert_eq!(record.scalar("ApplicationDateTruncated"), Some("2000-05-09"));
        assert_eq!(record.scalar("RegistrationNumber"), Some("2824281"));
        assert_eq!(record.scalar("MarkVerbalElementText"), Some("PYTHON"));
        assert_eq!(
            record.scalar("MarkCurrentStatusExternalDescriptionText"),
            Some("A Sections 8 and 15 combined declaration has been accepted and acknowledged.")
        );

        let applicants = record.group("ApplicantList").unwrap();
        assert_eq!(applicants.len(), 1);
        assert_eq!(
            applicants[0].get("ApplicantName").map(String::as_str),
            Some("PYTHON SOFTWARE FOUNDATION")
        );

        let events = record.group("MarkEventList").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].get("MarkEventDate").map(String::as_str),
            Some("2000-05-09")
        );
        assert_eq!(
            events[1].get("MarkEventDescriptionText").map(String::as_str),
            Some("Registered - principal register")
        );

        let classes = record.group("GoodsAndServicesList").unwrap();
        assert_eq!(
            classes[0].get("ClassNumber").map(String::as_str),
            Some("9")
        );

        let assignments = record.group("AssignmentList").unwrap();
        assert_eq!(
            assignments[0].get("AssignorEntityName").map(String::as_str),
            Some("CORPORATION FOR NATIONAL RESEARCH INITIATIVES, INC.")
        );
    }

    #[test]
    fn st66_output_carries_placeholder_tokens() {
        let out = RuleTemplate::st66().apply(ST66_SAMPLE).unwrap();
        assert!(out.contains("DiagnosticInfoTemplateFormat,\"ST.66\""));
        assert!(out.contains("DiagnosticInfoImplementationName,\"$IMPLEMENTATIONNAME$\""));
        assert!(out.contains("DiagnosticInfoXMLSource,\"$XMLSOURCE$\""));
    }

    #[test]
    fn st96_nested_number_and_contact_names_map_to_flat_keys() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ns2:TrademarkApplication
    xmlns:ns1="http://www.wipo.int/standards/XMLSchema/ST96/Common"
    xmlns:ns2="http://www.wipo.int/standards/XMLSchema/ST96/Trademark">
  <ns2:TrademarkBag>
    <ns2:Trademark>
      <ns1:ApplicationNumber>
        <ns1:ApplicationNumberText>76044902</ns1:ApplicationNumberText>
      </ns1:ApplicationNumber>
      <ns2:ApplicationDate>2000-05-09-04:00</ns2:ApplicationDate>
      <ns1:RegistrationNumber>2824281</ns1:RegistrationNumber>
      <ns2:RegistrationDate>2004-03-23</ns2:RegistrationDate>
      <ns2:MarkRepresentation>
        <ns2:MarkReproduction>
          <ns2:WordMarkSpecification>
            <ns2:MarkVerbalElementText>PYTHON</ns2:MarkVerbalElementText>
          </ns2:WordMarkSpecification>
        </ns2:MarkReproduction>
      </ns2:MarkRepresentation>
      <ns2:ApplicantBag>
        <ns2:Applicant>
          <ns1:Contact>
            <ns1:Name>
              <ns1:EntityName>PYTHON SOFTWARE FOUNDATION</ns1:EntityName>
            </ns1:Name>
            <ns1:CityName>Wolfeboro</ns1:CityName>
            <ns1:CountryCode>US</ns1:CountryCode>
          </ns1:Contact>
        </ns2:Applicant>
      </ns2:ApplicantBag>
    </ns2:Trademark>
  </ns2:TrademarkBag>
</ns2:TrademarkApplication>
"#;
        let out = RuleTemplate::st96().apply(xml).unwrap();
        let normalized = validate::normalize_blank_lines(&out);
        validate::validate_csv(&normalized).unwrap();

        let record = decode::decode(&normalized).unwrap();
        assert_eq!(record.scalar("ApplicationNumber"), Some("76044902"));
        assert_eq!(record.scalar("RegistrationDate"), Some("2004-03-23"));
        assert_eq!(record.scalar("RegistrationDateTruncated"), Some("2004-03-23"));
        let applicants = record.group("ApplicantList").unwrap();
        assert_eq!(
            applicants[0].get("ApplicantName").map(String::as_str),
            Some("PYTHON SOFTWARE FOUNDATION")
        );
        assert_eq!(
            applicants[0].get("ApplicantCountry").map(String::as_str),
            Some("US")
        );
    }

    #[test]
    fn multiline_element_text_is_collapsed_to_one_line() {
        let xml = r#"<Transaction xmlns="http://www.wipo.int/standards/XMLSchema/trademarks">
  <MarkCurrentStatusExternalDescriptionText>
    Line one
    line two
  </MarkCurrentStatusExternalDescriptionText>
  <ApplicationNumber>76044902</ApplicationNumber>
</Transaction>"#;
        let out = RuleTemplate::st66().apply(xml).unwrap();
        assert!(out.contains(
            "MarkCurrentStatusExternalDescriptionText,\"Line one line two\""
        ));
    }
}
