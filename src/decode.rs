use std::collections::HashMap;

use anyhow::Context as _;

use crate::record::StatusRecord;

/// Key that opens a repeated-group member; its value is ignored.
pub const BEGIN_REPEATED_FIELD: &str = "BeginRepeatedField";
/// Key that closes a member; its value `V` files the member under `VList`.
pub const END_REPEATED_FIELD: &str = "EndRepeatedField";

enum State {
    Normal,
    Accumulating(HashMap<String, String>),
}

/// Reduces validated key/value lines into a `StatusRecord`. Scalar pairs go
/// into the flat mapping; pairs between the repeated-field sentinels go into
/// a transient member that `EndRepeatedField,"V"` appends to the `VList`
/// group. Last write wins within whichever mapping is active.
///
/// The input is already grammar-checked, so the only failures left are
/// structural ones that indicate a broken template: a group opened while
/// another is still open, a close without an open, or input ending inside a
/// group. Those are hard errors, not data conditions.
pub fn decode(csv: &str) -> anyhow::Result<StatusRecord> {
    let mut record = StatusRecord::default();
    let mut state = State::Normal;

    for line in csv.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = split_line(line)?;
        match key {
            BEGIN_REPEATED_FIELD => {
                if matches!(state, State::Accumulating(_)) {
                    anyhow::bail!(
                        "repeated-field group opened while another group is still open"
                    );
                }
                state = State::Accumulating(HashMap::new());
            }
            END_REPEATED_FIELD => {
                let State::Accumulating(member) = std::mem::replace(&mut state, State::Normal)
                else {
                    anyhow::bail!("repeated-field group closed without a matching open");
                };
                record
                    .groups
                    .entry(format!("{value}List"))
                    .or_default()
                    .push(member);
            }
            _ => {
                let target = match &mut state {
                    State::Normal => &mut record.scalars,
                    State::Accumulating(member) => member,
                };
                target.insert(key.to_owned(), value);
            }
        }
    }

    if matches!(state, State::Accumulating(_)) {
        anyhow::bail!("input ended inside an unterminated repeated-field group");
    }

    Ok(record)
}

fn split_line(line: &str) -> anyhow::Result<(&str, String)> {
    let comma = line
        .find(',')
        .with_context(|| format!("no comma in line <{line}>"))?;
    let key = &line[..comma];
    let raw = &line[comma + 1..];
    let value = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        raw[1..raw.len() - 1].to_owned()
    } else {
        raw.to_owned()
    };
    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_and_ordered_groups_are_reconstructed() {
        let csv = "A,\"1\"\n\
                   BeginRepeatedField,\"x\"\n\
                   K,\"v1\"\n\
                   EndRepeatedField,\"Item\"\n\
                   K,\"v2\"\n\
                   BeginRepeatedField,\"x\"\n\
                   K,\"v3\"\n\
                   EndRepeatedField,\"Item\"\n";
        let record = decode(csv).unwrap();

        assert_eq!(record.scalar("A"), Some("1"));
        assert_eq!(record.scalar("K"), Some("v2"));
        let items = record.group("ItemList").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("K").map(String::as_str), Some("v1"));
        assert_eq!(items[1].get("K").map(String::as_str), Some("v3"));
    }

    #[test]
    fn duplicate_scalar_keys_keep_the_last_value() {
        let record = decode("A,\"1\"\nA,\"2\"\n").unwrap();
        assert_eq!(record.scalar("A"), Some("2"));
    }

    #[test]
    fn duplicate_keys_inside_a_member_keep_the_last_value() {
        let csv = "BeginRepeatedField,\"x\"\n\
                   K,\"first\"\n\
                   K,\"second\"\n\
                   EndRepeatedField,\"Item\"\n\
                   A,\"1\"\n";
        let record = decode(csv).unwrap();
        let items = record.group("ItemList").unwrap();
        assert_eq!(items[0].get("K").map(String::as_str), Some("second"));
    }

    #[test]
    fn distinct_group_names_map_to_distinct_lists() {
        let csv = "BeginRepeatedField,\"x\"\n\
                   K,\"a\"\n\
                   EndRepeatedField,\"Applicant\"\n\
                   BeginRepeatedField,\"x\"\n\
                   K,\"b\"\n\
                   EndRepeatedField,\"MarkEvent\"\n";
        let record = decode(csv).unwrap();
        assert_eq!(record.group("ApplicantList").unwrap().len(), 1);
        assert_eq!(record.group("MarkEventList").unwrap().len(), 1);
    }

    #[test]
    fn nested_group_open_is_a_hard_error() {
        let csv = "BeginRepeatedField,\"x\"\n\
                   BeginRepeatedField,\"y\"\n";
        let err = decode(csv).unwrap_err();
        assert!(err.to_string().contains("still open"));
    }

    #[test]
    fn group_close_without_open_is_a_hard_error() {
        let err = decode("EndRepeatedField,\"Item\"\n").unwrap_err();
        assert!(err.to_string().contains("without a matching open"));
    }

    #[test]
    fn unterminated_group_is_a_hard_error() {
        let csv = "BeginRepeatedField,\"x\"\n\
                   K,\"v\"\n";
        let err = decode(csv).unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn empty_input_decodes_to_an_empty_record() {
        let record = decode("").unwrap();
        assert!(record.scalars.is_empty());
        assert!(record.groups.is_empty());
    }
}
