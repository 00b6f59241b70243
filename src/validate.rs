use crate::codes::{ErrorCode, Fault};

/// Drops lines that are empty or all-whitespace and rejoins the remainder
/// with a trailing `\n`. Relaxes what template output is accepted: stray
/// blank lines and a missing final newline are both immaterial. Idempotent.
pub fn normalize_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if !line.trim().is_empty() {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Naive sanity check of the key/value text for the likelier ways a bad
/// template survives the transform without erroring: output slurped into one
/// line, a missing separator, whitespace in a key, an unquoted value.
/// Stops at the first violation.
pub fn validate_csv(csv: &str) -> Result<(), Fault> {
    let lines: Vec<&str> = csv.lines().filter(|line| !line.is_empty()).collect();
    if lines.len() < 2 {
        return Err(Fault::new(
            ErrorCode::ShortCsv,
            "transform produced fewer than 2 lines of key/value output",
        ));
    }
    for (offset, line) in lines.iter().enumerate() {
        let line_number = offset + 1;
        let Some(comma) = line.find(',') else {
            return Err(Fault::new(
                ErrorCode::InvalidKeyValuePair,
                format!("line {line_number}: no key/value pair in <{line}> (missing comma)"),
            ));
        };
        let key = &line[..comma];
        let value = &line[comma + 1..];

        if !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Fault::new(
                ErrorCode::InvalidKey,
                format!("line {line_number}: invalid characters in key <{key}>"),
            ));
        }

        if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
            return Err(Fault::new(
                ErrorCode::InvalidValue,
                format!(
                    "line {line_number}: value <{value}> for key <{key}> does not begin and end \
                     with a double-quote character"
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_for(csv: &str) -> Option<ErrorCode> {
        validate_csv(csv).err().map(|fault| fault.code)
    }

    #[test]
    fn well_formed_lines_pass() {
        assert!(validate_csv("Key1,\"Value1\"\nKey2,\"Value2\"\n").is_ok());
    }

    #[test]
    fn a_single_line_is_short() {
        assert_eq!(code_for("Key1,\"Value1\"\n"), Some(ErrorCode::ShortCsv));
    }

    #[test]
    fn empty_input_is_short() {
        assert_eq!(code_for(""), Some(ErrorCode::ShortCsv));
    }

    #[test]
    fn a_line_without_a_comma_is_not_a_pair() {
        assert_eq!(
            code_for("Foo\"Bar\"\nKey2,\"Value2\"\n"),
            Some(ErrorCode::InvalidKeyValuePair)
        );
    }

    #[test]
    fn whitespace_in_a_key_is_rejected() {
        assert_eq!(
            code_for("Foo Bar,\"Baz\"\nKey2,\"Value2\"\n"),
            Some(ErrorCode::InvalidKey)
        );
    }

    #[test]
    fn an_unquoted_value_is_rejected() {
        assert_eq!(
            code_for("Foo,Bar\nKey2,\"Value2\"\n"),
            Some(ErrorCode::InvalidValue)
        );
    }

    #[test]
    fn an_empty_value_is_rejected() {
        assert_eq!(
            code_for("Foo,\nKey2,\"Value2\"\n"),
            Some(ErrorCode::InvalidValue)
        );
    }

    #[test]
    fn a_single_quote_character_value_is_rejected() {
        // One character cannot both begin and end the value.
        assert_eq!(
            code_for("Foo,\"\nKey2,\"Value2\"\n"),
            Some(ErrorCode::InvalidValue)
        );
    }

    #[test]
    fn an_empty_quoted_value_passes() {
        assert!(validate_csv("Foo,\"\"\nKey2,\"Value2\"\n").is_ok());
    }

    #[test]
    fn the_first_violation_wins() {
        // Line 1 has a bad key, line 2 has a bad value; only line 1 reports.
        let fault = validate_csv("Foo Bar,\"Baz\"\nFoo,Bar\n").unwrap_err();
        assert_eq!(fault.code, ErrorCode::InvalidKey);
        assert!(fault.message.contains("line 1"));
    }

    #[test]
    fn normalize_drops_blank_and_whitespace_lines() {
        let raw = "A,\"1\"\n\n   \nB,\"2\"\n\t\n";
        assert_eq!(normalize_blank_lines(raw), "A,\"1\"\nB,\"2\"\n");
    }

    #[test]
    fn normalize_adds_the_final_newline() {
        assert_eq!(normalize_blank_lines("A,\"1\""), "A,\"1\"\n");
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = "A,\"1\"\n\nB,\"2\"";
        let once = normalize_blank_lines(raw);
        assert_eq!(normalize_blank_lines(&once), once);
    }
}
