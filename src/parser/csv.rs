//! Quote-aware CSV field splitting for a single line.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    UnterminatedQuote,
    TooManyFields { fields: usize },
}

/// Split one CSV line into fields.
///
/// A field that starts with `"` is quoted until the matching closing quote;
/// `""` inside it is a literal quote. Quotes in the middle of an unquoted
/// field are kept as-is. Fields beyond `max_fields` are counted but not
/// stored, so the error reports the real field count.
pub fn split_line(line: &str, max_fields: usize) -> Result<Vec<String>, SplitError> {
    let mut fields: Vec<String> = Vec::new();
    let mut field_count = 0usize;
    let mut current = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }

        match c {
            '"' if at_field_start => {
                in_quotes = true;
                at_field_start = false;
            }
            ',' => {
                field_count += 1;
                if field_count <= max_fields {
                    fields.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
                at_field_start = true;
            }
            _ => {
                current.push(c);
                at_field_start = false;
            }
        }
    }

    if in_quotes {
        return Err(SplitError::UnterminatedQuote);
    }

    field_count += 1;
    if field_count > max_fields {
        return Err(SplitError::TooManyFields { fields: field_count });
    }
    fields.push(current);

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_fields() {
        assert_eq!(
            split_line("a,b,,c", 10).unwrap(),
            vec!["a", "b", "", "c"]
        );
    }

    #[test]
    fn test_quoted_comma_and_escaped_quote() {
        assert_eq!(
            split_line(r#""US East (N. Virginia), 1","say ""hi""",x"#, 10).unwrap(),
            vec!["US East (N. Virginia), 1", r#"say "hi""#, "x"]
        );
    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        assert_eq!(split_line(r#"5" disk,y"#, 10).unwrap(), vec![r#"5" disk"#, "y"]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            split_line(r#"a,"broken"#, 10),
            Err(SplitError::UnterminatedQuote)
        );
    }

    #[test]
    fn test_field_limit_reports_real_count() {
        assert_eq!(
            split_line("a,b,c,d,e", 3),
            Err(SplitError::TooManyFields { fields: 5 })
        );
        assert_eq!(split_line("a,b,c", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_line_is_one_empty_field() {
        assert_eq!(split_line("", 3).unwrap(), vec![""]);
    }
}
