//! Splits a raw chat line into words, honoring quoting and C-style escapes:
//! a line splitter generalized from "split on whitespace" to full
//! quote/escape handling.

use crate::error::GortError;

const DOUBLE_QUOTES: [char; 4] = ['"', '\u{201C}', '\u{201D}', '\u{201E}'];
const SINGLE_QUOTES: [char; 3] = ['\'', '\u{2018}', '\u{2019}'];

fn is_double_quote(c: char) -> bool {
    DOUBLE_QUOTES.contains(&c)
}

fn is_single_quote(c: char) -> bool {
    SINGLE_QUOTES.contains(&c)
}

fn unterminated(position: usize) -> GortError {
    GortError::parse(format!("unterminated quote at {position}"), position)
}

/// Tokenize a raw chat line into words. Positions in errors are 1-based
/// character columns.
pub fn tokenize(line: &str) -> Result<Vec<String>, GortError> {
    let chars: Vec<char> = line.trim().chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            if in_token {
                tokens.push(std::mem::take(&mut current));
                in_token = false;
            }
            i += 1;
            continue;
        }
        in_token = true;

        if is_double_quote(c) {
            let open_pos = i + 1;
            i += 1;
            loop {
                if i >= chars.len() {
                    return Err(unterminated(open_pos));
                }
                let ch = chars[i];
                if is_double_quote(ch) {
                    i += 1;
                    break;
                }
                if ch == '\\' {
                    i += 1;
                    if i >= chars.len() {
                        return Err(GortError::parse(
                            "unterminated escape at end of input",
                            i + 1,
                        ));
                    }
                    current.push(unescape(chars[i], i + 1)?);
                    i += 1;
                } else {
                    current.push(ch);
                    i += 1;
                }
            }
        } else if is_single_quote(c) {
            let open_pos = i + 1;
            i += 1;
            loop {
                if i >= chars.len() {
                    return Err(unterminated(open_pos));
                }
                let ch = chars[i];
                if is_single_quote(ch) {
                    i += 1;
                    break;
                }
                current.push(ch);
                i += 1;
            }
        } else {
            current.push(c);
            i += 1;
        }
    }

    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

fn unescape(c: char, position: usize) -> Result<char, GortError> {
    Ok(match c {
        'a' => '\u{7}',
        'b' => '\u{8}',
        'f' => '\u{C}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{B}',
        '\'' => '\'',
        '"' => '"',
        '?' => '?',
        '\\' => '\\',
        other => {
            return Err(GortError::parse(
                format!("unknown escape \\{other}"),
                position,
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_quoted_token() {
        let tokens = tokenize(r#"echo -n "foo bar""#).unwrap();
        assert_eq!(tokens, vec!["echo", "-n", "foo bar"]);
    }

    #[test]
    fn preserves_unescaped_single_quote_inside_double_quotes() {
        let tokens = tokenize(r#"echo "What's" "\"this\"?""#).unwrap();
        assert_eq!(tokens, vec!["echo", "What's", "\"this\"?"]);
    }

    #[test]
    fn empty_input_yields_empty_sequence() {
        assert_eq!(tokenize("").unwrap(), Vec::<String>::new());
        assert_eq!(tokenize("   ").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn unterminated_quote_cites_opening_column() {
        let err = tokenize(r#"echo "foo"#).unwrap_err();
        match err {
            GortError::Parse { position, .. } => assert_eq!(position, 6),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_escape_is_an_error() {
        let err = tokenize(r#"echo "\q""#).unwrap_err();
        assert!(matches!(err, GortError::Parse { .. }));
    }

    #[test]
    fn single_quotes_do_not_escape() {
        let tokens = tokenize(r"echo 'a\nb'").unwrap();
        assert_eq!(tokens, vec!["echo", r"a\nb"]);
    }

    #[test]
    fn token_position_bounds() {
        let err = tokenize("'unterminated").unwrap_err();
        if let GortError::Parse { position, .. } = err {
            assert!(position >= 1 && position <= "'unterminated".len() + 1);
        }
    }
}
