//! Lexical analysis of a single input line.
//!
//! The line is split into whitespace-delimited fields. A field that opens a
//! single or double quote without closing it swallows the following fields
//! until one of them ends with the same quote character; the fields are
//! re-joined with a single space and the surrounding quote pair is removed.
//!
//! Operators (`|`, `<`, `>`, `>>`) get no special treatment here: they are
//! ordinary tokens and the parser recognizes them by exact equality, so they
//! have to be separated from their operands by whitespace.

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Removes the outer quote pair if `s` starts and ends with the same quote
/// character and is at least two characters long.
fn strip_quotes(s: &str) -> Option<&str> {
    let first = s.chars().next()?;
    if is_quote(first) && s.len() >= 2 && s.ends_with(first) {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

/// Splits `line` into tokens, honoring balanced single and double quotes.
///
/// Quote handling is deliberately simple: there are no escapes, and a quote
/// left open at the end of the line produces a token that still carries its
/// opening quote character.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut fields = line.split_ascii_whitespace();

    while let Some(field) = fields.next() {
        let Some(quote) = field.chars().next().filter(|c| is_quote(*c)) else {
            tokens.push(field.to_string());
            continue;
        };

        if let Some(inner) = strip_quotes(field) {
            tokens.push(inner.to_string());
            continue;
        }
        if field.len() == 1 {
            // A lone quote character both opens and closes; it stays literal.
            tokens.push(field.to_string());
            continue;
        }

        let mut quoted = field.to_string();
        for extra in fields.by_ref() {
            quoted.push(' ');
            quoted.push_str(extra);
            if extra.ends_with(quote) {
                break;
            }
        }
        match strip_quotes(&quoted) {
            Some(inner) => tokens.push(inner.to_string()),
            None => tokens.push(quoted),
        }
    }

    tokens
}
