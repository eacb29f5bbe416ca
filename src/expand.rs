//! `$NAME` substitution inside a single token.

use crate::env::Environment;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z0-9_]+)").expect("variable pattern is valid"));

/// Replace every `$NAME` in `token` with its value.
///
/// `NAME` is a run of ASCII alphanumerics or underscores. The value comes from
/// the shell variables, then the process environment, and is empty when the
/// name is unset. A `$` that is not followed by a name character is kept as-is.
/// Substituted values are not rescanned.
pub fn expand(token: &str, env: &Environment) -> String {
    expand_cow(token, env).into_owned()
}

fn expand_cow<'a>(token: &'a str, env: &Environment) -> Cow<'a, str> {
    if !token.contains('$') {
        return Cow::Borrowed(token);
    }
    VARIABLE.replace_all(token, |caps: &Captures| {
        env.get_var(&caps[1]).unwrap_or_default()
    })
}

/// Whether `name` is a valid variable name: a letter or underscore followed
/// by letters, digits or underscores.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
