//! Compilation of declarative filter syntax into `regex` patterns.

/// Characters that do not count as a `^` separator.
const NON_SEPARATOR: &str = r"a-z0-9_\-.%";

/// Translate a `urlFilter` into an equivalent case-insensitive regex.
///
/// Syntax:
/// - `*` matches any sequence of characters
/// - `^` matches a separator character or the end of the URL
/// - leading `||` anchors to the start of the host (any subdomain)
/// - leading `|` / trailing `|` anchor to the start / end of the URL
///
/// Without anchors the filter matches anywhere in the URL.
pub fn url_filter_to_regex(filter: &str) -> String {
    let mut out = String::from("(?i)");
    let mut body = filter;

    if let Some(rest) = body.strip_prefix("||") {
        out.push_str(r"^[a-z][a-z0-9+.\-]*://(?:[^/?#]*\.)?");
        body = rest;
    } else if let Some(rest) = body.strip_prefix('|') {
        out.push('^');
        body = rest;
    }

    let (body, anchor_end) = match body.strip_suffix('|') {
        Some(rest) => (rest, true),
        None => (body, false),
    };

    let mut buf = [0u8; 4];
    for ch in body.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '^' => {
                out.push_str("(?:[^");
                out.push_str(NON_SEPARATOR);
                out.push_str("]|$)");
            }
            c => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }

    if anchor_end {
        out.push('$');
    }
    out
}

/// Convert a `regexSubstitution` (`\0`..`\9` capture references) into the
/// replacement syntax of the `regex` crate.
///
/// A literal `$` is escaped and `\\` collapses to a single backslash.
pub fn substitution_template(substitution: &str) -> String {
    let mut out = String::with_capacity(substitution.len() + 8);
    let mut chars = substitution.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    chars.next();
                    out.push_str("${");
                    out.push(d);
                    out.push('}');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            c => out.push(c),
        }
    }
    out
}
