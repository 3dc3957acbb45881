//! URI pattern tokenizing and path normalization.
//!
//! A pattern is a sequence of literal text and `:name` parameter tokens.
//! A token starts at `:` followed by an identifier (`[A-Za-z_][A-Za-z0-9_]*`);
//! a colon not followed by an identifier is literal text.

/// One piece of a route pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

/// Split a pattern into literal and parameter segments, in order.
pub fn parse(pattern: &str) -> Vec<Segment<'_>> {
    let bytes = pattern.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b':' && bytes.get(i + 1).is_some_and(|b| is_ident_start(*b)) {
            if literal_start < i {
                segments.push(Segment::Literal(&pattern[literal_start..i]));
            }
            let name_start = i + 1;
            let mut end = name_start + 1;
            while end < bytes.len() && is_ident_continue(bytes[end]) {
                end += 1;
            }
            segments.push(Segment::Param(&pattern[name_start..end]));
            literal_start = end;
            i = end;
        } else {
            i += 1;
        }
    }

    if literal_start < pattern.len() {
        segments.push(Segment::Literal(&pattern[literal_start..]));
    }
    segments
}

/// Parameter names in declaration order.
pub fn param_names(pattern: &str) -> Vec<&str> {
    parse(pattern)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Param(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// True when the pattern carries at least one `:name` token.
pub fn is_dynamic(pattern: &str) -> bool {
    parse(pattern).iter().any(|s| matches!(s, Segment::Param(_)))
}

/// Join prefix and path pieces with exactly one `/` between non-empty parts.
///
/// The result always starts with `/` and never ends with one, except for
/// the root path itself.
pub fn join(parts: &[&str]) -> String {
    let mut out = String::new();
    for piece in parts.iter().flat_map(|p| p.split('/')).filter(|p| !p.is_empty()) {
        out.push('/');
        out.push_str(piece);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Normalize an inbound request URI for matching.
///
/// Strips the query string and fragment, trims trailing slashes and
/// guarantees a leading slash. The empty path becomes `/`.
pub fn normalize_path(uri: &str) -> String {
    let path = uri
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');

    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_pattern() {
        let segments = parse("/predictions/edit/:id");
        assert_eq!(
            segments,
            vec![Segment::Literal("/predictions/edit/"), Segment::Param("id")]
        );

        let segments = parse("/users/:user_id/posts/:post");
        assert_eq!(param_names("/users/:user_id/posts/:post"), vec!["user_id", "post"]);
        assert_eq!(segments.len(), 4);
    }

    #[test]
    fn test_bare_colon_is_literal() {
        assert_eq!(parse("/time/12:30"), vec![Segment::Literal("/time/12:30")]);
        assert!(!is_dynamic("/time/12:30"));
        assert!(is_dynamic("/stocks/:symbol"));
    }

    #[test]
    fn test_join_normalizes_slashes() {
        assert_eq!(join(&["/", "/"]), "/");
        assert_eq!(join(&["/admin/", "//predictions", "edit/:id/"]), "/admin/predictions/edit/:id");
        assert_eq!(join(&["api", ""]), "/api");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/predictions/?page=2"), "/predictions");
        assert_eq!(normalize_path("leaderboard#top"), "/leaderboard");
    }
}
