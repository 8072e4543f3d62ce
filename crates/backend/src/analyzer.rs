//! Code-aware text analysis shared by indexing and querying.
//!
//! Identifiers are split on separators (`_`, `-`, `.`, `::`, `/`, whitespace)
//! and on camelCase boundaries, then lowercased. A compound identifier also
//! keeps its joined form so exact lookups still match.

/// Tokens shorter than this are dropped
const MIN_TOKEN_LEN: usize = 2;

/// Analyze `text` into lowercase tokens, order preserving, without duplicates
#[must_use]
pub fn analyze(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut push = |token: String| {
        if token.chars().count() >= MIN_TOKEN_LEN && !tokens.contains(&token) {
            tokens.push(token);
        }
    };

    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
    {
        let parts: Vec<String> = word
            .split('_')
            .filter(|s| !s.is_empty())
            .flat_map(split_camel_case)
            .collect();

        if parts.len() > 1 {
            push(word.trim_matches('_').to_lowercase());
        }
        for part in parts {
            push(part);
        }
    }
    tokens
}

/// `parseHTTPRequest` -> `parse`, `http`, `request`
fn split_camel_case(segment: &str) -> Vec<String> {
    let chars: Vec<char> = segment.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_uppercase() && c.is_uppercase() && next_is_lower);
            if boundary {
                parts.push(std::mem::take(&mut current).to_lowercase());
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current.to_lowercase());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_camel_case_and_acronyms() {
        assert_eq!(
            analyze("parseHTTPRequest"),
            vec!["parsehttprequest", "parse", "http", "request"]
        );
    }

    #[test]
    fn splits_on_code_separators() {
        assert_eq!(
            analyze("crate::graph/builder.rs user-id"),
            vec!["crate", "graph", "builder", "rs", "user", "id"]
        );
        assert_eq!(
            analyze("parse_config"),
            vec!["parse_config", "parse", "config"]
        );
    }

    #[test]
    fn drops_short_tokens_and_duplicates() {
        assert_eq!(analyze("a b cc Cc cc"), vec!["cc"]);
        assert!(analyze("  !! ").is_empty());
    }
}
