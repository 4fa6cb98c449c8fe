//! Query parsing module
//!
//! Turns raw input into a structured [`Query`]. Supported operators:
//! - Exact phrases: `"rust async book"`
//! - Required terms: `+tokio`
//! - Excluded terms: `-java`
//! - Site restriction: `site:docs.rs`
//!
//! Parsing never fails. An unterminated quote turns the rest of the input
//! into a phrase.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Parsed search query with extracted operators
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Original raw input (canonical text for normalized queries)
    pub raw_text: String,
    /// Bare terms in input order
    pub terms: Vec<String>,
    /// Quoted exact phrases in input order
    pub phrases: Vec<String>,
    /// Terms that must appear (`+term`)
    pub required: BTreeSet<String>,
    /// Terms that must not appear (`-term`)
    pub excluded: BTreeSet<String>,
    /// Domain restriction (`site:example.com`)
    pub site_filter: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Phrase(String),
}

impl Query {
    /// Parse a raw query string
    pub fn parse(raw: &str) -> Self {
        let mut query = Self {
            raw_text: raw.to_string(),
            terms: Vec::new(),
            phrases: Vec::new(),
            required: BTreeSet::new(),
            excluded: BTreeSet::new(),
            site_filter: None,
        };

        for token in tokenize(raw) {
            match token {
                Token::Phrase(phrase) => query.phrases.push(phrase),
                Token::Word(word) => query.classify(word),
            }
        }

        query
    }

    fn classify(&mut self, word: String) {
        if let Some(term) = word.strip_prefix('+').filter(|t| !t.is_empty()) {
            let term = term.to_string();
            self.forget(&term);
            self.required.insert(term);
        } else if let Some(term) = word.strip_prefix('-').filter(|t| !t.is_empty()) {
            let term = term.to_string();
            self.forget(&term);
            self.excluded.insert(term);
        } else if let Some(site) = word.strip_prefix("site:").filter(|s| !s.is_empty()) {
            self.site_filter = Some(site.to_string());
        } else {
            let folded = word.to_lowercase();
            let repeated = self.terms.iter().any(|t| t.to_lowercase() == folded);
            self.forget_operators(&folded);
            if !repeated {
                self.terms.push(word);
            }
        }
    }

    /// Drop a token from every word category so the latest
    /// classification is the only one left.
    fn forget(&mut self, token: &str) {
        let folded = token.to_lowercase();
        self.terms.retain(|t| t.to_lowercase() != folded);
        self.forget_operators(&folded);
    }

    fn forget_operators(&mut self, folded: &str) {
        self.required.retain(|t| t.to_lowercase() != folded);
        self.excluded.retain(|t| t.to_lowercase() != folded);
    }

    /// Canonical form used for cache-key equality.
    ///
    /// Bare terms are case-folded, de-duplicated and sorted; phrases are
    /// de-duplicated and sorted; the site filter is lower-cased.
    pub fn normalize(&self) -> Self {
        let mut terms: Vec<String> = self.terms.iter().map(|t| t.to_lowercase()).collect();
        terms.sort();
        terms.dedup();

        let mut phrases = self.phrases.clone();
        phrases.sort();
        phrases.dedup();

        let mut normalized = Self {
            raw_text: String::new(),
            terms,
            phrases,
            required: self.required.clone(),
            excluded: self.excluded.clone(),
            site_filter: self.site_filter.as_ref().map(|s| s.to_lowercase()),
        };
        normalized.raw_text = normalized.to_query_string();
        normalized
    }

    /// Render the query back into operator syntax, keeping term order.
    ///
    /// This is what HTTP providers send upstream.
    pub fn to_query_string(&self) -> String {
        let mut parts: Vec<String> = self.terms.clone();
        parts.extend(self.phrases.iter().map(|p| format!("\"{}\"", p)));
        parts.extend(self.required.iter().map(|t| format!("+{}", t)));
        parts.extend(self.excluded.iter().map(|t| format!("-{}", t)));
        if let Some(ref site) = self.site_filter {
            parts.push(format!("site:{}", site));
        }
        parts.join(" ")
    }

    /// Plain keywords without operators, for providers with no operator support
    pub fn keywords(&self) -> String {
        let mut parts: Vec<&str> = self.terms.iter().map(|s| s.as_str()).collect();
        parts.extend(self.phrases.iter().map(|s| s.as_str()));
        parts.extend(self.required.iter().map(|s| s.as_str()));
        parts.join(" ")
    }

    /// Check if there is anything to search for
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.phrases.is_empty() && self.required.is_empty()
    }

    /// Check the required/excluded operators against result text.
    ///
    /// Matching is case-insensitive substring matching.
    pub fn matches_text(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.required
            .iter()
            .all(|term| text.contains(&term.to_lowercase()))
            && !self
                .excluded
                .iter()
                .any(|term| text.contains(&term.to_lowercase()))
    }

    /// Check a result domain against the `site:` operator
    pub fn matches_domain(&self, domain: &str) -> bool {
        let Some(ref site) = self.site_filter else {
            return true;
        };
        let site = site.trim_start_matches("www.").to_lowercase();
        let domain = domain.trim_start_matches("www.").to_lowercase();
        domain == site || domain.ends_with(&format!(".{}", site))
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw_text.trim())
    }
}

/// Split on whitespace outside quotes
fn tokenize(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut phrase = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                phrase.push(c);
            }
            let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
            if !phrase.is_empty() {
                tokens.push(Token::Phrase(phrase));
            }
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(Token::Word(word));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_query() {
        let parsed = Query::parse("hello   world");
        assert_eq!(parsed.terms, vec!["hello", "world"]);
        assert!(parsed.phrases.is_empty());
        assert!(parsed.site_filter.is_none());
    }

    #[test]
    fn test_phrase_parsing() {
        let parsed = Query::parse(r#"rust "async book" tokio"#);
        assert_eq!(parsed.terms, vec!["rust", "tokio"]);
        assert_eq!(parsed.phrases, vec!["async book"]);
    }

    #[test]
    fn test_unterminated_quote_becomes_phrase() {
        let parsed = Query::parse(r#"rust "ownership and borrowing"#);
        assert_eq!(parsed.terms, vec!["rust"]);
        assert_eq!(parsed.phrases, vec!["ownership and borrowing"]);
    }

    #[test]
    fn test_operators() {
        let parsed = Query::parse("python +tutorial -snake site:docs.python.org");
        assert_eq!(parsed.terms, vec!["python"]);
        assert!(parsed.required.contains("tutorial"));
        assert!(parsed.excluded.contains("snake"));
        assert_eq!(parsed.site_filter.as_deref(), Some("docs.python.org"));
    }

    #[test]
    fn test_last_site_wins() {
        let parsed = Query::parse("rust site:a.com site:b.org");
        assert_eq!(parsed.site_filter.as_deref(), Some("b.org"));
        assert_eq!(parsed.terms, vec!["rust"]);
    }

    #[test]
    fn test_lone_operators_are_terms() {
        let parsed = Query::parse("a + b - c site:");
        assert_eq!(parsed.terms, vec!["a", "+", "b", "-", "c", "site:"]);
        assert!(parsed.required.is_empty());
        assert!(parsed.excluded.is_empty());
    }

    #[test]
    fn test_token_lives_in_one_category() {
        let parsed = Query::parse("rust +rust -rust");
        assert!(parsed.terms.is_empty());
        assert!(parsed.required.is_empty());
        assert!(parsed.excluded.contains("rust"));
    }

    #[test]
    fn test_repeated_term_keeps_first_position() {
        let parsed = Query::parse("rust tokio Rust");
        assert_eq!(parsed.terms, vec!["rust", "tokio"]);
        assert_eq!(parsed.to_query_string(), "rust tokio");

        let parsed = Query::parse("-rust tokio rust");
        assert_eq!(parsed.terms, vec!["tokio", "rust"]);
        assert!(parsed.excluded.is_empty());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = r#"+a "b c" -d site:e.com f "g"#;
        assert_eq!(Query::parse(raw), Query::parse(raw));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let q = Query::parse(r#"Rust tokio "zeta phrase" "alpha phrase" +async -java site:Docs.rs"#);
        let once = q.normalize();
        assert_eq!(once.normalize(), once);
    }

    #[test]
    fn test_normalize_ignores_order_case_and_whitespace() {
        let a = Query::parse("Tokio  rust   +async");
        let b = Query::parse("+async RUST tokio tokio");
        assert_eq!(a.normalize(), b.normalize());

        let c = Query::parse("rust tokio -async");
        assert_ne!(a.normalize(), c.normalize());
    }

    #[test]
    fn test_is_empty() {
        assert!(Query::parse("   ").is_empty());
        assert!(Query::parse("-java site:x.com").is_empty());
        assert!(!Query::parse("+java").is_empty());
        assert!(!Query::parse("\"exact\"").is_empty());
    }

    #[test]
    fn test_matches_text() {
        let q = Query::parse("python +tutorial -snake");
        assert!(q.matches_text("A Python Tutorial for beginners"));
        assert!(!q.matches_text("python reference"));
        assert!(!q.matches_text("Tutorial: the python is a snake"));
    }

    #[test]
    fn test_matches_domain() {
        let q = Query::parse("rust site:rust-lang.org");
        assert!(q.matches_domain("rust-lang.org"));
        assert!(q.matches_domain("doc.rust-lang.org"));
        assert!(q.matches_domain("www.rust-lang.org"));
        assert!(!q.matches_domain("notrust-lang.org"));
        assert!(Query::parse("rust").matches_domain("anything.com"));
    }

    #[test]
    fn test_query_string_round_trip() {
        let q = Query::parse(r#"rust "error handling" +anyhow -panic site:docs.rs"#);
        assert_eq!(
            q.to_query_string(),
            r#"rust "error handling" +anyhow -panic site:docs.rs"#
        );
        assert_eq!(q.keywords(), "rust error handling anyhow");
    }
}
