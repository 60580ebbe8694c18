//! The citation-extraction collaborator contract (spec §6, "Citation
//! library contract") and a reference `regex`-based implementation standing
//! in for the external `eyecite`/`citeurl` libraries the spec treats as
//! collaborators (spec §6: "Given text, yield records carrying the matched
//! text, a span, a type tag, and a normalized string form and/or URL").

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationType {
    Statute,
    Caselaw,
    Regulation,
}

#[derive(Debug, Clone)]
pub struct CitationHit {
    pub span: Span,
    pub citation_type: CitationType,
    pub normalized: Option<String>,
    pub url: Option<String>,
}

/// Given text, yield citation records (spec §6). Implementations wrapping a
/// real `eyecite`/`citeurl`-equivalent library return case law, statutes,
/// and other legal citations; [`RegexCitationExtractor`] is a reference
/// implementation covering the common US statutory/case-law patterns.
pub trait CitationExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<CitationHit>;
}

static USC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s+U\.S\.C\.\s*(?:§{1,2}\s*)?\d+[a-zA-Z0-9\-\(\)]*").unwrap());
static CFR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s+C\.F\.R\.\s*(?:§{1,2}\s*)?\d+[a-zA-Z0-9\-\.\(\)]*").unwrap());
static CASE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Z][\w.&'\-]+(?:\s+[A-Z][\w.&'\-]+)*\s+v\.\s+[A-Z][\w.&'\-]+(?:\s+[A-Z][\w.&'\-]+)*,\s+\d+\s+[A-Z][\w.]*\s+\d+(\s*\(\d{4}\))?")
        .unwrap()
});

/// A reference citation extractor using hand-built regexes for the common
/// U.S. statutory and case-law citation shapes (spec §8 scenario 5: `"42
/// U.S.C. § 1983"`, `"Smith v. Jones, 123 U.S. 456 (1987)"`).
#[derive(Debug, Default)]
pub struct RegexCitationExtractor;

impl CitationExtractor for RegexCitationExtractor {
    fn extract(&self, text: &str) -> Vec<CitationHit> {
        let mut hits = Vec::new();

        for mat in USC_PATTERN.find_iter(text) {
            hits.push(CitationHit {
                span: Span::new(text, mat.start(), mat.end()),
                citation_type: CitationType::Statute,
                normalized: Some(normalize_citation(mat.as_str())),
                url: None,
            });
        }
        for mat in CFR_PATTERN.find_iter(text) {
            hits.push(CitationHit {
                span: Span::new(text, mat.start(), mat.end()),
                citation_type: CitationType::Regulation,
                normalized: Some(normalize_citation(mat.as_str())),
                url: None,
            });
        }
        for mat in CASE_PATTERN.find_iter(text) {
            hits.push(CitationHit {
                span: Span::new(text, mat.start(), mat.end()),
                citation_type: CitationType::Caselaw,
                normalized: Some(normalize_citation(mat.as_str())),
                url: None,
            });
        }

        hits
    }
}

fn normalize_citation(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_statute_and_caselaw() {
        let extractor = RegexCitationExtractor;
        let text = "See 42 U.S.C. § 1983 and Smith v. Jones, 123 U.S. 456 (1987).";
        let hits = extractor.extract(text);

        assert!(hits.iter().any(|h| h.citation_type == CitationType::Statute
            && h.span.text.contains("42 U.S.C")));
        assert!(hits
            .iter()
            .any(|h| h.citation_type == CitationType::Caselaw && h.span.text.contains("Smith v. Jones")));
    }
}
