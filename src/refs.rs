use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;

/// Legal citation extraction over arbitrary text.
///
/// Stateless; both extractors return matches deduplicated in order of first
/// appearance, and an empty list when nothing matches.
#[derive(Debug)]
pub struct ReferenceExtractor {
    case_ref: Regex,
    statutory_ref: Regex,
}

impl ReferenceExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Capitalized word-groups conjoined by a literal " v. ";
            // internal periods and commas allow abbreviations like "U.S.".
            case_ref: Regex::new(
                r"\b[A-Z][A-Za-z.,]*(?:\s+[A-Z][A-Za-z.,]*)*\s+v\.\s+[A-Z][A-Za-z.,]*(?:\s+[A-Z][A-Za-z.,]*)*",
            )
            .context("failed to compile case reference regex")?,
            statutory_ref: Regex::new(
                r"(?:(?:IRC|Sec\.|Section)\s*)?§\s*\d+[A-Za-z]?(?:\([0-9A-Za-z]+\))*",
            )
            .context("failed to compile statutory reference regex")?,
        })
    }

    pub fn case_refs(&self, text: &str) -> Vec<String> {
        dedup_matches(&self.case_ref, text)
    }

    pub fn statutory_refs(&self, text: &str) -> Vec<String> {
        dedup_matches(&self.statutory_ref, text)
    }
}

fn dedup_matches(pattern: &Regex, text: &str) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut matches = Vec::new();

    for found in pattern.find_iter(text) {
        if seen.insert(found.as_str()) {
            matches.push(found.as_str().to_string());
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ReferenceExtractor {
        ReferenceExtractor::new().expect("extractor should build")
    }

    #[test]
    fn extracts_distinct_case_references_in_order() {
        let refs = extractor().case_refs("Jones v. Commissioner and Smith v. United States");
        assert_eq!(refs, vec!["Jones v. Commissioner", "Smith v. United States"]);
    }

    #[test]
    fn case_references_allow_abbreviated_parties() {
        let refs = extractor().case_refs("as held in Peracchi v. U.S. on remand");
        assert_eq!(refs, vec!["Peracchi v. U.S."]);
    }

    #[test]
    fn repeated_case_references_are_deduplicated() {
        let refs = extractor()
            .case_refs("Jones v. Commissioner controls here. Jones v. Commissioner held that");
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn extracts_statutory_references_preserving_text() {
        let refs = extractor().statutory_refs("See § 351 and § 368(a)(1)(A)");
        assert_eq!(refs, vec!["§ 351", "§ 368(a)(1)(A)"]);
    }

    #[test]
    fn statutory_references_keep_their_prefix() {
        let refs = extractor().statutory_refs("under IRC § 1032 the issuer recognizes nothing");
        assert_eq!(refs, vec!["IRC § 1032"]);
    }

    #[test]
    fn no_matches_yield_empty_lists() {
        let extractor = extractor();
        assert!(extractor.case_refs("nothing cited here").is_empty());
        assert!(extractor.statutory_refs("nothing cited here").is_empty());
    }
}
