//! Stable fingerprints for decision matches.
//!
//! Downstream commenters use the fingerprint to recognise a match they have
//! already reported, so it depends only on the decision, the file and the
//! evidence.

use decisionguard_types::DecisionMatch;
use sha2::{Digest, Sha256};

/// SHA-256 of `decision_id:file:patterns`, truncated to 16 hex characters.
///
/// `patterns` is the sorted content evidence, or the matched glob when the
/// match carries no details.
pub fn match_fingerprint(m: &DecisionMatch) -> String {
    let mut patterns: Vec<&str> = match &m.match_details {
        Some(details) if !details.matched_patterns.is_empty() => {
            details.matched_patterns.iter().map(String::as_str).collect()
        }
        _ => vec![m.matched_pattern.as_str()],
    };
    patterns.sort_unstable();
    patterns.dedup();

    let input = format!("{}:{}:{}", m.decision.id, m.file, patterns.join(","));
    let hash = Sha256::digest(input.as_bytes());
    hex::encode(&hash[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use decisionguard_testkit::fixtures::sample_decisions;
    use decisionguard_types::MatchDetails;
    use std::sync::Arc;

    fn test_match() -> DecisionMatch {
        DecisionMatch {
            file: "src/auth/login.ts".to_string(),
            decision: Arc::new(sample_decisions::auth_boundary()),
            matched_pattern: "src/auth/**/*.ts".to_string(),
            match_details: Some(MatchDetails {
                matched_patterns: vec!["src/auth/**/*.ts".to_string(), "config/auth.yml".to_string()],
            }),
        }
    }

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let fp = match_fingerprint(&test_match());
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_ignores_evidence_order() {
        let a = test_match();
        let mut b = test_match();
        if let Some(d) = b.match_details.as_mut() {
            d.matched_patterns.reverse();
        }
        assert_eq!(match_fingerprint(&a), match_fingerprint(&b));
    }

    #[test]
    fn fingerprint_differs_per_file() {
        let a = test_match();
        let mut b = test_match();
        b.file = "src/auth/logout.ts".to_string();
        assert_ne!(match_fingerprint(&a), match_fingerprint(&b));
    }
}
