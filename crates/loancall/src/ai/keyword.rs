//! Offline extractor built from keyword rules.
//!
//! Used when no model credentials are configured. It only reports what it
//! can read directly off the transcript; anything else stays absent.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{AdapterError, Extractor};
use crate::model::analysis::parse_number;
use crate::model::{CallAnalysis, LoanInfo};

static RE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s?(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)(?:\s?(k|m|million|thousand)\b)?")
        .unwrap()
});
static RE_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})[- ]?(?:years?|yrs?)\b").unwrap());
static RE_RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}(?:\.\d{1,3})?)\s?(?:%|percent\b)(\s+down\b)?").unwrap()
});
static RE_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(need to|needs to|will send|send|schedule|follow up|call back|submit|upload|provide|get back)\b")
        .unwrap()
});

/// Loan programs, matched in transcript order. `VA` is case-sensitive so the
/// word "va" in ordinary speech does not count.
static LOAN_TYPES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(?i)\bconventional\b").unwrap(), "Conventional"),
        (Regex::new(r"(?i)\bFHA\b").unwrap(), "FHA"),
        (Regex::new(r"\bVA\b").unwrap(), "VA"),
        (Regex::new(r"(?i)\bUSDA\b").unwrap(), "USDA"),
        (Regex::new(r"(?i)\bjumbo\b").unwrap(), "Jumbo"),
    ]
});

static PROPERTY_TYPES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)\bsingle[- ]?family\b").unwrap(),
            "Single Family Home",
        ),
        (Regex::new(r"(?i)\bcondo(?:minium)?s?\b").unwrap(), "Condo"),
        (
            Regex::new(r"(?i)\b(?:townhouse|townhome|town home)s?\b").unwrap(),
            "Townhouse",
        ),
        (
            Regex::new(r"(?i)\b(?:multi[- ]?family|duplex|triplex|fourplex)\b").unwrap(),
            "Multi-Family",
        ),
    ]
});

const MAX_LIST_ITEMS: usize = 5;
const MAX_SUMMARY_CHARS: usize = 280;
const TERM_YEARS: std::ops::RangeInclusive<u32> = 5..=40;

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extraction is pure; the async trait method delegates here.
    pub fn analyze(&self, transcript: &str) -> CallAnalysis {
        let sentences = split_sentences(transcript);
        let loan_info = loan_info_of(transcript);

        let summary = sentences.first().map(|s| truncate(s, MAX_SUMMARY_CHARS));
        let key_points: Vec<String> = sentences
            .iter()
            .filter(|s| !loan_info_of(s).is_empty())
            .take(MAX_LIST_ITEMS)
            .cloned()
            .collect();
        let action_items: Vec<String> = sentences
            .iter()
            .filter(|s| RE_ACTION.is_match(s))
            .take(MAX_LIST_ITEMS)
            .cloned()
            .collect();

        CallAnalysis {
            summary,
            key_points: (!key_points.is_empty()).then_some(key_points),
            action_items: (!action_items.is_empty()).then_some(action_items),
            loan_info: Some(loan_info),
        }
        .normalized()
    }
}

#[async_trait]
impl Extractor for KeywordExtractor {
    async fn extract(&self, transcript: &str) -> Result<CallAnalysis, AdapterError> {
        Ok(self.analyze(transcript))
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

fn loan_info_of(text: &str) -> LoanInfo {
    LoanInfo {
        loan_type: earliest(&LOAN_TYPES, text),
        loan_amount: largest_amount(text),
        property_type: earliest(&PROPERTY_TYPES, text),
        rate: first_rate(text),
        term: first_term(text),
    }
}

fn earliest(patterns: &[(Regex, &'static str)], text: &str) -> Option<String> {
    patterns
        .iter()
        .filter_map(|(re, name)| re.find(text).map(|m| (m.start(), *name)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, name)| name.to_string())
}

/// The largest dollar figure; smaller ones are usually fees or down payments.
fn largest_amount(text: &str) -> Option<f64> {
    RE_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| {
            let base = parse_number(&caps[1])?;
            let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
                Some(s) if s == "k" || s == "thousand" => 1_000.0,
                Some(s) if s == "m" || s == "million" => 1_000_000.0,
                _ => 1.0,
            };
            Some(base * multiplier)
        })
        .filter(|amount| *amount > 0.0)
        .max_by(|a, b| a.total_cmp(b))
}

fn first_rate(text: &str) -> Option<f64> {
    RE_RATE
        .captures_iter(text)
        .filter(|caps| caps.get(2).is_none())
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .find(|rate| *rate > 0.0 && *rate <= 20.0)
}

fn first_term(text: &str) -> Option<u32> {
    RE_TERM
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .find(|years| TERM_YEARS.contains(years))
}

/// Splits on `.`, `!` or `?` followed by whitespace, so `6.25%` stays whole.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}…", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_single_family_transcript() {
        let analysis = KeywordExtractor::new().analyze(
            "Client wants a $450,000 conventional 30-year fixed loan on a single-family home",
        );
        let info = analysis.loan_info.unwrap();
        assert_eq!(info.loan_amount, Some(450_000.0));
        assert_eq!(info.loan_type.as_deref(), Some("Conventional"));
        assert_eq!(info.term, Some(30));
        assert_eq!(info.property_type.as_deref(), Some("Single Family Home"));
        assert!(info.rate.is_none());
    }

    #[test]
    fn test_rate_and_down_payment() {
        let info = KeywordExtractor::new()
            .analyze("They can put 20% down. We quoted 6.25% on a 15 year FHA loan for $310k.")
            .loan_info
            .unwrap();
        assert_eq!(info.rate, Some(6.25));
        assert_eq!(info.term, Some(15));
        assert_eq!(info.loan_type.as_deref(), Some("FHA"));
        assert_eq!(info.loan_amount, Some(310_000.0));
    }

    #[test]
    fn test_lowercase_va_is_not_a_loan_type() {
        let info = KeywordExtractor::new()
            .analyze("We talked about a condo near the va hospital.")
            .loan_info
            .unwrap();
        assert!(info.loan_type.is_none());
        assert_eq!(info.property_type.as_deref(), Some("Condo"));
    }

    #[test]
    fn test_nothing_determinable() {
        let analysis = KeywordExtractor::new().analyze("hello world");
        assert_eq!(analysis.summary.as_deref(), Some("hello world"));
        assert!(analysis.loan_info.is_none());
        assert!(analysis.key_points.is_none());
        assert!(analysis.action_items.is_none());
    }

    #[test]
    fn test_summary_key_points_and_actions() {
        let analysis = KeywordExtractor::new().analyze(
            "Maria called about buying her first home. She is looking at a townhouse for $380,000. \
             I will send her the pre-approval checklist. She needs to upload two pay stubs.",
        );
        assert_eq!(
            analysis.summary.as_deref(),
            Some("Maria called about buying her first home.")
        );
        assert_eq!(
            analysis.key_points.unwrap(),
            vec!["She is looking at a townhouse for $380,000.".to_string()]
        );
        assert_eq!(analysis.action_items.unwrap().len(), 2);
    }

    #[test]
    fn test_split_keeps_decimals() {
        assert_eq!(
            split_sentences("Rate is 6.25% today. Ok!"),
            vec!["Rate is 6.25% today.".to_string(), "Ok!".to_string()]
        );
    }

    #[tokio::test]
    async fn test_extract_never_fails() {
        let analysis = KeywordExtractor::new().extract("").await.unwrap();
        assert!(analysis.summary.is_none());
    }
}
