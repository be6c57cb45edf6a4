//! Structured call analysis produced by the extraction adapter.
//!
//! Models are asked for bare numbers but do not always comply, so the
//! deserializers here accept `450000`, `"450000"` and `"$450,000"` alike.
//! Anything a model leaves out, nulls, or answers with an empty or
//! non-numeric string ("N/A") becomes `None`: absent means "not determinable
//! from this call", never zero. Values of the wrong JSON type (an object where
//! a list belongs) are errors, which surface as a malformed extraction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanInfo {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub loan_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount", skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount", skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    /// Term in years.
    #[serde(default, deserialize_with = "lenient::years", skip_serializing_if = "Option::is_none")]
    pub term: Option<u32>,
}

impl LoanInfo {
    pub fn is_empty(&self) -> bool {
        self.loan_type.is_none()
            && self.loan_amount.is_none()
            && self.property_type.is_none()
            && self.rate.is_none()
            && self.term.is_none()
    }

    /// Every field needed for an LOS submission was determined.
    pub fn is_complete(&self) -> bool {
        self.loan_type.is_some()
            && self.loan_amount.is_some()
            && self.property_type.is_some()
            && self.rate.is_some()
            && self.term.is_some()
    }
}

/// The four sections requested from the extraction model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub key_points: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub action_items: Option<Vec<String>>,
    #[serde(default)]
    pub loan_info: Option<LoanInfo>,
}

impl CallAnalysis {
    /// Collapses an all-empty loan info object to `None`.
    pub fn normalized(mut self) -> Self {
        if self.loan_info.as_ref().is_some_and(LoanInfo::is_empty) {
            self.loan_info = None;
        }
        self
    }
}

/// Parses a free-form numeric answer: `"$450,000"`, `"6.25%"`, `"450k"`,
/// `"1.2 million"`. Returns `None` when no number is present.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let lowered = raw.trim().to_ascii_lowercase();
    let (body, multiplier) = if let Some(rest) = lowered.strip_suffix("million") {
        (rest, 1_000_000.0)
    } else if let Some(rest) = lowered.strip_suffix('m') {
        (rest, 1_000_000.0)
    } else if let Some(rest) = lowered.strip_suffix('k') {
        (rest, 1_000.0)
    } else {
        (lowered.as_str(), 1.0)
    };

    let cleaned: String = body
        .trim()
        .trim_start_matches("usd")
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v * multiplier)
}

mod lenient {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;

    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn non_empty(s: &str) -> Option<String> {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(non_empty(&s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(D::Error::custom(format!(
                "expected text, found {}",
                type_name(&other)
            ))),
        }
    }

    pub fn list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.extend(non_empty(&s)),
                        Value::Number(n) => out.push(n.to_string()),
                        other => {
                            return Err(D::Error::custom(format!(
                                "expected list of text, found {} item",
                                type_name(&other)
                            )))
                        }
                    }
                }
                Ok(Some(out))
            }
            other => Err(D::Error::custom(format!(
                "expected list, found {}",
                type_name(&other)
            ))),
        }
    }

    pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(n.as_f64().filter(|v| v.is_finite())),
            Value::String(s) => Ok(super::parse_number(&s)),
            other => Err(D::Error::custom(format!(
                "expected number, found {}",
                type_name(&other)
            ))),
        }
    }

    pub fn years<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Number(n) => {
                if let Some(whole) = n.as_u64() {
                    return u32::try_from(whole)
                        .map(Some)
                        .map_err(|_| D::Error::custom(format!("term {} out of range", whole)));
                }
                match n.as_f64() {
                    Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) => {
                        Ok(Some(v as u32))
                    }
                    _ => Err(D::Error::custom(format!(
                        "expected whole number of years, found {}",
                        n
                    ))),
                }
            }
            Value::String(s) => {
                let digits: String = s
                    .trim()
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                Ok(digits.parse::<u32>().ok())
            }
            other => Err(D::Error::custom(format!(
                "expected number of years, found {}",
                type_name(&other)
            ))),
        }
    }
}
