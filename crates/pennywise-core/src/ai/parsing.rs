//! Parsing and validation of model responses
//!
//! Models wrap JSON in code fences and sometimes add prose around it, so
//! every response goes through the same steps: strip fences, locate the
//! JSON object, parse it, then check each field against its contract.
//! Nothing reaches a typed result without passing that last step.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Error, Result};
use crate::reference::{ReferenceData, ReferenceKind};

use super::types::{ActionItem, AnalysisReport, ExtractionResult, Priority};

/// Longest raw excerpt carried in errors and logs
const EXCERPT_LEN: usize = 200;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[\w+-]*[ \t]*\r?\n?(.*?)\r?\n?[ \t]*```\s*$").expect("valid regex")
    })
}

/// Remove a surrounding code fence (plain or language-tagged).
///
/// Text without a surrounding fence is returned unchanged.
pub fn strip_code_fences(text: &str) -> &str {
    match fence_regex().captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
}

/// Truncate raw model output for error messages
fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_LEN).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Strip fences and parse the JSON object in a response
fn parse_object(response: &str) -> Result<Map<String, Value>> {
    let body = strip_code_fences(response).trim();

    let start = body.find('{');
    let end = body.rfind('}');
    let json_str = match (start, end) {
        (Some(s), Some(e)) if s < e => &body[s..=e],
        _ => {
            warn!(raw = %excerpt(response), "No JSON object in model response");
            return Err(Error::MalformedOutput(format!(
                "No JSON found in model response | Raw: {}",
                excerpt(response)
            )));
        }
    };

    match serde_json::from_str::<Value>(json_str) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::MalformedOutput(format!(
            "Model response is not a JSON object | Raw: {}",
            excerpt(json_str)
        ))),
        Err(e) => {
            warn!(error = %e, raw = %excerpt(json_str), "Invalid JSON in model response");
            Err(Error::MalformedOutput(format!(
                "Invalid JSON from model: {} | Raw: {}",
                e,
                excerpt(json_str)
            )))
        }
    }
}

/// Parse an extraction response and enforce the reference lists.
///
/// Constrained values that are not an exact member of their list are reset
/// to empty. A list that was empty when the request was built imposes no
/// constraint, matching the free-text fallback in the prompt.
pub fn parse_extraction(response: &str, reference: &ReferenceData) -> Result<ExtractionResult> {
    let obj = parse_object(response)?;

    let name = optional_string(&obj, "name")?.unwrap_or_default();
    let amount = parse_amount(obj.get("amount"))?;
    let date = parse_date(obj.get("date"));

    Ok(ExtractionResult {
        name: name.trim().to_string(),
        amount,
        date,
        category: constrained(&obj, reference, ReferenceKind::Category),
        payment_app: constrained(&obj, reference, ReferenceKind::PaymentApp),
        bank_name: constrained(&obj, reference, ReferenceKind::Bank),
    })
}

/// Pull the amount out of printed text such as `₹12,500.00`, `Rs. 450`
/// or `450/-`.
///
/// `None` when the text holds no digits at all; the inner `None` when the
/// numeric token does not parse.
fn amount_from_text(text: &str) -> Option<Option<f64>> {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let marker_re = MARKER
        .get_or_init(|| Regex::new(r"(?i)^\s*(?:₹|rs\.?|inr)\s*").expect("valid regex"));
    let number_re =
        NUMBER.get_or_init(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("valid regex"));

    let trimmed = text.trim();
    let unmarked = marker_re.replace(trimmed, "");
    let body = unmarked.trim_end().trim_end_matches("/-");

    let token = number_re.find(body)?;
    let digits: String = token.as_str().chars().filter(|c| *c != ',').collect();
    Some(digits.parse::<f64>().ok())
}

fn parse_amount(value: Option<&Value>) -> Result<Option<f64>> {
    let amount = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => match amount_from_text(s) {
            Some(parsed) => Some(parsed.ok_or_else(|| {
                Error::validation("amount", format!("'{}' is not a number", s))
            })?),
            None => return Ok(None),
        },
        Some(other) => {
            return Err(Error::validation(
                "amount",
                format!("expected a number, got {}", other),
            ))
        }
    };

    match amount {
        Some(a) if !a.is_finite() => Err(Error::validation("amount", "must be finite")),
        Some(a) if a < 0.0 => Err(Error::validation(
            "amount",
            format!("{} is negative", a),
        )),
        other => Ok(other),
    }
}

/// Dates the model cannot read are dropped rather than failing the scan
fn parse_date(value: Option<&Value>) -> Option<NaiveDate> {
    let raw = value?.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(field = "date", value = %raw, "Discarding unparseable date");
            None
        }
    }
}

fn constrained(obj: &Map<String, Value>, reference: &ReferenceData, kind: ReferenceKind) -> String {
    let field = kind.field();
    let value = match obj.get(field) {
        Some(Value::String(s)) => s.trim(),
        None | Some(Value::Null) => return String::new(),
        Some(other) => {
            warn!(field, value = %other, "Non-string value for constrained field, clearing");
            return String::new();
        }
    };

    if value.is_empty() {
        return String::new();
    }
    if reference.entries(kind).is_empty() || reference.contains(kind, value) {
        return value.to_string();
    }

    warn!(field, value = %value, "Value not in reference list, clearing");
    String::new()
}

/// Parse an analysis response into a fully-validated report
pub fn parse_analysis(response: &str) -> Result<AnalysisReport> {
    let obj = parse_object(response)?;

    let health_score = parse_health_score(obj.get("healthScore"))?;
    let score_justification = required_string(&obj, "scoreJustification")?;
    let observations = required_array(&obj, "observations")?
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                Error::validation(format!("observations[{}]", i), "expected a string")
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let action_items = required_array(&obj, "actionItems")?
        .iter()
        .enumerate()
        .map(|(i, v)| parse_action_item(i, v))
        .collect::<Result<Vec<_>>>()?;
    let positive_reinforcement = required_string(&obj, "positiveReinforcement")?;
    let risk_assessment = required_string(&obj, "riskAssessment")?;

    Ok(AnalysisReport {
        health_score,
        score_justification,
        observations,
        action_items,
        positive_reinforcement,
        risk_assessment,
    })
}

fn parse_health_score(value: Option<&Value>) -> Result<u8> {
    let score = match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::validation("healthScore", "not a number"))?,
        None | Some(Value::Null) => return Err(Error::validation("healthScore", "missing")),
        Some(other) => {
            return Err(Error::validation(
                "healthScore",
                format!("expected an integer, got {}", other),
            ))
        }
    };

    if !score.is_finite() || score.fract() != 0.0 {
        return Err(Error::validation(
            "healthScore",
            format!("{} is not an integer", score),
        ));
    }
    if !(0.0..=100.0).contains(&score) {
        return Err(Error::validation(
            "healthScore",
            format!("{} is outside 0-100", score),
        ));
    }
    Ok(score as u8)
}

fn parse_action_item(index: usize, value: &Value) -> Result<ActionItem> {
    let field = |name: &str| format!("actionItems[{}].{}", index, name);
    let obj = value
        .as_object()
        .ok_or_else(|| Error::validation(format!("actionItems[{}]", index), "expected an object"))?;

    let text = |name: &str| -> Result<String> {
        obj.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::validation(field(name), "missing"))
    };

    let title = text("title")?;
    let description = text("description")?;
    let priority = text("priority")?
        .parse::<Priority>()
        .map_err(|reason| Error::validation(field("priority"), reason))?;

    Ok(ActionItem {
        title,
        description,
        priority,
    })
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> Result<Option<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(Error::validation(field, "expected a string")),
    }
}

fn required_string(obj: &Map<String, Value>, field: &str) -> Result<String> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        None | Some(Value::Null) => Err(Error::validation(field, "missing")),
        Some(_) => Err(Error::validation(field, "expected a string")),
    }
}

fn required_array<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a Vec<Value>> {
    match obj.get(field) {
        Some(Value::Array(items)) => Ok(items),
        None | Some(Value::Null) => Err(Error::validation(field, "missing")),
        Some(_) => Err(Error::validation(field, "expected an array")),
    }
}
