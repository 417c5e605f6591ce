//! Request payload validation
//!
//! Payloads arrive as loosely typed JSON. Every required field is checked
//! before any model computation so that one error lists all problems.

use crate::error::{Error, Result};
use crate::types::DonationRecord;
use serde_json::{Map, Value};

const REQUIRED_FIELDS: [&str; 7] = [
    "amount",
    "donation_time",
    "donation_frequency_from_ip",
    "device_type",
    "geo_distance_from_campaign",
    "is_donor_anonymous",
    "campaign_age",
];

/// Parse a JSON payload into a donation record.
///
/// `donation_id` is optional. `donor_comment` must be present but may be
/// `null`, which is treated as empty.
pub fn parse_donation(payload: &Value) -> Result<DonationRecord> {
    let fields = payload
        .as_object()
        .ok_or_else(|| Error::Validation("payload must be a JSON object".to_string()))?;

    let mut missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|name| fields.get(*name).map_or(true, Value::is_null))
        .collect();
    // A null comment is allowed, an absent one is not
    if !fields.contains_key("donor_comment") {
        missing.push("donor_comment");
    }
    if !missing.is_empty() {
        return Err(Error::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let mut problems = Vec::new();
    let amount = collect(&mut problems, number(fields, "amount"));
    let donation_time = collect(&mut problems, text(fields, "donation_time"));
    let frequency = collect(&mut problems, count(fields, "donation_frequency_from_ip"));
    let device_type = collect(&mut problems, text(fields, "device_type"));
    let distance = collect(&mut problems, number(fields, "geo_distance_from_campaign"));
    let anonymous = collect(&mut problems, flag(fields, "is_donor_anonymous"));
    let campaign_age = collect(&mut problems, count(fields, "campaign_age"));
    let donation_id = collect(&mut problems, optional_text(fields, "donation_id"));
    let comment = collect(&mut problems, optional_text(fields, "donor_comment"));

    match (
        amount,
        donation_time,
        frequency,
        device_type,
        distance,
        anonymous,
        campaign_age,
        donation_id,
        comment,
    ) {
        (
            Some(amount),
            Some(donation_time),
            Some(donation_frequency_from_ip),
            Some(device_type),
            Some(geo_distance_from_campaign),
            Some(is_donor_anonymous),
            Some(campaign_age),
            Some(donation_id),
            Some(comment),
        ) => Ok(DonationRecord {
            donation_id,
            amount,
            donation_time,
            donor_comment: comment.unwrap_or_default(),
            donation_frequency_from_ip,
            device_type,
            geo_distance_from_campaign,
            is_donor_anonymous,
            campaign_age,
        }),
        _ => Err(Error::Validation(problems.join("; "))),
    }
}

/// Lenient boolean: `true`/`false` in any case, or `1`/`0`
pub fn coerce_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn collect<T>(problems: &mut Vec<String>, parsed: std::result::Result<T, String>) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(problem) => {
            problems.push(problem);
            None
        }
    }
}

fn number(fields: &Map<String, Value>, name: &str) -> std::result::Result<f64, String> {
    let value = match &fields[name] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("'{}' must be a number", name))?;

    if !value.is_finite() {
        return Err(format!("'{}' must be finite", name));
    }
    if value < 0.0 {
        return Err(format!("'{}' must not be negative, got {}", name, value));
    }
    Ok(value)
}

fn count(fields: &Map<String, Value>, name: &str) -> std::result::Result<u32, String> {
    let value = number(fields, name)?;
    if value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(format!("'{}' must be a whole number, got {}", name, value));
    }
    Ok(value as u32)
}

fn text(fields: &Map<String, Value>, name: &str) -> std::result::Result<String, String> {
    match &fields[name] {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::String(_) => Err(format!("'{}' must not be empty", name)),
        _ => Err(format!("'{}' must be a string", name)),
    }
}

fn optional_text(
    fields: &Map<String, Value>,
    name: &str,
) -> std::result::Result<Option<String>, String> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(format!("'{}' must be a string", name)),
    }
}

fn flag(fields: &Map<String, Value>, name: &str) -> std::result::Result<bool, String> {
    match &fields[name] {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => coerce_bool(s),
        _ => None,
    }
    .ok_or_else(|| format!("'{}' must be a boolean", name))
}
