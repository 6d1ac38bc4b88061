#![forbid(unsafe_code)]

//! Primitive codec: URL text to typed values and back.
//!
//! Decoding is total. `"true"`/`"false"` become booleans, text matching
//! `^[+-]?\d+(\.\d+)?$` becomes a number, anything else stays a string.

use crate::value::Value;

/// Decode raw query text. `None` (key not present) stays `None`.
#[must_use]
pub fn decode(raw: Option<&str>) -> Option<Value> {
    let raw = raw?;
    match raw {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }
    if is_numeric_literal(raw) {
        if let Ok(n) = raw.parse::<f64>() {
            if !n.is_nan() {
                return Some(Value::Num(n));
            }
        }
    }
    Some(Value::Str(raw.to_owned()))
}

/// Encode a present value into query text.
#[must_use]
pub fn encode(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Num(n) => encode_number(*n),
    }
}

fn encode_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_owned()
    } else if n == 0.0 {
        // Collapse -0.
        "0".to_owned()
    } else {
        n.to_string()
    }
}

/// `^[+-]?\d+(\.\d+)?$` over ASCII digits.
fn is_numeric_literal(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (int, frac) = match body.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (body, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.is_none_or(all_digits)
}
