//! Payout amounts.
//!
//! Payout fields hold strings such as `"12.500 SBD"`. The amount is the
//! leading numeric part (optional sign, digits, optional fraction, optional
//! exponent); the unit is not checked.

use serde_json::{Map, Value};

use super::fields::{PENDING_PAYOUT, TOTAL_PAYOUT};
use crate::error::{Error, Result};

/// Parses the leading number of `raw`.
pub fn leading_amount(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - end - 1;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

fn amount(field: &'static str, value: Option<Value>) -> Result<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| Error::Payout {
            field,
            value: n.to_string(),
        }),
        Some(Value::String(raw)) => {
            leading_amount(&raw).ok_or(Error::Payout { field, value: raw })
        },
        Some(other) => Err(Error::Payout {
            field,
            value: other.to_string(),
        }),
        None => Err(Error::Payout {
            field,
            value: "missing".to_string(),
        }),
    }
}

/// Removes both payout fields from `doc` and returns their sum.
pub fn take_reward(doc: &mut Map<String, Value>) -> Result<f64> {
    let pending = amount(PENDING_PAYOUT, doc.remove(PENDING_PAYOUT))?;
    let paid = amount(TOTAL_PAYOUT, doc.remove(TOTAL_PAYOUT))?;
    Ok(pending + paid)
}

/// Sum of both payout fields of `doc`, leaving it untouched.
pub fn reward_of(doc: &Value) -> Result<f64> {
    let pending = amount(PENDING_PAYOUT, doc.get(PENDING_PAYOUT).cloned())?;
    let paid = amount(TOTAL_PAYOUT, doc.get(TOTAL_PAYOUT).cloned())?;
    Ok(pending + paid)
}
