//! Fixed-precision rounding of serialized output.

use serde_json::{Number, Value};

/// Rounds `value` to `decimals` places, returning an integer number when
/// the rounded value has no fractional part.
#[allow(clippy::cast_possible_truncation)]
fn round_number(value: f64, decimals: u32) -> Option<Number> {
    let places = usize::try_from(decimals).unwrap_or(usize::MAX).min(17);
    let rounded: f64 = format!("{value:.places$}").parse().ok()?;

    if rounded.fract() == 0.0 && rounded.abs() < 9.0e15 {
        return Some(Number::from(rounded as i64));
    }
    Number::from_f64(rounded)
}

/// Rounds every non-integer number in `value` to `decimals` places.
///
/// Integers and integral floats are left untouched.
pub fn round_numbers(value: &mut Value, decimals: u32) {
    match value {
        Value::Number(number) => {
            if number.is_f64()
                && let Some(float) = number.as_f64()
                && float.is_finite()
                && float.fract() != 0.0
                && let Some(rounded) = round_number(float, decimals)
            {
                *number = rounded;
            }
        }
        Value::Array(items) => {
            for item in items {
                round_numbers(item, decimals);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                round_numbers(item, decimals);
            }
        }
        Value::Null | Value::Bool(_) | Value::String(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rounds_floats_only() {
        let mut value = json!({
            "location": [14.505_812_3, 46.051_499_9],
            "size": 160,
            "depth": 2.0,
            "name": "Center 1.23456",
        });
        round_numbers(&mut value, 4);
        assert_eq!(
            value,
            json!({
                "location": [14.5058, 46.0515],
                "size": 160,
                "depth": 2.0,
                "name": "Center 1.23456",
            })
        );
    }

    #[test]
    fn values_rounding_to_whole_become_integers() {
        let mut value = json!([0.999_99, -3.000_01]);
        round_numbers(&mut value, 2);
        assert_eq!(serde_json::to_string(&value).unwrap(), "[1,-3]");
    }

    #[test]
    fn zero_decimals_drop_fractions() {
        let mut value = json!({ "cs": 0.0009 });
        round_numbers(&mut value, 0);
        assert_eq!(value, json!({ "cs": 0 }));
    }
}
