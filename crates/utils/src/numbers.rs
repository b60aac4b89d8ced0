use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parses a number out of loosely formatted export text.
///
/// Leading noise such as currency symbols or unit labels is skipped, and unit
/// suffixes are ignored ("12.5 USDT", "$1,234.56", "-0.12 USDT").
/// Separator rules:
/// - both `,` and `.` present: whichever appears first is a thousands separator
/// - only `,` present: it is the decimal point
///
/// Returns `0.0` for anything unparseable; never panics.
pub fn parse_flexible_number(raw: &str) -> f64 {
    let t = raw.trim();
    if t.is_empty() {
        return 0.0;
    }

    if let Ok(v) = t.parse::<f64>() {
        return if v.is_finite() { v } else { 0.0 };
    }

    let chars: Vec<char> = t.chars().collect();
    let Some(start) = chars.iter().position(|c| c.is_ascii_digit()) else {
        return 0.0;
    };

    // A '.' directly before the first digit belongs to the number (".5").
    let start = if start > 0 && chars[start - 1] == '.' {
        start - 1
    } else {
        start
    };

    let negative = chars[..start]
        .iter()
        .rev()
        .find(|c| !c.is_whitespace() && !is_currency_noise(**c))
        .map(|c| *c == '-')
        .unwrap_or(false)
        || t.starts_with('-')
        || (t.starts_with('(') && t.ends_with(')'));

    let body: String = chars[start..]
        .iter()
        .take_while(|c| c.is_ascii_digit() || **c == ',' || **c == '.')
        .collect();
    let body = body.trim_end_matches([',', '.']);

    let normalized = match (body.find(','), body.find('.')) {
        (Some(c), Some(d)) => {
            if c < d {
                body.replace(',', "")
            } else {
                body.replace('.', "").replace(',', ".")
            }
        }
        (Some(_), None) => body.replace(',', "."),
        _ => body.to_string(),
    };

    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if negative {
                -v
            } else {
                v
            }
        }
        _ => 0.0,
    }
}

fn is_currency_noise(c: char) -> bool {
    matches!(c, '$' | '€' | '£' | '¥' | '+') || c.is_alphabetic()
}

/// Reads a loosely typed JSON value (number, numeric string, null) as `f64`.
pub fn value_to_f64(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().filter(|x| x.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_flexible_number(s),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    }
}

/// Serde adapter for JSON fields that may arrive as numbers or strings.
///
/// Absent, null or unparseable values become `None`.
pub fn deserialize_flex_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(other) => Some(value_to_f64(&other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_flexible_number("12.5"), 12.5);
        assert_eq!(parse_flexible_number("-3"), -3.0);
        assert_eq!(parse_flexible_number("1e-3"), 0.001);
    }

    #[test]
    fn separators() {
        assert_eq!(parse_flexible_number("1,234.56"), 1234.56);
        assert_eq!(parse_flexible_number("1.234,56"), 1234.56);
        assert_eq!(parse_flexible_number("12,5"), 12.5);
    }

    #[test]
    fn noise_and_units() {
        assert_eq!(parse_flexible_number("$1,234.56"), 1234.56);
        assert_eq!(parse_flexible_number("12.5 USDT"), 12.5);
        assert_eq!(parse_flexible_number("-0.12 USDT"), -0.12);
        assert_eq!(parse_flexible_number("USDT -4.5"), -4.5);
        assert_eq!(parse_flexible_number("0.015 BTC"), 0.015);
    }

    #[test]
    fn garbage_is_zero() {
        assert_eq!(parse_flexible_number(""), 0.0);
        assert_eq!(parse_flexible_number("--"), 0.0);
        assert_eq!(parse_flexible_number("n/a"), 0.0);
        assert_eq!(parse_flexible_number("NaN"), 0.0);
        assert_eq!(parse_flexible_number("inf"), 0.0);
    }

    #[test]
    fn json_values() {
        assert_eq!(value_to_f64(&json!(3.5)), 3.5);
        assert_eq!(value_to_f64(&json!("2,5")), 2.5);
        assert_eq!(value_to_f64(&json!(null)), 0.0);
        assert_eq!(value_to_f64(&json!(true)), 0.0);
    }
}
