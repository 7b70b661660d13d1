//! Prop codec.
//!
//! Prop attributes are plain strings. [`decode`] turns them into typed
//! [`serde_json::Value`]s, [`encode`] turns values back into attribute text for
//! the writeback path, and [`normalize_key`] maps an attribute name remainder to
//! a snake_case prop key.
//!
//! ## Decoding rules
//!
//! | Input                         | Result                               |
//! |-------------------------------|--------------------------------------|
//! | `{...}` / `[...]`             | JSON, with `'` read as `"`           |
//! | `true` / `false` / `null`     | boolean / null                       |
//! | a finite number               | integer when exact, float otherwise  |
//! | anything else (including `""`)| the original string                  |
//!
//! Numbers form a single numeric type: an integral float such as `5.0`
//! decodes as the integer `5`. A float keeps its numeric value through
//! `decode(encode(v))`, not its integer-or-float representation.
//!
//! String elements of decoded arrays are decoded again, so `"['1', 'true']"`
//! becomes `[1, true]`. Structured text that fails to parse is kept as the
//! original string.

use serde_json::{Number, Value};

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Decodes a raw attribute value.
///
/// # Example
///
/// ```ignore
/// assert_eq!(decode("5"), json!(5));
/// assert_eq!(decode("{'a': 1}"), json!({"a": 1}));
/// assert_eq!(decode(""), json!(""));
/// ```
pub fn decode(raw: &str) -> Value {
	if is_structured(raw) {
		return match serde_json::from_str::<Value>(&raw.replace('\'', "\"")) {
			Ok(value) => decode_elements(value),
			Err(error) => {
				tracing::debug!(raw, %error, "structured prop did not parse, keeping text");
				Value::String(raw.to_string())
			}
		};
	}

	match raw {
		"true" => Value::Bool(true),
		"false" => Value::Bool(false),
		"null" => Value::Null,
		_ => decode_number(raw).unwrap_or_else(|| Value::String(raw.to_string())),
	}
}

/// Encodes a value as attribute text.
///
/// Booleans, null, numbers and strings survive a `decode(encode(v))` round
/// trip, except strings that themselves look like another literal
/// (`"true"`, `"5"`). Integral floats come back as integers of equal value.
pub fn encode(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Null => "null".to_string(),
		Value::Bool(flag) => flag.to_string(),
		Value::Number(number) => number.to_string(),
		// Serializing a `Value` cannot fail.
		Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
	}
}

/// Normalizes an attribute name remainder to a prop key.
///
/// Keys are lower-cased and `-` becomes `_`, so `:max-items` yields
/// `max_items`.
pub fn normalize_key(name: &str) -> String {
	name.trim().to_ascii_lowercase().replace('-', "_")
}

/// Attribute name remainder for a prop key, the inverse of [`normalize_key`].
pub fn attribute_suffix(key: &str) -> String {
	key.replace('_', "-")
}

fn is_structured(raw: &str) -> bool {
	(raw.starts_with('{') && raw.ends_with('}')) || (raw.starts_with('[') && raw.ends_with(']'))
}

fn decode_elements(value: Value) -> Value {
	match value {
		Value::Array(items) => Value::Array(
			items
				.into_iter()
				.map(|item| match item {
					Value::String(text) => decode(&text),
					Value::Array(_) => decode_elements(item),
					other => other,
				})
				.collect(),
		),
		other => other,
	}
}

fn decode_number(raw: &str) -> Option<Value> {
	let trimmed = raw.trim();
	if trimmed.is_empty() {
		return None;
	}
	if let Ok(integer) = trimmed.parse::<i64>() {
		return Some(Value::Number(integer.into()));
	}

	// "inf" and "NaN" parse as floats but stay strings.
	let float = trimmed.parse::<f64>().ok().filter(|value| value.is_finite())?;
	if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER {
		return Some(Value::Number((float as i64).into()));
	}
	Number::from_f64(float).map(Value::Number)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case("5", json!(5))]
	#[case("-12", json!(-12))]
	#[case("3.25", json!(3.25))]
	#[case(" 7 ", json!(7))]
	#[case("1e3", json!(1000))]
	#[case("true", json!(true))]
	#[case("false", json!(false))]
	#[case("null", json!(null))]
	#[case("hello", json!("hello"))]
	#[case("", json!(""))]
	#[case("  ", json!("  "))]
	#[case("12px", json!("12px"))]
	#[case("inf", json!("inf"))]
	#[case("NaN", json!("NaN"))]
	#[case("True", json!("True"))]
	fn test_decode_scalars(#[case] raw: &str, #[case] expected: Value) {
		assert_eq!(decode(raw), expected);
	}

	#[rstest]
	#[case("{'a': 1}", json!({"a": 1}))]
	#[case("{\"title\": \"Hi\", \"open\": true}", json!({"title": "Hi", "open": true}))]
	#[case("[1, 2, 3]", json!([1, 2, 3]))]
	#[case("['1', 'true', 'x']", json!([1, true, "x"]))]
	#[case("[['2'], {'k': '3'}]", json!([[2], {"k": "3"}]))]
	#[case("[]", json!([]))]
	fn test_decode_structured(#[case] raw: &str, #[case] expected: Value) {
		assert_eq!(decode(raw), expected);
	}

	#[rstest]
	#[case("{not json}")]
	#[case("[1, 2")]
	fn test_malformed_structured_text_is_kept(#[case] raw: &str) {
		assert_eq!(decode(raw), Value::String(raw.to_string()));
	}

	#[rstest]
	#[case(json!(true), "true")]
	#[case(json!(null), "null")]
	#[case(json!(42), "42")]
	#[case(json!(0.5), "0.5")]
	#[case(json!("Ada"), "Ada")]
	#[case(json!([1, "a"]), "[1,\"a\"]")]
	#[case(json!({"a": 1}), "{\"a\":1}")]
	fn test_encode(#[case] value: Value, #[case] expected: &str) {
		assert_eq!(encode(&value), expected);
	}

	#[rstest]
	#[case(json!(5.0), json!(5))]
	#[case(json!(-2.0), json!(-2))]
	#[case(json!(0.5), json!(0.5))]
	#[case(json!(1.0e20), json!(1.0e20))]
	fn test_floats_round_trip_by_value(#[case] value: Value, #[case] expected: Value) {
		assert_eq!(decode(&encode(&value)), expected);
	}

	#[rstest]
	#[case("name", "name")]
	#[case("max-items", "max_items")]
	#[case("Max-Items", "max_items")]
	fn test_normalize_key(#[case] name: &str, #[case] expected: &str) {
		assert_eq!(normalize_key(name), expected);
		assert_eq!(attribute_suffix(&normalize_key(name)), name.to_ascii_lowercase());
	}

	proptest! {
		#[test]
		fn prop_integers_round_trip(value in any::<i64>()) {
			let encoded = encode(&json!(value));
			prop_assert_eq!(decode(&encoded), json!(value));
		}

		#[test]
		fn prop_floats_keep_their_value(value in -1.0e12f64..1.0e12f64) {
			let decoded = decode(&encode(&json!(value)));
			prop_assert_eq!(decoded.as_f64(), Some(value));
			if value.fract() == 0.0 {
				prop_assert!(decoded.is_i64());
			}
		}

		#[test]
		fn prop_booleans_round_trip(value in any::<bool>()) {
			prop_assert_eq!(decode(&encode(&json!(value))), json!(value));
		}

		#[test]
		fn prop_plain_words_decode_to_themselves(word in "[a-zA-Z][a-zA-Z ]{0,12}") {
			prop_assume!(!matches!(word.as_str(), "true" | "false" | "null"));
			prop_assert_eq!(decode(&word), Value::String(word.clone()));
		}
	}
}
