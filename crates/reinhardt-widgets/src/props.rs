//! Props extracted from prefixed element attributes.
//!
//! Every attribute whose name starts with the configured prefix (`:` by
//! default) becomes one prop: the remainder of the name is normalized with
//! [`normalize_key`] and the value is decoded with [`decode`].
//!
//! ```text
//! <div data-widget="greeter" :name="Ada" :max-items="3" :tags="['a','b']">
//!
//! Props { name: "Ada", max_items: 3, tags: ["a", "b"] }
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map;

use reinhardt_dom::Element;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::codec::{attribute_suffix, decode, normalize_key};

/// Typed prop values keyed by normalized prop name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
	values: BTreeMap<String, Value>,
}

impl Props {
	/// Creates an empty props object.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the value of `key`.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	/// Returns `key` deserialized into `T`, or `None` when absent or of another
	/// shape.
	///
	/// # Example
	///
	/// ```ignore
	/// let count: Option<u32> = props.get_as("count");
	/// ```
	pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		self.values
			.get(key)
			.and_then(|value| serde_json::from_value(value.clone()).ok())
	}

	/// Returns `key` when it holds a string.
	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.values.get(key).and_then(Value::as_str)
	}

	/// Inserts a value, returning the previous one.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.values.insert(key.into(), value.into())
	}

	/// Removes a value.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.values.remove(key)
	}

	/// Returns true when `key` is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.values.contains_key(key)
	}

	/// Number of props.
	pub fn len(&self) -> usize {
		self.values.len()
	}

	/// Returns true when there are no props.
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Iterates over props in key order.
	pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
		self.values.iter()
	}

	/// Iterates over prop keys in order.
	pub fn keys(&self) -> btree_map::Keys<'_, String, Value> {
		self.values.keys()
	}

	/// Deserializes all props into a typed struct.
	///
	/// # Errors
	///
	/// Returns the deserializer error when the props do not fit `T`.
	///
	/// # Example
	///
	/// ```ignore
	/// #[derive(Deserialize)]
	/// struct CounterProps {
	///     start: i64,
	///     #[serde(default)]
	///     step: Option<i64>,
	/// }
	///
	/// let props: CounterProps = ctx.props().snapshot().deserialize()?;
	/// ```
	pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		serde_json::from_value(self.to_value())
	}

	/// Returns the props as a JSON object.
	pub fn to_value(&self) -> Value {
		Value::Object(
			self.values
				.iter()
				.map(|(key, value)| (key.clone(), value.clone()))
				.collect::<Map<String, Value>>(),
		)
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			values: iter
				.into_iter()
				.map(|(key, value)| (key.into(), value.into()))
				.collect(),
		}
	}
}

impl<'a> IntoIterator for &'a Props {
	type Item = (&'a String, &'a Value);
	type IntoIter = btree_map::Iter<'a, String, Value>;

	fn into_iter(self) -> Self::IntoIter {
		self.values.iter()
	}
}

/// Mapping between prop keys and the attribute names they come from.
///
/// Attribute names are remembered per key so that writeback targets the same
/// attribute the prop was read from. Keys created at runtime are written as
/// `<prefix><key>` with `_` turned into `-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropAttributes {
	prefix: String,
	names: BTreeMap<String, String>,
}

impl PropAttributes {
	/// Creates an empty mapping for `prefix`.
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
			names: BTreeMap::new(),
		}
	}

	/// Reads every prefixed attribute of `element`.
	///
	/// # Arguments
	///
	/// * `element` - Element to read
	/// * `prefix` - Prop attribute prefix, `:` by default
	pub fn collect(element: &Element, prefix: &str) -> (Props, Self) {
		let mut mapping = Self::new(prefix);
		let mut props = Props::new();
		for (name, raw) in element.attributes() {
			if let Some(key) = mapping.key_for(&name) {
				props.insert(key.clone(), decode(&raw));
				mapping.names.insert(key, name);
			}
		}
		(props, mapping)
	}

	/// The prop attribute prefix.
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Returns the prop key for `attribute`, or `None` when it is not a prop
	/// attribute.
	pub fn key_for(&self, attribute: &str) -> Option<String> {
		attribute
			.strip_prefix(self.prefix.as_str())
			.filter(|rest| !rest.is_empty())
			.map(normalize_key)
	}

	/// Returns the attribute name that holds `key`.
	pub fn attribute_for(&self, key: &str) -> String {
		self.names
			.get(key)
			.cloned()
			.unwrap_or_else(|| format!("{}{}", self.prefix, attribute_suffix(key)))
	}

	/// Records that `key` lives in `attribute`.
	pub fn remember(&mut self, key: impl Into<String>, attribute: impl Into<String>) {
		self.names.insert(key.into(), attribute.into());
	}

	/// Every known `(key, attribute)` pair.
	pub fn known(&self) -> impl Iterator<Item = (&str, &str)> {
		self.names
			.iter()
			.map(|(key, name)| (key.as_str(), name.as_str()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use reinhardt_dom::{Document, WidgetBuilder};
	use rstest::{fixture, rstest};
	use serde::Deserialize;
	use serde_json::json;

	#[fixture]
	fn document() -> Document {
		Document::new()
	}

	#[rstest]
	fn test_collect_prefixed_attributes(document: Document) {
		let element = WidgetBuilder::new()
			.name("counter")
			.prop("start", "5")
			.prop("Max-Items", "10")
			.prop("label", "Clicks")
			.prop("tags", "['a', 'b']")
			.build(&document);
		element.set_attribute("class", "ignored");

		let (props, mapping) = PropAttributes::collect(&element, ":");

		assert_eq!(props.len(), 4);
		assert_eq!(props.get("start"), Some(&json!(5)));
		assert_eq!(props.get("max_items"), Some(&json!(10)));
		assert_eq!(props.get_str("label"), Some("Clicks"));
		assert_eq!(props.get("tags"), Some(&json!(["a", "b"])));
		assert_eq!(mapping.attribute_for("max_items"), ":max-items");
		assert_eq!(mapping.attribute_for("new_key"), ":new-key");
	}

	#[rstest]
	fn test_custom_prefix(document: Document) {
		let element = WidgetBuilder::new()
			.prop_prefix("data-prop-")
			.prop("open", "true")
			.build(&document);
		element.set_attribute(":ignored", "1");

		let (props, mapping) = PropAttributes::collect(&element, "data-prop-");

		assert_eq!(props.get("open"), Some(&json!(true)));
		assert!(!props.contains_key("ignored"));
		assert_eq!(mapping.key_for("data-prop-"), None);
		assert_eq!(mapping.key_for("data-widget"), None);
	}

	#[rstest]
	fn test_typed_access() {
		#[derive(Debug, Deserialize, PartialEq)]
		struct CounterProps {
			start: i64,
			#[serde(default)]
			step: Option<i64>,
		}

		let props: Props = [("start", json!(3))].into_iter().collect();

		assert_eq!(props.get_as::<i64>("start"), Some(3));
		assert_eq!(props.get_as::<String>("start"), None);
		assert_eq!(
			props.deserialize::<CounterProps>().unwrap(),
			CounterProps {
				start: 3,
				step: None
			}
		);
	}
}
