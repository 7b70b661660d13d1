//! Builder for marked widget elements.
//!
//! Host code that injects widgets at runtime uses [`WidgetBuilder`] to create
//! a detached element carrying the widget marker and prefixed prop
//! attributes. Attaching it under an observed root is what triggers binding.

use crate::document::Document;
use crate::node::Element;

/// Default marker attribute naming the widget.
pub const DEFAULT_WIDGET_ATTRIBUTE: &str = "data-widget";

/// Default prefix for prop attributes.
pub const DEFAULT_PROP_PREFIX: &str = ":";

/// Builder for a detached widget element.
///
/// # Example
///
/// ```ignore
/// let element = WidgetBuilder::new()
///     .name("greeter")
///     .class("card")
///     .prop("name", "Ada")
///     .build(&document);
/// root.append_child(&element)?;
/// ```
#[derive(Debug, Clone)]
pub struct WidgetBuilder {
	tag: String,
	name: Option<String>,
	class: Option<String>,
	text: Option<String>,
	props: Vec<(String, String)>,
	widget_attribute: String,
	prop_prefix: String,
}

impl WidgetBuilder {
	/// Creates a builder for a `<div>` with the default attribute conventions.
	pub fn new() -> Self {
		Self {
			tag: "div".to_string(),
			name: None,
			class: None,
			text: None,
			props: Vec::new(),
			widget_attribute: DEFAULT_WIDGET_ATTRIBUTE.to_string(),
			prop_prefix: DEFAULT_PROP_PREFIX.to_string(),
		}
	}

	/// Sets the tag name.
	pub fn tag(mut self, tag: impl Into<String>) -> Self {
		self.tag = tag.into();
		self
	}

	/// Sets the widget name written to the marker attribute.
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Adds a CSS class.
	pub fn class(mut self, class: impl Into<String>) -> Self {
		self.class = Some(class.into());
		self
	}

	/// Sets the initial text content.
	pub fn text(mut self, text: impl Into<String>) -> Self {
		self.text = Some(text.into());
		self
	}

	/// Adds a prop, written as `<prefix><key>="<value>"`.
	pub fn prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.props.push((key.into(), value.into()));
		self
	}

	/// Adds several props.
	pub fn props<K, V>(mut self, props: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.props
			.extend(props.into_iter().map(|(key, value)| (key.into(), value.into())));
		self
	}

	/// Overrides the marker attribute name.
	pub fn widget_attribute(mut self, attribute: impl Into<String>) -> Self {
		self.widget_attribute = attribute.into();
		self
	}

	/// Overrides the prop attribute prefix.
	pub fn prop_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prop_prefix = prefix.into();
		self
	}

	/// Creates the detached element.
	pub fn build(self, document: &Document) -> Element {
		let element = document.create_element(&self.tag);

		if let Some(name) = &self.name {
			element.set_attribute(&self.widget_attribute, name);
		}
		if let Some(class) = &self.class {
			element.add_class(class);
		}
		if let Some(text) = &self.text {
			element.set_text_content(text);
		}
		for (key, value) in &self.props {
			element.set_attribute(&format!("{}{}", self.prop_prefix, key), value);
		}

		element
	}
}

impl Default for WidgetBuilder {
	fn default() -> Self {
		Self::new()
	}
}
