//! Engine settings.
//!
//! [`WidgetsSettings`] holds every plain-data option of the engine. It can be
//! built in code, or loaded from TOML:
//!
//! ```toml
//! root_element = "#app"
//! logs = true
//! reactive_props = true
//! writeback_delay_ms = 150
//!
//! [async_widgets]
//! chart = "widgets/chart"
//! ```
//!
//! Behavior functions and the capability factory are code, so they live in
//! [`WidgetsConfig`](crate::WidgetsConfig) instead.

use std::collections::BTreeMap;
use std::time::Duration;

use reinhardt_dom::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{ObserveError, ObserveResult};

/// Default selector of the observed root.
pub const DEFAULT_ROOT_ELEMENT: &str = "[data-widgets-root]";
/// Default marker attribute naming the widget.
pub const DEFAULT_WIDGET_ATTRIBUTE: &str = reinhardt_dom::builder::DEFAULT_WIDGET_ATTRIBUTE;
/// Default identity attribute written by the engine.
pub const DEFAULT_ID_ATTRIBUTE: &str = "data-widget-id";
/// Default instance id prefix.
pub const DEFAULT_ID_PREFIX: &str = "w_";
/// Default prop attribute prefix.
pub const DEFAULT_PROP_PREFIX: &str = reinhardt_dom::builder::DEFAULT_PROP_PREFIX;
/// Shortest random id suffix accepted.
pub const MIN_ID_LENGTH: usize = 6;

/// Plain-data engine options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetsSettings {
	/// Selector of the subtree root to observe.
	#[serde(alias = "rootElement")]
	pub root_element: String,

	/// Selector of bindable elements. Defaults to `[<widget_attribute>]`.
	///
	/// A lone attribute selector such as `[data-r]` also names the widget
	/// attribute unless `widget_attribute` is set to something else.
	pub selector: Option<String>,

	/// Attribute naming the widget to bind.
	#[serde(alias = "widgetAttribute")]
	pub widget_attribute: String,

	/// Attribute the engine stamps with the instance id.
	#[serde(alias = "idAttribute")]
	pub id_attribute: String,

	/// Prefix of generated instance ids.
	#[serde(alias = "idPrefix")]
	pub id_prefix: String,

	/// Length of the random part of instance ids.
	#[serde(alias = "idLength")]
	pub id_length: usize,

	/// Prefix of prop attributes.
	#[serde(alias = "propPrefix")]
	pub prop_prefix: String,

	/// Emit info-level lifecycle logs. Errors are always logged.
	pub logs: bool,

	/// Write prop changes back onto attributes and follow attribute changes.
	#[serde(alias = "reactiveProps")]
	pub reactive_props: bool,

	/// Debounce delay for prop writeback, in milliseconds.
	#[serde(alias = "writebackDelayMs")]
	pub writeback_delay_ms: Option<u64>,

	/// Widget name to loader reference.
	#[serde(alias = "asyncWidgets", alias = "async_components", alias = "asyncComponents")]
	pub async_widgets: BTreeMap<String, String>,
}

impl Default for WidgetsSettings {
	fn default() -> Self {
		Self {
			root_element: DEFAULT_ROOT_ELEMENT.to_string(),
			selector: None,
			widget_attribute: DEFAULT_WIDGET_ATTRIBUTE.to_string(),
			id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
			id_prefix: DEFAULT_ID_PREFIX.to_string(),
			id_length: MIN_ID_LENGTH,
			prop_prefix: DEFAULT_PROP_PREFIX.to_string(),
			logs: false,
			reactive_props: false,
			writeback_delay_ms: None,
			async_widgets: BTreeMap::new(),
		}
	}
}

impl WidgetsSettings {
	/// Parses settings from TOML. Missing keys keep their defaults.
	///
	/// # Errors
	///
	/// Returns [`ObserveError::Settings`] for malformed TOML or invalid values.
	pub fn from_toml_str(source: &str) -> ObserveResult<Self> {
		let settings: Self = toml::from_str(source)?;
		settings.validate()?;
		Ok(settings)
	}

	/// The marker selector, explicit or derived from the widget attribute.
	pub fn marker_selector(&self) -> String {
		self.selector
			.clone()
			.unwrap_or_else(|| format!("[{}]", self.widget_attribute))
	}

	/// The attribute the widget name is read from.
	///
	/// This is `widget_attribute`, except when it was left at its default and
	/// `selector` is a lone attribute selector: then the selector's attribute
	/// names the widget.
	pub fn name_attribute(&self) -> String {
		if self.widget_attribute != DEFAULT_WIDGET_ATTRIBUTE {
			return self.widget_attribute.clone();
		}
		self.selector
			.as_deref()
			.and_then(|source| Selector::parse(source).ok())
			.and_then(|selector| selector.sole_attribute().map(str::to_string))
			.unwrap_or_else(|| self.widget_attribute.clone())
	}

	/// The writeback debounce delay, if any.
	pub fn writeback_delay(&self) -> Option<Duration> {
		self.writeback_delay_ms.map(Duration::from_millis)
	}

	/// Checks the settings for consistency.
	///
	/// # Errors
	///
	/// Returns [`ObserveError::Settings`] for empty attribute names, an id
	/// length below [`MIN_ID_LENGTH`], or a prop prefix that would capture the
	/// marker or identity attribute, and [`ObserveError::InvalidSelector`] for
	/// selectors that do not parse.
	pub fn validate(&self) -> ObserveResult<()> {
		if self.widget_attribute.trim().is_empty() {
			return Err(ObserveError::Settings("widget_attribute is empty".to_string()));
		}
		if self.id_attribute.trim().is_empty() {
			return Err(ObserveError::Settings("id_attribute is empty".to_string()));
		}
		let name_attribute = self.name_attribute();
		if name_attribute.eq_ignore_ascii_case(&self.id_attribute) {
			return Err(ObserveError::Settings(
				"widget_attribute and id_attribute must differ".to_string(),
			));
		}
		if self.id_length < MIN_ID_LENGTH {
			return Err(ObserveError::Settings(format!(
				"id_length must be at least {}, got {}",
				MIN_ID_LENGTH, self.id_length
			)));
		}
		if self.prop_prefix.is_empty() {
			return Err(ObserveError::Settings("prop_prefix is empty".to_string()));
		}
		for attribute in [&name_attribute, &self.id_attribute] {
			if attribute.to_ascii_lowercase().starts_with(&self.prop_prefix) {
				return Err(ObserveError::Settings(format!(
					"prop_prefix '{}' would capture attribute '{}'",
					self.prop_prefix, attribute
				)));
			}
		}
		Selector::parse(&self.root_element)?;
		Selector::parse(&self.marker_selector())?;
		Ok(())
	}
}
