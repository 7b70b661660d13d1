//! Dispatcher configuration.
//!
//! [`WidgetsConfig`] bundles the plain-data [`WidgetsSettings`] with the code
//! the engine runs: eager behaviors, the async loader and the capability
//! factory.
//!
//! # Example
//!
//! ```ignore
//! let config = WidgetsConfig::builder()
//!     .root_element("#app")
//!     .logs(true)
//!     .widget("greeter", |ctx, _helpers| {
//!         let name: String = ctx.props().get_as("name").unwrap_or_default();
//!         ctx.element().append_text(&format!("Hello, {}", name))?;
//!         Ok(None)
//!     })
//!     .async_widget("chart", "widgets/chart")
//!     .loader(|reference| {
//!         let reference = reference.to_string();
//!         async move { load_chart(&reference).await }
//!     })
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use futures::FutureExt;

use crate::context::WidgetContext;
use crate::error::{ObserveResult, ResolveError, WidgetResult};
use crate::helpers::Helpers;
use crate::instance::{Behavior, CapabilityFactory, Teardown};
use crate::resolver::{HandlerResolver, Loader};
use crate::settings::WidgetsSettings;

/// Everything a [`Dispatcher`](crate::Dispatcher) needs.
pub struct WidgetsConfig<C = Helpers> {
	pub(crate) settings: WidgetsSettings,
	pub(crate) widgets: HashMap<String, Behavior<C>>,
	pub(crate) loader: Option<Loader<C>>,
	pub(crate) plugins: CapabilityFactory<C>,
}

impl WidgetsConfig<Helpers> {
	/// Starts a builder whose behaviors receive [`Helpers`].
	pub fn builder() -> WidgetsConfigBuilder<Helpers> {
		WidgetsConfigBuilder::new(Helpers::factory())
	}
}

impl<C: 'static> WidgetsConfig<C> {
	/// Starts a builder with a custom capability factory.
	///
	/// # Arguments
	///
	/// * `plugins` - Called once per instance, before the behavior runs
	pub fn builder_with(plugins: impl Fn(&WidgetContext) -> C + 'static) -> WidgetsConfigBuilder<C> {
		WidgetsConfigBuilder::new(Rc::new(plugins))
	}

	/// The plain-data settings.
	pub fn settings(&self) -> &WidgetsSettings {
		&self.settings
	}

	/// Returns true when `name` has an eager behavior.
	pub fn has_widget(&self, name: &str) -> bool {
		self.widgets.contains_key(name)
	}

	pub(crate) fn into_parts(self) -> (WidgetsSettings, HandlerResolver<C>, CapabilityFactory<C>) {
		let references = self
			.settings
			.async_widgets
			.iter()
			.map(|(name, reference)| (name.clone(), reference.clone()))
			.collect();
		let resolver = HandlerResolver::new(self.widgets, references, self.loader);
		(self.settings, resolver, self.plugins)
	}
}

impl<C> fmt::Debug for WidgetsConfig<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut widgets: Vec<&String> = self.widgets.keys().collect();
		widgets.sort();
		f.debug_struct("WidgetsConfig")
			.field("settings", &self.settings)
			.field("widgets", &widgets)
			.field("has_loader", &self.loader.is_some())
			.finish()
	}
}

/// Builder for [`WidgetsConfig`].
pub struct WidgetsConfigBuilder<C> {
	settings: WidgetsSettings,
	widgets: HashMap<String, Behavior<C>>,
	loader: Option<Loader<C>>,
	plugins: CapabilityFactory<C>,
}

impl<C: 'static> WidgetsConfigBuilder<C> {
	fn new(plugins: CapabilityFactory<C>) -> Self {
		Self {
			settings: WidgetsSettings::default(),
			widgets: HashMap::new(),
			loader: None,
			plugins,
		}
	}

	/// Replaces all plain-data settings, keeping registered code.
	pub fn settings(mut self, settings: WidgetsSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Selector of the observed root.
	pub fn root_element(mut self, selector: impl Into<String>) -> Self {
		self.settings.root_element = selector.into();
		self
	}

	/// Selector of bindable elements.
	pub fn selector(mut self, selector: impl Into<String>) -> Self {
		self.settings.selector = Some(selector.into());
		self
	}

	/// Marker attribute naming the widget.
	pub fn widget_attribute(mut self, attribute: impl Into<String>) -> Self {
		self.settings.widget_attribute = attribute.into();
		self
	}

	/// Identity attribute written by the engine.
	pub fn id_attribute(mut self, attribute: impl Into<String>) -> Self {
		self.settings.id_attribute = attribute.into();
		self
	}

	/// Prefix of generated instance ids.
	pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.settings.id_prefix = prefix.into();
		self
	}

	/// Prefix of prop attributes.
	pub fn prop_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.settings.prop_prefix = prefix.into();
		self
	}

	/// Enables info-level lifecycle logs.
	pub fn logs(mut self, enabled: bool) -> Self {
		self.settings.logs = enabled;
		self
	}

	/// Enables prop writeback and attribute following.
	pub fn reactive_props(mut self, enabled: bool) -> Self {
		self.settings.reactive_props = enabled;
		self
	}

	/// Debounces prop writeback by `delay`; `None` writes back immediately.
	///
	/// The delay is kept in whole milliseconds. A non-zero delay below one
	/// millisecond rounds up to one, and delays too long for `u64`
	/// milliseconds saturate.
	pub fn writeback_delay(mut self, delay: impl Into<Option<Duration>>) -> Self {
		self.settings.writeback_delay_ms = delay.into().map(delay_millis);
		self
	}

	/// Registers an eager behavior.
	pub fn widget<F>(mut self, name: impl Into<String>, behavior: F) -> Self
	where
		F: Fn(&WidgetContext, &C) -> WidgetResult<Option<Teardown>> + 'static,
	{
		self.widgets.insert(name.into(), Rc::new(behavior));
		self
	}

	/// Alias of [`widget`](Self::widget).
	pub fn component<F>(self, name: impl Into<String>, behavior: F) -> Self
	where
		F: Fn(&WidgetContext, &C) -> WidgetResult<Option<Teardown>> + 'static,
	{
		self.widget(name, behavior)
	}

	/// Registers several eager behaviors.
	pub fn widgets(mut self, widgets: impl IntoIterator<Item = (String, Behavior<C>)>) -> Self {
		self.widgets.extend(widgets);
		self
	}

	/// Maps a widget name to a loader reference.
	pub fn async_widget(mut self, name: impl Into<String>, reference: impl Into<String>) -> Self {
		self.settings
			.async_widgets
			.insert(name.into(), reference.into());
		self
	}

	/// Maps several widget names to loader references.
	pub fn async_widgets<N, R>(mut self, widgets: impl IntoIterator<Item = (N, R)>) -> Self
	where
		N: Into<String>,
		R: Into<String>,
	{
		self.settings.async_widgets.extend(
			widgets
				.into_iter()
				.map(|(name, reference)| (name.into(), reference.into())),
		);
		self
	}

	/// Alias of [`async_widget`](Self::async_widget).
	pub fn async_component(self, name: impl Into<String>, reference: impl Into<String>) -> Self {
		self.async_widget(name, reference)
	}

	/// Replaces the capability factory.
	pub fn plugins(mut self, factory: impl Fn(&WidgetContext) -> C + 'static) -> Self {
		self.plugins = Rc::new(factory);
		self
	}

	/// Alias of [`plugins`](Self::plugins).
	pub fn helpers(self, factory: impl Fn(&WidgetContext) -> C + 'static) -> Self {
		self.plugins(factory)
	}

	/// Sets the loader used for names without an eager behavior.
	pub fn loader<F, Fut>(mut self, loader: F) -> Self
	where
		F: Fn(&str) -> Fut + 'static,
		Fut: Future<Output = Result<Behavior<C>, ResolveError>> + 'static,
	{
		self.loader = Some(Rc::new(move |reference: &str| loader(reference).boxed_local()));
		self
	}

	/// Validates and builds the config.
	///
	/// # Errors
	///
	/// Returns the settings validation error.
	pub fn build(self) -> ObserveResult<WidgetsConfig<C>> {
		self.settings.validate()?;
		for name in self.settings.async_widgets.keys() {
			if self.widgets.contains_key(name) {
				tracing::warn!(widget = %name, "widget is both eager and async, the eager behavior wins");
			}
		}
		Ok(WidgetsConfig {
			settings: self.settings,
			widgets: self.widgets,
			loader: self.loader,
			plugins: self.plugins,
		})
	}
}

fn delay_millis(delay: Duration) -> u64 {
	let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
	if millis == 0 && !delay.is_zero() { 1 } else { millis }
}
