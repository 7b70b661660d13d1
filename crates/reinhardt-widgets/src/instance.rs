//! Widget instances.
//!
//! Binding an element happens in two steps so that the identity stamp lands
//! before any asynchronous wait:
//!
//! 1. [`PendingWidget::stamp`] writes the instance id onto the element.
//!    From this point the element is no longer eligible for discovery.
//! 2. [`PendingWidget::mount`] extracts props, builds the context and the
//!    capability object, and runs the behavior once.
//!
//! A mounted [`WidgetInstance`] keeps the optional teardown callback and runs
//! it at most once from [`WidgetInstance::destroy`].

use std::any::Any;
use std::borrow::Borrow;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use rand::Rng;
use rand::distributions::Alphanumeric;
use reinhardt_dom::Element;

use crate::codec::{decode, encode};
use crate::context::{PropBindings, WidgetContext};
use crate::error::{WidgetError, WidgetResult};
use crate::membrane::{Membrane, NotifyMode};
use crate::props::PropAttributes;
use crate::reactive::Subscription;
use crate::settings::{MIN_ID_LENGTH, WidgetsSettings};

/// Callback run once when a widget is torn down.
pub type Teardown = Box<dyn FnOnce()>;

/// A widget behavior: runs once per bound element and may return a teardown.
pub type Behavior<C> = Rc<dyn Fn(&WidgetContext, &C) -> WidgetResult<Option<Teardown>>>;

/// Builds the capability object handed to a behavior.
pub type CapabilityFactory<C> = Rc<dyn Fn(&WidgetContext) -> C>;

/// Wraps a closure as a [`Behavior`].
///
/// # Example
///
/// ```ignore
/// let greeter = behavior(|ctx: &WidgetContext, _: &Helpers| {
///     let name: String = ctx.props().get_as("name").unwrap_or_default();
///     ctx.element().append_text(&format!("Hello, {}", name))?;
///     Ok(None)
/// });
/// ```
pub fn behavior<C, F>(f: F) -> Behavior<C>
where
	F: Fn(&WidgetContext, &C) -> WidgetResult<Option<Teardown>> + 'static,
{
	Rc::new(f)
}

/// Wraps a closure as a behavior's teardown return value.
pub fn teardown(f: impl FnOnce() + 'static) -> Option<Teardown> {
	Some(Box::new(f))
}

/// Unique id of a widget instance, as stamped on its element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(String);

impl InstanceId {
	/// Returns the id text.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for InstanceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<String> for InstanceId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl From<&str> for InstanceId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl Borrow<str> for InstanceId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// Issues instance ids that are never reused.
#[derive(Debug)]
pub struct IdAllocator {
	prefix: String,
	length: usize,
	issued: HashSet<InstanceId>,
}

impl IdAllocator {
	/// Creates an allocator for `<prefix><random alphanumerics>` ids.
	///
	/// Lengths below [`MIN_ID_LENGTH`] are raised to it.
	pub fn new(prefix: impl Into<String>, length: usize) -> Self {
		Self {
			prefix: prefix.into(),
			length: length.max(MIN_ID_LENGTH),
			issued: HashSet::new(),
		}
	}

	/// Creates an allocator from the id settings.
	pub fn from_settings(settings: &WidgetsSettings) -> Self {
		Self::new(settings.id_prefix.clone(), settings.id_length)
	}

	/// Returns a fresh id.
	pub fn allocate(&mut self) -> InstanceId {
		let mut rng = rand::thread_rng();
		loop {
			let suffix: String = (&mut rng)
				.sample_iter(&Alphanumeric)
				.take(self.length)
				.map(char::from)
				.collect();
			let id = InstanceId(format!("{}{}", self.prefix, suffix));
			if self.issued.insert(id.clone()) {
				return id;
			}
		}
	}

	/// Returns true when `id` was issued by this allocator.
	pub fn was_issued(&self, id: &str) -> bool {
		self.issued.contains(id)
	}

	/// Number of ids issued so far.
	pub fn issued(&self) -> usize {
		self.issued.len()
	}
}

/// An element that carries its identity stamp but has no running behavior
/// yet.
#[derive(Debug, Clone)]
pub struct PendingWidget {
	id: InstanceId,
	name: String,
	element: Element,
}

impl PendingWidget {
	/// Stamps `id` onto `element`.
	///
	/// # Arguments
	///
	/// * `element` - Element to bind
	/// * `name` - Widget name read from the marker attribute
	/// * `id` - Freshly allocated instance id
	/// * `id_attribute` - Identity attribute name
	pub fn stamp(element: Element, name: impl Into<String>, id: InstanceId, id_attribute: &str) -> Self {
		element.set_attribute(id_attribute, id.as_str());
		Self {
			id,
			name: name.into(),
			element,
		}
	}

	/// The stamped id.
	pub fn id(&self) -> &InstanceId {
		&self.id
	}

	/// The widget name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The stamped element.
	pub fn element(&self) -> &Element {
		&self.element
	}

	/// Extracts props, builds the capability object and runs `behavior`.
	///
	/// Panics raised by the capability factory or the behavior are caught and
	/// reported as [`WidgetError::Behavior`].
	///
	/// # Errors
	///
	/// Returns the behavior's error, or [`WidgetError::Behavior`] on panic.
	pub fn mount<C>(
		self,
		behavior: &Behavior<C>,
		plugins: &CapabilityFactory<C>,
		settings: &WidgetsSettings,
	) -> WidgetResult<WidgetInstance<C>> {
		let (props, attributes) = PropAttributes::collect(&self.element, &settings.prop_prefix);
		let mode = if settings.reactive_props {
			NotifyMode::from_delay(settings.writeback_delay())
		} else {
			NotifyMode::Immediate
		};
		let membrane = Membrane::with_mode(props, mode);
		let bindings = PropBindings::new(self.element.clone(), attributes);

		let writeback = settings.reactive_props.then(|| {
			let bindings = bindings.clone();
			membrane.subscribe(move |props| bindings.write_all(props))
		});

		let context = WidgetContext::new(self.id, self.name, self.element, membrane, bindings);

		let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
			let capabilities = plugins(&context);
			let result = behavior(&context, &capabilities);
			(capabilities, result)
		}));
		let (capabilities, result) = outcome.map_err(|payload| WidgetError::Behavior {
			widget: context.name().to_string(),
			message: panic_message(payload),
		})?;
		let teardown = result?;

		Ok(WidgetInstance {
			context,
			capabilities,
			teardown: RefCell::new(teardown),
			destroyed: Cell::new(false),
			_writeback: writeback,
		})
	}
}

/// A widget bound to one element.
pub struct WidgetInstance<C> {
	context: WidgetContext,
	capabilities: C,
	teardown: RefCell<Option<Teardown>>,
	destroyed: Cell<bool>,
	_writeback: Option<Subscription>,
}

impl<C> WidgetInstance<C> {
	/// Stamps and mounts `element` in one synchronous step.
	///
	/// # Errors
	///
	/// See [`PendingWidget::mount`].
	pub fn new(
		element: Element,
		name: impl Into<String>,
		id: InstanceId,
		behavior: &Behavior<C>,
		plugins: &CapabilityFactory<C>,
		settings: &WidgetsSettings,
	) -> WidgetResult<Self> {
		PendingWidget::stamp(element, name, id, &settings.id_attribute).mount(behavior, plugins, settings)
	}

	/// The instance id.
	pub fn id(&self) -> &InstanceId {
		self.context.id()
	}

	/// The widget name.
	pub fn name(&self) -> &str {
		self.context.name()
	}

	/// The bound element.
	pub fn element(&self) -> &Element {
		self.context.element()
	}

	/// The widget's props.
	pub fn props(&self) -> &Membrane {
		self.context.props()
	}

	/// The context the behavior ran with.
	pub fn context(&self) -> &WidgetContext {
		&self.context
	}

	/// The capability object the behavior ran with.
	pub fn capabilities(&self) -> &C {
		&self.capabilities
	}

	/// Returns true while a teardown is waiting to run.
	pub fn has_teardown(&self) -> bool {
		self.teardown.borrow().is_some()
	}

	/// Returns true once [`destroy`](Self::destroy) has been called.
	pub fn is_destroyed(&self) -> bool {
		self.destroyed.get()
	}

	/// Runs the teardown, once. Later calls do nothing.
	///
	/// A pending debounced writeback is flushed first.
	///
	/// # Errors
	///
	/// Returns [`WidgetError::Behavior`] when the teardown panicked.
	pub fn destroy(&self) -> WidgetResult<()> {
		if self.destroyed.replace(true) {
			return Ok(());
		}
		self.context.props().flush();

		let Some(teardown) = self.teardown.borrow_mut().take() else {
			return Ok(());
		};
		panic::catch_unwind(AssertUnwindSafe(teardown)).map_err(|payload| WidgetError::Behavior {
			widget: self.name().to_string(),
			message: panic_message(payload),
		})
	}

	/// Re-reads one attribute after it changed on the element.
	///
	/// The props are updated without notifying, so the change is not written
	/// back. Returns true when the stored prop changed.
	pub(crate) fn sync_attribute(&self, attribute: &str) -> bool {
		let bindings = self.context.bindings();
		let Some(key) = bindings.key_for(attribute) else {
			return false;
		};
		let raw = self.element().get_attribute(attribute);
		let props = self.context.props();

		// Our own writeback produces the text we already hold.
		let current = props.get(&key);
		if raw.is_some() && current.as_ref().map(encode) == raw {
			return false;
		}

		let value = raw.map(|raw| decode(&raw));
		if value.is_some() {
			bindings.remember(&key, attribute);
		}
		let changed = props.store_silently(&key, value.clone());
		bindings.sync_cell(&key, value.unwrap_or(serde_json::Value::Null));
		changed
	}
}

impl<C> fmt::Debug for WidgetInstance<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WidgetInstance")
			.field("id", self.id())
			.field("name", &self.name())
			.field("has_teardown", &self.has_teardown())
			.field("destroyed", &self.is_destroyed())
			.finish()
	}
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"behavior panicked".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use reinhardt_dom::{Document, WidgetBuilder};
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn document() -> Document {
		Document::new()
	}

	fn no_capabilities() -> CapabilityFactory<()> {
		Rc::new(|_| ())
	}

	fn reactive() -> WidgetsSettings {
		WidgetsSettings {
			reactive_props: true,
			..WidgetsSettings::default()
		}
	}

	#[rstest]
	fn test_allocator_ids_are_prefixed_and_unique() {
		let mut allocator = IdAllocator::new("w_", 6);
		let ids: HashSet<InstanceId> = (0..500).map(|_| allocator.allocate()).collect();

		assert_eq!(ids.len(), 500);
		assert_eq!(allocator.issued(), 500);
		for id in &ids {
			assert!(id.as_str().starts_with("w_"));
			assert_eq!(id.as_str().len(), 8);
			assert!(allocator.was_issued(id.as_str()));
		}
	}

	#[rstest]
	fn test_allocator_enforces_minimum_length() {
		let mut allocator = IdAllocator::new("x", 2);
		assert_eq!(allocator.allocate().as_str().len(), 1 + MIN_ID_LENGTH);
	}

	#[rstest]
	fn test_stamp_happens_before_mount(document: Document) {
		let element = WidgetBuilder::new().name("greeter").build(&document);
		let pending = PendingWidget::stamp(element.clone(), "greeter", "w_abcdef".into(), "data-widget-id");

		assert_eq!(element.get_attribute("data-widget-id"), Some("w_abcdef".to_string()));
		assert_eq!(pending.id().as_str(), "w_abcdef");
	}

	#[rstest]
	fn test_mount_runs_behavior_once_with_props(document: Document) {
		let element = WidgetBuilder::new()
			.name("greeter")
			.prop("name", "Ada")
			.build(&document);
		let calls = Rc::new(Cell::new(0));
		let counter = calls.clone();
		let greeter: Behavior<()> = behavior(move |ctx, _| {
			counter.set(counter.get() + 1);
			let name: String = ctx.props().get_as("name").unwrap_or_default();
			ctx.element().append_text(&format!("Hello, {}", name))?;
			Ok(None)
		});

		let instance = WidgetInstance::new(
			element.clone(),
			"greeter",
			"w_000001".into(),
			&greeter,
			&no_capabilities(),
			&WidgetsSettings::default(),
		)
		.unwrap();

		assert_eq!(calls.get(), 1);
		assert_eq!(element.text_content(), "Hello, Ada");
		assert_eq!(instance.name(), "greeter");
		assert!(!instance.has_teardown());
	}

	#[rstest]
	fn test_capability_factory_sees_context(document: Document) {
		let element = WidgetBuilder::new().name("tally").build(&document);
		let plugins: CapabilityFactory<String> = Rc::new(|ctx| format!("{}:{}", ctx.name(), ctx.id()));
		let tally: Behavior<String> = behavior(|_, capabilities: &String| {
			assert_eq!(capabilities, "tally:w_tally1");
			Ok(None)
		});

		let instance = WidgetInstance::new(
			element,
			"tally",
			"w_tally1".into(),
			&tally,
			&plugins,
			&WidgetsSettings::default(),
		)
		.unwrap();

		assert_eq!(instance.capabilities(), "tally:w_tally1");
	}

	#[rstest]
	fn test_teardown_runs_exactly_once(document: Document) {
		let element = WidgetBuilder::new().name("timer").build(&document);
		let calls = Rc::new(Cell::new(0));
		let counter = calls.clone();
		let timer: Behavior<()> = behavior(move |_, _| {
			let counter = counter.clone();
			Ok(teardown(move || counter.set(counter.get() + 1)))
		});

		let instance = WidgetInstance::new(
			element,
			"timer",
			"w_timer1".into(),
			&timer,
			&no_capabilities(),
			&WidgetsSettings::default(),
		)
		.unwrap();
		assert!(instance.has_teardown());

		instance.destroy().unwrap();
		instance.destroy().unwrap();

		assert_eq!(calls.get(), 1);
		assert!(instance.is_destroyed());
	}

	#[rstest]
	#[case::error(behavior(|_, _| Err(WidgetError::custom("boom"))), "boom")]
	#[case::panic(behavior(|_, _| panic!("exploded")), "widget 'broken' failed: exploded")]
	fn test_failing_behavior_is_reported(
		document: Document,
		#[case] broken: Behavior<()>,
		#[case] expected: &str,
	) {
		let element = WidgetBuilder::new().name("broken").build(&document);

		let error = WidgetInstance::new(
			element.clone(),
			"broken",
			"w_broken".into(),
			&broken,
			&no_capabilities(),
			&WidgetsSettings::default(),
		)
		.unwrap_err();

		assert_eq!(error.to_string(), expected);
		assert!(element.has_attribute("data-widget-id"));
	}

	#[rstest]
	fn test_panicking_teardown_is_reported(document: Document) {
		let element = WidgetBuilder::new().name("fragile").build(&document);
		let fragile: Behavior<()> = behavior(|_, _| Ok(teardown(|| panic!("teardown failed"))));

		let instance = WidgetInstance::new(
			element,
			"fragile",
			"w_fragile".into(),
			&fragile,
			&no_capabilities(),
			&WidgetsSettings::default(),
		)
		.unwrap();

		assert!(matches!(instance.destroy(), Err(WidgetError::Behavior { .. })));
		assert!(instance.destroy().is_ok());
	}

	#[rstest]
	fn test_reactive_writes_are_written_back(document: Document) {
		let element = WidgetBuilder::new()
			.name("counter")
			.prop("count", "0")
			.build(&document);
		let counter: Behavior<()> = behavior(|ctx, _| {
			ctx.props().set("count", 1);
			ctx.props().set("step_size", 2);
			Ok(None)
		});

		let instance = WidgetInstance::new(
			element.clone(),
			"counter",
			"w_counter".into(),
			&counter,
			&no_capabilities(),
			&reactive(),
		)
		.unwrap();

		assert_eq!(element.get_attribute(":count"), Some("1".to_string()));
		assert_eq!(element.get_attribute(":step-size"), Some("2".to_string()));

		instance.props().remove("step_size");
		assert!(!element.has_attribute(":step-size"));
	}

	#[rstest]
	fn test_non_reactive_writes_stay_in_memory(document: Document) {
		let element = WidgetBuilder::new().prop("count", "0").build(&document);
		let counter: Behavior<()> = behavior(|ctx, _| {
			ctx.props().set("count", 5);
			Ok(None)
		});

		WidgetInstance::new(
			element.clone(),
			"counter",
			"w_plain01".into(),
			&counter,
			&no_capabilities(),
			&WidgetsSettings::default(),
		)
		.unwrap();

		assert_eq!(element.get_attribute(":count"), Some("0".to_string()));
	}

	#[rstest]
	fn test_sync_attribute_updates_without_writeback(document: Document) {
		let element = WidgetBuilder::new().prop("count", "1").build(&document);
		let writes = Rc::new(Cell::new(0));
		let noop: Behavior<()> = behavior(|_, _| Ok(None));
		let instance = WidgetInstance::new(
			element.clone(),
			"counter",
			"w_sync001".into(),
			&noop,
			&no_capabilities(),
			&reactive(),
		)
		.unwrap();
		let counter = writes.clone();
		let _subscription = instance
			.props()
			.subscribe(move |_| counter.set(counter.get() + 1));
		let cell = instance.context().prop_effect("count");

		element.set_attribute(":count", "7");
		assert!(instance.sync_attribute(":count"));
		assert!(!instance.sync_attribute(":count"));
		assert!(!instance.sync_attribute("class"));

		assert_eq!(instance.props().get("count"), Some(json!(7)));
		assert_eq!(cell.get(), json!(7));
		assert_eq!(writes.get(), 0);
	}

	#[rstest]
	fn test_prop_effect_writes_single_attribute(document: Document) {
		let element = WidgetBuilder::new()
			.prop("open", "false")
			.prop("title", "Menu")
			.build(&document);
		let noop: Behavior<()> = behavior(|_, _| Ok(None));
		let instance = WidgetInstance::new(
			element.clone(),
			"menu",
			"w_menu001".into(),
			&noop,
			&no_capabilities(),
			&WidgetsSettings::default(),
		)
		.unwrap();
		let seen = Rc::new(RefCell::new(Vec::new()));
		let sink = seen.clone();

		let open = instance.context().prop_effect("open");
		let _subscription = open.subscribe(move |value| sink.borrow_mut().push(value.clone()));
		assert_eq!(open.get(), json!(false));

		open.set(true);
		open.set(true);

		assert_eq!(element.get_attribute(":open"), Some("true".to_string()));
		assert_eq!(element.get_attribute(":title"), Some("Menu".to_string()));
		assert_eq!(instance.props().get("open"), Some(json!(true)));
		assert_eq!(*RefCell::borrow(&seen), vec![json!(true)]);
		assert!(instance.context().prop_effect("open").cell().ptr_eq(open.cell()));
	}
}
