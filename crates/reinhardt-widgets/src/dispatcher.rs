//! Discovery and lifecycle dispatch.
//!
//! The [`Dispatcher`] watches one root element. Every marked element that
//! appears under the root is bound exactly once; every bound element that
//! leaves the tree is torn down exactly once.
//!
//! ## Flow
//!
//! ```text
//! MutationObserver ──batch──▶ process_batch
//!                               ├─ removed ─▶ release: deregister + teardown
//!                               │                     or cancel an in-flight load
//!                               ├─ added ───▶ find_eligible ─▶ instantiate
//!                               │               stamp id ─▶ resolve ─┬─ ready ─▶ mount
//!                               │                                    └─ pending ─▶ in-flight set
//!                               └─ attribute ─▶ sync prop (no writeback)
//! ```
//!
//! Records are handled in delivery order. A failure while binding one element
//! is logged and reported as [`LifecycleEvent::Failed`]; the rest of the batch
//! continues.
//!
//! ## Driving the dispatcher
//!
//! Everything is single-threaded. Call [`Dispatcher::run`] inside a
//! [`tokio::task::LocalSet`] to process batches as they arrive, or call
//! [`Dispatcher::settle`] to process what is queued and wait for in-flight
//! loads.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::poll_fn;
use std::rc::Rc;

use futures::FutureExt;
use futures::StreamExt;
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use reinhardt_dom::{Document, Element, MutationObserver, MutationRecord, Node, ObserveOptions, Selector};
use tokio::sync::Notify;

use crate::config::WidgetsConfig;
use crate::error::{ObserveError, ObserveResult, WidgetError};
use crate::events::{LifecycleBus, LifecycleEvent};
use crate::helpers::Helpers;
use crate::instance::{Behavior, CapabilityFactory, IdAllocator, InstanceId, PendingWidget, WidgetInstance};
use crate::logging::lifecycle_log;
use crate::reactive::Subscription;
use crate::registry::Registry;
use crate::resolver::{HandlerResolver, Resolution};
use crate::settings::WidgetsSettings;

/// State shared between the dispatcher and its in-flight loads.
struct Engine<C> {
	settings: WidgetsSettings,
	root: Element,
	marker: Selector,
	name_attribute: String,
	identity: Selector,
	resolver: HandlerResolver<C>,
	plugins: CapabilityFactory<C>,
	registry: RefCell<Registry<C>>,
	events: LifecycleBus,
}

impl<C: 'static> Engine<C> {
	/// Runs the behavior for a stamped element and registers the instance.
	fn mount(&self, pending: PendingWidget, behavior: Behavior<C>, lazy: bool) {
		if !self.registry.borrow_mut().finish_pending(pending.id().as_str()) {
			tracing::debug!(widget = pending.name(), id = %pending.id(), "element was removed before mounting");
			return;
		}

		let id = pending.id().clone();
		let name = pending.name().to_string();
		let element = pending.element().clone();

		let instance = match pending.mount(&behavior, &self.plugins, &self.settings) {
			Ok(instance) => Rc::new(instance),
			Err(error) => {
				self.report_failure(id, name, &element, error);
				return;
			}
		};

		let inserted = self.registry.borrow_mut().insert(instance.clone());
		if let Err(error) = inserted {
			if let Err(teardown_error) = instance.destroy() {
				tracing::error!(widget = %name, id = %id, "{}", teardown_error);
			}
			self.report_failure(id, name, &element, error.into());
			return;
		}

		lifecycle_log!(self.settings, widget = %name, id = %id, lazy, "widget mounted");
		self.events.emit(LifecycleEvent::Mounted { id, name, lazy });
	}

	/// Reports a resolution failure for a stamped element.
	fn fail(&self, pending: PendingWidget, error: WidgetError) {
		if !self.registry.borrow_mut().finish_pending(pending.id().as_str()) {
			tracing::debug!(widget = pending.name(), id = %pending.id(), "element was removed before its load failed");
			return;
		}
		let id = pending.id().clone();
		let name = pending.name().to_string();
		self.report_failure(id, name, pending.element(), error);
	}

	fn report_failure(&self, id: InstanceId, name: String, element: &Element, error: WidgetError) {
		tracing::error!(widget = %name, id = %id, element = ?element, "failed to mount widget: {}", error);
		self.events.emit(LifecycleEvent::Failed { id, name, error });
	}

	/// Tears down the instance bound to `element`, or cancels its load.
	fn release(&self, element: &Element) {
		let id_attribute = &self.settings.id_attribute;
		let Some(id) = element.get_attribute(id_attribute) else {
			return;
		};

		let removed = self.registry.borrow_mut().remove(&id);
		if let Some(instance) = removed {
			if let Err(error) = instance.destroy() {
				tracing::error!(widget = instance.name(), id = %id, "teardown failed: {}", error);
			}
			element.remove_attribute(id_attribute);
			lifecycle_log!(self.settings, widget = instance.name(), id = %id, "widget destroyed");
			self.events.emit(LifecycleEvent::Destroyed {
				id: instance.id().clone(),
				name: instance.name().to_string(),
			});
			return;
		}

		let cancelled = self.registry.borrow_mut().cancel(&id);
		if let Some(name) = cancelled {
			element.remove_attribute(id_attribute);
			lifecycle_log!(self.settings, widget = %name, id = %id, "widget load cancelled");
			self.events.emit(LifecycleEvent::Cancelled { id: id.into(), name });
		}
	}

	/// Follows a prop attribute change on a bound element.
	fn sync_attribute(&self, target: &Element, name: &str) {
		let Some(id) = target.get_attribute(&self.settings.id_attribute) else {
			return;
		};
		let instance = self.registry.borrow().get(&id);
		if let Some(instance) = instance {
			if instance.sync_attribute(name) {
				tracing::trace!(widget = instance.name(), id = %id, attribute = name, "prop updated from attribute");
			}
		}
	}
}

/// Binds widget behaviors to marked elements under a root.
///
/// # Example
///
/// ```ignore
/// let local = tokio::task::LocalSet::new();
/// local
///     .run_until(async {
///         let dispatcher = Dispatcher::start(&document, config)?;
///         dispatcher.run().await;
///         Ok::<_, ObserveError>(())
///     })
///     .await?;
/// ```
pub struct Dispatcher<C: 'static = Helpers> {
	engine: Rc<Engine<C>>,
	observer: RefCell<Option<Rc<MutationObserver>>>,
	in_flight: RefCell<FuturesUnordered<LocalBoxFuture<'static, ()>>>,
	stopped: Cell<bool>,
	stop_signal: Notify,
}

impl<C: 'static> Dispatcher<C> {
	/// Creates a dispatcher for the configured root of `document`.
	///
	/// Nothing is bound until [`init`](Self::init) is called.
	///
	/// # Errors
	///
	/// Returns [`ObserveError::RootNotFound`] when no element matches the root
	/// selector, or a settings error.
	pub fn new(document: &Document, config: WidgetsConfig<C>) -> ObserveResult<Self> {
		let selector = config.settings().root_element.clone();
		let root = document
			.query_selector(&selector)?
			.ok_or(ObserveError::RootNotFound(selector))?;
		Self::with_root(root, config)
	}

	/// Creates a dispatcher for an explicit root element.
	///
	/// # Errors
	///
	/// Returns a settings error.
	pub fn with_root(root: Element, config: WidgetsConfig<C>) -> ObserveResult<Self> {
		config.settings().validate()?;
		let (settings, resolver, plugins) = config.into_parts();
		let marker = Selector::parse(&settings.marker_selector())?;
		let name_attribute = settings.name_attribute();
		let identity = Selector::has_attribute(&settings.id_attribute);
		let registry = Registry::new(IdAllocator::from_settings(&settings));

		Ok(Self {
			engine: Rc::new(Engine {
				settings,
				root,
				marker,
				name_attribute,
				identity,
				resolver,
				plugins,
				registry: RefCell::new(registry),
				events: LifecycleBus::new(),
			}),
			observer: RefCell::new(None),
			in_flight: RefCell::new(FuturesUnordered::new()),
			stopped: Cell::new(false),
			stop_signal: Notify::new(),
		})
	}

	/// Creates a dispatcher and calls [`init`](Self::init).
	///
	/// # Errors
	///
	/// See [`new`](Self::new).
	pub fn start(document: &Document, config: WidgetsConfig<C>) -> ObserveResult<Self> {
		let dispatcher = Self::new(document, config)?;
		dispatcher.init()?;
		Ok(dispatcher)
	}

	/// Starts observing the root and binds every marked element already in it.
	///
	/// The observer is attached before the discovery pass so that markup
	/// inserted by behaviors mounted during the pass is picked up by the next
	/// batch.
	///
	/// # Errors
	///
	/// Returns [`ObserveError::AlreadyObserving`] on a second call.
	pub fn init(&self) -> ObserveResult<()> {
		if self.observer.borrow().is_some() {
			return Err(ObserveError::AlreadyObserving);
		}

		let root = &self.engine.root;
		let options = ObserveOptions::child_list()
			.with_attributes(self.engine.settings.reactive_props)
			.subtree();
		let observer = root.document().observe(root.as_node(), options);
		*self.observer.borrow_mut() = Some(Rc::new(observer));

		lifecycle_log!(self.engine.settings, "Observing widget root {:?}", root);
		self.import_widgets(root.as_node());
		Ok(())
	}

	/// Returns eligible elements for a change at `target`.
	///
	/// Eligible elements match the marker selector, carry no identity stamp and
	/// sit under the root. The search covers the root's subtree when `target`
	/// is the root, and the subtree of `target`'s parent otherwise, so that
	/// siblings inserted in the same batch are found too.
	pub fn find_eligible(&self, target: &Node) -> Vec<Element> {
		let root = &self.engine.root;
		let scope = if target == root.as_node() {
			root.clone()
		} else {
			match target.parent_element() {
				Some(parent) => parent,
				None => return Vec::new(),
			}
		};

		let id_attribute = &self.engine.settings.id_attribute;
		scope
			.select(&self.engine.marker)
			.into_iter()
			.filter(|element| {
				element != root && !element.has_attribute(id_attribute) && root.contains(element)
			})
			.collect()
	}

	/// Handles one batch of mutation records, in order.
	pub fn process_batch(&self, records: Vec<MutationRecord>) {
		for record in records {
			match record {
				MutationRecord::ChildList { added, removed, .. } => {
					self.on_removed(&removed);
					self.on_added(&added);
				}
				MutationRecord::Attributes { target, name, .. } => {
					self.engine.sync_attribute(&target, &name);
				}
			}
		}
	}

	/// Handles every record queued so far. Returns the number of records.
	pub fn process_pending(&self) -> usize {
		let observer = self.observer.borrow().clone();
		let records = observer
			.map(|observer| observer.take_records())
			.unwrap_or_default();
		let count = records.len();
		if count > 0 {
			self.process_batch(records);
		}
		count
	}

	/// Handles queued records and waits until no load is in flight.
	///
	/// Loops until both the record queue and the in-flight set are empty,
	/// since mounting may queue new records.
	pub async fn settle(&self) {
		loop {
			if self.process_pending() > 0 {
				continue;
			}
			if self.in_flight.borrow().is_empty() {
				break;
			}
			self.next_in_flight().await;
		}
	}

	/// Processes batches and loads until [`stop`](Self::stop) is called.
	///
	/// Run it inside a [`tokio::task::LocalSet`]: debounced writeback and
	/// debounced helper state fall back to immediate notification without one.
	pub async fn run(&self) {
		loop {
			if self.stopped.get() {
				break;
			}
			let observer = self.observer.borrow().clone();
			let Some(observer) = observer else {
				tracing::warn!("Dispatcher::run called before init");
				break;
			};
			let has_loads = !self.in_flight.borrow().is_empty();

			tokio::select! {
				biased;
				_ = self.stop_signal.notified() => break,
				batch = observer.next_batch() => match batch {
					Some(records) => self.process_batch(records),
					None => break,
				},
				_ = self.next_in_flight(), if has_loads => {}
			}
		}
	}

	/// Stops observing. Mounted instances stay mounted.
	pub fn stop(&self) {
		self.stopped.set(true);
		if let Some(observer) = self.observer.borrow().as_ref() {
			observer.disconnect();
		}
		self.stop_signal.notify_one();
		lifecycle_log!(self.engine.settings, "Stopped observing widget root");
	}

	/// Returns true while the root is observed.
	pub fn is_observing(&self) -> bool {
		self.observer
			.borrow()
			.as_ref()
			.is_some_and(|observer| observer.is_connected())
	}

	/// Registers a lifecycle listener.
	pub fn on_lifecycle(&self, listener: impl Fn(&LifecycleEvent) + 'static) -> Subscription {
		self.engine.events.subscribe(listener)
	}

	/// The observed root.
	pub fn root(&self) -> &Element {
		&self.engine.root
	}

	/// The active settings.
	pub fn settings(&self) -> &WidgetsSettings {
		&self.engine.settings
	}

	/// The instance registered under `id`.
	pub fn instance(&self, id: &str) -> Option<Rc<WidgetInstance<C>>> {
		self.engine.registry.borrow().get(id)
	}

	/// The instance bound to `element`.
	pub fn instance_for(&self, element: &Element) -> Option<Rc<WidgetInstance<C>>> {
		let id = element.get_attribute(&self.engine.settings.id_attribute)?;
		self.instance(&id)
	}

	/// Ids of every mounted instance, sorted.
	pub fn instance_ids(&self) -> Vec<InstanceId> {
		self.engine.registry.borrow().ids()
	}

	/// Number of mounted instances.
	pub fn len(&self) -> usize {
		self.engine.registry.borrow().len()
	}

	/// Returns true when nothing is mounted.
	pub fn is_empty(&self) -> bool {
		self.engine.registry.borrow().is_empty()
	}

	/// Number of stamped elements waiting for their behavior.
	pub fn pending_loads(&self) -> usize {
		self.engine.registry.borrow().pending_len()
	}

	/// Number of loader calls made so far.
	pub fn load_count(&self) -> usize {
		self.engine.resolver.load_count()
	}

	fn on_added(&self, nodes: &[Node]) {
		for node in nodes.iter().filter(|node| node.is_element()) {
			self.import_widgets(node);
		}
	}

	fn on_removed(&self, nodes: &[Node]) {
		for element in nodes.iter().filter_map(Node::as_element) {
			let mut bound = element.select(&self.engine.identity);
			if element.matches(&self.engine.identity) {
				bound.insert(0, element);
			}
			for element in &bound {
				self.engine.release(element);
			}
		}
	}

	fn import_widgets(&self, target: &Node) {
		for element in self.find_eligible(target) {
			self.instantiate(element);
		}
	}

	fn instantiate(&self, element: Element) {
		let engine = &self.engine;
		let name = element
			.get_attribute(&engine.name_attribute)
			.map(|name| name.trim().to_string())
			.unwrap_or_default();
		if name.is_empty() {
			tracing::warn!(
				element = ?element,
				attribute = %engine.name_attribute,
				"marked element has no widget name"
			);
			return;
		}

		let id = engine.registry.borrow_mut().allocate_id();
		let pending = PendingWidget::stamp(element, name.clone(), id.clone(), &engine.settings.id_attribute);
		engine.registry.borrow_mut().begin(id, name.clone());

		match engine.resolver.resolve(&name) {
			Ok(Resolution::Ready(behavior)) => engine.mount(pending, behavior, false),
			Ok(Resolution::Pending(load)) => {
				let engine = engine.clone();
				let task = async move {
					match engine.resolver.finish(&name, load).await {
						Ok(behavior) => engine.mount(pending, behavior, true),
						Err(error) => engine.fail(pending, error.into()),
					}
				};
				self.in_flight.borrow_mut().push(task.boxed_local());
			}
			Err(error) => engine.fail(pending, error.into()),
		}
	}

	/// Drives in-flight loads until one completes.
	///
	/// Lifecycle events raised by loads are delivered after the in-flight set
	/// is released, so listeners may call back into the dispatcher.
	async fn next_in_flight(&self) {
		poll_fn(|cx| {
			let held = self.engine.events.hold();
			let polled = self.in_flight.borrow_mut().poll_next_unpin(cx);
			drop(held);
			polled
		})
		.await;
	}
}

impl<C: 'static> fmt::Debug for Dispatcher<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dispatcher")
			.field("root", &self.engine.root)
			.field("instances", &self.len())
			.field("pending_loads", &self.pending_loads())
			.field("observing", &self.is_observing())
			.finish()
	}
}
