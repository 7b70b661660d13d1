//! Default capability object.
//!
//! [`Helpers`] is what a behavior receives when no custom capability factory
//! is configured: scoped queries on the bound element plus small local-state
//! utilities built on [`Observable`].

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use reinhardt_dom::{DomResult, Element};

use crate::context::WidgetContext;
use crate::instance::CapabilityFactory;
use crate::reactive::{Debouncer, Observable, Subscription};

/// Capabilities scoped to one widget element.
#[derive(Debug, Clone)]
pub struct Helpers {
	element: Element,
}

impl Helpers {
	/// Creates helpers scoped to `element`.
	pub fn new(element: Element) -> Self {
		Self { element }
	}

	/// Factory building [`Helpers`] for each widget.
	pub fn factory() -> CapabilityFactory<Self> {
		Rc::new(|ctx: &WidgetContext| Self::new(ctx.element().clone()))
	}

	/// The element the helpers are scoped to.
	pub fn element(&self) -> &Element {
		&self.element
	}

	/// First descendant of the widget element matching `selector`.
	///
	/// # Errors
	///
	/// Returns an error if the selector cannot be parsed.
	pub fn qs(&self, selector: &str) -> DomResult<Option<Element>> {
		self.element.query_selector(selector)
	}

	/// Every descendant of the widget element matching `selector`.
	///
	/// # Errors
	///
	/// Returns an error if the selector cannot be parsed.
	pub fn qsa(&self, selector: &str) -> DomResult<Vec<Element>> {
		self.element.query_selector_all(selector)
	}

	/// Local state that calls `on_change` after every write.
	///
	/// # Example
	///
	/// ```ignore
	/// let label = helpers.qs(".count")?;
	/// let count = helpers.use_state(0, move |value| {
	///     if let Some(label) = &label {
	///         label.set_text_content(&value.to_string());
	///     }
	/// });
	/// count.update(|value| *value += 1);
	/// ```
	pub fn use_state<T: Clone + 'static>(&self, initial: T, on_change: impl Fn(&T) + 'static) -> State<T> {
		let value = Observable::new(initial);
		let subscription = value.subscribe(on_change);
		State {
			value,
			_subscription: subscription,
		}
	}

	/// Local state that calls `on_change` once after `delay` has passed with no
	/// further write, with the latest value.
	///
	/// Debouncing needs a [`tokio::task::LocalSet`]; without one every write
	/// calls `on_change` immediately.
	pub fn use_debounced_state<T: Clone + 'static>(
		&self,
		initial: T,
		on_change: impl Fn(&T) + 'static,
		delay: Duration,
	) -> State<T> {
		let value = Observable::new(initial);
		let latest = value.downgrade();
		let debouncer = Debouncer::new(delay, move || {
			if let Some(value) = latest.upgrade() {
				value.with(|current| on_change(current));
			}
		});
		let subscription = value.subscribe(move |_| debouncer.trigger());
		State {
			value,
			_subscription: subscription,
		}
	}
}

/// Local widget state returned by [`Helpers::use_state`] and
/// [`Helpers::use_debounced_state`].
///
/// Dropping the state stops change notifications.
pub struct State<T: 'static> {
	value: Observable<T>,
	_subscription: Subscription,
}

impl<T: Clone + 'static> State<T> {
	/// Returns a copy of the current value.
	pub fn get(&self) -> T {
		self.value.get()
	}

	/// Reads the current value without cloning it.
	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		self.value.with(f)
	}

	/// Replaces the value.
	pub fn set(&self, value: T) {
		self.value.set(value);
	}

	/// Mutates the value in place.
	pub fn update(&self, f: impl FnOnce(&mut T)) {
		self.value.update(f);
	}

	/// The underlying observable, for extra subscribers.
	pub fn observable(&self) -> &Observable<T> {
		&self.value
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for State<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("State").field("value", &self.value).finish()
	}
}
