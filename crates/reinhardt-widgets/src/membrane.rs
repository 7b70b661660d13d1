//! Reactive props membrane.
//!
//! A [`Membrane`] wraps a [`Props`] object. Reads are plain lookups; every
//! write stores the value and then notifies subscribers, either synchronously
//! ([`NotifyMode::Immediate`]) or once after a quiet period
//! ([`NotifyMode::Debounced`]).
//!
//! The engine subscribes a writeback listener that serializes every prop back
//! onto the element. Updates that originate from the element itself go through
//! [`Membrane::store_silently`], which never notifies, so an observed
//! attribute change is not written back onto the attribute that caused it.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::props::Props;
use crate::reactive::{Debouncer, Listeners, Subscription};

/// When subscribers hear about writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
	/// Synchronously, once per write.
	Immediate,
	/// Once, after the given delay has passed with no further write.
	Debounced(Duration),
}

impl NotifyMode {
	/// Mode for an optional debounce delay.
	pub fn from_delay(delay: Option<Duration>) -> Self {
		match delay {
			Some(delay) if !delay.is_zero() => Self::Debounced(delay),
			_ => Self::Immediate,
		}
	}
}

struct MembraneInner {
	props: RefCell<Props>,
	listeners: Rc<Listeners<Props>>,
	mode: NotifyMode,
	debouncer: Option<Debouncer>,
}

impl MembraneInner {
	fn notify(&self) {
		let snapshot = self.props.borrow().clone();
		self.listeners.notify(&snapshot);
	}
}

/// Observable wrapper around a widget's props.
///
/// Clones share the same props. Debouncing needs a
/// [`tokio::task::LocalSet`]; outside of one, debounced writes notify
/// immediately.
///
/// # Example
///
/// ```ignore
/// let props = ctx.props();
/// let count: i64 = props.get_as("count").unwrap_or(0);
/// props.set("count", count + 1);
/// ```
#[derive(Clone)]
pub struct Membrane {
	inner: Rc<MembraneInner>,
}

impl Membrane {
	/// Wraps `props` with synchronous notification.
	pub fn new(props: Props) -> Self {
		Self::with_mode(props, NotifyMode::Immediate)
	}

	/// Wraps `props` with debounced notification.
	pub fn debounced(props: Props, delay: Duration) -> Self {
		Self::with_mode(props, NotifyMode::Debounced(delay))
	}

	/// Wraps `props` with the given notification mode.
	pub fn with_mode(props: Props, mode: NotifyMode) -> Self {
		let inner = Rc::new_cyclic(|weak: &Weak<MembraneInner>| {
			let debouncer = match mode {
				NotifyMode::Immediate => None,
				NotifyMode::Debounced(delay) => {
					let weak = weak.clone();
					Some(Debouncer::new(delay, move || {
						if let Some(inner) = weak.upgrade() {
							inner.notify();
						}
					}))
				}
			};
			MembraneInner {
				props: RefCell::new(props),
				listeners: Listeners::new(),
				mode,
				debouncer,
			}
		});
		Self { inner }
	}

	/// The notification mode.
	pub fn mode(&self) -> NotifyMode {
		self.inner.mode
	}

	/// Returns a copy of `key`.
	pub fn get(&self, key: &str) -> Option<Value> {
		let value = self.inner.props.borrow().get(key).cloned();
		tracing::trace!(key, found = value.is_some(), "prop read");
		value
	}

	/// Returns `key` deserialized into `T`.
	pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		self.inner.props.borrow().get_as(key)
	}

	/// Returns true when `key` is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.props.borrow().contains_key(key)
	}

	/// Returns a copy of every prop.
	pub fn snapshot(&self) -> Props {
		self.inner.props.borrow().clone()
	}

	/// Stores `value` under `key` and notifies.
	pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
		self.inner.props.borrow_mut().insert(key, value);
		self.changed();
	}

	/// Removes `key` and notifies when it was present.
	pub fn remove(&self, key: &str) -> Option<Value> {
		let removed = self.inner.props.borrow_mut().remove(key);
		if removed.is_some() {
			self.changed();
		}
		removed
	}

	/// Applies several writes with a single notification.
	pub fn update(&self, f: impl FnOnce(&mut Props)) {
		f(&mut self.inner.props.borrow_mut());
		self.changed();
	}

	/// Registers `listener`, called with a snapshot of the props whenever a
	/// write is reported.
	pub fn subscribe(&self, listener: impl Fn(&Props) + 'static) -> Subscription {
		self.inner.listeners.add(listener)
	}

	/// Runs a pending debounced notification now.
	pub fn flush(&self) {
		if let Some(debouncer) = &self.inner.debouncer {
			debouncer.flush();
		}
	}

	/// Drops a pending debounced notification.
	pub fn cancel_pending(&self) {
		if let Some(debouncer) = &self.inner.debouncer {
			debouncer.cancel();
		}
	}

	/// Returns true while a debounced notification is scheduled.
	pub fn has_pending(&self) -> bool {
		self.inner
			.debouncer
			.as_ref()
			.is_some_and(Debouncer::is_pending)
	}

	/// Stores or removes `key` without notifying.
	///
	/// Returns true when the stored value changed.
	pub(crate) fn store_silently(&self, key: &str, value: Option<Value>) -> bool {
		let mut props = self.inner.props.borrow_mut();
		match value {
			Some(value) if props.get(key) != Some(&value) => {
				props.insert(key, value);
				true
			}
			Some(_) => false,
			None => props.remove(key).is_some(),
		}
	}

	fn changed(&self) {
		match &self.inner.debouncer {
			Some(debouncer) => debouncer.trigger(),
			None => self.inner.notify(),
		}
	}
}

impl fmt::Debug for Membrane {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Membrane")
			.field("props", &*self.inner.props.borrow())
			.field("mode", &self.inner.mode)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;
	use std::cell::Cell;
	use tokio::task::LocalSet;

	fn counting(membrane: &Membrane) -> (Rc<Cell<usize>>, Subscription) {
		let calls = Rc::new(Cell::new(0));
		let counter = calls.clone();
		let subscription = membrane.subscribe(move |_| counter.set(counter.get() + 1));
		(calls, subscription)
	}

	#[rstest]
	fn test_immediate_writes_notify_synchronously() {
		let membrane = Membrane::new([("count", json!(0))].into_iter().collect());
		let (calls, _subscription) = counting(&membrane);

		membrane.set("count", 1);
		membrane.set("count", 2);
		membrane.set("label", "x");

		assert_eq!(calls.get(), 3);
		assert_eq!(membrane.get("count"), Some(json!(2)));
		assert_eq!(membrane.get_as::<String>("label"), Some("x".to_string()));
	}

	#[rstest]
	fn test_reads_do_not_notify() {
		let membrane = Membrane::new([("count", json!(0))].into_iter().collect());
		let (calls, _subscription) = counting(&membrane);

		let _ = membrane.get("count");
		let _ = membrane.snapshot();

		assert_eq!(calls.get(), 0);
	}

	#[rstest]
	fn test_update_notifies_once() {
		let membrane = Membrane::new(Props::new());
		let (calls, _subscription) = counting(&membrane);

		membrane.update(|props| {
			props.insert("a", 1);
			props.insert("b", 2);
		});

		assert_eq!(calls.get(), 1);
		assert_eq!(membrane.snapshot().len(), 2);
	}

	#[rstest]
	fn test_remove_missing_key_is_silent() {
		let membrane = Membrane::new(Props::new());
		let (calls, _subscription) = counting(&membrane);

		assert_eq!(membrane.remove("missing"), None);
		assert_eq!(calls.get(), 0);
	}

	#[rstest]
	fn test_store_silently_reports_change_without_notifying() {
		let membrane = Membrane::new([("count", json!(1))].into_iter().collect());
		let (calls, _subscription) = counting(&membrane);

		assert!(!membrane.store_silently("count", Some(json!(1))));
		assert!(membrane.store_silently("count", Some(json!(2))));
		assert!(membrane.store_silently("count", None));
		assert!(!membrane.store_silently("count", None));
		assert_eq!(calls.get(), 0);
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn test_debounced_writes_notify_once() {
		LocalSet::new()
			.run_until(async {
				let membrane = Membrane::debounced(Props::new(), Duration::from_millis(100));
				let seen = Rc::new(RefCell::new(Vec::new()));
				let sink = seen.clone();
				let _subscription = membrane.subscribe(move |props| {
					sink.borrow_mut().push(props.get("count").cloned());
				});

				for count in 1..=5 {
					membrane.set("count", count);
					tokio::time::sleep(Duration::from_millis(20)).await;
				}
				assert!(seen.borrow().is_empty());
				assert!(membrane.has_pending());

				tokio::time::sleep(Duration::from_millis(200)).await;
				assert_eq!(*seen.borrow(), vec![Some(json!(5))]);
			})
			.await;
	}

	#[rstest]
	fn test_debounced_set_outside_local_set_notifies_immediately() {
		let membrane = Membrane::debounced(Props::new(), Duration::from_millis(100));
		let (calls, _subscription) = counting(&membrane);

		membrane.set("count", 1);

		assert_eq!(calls.get(), 1);
		assert!(!membrane.has_pending());
		assert_eq!(membrane.get("count"), Some(json!(1)));
	}

	#[tokio::test(flavor = "current_thread")]
	async fn test_debounced_set_in_runtime_without_local_set_notifies_immediately() {
		let membrane = Membrane::debounced(Props::new(), Duration::from_millis(100));
		let (calls, _subscription) = counting(&membrane);

		membrane.set("count", 1);
		membrane.set("count", 2);

		assert_eq!(calls.get(), 2);
		assert!(!membrane.has_pending());
	}

	#[rstest]
	#[case(None, NotifyMode::Immediate)]
	#[case(Some(Duration::ZERO), NotifyMode::Immediate)]
	#[case(Some(Duration::from_millis(50)), NotifyMode::Debounced(Duration::from_millis(50)))]
	fn test_mode_from_delay(#[case] delay: Option<Duration>, #[case] expected: NotifyMode) {
		assert_eq!(NotifyMode::from_delay(delay), expected);
	}
}
