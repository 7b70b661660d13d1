//! Reactive primitives shared by props, prop cells and helper state.
//!
//! - [`Observable<T>`]: a shared value whose writes notify subscribers
//! - [`Subscription`]: RAII handle, dropping it unsubscribes
//! - [`Debouncer`]: runs a callback once after a quiet period
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). Listeners are invoked
//! with no internal borrow held, so a listener may freely read or write the
//! value that notified it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

type Listener<T> = Rc<dyn Fn(&T)>;

/// Ordered listener list with stable ids.
pub(crate) struct Listeners<T> {
	entries: RefCell<Vec<(u64, Listener<T>)>>,
	next_id: Cell<u64>,
}

impl<T: 'static> Listeners<T> {
	pub(crate) fn new() -> Rc<Self> {
		Rc::new(Self {
			entries: RefCell::new(Vec::new()),
			next_id: Cell::new(0),
		})
	}

	pub(crate) fn add(self: &Rc<Self>, listener: impl Fn(&T) + 'static) -> Subscription {
		let id = self.next_id.get();
		self.next_id.set(id + 1);
		self.entries.borrow_mut().push((id, Rc::new(listener)));

		let weak: Weak<Self> = Rc::downgrade(self);
		Subscription::new(move || {
			if let Some(listeners) = weak.upgrade() {
				listeners.entries.borrow_mut().retain(|(entry, _)| *entry != id);
			}
		})
	}

	/// Calls every listener registered at the time of the call.
	pub(crate) fn notify(&self, value: &T) {
		let snapshot: Vec<Listener<T>> = self
			.entries
			.borrow()
			.iter()
			.map(|(_, listener)| listener.clone())
			.collect();
		for listener in snapshot {
			listener(value);
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.borrow().len()
	}
}

/// Keeps a listener registered for as long as it is alive.
///
/// Call [`detach`](Self::detach) to keep the listener for the lifetime of its
/// source instead.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
	unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
	pub(crate) fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
		Self {
			unsubscribe: Some(Box::new(unsubscribe)),
		}
	}

	/// Unsubscribes now.
	pub fn cancel(mut self) {
		if let Some(unsubscribe) = self.unsubscribe.take() {
			unsubscribe();
		}
	}

	/// Leaves the listener registered until its source is dropped.
	pub fn detach(mut self) {
		self.unsubscribe = None;
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(unsubscribe) = self.unsubscribe.take() {
			unsubscribe();
		}
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("active", &self.unsubscribe.is_some())
			.finish()
	}
}

struct ObservableInner<T> {
	value: RefCell<T>,
	listeners: Rc<Listeners<T>>,
}

/// A shared, observable value.
///
/// Clones share the same value and the same subscribers.
///
/// # Example
///
/// ```ignore
/// let count = Observable::new(0);
/// let _subscription = count.subscribe(|value| println!("count = {}", value));
/// count.set(1);
/// count.update(|value| *value += 1);
/// assert_eq!(count.get(), 2);
/// ```
pub struct Observable<T: 'static> {
	inner: Rc<ObservableInner<T>>,
}

impl<T: 'static> Observable<T> {
	/// Creates an observable holding `value`.
	pub fn new(value: T) -> Self {
		Self {
			inner: Rc::new(ObservableInner {
				value: RefCell::new(value),
				listeners: Listeners::new(),
			}),
		}
	}

	/// Returns a copy of the current value.
	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.inner.value.borrow().clone()
	}

	/// Reads the current value without cloning it.
	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&self.inner.value.borrow())
	}

	/// Stores `value` and notifies every subscriber.
	pub fn set(&self, value: T)
	where
		T: Clone,
	{
		*self.inner.value.borrow_mut() = value;
		self.notify();
	}

	/// Stores `value` and notifies only when it differs from the current one.
	///
	/// Returns true when subscribers were notified.
	pub fn set_if_changed(&self, value: T) -> bool
	where
		T: Clone + PartialEq,
	{
		if *self.inner.value.borrow() == value {
			return false;
		}
		self.set(value);
		true
	}

	/// Mutates the value in place and notifies every subscriber.
	pub fn update(&self, f: impl FnOnce(&mut T))
	where
		T: Clone,
	{
		f(&mut self.inner.value.borrow_mut());
		self.notify();
	}

	/// Registers `listener`, called with the new value after every write.
	pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
		self.inner.listeners.add(listener)
	}

	/// Number of registered subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.inner.listeners.len()
	}

	/// Creates a handle that does not keep the value alive.
	pub fn downgrade(&self) -> WeakObservable<T> {
		WeakObservable {
			inner: Rc::downgrade(&self.inner),
		}
	}

	/// Returns true when both handles share the same value.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	fn notify(&self)
	where
		T: Clone,
	{
		let snapshot = self.inner.value.borrow().clone();
		self.inner.listeners.notify(&snapshot);
	}
}

impl<T: 'static> Clone for Observable<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Observable<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Observable")
			.field("value", &*self.inner.value.borrow())
			.field("subscribers", &self.inner.listeners.len())
			.finish()
	}
}

/// Non-owning handle to an [`Observable`].
pub struct WeakObservable<T: 'static> {
	inner: Weak<ObservableInner<T>>,
}

impl<T: 'static> WeakObservable<T> {
	/// Returns the observable if it is still alive.
	pub fn upgrade(&self) -> Option<Observable<T>> {
		self.inner.upgrade().map(|inner| Observable { inner })
	}
}

impl<T: 'static> Clone for WeakObservable<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

/// Runs a callback once after `delay` has passed without another trigger.
///
/// Each [`trigger`](Self::trigger) cancels the pending run and schedules a new
/// one. The timer task is spawned with [`tokio::task::spawn_local`], so
/// debouncing needs a [`tokio::task::LocalSet`]. Outside of one, a trigger
/// logs a warning and runs the callback immediately. Dropping the debouncer
/// cancels a pending run.
pub struct Debouncer {
	delay: Duration,
	callback: Rc<dyn Fn()>,
	pending: RefCell<Option<JoinHandle<()>>>,
}

impl Debouncer {
	/// Creates a debouncer.
	///
	/// # Arguments
	///
	/// * `delay` - Quiet period after the last trigger
	/// * `callback` - Called once per quiet period
	pub fn new(delay: Duration, callback: impl Fn() + 'static) -> Self {
		Self {
			delay,
			callback: Rc::new(callback),
			pending: RefCell::new(None),
		}
	}

	/// Restarts the timer.
	pub fn trigger(&self) {
		self.cancel();
		match self.spawn_timer() {
			Some(handle) => *self.pending.borrow_mut() = Some(handle),
			None => {
				tracing::warn!(delay = ?self.delay, "no local task set to debounce on, notifying immediately");
				(self.callback)();
			}
		}
	}

	fn spawn_timer(&self) -> Option<JoinHandle<()>> {
		tokio::runtime::Handle::try_current().ok()?;
		let callback = self.callback.clone();
		let delay = self.delay;
		// `spawn_local` panics inside a runtime but outside a `LocalSet`.
		panic::catch_unwind(AssertUnwindSafe(|| {
			tokio::task::spawn_local(async move {
				tokio::time::sleep(delay).await;
				callback();
			})
		}))
		.ok()
	}

	/// Cancels a pending run, if any.
	pub fn cancel(&self) {
		if let Some(handle) = self.pending.borrow_mut().take() {
			handle.abort();
		}
	}

	/// Runs the callback now if a run is pending.
	pub fn flush(&self) {
		let pending = self.pending.borrow_mut().take();
		if let Some(handle) = pending {
			if !handle.is_finished() {
				handle.abort();
				(self.callback)();
			}
		}
	}

	/// Returns true while a run is scheduled.
	pub fn is_pending(&self) -> bool {
		self.pending
			.borrow()
			.as_ref()
			.is_some_and(|handle| !handle.is_finished())
	}

	/// The configured quiet period.
	pub fn delay(&self) -> Duration {
		self.delay
	}
}

impl Drop for Debouncer {
	fn drop(&mut self) {
		self.cancel();
	}
}

impl fmt::Debug for Debouncer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Debouncer")
			.field("delay", &self.delay)
			.field("pending", &self.is_pending())
			.finish()
	}
}
