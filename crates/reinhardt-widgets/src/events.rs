//! Lifecycle notifications.
//!
//! The dispatcher emits one [`LifecycleEvent`] per state change of a widget.
//! Listeners registered with
//! [`Dispatcher::on_lifecycle`](crate::Dispatcher::on_lifecycle) receive them
//! synchronously, after the registry has been updated. Events raised while
//! the dispatcher polls in-flight loads are held back until the poll returns,
//! so listeners may call back into the dispatcher.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::WidgetError;
use crate::instance::InstanceId;
use crate::reactive::{Listeners, Subscription};

/// A widget lifecycle change.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum LifecycleEvent {
	/// The behavior ran and the instance was registered.
	Mounted {
		/// Instance id.
		id: InstanceId,
		/// Widget name.
		name: String,
		/// True when the behavior had to be loaded first.
		lazy: bool,
	},
	/// The element was removed and the instance torn down.
	Destroyed {
		/// Instance id.
		id: InstanceId,
		/// Widget name.
		name: String,
	},
	/// The element was removed while its behavior was still loading.
	Cancelled {
		/// Instance id.
		id: InstanceId,
		/// Widget name.
		name: String,
	},
	/// Resolution or the behavior failed. The element keeps its identity
	/// stamp and is not retried.
	Failed {
		/// Instance id stamped on the element.
		id: InstanceId,
		/// Widget name.
		name: String,
		/// What went wrong.
		error: WidgetError,
	},
}

impl LifecycleEvent {
	/// The instance id the event is about.
	pub fn id(&self) -> &InstanceId {
		match self {
			Self::Mounted { id, .. }
			| Self::Destroyed { id, .. }
			| Self::Cancelled { id, .. }
			| Self::Failed { id, .. } => id,
		}
	}

	/// The widget name the event is about.
	pub fn name(&self) -> &str {
		match self {
			Self::Mounted { name, .. }
			| Self::Destroyed { name, .. }
			| Self::Cancelled { name, .. }
			| Self::Failed { name, .. } => name,
		}
	}
}

/// Fan-out of lifecycle events.
pub(crate) struct LifecycleBus {
	listeners: Rc<Listeners<LifecycleEvent>>,
	holds: Cell<usize>,
	held: RefCell<Vec<LifecycleEvent>>,
}

impl LifecycleBus {
	pub(crate) fn new() -> Self {
		Self {
			listeners: Listeners::new(),
			holds: Cell::new(0),
			held: RefCell::new(Vec::new()),
		}
	}

	pub(crate) fn subscribe(&self, listener: impl Fn(&LifecycleEvent) + 'static) -> Subscription {
		self.listeners.add(listener)
	}

	pub(crate) fn emit(&self, event: LifecycleEvent) {
		if self.holds.get() > 0 {
			self.held.borrow_mut().push(event);
		} else {
			self.listeners.notify(&event);
		}
	}

	/// Queues events until the returned guard is dropped.
	pub(crate) fn hold(&self) -> HeldEvents<'_> {
		self.holds.set(self.holds.get() + 1);
		HeldEvents { bus: self }
	}

	fn release(&self) {
		let holds = self.holds.get().saturating_sub(1);
		self.holds.set(holds);
		if holds > 0 {
			return;
		}
		loop {
			let queued = std::mem::take(&mut *self.held.borrow_mut());
			if queued.is_empty() {
				break;
			}
			for event in &queued {
				self.listeners.notify(event);
			}
		}
	}
}

/// Delivers held events on drop.
pub(crate) struct HeldEvents<'a> {
	bus: &'a LifecycleBus,
}

impl Drop for HeldEvents<'_> {
	fn drop(&mut self) {
		self.bus.release();
	}
}
