//! Instance registry.
//!
//! The registry is the single source of truth for "is this element bound".
//! It tracks mounted instances by id, plus the ids that are stamped but still
//! waiting for their behavior to load.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RegistryError;
use crate::instance::{IdAllocator, InstanceId, WidgetInstance};

/// Mounted and in-flight widget instances.
#[derive(Debug)]
pub struct Registry<C> {
	instances: HashMap<InstanceId, Rc<WidgetInstance<C>>>,
	pending: HashMap<InstanceId, String>,
	ids: IdAllocator,
}

impl<C> Registry<C> {
	/// Creates an empty registry issuing ids from `ids`.
	pub fn new(ids: IdAllocator) -> Self {
		Self {
			instances: HashMap::new(),
			pending: HashMap::new(),
			ids,
		}
	}

	/// Returns a fresh instance id.
	pub fn allocate_id(&mut self) -> InstanceId {
		self.ids.allocate()
	}

	/// Records that `id` is stamped and waiting for its behavior.
	pub fn begin(&mut self, id: InstanceId, name: impl Into<String>) {
		self.pending.insert(id, name.into());
	}

	/// Returns true while `id` is waiting for its behavior.
	pub fn is_pending(&self, id: &str) -> bool {
		self.pending.contains_key(id)
	}

	/// Ends the wait for `id`.
	///
	/// Returns false when the wait was cancelled in the meantime.
	pub fn finish_pending(&mut self, id: &str) -> bool {
		self.pending.remove(id).is_some()
	}

	/// Cancels the wait for `id`, returning the widget name when it was pending.
	pub fn cancel(&mut self, id: &str) -> Option<String> {
		self.pending.remove(id)
	}

	/// Number of in-flight instances.
	pub fn pending_len(&self) -> usize {
		self.pending.len()
	}

	/// Registers a mounted instance.
	///
	/// # Errors
	///
	/// Returns [`RegistryError::DuplicateId`] when the id is already registered.
	pub fn insert(&mut self, instance: Rc<WidgetInstance<C>>) -> Result<(), RegistryError> {
		let id = instance.id().clone();
		if self.instances.contains_key(&id) {
			return Err(RegistryError::DuplicateId(id.to_string()));
		}
		self.instances.insert(id, instance);
		Ok(())
	}

	/// Removes and returns the instance registered under `id`.
	pub fn remove(&mut self, id: &str) -> Option<Rc<WidgetInstance<C>>> {
		self.instances.remove(id)
	}

	/// Returns the instance registered under `id`.
	pub fn get(&self, id: &str) -> Option<Rc<WidgetInstance<C>>> {
		self.instances.get(id).cloned()
	}

	/// Returns true when an instance is registered under `id`.
	pub fn contains(&self, id: &str) -> bool {
		self.instances.contains_key(id)
	}

	/// Number of mounted instances.
	pub fn len(&self) -> usize {
		self.instances.len()
	}

	/// Returns true when nothing is mounted.
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}

	/// Ids of every mounted instance, sorted.
	pub fn ids(&self) -> Vec<InstanceId> {
		let mut ids: Vec<InstanceId> = self.instances.keys().cloned().collect();
		ids.sort();
		ids
	}

	/// Every mounted instance.
	pub fn instances(&self) -> Vec<Rc<WidgetInstance<C>>> {
		self.instances.values().cloned().collect()
	}
}
