//! Widget name to behavior resolution.
//!
//! Eager behaviors resolve immediately. Everything else goes through the
//! configured [`Loader`], at most once per name:
//!
//! - concurrent resolutions of the same name share one in-flight load
//! - a successful load is cached for the lifetime of the resolver
//! - a failed load is reported to every waiter and then forgotten, so a
//!   later element with the same name retries

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use crate::error::ResolveError;
use crate::instance::Behavior;

/// Future produced by a [`Loader`].
pub type LoadFuture<C> = LocalBoxFuture<'static, Result<Behavior<C>, ResolveError>>;

/// Loads a behavior from its reference.
///
/// The reference is the `async_widgets` entry for the name, or the name itself
/// when there is none.
pub type Loader<C> = Rc<dyn Fn(&str) -> LoadFuture<C>>;

/// A load shared by every caller waiting on the same name.
pub type SharedLoad<C> = Shared<LoadFuture<C>>;

/// Outcome of [`HandlerResolver::resolve`].
pub enum Resolution<C> {
	/// The behavior is available now.
	Ready(Behavior<C>),
	/// The behavior is loading. Pass the load to [`HandlerResolver::finish`].
	Pending(SharedLoad<C>),
}

impl<C> fmt::Debug for Resolution<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Ready(_) => f.write_str("Ready"),
			Self::Pending(_) => f.write_str("Pending"),
		}
	}
}

/// Resolves widget names to behaviors with load-once caching.
pub struct HandlerResolver<C> {
	eager: HashMap<String, Behavior<C>>,
	references: HashMap<String, String>,
	loader: Option<Loader<C>>,
	cache: RefCell<HashMap<String, Behavior<C>>>,
	in_flight: RefCell<HashMap<String, SharedLoad<C>>>,
	loads: Cell<usize>,
}

impl<C: 'static> HandlerResolver<C> {
	/// Creates a resolver.
	///
	/// # Arguments
	///
	/// * `eager` - Behaviors available without loading
	/// * `references` - Loader reference per widget name
	/// * `loader` - Loader for names without an eager behavior
	pub fn new(
		eager: HashMap<String, Behavior<C>>,
		references: HashMap<String, String>,
		loader: Option<Loader<C>>,
	) -> Self {
		Self {
			eager,
			references,
			loader,
			cache: RefCell::new(HashMap::new()),
			in_flight: RefCell::new(HashMap::new()),
			loads: Cell::new(0),
		}
	}

	/// Returns true when `name` has an eager behavior.
	pub fn is_eager(&self, name: &str) -> bool {
		self.eager.contains_key(name)
	}

	/// Returns true when a loaded behavior for `name` is cached.
	pub fn is_cached(&self, name: &str) -> bool {
		self.cache.borrow().contains_key(name)
	}

	/// Returns true while a load for `name` is running.
	pub fn is_loading(&self, name: &str) -> bool {
		self.in_flight.borrow().contains_key(name)
	}

	/// Number of loads started so far.
	pub fn load_count(&self) -> usize {
		self.loads.get()
	}

	/// Resolves `name` without waiting.
	///
	/// # Errors
	///
	/// Returns [`ResolveError::UnknownWidget`] when `name` has no eager
	/// behavior and no loader is configured.
	pub fn resolve(&self, name: &str) -> Result<Resolution<C>, ResolveError> {
		if let Some(behavior) = self.eager.get(name) {
			return Ok(Resolution::Ready(behavior.clone()));
		}
		if let Some(behavior) = self.cache.borrow().get(name) {
			return Ok(Resolution::Ready(behavior.clone()));
		}
		if let Some(load) = self.in_flight.borrow().get(name) {
			return Ok(Resolution::Pending(load.clone()));
		}

		let Some(loader) = &self.loader else {
			return Err(ResolveError::UnknownWidget(name.to_string()));
		};
		let reference = self
			.references
			.get(name)
			.map(String::as_str)
			.unwrap_or(name);
		tracing::debug!(widget = name, reference, "loading widget behavior");

		let load = loader(reference).shared();
		self.in_flight
			.borrow_mut()
			.insert(name.to_string(), load.clone());
		self.loads.set(self.loads.get() + 1);
		Ok(Resolution::Pending(load))
	}

	/// Waits for a pending load and records its outcome.
	///
	/// Every waiter of the same load gets the same result.
	pub async fn finish(&self, name: &str, load: SharedLoad<C>) -> Result<Behavior<C>, ResolveError> {
		let result = load.clone().await;

		let mut in_flight = self.in_flight.borrow_mut();
		if in_flight
			.get(name)
			.is_some_and(|current| current.ptr_eq(&load))
		{
			in_flight.remove(name);
			if let Ok(behavior) = &result {
				self.cache
					.borrow_mut()
					.insert(name.to_string(), behavior.clone());
			}
		}
		result
	}

	/// Resolves `name`, waiting for a load when needed.
	///
	/// # Errors
	///
	/// Returns the resolution or load error.
	pub async fn resolve_async(&self, name: &str) -> Result<Behavior<C>, ResolveError> {
		match self.resolve(name)? {
			Resolution::Ready(behavior) => Ok(behavior),
			Resolution::Pending(load) => self.finish(name, load).await,
		}
	}
}

impl<C> fmt::Debug for HandlerResolver<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut eager: Vec<&String> = self.eager.keys().collect();
		eager.sort();
		f.debug_struct("HandlerResolver")
			.field("eager", &eager)
			.field("cached", &self.cache.borrow().len())
			.field("in_flight", &self.in_flight.borrow().len())
			.field("has_loader", &self.loader.is_some())
			.finish()
	}
}
