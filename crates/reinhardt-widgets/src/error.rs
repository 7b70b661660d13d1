//! Widget engine error types.
//!
//! Errors are split by the stage that produces them: resolving a behavior,
//! running it, tracking instances, and setting up observation.

use reinhardt_dom::DomError;
use thiserror::Error;

/// Result type returned by widget behaviors.
pub type WidgetResult<T> = Result<T, WidgetError>;

/// Result type for dispatcher setup.
pub type ObserveResult<T> = Result<T, ObserveError>;

/// Errors raised while mounting a single widget.
///
/// These never escape the dispatcher: they are logged and reported as a
/// [`LifecycleEvent::Failed`](crate::LifecycleEvent::Failed) while sibling
/// widgets keep processing.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum WidgetError {
	/// The behavior could not be resolved.
	#[error(transparent)]
	Resolve(#[from] ResolveError),

	/// The behavior returned an error or panicked.
	#[error("widget '{widget}' failed: {message}")]
	Behavior {
		/// Widget name.
		widget: String,
		/// Error message.
		message: String,
	},

	/// A document operation inside the behavior failed.
	#[error("document error: {0}")]
	Dom(#[from] DomError),

	/// The instance could not be registered.
	#[error(transparent)]
	Registry(#[from] RegistryError),

	/// Free-form error raised by behavior code.
	#[error("{0}")]
	Custom(String),
}

impl WidgetError {
	/// Creates a [`WidgetError::Custom`] from any message.
	pub fn custom(message: impl Into<String>) -> Self {
		Self::Custom(message.into())
	}
}

/// Errors raised while resolving a widget name to its behavior.
///
/// Cloneable because one failed load is shared by every element that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ResolveError {
	/// Neither an eager behavior nor a loader is available for the name.
	#[error("unknown widget: {0}")]
	UnknownWidget(String),

	/// The loader failed.
	#[error("failed to load widget '{widget}': {message}")]
	LoadFailed {
		/// Widget name.
		widget: String,
		/// Error message.
		message: String,
	},
}

impl ResolveError {
	/// Creates a [`ResolveError::LoadFailed`].
	pub fn load_failed(widget: impl Into<String>, message: impl Into<String>) -> Self {
		Self::LoadFailed {
			widget: widget.into(),
			message: message.into(),
		}
	}
}

/// Instance registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
	/// An instance with this id is already registered.
	#[error("instance already registered: {0}")]
	DuplicateId(String),
}

/// Errors raised while setting up a dispatcher.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ObserveError {
	/// No element matches the configured root selector.
	#[error("root element not found: {0}")]
	RootNotFound(String),

	/// A configured selector could not be parsed.
	#[error("invalid selector: {0}")]
	InvalidSelector(#[from] DomError),

	/// The settings are inconsistent or could not be parsed.
	#[error("invalid settings: {0}")]
	Settings(String),

	/// [`Dispatcher::init`](crate::Dispatcher::init) was called twice.
	#[error("dispatcher is already observing")]
	AlreadyObserving,
}

impl From<toml::de::Error> for ObserveError {
	fn from(error: toml::de::Error) -> Self {
		Self::Settings(error.to_string())
	}
}
