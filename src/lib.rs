//! # Reinhardt Islands
//!
//! Interactive widget islands for Reinhardt.
//!
//! Server-rendered markup declares widgets with a marker attribute and
//! prefixed prop attributes. This crate watches a live document, binds each
//! marked element to its behavior exactly once, and tears it down exactly
//! once when the element leaves the document.
//!
//! ## Feature Flags
//!
//! - `widgets` (default) - Widget lifecycle engine ([`widgets`]). Without it,
//!   only the document model ([`dom`]) is available.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use reinhardt_islands::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct GreeterProps {
//!     name: String,
//! }
//!
//! let config = WidgetsConfig::builder()
//!     .widget("greeter", |ctx, _helpers| {
//!         let props: GreeterProps = ctx
//!             .props()
//!             .snapshot()
//!             .deserialize()
//!             .map_err(|e| WidgetError::custom(e.to_string()))?;
//!         ctx.element().append_text(&format!("Hello, {}", props.name))?;
//!         Ok(None)
//!     })
//!     .build()?;
//!
//! // <main data-widgets-root><div data-widget="greeter" :name="Ada"></div></main>
//! let dispatcher = Dispatcher::start(&document, config)?;
//! ```

pub mod dom;
#[cfg(feature = "widgets")]
pub mod widgets;

// Re-export the document model
pub use reinhardt_dom::{
	Document, DomError, DomResult, Element, MutationObserver, MutationRecord, Node,
	ObserveOptions, Selector, WidgetBuilder,
};

// Re-export the engine
#[cfg(feature = "widgets")]
pub use reinhardt_widgets::{
	Dispatcher, LifecycleEvent, ObserveError, ObserveResult, WidgetContext, WidgetError,
	WidgetResult, WidgetsConfig, WidgetsSettings,
};

/// Commonly used types.
pub mod prelude {
	pub use reinhardt_dom::{Document, Element, Node, ObserveOptions, WidgetBuilder};

	#[cfg(feature = "widgets")]
	pub use reinhardt_widgets::prelude::*;
}
