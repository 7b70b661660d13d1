//! Widget lifecycle engine for Reinhardt
//!
//! `reinhardt-widgets` binds behavior to marked elements of a live document
//! ([`reinhardt_dom`]). A marked element looks like this:
//!
//! ```text
//! <div data-widget="greeter" :name="Ada"></div>
//! ```
//!
//! The engine finds such elements under an observed root, stamps each with a
//! unique `data-widget-id`, decodes its `:`-prefixed attributes into typed
//! props, and runs the named behavior once. When the element leaves the
//! document, the teardown returned by the behavior runs once.
//!
//! ## Features
//!
//! - **Exactly-once binding**: the identity stamp is written before any wait
//! - **Typed props**: attribute text decoded into JSON values, deserializable
//!   into your own structs
//! - **Reactive props**: optional writeback of prop changes onto attributes,
//!   immediate or debounced, plus per-prop observable cells
//! - **Lazy behaviors**: load-once resolution through an async loader
//! - **Failure isolation**: one failing widget never stops its siblings
//! - **Lifecycle events**: mounted, destroyed, cancelled, failed
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_widgets::prelude::*;
//!
//! let config = WidgetsConfig::builder()
//!     .widget("greeter", |ctx, _helpers| {
//!         let name: String = ctx.props().get_as("name").unwrap_or_default();
//!         ctx.element().append_text(&format!("Hello, {}", name))?;
//!         Ok(None)
//!     })
//!     .build()?;
//!
//! let dispatcher = Dispatcher::start(&document, config)?;
//! dispatcher.settle().await;
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod helpers;
pub mod instance;
mod logging;
pub mod membrane;
pub mod props;
pub mod reactive;
pub mod registry;
pub mod resolver;
pub mod settings;

pub use config::{WidgetsConfig, WidgetsConfigBuilder};
pub use context::{PropEffect, WidgetContext};
pub use dispatcher::Dispatcher;
pub use error::{ObserveError, ObserveResult, RegistryError, ResolveError, WidgetError, WidgetResult};
pub use events::LifecycleEvent;
pub use helpers::{Helpers, State};
pub use instance::{
	Behavior, CapabilityFactory, IdAllocator, InstanceId, PendingWidget, Teardown, WidgetInstance,
	behavior, teardown,
};
pub use membrane::{Membrane, NotifyMode};
pub use props::{PropAttributes, Props};
pub use reactive::{Debouncer, Observable, Subscription, WeakObservable};
pub use registry::Registry;
pub use resolver::{HandlerResolver, LoadFuture, Loader, Resolution};
pub use settings::WidgetsSettings;

/// Commonly used types.
pub mod prelude {
	pub use crate::{
		Behavior, Dispatcher, Helpers, InstanceId, LifecycleEvent, Membrane, ObserveError,
		Observable, PropEffect, Props, ResolveError, Teardown, WidgetContext, WidgetError,
		WidgetResult, WidgetsConfig, WidgetsSettings, behavior, teardown,
	};
	pub use reinhardt_dom::{Document, Element, Node, WidgetBuilder};
}
