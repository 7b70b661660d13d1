//! Widget lifecycle engine
//!
//! This module provides access to reinhardt-widgets.
//!
//! ## Architecture
//!
//! - **Dispatcher**: observes a root and drives binding and teardown
//! - **Props**: attribute text decoded into typed values, optionally written back
//! - **Resolver**: eager behaviors plus load-once async behaviors
//! - **Registry**: live instances by id
//!
//! ## Example
//!
//! ```rust,ignore
//! use reinhardt_islands::widgets::{Dispatcher, WidgetsConfig};
//!
//! let config = WidgetsConfig::builder()
//!     .reactive_props(true)
//!     .widget("counter", |ctx, helpers| {
//!         let count = ctx.prop_effect("count");
//!         let label = helpers.qs("span")?;
//!         count
//!             .subscribe(move |value| {
//!                 if let Some(label) = &label {
//!                     label.set_text_content(&value.to_string());
//!                 }
//!             })
//!             .detach();
//!         Ok(None)
//!     })
//!     .build()?;
//! let dispatcher = Dispatcher::start(&document, config)?;
//! ```

pub use reinhardt_widgets::*;
