//! Live document tree for Reinhardt widgets
//!
//! `reinhardt-dom` is a small, single-threaded, arena-backed document model
//! that stands in for the browser DOM. It exists so that the widget engine in
//! `reinhardt-widgets` can observe a *live* tree, exactly like it would observe
//! server-rendered markup in the browser, without needing a JavaScript host.
//!
//! ## Features
//!
//! - **Arena storage**: nodes live in one `Vec`, handles are `(document, NodeId)`
//! - **Elements and text**: attributes, children, text content
//! - **Selectors**: compound selectors (`div.card[data-widget='tabs']`) and lists
//! - **Mutation observers**: structural and attribute changes delivered as
//!   batches of [`MutationRecord`]s through an async channel
//! - **Widget builder**: the `createWidget` helper for marked elements
//!
//! ## Architecture
//!
//! ```text
//! Document ──owns──▶ Tree (arena) ──notifies──▶ MutationObserver (channel)
//!    │                    ▲
//!    └── Node / Element ──┘ (cheap handles, Rc + NodeId)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_dom::{Document, ObserveOptions};
//!
//! let document = Document::new();
//! let root = document.create_element("main");
//! document.body().append_child(&root);
//!
//! let observer = document.observe(&root, ObserveOptions::child_list().subtree());
//! let widget = document.create_element("div");
//! widget.set_attribute("data-widget", "greeter");
//! root.append_child(&widget);
//!
//! let records = observer.take_records();
//! assert_eq!(records.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod document;
pub mod error;
pub mod node;
pub mod observer;
pub mod selector;

pub use builder::WidgetBuilder;
pub use document::Document;
pub use error::{DomError, DomResult};
pub use node::{Element, Node, NodeId};
pub use observer::{MutationObserver, MutationRecord, ObserveOptions};
pub use selector::Selector;
