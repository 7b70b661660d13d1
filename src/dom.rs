//! Live document model
//!
//! This module provides access to reinhardt-dom: an in-memory element tree
//! with selector queries and mutation observers.
//!
//! ## Example
//!
//! ```rust,ignore
//! use reinhardt_islands::dom::{Document, ObserveOptions, WidgetBuilder};
//!
//! let document = Document::new();
//! let root = document.create_element("main");
//! document.body().append_child(&root)?;
//!
//! let observer = document.observe(&root, ObserveOptions::child_list().subtree());
//! root.append_child(&WidgetBuilder::new().name("greeter").build(&document))?;
//! assert_eq!(observer.take_records().len(), 1);
//! ```

pub use reinhardt_dom::*;
