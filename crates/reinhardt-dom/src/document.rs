//! Document and arena storage.
//!
//! The [`Document`] owns a [`Tree`] arena shared (via `Rc<RefCell<..>>`) with
//! every [`Node`] handle created from it. Nodes are never deallocated while the
//! document is alive: a removed subtree simply becomes detached, which mirrors
//! how the browser keeps removed nodes reachable from mutation records.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::DomResult;
use crate::node::{Element, Node, NodeId};
use crate::observer::{MutationObserver, MutationRecord, ObserveOptions, Registration};
use crate::selector::Selector;

/// Tag name of the implicit document body.
pub const BODY_TAG: &str = "body";

/// Payload of a single arena slot.
#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
	/// Element with a lower-cased tag name and ordered attributes.
	Element {
		tag: String,
		attributes: Vec<(String, String)>,
	},
	/// Text node.
	Text(String),
}

/// Arena slot.
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
	pub(crate) kind: NodeKind,
	pub(crate) parent: Option<NodeId>,
	pub(crate) children: Vec<NodeId>,
}

impl NodeData {
	pub(crate) fn attribute(&self, name: &str) -> Option<&str> {
		match &self.kind {
			NodeKind::Element { attributes, .. } => attributes
				.iter()
				.find(|(key, _)| key == name)
				.map(|(_, value)| value.as_str()),
			NodeKind::Text(_) => None,
		}
	}

	pub(crate) fn tag(&self) -> Option<&str> {
		match &self.kind {
			NodeKind::Element { tag, .. } => Some(tag),
			NodeKind::Text(_) => None,
		}
	}
}

/// Arena holding every node of a document plus the observer registrations.
pub(crate) struct Tree {
	pub(crate) nodes: Vec<NodeData>,
	pub(crate) registrations: Vec<Registration>,
	pub(crate) body: NodeId,
	next_registration: u64,
}

impl Tree {
	fn new() -> Self {
		let mut tree = Self {
			nodes: Vec::new(),
			registrations: Vec::new(),
			body: NodeId(0),
			next_registration: 0,
		};
		tree.body = tree.alloc(NodeKind::Element {
			tag: BODY_TAG.to_string(),
			attributes: Vec::new(),
		});
		tree
	}

	pub(crate) fn alloc(&mut self, kind: NodeKind) -> NodeId {
		let id = NodeId(self.nodes.len() as u32);
		self.nodes.push(NodeData {
			kind,
			parent: None,
			children: Vec::new(),
		});
		id
	}

	pub(crate) fn data(&self, id: NodeId) -> &NodeData {
		&self.nodes[id.index()]
	}

	pub(crate) fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
		&mut self.nodes[id.index()]
	}

	/// Returns true when `ancestor` is `node` or one of its ancestors.
	pub(crate) fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
		let mut current = Some(node);
		while let Some(id) = current {
			if id == ancestor {
				return true;
			}
			current = self.data(id).parent;
		}
		false
	}

	/// Pre-order descendants of `id`, excluding `id` itself.
	pub(crate) fn descendants(&self, id: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack: Vec<NodeId> = self.data(id).children.iter().rev().copied().collect();
		while let Some(next) = stack.pop() {
			out.push(next);
			stack.extend(self.data(next).children.iter().rev().copied());
		}
		out
	}

	pub(crate) fn text_content(&self, id: NodeId) -> String {
		match &self.data(id).kind {
			NodeKind::Text(text) => text.clone(),
			NodeKind::Element { .. } => self
				.descendants(id)
				.into_iter()
				.filter_map(|child| match &self.data(child).kind {
					NodeKind::Text(text) => Some(text.as_str()),
					NodeKind::Element { .. } => None,
				})
				.collect(),
		}
	}

	pub(crate) fn register(
		&mut self,
		target: NodeId,
		options: ObserveOptions,
		sender: UnboundedSender<MutationRecord>,
	) -> u64 {
		let id = self.next_registration;
		self.next_registration += 1;
		self.registrations.push(Registration {
			id,
			target,
			options,
			sender,
		});
		id
	}

	pub(crate) fn unregister(&mut self, id: u64) -> bool {
		let before = self.registrations.len();
		self.registrations.retain(|registration| registration.id != id);
		before != self.registrations.len()
	}

	/// Senders of every registration interested in a record targeting `target`.
	pub(crate) fn interested(
		&self,
		target: NodeId,
		attributes: bool,
	) -> Vec<UnboundedSender<MutationRecord>> {
		self.registrations
			.iter()
			.filter(|registration| {
				let wanted = if attributes {
					registration.options.attributes
				} else {
					registration.options.child_list
				};
				let in_scope = registration.target == target
					|| (registration.options.subtree
						&& self.is_inclusive_ancestor(registration.target, target));
				wanted && in_scope
			})
			.map(|registration| registration.sender.clone())
			.collect()
	}
}

/// A live document.
///
/// Cloning a `Document` is cheap and yields another handle to the same tree.
#[derive(Clone)]
pub struct Document {
	tree: Rc<RefCell<Tree>>,
}

impl Document {
	/// Creates an empty document containing only a `<body>` element.
	pub fn new() -> Self {
		Self {
			tree: Rc::new(RefCell::new(Tree::new())),
		}
	}

	pub(crate) fn from_tree(tree: Rc<RefCell<Tree>>) -> Self {
		Self { tree }
	}

	/// Returns the `<body>` element.
	pub fn body(&self) -> Element {
		let body = self.tree.borrow().body;
		Element::from_node(Node::new(self.tree.clone(), body))
	}

	/// Creates a detached element.
	///
	/// # Arguments
	///
	/// * `tag` - Tag name, stored lower-cased
	pub fn create_element(&self, tag: &str) -> Element {
		let id = self.tree.borrow_mut().alloc(NodeKind::Element {
			tag: tag.to_ascii_lowercase(),
			attributes: Vec::new(),
		});
		Element::from_node(Node::new(self.tree.clone(), id))
	}

	/// Creates a detached text node.
	pub fn create_text_node(&self, text: &str) -> Node {
		let id = self
			.tree
			.borrow_mut()
			.alloc(NodeKind::Text(text.to_string()));
		Node::new(self.tree.clone(), id)
	}

	/// Returns the first element below `<body>` matching `selector`.
	///
	/// # Errors
	///
	/// Returns an error if the selector cannot be parsed.
	pub fn query_selector(&self, selector: &str) -> DomResult<Option<Element>> {
		self.body().query_selector(selector)
	}

	/// Returns every element below `<body>` matching `selector`, in document order.
	///
	/// # Errors
	///
	/// Returns an error if the selector cannot be parsed.
	pub fn query_selector_all(&self, selector: &str) -> DomResult<Vec<Element>> {
		self.body().query_selector_all(selector)
	}

	/// Starts observing `target` and returns the observer handle.
	///
	/// Records are queued from the moment this returns. Dropping the returned
	/// observer disconnects it.
	pub fn observe(&self, target: &Node, options: ObserveOptions) -> MutationObserver {
		MutationObserver::attach(&self.tree, target.id(), options)
	}

	/// Compiles a selector, for callers that match repeatedly.
	///
	/// # Errors
	///
	/// Returns an error if the selector cannot be parsed.
	pub fn selector(&self, selector: &str) -> DomResult<Selector> {
		Selector::parse(selector)
	}

	/// Returns true when both handles refer to the same document.
	pub fn ptr_eq(&self, other: &Document) -> bool {
		Rc::ptr_eq(&self.tree, &other.tree)
	}
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tree = self.tree.borrow();
		f.debug_struct("Document")
			.field("nodes", &tree.nodes.len())
			.field("observers", &tree.registrations.len())
			.finish()
	}
}
