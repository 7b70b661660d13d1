//! Node and element handles.
//!
//! A [`Node`] is a cheap, cloneable handle (`Rc` to the tree plus a [`NodeId`]).
//! Handles never own the structure: removing a node from its parent leaves
//! every handle valid, the node is simply detached.
//!
//! Every structural or attribute change is reported to the interested
//! [`MutationObserver`](crate::MutationObserver)s after the tree borrow has been
//! released, so observers never see a half-applied change.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

use crate::document::{Document, NodeKind, Tree};
use crate::error::{DomError, DomResult};
use crate::observer::MutationRecord;
use crate::selector::Selector;

/// Index of a node inside its document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
	/// Returns the raw arena index.
	#[inline]
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

/// Handle to any node (element or text).
#[derive(Clone)]
pub struct Node {
	tree: Rc<RefCell<Tree>>,
	id: NodeId,
}

impl Node {
	pub(crate) fn new(tree: Rc<RefCell<Tree>>, id: NodeId) -> Self {
		Self { tree, id }
	}

	fn sibling(&self, id: NodeId) -> Node {
		Node::new(self.tree.clone(), id)
	}

	/// Returns the arena id of this node.
	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Returns the document this node belongs to.
	pub fn document(&self) -> Document {
		Document::from_tree(self.tree.clone())
	}

	/// Returns true for element nodes.
	pub fn is_element(&self) -> bool {
		matches!(
			self.tree.borrow().data(self.id).kind,
			NodeKind::Element { .. }
		)
	}

	/// Returns an element handle when this node is an element.
	pub fn as_element(&self) -> Option<Element> {
		self.is_element().then(|| Element(self.clone()))
	}

	/// Returns the parent node, if attached.
	pub fn parent(&self) -> Option<Node> {
		let parent = self.tree.borrow().data(self.id).parent;
		parent.map(|id| self.sibling(id))
	}

	/// Returns the parent element, if attached.
	pub fn parent_element(&self) -> Option<Element> {
		self.parent().and_then(|parent| parent.as_element())
	}

	/// Returns the direct children, including text nodes.
	pub fn child_nodes(&self) -> Vec<Node> {
		let children = self.tree.borrow().data(self.id).children.clone();
		children.into_iter().map(|id| self.sibling(id)).collect()
	}

	/// Returns the direct element children.
	pub fn children(&self) -> Vec<Element> {
		self.child_nodes()
			.into_iter()
			.filter_map(|node| node.as_element())
			.collect()
	}

	/// Returns every descendant in document order, excluding this node.
	pub fn descendants(&self) -> Vec<Node> {
		let ids = self.tree.borrow().descendants(self.id);
		ids.into_iter().map(|id| self.sibling(id)).collect()
	}

	/// Returns true when `other` is this node or one of its descendants.
	pub fn contains(&self, other: &Node) -> bool {
		Rc::ptr_eq(&self.tree, &other.tree)
			&& self.tree.borrow().is_inclusive_ancestor(self.id, other.id)
	}

	/// Returns true when the node is attached under the document body.
	pub fn is_connected(&self) -> bool {
		let tree = self.tree.borrow();
		tree.is_inclusive_ancestor(tree.body, self.id)
	}

	/// Concatenated text of this node and all of its descendants.
	pub fn text_content(&self) -> String {
		self.tree.borrow().text_content(self.id)
	}

	/// Appends `child` as the last child of this node.
	///
	/// A child that is already attached elsewhere is moved, producing a removal
	/// record on its old parent followed by an addition record here.
	///
	/// # Errors
	///
	/// Returns an error if this node is a text node or if `child` is an
	/// inclusive ancestor of this node.
	pub fn append_child(&self, child: &Node) -> DomResult<()> {
		if !self.is_element() {
			return Err(DomError::NotAContainer);
		}
		if !Rc::ptr_eq(&self.tree, &child.tree)
			|| self.tree.borrow().is_inclusive_ancestor(child.id, self.id)
		{
			return Err(DomError::HierarchyRequest);
		}
		if let Some(old_parent) = child.parent() {
			old_parent.remove_child(child)?;
		}

		self.tree.borrow_mut().data_mut(self.id).children.push(child.id);
		self.tree.borrow_mut().data_mut(child.id).parent = Some(self.id);

		self.dispatch(MutationRecord::ChildList {
			target: self.clone(),
			added: vec![child.clone()],
			removed: Vec::new(),
		});
		Ok(())
	}

	/// Removes `child` from this node.
	///
	/// # Errors
	///
	/// Returns [`DomError::NotAChild`] if `child` is not a direct child.
	pub fn remove_child(&self, child: &Node) -> DomResult<()> {
		{
			let mut tree = self.tree.borrow_mut();
			let children = &mut tree.data_mut(self.id).children;
			let Some(position) = children.iter().position(|id| *id == child.id) else {
				return Err(DomError::NotAChild);
			};
			children.remove(position);
			tree.data_mut(child.id).parent = None;
		}

		self.dispatch(MutationRecord::ChildList {
			target: self.clone(),
			added: Vec::new(),
			removed: vec![child.clone()],
		});
		Ok(())
	}

	/// Detaches this node from its parent. Detached nodes are left untouched.
	pub fn remove(&self) {
		if let Some(parent) = self.parent() {
			// The parent link was just read, so this cannot fail.
			let _ = parent.remove_child(self);
		}
	}

	/// Replaces all children with a single text node (elements) or replaces
	/// the text data (text nodes).
	pub fn set_text_content(&self, text: &str) {
		let removed = {
			let mut tree = self.tree.borrow_mut();
			if let NodeKind::Text(data) = &mut tree.data_mut(self.id).kind {
				*data = text.to_string();
				return;
			}
			let removed = std::mem::take(&mut tree.data_mut(self.id).children);
			for id in &removed {
				tree.data_mut(*id).parent = None;
			}
			removed
		};

		let mut added = Vec::new();
		if !text.is_empty() {
			let mut tree = self.tree.borrow_mut();
			let id = tree.alloc(NodeKind::Text(text.to_string()));
			tree.data_mut(id).parent = Some(self.id);
			tree.data_mut(self.id).children.push(id);
			added.push(self.sibling(id));
		}

		if removed.is_empty() && added.is_empty() {
			return;
		}
		self.dispatch(MutationRecord::ChildList {
			target: self.clone(),
			added,
			removed: removed.into_iter().map(|id| self.sibling(id)).collect(),
		});
	}

	/// Appends a new text node.
	///
	/// # Errors
	///
	/// Returns [`DomError::NotAContainer`] when called on a text node.
	pub fn append_text(&self, text: &str) -> DomResult<Node> {
		let node = self.document().create_text_node(text);
		self.append_child(&node)?;
		Ok(node)
	}

	fn dispatch(&self, record: MutationRecord) {
		let (target, attributes) = match &record {
			MutationRecord::ChildList { target, .. } => (target.id, false),
			MutationRecord::Attributes { target, .. } => (target.id(), true),
		};
		let senders = self.tree.borrow().interested(target, attributes);
		for sender in senders {
			// A closed channel belongs to an observer being dropped.
			let _ = sender.send(record.clone());
		}
	}
}

impl PartialEq for Node {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
	}
}

impl Eq for Node {}

impl Hash for Node {
	fn hash<H: Hasher>(&self, state: &mut H) {
		Rc::as_ptr(&self.tree).hash(state);
		self.id.hash(state);
	}
}

impl fmt::Debug for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tree = self.tree.borrow();
		match &tree.data(self.id).kind {
			NodeKind::Element { tag, attributes } => {
				write!(f, "<{}", tag)?;
				for (name, value) in attributes {
					write!(f, " {}=\"{}\"", name, value)?;
				}
				write!(f, ">")
			}
			NodeKind::Text(text) => write!(f, "#text {:?}", text),
		}
	}
}

/// Handle to an element node.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Element(Node);

impl Element {
	pub(crate) fn from_node(node: Node) -> Self {
		Self(node)
	}

	/// Returns the underlying node handle.
	pub fn as_node(&self) -> &Node {
		&self.0
	}

	/// Lower-cased tag name.
	pub fn tag_name(&self) -> String {
		self.0
			.tree
			.borrow()
			.data(self.0.id)
			.tag()
			.unwrap_or_default()
			.to_string()
	}

	/// Returns the value of attribute `name`.
	pub fn get_attribute(&self, name: &str) -> Option<String> {
		let name = name.to_ascii_lowercase();
		self.0
			.tree
			.borrow()
			.data(self.0.id)
			.attribute(&name)
			.map(str::to_string)
	}

	/// Returns true when attribute `name` is present.
	pub fn has_attribute(&self, name: &str) -> bool {
		self.get_attribute(name).is_some()
	}

	/// Returns every attribute in insertion order.
	pub fn attributes(&self) -> Vec<(String, String)> {
		match &self.0.tree.borrow().data(self.0.id).kind {
			NodeKind::Element { attributes, .. } => attributes.clone(),
			NodeKind::Text(_) => Vec::new(),
		}
	}

	/// Sets attribute `name` to `value`.
	///
	/// An attribute record is queued even when the value does not change,
	/// like the browser does.
	pub fn set_attribute(&self, name: &str, value: &str) {
		let name = name.to_ascii_lowercase();
		let old_value = {
			let mut tree = self.0.tree.borrow_mut();
			let NodeKind::Element { attributes, .. } = &mut tree.data_mut(self.0.id).kind else {
				return;
			};
			match attributes.iter_mut().find(|(key, _)| *key == name) {
				Some((_, existing)) => Some(std::mem::replace(existing, value.to_string())),
				None => {
					attributes.push((name.clone(), value.to_string()));
					None
				}
			}
		};

		self.0.dispatch(MutationRecord::Attributes {
			target: self.clone(),
			name,
			old_value,
		});
	}

	/// Removes attribute `name`, returning its previous value.
	pub fn remove_attribute(&self, name: &str) -> Option<String> {
		let name = name.to_ascii_lowercase();
		let old_value = {
			let mut tree = self.0.tree.borrow_mut();
			let NodeKind::Element { attributes, .. } = &mut tree.data_mut(self.0.id).kind else {
				return None;
			};
			let position = attributes.iter().position(|(key, _)| *key == name)?;
			attributes.remove(position).1
		};

		self.0.dispatch(MutationRecord::Attributes {
			target: self.clone(),
			name,
			old_value: Some(old_value.clone()),
		});
		Some(old_value)
	}

	/// Adds `class` to the `class` attribute if not already present.
	pub fn add_class(&self, class: &str) {
		let current = self.get_attribute("class").unwrap_or_default();
		if current.split_whitespace().any(|existing| existing == class) {
			return;
		}
		let updated = if current.trim().is_empty() {
			class.to_string()
		} else {
			format!("{} {}", current.trim(), class)
		};
		self.set_attribute("class", &updated);
	}

	/// Returns true when this element matches `selector`.
	pub fn matches(&self, selector: &Selector) -> bool {
		selector.matches_data(self.0.tree.borrow().data(self.0.id))
	}

	/// Descendant elements matching a compiled selector, in document order.
	pub fn select(&self, selector: &Selector) -> Vec<Element> {
		let tree = self.0.tree.borrow();
		tree.descendants(self.0.id)
			.into_iter()
			.filter(|id| selector.matches_data(tree.data(*id)))
			.map(|id| Element(self.0.sibling(id)))
			.collect()
	}

	/// First descendant element matching a compiled selector.
	pub fn select_first(&self, selector: &Selector) -> Option<Element> {
		let tree = self.0.tree.borrow();
		tree.descendants(self.0.id)
			.into_iter()
			.find(|id| selector.matches_data(tree.data(*id)))
			.map(|id| Element(self.0.sibling(id)))
	}

	/// First descendant element matching `selector`.
	///
	/// # Errors
	///
	/// Returns an error if the selector cannot be parsed.
	pub fn query_selector(&self, selector: &str) -> DomResult<Option<Element>> {
		let selector = Selector::parse(selector)?;
		Ok(self.select_first(&selector))
	}

	/// All descendant elements matching `selector`.
	///
	/// # Errors
	///
	/// Returns an error if the selector cannot be parsed.
	pub fn query_selector_all(&self, selector: &str) -> DomResult<Vec<Element>> {
		let selector = Selector::parse(selector)?;
		Ok(self.select(&selector))
	}
}

impl Deref for Element {
	type Target = Node;

	fn deref(&self) -> &Node {
		&self.0
	}
}

impl From<Element> for Node {
	fn from(element: Element) -> Self {
		element.0
	}
}

impl AsRef<Node> for Element {
	fn as_ref(&self) -> &Node {
		&self.0
	}
}

impl fmt::Debug for Element {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&self.0, f)
	}
}
