//! Mutation observers.
//!
//! A [`MutationObserver`] is attached to a target node with a set of
//! [`ObserveOptions`]. Every matching change is queued as a [`MutationRecord`]
//! on an unbounded channel. Consumers either drain the queue synchronously
//! with [`MutationObserver::take_records`] or await the next batch with
//! [`MutationObserver::next_batch`].
//!
//! A batch is "everything queued by the time the consumer wakes up": changes
//! made synchronously in one turn of the host's event loop arrive together,
//! in the order they were made.

use std::cell::RefCell;
use std::future::poll_fn;
use std::rc::{Rc, Weak};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::document::Tree;
use crate::node::{Element, Node, NodeId};

/// What an observer is interested in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
	/// Child insertions and removals.
	pub child_list: bool,
	/// Attribute changes.
	pub attributes: bool,
	/// Extend observation to the whole subtree of the target.
	pub subtree: bool,
}

impl ObserveOptions {
	/// Observe child insertions and removals of the target only.
	pub fn child_list() -> Self {
		Self {
			child_list: true,
			..Self::default()
		}
	}

	/// Observe attribute changes of the target only.
	pub fn attributes() -> Self {
		Self {
			attributes: true,
			..Self::default()
		}
	}

	/// Also observe attribute changes.
	pub fn with_attributes(mut self, attributes: bool) -> Self {
		self.attributes = attributes;
		self
	}

	/// Extend observation to the whole subtree.
	pub fn subtree(mut self) -> Self {
		self.subtree = true;
		self
	}
}

/// A single observed change.
#[derive(Debug, Clone)]
pub enum MutationRecord {
	/// Children were added to and/or removed from `target`.
	ChildList {
		/// The parent whose child list changed.
		target: Node,
		/// Nodes inserted under `target`.
		added: Vec<Node>,
		/// Nodes removed from `target`.
		removed: Vec<Node>,
	},
	/// Attribute `name` of `target` was set or removed.
	Attributes {
		/// The element whose attribute changed.
		target: Element,
		/// Lower-cased attribute name.
		name: String,
		/// Value before the change.
		old_value: Option<String>,
	},
}

impl MutationRecord {
	/// The node the change happened on.
	pub fn target(&self) -> &Node {
		match self {
			Self::ChildList { target, .. } => target,
			Self::Attributes { target, .. } => target.as_node(),
		}
	}

	/// Returns true for child list records.
	pub fn is_child_list(&self) -> bool {
		matches!(self, Self::ChildList { .. })
	}

	/// Added nodes (empty for attribute records).
	pub fn added_nodes(&self) -> &[Node] {
		match self {
			Self::ChildList { added, .. } => added,
			Self::Attributes { .. } => &[],
		}
	}

	/// Removed nodes (empty for attribute records).
	pub fn removed_nodes(&self) -> &[Node] {
		match self {
			Self::ChildList { removed, .. } => removed,
			Self::Attributes { .. } => &[],
		}
	}
}

/// Registration stored in the tree; owns the sending half of the channel.
pub(crate) struct Registration {
	pub(crate) id: u64,
	pub(crate) target: NodeId,
	pub(crate) options: ObserveOptions,
	pub(crate) sender: UnboundedSender<MutationRecord>,
}

/// Receives mutation records for one observed target.
///
/// Dropping the observer disconnects it.
pub struct MutationObserver {
	tree: Weak<RefCell<Tree>>,
	registration: u64,
	receiver: RefCell<UnboundedReceiver<MutationRecord>>,
}

impl MutationObserver {
	pub(crate) fn attach(tree: &Rc<RefCell<Tree>>, target: NodeId, options: ObserveOptions) -> Self {
		let (sender, receiver) = mpsc::unbounded_channel();
		let registration = tree.borrow_mut().register(target, options, sender);
		Self {
			tree: Rc::downgrade(tree),
			registration,
			receiver: RefCell::new(receiver),
		}
	}

	/// Drains every record queued so far without waiting.
	pub fn take_records(&self) -> Vec<MutationRecord> {
		let mut receiver = self.receiver.borrow_mut();
		let mut records = Vec::new();
		while let Ok(record) = receiver.try_recv() {
			records.push(record);
		}
		records
	}

	/// Waits for at least one record and returns everything queued.
	///
	/// Returns `None` once the observer is disconnected and drained.
	pub async fn next_batch(&self) -> Option<Vec<MutationRecord>> {
		let first = poll_fn(|cx| self.receiver.borrow_mut().poll_recv(cx)).await?;
		let mut batch = vec![first];
		batch.extend(self.take_records());
		Some(batch)
	}

	/// Stops queuing new records. Already queued records stay readable.
	pub fn disconnect(&self) {
		if let Some(tree) = self.tree.upgrade() {
			tree.borrow_mut().unregister(self.registration);
		}
	}

	/// Returns true until [`disconnect`](Self::disconnect) is called or the
	/// document is dropped.
	pub fn is_connected(&self) -> bool {
		self.tree.upgrade().is_some_and(|tree| {
			tree.borrow()
				.registrations
				.iter()
				.any(|registration| registration.id == self.registration)
		})
	}
}

impl Drop for MutationObserver {
	fn drop(&mut self) {
		self.disconnect();
	}
}

impl std::fmt::Debug for MutationObserver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MutationObserver")
			.field("registration", &self.registration)
			.field("connected", &self.is_connected())
			.finish()
	}
}
