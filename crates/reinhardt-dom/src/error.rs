//! Document error types.

use thiserror::Error;

/// Result type for document operations.
pub type DomResult<T> = Result<T, DomError>;

/// Errors raised by the document model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DomError {
	/// The selector string is empty.
	#[error("empty selector")]
	EmptySelector,

	/// The selector contains a character the parser does not understand.
	#[error("unexpected character '{found}' at offset {offset} in selector '{selector}'")]
	UnexpectedCharacter {
		/// The full selector source.
		selector: String,
		/// The offending character.
		found: char,
		/// Byte offset of the offending character.
		offset: usize,
	},

	/// An attribute selector was opened with `[` but never closed.
	#[error("unterminated attribute selector in '{0}'")]
	UnterminatedAttribute(String),

	/// A node cannot become a child of itself or of one of its descendants.
	#[error("cannot insert a node into its own subtree")]
	HierarchyRequest,

	/// The node is not a child of the given parent.
	#[error("node is not a child of the given parent")]
	NotAChild,

	/// Text nodes cannot have children.
	#[error("text nodes cannot contain children")]
	NotAContainer,
}
