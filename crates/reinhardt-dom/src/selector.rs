//! Selector parsing and matching.
//!
//! Supported grammar (no combinators):
//!
//! ```text
//! selector-list := compound ( "," compound )*
//! compound      := ( tag | "*" )? ( "#" id | "." class | "[" attribute "]" )*
//! attribute     := name ( "=" ( ident | "'" text "'" | "\"" text "\"" ) )?
//! ```
//!
//! This covers every selector the widget engine needs (`[data-widget]`,
//! `[data-widgets-root]`, `#app`, `div.card`), while staying small.

use std::fmt;
use std::str::FromStr;

use crate::document::NodeData;
use crate::error::{DomError, DomResult};

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatcher {
	name: String,
	value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
	tag: Option<String>,
	id: Option<String>,
	classes: Vec<String>,
	attributes: Vec<AttributeMatcher>,
}

impl Compound {
	fn matches(&self, data: &NodeData) -> bool {
		let Some(tag) = data.tag() else {
			return false;
		};
		if self.tag.as_deref().is_some_and(|expected| expected != tag) {
			return false;
		}
		if let Some(id) = &self.id {
			if data.attribute("id") != Some(id.as_str()) {
				return false;
			}
		}
		if !self.classes.is_empty() {
			let class_attr = data.attribute("class").unwrap_or_default();
			let present: Vec<&str> = class_attr.split_whitespace().collect();
			if !self.classes.iter().all(|class| present.contains(&class.as_str())) {
				return false;
			}
		}
		self.attributes.iter().all(|matcher| {
			match (data.attribute(&matcher.name), &matcher.value) {
				(None, _) => false,
				(Some(_), None) => true,
				(Some(actual), Some(expected)) => actual == expected,
			}
		})
	}
}

/// A compiled selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
	source: String,
	alternatives: Vec<Compound>,
}

impl Selector {
	/// Parses a selector list.
	///
	/// # Errors
	///
	/// Returns an error for empty selectors, combinators, or malformed
	/// attribute selectors.
	///
	/// # Example
	///
	/// ```ignore
	/// let selector = Selector::parse("div.card[data-widget='tabs'], #app")?;
	/// ```
	pub fn parse(source: &str) -> DomResult<Self> {
		let mut alternatives = Vec::new();
		for (offset, part) in split_top_level(source)? {
			alternatives.push(parse_compound(source, part, offset)?);
		}
		Ok(Self {
			source: source.to_string(),
			alternatives,
		})
	}

	/// Builds a selector matching elements that carry attribute `name`.
	pub fn has_attribute(name: &str) -> Self {
		Self {
			source: format!("[{}]", name),
			alternatives: vec![Compound {
				attributes: vec![AttributeMatcher {
					name: name.to_ascii_lowercase(),
					value: None,
				}],
				..Compound::default()
			}],
		}
	}

	/// Returns the attribute name when the selector is a lone attribute
	/// selector such as `[data-widget]` or `[data-widget='tabs']`.
	pub fn sole_attribute(&self) -> Option<&str> {
		match self.alternatives.as_slice() {
			[Compound {
				tag: None,
				id: None,
				classes,
				attributes,
			}] if classes.is_empty() => match attributes.as_slice() {
				[matcher] => Some(matcher.name.as_str()),
				_ => None,
			},
			_ => None,
		}
	}

	/// Returns the source text of the selector.
	pub fn as_str(&self) -> &str {
		&self.source
	}

	pub(crate) fn matches_data(&self, data: &NodeData) -> bool {
		self.alternatives.iter().any(|compound| compound.matches(data))
	}
}

impl FromStr for Selector {
	type Err = DomError;

	fn from_str(source: &str) -> Result<Self, Self::Err> {
		Self::parse(source)
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.source)
	}
}

/// Splits on commas outside of brackets and quotes, trimming each part.
fn split_top_level(source: &str) -> DomResult<Vec<(usize, &str)>> {
	let mut parts = Vec::new();
	let mut start = 0;
	let mut depth = 0usize;
	let mut quote: Option<char> = None;

	for (index, ch) in source.char_indices() {
		match (quote, ch) {
			(Some(open), c) if c == open => quote = None,
			(Some(_), _) => {}
			(None, '\'' | '"') => quote = Some(ch),
			(None, '[') => depth += 1,
			(None, ']') => depth = depth.saturating_sub(1),
			(None, ',') if depth == 0 => {
				parts.push((start, &source[start..index]));
				start = index + 1;
			}
			_ => {}
		}
	}
	parts.push((start, &source[start..]));

	parts
		.into_iter()
		.map(|(offset, part)| {
			let trimmed = part.trim_start();
			let offset = offset + (part.len() - trimmed.len());
			let trimmed = trimmed.trim_end();
			if trimmed.is_empty() {
				Err(DomError::EmptySelector)
			} else {
				Ok((offset, trimmed))
			}
		})
		.collect()
}

fn is_name_char(ch: char, allow_colon: bool) -> bool {
	ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || (allow_colon && ch == ':')
}

fn read_name(chars: &[(usize, char)], start: usize, allow_colon: bool) -> (String, usize) {
	let mut end = start;
	while end < chars.len() && is_name_char(chars[end].1, allow_colon) {
		end += 1;
	}
	(chars[start..end].iter().map(|(_, ch)| *ch).collect(), end)
}

fn parse_compound(source: &str, part: &str, base: usize) -> DomResult<Compound> {
	let chars: Vec<(usize, char)> = part.char_indices().collect();
	let unexpected = |index: usize| {
		let (offset, found) = chars
			.get(index)
			.copied()
			.unwrap_or((part.len(), ' '));
		DomError::UnexpectedCharacter {
			selector: source.to_string(),
			found,
			offset: base + offset,
		}
	};

	let mut compound = Compound::default();
	let mut index = 0;

	let (tag, next) = read_name(&chars, 0, false);
	if !tag.is_empty() {
		compound.tag = Some(tag.to_ascii_lowercase());
		index = next;
	} else if chars.first().map(|(_, ch)| *ch) == Some('*') {
		index = 1;
	}

	while index < chars.len() {
		match chars[index].1 {
			'#' | '.' => {
				let (name, next) = read_name(&chars, index + 1, false);
				if name.is_empty() {
					return Err(unexpected(index + 1));
				}
				if chars[index].1 == '#' {
					compound.id = Some(name);
				} else {
					compound.classes.push(name);
				}
				index = next;
			}
			'[' => {
				let (matcher, next) = parse_attribute(source, &chars, index, &unexpected)?;
				compound.attributes.push(matcher);
				index = next;
			}
			_ => return Err(unexpected(index)),
		}
	}

	Ok(compound)
}

fn parse_attribute(
	source: &str,
	chars: &[(usize, char)],
	open: usize,
	unexpected: &dyn Fn(usize) -> DomError,
) -> DomResult<(AttributeMatcher, usize)> {
	let (name, mut index) = read_name(chars, open + 1, true);
	if name.is_empty() {
		return Err(unexpected(open + 1));
	}

	let mut value = None;
	if chars.get(index).map(|(_, ch)| *ch) == Some('=') {
		index += 1;
		match chars.get(index).map(|(_, ch)| *ch) {
			Some(quote @ ('\'' | '"')) => {
				let start = index + 1;
				let mut end = start;
				while end < chars.len() && chars[end].1 != quote {
					end += 1;
				}
				if end >= chars.len() {
					return Err(DomError::UnterminatedAttribute(source.to_string()));
				}
				value = Some(chars[start..end].iter().map(|(_, ch)| *ch).collect());
				index = end + 1;
			}
			Some(_) => {
				let (bare, next) = read_name(chars, index, true);
				if bare.is_empty() {
					return Err(unexpected(index));
				}
				value = Some(bare);
				index = next;
			}
			None => return Err(DomError::UnterminatedAttribute(source.to_string())),
		}
	}

	match chars.get(index).map(|(_, ch)| *ch) {
		Some(']') => Ok((
			AttributeMatcher {
				name: name.to_ascii_lowercase(),
				value,
			},
			index + 1,
		)),
		Some(_) => Err(unexpected(index)),
		None => Err(DomError::UnterminatedAttribute(source.to_string())),
	}
}
