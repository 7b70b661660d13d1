//! Read-only view of a widget handed to its behavior and capability factory.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use reinhardt_dom::Element;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::{decode, encode, normalize_key};
use crate::instance::InstanceId;
use crate::membrane::Membrane;
use crate::props::{PropAttributes, Props};
use crate::reactive::{Observable, Subscription};

/// Link between a widget's props and its element attributes.
pub(crate) struct PropBindings {
	element: Element,
	attributes: RefCell<PropAttributes>,
	cells: RefCell<BTreeMap<String, Observable<Value>>>,
}

impl PropBindings {
	pub(crate) fn new(element: Element, attributes: PropAttributes) -> Rc<Self> {
		Rc::new(Self {
			element,
			attributes: RefCell::new(attributes),
			cells: RefCell::new(BTreeMap::new()),
		})
	}

	pub(crate) fn key_for(&self, attribute: &str) -> Option<String> {
		self.attributes.borrow().key_for(attribute)
	}

	pub(crate) fn remember(&self, key: &str, attribute: &str) {
		self.attributes.borrow_mut().remember(key, attribute);
	}

	/// Serializes every prop onto the element and drops attributes of props
	/// that no longer exist. Unchanged attributes are not touched.
	pub(crate) fn write_all(&self, props: &Props) {
		let (writes, removals) = {
			let mut attributes = self.attributes.borrow_mut();
			let writes: Vec<(String, String)> = props
				.iter()
				.map(|(key, value)| {
					let name = attributes.attribute_for(key);
					attributes.remember(key.clone(), name.clone());
					(name, encode(value))
				})
				.collect();
			let removals: Vec<String> = attributes
				.known()
				.filter(|(key, _)| !props.contains_key(key))
				.map(|(_, name)| name.to_string())
				.collect();
			(writes, removals)
		};

		for (name, text) in writes {
			if self.element.get_attribute(&name).as_deref() != Some(text.as_str()) {
				self.element.set_attribute(&name, &text);
			}
		}
		for name in removals {
			if self.element.has_attribute(&name) {
				self.element.remove_attribute(&name);
			}
		}
		for (key, value) in props {
			self.sync_cell(key, value.clone());
		}
	}

	/// Writes a single prop attribute.
	pub(crate) fn write_one(&self, key: &str, value: &Value) {
		let name = {
			let mut attributes = self.attributes.borrow_mut();
			let name = attributes.attribute_for(key);
			attributes.remember(key, name.clone());
			name
		};
		let text = encode(value);
		if self.element.get_attribute(&name).as_deref() != Some(text.as_str()) {
			self.element.set_attribute(&name, &text);
		}
	}

	pub(crate) fn cell(&self, key: &str, seed: impl FnOnce() -> Value) -> Observable<Value> {
		self.cells
			.borrow_mut()
			.entry(key.to_string())
			.or_insert_with(|| Observable::new(seed()))
			.clone()
	}

	/// Pushes `value` into the cell for `key`, if one was created.
	pub(crate) fn sync_cell(&self, key: &str, value: Value) {
		let cell = self.cells.borrow().get(key).cloned();
		if let Some(cell) = cell {
			cell.set_if_changed(value);
		}
	}
}

/// What a behavior knows about the widget it is bound to.
///
/// Cloning is cheap; clones share props and element.
#[derive(Clone)]
pub struct WidgetContext {
	id: InstanceId,
	name: String,
	element: Element,
	props: Membrane,
	bindings: Rc<PropBindings>,
}

impl WidgetContext {
	pub(crate) fn new(
		id: InstanceId,
		name: String,
		element: Element,
		props: Membrane,
		bindings: Rc<PropBindings>,
	) -> Self {
		Self {
			id,
			name,
			element,
			props,
			bindings,
		}
	}

	/// The instance id stamped on the element.
	pub fn id(&self) -> &InstanceId {
		&self.id
	}

	/// The widget name from the marker attribute.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The bound element.
	pub fn element(&self) -> &Element {
		&self.element
	}

	/// The widget's props.
	pub fn props(&self) -> &Membrane {
		&self.props
	}

	pub(crate) fn bindings(&self) -> &Rc<PropBindings> {
		&self.bindings
	}

	/// Returns an observable cell for a single prop.
	///
	/// The cell follows attribute changes observed by the dispatcher (when
	/// reactive props are enabled) and writes made through
	/// [`PropEffect::set`]. Repeated calls for the same prop share one cell.
	///
	/// # Arguments
	///
	/// * `key` - Prop key or attribute suffix (`max-items` and `max_items` are
	///   the same prop)
	///
	/// # Example
	///
	/// ```ignore
	/// let open = ctx.prop_effect("open");
	/// let panel = ctx.element().clone();
	/// open.subscribe(move |value| {
	///     let text = if value == &json!(true) { "shown" } else { "hidden" };
	///     panel.set_text_content(text);
	/// })
	/// .detach();
	/// open.set(true);
	/// ```
	pub fn prop_effect(&self, key: &str) -> PropEffect {
		let key = normalize_key(key);
		let cell = self.bindings.cell(&key, || {
			let attribute = self.bindings.attributes.borrow().attribute_for(&key);
			self.element
				.get_attribute(&attribute)
				.map(|raw| decode(&raw))
				.unwrap_or(Value::Null)
		});
		PropEffect {
			key,
			cell,
			bindings: self.bindings.clone(),
			props: self.props.clone(),
		}
	}
}

impl fmt::Debug for WidgetContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WidgetContext")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("element", &self.element)
			.finish()
	}
}

/// Observable cell plus setter for one prop.
///
/// Setting writes only this prop's attribute and stores the value in the
/// props without notifying props subscribers.
#[derive(Clone)]
pub struct PropEffect {
	key: String,
	cell: Observable<Value>,
	bindings: Rc<PropBindings>,
	props: Membrane,
}

impl PropEffect {
	/// Normalized prop key.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Current value, `Value::Null` when the prop is absent.
	pub fn get(&self) -> Value {
		self.cell.get()
	}

	/// Current value deserialized into `T`.
	pub fn get_as<T: DeserializeOwned>(&self) -> Option<T> {
		self.cell
			.with(|value| serde_json::from_value(value.clone()).ok())
	}

	/// The underlying cell.
	pub fn cell(&self) -> &Observable<Value> {
		&self.cell
	}

	/// Registers `listener`, called whenever the prop value changes.
	pub fn subscribe(&self, listener: impl Fn(&Value) + 'static) -> Subscription {
		self.cell.subscribe(listener)
	}

	/// Writes the prop attribute and updates the cell.
	pub fn set(&self, value: impl Into<Value>) {
		let value = value.into();
		self.bindings.write_one(&self.key, &value);
		self.props.store_silently(&self.key, Some(value.clone()));
		self.cell.set_if_changed(value);
	}
}

impl fmt::Debug for PropEffect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PropEffect")
			.field("key", &self.key)
			.field("value", &self.cell.get())
			.finish()
	}
}
