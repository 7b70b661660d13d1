//! Reactive Props Integration Tests
//!
//! Tests for prop writeback onto element attributes, attribute following and
//! per-prop cells.
//!
//! Test Categories:
//! - Category 1: Writeback
//! - Category 2: Attribute Following
//! - Category 3: Prop Effects

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use reinhardt_dom::{Document, Element, MutationObserver, MutationRecord, ObserveOptions, WidgetBuilder};
use reinhardt_widgets::{Dispatcher, WidgetsConfig};
use rstest::{fixture, rstest};
use serde_json::json;
use tokio::task::LocalSet;

struct Page {
	document: Document,
	root: Element,
}

impl Page {
	fn counter(&self, count: &str) -> Element {
		let element = WidgetBuilder::new()
			.name("counter")
			.prop("count", count)
			.prop("max-items", "10")
			.build(&self.document);
		self.root.append_child(&element).unwrap();
		element
	}

	/// Observes attribute changes of `element` alone.
	fn watch(&self, element: &Element) -> MutationObserver {
		self.document.observe(element.as_node(), ObserveOptions::attributes())
	}
}

#[fixture]
fn page() -> Page {
	let document = Document::new();
	let root = document.create_element("main");
	root.set_attribute("data-widgets-root", "");
	document.body().append_child(&root).unwrap();
	Page { document, root }
}

/// Drains `observer` and counts the `:count` records.
fn count_writes(observer: &MutationObserver) -> usize {
	observer
		.take_records()
		.iter()
		.filter(|record| matches!(record, MutationRecord::Attributes { name, .. } if name == ":count"))
		.count()
}

fn counter_dispatcher(page: &Page, reactive: bool, delay: Option<Duration>) -> Dispatcher {
	let mut builder = WidgetsConfig::builder()
		.reactive_props(reactive)
		.widget("counter", |_, _| Ok(None));
	if let Some(delay) = delay {
		builder = builder.writeback_delay(delay);
	}
	Dispatcher::start(&page.document, builder.build().unwrap()).unwrap()
}

// ============================================================================
// Category 1: Writeback
// ============================================================================

/// Tests that every prop change is written back immediately without a delay
#[rstest]
fn test_immediate_writeback(page: Page) {
	let element = page.counter("0");
	let dispatcher = counter_dispatcher(&page, true, None);
	let watcher = page.watch(&element);
	let props = dispatcher.instance_for(&element).unwrap().props().clone();

	props.set("count", 1);
	props.set("count", 2);
	props.set("count", 3);

	assert_eq!(count_writes(&watcher), 3);
	assert_eq!(element.get_attribute(":count"), Some("3".to_string()));
	// Unchanged props are not rewritten.
	assert_eq!(element.get_attribute(":max-items"), Some("10".to_string()));

	// The dispatcher sees its own writes and leaves props alone.
	dispatcher.process_pending();
	assert_eq!(props.get("count"), Some(json!(3)));
	assert_eq!(count_writes(&watcher), 0);
}

/// Tests that debounced writeback coalesces a burst into one write
#[rstest]
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_debounced_writeback(page: Page) {
	LocalSet::new()
		.run_until(async move {
			let element = page.counter("0");
			let dispatcher = counter_dispatcher(&page, true, Some(Duration::from_millis(100)));
			let watcher = page.watch(&element);
			let props = dispatcher.instance_for(&element).unwrap().props().clone();

			props.set("count", 1);
			props.set("count", 2);
			props.set("count", 3);
			assert!(props.has_pending());
			assert_eq!(count_writes(&watcher), 0);

			tokio::time::sleep(Duration::from_millis(150)).await;

			assert_eq!(count_writes(&watcher), 1);
			assert_eq!(element.get_attribute(":count"), Some("3".to_string()));
		})
		.await;
}

/// Tests that removed props lose their attribute
#[rstest]
fn test_removed_prop_drops_attribute(page: Page) {
	let element = page.counter("0");
	let dispatcher = counter_dispatcher(&page, true, None);
	let props = dispatcher.instance_for(&element).unwrap().props().clone();

	props.remove("max_items");

	assert!(!element.has_attribute(":max-items"));
	assert!(element.has_attribute(":count"));
}

/// Tests that props stay local when reactive props are disabled
#[rstest]
fn test_no_writeback_when_disabled(page: Page) {
	let element = page.counter("0");
	let dispatcher = counter_dispatcher(&page, false, None);
	let watcher = page.watch(&element);
	let props = dispatcher.instance_for(&element).unwrap().props().clone();

	props.set("count", 5);

	assert_eq!(props.get("count"), Some(json!(5)));
	assert_eq!(element.get_attribute(":count"), Some("0".to_string()));
	assert_eq!(count_writes(&watcher), 0);
}

// ============================================================================
// Category 2: Attribute Following
// ============================================================================

/// Tests that an external attribute change updates props without writeback
#[rstest]
fn test_external_attribute_change(page: Page) {
	let element = page.counter("0");
	let dispatcher = counter_dispatcher(&page, true, None);
	let instance = dispatcher.instance_for(&element).unwrap();
	let effect = instance.context().prop_effect("count");
	let notified = Rc::new(Cell::new(0));
	let seen = notified.clone();
	instance
		.props()
		.subscribe(move |_| seen.set(seen.get() + 1))
		.detach();
	let watcher = page.watch(&element);

	element.set_attribute(":count", "7");
	dispatcher.process_pending();

	assert_eq!(instance.props().get("count"), Some(json!(7)));
	assert_eq!(effect.get(), json!(7));
	assert_eq!(notified.get(), 0);
	// Only the external write, no echo.
	assert_eq!(count_writes(&watcher), 1);
}

/// Tests that removing a prop attribute removes the prop
#[rstest]
fn test_external_attribute_removal(page: Page) {
	let element = page.counter("0");
	let dispatcher = counter_dispatcher(&page, true, None);
	let instance = dispatcher.instance_for(&element).unwrap();

	element.remove_attribute(":count");
	dispatcher.process_pending();

	assert!(!instance.props().contains_key("count"));
	assert_eq!(instance.context().prop_effect("count").get(), json!(null));
}

/// Tests that attribute changes are ignored when reactive props are disabled
#[rstest]
fn test_attributes_not_followed_when_disabled(page: Page) {
	let element = page.counter("0");
	let dispatcher = counter_dispatcher(&page, false, None);
	let instance = dispatcher.instance_for(&element).unwrap();

	element.set_attribute(":count", "7");
	assert_eq!(dispatcher.process_pending(), 0);
	assert_eq!(instance.props().get("count"), Some(json!(0)));
}

// ============================================================================
// Category 3: Prop Effects
// ============================================================================

/// Tests that setting a prop effect writes one attribute and does not loop
#[rstest]
fn test_prop_effect_set(page: Page) {
	let element = page.counter("0");
	let dispatcher = counter_dispatcher(&page, true, None);
	let instance = dispatcher.instance_for(&element).unwrap();
	let effect = instance.context().prop_effect("count");
	let changes = Rc::new(Cell::new(0));
	let seen = changes.clone();
	effect.subscribe(move |_| seen.set(seen.get() + 1)).detach();
	let watcher = page.watch(&element);

	effect.set(5);
	dispatcher.process_pending();

	assert_eq!(element.get_attribute(":count"), Some("5".to_string()));
	assert_eq!(instance.props().get("count"), Some(json!(5)));
	assert_eq!(effect.get_as::<i64>(), Some(5));
	assert_eq!(changes.get(), 1);
	assert_eq!(count_writes(&watcher), 1);
}

/// Tests that props written back show up in every cell for that prop
#[rstest]
fn test_prop_effect_follows_props(page: Page) {
	let element = page.counter("0");
	let dispatcher = counter_dispatcher(&page, true, None);
	let instance = dispatcher.instance_for(&element).unwrap();
	let first = instance.context().prop_effect("max-items");
	let second = instance.context().prop_effect("max_items");

	instance.props().set("max_items", 20);

	assert_eq!(first.get(), json!(20));
	assert!(first.cell().ptr_eq(second.cell()));
	assert_eq!(element.get_attribute(":max-items"), Some("20".to_string()));
}
