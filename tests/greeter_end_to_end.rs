//! End-to-end tests through the facade crate.
//!
//! Test Categories:
//! - Category 1: Greeter Scenario
//! - Category 2: Settings From TOML
//! - Category 3: Lazy Greeter Under the Run Loop

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use reinhardt_islands::prelude::*;
use reinhardt_islands::widgets::WidgetError;
use rstest::rstest;
use serde::Deserialize;
use tokio::task::LocalSet;

#[derive(Debug, Deserialize)]
struct GreeterProps {
	name: String,
	#[serde(default)]
	excited: bool,
}

fn greet(ctx: &WidgetContext) -> WidgetResult<()> {
	let props: GreeterProps = ctx
		.props()
		.snapshot()
		.deserialize()
		.map_err(|e| WidgetError::custom(e.to_string()))?;
	let mark = if props.excited { "!" } else { "" };
	ctx.element()
		.set_text_content(&format!("Hello, {}{}", props.name, mark));
	Ok(())
}

fn greeter_config(settings: WidgetsSettings) -> WidgetsConfig {
	WidgetsConfig::builder()
		.settings(settings)
		.widget("greeter", |ctx, _| {
			greet(ctx)?;
			Ok(None)
		})
		.build()
		.unwrap()
}

/// Greeter loaded after 20ms that records the greeting in a `greeted` prop.
fn lazy_greeter_config(loads: Rc<Cell<usize>>) -> WidgetsConfig {
	WidgetsConfig::builder()
		.reactive_props(true)
		.writeback_delay(Duration::from_millis(50))
		.async_widget("greeter", "widgets/greeter")
		.loader(move |_| {
			loads.set(loads.get() + 1);
			async move {
				tokio::time::sleep(Duration::from_millis(20)).await;
				Ok(behavior(|ctx: &WidgetContext, _: &Helpers| {
					greet(ctx)?;
					ctx.props().set("greeted", true);
					Ok(None)
				}))
			}
		})
		.build()
		.unwrap()
}

// ============================================================================
// Category 1: Greeter Scenario
// ============================================================================

/// Tests the full lifecycle of server-rendered and injected greeters
#[rstest]
fn test_greeter_lifecycle() {
	let document = Document::new();
	let root = document.create_element("main");
	root.set_attribute("data-widgets-root", "");
	document.body().append_child(&root).unwrap();
	let rendered = WidgetBuilder::new()
		.name("greeter")
		.prop("name", "Ada")
		.build(&document);
	root.append_child(&rendered).unwrap();

	let dispatcher = Dispatcher::start(&document, greeter_config(WidgetsSettings::default())).unwrap();
	assert_eq!(rendered.text_content(), "Hello, Ada");

	let injected = WidgetBuilder::new()
		.name("greeter")
		.prop("name", "Grace")
		.prop("excited", "true")
		.build(&document);
	root.append_child(&injected).unwrap();
	dispatcher.process_pending();
	assert_eq!(injected.text_content(), "Hello, Grace!");
	assert_eq!(dispatcher.len(), 2);

	let first_id = rendered.get_attribute("data-widget-id").unwrap();
	let second_id = injected.get_attribute("data-widget-id").unwrap();
	assert_ne!(first_id, second_id);

	rendered.remove();
	dispatcher.process_pending();
	assert_eq!(dispatcher.len(), 1);
	assert!(dispatcher.instance(&first_id).is_none());
	assert!(dispatcher.instance(&second_id).is_some());
}

// ============================================================================
// Category 2: Settings From TOML
// ============================================================================

/// Tests that a dispatcher runs from TOML settings with custom conventions
#[rstest]
fn test_custom_conventions_from_toml() {
	let settings = WidgetsSettings::from_toml_str(
		r##"
			rootElement = "#app"
			widget_attribute = "data-island"
			prop_prefix = "data-prop-"
			id_prefix = "isl_"
		"##,
	)
	.unwrap();

	let document = Document::new();
	let app = document.create_element("div");
	app.set_attribute("id", "app");
	document.body().append_child(&app).unwrap();
	let element = WidgetBuilder::new()
		.widget_attribute("data-island")
		.prop_prefix("data-prop-")
		.name("greeter")
		.prop("name", "Linus")
		.build(&document);
	app.append_child(&element).unwrap();

	let dispatcher = Dispatcher::start(&document, greeter_config(settings)).unwrap();

	assert_eq!(element.text_content(), "Hello, Linus");
	let id = element.get_attribute("data-widget-id").unwrap();
	assert!(id.starts_with("isl_"));
	assert_eq!(dispatcher.instance_ids().len(), 1);
}

// ============================================================================
// Category 3: Lazy Greeter Under the Run Loop
// ============================================================================

/// Tests loading, debounced writeback and teardown while `run` drives the page
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_lazy_greeter_under_run_loop() {
	LocalSet::new()
		.run_until(async {
			let document = Document::new();
			let root = document.create_element("main");
			root.set_attribute("data-widgets-root", "");
			document.body().append_child(&root).unwrap();
			let rendered = WidgetBuilder::new()
				.name("greeter")
				.prop("name", "Ada")
				.build(&document);
			root.append_child(&rendered).unwrap();

			let loads = Rc::new(Cell::new(0));
			let dispatcher = Rc::new(Dispatcher::start(&document, lazy_greeter_config(loads.clone())).unwrap());
			assert_eq!(dispatcher.pending_loads(), 1);

			let runner = dispatcher.clone();
			let handle = tokio::task::spawn_local(async move { runner.run().await });

			let injected = WidgetBuilder::new()
				.name("greeter")
				.prop("name", "Grace")
				.build(&document);
			root.append_child(&injected).unwrap();

			tokio::time::sleep(Duration::from_millis(30)).await;
			assert_eq!(loads.get(), 1);
			assert_eq!(dispatcher.len(), 2);
			assert_eq!(rendered.text_content(), "Hello, Ada");
			assert_eq!(injected.text_content(), "Hello, Grace");
			assert_eq!(rendered.get_attribute(":greeted"), None);

			tokio::time::sleep(Duration::from_millis(100)).await;
			assert_eq!(rendered.get_attribute(":greeted"), Some("true".to_string()));
			assert_eq!(injected.get_attribute(":greeted"), Some("true".to_string()));

			injected.remove();
			tokio::time::sleep(Duration::from_millis(10)).await;
			assert_eq!(dispatcher.len(), 1);

			dispatcher.stop();
			handle.await.unwrap();
			assert!(!dispatcher.is_observing());
		})
		.await;
}
