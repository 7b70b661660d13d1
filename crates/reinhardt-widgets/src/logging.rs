//! Lifecycle logging.
//!
//! Info-level lifecycle messages (mounted, destroyed, cancelled, observer
//! started and stopped) are only emitted when the `logs` setting is on.
//! Warnings and errors go straight through `tracing` and are never gated.
//!
//! ## Example
//!
//! ```ignore
//! lifecycle_log!(settings, widget = %name, id = %id, "widget mounted");
//! ```

/// Emits an info event when `settings.logs` is enabled.
///
/// # Arguments
///
/// * `$settings` - Anything with a boolean `logs` field
/// * The remaining tokens are passed to `tracing::info!` unchanged
macro_rules! lifecycle_log {
	($settings:expr, $($arg:tt)+) => {{
		if $settings.logs {
			tracing::info!($($arg)+);
		}
	}};
}

pub(crate) use lifecycle_log;

#[cfg(test)]
mod tests {
	use super::lifecycle_log;
	use crate::settings::WidgetsSettings;
	use rstest::rstest;

	#[rstest]
	#[case(true)]
	#[case(false)]
	fn test_lifecycle_log_compiles_with_fields(#[case] logs: bool) {
		let settings = WidgetsSettings {
			logs,
			..WidgetsSettings::default()
		};
		let name = "greeter";

		lifecycle_log!(settings, widget = %name, lazy = false, "widget mounted");
		lifecycle_log!(&settings, "Observing widget root {:?}", "main");
	}
}
