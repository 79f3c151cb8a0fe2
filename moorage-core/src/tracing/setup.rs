//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding per-module log directives.
pub const LOG_ENV_VAR: &str = "MOORAGE_LOG";

/// Directives used when [`LOG_ENV_VAR`] is unset, blank or unparseable.
pub const DEFAULT_DIRECTIVES: &str = "moorage_core=info,moorage_storage=info";

static INIT: Once = Once::new();

/// Pick the filter directives to install from a raw `MOORAGE_LOG` value.
///
/// Returns the raw value when it parses as an `EnvFilter`, otherwise
/// [`DEFAULT_DIRECTIVES`].
pub fn resolve_directives(raw: Option<&str>) -> &str {
    match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() && EnvFilter::try_new(raw).is_ok() => raw,
        _ => DEFAULT_DIRECTIVES,
    }
}

/// Install the global fmt subscriber.
///
/// Example: `MOORAGE_LOG=moorage_storage::scope=debug,moorage_storage::pool=trace`.
/// Only the first call does anything. If the host application already
/// installed a subscriber, that one is kept.
pub fn init_tracing() {
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV_VAR).ok();
        let directives = resolve_directives(raw.as_deref());
        let rejected = raw.as_deref().map(str::trim).filter(|raw| !raw.is_empty() && *raw != directives);

        let installed = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(EnvFilter::new(directives))
            .try_init();

        match installed {
            Ok(()) => {
                if let Some(rejected) = rejected {
                    tracing::warn!(value = rejected, fallback = DEFAULT_DIRECTIVES, "ignoring invalid MOORAGE_LOG");
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "subscriber already installed; keeping it");
            }
        }
    });
}
