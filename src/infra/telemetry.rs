use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "verso_page_cache_hit_total",
            Unit::Count,
            "Total number of rendered pages served from the page cache."
        );
        describe_counter!(
            "verso_page_cache_miss_total",
            Unit::Count,
            "Total number of page cache lookups that found nothing."
        );
        describe_counter!(
            "verso_page_cache_store_total",
            Unit::Count,
            "Total number of rendered pages stored in the page cache."
        );
        describe_counter!(
            "verso_page_cache_reset_total",
            Unit::Count,
            "Total number of full page cache flushes."
        );
        describe_counter!(
            "verso_bus_publish_total",
            Unit::Count,
            "Total number of events published on the notification bus."
        );
        describe_histogram!(
            "verso_content_reload_ms",
            Unit::Milliseconds,
            "Content index rebuild latency in milliseconds."
        );
    });
}
