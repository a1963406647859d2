use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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
            "archive_render_cache_hit_total",
            Unit::Count,
            "Renders served from the memoization cache."
        );
        describe_counter!(
            "archive_render_cache_miss_total",
            Unit::Count,
            "Renders computed because no cached entry existed."
        );
        describe_counter!(
            "archive_render_bypass_total",
            Unit::Count,
            "Renders computed without caching because the fingerprint was empty."
        );
        describe_counter!(
            "archive_content_reload_total",
            Unit::Count,
            "Full content reloads that published a new snapshot."
        );
        describe_counter!(
            "archive_content_reload_failed_total",
            Unit::Count,
            "Refresh ticks that failed and kept the previous snapshot."
        );
        describe_counter!(
            "archive_content_probe_skip_total",
            Unit::Count,
            "Refresh ticks skipped because the store probe was unchanged."
        );
        describe_histogram!(
            "archive_content_reload_ms",
            Unit::Milliseconds,
            "Full content reload latency in milliseconds."
        );
        describe_gauge!(
            "archive_content_posts",
            Unit::Count,
            "Number of posts in the published snapshot."
        );
        describe_counter!(
            "archive_live_delivered_total",
            Unit::Count,
            "Change notifications accepted by a live subscriber."
        );
        describe_counter!(
            "archive_live_dropped_total",
            Unit::Count,
            "Change notifications dropped because a subscriber was full or gone."
        );
        describe_histogram!(
            "archive_cache_warm_ms",
            Unit::Milliseconds,
            "Startup render cache warm latency in milliseconds."
        );
    });
}
