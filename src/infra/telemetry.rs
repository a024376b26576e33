use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::metric_names;
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

/// Register descriptions for every cache metric with the installed recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            metric_names::HIT,
            Unit::Count,
            "Cache lookups answered from the store."
        );
        describe_counter!(
            metric_names::MISS,
            Unit::Count,
            "Cache lookups that fell through to the source of truth."
        );
        describe_counter!(
            metric_names::DECODE_ERROR,
            Unit::Count,
            "Cached values discarded because they failed decoding or validation."
        );
        describe_counter!(
            metric_names::STORE_ERROR,
            Unit::Count,
            "Cache store operations that failed or timed out."
        );
        describe_counter!(
            metric_names::INVALIDATION,
            Unit::Count,
            "Keys deleted and patterns purged after mutations."
        );
        describe_histogram!(
            metric_names::MAINTENANCE_MS,
            Unit::Milliseconds,
            "Post-mutation cache maintenance latency in milliseconds."
        );
    });
}
