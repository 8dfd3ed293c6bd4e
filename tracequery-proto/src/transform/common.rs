#[cfg(feature = "gen-tonic-messages")]
pub mod tonic {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use tracequery_model::SpanKind;

    /// Well-known protobuf timestamp for a [`SystemTime`]. Times before
    /// the Unix epoch clamp to the epoch.
    pub fn to_timestamp(time: SystemTime) -> ::prost_types::Timestamp {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));
        ::prost_types::Timestamp {
            seconds: since_epoch.as_secs() as i64,
            nanos: since_epoch.subsec_nanos() as i32,
        }
    }

    /// The [`SystemTime`] for a well-known protobuf timestamp. Negative
    /// seconds clamp to the epoch.
    pub fn from_timestamp(ts: &::prost_types::Timestamp) -> SystemTime {
        if ts.seconds < 0 {
            return UNIX_EPOCH;
        }
        UNIX_EPOCH + Duration::new(ts.seconds as u64, ts.nanos.max(0) as u32)
    }

    /// Well-known protobuf duration for a std [`Duration`].
    pub fn to_duration(duration: Duration) -> ::prost_types::Duration {
        ::prost_types::Duration {
            seconds: duration.as_secs() as i64,
            nanos: duration.subsec_nanos() as i32,
        }
    }

    /// The std [`Duration`] for a well-known protobuf duration. Negative
    /// durations clamp to zero.
    pub fn from_duration(duration: &::prost_types::Duration) -> Duration {
        if duration.seconds < 0 || duration.nanos < 0 {
            return Duration::ZERO;
        }
        Duration::new(duration.seconds as u64, duration.nanos as u32)
    }

    /// The OpenTelemetry enumeration name of a span kind, as carried by
    /// the metrics query surface.
    pub fn span_kind_to_otel_name(kind: SpanKind) -> &'static str {
        match kind {
            SpanKind::Unspecified => "SPAN_KIND_UNSPECIFIED",
            SpanKind::Internal => "SPAN_KIND_INTERNAL",
            SpanKind::Server => "SPAN_KIND_SERVER",
            SpanKind::Client => "SPAN_KIND_CLIENT",
            SpanKind::Producer => "SPAN_KIND_PRODUCER",
            SpanKind::Consumer => "SPAN_KIND_CONSUMER",
        }
    }

    /// The span kind for an OpenTelemetry enumeration name.
    pub fn span_kind_from_otel_name(name: &str) -> Option<SpanKind> {
        match name {
            "SPAN_KIND_UNSPECIFIED" => Some(SpanKind::Unspecified),
            "SPAN_KIND_INTERNAL" => Some(SpanKind::Internal),
            "SPAN_KIND_SERVER" => Some(SpanKind::Server),
            "SPAN_KIND_CLIENT" => Some(SpanKind::Client),
            "SPAN_KIND_PRODUCER" => Some(SpanKind::Producer),
            "SPAN_KIND_CONSUMER" => Some(SpanKind::Consumer),
            _ => None,
        }
    }

}
