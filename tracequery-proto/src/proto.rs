#[cfg(feature = "gen-tonic-messages")]
#[path = "proto/tonic"]
/// Generated files using [`tonic`](https://docs.rs/crate/tonic) and [`prost`](https://docs.rs/crate/prost)
pub mod tonic {
    /// Service stubs and message types for the v2 query surface.
    #[path = "jaeger.api_v2.rs"]
    pub mod api_v2;

    /// Service stubs and message types for the metrics query surface.
    #[path = "jaeger.api_v2.metrics.rs"]
    pub mod metrics;

    /// Service stubs and message types for the v3 query surface.
    #[path = "jaeger.api_v3.rs"]
    pub mod api_v3;
}
