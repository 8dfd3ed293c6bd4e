//! This crate contains the generated files for the `jaeger.api_v2`,
//! `jaeger.api_v2.metrics` and `jaeger.api_v3` gRPC surfaces of the
//! tracequery query service, transformations between the generated types
//! and the domain types defined in
//! [`tracequery-model`](tracequery_model), and the file descriptor set the
//! reflection service publishes.
//!
//! The generated files are committed rather than produced by a build
//! script, so building this crate needs no protoc toolchain.

// proto mod contains file generated by protobuf or other build tools.
// we should manually change it. Thus skip format and lint check.
#[rustfmt::skip]
#[allow(warnings)]
#[doc(hidden)]
mod proto;

#[cfg(feature = "gen-tonic")]
pub use proto::tonic;

pub mod transform;

#[cfg(feature = "gen-tonic-messages")]
pub mod descriptor;

/// Convenience alias for the metrics message types used by the storage
/// contracts.
#[cfg(feature = "gen-tonic-messages")]
pub mod metrics {
    pub use crate::proto::tonic::metrics::*;
}
