//! Domain data model for the tracequery query service.
//!
//! This crate defines the value types that flow between the storage
//! collaborators, the trace adjuster pipeline, and the wire-facing handlers:
//! trace and span identifiers, spans and their containing traces, typed tag
//! values, dependency links, and the per-request [`RequestContext`] used to
//! carry tenant and bearer-token information to storage without
//! thread-local state.
//!
//! Traces are created by a storage reader, mutated only by the adjuster
//! pipeline, consumed by the response shapers and discarded after the
//! response is written. All types here are plain owned values; spans are
//! owned by their containing [`Trace`].

mod context;
mod dependencies;
mod ids;
mod keyvalue;
mod span;
pub mod time;

pub use context::{BearerToken, RequestContext, TenantName};
pub use dependencies::{dedupe_dependencies, filter_dependencies, DependencyLink};
pub use ids::{SpanId, TraceId};
pub use keyvalue::{KeyValue, TagValue};
pub use span::{
    Log, Operation, ParseSpanKindError, Process, RefType, Span, SpanKind, SpanRef, Trace,
};
