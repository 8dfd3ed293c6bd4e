//! Storage collaborator contracts consumed by the tracequery query service.
//!
//! The query service is storage-agnostic: concrete backends implement the
//! reader and writer traits defined here and are discovered at startup by
//! the embedding application. Implementations are expected to be
//! concurrency-safe behind shared references; internal synchronization is
//! their own responsibility.
//!
//! The sentinel [`StorageError::TraceNotFound`] is part of the contract:
//! readers must report a missing trace with it (and only with it), because
//! the query service keys its archive-fallback behavior off that variant.
//! A trace returned from any reader is non-empty, or the reader reports
//! not-found.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;

use tracequery_model::{
    DependencyLink, Operation, RequestContext, Span, SpanKind, Trace, TraceId,
};
use tracequery_proto::metrics::MetricFamily;

#[cfg(any(feature = "testing", test))]
pub mod memory;

/// Default cap on the number of traces a search returns.
pub const DEFAULT_NUM_TRACES: usize = 100;

/// Errors reported by storage collaborators.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested trace is not in this store. Distinguishable by
    /// variant so the query service can retry against archive storage.
    #[error("trace not found")]
    TraceNotFound,

    /// The backend failed. The message carries the cause for logging and
    /// the error envelope; callers must not make decisions on its content.
    #[error("{0}")]
    Internal(String),
}

impl StorageError {
    /// Whether this is the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::TraceNotFound)
    }
}

/// A specialized `Result` for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Parameters for a single-trace lookup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetTraceParameters {
    /// The trace to fetch.
    pub trace_id: TraceId,
    /// Optional lower bound on span start times, to narrow partitioned
    /// stores. `None` means unconstrained.
    pub start_time: Option<SystemTime>,
    /// Optional upper bound on span start times.
    pub end_time: Option<SystemTime>,
}

impl GetTraceParameters {
    /// Lookup parameters without a time window.
    pub fn for_trace(trace_id: TraceId) -> Self {
        GetTraceParameters {
            trace_id,
            start_time: None,
            end_time: None,
        }
    }
}

/// Parameters for a trace search.
///
/// The parser guarantees `start_time_max >= start_time_min` and, when both
/// duration bounds are present, `duration_max >= duration_min`.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceQueryParameters {
    /// Required service to match, by the emitting process's service name.
    pub service_name: String,
    /// Optional operation name to match. Empty matches all.
    pub operation_name: String,
    /// Tag filters. A span matches when each entry is present with the
    /// given value among its span, process, or log tags; an empty value
    /// is a key-only existence filter.
    pub tags: BTreeMap<String, String>,
    /// Earliest span start time to match.
    pub start_time_min: SystemTime,
    /// Latest span start time to match.
    pub start_time_max: SystemTime,
    /// Minimum span duration, if set.
    pub duration_min: Option<Duration>,
    /// Maximum span duration, if set.
    pub duration_max: Option<Duration>,
    /// Cap on the number of traces returned.
    pub num_traces: usize,
}

impl Default for TraceQueryParameters {
    fn default() -> Self {
        TraceQueryParameters {
            service_name: String::new(),
            operation_name: String::new(),
            tags: BTreeMap::new(),
            start_time_min: UNIX_EPOCH,
            start_time_max: UNIX_EPOCH,
            duration_min: None,
            duration_max: None,
            num_traces: DEFAULT_NUM_TRACES,
        }
    }
}

/// Parameters for an operation listing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationQueryParameters {
    /// The service whose operations to list.
    pub service_name: String,
    /// Optional span-kind filter.
    pub span_kind: Option<SpanKind>,
}

/// Parameters for a dependency-graph query.
#[derive(Clone, Debug, PartialEq)]
pub struct DependencyQueryParameters {
    /// End of the queried window.
    pub end_time: SystemTime,
    /// How far to look back from `end_time`.
    pub lookback: Duration,
}

/// Parameters shared by the metrics queries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsQueryParameters {
    /// Services to fetch metrics for. At least one.
    pub service_names: Vec<String>,
    /// Break down the results by operation.
    pub group_by_operation: bool,
    /// End of the queried window. `None` means now.
    pub end_time: Option<SystemTime>,
    /// How far to look back from the end of the window.
    pub lookback: Option<Duration>,
    /// Sampling step between data points.
    pub step: Option<Duration>,
    /// The unit rates are computed over.
    pub rate_per: Option<Duration>,
    /// Span kinds to include. Empty means all.
    pub span_kinds: Vec<SpanKind>,
    /// Quantile for latency queries, in (0, 1].
    pub quantile: Option<f64>,
}

/// Read access to previously ingested traces.
#[async_trait]
pub trait TraceReader: Send + Sync + 'static {
    /// Fetch a single trace. Must return
    /// [`StorageError::TraceNotFound`] when the trace is not present.
    async fn get_trace(
        &self,
        ctx: &RequestContext,
        query: GetTraceParameters,
    ) -> StorageResult<Trace>;

    /// Search for traces matching the query.
    async fn find_traces(
        &self,
        ctx: &RequestContext,
        query: TraceQueryParameters,
    ) -> StorageResult<Vec<Trace>>;

    /// Like [`find_traces`](TraceReader::find_traces), returning ids only.
    async fn find_trace_ids(
        &self,
        ctx: &RequestContext,
        query: TraceQueryParameters,
    ) -> StorageResult<Vec<TraceId>>;

    /// All known service names.
    async fn get_services(&self, ctx: &RequestContext) -> StorageResult<Vec<String>>;

    /// Operations of a service, optionally filtered by span kind.
    async fn get_operations(
        &self,
        ctx: &RequestContext,
        query: OperationQueryParameters,
    ) -> StorageResult<Vec<Operation>>;
}

/// Write access to a trace store; used by the archival workflow.
#[async_trait]
pub trait TraceWriter: Send + Sync + 'static {
    /// Persist one span. At-least-once semantics; retried writes may
    /// produce duplicates which the read path deduplicates.
    async fn write_span(&self, ctx: &RequestContext, span: Span) -> StorageResult<()>;
}

/// Read access to the aggregated service dependency graph.
#[async_trait]
pub trait DependencyReader: Send + Sync + 'static {
    /// Dependency links observed during the queried window.
    async fn get_dependencies(
        &self,
        ctx: &RequestContext,
        query: DependencyQueryParameters,
    ) -> StorageResult<Vec<DependencyLink>>;
}

/// Read access to RED metrics derived from spans.
#[async_trait]
pub trait MetricsReader: Send + Sync + 'static {
    /// Latency quantiles over time, per service (and operation).
    async fn get_latencies(
        &self,
        ctx: &RequestContext,
        params: &MetricsQueryParameters,
    ) -> StorageResult<MetricFamily>;

    /// Call rates over time, per service (and operation).
    async fn get_call_rates(
        &self,
        ctx: &RequestContext,
        params: &MetricsQueryParameters,
    ) -> StorageResult<MetricFamily>;

    /// Error rates over time, per service (and operation).
    async fn get_error_rates(
        &self,
        ctx: &RequestContext,
        params: &MetricsQueryParameters,
    ) -> StorageResult<MetricFamily>;

    /// The smallest step the backend can resolve.
    async fn get_min_step_duration(&self, ctx: &RequestContext) -> StorageResult<Duration>;
}
