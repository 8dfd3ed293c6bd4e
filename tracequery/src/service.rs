//! Orchestration between the wire-facing handlers and storage.
//!
//! [`QueryService`] mediates every read: it consults the primary reader,
//! falls back to archive storage when the primary reports the
//! `TraceNotFound` sentinel, runs the adjuster pipeline over fetched
//! traces and deduplicates dependency links. [`MetricsQueryService`]
//! plays the same role for the RED-metrics surface.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use tracequery_model::{
    dedupe_dependencies, DependencyLink, Operation, RequestContext, Trace, TraceId,
};
use tracequery_proto::metrics::MetricFamily;
use tracequery_storage::{
    DependencyQueryParameters, DependencyReader, GetTraceParameters, MetricsQueryParameters,
    MetricsReader, OperationQueryParameters, StorageError, TraceQueryParameters, TraceReader,
    TraceWriter,
};

use crate::adjuster::Pipeline;
use crate::error::QueryError;

/// Construction options for [`QueryService`].
///
/// Archive storage is optional; when only one half is configured the
/// corresponding operation reports its absence instead of failing
/// obscurely.
pub struct QueryServiceOptions {
    /// Post-processing applied to every non-raw trace response.
    pub adjuster: Pipeline,
    /// Long-term storage consulted after a primary `TraceNotFound`.
    pub archive_reader: Option<Arc<dyn TraceReader>>,
    /// Long-term storage the archival workflow writes to.
    pub archive_writer: Option<Arc<dyn TraceWriter>>,
}

impl Default for QueryServiceOptions {
    fn default() -> Self {
        QueryServiceOptions {
            adjuster: Pipeline::standard(Duration::ZERO),
            archive_reader: None,
            archive_writer: None,
        }
    }
}

/// Backend features advertised to the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCapabilities {
    /// Whether the archival workflow is available.
    pub archive_storage: bool,
}

/// The read-side control plane: storage lookups, adjusters, archive
/// fallback.
pub struct QueryService {
    reader: Arc<dyn TraceReader>,
    dependency_reader: Arc<dyn DependencyReader>,
    options: QueryServiceOptions,
}

impl QueryService {
    /// A service over the given primary readers.
    pub fn new(
        reader: Arc<dyn TraceReader>,
        dependency_reader: Arc<dyn DependencyReader>,
        options: QueryServiceOptions,
    ) -> Self {
        QueryService {
            reader,
            dependency_reader,
            options,
        }
    }

    /// Features available to clients of this service.
    pub fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities {
            archive_storage: self.options.archive_reader.is_some()
                && self.options.archive_writer.is_some(),
        }
    }

    fn adjust(&self, mut trace: Trace) -> Trace {
        self.options.adjuster.adjust(&mut trace);
        trace
    }

    /// Fetches one trace, retrying against the archive reader exactly
    /// once iff the primary reported `TraceNotFound` and an archive
    /// reader is configured. Any other primary error propagates
    /// immediately. The adjuster pipeline runs unless `raw` is set.
    pub async fn get_trace(
        &self,
        ctx: &RequestContext,
        query: GetTraceParameters,
        raw: bool,
    ) -> Result<Trace, QueryError> {
        let trace = match self.reader.get_trace(ctx, query.clone()).await {
            Ok(trace) => trace,
            Err(StorageError::TraceNotFound) => match &self.options.archive_reader {
                Some(archive) => archive.get_trace(ctx, query).await?,
                None => return Err(QueryError::NotFound),
            },
            Err(err) => return Err(err.into()),
        };
        Ok(if raw { trace } else { self.adjust(trace) })
    }

    /// Fetches a trace from the archive reader only.
    pub async fn get_archived_trace(
        &self,
        ctx: &RequestContext,
        query: GetTraceParameters,
        raw: bool,
    ) -> Result<Trace, QueryError> {
        let archive = self
            .options
            .archive_reader
            .as_ref()
            .ok_or(QueryError::NoArchiveStorage)?;
        let trace = archive.get_trace(ctx, query).await?;
        Ok(if raw { trace } else { self.adjust(trace) })
    }

    /// Fetches several traces by id, in order. Per-id `TraceNotFound`
    /// is reported in the second list instead of failing the request;
    /// duplicates are fetched again, not deduplicated.
    pub async fn get_traces(
        &self,
        ctx: &RequestContext,
        trace_ids: &[TraceId],
        raw: bool,
    ) -> Result<(Vec<Trace>, Vec<TraceId>), QueryError> {
        let mut traces = Vec::with_capacity(trace_ids.len());
        let mut missing = Vec::new();
        for &trace_id in trace_ids {
            let query = GetTraceParameters::for_trace(trace_id);
            match self.get_trace(ctx, query, raw).await {
                Ok(trace) => traces.push(trace),
                Err(QueryError::NotFound) => missing.push(trace_id),
                Err(err) => return Err(err),
            }
        }
        Ok((traces, missing))
    }

    /// Searches for traces and adjusts each result.
    pub async fn find_traces(
        &self,
        ctx: &RequestContext,
        query: TraceQueryParameters,
        raw: bool,
    ) -> Result<Vec<Trace>, QueryError> {
        let traces = self.reader.find_traces(ctx, query).await?;
        Ok(if raw {
            traces
        } else {
            traces.into_iter().map(|t| self.adjust(t)).collect()
        })
    }

    /// Searches for matching trace ids.
    pub async fn find_trace_ids(
        &self,
        ctx: &RequestContext,
        query: TraceQueryParameters,
    ) -> Result<Vec<TraceId>, QueryError> {
        Ok(self.reader.find_trace_ids(ctx, query).await?)
    }

    /// Reads the trace from the primary reader and writes every span to
    /// the archive writer. Write failures are collected per span and
    /// joined; spans already written stay written (at-least-once, no
    /// rollback).
    pub async fn archive_trace(
        &self,
        ctx: &RequestContext,
        query: GetTraceParameters,
    ) -> Result<(), QueryError> {
        let writer = self
            .options
            .archive_writer
            .as_ref()
            .ok_or(QueryError::NoArchiveStorage)?;

        let trace = self.reader.get_trace(ctx, query).await.map_err(QueryError::from)?;

        let mut failures: Vec<String> = Vec::new();
        for span in trace.spans {
            if let Err(err) = writer.write_span(ctx, span).await {
                failures.push(err.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(QueryError::Internal(failures.join("\n")))
        }
    }

    /// All known service names. Thin pass-through.
    pub async fn get_services(&self, ctx: &RequestContext) -> Result<Vec<String>, QueryError> {
        Ok(self.reader.get_services(ctx).await?)
    }

    /// Operations of a service. Thin pass-through.
    pub async fn get_operations(
        &self,
        ctx: &RequestContext,
        query: OperationQueryParameters,
    ) -> Result<Vec<Operation>, QueryError> {
        Ok(self.reader.get_operations(ctx, query).await?)
    }

    /// The dependency graph over the queried window, with (parent,
    /// child) pairs collapsed and call counts summed.
    pub async fn get_dependencies(
        &self,
        ctx: &RequestContext,
        query: DependencyQueryParameters,
    ) -> Result<Vec<DependencyLink>, QueryError> {
        let links = self.dependency_reader.get_dependencies(ctx, query).await?;
        Ok(dedupe_dependencies(links))
    }
}

/// Read access to RED metrics, when a metrics backend is configured.
#[derive(Clone, Default)]
pub struct MetricsQueryService {
    reader: Option<Arc<dyn MetricsReader>>,
}

impl MetricsQueryService {
    /// A service over the given reader.
    pub fn new(reader: Arc<dyn MetricsReader>) -> Self {
        MetricsQueryService {
            reader: Some(reader),
        }
    }

    /// A service without a backend; every query reports
    /// [`QueryError::MetricsDisabled`].
    pub fn disabled() -> Self {
        MetricsQueryService { reader: None }
    }

    fn reader(&self) -> Result<&Arc<dyn MetricsReader>, QueryError> {
        self.reader.as_ref().ok_or(QueryError::MetricsDisabled)
    }

    /// Latency quantiles. Requires `params.quantile` in (0, 1].
    pub async fn get_latencies(
        &self,
        ctx: &RequestContext,
        params: &MetricsQueryParameters,
    ) -> Result<MetricFamily, QueryError> {
        // A disabled backend is reported before parameter validation, so
        // the surfaces keep their 501/Unimplemented contract.
        let reader = self.reader()?;
        match params.quantile {
            Some(q) if q > 0.0 && q <= 1.0 => {}
            _ => {
                return Err(QueryError::invalid_param(
                    "quantile",
                    "please provide a quantile between (0, 1]",
                ))
            }
        }
        Ok(reader.get_latencies(ctx, params).await?)
    }

    /// Call rates.
    pub async fn get_call_rates(
        &self,
        ctx: &RequestContext,
        params: &MetricsQueryParameters,
    ) -> Result<MetricFamily, QueryError> {
        Ok(self.reader()?.get_call_rates(ctx, params).await?)
    }

    /// Error rates.
    pub async fn get_error_rates(
        &self,
        ctx: &RequestContext,
        params: &MetricsQueryParameters,
    ) -> Result<MetricFamily, QueryError> {
        Ok(self.reader()?.get_error_rates(ctx, params).await?)
    }

    /// Smallest resolvable step of the backend.
    pub async fn get_min_step_duration(
        &self,
        ctx: &RequestContext,
    ) -> Result<Duration, QueryError> {
        Ok(self.reader()?.get_min_step_duration(ctx).await?)
    }
}
