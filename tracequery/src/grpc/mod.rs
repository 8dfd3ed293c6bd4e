//! The gRPC surface: the v2 query service, the metrics query service
//! and the reduced v3 surface, all implemented over the same
//! orchestration layer as the REST routes.
//!
//! Streaming responses pull the full trace first and push it in one or
//! more non-empty chunks; the stream ends cleanly without a tombstone
//! message.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_stream::Stream;
use tonic::{Request, Response, Status};

use tracequery_model::{RequestContext, Trace};
use tracequery_proto::tonic::api_v2::{self, query_service_server::QueryService as QueryServiceV2};
use tracequery_proto::tonic::api_v3::{self, query_service_server::QueryService as QueryServiceV3};
use tracequery_proto::tonic::metrics::{
    self, metrics_query_service_server::MetricsQueryService as MetricsQueryGrpc,
};
use tracequery_proto::transform::common::tonic::{
    from_duration, from_timestamp, span_kind_from_otel_name, to_duration,
};
use tracequery_proto::transform::trace::tonic::{trace_id_from_bytes, trace_to_spans};
use tracequery_storage::{
    DependencyQueryParameters, GetTraceParameters, MetricsQueryParameters,
    OperationQueryParameters, TraceQueryParameters, DEFAULT_NUM_TRACES,
};

use crate::config::QueryOptions;
use crate::http::propagation;
use crate::service::{MetricsQueryService, QueryService};

/// Spans per streamed chunk. Chunks are size-bounded only by the
/// transport; this keeps individual messages comfortably small.
const CHUNK_SPAN_COUNT: usize = 100;

type SpanStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

struct Inner {
    query: Arc<QueryService>,
    metrics: MetricsQueryService,
    options: QueryOptions,
}

impl Inner {
    /// Tenant and bearer token travel in gRPC metadata under the same
    /// header names as on the HTTP side.
    fn context(&self, metadata: &tonic::metadata::MetadataMap) -> Result<RequestContext, Status> {
        let headers = metadata.clone().into_headers();
        let mut ctx = RequestContext::new();
        if let Some(tenant) = propagation::extract_tenant(&headers, &self.options.tenancy)? {
            ctx = ctx.with_value(tenant);
        }
        if self.options.bearer_token_propagation {
            if let Some(token) = propagation::extract_bearer_token(&headers)? {
                ctx = ctx.with_value(token);
            }
        }
        Ok(ctx)
    }
}

/// Handler implementing `jaeger.api_v2.QueryService`.
pub struct QueryHandler(Arc<Inner>);

/// Handler implementing `jaeger.api_v2.metrics.MetricsQueryService`.
pub struct MetricsHandler(Arc<Inner>);

/// Handler implementing `jaeger.api_v3.QueryService`.
pub struct QueryHandlerV3(Arc<Inner>);

/// Builds the three service handlers over shared plumbing.
pub fn handlers(
    query: Arc<QueryService>,
    metrics: MetricsQueryService,
    options: QueryOptions,
) -> (QueryHandler, MetricsHandler, QueryHandlerV3) {
    let inner = Arc::new(Inner {
        query,
        metrics,
        options,
    });
    (
        QueryHandler(inner.clone()),
        MetricsHandler(inner.clone()),
        QueryHandlerV3(inner),
    )
}

fn v2_chunks(traces: &[Trace]) -> SpanStream<api_v2::SpansResponseChunk> {
    let chunks: Vec<Result<api_v2::SpansResponseChunk, Status>> = traces
        .iter()
        .flat_map(|trace| {
            trace_to_spans(trace)
                .chunks(CHUNK_SPAN_COUNT)
                .filter(|spans| !spans.is_empty())
                .map(|spans| {
                    Ok(api_v2::SpansResponseChunk {
                        spans: spans.to_vec(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect();
    Box::pin(tokio_stream::iter(chunks))
}

fn required_trace_id(bytes: &[u8]) -> Result<tracequery_model::TraceId, Status> {
    if bytes.is_empty() {
        return Err(Status::invalid_argument("malformed request: no trace id provided"));
    }
    Ok(trace_id_from_bytes(bytes))
}

fn query_params_from_proto(query: api_v2::TraceQueryParameters) -> (TraceQueryParameters, bool) {
    let raw = query.raw_traces;
    let duration = |d: Option<::prost_types::Duration>| {
        d.as_ref().map(from_duration).filter(|d| !d.is_zero())
    };
    (
        TraceQueryParameters {
            service_name: query.service_name,
            operation_name: query.operation_name,
            tags: query.tags.into_iter().collect(),
            start_time_min: query
                .start_time_min
                .as_ref()
                .map(from_timestamp)
                .unwrap_or(UNIX_EPOCH),
            start_time_max: query
                .start_time_max
                .as_ref()
                .map(from_timestamp)
                .unwrap_or_else(SystemTime::now),
            duration_min: duration(query.duration_min),
            duration_max: duration(query.duration_max),
            num_traces: match query.search_depth {
                depth if depth > 0 => depth as usize,
                _ => DEFAULT_NUM_TRACES,
            },
        },
        raw,
    )
}

#[tonic::async_trait]
impl QueryServiceV2 for QueryHandler {
    type GetTraceStream = SpanStream<api_v2::SpansResponseChunk>;

    async fn get_trace(
        &self,
        request: Request<api_v2::GetTraceRequest>,
    ) -> Result<Response<Self::GetTraceStream>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let req = request.into_inner();
        let query = GetTraceParameters {
            trace_id: required_trace_id(&req.trace_id)?,
            start_time: req.start_time.as_ref().map(from_timestamp),
            end_time: req.end_time.as_ref().map(from_timestamp),
        };
        let trace = self.0.query.get_trace(&ctx, query, req.raw_traces).await?;
        Ok(Response::new(v2_chunks(&[trace])))
    }

    async fn archive_trace(
        &self,
        request: Request<api_v2::ArchiveTraceRequest>,
    ) -> Result<Response<api_v2::ArchiveTraceResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let req = request.into_inner();
        let query = GetTraceParameters {
            trace_id: required_trace_id(&req.trace_id)?,
            start_time: req.start_time.as_ref().map(from_timestamp),
            end_time: req.end_time.as_ref().map(from_timestamp),
        };
        self.0.query.archive_trace(&ctx, query).await?;
        Ok(Response::new(api_v2::ArchiveTraceResponse {}))
    }

    type FindTracesStream = SpanStream<api_v2::SpansResponseChunk>;

    async fn find_traces(
        &self,
        request: Request<api_v2::FindTracesRequest>,
    ) -> Result<Response<Self::FindTracesStream>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let query = request
            .into_inner()
            .query
            .ok_or_else(|| Status::invalid_argument("missing query"))?;
        let (params, raw) = query_params_from_proto(query);
        let traces = self.0.query.find_traces(&ctx, params, raw).await?;
        Ok(Response::new(v2_chunks(&traces)))
    }

    async fn find_trace_i_ds(
        &self,
        request: Request<api_v2::FindTraceIDsRequest>,
    ) -> Result<Response<api_v2::FindTraceIDsResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let query = request
            .into_inner()
            .query
            .ok_or_else(|| Status::invalid_argument("missing query"))?;
        let (params, _) = query_params_from_proto(query);
        let trace_ids = self.0.query.find_trace_ids(&ctx, params).await?;
        Ok(Response::new(api_v2::FindTraceIDsResponse {
            trace_ids: trace_ids
                .into_iter()
                .map(|id| id.to_bytes().to_vec())
                .collect(),
        }))
    }

    async fn get_services(
        &self,
        request: Request<api_v2::GetServicesRequest>,
    ) -> Result<Response<api_v2::GetServicesResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let services = self.0.query.get_services(&ctx).await?;
        Ok(Response::new(api_v2::GetServicesResponse { services }))
    }

    async fn get_operations(
        &self,
        request: Request<api_v2::GetOperationsRequest>,
    ) -> Result<Response<api_v2::GetOperationsResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let req = request.into_inner();
        let span_kind = match req.span_kind.as_str() {
            "" => None,
            name => Some(name.parse().map_err(|err| {
                Status::invalid_argument(format!("unable to parse param 'spanKind': {err}"))
            })?),
        };
        let operations = self
            .0
            .query
            .get_operations(
                &ctx,
                OperationQueryParameters {
                    service_name: req.service,
                    span_kind,
                },
            )
            .await?;
        Ok(Response::new(api_v2::GetOperationsResponse {
            operation_names: operations.iter().map(|op| op.name.clone()).collect(),
            operations: operations.iter().map(Into::into).collect(),
        }))
    }

    async fn get_dependencies(
        &self,
        request: Request<api_v2::GetDependenciesRequest>,
    ) -> Result<Response<api_v2::GetDependenciesResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let req = request.into_inner();
        let (start, end) = match (&req.start_time, &req.end_time) {
            (Some(start), Some(end)) => (from_timestamp(start), from_timestamp(end)),
            _ => {
                return Err(Status::invalid_argument(
                    "both start_time and end_time must be provided",
                ))
            }
        };
        let lookback = end
            .duration_since(start)
            .map_err(|_| Status::invalid_argument("end_time must not precede start_time"))?;
        let dependencies = self
            .0
            .query
            .get_dependencies(
                &ctx,
                DependencyQueryParameters {
                    end_time: end,
                    lookback,
                },
            )
            .await?;
        Ok(Response::new(api_v2::GetDependenciesResponse {
            dependencies: dependencies.iter().map(Into::into).collect(),
        }))
    }
}

fn metrics_params(
    base: Option<metrics::MetricsQueryBaseRequest>,
    quantile: Option<f64>,
) -> Result<MetricsQueryParameters, Status> {
    let base =
        base.ok_or_else(|| Status::invalid_argument("missing metrics query parameters"))?;
    if base.service_names.is_empty() {
        return Err(Status::invalid_argument(
            "please provide at least one service name",
        ));
    }
    let mut span_kinds = Vec::with_capacity(base.span_kinds.len());
    for name in &base.span_kinds {
        let kind = span_kind_from_otel_name(name).ok_or_else(|| {
            Status::invalid_argument(format!("unsupported span kind: '{name}'"))
        })?;
        span_kinds.push(kind);
    }
    Ok(MetricsQueryParameters {
        service_names: base.service_names,
        group_by_operation: base.group_by_operation,
        end_time: base.end_ts.as_ref().map(from_timestamp),
        lookback: base.lookback.as_ref().map(from_duration),
        step: base.step.as_ref().map(from_duration),
        rate_per: base.rate_per.as_ref().map(from_duration),
        span_kinds,
        quantile,
    })
}

#[tonic::async_trait]
impl MetricsQueryGrpc for MetricsHandler {
    async fn get_latencies(
        &self,
        request: Request<metrics::GetLatenciesRequest>,
    ) -> Result<Response<metrics::GetMetricsResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let req = request.into_inner();
        let params = metrics_params(req.base, Some(req.quantile))?;
        let family = self.0.metrics.get_latencies(&ctx, &params).await?;
        Ok(Response::new(metrics::GetMetricsResponse {
            metrics: Some(family),
        }))
    }

    async fn get_call_rates(
        &self,
        request: Request<metrics::GetCallRatesRequest>,
    ) -> Result<Response<metrics::GetMetricsResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let params = metrics_params(request.into_inner().base, None)?;
        let family = self.0.metrics.get_call_rates(&ctx, &params).await?;
        Ok(Response::new(metrics::GetMetricsResponse {
            metrics: Some(family),
        }))
    }

    async fn get_error_rates(
        &self,
        request: Request<metrics::GetErrorRatesRequest>,
    ) -> Result<Response<metrics::GetMetricsResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let params = metrics_params(request.into_inner().base, None)?;
        let family = self.0.metrics.get_error_rates(&ctx, &params).await?;
        Ok(Response::new(metrics::GetMetricsResponse {
            metrics: Some(family),
        }))
    }

    async fn get_min_step_duration(
        &self,
        request: Request<metrics::GetMinStepDurationRequest>,
    ) -> Result<Response<metrics::GetMinStepDurationResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let min_step = self.0.metrics.get_min_step_duration(&ctx).await?;
        Ok(Response::new(metrics::GetMinStepDurationResponse {
            min_step: Some(to_duration(min_step)),
        }))
    }
}

/// The v3 surface validates time windows before touching storage:
/// lookbacks must be positive, end times at most one hour in the
/// future, start times not before the Unix epoch.
fn validate_window(
    start: Option<&::prost_types::Timestamp>,
    end: Option<&::prost_types::Timestamp>,
) -> Result<(), Status> {
    if let Some(start) = start {
        if start.seconds < 0 {
            return Err(Status::invalid_argument(
                "start time must not precede the Unix epoch",
            ));
        }
    }
    if let Some(end) = end {
        let horizon = SystemTime::now() + Duration::from_secs(60 * 60);
        if from_timestamp(end) > horizon {
            return Err(Status::invalid_argument(
                "end time must not be more than one hour in the future",
            ));
        }
    }
    Ok(())
}

#[tonic::async_trait]
impl QueryServiceV3 for QueryHandlerV3 {
    type GetTraceStream = SpanStream<api_v3::SpansResponseChunk>;

    async fn get_trace(
        &self,
        request: Request<api_v3::GetTraceRequest>,
    ) -> Result<Response<Self::GetTraceStream>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let req = request.into_inner();
        let trace_id = tracequery_model::TraceId::from_hex(&req.trace_id)
            .map_err(|err| Status::invalid_argument(format!("malformed trace id: {err}")))?;
        validate_window(req.start_time.as_ref(), req.end_time.as_ref())?;

        let query = GetTraceParameters {
            trace_id,
            start_time: req.start_time.as_ref().map(from_timestamp),
            end_time: req.end_time.as_ref().map(from_timestamp),
        };
        let trace = self.0.query.get_trace(&ctx, query, req.raw_traces).await?;
        let chunks: Vec<Result<api_v3::SpansResponseChunk, Status>> = trace_to_spans(&trace)
            .chunks(CHUNK_SPAN_COUNT)
            .filter(|spans| !spans.is_empty())
            .map(|spans| {
                Ok(api_v3::SpansResponseChunk {
                    spans: spans.to_vec(),
                })
            })
            .collect();
        Ok(Response::new(Box::pin(tokio_stream::iter(chunks))))
    }

    async fn get_dependencies(
        &self,
        request: Request<api_v3::GetDependenciesRequest>,
    ) -> Result<Response<api_v3::GetDependenciesResponse>, Status> {
        let ctx = self.0.context(request.metadata())?;
        let req = request.into_inner();
        let end = req
            .end_time
            .as_ref()
            .ok_or_else(|| Status::invalid_argument("end_time is required"))?;
        validate_window(None, Some(end))?;
        let lookback = req
            .lookback
            .as_ref()
            .map(from_duration)
            .filter(|lookback| !lookback.is_zero())
            .ok_or_else(|| Status::invalid_argument("lookback must be positive"))?;

        let dependencies = self
            .0
            .query
            .get_dependencies(
                &ctx,
                DependencyQueryParameters {
                    end_time: from_timestamp(end),
                    lookback,
                },
            )
            .await?;
        Ok(Response::new(api_v3::GetDependenciesResponse {
            dependencies: dependencies.iter().map(Into::into).collect(),
        }))
    }
}
