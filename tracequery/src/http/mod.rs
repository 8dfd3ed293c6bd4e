//! The REST surface: routing, middleware, and handlers.
//!
//! Routes live under `{base_path}/api`. Every response is a buffered
//! JSON body inside the structured envelope of [`json`], with three
//! exceptions noted on the metrics handlers. Middleware concerns
//! (additional response headers, tenant guard, bearer-token extraction,
//! `traceresponse` propagation, panic recovery) are applied around the
//! route dispatch in [`HttpHandler::handle`].

pub mod json;
pub mod otlp;
pub mod propagation;

use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use serde::Serialize;

use tracequery_model::{RequestContext, TraceId};
use tracequery_storage::GetTraceParameters;

use crate::config::QueryOptions;
use crate::error::QueryError;
use crate::parser::{Parser, TraceWindow};
use crate::service::{MetricsQueryService, QueryService};

use json::{
    metric_family_to_json, trace_to_ui, StructuredError, StructuredResponse, UiDependencyLink,
    UiOperation, UiTrace,
};

/// Fixed prefix under the base path.
pub const API_PREFIX: &str = "api";

const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// Buffered responses only; streaming is a gRPC concern.
pub type HttpResponse = Response<Full<Bytes>>;

/// The REST request handler.
pub struct HttpHandler {
    query_service: Arc<QueryService>,
    metrics_service: MetricsQueryService,
    parser: Parser,
    options: QueryOptions,
}

impl HttpHandler {
    /// A handler over the given services.
    pub fn new(
        query_service: Arc<QueryService>,
        metrics_service: MetricsQueryService,
        options: QueryOptions,
    ) -> Self {
        HttpHandler {
            query_service,
            metrics_service,
            parser: Parser::new(options.default_lookback),
            options,
        }
    }

    /// Handles one request: middleware, dispatch, recovery. Never
    /// fails; hard errors become the structured error envelope.
    pub async fn handle<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Display,
    {
        let pretty = is_pretty(req.uri().query().unwrap_or(""));
        let trace_response = if self.options.enable_tracing {
            propagation::trace_response_value(req.headers())
        } else {
            None
        };

        // A panicking handler must not take the connection down with it.
        let mut response = match AssertUnwindSafe(self.dispatch(req)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => error_response(&err, pretty),
            Err(panic) => {
                let cause = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_owned());
                tracing::error!(cause = %cause, "recovered from panic in HTTP handler");
                error_response(
                    &QueryError::Internal("internal server error".to_owned()),
                    pretty,
                )
            }
        };

        let headers = response.headers_mut();
        for (name, value) in self.options.additional_headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(value) = trace_response {
            if let Ok(name) = http::header::HeaderName::from_bytes(
                propagation::TRACERESPONSE_HEADER.as_bytes(),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }

    async fn dispatch<B>(&self, req: Request<B>) -> Result<HttpResponse, QueryError>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Display,
    {
        let mut ctx = RequestContext::new();
        if let Some(tenant) = propagation::extract_tenant(req.headers(), &self.options.tenancy)? {
            ctx = ctx.with_value(tenant);
        }
        if self.options.bearer_token_propagation {
            if let Some(token) = propagation::extract_bearer_token(req.headers())? {
                ctx = ctx.with_value(token);
            }
        }

        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let raw_query = req.uri().query().unwrap_or("").to_owned();
        let pretty = is_pretty(&raw_query);

        let segments = match strip_base_path(&path, &self.options.base_path) {
            Some(rest) => rest.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>(),
            None => return Ok(not_found(&path, pretty)),
        };

        match (&method, segments.as_slice()) {
            (&Method::GET, [API_PREFIX, "services"]) => self.get_services(&ctx, pretty).await,
            (&Method::GET, [API_PREFIX, "operations"]) => {
                self.get_operations(&ctx, &raw_query, pretty).await
            }
            (&Method::GET, [API_PREFIX, "services", service, "operations"]) => {
                self.get_legacy_operations(&ctx, service, pretty).await
            }
            (&Method::GET, [API_PREFIX, "traces"]) => {
                self.search_traces(&ctx, &raw_query, pretty).await
            }
            (&Method::GET, [API_PREFIX, "traces", trace_id]) => {
                self.get_trace(&ctx, trace_id, &raw_query, pretty, false).await
            }
            (&Method::GET, [API_PREFIX, "archive", trace_id]) => {
                self.get_trace(&ctx, trace_id, &raw_query, pretty, true).await
            }
            (&Method::POST, [API_PREFIX, "archive", trace_id]) => {
                self.archive_trace(&ctx, trace_id, &raw_query, pretty).await
            }
            (&Method::GET, [API_PREFIX, "dependencies"]) => {
                self.get_dependencies(&ctx, &raw_query, pretty).await
            }
            (&Method::GET, [API_PREFIX, "metrics", kind]) => {
                self.get_metrics(&ctx, kind, &raw_query, pretty).await
            }
            (&Method::POST, [API_PREFIX, "transform"]) => {
                let body = read_body(req).await?;
                self.transform(&body, pretty)
            }
            _ => Ok(not_found(&path, pretty)),
        }
    }

    async fn get_services(
        &self,
        ctx: &RequestContext,
        pretty: bool,
    ) -> Result<HttpResponse, QueryError> {
        let services = self.query_service.get_services(ctx).await?;
        let total = services.len();
        Ok(json_response(
            StatusCode::OK,
            &StructuredResponse::new(services, total),
            pretty,
        ))
    }

    async fn get_operations(
        &self,
        ctx: &RequestContext,
        raw_query: &str,
        pretty: bool,
    ) -> Result<HttpResponse, QueryError> {
        let query = self.parser.parse_operations_query(raw_query)?;
        let operations = self.query_service.get_operations(ctx, query).await?;
        let data: Vec<UiOperation> = operations
            .into_iter()
            .map(|op| UiOperation {
                name: op.name,
                span_kind: op.span_kind,
            })
            .collect();
        let total = data.len();
        Ok(json_response(
            StatusCode::OK,
            &StructuredResponse::new(data, total),
            pretty,
        ))
    }

    /// The legacy operation listing returns names only.
    async fn get_legacy_operations(
        &self,
        ctx: &RequestContext,
        service: &str,
        pretty: bool,
    ) -> Result<HttpResponse, QueryError> {
        let operations = self
            .query_service
            .get_operations(
                ctx,
                tracequery_storage::OperationQueryParameters {
                    service_name: service.to_owned(),
                    span_kind: None,
                },
            )
            .await?;
        let names: Vec<String> = operations.into_iter().map(|op| op.name).collect();
        let total = names.len();
        Ok(json_response(
            StatusCode::OK,
            &StructuredResponse::new(names, total),
            pretty,
        ))
    }

    async fn search_traces(
        &self,
        ctx: &RequestContext,
        raw_query: &str,
        pretty: bool,
    ) -> Result<HttpResponse, QueryError> {
        let query = self.parser.parse_trace_query(raw_query)?;

        if query.trace_ids.is_empty() && query.parameters.service_name.is_empty() {
            return Err(QueryError::invalid_param("service", "parameter is required"));
        }

        let (traces, missing) = if query.trace_ids.is_empty() {
            (
                self.query_service
                    .find_traces(ctx, query.parameters, query.raw)
                    .await?,
                Vec::new(),
            )
        } else {
            self.query_service
                .get_traces(ctx, &query.trace_ids, query.raw)
                .await?
        };

        let mut errors: Vec<StructuredError> = missing
            .iter()
            .map(|trace_id| StructuredError {
                code: StatusCode::NOT_FOUND.as_u16(),
                msg: QueryError::NotFound.to_string(),
                trace_id: Some(trace_id.to_string()),
            })
            .collect();
        errors.extend(warning_errors(&traces));

        let status = if traces.is_empty() && !missing.is_empty() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        };
        let data: Vec<UiTrace> = traces.iter().map(trace_to_ui).collect();
        let total = data.len();
        Ok(json_response(
            status,
            &StructuredResponse::new(data, total).with_errors(errors),
            pretty,
        ))
    }

    async fn get_trace(
        &self,
        ctx: &RequestContext,
        trace_id: &str,
        raw_query: &str,
        pretty: bool,
        archived: bool,
    ) -> Result<HttpResponse, QueryError> {
        let (trace_id, window) = self.trace_request(trace_id, raw_query)?;
        let query = GetTraceParameters {
            trace_id,
            start_time: window.start_time,
            end_time: window.end_time,
        };
        let trace = if archived {
            self.query_service
                .get_archived_trace(ctx, query, window.raw)
                .await?
        } else {
            self.query_service.get_trace(ctx, query, window.raw).await?
        };

        let traces = vec![trace];
        let errors = warning_errors(&traces);
        let data: Vec<UiTrace> = traces.iter().map(trace_to_ui).collect();
        Ok(json_response(
            StatusCode::OK,
            &StructuredResponse::new(data, 1).with_errors(errors),
            pretty,
        ))
    }

    async fn archive_trace(
        &self,
        ctx: &RequestContext,
        trace_id: &str,
        raw_query: &str,
        pretty: bool,
    ) -> Result<HttpResponse, QueryError> {
        let (trace_id, window) = self.trace_request(trace_id, raw_query)?;
        self.query_service
            .archive_trace(
                ctx,
                GetTraceParameters {
                    trace_id,
                    start_time: window.start_time,
                    end_time: window.end_time,
                },
            )
            .await?;
        Ok(json_response(
            StatusCode::OK,
            &StructuredResponse::new(serde_json::Value::Null, 0),
            pretty,
        ))
    }

    fn trace_request(
        &self,
        trace_id: &str,
        raw_query: &str,
    ) -> Result<(TraceId, TraceWindow), QueryError> {
        let trace_id = TraceId::from_hex(trace_id)
            .map_err(|err| QueryError::invalid_param("traceID", err))?;
        let window = self.parser.parse_trace_window(raw_query)?;
        Ok((trace_id, window))
    }

    async fn get_dependencies(
        &self,
        ctx: &RequestContext,
        raw_query: &str,
        pretty: bool,
    ) -> Result<HttpResponse, QueryError> {
        let query = self.parser.parse_dependency_query(raw_query)?;
        let mut links = self
            .query_service
            .get_dependencies(ctx, query.parameters)
            .await?;
        if let Some(service) = &query.service {
            links = tracequery_model::filter_dependencies(links, service);
        }
        let data: Vec<UiDependencyLink> = links.iter().map(Into::into).collect();
        let total = data.len();
        Ok(json_response(
            StatusCode::OK,
            &StructuredResponse::new(data, total),
            pretty,
        ))
    }

    /// Metrics responses carry the metric family shape directly rather
    /// than the structured envelope, matching what the UI plots expect.
    async fn get_metrics(
        &self,
        ctx: &RequestContext,
        kind: &str,
        raw_query: &str,
        pretty: bool,
    ) -> Result<HttpResponse, QueryError> {
        if kind == "minstep" {
            let min_step = self.metrics_service.get_min_step_duration(ctx).await?;
            let body = serde_json::json!({ "minStep": min_step.as_millis() as u64 });
            return Ok(json_response(StatusCode::OK, &body, pretty));
        }

        let params = self.parser.parse_metrics_query(raw_query)?;
        let family = match kind {
            "latencies" => self.metrics_service.get_latencies(ctx, &params).await?,
            "calls" => self.metrics_service.get_call_rates(ctx, &params).await?,
            "errors" => self.metrics_service.get_error_rates(ctx, &params).await?,
            other => {
                return Err(QueryError::invalid_param(
                    "metric kind",
                    format!("unknown metric kind {other:?}"),
                ))
            }
        };
        Ok(json_response(
            StatusCode::OK,
            &metric_family_to_json(&family),
            pretty,
        ))
    }

    fn transform(&self, body: &[u8], pretty: bool) -> Result<HttpResponse, QueryError> {
        let traces = otlp::traces_from_otlp_json(body)?;
        let data: Vec<UiTrace> = traces.iter().map(trace_to_ui).collect();
        let total = data.len();
        Ok(json_response(
            StatusCode::OK,
            &StructuredResponse::new(data, total),
            pretty,
        ))
    }
}

/// Adjuster warnings become envelope errors without a code; the
/// response stays a 200.
fn warning_errors(traces: &[tracequery_model::Trace]) -> Vec<StructuredError> {
    traces
        .iter()
        .flat_map(|trace| {
            let trace_id = trace
                .trace_id()
                .map(|id| id.to_string())
                .unwrap_or_default();
            trace.warnings.iter().map(move |warning| StructuredError {
                code: 0,
                msg: warning.clone(),
                trace_id: Some(trace_id.clone()),
            })
        })
        .collect()
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    let base = base_path.trim_end_matches('/');
    let rest = path.strip_prefix(base)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    Some(rest)
}

/// `prettyPrint` with any non-empty value other than `false` switches
/// to indented output.
fn is_pretty(raw_query: &str) -> bool {
    url::form_urlencoded::parse(raw_query.as_bytes())
        .find(|(k, _)| k == "prettyPrint")
        .map(|(_, v)| !v.is_empty() && v != "false")
        .unwrap_or(false)
}

async fn read_body<B>(req: Request<B>) -> Result<Bytes, QueryError>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Display,
{
    req.into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|err| QueryError::Internal(format!("unable to read request body: {err}")))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T, pretty: bool) -> HttpResponse {
    let encoded = if pretty {
        serde_json::to_vec_pretty(body)
    } else {
        serde_json::to_vec(body)
    };
    let bytes = match encoded {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "failed to marshal response body");
            b"null".to_vec()
        }
    };
    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

/// The envelope form of a hard failure: `data` is null, `errors` holds
/// the classified cause.
pub(crate) fn error_response(err: &QueryError, pretty: bool) -> HttpResponse {
    let status = err.http_status();
    let body = StructuredResponse::new(serde_json::Value::Null, 0).with_errors(vec![
        StructuredError {
            code: status.as_u16(),
            msg: err.to_string(),
            trace_id: None,
        },
    ]);
    json_response(status, &body, pretty)
}

fn not_found(path: &str, pretty: bool) -> HttpResponse {
    let body = StructuredResponse::new(serde_json::Value::Null, 0).with_errors(vec![
        StructuredError {
            code: StatusCode::NOT_FOUND.as_u16(),
            msg: format!("no route for {path:?}"),
            trace_id: None,
        },
    ]);
    json_response(StatusCode::NOT_FOUND, &body, pretty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_stripping() {
        assert_eq!(strip_base_path("/api/services", "/"), Some("/api/services"));
        assert_eq!(
            strip_base_path("/jaeger/api/services", "/jaeger"),
            Some("/api/services")
        );
        assert_eq!(
            strip_base_path("/jaeger/api/services", "/jaeger/"),
            Some("/api/services")
        );
        assert_eq!(strip_base_path("/other/api", "/jaeger"), None);
        assert_eq!(strip_base_path("/jaegerx/api", "/jaeger"), None);
    }

    #[test]
    fn pretty_print_switch() {
        assert!(!is_pretty(""));
        assert!(!is_pretty("prettyPrint="));
        assert!(!is_pretty("prettyPrint=false"));
        assert!(is_pretty("prettyPrint=true"));
        assert!(is_pretty("prettyPrint=1"));
    }

}
