//! End-to-end tests of the REST surface over a real listener.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use tracequery::adjuster::Pipeline;
use tracequery::config::{QueryOptions, ServerOptions, TenancyOptions};
use tracequery::grpc;
use tracequery::http::HttpHandler;
use tracequery::server::Server;
use tracequery::{MetricsQueryService, QueryService, QueryServiceOptions};
use tracequery_model::{
    DependencyLink, KeyValue, Process, RequestContext, Span, SpanId, Trace, TraceId,
};
use tracequery_storage::memory::InMemoryStorage;
use tracequery_storage::{StorageError, StorageResult, TraceWriter};

fn span(trace_id: u128, span_id: u64, service: &str, start_micros: u64) -> Span {
    Span {
        trace_id: TraceId::from(trace_id),
        span_id: SpanId::from(span_id),
        operation_name: format!("op-{span_id}"),
        start_time: Some(UNIX_EPOCH + Duration::from_micros(start_micros)),
        duration: Duration::from_micros(100),
        tags: vec![KeyValue::string("k", "v")],
        process: Process::new(service, vec![]),
        ..Default::default()
    }
}

struct Fixture {
    primary: Arc<InMemoryStorage>,
    archive: Arc<InMemoryStorage>,
    options: QueryOptions,
    archive_writer: Option<Arc<dyn TraceWriter>>,
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture {
            primary: Arc::new(InMemoryStorage::new()),
            archive: Arc::new(InMemoryStorage::new()),
            options: QueryOptions::default(),
            archive_writer: None,
        }
    }
}

impl Fixture {
    async fn start(self) -> Server {
        let query_service = Arc::new(QueryService::new(
            self.primary.clone(),
            self.primary.clone(),
            QueryServiceOptions {
                adjuster: Pipeline::standard(Duration::ZERO),
                archive_reader: Some(self.archive.clone()),
                archive_writer: Some(self.archive_writer.unwrap_or_else(|| self.archive.clone())),
            },
        ));
        let http_handler = HttpHandler::new(
            query_service.clone(),
            MetricsQueryService::disabled(),
            self.options.clone(),
        );
        let grpc_handlers = grpc::handlers(
            query_service,
            MetricsQueryService::disabled(),
            self.options,
        );
        let server_options = ServerOptions {
            http_endpoint: "127.0.0.1:0".to_owned(),
            grpc_endpoint: "127.0.0.1:0".to_owned(),
            ..Default::default()
        };
        Server::start(&server_options, http_handler, grpc_handlers)
            .await
            .expect("server failed to start")
    }
}

async fn get_json(
    server: &Server,
    path_and_query: &str,
) -> (StatusCode, serde_json::Value) {
    request_json(server, Method::GET, path_and_query, Vec::new()).await
}

async fn request_json(
    server: &Server,
    method: Method,
    path_and_query: &str,
    headers: Vec<(&str, &str)>,
) -> (StatusCode, serde_json::Value) {
    let client: Client<_, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build_http();
    let mut builder = Request::builder()
        .method(method)
        .uri(format!("http://{}{}", server.http_addr(), path_and_query));
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    let request = builder.body(Full::new(Bytes::new())).unwrap();
    let response = client.request(request).await.expect("request failed");
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("response is not JSON")
    };
    (status, value)
}

#[tokio::test(flavor = "multi_thread")]
async fn services_round_trip() {
    let fixture = Fixture::default();
    fixture.primary.write_trace(Trace::new(vec![span(1, 1, "a", 1_000)]));
    fixture.primary.write_trace(Trace::new(vec![span(2, 2, "b", 2_000)]));
    let server = fixture.start().await;

    let (status, body) = get_json(&server, "/api/services").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!(["a", "b"]));
    assert_eq!(body["total"], serde_json::json!(2));

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_services_list_is_a_200() {
    let server = Fixture::default().start().await;

    let (status, body) = get_json(&server, "/api/services").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!([]));
    assert_eq!(body["total"], serde_json::json!(0));

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn search_short_circuits_to_ids_with_archive_fallback() {
    let fixture = Fixture::default();
    // id 1 lives only in the archive, id 2 only in the primary store.
    fixture.archive.write_trace(Trace::new(vec![span(1, 1, "a", 1_000)]));
    fixture.primary.write_trace(Trace::new(vec![span(2, 2, "b", 2_000)]));
    let server = fixture.start().await;

    let (status, body) = get_json(&server, "/api/traces?traceID=1&traceID=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert!(body.get("errors").is_none());

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_traces_produce_structured_errors() {
    let server = Fixture::default().start().await;

    let (status, body) = get_json(&server, "/api/traces?traceID=dead").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"], serde_json::json!([]));
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], serde_json::json!(404));
    assert_eq!(
        errors[0]["traceID"],
        serde_json::json!("0000000000000000000000000000dead")
    );

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn trace_ids_are_case_insensitive() {
    let fixture = Fixture::default();
    fixture
        .primary
        .write_trace(Trace::new(vec![span(0xabc123, 1, "a", 1_000)]));
    let server = fixture.start().await;

    let (upper_status, upper) = get_json(&server, "/api/traces/ABC123").await;
    let (lower_status, lower) = get_json(&server, "/api/traces/abc123").await;
    assert_eq!(upper_status, StatusCode::OK);
    assert_eq!(lower_status, StatusCode::OK);
    assert_eq!(upper["data"], lower["data"]);
    assert_eq!(
        upper["data"][0]["traceID"],
        serde_json::json!("00000000000000000000000000abc123")
    );

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn search_requires_a_service_or_ids() {
    let server = Fixture::default().start().await;

    let (status, body) = get_json(&server, "/api/traces").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"][0]["msg"],
        serde_json::json!("unable to parse param 'service': parameter is required")
    );

    server.close(Duration::from_secs(1)).await;
}

struct RejectingWriter;

#[async_trait]
impl TraceWriter for RejectingWriter {
    async fn write_span(&self, _ctx: &RequestContext, _span: Span) -> StorageResult<()> {
        Err(StorageError::Internal("cannot save".to_owned()))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_archival_joins_all_causes() {
    let mut fixture = Fixture::default();
    fixture.primary.write_trace(Trace::new(vec![
        span(5, 1, "a", 1_000),
        span(5, 2, "a", 2_000),
    ]));
    fixture.archive_writer = Some(Arc::new(RejectingWriter));
    let server = fixture.start().await;

    let (status, body) =
        request_json(&server, Method::POST, "/api/archive/5", Vec::new()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["errors"][0]["msg"],
        serde_json::json!("cannot save\ncannot save")
    );

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn archive_then_fetch_from_archive_route() {
    let fixture = Fixture::default();
    fixture.primary.write_trace(Trace::new(vec![span(7, 1, "a", 1_000)]));
    let archive = fixture.archive.clone();
    let server = fixture.start().await;

    let (status, _) = request_json(&server, Method::POST, "/api/archive/7", Vec::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archive.spans_of(TraceId::from(7u128)).len(), 1);

    let (status, body) = get_json(&server, "/api/archive/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn dependencies_filter_by_service() {
    let fixture = Fixture::default();
    fixture.primary.write_dependencies(vec![
        DependencyLink::new("killer", "queen", 12),
        DependencyLink::new("frontend", "billing", 3),
    ]);
    let server = fixture.start().await;

    let (status, body) =
        get_json(&server, "/api/dependencies?endTs=1476374248550&service=queen").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        serde_json::json!([{"parent": "killer", "child": "queen", "callCount": 12}])
    );

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn tenancy_guards_the_http_surface() {
    let mut fixture = Fixture::default();
    fixture.options = QueryOptions::default().with_tenancy(TenancyOptions {
        enabled: true,
        allowed: vec!["acme".to_owned()],
        ..Default::default()
    });
    let server = fixture.start().await;

    let (status, _) = get_json(&server, "/api/services").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request_json(
        &server,
        Method::GET,
        "/api/services",
        vec![("x-tenant", "acme")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request_json(
        &server,
        Method::GET,
        "/api/services",
        vec![("x-tenant", "globex")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn additional_headers_are_written_on_every_response() {
    let mut fixture = Fixture::default();
    fixture.options = QueryOptions::default().with_additional_headers(
        tracequery::config::parse_additional_headers(&[
            "Access-Control-Allow-Origin: *".to_owned(),
        ])
        .unwrap(),
    );
    let server = fixture.start().await;

    let client: Client<_, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build_http();
    let request = Request::builder()
        .uri(format!("http://{}/api/services", server.http_addr()))
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = client.request(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn pretty_printing_indents_the_body() {
    let fixture = Fixture::default();
    fixture.primary.write_trace(Trace::new(vec![span(1, 1, "a", 1_000)]));
    let server = fixture.start().await;

    let client: Client<_, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build_http();
    let request = Request::builder()
        .uri(format!(
            "http://{}/api/services?prettyPrint=true",
            server.http_addr()
        ))
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = client.request(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(std::str::from_utf8(&body).unwrap().contains("\n  "));

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn port_zero_yields_a_real_bound_port() {
    let server = Fixture::default().start().await;
    assert_ne!(server.http_addr().port(), 0);
    assert_ne!(server.grpc_addr().port(), 0);
    assert_ne!(server.http_addr().port(), server.grpc_addr().port());
    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_routes_return_the_error_envelope() {
    let server = Fixture::default().start().await;
    let (status, body) = get_json(&server, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"], serde_json::Value::Null);
    assert_eq!(body["errors"][0]["code"], serde_json::json!(404));
    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn transform_converts_otlp_json() {
    let server = Fixture::default().start().await;

    let payload = serde_json::json!({
        "resourceSpans": [{
            "resource": {"attributes": [
                {"key": "service.name", "value": {"stringValue": "frontend"}}
            ]},
            "scopeSpans": [{"spans": [{
                "traceId": "000000000000000000000000000000aa",
                "spanId": "0000000000000001",
                "name": "GET /",
                "startTimeUnixNano": "1000000",
                "endTimeUnixNano": "2000000"
            }]}]
        }]
    });

    let client: Client<_, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build_http();
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("http://{}/api/transform", server.http_addr()))
        .body(Full::new(Bytes::from(payload.to_string())))
        .unwrap();
    let response = client.request(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        value["data"][0]["spans"][0]["operationName"],
        serde_json::json!("GET /")
    );
    assert_eq!(
        value["data"][0]["processes"]["p1"]["serviceName"],
        serde_json::json!("frontend")
    );

    server.close(Duration::from_secs(1)).await;
}
