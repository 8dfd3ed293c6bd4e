//! End-to-end tests of the gRPC surface, including the shared-port
//! demultiplexer, over real sockets and generated clients.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio_stream::StreamExt;

use tracequery::adjuster::Pipeline;
use tracequery::config::{QueryOptions, ServerOptions};
use tracequery::grpc;
use tracequery::http::HttpHandler;
use tracequery::server::{ComponentStatus, Server, ServerError};
use tracequery::{MetricsQueryService, QueryService, QueryServiceOptions};
use tracequery_model::{Process, Span, SpanId, Trace, TraceId};
use tracequery_proto::tonic::api_v2;
use tracequery_proto::tonic::api_v2::query_service_client::QueryServiceClient;
use tracequery_storage::memory::InMemoryStorage;

fn span(trace_id: u128, span_id: u64, start_micros: u64) -> Span {
    Span {
        trace_id: TraceId::from(trace_id),
        span_id: SpanId::from(span_id),
        operation_name: format!("op-{span_id}"),
        start_time: Some(UNIX_EPOCH + Duration::from_micros(start_micros)),
        duration: Duration::from_micros(50),
        process: Process::new("svc", vec![]),
        ..Default::default()
    }
}

async fn start_server(options: ServerOptions, storage: Arc<InMemoryStorage>) -> Server {
    let query_service = Arc::new(QueryService::new(
        storage.clone(),
        storage.clone(),
        QueryServiceOptions {
            adjuster: Pipeline::standard(Duration::ZERO),
            archive_reader: None,
            archive_writer: Some(storage),
        },
    ));
    let http_handler = HttpHandler::new(
        query_service.clone(),
        MetricsQueryService::disabled(),
        QueryOptions::default(),
    );
    let grpc_handlers = grpc::handlers(
        query_service,
        MetricsQueryService::disabled(),
        QueryOptions::default(),
    );
    Server::start(&options, http_handler, grpc_handlers)
        .await
        .expect("server failed to start")
}

fn separate_ports() -> ServerOptions {
    ServerOptions {
        http_endpoint: "127.0.0.1:0".to_owned(),
        grpc_endpoint: "127.0.0.1:0".to_owned(),
        ..Default::default()
    }
}

/// Reserve a port for shared-port mode, which needs a fixed endpoint.
async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test(flavor = "multi_thread")]
async fn get_trace_streams_spans_over_a_socket() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.write_trace(Trace::new(vec![
        span(0xabc, 1, 1_000),
        span(0xabc, 2, 2_000),
    ]));
    let server = start_server(separate_ports(), storage).await;

    let mut client = QueryServiceClient::connect(format!("http://{}", server.grpc_addr()))
        .await
        .unwrap();
    let mut stream = client
        .get_trace(api_v2::GetTraceRequest {
            trace_id: TraceId::from(0xabcu128).to_bytes().to_vec(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();

    let mut spans = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        assert!(!chunk.spans.is_empty());
        spans.extend(chunk.spans);
    }
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].operation_name, "op-1");

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_traces_map_to_grpc_not_found() {
    let server = start_server(separate_ports(), Arc::new(InMemoryStorage::new())).await;

    let mut client = QueryServiceClient::connect(format!("http://{}", server.grpc_addr()))
        .await
        .unwrap();
    let status = match client
        .get_trace(api_v2::GetTraceRequest {
            trace_id: TraceId::from(0xdeadu128).to_bytes().to_vec(),
            ..Default::default()
        })
        .await
    {
        Err(status) => status,
        Ok(_) => panic!("expected NotFound"),
    };
    assert_eq!(status.code(), tonic::Code::NotFound);

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn find_traces_and_services_over_grpc() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.write_trace(Trace::new(vec![span(1, 1, 1_000)]));
    storage.write_trace(Trace::new(vec![span(2, 2, 2_000)]));
    let server = start_server(separate_ports(), storage).await;

    let mut client = QueryServiceClient::connect(format!("http://{}", server.grpc_addr()))
        .await
        .unwrap();

    let services = client
        .get_services(api_v2::GetServicesRequest {})
        .await
        .unwrap()
        .into_inner();
    assert_eq!(services.services, vec!["svc".to_owned()]);

    let mut stream = client
        .find_traces(api_v2::FindTracesRequest {
            query: Some(api_v2::TraceQueryParameters {
                service_name: "svc".to_owned(),
                start_time_min: Some(prost_types::Timestamp::default()),
                start_time_max: Some(prost_types::Timestamp {
                    seconds: 10,
                    nanos: 0,
                }),
                ..Default::default()
            }),
        })
        .await
        .unwrap()
        .into_inner();

    let mut spans = 0;
    while let Some(chunk) = stream.next().await {
        spans += chunk.unwrap().spans.len();
    }
    assert_eq!(spans, 2);

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_port_serves_both_protocols() {
    let port = free_port().await;
    let endpoint = format!("127.0.0.1:{port}");
    let options = ServerOptions {
        http_endpoint: endpoint.clone(),
        grpc_endpoint: endpoint,
        ..Default::default()
    };
    let storage = Arc::new(InMemoryStorage::new());
    storage.write_trace(Trace::new(vec![span(0xfe, 9, 1_000)]));
    let server = start_server(options, storage).await;
    assert_eq!(server.http_addr(), server.grpc_addr());

    // gRPC side.
    let mut grpc_client =
        QueryServiceClient::connect(format!("http://{}", server.grpc_addr()))
            .await
            .unwrap();
    let services = grpc_client
        .get_services(api_v2::GetServicesRequest {})
        .await
        .unwrap()
        .into_inner();
    assert_eq!(services.services, vec!["svc".to_owned()]);

    // HTTP side of the same listener.
    let http_client: Client<_, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build_http();
    let response = http_client
        .request(
            http::Request::builder()
                .uri(format!("http://{}/api/services", server.http_addr()))
                .body(Full::new(Bytes::new()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["data"], serde_json::json!(["svc"]));

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_port_rejects_tls() {
    let port = free_port().await;
    let endpoint = format!("127.0.0.1:{port}");
    let options = ServerOptions {
        http_endpoint: endpoint.clone(),
        grpc_endpoint: endpoint,
        http_tls: Some(tracequery::config::TlsOptions {
            cert_path: "cert.pem".into(),
            key_path: "key.pem".into(),
        }),
        grpc_tls: None,
    };

    let storage = Arc::new(InMemoryStorage::new());
    let query_service = Arc::new(QueryService::new(
        storage.clone(),
        storage,
        QueryServiceOptions::default(),
    ));
    let http_handler = HttpHandler::new(
        query_service.clone(),
        MetricsQueryService::disabled(),
        QueryOptions::default(),
    );
    let grpc_handlers = grpc::handlers(
        query_service,
        MetricsQueryService::disabled(),
        QueryOptions::default(),
    );
    let err = Server::start(&options, http_handler, grpc_handlers)
        .await
        .err()
        .expect("shared-port TLS must be rejected");
    assert!(matches!(err, ServerError::InvalidConfig(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn archive_trace_over_grpc() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.write_trace(Trace::new(vec![span(0x77, 1, 1_000)]));
    let server = start_server(separate_ports(), storage.clone()).await;

    let mut client = QueryServiceClient::connect(format!("http://{}", server.grpc_addr()))
        .await
        .unwrap();
    client
        .archive_trace(api_v2::ArchiveTraceRequest {
            trace_id: TraceId::from(0x77u128).to_bytes().to_vec(),
            ..Default::default()
        })
        .await
        .unwrap();

    // The archive writer of the fixture is the same store, so the trace
    // now holds its spans twice.
    assert_eq!(storage.spans_of(TraceId::from(0x77u128)).len(), 2);

    server.close(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn close_flips_health_to_unavailable() {
    let server = start_server(separate_ports(), Arc::new(InMemoryStorage::new())).await;
    let mut health = server.health_watch();
    assert_eq!(*health.borrow(), ComponentStatus::Serving);

    server.close(Duration::from_secs(1)).await;

    health.changed().await.unwrap();
    assert_eq!(*health.borrow(), ComponentStatus::Unavailable);
}
