//! The dual-protocol server: listeners, HTTP/gRPC demultiplexing and
//! lifecycle.
//!
//! In shared-port mode a single TCP listener serves both protocols and
//! requests are demultiplexed per request on the gRPC content type;
//! TLS is rejected there because termination would hide the signal. In
//! separate-port mode each protocol gets its own listener, optionally
//! wrapped in TLS with h2 and http/1.1 ALPN.
//!
//! Every accepted connection is served by an independent task. On
//! close, listeners stop accepting, in-flight connections receive a
//! graceful shutdown and are drained up to the caller's deadline, then
//! aborted. Each listener task signals `Unavailable` on the health
//! channel when it exits, fatal accept errors included.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tonic::body::BoxBody;
use tonic::server::NamedService;
use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};

use tracequery_proto::descriptor;
use tracequery_proto::tonic::api_v2::query_service_server::QueryServiceServer;
use tracequery_proto::tonic::api_v3::query_service_server::QueryServiceServer as QueryServiceV3Server;
use tracequery_proto::tonic::metrics::metrics_query_service_server::MetricsQueryServiceServer;

use crate::config::ServerOptions;
use crate::grpc::{MetricsHandler, QueryHandler, QueryHandlerV3};
use crate::http::HttpHandler;

/// Errors surfaced while standing the server up.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listener configuration is contradictory.
    #[error("invalid server configuration: {0}")]
    InvalidConfig(String),

    /// A listener could not be bound.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    /// TLS material could not be loaded.
    #[error("failed to load TLS configuration: {0}")]
    Tls(String),

    /// The reflection registry rejected the descriptor set.
    #[error("failed to build reflection service: {0}")]
    Reflection(String),
}

/// Health of a server component, fanned out over a watch channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentStatus {
    /// Accepting and serving connections.
    Serving,
    /// A listener task has exited; the component no longer serves.
    Unavailable,
}

type ErasedGrpcService = BoxCloneService<Request<Incoming>, Response<BoxBody>, Infallible>;

/// Routes gRPC requests to the registered services by path prefix.
#[derive(Clone)]
struct GrpcRouter {
    routes: Vec<(String, ErasedGrpcService)>,
}

impl GrpcRouter {
    async fn dispatch(self, req: Request<Incoming>) -> Response<BoxBody> {
        let path = req.uri().path().to_owned();
        let matched = self
            .routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, service)| service.clone());
        match matched {
            Some(service) => match service.oneshot(req).await {
                Ok(response) => response,
                Err(infallible) => match infallible {},
            },
            None => unimplemented_response(),
        }
    }
}

fn route<S>(service: S) -> (String, ErasedGrpcService)
where
    S: Service<Request<Incoming>, Response = Response<BoxBody>, Error = Infallible>
        + NamedService
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    (format!("/{}/", S::NAME), BoxCloneService::new(service))
}

fn empty_box_body() -> BoxBody {
    http_body_util::Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn unimplemented_response() -> Response<BoxBody> {
    let mut response = Response::new(empty_box_body());
    response
        .headers_mut()
        .insert("grpc-status", HeaderValue::from_static("12"));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
    response
}

/// The demultiplexing signal: HTTP/2 requests whose content type is the
/// gRPC one route to the gRPC services.
fn is_grpc_request<B>(req: &Request<B>) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .map(|ct| {
            ct.as_bytes() == b"application/grpc" || ct.as_bytes() == b"application/grpc+proto"
        })
        .unwrap_or(false)
}

/// What a single listener serves.
#[derive(Clone)]
enum ListenerService {
    Shared {
        http: Arc<HttpHandler>,
        grpc: GrpcRouter,
    },
    Http(Arc<HttpHandler>),
    Grpc(GrpcRouter),
}

impl ListenerService {
    async fn serve(self, req: Request<Incoming>) -> Result<Response<BoxBody>, Infallible> {
        match self {
            ListenerService::Shared { http, grpc } => {
                if is_grpc_request(&req) {
                    Ok(grpc.dispatch(req).await)
                } else {
                    Ok(rest_response(http.handle(req).await))
                }
            }
            ListenerService::Http(http) => Ok(rest_response(http.handle(req).await)),
            ListenerService::Grpc(grpc) => Ok(grpc.dispatch(req).await),
        }
    }
}

fn rest_response(response: crate::http::HttpResponse) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed_unsync())
}

/// A stream accepted by a listener, TLS-wrapped or plain.
enum AcceptedStream {
    Plain(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<tokio_rustls::server::TlsStream<TcpStream>>),
}

impl AsyncRead for AcceptedStream {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            AcceptedStream::Plain(stream) => std::pin::Pin::new(stream).poll_read(cx, buf),
            #[cfg(feature = "tls")]
            AcceptedStream::Tls(stream) => std::pin::Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for AcceptedStream {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        match self.get_mut() {
            AcceptedStream::Plain(stream) => std::pin::Pin::new(stream).poll_write(cx, buf),
            #[cfg(feature = "tls")]
            AcceptedStream::Tls(stream) => std::pin::Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            AcceptedStream::Plain(stream) => std::pin::Pin::new(stream).poll_flush(cx),
            #[cfg(feature = "tls")]
            AcceptedStream::Tls(stream) => std::pin::Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            AcceptedStream::Plain(stream) => std::pin::Pin::new(stream).poll_shutdown(cx),
            #[cfg(feature = "tls")]
            AcceptedStream::Tls(stream) => std::pin::Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

#[cfg(feature = "tls")]
type TlsAcceptor = tokio_rustls::TlsAcceptor;
#[cfg(not(feature = "tls"))]
#[derive(Clone)]
struct TlsAcceptor;

#[cfg(feature = "tls")]
fn tls_acceptor(options: &crate::config::TlsOptions) -> Result<TlsAcceptor, ServerError> {
    use std::fs::File;
    use std::io::BufReader;

    let open = |path: &std::path::Path| {
        File::open(path)
            .map(BufReader::new)
            .map_err(|err| ServerError::Tls(format!("{}: {err}", path.display())))
    };

    let certs: Vec<_> = rustls_pemfile::certs(&mut open(&options.cert_path)?)
        .collect::<Result<_, _>>()
        .map_err(|err| ServerError::Tls(format!("invalid certificate chain: {err}")))?;
    let key = rustls_pemfile::private_key(&mut open(&options.key_path)?)
        .map_err(|err| ServerError::Tls(format!("invalid private key: {err}")))?
        .ok_or_else(|| ServerError::Tls("no private key found".to_owned()))?;

    let mut config = tokio_rustls::rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| ServerError::Tls(err.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(not(feature = "tls"))]
fn tls_acceptor(_options: &crate::config::TlsOptions) -> Result<TlsAcceptor, ServerError> {
    Err(ServerError::Tls(
        "TLS support is not compiled in (enable the `tls` feature)".to_owned(),
    ))
}

/// The running dual-protocol server.
pub struct Server {
    http_addr: SocketAddr,
    grpc_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<()>,
    health: watch::Receiver<ComponentStatus>,
}

impl Server {
    /// Binds the listeners and launches the background serve tasks.
    pub async fn start(
        options: &ServerOptions,
        http_handler: HttpHandler,
        grpc_handlers: (QueryHandler, MetricsHandler, QueryHandlerV3),
    ) -> Result<Server, ServerError> {
        if options.shared_port() && options.uses_tls() {
            return Err(ServerError::InvalidConfig(
                "TLS cannot terminate on a port shared between HTTP and gRPC".to_owned(),
            ));
        }

        let http = Arc::new(http_handler);
        let grpc = grpc_router(grpc_handlers).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (health_tx, health_rx) = watch::channel(ComponentStatus::Serving);
        let health_tx = Arc::new(health_tx);
        let mut tasks = JoinSet::new();

        let (http_addr, grpc_addr);
        if options.shared_port() {
            let listener = bind(&options.http_endpoint).await?;
            http_addr = local_addr(&listener, &options.http_endpoint)?;
            grpc_addr = http_addr;
            tracing::info!(address = %http_addr, "serving HTTP and gRPC on a shared port");
            tasks.spawn(serve_loop(
                listener,
                ListenerService::Shared { http, grpc },
                None,
                shutdown_rx,
                health_tx,
                "shared",
            ));
        } else {
            let http_tls = options.http_tls.as_ref().map(tls_acceptor).transpose()?;
            let grpc_tls = options.grpc_tls.as_ref().map(tls_acceptor).transpose()?;

            let http_listener = bind(&options.http_endpoint).await?;
            http_addr = local_addr(&http_listener, &options.http_endpoint)?;
            let grpc_listener = bind(&options.grpc_endpoint).await?;
            grpc_addr = local_addr(&grpc_listener, &options.grpc_endpoint)?;
            tracing::info!(http = %http_addr, grpc = %grpc_addr, "serving HTTP and gRPC on separate ports");

            tasks.spawn(serve_loop(
                http_listener,
                ListenerService::Http(http),
                http_tls,
                shutdown_rx.clone(),
                health_tx.clone(),
                "http",
            ));
            tasks.spawn(serve_loop(
                grpc_listener,
                ListenerService::Grpc(grpc),
                grpc_tls,
                shutdown_rx,
                health_tx,
                "grpc",
            ));
        }

        Ok(Server {
            http_addr,
            grpc_addr,
            shutdown: shutdown_tx,
            tasks,
            health: health_rx,
        })
    }

    /// The bound HTTP address; with `:0` endpoints this carries the
    /// OS-assigned port.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// The bound gRPC address.
    pub fn grpc_addr(&self) -> SocketAddr {
        self.grpc_addr
    }

    /// Watch the component health; listener exits flip it to
    /// `Unavailable`.
    pub fn health_watch(&self) -> watch::Receiver<ComponentStatus> {
        self.health.clone()
    }

    /// Stops accepting, drains in-flight connections up to `deadline`,
    /// then aborts whatever is left.
    pub async fn close(mut self, deadline: Duration) {
        let _ = self.shutdown.send(true);
        let drained = tokio::time::timeout(deadline, async {
            while self.tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!("close deadline exceeded, aborting remaining connections");
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }
    }
}

async fn bind(endpoint: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(endpoint)
        .await
        .map_err(|source| ServerError::Bind {
            endpoint: endpoint.to_owned(),
            source,
        })
}

fn local_addr(listener: &TcpListener, endpoint: &str) -> Result<SocketAddr, ServerError> {
    listener.local_addr().map_err(|source| ServerError::Bind {
        endpoint: endpoint.to_owned(),
        source,
    })
}

async fn grpc_router(
    (query, metrics, v3): (QueryHandler, MetricsHandler, QueryHandlerV3),
) -> Result<GrpcRouter, ServerError> {
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<QueryServiceServer<QueryHandler>>()
        .await;
    health_reporter
        .set_serving::<MetricsQueryServiceServer<MetricsHandler>>()
        .await;
    health_reporter
        .set_serving::<QueryServiceV3Server<QueryHandlerV3>>()
        .await;

    let reflection = tonic_reflection::server::Builder::configure()
        .register_file_descriptor_set(descriptor::file_descriptor_set())
        .build_v1()
        .map_err(|err| ServerError::Reflection(err.to_string()))?;

    Ok(GrpcRouter {
        routes: vec![
            route(QueryServiceServer::new(query)),
            route(MetricsQueryServiceServer::new(metrics)),
            route(QueryServiceV3Server::new(v3)),
            route(health_service),
            route(reflection),
        ],
    })
}

async fn serve_loop(
    listener: TcpListener,
    service: ListenerService,
    tls: Option<TlsAcceptor>,
    mut shutdown: watch::Receiver<bool>,
    health: Arc<watch::Sender<ComponentStatus>>,
    name: &'static str,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _peer)) => {
                    let service = service.clone();
                    let tls = tls.clone();
                    let conn_shutdown = shutdown.clone();
                    connections.spawn(async move {
                        serve_connection(stream, service, tls, conn_shutdown).await;
                    });
                }
                Err(err) => {
                    // A failing accept loop cannot recover; report and
                    // stop this listener.
                    tracing::error!(listener = name, error = %err, "accept failed, stopping listener");
                    break;
                }
            },
        }
    }
    drop(listener);
    // In-flight connections observe the shutdown signal themselves.
    while connections.join_next().await.is_some() {}
    let _ = health.send(ComponentStatus::Unavailable);
    tracing::debug!(listener = name, "listener stopped");
}

async fn serve_connection(
    stream: TcpStream,
    service: ListenerService,
    tls: Option<TlsAcceptor>,
    mut shutdown: watch::Receiver<bool>,
) {
    let stream = match tls {
        None => AcceptedStream::Plain(stream),
        #[cfg(feature = "tls")]
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => AcceptedStream::Tls(Box::new(tls_stream)),
            Err(err) => {
                tracing::debug!(error = %err, "TLS handshake failed");
                return;
            }
        },
        #[cfg(not(feature = "tls"))]
        Some(_) => return,
    };

    let hyper_service = service_fn(move |req| {
        let service = service.clone();
        async move { service.serve(req).await }
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), hyper_service);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(err) = result {
                    tracing::debug!(error = %err, "connection ended with error");
                }
                break;
            }
            changed = shutdown.changed(), if !draining => {
                let _ = changed;
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}
