//! Immutable option structs captured once at server construction.
//!
//! There is no live reconfiguration path: the embedding application
//! parses flags and files (external collaborators) and hands the result
//! over as values here.

use std::path::PathBuf;
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::QueryError;

/// Default lookback window for trace searches without explicit bounds.
pub const DEFAULT_TRACE_LOOKBACK: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Default tenant header name.
pub const DEFAULT_TENANCY_HEADER: &str = "x-tenant";

/// Multi-tenancy settings for the request-entry handlers.
#[derive(Clone, Debug)]
pub struct TenancyOptions {
    /// Whether requests must carry a tenant header.
    pub enabled: bool,
    /// The header carrying the tenant name.
    pub header: String,
    /// Tenants allowed through. Empty means any tenant is accepted.
    pub allowed: Vec<String>,
}

impl Default for TenancyOptions {
    fn default() -> Self {
        TenancyOptions {
            enabled: false,
            header: DEFAULT_TENANCY_HEADER.to_owned(),
            allowed: Vec::new(),
        }
    }
}

impl TenancyOptions {
    /// Whether the given tenant may pass.
    pub fn allows(&self, tenant: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|t| t == tenant)
    }
}

/// Options governing the query surfaces.
#[derive(Clone, Debug)]
pub struct QueryOptions {
    /// Path prefix the HTTP routes are mounted under.
    pub base_path: String,
    /// Upper bound for clock skew correction. Zero disables the adjuster.
    pub max_clock_skew_adjust: Duration,
    /// Forward bearer tokens from inbound requests to storage.
    pub bearer_token_propagation: bool,
    /// Headers written on every HTTP response.
    pub additional_headers: HeaderMap,
    /// Multi-tenancy settings.
    pub tenancy: TenancyOptions,
    /// Emit the W3C `traceresponse` header derived from the inbound
    /// trace context.
    pub enable_tracing: bool,
    /// Lookback used when a trace search has no explicit time bounds.
    pub default_lookback: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            base_path: "/".to_owned(),
            max_clock_skew_adjust: Duration::ZERO,
            bearer_token_propagation: false,
            additional_headers: HeaderMap::new(),
            tenancy: TenancyOptions::default(),
            enable_tracing: false,
            default_lookback: DEFAULT_TRACE_LOOKBACK,
        }
    }
}

impl QueryOptions {
    /// Mount the HTTP routes under the given path prefix.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Allow clock skew correction up to the given bound.
    pub fn with_max_clock_skew_adjust(mut self, max: Duration) -> Self {
        self.max_clock_skew_adjust = max;
        self
    }

    /// Forward bearer tokens from inbound requests to storage.
    pub fn with_bearer_token_propagation(mut self, enabled: bool) -> Self {
        self.bearer_token_propagation = enabled;
        self
    }

    /// Write the given headers on every HTTP response.
    pub fn with_additional_headers(mut self, headers: HeaderMap) -> Self {
        self.additional_headers = headers;
        self
    }

    /// Require and validate tenant headers.
    pub fn with_tenancy(mut self, tenancy: TenancyOptions) -> Self {
        self.tenancy = tenancy;
        self
    }

    /// Emit `traceresponse` headers.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

/// Server-side TLS material, one per listener.
#[derive(Clone, Debug)]
pub struct TlsOptions {
    /// PEM file holding the certificate chain.
    pub cert_path: PathBuf,
    /// PEM file holding the private key.
    pub key_path: PathBuf,
}

/// Listener configuration for the dual-protocol server.
///
/// When both endpoints are equal and the port is fixed, a single shared
/// listener demultiplexes HTTP and gRPC; otherwise two listeners are
/// bound. TLS is only available in separate-port mode, because
/// termination would hide the demultiplexing signal.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// `host:port` for the HTTP listener.
    pub http_endpoint: String,
    /// `host:port` for the gRPC listener.
    pub grpc_endpoint: String,
    /// TLS for the HTTP side.
    pub http_tls: Option<TlsOptions>,
    /// TLS for the gRPC side.
    pub grpc_tls: Option<TlsOptions>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            http_endpoint: "127.0.0.1:16686".to_owned(),
            grpc_endpoint: "127.0.0.1:16685".to_owned(),
            http_tls: None,
            grpc_tls: None,
        }
    }
}

impl ServerOptions {
    /// Whether a single shared listener serves both protocols.
    pub fn shared_port(&self) -> bool {
        self.http_endpoint == self.grpc_endpoint && !self.http_endpoint.ends_with(":0")
    }

    /// Whether TLS is configured on either side.
    pub fn uses_tls(&self) -> bool {
        self.http_tls.is_some() || self.grpc_tls.is_some()
    }
}

/// Parses `Key: Value` header lines into a header map.
///
/// Lines follow RFC 822 MIME conventions: a line starting with
/// whitespace folds into the previous header's value.
pub fn parse_additional_headers(lines: &[String]) -> Result<HeaderMap, QueryError> {
    let mut headers = HeaderMap::new();
    let mut last: Option<HeaderName> = None;
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            let name = last.clone().ok_or_else(|| {
                QueryError::invalid_param("additional-headers", "continuation without a header")
            })?;
            let folded = match headers.get(&name) {
                Some(existing) => format!(
                    "{} {}",
                    existing.to_str().unwrap_or_default(),
                    line.trim()
                ),
                None => line.trim().to_owned(),
            };
            let value = HeaderValue::from_str(&folded)
                .map_err(|e| QueryError::invalid_param("additional-headers", e))?;
            headers.insert(name, value);
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            QueryError::invalid_param("additional-headers", format!("malformed line {line:?}"))
        })?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| QueryError::invalid_param("additional-headers", e))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| QueryError::invalid_param("additional-headers", e))?;
        headers.insert(name.clone(), value);
        last = Some(name);
    }
    Ok(headers)
}
