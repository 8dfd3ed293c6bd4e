//! Query-service core of a distributed tracing backend.
//!
//! The crate mediates between the external HTTP and gRPC query surfaces
//! and pluggable storage backends (see
//! [`tracequery-storage`](tracequery_storage)): it parses and validates
//! heterogeneous query parameters, orchestrates storage lookups with
//! archive fallback, post-processes traces through a deterministic
//! adjuster pipeline, and serves both protocols from shared or separate
//! listeners with coordinated lifecycle.
//!
//! # Overview
//!
//! * [`parser`] turns raw query strings into validated query objects.
//! * [`service`] looks up traces, applies [`adjuster`] passes and
//!   implements the trace-archival workflow.
//! * [`http`] and [`grpc`] expose the REST and gRPC surfaces.
//! * [`server`] accepts connections, demultiplexes HTTP from gRPC and
//!   manages startup, health signalling and graceful shutdown.
//!
//! Concrete storage backends, authentication token sources, UI assets and
//! configuration loading are external collaborators; the crate exposes
//! immutable option structs ([`config`]) captured once at construction.

pub mod adjuster;
pub mod config;
pub mod error;
pub mod grpc;
pub mod http;
pub mod parser;
pub mod server;
pub mod service;

pub use config::{QueryOptions, ServerOptions, TenancyOptions};
pub use error::QueryError;
pub use service::{MetricsQueryService, QueryService, QueryServiceOptions, StorageCapabilities};
