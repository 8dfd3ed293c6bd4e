//! In-memory reference implementation of the storage contracts.
//!
//! Backs the integration tests of the query service. Matching semantics
//! follow the reader contract: a trace matches a search when at least one
//! of its spans satisfies every predicate, and `get_trace` treats an
//! absent time window as unconstrained (zero timestamps never reach this
//! store; the parser turns them into `None`).

use std::collections::BTreeSet;
use std::sync::RwLock;

use async_trait::async_trait;

use tracequery_model::{
    DependencyLink, KeyValue, Operation, RequestContext, Span, TagValue, Trace, TraceId,
};

use crate::{
    DependencyQueryParameters, DependencyReader, GetTraceParameters, OperationQueryParameters,
    StorageError, StorageResult, TraceQueryParameters, TraceReader, TraceWriter,
};

/// The span tag carrying the span kind, by OpenTracing convention.
const SPAN_KIND_TAG: &str = "span.kind";

#[derive(Default)]
struct Store {
    traces: Vec<Trace>,
    dependencies: Vec<DependencyLink>,
}

/// A process-local trace store.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<Store>,
}

impl InMemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        InMemoryStorage::default()
    }

    /// Adds a whole trace, merging with already stored spans of the same
    /// trace id.
    pub fn write_trace(&self, trace: Trace) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        for span in trace.spans {
            store_span(&mut inner, span);
        }
    }

    /// Replaces the stored dependency links.
    pub fn write_dependencies(&self, links: Vec<DependencyLink>) {
        self.inner.write().expect("store lock poisoned").dependencies = links;
    }

    /// Number of stored traces.
    pub fn trace_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").traces.len()
    }

    /// All spans stored under the given trace id, in insertion order.
    pub fn spans_of(&self, trace_id: TraceId) -> Vec<Span> {
        self.inner
            .read()
            .expect("store lock poisoned")
            .traces
            .iter()
            .find(|t| t.trace_id() == Some(trace_id))
            .map(|t| t.spans.clone())
            .unwrap_or_default()
    }
}

fn store_span(store: &mut Store, span: Span) {
    match store
        .traces
        .iter_mut()
        .find(|t| t.trace_id() == Some(span.trace_id))
    {
        Some(trace) => trace.spans.push(span),
        None => store.traces.push(Trace::new(vec![span])),
    }
}

fn tag_matches(tags: &[KeyValue], key: &str, want: &str) -> bool {
    tags.iter()
        .any(|kv| kv.key == key && (want.is_empty() || kv.value.to_string() == want))
}

fn span_matches(span: &Span, query: &TraceQueryParameters) -> bool {
    if !query.service_name.is_empty() && span.process.service_name != query.service_name {
        return false;
    }
    if !query.operation_name.is_empty() && span.operation_name != query.operation_name {
        return false;
    }
    let start = match span.start_time {
        Some(start) => start,
        None => return false,
    };
    if start < query.start_time_min || start > query.start_time_max {
        return false;
    }
    if let Some(min) = query.duration_min {
        if span.duration < min {
            return false;
        }
    }
    if let Some(max) = query.duration_max {
        if span.duration > max {
            return false;
        }
    }
    query.tags.iter().all(|(key, want)| {
        tag_matches(&span.tags, key, want)
            || tag_matches(&span.process.tags, key, want)
            || span.logs.iter().any(|log| tag_matches(&log.fields, key, want))
    })
}

fn span_kind_of(span: &Span) -> String {
    match span.tag(SPAN_KIND_TAG) {
        Some(KeyValue {
            value: TagValue::String(kind),
            ..
        }) => kind.clone(),
        _ => String::new(),
    }
}

#[async_trait]
impl TraceReader for InMemoryStorage {
    async fn get_trace(
        &self,
        _ctx: &RequestContext,
        query: GetTraceParameters,
    ) -> StorageResult<Trace> {
        let inner = self.inner.read().expect("store lock poisoned");
        let trace = inner
            .traces
            .iter()
            .find(|t| t.trace_id() == Some(query.trace_id))
            .ok_or(StorageError::TraceNotFound)?;

        let spans: Vec<Span> = trace
            .spans
            .iter()
            .filter(|span| {
                let start = match span.start_time {
                    Some(start) => start,
                    None => return true,
                };
                if let Some(min) = query.start_time {
                    if start < min {
                        return false;
                    }
                }
                if let Some(max) = query.end_time {
                    if start > max {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        if spans.is_empty() {
            return Err(StorageError::TraceNotFound);
        }
        Ok(Trace::new(spans))
    }

    async fn find_traces(
        &self,
        _ctx: &RequestContext,
        query: TraceQueryParameters,
    ) -> StorageResult<Vec<Trace>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .traces
            .iter()
            .filter(|trace| trace.spans.iter().any(|span| span_matches(span, &query)))
            .take(query.num_traces)
            .cloned()
            .collect())
    }

    async fn find_trace_ids(
        &self,
        ctx: &RequestContext,
        query: TraceQueryParameters,
    ) -> StorageResult<Vec<TraceId>> {
        Ok(self
            .find_traces(ctx, query)
            .await?
            .iter()
            .filter_map(Trace::trace_id)
            .collect())
    }

    async fn get_services(&self, _ctx: &RequestContext) -> StorageResult<Vec<String>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let services: BTreeSet<String> = inner
            .traces
            .iter()
            .flat_map(|t| t.spans.iter())
            .map(|s| s.process.service_name.clone())
            .filter(|name| !name.is_empty())
            .collect();
        Ok(services.into_iter().collect())
    }

    async fn get_operations(
        &self,
        _ctx: &RequestContext,
        query: OperationQueryParameters,
    ) -> StorageResult<Vec<Operation>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut seen = BTreeSet::new();
        let mut operations = Vec::new();
        for span in inner.traces.iter().flat_map(|t| t.spans.iter()) {
            if span.process.service_name != query.service_name {
                continue;
            }
            let kind = span_kind_of(span);
            if let Some(want) = query.span_kind {
                if kind != want.as_str() {
                    continue;
                }
            }
            if seen.insert((span.operation_name.clone(), kind.clone())) {
                operations.push(Operation {
                    name: span.operation_name.clone(),
                    span_kind: kind,
                });
            }
        }
        Ok(operations)
    }
}

#[async_trait]
impl TraceWriter for InMemoryStorage {
    async fn write_span(&self, _ctx: &RequestContext, span: Span) -> StorageResult<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        store_span(&mut inner, span);
        Ok(())
    }
}

#[async_trait]
impl DependencyReader for InMemoryStorage {
    async fn get_dependencies(
        &self,
        _ctx: &RequestContext,
        _query: DependencyQueryParameters,
    ) -> StorageResult<Vec<DependencyLink>> {
        // Stored links carry no timestamps; the window is ignored.
        Ok(self
            .inner
            .read()
            .expect("store lock poisoned")
            .dependencies
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use tracequery_model::{Process, SpanId};

    fn micros(n: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(n)
    }

    fn span(trace_id: u128, span_id: u64, service: &str, operation: &str, start: u64) -> Span {
        Span {
            trace_id: TraceId::from(trace_id),
            span_id: SpanId::from(span_id),
            operation_name: operation.to_owned(),
            start_time: Some(micros(start)),
            duration: Duration::from_micros(100),
            process: Process::new(service, vec![]),
            ..Default::default()
        }
    }

    fn seeded() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        storage.write_trace(Trace::new(vec![
            span(1, 1, "frontend", "GET /", 1_000),
            span(1, 2, "billing", "charge", 1_050),
        ]));
        storage.write_trace(Trace::new(vec![span(2, 3, "billing", "charge", 9_000)]));
        storage
    }

    fn search(service: &str) -> TraceQueryParameters {
        TraceQueryParameters {
            service_name: service.to_owned(),
            start_time_min: micros(0),
            start_time_max: micros(1_000_000),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn get_trace_distinguishes_not_found() {
        let storage = seeded();
        let ctx = RequestContext::new();
        let trace = storage
            .get_trace(&ctx, GetTraceParameters::for_trace(TraceId::from(1u128)))
            .await
            .unwrap();
        assert_eq!(trace.spans.len(), 2);

        let err = storage
            .get_trace(&ctx, GetTraceParameters::for_trace(TraceId::from(7u128)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_trace_applies_the_time_window() {
        let storage = seeded();
        let ctx = RequestContext::new();
        let query = GetTraceParameters {
            trace_id: TraceId::from(1u128),
            start_time: Some(micros(1_040)),
            end_time: None,
        };
        let trace = storage.get_trace(&ctx, query).await.unwrap();
        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.spans[0].operation_name, "charge");
    }

    #[tokio::test]
    async fn find_traces_matches_any_span() {
        let storage = seeded();
        let ctx = RequestContext::new();
        let traces = storage.find_traces(&ctx, search("billing")).await.unwrap();
        assert_eq!(traces.len(), 2);

        let mut narrowed = search("billing");
        narrowed.start_time_max = micros(2_000);
        let traces = storage.find_traces(&ctx, narrowed).await.unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].trace_id(), Some(TraceId::from(1u128)));
    }

    #[tokio::test]
    async fn find_traces_honors_the_limit() {
        let storage = seeded();
        let ctx = RequestContext::new();
        let mut query = search("billing");
        query.num_traces = 1;
        assert_eq!(storage.find_traces(&ctx, query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tag_filters_check_span_process_and_log_tags() {
        let storage = InMemoryStorage::new();
        let mut tagged = span(3, 4, "frontend", "GET /", 1_000);
        tagged.tags.push(KeyValue::string("http.method", "GET"));
        tagged.process.tags.push(KeyValue::string("region", "eu"));
        storage.write_trace(Trace::new(vec![tagged]));

        let ctx = RequestContext::new();
        for (key, value, hits) in [
            ("http.method", "GET", 1),
            ("http.method", "POST", 0),
            ("region", "eu", 1),
            ("region", "", 1),
            ("missing", "", 0),
        ] {
            let mut query = search("frontend");
            query.tags.insert(key.to_owned(), value.to_owned());
            let found = storage.find_traces(&ctx, query).await.unwrap();
            assert_eq!(found.len(), hits, "tag {key}={value}");
        }
    }

    #[tokio::test]
    async fn services_are_distinct_and_sorted() {
        let storage = seeded();
        let ctx = RequestContext::new();
        assert_eq!(
            storage.get_services(&ctx).await.unwrap(),
            vec!["billing".to_owned(), "frontend".to_owned()]
        );
    }

    #[tokio::test]
    async fn operations_carry_span_kinds() {
        let storage = InMemoryStorage::new();
        let mut server_span = span(5, 6, "billing", "charge", 1_000);
        server_span
            .tags
            .push(KeyValue::string(SPAN_KIND_TAG, "server"));
        storage.write_trace(Trace::new(vec![server_span]));
        storage.write_trace(Trace::new(vec![span(6, 7, "billing", "refund", 2_000)]));

        let ctx = RequestContext::new();
        let all = storage
            .get_operations(
                &ctx,
                OperationQueryParameters {
                    service_name: "billing".to_owned(),
                    span_kind: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let servers = storage
            .get_operations(
                &ctx,
                OperationQueryParameters {
                    service_name: "billing".to_owned(),
                    span_kind: Some(tracequery_model::SpanKind::Server),
                },
            )
            .await
            .unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "charge");
        assert_eq!(servers[0].span_kind, "server");
    }
}
