use std::collections::HashMap;

use tracequery_model::{SpanId, Trace};

use super::{Adjuster, AdjusterError};

/// Collapses spans sharing a span id within a trace.
///
/// Storage backends may hold the same span more than once, e.g. after
/// retried writes. Of each duplicate set the span with the richest tag
/// set survives, ties broken by first occurrence. Divergent duplicates
/// leave a warning on the trace.
pub struct SpanIdDeduper;

impl Adjuster for SpanIdDeduper {
    fn name(&self) -> &'static str {
        "span-id-deduper"
    }

    fn adjust(&self, trace: &mut Trace) -> Result<(), AdjusterError> {
        // Index of the surviving span per id, in first-occurrence order.
        let mut kept: HashMap<SpanId, usize> = HashMap::with_capacity(trace.spans.len());
        let mut collisions: Vec<SpanId> = Vec::new();
        let mut out = Vec::with_capacity(trace.spans.len());

        for span in trace.spans.drain(..) {
            match kept.get(&span.span_id) {
                None => {
                    kept.insert(span.span_id, out.len());
                    out.push(span);
                }
                Some(&at) => {
                    let existing: &tracequery_model::Span = &out[at];
                    if *existing != span && !collisions.contains(&span.span_id) {
                        collisions.push(span.span_id);
                    }
                    if span.tags.len() > existing.tags.len() {
                        out[at] = span;
                    }
                }
            }
        }

        trace.spans = out;
        for span_id in collisions {
            trace
                .warnings
                .push(format!("span ID collision: {span_id}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracequery_model::{KeyValue, Span, TraceId};

    fn span(span_id: u64, tags: Vec<KeyValue>) -> Span {
        Span {
            trace_id: TraceId::from(1u128),
            span_id: SpanId::from(span_id),
            tags,
            ..Default::default()
        }
    }

    #[test]
    fn keeps_the_span_with_the_richest_tag_set() {
        let mut trace = Trace::new(vec![
            span(1, vec![]),
            span(2, vec![]),
            span(1, vec![KeyValue::bool("error", true)]),
        ]);
        SpanIdDeduper.adjust(&mut trace).unwrap();

        assert_eq!(trace.spans.len(), 2);
        assert_eq!(trace.spans[0].span_id, SpanId::from(1u64));
        assert_eq!(trace.spans[0].tags.len(), 1);
        assert_eq!(trace.spans[1].span_id, SpanId::from(2u64));
        assert_eq!(
            trace.warnings,
            vec!["span ID collision: 0000000000000001".to_owned()]
        );
    }

    #[test]
    fn ties_break_by_first_occurrence() {
        let first = span(1, vec![KeyValue::string("winner", "first")]);
        let second = span(1, vec![KeyValue::string("winner", "second")]);
        let mut trace = Trace::new(vec![first.clone(), second]);
        SpanIdDeduper.adjust(&mut trace).unwrap();

        assert_eq!(trace.spans, vec![first]);
        assert_eq!(trace.warnings.len(), 1);
    }

    #[test]
    fn identical_duplicates_do_not_warn() {
        let duplicate = span(1, vec![KeyValue::i64("retry", 1)]);
        let mut trace = Trace::new(vec![duplicate.clone(), duplicate.clone()]);
        SpanIdDeduper.adjust(&mut trace).unwrap();

        assert_eq!(trace.spans, vec![duplicate]);
        assert!(trace.warnings.is_empty());
    }

    #[test]
    fn deduplication_is_idempotent() {
        let mut trace = Trace::new(vec![
            span(1, vec![]),
            span(1, vec![KeyValue::bool("error", true)]),
            span(2, vec![]),
        ]);
        SpanIdDeduper.adjust(&mut trace).unwrap();
        let once = trace.spans.clone();
        SpanIdDeduper.adjust(&mut trace).unwrap();
        assert_eq!(trace.spans, once);
    }
}
