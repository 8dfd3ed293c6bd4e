use tracequery_model::Trace;

use super::{Adjuster, AdjusterError};

/// Orders the fields of every log event by key.
///
/// Purely for deterministic serialization and diff-friendly output; the
/// sort is stable, so fields sharing a key keep their relative order.
pub struct SortLogFields;

impl Adjuster for SortLogFields {
    fn name(&self) -> &'static str {
        "sort-log-fields"
    }

    fn adjust(&self, trace: &mut Trace) -> Result<(), AdjusterError> {
        for span in &mut trace.spans {
            for log in &mut span.logs {
                log.fields.sort_by(|a, b| a.key.cmp(&b.key));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracequery_model::{KeyValue, Log, Span};

    #[test]
    fn fields_sort_by_key_stably() {
        let mut trace = Trace::new(vec![Span {
            logs: vec![Log {
                timestamp: None,
                fields: vec![
                    KeyValue::string("event", "error"),
                    KeyValue::i64("attempt", 2),
                    KeyValue::string("event", "retry"),
                ],
            }],
            ..Default::default()
        }]);
        SortLogFields.adjust(&mut trace).unwrap();

        let keys: Vec<_> = trace.spans[0].logs[0]
            .fields
            .iter()
            .map(|kv| (kv.key.as_str(), kv.value.to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("attempt", "2".to_owned()),
                ("event", "error".to_owned()),
                ("event", "retry".to_owned()),
            ]
        );
    }

    #[test]
    fn sorting_is_idempotent() {
        let mut trace = Trace::new(vec![Span {
            logs: vec![Log {
                timestamp: None,
                fields: vec![KeyValue::i64("b", 1), KeyValue::i64("a", 2)],
            }],
            ..Default::default()
        }]);
        SortLogFields.adjust(&mut trace).unwrap();
        let once = trace.clone();
        SortLogFields.adjust(&mut trace).unwrap();
        assert_eq!(trace, once);
    }
}
