//! Conversion of the internal trace model into the UI JSON shape, plus
//! the structured response envelope shared by every HTTP route.

use std::collections::BTreeMap;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::json;

use tracequery_model::{
    time, DependencyLink, KeyValue, Process, RefType, TagValue, Trace, TraceId,
};
use tracequery_proto::metrics::{gauge_value, MetricFamily};

/// The envelope wrapping every JSON payload: `data` plus paging totals
/// and non-fatal errors. Adjuster warnings ride in `errors` with the
/// response still carrying data and a 200 status.
#[derive(Serialize, Debug)]
pub struct StructuredResponse<T: Serialize> {
    pub data: T,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StructuredError>,
}

impl<T: Serialize> StructuredResponse<T> {
    /// An envelope around `data` with `total` set to its cardinality.
    pub fn new(data: T, total: usize) -> Self {
        StructuredResponse {
            data,
            total,
            limit: 0,
            offset: 0,
            errors: Vec::new(),
        }
    }

    /// Attaches non-fatal errors.
    pub fn with_errors(mut self, errors: Vec<StructuredError>) -> Self {
        self.errors = errors;
        self
    }
}

/// One entry of the `errors` list of the envelope. Warnings carry no
/// code; hard failures carry the HTTP status they map to.
#[derive(Serialize, Debug)]
pub struct StructuredError {
    #[serde(skip_serializing_if = "code_is_unset")]
    pub code: u16,
    pub msg: String,
    #[serde(rename = "traceID", skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

fn code_is_unset(code: &u16) -> bool {
    *code == 0
}

/// An operation in the UI shape.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct UiOperation {
    pub name: String,
    #[serde(rename = "spanKind")]
    pub span_kind: String,
}

/// A trace in the UI shape: spans referencing a deduplicated process
/// map keyed `p1`…`pN`.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct UiTrace {
    #[serde(rename = "traceID")]
    pub trace_id: String,
    pub spans: Vec<UiSpan>,
    pub processes: BTreeMap<String, UiProcess>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiSpan {
    #[serde(rename = "traceID")]
    pub trace_id: String,
    #[serde(rename = "spanID")]
    pub span_id: String,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub flags: u32,
    pub operation_name: String,
    pub references: Vec<UiReference>,
    /// Microseconds since the Unix epoch.
    pub start_time: u64,
    /// Integer microseconds.
    pub duration: u64,
    pub tags: Vec<UiKeyValue>,
    pub logs: Vec<UiLog>,
    #[serde(rename = "processID")]
    pub process_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

fn is_zero(flags: &u32) -> bool {
    *flags == 0
}

/// A flattened span reference.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct UiReference {
    #[serde(rename = "refType")]
    pub ref_type: String,
    #[serde(rename = "traceID")]
    pub trace_id: String,
    #[serde(rename = "spanID")]
    pub span_id: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiProcess {
    pub service_name: String,
    pub tags: Vec<UiKeyValue>,
}

/// A tag with its value type spelled out; binary values are base64.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct UiKeyValue {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct UiLog {
    /// Microseconds since the Unix epoch.
    pub timestamp: u64,
    pub fields: Vec<UiKeyValue>,
}

/// A dependency link in the UI shape. The `source` label is dropped by
/// aggregation before shaping.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiDependencyLink {
    pub parent: String,
    pub child: String,
    pub call_count: u64,
}

impl From<&DependencyLink> for UiDependencyLink {
    fn from(link: &DependencyLink) -> Self {
        UiDependencyLink {
            parent: link.parent.clone(),
            child: link.child.clone(),
            call_count: link.call_count,
        }
    }
}

impl From<&KeyValue> for UiKeyValue {
    fn from(kv: &KeyValue) -> Self {
        let value = match &kv.value {
            TagValue::String(v) => json!(v),
            TagValue::Bool(v) => json!(v),
            TagValue::I64(v) => json!(v),
            TagValue::F64(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                // Non-finite floats have no JSON number form.
                .unwrap_or_else(|| json!(v.to_string())),
            TagValue::Binary(v) => json!(BASE64_STANDARD.encode(v)),
        };
        UiKeyValue {
            key: kv.key.clone(),
            value_type: kv.value.type_name().to_owned(),
            value,
        }
    }
}

fn ui_tags(tags: &[KeyValue]) -> Vec<UiKeyValue> {
    tags.iter().map(Into::into).collect()
}

/// Shapes a trace for the UI. Process identity is deduplicated into the
/// `p1`…`pN` map; spans in reader order; field order of logs as the
/// adjuster left it.
pub fn trace_to_ui(trace: &Trace) -> UiTrace {
    let mut process_ids: Vec<(String, Process)> = Vec::new();
    let mut spans = Vec::with_capacity(trace.spans.len());

    for span in &trace.spans {
        let process_id = match process_ids.iter().find(|(_, p)| *p == span.process) {
            Some((id, _)) => id.clone(),
            None => {
                let id = format!("p{}", process_ids.len() + 1);
                process_ids.push((id.clone(), span.process.clone()));
                id
            }
        };
        spans.push(UiSpan {
            trace_id: span.trace_id.to_string(),
            span_id: span.span_id.to_string(),
            flags: span.flags,
            operation_name: span.operation_name.clone(),
            references: span
                .references
                .iter()
                .map(|r| UiReference {
                    ref_type: match r.ref_type {
                        RefType::ChildOf => "CHILD_OF".to_owned(),
                        RefType::FollowsFrom => "FOLLOWS_FROM".to_owned(),
                    },
                    trace_id: r.trace_id.to_string(),
                    span_id: r.span_id.to_string(),
                })
                .collect(),
            start_time: span.start_time.map(time::to_epoch_micros).unwrap_or(0),
            duration: span.duration.as_micros() as u64,
            tags: ui_tags(&span.tags),
            logs: span
                .logs
                .iter()
                .map(|log| UiLog {
                    timestamp: log.timestamp.map(time::to_epoch_micros).unwrap_or(0),
                    fields: ui_tags(&log.fields),
                })
                .collect(),
            process_id,
            warnings: span.warnings.clone(),
        });
    }

    UiTrace {
        trace_id: trace.trace_id().unwrap_or(TraceId::INVALID).to_string(),
        spans,
        processes: process_ids
            .into_iter()
            .map(|(id, p)| {
                (
                    id,
                    UiProcess {
                        service_name: p.service_name,
                        tags: ui_tags(&p.tags),
                    },
                )
            })
            .collect(),
        warnings: trace.warnings.clone(),
    }
}

/// Shapes a metric family for the HTTP metrics routes. Timestamps are
/// epoch milliseconds.
pub fn metric_family_to_json(family: &MetricFamily) -> serde_json::Value {
    let metrics: Vec<serde_json::Value> = family
        .metrics
        .iter()
        .map(|metric| {
            let labels: Vec<serde_json::Value> = metric
                .labels
                .iter()
                .map(|l| json!({"name": l.name, "value": l.value}))
                .collect();
            let points: Vec<serde_json::Value> = metric
                .metric_points
                .iter()
                .map(|point| {
                    let gauge = match point.gauge_value.as_ref().and_then(|g| g.value) {
                        Some(gauge_value::Value::DoubleValue(v)) => json!({ "doubleValue": v }),
                        Some(gauge_value::Value::IntValue(v)) => json!({ "intValue": v }),
                        None => serde_json::Value::Null,
                    };
                    let millis = point
                        .timestamp
                        .as_ref()
                        .map(|ts| {
                            ts.seconds.max(0) as u64 * 1_000 + ts.nanos.max(0) as u64 / 1_000_000
                        })
                        .unwrap_or(0);
                    json!({ "gaugeValue": gauge, "timestamp": millis })
                })
                .collect();
            json!({ "labels": labels, "metricPoints": points })
        })
        .collect();

    json!({
        "name": family.name,
        "type": metric_type_name(family.r#type),
        "help": family.help,
        "metrics": metrics,
    })
}

fn metric_type_name(value: i32) -> &'static str {
    use tracequery_proto::metrics::MetricType;
    MetricType::try_from(value)
        .map(|t| t.as_str_name())
        .unwrap_or("UNKNOWN")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tracequery_model::{Log, Span, SpanId, SpanRef};

    fn sample_trace() -> Trace {
        let trace_id = TraceId::from(0x1234u128);
        let frontend = Process::new("frontend", vec![KeyValue::string("ip", "10.0.0.1")]);
        let billing = Process::new("billing", vec![]);
        Trace {
            spans: vec![
                Span {
                    trace_id,
                    span_id: SpanId::from(1u64),
                    operation_name: "GET /".to_owned(),
                    start_time: Some(UNIX_EPOCH + Duration::from_micros(100)),
                    duration: Duration::from_micros(200),
                    process: frontend.clone(),
                    tags: vec![
                        KeyValue::i64("http.status_code", 200),
                        KeyValue::binary("blob", vec![1, 2, 3]),
                    ],
                    logs: vec![Log {
                        timestamp: Some(UNIX_EPOCH + Duration::from_micros(150)),
                        fields: vec![KeyValue::string("event", "start")],
                    }],
                    ..Default::default()
                },
                Span {
                    trace_id,
                    span_id: SpanId::from(2u64),
                    operation_name: "charge".to_owned(),
                    references: vec![SpanRef::child_of(trace_id, SpanId::from(1u64))],
                    start_time: Some(UNIX_EPOCH + Duration::from_micros(120)),
                    duration: Duration::from_micros(50),
                    process: billing,
                    ..Default::default()
                },
                Span {
                    trace_id,
                    span_id: SpanId::from(3u64),
                    operation_name: "render".to_owned(),
                    references: vec![SpanRef::child_of(trace_id, SpanId::from(1u64))],
                    start_time: Some(UNIX_EPOCH + Duration::from_micros(180)),
                    duration: Duration::from_micros(10),
                    process: frontend,
                    ..Default::default()
                },
            ],
            warnings: vec!["span ID collision: 0000000000000001".to_owned()],
        }
    }

    #[test]
    fn ids_render_as_full_width_lowercase_hex() {
        let ui = trace_to_ui(&sample_trace());
        assert_eq!(ui.trace_id, "00000000000000000000000000001234");
        assert_eq!(ui.spans[0].span_id, "0000000000000001");
        assert_eq!(ui.spans[1].references[0].span_id, "0000000000000001");
        assert_eq!(ui.spans[1].references[0].ref_type, "CHILD_OF");
    }

    #[test]
    fn processes_deduplicate_into_the_map() {
        let ui = trace_to_ui(&sample_trace());
        assert_eq!(ui.processes.len(), 2);
        assert_eq!(ui.spans[0].process_id, "p1");
        assert_eq!(ui.spans[1].process_id, "p2");
        assert_eq!(ui.spans[2].process_id, "p1");
        assert_eq!(ui.processes["p1"].service_name, "frontend");
        assert_eq!(ui.processes["p2"].service_name, "billing");
    }

    #[test]
    fn tag_values_carry_their_type_and_binary_is_base64() {
        let ui = trace_to_ui(&sample_trace());
        let tags = &ui.spans[0].tags;
        assert_eq!(tags[0].value_type, "int64");
        assert_eq!(tags[0].value, json!(200));
        assert_eq!(tags[1].value_type, "binary");
        assert_eq!(tags[1].value, json!("AQID"));
    }

    #[test]
    fn durations_serialize_as_integer_microseconds() {
        let ui = trace_to_ui(&sample_trace());
        assert_eq!(ui.spans[0].start_time, 100);
        assert_eq!(ui.spans[0].duration, 200);
        assert_eq!(ui.spans[0].logs[0].timestamp, 150);
    }

    #[test]
    fn ui_shape_round_trips_through_json() {
        let ui = trace_to_ui(&sample_trace());
        let encoded = serde_json::to_string(&ui).unwrap();
        let decoded: UiTrace = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, ui);
    }

    #[test]
    fn envelope_hides_empty_error_lists() {
        let body =
            serde_json::to_value(StructuredResponse::new(vec!["a", "b"], 2)).unwrap();
        assert_eq!(
            body,
            json!({"data": ["a", "b"], "total": 2, "limit": 0, "offset": 0})
        );

        let with_errors = StructuredResponse::new(serde_json::Value::Null, 0).with_errors(vec![
            StructuredError {
                code: 404,
                msg: "trace not found".to_owned(),
                trace_id: Some("abc".to_owned()),
            },
        ]);
        let body = serde_json::to_value(with_errors).unwrap();
        assert_eq!(body["errors"][0]["traceID"], json!("abc"));
    }
}
