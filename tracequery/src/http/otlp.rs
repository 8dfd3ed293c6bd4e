//! OTLP-JSON to internal model conversion for the transform endpoint.
//!
//! Accepts the JSON form of `TracesData`: camelCase field names, hex
//! span and trace ids, 64-bit numbers as either JSON numbers or decimal
//! strings, bytes as base64.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::{Deserialize, Deserializer};

use tracequery_model::{
    KeyValue, Log, Process, Span, SpanId, SpanKind, SpanRef, TagValue, Trace, TraceId,
};

use crate::error::QueryError;

use std::time::Duration;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TracesData {
    #[serde(default)]
    resource_spans: Vec<ResourceSpans>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ResourceSpans {
    #[serde(default)]
    resource: OtlpResource,
    #[serde(default)]
    scope_spans: Vec<ScopeSpans>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct OtlpResource {
    #[serde(default)]
    attributes: Vec<OtlpKeyValue>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ScopeSpans {
    #[serde(default)]
    spans: Vec<OtlpSpan>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct OtlpSpan {
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    span_id: String,
    #[serde(default)]
    parent_span_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    kind: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "flexible_u64")]
    start_time_unix_nano: u64,
    #[serde(default, deserialize_with = "flexible_u64")]
    end_time_unix_nano: u64,
    #[serde(default)]
    attributes: Vec<OtlpKeyValue>,
    #[serde(default)]
    events: Vec<OtlpEvent>,
    #[serde(default)]
    links: Vec<OtlpLink>,
    #[serde(default)]
    status: Option<OtlpStatus>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct OtlpEvent {
    #[serde(default, deserialize_with = "flexible_u64")]
    time_unix_nano: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    attributes: Vec<OtlpKeyValue>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct OtlpLink {
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    span_id: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct OtlpStatus {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize, Debug)]
struct OtlpKeyValue {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: Option<OtlpAnyValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct OtlpAnyValue {
    string_value: Option<String>,
    bool_value: Option<bool>,
    #[serde(default, deserialize_with = "flexible_opt_i64")]
    int_value: Option<i64>,
    double_value: Option<f64>,
    bytes_value: Option<String>,
    array_value: Option<serde_json::Value>,
    kvlist_value: Option<serde_json::Value>,
}

/// 64-bit integers arrive as JSON numbers or decimal strings.
fn flexible_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Number(n) => n.as_u64().ok_or_else(|| {
            serde::de::Error::custom(format!("number {n} is not an unsigned 64-bit integer"))
        }),
        serde_json::Value::String(s) => s
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(e.to_string())),
        serde_json::Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {other}"
        ))),
    }
}

fn flexible_opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("number {n} overflows i64"))),
        serde_json::Value::String(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(e.to_string())),
        serde_json::Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {other}"
        ))),
    }
}

/// Parses an OTLP-JSON `TracesData` payload into internal traces,
/// grouped by trace id in first-seen order.
pub fn traces_from_otlp_json(body: &[u8]) -> Result<Vec<Trace>, QueryError> {
    let data: TracesData = serde_json::from_slice(body)
        .map_err(|err| QueryError::InvalidArgument(format!("malformed OTLP payload: {err}")))?;

    let mut traces: Vec<Trace> = Vec::new();
    for resource_spans in &data.resource_spans {
        let process = process_from_resource(&resource_spans.resource);
        for scope_spans in &resource_spans.scope_spans {
            for otlp_span in &scope_spans.spans {
                let span = convert_span(otlp_span, process.clone())?;
                match traces
                    .iter_mut()
                    .find(|t| t.trace_id() == Some(span.trace_id))
                {
                    Some(trace) => trace.spans.push(span),
                    None => traces.push(Trace::new(vec![span])),
                }
            }
        }
    }
    Ok(traces)
}

fn process_from_resource(resource: &OtlpResource) -> Process {
    let mut service_name = String::new();
    let mut tags = Vec::new();
    for attribute in &resource.attributes {
        match attribute_to_tag(attribute) {
            Some(kv) if kv.key == "service.name" => {
                service_name = kv.value.to_string();
            }
            Some(kv) => tags.push(kv),
            None => {}
        }
    }
    Process { service_name, tags }
}

fn convert_span(otlp: &OtlpSpan, process: Process) -> Result<Span, QueryError> {
    let trace_id = TraceId::from_hex(&otlp.trace_id).map_err(|_| {
        QueryError::InvalidArgument(format!("malformed OTLP trace id {:?}", otlp.trace_id))
    })?;
    let span_id = SpanId::from_hex(&otlp.span_id).map_err(|_| {
        QueryError::InvalidArgument(format!("malformed OTLP span id {:?}", otlp.span_id))
    })?;

    let mut references = Vec::new();
    if !otlp.parent_span_id.is_empty() {
        let parent = SpanId::from_hex(&otlp.parent_span_id).map_err(|_| {
            QueryError::InvalidArgument(format!(
                "malformed OTLP parent span id {:?}",
                otlp.parent_span_id
            ))
        })?;
        references.push(SpanRef::child_of(trace_id, parent));
    }
    for link in &otlp.links {
        if let (Ok(link_trace), Ok(link_span)) =
            (TraceId::from_hex(&link.trace_id), SpanId::from_hex(&link.span_id))
        {
            references.push(SpanRef::follows_from(link_trace, link_span));
        }
    }

    let mut tags: Vec<KeyValue> = otlp
        .attributes
        .iter()
        .filter_map(attribute_to_tag)
        .collect();
    if let Some(kind) = span_kind_of(otlp.kind.as_ref()) {
        if kind != SpanKind::Unspecified {
            tags.push(KeyValue::string("span.kind", kind.as_str()));
        }
    }
    if let Some(status) = &otlp.status {
        if status_is_error(status.code.as_ref()) {
            tags.push(KeyValue::bool("error", true));
            tags.push(KeyValue::string("otel.status_code", "ERROR"));
            if !status.message.is_empty() {
                tags.push(KeyValue::string(
                    "otel.status_description",
                    status.message.clone(),
                ));
            }
        }
    }

    let logs = otlp
        .events
        .iter()
        .map(|event| {
            let mut fields = vec![KeyValue::string("event", event.name.clone())];
            fields.extend(event.attributes.iter().filter_map(attribute_to_tag));
            Log {
                timestamp: Some(tracequery_model::time::from_epoch_micros(
                    event.time_unix_nano / 1_000,
                )),
                fields,
            }
        })
        .collect();

    let duration_nanos = otlp.end_time_unix_nano.saturating_sub(otlp.start_time_unix_nano);
    Ok(Span {
        trace_id,
        span_id,
        operation_name: otlp.name.clone(),
        references,
        flags: 0,
        start_time: Some(tracequery_model::time::from_epoch_micros(
            otlp.start_time_unix_nano / 1_000,
        )),
        duration: Duration::from_nanos(duration_nanos),
        tags,
        logs,
        process,
        warnings: Vec::new(),
    })
}

/// OTLP enums arrive as integers or as `SPAN_KIND_*` names.
fn span_kind_of(kind: Option<&serde_json::Value>) -> Option<SpanKind> {
    match kind? {
        serde_json::Value::Number(n) => match n.as_u64()? {
            1 => Some(SpanKind::Internal),
            2 => Some(SpanKind::Server),
            3 => Some(SpanKind::Client),
            4 => Some(SpanKind::Producer),
            5 => Some(SpanKind::Consumer),
            _ => Some(SpanKind::Unspecified),
        },
        serde_json::Value::String(name) => {
            tracequery_proto::transform::common::tonic::span_kind_from_otel_name(name)
        }
        _ => None,
    }
}

fn status_is_error(code: Option<&serde_json::Value>) -> bool {
    match code {
        Some(serde_json::Value::Number(n)) => n.as_u64() == Some(2),
        Some(serde_json::Value::String(s)) => s == "STATUS_CODE_ERROR" || s == "ERROR",
        _ => false,
    }
}

fn attribute_to_tag(attribute: &OtlpKeyValue) -> Option<KeyValue> {
    let value = attribute.value.as_ref()?;
    let tag_value = if let Some(s) = &value.string_value {
        TagValue::String(s.clone())
    } else if let Some(b) = value.bool_value {
        TagValue::Bool(b)
    } else if let Some(i) = value.int_value {
        TagValue::I64(i)
    } else if let Some(d) = value.double_value {
        TagValue::F64(d)
    } else if let Some(bytes) = &value.bytes_value {
        TagValue::Binary(BASE64_STANDARD.decode(bytes).unwrap_or_default())
    } else if let Some(array) = &value.array_value {
        TagValue::String(array.to_string())
    } else if let Some(kvlist) = &value.kvlist_value {
        TagValue::String(kvlist.to_string())
    } else {
        return None;
    };
    Some(KeyValue {
        key: attribute.key.clone(),
        value: tag_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    const PAYLOAD: &str = r#"{
      "resourceSpans": [{
        "resource": {
          "attributes": [
            {"key": "service.name", "value": {"stringValue": "frontend"}},
            {"key": "host.name", "value": {"stringValue": "web-1"}}
          ]
        },
        "scopeSpans": [{
          "spans": [{
            "traceId": "00000000000000000000000000ABC123",
            "spanId": "0000000000000001",
            "name": "GET /",
            "kind": 2,
            "startTimeUnixNano": "1000000",
            "endTimeUnixNano": "3000000",
            "attributes": [
              {"key": "http.status_code", "value": {"intValue": "200"}}
            ],
            "events": [{
              "timeUnixNano": 2000000,
              "name": "cache miss",
              "attributes": [{"key": "level", "value": {"stringValue": "info"}}]
            }],
            "status": {"code": 2, "message": "boom"}
          }, {
            "traceId": "00000000000000000000000000abc123",
            "spanId": "0000000000000002",
            "parentSpanId": "0000000000000001",
            "name": "lookup",
            "startTimeUnixNano": "1500000",
            "endTimeUnixNano": "1600000"
          }]
        }]
      }]
    }"#;

    #[test]
    fn converts_resource_spans_into_one_trace() {
        let traces = traces_from_otlp_json(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(traces.len(), 1);
        let trace = &traces[0];
        assert_eq!(trace.spans.len(), 2);
        assert_eq!(trace.trace_id(), Some(TraceId::from(0xabc123u128)));

        let root = &trace.spans[0];
        assert_eq!(root.operation_name, "GET /");
        assert_eq!(root.process.service_name, "frontend");
        assert_eq!(root.process.tags, vec![KeyValue::string("host.name", "web-1")]);
        assert_eq!(
            root.start_time,
            Some(UNIX_EPOCH + Duration::from_micros(1_000))
        );
        assert_eq!(root.duration, Duration::from_micros(2_000));
        assert!(root.tags.contains(&KeyValue::string("span.kind", "server")));
        assert!(root.tags.contains(&KeyValue::i64("http.status_code", 200)));
        assert!(root.tags.contains(&KeyValue::bool("error", true)));
        assert_eq!(root.logs.len(), 1);
        assert_eq!(
            root.logs[0].fields[0],
            KeyValue::string("event", "cache miss")
        );

        let child = &trace.spans[1];
        assert_eq!(
            child.references,
            vec![SpanRef::child_of(
                TraceId::from(0xabc123u128),
                SpanId::from(1u64)
            )]
        );
    }

    #[test]
    fn malformed_payloads_are_invalid_arguments() {
        let err = traces_from_otlp_json(b"{not json").unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));

        let err = traces_from_otlp_json(
            br#"{"resourceSpans":[{"scopeSpans":[{"spans":[{"traceId":"zz","spanId":"01"}]}]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("malformed OTLP trace id"));
    }

    #[test]
    fn empty_payload_yields_no_traces() {
        assert!(traces_from_otlp_json(b"{}").unwrap().is_empty());
    }
}
