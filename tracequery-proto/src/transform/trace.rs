#[cfg(feature = "gen-tonic-messages")]
pub mod tonic {
    use crate::proto::tonic::api_v2;
    use crate::transform::common::tonic::{
        from_duration, from_timestamp, to_duration, to_timestamp,
    };
    use tracequery_model::{
        DependencyLink, KeyValue, Log, Operation, Process, RefType, Span, SpanId, SpanRef,
        TagValue, Trace, TraceId,
    };

    /// Big-endian trace id from a wire byte slice. Short slices are
    /// zero-extended on the left, oversized ones keep their low bytes.
    pub fn trace_id_from_bytes(bytes: &[u8]) -> TraceId {
        let mut buf = [0u8; 16];
        if bytes.len() >= 16 {
            buf.copy_from_slice(&bytes[bytes.len() - 16..]);
        } else {
            buf[16 - bytes.len()..].copy_from_slice(bytes);
        }
        TraceId::from_bytes(buf)
    }

    /// Big-endian span id from a wire byte slice.
    pub fn span_id_from_bytes(bytes: &[u8]) -> SpanId {
        let mut buf = [0u8; 8];
        if bytes.len() >= 8 {
            buf.copy_from_slice(&bytes[bytes.len() - 8..]);
        } else {
            buf[8 - bytes.len()..].copy_from_slice(bytes);
        }
        SpanId::from_bytes(buf)
    }

    impl From<&KeyValue> for api_v2::KeyValue {
        fn from(kv: &KeyValue) -> Self {
            let mut out = api_v2::KeyValue {
                key: kv.key.clone(),
                ..Default::default()
            };
            match &kv.value {
                TagValue::String(v) => {
                    out.v_type = api_v2::ValueType::String as i32;
                    out.v_str = v.clone();
                }
                TagValue::Bool(v) => {
                    out.v_type = api_v2::ValueType::Bool as i32;
                    out.v_bool = *v;
                }
                TagValue::I64(v) => {
                    out.v_type = api_v2::ValueType::Int64 as i32;
                    out.v_int64 = *v;
                }
                TagValue::F64(v) => {
                    out.v_type = api_v2::ValueType::Float64 as i32;
                    out.v_float64 = *v;
                }
                TagValue::Binary(v) => {
                    out.v_type = api_v2::ValueType::Binary as i32;
                    out.v_binary = v.clone();
                }
            }
            out
        }
    }

    impl From<api_v2::KeyValue> for KeyValue {
        fn from(kv: api_v2::KeyValue) -> Self {
            // Unknown value types decode as strings rather than dropping
            // the tag.
            let value = match api_v2::ValueType::try_from(kv.v_type) {
                Ok(api_v2::ValueType::Bool) => TagValue::Bool(kv.v_bool),
                Ok(api_v2::ValueType::Int64) => TagValue::I64(kv.v_int64),
                Ok(api_v2::ValueType::Float64) => TagValue::F64(kv.v_float64),
                Ok(api_v2::ValueType::Binary) => TagValue::Binary(kv.v_binary),
                Ok(api_v2::ValueType::String) | Err(_) => TagValue::String(kv.v_str),
            };
            KeyValue { key: kv.key, value }
        }
    }

    impl From<&SpanRef> for api_v2::SpanRef {
        fn from(r: &SpanRef) -> Self {
            api_v2::SpanRef {
                trace_id: r.trace_id.to_bytes().to_vec(),
                span_id: r.span_id.to_bytes().to_vec(),
                ref_type: match r.ref_type {
                    RefType::ChildOf => api_v2::SpanRefType::ChildOf as i32,
                    RefType::FollowsFrom => api_v2::SpanRefType::FollowsFrom as i32,
                },
            }
        }
    }

    impl From<api_v2::SpanRef> for SpanRef {
        fn from(r: api_v2::SpanRef) -> Self {
            SpanRef {
                trace_id: trace_id_from_bytes(&r.trace_id),
                span_id: span_id_from_bytes(&r.span_id),
                ref_type: match api_v2::SpanRefType::try_from(r.ref_type) {
                    Ok(api_v2::SpanRefType::FollowsFrom) => RefType::FollowsFrom,
                    _ => RefType::ChildOf,
                },
            }
        }
    }

    impl From<&Process> for api_v2::Process {
        fn from(process: &Process) -> Self {
            api_v2::Process {
                service_name: process.service_name.clone(),
                tags: process.tags.iter().map(Into::into).collect(),
            }
        }
    }

    impl From<api_v2::Process> for Process {
        fn from(process: api_v2::Process) -> Self {
            Process {
                service_name: process.service_name,
                tags: process.tags.into_iter().map(Into::into).collect(),
            }
        }
    }

    impl From<&Log> for api_v2::Log {
        fn from(log: &Log) -> Self {
            api_v2::Log {
                timestamp: log.timestamp.map(to_timestamp),
                fields: log.fields.iter().map(Into::into).collect(),
            }
        }
    }

    impl From<api_v2::Log> for Log {
        fn from(log: api_v2::Log) -> Self {
            Log {
                timestamp: log.timestamp.as_ref().map(from_timestamp),
                fields: log.fields.into_iter().map(Into::into).collect(),
            }
        }
    }

    impl From<&Span> for api_v2::Span {
        fn from(span: &Span) -> Self {
            api_v2::Span {
                trace_id: span.trace_id.to_bytes().to_vec(),
                span_id: span.span_id.to_bytes().to_vec(),
                operation_name: span.operation_name.clone(),
                references: span.references.iter().map(Into::into).collect(),
                flags: span.flags,
                start_time: span.start_time.map(to_timestamp),
                duration: Some(to_duration(span.duration)),
                tags: span.tags.iter().map(Into::into).collect(),
                logs: span.logs.iter().map(Into::into).collect(),
                process: Some((&span.process).into()),
                process_id: String::new(),
                warnings: span.warnings.clone(),
            }
        }
    }

    impl From<api_v2::Span> for Span {
        fn from(span: api_v2::Span) -> Self {
            Span {
                trace_id: trace_id_from_bytes(&span.trace_id),
                span_id: span_id_from_bytes(&span.span_id),
                operation_name: span.operation_name,
                references: span.references.into_iter().map(Into::into).collect(),
                flags: span.flags,
                start_time: span.start_time.as_ref().map(from_timestamp),
                duration: span.duration.as_ref().map(from_duration).unwrap_or_default(),
                tags: span.tags.into_iter().map(Into::into).collect(),
                logs: span.logs.into_iter().map(Into::into).collect(),
                process: span.process.map(Into::into).unwrap_or_default(),
                warnings: span.warnings,
            }
        }
    }

    /// The wire spans of a trace, in reader order.
    pub fn trace_to_spans(trace: &Trace) -> Vec<api_v2::Span> {
        trace.spans.iter().map(Into::into).collect()
    }

    /// Rebuild a trace from wire spans.
    pub fn trace_from_spans(spans: Vec<api_v2::Span>) -> Trace {
        Trace::new(spans.into_iter().map(Into::into).collect())
    }

    impl From<&DependencyLink> for api_v2::DependencyLink {
        fn from(link: &DependencyLink) -> Self {
            api_v2::DependencyLink {
                parent: link.parent.clone(),
                child: link.child.clone(),
                call_count: link.call_count,
                source: link.source.clone(),
            }
        }
    }

    impl From<api_v2::DependencyLink> for DependencyLink {
        fn from(link: api_v2::DependencyLink) -> Self {
            DependencyLink {
                parent: link.parent,
                child: link.child,
                call_count: link.call_count,
                source: link.source,
            }
        }
    }

    impl From<&Operation> for api_v2::Operation {
        fn from(operation: &Operation) -> Self {
            api_v2::Operation {
                name: operation.name.clone(),
                span_kind: operation.span_kind.clone(),
            }
        }
    }

}
