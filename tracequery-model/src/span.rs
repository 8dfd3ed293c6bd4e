use std::fmt;
use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::{KeyValue, SpanId, TraceId};

/// The relationship of a span to another span it references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefType {
    /// The referenced span is the direct parent.
    ChildOf,
    /// The referenced span finished before this one started.
    FollowsFrom,
}

/// A typed reference from one span to another.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanRef {
    /// Trace containing the referenced span.
    pub trace_id: TraceId,
    /// The referenced span.
    pub span_id: SpanId,
    /// How the spans relate.
    pub ref_type: RefType,
}

impl SpanRef {
    /// A `child-of` reference to the given span.
    pub fn child_of(trace_id: TraceId, span_id: SpanId) -> Self {
        SpanRef {
            trace_id,
            span_id,
            ref_type: RefType::ChildOf,
        }
    }

    /// A `follows-from` reference to the given span.
    pub fn follows_from(trace_id: TraceId, span_id: SpanId) -> Self {
        SpanRef {
            trace_id,
            span_id,
            ref_type: RefType::FollowsFrom,
        }
    }
}

/// A timestamped event recorded on a span.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Log {
    /// When the event happened.
    pub timestamp: Option<SystemTime>,
    /// Event payload as key-value fields.
    pub fields: Vec<KeyValue>,
}

/// The process that emitted a span: a service name plus tags.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Process {
    /// Logical service name.
    pub service_name: String,
    /// Process-level tags (host name, IP, client version and so on).
    pub tags: Vec<KeyValue>,
}

impl Process {
    /// Create a process with the given service name and tags.
    pub fn new(service_name: impl Into<String>, tags: Vec<KeyValue>) -> Self {
        Process {
            service_name: service_name.into(),
            tags,
        }
    }
}

/// Classifies the role a span plays in a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SpanKind {
    /// Role unknown or not applicable.
    #[default]
    Unspecified,
    /// An operation internal to an application.
    Internal,
    /// Server side of a remote call.
    Server,
    /// Client side of a remote call.
    Client,
    /// Initiator of an asynchronous message.
    Producer,
    /// Consumer of an asynchronous message.
    Consumer,
}

/// The error returned when a span-kind string is not one of the six
/// supported short names.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unsupported span kind: '{0}'")]
pub struct ParseSpanKindError(pub String);

impl SpanKind {
    /// The external short name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Unspecified => "unspecified",
            SpanKind::Internal => "internal",
            SpanKind::Server => "server",
            SpanKind::Client => "client",
            SpanKind::Producer => "producer",
            SpanKind::Consumer => "consumer",
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SpanKind {
    type Err = ParseSpanKindError;

    /// Maps the external short names 1:1 onto the enumeration. The empty
    /// string is accepted as `Unspecified`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "unspecified" => Ok(SpanKind::Unspecified),
            "internal" => Ok(SpanKind::Internal),
            "server" => Ok(SpanKind::Server),
            "client" => Ok(SpanKind::Client),
            "producer" => Ok(SpanKind::Producer),
            "consumer" => Ok(SpanKind::Consumer),
            other => Err(ParseSpanKindError(other.to_owned())),
        }
    }
}

/// An operation name offered by a service, qualified by span kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Operation {
    /// Operation name.
    pub name: String,
    /// The span kind the operation was observed with, as a short name.
    /// Empty when the backend does not track kinds.
    pub span_kind: String,
}

/// A single timed operation within a trace.
///
/// Spans are value-typed and owned by their containing [`Trace`].
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Span {
    /// Trace this span belongs to.
    pub trace_id: TraceId,
    /// Identifier unique within the trace after adjustment.
    pub span_id: SpanId,
    /// Name of the operation this span represents.
    pub operation_name: String,
    /// Typed references to other spans.
    pub references: Vec<SpanRef>,
    /// Bit flags carried through from ingestion.
    pub flags: u32,
    /// When the operation started. Microsecond precision at the wire.
    pub start_time: Option<SystemTime>,
    /// How long the operation took.
    pub duration: Duration,
    /// Span-level tags.
    pub tags: Vec<KeyValue>,
    /// Ordered log events.
    pub logs: Vec<Log>,
    /// The process that emitted the span. Structurally always present;
    /// readers that do not know the process leave it defaulted.
    pub process: Process,
    /// Warnings accumulated for this span by the adjuster pipeline.
    pub warnings: Vec<String>,
}

impl Span {
    /// When the operation ended, if the start time is known.
    pub fn end_time(&self) -> Option<SystemTime> {
        self.start_time.map(|start| start + self.duration)
    }

    /// The span id of the direct parent per the first `child-of`
    /// reference within the same trace, if any.
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.references
            .iter()
            .find(|r| r.ref_type == RefType::ChildOf && r.trace_id == self.trace_id)
            .map(|r| r.span_id)
    }

    /// Whether this span has no in-trace parent.
    pub fn is_root(&self) -> bool {
        self.parent_span_id().is_none()
    }

    /// Look up a span-level tag by key.
    pub fn tag(&self, key: &str) -> Option<&KeyValue> {
        self.tags.iter().find(|kv| kv.key == key)
    }
}

/// An unordered set of spans sharing a [`TraceId`], plus warnings
/// accumulated by the adjuster pipeline.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Trace {
    /// The member spans. All share the same trace id.
    pub spans: Vec<Span>,
    /// Trace-level warnings. Never fatal.
    pub warnings: Vec<String>,
}

impl Trace {
    /// Create a trace from a set of spans.
    pub fn new(spans: Vec<Span>) -> Self {
        Trace {
            spans,
            warnings: Vec::new(),
        }
    }

    /// The shared trace id, taken from the first span.
    pub fn trace_id(&self) -> Option<TraceId> {
        self.spans.first().map(|s| s.trace_id)
    }

    /// Find a span by id.
    pub fn span(&self, span_id: SpanId) -> Option<&Span> {
        self.spans.iter().find(|s| s.span_id == span_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::time::UNIX_EPOCH;

    #[test]
    fn span_kind_short_names_round_trip() {
        for kind in [
            SpanKind::Unspecified,
            SpanKind::Internal,
            SpanKind::Server,
            SpanKind::Client,
            SpanKind::Producer,
            SpanKind::Consumer,
        ] {
            assert_eq!(SpanKind::from_str(kind.as_str()), Ok(kind));
        }
        assert_eq!(SpanKind::from_str(""), Ok(SpanKind::Unspecified));
    }

    #[test]
    fn unknown_span_kind_is_rejected() {
        let err = SpanKind::from_str("gateway").unwrap_err();
        assert_eq!(err.to_string(), "unsupported span kind: 'gateway'");
    }

    #[test]
    fn parent_follows_first_child_of_reference() {
        let trace_id = TraceId::from(1);
        let mut span = Span {
            trace_id,
            span_id: SpanId::from(2),
            ..Default::default()
        };
        assert!(span.is_root());

        span.references
            .push(SpanRef::follows_from(trace_id, SpanId::from(9)));
        span.references
            .push(SpanRef::child_of(trace_id, SpanId::from(3)));
        assert_eq!(span.parent_span_id(), Some(SpanId::from(3)));
        assert!(!span.is_root());
    }

    #[test]
    fn foreign_trace_references_do_not_parent() {
        let span = Span {
            trace_id: TraceId::from(1),
            span_id: SpanId::from(2),
            references: vec![SpanRef::child_of(TraceId::from(7), SpanId::from(3))],
            ..Default::default()
        };
        assert!(span.is_root());
    }

    #[test]
    fn end_time_adds_duration() {
        let span = Span {
            start_time: Some(UNIX_EPOCH + Duration::from_micros(100)),
            duration: Duration::from_micros(50),
            ..Default::default()
        };
        assert_eq!(span.end_time(), Some(UNIX_EPOCH + Duration::from_micros(150)));
    }
}
