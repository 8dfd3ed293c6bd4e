//! Query-parameter parsing and validation.
//!
//! Two parameter dialects share the HTTP surface: the trace-query
//! dialect (microsecond timestamps, string-suffixed durations such as
//! `20ms` or `1h`) and the dependency dialect (millisecond timestamps
//! and millisecond-integer durations). The metrics dialect reuses the
//! millisecond conventions and adds span-kind enumerations. All of them
//! normalize into the parameter structs of
//! [`tracequery-storage`](tracequery_storage), and every failure names
//! the offending parameter.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use url::form_urlencoded;

use tracequery_model::{time, SpanKind, TraceId};
use tracequery_storage::{
    DependencyQueryParameters, MetricsQueryParameters, OperationQueryParameters,
    TraceQueryParameters, DEFAULT_NUM_TRACES,
};

use crate::config::DEFAULT_TRACE_LOOKBACK;
use crate::error::QueryError;

/// Default lookback for dependency queries.
pub const DEFAULT_DEPENDENCY_LOOKBACK: Duration = Duration::from_secs(24 * 60 * 60);

/// Default lookback for metrics queries.
pub const DEFAULT_METRICS_LOOKBACK: Duration = Duration::from_secs(60 * 60);

/// A parsed trace search.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceQuery {
    /// Parameters handed to the storage reader.
    pub parameters: TraceQueryParameters,
    /// When non-empty the search short-circuits to direct lookups, in
    /// the order given. Duplicates are fetched again, not deduplicated.
    pub trace_ids: Vec<TraceId>,
    /// Skip the adjuster pipeline.
    pub raw: bool,
}

/// A parsed dependency query.
#[derive(Clone, Debug, PartialEq)]
pub struct DependencyQuery {
    /// Parameters handed to the dependency reader.
    pub parameters: DependencyQueryParameters,
    /// Restrict the graph to links touching this service.
    pub service: Option<String>,
}

/// A parsed time window for a single-trace fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TraceWindow {
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    pub raw: bool,
}

/// Parses request parameters into validated query objects.
///
/// The time source is injectable so tests can pin "now".
#[derive(Clone)]
pub struct Parser {
    default_lookback: Duration,
    now: fn() -> SystemTime,
}

impl Default for Parser {
    fn default() -> Self {
        Parser {
            default_lookback: DEFAULT_TRACE_LOOKBACK,
            now: SystemTime::now,
        }
    }
}

impl Parser {
    /// A parser defaulting unbounded searches to the given lookback.
    pub fn new(default_lookback: Duration) -> Self {
        Parser {
            default_lookback,
            ..Default::default()
        }
    }

    /// Replaces the time source.
    pub fn with_time_source(mut self, now: fn() -> SystemTime) -> Self {
        self.now = now;
        self
    }

    /// Parses the trace-query dialect.
    pub fn parse_trace_query(&self, raw_query: &str) -> Result<TraceQuery, QueryError> {
        let params = parse_pairs(raw_query);

        let service_name = first(&params, "service").unwrap_or_default().to_owned();
        let operation_name = first(&params, "operation").unwrap_or_default().to_owned();

        let now = (self.now)();
        let start_time_min = match parse_micros(&params, "start")? {
            Some(start) => start,
            None => now
                .checked_sub(self.default_lookback)
                .unwrap_or(SystemTime::UNIX_EPOCH),
        };
        let start_time_max = parse_micros(&params, "end")?.unwrap_or(now);
        if start_time_max < start_time_min {
            return Err(QueryError::invalid_param(
                "end",
                "'end' must not precede 'start'",
            ));
        }

        let num_traces = match first(&params, "limit") {
            None | Some("") => DEFAULT_NUM_TRACES,
            Some(value) => match value.parse::<usize>() {
                Ok(0) => DEFAULT_NUM_TRACES,
                Ok(limit) => limit,
                Err(err) => return Err(QueryError::invalid_param("limit", err)),
            },
        };

        let duration_min = parse_duration_string(&params, "minDuration")?;
        let duration_max = parse_duration_string(&params, "maxDuration")?;
        if let (Some(min), Some(max)) = (duration_min, duration_max) {
            if max < min {
                return Err(QueryError::invalid_param(
                    "maxDuration",
                    "must not be smaller than 'minDuration'",
                ));
            }
        }

        let mut tags = BTreeMap::new();
        for value in all(&params, "tag") {
            let (key, tag_value) = value.split_once(':').ok_or_else(|| {
                QueryError::invalid_param(
                    "tag",
                    format!("malformed 'key:value' pair, got {value:?}"),
                )
            })?;
            tags.insert(key.to_owned(), tag_value.to_owned());
        }
        for value in all(&params, "tags") {
            let parsed: BTreeMap<String, String> = serde_json::from_str(value)
                .map_err(|err| QueryError::invalid_param("tags", err))?;
            tags.extend(parsed);
        }

        let mut trace_ids = Vec::new();
        for value in all(&params, "traceID") {
            let trace_id = TraceId::from_hex(value)
                .map_err(|err| QueryError::invalid_param("traceID", err))?;
            trace_ids.push(trace_id);
        }

        let raw = parse_flag(&params, "raw")?.unwrap_or(false);

        Ok(TraceQuery {
            parameters: TraceQueryParameters {
                service_name,
                operation_name,
                tags,
                start_time_min,
                start_time_max,
                duration_min,
                duration_max,
                num_traces,
            },
            trace_ids,
            raw,
        })
    }

    /// Parses the optional window of a single-trace fetch. Zero
    /// timestamps mean "unconstrained".
    pub fn parse_trace_window(&self, raw_query: &str) -> Result<TraceWindow, QueryError> {
        let params = parse_pairs(raw_query);
        let zero_is_none = |t: Option<SystemTime>| t.filter(|t| *t != SystemTime::UNIX_EPOCH);
        Ok(TraceWindow {
            start_time: zero_is_none(parse_micros(&params, "start")?),
            end_time: zero_is_none(parse_micros(&params, "end")?),
            raw: parse_flag(&params, "raw")?.unwrap_or(false),
        })
    }

    /// Parses the dependency-query dialect.
    pub fn parse_dependency_query(&self, raw_query: &str) -> Result<DependencyQuery, QueryError> {
        let params = parse_pairs(raw_query);

        let end_ts = first(&params, "endTs")
            .ok_or_else(|| QueryError::invalid_param("endTs", "parameter is required"))?;
        let end_time = end_ts
            .parse::<u64>()
            .map(time::from_epoch_millis)
            .map_err(|err| QueryError::invalid_param("endTs", err))?;

        let lookback = match first(&params, "lookback") {
            None | Some("") => DEFAULT_DEPENDENCY_LOOKBACK,
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|err| QueryError::invalid_param("lookback", err))?,
        };

        Ok(DependencyQuery {
            parameters: DependencyQueryParameters { end_time, lookback },
            service: first(&params, "service")
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
        })
    }

    /// Parses the metrics-query dialect.
    pub fn parse_metrics_query(
        &self,
        raw_query: &str,
    ) -> Result<MetricsQueryParameters, QueryError> {
        let params = parse_pairs(raw_query);

        let service_names: Vec<String> = all(&params, "service")
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        if service_names.is_empty() {
            return Err(QueryError::invalid_param(
                "service",
                "please provide at least one service name",
            ));
        }

        let mut span_kinds = Vec::new();
        for value in all(&params, "spanKind") {
            let kind = SpanKind::from_str(value)
                .map_err(|err| QueryError::invalid_param("spanKind", err))?;
            span_kinds.push(kind);
        }

        let end_time = match parse_millis(&params, "endTs")? {
            Some(end) => end,
            None => (self.now)(),
        };

        let quantile = match first(&params, "quantile") {
            None | Some("") => None,
            Some(value) => Some(
                value
                    .parse::<f64>()
                    .map_err(|err| QueryError::invalid_param("quantile", err))?,
            ),
        };

        Ok(MetricsQueryParameters {
            service_names,
            group_by_operation: parse_flag(&params, "groupByOperation")?.unwrap_or(false),
            end_time: Some(end_time),
            lookback: Some(
                parse_millis_duration(&params, "lookback")?.unwrap_or(DEFAULT_METRICS_LOOKBACK),
            ),
            step: parse_millis_duration(&params, "step")?,
            rate_per: parse_millis_duration(&params, "ratePer")?,
            span_kinds,
            quantile,
        })
    }

    /// Parses the parameters of an operation listing.
    pub fn parse_operations_query(
        &self,
        raw_query: &str,
    ) -> Result<OperationQueryParameters, QueryError> {
        let params = parse_pairs(raw_query);
        let service_name = first(&params, "service")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| QueryError::invalid_param("service", "parameter is required"))?
            .to_owned();
        let span_kind = match first(&params, "spanKind") {
            None | Some("") => None,
            Some(value) => Some(
                SpanKind::from_str(value)
                    .map_err(|err| QueryError::invalid_param("spanKind", err))?,
            ),
        };
        Ok(OperationQueryParameters {
            service_name,
            span_kind,
        })
    }
}

fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn first<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn all<'a>(params: &'a [(String, String)], name: &'a str) -> impl Iterator<Item = &'a str> {
    params
        .iter()
        .filter(move |(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn parse_micros(
    params: &[(String, String)],
    name: &str,
) -> Result<Option<SystemTime>, QueryError> {
    match first(params, name) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(|micros| Some(time::from_epoch_micros(micros)))
            .map_err(|err| QueryError::invalid_param(name, err)),
    }
}

fn parse_millis(
    params: &[(String, String)],
    name: &str,
) -> Result<Option<SystemTime>, QueryError> {
    match first(params, name) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(|millis| Some(time::from_epoch_millis(millis)))
            .map_err(|err| QueryError::invalid_param(name, err)),
    }
}

fn parse_millis_duration(
    params: &[(String, String)],
    name: &str,
) -> Result<Option<Duration>, QueryError> {
    match first(params, name) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(|millis| Some(Duration::from_millis(millis)))
            .map_err(|err| QueryError::invalid_param(name, err)),
    }
}

fn parse_duration_string(
    params: &[(String, String)],
    name: &str,
) -> Result<Option<Duration>, QueryError> {
    match first(params, name) {
        None | Some("") => Ok(None),
        Some(value) => humantime::parse_duration(value)
            .map(Some)
            .map_err(|err| QueryError::invalid_param(name, err)),
    }
}

/// Boolean flags accept the usual literal spellings, `1`/`0` included.
fn parse_flag(params: &[(String, String)], name: &str) -> Result<Option<bool>, QueryError> {
    match first(params, name) {
        None | Some("") => Ok(None),
        Some("1") | Some("t") | Some("T") | Some("true") | Some("TRUE") | Some("True") => {
            Ok(Some(true))
        }
        Some("0") | Some("f") | Some("F") | Some("false") | Some("FALSE") | Some("False") => {
            Ok(Some(false))
        }
        Some(other) => Err(QueryError::invalid_param(
            name,
            format!("invalid boolean value {other:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;
    use std::time::{Duration, UNIX_EPOCH};

    fn fixed_now() -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(10_000_000)
    }

    fn parser() -> Parser {
        Parser::new(Duration::from_micros(1_000_000)).with_time_source(fixed_now)
    }

    /// Inverse of parsing, over the grammar minus defaulted fields.
    fn format_trace_query(query: &TraceQuery) -> String {
        let p = &query.parameters;
        let mut out = String::new();
        write!(
            out,
            "service={}&start={}&end={}&limit={}",
            p.service_name,
            time::to_epoch_micros(p.start_time_min),
            time::to_epoch_micros(p.start_time_max),
            p.num_traces,
        )
        .unwrap();
        if !p.operation_name.is_empty() {
            write!(out, "&operation={}", p.operation_name).unwrap();
        }
        for (key, value) in &p.tags {
            write!(out, "&tag={key}:{value}").unwrap();
        }
        for id in &query.trace_ids {
            write!(out, "&traceID={id}").unwrap();
        }
        if query.raw {
            out.push_str("&raw=true");
        }
        out
    }

    #[test]
    fn trace_query_with_explicit_bounds() {
        let query = parser()
            .parse_trace_query("service=svc&start=0&end=0&limit=200&tag=k:v&tag=x:y")
            .unwrap();
        assert_eq!(query.parameters.service_name, "svc");
        assert_eq!(query.parameters.start_time_min, UNIX_EPOCH);
        assert_eq!(query.parameters.start_time_max, UNIX_EPOCH);
        assert_eq!(query.parameters.num_traces, 200);
        assert_eq!(query.parameters.tags.get("k").map(String::as_str), Some("v"));
        assert_eq!(query.parameters.tags.get("x").map(String::as_str), Some("y"));
        assert!(query.trace_ids.is_empty());
        assert!(!query.raw);
    }

    #[test]
    fn trace_query_defaults() {
        let query = parser().parse_trace_query("service=svc").unwrap();
        assert_eq!(query.parameters.start_time_max, fixed_now());
        assert_eq!(
            query.parameters.start_time_min,
            fixed_now() - Duration::from_micros(1_000_000)
        );
        assert_eq!(query.parameters.num_traces, DEFAULT_NUM_TRACES);
        assert_eq!(query.parameters.duration_min, None);
        assert_eq!(query.parameters.duration_max, None);
    }

    #[test]
    fn duration_strings_use_unit_suffixes() {
        let query = parser()
            .parse_trace_query("service=s&minDuration=20ms&maxDuration=1h")
            .unwrap();
        assert_eq!(query.parameters.duration_min, Some(Duration::from_millis(20)));
        assert_eq!(query.parameters.duration_max, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn max_duration_below_min_is_rejected() {
        let err = parser()
            .parse_trace_query("service=s&minDuration=1h&maxDuration=20ms")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to parse param 'maxDuration': must not be smaller than 'minDuration'"
        );
    }

    #[test]
    fn malformed_tag_is_rejected_with_the_parameter_name() {
        let err = parser().parse_trace_query("service=s&tag=novalue").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("unable to parse param 'tag':"));
    }

    #[test]
    fn tag_values_may_contain_colons_and_be_empty() {
        let query = parser()
            .parse_trace_query("service=s&tag=url:http://x/y&tag=flag:")
            .unwrap();
        assert_eq!(
            query.parameters.tags.get("url").map(String::as_str),
            Some("http://x/y")
        );
        assert_eq!(query.parameters.tags.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn tags_json_overrides_tag_pairs() {
        let query = parser()
            .parse_trace_query(
                "service=s&tag=k:v&tags=%7B%22k%22%3A%22w%22%2C%22extra%22%3A%22e%22%7D",
            )
            .unwrap();
        assert_eq!(query.parameters.tags.get("k").map(String::as_str), Some("w"));
        assert_eq!(
            query.parameters.tags.get("extra").map(String::as_str),
            Some("e")
        );
    }

    #[test]
    fn trace_ids_keep_order_and_duplicates() {
        let query = parser()
            .parse_trace_query("traceID=2&traceID=1&traceID=2")
            .unwrap();
        assert_eq!(
            query.trace_ids,
            vec![
                TraceId::from(2u128),
                TraceId::from(1u128),
                TraceId::from(2u128)
            ]
        );
    }

    #[test]
    fn bad_trace_id_is_rejected() {
        let err = parser().parse_trace_query("traceID=zzz").unwrap_err();
        assert!(err.to_string().starts_with("unable to parse param 'traceID':"));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = parser()
            .parse_trace_query("service=s&start=2000000&end=1000000")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to parse param 'end': 'end' must not precede 'start'"
        );
    }

    #[test]
    fn trace_queries_round_trip_through_formatting() {
        let query = parser()
            .parse_trace_query(
                "service=svc&operation=op&start=1000&end=2000&limit=50&tag=a:b&raw=true",
            )
            .unwrap();
        let reparsed = parser()
            .parse_trace_query(&format_trace_query(&query))
            .unwrap();
        assert_eq!(reparsed, query);
    }

    #[test]
    fn trace_window_treats_zero_as_unconstrained() {
        let window = parser().parse_trace_window("start=0&end=0").unwrap();
        assert_eq!(window.start_time, None);
        assert_eq!(window.end_time, None);

        let window = parser().parse_trace_window("start=5&raw=true").unwrap();
        assert_eq!(window.start_time, Some(UNIX_EPOCH + Duration::from_micros(5)));
        assert!(window.raw);
    }

    #[test]
    fn dependency_query_requires_end_ts() {
        let err = parser().parse_dependency_query("").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to parse param 'endTs': parameter is required"
        );

        let query = parser()
            .parse_dependency_query("endTs=1476374248550&service=queen")
            .unwrap();
        assert_eq!(
            query.parameters.end_time,
            time::from_epoch_millis(1_476_374_248_550)
        );
        assert_eq!(query.parameters.lookback, DEFAULT_DEPENDENCY_LOOKBACK);
        assert_eq!(query.service.as_deref(), Some("queen"));
    }

    #[test]
    fn metrics_query_requires_a_service() {
        let err = parser().parse_metrics_query("").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to parse param 'service': please provide at least one service name"
        );
    }

    #[test]
    fn metrics_query_parses_the_millisecond_dialect() {
        let params = parser()
            .parse_metrics_query(
                "service=a&service=b&groupByOperation=true&endTs=2000&lookback=60000&step=5000&ratePer=600000&quantile=0.95&spanKind=server&spanKind=client",
            )
            .unwrap();
        assert_eq!(params.service_names, vec!["a".to_owned(), "b".to_owned()]);
        assert!(params.group_by_operation);
        assert_eq!(params.end_time, Some(time::from_epoch_millis(2000)));
        assert_eq!(params.lookback, Some(Duration::from_secs(60)));
        assert_eq!(params.step, Some(Duration::from_secs(5)));
        assert_eq!(params.rate_per, Some(Duration::from_secs(600)));
        assert_eq!(params.quantile, Some(0.95));
        assert_eq!(params.span_kinds, vec![SpanKind::Server, SpanKind::Client]);
    }

    #[test]
    fn unsupported_span_kind_is_rejected() {
        let err = parser()
            .parse_metrics_query("service=a&spanKind=gateway")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to parse param 'spanKind': unsupported span kind: 'gateway'"
        );
    }

    #[test]
    fn operations_query_requires_service() {
        let err = parser().parse_operations_query("").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to parse param 'service': parameter is required"
        );

        let query = parser()
            .parse_operations_query("service=billing&spanKind=server")
            .unwrap();
        assert_eq!(query.service_name, "billing");
        assert_eq!(query.span_kind, Some(SpanKind::Server));
    }
}
