use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};

use tracequery_model::{Span, SpanId, Trace};

use super::{Adjuster, AdjusterError};

/// Corrects clock disagreement between the processes of a trace.
///
/// A child span observed outside its parent's interval indicates skewed
/// clocks. For every `child-of` edge crossing a process boundary the pass
/// computes the minimum shift bringing the child back inside the parent
/// and applies it to every span of the child's process within the
/// child's subtree, so spans from one process move as a group. Shifts
/// larger than the configured bound are not applied; with a zero bound
/// the correction is disabled entirely. Either way the affected span is
/// annotated with a warning recording the computed delta.
pub struct ClockSkew {
    max_adjust: Duration,
}

impl ClockSkew {
    /// A pass bounded by `max_adjust`. Zero disables the correction.
    pub fn new(max_adjust: Duration) -> Self {
        ClockSkew { max_adjust }
    }
}

impl Adjuster for ClockSkew {
    fn name(&self) -> &'static str {
        "clock-skew"
    }

    fn adjust(&self, trace: &mut Trace) -> Result<(), AdjusterError> {
        let graph = SpanGraph::build(&trace.spans);

        let mut visited: HashSet<SpanId> = HashSet::with_capacity(trace.spans.len());
        let mut cycle_warnings = Vec::new();
        for root in graph.roots.clone() {
            self.visit(trace, &graph, root, &mut visited, &mut cycle_warnings);
        }

        // Spans never reached from a root belong to components where
        // every span has a parent, which is only possible with a
        // reference cycle.
        if visited.len() < trace.spans.len()
            && trace
                .spans
                .iter()
                .any(|span| !visited.contains(&span.span_id))
        {
            cycle_warnings
                .push("invalid span tree: cycle among span references".to_owned());
        }
        trace.warnings.extend(cycle_warnings);
        Ok(())
    }
}

impl ClockSkew {
    fn visit(
        &self,
        trace: &mut Trace,
        graph: &SpanGraph,
        index: usize,
        visited: &mut HashSet<SpanId>,
        cycle_warnings: &mut Vec<String>,
    ) {
        visited.insert(trace.spans[index].span_id);
        let parent_id = trace.spans[index].span_id;
        for child_index in graph.children_of(parent_id) {
            let child_id = trace.spans[child_index].span_id;
            if visited.contains(&child_id) {
                cycle_warnings.push(format!(
                    "invalid span tree: cycle detected at span {child_id}, skipping clock skew adjustment"
                ));
                continue;
            }
            if trace.spans[child_index].process != trace.spans[index].process {
                self.correct_edge(trace, graph, index, child_index);
            }
            self.visit(trace, graph, child_index, visited, cycle_warnings);
        }
    }

    /// Computes and applies the skew correction for one parent/child edge
    /// crossing a process boundary.
    fn correct_edge(&self, trace: &mut Trace, graph: &SpanGraph, parent: usize, child: usize) {
        let delta = match skew_micros(&trace.spans[parent], &trace.spans[child]) {
            Some(delta) if delta != 0 => delta,
            _ => return,
        };

        if self.max_adjust.is_zero() {
            trace.spans[child].warnings.push(format!(
                "clock skew adjustment disabled; not applying calculated delta of {delta}µs"
            ));
            return;
        }
        if delta.unsigned_abs() > self.max_adjust.as_micros() as u64 {
            trace.spans[child].warnings.push(format!(
                "max clock skew adjustment exceeded; not applying calculated delta of {delta}µs"
            ));
            return;
        }

        let process = trace.spans[child].process.clone();
        for index in graph.subtree_of(child, &trace.spans) {
            if trace.spans[index].process == process {
                shift_span(&mut trace.spans[index], delta);
            }
        }
    }
}

/// Signed shift in microseconds bringing the child inside the parent, or
/// `None` when either span has no start time.
fn skew_micros(parent: &Span, child: &Span) -> Option<i64> {
    let parent_start = parent.start_time?;
    let child_start = child.start_time?;
    let parent_end = parent_start + parent.duration;
    let child_end = child_start + child.duration;

    if child.duration > parent.duration {
        // The child cannot fit inside the parent; it was either async or
        // the parent timed out early. The only safe correction is to keep
        // the child from starting before the parent.
        if child_start < parent_start {
            return Some(micros_between(child_start, parent_start));
        }
        return None;
    }
    if child_start < parent_start {
        return Some(micros_between(child_start, parent_start));
    }
    if child_end > parent_end {
        return Some(-micros_between(parent_end, child_end));
    }
    None
}

/// Microseconds from `earlier` to `later`.
fn micros_between(earlier: SystemTime, later: SystemTime) -> i64 {
    later
        .duration_since(earlier)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

fn shift_span(span: &mut Span, delta: i64) {
    let shift = Duration::from_micros(delta.unsigned_abs());
    let apply = |time: SystemTime| {
        if delta >= 0 {
            time + shift
        } else {
            time - shift
        }
    };
    span.start_time = span.start_time.map(apply);
    for log in &mut span.logs {
        log.timestamp = log.timestamp.map(apply);
    }
    span.warnings.push(format!(
        "clock skew adjustment applied: span timestamps shifted by {delta}µs"
    ));
}

struct SpanGraph {
    children: HashMap<SpanId, Vec<usize>>,
    roots: Vec<usize>,
}

impl SpanGraph {
    fn build(spans: &[Span]) -> Self {
        let ids: HashSet<SpanId> = spans.iter().map(|s| s.span_id).collect();
        let mut children: HashMap<SpanId, Vec<usize>> = HashMap::new();
        let mut roots = Vec::new();
        for (index, span) in spans.iter().enumerate() {
            match span.parent_span_id() {
                Some(parent) if ids.contains(&parent) && parent != span.span_id => {
                    children.entry(parent).or_default().push(index);
                }
                // An unknown or self-referential parent makes the span a
                // root of its own subtree.
                _ => roots.push(index),
            }
        }
        SpanGraph { children, roots }
    }

    fn children_of(&self, span_id: SpanId) -> Vec<usize> {
        self.children.get(&span_id).cloned().unwrap_or_default()
    }

    /// Indexes of the subtree rooted at `start`, the root included.
    fn subtree_of(&self, start: usize, spans: &[Span]) -> Vec<usize> {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut stack = vec![start];
        let mut out = Vec::new();
        while let Some(index) = stack.pop() {
            if !seen.insert(index) {
                continue;
            }
            out.push(index);
            stack.extend(self.children_of(spans[index].span_id));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;
    use tracequery_model::{Log, Process, SpanRef, TraceId};

    const TRACE: u128 = 0xabc;

    fn micros(n: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(n)
    }

    fn span(id: u64, parent: Option<u64>, service: &str, start: u64, duration: u64) -> Span {
        let trace_id = TraceId::from(TRACE);
        Span {
            trace_id,
            span_id: SpanId::from(id),
            references: parent
                .map(|p| vec![SpanRef::child_of(trace_id, SpanId::from(p))])
                .unwrap_or_default(),
            start_time: Some(micros(start)),
            duration: Duration::from_micros(duration),
            process: Process::new(service, vec![]),
            ..Default::default()
        }
    }

    #[test]
    fn child_starting_before_parent_shifts_into_place() {
        let mut trace = Trace::new(vec![
            span(1, None, "api", 100, 100),
            span(2, Some(1), "db", 50, 100),
        ]);
        ClockSkew::new(Duration::from_secs(1))
            .adjust(&mut trace)
            .unwrap();

        assert_eq!(trace.spans[1].start_time, Some(micros(100)));
        assert_eq!(
            trace.spans[1].warnings,
            vec!["clock skew adjustment applied: span timestamps shifted by 50µs".to_owned()]
        );
        assert!(trace.spans[0].warnings.is_empty());
    }

    #[test]
    fn child_ending_after_parent_shifts_backwards() {
        let mut trace = Trace::new(vec![
            span(1, None, "api", 100, 100),
            span(2, Some(1), "db", 180, 50),
        ]);
        ClockSkew::new(Duration::from_secs(1))
            .adjust(&mut trace)
            .unwrap();

        // [180, 230] must shift to end at 200.
        assert_eq!(trace.spans[1].start_time, Some(micros(150)));
    }

    #[test]
    fn spans_of_one_process_move_as_a_group() {
        let mut trace = Trace::new(vec![
            span(1, None, "api", 100, 100),
            span(2, Some(1), "db", 50, 60),
            span(3, Some(2), "db", 60, 20),
        ]);
        ClockSkew::new(Duration::from_secs(1))
            .adjust(&mut trace)
            .unwrap();

        assert_eq!(trace.spans[1].start_time, Some(micros(100)));
        assert_eq!(trace.spans[2].start_time, Some(micros(110)));
    }

    #[test]
    fn log_timestamps_shift_with_their_span() {
        let mut shifted = span(2, Some(1), "db", 50, 100);
        shifted.logs.push(Log {
            timestamp: Some(micros(60)),
            fields: vec![],
        });
        let mut trace = Trace::new(vec![span(1, None, "api", 100, 100), shifted]);
        ClockSkew::new(Duration::from_secs(1))
            .adjust(&mut trace)
            .unwrap();

        assert_eq!(trace.spans[1].logs[0].timestamp, Some(micros(110)));
    }

    #[test]
    fn zero_bound_disables_the_correction_but_warns() {
        let mut trace = Trace::new(vec![
            span(1, None, "api", 100, 100),
            span(2, Some(1), "db", 50, 100),
        ]);
        ClockSkew::new(Duration::ZERO).adjust(&mut trace).unwrap();

        assert_eq!(trace.spans[1].start_time, Some(micros(50)));
        assert_eq!(
            trace.spans[1].warnings,
            vec![
                "clock skew adjustment disabled; not applying calculated delta of 50µs".to_owned()
            ]
        );
    }

    #[test]
    fn shifts_beyond_the_bound_are_rejected_with_a_warning() {
        let mut trace = Trace::new(vec![
            span(1, None, "api", 100, 100),
            span(2, Some(1), "db", 10, 100),
        ]);
        ClockSkew::new(Duration::from_micros(20))
            .adjust(&mut trace)
            .unwrap();

        assert_eq!(trace.spans[1].start_time, Some(micros(10)));
        assert_eq!(
            trace.spans[1].warnings,
            vec![
                "max clock skew adjustment exceeded; not applying calculated delta of 90µs"
                    .to_owned()
            ]
        );
    }

    #[test]
    fn same_process_children_are_left_alone() {
        let mut trace = Trace::new(vec![
            span(1, None, "api", 100, 100),
            span(2, Some(1), "api", 50, 100),
        ]);
        ClockSkew::new(Duration::from_secs(1))
            .adjust(&mut trace)
            .unwrap();

        assert_eq!(trace.spans[1].start_time, Some(micros(50)));
        assert!(trace.spans[1].warnings.is_empty());
    }

    #[test]
    fn reference_cycles_truncate_descent_with_a_warning() {
        // 2 and 3 parent each other; both reachable only through the
        // cycle, so the pass flags the trace.
        let mut trace = Trace::new(vec![
            span(1, None, "api", 100, 100),
            span(2, Some(3), "db", 110, 10),
            span(3, Some(2), "db", 120, 10),
        ]);
        ClockSkew::new(Duration::from_secs(1))
            .adjust(&mut trace)
            .unwrap();

        assert!(trace
            .warnings
            .iter()
            .any(|w| w.contains("cycle")), "warnings: {:?}", trace.warnings);
    }

    #[test]
    fn oversized_children_only_get_start_alignment() {
        let mut trace = Trace::new(vec![
            span(1, None, "api", 100, 50),
            span(2, Some(1), "db", 90, 200),
        ]);
        ClockSkew::new(Duration::from_secs(1))
            .adjust(&mut trace)
            .unwrap();

        assert_eq!(trace.spans[1].start_time, Some(micros(100)));
    }
}
