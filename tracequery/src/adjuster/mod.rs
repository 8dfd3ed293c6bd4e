//! Deterministic trace post-processing.
//!
//! An adjuster is a pure pass over a single trace: it may rewrite spans
//! and append warnings, but it never touches storage and never fails the
//! response. The pipeline runs its adjusters left to right; a pass that
//! reports an error is logged and skipped, and the trace continues
//! through the remaining passes unchanged by the failed step.

use std::time::Duration;

use thiserror::Error;

use tracequery_model::Trace;

mod clock_skew;
mod dedupe;
mod ip_tag;
mod sort_log_fields;

pub use clock_skew::ClockSkew;
pub use dedupe::SpanIdDeduper;
pub use ip_tag::IpTag;
pub use sort_log_fields::SortLogFields;

/// The error an adjuster reports when it cannot process a trace. Never
/// fatal to the response.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct AdjusterError(pub String);

/// A single post-processing pass over a trace.
pub trait Adjuster: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Apply the pass. Implementations must leave the trace unchanged
    /// when returning an error.
    fn adjust(&self, trace: &mut Trace) -> Result<(), AdjusterError>;
}

/// An ordered sequence of adjusters.
pub struct Pipeline {
    adjusters: Vec<Box<dyn Adjuster>>,
}

impl Pipeline {
    /// A pipeline with no passes.
    pub fn empty() -> Self {
        Pipeline {
            adjusters: Vec::new(),
        }
    }

    /// The standard pipeline: span-id dedupe, clock skew correction
    /// (disabled when `max_clock_skew_adjust` is zero), IP tag
    /// normalization, log field ordering.
    pub fn standard(max_clock_skew_adjust: Duration) -> Self {
        Pipeline::empty()
            .with(SpanIdDeduper)
            .with(ClockSkew::new(max_clock_skew_adjust))
            .with(IpTag)
            .with(SortLogFields)
    }

    /// Appends a pass to the pipeline.
    pub fn with(mut self, adjuster: impl Adjuster + 'static) -> Self {
        self.adjusters.push(Box::new(adjuster));
        self
    }

    /// Runs every pass in order. Warnings surface on the trace; a failed
    /// pass is logged and the trace passes through that step unchanged.
    pub fn adjust(&self, trace: &mut Trace) {
        for adjuster in &self.adjusters {
            if let Err(err) = adjuster.adjust(trace) {
                tracing::warn!(
                    adjuster = adjuster.name(),
                    error = %err,
                    "adjuster failed, trace passes through unchanged"
                );
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.adjusters.iter().map(|a| a.name()))
            .finish()
    }
}
