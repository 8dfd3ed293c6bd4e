/// An aggregated caller/callee edge in the service dependency graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct DependencyLink {
    /// Calling service.
    pub parent: String,
    /// Called service.
    pub child: String,
    /// Number of calls observed over the queried window.
    pub call_count: u64,
    /// Which pipeline derived the link. Dropped on aggregation.
    pub source: String,
}

impl DependencyLink {
    /// Create a link with an empty source label.
    pub fn new(parent: impl Into<String>, child: impl Into<String>, call_count: u64) -> Self {
        DependencyLink {
            parent: parent.into(),
            child: child.into(),
            call_count,
            source: String::new(),
        }
    }
}

/// Collapse entries with identical (parent, child) pairs, summing call
/// counts. First-seen order is preserved and the `source` label is dropped
/// from the aggregated result.
pub fn dedupe_dependencies(links: Vec<DependencyLink>) -> Vec<DependencyLink> {
    let mut merged: Vec<DependencyLink> = Vec::with_capacity(links.len());
    for link in links {
        match merged
            .iter_mut()
            .find(|m| m.parent == link.parent && m.child == link.child)
        {
            Some(existing) => existing.call_count += link.call_count,
            None => merged.push(DependencyLink {
                source: String::new(),
                ..link
            }),
        }
    }
    merged
}

/// Keep only links touching the given service, matching against either the
/// parent or the child side.
pub fn filter_dependencies(links: Vec<DependencyLink>, service: &str) -> Vec<DependencyLink> {
    links
        .into_iter()
        .filter(|l| l.parent == service || l.child == service)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    fn sample_links() -> Vec<DependencyLink> {
        vec![
            DependencyLink { parent: "frontend".into(), child: "billing".into(), call_count: 5, source: "tracing".into() },
            DependencyLink { parent: "frontend".into(), child: "search".into(), call_count: 2, source: "tracing".into() },
            DependencyLink { parent: "frontend".into(), child: "billing".into(), call_count: 7, source: "sampled".into() },
        ]
    }

    #[test]
    fn dedupe_sums_call_counts_per_pair() {
        let merged = dedupe_dependencies(sample_links());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].parent, "frontend");
        assert_eq!(merged[0].child, "billing");
        assert_eq!(merged[0].call_count, 12);
        assert_eq!(merged[1].child, "search");
        assert_eq!(merged[1].call_count, 2);
    }

    #[test]
    fn dedupe_drops_source_labels() {
        for link in dedupe_dependencies(sample_links()) {
            assert!(link.source.is_empty());
        }
    }

    #[test]
    fn filter_matches_either_side() {
        let filtered = filter_dependencies(sample_links(), "billing");
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|l| l.child == "billing"));

        let filtered = filter_dependencies(sample_links(), "frontend");
        assert_eq!(filtered.len(), 3);

        assert!(filter_dependencies(sample_links(), "unknown").is_empty());
    }
}
