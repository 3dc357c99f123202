//! Candidate edge rules.
//!
//! Graph positions: 0 is the start node, `k + 1` is the request at sorted
//! position `k`. Candidates are returned deduplicated in insertion order.

use std::collections::{BTreeSet, HashSet};

use crate::config::TranslateConfig;

pub const START: usize = 0;

/// What the edge rules need to know about one request.
#[derive(Debug, Clone)]
pub struct RequestFacts<'a> {
    pub started_at: i64,
    pub folder_path: &'a str,
    pub is_mutation: bool,
    pub requires_strict_ordering: bool,
    /// Sorted positions of earlier requests this one takes values from.
    pub dependencies: &'a BTreeSet<usize>,
}

#[derive(Debug, Default)]
struct EdgeSet {
    edges: Vec<(usize, usize)>,
    seen: HashSet<(usize, usize)>,
}

impl EdgeSet {
    fn insert(&mut self, source: usize, target: usize) {
        if self.seen.insert((source, target)) {
            self.edges.push((source, target));
        }
    }
}

pub fn candidate_edges(
    requests: &[RequestFacts<'_>],
    config: &TranslateConfig,
) -> Vec<(usize, usize)> {
    let mut set = EdgeSet::default();

    data_dependencies(requests, &mut set);
    timestamp_sequencing(requests, config.timestamp_sequencing_threshold_ms, &mut set);
    if config.mutation_ordering {
        mutation_ordering(requests, &mut set);
    }
    rooting(requests.len(), &mut set);

    set.edges
}

fn node(position: usize) -> usize {
    position + 1
}

// ---------------------------------------------------------------------------
// (a) data dependencies
// ---------------------------------------------------------------------------

fn data_dependencies(requests: &[RequestFacts<'_>], set: &mut EdgeSet) {
    for (target, request) in requests.iter().enumerate() {
        for &source in request.dependencies {
            if source < target {
                set.insert(node(source), node(target));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// (b) bursts of requests started close together
// ---------------------------------------------------------------------------

fn timestamp_sequencing(requests: &[RequestFacts<'_>], threshold_ms: i64, set: &mut EdgeSet) {
    for (i, pair) in requests.windows(2).enumerate() {
        if pair[1].started_at - pair[0].started_at <= threshold_ms {
            set.insert(node(i), node(i + 1));
        }
    }
}

// ---------------------------------------------------------------------------
// (c) observed write order on the same folder path
// ---------------------------------------------------------------------------

fn mutation_ordering(requests: &[RequestFacts<'_>], set: &mut EdgeSet) {
    for (target, request) in requests.iter().enumerate() {
        if !request.is_mutation {
            continue;
        }
        let earlier = &requests[..target];
        let same_path = |r: &RequestFacts<'_>| r.folder_path == request.folder_path;

        if let Some(source) = earlier.iter().rposition(|r| r.is_mutation && same_path(r)) {
            set.insert(node(source), node(target));
        }
        // A delete must also follow every read of what it removes.
        if request.requires_strict_ordering {
            if let Some(source) = earlier.iter().rposition(same_path) {
                set.insert(node(source), node(target));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// (d) rooting
// ---------------------------------------------------------------------------

fn rooting(request_count: usize, set: &mut EdgeSet) {
    let targets: HashSet<usize> = set.edges.iter().map(|&(_, t)| t).collect();
    for position in 0..request_count {
        if !targets.contains(&node(position)) {
            set.insert(START, node(position));
        }
    }
}
