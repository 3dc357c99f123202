//! Output invariant checks (R001–R007).
//!
//! Run at the end of every translation; any finding is a translator bug.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, EdgeReference, NodeIndex};
use petgraph::visit::{Bfs, EdgeFiltered, EdgeRef};
use crate::id::Id;
use crate::model::*;
use crate::translate::TranslationResult;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
    /// The record the finding is about, if any.
    pub record_id: Option<Id>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.record_id {
            Some(id) => write!(f, "[{}] {} (record '{}')", self.code, self.message, id),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

fn finding(code: &'static str, message: String, record_id: Option<Id>) -> ValidationError {
    ValidationError {
        code,
        message,
        record_id,
    }
}

/// Check every output invariant. Returns all findings.
pub fn check_result(result: &TranslationResult) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    r001_delta_pairing(result, &mut errors);
    r002_delta_children(result, &mut errors);
    r003_base_timestamp_order(result, &mut errors);
    r004_file_tree(result, &mut errors);

    let graph = FlowDigraph::build(result, &mut errors);
    r005_acyclic(&graph, &mut errors);
    r006_rooted(result, &graph, &mut errors);
    r007_reduced(&graph, &mut errors);

    errors
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn r001_delta_pairing(result: &TranslationResult, errors: &mut Vec<ValidationError>) {
    let by_id: HashMap<Id, &Http> = result.http_requests.iter().map(|h| (h.id, h)).collect();
    let mut deltas_per_base: HashMap<Id, usize> = HashMap::new();

    for http in result.http_requests.iter().filter(|h| h.is_delta) {
        let parent = http.parent_http_id.and_then(|p| by_id.get(&p));
        match parent {
            Some(parent) if !parent.is_delta => {
                *deltas_per_base.entry(parent.id).or_default() += 1;
                if http.created_at <= parent.created_at || http.updated_at <= parent.updated_at {
                    errors.push(finding(
                        "R001",
                        "Delta timestamps must exceed its parent's".into(),
                        Some(http.id),
                    ));
                }
            }
            _ => errors.push(finding(
                "R001",
                "Delta request has no non-delta parent".into(),
                Some(http.id),
            )),
        }
    }

    for base in result.http_requests.iter().filter(|h| !h.is_delta) {
        if base.parent_http_id.is_some() {
            errors.push(finding("R001", "Base request has a parent".into(), Some(base.id)));
        }
        let count = deltas_per_base.get(&base.id).copied().unwrap_or(0);
        if count != 1 {
            errors.push(finding(
                "R001",
                format!("Base request must have exactly 1 delta, found {}", count),
                Some(base.id),
            ));
        }
    }
}

fn r002_delta_children(result: &TranslationResult, errors: &mut Vec<ValidationError>) {
    let parent_of_delta: HashMap<Id, Id> = result
        .http_requests
        .iter()
        .filter_map(|h| h.parent_http_id.map(|p| (h.id, p)))
        .collect();

    let tables: [(&str, &[KeyValueRecord]); 4] = [
        ("header", &result.http_headers),
        ("search param", &result.http_search_params),
        ("form field", &result.http_body_forms),
        ("url-encoded field", &result.http_body_url_encoded),
    ];
    for (table, records) in tables {
        let bases: HashMap<Id, &KeyValueRecord> = records
            .iter()
            .filter(|r| !r.is_delta)
            .map(|r| (r.id, r))
            .collect();
        for record in records.iter().filter(|r| r.is_delta) {
            let expected_http = parent_of_delta.get(&record.http_id);
            let base = record.parent_id.and_then(|p| bases.get(&p));
            let linked = matches!((base, expected_http), (Some(b), Some(h)) if b.http_id == *h);
            if !linked {
                errors.push(finding(
                    "R002",
                    format!(
                        "Delta {} is not linked to a base {} of the parent request",
                        table, table
                    ),
                    Some(record.id),
                ));
            }
            if !record.has_overrides() {
                errors.push(finding(
                    "R002",
                    format!("Delta {} overrides nothing", table),
                    Some(record.id),
                ));
            }
        }
    }

    let base_raws: HashMap<Id, &HttpBodyRaw> = result
        .http_body_raws
        .iter()
        .filter(|r| !r.is_delta)
        .map(|r| (r.id, r))
        .collect();
    let mut bound: HashSet<Id> = HashSet::new();
    for raw in result.http_body_raws.iter().filter(|r| r.is_delta) {
        let expected_http = parent_of_delta.get(&raw.http_id);
        match raw.parent_body_raw_id.and_then(|p| base_raws.get(&p)) {
            Some(base) if Some(&base.http_id) == expected_http => {
                bound.insert(base.id);
            }
            _ => errors.push(finding(
                "R002",
                "Delta raw body is not linked to a base raw body of the parent request".into(),
                Some(raw.id),
            )),
        }
    }
    for id in base_raws.keys().filter(|id| !bound.contains(id)) {
        errors.push(finding("R002", "Base raw body has no delta record".into(), Some(*id)));
    }
}

fn r003_base_timestamp_order(result: &TranslationResult, errors: &mut Vec<ValidationError>) {
    let bases: Vec<&Http> = result.http_requests.iter().filter(|h| !h.is_delta).collect();
    for pair in bases.windows(2) {
        if pair[0].created_at > pair[1].created_at {
            errors.push(finding(
                "R003",
                "Base requests are not in start-time order".into(),
                Some(pair[1].id),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

fn r004_file_tree(result: &TranslationResult, errors: &mut Vec<ValidationError>) {
    let by_id: HashMap<Id, &File> = result.files.iter().map(|f| (f.id, f)).collect();
    let parent_of_delta: HashMap<Id, Id> = result
        .http_requests
        .iter()
        .filter_map(|h| h.parent_http_id.map(|p| (h.id, p)))
        .collect();

    for file in &result.files {
        if file.workspace_id != result.flow.workspace_id {
            errors.push(finding("R004", "File outside the workspace".into(), Some(file.id)));
        }
        let parent = file.parent_id.map(|p| by_id.get(&p));
        match (file.content, parent) {
            (_, Some(None)) => errors.push(finding(
                "R004",
                "File parent does not exist".into(),
                Some(file.id),
            )),
            (FileContent::HttpDelta(delta_id), Some(Some(parent))) => {
                let expected = parent_of_delta.get(&delta_id).copied();
                let under_base = matches!(parent.content, FileContent::Http(_))
                    && parent.content.content_id() == expected;
                if !under_base {
                    errors.push(finding(
                        "R004",
                        "Delta file must be nested under its base request file".into(),
                        Some(file.id),
                    ));
                }
            }
            (FileContent::HttpDelta(_), None) => errors.push(finding(
                "R004",
                "Delta file has no parent".into(),
                Some(file.id),
            )),
            (_, Some(Some(parent))) if !parent.content.is_folder() => errors.push(finding(
                "R004",
                "File parent is not a folder".into(),
                Some(file.id),
            )),
            _ => {}
        }

        // Cycle check: a parent chain can be no longer than the file count.
        let mut current = file.parent_id;
        let mut steps = 0;
        while let Some(id) = current {
            steps += 1;
            if steps > result.files.len() {
                errors.push(finding("R004", "File parent chain has a cycle".into(), Some(file.id)));
                break;
            }
            current = by_id.get(&id).and_then(|f| f.parent_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Flow graph
// ---------------------------------------------------------------------------

struct FlowDigraph {
    graph: DiGraph<Id, ()>,
    node_indices: HashMap<Id, NodeIndex>,
}

impl FlowDigraph {
    fn build(result: &TranslationResult, errors: &mut Vec<ValidationError>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        for node in &result.nodes {
            node_indices.insert(node.id, graph.add_node(node.id));
        }
        for edge in &result.edges {
            match (node_indices.get(&edge.source_id), node_indices.get(&edge.target_id)) {
                (Some(&s), Some(&t)) => {
                    graph.add_edge(s, t, ());
                }
                _ => errors.push(finding(
                    "R005",
                    "Edge references an unknown node".into(),
                    Some(edge.id),
                )),
            }
        }
        FlowDigraph {
            graph,
            node_indices,
        }
    }
}

fn r005_acyclic(graph: &FlowDigraph, errors: &mut Vec<ValidationError>) {
    if is_cyclic_directed(&graph.graph) {
        errors.push(finding("R005", "Flow graph contains a cycle".into(), None));
    }
}

fn r006_rooted(result: &TranslationResult, graph: &FlowDigraph, errors: &mut Vec<ValidationError>) {
    let starts: Vec<&Node> = result
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Start)
        .collect();
    let [start] = starts.as_slice() else {
        errors.push(finding(
            "R006",
            format!("Flow must have exactly 1 start node, found {}", starts.len()),
            None,
        ));
        return;
    };
    let Some(&start_idx) = graph.node_indices.get(&start.id) else {
        return;
    };

    let mut reachable = HashSet::new();
    let mut bfs = Bfs::new(&graph.graph, start_idx);
    while let Some(nx) = bfs.next(&graph.graph) {
        reachable.insert(nx);
    }
    for node in &result.nodes {
        let Some(&idx) = graph.node_indices.get(&node.id) else {
            continue;
        };
        if !reachable.contains(&idx) {
            errors.push(finding(
                "R006",
                format!("Node '{}' is not reachable from the start node", node.name),
                Some(node.id),
            ));
        }
    }
}

fn r007_reduced(graph: &FlowDigraph, errors: &mut Vec<ValidationError>) {
    let g = &graph.graph;
    for edge in g.edge_references() {
        let skipped = edge.id();
        let others = EdgeFiltered::from_fn(g, |e: EdgeReference<'_, ()>| e.id() != skipped);
        if has_path_connecting(&others, edge.source(), edge.target(), None) {
            errors.push(finding(
                "R007",
                format!(
                    "Edge '{}' → '{}' is implied by another path",
                    g[edge.source()],
                    g[edge.target()]
                ),
                None,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectingObserver;
    use crate::id::SequentialIdSource;
    use crate::translate::{TranslateOptions, translate};

    fn two_requests() -> TranslationResult {
        let json = r#"{"log":{"entries":[
            {"startedDateTime":"2024-01-01T00:00:00Z",
             "request":{"method":"GET","url":"https://a.example.com/one"},
             "response":{"status":200,"content":{}}},
            {"startedDateTime":"2024-01-01T00:00:00.010Z",
             "request":{"method":"GET","url":"https://a.example.com/two"},
             "response":{"status":200,"content":{}}}
        ]}}"#;
        let mut ids = SequentialIdSource::default();
        let mut observer = CollectingObserver::default();
        translate(json.as_bytes(), Id::from_u128(0), TranslateOptions::new(&mut ids, &mut observer))
            .unwrap()
    }

    fn codes(result: &TranslationResult) -> Vec<&'static str> {
        check_result(result).iter().map(|e| e.code).collect()
    }

    #[test]
    fn translation_output_is_clean() {
        assert!(check_result(&two_requests()).is_empty());
    }

    #[test]
    fn missing_delta_is_reported() {
        let mut result = two_requests();
        result.http_requests.retain(|h| !h.is_delta);
        assert!(codes(&result).contains(&"R001"));
    }

    #[test]
    fn implied_edge_is_reported() {
        let mut result = two_requests();
        // Start → request_1 → request_2 exists; add Start → request_2.
        let shortcut = Edge {
            id: Id::from_u128(9_999),
            source_id: result.nodes[0].id,
            target_id: result.nodes[2].id,
            ..result.edges[0].clone()
        };
        result.edges.push(shortcut);
        assert_eq!(codes(&result), vec!["R007"]);
    }

    #[test]
    fn cycle_and_unreachable_nodes_are_reported() {
        let mut result = two_requests();
        result.edges.retain(|e| e.source_id != result.nodes[0].id);
        let back = Edge {
            id: Id::from_u128(9_999),
            source_id: result.nodes[2].id,
            target_id: result.nodes[1].id,
            ..result.edges[0].clone()
        };
        result.edges.push(back);
        let codes = codes(&result);
        assert!(codes.contains(&"R005"));
        assert!(codes.contains(&"R006"));
    }

    #[test]
    fn delta_file_under_folder_is_reported() {
        let mut result = two_requests();
        let folder = result
            .files
            .iter()
            .find(|f| f.content.is_folder())
            .map(|f| f.id);
        let delta_file = result
            .files
            .iter_mut()
            .find(|f| matches!(f.content, FileContent::HttpDelta(_)))
            .unwrap();
        delta_file.parent_id = folder;
        assert!(codes(&result).contains(&"R004"));
    }
}
