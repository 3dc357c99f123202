//! Whole-archive checks against a recorded shopping session.

#[allow(dead_code)]
mod helpers;

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use har_translator::flow::layout;
use har_translator::har;
use har_translator::id::Id;
use har_translator::materialize::request_node_name;
use har_translator::model::*;
use har_translator::validate::check_result;
use helpers::*;

const SHOP_SESSION: &str = include_str!("fixtures/shop_session.har");

fn shop() -> har_translator::TranslationResult {
    translate_bytes(SHOP_SESSION.as_bytes()).0
}

/// Response bodies keyed by node name, in start-time order.
fn recorded_responses() -> HashMap<String, Value> {
    let archive = har::parse(SHOP_SESSION.as_bytes()).expect("fixture parses");
    let mut entries: Vec<_> = archive.log.entries.iter().collect();
    entries.sort_by_key(|e| e.started_date_time);
    entries
        .iter()
        .enumerate()
        .filter_map(|(position, e)| {
            let text = e.response.content.text.as_deref()?;
            let body = serde_json::from_str(text).ok()?;
            Some((request_node_name(position), body))
        })
        .collect()
}

// =============================================================================
// Graph shape
// =============================================================================

#[test]
fn shop_session_edges() {
    let result = shop();
    insta::assert_snapshot!(edge_names(&result).join("\n"), @r"
    Start -> request_1
    Start -> request_3
    Start -> request_4
    request_1 -> request_2
    request_1 -> request_7
    request_1 -> request_9
    request_2 -> request_5
    request_4 -> request_5
    request_5 -> request_6
    request_5 -> request_8
    ");
}

#[test]
fn shop_session_layout() {
    let result = shop();
    insta::assert_snapshot!(render_layout(&result), @r"
    Start (0, 0)
    request_1 (300, -150)
    request_2 (600, -150)
    request_3 (300, 0)
    request_4 (300, 150)
    request_5 (900, 0)
    request_6 (1200, -75)
    request_7 (600, 0)
    request_8 (1200, 75)
    request_9 (600, 150)
    ");
}

#[test]
fn shop_session_names_follow_start_time() {
    let result = shop();
    let names: Vec<&str> = bases(&result).iter().map(|h| h.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "POST Api Auth Login",
            "GET Api Users Usr_0001abcd",
            "GET Img Logo.png",
            "GET Api Products",
            "POST Carts Cart_77aa88bb Items",
            "PUT Carts Cart_77aa88bb Items",
            "POST Api Newsletter",
            "DELETE Cart_77aa88bb Items Line_5566ccdd",
            "POST Api Uploads",
        ]
    );
    assert_eq!(result.flow.duration, 8_310);
}

#[test]
fn graph_is_a_reduced_dag_rooted_at_start() {
    let result = shop();
    let index: HashMap<Id, usize> =
        result.nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
    let edges: Vec<(usize, usize)> = result
        .edges
        .iter()
        .map(|e| (index[&e.source_id], index[&e.target_id]))
        .collect();

    // Forward edges only: sorted order is a topological order.
    assert!(edges.iter().all(|&(u, v)| u < v));

    let targets: HashSet<usize> = edges.iter().map(|&(_, v)| v).collect();
    assert!(!targets.contains(&0));
    for node in 1..result.nodes.len() {
        assert!(targets.contains(&node), "node {} has no incoming edge", node);
    }

    assert!(check_result(&result).is_empty());
}

#[test]
fn layout_is_recomputable_from_edges() {
    let result = shop();
    let index: HashMap<Id, usize> =
        result.nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
    let edges: Vec<(usize, usize)> = result
        .edges
        .iter()
        .map(|e| (index[&e.source_id], index[&e.target_id]))
        .collect();

    let positions = layout::layout(result.nodes.len(), &edges, 300.0, 150.0);
    for (node, position) in result.nodes.iter().zip(positions) {
        assert_eq!((node.position_x, node.position_y), (position.x, position.y));
    }
}

// =============================================================================
// Records
// =============================================================================

#[test]
fn every_base_has_one_later_delta() {
    let result = shop();
    assert_eq!(result.http_requests.len(), 18);
    for base in bases(&result) {
        let deltas: Vec<&Http> = result
            .http_requests
            .iter()
            .filter(|h| h.parent_http_id == Some(base.id))
            .collect();
        assert_eq!(deltas.len(), 1);
        assert!(deltas[0].is_delta);
        assert!(deltas[0].created_at > base.created_at);
    }
}

#[test]
fn delta_children_only_for_changed_values() {
    let result = shop();
    let tables = [
        &result.http_headers,
        &result.http_search_params,
        &result.http_body_forms,
        &result.http_body_url_encoded,
    ];
    for records in tables {
        for delta in records.iter().filter(|r| r.is_delta) {
            let base = records
                .iter()
                .find(|r| Some(r.id) == delta.parent_id)
                .expect("delta child has a base");
            let value = delta.delta_value.as_deref().expect("delta value set");
            assert_ne!(value, base.value);
            assert!(value.contains("{{ "));
        }
    }

    // Query values here are too short to be tokens.
    assert!(result.http_search_params.iter().all(|p| !p.is_delta));
    let templated_headers = result.http_headers.iter().filter(|h| h.is_delta).count();
    assert_eq!(templated_headers, 4);
}

#[test]
fn templates_resolve_to_the_replaced_value() {
    let result = shop();
    let responses = recorded_responses();

    let mut checked = 0;
    let mut check = |base_text: &str, delta_text: &str| {
        for (node, path) in template_refs(delta_text) {
            let body = responses
                .get(&node)
                .unwrap_or_else(|| panic!("{} has no JSON response", node));
            let value = resolve_path(body, &path)
                .unwrap_or_else(|| panic!("{}: path '{}' does not resolve", node, path));
            assert!(
                base_text.contains(&scalar_text(value)),
                "'{}' does not contain {}",
                base_text,
                value
            );
            checked += 1;
        }
    };

    for records in [&result.http_headers, &result.http_body_forms, &result.http_body_url_encoded] {
        for delta in records.iter().filter(|r| r.is_delta) {
            let base = records.iter().find(|r| Some(r.id) == delta.parent_id).expect("base record");
            check(&base.value, delta.delta_value.as_deref().unwrap_or_default());
        }
    }
    for delta in result.http_requests.iter().filter(|h| h.is_delta) {
        if let Some(url) = &delta.delta_url {
            check(&delta.url, url);
        }
    }
    for delta in result.http_body_raws.iter().filter(|r| r.is_delta) {
        if let Some(data) = &delta.delta_raw_data {
            check(
                &String::from_utf8_lossy(&delta.raw_data),
                &String::from_utf8_lossy(data),
            );
        }
    }

    assert!(checked >= 10, "only {} templates checked", checked);
}

#[test]
fn urlencoded_text_body_is_decoded() {
    let result = shop();
    let newsletter = base_for_node(&result, "request_7");
    let fields: Vec<(&str, &str)> = result
        .http_body_url_encoded
        .iter()
        .filter(|r| r.http_id == newsletter.id)
        .map(|r| (r.key.as_str(), r.value.as_str()))
        .collect();
    assert_eq!(fields, [("email", "ada@example.com"), ("userId", "usr_0001abcd")]);
}

#[test]
fn upload_form_keeps_file_names() {
    let result = shop();
    let upload = base_for_node(&result, "request_9");
    assert_eq!(upload.body_kind, BodyKind::FormData);
    let file = result
        .http_body_forms
        .iter()
        .find(|r| r.http_id == upload.id && r.key == "file")
        .expect("file field");
    assert_eq!(file.value, "avatar.png");
}

// =============================================================================
// Files
// =============================================================================

#[test]
fn file_tree_is_well_formed() {
    let result = shop();
    let by_id: HashMap<Id, &File> = result.files.iter().map(|f| (f.id, f)).collect();

    assert!(matches!(result.files[0].content, FileContent::Flow(id) if id == result.flow.id));
    assert!(result.files[0].order < 0);

    let mut seen_content = false;
    for file in &result.files {
        match file.content {
            FileContent::Folder => assert!(!seen_content, "folders precede content files"),
            FileContent::Http(_) | FileContent::HttpDelta(_) => seen_content = true,
            FileContent::Flow(_) => {}
        }
        let Some(parent_id) = file.parent_id else {
            continue;
        };
        let parent = by_id[&parent_id];
        match file.content {
            FileContent::HttpDelta(_) => {
                assert!(matches!(parent.content, FileContent::Http(_)));
                assert_eq!(file.name, format!("{} (Delta)", parent.name));
            }
            _ => assert!(parent.content.is_folder()),
        }
    }

    let folder_names: HashSet<&str> = result
        .files
        .iter()
        .filter(|f| f.content.is_folder() && f.parent_id.is_none())
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(folder_names, HashSet::from(["com", "net"]));
}

// =============================================================================
// Determinism and diagnostics
// =============================================================================

#[test]
fn same_ids_give_identical_output() {
    let first = serde_json::to_string(&shop()).expect("serializes");
    let second = serde_json::to_string(&shop()).expect("serializes");
    assert_eq!(first, second);
}

#[test]
fn corrupt_response_is_reported_once() {
    let (result, diagnostics) = translate_bytes(SHOP_SESSION.as_bytes());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "C001");
    assert_eq!(diagnostics[0].entry_index, 8);
    assert_eq!(bases(&result).len(), 9);
}
