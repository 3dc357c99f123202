use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use har_translator::error::{CollectingObserver, Diagnostic};
use har_translator::id::{Id, SequentialIdSource};
use har_translator::model::*;
use har_translator::{TranslateOptions, TranslationResult, translate};

/// 2024-05-01T12:00:00Z
const BASE_MS: i64 = 1_714_564_800_000;

pub fn workspace() -> Id {
    Id::from_u128(0xAAAA)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// HAR builders
// =============================================================================

pub fn at(offset_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(BASE_MS + offset_ms)
        .expect("timestamp in range")
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// GET/POST/... entry with no headers and an empty response.
pub fn entry(offset_ms: i64, method: &str, url: &str) -> Value {
    json!({
        "startedDateTime": at(offset_ms),
        "time": 20,
        "request": {
            "method": method,
            "url": url,
            "httpVersion": "HTTP/1.1",
            "headers": [],
            "queryString": [],
            "cookies": []
        },
        "response": {
            "status": 200,
            "statusText": "OK",
            "content": {"size": 0, "mimeType": "text/plain"}
        }
    })
}

pub fn with_header(mut entry: Value, name: &str, value: &str) -> Value {
    entry["request"]["headers"]
        .as_array_mut()
        .expect("headers array")
        .push(json!({"name": name, "value": value}));
    entry
}

pub fn with_query(mut entry: Value, name: &str, value: &str) -> Value {
    entry["request"]["queryString"]
        .as_array_mut()
        .expect("queryString array")
        .push(json!({"name": name, "value": value}));
    entry
}

pub fn with_json_body(mut entry: Value, body: &str) -> Value {
    entry["request"]["postData"] = json!({"mimeType": "application/json", "text": body});
    with_header(entry, "Content-Type", "application/json")
}

pub fn with_json_response(mut entry: Value, body: &str) -> Value {
    entry["response"]["content"] = json!({
        "size": body.len(),
        "mimeType": "application/json; charset=utf-8",
        "text": body
    });
    entry
}

pub fn archive(entries: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "log": {
            "version": "1.2",
            "creator": {"name": "tests", "version": "1"},
            "entries": entries
        }
    }))
    .expect("serializable archive")
}

// =============================================================================
// Running translations
// =============================================================================

pub fn translate_bytes(bytes: &[u8]) -> (TranslationResult, Vec<Diagnostic>) {
    init_tracing();
    let mut ids = SequentialIdSource::default();
    let mut observer = CollectingObserver::default();
    let result = translate(bytes, workspace(), TranslateOptions::new(&mut ids, &mut observer))
        .expect("translation should succeed");
    (result, observer.diagnostics)
}

pub fn translate_entries(entries: Vec<Value>) -> TranslationResult {
    translate_bytes(&archive(entries)).0
}

// =============================================================================
// Lookups
// =============================================================================

pub fn node_named<'a>(result: &'a TranslationResult, name: &str) -> &'a Node {
    result
        .nodes
        .iter()
        .find(|n| n.name == name)
        .unwrap_or_else(|| panic!("no node named {}", name))
}

pub fn node_name(result: &TranslationResult, id: Id) -> String {
    result
        .nodes
        .iter()
        .find(|n| n.id == id)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| panic!("no node with id {}", id))
}

/// Edges as `source -> target` using node names.
pub fn edge_names(result: &TranslationResult) -> Vec<String> {
    result
        .edges
        .iter()
        .map(|e| {
            let source = node_name(result, e.source_id);
            format!("{} -> {}", source, node_name(result, e.target_id))
        })
        .collect()
}

pub fn has_edge(result: &TranslationResult, source: &str, target: &str) -> bool {
    edge_names(result).contains(&format!("{} -> {}", source, target))
}

pub fn bases(result: &TranslationResult) -> Vec<&Http> {
    result.http_requests.iter().filter(|h| !h.is_delta).collect()
}

pub fn delta_of<'a>(result: &'a TranslationResult, base: &Http) -> &'a Http {
    result
        .http_requests
        .iter()
        .find(|h| h.parent_http_id == Some(base.id))
        .expect("every base has a delta")
}

/// Base request bound to the request node named `name`.
pub fn base_for_node<'a>(result: &'a TranslationResult, name: &str) -> &'a Http {
    let node = node_named(result, name);
    let binding = result
        .request_nodes
        .iter()
        .find(|r| r.flow_node_id == node.id)
        .expect("request node binding");
    result
        .http_requests
        .iter()
        .find(|h| h.id == binding.http_id)
        .expect("bound base request")
}

pub fn render_layout(result: &TranslationResult) -> String {
    result
        .nodes
        .iter()
        .map(|n| format!("{} ({}, {})", n.name, n.position_x, n.position_y))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Template references
// =============================================================================

/// `(node, path)` pairs of every `{{ node.response.body<path> }}` in `text`.
pub fn template_refs(text: &str) -> Vec<(String, String)> {
    let mut refs = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{ ") {
        let after = &rest[start + 3..];
        let Some(end) = after.find(" }}") else { break };
        let inner = &after[..end];
        if let Some((node, path)) = inner.split_once(".response.body") {
            let path = path.strip_prefix('.').unwrap_or(path);
            refs.push((node.to_string(), path.to_string()));
        }
        rest = &after[end + 3..];
    }
    refs
}

/// Resolve `a.b[2]["c d"]` inside a JSON value.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            let token = &after[..end];
            current = if token.starts_with('"') {
                let key: String = serde_json::from_str(token).ok()?;
                current.get(key.as_str())?
            } else {
                current.get(token.parse::<usize>().ok()?)?
            };
            rest = &after[end + 1..];
        } else {
            let rest_key = rest.strip_prefix('.').unwrap_or(rest);
            let end = rest_key.find(['.', '[']).unwrap_or(rest_key.len());
            current = current.get(&rest_key[..end])?;
            rest = &rest_key[end..];
        }
    }
    Some(current)
}

/// Text a recorded scalar would have in a header, query or URL.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
