//! Translation pipeline: parse → sort → materialize → namespace → flow graph →
//! output validation.
//!
//! `translate` is pure apart from the injected id source and observer: the
//! same archive with the same id sequence yields identical output.

use serde::Serialize;

use crate::config::TranslateConfig;
use crate::depfinder::DependencyRegistry;
use crate::error::{Observer, Phase, TracingObserver, TranslateError};
use crate::files::NamespaceBuilder;
use crate::flow;
use crate::har::{self, Entry};
use crate::id::{Id, IdSource, UuidV7Source};
use crate::materialize::{MaterializedEntry, Materializer};
use crate::model::*;
use crate::validate;

pub struct TranslateOptions<'a> {
    pub config: TranslateConfig,
    pub id_source: &'a mut dyn IdSource,
    /// Registry shared across archives. A fresh one is used when absent. The
    /// registry is updated in place; values recorded by earlier translations
    /// are never used as templates in this one.
    pub registry: Option<&'a mut DependencyRegistry>,
    pub observer: &'a mut dyn Observer,
}

impl<'a> TranslateOptions<'a> {
    pub fn new(id_source: &'a mut dyn IdSource, observer: &'a mut dyn Observer) -> Self {
        Self {
            config: TranslateConfig::default(),
            id_source,
            registry: None,
            observer,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    /// All base requests, then all deltas, each block in sorted order.
    pub http_requests: Vec<Http>,
    pub http_headers: Vec<HttpHeader>,
    pub http_search_params: Vec<HttpSearchParam>,
    pub http_body_forms: Vec<HttpBodyForm>,
    pub http_body_url_encoded: Vec<HttpBodyUrlEncoded>,
    pub http_body_raws: Vec<HttpBodyRaw>,
    pub files: Vec<File>,
    pub flow: Flow,
    pub nodes: Vec<Node>,
    pub request_nodes: Vec<RequestNode>,
    pub edges: Vec<Edge>,
}

/// Translate with UUIDv7 ids, a fresh registry and tracing diagnostics.
pub fn translate_with_defaults(
    archive: &[u8],
    workspace_id: Id,
) -> Result<TranslationResult, TranslateError> {
    let mut ids = UuidV7Source;
    let mut observer = TracingObserver;
    translate(archive, workspace_id, TranslateOptions::new(&mut ids, &mut observer))
}

pub fn translate(
    archive: &[u8],
    workspace_id: Id,
    options: TranslateOptions<'_>,
) -> Result<TranslationResult, TranslateError> {
    let TranslateOptions {
        config,
        id_source: ids,
        registry,
        observer,
    } = options;

    // 1. Parse and order by start time, ties by archive position
    let har = har::parse(archive)?;
    let mut ordered: Vec<(usize, &Entry)> = har.log.entries.iter().enumerate().collect();
    ordered.sort_by_key(|(_, entry)| entry.started_date_time);

    let mut fresh_registry = DependencyRegistry::new(config.min_token_length);
    let registry = match registry {
        Some(shared) => {
            shared.set_min_token_length(config.min_token_length);
            shared
        }
        None => &mut fresh_registry,
    };
    let scope = registry.begin_scope();
    tracing::debug!(scope, seeded = registry.len(), "dependency registry scope opened");

    let flow = Flow {
        id: ids.next_id(),
        workspace_id,
        name: config.flow_name.clone(),
        duration: recorded_duration(&ordered),
    };

    // 2. Materialize base + delta requests
    let mut entries: Vec<MaterializedEntry> = Vec::with_capacity(ordered.len());
    {
        let mut materializer =
            Materializer::new(workspace_id, &mut *ids, &mut *registry, &mut *observer);
        for (position, (archive_index, entry)) in ordered.iter().enumerate() {
            entries.push(materializer.materialize(position, *archive_index, entry)?);
        }
    }
    tracing::debug!(
        requests = entries.len(),
        registry = registry.len(),
        "materialized requests"
    );

    // 3. File namespace
    let files = {
        let mut namespace = NamespaceBuilder::new(workspace_id, &mut *ids);
        namespace.add_flow(&flow, entries.first().map_or(0, |e| e.started_at));
        for entry in &entries {
            namespace.add_request(&entry.classification, &entry.base, &entry.delta);
        }
        namespace.finish()
    };

    // 4. Flow graph
    let graph = flow::build_flow_graph(&flow, &entries, &config, &mut *ids);

    let result = assemble(entries, files, flow, graph);

    // 5. Output invariants
    let findings = validate::check_result(&result);
    if !findings.is_empty() {
        let message = findings
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(TranslateError::internal(Phase::Validate, "I001", message));
    }

    Ok(result)
}

/// Span from the first start to the latest finish, in milliseconds.
fn recorded_duration(ordered: &[(usize, &Entry)]) -> i64 {
    let Some((_, first)) = ordered.first() else {
        return 0;
    };
    let start = first.started_at_ms();
    let end = ordered
        .iter()
        .map(|(_, e)| e.started_at_ms() + e.time.max(0.0).round() as i64)
        .max()
        .unwrap_or(start);
    end - start
}

fn assemble(
    entries: Vec<MaterializedEntry>,
    files: Vec<File>,
    flow: Flow,
    graph: flow::FlowGraph,
) -> TranslationResult {
    let mut bases = Vec::with_capacity(entries.len());
    let mut deltas = Vec::with_capacity(entries.len());
    let mut result = TranslationResult {
        http_requests: Vec::new(),
        http_headers: Vec::new(),
        http_search_params: Vec::new(),
        http_body_forms: Vec::new(),
        http_body_url_encoded: Vec::new(),
        http_body_raws: Vec::new(),
        files,
        flow,
        nodes: graph.nodes,
        request_nodes: graph.request_nodes,
        edges: graph.edges,
    };

    for entry in entries {
        bases.push(entry.base);
        deltas.push(entry.delta);
        let children = entry.children;
        result.http_headers.extend(children.headers);
        result.http_search_params.extend(children.search_params);
        result.http_body_forms.extend(children.body_forms);
        result.http_body_url_encoded.extend(children.body_url_encoded);
        result.http_body_raws.extend(children.body_raws);
    }
    bases.extend(deltas);
    result.http_requests = bases;
    result
}
