//! Request materializer: HAR entry → base request, delta request and their
//! child records.
//!
//! The base holds the recorded values verbatim. The delta overlays it: every
//! value that matches an earlier response is replaced by a template reference,
//! and only changed values get a delta record. A raw body always gets a delta
//! record so the binding exists even when nothing was templated.

use std::collections::{BTreeSet, HashMap};

use crate::classify::{self, Classification};
use crate::depfinder::{DependencyRegistry, Reference, TemplateError};
use crate::error::{Diagnostic, Observer, TranslateError};
use crate::har::types::{Entry, PostData};
use crate::id::{Id, IdSource};
use crate::model::*;

/// Public node name of the request at `position` (0-based) in sorted order.
pub fn request_node_name(position: usize) -> String {
    format!("request_{}", position + 1)
}

/// Child records of one request, base records first, then delta records.
#[derive(Debug, Clone, Default)]
pub struct ChildRecords {
    pub headers: Vec<HttpHeader>,
    pub search_params: Vec<HttpSearchParam>,
    pub body_forms: Vec<HttpBodyForm>,
    pub body_url_encoded: Vec<HttpBodyUrlEncoded>,
    pub body_raws: Vec<HttpBodyRaw>,
}

#[derive(Debug, Clone)]
pub struct MaterializedEntry {
    /// Position after sorting by start time.
    pub position: usize,
    /// Position in the archive as recorded.
    pub archive_index: usize,
    pub node_name: String,
    pub classification: Classification,
    pub started_at: i64,
    pub base: Http,
    pub delta: Http,
    pub children: ChildRecords,
    /// Sorted positions of earlier entries whose response values were used.
    pub dependencies: BTreeSet<usize>,
}

pub struct Materializer<'a> {
    workspace_id: Id,
    ids: &'a mut dyn IdSource,
    registry: &'a mut DependencyRegistry,
    observer: &'a mut dyn Observer,
    node_positions: HashMap<String, usize>,
}

impl<'a> Materializer<'a> {
    pub fn new(
        workspace_id: Id,
        ids: &'a mut dyn IdSource,
        registry: &'a mut DependencyRegistry,
        observer: &'a mut dyn Observer,
    ) -> Self {
        Self {
            workspace_id,
            ids,
            registry,
            observer,
            node_positions: HashMap::new(),
        }
    }

    /// Materialize one entry. Entries must be fed in sorted order so that
    /// templates only ever reference earlier responses.
    pub fn materialize(
        &mut self,
        position: usize,
        archive_index: usize,
        entry: &Entry,
    ) -> Result<MaterializedEntry, TranslateError> {
        let request = &entry.request;
        let classification = classify::classify(&request.url, &request.method)
            .map_err(|e| e.at_entry(archive_index))?;
        let body_kind =
            BodyKind::from_mime_type(request.post_data.as_ref().map(|p| p.mime_type.as_str()));
        let started_at = entry.started_at_ms();
        let node_name = request_node_name(position);

        // Base request and its children
        let base = Http {
            id: self.ids.next_id(),
            workspace_id: self.workspace_id,
            name: classification.request_name.clone(),
            url: request.url.clone(),
            method: classification.method.clone(),
            description: String::new(),
            body_kind,
            is_delta: false,
            parent_http_id: None,
            delta_name: None,
            delta_url: None,
            delta_method: None,
            delta_description: None,
            created_at: started_at,
            updated_at: started_at,
        };

        let header_pairs: Vec<(String, String)> = request
            .headers
            .iter()
            .filter(|h| !h.name.starts_with(':'))
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();
        let query_pairs: Vec<(String, String)> = request
            .query_string
            .iter()
            .map(|q| (q.name.clone(), q.value.clone()))
            .collect();

        let base_headers = self.base_records(base.id, &header_pairs);
        let base_params = self.base_records(base.id, &query_pairs);
        let (base_forms, base_url_encoded, base_raw) = match (&request.post_data, body_kind) {
            (Some(post), BodyKind::FormData) => {
                (self.base_records(base.id, &form_pairs(post)), Vec::new(), None)
            }
            (Some(post), BodyKind::UrlEncoded) => {
                (Vec::new(), self.base_records(base.id, &url_encoded_pairs(post)), None)
            }
            (Some(post), BodyKind::Raw) => {
                (Vec::new(), Vec::new(), Some(self.base_raw(base.id, post)))
            }
            _ => (Vec::new(), Vec::new(), None),
        };

        // Delta request: overrides only where templating changed something
        let mut references = BTreeSet::new();
        let url = self.registry.template_url(&request.url);
        references.extend(url.references);
        let delta = Http {
            id: self.ids.next_id(),
            is_delta: true,
            parent_http_id: Some(base.id),
            delta_url: url.replaced.then_some(url.value),
            created_at: started_at + 1,
            updated_at: started_at + 1,
            ..base.clone()
        };

        let delta_headers = self.delta_records(delta.id, &base_headers, &mut references);
        let delta_params = self.delta_records(delta.id, &base_params, &mut references);
        let delta_forms = self.delta_records(delta.id, &base_forms, &mut references);
        let delta_url_encoded = self.delta_records(delta.id, &base_url_encoded, &mut references);
        let delta_raw = base_raw
            .as_ref()
            .map(|raw| self.delta_raw(delta.id, raw, archive_index, &mut references));

        let children = ChildRecords {
            headers: concat(base_headers, delta_headers),
            search_params: concat(base_params, delta_params),
            body_forms: concat(base_forms, delta_forms),
            body_url_encoded: concat(base_url_encoded, delta_url_encoded),
            body_raws: base_raw.into_iter().chain(delta_raw).collect(),
        };

        let dependencies = self.resolve_dependencies(&references, position);
        self.register_response(entry, &node_name, position, archive_index);

        Ok(MaterializedEntry {
            position,
            archive_index,
            node_name,
            classification,
            started_at,
            base,
            delta,
            children,
            dependencies,
        })
    }

    fn base_records(&mut self, http_id: Id, pairs: &[(String, String)]) -> Vec<KeyValueRecord> {
        pairs
            .iter()
            .map(|(key, value)| KeyValueRecord::base(self.ids.next_id(), http_id, key, value))
            .collect()
    }

    fn delta_records(
        &mut self,
        delta_http_id: Id,
        base_records: &[KeyValueRecord],
        references: &mut BTreeSet<Reference>,
    ) -> Vec<KeyValueRecord> {
        let mut out = Vec::new();
        for base in base_records {
            let templated = self.registry.template_string(&base.value);
            if !templated.replaced {
                continue;
            }
            references.extend(templated.references);
            out.push(KeyValueRecord::delta_of(
                base,
                self.ids.next_id(),
                delta_http_id,
                templated.value,
            ));
        }
        out
    }

    fn base_raw(&mut self, http_id: Id, post: &PostData) -> HttpBodyRaw {
        HttpBodyRaw {
            id: self.ids.next_id(),
            http_id,
            raw_data: post.text.clone().unwrap_or_default().into_bytes(),
            content_type: post.mime_type.clone(),
            compression: CompressionKind::None,
            is_delta: false,
            parent_body_raw_id: None,
            delta_raw_data: None,
            delta_content_type: None,
            delta_compression: None,
        }
    }

    fn delta_raw(
        &mut self,
        delta_http_id: Id,
        base: &HttpBodyRaw,
        archive_index: usize,
        references: &mut BTreeSet<Reference>,
    ) -> HttpBodyRaw {
        let mut delta_raw_data = None;
        let is_json = base.content_type.to_ascii_lowercase().contains("json");
        if is_json && !base.raw_data.is_empty() {
            match self.registry.template_json(&base.raw_data) {
                Ok(templated) if templated.replaced => {
                    references.extend(templated.references);
                    delta_raw_data = Some(templated.value);
                }
                Ok(_) => {}
                Err(e) => self.observer.corrupt_data(Diagnostic {
                    code: "C001",
                    entry_index: archive_index,
                    message: format!("request body left untemplated: {}", e),
                }),
            }
        }
        HttpBodyRaw {
            id: self.ids.next_id(),
            http_id: delta_http_id,
            raw_data: base.raw_data.clone(),
            content_type: base.content_type.clone(),
            compression: base.compression,
            is_delta: true,
            parent_body_raw_id: Some(base.id),
            delta_raw_data,
            delta_content_type: None,
            delta_compression: None,
        }
    }

    /// Map template references to earlier positions in this translation. The
    /// registry only hands out origins recorded in the current scope.
    fn resolve_dependencies(
        &self,
        references: &BTreeSet<Reference>,
        position: usize,
    ) -> BTreeSet<usize> {
        references
            .iter()
            .filter_map(|reference| match self.node_positions.get(&reference.node) {
                Some(&source) if source < position => Some(source),
                _ => {
                    tracing::trace!(node = %reference.node, "reference outside this flow");
                    None
                }
            })
            .collect()
    }

    fn register_response(
        &mut self,
        entry: &Entry,
        node_name: &str,
        position: usize,
        archive_index: usize,
    ) {
        self.node_positions.insert(node_name.to_string(), position);

        let content = &entry.response.content;
        let Some(text) = content.text.as_deref() else {
            return;
        };
        if !content.is_json() || text.trim().is_empty() {
            return;
        }
        if content.is_base64() {
            self.observer.corrupt_data(Diagnostic {
                code: "C002",
                entry_index: archive_index,
                message: "base64-encoded JSON response not registered".into(),
            });
            return;
        }
        match self.registry.add_json(node_name, text.as_bytes()) {
            Ok(_) => {}
            Err(TemplateError::NotContainer) => {
                tracing::debug!(node = node_name, "scalar JSON response not registered");
            }
            Err(e) => self.observer.corrupt_data(Diagnostic {
                code: "C001",
                entry_index: archive_index,
                message: format!("response body not registered: {}", e),
            }),
        }
    }
}

fn form_pairs(post: &PostData) -> Vec<(String, String)> {
    post.params
        .iter()
        .map(|p| {
            let value = p
                .value
                .clone()
                .or_else(|| p.file_name.clone())
                .unwrap_or_default();
            (p.name.clone(), value)
        })
        .collect()
}

fn url_encoded_pairs(post: &PostData) -> Vec<(String, String)> {
    if !post.params.is_empty() {
        return form_pairs(post);
    }
    let text = post.text.as_deref().unwrap_or_default();
    url::form_urlencoded::parse(text.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn concat<T>(mut base: Vec<T>, delta: Vec<T>) -> Vec<T> {
    base.extend(delta);
    base
}
