//! Dependency registry: which earlier response produced this value?
//!
//! Response bodies are walked once and every primitive leaf is recorded as
//! `value ↦ (node, path)`. Later request values that equal a recorded value
//! exactly are rewritten to `{{ <node>.response.body.<path> }}`.
//!
//! Strings and booleans shorter than the minimum token length never match;
//! numbers match on their exact JSON text.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("body is not valid JSON: {0}")]
    CorruptData(#[from] serde_json::Error),
    #[error("top-level JSON value must be an object or an array")]
    NotContainer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ScalarKey {
    String(String),
    Number(String),
    Bool(bool),
}

/// Origin of a recorded value: the node whose response held it and the JSON
/// path inside that response body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Reference {
    pub node: String,
    pub path: String,
}

impl Reference {
    pub fn template(&self) -> String {
        if self.path.starts_with('[') {
            format!("{{{{ {}.response.body{} }}}}", self.node, self.path)
        } else {
            format!("{{{{ {}.response.body.{} }}}}", self.node, self.path)
        }
    }
}

/// Result of a templating pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templated<T> {
    pub value: T,
    pub replaced: bool,
    pub references: BTreeSet<Reference>,
}

impl<T> Templated<T> {
    fn unchanged(value: T) -> Self {
        Templated {
            value,
            replaced: false,
            references: BTreeSet::new(),
        }
    }
}

/// A recorded origin and the translation that recorded it.
#[derive(Debug, Clone)]
struct Origin {
    reference: Reference,
    scope: u64,
}

/// Value origins, possibly shared by several translations. Each translation
/// opens its own scope with [`DependencyRegistry::begin_scope`]; only origins
/// recorded in the current scope are used for templating, since node names
/// restart at `request_1` in every flow.
#[derive(Debug, Clone)]
pub struct DependencyRegistry {
    origins: HashMap<ScalarKey, Origin>,
    min_token_length: usize,
    scope: u64,
}

impl Default for DependencyRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TOKEN_LENGTH)
    }
}

impl DependencyRegistry {
    pub fn new(min_token_length: usize) -> Self {
        Self {
            origins: HashMap::new(),
            min_token_length,
            scope: 0,
        }
    }

    /// Start a new translation. Origins recorded earlier stay in the registry
    /// but no longer match; values seen again are re-attributed to this scope.
    pub fn begin_scope(&mut self) -> u64 {
        self.scope += 1;
        self.scope
    }

    pub fn set_min_token_length(&mut self, min_token_length: usize) {
        self.min_token_length = min_token_length;
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Record every primitive leaf of `json` as originating from `node`.
    /// The first origin recorded for a value wins. Returns how many new
    /// values were recorded.
    pub fn add_json(&mut self, node: &str, json: &[u8]) -> Result<usize, TemplateError> {
        let value: Value = serde_json::from_slice(json)?;
        if !(value.is_object() || value.is_array()) {
            return Err(TemplateError::NotContainer);
        }
        let mut path = String::new();
        let added = self.record(node, &value, &mut path);
        tracing::trace!(node, added, total = self.origins.len(), "registered response values");
        Ok(added)
    }

    /// Returns how many values were attributed to `node`.
    fn record(&mut self, node: &str, value: &Value, path: &mut String) -> usize {
        match value {
            Value::Object(map) => {
                let mut added = 0;
                for (key, child) in map {
                    let len = path.len();
                    push_key(path, key);
                    added += self.record(node, child, path);
                    path.truncate(len);
                }
                added
            }
            Value::Array(items) => {
                let mut added = 0;
                for (index, child) in items.iter().enumerate() {
                    let len = path.len();
                    path.push_str(&format!("[{}]", index));
                    added += self.record(node, child, path);
                    path.truncate(len);
                }
                added
            }
            Value::Null => 0,
            scalar => {
                let Some(key) = scalar_key(scalar) else {
                    return 0;
                };
                // First origin wins within a scope.
                if self.origins.get(&key).is_some_and(|o| o.scope == self.scope) {
                    return 0;
                }
                let origin = Origin {
                    reference: Reference {
                        node: node.to_string(),
                        path: path.clone(),
                    },
                    scope: self.scope,
                };
                self.origins.insert(key, origin);
                1
            }
        }
    }

    fn current(&self, key: &ScalarKey) -> Option<&Reference> {
        self.origins
            .get(key)
            .filter(|o| o.scope == self.scope)
            .map(|o| &o.reference)
    }

    /// Replace a JSON scalar with a template reference when the registry
    /// holds exactly that value.
    pub fn replace_scalar(&self, value: &Value) -> (Value, bool) {
        match self.origin_of_scalar(value) {
            Some(origin) => (Value::String(origin.template()), true),
            None => (value.clone(), false),
        }
    }

    fn origin_of_scalar(&self, value: &Value) -> Option<&Reference> {
        if !self.eligible(value) {
            return None;
        }
        scalar_key(value).and_then(|key| self.current(&key))
    }

    fn eligible(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => s.chars().count() >= self.min_token_length,
            Value::Bool(b) => b.to_string().len() >= self.min_token_length,
            Value::Number(_) => true,
            _ => false,
        }
    }

    /// Origin of a textual value taken from a header, query or URL. The text
    /// may stand for a recorded string or for a recorded number.
    fn origin_of_text(&self, text: &str) -> Option<&Reference> {
        if text.chars().count() < self.min_token_length {
            return None;
        }
        if let Some(origin) = self.current(&ScalarKey::String(text.to_string())) {
            return Some(origin);
        }
        let number = serde_json::from_str::<Number>(text).ok()?;
        if number.to_string() != text {
            return None;
        }
        self.current(&ScalarKey::Number(text.to_string()))
    }

    /// Rewrite every primitive leaf of a JSON document. Containers are rebuilt
    /// structurally; key order is preserved.
    pub fn template_json(&self, json: &[u8]) -> Result<Templated<Vec<u8>>, TemplateError> {
        let value: Value = serde_json::from_slice(json)?;
        let mut references = BTreeSet::new();
        let rewritten = self.rewrite(&value, &mut references);
        if references.is_empty() {
            return Ok(Templated::unchanged(json.to_vec()));
        }
        Ok(Templated {
            value: serde_json::to_vec(&rewritten)?,
            replaced: true,
            references,
        })
    }

    fn rewrite(&self, value: &Value, references: &mut BTreeSet<Reference>) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    out.insert(key.clone(), self.rewrite(child, references));
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.rewrite(v, references)).collect())
            }
            scalar => match self.origin_of_scalar(scalar) {
                Some(origin) => {
                    references.insert(origin.clone());
                    Value::String(origin.template())
                }
                None => scalar.clone(),
            },
        }
    }

    /// Template a header, query or form value. The whole value is matched
    /// first; failing that, the part after the first space is matched so
    /// `Bearer <token>` keeps its scheme prefix.
    pub fn template_string(&self, text: &str) -> Templated<String> {
        if let Some(origin) = self.origin_of_text(text) {
            return single(origin.template(), origin);
        }
        if let Some((prefix, suffix)) = text.split_once(' ') {
            if !prefix.is_empty() {
                if let Some(origin) = self.origin_of_text(suffix) {
                    return single(format!("{} {}", prefix, origin.template()), origin);
                }
            }
        }
        Templated::unchanged(text.to_string())
    }

    /// Template a URL. Besides the whole URL, every path segment and every
    /// query value is offered for exact matching.
    pub fn template_url(&self, url: &str) -> Templated<String> {
        let whole = self.template_string(url);
        if whole.replaced {
            return whole;
        }

        let (without_fragment, fragment) = split_keep(url, '#');
        let (before_query, query) = split_keep(without_fragment, '?');
        let path_start = before_query
            .find("://")
            .map(|scheme_end| {
                let rest = &before_query[scheme_end + 3..];
                scheme_end + 3 + rest.find('/').unwrap_or(rest.len())
            })
            .unwrap_or(0);
        let (origin_part, path) = before_query.split_at(path_start);

        let mut references = BTreeSet::new();
        let path = path
            .split('/')
            .map(|segment| self.template_piece(segment, &mut references))
            .collect::<Vec<_>>()
            .join("/");
        let query = query.map(|q| {
            q.split('&')
                .map(|pair| match pair.split_once('=') {
                    Some((name, value)) => {
                        format!("{}={}", name, self.template_piece(value, &mut references))
                    }
                    None => pair.to_string(),
                })
                .collect::<Vec<_>>()
                .join("&")
        });

        if references.is_empty() {
            return Templated::unchanged(url.to_string());
        }
        let mut out = format!("{}{}", origin_part, path);
        if let Some(query) = query {
            out.push('?');
            out.push_str(&query);
        }
        if let Some(fragment) = fragment {
            out.push('#');
            out.push_str(fragment);
        }
        Templated {
            value: out,
            replaced: true,
            references,
        }
    }

    fn template_piece(&self, piece: &str, references: &mut BTreeSet<Reference>) -> String {
        match self.origin_of_text(piece) {
            Some(origin) => {
                references.insert(origin.clone());
                origin.template()
            }
            None => piece.to_string(),
        }
    }
}

fn single(value: String, origin: &Reference) -> Templated<String> {
    Templated {
        value,
        replaced: true,
        references: BTreeSet::from([origin.clone()]),
    }
}

fn scalar_key(value: &Value) -> Option<ScalarKey> {
    match value {
        Value::String(s) => Some(ScalarKey::String(s.clone())),
        Value::Number(n) => Some(ScalarKey::Number(n.to_string())),
        Value::Bool(b) => Some(ScalarKey::Bool(*b)),
        _ => None,
    }
}

/// Append an object key: dot notation for plain identifiers, bracket-quoted
/// otherwise.
fn push_key(path: &mut String, key: &str) {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '$');
    if plain {
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(key);
    } else {
        let quoted = serde_json::to_string(key).unwrap_or_else(|_| format!("\"{}\"", key));
        path.push('[');
        path.push_str(&quoted);
        path.push(']');
    }
}

fn split_keep(text: &str, separator: char) -> (&str, Option<&str>) {
    match text.split_once(separator) {
        Some((head, tail)) => (head, Some(tail)),
        None => (text, None),
    }
}
