//! Output records of a translation.
//!
//! Every record lives in a flat list owned by [`crate::translate::TranslationResult`].
//! Relations are typed optional ids, never references: a delta child points at
//! its base child by id and is resolved by lookup.

use serde::{Deserialize, Serialize};

use crate::id::Id;

// =============================================================================
// HTTP REQUESTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyKind {
    None,
    FormData,
    UrlEncoded,
    Raw,
}

impl BodyKind {
    /// Classify a `postData.mimeType`. `None` means the entry had no postData.
    pub fn from_mime_type(mime_type: Option<&str>) -> Self {
        let Some(mime) = mime_type else {
            return BodyKind::None;
        };
        let mime = mime.to_ascii_lowercase();
        if mime.contains("multipart/form-data") {
            BodyKind::FormData
        } else if mime.contains("application/x-www-form-urlencoded") {
            BodyKind::UrlEncoded
        } else {
            BodyKind::Raw
        }
    }
}

/// Workspace-scoped request descriptor. A delta overlays its parent: each
/// `delta_*` field is `Some` only where the overlay differs from the base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Http {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub url: String,
    pub method: String,
    pub description: String,
    pub body_kind: BodyKind,
    pub is_delta: bool,
    pub parent_http_id: Option<Id>,
    pub delta_name: Option<String>,
    pub delta_url: Option<String>,
    pub delta_method: Option<String>,
    pub delta_description: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Http {
    pub fn has_overrides(&self) -> bool {
        self.delta_name.is_some()
            || self.delta_url.is_some()
            || self.delta_method.is_some()
            || self.delta_description.is_some()
    }
}

// =============================================================================
// HTTP CHILD RECORDS
// =============================================================================

/// Shared shape of headers, search params, form fields and url-encoded fields.
/// `parent_id` names the base record of the same table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueRecord {
    pub id: Id,
    pub http_id: Id,
    pub key: String,
    pub value: String,
    pub description: String,
    pub enabled: bool,
    pub is_delta: bool,
    pub parent_id: Option<Id>,
    pub delta_key: Option<String>,
    pub delta_value: Option<String>,
    pub delta_description: Option<String>,
    pub delta_enabled: Option<bool>,
}

pub type HttpHeader = KeyValueRecord;
pub type HttpSearchParam = KeyValueRecord;
pub type HttpBodyForm = KeyValueRecord;
pub type HttpBodyUrlEncoded = KeyValueRecord;

impl KeyValueRecord {
    pub fn base(id: Id, http_id: Id, key: &str, value: &str) -> Self {
        KeyValueRecord {
            id,
            http_id,
            key: key.to_string(),
            value: value.to_string(),
            description: String::new(),
            enabled: true,
            is_delta: false,
            parent_id: None,
            delta_key: None,
            delta_value: None,
            delta_description: None,
            delta_enabled: None,
        }
    }

    /// Override of `base` on the delta request `http_id` carrying a new value.
    pub fn delta_of(base: &KeyValueRecord, id: Id, http_id: Id, value: String) -> Self {
        KeyValueRecord {
            id,
            http_id,
            key: base.key.clone(),
            value: base.value.clone(),
            description: base.description.clone(),
            enabled: true,
            is_delta: true,
            parent_id: Some(base.id),
            delta_key: None,
            delta_value: Some(value),
            delta_description: None,
            delta_enabled: None,
        }
    }

    pub fn has_overrides(&self) -> bool {
        self.delta_key.is_some()
            || self.delta_value.is_some()
            || self.delta_description.is_some()
            || self.delta_enabled.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompressionKind {
    #[default]
    None,
    /// Set by the storage layer when it compresses large bodies.
    Zstd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpBodyRaw {
    pub id: Id,
    pub http_id: Id,
    pub raw_data: Vec<u8>,
    pub content_type: String,
    pub compression: CompressionKind,
    pub is_delta: bool,
    pub parent_body_raw_id: Option<Id>,
    pub delta_raw_data: Option<Vec<u8>>,
    pub delta_content_type: Option<String>,
    pub delta_compression: Option<CompressionKind>,
}

// =============================================================================
// FILE NAMESPACE
// =============================================================================

/// What a file entry stands for. Folders carry no content id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "contentId", rename_all = "camelCase")]
pub enum FileContent {
    Folder,
    Http(Id),
    HttpDelta(Id),
    Flow(Id),
}

impl FileContent {
    pub fn content_id(&self) -> Option<Id> {
        match self {
            FileContent::Folder => None,
            FileContent::Http(id) | FileContent::HttpDelta(id) | FileContent::Flow(id) => {
                Some(*id)
            }
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FileContent::Folder)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: Id,
    pub workspace_id: Id,
    pub parent_id: Option<Id>,
    pub content: FileContent,
    pub name: String,
    /// Sort key within the parent; ties are broken by `id`.
    pub order: i64,
    pub updated_at: i64,
}

// =============================================================================
// FLOW GRAPH
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    /// Recorded wall-clock span of the archive in milliseconds.
    pub duration: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Start,
    Request,
    Condition,
    For,
    Foreach,
    Js,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: Id,
    pub flow_id: Id,
    pub name: String,
    pub kind: NodeKind,
    pub position_x: f64,
    pub position_y: f64,
}

/// Binds a request node to its base and delta requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestNode {
    pub flow_node_id: Id,
    pub http_id: Id,
    pub delta_http_id: Id,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeHandle {
    #[default]
    Unspecified,
    Then,
    Else,
    Loop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: Id,
    pub flow_id: Id,
    pub source_id: Id,
    pub target_id: Id,
    pub handle: EdgeHandle,
}
