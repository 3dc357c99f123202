//! File namespace: one folder per folder-path segment, base request files in
//! the leaf folder and each delta file nested under its base file.

use std::collections::HashMap;

use crate::classify::Classification;
use crate::id::{Id, IdSource};
use crate::model::{File, FileContent, Flow, Http};

/// Order of the flow file; sorts before every folder and request.
pub const FLOW_FILE_ORDER: i64 = -1;

pub struct NamespaceBuilder<'a> {
    workspace_id: Id,
    ids: &'a mut dyn IdSource,
    flow_file: Option<File>,
    folder_ids: HashMap<String, Id>,
    folders: HashMap<String, File>,
    /// Child folder paths per parent path ("" is the workspace root), in
    /// creation order.
    folder_children: HashMap<String, Vec<String>>,
    content: Vec<File>,
}

impl<'a> NamespaceBuilder<'a> {
    pub fn new(workspace_id: Id, ids: &'a mut dyn IdSource) -> Self {
        Self {
            workspace_id,
            ids,
            flow_file: None,
            folder_ids: HashMap::new(),
            folders: HashMap::new(),
            folder_children: HashMap::new(),
            content: Vec::new(),
        }
    }

    pub fn add_flow(&mut self, flow: &Flow, updated_at: i64) {
        self.flow_file = Some(File {
            id: self.ids.next_id(),
            workspace_id: self.workspace_id,
            parent_id: None,
            content: FileContent::Flow(flow.id),
            name: flow.name.clone(),
            order: FLOW_FILE_ORDER,
            updated_at,
        });
    }

    /// Place a base/delta pair. Returns the ids of the base and delta files.
    pub fn add_request(
        &mut self,
        classification: &Classification,
        base: &Http,
        delta: &Http,
    ) -> (Id, Id) {
        let folder_id = self.ensure_folders(&classification.folder_segments, base.created_at);

        let base_file = File {
            id: self.ids.next_id(),
            workspace_id: self.workspace_id,
            parent_id: folder_id,
            content: FileContent::Http(base.id),
            name: classification.file_name(),
            order: base.created_at,
            updated_at: base.updated_at,
        };
        let delta_file = File {
            id: self.ids.next_id(),
            workspace_id: self.workspace_id,
            parent_id: Some(base_file.id),
            content: FileContent::HttpDelta(delta.id),
            name: format!("{} (Delta)", base_file.name),
            order: base_file.order + 1,
            updated_at: delta.updated_at,
        };
        let ids = (base_file.id, delta_file.id);
        self.content.push(base_file);
        self.content.push(delta_file);
        ids
    }

    /// Create missing folders along `segments`; returns the leaf folder id.
    fn ensure_folders(&mut self, segments: &[String], updated_at: i64) -> Option<Id> {
        let mut parent_path = String::new();
        let mut parent_id = None;
        for segment in segments {
            let path = format!("{}/{}", parent_path, segment);
            let id = match self.folder_ids.get(&path) {
                Some(&id) => id,
                None => {
                    let id = self.ids.next_id();
                    self.folders.insert(
                        path.clone(),
                        File {
                            id,
                            workspace_id: self.workspace_id,
                            parent_id,
                            content: FileContent::Folder,
                            name: segment.clone(),
                            order: 0,
                            updated_at,
                        },
                    );
                    self.folder_ids.insert(path.clone(), id);
                    self.folder_children
                        .entry(parent_path.clone())
                        .or_default()
                        .push(path.clone());
                    id
                }
            };
            parent_id = Some(id);
            parent_path = path;
        }
        parent_id
    }

    pub fn folder_id(&self, path: &str) -> Option<Id> {
        self.folder_ids.get(path).copied()
    }

    /// Flow file first, folders depth-first, then content files in the order
    /// they were added.
    pub fn finish(mut self) -> Vec<File> {
        let mut files = Vec::with_capacity(1 + self.folders.len() + self.content.len());
        files.extend(self.flow_file.take());

        let mut stack: Vec<String> = self
            .folder_children
            .get("")
            .map(|roots| roots.iter().rev().cloned().collect())
            .unwrap_or_default();
        while let Some(path) = stack.pop() {
            if let Some(children) = self.folder_children.get(&path) {
                stack.extend(children.iter().rev().cloned());
            }
            if let Some(folder) = self.folders.remove(&path) {
                files.push(folder);
            }
        }

        files.extend(self.content);
        files
    }
}
