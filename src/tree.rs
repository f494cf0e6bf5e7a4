use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indextree::{Arena, NodeId};

use crate::error::{BrowserError, Result};
use crate::key;
use crate::record::{Entry, FileEntry, FileRecord, FolderEntry};

/// A slot in the arena: a folder being assembled or a placed file.
#[derive(Debug, Clone)]
enum TreeNode {
    Folder(FolderSlot),
    File(FileEntry),
}

/// Folder metadata collected while records are inserted.
#[derive(Debug, Clone, Default)]
struct FolderSlot {
    /// Folder path relative to the root prefix, with trailing slash.
    relative_key: String,
    new_key: Option<String>,
    name: Option<String>,
    modified: Option<DateTime<Utc>>,
    draft: bool,
}

/// Hierarchical folder tree assembled from flat keyed records in an arena.
///
/// Folder slots are created fresh for every distinct path prefix and never
/// alias the caller's records.
pub struct FolderTree {
    arena: Arena<TreeNode>,
    root: NodeId,
    root_prefix: String,
    key_to_node: HashMap<String, NodeId>,
}

impl FolderTree {
    /// Create an empty tree whose keys are taken relative to `root_prefix`.
    pub fn new(root_prefix: &str) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(TreeNode::Folder(FolderSlot::default()));

        Self {
            arena,
            root,
            root_prefix: root_prefix.to_string(),
            key_to_node: HashMap::new(),
        }
    }

    /// Place one record, creating every intermediate folder on its path.
    pub fn insert(&mut self, record: &FileRecord) -> Result<()> {
        let full_key = record.effective_key();
        let relative = full_key
            .strip_prefix(self.root_prefix.as_str())
            .ok_or_else(|| BrowserError::RootNotPrefix {
                key: full_key.to_string(),
                root: self.root_prefix.clone(),
            })?;

        let parts: Vec<&str> = key::segments(relative).collect();
        let last = parts.len() - 1;
        let mut current = self.root;
        let mut prefix = String::new();

        for (index, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }

            if index == last && !record.is_folder() {
                let entry = FileEntry::from_record(record, relative.to_string());
                let node_id = self.arena.new_node(TreeNode::File(entry));
                current.append(node_id, &mut self.arena);
            } else {
                prefix.push_str(part);
                prefix.push('/');
                current = self.folder_node(current, &prefix);
            }
        }

        // An explicit folder record keeps its metadata in the derived position.
        if record.is_folder() && current != self.root {
            if let Some(TreeNode::Folder(slot)) = self.arena.get_mut(current).map(|n| n.get_mut()) {
                slot.new_key = record.new_key.clone();
                slot.name = record.name.clone();
                slot.modified = record.modified;
                slot.draft = record.draft;
            }
        }

        Ok(())
    }

    fn folder_node(&mut self, parent: NodeId, relative_key: &str) -> NodeId {
        if let Some(&node_id) = self.key_to_node.get(relative_key) {
            return node_id;
        }

        let node_id = self.arena.new_node(TreeNode::Folder(FolderSlot {
            relative_key: relative_key.to_string(),
            ..Default::default()
        }));
        parent.append(node_id, &mut self.arena);
        self.key_to_node.insert(relative_key.to_string(), node_id);
        node_id
    }

    pub fn folder_count(&self) -> usize {
        self.key_to_node.len()
    }

    /// Convert into top-level entries, folders first, each folder owning its
    /// children.
    pub fn into_entries(self) -> Vec<Entry> {
        self.collect(self.root)
    }

    fn collect(&self, node_id: NodeId) -> Vec<Entry> {
        let mut folders = Vec::new();
        let mut files = Vec::new();

        for child in node_id.children(&self.arena) {
            let Some(node) = self.arena.get(child) else {
                continue;
            };
            match node.get() {
                TreeNode::Folder(slot) => folders.push(Entry::Folder(FolderEntry {
                    key: format!("{}{}", self.root_prefix, slot.relative_key),
                    new_key: slot.new_key.clone(),
                    relative_key: slot.relative_key.clone(),
                    name: slot.name.clone(),
                    modified: slot.modified,
                    draft: slot.draft,
                    key_derived: true,
                    children: self.collect(child),
                })),
                TreeNode::File(file) => files.push(Entry::File(file.clone())),
            }
        }

        folders.extend(files);
        folders
    }
}

/// Build the folder hierarchy for `files`, with keys relative to `root`.
pub fn group_by_folder(files: &[FileRecord], root: &str) -> Result<Vec<Entry>> {
    let mut tree = FolderTree::new(root);
    for record in files {
        tree.insert(record)?;
    }
    tracing::trace!(folders = tree.folder_count(), files = files.len(), "grouped by folder");
    Ok(tree.into_entries())
}
