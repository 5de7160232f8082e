//! In-memory namespace: the directory tree plus the file map.
//!
//! `Namespace` is also the snapshot format, so whatever is serialized here is
//! exactly what a restarted namenode reloads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{BlockId, FileEntry};
use crate::error::{DfsError, Result};

/// A node of the directory tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectoryNode {
    Directory {
        children: BTreeMap<String, DirectoryNode>,
    },
    File {
        size: u64,
        blocks: Vec<BlockId>,
    },
}

impl DirectoryNode {
    pub fn empty_directory() -> Self {
        DirectoryNode::Directory {
            children: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            DirectoryNode::Directory { .. } => EntryKind::Directory,
            DirectoryNode::File { .. } => EntryKind::File,
        }
    }

    /// Renders the subtree the way `GET /ls` reports it: files as `"file"`,
    /// directories as nested objects.
    pub fn to_listing(&self) -> serde_json::Value {
        match self {
            DirectoryNode::File { .. } => serde_json::Value::String("file".to_string()),
            DirectoryNode::Directory { children } => serde_json::Value::Object(
                children
                    .iter()
                    .map(|(name, child)| (name.clone(), child.to_listing()))
                    .collect(),
            ),
        }
    }

    fn collect_files(&self, prefix: &str, out: &mut Vec<String>) {
        match self {
            DirectoryNode::File { .. } => out.push(prefix.to_string()),
            DirectoryNode::Directory { children } => {
                for (name, child) in children {
                    child.collect_files(&format!("{}/{}", prefix, name), out);
                }
            }
        }
    }
}

impl Default for DirectoryNode {
    fn default() -> Self {
        Self::empty_directory()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// One child returned by a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Namespace {
    pub files: BTreeMap<String, FileEntry>,
    pub directory_structure: DirectoryNode,
}

/// Splits a path into its non-empty segments. `.` segments are dropped and
/// `..` is rejected; relative navigation is resolved by the client.
pub fn path_segments(path: &str) -> Result<Vec<&str>> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(DfsError::InvalidPath {
                    path: path.to_string(),
                    reason: "parent references are not allowed".to_string(),
                });
            }
            other => segments.push(other),
        }
    }
    Ok(segments)
}

/// Canonical form of a path: a leading `/`, no trailing or repeated slashes.
pub fn normalize_path(path: &str) -> Result<String> {
    Ok(format!("/{}", path_segments(path)?.join("/")))
}

impl Namespace {
    pub fn contains_file(&self, path: &str) -> bool {
        normalize_path(path)
            .map(|p| self.files.contains_key(&p))
            .unwrap_or(false)
    }

    /// Whether anything (file or directory) lives at `path`.
    pub fn exists(&self, path: &str) -> Result<bool> {
        let segments = path_segments(path)?;
        Ok(self.node(&segments).is_some())
    }

    /// Registers a file and creates any missing parent directories.
    pub fn insert_file(&mut self, mut entry: FileEntry) -> Result<()> {
        let path = normalize_path(&entry.filename)?;
        let segments = path_segments(&path)?;
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(DfsError::InvalidPath {
                path,
                reason: "the root is a directory".to_string(),
            });
        };

        let children = self.ensure_chain(parents, &path)?;
        if children.contains_key(*leaf) {
            return Err(DfsError::AlreadyExists(path));
        }
        children.insert(
            leaf.to_string(),
            DirectoryNode::File {
                size: entry.size,
                blocks: entry.block_ids(),
            },
        );

        entry.filename = path.clone();
        self.files.insert(path, entry);
        Ok(())
    }

    /// Idempotently creates the directory chain for `path`.
    pub fn ensure_directory(&mut self, path: &str) -> Result<String> {
        let path = normalize_path(path)?;
        let segments = path_segments(&path)?;
        self.ensure_chain(&segments, &path)?;
        Ok(path)
    }

    /// Removes the directory at `path` and every file record below it.
    /// Returns the paths of the removed files.
    pub fn remove_directory(&mut self, path: &str) -> Result<Vec<String>> {
        let path = normalize_path(path)?;
        let segments = path_segments(&path)?;
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(DfsError::InvalidPath {
                path,
                reason: "the root cannot be removed".to_string(),
            });
        };

        let children = self
            .directory_children_mut(parents)
            .ok_or_else(|| DfsError::NotFound(path.clone()))?;
        if !matches!(children.get(*leaf), Some(DirectoryNode::Directory { .. })) {
            return Err(DfsError::NotFound(path));
        }

        let mut removed = Vec::new();
        if let Some(subtree) = children.remove(*leaf) {
            subtree.collect_files(&path, &mut removed);
        }
        for file in &removed {
            self.files.remove(file);
        }
        Ok(removed)
    }

    /// Removes one file record and its tree leaf.
    pub fn remove_file(&mut self, path: &str) -> Result<FileEntry> {
        let path = normalize_path(path)?;
        let entry = self
            .files
            .remove(&path)
            .ok_or_else(|| DfsError::NotFound(path.clone()))?;

        let segments = path_segments(&path)?;
        if let Some((leaf, parents)) = segments.split_last()
            && let Some(children) = self.directory_children_mut(parents)
            && matches!(children.get(*leaf), Some(DirectoryNode::File { .. }))
        {
            children.remove(*leaf);
        }
        Ok(entry)
    }

    pub fn lookup_file(&self, path: &str) -> Result<&FileEntry> {
        let path = normalize_path(path)?;
        self.files.get(&path).ok_or(DfsError::NotFound(path))
    }

    /// Resolves `path` to a directory node.
    pub fn directory(&self, path: &str) -> Result<&DirectoryNode> {
        let segments = path_segments(path)?;
        match self.node(&segments) {
            Some(node) if matches!(node, DirectoryNode::Directory { .. }) => Ok(node),
            _ => Err(DfsError::NotFound(normalize_path(path)?)),
        }
    }

    /// Immediate children of the directory at `path`, sorted by name.
    pub fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>> {
        match self.directory(path)? {
            DirectoryNode::Directory { children } => Ok(children
                .iter()
                .map(|(name, child)| DirEntry {
                    name: name.clone(),
                    kind: child.kind(),
                })
                .collect()),
            DirectoryNode::File { .. } => Err(DfsError::NotFound(normalize_path(path)?)),
        }
    }

    fn node(&self, segments: &[&str]) -> Option<&DirectoryNode> {
        let mut current = &self.directory_structure;
        for segment in segments {
            current = match current {
                DirectoryNode::Directory { children } => children.get(*segment)?,
                DirectoryNode::File { .. } => return None,
            };
        }
        Some(current)
    }

    fn directory_children_mut(
        &mut self,
        segments: &[&str],
    ) -> Option<&mut BTreeMap<String, DirectoryNode>> {
        let mut current = &mut self.directory_structure;
        for segment in segments {
            current = match current {
                DirectoryNode::Directory { children } => children.get_mut(*segment)?,
                DirectoryNode::File { .. } => return None,
            };
        }
        match current {
            DirectoryNode::Directory { children } => Some(children),
            DirectoryNode::File { .. } => None,
        }
    }

    fn ensure_chain(
        &mut self,
        segments: &[&str],
        full_path: &str,
    ) -> Result<&mut BTreeMap<String, DirectoryNode>> {
        let mut current = &mut self.directory_structure;
        for segment in segments {
            let children = match current {
                DirectoryNode::Directory { children } => children,
                DirectoryNode::File { .. } => return Err(not_a_directory(full_path)),
            };
            current = children
                .entry(segment.to_string())
                .or_insert_with(DirectoryNode::empty_directory);
        }
        match current {
            DirectoryNode::Directory { children } => Ok(children),
            DirectoryNode::File { .. } => Err(not_a_directory(full_path)),
        }
    }
}

fn not_a_directory(path: &str) -> DfsError {
    DfsError::InvalidPath {
        path: path.to_string(),
        reason: "a path segment is a file".to_string(),
    }
}
