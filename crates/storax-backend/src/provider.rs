//! Document-tree provider contract and the directory-rooted default.
//!
//! A provider exposes only handle operations: open by URI, child lookup by
//! name, creation, deletion, rename, and sequential streams. There is no
//! seekable byte access, which is what distinguishes the handle backend from
//! the path backend.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use storax_core::{OpError, OpResult, HANDLE_SCHEME};

/// Metadata of a document-tree node, addressed by its URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocMeta {
    pub uri: String,
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    pub last_modified: Option<u64>,
}

/// The opaque storage behind the handle backend.
pub trait DocumentProvider: Send + Sync {
    /// URI of the tree root.
    fn root_uri(&self) -> String;

    /// Resolve a URI to its metadata.
    fn open(&self, uri: &str) -> OpResult<DocMeta>;

    /// Look up a direct child by name.
    fn child(&self, parent_uri: &str, name: &str) -> OpResult<Option<DocMeta>>;

    /// List direct children.
    fn children(&self, parent_uri: &str) -> OpResult<Vec<DocMeta>>;

    /// Create an empty file child (neutral MIME type).
    fn create_file(&self, parent_uri: &str, name: &str) -> OpResult<DocMeta>;

    /// Create a directory child.
    fn create_directory(&self, parent_uri: &str, name: &str) -> OpResult<DocMeta>;

    /// Delete a node; directories are removed with their subtree.
    fn delete(&self, uri: &str) -> OpResult<()>;

    /// Rename a node, returning the post-rename URI.
    fn rename(&self, uri: &str, new_name: &str) -> OpResult<String>;

    /// Move a node under a different parent, returning the post-move URI.
    fn relocate(&self, uri: &str, new_parent_uri: &str, new_name: &str) -> OpResult<String>;

    /// Sequential reader over a file's bytes.
    fn open_read(&self, uri: &str) -> OpResult<Box<dyn Read + Send>>;

    /// Sequential writer truncating the file.
    fn open_write(&self, uri: &str) -> OpResult<Box<dyn Write + Send>>;
}

/// Default provider mapping `doc://<authority>/...` onto a rooted local
/// directory. Only handle operations are exposed; the engines never see the
/// underlying paths.
pub struct DirTreeProvider {
    root: PathBuf,
    authority: String,
}

impl DirTreeProvider {
    pub fn new(root: impl Into<PathBuf>, authority: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            authority: authority.into(),
        }
    }

    fn prefix(&self) -> String {
        format!("{HANDLE_SCHEME}{}", self.authority)
    }

    fn to_path(&self, uri: &str) -> OpResult<PathBuf> {
        let prefix = self.prefix();
        let rest = uri.strip_prefix(&prefix).ok_or_else(|| OpError::NotFound {
            location: uri.to_string(),
        })?;
        let rest = rest.trim_start_matches('/');
        let mut path = self.root.clone();
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(OpError::InvalidName {
                    message: format!("Illegal segment in handle URI '{uri}'"),
                });
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn to_uri(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let mut uri = self.prefix();
        for segment in rel.components() {
            uri.push('/');
            uri.push_str(&segment.as_os_str().to_string_lossy());
        }
        uri
    }

    fn meta_at(&self, path: &Path, uri: String) -> OpResult<DocMeta> {
        let metadata = fs::metadata(path).map_err(|e| OpError::io(&uri, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.authority.clone());
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64);
        Ok(DocMeta {
            uri,
            name,
            is_directory: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            last_modified,
        })
    }
}

impl DocumentProvider for DirTreeProvider {
    fn root_uri(&self) -> String {
        self.prefix()
    }

    fn open(&self, uri: &str) -> OpResult<DocMeta> {
        let path = self.to_path(uri)?;
        self.meta_at(&path, uri.to_string())
    }

    fn child(&self, parent_uri: &str, name: &str) -> OpResult<Option<DocMeta>> {
        let path = self.to_path(parent_uri)?.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let uri = self.to_uri(&path);
        self.meta_at(&path, uri).map(Some)
    }

    fn children(&self, parent_uri: &str) -> OpResult<Vec<DocMeta>> {
        let dir = self.to_path(parent_uri)?;
        let entries = fs::read_dir(&dir).map_err(|e| OpError::io(parent_uri, e))?;

        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OpError::io(parent_uri, e))?;
            let path = entry.path();
            let uri = self.to_uri(&path);
            if let Ok(meta) = self.meta_at(&path, uri) {
                result.push(meta);
            }
        }
        Ok(result)
    }

    fn create_file(&self, parent_uri: &str, name: &str) -> OpResult<DocMeta> {
        let path = self.to_path(parent_uri)?.join(name);
        let uri = self.to_uri(&path);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| OpError::io(&uri, e))?;
        self.meta_at(&path, uri)
    }

    fn create_directory(&self, parent_uri: &str, name: &str) -> OpResult<DocMeta> {
        let path = self.to_path(parent_uri)?.join(name);
        let uri = self.to_uri(&path);
        fs::create_dir(&path).map_err(|e| OpError::io(&uri, e))?;
        self.meta_at(&path, uri)
    }

    fn delete(&self, uri: &str) -> OpResult<()> {
        let path = self.to_path(uri)?;
        let metadata = fs::symlink_metadata(&path).map_err(|e| OpError::io(uri, e))?;
        if metadata.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| OpError::io(uri, e))
        } else {
            fs::remove_file(&path).map_err(|e| OpError::io(uri, e))
        }
    }

    fn rename(&self, uri: &str, new_name: &str) -> OpResult<String> {
        let path = self.to_path(uri)?;
        let parent = path.parent().ok_or_else(|| OpError::InvalidName {
            message: format!("'{uri}' has no parent"),
        })?;
        let target = parent.join(new_name);
        fs::rename(&path, &target).map_err(|e| OpError::io(uri, e))?;
        Ok(self.to_uri(&target))
    }

    fn relocate(&self, uri: &str, new_parent_uri: &str, new_name: &str) -> OpResult<String> {
        let path = self.to_path(uri)?;
        let target = self.to_path(new_parent_uri)?.join(new_name);
        fs::rename(&path, &target).map_err(|e| OpError::io(uri, e))?;
        Ok(self.to_uri(&target))
    }

    fn open_read(&self, uri: &str) -> OpResult<Box<dyn Read + Send>> {
        let path = self.to_path(uri)?;
        let file = fs::File::open(&path).map_err(|e| OpError::io(uri, e))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, uri: &str) -> OpResult<Box<dyn Write + Send>> {
        let path = self.to_path(uri)?;
        let file = fs::File::create(&path).map_err(|e| OpError::io(uri, e))?;
        Ok(Box::new(file))
    }
}
