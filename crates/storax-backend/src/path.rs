//! Filesystem backend.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tracing::debug;
use walkdir::WalkDir;

use storax_core::{
    join_location, resolve_name, BackendKind, ConflictPolicy, Node, NodeType, OpError, OpResult,
};

use crate::media::{is_media_name, MediaNotifier, NoopMediaNotifier};
use crate::{Backend, CreateOutcome, Sink};

/// Backend operating directly on filesystem paths.
pub struct PathBackend {
    trash_dir: PathBuf,
    media: Arc<dyn MediaNotifier>,
}

impl PathBackend {
    /// Create a path backend whose parked-object area lives at `trash_dir`.
    pub fn new(trash_dir: impl Into<PathBuf>) -> Self {
        Self {
            trash_dir: trash_dir.into(),
            media: Arc::new(NoopMediaNotifier),
        }
    }

    /// Replace the media-index notifier.
    pub fn with_media_notifier(mut self, media: Arc<dyn MediaNotifier>) -> Self {
        self.media = media;
        self
    }

    fn notify_media(&self, location: &str) {
        if is_media_name(location) {
            debug!(location, "media index notification");
            self.media.notify(location);
        }
    }

    fn node_from_metadata(path: &Path, metadata: &fs::Metadata) -> Node {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let location = path.to_string_lossy().into_owned();
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64);
        if metadata.is_dir() {
            Node::directory(name, location, last_modified)
        } else {
            Node::file(name, location, metadata.len(), last_modified)
        }
    }

    fn remove_node(path: &Path) -> OpResult<()> {
        let metadata =
            fs::symlink_metadata(path).map_err(|e| OpError::io(path.to_string_lossy(), e))?;
        if metadata.is_dir() {
            fs::remove_dir_all(path).map_err(|e| OpError::io(path.to_string_lossy(), e))
        } else {
            fs::remove_file(path).map_err(|e| OpError::io(path.to_string_lossy(), e))
        }
    }
}

impl Backend for PathBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Path
    }

    fn exists(&self, location: &str) -> bool {
        Path::new(location).exists()
    }

    fn stat(&self, location: &str) -> OpResult<Node> {
        let path = Path::new(location);
        let metadata = fs::metadata(path).map_err(|e| OpError::io(location, e))?;
        Ok(Self::node_from_metadata(path, &metadata))
    }

    fn list(&self, location: &str) -> OpResult<Vec<Node>> {
        let dir = Path::new(location);
        let entries = fs::read_dir(dir).map_err(|e| OpError::io(location, e))?;

        let mut nodes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OpError::io(location, e))?;
            if let Ok(metadata) = entry.metadata() {
                nodes.push(Self::node_from_metadata(&entry.path(), &metadata));
            }
        }
        nodes.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(nodes)
    }

    fn create(
        &self,
        parent: &str,
        name: &str,
        node_type: NodeType,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<CreateOutcome> {
        let parent_path = Path::new(parent);
        if !parent_path.is_dir() {
            return Err(OpError::NotFound {
                location: parent.to_string(),
            });
        }

        let final_name = resolve_name(|n| parent_path.join(n).exists(), name, policy, manual)
            .ok_or_else(|| OpError::ConflictDeclined {
                name: name.to_string(),
            })?;
        let target = parent_path.join(&final_name);

        // Replace keeps the resolved name; clear whatever holds it first.
        if target.exists() {
            Self::remove_node(&target)?;
        }

        match node_type {
            NodeType::File => {
                OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&target)
                    .map_err(|e| OpError::io(target.to_string_lossy(), e))?;
            }
            NodeType::Directory => {
                fs::create_dir(&target).map_err(|e| OpError::io(target.to_string_lossy(), e))?;
            }
        }

        let location = target.to_string_lossy().into_owned();
        self.notify_media(&location);
        Ok(CreateOutcome {
            final_name,
            location,
        })
    }

    fn delete(&self, location: &str) -> OpResult<()> {
        Self::remove_node(Path::new(location))?;
        self.notify_media(location);
        Ok(())
    }

    fn rename(
        &self,
        source: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String> {
        let source_path = Path::new(source);
        if !source_path.exists() {
            return Err(OpError::NotFound {
                location: source.to_string(),
            });
        }
        let parent = source_path.parent().ok_or_else(|| OpError::InvalidName {
            message: format!("'{source}' has no parent"),
        })?;

        let current_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let final_name = resolve_name(
            |n| n != current_name && parent.join(n).exists(),
            new_name,
            policy,
            manual,
        )
        .ok_or_else(|| OpError::ConflictDeclined {
            name: new_name.to_string(),
        })?;

        // Never rename in place.
        if final_name == current_name {
            return Ok(source.to_string());
        }

        let target = parent.join(&final_name);
        if target.exists() {
            Self::remove_node(&target)?;
        }
        fs::rename(source_path, &target).map_err(|e| OpError::io(source, e))?;

        let location = target.to_string_lossy().into_owned();
        self.notify_media(source);
        self.notify_media(&location);
        Ok(location)
    }

    fn relocate(
        &self,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String> {
        let source_path = Path::new(source);
        if !source_path.exists() {
            return Err(OpError::NotFound {
                location: source.to_string(),
            });
        }
        let dest_dir = Path::new(dest_parent);
        if !dest_dir.is_dir() {
            return Err(OpError::NotFound {
                location: dest_parent.to_string(),
            });
        }

        let final_name = resolve_name(
            |n| {
                let candidate = dest_dir.join(n);
                candidate.exists() && candidate != source_path
            },
            new_name,
            policy,
            manual,
        )
        .ok_or_else(|| OpError::ConflictDeclined {
            name: new_name.to_string(),
        })?;

        let target = dest_dir.join(&final_name);
        if target == source_path {
            return Ok(source.to_string());
        }
        if target.exists() {
            Self::remove_node(&target)?;
        }
        fs::rename(source_path, &target).map_err(|e| OpError::io(source, e))?;

        let location = target.to_string_lossy().into_owned();
        self.notify_media(source);
        self.notify_media(&location);
        Ok(location)
    }

    fn trash_area(&self) -> OpResult<String> {
        fs::create_dir_all(&self.trash_dir)
            .map_err(|e| OpError::io(self.trash_dir.to_string_lossy(), e))?;
        Ok(self.trash_dir.to_string_lossy().into_owned())
    }

    fn size_of(&self, location: &str) -> OpResult<u64> {
        let path = Path::new(location);
        let metadata = fs::metadata(path).map_err(|e| OpError::io(location, e))?;
        if !metadata.is_dir() {
            return Ok(metadata.len());
        }

        let mut total = 0u64;
        for entry in WalkDir::new(path).into_iter().flatten() {
            if entry.file_type().is_file() {
                if let Ok(metadata) = entry.metadata() {
                    total += metadata.len();
                }
            }
        }
        Ok(total)
    }

    fn open_source(&self, location: &str) -> OpResult<Box<dyn Read + Send>> {
        let file = fs::File::open(location).map_err(|e| OpError::io(location, e))?;
        Ok(Box::new(file))
    }

    fn create_sink(&self, parent: &str, name: &str) -> OpResult<Sink> {
        let target = Path::new(parent).join(name);
        let file = fs::File::create(&target).map_err(|e| OpError::io(target.to_string_lossy(), e))?;
        Ok(Sink {
            location: join_location(parent, name),
            writer: Box::new(SinkWriter { file }),
        })
    }
}

/// Writer that fsyncs the destination when the stream finishes cleanly.
struct SinkWriter {
    file: fs::File,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend(dir: &TempDir) -> PathBackend {
        PathBackend::new(dir.path().join(".storax_trash"))
    }

    #[test]
    fn test_create_file_and_stat() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let parent = dir.path().to_string_lossy().into_owned();

        let outcome = backend
            .create(&parent, "a.txt", NodeType::File, ConflictPolicy::Fail, None)
            .unwrap();
        assert_eq!(outcome.final_name, "a.txt");
        assert!(backend.exists(&outcome.location));

        let node = backend.stat(&outcome.location).unwrap();
        assert!(!node.is_directory);
        assert_eq!(node.size, 0);
    }

    #[test]
    fn test_create_conflict_rename_new() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let parent = dir.path().to_string_lossy().into_owned();

        fs::write(dir.path().join("a.txt"), b"old").unwrap();
        let outcome = backend
            .create(
                &parent,
                "a.txt",
                NodeType::File,
                ConflictPolicy::RenameNew,
                None,
            )
            .unwrap();
        assert_eq!(outcome.final_name, "a.txt (1)");
        assert!(dir.path().join("a.txt (1)").exists());
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"old");
    }

    #[test]
    fn test_create_fail_on_existing() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let parent = dir.path().to_string_lossy().into_owned();

        fs::write(dir.path().join("a.txt"), b"old").unwrap();
        let err = backend
            .create(&parent, "a.txt", NodeType::File, ConflictPolicy::Fail, None)
            .unwrap_err();
        assert!(matches!(err, OpError::ConflictDeclined { .. }));
    }

    #[test]
    fn test_rename_basic() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let source = dir.path().join("x.txt");
        fs::write(&source, b"data").unwrap();

        let renamed = backend
            .rename(
                &source.to_string_lossy(),
                "y.txt",
                ConflictPolicy::Fail,
                None,
            )
            .unwrap();
        assert!(renamed.ends_with("y.txt"));
        assert!(!source.exists());
        assert_eq!(fs::read(dir.path().join("y.txt")).unwrap(), b"data");
    }

    #[test]
    fn test_rename_to_same_name_is_noop() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let source = dir.path().join("x.txt");
        fs::write(&source, b"data").unwrap();

        let renamed = backend
            .rename(
                &source.to_string_lossy(),
                "x.txt",
                ConflictPolicy::Replace,
                None,
            )
            .unwrap();
        assert_eq!(renamed, source.to_string_lossy());
        assert!(source.exists());
    }

    #[test]
    fn test_rename_replace_overwrites() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        fs::write(dir.path().join("x.txt"), b"new").unwrap();
        fs::write(dir.path().join("y.txt"), b"old").unwrap();

        backend
            .rename(
                &dir.path().join("x.txt").to_string_lossy(),
                "y.txt",
                ConflictPolicy::Replace,
                None,
            )
            .unwrap();
        assert_eq!(fs::read(dir.path().join("y.txt")).unwrap(), b"new");
        assert!(!dir.path().join("x.txt").exists());
    }

    #[test]
    fn test_delete_directory_recursive() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let sub = dir.path().join("sub");
        fs::create_dir_all(sub.join("nested")).unwrap();
        fs::write(sub.join("nested/file.txt"), b"x").unwrap();

        backend.delete(&sub.to_string_lossy()).unwrap();
        assert!(!sub.exists());
    }

    #[test]
    fn test_list_orders_directories_first() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        fs::write(dir.path().join("b.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("a_dir")).unwrap();
        fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let nodes = backend.list(&dir.path().to_string_lossy()).unwrap();
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a_dir", "a.txt", "b.txt"]);
        assert!(nodes[0].is_directory);
        assert_eq!(nodes[0].size, 0);
    }

    #[test]
    fn test_size_of_directory_recursive() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let sub = dir.path().join("sub");
        fs::create_dir_all(sub.join("inner")).unwrap();
        fs::write(sub.join("a.bin"), vec![0u8; 100]).unwrap();
        fs::write(sub.join("inner/b.bin"), vec![0u8; 50]).unwrap();

        assert_eq!(backend.size_of(&sub.to_string_lossy()).unwrap(), 150);
    }

    #[test]
    fn test_sink_round_trip() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let parent = dir.path().to_string_lossy().into_owned();

        let mut sink = backend.create_sink(&parent, "out.bin").unwrap();
        sink.writer.write_all(b"payload").unwrap();
        sink.writer.flush().unwrap();
        drop(sink);

        let mut reader = backend
            .open_source(&dir.path().join("out.bin").to_string_lossy())
            .unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"payload");
    }
}
