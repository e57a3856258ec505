//! Handle backend over an opaque document tree.

use std::io::Read;
use std::sync::Arc;

use tracing::warn;

use storax_core::{resolve_name, BackendKind, ConflictPolicy, Node, NodeType, OpError, OpResult};

use crate::provider::{DocMeta, DocumentProvider};
use crate::{Backend, CreateOutcome, Sink};

/// Backend operating on `doc://` handle URIs through a [`DocumentProvider`].
pub struct HandleBackend {
    provider: Arc<dyn DocumentProvider>,
}

impl HandleBackend {
    pub fn new(provider: Arc<dyn DocumentProvider>) -> Self {
        Self { provider }
    }

    fn node_from_meta(meta: DocMeta) -> Node {
        if meta.is_directory {
            Node::directory(meta.name, meta.uri, meta.last_modified)
        } else {
            Node::file(meta.name, meta.uri, meta.size, meta.last_modified)
        }
    }

    fn child_exists(&self, parent: &str, name: &str) -> bool {
        matches!(self.provider.child(parent, name), Ok(Some(_)))
    }

    fn sum_sizes(&self, uri: &str) -> OpResult<u64> {
        let meta = self.provider.open(uri)?;
        if !meta.is_directory {
            return Ok(meta.size);
        }
        let mut total = 0u64;
        let mut stack = vec![meta.uri];
        while let Some(dir) = stack.pop() {
            for child in self.provider.children(&dir)? {
                if child.is_directory {
                    stack.push(child.uri);
                } else {
                    total += child.size;
                }
            }
        }
        Ok(total)
    }
}

impl Backend for HandleBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Handle
    }

    fn exists(&self, location: &str) -> bool {
        self.provider.open(location).is_ok()
    }

    fn stat(&self, location: &str) -> OpResult<Node> {
        self.provider.open(location).map(Self::node_from_meta)
    }

    fn list(&self, location: &str) -> OpResult<Vec<Node>> {
        let mut nodes: Vec<Node> = self
            .provider
            .children(location)?
            .into_iter()
            .map(Self::node_from_meta)
            .collect();
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
        let parent_meta = self.provider.open(parent)?;
        if !parent_meta.is_directory {
            return Err(OpError::NotFound {
                location: parent.to_string(),
            });
        }

        let final_name = resolve_name(|n| self.child_exists(parent, n), name, policy, manual)
            .ok_or_else(|| OpError::ConflictDeclined {
                name: name.to_string(),
            })?;

        if let Some(existing) = self.provider.child(parent, &final_name)? {
            self.provider.delete(&existing.uri)?;
        }

        let meta = match node_type {
            NodeType::File => self.provider.create_file(parent, &final_name)?,
            NodeType::Directory => self.provider.create_directory(parent, &final_name)?,
        };

        Ok(CreateOutcome {
            final_name,
            location: meta.uri,
        })
    }

    fn delete(&self, location: &str) -> OpResult<()> {
        self.provider.delete(location)
    }

    fn rename(
        &self,
        source: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String> {
        let meta = self.provider.open(source)?;
        let parent = storax_core::parent_of(source).ok_or_else(|| OpError::InvalidName {
            message: format!("'{source}' has no parent"),
        })?;

        let final_name = resolve_name(
            |n| n != meta.name && self.child_exists(&parent, n),
            new_name,
            policy,
            manual,
        )
        .ok_or_else(|| OpError::ConflictDeclined {
            name: new_name.to_string(),
        })?;

        if final_name == meta.name {
            return Ok(source.to_string());
        }

        if let Some(existing) = self.provider.child(&parent, &final_name)? {
            self.provider.delete(&existing.uri)?;
        }

        let new_uri = self.provider.rename(source, &final_name)?;

        // The provider hands back a fresh URI; re-resolve it and verify the
        // tree really carries the requested name before reporting success.
        let renamed = self.provider.open(&new_uri)?;
        if renamed.name != final_name {
            warn!(uri = %new_uri, expected = %final_name, actual = %renamed.name, "post-rename verification failed");
            return Err(OpError::Io {
                location: new_uri,
                source: std::io::Error::other("post-rename name verification failed"),
            });
        }
        Ok(new_uri)
    }

    fn relocate(
        &self,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> OpResult<String> {
        let meta = self.provider.open(source)?;
        let dest_meta = self.provider.open(dest_parent)?;
        if !dest_meta.is_directory {
            return Err(OpError::NotFound {
                location: dest_parent.to_string(),
            });
        }

        let final_name = resolve_name(
            |n| match self.provider.child(dest_parent, n) {
                Ok(Some(child)) => child.uri != meta.uri,
                _ => false,
            },
            new_name,
            policy,
            manual,
        )
        .ok_or_else(|| OpError::ConflictDeclined {
            name: new_name.to_string(),
        })?;

        if let Some(existing) = self.provider.child(dest_parent, &final_name)? {
            if existing.uri == meta.uri {
                return Ok(source.to_string());
            }
            self.provider.delete(&existing.uri)?;
        }

        self.provider.relocate(source, dest_parent, &final_name)
    }

    fn trash_area(&self) -> OpResult<String> {
        let root = self.provider.root_uri();
        if let Some(existing) = self.provider.child(&root, ".storax_trash")? {
            return Ok(existing.uri);
        }
        let created = self.provider.create_directory(&root, ".storax_trash")?;
        Ok(created.uri)
    }

    fn size_of(&self, location: &str) -> OpResult<u64> {
        self.sum_sizes(location)
    }

    fn open_source(&self, location: &str) -> OpResult<Box<dyn Read + Send>> {
        let meta = self.provider.open(location)?;
        if meta.is_directory {
            return Err(OpError::BackendUnsupported {
                message: format!("'{location}' is a directory, not a readable document"),
            });
        }
        self.provider.open_read(location)
    }

    fn create_sink(&self, parent: &str, name: &str) -> OpResult<Sink> {
        let meta = match self.provider.child(parent, name)? {
            Some(existing) => existing,
            None => self.provider.create_file(parent, name)?,
        };
        let writer = self.provider.open_write(&meta.uri)?;
        Ok(Sink {
            location: meta.uri,
            writer,
        })
    }
}
