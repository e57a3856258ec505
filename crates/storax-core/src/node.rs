//! File and directory node records.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Type of node an operation creates, with its stable wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Directory,
}

impl NodeType {
    /// Map from the wire code (0 file, 1 directory).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::File),
            1 => Some(Self::Directory),
            _ => None,
        }
    }

    /// The stable wire code.
    pub fn code(&self) -> u8 {
        match self {
            Self::File => 0,
            Self::Directory => 1,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// A single entry as reported by listing or stat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Display name (final location segment).
    pub name: CompactString,
    /// Full location addressing this node in its backend.
    pub location: String,
    pub is_directory: bool,
    /// Byte size; directories are listed as zero.
    pub size: u64,
    /// Last modification time in epoch milliseconds, when known.
    pub last_modified: Option<u64>,
}

impl Node {
    /// Create a file node record.
    pub fn file(
        name: impl Into<CompactString>,
        location: impl Into<String>,
        size: u64,
        last_modified: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            is_directory: false,
            size,
            last_modified,
        }
    }

    /// Create a directory node record.
    pub fn directory(
        name: impl Into<CompactString>,
        location: impl Into<String>,
        last_modified: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            is_directory: true,
            size: 0,
            last_modified,
        }
    }

    pub fn node_type(&self) -> NodeType {
        if self.is_directory {
            NodeType::Directory
        } else {
            NodeType::File
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_codes() {
        assert_eq!(NodeType::from_code(0), Some(NodeType::File));
        assert_eq!(NodeType::from_code(1), Some(NodeType::Directory));
        assert_eq!(NodeType::from_code(2), None);
        assert_eq!(NodeType::File.code(), 0);
        assert_eq!(NodeType::Directory.code(), 1);
    }

    #[test]
    fn test_node_constructors() {
        let file = Node::file("a.txt", "/t/a.txt", 12, Some(1_000));
        assert!(!file.is_directory);
        assert_eq!(file.node_type(), NodeType::File);
        assert_eq!(file.size, 12);

        let dir = Node::directory("d", "/t/d", None);
        assert!(dir.is_directory);
        assert_eq!(dir.size, 0);
        assert_eq!(dir.node_type(), NodeType::Directory);
    }
}
