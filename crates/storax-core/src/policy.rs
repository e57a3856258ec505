//! Conflict policies for target-name negotiation.

use serde::{Deserialize, Serialize};

/// Caller-chosen strategy when a target name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Decline the operation.
    #[default]
    Fail,
    /// Keep the requested name and overwrite the existing node.
    Replace,
    /// Append ` (k)` for the smallest free k.
    RenameNew,
    /// Use the caller-supplied manual name.
    RenameManual,
}

impl ConflictPolicy {
    /// Map from the wire code (0 fail, 1 replace, 2 rename-new, 3 manual).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Fail),
            1 => Some(Self::Replace),
            2 => Some(Self::RenameNew),
            3 => Some(Self::RenameManual),
            _ => None,
        }
    }

    /// The stable wire code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Fail => 0,
            Self::Replace => 1,
            Self::RenameNew => 2,
            Self::RenameManual => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_codes_round_trip() {
        for code in 0..4u8 {
            let policy = ConflictPolicy::from_code(code).unwrap();
            assert_eq!(policy.code(), code);
        }
        assert_eq!(ConflictPolicy::from_code(4), None);
    }
}
