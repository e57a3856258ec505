//! Policy-driven target-name negotiation.
//!
//! The resolver is pure: the caller supplies the existence predicate, so the
//! same rules apply to filesystem paths and opaque handle trees alike.

use crate::policy::ConflictPolicy;

/// Resolve the final name for a target, or `None` when the policy declines.
///
/// A base name that does not exist is returned unchanged regardless of
/// policy. Under `RenameNew` the suffix counts on the whole name, so
/// `"a.txt"` becomes `"a.txt (1)"`.
pub fn resolve_name(
    exists: impl Fn(&str) -> bool,
    base: &str,
    policy: ConflictPolicy,
    manual: Option<&str>,
) -> Option<String> {
    if !exists(base) {
        return Some(base.to_string());
    }

    match policy {
        ConflictPolicy::Fail => None,
        ConflictPolicy::Replace => Some(base.to_string()),
        ConflictPolicy::RenameNew => {
            for k in 1u32.. {
                let candidate = format!("{base} ({k})");
                if !exists(&candidate) {
                    return Some(candidate);
                }
            }
            unreachable!("u32 suffix space exhausted")
        }
        ConflictPolicy::RenameManual => match manual {
            Some(name) if !name.is_empty() => Some(name.to_string()),
            _ => None,
        },
    }
}
