//! Boundary-aware key matching shared by override lookup and invalidation.
//!
//! A record key `svc.op` roots the family `svc.op`, `svc.op.x`, `svc.op_x`, but
//! never `svc.operation`: the character right after the record key must be a
//! separator (`.` or `_`), or the candidate must end there.

use crate::constants::PREFIX_SEPARATORS;

/// Returns true iff `candidate_key` belongs to the family rooted at `record_key`.
pub fn is_prefix_of(
    candidate_key: &str,
    record_key: &str,
) -> bool {
    if !candidate_key.starts_with(record_key) {
        return false;
    }

    match candidate_key[record_key.len()..].chars().next() {
        None => true,
        Some(next) => PREFIX_SEPARATORS.contains(&next),
    }
}

/// Sub-key of `candidate_key` below `record_key`, without the separator.
///
/// `None` when the key does not belong to the family or names the root itself.
pub fn sub_key_of<'a>(
    candidate_key: &'a str,
    record_key: &str,
) -> Option<&'a str> {
    if candidate_key.len() == record_key.len() || !is_prefix_of(candidate_key, record_key) {
        return None;
    }
    // separators are single byte, so this stays on a char boundary
    Some(&candidate_key[record_key.len() + 1..])
}
