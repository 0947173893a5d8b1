//! Size limits the device cloud enforces on names and data.

/// Maximum length of an event, function or variable name.
pub const MAX_NAME_CHARS: usize = 64;

/// Maximum length of published event data or a function argument.
pub const MAX_DATA_CHARS: usize = 622;

/// Event published with a blank name.
pub const FALLBACK_EVENT_NAME: &str = "flow-event";

/// Truncate `value` to at most `limit` characters (not bytes).
///
/// Returns `true` when the value was shortened so the caller can log it.
pub fn truncate_chars(value: &mut String, limit: usize) -> bool {
    match value.char_indices().nth(limit) {
        Some((byte_idx, _)) => {
            value.truncate(byte_idx);
            true
        }
        None => false,
    }
}
