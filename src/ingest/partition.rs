//! Storage partition naming.

/// Partition used for requests to the service root.
pub const ROOT_PARTITION: &str = "root";

/// Partition used when a path has no alphanumeric characters.
pub const UNKNOWN_PARTITION: &str = "unknown";

/// Derive the storage partition (collection) name for a request path.
///
/// Total and deterministic: every character outside `[A-Za-z0-9]` becomes `-`,
/// and leading/trailing dashes are stripped.
pub fn partition_name(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return ROOT_PARTITION.to_string();
    }

    let replaced: String = path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    let trimmed = replaced.trim_matches('-');
    if trimmed.is_empty() {
        UNKNOWN_PARTITION.to_string()
    } else {
        trimmed.to_string()
    }
}
