use crate::hash::{sha256_hex, short_digest};

const PATCH_ID_PREFIX_MAX_LEN: usize = 48;

pub fn sanitize_fs_component(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            _ if c.is_ascii_alphanumeric() || c == '-' || c == '_' => c.to_ascii_lowercase(),
            _ => '-',
        })
        .collect()
}

/// Patch ids double as storage keys (`<id>.json`), so they must be a single safe path component.
pub fn is_valid_patch_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.starts_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

pub fn new_patch_id(component_name: &str, target_file: &str, created_at_ms: i64) -> String {
    let mut prefix = sanitize_fs_component(component_name)
        .trim_matches('-')
        .to_string();
    if prefix.is_empty() {
        prefix = "patch".to_string();
    }
    prefix.truncate(PATCH_ID_PREFIX_MAX_LEN);

    let hash = sha256_hex(format!("{target_file}\n{created_at_ms}").as_bytes());
    format!("{prefix}-{}", short_digest(&hash))
}
