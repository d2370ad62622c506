//! Content hashing for cache keys.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::filter::{FilterItem, MuteMode};

/// Compute SHA256 hash of a serializable value.
///
/// The value is serialized to JSON before hashing, ensuring deterministic output.
/// Returns a 64-character lowercase hexadecimal string.
///
/// # Errors
/// Returns an error if the value cannot be serialized to JSON.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Serialize)]
struct CountKey<'a> {
    tenant: &'a str,
    muted: MuteMode,
    items: &'a [FilterItem],
}

/// Key of a cached row count.
///
/// Sort and paging never change which artists match, so only the tenant,
/// mute mode and filter items take part.
pub fn count_key(
    tenant: &str,
    muted: MuteMode,
    items: &[FilterItem],
) -> Result<String, serde_json::Error> {
    compute_hash(&CountKey {
        tenant,
        muted,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compute_hash_deterministic() {
        let value = json!({"name": "test", "value": 42});
        let hash1 = compute_hash(&value).unwrap();
        let hash2 = compute_hash(&value).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 hex = 64 chars
    }

    #[test]
    fn test_count_key_covers_tenant_mute_and_items() {
        let items = vec![FilterItem::new("name", "contains", "nova")];
        let key = count_key("org-a", MuteMode::Hide, &items).unwrap();

        assert_eq!(key, count_key("org-a", MuteMode::Hide, &items).unwrap());
        assert_ne!(key, count_key("org-b", MuteMode::Hide, &items).unwrap());
        assert_ne!(key, count_key("org-a", MuteMode::Only, &items).unwrap());
        assert_ne!(key, count_key("org-a", MuteMode::Hide, &[]).unwrap());
    }
}
