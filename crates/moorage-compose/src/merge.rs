//! Deterministic deep merge of fragment documents.
//!
//! File order determines precedence: when both sides hold mappings they
//! recurse, when both hold sequences they concatenate in order, otherwise
//! the later fragment's value wins.

use serde_yaml::Value;

/// Merges `overlay` into `base`, `overlay` taking precedence.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (Value::Sequence(mut base_seq), Value::Sequence(overlay_seq)) => {
            base_seq.extend(overlay_seq);
            Value::Sequence(base_seq)
        }
        (_, overlay) => overlay,
    }
}

/// Folds an ordered list of documents into one merged document.
#[must_use]
pub fn merge_documents(documents: impl IntoIterator<Item = Value>) -> Value {
    documents
        .into_iter()
        .fold(Value::Mapping(serde_yaml::Mapping::new()), deep_merge)
}
