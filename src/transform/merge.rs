//! Recursive Parameter-Tree Merge
//!
//! The Modify/Modify merge rule walks two parameter trees together:
//!
//! - identical leaves merge trivially
//! - divergent map leaves recurse key by key
//! - divergent scalar lists merge via set union (left order preserved)
//! - any other divergence aborts the whole merge
//!
//! Divergent numeric leaves are an unconditional conflict even when the
//! values are nearly equal; whether near-equal floats should merge is a
//! product decision that has deliberately not been taken here.

use crate::shared::params::{ParamMap, ParamValue};

/// Why a merge was abandoned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    /// Dot-joined path to the leaf that diverged
    pub path: String,
}

/// Merge two parameter maps, or report the first conflicting path
pub fn merge_maps(left: &ParamMap, right: &ParamMap) -> Result<ParamMap, MergeConflict> {
    merge_maps_at(left, right, "")
}

fn merge_maps_at(left: &ParamMap, right: &ParamMap, path: &str) -> Result<ParamMap, MergeConflict> {
    let mut merged = left.clone();
    for (key, right_value) in right {
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };
        match left.get(key) {
            None => {
                merged.insert(key.clone(), right_value.clone());
            }
            Some(left_value) => {
                merged.insert(key.clone(), merge_values_at(left_value, right_value, &child_path)?);
            }
        }
    }
    Ok(merged)
}

fn merge_values_at(
    left: &ParamValue,
    right: &ParamValue,
    path: &str,
) -> Result<ParamValue, MergeConflict> {
    if left == right {
        return Ok(left.clone());
    }
    match (left, right) {
        (ParamValue::Map(left_map), ParamValue::Map(right_map)) => {
            Ok(ParamValue::Map(merge_maps_at(left_map, right_map, path)?))
        }
        (ParamValue::List(_), ParamValue::List(right_items))
            if left.is_scalar_list() && right.is_scalar_list() =>
        {
            let mut union = left.as_list().unwrap_or_default().to_vec();
            for item in right_items {
                if !union.contains(item) {
                    union.push(item.clone());
                }
            }
            Ok(ParamValue::List(union))
        }
        _ => Err(MergeConflict {
            path: path.to_string(),
        }),
    }
}
