//! Document-Mutation Collaborator
//!
//! The concurrency core never mutates model geometry itself. The component
//! that does, the document layer, sits behind the [`DocumentStore`]
//! trait: the change tracker calls `capture_state` to populate snapshots
//! and `apply` when executing synthesized inverse and redo operations.
//!
//! [`MemoryDocumentStore`] is a parameter-tree-level implementation used by
//! tests and by the sequence projection; it performs no real geometry
//! computation.

use crate::shared::error::CollabError;
use crate::shared::operation::OperationKind;
use crate::shared::params::{referenced_objects, ParamMap, ParamValue};
use crate::transform::geometry::Quaternion;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// The document layer as seen by this core
pub trait DocumentStore: Send + Sync {
    /// Apply one operation's effect to an object
    fn apply(&self, object_id: &str, kind: OperationKind, params: &ParamMap)
        -> Result<(), CollabError>;

    /// Capture the current parameter tree of an object, if it exists
    fn capture_state(&self, object_id: &str) -> Option<ParamMap>;
}

/// In-memory document store over plain parameter trees
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    objects: RwLock<BTreeMap<String, ParamMap>>,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing operation semantics
    pub fn insert_object(&self, object_id: &str, params: ParamMap) {
        self.objects
            .write()
            .expect("document store lock poisoned")
            .insert(object_id.to_string(), params);
    }

    /// Snapshot every object, for assertions
    pub fn snapshot(&self) -> BTreeMap<String, ParamMap> {
        self.objects
            .read()
            .expect("document store lock poisoned")
            .clone()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn apply(
        &self,
        object_id: &str,
        kind: OperationKind,
        params: &ParamMap,
    ) -> Result<(), CollabError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| CollabError::internal("document store lock poisoned"))?;
        apply_to_objects(&mut objects, object_id, kind, params)
    }

    fn capture_state(&self, object_id: &str) -> Option<ParamMap> {
        self.objects
            .read()
            .expect("document store lock poisoned")
            .get(object_id)
            .cloned()
    }
}

/// Apply one operation's effect to a map of objects.
///
/// Shared by [`MemoryDocumentStore`] and the sequence projection so both
/// agree on what an operation "does" at the parameter-tree level.
pub fn apply_to_objects(
    objects: &mut BTreeMap<String, ParamMap>,
    object_id: &str,
    kind: OperationKind,
    params: &ParamMap,
) -> Result<(), CollabError> {
    match kind {
        OperationKind::NoOp => Ok(()),
        OperationKind::Create => {
            objects.insert(object_id.to_string(), params.clone());
            Ok(())
        }
        OperationKind::Delete => {
            objects.remove(object_id);
            Ok(())
        }
        OperationKind::Modify | OperationKind::PropertyChange => {
            let object = objects
                .get_mut(object_id)
                .ok_or_else(|| CollabError::document(object_id, "object not found"))?;
            for (key, value) in params {
                object.insert(key.clone(), value.clone());
            }
            Ok(())
        }
        OperationKind::Move => {
            let object = objects
                .get_mut(object_id)
                .ok_or_else(|| CollabError::document(object_id, "object not found"))?;
            let offset = params
                .get("offset")
                .and_then(|value| value.as_vec3())
                .ok_or_else(|| CollabError::document(object_id, "move without offset vector"))?;
            let position = object
                .get("position")
                .and_then(|value| value.as_vec3())
                .unwrap_or([0.0, 0.0, 0.0]);
            object.insert(
                "position".to_string(),
                ParamValue::vec3([
                    position[0] + offset[0],
                    position[1] + offset[1],
                    position[2] + offset[2],
                ]),
            );
            Ok(())
        }
        OperationKind::Rotate => {
            let object = objects
                .get_mut(object_id)
                .ok_or_else(|| CollabError::document(object_id, "object not found"))?;
            let angles = params
                .get("angles")
                .and_then(|value| value.as_vec3())
                .ok_or_else(|| CollabError::document(object_id, "rotate without angles triple"))?;
            let current = object
                .get("rotation")
                .and_then(|value| value.as_vec3())
                .unwrap_or([0.0, 0.0, 0.0]);
            let composed =
                (Quaternion::from_euler_deg(angles) * Quaternion::from_euler_deg(current))
                    .to_euler_deg();
            object.insert("rotation".to_string(), ParamValue::vec3(composed));
            Ok(())
        }
        OperationKind::Scale => {
            let object = objects
                .get_mut(object_id)
                .ok_or_else(|| CollabError::document(object_id, "object not found"))?;
            let factor = params
                .get("factor")
                .and_then(|value| value.as_vec3())
                .ok_or_else(|| CollabError::document(object_id, "scale without factor vector"))?;
            let scale = object
                .get("scale")
                .and_then(|value| value.as_vec3())
                .unwrap_or([1.0, 1.0, 1.0]);
            object.insert(
                "scale".to_string(),
                ParamValue::vec3([
                    scale[0] * factor[0],
                    scale[1] * factor[1],
                    scale[2] * factor[2],
                ]),
            );
            Ok(())
        }
        OperationKind::ConstraintAdd => {
            let object = objects
                .get_mut(object_id)
                .ok_or_else(|| CollabError::document(object_id, "object not found"))?;
            let entry = ParamValue::Map(params.clone());
            match object.get_mut("constraints") {
                Some(ParamValue::List(items)) => items.push(entry),
                _ => {
                    object.insert("constraints".to_string(), ParamValue::List(vec![entry]));
                }
            }
            Ok(())
        }
        OperationKind::ConstraintRemove => {
            let object = objects
                .get_mut(object_id)
                .ok_or_else(|| CollabError::document(object_id, "object not found"))?;
            let references = referenced_objects(params);
            if let Some(ParamValue::List(items)) = object.get_mut("constraints") {
                items.retain(|item| match item.as_map() {
                    Some(map) => referenced_objects(map) != references,
                    None => true,
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_box() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        let mut params = ParamMap::new();
        params.insert("position".to_string(), ParamValue::vec3([1.0, 0.0, 0.0]));
        store.insert_object("boxA", params);
        store
    }

    #[test]
    fn test_create_and_capture() {
        let store = MemoryDocumentStore::new();
        let mut params = ParamMap::new();
        params.insert("color".to_string(), "red".into());
        store.apply("boxA", OperationKind::Create, &params).unwrap();
        assert_eq!(store.capture_state("boxA"), Some(params));
    }

    #[test]
    fn test_move_accumulates_position() {
        let store = store_with_box();
        let mut params = ParamMap::new();
        params.insert("offset".to_string(), ParamValue::vec3([0.0, 2.0, 0.0]));
        store.apply("boxA", OperationKind::Move, &params).unwrap();

        let state = store.capture_state("boxA").unwrap();
        assert_eq!(state.get("position").unwrap().as_vec3(), Some([1.0, 2.0, 0.0]));
    }

    #[test]
    fn test_modify_missing_object_fails() {
        let store = MemoryDocumentStore::new();
        let result = store.apply("ghost", OperationKind::Modify, &ParamMap::new());
        assert!(matches!(result, Err(CollabError::DocumentError { .. })));
    }

    #[test]
    fn test_constraint_add_then_remove() {
        let store = store_with_box();
        let mut params = ParamMap::new();
        params.insert(
            "references".to_string(),
            ParamValue::List(vec!["boxA".into(), "boxB".into()]),
        );
        store.apply("boxA", OperationKind::ConstraintAdd, &params).unwrap();
        let state = store.capture_state("boxA").unwrap();
        assert_eq!(state.get("constraints").unwrap().as_list().unwrap().len(), 1);

        store.apply("boxA", OperationKind::ConstraintRemove, &params).unwrap();
        let state = store.capture_state("boxA").unwrap();
        assert!(state.get("constraints").unwrap().as_list().unwrap().is_empty());
    }
}
