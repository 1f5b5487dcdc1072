//! Typed Parameter Trees
//!
//! Every operation carries its payload as a nested parameter tree. The tree
//! is a closed variant type rather than raw JSON so that the transform
//! engine's merge recursion is type-checked instead of relying on runtime
//! introspection.
//!
//! Determinism matters here: maps are `BTreeMap` so iteration order is
//! stable across replicas, which the transform engine depends on to
//! converge without a coordinator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A parameter map: the top level of every operation payload
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A single node in a parameter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Absent / cleared value
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Numeric scalar (all CAD numerics are f64)
    Number(f64),
    /// String scalar
    String(String),
    /// Ordered list of values
    List(Vec<ParamValue>),
    /// Nested map of named values
    Map(ParamMap),
}

impl ParamValue {
    /// True for `Null`, `Bool`, `Number` and `String`
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            ParamValue::Null | ParamValue::Bool(_) | ParamValue::Number(_) | ParamValue::String(_)
        )
    }

    /// Interpret as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Interpret as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret as a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interpret as a list
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Interpret as a nested map
    pub fn as_map(&self) -> Option<&ParamMap> {
        match self {
            ParamValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Interpret as a 3-component vector (list of exactly three numbers)
    pub fn as_vec3(&self) -> Option<[f64; 3]> {
        let items = self.as_list()?;
        if items.len() != 3 {
            return None;
        }
        Some([
            items[0].as_number()?,
            items[1].as_number()?,
            items[2].as_number()?,
        ])
    }

    /// Build a 3-component vector value
    pub fn vec3(v: [f64; 3]) -> Self {
        ParamValue::List(vec![
            ParamValue::Number(v[0]),
            ParamValue::Number(v[1]),
            ParamValue::Number(v[2]),
        ])
    }

    /// True if this is a list whose elements are all scalars
    pub fn is_scalar_list(&self) -> bool {
        match self {
            ParamValue::List(items) => items.iter().all(|item| item.is_scalar()),
            _ => false,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

/// Collect the string elements of the `references` list of a parameter map.
///
/// Constraint operations name the objects they span this way; non-string
/// elements are ignored.
pub fn referenced_objects(params: &ParamMap) -> Vec<String> {
    params
        .get("references")
        .and_then(|value| value.as_list())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_round_trip() {
        let value = ParamValue::vec3([1.0, 2.0, 3.0]);
        assert_eq!(value.as_vec3(), Some([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_vec3_rejects_short_lists() {
        let value = ParamValue::List(vec![ParamValue::Number(1.0)]);
        assert_eq!(value.as_vec3(), None);
    }

    #[test]
    fn test_scalar_list_detection() {
        let scalars = ParamValue::List(vec![ParamValue::Number(1.0), ParamValue::String("a".into())]);
        assert!(scalars.is_scalar_list());

        let nested = ParamValue::List(vec![ParamValue::Map(ParamMap::new())]);
        assert!(!nested.is_scalar_list());
    }

    #[test]
    fn test_referenced_objects() {
        let mut params = ParamMap::new();
        params.insert(
            "references".to_string(),
            ParamValue::List(vec!["partA".into(), "partB".into()]),
        );
        assert_eq!(referenced_objects(&params), vec!["partA", "partB"]);
        assert!(referenced_objects(&ParamMap::new()).is_empty());
    }

    #[test]
    fn test_serialization_shape() {
        let mut params = ParamMap::new();
        params.insert("color".to_string(), "red".into());
        params.insert("size".to_string(), 10.0.into());
        let json = serde_json::to_string(&ParamValue::Map(params)).unwrap();
        assert_eq!(json, r#"{"color":"red","size":10.0}"#);
    }
}
