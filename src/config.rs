//! Hierarchical key-path configuration tree.
//!
//! [`Input`] wraps a `serde_json::Value` and is addressed by dotted paths such
//! as `ImmersedBoundaries.cylinder.geometry.center`. Presence is checked with
//! the `Option`-returning lookups; only [`Input::get`] treats absence as an
//! error. Reading configuration files from disk is left to the caller.

use crate::geometry::Vector2D;
use crate::mesh_error::FvError;
use serde_json::Value;

/// A configuration subtree and the dotted path it was reached by.
#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    path: String,
    value: Value,
}

/// Types that can be read out of a configuration leaf.
pub trait FromInput: Sized {
    fn from_input(value: &Value) -> Option<Self>;
}

impl FromInput for f64 {
    fn from_input(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromInput for i64 {
    fn from_input(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromInput for usize {
    fn from_input(value: &Value) -> Option<Self> {
        i64::from_input(value).and_then(|v| usize::try_from(v).ok())
    }
}

impl FromInput for bool {
    fn from_input(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim() {
                "true" | "On" | "on" | "1" => Some(true),
                "false" | "Off" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromInput for String {
    fn from_input(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// `[x, y]` or `"(x, y)"`.
impl FromInput for Vector2D {
    fn from_input(value: &Value) -> Option<Self> {
        match value {
            Value::Array(a) if a.len() == 2 => {
                Some(Vector2D::new(f64::from_input(&a[0])?, f64::from_input(&a[1])?))
            }
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl Input {
    /// The whole tree.
    pub fn from_value(value: Value) -> Self {
        Self {
            path: String::new(),
            value,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, FvError> {
        let value = serde_json::from_str(text).map_err(|e| FvError::InvalidConfigValue {
            component: "Input",
            key: "<root>".into(),
            value: e.to_string(),
        })?;
        Ok(Self::from_value(value))
    }

    /// Full dotted path of this subtree (empty for the root).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    fn full_path(&self, path: &str) -> String {
        match (self.path.is_empty(), path.is_empty()) {
            (true, _) => path.to_string(),
            (false, true) => self.path.clone(),
            (false, false) => format!("{}.{}", self.path, path),
        }
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.value);
        }
        path.split('.')
            .try_fold(&self.value, |node, key| node.as_object()?.get(key))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Required value.
    pub fn get<T: FromInput>(&self, path: &str) -> Result<T, FvError> {
        self.get_optional(path)?
            .ok_or_else(|| FvError::MissingConfigKey {
                component: "Input",
                key: self.full_path(path),
            })
    }

    /// `Ok(None)` when absent, `Err` when present but of the wrong type.
    pub fn get_optional<T: FromInput>(&self, path: &str) -> Result<Option<T>, FvError> {
        match self.lookup(path) {
            None => Ok(None),
            Some(v) => T::from_input(v)
                .map(Some)
                .ok_or_else(|| FvError::InvalidConfigValue {
                    component: "Input",
                    key: self.full_path(path),
                    value: v.to_string(),
                }),
        }
    }

    pub fn get_or<T: FromInput>(&self, path: &str, default: T) -> Result<T, FvError> {
        Ok(self.get_optional(path)?.unwrap_or(default))
    }

    /// Subtree at `path`, if it exists.
    pub fn child_optional(&self, path: &str) -> Option<Input> {
        self.lookup(path).map(|v| Input {
            path: self.full_path(path),
            value: v.clone(),
        })
    }

    /// Named children of an object node, in key order. Leaves have none.
    pub fn children(&self) -> Vec<(String, Input)> {
        match &self.value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        Input {
                            path: self.full_path(k),
                            value: v.clone(),
                        },
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
