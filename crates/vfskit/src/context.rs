//! Per-operation option bags and caller identity.

use std::collections::HashMap;

use serde_json::Value;

/// Free-form options flowing to backends alongside every operation.
///
/// Keys are backend-defined (timeouts, content types, cache hints); the
/// engine itself never interprets them, it only carries and merges them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    options: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Overlay `other` onto this bag; `other` wins on key collisions.
    pub fn merge(&mut self, other: &Context) {
        self.options
            .extend(other.options.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Who is performing operations, for permission-bit evaluation.
///
/// `None` ids mean "no identity": such a caller matches neither owner nor
/// group and is judged by the other bits. Uid zero bypasses every check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Credentials {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// Cleared from permission bits on create and chmod.
    pub umask: u32,
}

impl Credentials {
    pub fn new(uid: Option<u32>, gid: Option<u32>) -> Self {
        Self {
            uid,
            gid,
            umask: 0,
        }
    }

    /// The superuser identity, which passes every permission check.
    pub fn root() -> Self {
        Self::new(Some(0), Some(0))
    }

    pub fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask;
        self
    }
}
