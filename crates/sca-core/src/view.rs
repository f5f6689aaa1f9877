// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed read/write access to a mutable JSON event document.

use serde_json::{Map, Value};

/// Read/write accessor over one event document.
///
/// All getters are total: a missing path or a type mismatch yields `None`
/// rather than an error. Mutators create missing intermediate objects along
/// the pointer, so writes to a fresh destination prefix need no setup.
#[derive(Debug)]
pub struct EventView<'a> {
    doc: &'a mut Value,
}

impl<'a> EventView<'a> {
    /// Wrap a mutable event document.
    pub fn new(doc: &'a mut Value) -> Self {
        Self { doc }
    }

    // -- probes -------------------------------------------------------------

    /// Whether any value exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.doc.pointer(path).is_some()
    }

    /// Whether `path` holds a string.
    #[must_use]
    pub fn is_string(&self, path: &str) -> bool {
        self.doc.pointer(path).is_some_and(Value::is_string)
    }

    /// Whether `path` holds an integer representable as `i64`.
    ///
    /// Kept in lockstep with [`EventView::get_int`]: a value this probe
    /// accepts is always retrievable by the getter.
    #[must_use]
    pub fn is_int(&self, path: &str) -> bool {
        self.doc.pointer(path).is_some_and(Value::is_i64)
    }

    /// Whether `path` holds a boolean.
    #[must_use]
    pub fn is_bool(&self, path: &str) -> bool {
        self.doc.pointer(path).is_some_and(Value::is_boolean)
    }

    /// Whether `path` holds an array.
    #[must_use]
    pub fn is_array(&self, path: &str) -> bool {
        self.doc.pointer(path).is_some_and(Value::is_array)
    }

    /// Whether `path` holds an object.
    #[must_use]
    pub fn is_object(&self, path: &str) -> bool {
        self.doc.pointer(path).is_some_and(Value::is_object)
    }

    // -- getters ------------------------------------------------------------

    /// String at `path`, if present and a string.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.doc.pointer(path).and_then(Value::as_str)
    }

    /// Integer at `path`, if present and representable as `i64`.
    #[must_use]
    pub fn get_int(&self, path: &str) -> Option<i64> {
        self.doc.pointer(path).and_then(Value::as_i64)
    }

    /// Array at `path`, if present and an array.
    #[must_use]
    pub fn get_array(&self, path: &str) -> Option<&Vec<Value>> {
        self.doc.pointer(path).and_then(|v| v.as_array())
    }

    /// Object at `path`, if present and an object.
    #[must_use]
    pub fn get_object(&self, path: &str) -> Option<&Map<String, Value>> {
        self.doc.pointer(path).and_then(|v| v.as_object())
    }

    /// Compact JSON serialization of the subtree at `path`.
    #[must_use]
    pub fn render(&self, path: &str) -> Option<String> {
        self.doc.pointer(path).map(Value::to_string)
    }

    // -- mutators -----------------------------------------------------------

    /// Clone the subtree at `src` to `dst`. A missing source is a no-op.
    pub fn copy(&mut self, dst: &str, src: &str) {
        if let Some(value) = self.doc.pointer(src).cloned() {
            if let Some(slot) = ensure_pointer(self.doc, dst) {
                *slot = value;
            }
        }
    }

    /// Write a string at `path`.
    pub fn set_string(&mut self, value: &str, path: &str) {
        if let Some(slot) = ensure_pointer(self.doc, path) {
            *slot = Value::String(value.to_string());
        }
    }

    /// Write a boolean at `path`.
    pub fn set_bool(&mut self, value: bool, path: &str) {
        if let Some(slot) = ensure_pointer(self.doc, path) {
            *slot = Value::Bool(value);
        }
    }

    /// Replace `path` with an empty array.
    pub fn set_array(&mut self, path: &str) {
        if let Some(slot) = ensure_pointer(self.doc, path) {
            *slot = Value::Array(Vec::new());
        }
    }

    /// Append a string to the array at `path`, creating the array first when
    /// `path` is missing or holds a non-array value.
    pub fn append_string(&mut self, value: &str, path: &str) {
        if let Some(slot) = ensure_pointer(self.doc, path) {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Some(items) = slot.as_array_mut() {
                items.push(Value::String(value.to_string()));
            }
        }
    }
}

/// Walk `pointer` through `doc`, creating intermediate objects as needed, and
/// return the addressed slot.
///
/// Scalars and nulls on the way are replaced by objects so the path can be
/// extended. Array segments only resolve to existing indices (or `-` for
/// push); anything else yields `None`.
fn ensure_pointer<'v>(doc: &'v mut Value, pointer: &str) -> Option<&'v mut Value> {
    if pointer.is_empty() {
        return Some(doc);
    }
    if !pointer.starts_with('/') {
        return None;
    }
    let mut current = doc;
    for raw in pointer[1..].split('/') {
        let token = raw.replace("~1", "/").replace("~0", "~");
        if !current.is_object() && !current.is_array() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(token).or_insert(Value::Null),
            Value::Array(items) => {
                let index = if token == "-" {
                    items.push(Value::Null);
                    items.len() - 1
                } else {
                    token.parse::<usize>().ok()?
                };
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}
