//! Key-value persistence surface shared by savegame writers and readers.
//!
//! Savegames are trees of [`VariantMap`] nodes. Positions are stored as
//! two-element `[i, j]` arrays and enumerations as their numeric codes or
//! names, so the schema stays stable across refactors of the Rust types.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{PathwayError, TilePos};

/// Generic key-value node of a savegame.
pub type VariantMap = Map<String, Value>;

/// Errors raised while reading a savegame node.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A mandatory key was absent.
    #[error("missing key `{0}`")]
    MissingKey(String),
    /// A key held a value of an unexpected shape.
    #[error("key `{key}` is not {expected}")]
    WrongType {
        /// Offending key.
        key: String,
        /// Human readable description of the expected shape.
        expected: &'static str,
    },
    /// A key held a code or name that does not decode to a known variant.
    #[error("key `{key}` holds unknown value `{value}`")]
    UnknownValue {
        /// Offending key.
        key: String,
        /// Rendered value that failed to decode.
        value: String,
    },
    /// A stored route could not be replayed on the map.
    #[error("stored pathway does not fit the map: {0}")]
    Pathway(#[from] PathwayError),
}

/// Typed accessors over a [`VariantMap`].
pub trait VariantMapExt {
    /// Returns the raw value stored under `key`.
    fn value(&self, key: &str) -> Result<&Value, PersistenceError>;

    /// Reads a signed integer.
    fn int(&self, key: &str) -> Result<i64, PersistenceError>;

    /// Reads an unsigned integer.
    fn uint(&self, key: &str) -> Result<u64, PersistenceError>;

    /// Reads a floating point number.
    fn float(&self, key: &str) -> Result<f64, PersistenceError>;

    /// Reads a boolean flag.
    fn flag(&self, key: &str) -> Result<bool, PersistenceError>;

    /// Reads a string.
    fn text(&self, key: &str) -> Result<&str, PersistenceError>;

    /// Reads an `[i, j]` tile position.
    fn tile_pos(&self, key: &str) -> Result<TilePos, PersistenceError>;

    /// Reads a list.
    fn list(&self, key: &str) -> Result<&Vec<Value>, PersistenceError>;

    /// Reads a nested map.
    fn node(&self, key: &str) -> Result<&VariantMap, PersistenceError>;

    /// Reads a floating point number, falling back to `default` when absent.
    fn float_or(&self, key: &str, default: f64) -> Result<f64, PersistenceError>;
}

impl VariantMapExt for VariantMap {
    fn value(&self, key: &str) -> Result<&Value, PersistenceError> {
        self.get(key)
            .ok_or_else(|| PersistenceError::MissingKey(key.to_owned()))
    }

    fn int(&self, key: &str) -> Result<i64, PersistenceError> {
        self.value(key)?
            .as_i64()
            .ok_or_else(|| wrong_type(key, "an integer"))
    }

    fn uint(&self, key: &str) -> Result<u64, PersistenceError> {
        self.value(key)?
            .as_u64()
            .ok_or_else(|| wrong_type(key, "an unsigned integer"))
    }

    fn float(&self, key: &str) -> Result<f64, PersistenceError> {
        self.value(key)?
            .as_f64()
            .ok_or_else(|| wrong_type(key, "a number"))
    }

    fn flag(&self, key: &str) -> Result<bool, PersistenceError> {
        self.value(key)?
            .as_bool()
            .ok_or_else(|| wrong_type(key, "a boolean"))
    }

    fn text(&self, key: &str) -> Result<&str, PersistenceError> {
        self.value(key)?
            .as_str()
            .ok_or_else(|| wrong_type(key, "a string"))
    }

    fn tile_pos(&self, key: &str) -> Result<TilePos, PersistenceError> {
        tile_pos_from_value(key, self.value(key)?)
    }

    fn list(&self, key: &str) -> Result<&Vec<Value>, PersistenceError> {
        self.value(key)?
            .as_array()
            .ok_or_else(|| wrong_type(key, "a list"))
    }

    fn node(&self, key: &str) -> Result<&VariantMap, PersistenceError> {
        self.value(key)?
            .as_object()
            .ok_or_else(|| wrong_type(key, "a map"))
    }

    fn float_or(&self, key: &str, default: f64) -> Result<f64, PersistenceError> {
        match self.get(key) {
            None => Ok(default),
            Some(_) => self.float(key),
        }
    }
}

/// Encodes a tile position as an `[i, j]` array.
#[must_use]
pub fn tile_pos_value(pos: TilePos) -> Value {
    Value::from(vec![pos.i(), pos.j()])
}

/// Decodes an `[i, j]` array stored under `key`.
pub fn tile_pos_from_value(key: &str, value: &Value) -> Result<TilePos, PersistenceError> {
    let pair = value
        .as_array()
        .filter(|items| items.len() == 2)
        .ok_or_else(|| wrong_type(key, "an [i, j] pair"))?;
    let component = |item: &Value| {
        item.as_i64()
            .and_then(|raw| i32::try_from(raw).ok())
            .ok_or_else(|| wrong_type(key, "an [i, j] pair"))
    };
    Ok(TilePos::new(component(&pair[0])?, component(&pair[1])?))
}

fn wrong_type(key: &str, expected: &'static str) -> PersistenceError {
    PersistenceError::WrongType {
        key: key.to_owned(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_positions_are_stored_as_pairs() {
        let mut map = VariantMap::new();
        let _ = map.insert("pos".to_owned(), tile_pos_value(TilePos::new(-2, 7)));

        assert_eq!(map.tile_pos("pos").expect("pair"), TilePos::new(-2, 7));
        assert_eq!(map["pos"], serde_json::json!([-2, 7]));
    }

    #[test]
    fn missing_and_mistyped_keys_are_reported() {
        let mut map = VariantMap::new();
        let _ = map.insert("flag".to_owned(), Value::from("yes"));

        assert!(matches!(
            map.int("absent"),
            Err(PersistenceError::MissingKey(key)) if key == "absent"
        ));
        assert!(matches!(
            map.flag("flag"),
            Err(PersistenceError::WrongType { expected: "a boolean", .. })
        ));
        assert_eq!(map.float_or("absent", 3.5).expect("default"), 3.5);
    }
}
