//! Caller data stored as an opaque blob inside a vault item.
//!
//! A [`Payload`] is a string-keyed mapping of JSON values. It is encoded as a
//! UTF-8 JSON object under [`keys::DATA`](crate::value::keys::DATA) and
//! decoded back verbatim on read. Values JSON cannot carry, such as NaN or
//! infinite floats, are rejected on the way in rather than stored as `null`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Serialize, ser};

use crate::error::{Result, VaultError};

/// String-keyed caller data carried by a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, serde_json::Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from any value that serializes to a JSON object,
    /// such as a `HashMap<String, _>` or a struct.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::UnsupportedPayloadValue`] if `value` cannot be
    /// serialized or does not serialize to an object.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        match to_json("", value)? {
            serde_json::Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(VaultError::UnsupportedPayloadValue {
                key: String::new(),
                reason: format!("payload must be an object, got {}", json_kind(&other)),
            }),
        }
    }

    /// Insert `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::UnsupportedPayloadValue`] if `value` cannot be
    /// represented as JSON.
    pub fn insert<V: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &V,
    ) -> Result<()> {
        let key = key.into();
        let value = to_json(&key, value)?;
        self.0.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Deserialize the value under `key` into `T`. `None` if the key is absent
    /// or holds a value of another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Deserialize the whole payload into `T`.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        let object: serde_json::Map<String, serde_json::Value> =
            self.0.clone().into_iter().collect();
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            VaultError::CorruptPayload {
                reason: e.to_string(),
            }
        })
    }

    /// Encode into the stored blob form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(|e| VaultError::UnsupportedPayloadValue {
            key: String::new(),
            reason: e.to_string(),
        })
    }

    /// Decode a stored blob.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::CorruptPayload`] if `bytes` is not a JSON object.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let map: BTreeMap<String, serde_json::Value> =
            serde_json::from_slice(bytes).map_err(|e| VaultError::CorruptPayload {
                reason: e.to_string(),
            })?;
        Ok(Self(map))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), serde_json::Value::String(v.into())))
                .collect(),
        )
    }
}

fn to_json<V: Serialize + ?Sized>(key: &str, value: &V) -> Result<serde_json::Value> {
    let unsupported = |reason: String| VaultError::UnsupportedPayloadValue {
        key: key.to_string(),
        reason,
    };
    value
        .serialize(&mut FiniteCheck)
        .map_err(|e| unsupported(e.to_string()))?;
    serde_json::to_value(value).map_err(|e| unsupported(e.to_string()))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Non-finite number check
// ---------------------------------------------------------------------------

/// A serializer that produces nothing and fails on the first NaN or
/// infinite float, which `serde_json` would otherwise write as `null`.
struct FiniteCheck;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct NotRepresentable(String);

impl ser::Error for NotRepresentable {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

type Checked = std::result::Result<(), NotRepresentable>;

impl ser::Serializer for &mut FiniteCheck {
    type Ok = ();
    type Error = NotRepresentable;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_f32(self, v: f32) -> Checked {
        ser::Serializer::serialize_f64(self, f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Checked {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NotRepresentable(format!("{v} is not a finite number")))
        }
    }

    fn serialize_bool(self, _: bool) -> Checked {
        Ok(())
    }
    fn serialize_i8(self, _: i8) -> Checked {
        Ok(())
    }
    fn serialize_i16(self, _: i16) -> Checked {
        Ok(())
    }
    fn serialize_i32(self, _: i32) -> Checked {
        Ok(())
    }
    fn serialize_i64(self, _: i64) -> Checked {
        Ok(())
    }
    fn serialize_i128(self, _: i128) -> Checked {
        Ok(())
    }
    fn serialize_u8(self, _: u8) -> Checked {
        Ok(())
    }
    fn serialize_u16(self, _: u16) -> Checked {
        Ok(())
    }
    fn serialize_u32(self, _: u32) -> Checked {
        Ok(())
    }
    fn serialize_u64(self, _: u64) -> Checked {
        Ok(())
    }
    fn serialize_u128(self, _: u128) -> Checked {
        Ok(())
    }
    fn serialize_char(self, _: char) -> Checked {
        Ok(())
    }
    fn serialize_str(self, _: &str) -> Checked {
        Ok(())
    }
    fn serialize_bytes(self, _: &[u8]) -> Checked {
        Ok(())
    }
    fn serialize_none(self) -> Checked {
        Ok(())
    }
    fn serialize_unit(self) -> Checked {
        Ok(())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Checked {
        Ok(())
    }
    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Checked {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> std::result::Result<Self, NotRepresentable> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> std::result::Result<Self, NotRepresentable> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, NotRepresentable> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, NotRepresentable> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> std::result::Result<Self, NotRepresentable> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, NotRepresentable> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, NotRepresentable> {
        Ok(self)
    }
}

impl ser::SerializeSeq for &mut FiniteCheck {
    type Ok = ();
    type Error = NotRepresentable;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTuple for &mut FiniteCheck {
    type Ok = ();
    type Error = NotRepresentable;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for &mut FiniteCheck {
    type Ok = ();
    type Error = NotRepresentable;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for &mut FiniteCheck {
    type Ok = ();
    type Error = NotRepresentable;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeMap for &mut FiniteCheck {
    type Ok = ();
    type Error = NotRepresentable;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Checked {
        key.serialize(&mut **self)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStruct for &mut FiniteCheck {
    type Ok = ();
    type Error = NotRepresentable;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Checked {
        value
            .serialize(&mut **self)
            .map_err(|e| NotRepresentable(format!("field `{key}`: {}", e.0)))
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStructVariant for &mut FiniteCheck {
    type Ok = ();
    type Error = NotRepresentable;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Checked {
        value
            .serialize(&mut **self)
            .map_err(|e| NotRepresentable(format!("field `{key}`: {}", e.0)))
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn encode_decode_preserves_values() {
        let mut payload: Payload = [("some", "data")].into_iter().collect();
        payload.insert("count", &3).unwrap();
        payload.insert("tags", &["a", "b"]).unwrap();

        let decoded = Payload::decode(&payload.encode().unwrap()).unwrap();

        assert_eq!(decoded, payload);
        assert_eq!(decoded.get_as::<u32>("count"), Some(3));
        assert_eq!(decoded.get_as::<Vec<String>>("tags").unwrap(), ["a", "b"]);
    }

    #[test]
    fn from_serializable_accepts_string_maps() {
        let mut map = HashMap::new();
        map.insert("one".to_string(), "two".to_string());

        let payload = Payload::from_serializable(&map).unwrap();
        assert_eq!(payload.get("one"), Some(&serde_json::json!("two")));

        let back: HashMap<String, String> = payload.to_typed().unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn from_serializable_rejects_non_objects() {
        let err = Payload::from_serializable(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, VaultError::UnsupportedPayloadValue { .. }));
    }

    #[test]
    fn insert_rejects_unrepresentable_values() {
        // JSON object keys must be strings.
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], "x");

        let mut payload = Payload::new();
        let err = payload.insert("nested", &bad).unwrap_err();
        assert!(matches!(
            err,
            VaultError::UnsupportedPayloadValue { ref key, .. } if key == "nested"
        ));
        assert!(payload.is_empty());
    }

    #[test]
    fn insert_rejects_non_finite_numbers() {
        let mut payload = Payload::new();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = payload.insert("ratio", &value).unwrap_err();
            assert!(matches!(
                err,
                VaultError::UnsupportedPayloadValue { ref key, .. } if key == "ratio"
            ));
        }
        assert!(payload.insert("samples", &[1.0f32, f32::NAN]).is_err());
        assert!(payload.insert("maybe", &Some(f64::INFINITY)).is_err());
        assert!(payload.is_empty());

        payload.insert("ratio", &0.25).unwrap();
        let decoded = Payload::decode(&payload.encode().unwrap()).unwrap();
        assert_eq!(decoded.get_as::<f64>("ratio"), Some(0.25));
    }

    #[test]
    fn from_serializable_rejects_non_finite_fields() {
        #[derive(Serialize)]
        struct Reading {
            label: &'static str,
            ratio: f64,
        }

        let err = Payload::from_serializable(&Reading {
            label: "cpu",
            ratio: f64::NAN,
        })
        .unwrap_err();
        assert!(matches!(err, VaultError::UnsupportedPayloadValue { .. }));
        assert!(err.to_string().contains("ratio"));

        let mut map = HashMap::new();
        map.insert("limit".to_string(), f64::INFINITY);
        assert!(Payload::from_serializable(&map).is_err());
    }

    #[test]
    fn decode_rejects_non_object_blob() {
        let err = Payload::decode(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, VaultError::CorruptPayload { .. }));

        let err = Payload::decode(b"\xff\xfe").unwrap_err();
        assert!(matches!(err, VaultError::CorruptPayload { .. }));
    }
}
