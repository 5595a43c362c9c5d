//! Key Derivation Module
//!
//! Turns an operation name plus its call arguments into a cache key.
//!
//! Arguments pass through `serde_json::Value` first. Its object map is
//! sorted by key, so two maps holding the same pairs in a different
//! insertion order derive the same key.
//!
//! JSON has no spelling for NaN or the infinities and writes them as
//! `null`, so arguments holding one are refused instead of sharing a key
//! with each other and with `None`.

use serde::ser::{self, Serialize};

use crate::error::Result;

// == Derive Key ==
/// Derives the cache key `"{name}:{canonical_json(args)}"`.
///
/// Pass multiple arguments as a tuple; `(3, "x")` serializes as `[3,"x"]`.
/// Fails for arguments that do not serialize to JSON and for arguments
/// containing a NaN or infinite float.
pub fn derive_key<A>(name: &str, args: &A) -> Result<String>
where
    A: Serialize + ?Sized,
{
    args.serialize(FiniteFloats)?;
    let canonical = serde_json::to_value(args)?;
    Ok(format!("{}:{}", name, canonical))
}

// == Key Source ==
/// Where a wrapper gets its cache key from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Derive from the operation name and the call's arguments
    Derived(String),
    /// One fixed key for every call, whatever the arguments
    Explicit(String),
}

impl KeySource {
    /// Resolves the key for one call.
    pub fn resolve<A>(&self, args: &A) -> Result<String>
    where
        A: Serialize + ?Sized,
    {
        match self {
            KeySource::Derived(name) => derive_key(name, args),
            KeySource::Explicit(key) => Ok(key.clone()),
        }
    }

    /// Switches to the explicit `key`. An empty key is treated as no key
    /// and leaves the source as it was.
    pub fn pin(&mut self, key: String) {
        if !key.is_empty() {
            *self = KeySource::Explicit(key);
        }
    }

    /// Returns a label for log lines: the operation name or the explicit key.
    pub fn label(&self) -> &str {
        match self {
            KeySource::Derived(name) => name,
            KeySource::Explicit(key) => key,
        }
    }
}

// == Finite Float Check ==
type CheckResult = std::result::Result<(), serde_json::Error>;

/// Walks a value and rejects the first non-finite float it meets.
struct FiniteFloats;

fn check_finite(finite: bool) -> CheckResult {
    if finite {
        Ok(())
    } else {
        Err(ser::Error::custom("non-finite float has no distinct key"))
    }
}

impl ser::Serializer for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_f32(self, v: f32) -> CheckResult {
        check_finite(v.is_finite())
    }

    fn serialize_f64(self, v: f64) -> CheckResult {
        check_finite(v.is_finite())
    }

    fn serialize_bool(self, _: bool) -> CheckResult {
        Ok(())
    }

    fn serialize_i8(self, _: i8) -> CheckResult {
        Ok(())
    }

    fn serialize_i16(self, _: i16) -> CheckResult {
        Ok(())
    }

    fn serialize_i32(self, _: i32) -> CheckResult {
        Ok(())
    }

    fn serialize_i64(self, _: i64) -> CheckResult {
        Ok(())
    }

    fn serialize_i128(self, _: i128) -> CheckResult {
        Ok(())
    }

    fn serialize_u8(self, _: u8) -> CheckResult {
        Ok(())
    }

    fn serialize_u16(self, _: u16) -> CheckResult {
        Ok(())
    }

    fn serialize_u32(self, _: u32) -> CheckResult {
        Ok(())
    }

    fn serialize_u64(self, _: u64) -> CheckResult {
        Ok(())
    }

    fn serialize_u128(self, _: u128) -> CheckResult {
        Ok(())
    }

    fn serialize_char(self, _: char) -> CheckResult {
        Ok(())
    }

    fn serialize_str(self, _: &str) -> CheckResult {
        Ok(())
    }

    fn serialize_bytes(self, _: &[u8]) -> CheckResult {
        Ok(())
    }

    fn serialize_none(self) -> CheckResult {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> CheckResult {
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> CheckResult {
        Ok(())
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> CheckResult {
        Ok(())
    }

    fn serialize_newtype_struct<T>(self, _: &'static str, value: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T>(&mut self, value: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T>(&mut self, value: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T>(&mut self, value: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T>(&mut self, value: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_key<T>(&mut self, key: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        key.serialize(FiniteFloats)
    }

    fn serialize_value<T>(&mut self, value: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> CheckResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use std::collections::HashMap;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("cannot serialize"))
        }
    }

    #[test]
    fn test_derive_key_format() {
        assert_eq!(derive_key("double", &(3,)).unwrap(), "double:[3]");
        assert_eq!(
            derive_key("lookup", &(7, "eu-west")).unwrap(),
            r#"lookup:[7,"eu-west"]"#
        );
        assert_eq!(derive_key("ping", &()).unwrap(), "ping:null");
    }

    #[test]
    fn test_derive_key_distinguishes_arguments() {
        let a = derive_key("double", &(3,)).unwrap();
        let b = derive_key("double", &(4,)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_key_distinguishes_operations() {
        let a = derive_key("double", &(3,)).unwrap();
        let b = derive_key("triple", &(3,)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_key_is_canonical_for_maps() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for i in 0..32 {
            first.insert(format!("k{}", i), i);
        }
        for i in (0..32).rev() {
            second.insert(format!("k{}", i), i);
        }

        assert_eq!(
            derive_key("search", &first).unwrap(),
            derive_key("search", &second).unwrap()
        );
    }

    #[test]
    fn test_derive_key_propagates_serialization_failure() {
        assert!(derive_key("broken", &Unserializable).is_err());
    }

    #[test]
    fn test_derive_key_rejects_non_finite_floats() {
        assert!(derive_key("describe", &(f64::NAN,)).is_err());
        assert!(derive_key("describe", &(f64::INFINITY,)).is_err());
        assert!(derive_key("describe", &(f64::NEG_INFINITY,)).is_err());
        assert!(derive_key("describe", &(f32::NAN,)).is_err());
    }

    #[test]
    fn test_derive_key_finds_nested_non_finite_floats() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), vec![1.0, f64::INFINITY]);

        assert!(derive_key("score", &(weights,)).is_err());
        assert!(derive_key("score", &(Some(f64::NAN),)).is_err());
    }

    #[test]
    fn test_none_and_finite_floats_keep_distinct_keys() {
        let none = derive_key("describe", &(None::<f64>,)).unwrap();
        let one = derive_key("describe", &(Some(1.5_f64),)).unwrap();

        assert_eq!(none, "describe:[null]");
        assert_eq!(one, "describe:[1.5]");
    }

    #[test]
    fn test_pin_ignores_empty_key() {
        let mut source = KeySource::Derived("double".to_string());
        source.pin(String::new());
        assert_eq!(source, KeySource::Derived("double".to_string()));

        source.pin("fixed".to_string());
        assert_eq!(source, KeySource::Explicit("fixed".to_string()));
    }

    #[test]
    fn test_explicit_key_ignores_arguments() {
        let source = KeySource::Explicit("config".to_string());
        assert_eq!(source.resolve(&(1,)).unwrap(), "config");
        assert_eq!(source.resolve(&Unserializable).unwrap(), "config");
        assert_eq!(source.label(), "config");
    }

    #[test]
    fn test_derived_source_uses_name() {
        let source = KeySource::Derived("double".to_string());
        assert_eq!(source.resolve(&(3,)).unwrap(), "double:[3]");
        assert_eq!(source.label(), "double");
    }
}
