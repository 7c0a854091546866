//! Depth-limited conversion of `Serialize` values into JSON values
//!
//! `serde_json::to_value` follows a value all the way down, so a self-nesting
//! `Serialize` impl overflows the stack. This serializer stops descending once
//! containers are nested past [`MAX_DEPTH`] and replaces them with a placeholder.

use serde::ser::{self, Serialize};
use serde_json::{Map, Number, Value};

use super::render::MAX_DEPTH;

/// Cap on nested serialize calls that open no container (options, newtypes)
const MAX_NESTING: usize = 128;

const OBJECT_PLACEHOLDER: &str = "[Object]";
const ARRAY_PLACEHOLDER: &str = "[Array]";
const CIRCULAR_PLACEHOLDER: &str = "[Circular]";

/// Convert `value` into a JSON value whose nesting never exceeds `MAX_DEPTH + 1`
pub fn to_bounded_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, serde_json::Error> {
    value.serialize(BoundedSerializer::default())
}

#[derive(Debug, Clone, Copy, Default)]
struct BoundedSerializer {
    /// Containers opened above this value
    depth: usize,
    /// Serialize calls above this value
    nesting: usize,
}

impl BoundedSerializer {
    /// Serializer for a value wrapped without a container (`Some`, newtype)
    fn wrapped(self) -> Self {
        Self {
            depth: self.depth,
            nesting: self.nesting + 1,
        }
    }

    /// Serializer for a value stored inside a container opened here
    fn inside(self) -> Self {
        Self {
            depth: self.depth + 1,
            nesting: self.nesting + 1,
        }
    }

    /// Containers opened at this depth are replaced by a placeholder
    fn elides(&self) -> bool {
        self.depth > MAX_DEPTH
    }

    fn nested<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, serde_json::Error> {
        if self.nesting >= MAX_NESTING {
            return Ok(Value::String(CIRCULAR_PLACEHOLDER.to_string()));
        }
        value.serialize(self)
    }

    fn seq(self, len: Option<usize>) -> SeqBuilder {
        SeqBuilder {
            ser: self.inside(),
            items: (!self.elides()).then(|| Vec::with_capacity(len.unwrap_or(0).min(64))),
        }
    }

    fn map(self) -> MapBuilder {
        MapBuilder {
            ser: self.inside(),
            entries: (!self.elides()).then(Map::new),
            next_key: None,
        }
    }
}

fn key_string(key: Value) -> Result<String, serde_json::Error> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ser::Error::custom("key must be a string")),
    }
}

/// Wrap `inner` as `{ variant: inner }`, or elide the wrapper itself
fn variant(ser: BoundedSerializer, name: &str, inner: Value) -> Value {
    if ser.elides() {
        return Value::String(OBJECT_PLACEHOLDER.to_string());
    }
    let mut map = Map::new();
    map.insert(name.to_string(), inner);
    Value::Object(map)
}

impl ser::Serializer for BoundedSerializer {
    type Ok = Value;
    type Error = serde_json::Error;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeq;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMap;

    fn serialize_bool(self, v: bool) -> Result<Value, Self::Error> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, Self::Error> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, Self::Error> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, Self::Error> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, Self::Error> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, Self::Error> {
        Ok(i64::try_from(v)
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, Self::Error> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, Self::Error> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, Self::Error> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, Self::Error> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, Self::Error> {
        Ok(u64::try_from(v)
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, Self::Error> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, Self::Error> {
        // NaN and infinities have no JSON form
        Ok(Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null))
    }

    fn serialize_char(self, v: char) -> Result<Value, Self::Error> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, Self::Error> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, Self::Error> {
        if self.elides() {
            return Ok(Value::String(ARRAY_PLACEHOLDER.to_string()));
        }
        Ok(Value::Array(
            v.iter().map(|b| Value::Number((*b).into())).collect(),
        ))
    }

    fn serialize_none(self) -> Result<Value, Self::Error> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, Self::Error> {
        self.wrapped().nested(value)
    }

    fn serialize_unit(self) -> Result<Value, Self::Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, Self::Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, Self::Error> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, Self::Error> {
        self.wrapped().nested(value)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        name: &'static str,
        value: &T,
    ) -> Result<Value, Self::Error> {
        if self.elides() {
            return Ok(Value::String(OBJECT_PLACEHOLDER.to_string()));
        }
        let inner = self.inside().nested(value)?;
        Ok(variant(self, name, inner))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, Self::Error> {
        Ok(self.seq(len))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, Self::Error> {
        Ok(self.seq(Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, Self::Error> {
        Ok(self.seq(Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSeq, Self::Error> {
        Ok(VariantSeq {
            outer: self,
            name: variant,
            seq: self.inside().seq(Some(len)),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, Self::Error> {
        Ok(self.map())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapBuilder, Self::Error> {
        Ok(self.map())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantMap, Self::Error> {
        Ok(VariantMap {
            outer: self,
            name: variant,
            map: self.inside().map(),
        })
    }
}

/// Array under construction; `items` is `None` when the array is elided
struct SeqBuilder {
    ser: BoundedSerializer,
    items: Option<Vec<Value>>,
}

impl SeqBuilder {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        if let Some(items) = self.items.as_mut() {
            items.push(self.ser.nested(value)?);
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self.items {
            Some(items) => Value::Array(items),
            None => Value::String(ARRAY_PLACEHOLDER.to_string()),
        }
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

struct VariantSeq {
    outer: BoundedSerializer,
    name: &'static str,
    seq: SeqBuilder,
}

impl ser::SerializeTupleVariant for VariantSeq {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.seq.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(variant(self.outer, self.name, self.seq.finish()))
    }
}

/// Object under construction; `entries` is `None` when the object is elided
struct MapBuilder {
    ser: BoundedSerializer,
    entries: Option<Map<String, Value>>,
    next_key: Option<String>,
}

impl MapBuilder {
    fn insert<T: Serialize + ?Sized>(
        &mut self,
        key: String,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        if self.entries.is_some() {
            let value = self.ser.nested(value)?;
            if let Some(entries) = self.entries.as_mut() {
                entries.insert(key, value);
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self.entries {
            Some(entries) => Value::Object(entries),
            None => Value::String(OBJECT_PLACEHOLDER.to_string()),
        }
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Self::Error> {
        if self.entries.is_some() {
            self.next_key = Some(key_string(self.ser.nested(key)?)?);
        }
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        if self.entries.is_none() {
            return Ok(());
        }
        let key = self
            .next_key
            .take()
            .ok_or_else(|| {
                <serde_json::Error as ser::Error>::custom("map value serialized before its key")
            })?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

struct VariantMap {
    outer: BoundedSerializer,
    name: &'static str,
    map: MapBuilder,
}

impl ser::SerializeStructVariant for VariantMap {
    type Ok = Value;
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.map.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(variant(self.outer, self.name, self.map.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::SerializeStruct;
    use serde_json::json;

    /// Serializes as `{"next": Chain(n - 1)}` down to zero
    struct Chain(u32);

    impl Serialize for Chain {
        fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut state = serializer.serialize_struct("Chain", 1)?;
            if self.0 == 0 {
                state.serialize_field("next", &())?;
            } else {
                state.serialize_field("next", &Chain(self.0 - 1))?;
            }
            state.end()
        }
    }

    /// Wraps itself forever without opening a container
    struct Loop;

    impl Serialize for Loop {
        fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_newtype_struct("Loop", &Loop)
        }
    }

    fn depth_of(value: &Value) -> usize {
        match value {
            Value::Array(items) => 1 + items.iter().map(depth_of).max().unwrap_or(0),
            Value::Object(map) => 1 + map.values().map(depth_of).max().unwrap_or(0),
            _ => 0,
        }
    }

    #[test]
    fn test_matches_serde_json_for_shallow_values() {
        #[derive(serde::Serialize)]
        enum Event {
            Ready { shard: u8 },
            Closed(u16, String),
            Resumed(Option<u64>),
            Idle,
        }

        let value = json!({
            "events": [
                serde_json::to_value(Event::Ready { shard: 1 }).unwrap(),
            ],
        });
        let events = vec![
            Event::Ready { shard: 1 },
            Event::Closed(4004, "auth".to_string()),
            Event::Resumed(Some(7)),
            Event::Idle,
        ];

        assert_eq!(
            to_bounded_value(&events).unwrap(),
            serde_json::to_value(&events).unwrap()
        );
        assert_eq!(to_bounded_value(&value).unwrap(), value);
    }

    #[test]
    fn test_deep_chain_is_cut_off() {
        let value = to_bounded_value(&Chain(20_000)).unwrap();
        assert!(depth_of(&value) <= MAX_DEPTH + 1);
        assert!(value.to_string().contains(OBJECT_PLACEHOLDER));
    }

    #[test]
    fn test_endless_newtype_is_cut_off() {
        let value = to_bounded_value(&Loop).unwrap();
        assert_eq!(value, Value::String(CIRCULAR_PLACEHOLDER.to_string()));
    }

    #[test]
    fn test_non_string_key_is_an_error() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(vec![1u8], 1);
        assert!(to_bounded_value(&map).is_err());

        let mut map = std::collections::BTreeMap::new();
        map.insert(5u32, "five");
        assert_eq!(to_bounded_value(&map).unwrap(), json!({"5": "five"}));
    }
}
