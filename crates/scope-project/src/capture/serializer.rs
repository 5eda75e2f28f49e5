//! A `serde` serializer that builds a [`CapturedValue`] directly.
//!
//! The shapes follow the usual self-describing data model: structs and maps
//! become [`CapturedValue::Map`], unit variants become their name, and other
//! variants become a one-entry map keyed by the variant name.

use std::fmt;

use serde::ser::{self, Serialize};

use super::CapturedValue;

#[derive(Debug)]
pub(crate) struct CaptureError(String);

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CaptureError {}

impl ser::Error for CaptureError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

type Result<T> = std::result::Result<T, CaptureError>;

pub(crate) struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = CapturedValue;
    type Error = CaptureError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMapBuilder;

    fn serialize_bool(self, v: bool) -> Result<CapturedValue> {
        Ok(CapturedValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<CapturedValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_i16(self, v: i16) -> Result<CapturedValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_i32(self, v: i32) -> Result<CapturedValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_i64(self, v: i64) -> Result<CapturedValue> {
        Ok(CapturedValue::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<CapturedValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_u16(self, v: u16) -> Result<CapturedValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_u32(self, v: u32) -> Result<CapturedValue> {
        self.serialize_i64(v.into())
    }

    // Integers beyond i64 are kept approximately.
    fn serialize_u64(self, v: u64) -> Result<CapturedValue> {
        match i64::try_from(v) {
            Ok(i) => Ok(CapturedValue::Int(i)),
            Err(_) => Ok(CapturedValue::Float(v as f64)),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<CapturedValue> {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> Result<CapturedValue> {
        Ok(CapturedValue::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<CapturedValue> {
        Ok(CapturedValue::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<CapturedValue> {
        Ok(CapturedValue::Str(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<CapturedValue> {
        Ok(CapturedValue::Seq(
            v.iter().map(|b| CapturedValue::Int((*b).into())).collect(),
        ))
    }

    fn serialize_none(self) -> Result<CapturedValue> {
        Ok(CapturedValue::None)
    }

    fn serialize_some<T>(self, value: &T) -> Result<CapturedValue>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<CapturedValue> {
        Ok(CapturedValue::None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<CapturedValue> {
        Ok(CapturedValue::None)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<CapturedValue> {
        Ok(CapturedValue::Str(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<CapturedValue>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<CapturedValue>
    where
        T: ?Sized + Serialize,
    {
        let inner = value.serialize(ValueSerializer)?;
        Ok(CapturedValue::Map(vec![(variant.to_string(), inner)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSeqBuilder> {
        Ok(VariantSeqBuilder {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder> {
        Ok(MapBuilder {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantMapBuilder> {
        Ok(VariantMapBuilder {
            variant,
            entries: Vec::with_capacity(len),
        })
    }
}

pub(crate) struct SeqBuilder {
    items: Vec<CapturedValue>,
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = CapturedValue;
    type Error = CaptureError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CapturedValue> {
        Ok(CapturedValue::Seq(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = CapturedValue;
    type Error = CaptureError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<CapturedValue> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = CapturedValue;
    type Error = CaptureError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<CapturedValue> {
        ser::SerializeSeq::end(self)
    }
}

pub(crate) struct VariantSeqBuilder {
    variant: &'static str,
    items: Vec<CapturedValue>,
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = CapturedValue;
    type Error = CaptureError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CapturedValue> {
        Ok(CapturedValue::Map(vec![(
            self.variant.to_string(),
            CapturedValue::Seq(self.items),
        )]))
    }
}

pub(crate) struct MapBuilder {
    entries: Vec<(String, CapturedValue)>,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = CapturedValue;
    type Error = CaptureError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(map_key(key.serialize(ValueSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| <CaptureError as ser::Error>::custom("map value without a key"))?;
        self.entries.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }

    // Hash maps iterate in arbitrary order; sort so captures are stable.
    fn end(mut self) -> Result<CapturedValue> {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(CapturedValue::Map(self.entries))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = CapturedValue;
    type Error = CaptureError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.entries
            .push((key.to_string(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<CapturedValue> {
        Ok(CapturedValue::Map(self.entries))
    }
}

pub(crate) struct VariantMapBuilder {
    variant: &'static str,
    entries: Vec<(String, CapturedValue)>,
}

impl ser::SerializeStructVariant for VariantMapBuilder {
    type Ok = CapturedValue;
    type Error = CaptureError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.entries
            .push((key.to_string(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<CapturedValue> {
        Ok(CapturedValue::Map(vec![(
            self.variant.to_string(),
            CapturedValue::Map(self.entries),
        )]))
    }
}

/// Map keys must read as text: strings, integers, booleans and unit variants.
fn map_key(key: CapturedValue) -> Result<String> {
    match key {
        CapturedValue::Str(s) => Ok(s),
        CapturedValue::Int(i) => Ok(i.to_string()),
        CapturedValue::Bool(b) => Ok(b.to_string()),
        other => Err(<CaptureError as ser::Error>::custom(format!(
            "map key must be a string, got {other:?}"
        ))),
    }
}
