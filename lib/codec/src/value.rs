//! Per-datum numeric and string encoding for data definitions.

use crate::error::CodecError;
use crate::frame::Writer;
use crate::strings::encode_fixed;

/// SimConnect `SIMCONNECT_DATATYPE_*` codes this bridge implements. Wide
/// strings, variable-length strings, and the structured position/waypoint
/// types are deliberately absent - decoding one of these codes is refused
/// rather than guessed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Int32,
    Int64,
    Float32,
    Float64,
    String8,
    String32,
    String64,
    String128,
    String256,
    String260,
}

impl DataType {
    pub fn from_wire(code: u32) -> Result<Self, CodecError> {
        Ok(match code {
            1 => DataType::Int32,
            2 => DataType::Int64,
            3 => DataType::Float32,
            4 => DataType::Float64,
            5 => DataType::String8,
            6 => DataType::String32,
            7 => DataType::String64,
            8 => DataType::String128,
            9 => DataType::String256,
            10 => DataType::String260,
            other => return Err(CodecError::UnsupportedDataType(other)),
        })
    }

    pub fn to_wire(self) -> u32 {
        match self {
            DataType::Int32 => 1,
            DataType::Int64 => 2,
            DataType::Float32 => 3,
            DataType::Float64 => 4,
            DataType::String8 => 5,
            DataType::String32 => 6,
            DataType::String64 => 7,
            DataType::String128 => 8,
            DataType::String256 => 9,
            DataType::String260 => 10,
        }
    }
}

/// A datum value after translation/extraction, before wire encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum DatumValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl DatumValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DatumValue::Number(n) => Some(*n),
            DatumValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            DatumValue::Text(_) => None,
        }
    }

    fn as_text(&self) -> String {
        match self {
            DatumValue::Number(n) => n.to_string(),
            DatumValue::Bool(b) => b.to_string(),
            DatumValue::Text(s) => s.clone(),
        }
    }
}

/// Encodes `value` per `ty`, matching the original's `ValueToBytes`.
pub fn encode_value(value: &DatumValue, ty: DataType) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::new();
    match ty {
        DataType::Int32 => w.i32(value.as_f64().unwrap_or(0.0).round() as i32),
        DataType::Int64 => {
            let v = value.as_f64().unwrap_or(0.0).round() as i64;
            w.bytes(&v.to_le_bytes());
        }
        DataType::Float32 => w.f32(value.as_f64().unwrap_or(0.0) as f32),
        DataType::Float64 => w.bytes(&value.as_f64().unwrap_or(0.0).to_le_bytes()),
        DataType::String8 => return Ok(encode_fixed(&value.as_text(), 8)),
        DataType::String32 => return Ok(encode_fixed(&value.as_text(), 32)),
        DataType::String64 => return Ok(encode_fixed(&value.as_text(), 64)),
        DataType::String128 => return Ok(encode_fixed(&value.as_text(), 128)),
        DataType::String256 => return Ok(encode_fixed(&value.as_text(), 256)),
        DataType::String260 => return Ok(encode_fixed(&value.as_text(), 260)),
    }
    Ok(w.into_vec())
}
