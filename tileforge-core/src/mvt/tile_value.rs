use std::hash::{Hash, Hasher};

use geozero::mvt::tile::Value;

/// A wrapper for the MVT value types.
#[derive(Debug, Clone, PartialEq)]
pub enum TileValue {
    Str(String),
    Float(f32),
    Double(f64),
    Int(i64),
    Uint(u64),
    Sint(i64),
    Bool(bool),
}

impl Eq for TileValue {}

impl Hash for TileValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            TileValue::Str(s) => (0_u8, s).hash(state),
            TileValue::Float(f) => (1_u8, f.to_bits()).hash(state),
            TileValue::Double(d) => (2_u8, d.to_bits()).hash(state),
            TileValue::Int(i) => (3_u8, i).hash(state),
            TileValue::Uint(u) => (4_u8, u).hash(state),
            TileValue::Sint(i) => (5_u8, i).hash(state),
            TileValue::Bool(b) => (6_u8, b).hash(state),
        }
    }
}

impl From<TileValue> for Value {
    fn from(tv: TileValue) -> Self {
        match tv {
            TileValue::Str(s) => Self {
                string_value: Some(s),
                ..Default::default()
            },
            TileValue::Float(f) => Self {
                float_value: Some(f),
                ..Default::default()
            },
            TileValue::Double(d) => Self {
                double_value: Some(d),
                ..Default::default()
            },
            TileValue::Int(i) => Self {
                int_value: Some(i),
                ..Default::default()
            },
            TileValue::Uint(u) => Self {
                uint_value: Some(u),
                ..Default::default()
            },
            TileValue::Sint(i) => Self {
                sint_value: Some(i),
                ..Default::default()
            },
            TileValue::Bool(b) => Self {
                bool_value: Some(b),
                ..Default::default()
            },
        }
    }
}
