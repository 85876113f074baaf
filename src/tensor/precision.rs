//! Element precision

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::dnn::ffi::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    Half,
    Single,
    Double,
    Int8,
    Int32,
}

impl Precision {
    /// Get the size in bytes of one element
    pub const fn size(&self) -> usize {
        match self {
            Precision::Half => 2,
            Precision::Single => 4,
            Precision::Double => 8,
            Precision::Int8 => 1,
            Precision::Int32 => 4,
        }
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Precision::Half | Precision::Single | Precision::Double)
    }

    /// Library data type tag for descriptors of this precision
    pub const fn data_type(&self) -> DataType {
        match self {
            Precision::Half => DataType::Half,
            Precision::Single => DataType::Float,
            Precision::Double => DataType::Double,
            Precision::Int8 => DataType::Int8,
            Precision::Int32 => DataType::Int32,
        }
    }

    pub const fn from_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Half => Precision::Half,
            DataType::Float => Precision::Single,
            DataType::Double => Precision::Double,
            DataType::Int8 => Precision::Int8,
            DataType::Int32 => Precision::Int32,
        }
    }
}

impl Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Precision::Half => "half",
            Precision::Single => "single",
            Precision::Double => "double",
            Precision::Int8 => "int8",
            Precision::Int32 => "int32",
        };
        f.write_str(name)
    }
}

/// Host element types that can be uploaded into a matrix.
pub trait Element: bytemuck::Pod {
    const PRECISION: Precision;
}

impl Element for half::f16 {
    const PRECISION: Precision = Precision::Half;
}

impl Element for f32 {
    const PRECISION: Precision = Precision::Single;
}

impl Element for f64 {
    const PRECISION: Precision = Precision::Double;
}

impl Element for i8 {
    const PRECISION: Precision = Precision::Int8;
}

impl Element for i32 {
    const PRECISION: Precision = Precision::Int32;
}
