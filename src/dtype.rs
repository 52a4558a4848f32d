//! Element types shared by the classic and HDF5 backends
//!
//! MATLAB stores numeric arrays in a handful of primitive types. [`DType`] names
//! them, [`Scalar`] carries a single value without losing its native type, and
//! [`Element`] ties each Rust primitive to its [`DType`] so typed code can move
//! in and out of [`DynArray`](crate::array::DynArray).

use crate::array::DynArray;
use ndarray::ArrayD;
use serde::Serialize;
use std::fmt;

/// Primitive element type of a loaded array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

/// Coarse classification of a stored variable, available before loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    UnsignedInt,
    SignedInt,
    Float,
    BoolLike,
    /// Cells, structs, strings, sparse or complex data
    OtherNonArray,
}

impl DType {
    /// Get the string representation of the type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    #[must_use]
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::Bool => ValueKind::BoolLike,
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 => ValueKind::UnsignedInt,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => ValueKind::SignedInt,
            Self::Float32 | Self::Float64 => ValueKind::Float,
        }
    }

    #[must_use]
    pub const fn is_unsigned(self) -> bool {
        matches!(self.kind(), ValueKind::UnsignedInt)
    }

    /// Size of one element in bytes
    #[must_use]
    pub const fn item_size(self) -> usize {
        match self {
            Self::Bool | Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnsignedInt => "unsigned-int",
            Self::SignedInt => "signed-int",
            Self::Float => "float",
            Self::BoolLike => "bool",
            Self::OtherNonArray => "other",
        }
    }
}

/// A single value that keeps the native type of the array it came from
///
/// Serializes as the bare number (or boolean), which is what display metadata expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

impl Scalar {
    /// The zero value of `dtype` (`false` for booleans)
    #[must_use]
    pub fn zero(dtype: DType) -> Self {
        crate::with_dtype!(dtype, T => T::default().into_scalar())
    }

    /// Placeholder limit for arrays without a single comparable value
    ///
    /// NaN for floating-point types, zero for everything else.
    #[must_use]
    pub fn undefined(dtype: DType) -> Self {
        match dtype {
            DType::Float32 => Self::Float32(f32::NAN),
            DType::Float64 => Self::Float64(f64::NAN),
            other => Self::zero(other),
        }
    }

    #[must_use]
    pub const fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::UInt8(_) => DType::UInt8,
            Self::UInt16(_) => DType::UInt16,
            Self::UInt32(_) => DType::UInt32,
            Self::UInt64(_) => DType::UInt64,
            Self::Int8(_) => DType::Int8,
            Self::Int16(_) => DType::Int16,
            Self::Int32(_) => DType::Int32,
            Self::Int64(_) => DType::Int64,
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
        }
    }

    /// Lossy conversion for comparisons and printing
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Bool(v) => f64::from(u8::from(v)),
            Self::UInt8(v) => f64::from(v),
            Self::UInt16(v) => f64::from(v),
            Self::UInt32(v) => f64::from(v),
            Self::UInt64(v) => v as f64,
            Self::Int8(v) => f64::from(v),
            Self::Int16(v) => f64::from(v),
            Self::Int32(v) => f64::from(v),
            Self::Int64(v) => v as f64,
            Self::Float32(v) => f64::from(v),
            Self::Float64(v) => v,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::UInt8(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Int8(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::Float32(v) => write!(f, "{}", v),
            Self::Float64(v) => write!(f, "{}", v),
        }
    }
}

/// Rust primitive that can be stored in a [`DynArray`]
pub trait Element: Copy + PartialOrd + Default + Send + Sync + fmt::Debug + 'static {
    const DTYPE: DType;

    fn into_scalar(self) -> Scalar;

    fn wrap(array: ArrayD<Self>) -> DynArray;

    /// Take the typed buffer back out, or return the array untouched on mismatch
    fn unwrap(array: DynArray) -> std::result::Result<ArrayD<Self>, DynArray>;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$variant;

                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }

                fn wrap(array: ArrayD<Self>) -> DynArray {
                    DynArray::$variant(array)
                }

                fn unwrap(array: DynArray) -> std::result::Result<ArrayD<Self>, DynArray> {
                    match array {
                        DynArray::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

impl_element! {
    bool => Bool,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
}

/// Run `$body` with `$T` bound to the Rust primitive matching a runtime [`DType`]
#[macro_export]
macro_rules! with_dtype {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            $crate::dtype::DType::Bool => {
                type $T = bool;
                $body
            }
            $crate::dtype::DType::UInt8 => {
                type $T = u8;
                $body
            }
            $crate::dtype::DType::UInt16 => {
                type $T = u16;
                $body
            }
            $crate::dtype::DType::UInt32 => {
                type $T = u32;
                $body
            }
            $crate::dtype::DType::UInt64 => {
                type $T = u64;
                $body
            }
            $crate::dtype::DType::Int8 => {
                type $T = i8;
                $body
            }
            $crate::dtype::DType::Int16 => {
                type $T = i16;
                $body
            }
            $crate::dtype::DType::Int32 => {
                type $T = i32;
                $body
            }
            $crate::dtype::DType::Int64 => {
                type $T = i64;
                $body
            }
            $crate::dtype::DType::Float32 => {
                type $T = f32;
                $body
            }
            $crate::dtype::DType::Float64 => {
                type $T = f64;
                $body
            }
        }
    };
}
