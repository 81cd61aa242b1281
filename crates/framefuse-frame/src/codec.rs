use bytes::{Buf, BufMut, BytesMut};

use crate::descriptor::{ByteOrder, FrameDescriptor};
use crate::element::ElementType;
use crate::error::{FrameError, Result};

/// Element storage of a decoded frame, flattened in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            FrameData::I8($v) => $body,
            FrameData::U8($v) => $body,
            FrameData::I16($v) => $body,
            FrameData::U16($v) => $body,
            FrameData::I32($v) => $body,
            FrameData::U32($v) => $body,
            FrameData::I64($v) => $body,
            FrameData::U64($v) => $body,
            FrameData::F32($v) => $body,
            FrameData::F64($v) => $body,
        }
    };
}

impl FrameData {
    pub fn element_type(&self) -> ElementType {
        match self {
            FrameData::I8(_) => ElementType::I8,
            FrameData::U8(_) => ElementType::U8,
            FrameData::I16(_) => ElementType::I16,
            FrameData::U16(_) => ElementType::U16,
            FrameData::I32(_) => ElementType::I32,
            FrameData::U32(_) => ElementType::U32,
            FrameData::I64(_) => ElementType::I64,
            FrameData::U64(_) => ElementType::U64,
            FrameData::F32(_) => ElementType::F32,
            FrameData::F64(_) => ElementType::F64,
        }
    }

    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a flat index, widened to `f64`.
    ///
    /// 64-bit integers above 2^53 lose precision.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        each_variant!(self, v => v.get(index).map(|&x| x as f64))
    }
}

macro_rules! impl_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for FrameData {
                fn from(values: Vec<$ty>) -> Self {
                    FrameData::$variant(values)
                }
            }
        )*
    };
}

impl_from_vec!(
    i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32,
    u32 => U32, i64 => I64, u64 => U64, f32 => F32, f64 => F64,
);

/// One decoded frame: typed elements plus their shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    shape: Vec<usize>,
    data: FrameData,
}

macro_rules! typed_accessor {
    ($($name:ident => $variant:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&self) -> Option<&[$ty]> {
                match &self.data {
                    FrameData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        )*
    };
}

impl Frame {
    /// Build a frame, checking that `data` holds exactly `product(shape)` elements.
    pub fn new(shape: impl Into<Vec<usize>>, data: impl Into<FrameData>) -> Result<Self> {
        let shape = shape.into();
        let data = data.into();
        let expected = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
        if shape.is_empty() || expected != Some(data.len()) {
            return Err(FrameError::ShapeMismatch(format!(
                "{} elements cannot fill shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &FrameData {
        &self.data
    }

    pub fn into_data(self) -> FrameData {
        self.data
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at a multi-dimensional (row-major) index, widened to `f64`.
    pub fn get_f64(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0usize;
        for (&i, &dim) in index.iter().zip(&self.shape) {
            if i >= dim {
                return None;
            }
            flat = flat * dim + i;
        }
        self.data.get_f64(flat)
    }

    typed_accessor!(
        as_i8 => I8: i8,
        as_u8 => U8: u8,
        as_i16 => I16: i16,
        as_u16 => U16: u16,
        as_i32 => I32: i32,
        as_u32 => U32: u32,
        as_i64 => I64: i64,
        as_u64 => U64: u64,
        as_f32 => F32: f32,
        as_f64 => F64: f64,
    );
}

macro_rules! get_all {
    ($src:expr, $count:expr, $order:expr, $le:ident, $be:ident) => {{
        let mut out = Vec::with_capacity($count);
        for _ in 0..$count {
            out.push(match $order {
                ByteOrder::Little => $src.$le(),
                ByteOrder::Big => $src.$be(),
            });
        }
        out
    }};
}

macro_rules! put_all {
    ($dst:expr, $values:expr, $order:expr, $le:ident, $be:ident) => {{
        for &value in $values.iter() {
            match $order {
                ByteOrder::Little => $dst.$le(value),
                ByteOrder::Big => $dst.$be(value),
            }
        }
    }};
}

/// Decode one raw frame buffer according to `descriptor`.
///
/// The buffer must be exactly `descriptor.frame_size()` bytes; anything else
/// is a [`FrameError::LengthMismatch`]. Decoding has no side effects.
pub fn decode_frame(descriptor: &FrameDescriptor, raw: &[u8]) -> Result<Frame> {
    if raw.len() != descriptor.frame_size() {
        return Err(FrameError::LengthMismatch {
            expected: descriptor.frame_size(),
            actual: raw.len(),
        });
    }

    let mut src = raw;
    let n = descriptor.element_count();
    let order = descriptor.byte_order();
    let data = match descriptor.element_type() {
        ElementType::I8 => FrameData::I8(get_all!(src, n, order, get_i8, get_i8)),
        ElementType::U8 => FrameData::U8(get_all!(src, n, order, get_u8, get_u8)),
        ElementType::I16 => FrameData::I16(get_all!(src, n, order, get_i16_le, get_i16)),
        ElementType::U16 => FrameData::U16(get_all!(src, n, order, get_u16_le, get_u16)),
        ElementType::I32 => FrameData::I32(get_all!(src, n, order, get_i32_le, get_i32)),
        ElementType::U32 => FrameData::U32(get_all!(src, n, order, get_u32_le, get_u32)),
        ElementType::I64 => FrameData::I64(get_all!(src, n, order, get_i64_le, get_i64)),
        ElementType::U64 => FrameData::U64(get_all!(src, n, order, get_u64_le, get_u64)),
        ElementType::F32 => FrameData::F32(get_all!(src, n, order, get_f32_le, get_f32)),
        ElementType::F64 => FrameData::F64(get_all!(src, n, order, get_f64_le, get_f64)),
    };

    Ok(Frame {
        shape: descriptor.shape().to_vec(),
        data,
    })
}

/// Encode a frame into its raw wire bytes, appending to `dst`.
///
/// The frame must match `descriptor` in element type and shape.
pub fn encode_frame(
    frame: &Frame,
    descriptor: &FrameDescriptor,
    dst: &mut BytesMut,
) -> Result<()> {
    if frame.element_type() != descriptor.element_type() {
        return Err(FrameError::ShapeMismatch(format!(
            "element type {} does not match {}",
            frame.element_type(),
            descriptor.element_type()
        )));
    }
    if frame.shape() != descriptor.shape() {
        return Err(FrameError::ShapeMismatch(format!(
            "shape {:?} does not match {:?}",
            frame.shape(),
            descriptor.shape()
        )));
    }

    dst.reserve(descriptor.frame_size());
    let order = descriptor.byte_order();
    match frame.data() {
        FrameData::I8(v) => put_all!(dst, v, order, put_i8, put_i8),
        FrameData::U8(v) => put_all!(dst, v, order, put_u8, put_u8),
        FrameData::I16(v) => put_all!(dst, v, order, put_i16_le, put_i16),
        FrameData::U16(v) => put_all!(dst, v, order, put_u16_le, put_u16),
        FrameData::I32(v) => put_all!(dst, v, order, put_i32_le, put_i32),
        FrameData::U32(v) => put_all!(dst, v, order, put_u32_le, put_u32),
        FrameData::I64(v) => put_all!(dst, v, order, put_i64_le, put_i64),
        FrameData::U64(v) => put_all!(dst, v, order, put_u64_le, put_u64),
        FrameData::F32(v) => put_all!(dst, v, order, put_f32_le, put_f32),
        FrameData::F64(v) => put_all!(dst, v, order, put_f64_le, put_f64),
    }
    Ok(())
}
