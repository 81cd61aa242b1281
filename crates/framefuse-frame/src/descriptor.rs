use crate::element::ElementType;
use crate::error::{FrameError, Result};

/// Byte order of multi-byte elements on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// Shape and element type of every frame on one channel.
///
/// Fixed when the channel is created. The frame byte size is always
/// positive: empty shapes, zero dimensions and overflowing sizes are
/// rejected by [`FrameDescriptor::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameDescriptor {
    element_type: ElementType,
    shape: Vec<usize>,
    byte_order: ByteOrder,
    element_count: usize,
    frame_size: usize,
}

impl FrameDescriptor {
    /// Describe little-endian frames of `shape` elements of `element_type`.
    pub fn new(element_type: ElementType, shape: impl Into<Vec<usize>>) -> Result<Self> {
        Self::with_byte_order(element_type, shape, ByteOrder::default())
    }

    /// Describe frames with an explicit byte order.
    pub fn with_byte_order(
        element_type: ElementType,
        shape: impl Into<Vec<usize>>,
        byte_order: ByteOrder,
    ) -> Result<Self> {
        let shape = shape.into();
        if shape.is_empty() {
            return Err(FrameError::EmptyShape);
        }
        if let Some(axis) = shape.iter().position(|&d| d == 0) {
            return Err(FrameError::ZeroDimension { axis });
        }

        let element_count = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| FrameError::SizeOverflow {
                shape: shape.clone(),
            })?;
        let frame_size = element_count
            .checked_mul(element_type.byte_width())
            .ok_or_else(|| FrameError::SizeOverflow {
                shape: shape.clone(),
            })?;

        Ok(Self {
            element_type,
            shape,
            byte_order,
            element_count,
            frame_size,
        })
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Number of elements per frame (`product(shape)`).
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Bytes per frame on the wire.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}
