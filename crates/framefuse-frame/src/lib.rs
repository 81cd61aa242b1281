//! Fixed-shape typed frames.
//!
//! Every channel agrees on a [`FrameDescriptor`] up front: an element type,
//! a shape and a byte order. A frame on the wire is then exactly
//! `product(shape) * element width` raw bytes, with no header of any kind.
//! This crate turns those bytes into a typed [`Frame`] and back.

pub mod codec;
pub mod descriptor;
pub mod element;
pub mod error;

pub use codec::{decode_frame, encode_frame, Frame, FrameData};
pub use descriptor::{ByteOrder, FrameDescriptor};
pub use element::ElementType;
pub use error::{FrameError, Result};
