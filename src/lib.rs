//! A library for encoding/decoding ICO (icon) and CUR (cursor) files.
//!
//! Both formats share one container layout: a short header, a directory with
//! one record per image, then the image data itself.  Each image is stored
//! either as a complete PNG file or as a headerless bitmap followed by a
//! one-bit AND mask marking its transparent pixels.
//!
//! # Overview
//!
//! The [`ico`] and [`cur`] modules cover the common cases: decoding the best
//! image in a file, decoding all of them, and writing a set of images back
//! out.  For finer control, a [`Decoder`] exposes every directory entry
//! before any pixels are decoded, and an [`Encoder`] accumulates images and
//! writes the finished file in one go.
//!
//! Sources that can't seek (pipes, network streams) are supported through
//! [`Decoder::new_forward_only`], which reads each entry's data into memory in
//! file order.
//!
//! # Example
//!
//! ```
//! use icocur::{IconImage, ResourceType};
//! use std::io::Cursor;
//!
//! // Build a small icon with one transparent pixel.
//! let mut rgba = vec![0xff; 4 * 4 * 4];
//! rgba[3] = 0;
//! let image = IconImage::from_rgba_data(4, 4, rgba);
//!
//! let mut data = Vec::new();
//! icocur::ico::encode(&mut data, &image).unwrap();
//! assert_eq!(icocur::guess_resource_type(&data), Some(ResourceType::Icon));
//!
//! let decoded = icocur::ico::decode(Cursor::new(data)).unwrap();
//! assert_eq!(decoded.pixel(0, 0), [0, 0, 0, 0]);
//! assert_eq!(decoded.pixel(1, 0), [0xff, 0xff, 0xff, 0xff]);
//! ```

#![warn(missing_docs)]

#[macro_use]
mod macros;

mod assemble;
mod bmp;
mod bmpdepth;
pub mod cur;
mod error;
mod header;
pub mod ico;
mod icondir;
mod image;
mod mask;
mod restype;
mod stream;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::icondir::{Decoder, Encoder, Hotspot, IconDirEntry};
pub use crate::image::{ColorModel, IconImage, ImageConfig};
pub use crate::restype::ResourceType;

//===========================================================================//

/// Guesses whether the data (at least its first four bytes) starts an ICO or
/// a CUR file.
pub fn guess_resource_type(prefix: &[u8]) -> Option<ResourceType> {
    ResourceType::from_magic(prefix)
}

//===========================================================================//
