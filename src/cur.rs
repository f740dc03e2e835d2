//! Reading and writing CUR (cursor) files.
//!
//! A cursor file is laid out like an icon file, except that every entry
//! records a hotspot instead of its color depth.

use crate::error::Result;
use crate::icondir::{Decoder, Encoder};
use crate::image::{IconImage, ImageConfig};
use crate::restype::ResourceType;
use std::io::{Read, Seek, Write};

pub use crate::icondir::Hotspot;

//===========================================================================//

/// The contents of a cursor file: each image paired, by index, with its
/// hotspot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Cur {
    /// The cursor images, in directory order.
    pub cursors: Vec<IconImage>,
    /// The hotspot of each image in `cursors`.
    pub hotspots: Vec<Hotspot>,
}

/// Decodes every cursor in the file, along with its hotspot.
pub fn decode_all<R: Read + Seek>(reader: R) -> Result<Cur> {
    let mut decoder = Decoder::new(reader, ResourceType::Cursor)?;
    let cursors = decoder.decode_all()?;
    let hotspots = decoder.hotspots().unwrap_or_default();
    Ok(Cur { cursors, hotspots })
}

/// Decodes the largest cursor in the file, preferring the greatest color
/// depth among cursors of equal size.
pub fn decode<R: Read + Seek>(reader: R) -> Result<IconImage> {
    let mut decoder = Decoder::new(reader, ResourceType::Cursor)?;
    let best = decoder.best();
    decoder.decode(best)
}

/// Reports the size and color model of the cursor [`decode`] would return,
/// without decoding any pixels.
pub fn decode_config<R: Read + Seek>(reader: R) -> Result<ImageConfig> {
    let mut decoder = Decoder::new(reader, ResourceType::Cursor)?;
    let best = decoder.best();
    decoder.decode_config(best)
}

/// Writes the cursors out as one CUR file.  There must be exactly one
/// hotspot per image, and no hotspot coordinate may exceed 256.
pub fn encode_all<W: Write>(writer: W, cur: &Cur) -> Result<()> {
    if cur.cursors.len() != cur.hotspots.len() {
        format_error!(
            "cursor and hotspot counts differ ({} vs {})",
            cur.cursors.len(),
            cur.hotspots.len()
        );
    }
    let mut encoder = Encoder::new(writer, ResourceType::Cursor);
    for (image, &hotspot) in cur.cursors.iter().zip(cur.hotspots.iter()) {
        encoder.add(image, hotspot)?;
    }
    encoder.finish()?;
    Ok(())
}

/// Writes a single image out as a CUR file with the given hotspot.
pub fn encode<W: Write>(
    writer: W,
    image: &IconImage,
    hotspot: Hotspot,
) -> Result<()> {
    let mut encoder = Encoder::new(writer, ResourceType::Cursor);
    encoder.add(image, hotspot)?;
    encoder.finish()?;
    Ok(())
}

//===========================================================================//
