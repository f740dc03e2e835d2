//! Reading and writing ICO (icon) files.
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//!
//! let file = File::open("path/to/app.ico").unwrap();
//! let image = icocur::ico::decode(file).unwrap();
//! println!("Largest icon is {}x{}", image.width(), image.height());
//! ```

use crate::error::Result;
use crate::icondir::{Decoder, Encoder, Hotspot};
use crate::image::{IconImage, ImageConfig};
use crate::restype::ResourceType;
use std::io::{Read, Seek, Write};

//===========================================================================//

/// Decodes every icon in the file, in directory order.
pub fn decode_all<R: Read + Seek>(reader: R) -> Result<Vec<IconImage>> {
    Decoder::new(reader, ResourceType::Icon)?.decode_all()
}

/// Decodes the largest icon in the file, preferring the greatest color depth
/// among icons of equal size.
pub fn decode<R: Read + Seek>(reader: R) -> Result<IconImage> {
    let mut decoder = Decoder::new(reader, ResourceType::Icon)?;
    let best = decoder.best();
    decoder.decode(best)
}

/// Reports the size and color model of the icon [`decode`] would return,
/// without decoding any pixels.
pub fn decode_config<R: Read + Seek>(reader: R) -> Result<ImageConfig> {
    let mut decoder = Decoder::new(reader, ResourceType::Icon)?;
    let best = decoder.best();
    decoder.decode_config(best)
}

/// Writes the images out as one ICO file.  Every image must be between 1x1
/// and 256x256 pixels.
pub fn encode_all<W: Write>(writer: W, images: &[IconImage]) -> Result<()> {
    let mut encoder = Encoder::new(writer, ResourceType::Icon);
    for image in images {
        encoder.add(image, Hotspot::default())?;
    }
    encoder.finish()?;
    Ok(())
}

/// Writes a single image out as an ICO file.
pub fn encode<W: Write>(writer: W, image: &IconImage) -> Result<()> {
    encode_all(writer, std::slice::from_ref(image))
}

//===========================================================================//
