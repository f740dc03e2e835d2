use crate::bmp::{BI_BITFIELDS, BITFIELDS_LEN, FILE_HEADER_LEN, INFO_HEADER_LEN};
use crate::error::{Error, Result};
use crate::stream::{skip, PeekReader};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::Read;

//===========================================================================//

// The signature that all PNG files start with.
pub(crate) const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

// The largest width or height an entry can have.
const MAX_SIZE: u32 = 256;

// The length of an IHDR chunk's payload.
const IHDR_LEN: u32 = 13;
// The length of a chunk's CRC trailer.
const CRC_LEN: u64 = 4;

// PNG color types:
const CT_GRAYSCALE: u8 = 0;
const CT_TRUECOLOR: u8 = 2;
const CT_PALETTED: u8 = 3;
const CT_GRAYSCALE_ALPHA: u8 = 4;
const CT_TRUECOLOR_ALPHA: u8 = 6;

/// The length of the synthesized BITMAPFILEHEADER plus the BITMAPINFOHEADER.
pub(crate) const DIB_HEADER_LEN: usize = (FILE_HEADER_LEN + INFO_HEADER_LEN) as usize;

//===========================================================================//

/// How an entry's image data is encoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum SubImageFormat {
    Png,
    /// A bitmap plus AND mask.  `header` holds a synthesized BITMAPFILEHEADER
    /// followed by the entry's BITMAPINFOHEADER, patched so that together
    /// with the rest of the entry they form a standalone BMP file.
    Dib { header: [u8; DIB_HEADER_LEN], top_down: bool },
}

impl SubImageFormat {
    /// Returns the number of bytes at the start of the entry's data that
    /// were consumed into the header and don't need to be read again.
    pub(crate) fn consumed_len(&self) -> u64 {
        match self {
            SubImageFormat::Png => 0,
            SubImageFormat::Dib { .. } => INFO_HEADER_LEN as u64,
        }
    }
}

/// What the embedded header of one entry says about its image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct SubImageHeader {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) num_colors: u32,
    pub(crate) bits_per_pixel: u16,
    pub(crate) format: SubImageFormat,
}

impl SubImageHeader {
    /// Sniffs and parses the header at the start of an entry's data.
    pub(crate) fn read<R: Read>(reader: R) -> Result<SubImageHeader> {
        let mut reader = PeekReader::new(reader);
        if reader.peek(PNG_SIGNATURE.len())? == PNG_SIGNATURE {
            read_png_header(&mut reader)
        } else {
            read_dib_header(&mut reader)
        }
    }

    pub(crate) fn consumed_len(&self) -> u64 {
        self.format.consumed_len()
    }

    pub(crate) fn is_png(&self) -> bool {
        self.format == SubImageFormat::Png
    }
}

//===========================================================================//

fn read_png_header<R: Read>(reader: &mut R) -> Result<SubImageHeader> {
    skip(reader, PNG_SIGNATURE.len() as u64)?;
    let length = match find_chunk(reader, b"IHDR")? {
        Some(length) => length,
        None => return Err(Error::Truncated),
    };
    if length != IHDR_LEN {
        unsupported!("PNG image");
    }
    let mut ihdr = [0u8; IHDR_LEN as usize + CRC_LEN as usize];
    reader.read_exact(&mut ihdr)?;
    let width = BigEndian::read_u32(&ihdr[0..4]);
    let height = BigEndian::read_u32(&ihdr[4..8]);
    let (bit_depth, color_type) = (ihdr[8], ihdr[9]);
    let bits_per_pixel: u16 = match (bit_depth, color_type) {
        (1 | 2 | 4 | 8, CT_PALETTED) | (1 | 2 | 4 | 8, CT_GRAYSCALE) => {
            bit_depth as u16
        }
        (8, CT_TRUECOLOR) => 24,
        (8, CT_GRAYSCALE_ALPHA) => 16,
        (8, CT_TRUECOLOR_ALPHA) => 32,
        (16, CT_GRAYSCALE) => 16,
        (16, CT_TRUECOLOR) => 48,
        (16, CT_GRAYSCALE_ALPHA) => 32,
        (16, CT_TRUECOLOR_ALPHA) => 64,
        _ => unsupported!("PNG image"),
    };
    let mut num_colors = 0;
    if color_type == CT_PALETTED {
        // A missing PLTE chunk just leaves the color count unknown.
        if let Some(length) = find_chunk(reader, b"PLTE")? {
            num_colors = length / 3;
        }
    }
    Ok(SubImageHeader {
        width,
        height,
        num_colors,
        bits_per_pixel,
        format: SubImageFormat::Png,
    })
}

/// Scans forward to the next chunk of the given type and returns its payload
/// length, leaving the reader at the start of the payload.  Returns `None` if
/// the data ends while skipping another chunk.
fn find_chunk<R: Read>(reader: &mut R, chunk_type: &[u8; 4]) -> Result<Option<u32>> {
    let mut chunk_header = [0u8; 8];
    loop {
        reader.read_exact(&mut chunk_header)?;
        let length = BigEndian::read_u32(&chunk_header[0..4]);
        if &chunk_header[4..] == chunk_type {
            return Ok(Some(length));
        }
        match skip(reader, length as u64 + CRC_LEN) {
            Ok(()) => {}
            Err(Error::Truncated) => return Ok(None),
            Err(error) => return Err(error),
        }
    }
}

//===========================================================================//

fn read_dib_header<R: Read>(reader: &mut R) -> Result<SubImageHeader> {
    let file_len = FILE_HEADER_LEN as usize;
    let mut header = [0u8; DIB_HEADER_LEN];
    reader.read_exact(&mut header[file_len..])?;
    let info = &header[file_len..];
    let info_len = LittleEndian::read_u32(&info[0..4]);
    if info_len < INFO_HEADER_LEN {
        unsupported!("BMP image");
    }
    let width = LittleEndian::read_i32(&info[4..8]);
    if width < 0 {
        format_error!("Invalid BMP width ({})", width);
    }
    let width = width as u32;
    let stored_height = LittleEndian::read_i32(&info[8..12]);
    let top_down = stored_height < 0;
    // The height is stored doubled, counting the rows of both the color data
    // and the AND mask.
    let stored_height = stored_height.unsigned_abs();
    if stored_height % 2 != 0 {
        unsupported!("BMP image");
    }
    let height = stored_height / 2;
    // Nothing is allocated from these dimensions until they are known to fit.
    if width == 0 || width > MAX_SIZE || height == 0 || height > MAX_SIZE {
        format_error!("invalid image size: {}x{}", width, height);
    }
    let bits_per_pixel = LittleEndian::read_u16(&info[14..16]);
    let compression = LittleEndian::read_u32(&info[16..20]);
    let mut num_colors = LittleEndian::read_u32(&info[32..36]);
    if bits_per_pixel <= 8 && num_colors == 0 {
        num_colors = 1 << bits_per_pixel;
    }
    let bitfields_len = if info_len == INFO_HEADER_LEN
        && (bits_per_pixel == 16 || bits_per_pixel == 32)
        && compression == BI_BITFIELDS
    {
        BITFIELDS_LEN
    } else {
        0
    };
    let pixel_offset = FILE_HEADER_LEN
        .saturating_add(info_len)
        .saturating_add(num_colors.saturating_mul(4))
        .saturating_add(bitfields_len);
    header[0] = b'B';
    header[1] = b'M';
    LittleEndian::write_u32(&mut header[10..14], pixel_offset);
    let signed_height = if top_down { -(height as i32) } else { height as i32 };
    LittleEndian::write_i32(&mut header[file_len + 8..file_len + 12], signed_height);
    Ok(SubImageHeader {
        width,
        height,
        num_colors,
        bits_per_pixel,
        format: SubImageFormat::Dib { header, top_down },
    })
}

//===========================================================================//


//===========================================================================//
