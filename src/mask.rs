use crate::error::Result;
use crate::image::{IconImage, TRANSPARENT};
use std::io::{Read, Write};

//===========================================================================//

/// Palette of a decoded mask: index 0 lets the pixel show, index 1 (a set
/// bit) hides it.
const MASK_PALETTE: [[u8; 4]; 2] = [TRANSPARENT, [0, 0, 0, u8::MAX]];

/// Returns the size in bytes of one mask row: one bit per pixel, padded to a
/// multiple of four bytes.
pub(crate) fn row_stride(width: u32) -> usize {
    ((width as usize + 7) / 8 + 3) & !3
}

//===========================================================================//

/// Reads an AND mask as a two-color paletted image, where index 1 marks a
/// hidden pixel.  Rows run bottom to top unless `top_down` is set.  Also
/// returns true if no bit was set, in which case the mask can be ignored.
pub(crate) fn read_mask<R: Read>(
    reader: &mut R,
    width: u32,
    height: u32,
    top_down: bool,
) -> Result<(IconImage, bool)> {
    let num_pixels = match (width as usize).checked_mul(height as usize) {
        Some(num) => num,
        None => format_error!("Width * Height is too large"),
    };
    let mut bits = vec![0u8; num_pixels];
    let mut opaque = true;
    if num_pixels > 0 {
        let mut row = vec![0u8; row_stride(width)];
        for file_row in 0..height {
            reader.read_exact(&mut row)?;
            let y = if top_down { file_row } else { height - file_row - 1 };
            let out = &mut bits[(y as usize) * (width as usize)..][..width as usize];
            for (col, bit) in out.iter_mut().enumerate() {
                *bit = (row[col / 8] >> (7 - col % 8)) & 0x1;
                if *bit != 0 {
                    opaque = false;
                }
            }
        }
    }
    let mask =
        IconImage::from_paletted_data(width, height, MASK_PALETTE.to_vec(), bits);
    Ok((mask, opaque))
}

/// Writes the AND mask for an image: a set bit for every fully transparent
/// pixel, rows from bottom to top.  Returns the number of bytes written.
pub(crate) fn write_mask<W: Write>(
    image: &IconImage,
    mut writer: W,
) -> Result<usize> {
    let width = image.width();
    let mut row = vec![0u8; row_stride(width)];
    let mut written = 0;
    for y in (0..image.height()).rev() {
        row.fill(0);
        for x in 0..width {
            if image.pixel(x, y)[3] == 0 {
                let col = x as usize;
                row[col / 8] |= 1 << (7 - col % 8);
            }
        }
        writer.write_all(&row)?;
        written += row.len();
    }
    Ok(written)
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{read_mask, row_stride, write_mask};
    use crate::image::{IconImage, TRANSPARENT};

    #[test]
    fn row_stride_is_four_byte_aligned() {
        assert_eq!(row_stride(1), 4);
        assert_eq!(row_stride(32), 4);
        assert_eq!(row_stride(33), 8);
        assert_eq!(row_stride(256), 32);
    }

    #[test]
    fn read_bottom_up_mask() {
        let data: &[u8] = b"\x80\x00\x00\x00\x40\x00\x00\x00";
        let (mask, opaque) = read_mask(&mut &data[..], 2, 2, false).unwrap();
        assert!(!opaque);
        // The first stored row is the bottom row.
        assert_eq!(mask.raw_data(), &[0, 1, 1, 0]);
    }

    #[test]
    fn read_top_down_mask() {
        let data: &[u8] = b"\x80\x00\x00\x00\x40\x00\x00\x00";
        let (mask, _) = read_mask(&mut &data[..], 2, 2, true).unwrap();
        assert_eq!(mask.raw_data(), &[1, 0, 0, 1]);
    }

    #[test]
    fn all_zero_mask_is_opaque() {
        let data = [0u8; 8];
        let (mask, opaque) = read_mask(&mut &data[..], 3, 2, false).unwrap();
        assert!(opaque);
        assert_eq!(mask.raw_data(), &[0; 6]);
    }

    #[test]
    fn empty_mask_reads_nothing() {
        let data: &[u8] = b"\xff";
        let mut reader = data;
        let (_, opaque) = read_mask(&mut reader, 0, 5, false).unwrap();
        assert!(opaque);
        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn truncated_mask_fails() {
        let data = [0u8; 6];
        assert!(read_mask(&mut &data[..], 3, 2, false).is_err());
    }

    #[test]
    fn write_then_read_mask() {
        let opaque = [1, 2, 3, 0xff];
        let mut rgba = Vec::new();
        for index in 0..(9 * 3) {
            let color = if index % 4 == 0 { TRANSPARENT } else { opaque };
            rgba.extend_from_slice(&color);
        }
        let image = IconImage::from_rgba_data(9, 3, rgba);
        let mut data = Vec::new();
        let written = write_mask(&image, &mut data).unwrap();
        assert_eq!(written, 3 * 4);
        assert_eq!(data.len(), written);
        // The bottom row (pixels 18..27) comes first; 20 and 24 are
        // transparent.
        assert_eq!(&data[..4], b"\x22\x00\x00\x00");
        let (mask, opaque) = read_mask(&mut data.as_slice(), 9, 3, false).unwrap();
        assert!(!opaque);
        for y in 0..3 {
            for x in 0..9 {
                let hidden = image.pixel(x, y)[3] == 0;
                assert_eq!(mask.raw_data()[(y * 9 + x) as usize] == 1, hidden);
            }
        }
    }
}

//===========================================================================//
