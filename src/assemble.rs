use crate::bmp::{self, FILE_HEADER_LEN};
use crate::error::Result;
use crate::header::SubImageHeader;
use crate::icondir::Hotspot;
use crate::image::{ColorModel, IconImage, OPAQUE_BLACK};
use crate::mask;
use byteorder::{ByteOrder, LittleEndian};

//===========================================================================//

// Size limits for images in an ICO/CUR file:
const MIN_SIZE: u32 = 1;
const MAX_SIZE: u32 = 256;
// Palette length limits:
const MAX_PALETTE_LEN: usize = 256;
// Cursor hotspot limit, on both axes:
const MAX_HOTSPOT: u16 = 256;

// Offsets of fields within a BITMAPINFOHEADER:
const HEIGHT_FIELD: usize = 8;
const IMAGE_SIZE_FIELD: usize = 20;

//===========================================================================//

/// One image, fully encoded and ready to be laid out in a container.
#[derive(Clone, Debug)]
pub(crate) struct EncodedEntry {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) num_colors: u32,
    pub(crate) bits_per_pixel: u16,
    pub(crate) hotspot: Hotspot,
    pub(crate) data: Vec<u8>,
}

/// Checks that an image can be stored in a container, then encodes it as
/// either a PNG or a bitmap plus AND mask.
pub(crate) fn encode_entry(
    image: &IconImage,
    hotspot: Hotspot,
) -> Result<EncodedEntry> {
    let (width, height) = (image.width(), image.height());
    if width < MIN_SIZE || height < MIN_SIZE || width > MAX_SIZE || height > MAX_SIZE {
        format_error!("invalid image size: {}x{}", width, height);
    }
    if let Some(palette) = image.palette() {
        if palette.is_empty() || palette.len() > MAX_PALETTE_LEN {
            format_error!("bad palette length: {}", palette.len());
        }
    }
    if hotspot.x > MAX_HOTSPOT || hotspot.y > MAX_HOTSPOT {
        format_error!("invalid hotspot: {}x{}", hotspot.x, hotspot.y);
    }

    // Full-size images must be stored as 32-bit PNGs, unless they're paletted
    // or grayscale and can keep a compact color table as a bitmap.
    let compact = matches!(image.color_model(), ColorModel::Paletted | ColorModel::Gray);
    let use_png = width == MAX_SIZE && height == MAX_SIZE && !compact;
    tracing::trace!(width, height, use_png, "Encoding entry");
    let data = if use_png {
        let mut data = Vec::new();
        image.write_png(&mut data)?;
        data
    } else {
        encode_dib(image)?
    };

    // Take the directory metadata from what we actually wrote, so that it
    // always matches what a decoder will see.
    let header = SubImageHeader::read(data.as_slice())?;
    Ok(EncodedEntry {
        width,
        height,
        num_colors: header.num_colors,
        bits_per_pixel: header.bits_per_pixel,
        hotspot,
        data,
    })
}

fn encode_dib(image: &IconImage) -> Result<Vec<u8>> {
    let normalized = normalize_for_dib(image);
    let mut bmp_data = Vec::new();
    bmp::write_bmp(normalized.as_ref().unwrap_or(image), &mut bmp_data)?;
    // The BITMAPFILEHEADER isn't stored in the container.
    let mut data = bmp_data.split_off(FILE_HEADER_LEN as usize);
    // The mask always comes from the original alpha, not the normalized image.
    let mask_len = mask::write_mask(image, &mut data)?;
    let stored_height = 2 * image.height() as i32;
    LittleEndian::write_i32(&mut data[HEIGHT_FIELD..HEIGHT_FIELD + 4], stored_height);
    let field = &mut data[IMAGE_SIZE_FIELD..IMAGE_SIZE_FIELD + 4];
    let image_size = LittleEndian::read_u32(field);
    LittleEndian::write_u32(field, image_size + mask_len as u32);
    Ok(data)
}

/// Returns a replacement for `image` that a bitmap can hold, or `None` if the
/// image can be written as-is.  Transparency moves into the AND mask, so it
/// doesn't need to survive here.
fn normalize_for_dib(image: &IconImage) -> Option<IconImage> {
    match image.color_model() {
        ColorModel::Paletted => {
            let palette = image.palette()?;
            let mut opaque: Vec<[u8; 4]> =
                palette.iter().copied().filter(|color| color[3] != 0).collect();
            let mut redraw = opaque.len() != palette.len();
            if opaque.is_empty() {
                opaque.push(OPAQUE_BLACK);
            }
            // Bitmaps can't be 2 bpp in a container, so a 3- or 4-color
            // palette is padded out to the next depth.
            if opaque.len() == 3 || opaque.len() == 4 {
                opaque.resize(5, OPAQUE_BLACK);
                redraw = true;
            }
            if !redraw {
                return None;
            }
            let (width, height) = (image.width(), image.height());
            let mut indices = vec![0u8; (width as usize) * (height as usize)];
            for y in 0..height {
                for x in 0..width {
                    let color = image.pixel(x, y);
                    if color[3] == 0 {
                        continue;
                    }
                    if let Some(index) = opaque.iter().position(|&c| c == color) {
                        indices[(y as usize) * (width as usize) + (x as usize)] =
                            index as u8;
                    }
                }
            }
            Some(IconImage::from_paletted_data(width, height, opaque, indices))
        }
        ColorModel::Gray => None,
        ColorModel::Rgb | ColorModel::Rgba => {
            if image.has_partial_alpha() {
                Some(image.flatten_onto_black())
            } else {
                None
            }
        }
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{encode_entry, normalize_for_dib};
    use byteorder::{ByteOrder, LittleEndian};
    use crate::error::Error;
    use crate::icondir::Hotspot;
    use crate::image::{ColorModel, IconImage, OPAQUE_BLACK, TRANSPARENT};

    fn format_message(result: Result<super::EncodedEntry, Error>) -> String {
        match result {
            Err(Error::Format(message)) => message,
            Err(error) => panic!("expected a format error, got {:?}", error),
            Ok(_) => panic!("expected a format error"),
        }
    }

    #[test]
    fn rejects_bad_sizes() {
        let empty = IconImage::from_rgba_data(0, 0, Vec::new());
        assert_eq!(
            format_message(encode_entry(&empty, Hotspot::default())),
            "invalid image size: 0x0"
        );
        let wide = IconImage::from_gray_data(257, 1, vec![0; 257]);
        assert_eq!(
            format_message(encode_entry(&wide, Hotspot::default())),
            "invalid image size: 257x1"
        );
    }

    #[test]
    fn rejects_bad_palettes_and_hotspots() {
        let image = IconImage::from_paletted_data(1, 1, Vec::new(), vec![0]);
        assert_eq!(
            format_message(encode_entry(&image, Hotspot::default())),
            "bad palette length: 0"
        );
        let image = IconImage::from_gray_data(1, 1, vec![0]);
        let hotspot = Hotspot { x: 3, y: 257 };
        assert_eq!(
            format_message(encode_entry(&image, hotspot)),
            "invalid hotspot: 3x257"
        );
    }

    #[test]
    fn full_size_truecolor_becomes_png() {
        let image = IconImage::from_rgb_data(256, 256, vec![0x80; 256 * 256 * 3]);
        let entry = encode_entry(&image, Hotspot::default()).unwrap();
        assert!(entry.data.starts_with(b"\x89PNG"));
        assert_eq!(entry.bits_per_pixel, 32);
        assert_eq!(entry.num_colors, 0);
    }

    #[test]
    fn full_size_gray_stays_dib() {
        let image = IconImage::from_gray_data(256, 256, vec![0x80; 256 * 256]);
        let entry = encode_entry(&image, Hotspot::default()).unwrap();
        assert!(!entry.data.starts_with(b"\x89PNG"));
        assert_eq!(entry.bits_per_pixel, 8);
        assert_eq!(entry.num_colors, 256);
    }

    #[test]
    fn dib_height_and_size_include_mask() {
        let image = IconImage::from_paletted_data(
            3,
            2,
            vec![[0xff, 0, 0, 0xff], [0, 0xff, 0, 0xff]],
            vec![0, 1, 0, 1, 0, 1],
        );
        let entry = encode_entry(&image, Hotspot::default()).unwrap();
        assert_eq!(entry.bits_per_pixel, 1);
        assert_eq!(entry.num_colors, 2);
        assert_eq!(LittleEndian::read_i32(&entry.data[8..12]), 4);
        // Two 4-byte pixel rows plus two 4-byte mask rows.
        assert_eq!(LittleEndian::read_u32(&entry.data[20..24]), 16);
        assert_eq!(entry.data.len(), 40 + 2 * 4 + 16);
    }

    #[test]
    fn transparent_palette_entries_are_dropped() {
        let palette = vec![
            TRANSPARENT,
            [1, 1, 1, 0xff],
            [2, 2, 2, 0xff],
            [3, 3, 3, 0xff],
            [4, 4, 4, 0xff],
            [5, 5, 5, 0xff],
        ];
        let image =
            IconImage::from_paletted_data(3, 1, palette, vec![0, 5, 1]);
        let normalized = normalize_for_dib(&image).unwrap();
        assert_eq!(normalized.palette().unwrap().len(), 5);
        assert_eq!(normalized.raw_data(), &[0, 4, 0]);
    }

    #[test]
    fn small_palettes_are_padded() {
        let palette = vec![[1, 1, 1, 0xff], TRANSPARENT, [2, 2, 2, 0xff], [3, 3, 3, 0xff]];
        let image = IconImage::from_paletted_data(2, 2, palette, vec![0, 1, 2, 3]);
        let normalized = normalize_for_dib(&image).unwrap();
        let palette = normalized.palette().unwrap();
        assert_eq!(palette.len(), 5);
        assert_eq!(palette[3], OPAQUE_BLACK);
        assert_eq!(palette[4], OPAQUE_BLACK);
        assert_eq!(normalized.raw_data(), &[0, 0, 1, 2]);
        let entry = encode_entry(&image, Hotspot::default()).unwrap();
        assert_eq!(entry.bits_per_pixel, 4);
        assert_eq!(entry.num_colors, 5);
    }

    #[test]
    fn compact_palettes_pass_through() {
        let palette = vec![[1, 1, 1, 0xff], [2, 2, 2, 0xff]];
        let image = IconImage::from_paletted_data(2, 1, palette, vec![0, 1]);
        assert!(normalize_for_dib(&image).is_none());
        let gray = IconImage::from_gray_data(1, 1, vec![7]);
        assert!(normalize_for_dib(&gray).is_none());
    }

    #[test]
    fn partial_alpha_is_flattened() {
        let image = IconImage::from_rgba_data(
            2,
            1,
            vec![0xff, 0xff, 0xff, 0x80, 0x10, 0x20, 0x30, 0x00],
        );
        let normalized = normalize_for_dib(&image).unwrap();
        assert_eq!(normalized.color_model(), ColorModel::Rgb);
        assert_eq!(normalized.raw_data(), &[0x80, 0x80, 0x80, 0, 0, 0]);
        let entry = encode_entry(&image, Hotspot::default()).unwrap();
        assert_eq!(entry.bits_per_pixel, 24);
        // The fully transparent pixel is still masked out.
        let mask_row = &entry.data[entry.data.len() - 4..];
        assert_eq!(mask_row, &[0x40, 0, 0, 0]);
    }

    #[test]
    fn binary_alpha_keeps_32_bits() {
        let image = IconImage::from_rgba_data(
            2,
            1,
            vec![0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00],
        );
        assert!(normalize_for_dib(&image).is_none());
        let entry = encode_entry(&image, Hotspot::default()).unwrap();
        assert_eq!(entry.bits_per_pixel, 32);
    }
}

//===========================================================================//
