use crate::bmpdepth::BmpDepth;
use crate::error::Result;
use crate::image::{ColorModel, IconImage, ImageConfig, OPAQUE_BLACK};
use crate::stream::skip;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

//===========================================================================//

// The size of a BITMAPFILEHEADER struct, in bytes.
pub(crate) const FILE_HEADER_LEN: u32 = 14;
// The size of a BITMAPINFOHEADER struct, in bytes.
pub(crate) const INFO_HEADER_LEN: u32 = 40;
// The size of the red/green/blue masks that follow a BITMAPINFOHEADER when
// the compression mode is BI_BITFIELDS.
pub(crate) const BITFIELDS_LEN: u32 = 12;

pub(crate) const BI_RGB: u32 = 0;
pub(crate) const BI_BITFIELDS: u32 = 3;

// Default channel masks for 16-bpp BI_RGB data (5 bits per channel).
const RGB555_MASKS: [u32; 4] = [0x7c00, 0x03e0, 0x001f, 0];

// Longest info header we look inside (BITMAPV5HEADER); anything past this is
// skipped.
const MAX_INFO_HEADER_LEN: u32 = 124;

//===========================================================================//

struct BmpInfo {
    width: u32,
    height: u32,
    top_down: bool,
    depth: BmpDepth,
    /// Red, green, blue and alpha masks, for BI_BITFIELDS data.
    masks: Option<[u32; 4]>,
    color_table: Vec<[u8; 4]>,
}

fn read_info<R: Read>(reader: &mut R) -> Result<BmpInfo> {
    // Read the BITMAPFILEHEADER struct:
    let mut signature = [0u8; 2];
    reader.read_exact(&mut signature)?;
    if &signature != b"BM" {
        format_error!("not a BMP file");
    }
    let _file_size = reader.read_u32::<LittleEndian>()?;
    let _reserved = reader.read_u32::<LittleEndian>()?;
    let pixel_offset = reader.read_u32::<LittleEndian>()?;

    // Read the BITMAPINFOHEADER struct:
    let header_len = reader.read_u32::<LittleEndian>()?;
    if header_len < INFO_HEADER_LEN {
        unsupported!("BMP image");
    }
    let width = reader.read_i32::<LittleEndian>()?;
    if width < 0 {
        format_error!("Invalid BMP width ({})", width);
    }
    let height = reader.read_i32::<LittleEndian>()?;
    let _planes = reader.read_u16::<LittleEndian>()?;
    let bits_per_pixel = reader.read_u16::<LittleEndian>()?;
    let compression = reader.read_u32::<LittleEndian>()?;
    let _image_size = reader.read_u32::<LittleEndian>()?;
    let _horz_ppm = reader.read_i32::<LittleEndian>()?;
    let _vert_ppm = reader.read_i32::<LittleEndian>()?;
    let colors_used = reader.read_u32::<LittleEndian>()?;
    let _colors_important = reader.read_u32::<LittleEndian>()?;

    // Later header versions carry the channel masks inside the header itself.
    let extra_len = header_len.min(MAX_INFO_HEADER_LEN) - INFO_HEADER_LEN;
    let mut extra = vec![0u8; extra_len as usize];
    reader.read_exact(&mut extra)?;
    skip(reader, (header_len - INFO_HEADER_LEN - extra_len) as u64)?;

    let depth = match BmpDepth::from_bits_per_pixel(bits_per_pixel) {
        Some(depth) => depth,
        None => unsupported!("BMP bits-per-pixel ({})", bits_per_pixel),
    };
    let masks = match compression {
        BI_RGB if depth == BmpDepth::Sixteen => Some(RGB555_MASKS),
        BI_RGB => None,
        BI_BITFIELDS
            if depth == BmpDepth::Sixteen || depth == BmpDepth::ThirtyTwo =>
        {
            let mut masks = [0u32; 4];
            if header_len == INFO_HEADER_LEN {
                for mask in masks.iter_mut().take(3) {
                    *mask = reader.read_u32::<LittleEndian>()?;
                }
            } else {
                let mut fields = extra.chunks_exact(4).map(LittleEndian::read_u32);
                for mask in masks.iter_mut() {
                    *mask = fields.next().unwrap_or(0);
                }
            }
            Some(masks)
        }
        _ => unsupported!("BMP compression ({})", compression),
    };

    // Read in the color table.  Direct-color images may still carry one,
    // which is skipped.
    let num_colors = if depth.is_indexed() && colors_used == 0 {
        depth.num_colors()
    } else {
        colors_used as usize
    };
    let mut color_table = Vec::new();
    if depth.is_indexed() {
        if num_colors > 256 {
            unsupported!("BMP color table length ({})", num_colors);
        }
        color_table.reserve(num_colors);
        for _ in 0..num_colors {
            let blue = reader.read_u8()?;
            let green = reader.read_u8()?;
            let red = reader.read_u8()?;
            let _reserved = reader.read_u8()?;
            color_table.push([red, green, blue, u8::MAX]);
        }
    } else {
        skip(reader, 4 * num_colors as u64)?;
    }

    // Skip ahead to the pixel data, if the file header says it starts later.
    let mut consumed = (FILE_HEADER_LEN + header_len) as u64 + 4 * num_colors as u64;
    if compression == BI_BITFIELDS && header_len == INFO_HEADER_LEN {
        consumed += BITFIELDS_LEN as u64;
    }
    if (pixel_offset as u64) > consumed {
        skip(reader, pixel_offset as u64 - consumed)?;
    }

    Ok(BmpInfo {
        width: width as u32,
        height: height.unsigned_abs(),
        top_down: height < 0,
        depth,
        masks,
        color_table,
    })
}

/// Reads the headers of a BMP file and reports what a full decode would
/// yield.
pub(crate) fn read_bmp_config<R: Read>(mut reader: R) -> Result<ImageConfig> {
    let info = read_info(&mut reader)?;
    Ok(ImageConfig {
        width: info.width,
        height: info.height,
        color_model: info.depth.color_model(),
    })
}

/// Decodes a BMP file (starting with its BITMAPFILEHEADER).  Reads no further
/// than the end of the pixel data, so that a trailing mask can be read from
/// the same reader.
pub(crate) fn read_bmp<R: Read>(reader: &mut R) -> Result<IconImage> {
    let info = read_info(reader)?;
    let (width, height) = (info.width, info.height);
    let channels = match info.depth.color_model() {
        ColorModel::Rgb => 3,
        ColorModel::Rgba => 4,
        _ => 1,
    };
    let num_bytes = match (width as usize)
        .checked_mul(height as usize)
        .and_then(|num_pixels| num_pixels.checked_mul(channels))
    {
        Some(num) => num,
        None => format_error!("Width * Height is too large"),
    };
    let mut pixels = vec![0u8; num_bytes];

    // Color data is stored row by row, starting from the *bottom* row unless
    // the height was negative:
    let mut row = vec![0u8; info.depth.row_stride(width)];
    let bits = info.depth.bits_per_pixel() as usize;
    for file_row in 0..height {
        reader.read_exact(&mut row)?;
        let y = if info.top_down { file_row } else { height - file_row - 1 };
        let out = &mut pixels[(y as usize) * (width as usize) * channels..]
            [..(width as usize) * channels];
        match info.depth {
            BmpDepth::One | BmpDepth::Two | BmpDepth::Four | BmpDepth::Eight => {
                let index_mask = ((1u16 << bits) - 1) as u8;
                for (col, index) in out.iter_mut().enumerate() {
                    let bit = col * bits;
                    let shift = 8 - bits - (bit % 8);
                    *index = (row[bit / 8] >> shift) & index_mask;
                }
            }
            BmpDepth::Sixteen => {
                let masks = info.masks.unwrap_or(RGB555_MASKS);
                for (col, rgb) in out.chunks_exact_mut(3).enumerate() {
                    let value = LittleEndian::read_u16(&row[2 * col..]);
                    rgb[0] = extract_channel(value as u32, masks[0]);
                    rgb[1] = extract_channel(value as u32, masks[1]);
                    rgb[2] = extract_channel(value as u32, masks[2]);
                }
            }
            BmpDepth::TwentyFour => {
                for (rgb, bgr) in out.chunks_exact_mut(3).zip(row.chunks_exact(3)) {
                    rgb[0] = bgr[2];
                    rgb[1] = bgr[1];
                    rgb[2] = bgr[0];
                }
            }
            BmpDepth::ThirtyTwo => {
                for (rgba, bgra) in out.chunks_exact_mut(4).zip(row.chunks_exact(4)) {
                    match info.masks {
                        Some(masks) => {
                            let value = LittleEndian::read_u32(bgra);
                            rgba[0] = extract_channel(value, masks[0]);
                            rgba[1] = extract_channel(value, masks[1]);
                            rgba[2] = extract_channel(value, masks[2]);
                            rgba[3] = if masks[3] == 0 {
                                u8::MAX
                            } else {
                                extract_channel(value, masks[3])
                            };
                        }
                        None => {
                            rgba[0] = bgra[2];
                            rgba[1] = bgra[1];
                            rgba[2] = bgra[0];
                            rgba[3] = bgra[3];
                        }
                    }
                }
            }
        }
    }

    let image = match info.depth.color_model() {
        ColorModel::Rgb => IconImage::from_rgb_data(width, height, pixels),
        ColorModel::Rgba => {
            // Older producers leave the fourth byte zero and rely on the
            // mask for transparency.
            if info.masks.is_none()
                && pixels.chunks_exact(4).all(|rgba| rgba[3] == 0)
            {
                for rgba in pixels.chunks_exact_mut(4) {
                    rgba[3] = u8::MAX;
                }
            }
            IconImage::from_rgba_data(width, height, pixels)
        }
        _ => IconImage::from_paletted_data(
            width,
            height,
            info.color_table,
            pixels,
        ),
    };
    Ok(image)
}

fn extract_channel(value: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let max = (mask >> shift) as u64;
    let channel = ((value & mask) >> shift) as u64;
    ((channel * 255 + max / 2) / max) as u8
}

//===========================================================================//

/// Encodes the image as a complete BMP file, with a BITMAPFILEHEADER.
/// Paletted images keep a compact color table at the smallest depth that
/// addresses it, grayscale images get a 256-entry gray ramp, and images with
/// any transparency are written at 32 bpp.
pub(crate) fn write_bmp<W: Write>(image: &IconImage, mut writer: W) -> Result<()> {
    let width = image.width();
    let height = image.height();
    let (depth, color_table) = match image.color_model() {
        ColorModel::Paletted => {
            let mut palette = image.palette().unwrap_or(&[]).to_vec();
            if palette.is_empty() {
                palette.push(OPAQUE_BLACK);
            }
            (BmpDepth::for_palette_len(palette.len()), palette)
        }
        ColorModel::Gray => {
            let ramp = (0..=255u8).map(|gray| [gray, gray, gray, u8::MAX]);
            (BmpDepth::Eight, ramp.collect())
        }
        ColorModel::Rgba if image.has_transparency() => {
            (BmpDepth::ThirtyTwo, Vec::new())
        }
        ColorModel::Rgb | ColorModel::Rgba => (BmpDepth::TwentyFour, Vec::new()),
    };
    let bits_per_pixel = depth.bits_per_pixel();
    let stride = depth.row_stride(width);
    let image_size = stride * height as usize;
    let pixel_offset =
        FILE_HEADER_LEN as usize + INFO_HEADER_LEN as usize + 4 * color_table.len();

    // Write the BITMAPFILEHEADER struct:
    writer.write_all(b"BM")?;
    writer.write_u32::<LittleEndian>((pixel_offset + image_size) as u32)?;
    writer.write_u32::<LittleEndian>(0)?; // reserved
    writer.write_u32::<LittleEndian>(pixel_offset as u32)?;

    // Write the BITMAPINFOHEADER struct:
    writer.write_u32::<LittleEndian>(INFO_HEADER_LEN)?;
    writer.write_i32::<LittleEndian>(width as i32)?;
    writer.write_i32::<LittleEndian>(height as i32)?;
    writer.write_u16::<LittleEndian>(1)?; // planes
    writer.write_u16::<LittleEndian>(bits_per_pixel)?;
    writer.write_u32::<LittleEndian>(BI_RGB)?;
    writer.write_u32::<LittleEndian>(image_size as u32)?;
    writer.write_i32::<LittleEndian>(0)?; // horz ppm
    writer.write_i32::<LittleEndian>(0)?; // vert ppm
    writer.write_u32::<LittleEndian>(color_table.len() as u32)?;
    writer.write_u32::<LittleEndian>(0)?; // colors important

    // Write the color table:
    for &[red, green, blue, _] in color_table.iter() {
        writer.write_all(&[blue, green, red, 0])?;
    }

    // Write the color data, starting from the *bottom* row:
    let data = image.raw_data();
    let channels = image.channels();
    let bits = bits_per_pixel as usize;
    let mut row = vec![0u8; stride];
    for y in (0..height as usize).rev() {
        row.fill(0);
        let samples = &data[y * width as usize * channels..][..width as usize * channels];
        match depth {
            BmpDepth::One | BmpDepth::Two | BmpDepth::Four | BmpDepth::Eight => {
                let index_mask = ((1u16 << bits) - 1) as u8;
                for (col, &index) in samples.iter().enumerate() {
                    let bit = col * bits;
                    let shift = 8 - bits - (bit % 8);
                    row[bit / 8] |= (index & index_mask) << shift;
                }
            }
            BmpDepth::TwentyFour => {
                for (bgr, pixel) in
                    row.chunks_exact_mut(3).zip(samples.chunks_exact(channels))
                {
                    bgr[0] = pixel[2];
                    bgr[1] = pixel[1];
                    bgr[2] = pixel[0];
                }
            }
            BmpDepth::ThirtyTwo => {
                for (bgra, rgba) in row.chunks_exact_mut(4).zip(samples.chunks_exact(4)) {
                    bgra[0] = rgba[2];
                    bgra[1] = rgba[1];
                    bgra[2] = rgba[0];
                    bgra[3] = rgba[3];
                }
            }
            BmpDepth::Sixteen => {
                // We never choose BmpDepth::Sixteen above.
                unsupported!("Encoding 16-bpp BMPs");
            }
        }
        writer.write_all(&row)?;
    }
    Ok(())
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{read_bmp, read_bmp_config, write_bmp};
    use byteorder::{ByteOrder, LittleEndian};
    use crate::error::Error;
    use crate::image::{ColorModel, IconImage, OPAQUE_BLACK, TRANSPARENT};

    fn round_trip(image: &IconImage) -> (Vec<u8>, IconImage) {
        let mut data = Vec::new();
        write_bmp(image, &mut data).unwrap();
        let decoded = read_bmp(&mut data.as_slice()).unwrap();
        (data, decoded)
    }

    #[test]
    fn paletted_depth_follows_palette_len() {
        for &(len, bpp) in &[(2usize, 1u16), (4, 2), (5, 4), (16, 4), (17, 8)] {
            let palette: Vec<[u8; 4]> =
                (0..len).map(|i| [i as u8, 0, 0, 0xff]).collect();
            let indices: Vec<u8> = (0..9 * 3).map(|i| (i % len) as u8).collect();
            let image = IconImage::from_paletted_data(9, 3, palette, indices);
            let (data, decoded) = round_trip(&image);
            assert_eq!(LittleEndian::read_u16(&data[28..30]), bpp);
            assert_eq!(decoded.palette().unwrap().len(), len);
            assert_eq!(decoded.to_rgba_data(), image.to_rgba_data());
        }
    }

    #[test]
    fn gray_uses_full_ramp() {
        let image = IconImage::from_gray_data(3, 2, vec![0, 50, 100, 150, 200, 250]);
        let (data, decoded) = round_trip(&image);
        assert_eq!(data[28], 8);
        assert_eq!(decoded.palette().unwrap().len(), 256);
        assert_eq!(decoded.to_rgba_data(), image.to_rgba_data());
    }

    #[test]
    fn rgb_and_rgba_depths() {
        let mut rgba: Vec<u8> = [0x40, 0x50, 0x60, 0xff].repeat(4);
        let opaque = IconImage::from_rgba_data(2, 2, rgba.clone());
        let (data, decoded) = round_trip(&opaque);
        assert_eq!(data[28], 24);
        assert_eq!(decoded.color_model(), ColorModel::Rgb);
        assert_eq!(decoded.to_rgba_data(), rgba);
        rgba[3] = 0;
        let transparent = IconImage::from_rgba_data(2, 2, rgba.clone());
        let (data, decoded) = round_trip(&transparent);
        assert_eq!(data[28], 32);
        assert_eq!(decoded.to_rgba_data(), rgba);
    }

    #[test]
    fn zero_alpha_bytes_read_as_opaque() {
        let image = IconImage::from_rgba_data(1, 1, vec![1, 2, 3, 0]);
        let (_, decoded) = round_trip(&image);
        assert_eq!(decoded.pixel(0, 0), [1, 2, 3, 0xff]);
    }

    #[test]
    fn read_stops_after_pixel_data() {
        let image = IconImage::from_paletted_data(
            2,
            2,
            vec![OPAQUE_BLACK, TRANSPARENT],
            vec![0, 1, 1, 0],
        );
        let mut data = Vec::new();
        write_bmp(&image, &mut data).unwrap();
        data.extend_from_slice(b"tail");
        let mut reader = data.as_slice();
        read_bmp(&mut reader).unwrap();
        assert_eq!(reader, b"tail");
    }

    #[test]
    fn read_top_down_bitfields() {
        let mut data: Vec<u8> = b"BM\0\0\0\0\0\0\0\0\x42\0\0\0".to_vec();
        data.extend_from_slice(&40u32.to_le_bytes());
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&(-2i32).to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&16u16.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[0; 20]);
        // 5-6-5 masks:
        data.extend_from_slice(&0xf800u32.to_le_bytes());
        data.extend_from_slice(&0x07e0u32.to_le_bytes());
        data.extend_from_slice(&0x001fu32.to_le_bytes());
        data.extend_from_slice(&[0x00, 0xf8, 0, 0]);
        data.extend_from_slice(&[0x1f, 0x00, 0, 0]);
        let config = read_bmp_config(data.as_slice()).unwrap();
        assert_eq!((config.width, config.height), (1, 2));
        assert_eq!(config.color_model, ColorModel::Rgb);
        let image = read_bmp(&mut data.as_slice()).unwrap();
        assert_eq!(image.pixel(0, 0), [0xff, 0, 0, 0xff]);
        assert_eq!(image.pixel(0, 1), [0, 0, 0xff, 0xff]);
    }

    #[test]
    fn short_info_header_is_unsupported() {
        let mut data: Vec<u8> = b"BM\0\0\0\0\0\0\0\0\0\0\0\0".to_vec();
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&[0; 8]);
        assert!(matches!(
            read_bmp(&mut data.as_slice()),
            Err(Error::Unsupported(_))
        ));
    }
}

//===========================================================================//
