use crate::error::{Error, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

//===========================================================================//

/// The fully transparent color.
pub(crate) const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];
/// Opaque black, used to pad palettes and as the background for flattening.
pub(crate) const OPAQUE_BLACK: [u8; 4] = [0, 0, 0, u8::MAX];

// Palettes can hold at most this many colors.
const MAX_PALETTE_LEN: usize = 256;

//===========================================================================//

/// How an image stores its pixels.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum ColorModel {
    /// One palette index per pixel; the palette holds RGBA colors.
    Paletted,
    /// One opaque gray value per pixel.
    Gray,
    /// Opaque red, green and blue per pixel.
    Rgb,
    /// Red, green, blue and (non-premultiplied) alpha per pixel.
    Rgba,
}

/// The dimensions and color model of an image, available without decoding
/// its pixels.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct ImageConfig {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// The color model a full decode would produce.
    pub color_model: ColorModel,
}

//===========================================================================//

#[derive(Clone, Debug, Eq, PartialEq)]
enum PixelData {
    Paletted { palette: Vec<[u8; 4]>, indices: Vec<u8> },
    Gray(Vec<u8>),
    Rgb(Vec<u8>),
    Rgba(Vec<u8>),
}

/// An in-memory image; one icon or cursor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IconImage {
    width: u32,
    height: u32,
    data: PixelData,
}

impl IconImage {
    /// Creates a new image with the given dimensions and RGBA data.
    /// `rgba_data` must have `4 * width * height` bytes and be in row-major
    /// order from top to bottom, with non-premultiplied alpha.  Panics if
    /// `rgba_data` is the wrong length.
    pub fn from_rgba_data(
        width: u32,
        height: u32,
        rgba_data: Vec<u8>,
    ) -> IconImage {
        check_data_len(width, height, 4, rgba_data.len());
        IconImage { width, height, data: PixelData::Rgba(rgba_data) }
    }

    /// Creates a new opaque image from RGB data (`3 * width * height` bytes,
    /// top row first).  Panics if `rgb_data` is the wrong length.
    pub fn from_rgb_data(width: u32, height: u32, rgb_data: Vec<u8>) -> IconImage {
        check_data_len(width, height, 3, rgb_data.len());
        IconImage { width, height, data: PixelData::Rgb(rgb_data) }
    }

    /// Creates a new grayscale image (one byte per pixel, top row first).
    /// Panics if `gray_data` is the wrong length.
    pub fn from_gray_data(
        width: u32,
        height: u32,
        gray_data: Vec<u8>,
    ) -> IconImage {
        check_data_len(width, height, 1, gray_data.len());
        IconImage { width, height, data: PixelData::Gray(gray_data) }
    }

    /// Creates a new paletted image: one index into `palette` per pixel, top
    /// row first.  Panics if `indices` is the wrong length.  Indices past the
    /// end of the palette read as transparent.
    pub fn from_paletted_data(
        width: u32,
        height: u32,
        palette: Vec<[u8; 4]>,
        indices: Vec<u8>,
    ) -> IconImage {
        check_data_len(width, height, 1, indices.len());
        IconImage { width, height, data: PixelData::Paletted { palette, indices } }
    }

    /// Returns the width of the image, in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the image, in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns how this image stores its pixels.
    pub fn color_model(&self) -> ColorModel {
        match self.data {
            PixelData::Paletted { .. } => ColorModel::Paletted,
            PixelData::Gray(_) => ColorModel::Gray,
            PixelData::Rgb(_) => ColorModel::Rgb,
            PixelData::Rgba(_) => ColorModel::Rgba,
        }
    }

    /// Returns the palette, if this is a paletted image.
    pub fn palette(&self) -> Option<&[[u8; 4]]> {
        match self.data {
            PixelData::Paletted { ref palette, .. } => Some(palette),
            _ => None,
        }
    }

    /// Returns the number of stored channels per pixel.
    pub fn channels(&self) -> usize {
        match self.data {
            PixelData::Paletted { .. } | PixelData::Gray(_) => 1,
            PixelData::Rgb(_) => 3,
            PixelData::Rgba(_) => 4,
        }
    }

    /// Returns the raw stored samples: palette indices, gray values, or
    /// interleaved RGB/RGBA bytes.
    pub fn raw_data(&self) -> &[u8] {
        match self.data {
            PixelData::Paletted { ref indices, .. } => indices,
            PixelData::Gray(ref data)
            | PixelData::Rgb(ref data)
            | PixelData::Rgba(ref data) => data,
        }
    }

    /// Returns the non-premultiplied RGBA color of the pixel at (`x`, `y`),
    /// counting from the top-left corner.  Panics if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(
            x < self.width && y < self.height,
            "Pixel ({}, {}) out of bounds for {}x{} image",
            x,
            y,
            self.width,
            self.height
        );
        let index = (y as usize) * (self.width as usize) + (x as usize);
        match self.data {
            PixelData::Paletted { ref palette, ref indices } => palette
                .get(indices[index] as usize)
                .copied()
                .unwrap_or(TRANSPARENT),
            PixelData::Gray(ref data) => {
                let gray = data[index];
                [gray, gray, gray, u8::MAX]
            }
            PixelData::Rgb(ref data) => {
                let rgb = &data[3 * index..][..3];
                [rgb[0], rgb[1], rgb[2], u8::MAX]
            }
            PixelData::Rgba(ref data) => {
                let rgba = &data[4 * index..][..4];
                [rgba[0], rgba[1], rgba[2], rgba[3]]
            }
        }
    }

    /// Returns the RGBA data for this image, in row-major order from top to
    /// bottom, whatever the underlying color model.
    pub fn to_rgba_data(&self) -> Vec<u8> {
        match self.data {
            PixelData::Rgba(ref data) => data.clone(),
            _ => {
                let mut rgba = Vec::with_capacity(self.num_pixels() * 4);
                for y in 0..self.height {
                    for x in 0..self.width {
                        rgba.extend_from_slice(&self.pixel(x, y));
                    }
                }
                rgba
            }
        }
    }

    /// Returns true if any pixel is less than fully opaque.
    pub fn has_transparency(&self) -> bool {
        match self.data {
            PixelData::Gray(_) | PixelData::Rgb(_) => false,
            PixelData::Rgba(ref data) => {
                data.chunks_exact(4).any(|rgba| rgba[3] != u8::MAX)
            }
            PixelData::Paletted { .. } => self.alphas().any(|a| a != u8::MAX),
        }
    }

    /// Returns true if some pixel's alpha is neither zero nor fully opaque.
    pub fn has_partial_alpha(&self) -> bool {
        self.alphas().any(|alpha| alpha != 0 && alpha != u8::MAX)
    }

    fn alphas(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y)))
            .map(move |(x, y)| self.pixel(x, y)[3])
    }

    fn num_pixels(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Returns a copy of this image with an RGBA representation.
    pub(crate) fn to_rgba(&self) -> IconImage {
        IconImage::from_rgba_data(self.width, self.height, self.to_rgba_data())
    }

    /// Composites this image over an opaque black background, producing an
    /// opaque RGB image.
    pub(crate) fn flatten_onto_black(&self) -> IconImage {
        let mut rgb = Vec::with_capacity(self.num_pixels() * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let [red, green, blue, alpha] = self.pixel(x, y);
                for channel in [red, green, blue] {
                    let value = (channel as u32) * (alpha as u32);
                    rgb.push(((value + 127) / 255) as u8);
                }
            }
        }
        IconImage::from_rgb_data(self.width, self.height, rgb)
    }

    /// Makes every pixel at which `is_masked` returns true fully transparent,
    /// picking the cheapest representation that can hold transparency.
    pub(crate) fn clear_masked<F>(self, is_masked: F) -> IconImage
    where
        F: Fn(u32, u32) -> bool,
    {
        let IconImage { width, height, data } = self;
        let mut image = match data {
            PixelData::Paletted { mut palette, indices } => {
                let slot = match palette.iter().position(|c| c[3] == 0) {
                    Some(slot) => Some(slot),
                    None if palette.len() < MAX_PALETTE_LEN => {
                        palette.push(TRANSPARENT);
                        Some(palette.len() - 1)
                    }
                    None => None,
                };
                let image = IconImage {
                    width,
                    height,
                    data: PixelData::Paletted { palette, indices },
                };
                match slot {
                    Some(slot) => {
                        return image.clear_paletted(slot as u8, is_masked);
                    }
                    None => {
                        tracing::debug!(
                            "Palette is full; promoting masked image to RGBA"
                        );
                        image.to_rgba()
                    }
                }
            }
            data @ PixelData::Rgba(_) => IconImage { width, height, data },
            data => IconImage { width, height, data }.to_rgba(),
        };
        if let PixelData::Rgba(ref mut rgba) = image.data {
            for y in 0..height {
                for x in 0..width {
                    if is_masked(x, y) {
                        let index = (y as usize) * (width as usize) + (x as usize);
                        rgba[4 * index..][..4].copy_from_slice(&TRANSPARENT);
                    }
                }
            }
        }
        image
    }

    fn clear_paletted<F>(mut self, slot: u8, is_masked: F) -> IconImage
    where
        F: Fn(u32, u32) -> bool,
    {
        let width = self.width;
        if let PixelData::Paletted { ref mut indices, .. } = self.data {
            for y in 0..self.height {
                for x in 0..width {
                    if is_masked(x, y) {
                        indices[(y as usize) * (width as usize) + (x as usize)] =
                            slot;
                    }
                }
            }
        }
        self
    }

    /// Reads just the PNG header and reports what a full decode would yield.
    pub(crate) fn read_png_config<R: Read>(reader: R) -> Result<ImageConfig> {
        let decoder = png::Decoder::new(reader);
        let png_reader = decoder.read_info().map_err(png_decoding_error)?;
        let info = png_reader.info();
        let color_model = match info.color_type {
            png::ColorType::Grayscale => ColorModel::Gray,
            png::ColorType::Rgb => ColorModel::Rgb,
            png::ColorType::Indexed if info.trns.is_none() => ColorModel::Rgb,
            png::ColorType::Indexed
            | png::ColorType::GrayscaleAlpha
            | png::ColorType::Rgba => ColorModel::Rgba,
        };
        Ok(ImageConfig { width: info.width, height: info.height, color_model })
    }

    /// Decodes an image from a PNG file.  Samples are reduced to 8 bits and
    /// palettes are expanded.  Returns an error if the PNG data is malformed
    /// or can't be decoded.
    pub fn read_png<R: Read>(reader: R) -> Result<IconImage> {
        let mut decoder = png::Decoder::new(reader);
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut png_reader = decoder.read_info().map_err(png_decoding_error)?;
        let mut buffer = vec![0u8; png_reader.output_buffer_size()];
        let info = png_reader
            .next_frame(&mut buffer)
            .map_err(png_decoding_error)?;
        buffer.truncate(info.buffer_size());
        let (width, height) = (info.width, info.height);
        let image = match info.color_type {
            png::ColorType::Rgba => {
                IconImage::from_rgba_data(width, height, buffer)
            }
            png::ColorType::Rgb => IconImage::from_rgb_data(width, height, buffer),
            png::ColorType::Grayscale => {
                IconImage::from_gray_data(width, height, buffer)
            }
            png::ColorType::GrayscaleAlpha => {
                let mut rgba = Vec::with_capacity(buffer.len() * 2);
                for pair in buffer.chunks_exact(2) {
                    let (gray, alpha) = (pair[0], pair[1]);
                    rgba.extend_from_slice(&[gray, gray, gray, alpha]);
                }
                IconImage::from_rgba_data(width, height, rgba)
            }
            png::ColorType::Indexed => {
                unsupported!("PNG color type {:?}", info.color_type);
            }
        };
        Ok(image)
    }

    /// Encodes the image as an 8-bit RGBA PNG file.  The alpha channel is
    /// always written, even if every pixel is opaque.
    pub fn write_png<W: Write>(&self, writer: W) -> Result<()> {
        let mut encoder = png::Encoder::new(writer, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(png_encoding_error)?;
        writer
            .write_image_data(&self.to_rgba_data())
            .map_err(png_encoding_error)?;
        writer.finish().map_err(png_encoding_error)
    }
}

//===========================================================================//

fn check_data_len(width: u32, height: u32, channels: u64, actual: usize) {
    let expected = (width as u64) * (height as u64) * channels;
    if (actual as u64) != expected {
        panic!(
            "Invalid data length (was {}, but must be {} for {}x{} image)",
            actual, expected, width, height
        );
    }
}

fn png_decoding_error(error: png::DecodingError) -> Error {
    match error {
        png::DecodingError::IoError(error) => error.into(),
        error => Error::Format(format!("malformed PNG data: {}", error)),
    }
}

fn png_encoding_error(error: png::EncodingError) -> Error {
    match error {
        png::EncodingError::IoError(error) => error.into(),
        png::EncodingError::Format(error) => {
            Error::Format(format!("PNG format error: {}", error))
        }
        png::EncodingError::Parameter(error) => {
            Error::Format(format!("PNG parameter error: {}", error))
        }
        png::EncodingError::LimitsExceeded => {
            Error::Format("PNG limits exceeded".to_string())
        }
    }
}

//===========================================================================//


//===========================================================================//
