use crate::image::ColorModel;

//===========================================================================//

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BmpDepth {
    One,
    Two,
    Four,
    Eight,
    Sixteen,
    TwentyFour,
    ThirtyTwo,
}

impl BmpDepth {
    pub(crate) fn from_bits_per_pixel(
        bits_per_pixel: u16,
    ) -> Option<BmpDepth> {
        match bits_per_pixel {
            1 => Some(BmpDepth::One),
            2 => Some(BmpDepth::Two),
            4 => Some(BmpDepth::Four),
            8 => Some(BmpDepth::Eight),
            16 => Some(BmpDepth::Sixteen),
            24 => Some(BmpDepth::TwentyFour),
            32 => Some(BmpDepth::ThirtyTwo),
            _ => None,
        }
    }

    /// Returns the smallest indexed depth that can address a palette of the
    /// given length.
    pub(crate) fn for_palette_len(palette_len: usize) -> BmpDepth {
        if palette_len <= 2 {
            BmpDepth::One
        } else if palette_len <= 4 {
            BmpDepth::Two
        } else if palette_len <= 16 {
            BmpDepth::Four
        } else {
            BmpDepth::Eight
        }
    }

    pub(crate) fn bits_per_pixel(&self) -> u16 {
        match *self {
            BmpDepth::One => 1,
            BmpDepth::Two => 2,
            BmpDepth::Four => 4,
            BmpDepth::Eight => 8,
            BmpDepth::Sixteen => 16,
            BmpDepth::TwentyFour => 24,
            BmpDepth::ThirtyTwo => 32,
        }
    }

    /// Returns the default color table length, used when a header leaves its
    /// colors-used field at zero.
    pub(crate) fn num_colors(&self) -> usize {
        match *self {
            BmpDepth::One => 2,
            BmpDepth::Two => 4,
            BmpDepth::Four => 16,
            BmpDepth::Eight => 256,
            _ => 0,
        }
    }

    pub(crate) fn is_indexed(&self) -> bool {
        self.num_colors() > 0
    }

    pub(crate) fn color_model(&self) -> ColorModel {
        match *self {
            BmpDepth::Sixteen | BmpDepth::TwentyFour => ColorModel::Rgb,
            BmpDepth::ThirtyTwo => ColorModel::Rgba,
            _ => ColorModel::Paletted,
        }
    }

    /// Returns the size in bytes of one row of pixels, padded to a multiple of
    /// four bytes.
    pub(crate) fn row_stride(&self, width: u32) -> usize {
        let bits = (width as usize) * (self.bits_per_pixel() as usize);
        ((bits + 31) / 32) * 4
    }
}

//===========================================================================//


//===========================================================================//
