use serde::{Deserialize, Serialize};

use crate::PrepError;

// Frames are streamed to the encoder as packed rgb24
pub const BYTES_PER_PIXEL: u32 = 3;

// libx264 and mpeg4 both want at least a macroblock
pub const MIN_DIM: Dim = Dim {
    width: 16,
    height: 16,
};

// represents 2x current UHD
pub const MAX_DIM: Dim = Dim {
    width: 16384,
    height: 16384,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dim {
    pub width: u32,
    pub height: u32,
}

impl Dim {
    // Buffer bytes needed to encode one rgb24 frame of this dimension
    pub const fn calc_size(&self) -> usize {
        self.calc_area(BYTES_PER_PIXEL) as usize
    }

    pub const fn calc_area(&self, bytes_per_pixel: u32) -> u32 {
        self.width * self.height * bytes_per_pixel
    }

    // ffmpeg's -s / -video_size syntax
    pub fn as_video_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn check_bounds(&self) -> Result<(), PrepError> {
        if self.width < MIN_DIM.width || self.height < MIN_DIM.height {
            Err(PrepError::UnsupportedFrameDimensionsTooSmall {
                width: self.width,
                height: self.height,
            })
        } else if self.width > MAX_DIM.width || self.height > MAX_DIM.height {
            Err(PrepError::UnsupportedFrameDimensionsTooBig {
                width: self.width,
                height: self.height,
            })
        } else {
            Ok(())
        }
    }
}
