//! PNG encoding of raw readback pixels.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageBuffer, ImageEncoder, Rgba, imageops};

use crate::error::EncodingError;
use crate::frame::{PixelBuffer, RowOrder};

/// Content type tag of every artifact this crate produces.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// An encoded snapshot, ready to be handed to the placement collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Converts RGBA8 readback data into a PNG artifact, correcting row order.
#[derive(Debug, Clone)]
pub struct PixelEncoder {
    filename: String,
}

impl PixelEncoder {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Encode `pixels` as a PNG whose first row is the top of the image.
    pub fn encode(
        &self,
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        row_order: RowOrder,
    ) -> Result<ImageArtifact, EncodingError> {
        let actual = pixels.len();
        let mut buffer = PixelBuffer::from_raw(width, height, row_order, pixels).ok_or(
            EncodingError::BufferSize {
                width,
                height,
                expected: PixelBuffer::byte_len(width, height),
                actual,
            },
        )?;
        self.encode_buffer(&mut buffer)
    }

    /// Encode `buffer` in place. `BottomUp` data is flipped inside the
    /// buffer, which is left `TopDown` and ready for the next readback.
    pub fn encode_buffer(&self, buffer: &mut PixelBuffer) -> Result<ImageArtifact, EncodingError> {
        let (width, height) = (buffer.width(), buffer.height());
        if width == 0 || height == 0 {
            return Err(EncodingError::Dimensions { width, height });
        }
        if buffer.row_order() == RowOrder::BottomUp {
            let mut view =
                ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, buffer.as_mut_bytes())
                    .ok_or(EncodingError::Dimensions { width, height })?;
            imageops::flip_vertical_in_place(&mut view);
            buffer.set_row_order(RowOrder::TopDown);
        }

        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes).write_image(
            buffer.as_bytes(),
            width,
            height,
            ExtendedColorType::Rgba8,
        )?;

        Ok(ImageArtifact {
            bytes,
            content_type: PNG_CONTENT_TYPE,
            filename: self.filename.clone(),
            width,
            height,
        })
    }
}
