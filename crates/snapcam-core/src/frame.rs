//! Pre-sized RGBA pixel storage for offscreen readback.

/// Vertical order of the rows in a raw pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// First row is the top of the image.
    TopDown,
    /// First row is the bottom of the image (GL-style readback).
    BottomUp,
}

/// RGBA8 pixel buffer sized exactly `width * height * 4` bytes.
///
/// Allocated once when a device is constructed. Ownership moves into the
/// encode job for each capture and comes back when encoding finishes.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    row_order: RowOrder,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Zero-filled buffer for a `width`x`height` target.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            row_order: RowOrder::TopDown,
            data: vec![0; Self::byte_len(width, height)],
        }
    }

    /// Wrap existing pixel data. `None` unless `data` is exactly sized.
    pub fn from_raw(width: u32, height: u32, row_order: RowOrder, data: Vec<u8>) -> Option<Self> {
        (data.len() == Self::byte_len(width, height)).then_some(Self {
            width,
            height,
            row_order,
            data,
        })
    }

    /// Byte size of an RGBA8 buffer with the given dimensions.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::BYTES_PER_PIXEL
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    /// Record the row order of the data most recently written.
    pub fn set_row_order(&mut self, row_order: RowOrder) {
        self.row_order = row_order;
    }

    /// Bytes per row without any padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * Self::BYTES_PER_PIXEL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
