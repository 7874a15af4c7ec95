use bitvec::prelude::*;

#[cfg(feature = "embedded-graphics")]
use embedded_graphics::{image::ImageRaw, pixelcolor::BinaryColor};

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;
pub(crate) const MEM_LENGTH: usize = WIDTH * HEIGHT / 8;

/// The 64x32 monochrome display surface.
///
/// Pixels are packed row-major, one bit each, most significant bit leftmost.
/// Mutation is XOR-only through [`Frame::flip`], except for the full reset
/// performed by the clear-screen instruction. The surface carries a dirty
/// flag so the execution driver redraws only when something changed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Frame {
    buf: [u8; MEM_LENGTH],
    dirty: bool,
}

/// A read-only view over a `Frame`, handed to the display driver on redraw.
///
/// Offers several shapes of access so drivers can pick whatever their bus
/// wants: the raw packed bytes, per-row bit slices, or a pixel iterator
/// pre-scaled by an integer factor. Rows run top to bottom, bits within a
/// row left to right.
///
/// #Note:
/// Can return an ImageRaw instance with the `embedded-graphics` feature on.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FrameView<'a>(&'a [u8; MEM_LENGTH]);

impl<'a> FrameView<'a> {
    /// View the raw memory of a frame
    pub fn as_raw(&self) -> &[u8] {
        self.0
    }

    /// Access frame's bits by indexes
    pub fn get_bit(&self, x: usize, y: usize) -> Option<&bool> {
        self.iter_rows_as_bitslices()
            .nth(y)
            .map(|row| row.get(x))
            .flatten()
    }

    /// Get iterator over rows in a form of a `BitSlice`s
    pub fn iter_rows_as_bitslices(&self) -> impl Iterator<Item = &'a BitSlice<Msb0, u8>> {
        self.0.chunks(WIDTH / 8).map(|row| row.view_bits::<_>())
    }

    /// Iter frame pixelwise (each pixel in row for each row in frame) after
    /// scaling it by a given factor, for blitting onto larger panels.
    pub fn iter_pixelwise_scaled(
        &self,
        scale: usize,
    ) -> impl Iterator<Item = impl Iterator<Item = &bool>> {
        self.iter_rows_as_bitslices()
            .zip(core::iter::repeat(scale))
            .map(move |(row, scale)| {
                row.iter()
                    .flat_map(move |bit| core::iter::repeat(bit).take(scale))
            })
            .flat_map(move |row| core::iter::repeat(row).take(scale))
    }

    /// Get `ImageRaw` structure from frame's data
    #[cfg(feature = "embedded-graphics")]
    pub fn as_raw_image(&self) -> ImageRaw<'_, BinaryColor> {
        ImageRaw::new(self.as_raw(), WIDTH as u32, HEIGHT as u32)
    }
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self {
            buf: [0; MEM_LENGTH],
            dirty: false,
        }
    }

    /// Get view over frame
    pub fn view(&self) -> FrameView<'_> {
        FrameView(&self.buf)
    }

    /// Toggle a single pixel, returning its state prior to the toggle.
    ///
    /// A `true` return from a set sprite bit is a collision. Coordinates
    /// must already be wrapped to the surface dimensions; anything outside
    /// is left untouched.
    pub(crate) fn flip(&mut self, x: usize, y: usize) -> bool {
        self.iter_rows_as_bitslices_mut()
            .nth(y)
            .and_then(|row| {
                row.get_mut(x).map(|mut bit| {
                    let prev = *bit;
                    *bit = !prev;
                    prev
                })
            })
            .unwrap_or(false)
    }

    /// Reset every pixel, as performed by the clear-screen instruction
    pub(crate) fn clear(&mut self) {
        self.buf = [0; MEM_LENGTH];
        self.dirty = true;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Read and reset the dirty flag in one step
    pub(crate) fn take_dirty(&mut self) -> bool {
        let dirty = self.dirty;
        self.dirty = false;
        dirty
    }

    fn iter_rows_as_bitslices_mut(&mut self) -> impl Iterator<Item = &mut BitSlice<Msb0, u8>> {
        self.buf
            .chunks_mut(WIDTH / 8)
            .map(|row| row.view_bits_mut::<_>())
    }
}

#[cfg(test)]
impl Frame {
    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}
