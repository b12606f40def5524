use ndarray::ArrayView3;

use crate::shared::bounding_box::PixelRect;

/// A single camera frame: contiguous RGB or RGBA bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the domain layer
/// treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Horizontal flip, so the camera behaves like a mirror.
    pub fn mirrored(&self) -> Frame {
        let c = self.channels as usize;
        let w = self.width as usize;
        let row_len = w * c;
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_len) {
            for px in row.chunks_exact(c).rev() {
                data.extend_from_slice(px);
            }
        }
        Frame::new(data, self.width, self.height, self.channels, self.index)
    }

    /// Rotates 90° clockwise; the result is `height` wide and `width` tall.
    pub fn rotated_clockwise(&self) -> Frame {
        let c = self.channels as usize;
        let w = self.width as usize;
        let h = self.height as usize;
        let mut data = vec![0u8; self.data.len()];
        for row in 0..w {
            for col in 0..h {
                let src = ((h - 1 - col) * w + row) * c;
                let dst = (row * h + col) * c;
                data[dst..dst + c].copy_from_slice(&self.data[src..src + c]);
            }
        }
        Frame::new(data, self.height, self.width, self.channels, self.index)
    }

    /// Copies out a sub-rectangle; the rectangle is clamped to the frame.
    pub fn crop(&self, rect: &PixelRect) -> Frame {
        let c = self.channels as usize;
        let x = rect.x.min(self.width) as usize;
        let y = rect.y.min(self.height) as usize;
        let w = (rect.width as usize).min(self.width as usize - x);
        let h = (rect.height as usize).min(self.height as usize - y);
        let stride = self.width as usize * c;

        let mut data = Vec::with_capacity(w * h * c);
        for row in y..y + h {
            let start = row * stride + x * c;
            data.extend_from_slice(&self.data[start..start + w * c]);
        }
        Frame::new(data, w as u32, h as u32, self.channels, self.index)
    }

    /// Appends a fully opaque alpha channel to an RGB frame.
    ///
    /// Frames that already carry four channels are returned unchanged.
    pub fn with_opaque_alpha(&self) -> Frame {
        if self.channels == 4 {
            return self.clone();
        }
        let mut data = Vec::with_capacity(self.data.len() / 3 * 4);
        for px in self.data.chunks_exact(3) {
            data.extend_from_slice(px);
            data.push(u8::MAX);
        }
        Frame::new(data, self.width, self.height, 4, self.index)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
