use image::DynamicImage;

use super::error::ClassifierError;

/// An interleaved 8-bit image as handed over by the host.
///
/// Color images use BGR (3 channels) or BGRA (4 channels) byte order, the
/// layout the mean blobs of Caffe-trained networks are expressed in.
/// Grayscale images have a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<u8>,
}

impl Image {
    /// Wraps an interleaved pixel buffer.
    ///
    /// # Errors
    /// - `InvalidImage` if `channels` is not between 1 and 4
    /// - `InvalidImage` if `data` does not hold exactly `width * height * channels` bytes
    pub fn new(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self, ClassifierError> {
        if !(1..=4).contains(&channels) {
            return Err(ClassifierError::InvalidImage(format!(
                "Unsupported channel count {} (expected 1 to 4)",
                channels
            )));
        }
        let expected = width as usize * height as usize * channels;
        if data.len() != expected {
            return Err(ClassifierError::InvalidImage(format!(
                "Pixel buffer holds {} bytes, {}x{}x{} needs {}",
                data.len(),
                width,
                height,
                channels,
                expected
            )));
        }
        Ok(Self { width, height, channels, data })
    }

    /// An image filled with a single value in every channel.
    pub fn filled(width: u32, height: u32, channels: usize, value: u8) -> Result<Self, ClassifierError> {
        let len = width as usize * height as usize * channels;
        Self::new(width, height, channels, vec![value; len])
    }

    /// Converts a decoded image into BGR, BGRA or grayscale layout.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let color = img.color();
        let (width, height) = (img.width(), img.height());
        let (channels, data) = if !color.has_color() {
            (1, img.to_luma8().into_raw())
        } else if color.has_alpha() {
            let mut data = img.to_rgba8().into_raw();
            data.chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
            (4, data)
        } else {
            let mut data = img.to_rgb8().into_raw();
            data.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
            (3, data)
        };
        Self { width, height, channels, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// True when the image has no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
