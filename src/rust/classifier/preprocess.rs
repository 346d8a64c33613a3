use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use ndarray::{Array3, ArrayViewMut3, Axis};

use super::error::ClassifierError;
use super::image::Image;
use super::mean::MeanBlob;
use super::network::InputDims;

/// Channel-count reconciliation between an image and the network input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorConversion {
    BgrToGray,
    BgraToGray,
    BgraToBgr,
    GrayToBgr,
    /// Every other pairing. Mismatched channel counts pass through unconverted
    /// and are rejected later, when the sample meets the mean image.
    Identity,
}

impl ColorConversion {
    pub fn select(image_channels: usize, model_channels: usize) -> Self {
        match (image_channels, model_channels) {
            (3, 1) => Self::BgrToGray,
            (4, 1) => Self::BgraToGray,
            (4, 3) => Self::BgraToBgr,
            (1, 3) => Self::GrayToBgr,
            _ => Self::Identity,
        }
    }

    pub fn apply(self, image: &Image) -> Result<Cow<'_, Image>, ClassifierError> {
        let src = image.as_bytes();
        let data: Vec<u8> = match self {
            Self::Identity => return Ok(Cow::Borrowed(image)),
            Self::BgrToGray => src.chunks_exact(3).map(gray).collect(),
            Self::BgraToGray => src.chunks_exact(4).map(gray).collect(),
            Self::BgraToBgr => src.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]).collect(),
            Self::GrayToBgr => src.iter().flat_map(|&v| [v, v, v]).collect(),
        };
        let channels = match self {
            Self::BgrToGray | Self::BgraToGray => 1,
            _ => 3,
        };
        Image::new(image.width(), image.height(), channels, data).map(Cow::Owned)
    }
}

/// Luma of a BGR(A) pixel, fixed-point Rec. 601 weights rounded to nearest.
fn gray(px: &[u8]) -> u8 {
    const B: u32 = 1868;
    const G: u32 = 9617;
    const R: u32 = 4899;
    let (b, g, r) = (u32::from(px[0]), u32::from(px[1]), u32::from(px[2]));
    ((b * B + g * G + r * R + (1 << 13)) >> 14) as u8
}

fn resize_buffer<P>(image: &Image, width: u32, height: u32) -> Option<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let buffer: ImageBuffer<P, &[u8]> = ImageBuffer::from_raw(image.width(), image.height(), image.as_bytes())?;
    Some(imageops::resize(&buffer, width, height, FilterType::Triangle).into_raw())
}

fn resize(image: &Image, width: u32, height: u32) -> Result<Image, ClassifierError> {
    let data = match image.channels() {
        1 => resize_buffer::<Luma<u8>>(image, width, height),
        2 => resize_buffer::<LumaA<u8>>(image, width, height),
        3 => resize_buffer::<Rgb<u8>>(image, width, height),
        _ => resize_buffer::<Rgba<u8>>(image, width, height),
    }
    .ok_or_else(|| ClassifierError::InvalidImage("Pixel buffer does not match its geometry".into()))?;
    Image::new(width, height, image.channels(), data)
}

/// Turns host images into network-ready planar float tensors.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    dims: InputDims,
    mean: Array3<f32>,
}

impl Preprocessor {
    /// # Errors
    /// - `MeanError` if the mean blob's channel count differs from `dims.channels`
    pub fn new(dims: InputDims, mean: &MeanBlob) -> Result<Self, ClassifierError> {
        if mean.channels != dims.channels {
            return Err(ClassifierError::MeanError(format!(
                "Number of channels of mean file ({}) doesn't match input layer ({})",
                mean.channels, dims.channels
            )));
        }
        Ok(Self {
            dims,
            mean: mean.mean_image(dims),
        })
    }

    pub fn dims(&self) -> InputDims {
        self.dims
    }

    /// The uniform mean image, interleaved as `(height, width, channels)`
    pub fn mean_image(&self) -> &Array3<f32> {
        &self.mean
    }

    /// Converts `image` and writes one plane per channel into `input`.
    ///
    /// `input` is the network's own storage shaped `(channels, height, width)`;
    /// plane 0 lands at its base address, plane 1 right after it, and so on.
    /// Returns the address plane 0 was written to.
    pub fn stage(&self, image: &Image, input: &mut ArrayViewMut3<'_, f32>) -> Result<*const f32, ClassifierError> {
        if image.is_empty() {
            return Err(ClassifierError::EmptyImage);
        }

        let sample = ColorConversion::select(image.channels(), self.dims.channels).apply(image)?;

        let (width, height) = (self.dims.width as u32, self.dims.height as u32);
        let resized = if (sample.width(), sample.height()) != (width, height) {
            Cow::Owned(resize(&sample, width, height)?)
        } else {
            sample
        };

        if resized.channels() != self.dims.channels {
            return Err(ClassifierError::ChannelMismatch {
                sample: resized.channels(),
                model: self.dims.channels,
            });
        }
        let floats: Vec<f32> = resized.as_bytes().iter().map(|&v| f32::from(v)).collect();
        let mut normalized = Array3::from_shape_vec((self.dims.height, self.dims.width, self.dims.channels), floats)
            .map_err(|e| ClassifierError::InvalidImage(e.to_string()))?;
        normalized -= &self.mean;

        let expected = (self.dims.channels, self.dims.height, self.dims.width);
        if input.dim() != expected {
            return Err(ClassifierError::PredictionError(format!(
                "Input storage is shaped {:?}, expected {:?}",
                input.dim(),
                expected
            )));
        }
        for (c, mut plane) in input.axis_iter_mut(Axis(0)).enumerate() {
            plane.assign(&normalized.index_axis(Axis(2), c));
        }

        Ok(input.index_axis(Axis(0), 0).as_ptr())
    }
}
