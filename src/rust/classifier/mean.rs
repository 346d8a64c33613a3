use std::fs;
use std::path::Path;

use log::debug;
use ndarray::Array3;
use prost::Message;

use super::error::ClassifierError;
use super::network::InputDims;

/// Shape of a Caffe blob (`caffe.BlobShape`).
#[derive(Clone, PartialEq, Message)]
pub struct BlobShape {
    #[prost(int64, repeated, tag = "1")]
    pub dim: Vec<i64>,
}

/// The subset of `caffe.BlobProto` a mean image file carries.
#[derive(Clone, PartialEq, Message)]
pub struct BlobProto {
    #[prost(int32, optional, tag = "1")]
    pub num: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub channels: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub height: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub width: Option<i32>,
    #[prost(float, repeated, tag = "5")]
    pub data: Vec<f32>,
    #[prost(message, optional, tag = "7")]
    pub shape: Option<BlobShape>,
    #[prost(double, repeated, tag = "8")]
    pub double_data: Vec<f64>,
}

impl BlobProto {
    /// Blob shape, preferring the legacy 4D fields when any of them is set.
    fn dims(&self) -> Vec<i64> {
        let legacy = [self.num, self.channels, self.height, self.width];
        if legacy.iter().any(Option::is_some) {
            legacy.iter().map(|d| i64::from(d.unwrap_or(0))).collect()
        } else {
            self.shape.as_ref().map(|s| s.dim.clone()).unwrap_or_default()
        }
    }
}

/// A planar 32-bit float mean image (BGR or grayscale).
#[derive(Debug, Clone, PartialEq)]
pub struct MeanBlob {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl MeanBlob {
    /// Builds a mean blob from planar data, channel 0 first.
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self, ClassifierError> {
        let expected = channels * height * width;
        if expected == 0 {
            return Err(ClassifierError::MeanError(format!(
                "Mean blob has an empty shape {}x{}x{}",
                channels, height, width
            )));
        }
        if data.len() < expected {
            return Err(ClassifierError::MeanError(format!(
                "Mean blob holds {} values, shape {}x{}x{} needs {}",
                data.len(),
                channels,
                height,
                width,
                expected
            )));
        }
        Ok(Self { channels, height, width, data })
    }

    /// A mean blob whose every pixel has the given per-channel value.
    pub fn uniform(values: &[f32], height: usize, width: usize) -> Result<Self, ClassifierError> {
        let data = values
            .iter()
            .flat_map(|&v| std::iter::repeat(v).take(height * width))
            .collect();
        Self::new(values.len(), height, width, data)
    }

    /// Reads a binaryproto mean file.
    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let bytes = fs::read(path).map_err(|e| {
            ClassifierError::MeanError(format!("Unable to read mean file {}: {}", path.display(), e))
        })?;
        let proto = BlobProto::decode(bytes.as_slice())
            .map_err(|e| ClassifierError::MeanError(format!("Malformed mean file {}: {}", path.display(), e)))?;
        Self::from_proto(&proto)
    }

    /// Interprets a decoded blob with Caffe's legacy axis rules: axes past the
    /// end of the shape count as 1, and only the first image of the batch is used.
    pub fn from_proto(proto: &BlobProto) -> Result<Self, ClassifierError> {
        let dims = proto.dims();
        let axis = |i: usize| -> Result<usize, ClassifierError> {
            let d = dims.get(i).copied().unwrap_or(1);
            usize::try_from(d)
                .map_err(|_| ClassifierError::MeanError(format!("Negative mean blob dimension {}", d)))
        };
        let (channels, height, width) = (axis(1)?, axis(2)?, axis(3)?);

        let data = if proto.data.is_empty() {
            proto.double_data.iter().map(|&v| v as f32).collect()
        } else {
            proto.data.clone()
        };
        debug!("Mean blob shape {:?}, {} values", dims, data.len());
        Self::new(channels, height, width, data)
    }

    /// Average of every plane, one value per channel.
    pub fn channel_means(&self) -> Vec<f32> {
        let plane = self.height * self.width;
        self.data
            .chunks_exact(plane)
            .take(self.channels)
            .map(|values| (values.iter().map(|&v| f64::from(v)).sum::<f64>() / plane as f64) as f32)
            .collect()
    }

    /// The mean image the preprocessor subtracts: the global mean pixel value
    /// broadcast over the input geometry, interleaved as `(height, width, channels)`.
    pub fn mean_image(&self, dims: InputDims) -> Array3<f32> {
        let means = self.channel_means();
        Array3::from_shape_fn((dims.height, dims.width, self.channels), |(_, _, c)| means[c])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_means() {
        let blob = MeanBlob::new(2, 1, 2, vec![1.0, 3.0, 10.0, 20.0]).unwrap();
        assert_eq!(blob.channel_means(), vec![2.0, 15.0]);
    }

    #[test]
    fn test_mean_image_is_uniform() {
        let blob = MeanBlob::new(3, 2, 2, (0..12).map(|v| v as f32).collect()).unwrap();
        let image = blob.mean_image(InputDims::new(3, 4, 5));
        assert_eq!(image.dim(), (4, 5, 3));
        let expected = [1.5, 5.5, 9.5];
        assert!(image.indexed_iter().all(|((_, _, c), &v)| v == expected[c]));
    }

    #[test]
    fn test_decode_legacy_proto() {
        let proto = BlobProto {
            num: Some(1),
            channels: Some(1),
            height: Some(2),
            width: Some(2),
            data: vec![4.0, 4.0, 6.0, 6.0],
            ..Default::default()
        };
        let bytes = proto.encode_to_vec();
        let decoded = BlobProto::decode(bytes.as_slice()).unwrap();
        let blob = MeanBlob::from_proto(&decoded).unwrap();
        assert_eq!((blob.channels, blob.height, blob.width), (1, 2, 2));
        assert_eq!(blob.channel_means(), vec![5.0]);
    }

    #[test]
    fn test_decode_shaped_proto() {
        let proto = BlobProto {
            shape: Some(BlobShape { dim: vec![1, 3, 1, 1] }),
            double_data: vec![104.0, 117.0, 123.0],
            ..Default::default()
        };
        let blob = MeanBlob::from_proto(&proto).unwrap();
        assert_eq!(blob.channels, 3);
        assert_eq!(blob.channel_means(), vec![104.0, 117.0, 123.0]);
    }

    #[test]
    fn test_short_blob_rejected() {
        let proto = BlobProto {
            shape: Some(BlobShape { dim: vec![1, 3, 2, 2] }),
            data: vec![0.0; 5],
            ..Default::default()
        };
        assert!(matches!(MeanBlob::from_proto(&proto), Err(ClassifierError::MeanError(_))));
    }
}
