//! Acquired frames and their image/array representations.

use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use ndarray::Array3;

use crate::error::{Result, ScanError};
use crate::traits::RawFrame;

/// One acquired raster.
///
/// `data` holds `height` rows of `width` pixels, each of `samples`
/// interleaved samples of `sample_size` bytes. Two-byte samples are in host
/// byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    samples: u8,
    sample_size: u8,
}

/// Numeric array view of a frame, shaped `(height, width, samples)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameArray {
    /// 8-bit samples.
    U8(Array3<u8>),
    /// 16-bit samples.
    U16(Array3<u16>),
}

impl FrameArray {
    /// Array shape as `(height, width, samples)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        match self {
            Self::U8(a) => a.dim(),
            Self::U16(a) => a.dim(),
        }
    }
}

impl TryFrom<RawFrame> for Frame {
    type Error = ScanError;

    /// Validate a native snap result. An empty buffer is always `NoData`.
    fn try_from(raw: RawFrame) -> Result<Self> {
        if raw.data.is_empty() {
            return Err(ScanError::NoData);
        }
        let expected = raw.width as usize
            * raw.height as usize
            * usize::from(raw.samples)
            * usize::from(raw.sample_size);
        if raw.data.len() != expected {
            return Err(ScanError::FrameSize {
                expected,
                actual: raw.data.len(),
            });
        }
        Ok(Self {
            data: raw.data,
            width: raw.width,
            height: raw.height,
            samples: raw.samples,
            sample_size: raw.sample_size,
        })
    }
}

impl Frame {
    /// Raw sample bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the sample bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Width in pixels.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in lines.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel (1 for gray, 3 for RGB).
    pub const fn samples(&self) -> u8 {
        self.samples
    }

    /// Bytes per sample.
    pub const fn sample_size(&self) -> u8 {
        self.sample_size
    }

    fn samples_u16(&self) -> Vec<u16> {
        self.data
            .chunks_exact(2)
            .filter_map(|pair| <[u8; 2]>::try_from(pair).ok())
            .map(u16::from_ne_bytes)
            .collect()
    }

    /// Convert to an image: `L` for single-band frames, `RGB` for three-band
    /// frames, at 8 or 16 bits per sample.
    pub fn to_image(&self) -> Result<DynamicImage> {
        let size = ScanError::FrameSize {
            expected: self.width as usize * self.height as usize,
            actual: self.data.len(),
        };
        let (w, h) = (self.width, self.height);
        let image = match (self.samples, self.sample_size) {
            (1, 1) => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, self.data.clone())
                .map(DynamicImage::ImageLuma8),
            (3, 1) => ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, self.data.clone())
                .map(DynamicImage::ImageRgb8),
            (1, 2) => ImageBuffer::<Luma<u16>, _>::from_raw(w, h, self.samples_u16())
                .map(DynamicImage::ImageLuma16),
            (3, 2) => ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, self.samples_u16())
                .map(DynamicImage::ImageRgb16),
            (1 | 3, other) => return Err(ScanError::UnexpectedSampleSize(other)),
            (other, _) => return Err(ScanError::UnexpectedSampleCount(other)),
        };
        image.ok_or(size)
    }

    /// Convert to a `(height, width, samples)` array of `u8` or `u16`.
    pub fn to_array(&self) -> Result<FrameArray> {
        let shape = (
            self.height as usize,
            self.width as usize,
            usize::from(self.samples),
        );
        let shape_error = |_| ScanError::FrameSize {
            expected: shape.0 * shape.1 * shape.2 * usize::from(self.sample_size),
            actual: self.data.len(),
        };
        match self.sample_size {
            1 => Array3::from_shape_vec(shape, self.data.clone())
                .map(FrameArray::U8)
                .map_err(shape_error),
            2 => Array3::from_shape_vec(shape, self.samples_u16())
                .map(FrameArray::U16)
                .map_err(shape_error),
            other => Err(ScanError::UnexpectedSampleSize(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(data: Vec<u8>, width: u32, height: u32, samples: u8, sample_size: u8) -> RawFrame {
        RawFrame {
            data,
            width,
            height,
            samples,
            sample_size,
        }
    }

    #[test]
    fn test_empty_buffer_is_no_data() {
        for (samples, sample_size) in [(1, 1), (3, 2), (3, 7)] {
            let err = Frame::try_from(raw(Vec::new(), 10, 10, samples, sample_size))
                .expect_err("empty frame must fail");
            assert!(matches!(err, ScanError::NoData));
        }
        let err = Frame::try_from(raw(Vec::new(), 0, 0, 1, 1)).expect_err("empty frame must fail");
        assert!(matches!(err, ScanError::NoData));
    }

    #[test]
    fn test_length_must_match_geometry() {
        let err = Frame::try_from(raw(vec![0; 5], 2, 2, 1, 1)).expect_err("size mismatch");
        assert!(matches!(
            err,
            ScanError::FrameSize {
                expected: 4,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_gray8_to_image() {
        let frame = Frame::try_from(raw(vec![0, 64, 128, 255], 2, 2, 1, 1)).expect("valid frame");
        let image = frame.to_image().expect("conversion should succeed");
        let gray = image.as_luma8().expect("L image");
        assert_eq!(gray.dimensions(), (2, 2));
        assert_eq!(gray.get_pixel(1, 1).0, [255]);
    }

    #[test]
    fn test_rgb8_to_image() {
        let frame =
            Frame::try_from(raw(vec![255, 0, 0, 0, 0, 255], 2, 1, 3, 1)).expect("valid frame");
        let image = frame.to_image().expect("conversion should succeed");
        let rgb = image.as_rgb8().expect("RGB image");
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_gray16_to_array() {
        let mut data = Vec::new();
        for v in [1u16, 2, 3, 4, 5, 6] {
            data.extend_from_slice(&v.to_ne_bytes());
        }
        let frame = Frame::try_from(raw(data, 3, 2, 1, 2)).expect("valid frame");
        let FrameArray::U16(array) = frame.to_array().expect("conversion should succeed") else {
            panic!("expected 16-bit array");
        };
        assert_eq!(array.dim(), (2, 3, 1));
        assert_eq!(array[[1, 0, 0]], 4);
    }

    #[test]
    fn test_rgb8_array_shape_is_height_width_samples() {
        let frame = Frame::try_from(raw((0..24).collect(), 4, 2, 3, 1)).expect("valid frame");
        let array = frame.to_array().expect("conversion should succeed");
        assert_eq!(array.shape(), (2, 4, 3));
        let FrameArray::U8(array) = array else {
            panic!("expected 8-bit array");
        };
        // Second row, first pixel, blue sample
        assert_eq!(array[[1, 0, 2]], 14);
    }

    #[test]
    fn test_unexpected_sample_size() {
        let frame = Frame::try_from(raw(vec![0; 12], 2, 2, 1, 3)).expect("geometry is consistent");
        assert!(matches!(
            frame.to_array(),
            Err(ScanError::UnexpectedSampleSize(3))
        ));
        assert!(matches!(
            frame.to_image(),
            Err(ScanError::UnexpectedSampleSize(3))
        ));
    }

    #[test]
    fn test_unexpected_sample_count_for_image() {
        let frame = Frame::try_from(raw(vec![0; 8], 2, 2, 2, 1)).expect("geometry is consistent");
        assert!(matches!(
            frame.to_image(),
            Err(ScanError::UnexpectedSampleCount(2))
        ));
    }
}
