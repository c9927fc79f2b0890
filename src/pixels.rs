//! Decoding of transferred scan lines into packed sample buffers.
//!
//! `sane_read` delivers lines of `bytes_per_line` bytes which may carry
//! trailing padding. Samples are 1, 8 or 16 bits deep; 16-bit samples arrive
//! in host byte order, 1-bit samples are packed MSB first. In 1-bit color
//! lines every eight pixels take three bytes, one per channel.

use crate::error::{Result, ScanError};
use crate::traits::{FrameFormat, Parameters, RawFrame};

/// Single-band frames accepted before the device must flag the last one.
const MAX_PLANES: usize = 3;

/// Decode one transferred frame.
///
/// Only complete lines are kept; when `params.lines` is known it caps the
/// height. With `want_raw`, 16-bit samples keep both bytes; otherwise every
/// sample is reduced to 8 bits. 1-bit data always expands to 8 bits.
pub fn decode(params: &Parameters, bytes: &[u8], want_raw: bool) -> Result<RawFrame> {
    let channels: usize = match params.format {
        FrameFormat::Gray | FrameFormat::Red | FrameFormat::Green | FrameFormat::Blue => 1,
        FrameFormat::Rgb => 3,
        FrameFormat::Unknown(_) => {
            return Err(ScanError::UnsupportedFormat(params.format.to_string()));
        }
    };
    let width = usize::try_from(params.pixels_per_line).unwrap_or(0);
    let bytes_per_line = usize::try_from(params.bytes_per_line)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| {
            ScanError::UnsupportedFormat(format!("bytes per line {}", params.bytes_per_line))
        })?;

    let samples_per_line = width * channels;
    let payload = match params.depth {
        1 => channels * width.div_ceil(8),
        8 => samples_per_line,
        16 => samples_per_line * 2,
        other => return Err(ScanError::UnsupportedDepth(other)),
    };
    if payload > bytes_per_line {
        return Err(ScanError::FrameSize {
            expected: payload,
            actual: bytes_per_line,
        });
    }

    let mut height = bytes.len() / bytes_per_line;
    if let Ok(lines) = usize::try_from(params.lines) {
        height = height.min(lines);
    }

    let sample_size: u8 = if params.depth == 16 && want_raw { 2 } else { 1 };
    let mut data = Vec::with_capacity(height * samples_per_line * usize::from(sample_size));
    let gray_bitmap = params.format == FrameFormat::Gray;

    for line in bytes.chunks_exact(bytes_per_line).take(height) {
        let line = line.get(..payload).unwrap_or(line);
        match params.depth {
            1 if channels == 3 => unpack_color_bits(line, width, &mut data),
            1 => unpack_bits(line, width, gray_bitmap, &mut data),
            16 if want_raw => data.extend_from_slice(line),
            16 => data.extend(
                line.chunks_exact(2)
                    .map(|pair| <[u8; 2]>::try_from(pair).map_or(0, u16::from_ne_bytes))
                    .map(high_byte),
            ),
            _ => data.extend_from_slice(line),
        }
    }

    Ok(RawFrame {
        data,
        width: u32::try_from(width).unwrap_or(u32::MAX),
        height: u32::try_from(height).unwrap_or(u32::MAX),
        samples: u8::try_from(channels).unwrap_or(1),
        sample_size,
    })
}

#[allow(clippy::cast_possible_truncation)]
const fn high_byte(sample: u16) -> u8 {
    (sample >> 8) as u8
}

/// Expand MSB-first bits to one byte per sample.
///
/// In gray bitmaps a set bit is black; in color data a set bit is full
/// intensity.
fn unpack_bits(line: &[u8], samples: usize, gray_bitmap: bool, out: &mut Vec<u8>) {
    let (on, off) = if gray_bitmap { (0x00, 0xFF) } else { (0xFF, 0x00) };
    out.extend(
        line.iter()
            .flat_map(|&byte| (0..8u32).rev().map(move |bit| (byte >> bit) & 1 == 1))
            .take(samples)
            .map(|set| if set { on } else { off }),
    );
}

/// Expand 1-bit color lines.
///
/// Each three-byte group holds eight pixels: the red, green and blue bits of
/// pixel `k` are bit `7 - k` of the first, second and third byte.
fn unpack_color_bits(line: &[u8], width: usize, out: &mut Vec<u8>) {
    out.extend(
        line.chunks_exact(3)
            .flat_map(|group| (0..8u32).rev().map(move |bit| (group, bit)))
            .take(width)
            .flat_map(|(group, bit)| {
                group
                    .iter()
                    .map(move |&byte| if (byte >> bit) & 1 == 1 { 0xFF } else { 0x00 })
            }),
    );
}

/// Decode the passes of one acquisition into a single frame.
///
/// A gray or RGB pass is the whole image. Red, green and blue passes are
/// collected until one is flagged as the last frame, then interleaved. A
/// repeated channel, or a third single-band pass that is not flagged last,
/// fails with `UnsupportedFormat`; no further pass is pulled from `passes`.
pub fn assemble<I>(passes: I, want_raw: bool) -> Result<RawFrame>
where
    I: IntoIterator<Item = Result<(Parameters, Vec<u8>)>>,
{
    let mut planes: Vec<(usize, RawFrame)> = Vec::with_capacity(MAX_PLANES);
    for pass in passes {
        let (params, bytes) = pass?;
        let frame = decode(&params, &bytes, want_raw)?;
        let Some(channel) = params.format.channel() else {
            if planes.is_empty() {
                return Ok(frame);
            }
            return Err(ScanError::UnsupportedFormat(format!(
                "{} frame inside a three-pass scan",
                params.format
            )));
        };
        if planes.iter().any(|(seen, _)| *seen == channel) {
            return Err(ScanError::UnsupportedFormat(format!(
                "repeated {} frame in a three-pass scan",
                params.format
            )));
        }
        planes.push((channel, frame));
        if params.last_frame {
            return interleave(&planes);
        }
        if planes.len() >= MAX_PLANES {
            return Err(ScanError::UnsupportedFormat(
                "three-pass scan never flagged its last frame".to_owned(),
            ));
        }
    }
    Err(ScanError::NoData)
}

/// Merge the single-band frames of a three-pass scan into interleaved RGB.
///
/// `planes` pairs each frame with its channel (0 = red, 1 = green,
/// 2 = blue). Missing channels stay zero; the result is as tall as the
/// shortest plane.
pub fn interleave(planes: &[(usize, RawFrame)]) -> Result<RawFrame> {
    let (_, first) = planes.first().ok_or(ScanError::NoData)?;
    let width = first.width;
    let sample_size = usize::from(first.sample_size);
    let height = planes.iter().map(|(_, p)| p.height).min().unwrap_or(0);

    for (_, plane) in planes {
        if plane.width != width || plane.sample_size != first.sample_size || plane.samples != 1 {
            return Err(ScanError::UnsupportedFormat(format!(
                "three-pass planes disagree: {}x{}x{} vs {}x{}x{}",
                plane.width, plane.samples, plane.sample_size, width, 1, first.sample_size
            )));
        }
    }

    let pixels = width as usize * height as usize;
    let mut data = vec![0u8; pixels * 3 * sample_size];
    for (channel, plane) in planes {
        if *channel > 2 {
            continue;
        }
        let src = plane.data.chunks_exact(sample_size).take(pixels);
        let dst = data
            .chunks_exact_mut(sample_size)
            .skip(*channel)
            .step_by(3);
        for (d, s) in dst.zip(src) {
            d.copy_from_slice(s);
        }
    }

    Ok(RawFrame {
        data,
        width,
        height,
        samples: 3,
        sample_size: first.sample_size,
    })
}
