use crate::error::{MatrixError, Result};
use crate::state::grid_buffer::{is_blank, BLANK};
use crate::state::matrix::MatrixParams;

const SAMPLE_BYTES: usize = std::mem::size_of::<f64>();

/// Bytes before the samples in a snapshot: two `i32` dimensions and four `f64` geometry values.
pub const SNAPSHOT_HEADER_BYTES: usize = 2 * 4 + 4 * 8;

/// Samples decoded from a raw payload.
pub struct DecodedSamples {
    pub values: Vec<f64>,
    /// Fraction of decoded values that are not blank.
    pub finite_fraction: f64,
}

/// Decode up to `limit` native-endian doubles from `bytes`.
/// A trailing partial sample is ignored.
pub fn decode_samples(bytes: &[u8], limit: usize) -> DecodedSamples {
    let mut values = Vec::with_capacity(limit.min(bytes.len() / SAMPLE_BYTES));
    let mut valid = 0usize;
    for chunk in bytes.chunks_exact(SAMPLE_BYTES).take(limit) {
        let v: f64 = bytemuck::pod_read_unaligned(chunk);
        if !is_blank(v) {
            valid += 1;
        }
        values.push(v);
    }
    let finite_fraction = if values.is_empty() {
        0.0
    } else {
        valid as f64 / values.len() as f64
    };
    DecodedSamples { values, finite_fraction }
}

/// Native-endian byte image of `values`, the layout [`decode_samples`] reads.
pub fn encode_samples(values: &[f64]) -> Vec<u8> {
    bytemuck::cast_slice(values).to_vec()
}

fn dimension_to_i32(width: usize, height: usize) -> Result<(i32, i32)> {
    match (i32::try_from(width), i32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(MatrixError::InvalidDimensions { width, height }),
    }
}

/// Write a little-endian snapshot: header, then `width * height` samples in
/// row-major order. Cells missing from `samples` are written as blank.
pub fn encode_snapshot(params: &MatrixParams, samples: &[f64]) -> Result<Vec<u8>> {
    let (w, h) = dimension_to_i32(params.width, params.height)?;
    let count = params.width * params.height;

    let mut out = Vec::with_capacity(SNAPSHOT_HEADER_BYTES + count * SAMPLE_BYTES);
    out.extend_from_slice(&w.to_le_bytes());
    out.extend_from_slice(&h.to_le_bytes());
    for v in [params.origin_x, params.origin_y, params.step_x, params.step_y] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for i in 0..count {
        let v = samples.get(i).copied().unwrap_or(BLANK);
        out.extend_from_slice(&v.to_le_bytes());
    }
    Ok(out)
}

fn read_f64(bytes: &[u8], at: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    f64::from_le_bytes(raw)
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    i32::from_le_bytes(raw)
}

/// Parse a snapshot written by [`encode_snapshot`].
pub fn decode_snapshot(bytes: &[u8]) -> Result<(MatrixParams, Vec<f64>)> {
    if bytes.len() < SNAPSHOT_HEADER_BYTES {
        return Err(MatrixError::MalformedSnapshot(format!(
            "{} bytes is shorter than the {SNAPSHOT_HEADER_BYTES} byte header",
            bytes.len()
        )));
    }
    let w = read_i32(bytes, 0);
    let h = read_i32(bytes, 4);
    let (width, height) = match (usize::try_from(w), usize::try_from(h)) {
        (Ok(width), Ok(height)) => (width, height),
        _ => {
            return Err(MatrixError::MalformedSnapshot(format!(
                "negative dimensions {w}x{h}"
            )))
        }
    };
    let params = MatrixParams {
        width,
        height,
        origin_x: read_f64(bytes, 8),
        origin_y: read_f64(bytes, 16),
        step_x: read_f64(bytes, 24),
        step_y: read_f64(bytes, 32),
    };

    let count = width
        .checked_mul(height)
        .ok_or(MatrixError::InvalidDimensions { width, height })?;
    let body = &bytes[SNAPSHOT_HEADER_BYTES..];
    if body.len() / SAMPLE_BYTES < count {
        return Err(MatrixError::MalformedSnapshot(format!(
            "expected {count} samples for {width}x{height}, found {}",
            body.len() / SAMPLE_BYTES
        )));
    }
    let values = body
        .chunks_exact(SAMPLE_BYTES)
        .take(count)
        .map(|c| read_f64(c, 0))
        .collect();
    Ok((params, values))
}
