use serde::{Deserialize, Serialize};

use crate::data::loader::encode_samples;
use crate::error::{MatrixError, Result};
use crate::state::grid_buffer::{is_blank, BLANK};
use crate::state::matrix::MatrixParams;

/// Which part of a source matrix to read, and how to decimate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadRequest {
    pub x_start: usize,
    pub y_start: usize,
    /// Rows to read; `None` reads to the end.
    pub x_count: Option<usize>,
    /// Cells per row to read; `None` reads to the end.
    pub y_count: Option<usize>,
    /// Keep one cell in `skip` along each axis. 0 and 1 both mean no decimation.
    pub skip: usize,
    /// Average each `skip` x `skip` block instead of picking its first cell.
    pub average: bool,
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self {
            x_start: 0,
            y_start: 0,
            x_count: None,
            y_count: None,
            skip: 1,
            average: false,
        }
    }
}

impl ReadRequest {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn decimated(skip: usize, average: bool) -> Self {
        Self {
            skip,
            average,
            ..Self::default()
        }
    }
}

/// Raw native-endian doubles plus the geometry they describe.
#[derive(Debug, Clone)]
pub struct MatrixChunk {
    pub bytes: Vec<u8>,
    pub params: MatrixParams,
}

/// A reader able to supply matrix data, such as a file-format plugin.
pub trait MatrixSource {
    fn read_matrix(&self, request: &ReadRequest) -> Result<MatrixChunk>;
}

/// A source backed by a full grid already in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    params: MatrixParams,
    samples: Vec<f64>,
}

impl InMemorySource {
    pub fn new(params: MatrixParams, samples: Vec<f64>) -> Self {
        Self { params, samples }
    }

    fn sample(&self, x: usize, y: usize) -> f64 {
        self.samples
            .get(x * self.params.height + y)
            .copied()
            .unwrap_or(BLANK)
    }

    fn block_mean(&self, xs: std::ops::Range<usize>, ys: std::ops::Range<usize>) -> f64 {
        let mut sum = 0.0;
        let mut n = 0usize;
        for x in xs {
            for y in ys.clone() {
                let v = self.sample(x, y);
                if !is_blank(v) {
                    sum += v;
                    n += 1;
                }
            }
        }
        if n == 0 {
            BLANK
        } else {
            sum / n as f64
        }
    }
}

impl MatrixSource for InMemorySource {
    fn read_matrix(&self, request: &ReadRequest) -> Result<MatrixChunk> {
        let src = &self.params;
        if request.x_start >= src.width || request.y_start >= src.height {
            return Err(MatrixError::Source(format!(
                "start ({}, {}) is outside the {}x{} source",
                request.x_start, request.y_start, src.width, src.height
            )));
        }
        let avail_x = src.width - request.x_start;
        let avail_y = src.height - request.y_start;
        let nx = request.x_count.unwrap_or(avail_x).min(avail_x);
        let ny = request.y_count.unwrap_or(avail_y).min(avail_y);
        if nx == 0 || ny == 0 {
            return Err(MatrixError::Source("requested an empty region".to_string()));
        }

        let skip = request.skip.max(1);
        let out_w = (nx + skip - 1) / skip;
        let out_h = (ny + skip - 1) / skip;
        let x_end = request.x_start + nx;
        let y_end = request.y_start + ny;

        let mut out = Vec::with_capacity(out_w * out_h);
        for i in 0..out_w {
            let x = request.x_start + i * skip;
            for j in 0..out_h {
                let y = request.y_start + j * skip;
                let v = if request.average && skip > 1 {
                    self.block_mean(x..(x + skip).min(x_end), y..(y + skip).min(y_end))
                } else {
                    self.sample(x, y)
                };
                out.push(v);
            }
        }

        let params = MatrixParams {
            width: out_w,
            height: out_h,
            origin_x: src.origin_x + request.x_start as f64 * src.step_x,
            origin_y: src.origin_y + request.y_start as f64 * src.step_y,
            step_x: src.step_x * skip as f64,
            step_y: src.step_y * skip as f64,
        };
        Ok(MatrixChunk {
            bytes: encode_samples(&out),
            params,
        })
    }
}
