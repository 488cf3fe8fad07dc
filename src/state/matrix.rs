use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, SpikeConfig};
use crate::data::loader;
use crate::data::source::{MatrixSource, ReadRequest};
use crate::error::{MatrixError, Result};
use crate::processing::gradient::GradientSpec;
use crate::processing::spike_range::{self, SpikeRange};
use crate::processing::statistics::MatrixStats;
use crate::state::grid_buffer::{is_blank, GridBuffer, BLANK};

/// Identifier handed out by whatever store owns the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatrixId(pub u64);

impl fmt::Display for MatrixId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Shape and world-coordinate placement of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixParams {
    pub width: usize,
    pub height: usize,
    /// World coordinate of cell (0, 0).
    pub origin_x: f64,
    pub origin_y: f64,
    /// World units per cell.
    pub step_x: f64,
    pub step_y: f64,
}

impl MatrixParams {
    pub fn new(width: usize, height: usize, origin_x: f64, origin_y: f64, step_x: f64, step_y: f64) -> Self {
        Self {
            width,
            height,
            origin_x,
            origin_y,
            step_x,
            step_y,
        }
    }
}

impl Default for MatrixParams {
    fn default() -> Self {
        Self::new(0, 0, 0.0, 0.0, 1.0, 1.0)
    }
}

/// Axis or title text attached to a matrix for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelInfo {
    pub name: String,
    pub quantity: String,
    pub units: String,
}

impl LabelInfo {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            units: units.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.quantity.is_empty() && self.units.is_empty()
    }

    /// `quantity [units]`, falling back to `name` when no quantity is set.
    pub fn single_line(&self) -> String {
        let head = if self.quantity.is_empty() { &self.name } else { &self.quantity };
        if self.units.is_empty() {
            head.clone()
        } else {
            format!("{head} [{}]", self.units)
        }
    }
}

/// Result of loading a byte payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Complete { decoded: usize },
    /// The payload held fewer samples than the shape asked for; the buffer was
    /// shrunk to what was decoded.
    Truncated { requested: usize, decoded: usize },
}

impl LoadOutcome {
    pub fn is_truncated(&self) -> bool {
        matches!(self, LoadOutcome::Truncated { .. })
    }

    pub fn decoded(&self) -> usize {
        match *self {
            LoadOutcome::Complete { decoded } | LoadOutcome::Truncated { decoded, .. } => decoded,
        }
    }
}

/// Summary handed to project files and inspectors.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixDescriptor {
    pub id: MatrixId,
    pub name: String,
    pub params: MatrixParams,
    pub editable: bool,
    pub saveable: bool,
    pub x_label: LabelInfo,
    pub y_label: LabelInfo,
    pub title: LabelInfo,
    pub stats: MatrixStats,
    pub spike_range: Option<SpikeRange>,
}

/// A 2D grid of samples with cached statistics.
///
/// Nothing is recomputed behind the caller's back: cell writes leave
/// [`Matrix::stats`] and [`Matrix::spike_range`] as they were until
/// [`Matrix::recompute`] / [`Matrix::compute_spike_range`] run again. The
/// change counter tells callers whether either cache is stale.
///
/// Mutators take `&mut self`, so sharing a matrix between threads means
/// wrapping it in a lock and holding the write guard across a whole logical
/// operation such as resize followed by recompute.
#[derive(Debug, Clone)]
pub struct Matrix {
    id: MatrixId,
    origin_x: f64,
    origin_y: f64,
    step_x: f64,
    step_y: f64,
    buffer: GridBuffer,
    stats: MatrixStats,
    spike_range: Option<SpikeRange>,
    serial: u64,
    stats_serial: u64,
    spike_serial: u64,
    config: EngineConfig,
    editable: bool,
    saveable: bool,
    x_label: LabelInfo,
    y_label: LabelInfo,
    title: LabelInfo,
}

impl Matrix {
    pub fn new(id: MatrixId) -> Self {
        Self::with_config(id, EngineConfig::default())
    }

    pub fn with_config(id: MatrixId, config: EngineConfig) -> Self {
        Self {
            id,
            origin_x: 0.0,
            origin_y: 0.0,
            step_x: 1.0,
            step_y: 1.0,
            buffer: GridBuffer::new(),
            stats: MatrixStats::default(),
            spike_range: None,
            serial: 0,
            stats_serial: 0,
            spike_serial: 0,
            config,
            editable: false,
            saveable: false,
            x_label: LabelInfo::default(),
            y_label: LabelInfo::default(),
            title: LabelInfo::default(),
        }
    }

    /// A zero-filled matrix with the given geometry.
    pub fn from_params(id: MatrixId, params: MatrixParams) -> Result<Self> {
        let mut matrix = Self::new(id);
        matrix.change(params)?;
        Ok(matrix)
    }

    /// Rebuild a matrix from the bytes produced by [`Matrix::serialize`].
    pub fn from_snapshot(id: MatrixId, bytes: &[u8]) -> Result<Self> {
        let (params, samples) = loader::decode_snapshot(bytes)?;
        let mut matrix = Self::new(id);
        matrix.set_geometry(&params);
        matrix.buffer = GridBuffer::from_parts(params.width, params.height, samples);
        matrix.saveable = true;
        matrix.touch();
        matrix.recompute();
        Ok(matrix)
    }

    pub fn id(&self) -> MatrixId {
        self.id
    }

    pub fn name(&self) -> String {
        self.id.to_string()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.buffer.width()
    }

    pub fn height(&self) -> usize {
        self.buffer.height()
    }

    /// Samples actually allocated. Smaller than `width * height` after a truncated load.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Desired number of cells, `width * height`.
    pub fn sample_count(&self) -> usize {
        self.buffer.logical_len()
    }

    pub fn params(&self) -> MatrixParams {
        MatrixParams {
            width: self.width(),
            height: self.height(),
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            step_x: self.step_x,
            step_y: self.step_y,
        }
    }

    pub fn size_string(&self) -> String {
        format!("{}x{}", self.width(), self.height())
    }

    pub fn description_tip(&self) -> String {
        format!("Matrix: {}\n {} x {}", self.name(), self.width(), self.height())
    }

    pub fn editable(&self) -> bool {
        self.editable
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    /// Whether the cell data came from a payload and belongs in a saved project.
    pub fn saveable(&self) -> bool {
        self.saveable
    }

    pub fn x_label(&self) -> &LabelInfo {
        &self.x_label
    }

    pub fn set_x_label(&mut self, label: LabelInfo) {
        self.x_label = label;
    }

    pub fn y_label(&self) -> &LabelInfo {
        &self.y_label
    }

    pub fn set_y_label(&mut self, label: LabelInfo) {
        self.y_label = label;
    }

    pub fn title(&self) -> &LabelInfo {
        &self.title
    }

    pub fn set_title(&mut self, label: LabelInfo) {
        self.title = label;
    }

    /// Change counter, bumped by every mutation.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    fn touch(&mut self) {
        self.serial += 1;
    }

    fn set_geometry(&mut self, params: &MatrixParams) {
        self.origin_x = params.origin_x;
        self.origin_y = params.origin_y;
        self.step_x = params.step_x;
        self.step_y = params.step_y;
    }

    /// Samples that belong to the logical shape and are actually allocated.
    fn live_samples(&self) -> &[f64] {
        let n = self.buffer.logical_len().min(self.buffer.capacity());
        &self.buffer.as_slice()[..n]
    }

    /// Raw row-major samples. The borrow ends before any resize can run.
    pub fn data(&self) -> &[f64] {
        self.buffer.as_slice()
    }

    /// Mutable raw samples. Counts as a change even if nothing is written.
    pub fn data_mut(&mut self) -> &mut [f64] {
        self.touch();
        self.buffer.as_mut_slice()
    }

    pub fn grid(&self) -> &GridBuffer {
        &self.buffer
    }

    pub fn index(&self, x: usize, y: usize) -> Option<usize> {
        self.buffer.index(x, y)
    }

    /// Value of cell `(x, y)`, or `None` for an invalid index or a blank cell.
    pub fn cell_value(&self, x: usize, y: usize) -> Option<f64> {
        self.buffer.get(x, y).filter(|v| !is_blank(*v))
    }

    /// Value at flat offset `index`, or `None` past the allocation or for a blank cell.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.buffer.as_slice().get(index).copied().filter(|v| !is_blank(*v))
    }

    pub fn set_cell(&mut self, x: usize, y: usize, value: f64) -> Result<()> {
        self.buffer.set(x, y, value)?;
        self.touch();
        Ok(())
    }

    /// Cell containing the world point, as signed cell coordinates.
    /// `None` when a step is zero or the mapping is not finite.
    pub fn world_to_cell(&self, world_x: f64, world_y: f64) -> Option<(i64, i64)> {
        if self.step_x == 0.0 || self.step_y == 0.0 {
            return None;
        }
        let fx = ((world_x - self.origin_x) / self.step_x).floor();
        let fy = ((world_y - self.origin_y) / self.step_y).floor();
        if !fx.is_finite() || !fy.is_finite() {
            return None;
        }
        Some((fx as i64, fy as i64))
    }

    fn world_to_unsigned(&self, world_x: f64, world_y: f64) -> Option<(usize, usize)> {
        let (x, y) = self.world_to_cell(world_x, world_y)?;
        Some((usize::try_from(x).ok()?, usize::try_from(y).ok()?))
    }

    pub fn world_value(&self, world_x: f64, world_y: f64) -> Option<f64> {
        let (x, y) = self.world_to_unsigned(world_x, world_y)?;
        self.cell_value(x, y)
    }

    pub fn set_world_value(&mut self, world_x: f64, world_y: f64, value: f64) -> Result<()> {
        match self.world_to_unsigned(world_x, world_y) {
            Some((x, y)) => self.set_cell(x, y, value),
            None => {
                let (x, y) = self.world_to_cell(world_x, world_y).unwrap_or((i64::MIN, i64::MIN));
                Err(MatrixError::InvalidIndex {
                    x,
                    y,
                    width: self.width(),
                    height: self.height(),
                })
            }
        }
    }

    /// Set every allocated cell to zero.
    pub fn zero(&mut self) {
        self.buffer.fill(0.0);
        self.touch();
    }

    /// Set every allocated cell to the blank sentinel.
    pub fn blank(&mut self) {
        self.buffer.fill(BLANK);
        self.touch();
    }

    /// Reshape, keeping the value of every cell present in both shapes, then
    /// refresh the statistics. On failure the matrix is left unchanged.
    pub fn resize(&mut self, width: usize, height: usize, reinitialize: bool) -> Result<()> {
        self.buffer.reshape(width, height, reinitialize)?;
        self.touch();
        self.recompute();
        Ok(())
    }

    /// Flat reallocation to exactly `samples` cells, leaving the shape as it is.
    pub fn resize_capacity(&mut self, samples: usize, reinitialize: bool) -> Result<()> {
        self.buffer.resize_capacity(samples, reinitialize)?;
        self.touch();
        Ok(())
    }

    /// Adopt new geometry. Cells new to the shape are zeroed when the engine
    /// config asks for it.
    pub fn change(&mut self, params: MatrixParams) -> Result<()> {
        let reinitialize = self.config.reinitialize_on_change;
        self.buffer.reshape(params.width, params.height, reinitialize)?;
        self.set_geometry(&params);
        self.touch();
        self.recompute();
        Ok(())
    }

    /// Adopt new geometry and fill the cells from native-endian doubles.
    ///
    /// A payload shorter than `width * height` samples is not an error: the
    /// buffer is shrunk to the samples actually decoded and the outcome says so.
    pub fn change_from_bytes(&mut self, bytes: &[u8], params: MatrixParams) -> Result<LoadOutcome> {
        self.buffer.reshape(params.width, params.height, true)?;
        self.set_geometry(&params);
        self.saveable = true;

        let requested = params.width * params.height;
        let decoded = loader::decode_samples(bytes, requested);
        let count = decoded.values.len();
        self.buffer.as_mut_slice()[..count].copy_from_slice(&decoded.values);

        let outcome = if count < requested {
            tracing::warn!(
                matrix = %self.id,
                requested,
                decoded = count,
                finite_fraction = decoded.finite_fraction,
                "saved matrix contains less data than it claims"
            );
            self.buffer.resize_capacity(count, false)?;
            LoadOutcome::Truncated {
                requested,
                decoded: count,
            }
        } else {
            tracing::debug!(
                matrix = %self.id,
                decoded = count,
                finite_fraction = decoded.finite_fraction,
                "loaded matrix payload"
            );
            LoadOutcome::Complete { decoded: count }
        };

        self.touch();
        self.recompute();
        Ok(outcome)
    }

    /// Pull a chunk from a data source and load it.
    pub fn update_from_source(&mut self, source: &dyn MatrixSource, request: &ReadRequest) -> Result<LoadOutcome> {
        let chunk = source.read_matrix(request)?;
        self.change_from_bytes(&chunk.bytes, chunk.params)
    }

    /// Adopt new geometry and fill it with a linear ramp.
    pub fn generate_gradient(&mut self, params: MatrixParams, spec: GradientSpec) -> Result<()> {
        self.buffer.reshape(params.width, params.height, true)?;
        self.set_geometry(&params);
        spec.fill(&mut self.buffer);
        self.touch();
        self.recompute();
        Ok(())
    }

    /// Recompute the statistics record from the current cells.
    pub fn recompute(&mut self) {
        self.stats = MatrixStats::compute(self.live_samples());
        self.stats_serial = self.serial;
        tracing::debug!(
            matrix = %self.id,
            ns = self.stats.ns,
            min = self.stats.min,
            max = self.stats.max,
            "recomputed matrix statistics"
        );
    }

    pub fn stats(&self) -> &MatrixStats {
        &self.stats
    }

    pub fn stats_are_stale(&self) -> bool {
        self.stats_serial != self.serial
    }

    /// Published scalar by name (`"min"`, `"ns"`, `"sumsquared"`, ...).
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.stats.scalar(name)
    }

    pub fn min_value(&self) -> f64 {
        self.stats.min
    }

    pub fn max_value(&self) -> f64 {
        self.stats.max
    }

    pub fn mean_value(&self) -> f64 {
        self.stats.mean
    }

    pub fn min_value_positive(&self) -> f64 {
        self.stats.min_positive
    }

    /// Estimate and cache the spike-insensitive range with `percentile`
    /// trimmed from each tail.
    pub fn compute_spike_range(&mut self, percentile: f64) -> SpikeRange {
        let spike = SpikeConfig {
            percentile,
            ..self.config.spike
        };
        self.cache_spike_range(&spike)
    }

    /// [`Matrix::compute_spike_range`] with the configured percentile.
    pub fn compute_spike_range_default(&mut self) -> SpikeRange {
        let spike = self.config.spike;
        self.cache_spike_range(&spike)
    }

    fn cache_spike_range(&mut self, spike: &SpikeConfig) -> SpikeRange {
        let range = spike_range::estimate_with(self.live_samples(), spike);
        self.spike_range = Some(range);
        self.spike_serial = self.serial;
        range
    }

    /// Last computed spike-insensitive range. Not refreshed by mutations.
    pub fn spike_range(&self) -> Option<SpikeRange> {
        self.spike_range
    }

    pub fn spike_range_is_stale(&self) -> bool {
        self.spike_range.is_none() || self.spike_serial != self.serial
    }

    /// Snapshot: `i32` width and height, `f64` origin and step, then the
    /// `width * height` samples, all little-endian.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        loader::encode_snapshot(&self.params(), self.buffer.as_slice())
    }

    pub fn descriptor(&self) -> MatrixDescriptor {
        MatrixDescriptor {
            id: self.id,
            name: self.name(),
            params: self.params(),
            editable: self.editable,
            saveable: self.saveable,
            x_label: self.x_label.clone(),
            y_label: self.y_label.clone(),
            title: self.title.clone(),
            stats: self.stats,
            spike_range: self.spike_range,
        }
    }

    pub fn descriptor_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.descriptor())?)
    }
}
