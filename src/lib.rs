//! In-memory 2D gridded data for plotting.
//!
//! A [`Matrix`] owns a row-major buffer of `f64` samples plus world-coordinate
//! placement, and caches two derived results that are only refreshed on
//! request: the aggregate [`MatrixStats`] and a spike-insensitive
//! [`SpikeRange`] used to pick display limits that ignore outliers.
//!
//! Cells holding NaN or an infinity are blank: they can be read and written
//! but never count towards statistics or ranges.

pub mod config;
pub mod data;
pub mod error;
pub mod processing;
pub mod state;

pub use config::{EngineConfig, SpikeConfig};
pub use data::source::{InMemorySource, MatrixChunk, MatrixSource, ReadRequest};
pub use error::{MatrixError, Result};
pub use processing::gradient::{GradientDirection, GradientSpec};
pub use processing::spike_range::SpikeRange;
pub use processing::statistics::{MatrixStats, StatName};
pub use state::grid_buffer::{is_blank, GridBuffer, BLANK};
pub use state::matrix::{LabelInfo, LoadOutcome, Matrix, MatrixDescriptor, MatrixId, MatrixParams};
