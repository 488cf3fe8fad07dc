pub mod gradient;
pub mod spike_range;
pub mod statistics;
