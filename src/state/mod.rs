pub mod grid_buffer;
pub mod matrix;
