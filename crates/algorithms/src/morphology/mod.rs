//! Mathematical morphology for masks and band rasters
//!
//! - **Dilation**: grows the foreground of a 0/1 layer
//! - **Erosion**: shrinks the foreground of a 0/1 layer
//! - **Hole filling**: grey-level fill of regional minima not connected to the border

mod dilate;
mod element;
mod erode;
mod fill;

pub use dilate::dilate_mask;
pub use element::StructuringElement;
pub use erode::erode_mask;
pub use fill::fill_holes;
