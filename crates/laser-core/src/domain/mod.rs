//! Cut-job domain: geometry and layers.
//!
//! Pure data and geometry; nothing here frames or encodes messages.  The
//! program compiler in [`crate::program`] turns these types into protocol messages.

pub mod geometry;
pub mod layer;
