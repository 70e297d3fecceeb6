//! Render Pipeline Module
//!
//! Composes the final video for one segment.
//!
//! # Modules
//!
//! - `compose`: background planning, overlay filter graph, atomic encode

mod compose;

pub use compose::*;
