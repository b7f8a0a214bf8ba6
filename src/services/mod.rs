//! Services around the pipeline
//!
//! File and in-memory image I/O live here so the pipeline itself only ever sees
//! decoded pixels.

pub mod io;

pub use io::ImageIo;
