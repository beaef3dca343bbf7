//! A Rust library for reading, writing, and converting `AMI` visual-novel
//! archives: the `GRP` raster codec, the `SCR` binary script codec, and
//! the `mlt`/`txt`/`xml` human-editable transcript formats.
pub mod archive;
pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
pub mod ext;
pub mod text;
pub mod utils;

lazy_static::lazy_static! {
    static ref COUNTER: utils::counter::Counter = utils::counter::Counter::new();
}

/// Returns a reference to the global counter instance.
pub fn get_counter() -> &'static utils::counter::Counter {
    &COUNTER
}
