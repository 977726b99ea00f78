//! Raster image codec for Darkroom.
//!
//! [`RasterCodec`] implements [`ImageCodec`](darkroom_interface::ImageCodec)
//! on the `image` crate: header-only probing, full decode, exact resize,
//! optional greyscale conversion and JPEG encoding.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod raster;

pub use raster::RasterCodec;
