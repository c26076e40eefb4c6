// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Internals: the native context seam and everything that talks to it.

pub mod gl;
pub mod headless;

mod bound_device;
mod error;

pub(crate) mod draw;
pub(crate) mod pass;
pub(crate) mod program;
pub(crate) mod replay;

pub(crate) use bound_device::{BoundDevice, NativeObject};
pub use error::{Error, UnsupportedOperation};
