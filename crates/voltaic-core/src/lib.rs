//! Core circuit representation for Voltaic.
//!
//! This crate provides:
//! - Dense linear-algebra kernels used by the analyses (elimination with
//!   partial pivoting, a rank-revealing orthogonalization solve, rank)
//! - The MNA matrix set (`Gl`, `G`, `C`) and stamp helpers
//! - The [`Circuit`] topology container and the [`Device`] capability trait
//! - Engineering-notation numeric parsing and formatting

pub mod circuit;
pub mod device;
pub mod error;
pub mod matrix;
pub mod mna;
pub mod node;
pub mod units;

pub use circuit::Circuit;
pub use device::{Device, DeviceClass};
pub use error::{Error, Result};
pub use mna::{MnaSystem, add_to_rhs, voltage_between};
pub use node::{Node, NodeKind};
pub use units::{format_value, parse_value};
