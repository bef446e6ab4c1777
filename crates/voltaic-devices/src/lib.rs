//! Device models and MNA stamps for Voltaic.
//!
//! This crate provides the concrete implementations of the core `Device`
//! trait:
//! - Passive elements: resistor, capacitor, inductor
//! - Independent sources: V, I, with time-varying waveforms
//! - Nonlinear devices: diode, Ebers-Moll BJT, square-law MOSFET
//! - The ideal finite-gain op-amp

pub mod bjt;
pub mod diode;
pub mod mosfet;
pub mod opamp;
pub mod passive;
pub mod sources;
pub mod waveform;

pub use bjt::{Bjt, BjtPolarity};
pub use diode::{Diode, DiodeKind};
pub use mosfet::{Mosfet, MosPolarity};
pub use opamp::OpAmp;
pub use passive::{Capacitor, Inductor, Resistor};
pub use sources::{CurrentSource, VoltageSource};
pub use waveform::Waveform;
