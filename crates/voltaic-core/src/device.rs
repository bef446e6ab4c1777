//! The device capability trait.

use nalgebra::DVector;

use crate::mna::MnaSystem;

/// Coarse classification used where analyses treat sources specially: the
/// voltage-source loop check, branch-current reporting, and the
/// missing-ground-path hint for current sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Passive,
    VoltageSource,
    CurrentSource,
}

/// A circuit element.
///
/// Devices are immutable in topology after construction; every method takes
/// the matrices and vectors it writes to, so models stay free of solver
/// state. Loader sign convention: the rhs accumulates `-f` (the negated
/// residual) and `G` accumulates `df/dx`.
pub trait Device: std::fmt::Debug + Send + Sync {
    /// Add time-invariant stamps to `Gl` and `C`. Called once at finalize.
    fn load_linear(&self, mna: &mut MnaSystem);

    /// Add nonlinear or source contributions at the solution estimate.
    fn load_dc(&self, mna: &mut MnaSystem, soln: &DVector<f64>, rhs: &mut DVector<f64>) {
        let _ = (mna, soln, rhs);
    }

    /// Time-aware variant of [`Device::load_dc`] for transient stepping.
    fn load_tran(&self, mna: &mut MnaSystem, soln: &DVector<f64>, rhs: &mut DVector<f64>, time: f64) {
        let _ = time;
        self.load_dc(mna, soln, rhs);
    }

    /// Small-signal excitation: only the device named in the AC request is
    /// asked to inject (a unity stimulus).
    fn load_ac(&self, rhs: &mut DVector<f64>) {
        let _ = rhs;
    }

    /// Next time at or after `time` where the device's waveform changes
    /// slope, or `None` if it is smooth from here on.
    fn breakpoint(&self, time: f64) -> Option<f64> {
        let _ = time;
        None
    }

    /// One-shot derived-constant setup, before linear loading.
    fn finalize(&mut self) {}

    /// Index of the current-type unknown owned by this device, if any.
    fn branch(&self) -> Option<usize> {
        None
    }

    /// Repeat period for periodic sources (`None` when aperiodic).
    fn source_period(&self) -> Option<f64> {
        None
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::Passive
    }
}
