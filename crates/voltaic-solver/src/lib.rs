//! Analyses for Voltaic circuits.
//!
//! Three entry points, all driving one [`Circuit`](voltaic_core::Circuit):
//! - [`solve_dc`]: Newton-Raphson operating point
//! - [`solve_ac`]: small-signal frequency sweep around the operating point
//! - [`solve_transient`]: variable-step trapezoidal integration with LTE
//!   step control
//!
//! Analyses run to completion synchronously; the iteration caps
//! (`dc_max_iters`, per-step transient iterations, steps per period) bound
//! worst-case latency in place of a timeout.

pub mod ac;
pub mod dc;
pub mod error;
pub mod newton;
pub mod transient;

pub use ac::{AcSweep, solve_ac};
pub use dc::{OperatingPoint, solve_dc};
pub use error::{Error, Result};
pub use newton::find_solution;
pub use transient::{TransientResult, solve_transient};
