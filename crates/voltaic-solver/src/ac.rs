//! Small-signal AC frequency sweep.

use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use voltaic_core::Circuit;
use voltaic_core::matrix::mat_solve;

use crate::dc::solve_dc;
use crate::error::{Error, Result};

/// AC sweep result: decade-sampled frequency axis in log10 Hz, linear-scale
/// magnitude and unwrapped phase (degrees) per net label. dB conversion is
/// the caller's business.
#[derive(Debug, Clone)]
pub struct AcSweep {
    pub frequencies: Vec<f64>,
    pub magnitude: IndexMap<String, Vec<f64>>,
    pub phase: IndexMap<String, Vec<f64>>,
}

impl AcSweep {
    pub fn magnitude_of(&self, label: &str) -> Option<&[f64]> {
        self.magnitude.get(label).map(|v| v.as_slice())
    }

    pub fn phase_of(&self, label: &str) -> Option<&[f64]> {
        self.phase.get(label).map(|v| v.as_slice())
    }
}

/// Sweep `npts` points per decade from `fstart` to `fstop`, exciting the
/// named source with a unity stimulus around the DC operating point.
///
/// Each frequency solves one linear complex system, formulated by doubling
/// the real system to `2N×2N` over `[x; y]` (real and imaginary parts):
/// `Gx - ωCy = rhs`, `ωCx + Gy = 0`. Phase is unwrapped by shifting ±360°
/// whenever a step-to-step jump exceeds 90°.
pub fn solve_ac(
    ckt: &mut Circuit,
    npts: usize,
    fstart: f64,
    fstop: f64,
    source_name: &str,
) -> Result<AcSweep> {
    solve_dc(ckt)?;

    let Some(dev) = ckt.device_index(source_name) else {
        return Err(Error::UnknownSource(source_name.to_string()));
    };
    ckt.rhs.fill(0.0);
    ckt.devices[dev].load_ac(&mut ckt.rhs);

    let n = ckt.num_unknowns();
    let mut big = DMatrix::zeros(2 * n, 2 * n);
    let mut rhs2 = DVector::zeros(2 * n);
    for i in 0..n {
        rhs2[i] = ckt.rhs[i];
    }

    let mut frequencies = Vec::new();
    let mut mag_rows: Vec<Vec<f64>> = vec![Vec::new(); n];
    let mut phase_rows: Vec<Vec<f64>> = vec![Vec::new(); n];
    let mut phase_offset = vec![0.0_f64; n];

    let delta_f = (std::f64::consts::LN_10 / npts.max(1) as f64).exp();
    let fstop = fstop * 1.0001; // capture that last freq point
    let mut f = fstart;
    while f <= fstop {
        let omega = std::f64::consts::TAU * f;
        frequencies.push(f.log10());

        for i in 0..n {
            for j in 0..n {
                let g = ckt.mna.g[(i, j)];
                let c = ckt.mna.c[(i, j)];
                big[(i, j)] = g;
                big[(i + n, j + n)] = g;
                big[(i, j + n)] = -omega * c;
                big[(i + n, j)] = omega * c;
            }
        }

        let sol = mat_solve(&big, &rhs2)?;

        for i in 0..n {
            let z = Complex::new(sol[i], sol[i + n]);
            mag_rows[i].push(z.norm());

            let phase = z.arg().to_degrees();
            if let Some(&prev) = phase_rows[i].last() {
                let jump = phase + phase_offset[i] - prev;
                if jump > 90.0 {
                    phase_offset[i] -= 360.0;
                } else if jump < -90.0 {
                    phase_offset[i] += 360.0;
                }
            }
            phase_rows[i].push(phase + phase_offset[i]);
        }

        f *= delta_f;
    }

    let len = frequencies.len();
    let mut magnitude = IndexMap::new();
    let mut phase = IndexMap::new();
    for (label, node) in ckt.labels() {
        match node.index() {
            Some(i) => {
                magnitude.insert(label.to_string(), mag_rows[i].clone());
                phase.insert(label.to_string(), phase_rows[i].clone());
            }
            None => {
                magnitude.insert(label.to_string(), vec![0.0; len]);
                phase.insert(label.to_string(), vec![0.0; len]);
            }
        }
    }

    Ok(AcSweep {
        frequencies,
        magnitude,
        phase,
    })
}
