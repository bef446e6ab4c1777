//! Dense linear-algebra kernels.
//!
//! The analyses operate on dense `nalgebra` storage but use their own
//! elimination routines: the solvers here must keep going on the
//! ill-conditioned and outright singular systems that legal-but-degenerate
//! circuits produce (floating sub-networks, zero-conductance nodes), where a
//! plain LU factorization would bail out.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// A very small number compared to one.
pub const EPS: f64 = 1.0e-12;

/// Per-row or uniform scaling for [`mat_scale_add`].
#[derive(Debug, Clone, Copy)]
pub enum RowScale<'a> {
    Uniform(f64),
    PerRow(&'a DVector<f64>),
}

impl RowScale<'_> {
    fn at(&self, row: usize) -> f64 {
        match self {
            RowScale::Uniform(s) => *s,
            RowScale::PerRow(v) => v[row],
        }
    }
}

impl From<f64> for RowScale<'_> {
    fn from(s: f64) -> Self {
        RowScale::Uniform(s)
    }
}

/// Compute `scale * M * x`.
pub fn mat_vec_multiply(m: &DMatrix<f64>, x: &DVector<f64>, scale: f64) -> Result<DVector<f64>> {
    if m.ncols() != x.len() {
        return Err(Error::DimensionMismatch {
            expected: m.ncols(),
            actual: x.len(),
        });
    }

    let mut b = DVector::zeros(m.nrows());
    for i in 0..m.nrows() {
        let mut acc = 0.0;
        for j in 0..m.ncols() {
            acc += m[(i, j)] * x[j];
        }
        b[i] = scale * acc;
    }
    Ok(b)
}

/// Compute `out = scale_a * A + scale_b * B` element-wise over the bounds of
/// `A`. Row scales let the transient integrator blend trapezoidal and
/// backward-Euler coefficients per unknown.
pub fn mat_scale_add(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    scale_a: RowScale<'_>,
    scale_b: RowScale<'_>,
    out: &mut DMatrix<f64>,
) -> Result<()> {
    let (n, m) = (a.nrows(), a.ncols());
    if n > b.nrows() || m > b.ncols() {
        return Err(Error::DimensionMismatch {
            expected: n.max(m),
            actual: b.nrows().min(b.ncols()),
        });
    }
    if n > out.nrows() || m > out.ncols() {
        return Err(Error::DimensionMismatch {
            expected: n.max(m),
            actual: out.nrows().min(out.ncols()),
        });
    }
    if let RowScale::PerRow(v) = scale_a {
        if v.len() < n {
            return Err(Error::DimensionMismatch {
                expected: n,
                actual: v.len(),
            });
        }
    }
    if let RowScale::PerRow(v) = scale_b {
        if v.len() < n {
            return Err(Error::DimensionMismatch {
                expected: n,
                actual: v.len(),
            });
        }
    }

    for i in 0..n {
        let (sa, sb) = (scale_a.at(i), scale_b.at(i));
        for j in 0..m {
            out[(i, j)] = sa * a[(i, j)] + sb * b[(i, j)];
        }
    }
    Ok(())
}

/// Copy `src` into `dest` using the bounds of `src`.
pub fn mat_copy(src: &DMatrix<f64>, dest: &mut DMatrix<f64>) -> Result<()> {
    if src.nrows() > dest.nrows() || src.ncols() > dest.ncols() {
        return Err(Error::DimensionMismatch {
            expected: src.nrows().max(src.ncols()),
            actual: dest.nrows().min(dest.ncols()),
        });
    }
    for i in 0..src.nrows() {
        for j in 0..src.ncols() {
            dest[(i, j)] = src[(i, j)];
        }
    }
    Ok(())
}

/// Copy the transpose of `src` into `dest` using the bounds of `src`.
pub fn mat_copy_transposed(src: &DMatrix<f64>, dest: &mut DMatrix<f64>) -> Result<()> {
    if src.nrows() > dest.ncols() || src.ncols() > dest.nrows() {
        return Err(Error::DimensionMismatch {
            expected: src.nrows().max(src.ncols()),
            actual: dest.nrows().min(dest.ncols()),
        });
    }
    for i in 0..src.nrows() {
        for j in 0..src.ncols() {
            dest[(j, i)] = src[(i, j)];
        }
    }
    Ok(())
}

/// Rank of `m` by Gaussian elimination with partial pivoting.
///
/// A pivot only counts when its magnitude exceeds `EPS` times the largest
/// entry of the matrix, so near-zero fill-in does not inflate the rank.
pub fn mat_rank(m: &DMatrix<f64>) -> usize {
    let nr = m.nrows();
    let nc = m.ncols();
    let mut w = m.clone();

    let mut max_abs_entry = 0.0_f64;
    for i in 0..nr {
        for j in 0..nc {
            max_abs_entry = max_abs_entry.max(w[(i, j)].abs());
        }
    }

    let mut rank = 0;
    let mut start_col = 0;
    for row in 0..nr {
        // Search for the first column with a usable pivot below `row`.
        for col in start_col..nc {
            let mut max_v = w[(row, col)].abs();
            let mut max_row = row;
            for i in (row + 1)..nr {
                let t = w[(i, col)].abs();
                if t > max_v {
                    max_v = t;
                    max_row = i;
                }
            }

            if max_v > EPS * max_abs_entry {
                start_col = col + 1;
                rank += 1;
                w.swap_rows(row, max_row);

                for i in (row + 1)..nr {
                    let t = w[(i, col)] / w[(row, col)];
                    if t != 0.0 {
                        for j in col..nc {
                            let sub = w[(row, j)] * t;
                            w[(i, j)] -= sub;
                        }
                    }
                }
                break;
            }
        }
    }

    rank
}

/// Flag the rows of `m` that can be zeroed without changing its rank.
///
/// Used on the `C` matrix to find algebraic unknowns: rows with no dynamics
/// whose local truncation error is meaningless.
pub fn algebraic_rows(m: &DMatrix<f64>) -> Vec<bool> {
    let nr = m.nrows();
    let mut w = m.clone();
    let full_rank = mat_rank(&w);

    let mut algebraic = vec![false; nr];
    for row in 0..nr {
        for col in 0..m.ncols() {
            w[(row, col)] = 0.0;
        }
        if mat_rank(&w) == full_rank {
            algebraic[row] = true;
        } else {
            for col in 0..m.ncols() {
                w[(row, col)] = m[(row, col)];
            }
        }
    }
    algebraic
}

/// Solve `Ax = b` by Gaussian elimination with partial pivoting.
///
/// A fully zero pivot column is patched with a tiny conductance (`EPS`) to
/// ground instead of failing, trading exactness for robustness on ill-posed
/// sub-circuits.
pub fn mat_solve(a: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            actual: a.ncols(),
        });
    }
    if rhs.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            actual: rhs.len(),
        });
    }

    // Augmented working copy [A | b].
    let mut m = DMatrix::zeros(n, n + 1);
    for i in 0..n {
        for j in 0..n {
            m[(i, j)] = a[(i, j)];
        }
        m[(i, n)] = rhs[i];
    }

    for col in 0..n {
        let mut max_v = m[(col, col)].abs();
        let mut max_row = col;
        for i in (col + 1)..n {
            let t = m[(i, col)].abs();
            if t > max_v {
                max_v = t;
                max_row = i;
            }
        }

        if max_v == 0.0 {
            m[(col, col)] = EPS;
        } else {
            m.swap_rows(col, max_row);
        }

        for i in (col + 1)..n {
            let t = m[(i, col)] / m[(col, col)];
            if t != 0.0 {
                for j in col..=n {
                    let sub = m[(col, j)] * t;
                    m[(i, j)] -= sub;
                }
            }
        }
    }

    // Back-substitute from the last row.
    let mut x = DVector::zeros(n);
    for i in (0..n).rev() {
        let mut t = m[(i, n)];
        for j in (i + 1)..n {
            t -= m[(i, j)] * x[j];
        }
        x[i] = t / m[(i, i)];
    }

    Ok(x)
}

/// Solve `Ax = b` by row orthogonalization.
///
/// Rows are pivoted by 2-norm, normalized and projected out of the rows
/// below; the solution is recovered by back-multiplication with the retained
/// orthonormal rows. Rows whose norm collapses below `EPS` of the leading
/// row are treated as null space, so a rank-deficient system yields a finite
/// minimum-norm-flavored solution instead of an error. Newton iterations
/// lean on this: intermediate Jacobians of circuits with floating
/// sub-networks are routinely singular.
pub fn mat_solve_rq(a: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
    let nr = a.nrows();
    let nc = a.ncols() + 1; // augmented column count
    if rhs.len() != nr {
        return Err(Error::DimensionMismatch {
            expected: nr,
            actual: rhs.len(),
        });
    }

    let mut m = DMatrix::zeros(nr, nc);
    for i in 0..nr {
        for j in 0..(nc - 1) {
            m[(i, j)] = a[(i, j)];
        }
        m[(i, nc - 1)] = rhs[i];
    }

    let mut mat_scale = 0.0; // sets the scale for comparison to zero
    let mut last_nonzero_row = if nr > 0 { Some(nr - 1) } else { None };
    for row in 0..nr {
        // Pick the remaining row with the largest 2-norm.
        let mut max_row = row;
        let mut max_sumsq = 0.0;
        for rowp in row..nr {
            let mut sumsq = 0.0;
            for col in 0..(nc - 1) {
                sumsq += m[(rowp, col)] * m[(rowp, col)];
            }
            if rowp == row || sumsq > max_sumsq {
                max_row = rowp;
                max_sumsq = sumsq;
            }
        }
        if max_row > row {
            m.swap_rows(row, max_row);
        }

        let row_norm = max_sumsq.sqrt();
        if row == 0 {
            mat_scale = row_norm;
        }

        if row_norm <= mat_scale * EPS {
            // The rest is null space of A.
            last_nonzero_row = row.checked_sub(1);
            break;
        }
        let scale = 1.0 / row_norm;

        for col in 0..nc {
            m[(row, col)] *= scale; // scale the rhs column too
        }
        for rowp in (row + 1)..nr {
            let mut inner = 0.0;
            for col in 0..(nc - 1) {
                inner += m[(row, col)] * m[(rowp, col)];
            }
            for col in 0..nc {
                let sub = inner * m[(row, col)];
                m[(rowp, col)] -= sub;
            }
        }
    }

    // The last column now holds inv(R^T)*b; back-multiply by the retained
    // orthonormal rows to get x.
    let mut x = DVector::zeros(nc - 1);
    if let Some(last) = last_nonzero_row {
        for row in 0..=last {
            let b = m[(row, nc - 1)];
            for col in 0..(nc - 1) {
                x[col] += m[(row, col)] * b;
            }
        }
    }

    Ok(x)
}
