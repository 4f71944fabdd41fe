//! Matrix-free action of the mobility square root.
//!
//! Approximates `sqrt(M)·ξ` for a symmetric positive semi-definite
//! operator `M` that is only available as a black-box product (the
//! solver's `mdot`). A Krylov subspace is built from the Gaussian vector
//! ξ by the Lanczos recurrence with full reorthogonalization; at each
//! step the tridiagonal projection `T_m` is diagonalized and the
//! subspace estimate `‖ξ‖ · Q_m · sqrt(T_m) · e1` is compared against
//! the previous iterate. The matrix `M` is never formed.
//!
//! For a diagonal or identity-like operator the estimate is exact after
//! one or two iterations, which the reference solver uses as a
//! cross-check against its closed form.

use crate::error::Result;
use crate::Real;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Iteration cap. Exceeding it is a warning, not an error: the best
/// available estimate is returned.
const MAX_ITERATIONS: usize = 100;

/// Stochastic-displacement generator owned by a solver instance.
///
/// Holds the private random stream the Gaussian vectors are drawn from;
/// rebuilt on every re-initialization so parameter changes cannot leak
/// stale state.
#[derive(Debug)]
pub struct LanczosFluctuations {
    rng: StdRng,
    tolerance: Real,
    /// Degrees of freedom of the operator (3N, or 6N with torques).
    dof: usize,
}

impl LanczosFluctuations {
    /// Create a generator for an operator with `dof` degrees of freedom.
    pub fn new(dof: usize, tolerance: Real, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            tolerance,
            dof,
        }
    }

    /// Write one realization of `prefactor · sqrt(M) · ξ` into `output`.
    ///
    /// `mdot` receives an input vector of length `dof` and must write the
    /// operator product into its second argument (same length).
    pub fn sqrt_mdot_w<F>(&mut self, mut mdot: F, output: &mut [Real], prefactor: Real) -> Result<()>
    where
        F: FnMut(&[Real], &mut [Real]) -> Result<()>,
    {
        let n = self.dof;
        debug_assert_eq!(output.len(), n);

        let xi = DVector::<Real>::from_fn(n, |_, _| self.rng.sample(StandardNormal));
        let xi_norm = xi.norm();
        if xi_norm == 0.0 {
            output.fill(0.0);
            return Ok(());
        }

        // β below this is an invariant subspace: the estimate is exact.
        let breakdown: Real = Real::EPSILON * 100.0;

        let mut q_vecs: Vec<DVector<Real>> = vec![&xi / xi_norm];
        let mut alpha: Vec<Real> = Vec::new();
        let mut beta: Vec<Real> = Vec::new();
        let mut product = vec![0.0 as Real; n];

        let mut estimate = DVector::<Real>::zeros(n);
        let mut previous: Option<DVector<Real>> = None;
        let mut converged = false;

        for j in 0..MAX_ITERATIONS.min(n) {
            // w = M q_j
            mdot(q_vecs[j].as_slice(), &mut product)?;
            let mut w = DVector::from_column_slice(&product);

            let a = q_vecs[j].dot(&w);
            alpha.push(a);

            w -= &q_vecs[j] * a;
            if j > 0 {
                w -= &q_vecs[j - 1] * beta[j - 1];
            }
            // Full reorthogonalization keeps the basis orthonormal in
            // finite precision.
            for qi in &q_vecs {
                let overlap = qi.dot(&w);
                w -= qi * overlap;
            }
            let b = w.norm();

            estimate = subspace_sqrt_estimate(&alpha, &beta, &q_vecs, xi_norm);

            if let Some(prev) = &previous {
                let denom = prev.norm();
                if denom > 0.0 && (&estimate - prev).norm() / denom < self.tolerance {
                    converged = true;
                    break;
                }
            }
            if b < breakdown {
                converged = true;
                break;
            }

            previous = Some(estimate.clone());
            beta.push(b);
            q_vecs.push(&w / b);
        }

        if !converged {
            eprintln!(
                "lanczos fluctuations: iteration cap ({MAX_ITERATIONS}) reached before \
                 relative tolerance {:.1e}; returning best estimate",
                self.tolerance
            );
        }

        for (out, y) in output.iter_mut().zip(estimate.iter()) {
            *out = prefactor * *y;
        }
        Ok(())
    }
}

/// `‖ξ‖ · Q_m · sqrt(T_m) · e1` for the current tridiagonal projection.
///
/// Negative eigenvalues of `T_m` are numerical noise (M is positive
/// semi-definite) and are clamped to zero before the square root.
fn subspace_sqrt_estimate(
    alpha: &[Real],
    beta: &[Real],
    q_vecs: &[DVector<Real>],
    xi_norm: Real,
) -> DVector<Real> {
    let m = alpha.len();
    let mut t = DMatrix::<Real>::zeros(m, m);
    for i in 0..m {
        t[(i, i)] = alpha[i];
        if i > 0 {
            t[(i, i - 1)] = beta[i - 1];
            t[(i - 1, i)] = beta[i - 1];
        }
    }
    let eig = t.symmetric_eigen();

    let n = q_vecs[0].len();
    let mut y = DVector::<Real>::zeros(n);
    for k in 0..m {
        // (sqrt(T) e1)_k = Σ_i V[k,i] sqrt(λ_i) V[0,i]
        let mut coeff = 0.0 as Real;
        for i in 0..m {
            let lam = eig.eigenvalues[i].max(0.0);
            coeff += eig.eigenvectors[(k, i)] * lam.sqrt() * eig.eigenvectors[(0, i)];
        }
        y += &q_vecs[k] * (xi_norm * coeff);
    }
    y
}
