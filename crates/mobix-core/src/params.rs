//! Physical and numerical parameters shared by every solver.

use crate::error::{MobilityError, Result};
use crate::Real;

/// Parameters accepted by [`Mobility::initialize`](crate::Mobility::initialize).
///
/// These are fixed once `initialize` succeeds; changing them requires a
/// `clean` followed by a fresh `initialize`, because derived quantities
/// (grids, kernel widths, mobility scalars) are computed from them once.
#[derive(Debug, Clone)]
pub struct Parameters {
    /// Hydrodynamic radius per species. Must contain at least one entry,
    /// all positive. The shipped solvers read only index 0; the sequence
    /// is kept so multi-species callers do not lose information.
    pub hydrodynamic_radii: Vec<Real>,
    /// Fluid viscosity, strictly positive.
    pub viscosity: Real,
    /// Temperature (in energy units, k_B folded in). Zero disables the
    /// stochastic term entirely.
    pub temperature: Real,
    /// Relative tolerance for iterative algorithms (Lanczos fluctuations).
    pub tolerance: Real,
    /// Number of particles. The position buffer is `3 * number_particles`.
    pub number_particles: usize,
    /// Seed for the owned random stream. `None` draws one from entropy.
    pub seed: Option<u64>,
    /// Whether torque coupling is required. Widens the stochastic problem
    /// to 6N and (for grid solvers) the spreading kernel.
    pub needs_torque: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            hydrodynamic_radii: vec![1.0],
            viscosity: 1.0,
            temperature: 0.0,
            tolerance: 1e-4,
            number_particles: 0,
            seed: None,
            needs_torque: false,
        }
    }
}

impl Parameters {
    /// Check every field against its admissible range.
    pub fn validate(&self) -> Result<()> {
        if self.hydrodynamic_radii.is_empty() {
            return Err(MobilityError::invalid_parameters(
                "at least one hydrodynamic radius is required",
            ));
        }
        if self.hydrodynamic_radii.iter().any(|&a| !(a > 0.0)) {
            return Err(MobilityError::invalid_parameters(
                "hydrodynamic radii must be positive",
            ));
        }
        if !(self.viscosity > 0.0) {
            return Err(MobilityError::invalid_parameters(format!(
                "viscosity must be positive, got {}",
                self.viscosity
            )));
        }
        if !(self.temperature >= 0.0) {
            return Err(MobilityError::invalid_parameters(format!(
                "temperature must be non-negative, got {}",
                self.temperature
            )));
        }
        if !(self.tolerance > 0.0) {
            return Err(MobilityError::invalid_parameters(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// First-species hydrodynamic radius, the one the shipped solvers use.
    pub fn hydrodynamic_radius(&self) -> Real {
        self.hydrodynamic_radii[0]
    }
}
