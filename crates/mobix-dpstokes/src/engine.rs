//! Seam to the external accelerated Stokes engine.
//!
//! The engine performs the actual spreading/interpolation/FFT work on the
//! derived grid; this crate only configures it and forwards calls. Its
//! internals are opaque: it runs to completion synchronously from the
//! caller's perspective, and any concurrency is its own business.

use mobix_core::{Real, Result};

/// Vertical boundary condition of the doubly-periodic domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallMode {
    /// Open in z on both sides.
    NoWall,
    /// A single no-slip wall at the bottom.
    Bottom,
    /// Walls above and below (slit channel).
    Slit,
}

impl WallMode {
    /// Tag handed to the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoWall => "nowall",
            Self::Bottom => "bottom",
            Self::Slit => "slit",
        }
    }
}

/// Complete discretization handed to the engine's setup call.
///
/// Everything here is derived by [`derive_grid`](crate::derive_grid) from
/// the physical inputs; the engine consumes it as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct GridParams {
    pub wall_mode: WallMode,
    /// Spreading-kernel support (half-width), in lattice cells.
    pub w: Real,
    /// Dipole-kernel support; present only when torques are coupled.
    pub w_d: Option<Real>,
    /// Kernel shape parameter.
    pub beta: Real,
    /// Dipole-kernel shape parameter; present only with torques.
    pub beta_d: Option<Real>,
    /// Kernel distance normalization, `w/2`.
    pub alpha: Real,
    /// Dipole normalization, `w_d/2`; present only with torques.
    pub alpha_d: Option<Real>,
    /// Grid nodes in the periodic directions.
    pub nx: usize,
    pub ny: usize,
    /// Chebyshev nodes in the vertical direction.
    pub nz: usize,
    /// Box extents after any resizing/buffering.
    pub lx: Real,
    pub ly: Real,
    pub zmin: Real,
    pub zmax: Real,
    pub viscosity: Real,
    /// Hydrodynamic radius the grid was derived for.
    pub hydrodynamic_radius: Real,
    /// Engine solver tolerance.
    pub tolerance: Real,
    pub dt: Real,
}

/// Contract of the wrapped accelerated engine.
///
/// Errors it reports surface as
/// [`MobilityError::Engine`](mobix_core::MobilityError::Engine); after
/// one, `clean` on the owning solver must still be safe.
pub trait StokesEngine {
    /// Allocate and configure for the given grid and particle count.
    /// May be called again after `clear` with a new grid.
    fn initialize(&mut self, grid: &GridParams, number_particles: usize) -> Result<()>;

    /// Forwarded particle positions, 3N reals.
    fn set_positions(&mut self, positions: &[Real]) -> Result<()>;

    /// Apply the mobility operator on the engine side.
    fn mdot(
        &mut self,
        forces: Option<&[Real]>,
        torques: Option<&[Real]>,
        linear: &mut [Real],
        angular: Option<&mut [Real]>,
    ) -> Result<()>;

    /// Release engine-side resources. Idempotent.
    fn clear(&mut self);
}
