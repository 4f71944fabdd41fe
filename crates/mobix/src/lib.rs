//! mobix — interchangeable hydrodynamic mobility solvers.
//!
//! This is the umbrella crate that re-exports the solver interface and
//! the concrete solvers from the sub-crates. Typical use:
//!
//! ```
//! use mobix::{Mobility, Parameters, SelfMobility};
//!
//! let mut solver = SelfMobility::from_tokens("open", "open", "open")?;
//! solver.initialize(&Parameters {
//!     number_particles: 1,
//!     ..Default::default()
//! })?;
//! solver.set_positions(&[0.0, 0.0, 0.0])?;
//! let mut velocity = [0.0; 3];
//! solver.mdot(Some(&[1.0, 0.0, 0.0]), None, &mut velocity, None)?;
//! solver.clean()?;
//! # Ok::<(), mobix::MobilityError>(())
//! ```

pub use mobix_core::{
    self, Configuration, LanczosFluctuations, Lifecycle, Mobility, MobilityBase, MobilityError,
    Parameters, PeriodicityMode, Real, Result, PRECISION,
};
pub use mobix_dpstokes::{
    self, DpStokes, DpStokesParams, GridParams, StokesEngine, WallMode,
};
pub use mobix_self::{self, SelfMobility};
