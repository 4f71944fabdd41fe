//! Uniform interface over interchangeable hydrodynamic-mobility solvers.
//!
//! A mobility solver maps forces and torques applied to particles to the
//! linear and angular velocities they induce through the fluid, and
//! produces thermal displacements consistent with fluctuation-dissipation.
//! This crate provides:
//! - Boundary [`Configuration`] and physical [`Parameters`] records
//! - The [`Mobility`] trait with its enforced lifecycle state machine
//! - The default matrix-free stochastic-displacement algorithm
//!   ([`lanczos`]), used by any solver without a closed form
//!
//! Concrete solvers live in sibling crates (`mobix-self`,
//! `mobix-dpstokes`).

pub mod config;
pub mod error;
pub mod lanczos;
pub mod params;

pub use config::{Configuration, PeriodicityMode};
pub use error::{MobilityError, Result};
pub use lanczos::LanczosFluctuations;
pub use params::Parameters;

/// Scalar type for every numeric array in the workspace. Selected at
/// compile time; all instances of a compiled solver share it.
#[cfg(feature = "single-precision")]
pub type Real = f32;
/// Scalar type for every numeric array in the workspace. Selected at
/// compile time; all instances of a compiled solver share it.
#[cfg(not(feature = "single-precision"))]
pub type Real = f64;

/// Name of the compiled floating precision, `"float"` or `"double"`.
#[cfg(feature = "single-precision")]
pub const PRECISION: &str = "float";
/// Name of the compiled floating precision, `"float"` or `"double"`.
#[cfg(not(feature = "single-precision"))]
pub const PRECISION: &str = "double";

/// Where an instance sits in the `initialize → set_positions → compute →
/// clean` state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, no parameters yet.
    Uninitialized,
    /// `initialize` succeeded; waiting for positions.
    Initialized,
    /// Positions stored; velocity queries are repeatable in this state.
    PositionsSet,
    /// Resources released. Only a fresh `initialize` re-arms the instance.
    Cleaned,
}

/// Lifecycle bookkeeping and shared parameter state owned by every solver.
///
/// Solvers embed one of these and expose it through
/// [`Mobility::base`]/[`Mobility::base_mut`]; the trait's provided methods
/// drive the state machine through it.
#[derive(Debug)]
pub struct MobilityBase {
    lifecycle: Lifecycle,
    number_particles: usize,
    temperature: Real,
    tolerance: Real,
    seed: Option<u64>,
    needs_torque: bool,
    lanczos: Option<LanczosFluctuations>,
}

impl MobilityBase {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            number_particles: 0,
            temperature: 0.0,
            tolerance: 1e-4,
            seed: None,
            needs_torque: false,
            lanczos: None,
        }
    }

    /// Validate `par` and move to `Initialized`.
    ///
    /// Fails fast if the instance is already initialized: derived numeric
    /// state (grids, kernel widths, mobility scalars) is computed once
    /// from the parameters and would be invalidated by mutation. Call
    /// `clean` first to re-initialize.
    pub fn initialize(&mut self, par: &Parameters) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Uninitialized | Lifecycle::Cleaned => {}
            Lifecycle::Initialized | Lifecycle::PositionsSet => {
                return Err(MobilityError::usage(
                    "initialize called on an already-initialized solver; call clean first",
                ));
            }
        }
        par.validate()?;
        self.number_particles = par.number_particles;
        self.temperature = par.temperature;
        self.tolerance = par.tolerance;
        self.seed = par.seed;
        self.needs_torque = par.needs_torque;
        self.lanczos = None;
        self.lifecycle = Lifecycle::Initialized;
        Ok(())
    }

    /// Record that a position buffer of `len` reals was accepted.
    pub fn mark_positions_set(&mut self, len: usize) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Initialized | Lifecycle::PositionsSet => {}
            _ => {
                return Err(MobilityError::usage(
                    "set_positions called before initialize",
                ));
            }
        }
        Self::check_buffer("positions", len, 3 * self.number_particles)?;
        self.lifecycle = Lifecycle::PositionsSet;
        Ok(())
    }

    /// Guard for operations that need positions in place.
    pub fn require_positions(&self, operation: &str) -> Result<()> {
        match self.lifecycle {
            Lifecycle::PositionsSet => Ok(()),
            Lifecycle::Initialized => Err(MobilityError::usage(format!(
                "{operation} called before set_positions"
            ))),
            _ => Err(MobilityError::usage(format!(
                "{operation} called before initialize"
            ))),
        }
    }

    /// Release owned resources. Idempotent; safe from any state.
    pub fn clean(&mut self) {
        self.lanczos = None;
        self.lifecycle = Lifecycle::Cleaned;
    }

    /// Buffer-length check shared by every operation.
    pub fn check_buffer(name: &str, actual: usize, expected: usize) -> Result<()> {
        if actual != expected {
            return Err(MobilityError::usage(format!(
                "{name} buffer has length {actual}, expected {expected}"
            )));
        }
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn number_particles(&self) -> usize {
        self.number_particles
    }

    pub fn temperature(&self) -> Real {
        self.temperature
    }

    pub fn tolerance(&self) -> Real {
        self.tolerance
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn needs_torque(&self) -> bool {
        self.needs_torque
    }

    fn take_lanczos(&mut self) -> Option<LanczosFluctuations> {
        self.lanczos.take()
    }

    fn restore_lanczos(&mut self, lanczos: LanczosFluctuations) {
        self.lanczos = Some(lanczos);
    }
}

impl Default for MobilityBase {
    fn default() -> Self {
        Self::new()
    }
}

/// The solver contract every mobility implementation fulfils.
///
/// Instances are single-threaded and non-reentrant: every operation takes
/// `&mut self`, so at most one computation is in flight per instance by
/// construction. No state is shared across instances; each owns its
/// private random stream.
pub trait Mobility {
    /// Short solver name, used in configuration errors.
    fn name(&self) -> &'static str;

    /// The boundary geometry this instance was constructed with.
    fn configuration(&self) -> &Configuration;

    /// Shared lifecycle state.
    fn base(&self) -> &MobilityBase;

    /// Shared lifecycle state, mutable.
    fn base_mut(&mut self) -> &mut MobilityBase;

    /// Compiled floating precision of this solver, `"float"` or
    /// `"double"`. Fixed per build; identical for all instances.
    fn precision(&self) -> &'static str {
        PRECISION
    }

    /// Validate parameters, derive solver-specific internal state, and
    /// move to the initialized state. Calling it twice without an
    /// intervening `clean` is a usage error.
    fn initialize(&mut self, par: &Parameters) -> Result<()>;

    /// Store the 3N position buffer (particle-major x, y, z). Computes
    /// nothing by itself.
    fn set_positions(&mut self, positions: &[Real]) -> Result<()>;

    /// Apply the deterministic mobility operator.
    ///
    /// Either of `forces`/`torques` may be absent, in which case the
    /// corresponding output is not populated by the deterministic term.
    /// `linear` must hold 3N reals; `angular` likewise when present.
    fn mdot(
        &mut self,
        forces: Option<&[Real]>,
        torques: Option<&[Real]>,
        linear: &mut [Real],
        angular: Option<&mut [Real]>,
    ) -> Result<()>;

    /// Write one realization of `prefactor · sqrt(2·T·M) · ξ` into the
    /// output buffers, ξ a standard-Gaussian vector.
    ///
    /// Returns without touching the buffers when `temperature == 0` or
    /// `prefactor == 0`. The default implementation approximates the
    /// square-root action matrix-free via [`lanczos`] atop this solver's
    /// `mdot`; solvers with a closed form override it.
    fn sqrt_mdot_w(
        &mut self,
        linear: &mut [Real],
        mut angular: Option<&mut [Real]>,
        prefactor: Real,
    ) -> Result<()> {
        let temperature = self.base().temperature();
        if temperature == 0.0 || prefactor == 0.0 {
            return Ok(());
        }
        self.base().require_positions("sqrt_mdot_w")?;
        let n = self.base().number_particles();
        let needs_torque = self.base().needs_torque();
        MobilityBase::check_buffer("linear", linear.len(), 3 * n)?;
        if needs_torque && angular.is_none() {
            return Err(MobilityError::usage(
                "solver was configured with torques; an angular buffer is required",
            ));
        }
        if let Some(ang) = angular.as_deref() {
            MobilityBase::check_buffer("angular", ang.len(), 3 * n)?;
        }

        let dof = if needs_torque { 6 * n } else { 3 * n };
        // The generator is moved out so the operator closure can borrow
        // the solver mutably; it is built lazily on first use.
        let mut generator = match self.base_mut().take_lanczos() {
            Some(generator) => generator,
            None => {
                let seed = self.base().seed().unwrap_or_else(rand::random::<u64>);
                LanczosFluctuations::new(dof, self.base().tolerance(), seed)
            }
        };
        let mut combined = vec![0.0 as Real; dof];
        let effective = prefactor * (2.0 * temperature).sqrt();
        let outcome = generator.sqrt_mdot_w(
            |input, output| {
                let forces = &input[..3 * n];
                let torques = needs_torque.then(|| &input[3 * n..]);
                let (lin, ang) = output.split_at_mut(3 * n);
                let ang = needs_torque.then(|| ang);
                self.mdot(Some(forces), torques, lin, ang)
            },
            &mut combined,
            effective,
        );
        self.base_mut().restore_lanczos(generator);
        outcome?;

        linear.copy_from_slice(&combined[..3 * n]);
        if needs_torque {
            if let Some(ang) = angular.as_deref_mut() {
                ang.copy_from_slice(&combined[3 * n..]);
            }
        }
        Ok(())
    }

    /// `mdot` plus one thermal realization, written into the output
    /// buffers. Numerically identical to calling the two operations
    /// separately and summing; with `temperature == 0` it equals `mdot`
    /// exactly.
    fn hydrodynamic_velocities(
        &mut self,
        forces: Option<&[Real]>,
        torques: Option<&[Real]>,
        linear: &mut [Real],
        mut angular: Option<&mut [Real]>,
        prefactor: Real,
    ) -> Result<()> {
        self.base().require_positions("hydrodynamic_velocities")?;
        let n = self.base().number_particles();
        MobilityBase::check_buffer("linear", linear.len(), 3 * n)?;
        if let Some(ang) = angular.as_deref() {
            MobilityBase::check_buffer("angular", ang.len(), 3 * n)?;
        }

        linear.fill(0.0);
        if let Some(ang) = angular.as_deref_mut() {
            ang.fill(0.0);
        }
        if forces.is_some() || torques.is_some() {
            self.mdot(forces, torques, linear, angular.as_deref_mut())?;
        }
        if self.base().temperature() > 0.0 && prefactor != 0.0 {
            let mut noise_linear = vec![0.0 as Real; 3 * n];
            let mut noise_angular = angular.as_ref().map(|_| vec![0.0 as Real; 3 * n]);
            self.sqrt_mdot_w(&mut noise_linear, noise_angular.as_deref_mut(), prefactor)?;
            for (v, dw) in linear.iter_mut().zip(&noise_linear) {
                *v += dw;
            }
            if let (Some(ang), Some(noise)) = (angular.as_deref_mut(), noise_angular) {
                for (w, dw) in ang.iter_mut().zip(&noise) {
                    *w += dw;
                }
            }
        }
        Ok(())
    }

    /// Release all derived and owned resources. Idempotent; after it,
    /// only destruction or a fresh `initialize` is accepted.
    fn clean(&mut self) -> Result<()>;
}
