//! Analytic open-boundary reference solver.
//!
//! Ignores particle-particle hydrodynamic interaction entirely: the
//! mobility matrix is the identity scaled by the Stokes-law self
//! mobilities, `1/(6πηa)` for translation and `1/(8πηa³)` for rotation.
//! It exists to validate the interface and the random-stream machinery
//! against exact closed forms, and overrides the default matrix-free
//! stochastic algorithm with the trivial exact one.

use mobix_core::{
    Configuration, Mobility, MobilityBase, MobilityError, Parameters, Real, Result,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f64::consts::PI;

/// Open-boundary solver with a diagonal, closed-form mobility.
pub struct SelfMobility {
    configuration: Configuration,
    base: MobilityBase,
    linear_mobility: Real,
    angular_mobility: Real,
    positions: Vec<Real>,
    rng: Option<StdRng>,
}

impl SelfMobility {
    /// Construct for a fully open geometry; anything else is rejected.
    pub fn new(configuration: Configuration) -> Result<Self> {
        if !configuration.is_fully_open() {
            return Err(MobilityError::config(
                "SelfMobility",
                format!("this is an open boundary solver, got {configuration}"),
            ));
        }
        Ok(Self {
            configuration,
            base: MobilityBase::new(),
            linear_mobility: 0.0,
            angular_mobility: 0.0,
            positions: Vec::new(),
            rng: None,
        })
    }

    /// Construct from wire tokens, e.g. `("open", "open", "open")`.
    pub fn from_tokens(x: &str, y: &str, z: &str) -> Result<Self> {
        Self::new(Configuration::from_tokens(x, y, z)?)
    }

    /// Self mobility applied to forces: `1/(6πηa)`.
    pub fn linear_mobility(&self) -> Real {
        self.linear_mobility
    }

    /// Self mobility applied to torques: `1/(8πηa³)`.
    pub fn angular_mobility(&self) -> Real {
        self.angular_mobility
    }
}

impl Mobility for SelfMobility {
    fn name(&self) -> &'static str {
        "SelfMobility"
    }

    fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn base(&self) -> &MobilityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MobilityBase {
        &mut self.base
    }

    fn initialize(&mut self, par: &Parameters) -> Result<()> {
        self.base.initialize(par)?;
        let radius = par.hydrodynamic_radius();
        let pi = PI as Real;
        self.linear_mobility = 1.0 / (6.0 * pi * par.viscosity * radius);
        self.angular_mobility = 1.0 / (8.0 * pi * par.viscosity * radius * radius * radius);
        let seed = par.seed.unwrap_or_else(rand::random::<u64>);
        self.rng = Some(StdRng::seed_from_u64(seed));
        Ok(())
    }

    fn set_positions(&mut self, positions: &[Real]) -> Result<()> {
        self.base.mark_positions_set(positions.len())?;
        // Stored for the interface contract; the mobility does not depend
        // on them.
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        Ok(())
    }

    fn mdot(
        &mut self,
        forces: Option<&[Real]>,
        torques: Option<&[Real]>,
        linear: &mut [Real],
        angular: Option<&mut [Real]>,
    ) -> Result<()> {
        self.base.require_positions("mdot")?;
        let len = 3 * self.base.number_particles();
        MobilityBase::check_buffer("linear", linear.len(), len)?;
        if let Some(f) = forces {
            MobilityBase::check_buffer("forces", f.len(), len)?;
            for (v, force) in linear.iter_mut().zip(f) {
                *v = force * self.linear_mobility;
            }
        }
        if let Some(t) = torques {
            let ang = angular.ok_or_else(|| {
                MobilityError::usage("torques supplied without an angular output buffer")
            })?;
            MobilityBase::check_buffer("torques", t.len(), len)?;
            MobilityBase::check_buffer("angular", ang.len(), len)?;
            for (w, torque) in ang.iter_mut().zip(t) {
                *w = torque * self.angular_mobility;
            }
        }
        Ok(())
    }

    // The closed form is exact and trivial, so the Lanczos default is
    // bypassed: every component is an independent Gaussian scaled by
    // sqrt(2 T mu).
    fn sqrt_mdot_w(
        &mut self,
        linear: &mut [Real],
        angular: Option<&mut [Real]>,
        prefactor: Real,
    ) -> Result<()> {
        let temperature = self.base.temperature();
        if temperature == 0.0 || prefactor == 0.0 {
            return Ok(());
        }
        self.base.require_positions("sqrt_mdot_w")?;
        let len = 3 * self.base.number_particles();
        MobilityBase::check_buffer("linear", linear.len(), len)?;
        let rng = self.rng.as_mut().ok_or_else(|| {
            MobilityError::usage("sqrt_mdot_w called before initialize")
        })?;
        let linear_scale = prefactor * (2.0 * temperature * self.linear_mobility).sqrt();
        for v in linear.iter_mut() {
            let dw: Real = rng.sample(StandardNormal);
            *v = linear_scale * dw;
        }
        if let Some(ang) = angular {
            MobilityBase::check_buffer("angular", ang.len(), len)?;
            let angular_scale = prefactor * (2.0 * temperature * self.angular_mobility).sqrt();
            for w in ang.iter_mut() {
                let dw: Real = rng.sample(StandardNormal);
                *w = angular_scale * dw;
            }
        }
        Ok(())
    }

    fn clean(&mut self) -> Result<()> {
        self.base.clean();
        self.rng = None;
        self.positions = Vec::new();
        Ok(())
    }
}
