//! Doubly-periodic Stokes mobility solver.
//!
//! The fluid is periodic in the plane and open or walled in z. The solver
//! itself performs no hydrodynamics: `initialize` derives a
//! discretization (kernel support and shape, in-plane grid, vertical
//! Chebyshev node count, buffered box extents) from the physical inputs
//! and hands it to an external accelerated engine; `set_positions` and
//! `mdot` are pure forwarding calls afterwards. Thermal displacements
//! come from the interface's default matrix-free algorithm over the
//! engine's `mdot` — there is no closed form here.

pub mod engine;
pub mod polyfit;

pub use engine::{GridParams, StokesEngine, WallMode};
pub use polyfit::{poly_eval, CBETAM_INV};

use mobix_core::{
    Configuration, Mobility, MobilityBase, MobilityError, Parameters, PeriodicityMode, Real,
    Result,
};
use std::f64::consts::PI;

/// Solver-specific inputs, supplied before `initialize` via
/// [`DpStokes::set_dp_stokes_parameters`]. They take effect only when
/// `initialize` runs.
#[derive(Debug, Clone, PartialEq)]
pub struct DpStokesParams {
    pub dt: Real,
    /// Box extent in the periodic directions. Only square boxes are
    /// supported (`lx == ly`).
    pub lx: Real,
    pub ly: Real,
    /// Vertical extent before kernel buffering.
    pub zmin: Real,
    pub zmax: Real,
    /// When true the box is rescaled so the chosen grid matches the
    /// target lattice spacing exactly; when false the box is kept and the
    /// kernel shape is corrected instead.
    pub allow_changing_box_size: bool,
}

impl Default for DpStokesParams {
    fn default() -> Self {
        Self {
            dt: 1.0,
            lx: 0.0,
            ly: 0.0,
            zmin: 0.0,
            zmax: 0.0,
            allow_changing_box_size: false,
        }
    }
}

impl DpStokesParams {
    fn validate(&self) -> Result<()> {
        if !(self.lx > 0.0) || !(self.ly > 0.0) {
            return Err(MobilityError::invalid_parameters(
                "box extents lx, ly must be positive",
            ));
        }
        if self.lx != self.ly {
            return Err(MobilityError::invalid_parameters(format!(
                "only square boxes are supported, got lx={} ly={}",
                self.lx, self.ly
            )));
        }
        if !(self.zmax > self.zmin) {
            return Err(MobilityError::invalid_parameters(format!(
                "zmax ({}) must exceed zmin ({})",
                self.zmax, self.zmin
            )));
        }
        Ok(())
    }
}

/// Target lattice spacing ratio a/h per kernel width (empirical).
const RADIUS_TO_H_FORCE: Real = 1.205;
const RADIUS_TO_H_TORQUE: Real = 1.731;

/// Kernel shape fit slopes β/w per kernel family (empirical).
const BETA_PER_W_FORCE: Real = 1.785;
const BETA_PER_W_TORQUE: Real = 1.327;
const BETA_D_PER_W: Real = 2.217;

/// Engine solver tolerance; independent of the Lanczos tolerance.
const ENGINE_TOLERANCE: Real = 1e-6;

/// Derive the full engine discretization from physical inputs.
///
/// Separated from the solver so the derivation rules can be tested
/// without an engine.
pub fn derive_grid(
    user: &DpStokesParams,
    wall_mode: WallMode,
    hydrodynamic_radius: Real,
    viscosity: Real,
    needs_torque: bool,
) -> Result<GridParams> {
    // Torque accuracy needs a wider kernel, plus a dipole kernel of its
    // own width and shape.
    let (w, w_d, mut beta, beta_d, mut h) = if needs_torque {
        let w: Real = 6.0;
        (
            w,
            Some(w),
            BETA_PER_W_TORQUE * w,
            Some(BETA_D_PER_W * w),
            hydrodynamic_radius / RADIUS_TO_H_TORQUE,
        )
    } else {
        let w: Real = 4.0;
        (
            w,
            None,
            BETA_PER_W_FORCE * w,
            None,
            hydrodynamic_radius / RADIUS_TO_H_FORCE,
        )
    };
    let alpha_d = w_d.map(|wd| wd * 0.5);

    // In-plane node count: of ceil(L/h) and floor(L/h), exactly one is
    // even; take it for an FFT-friendly grid. Same count for x and y
    // (square box).
    let n_real = user.lx / h;
    let n_up = n_real.ceil() as usize;
    let n_down = n_real.floor() as usize;
    let n = if n_up % 2 == 0 { n_up } else { n_down };
    if n == 0 {
        return Err(MobilityError::invalid_parameters(format!(
            "box extent {} is below one lattice cell (h={h})",
            user.lx
        )));
    }

    let (mut lx, mut ly) = (user.lx, user.ly);
    if user.allow_changing_box_size {
        // Grow/shrink the box so the grid matches h exactly.
        lx = n as Real * h;
        ly = n as Real * h;
    } else {
        // Keep the box; absorb the mismatch into the lattice spacing and
        // correct the kernel shape by inverting the empirical fit.
        h = user.lx / n as Real;
        beta = poly_eval(&CBETAM_INV, (hydrodynamic_radius / (w * h)) as f64) as Real;
    }

    // Buffer open z sides so the kernel support never leaves the domain.
    let (mut zmin, mut zmax) = (user.zmin, user.zmax);
    let buffer = 1.5 * w * h / 2.0;
    match wall_mode {
        WallMode::NoWall => {
            zmax += buffer;
            zmin -= buffer;
        }
        WallMode::Bottom => {
            zmax += buffer;
        }
        WallMode::Slit => {}
    }

    // Vertical Chebyshev count: the internode spacing is coarsest at the
    // midplane; pick nz so that spacing equals h there, then round to an
    // odd count so 2(nz-1) stays FFT friendly.
    let half_height = (zmax - zmin) / 2.0;
    let ratio = h / half_height;
    if !(ratio < 1.0) {
        return Err(MobilityError::invalid_parameters(format!(
            "vertical extent {} is too thin for lattice spacing {h}",
            zmax - zmin
        )));
    }
    let nz_real = PI as Real / ratio.asin() + 1.0;
    let nz_up = nz_real.ceil() as usize;
    let nz_down = nz_real.floor() as usize;
    let nz = if nz_up % 2 == 1 { nz_up } else { nz_down };

    Ok(GridParams {
        wall_mode,
        w,
        w_d,
        beta,
        beta_d,
        alpha: w * 0.5,
        alpha_d,
        nx: n,
        ny: n,
        nz,
        lx,
        ly,
        zmin,
        zmax,
        viscosity,
        hydrodynamic_radius,
        tolerance: ENGINE_TOLERANCE,
        dt: user.dt,
    })
}

/// Doubly-periodic solver delegating to an accelerated engine.
pub struct DpStokes {
    configuration: Configuration,
    base: MobilityBase,
    wall_mode: WallMode,
    user: Option<DpStokesParams>,
    engine: Option<Box<dyn StokesEngine>>,
    grid: Option<GridParams>,
}

impl DpStokes {
    /// Construct for x, y periodic and z open/walled; anything else is
    /// rejected.
    pub fn new(configuration: Configuration) -> Result<Self> {
        if configuration.periodicity_x != PeriodicityMode::Periodic
            || configuration.periodicity_y != PeriodicityMode::Periodic
        {
            return Err(MobilityError::config(
                "DpStokes",
                format!("this is a doubly periodic solver, got {configuration}"),
            ));
        }
        let wall_mode = match configuration.periodicity_z {
            PeriodicityMode::Open => WallMode::NoWall,
            PeriodicityMode::SingleWall => WallMode::Bottom,
            PeriodicityMode::TwoWalls => WallMode::Slit,
            other => {
                return Err(MobilityError::config(
                    "DpStokes",
                    format!("z must be open, single_wall or two_walls, got {other}"),
                ));
            }
        };
        Ok(Self {
            configuration,
            base: MobilityBase::new(),
            wall_mode,
            user: None,
            engine: None,
            grid: None,
        })
    }

    /// Construct from wire tokens, e.g. `("periodic", "periodic", "open")`.
    pub fn from_tokens(x: &str, y: &str, z: &str) -> Result<Self> {
        Self::new(Configuration::from_tokens(x, y, z)?)
    }

    /// Supply solver-specific parameters and the engine handle. Must run
    /// before `initialize`; takes effect only when `initialize` runs.
    pub fn set_dp_stokes_parameters(
        &mut self,
        params: DpStokesParams,
        engine: Box<dyn StokesEngine>,
    ) -> Result<()> {
        params.validate()?;
        self.user = Some(params);
        self.engine = Some(engine);
        Ok(())
    }

    /// The wall-mode tag derived from the configuration.
    pub fn wall_mode(&self) -> WallMode {
        self.wall_mode
    }

    /// The discretization derived by the last successful `initialize`.
    pub fn grid(&self) -> Option<&GridParams> {
        self.grid.as_ref()
    }

    fn engine_mut(&mut self) -> Result<&mut dyn StokesEngine> {
        match self.engine.as_deref_mut() {
            Some(engine) => Ok(engine),
            None => Err(MobilityError::usage(
                "set_dp_stokes_parameters must be called before initialize",
            )),
        }
    }
}

impl Mobility for DpStokes {
    fn name(&self) -> &'static str {
        "DpStokes"
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
        let user = self.user.clone().ok_or_else(|| {
            MobilityError::usage("set_dp_stokes_parameters must be called before initialize")
        })?;
        self.base.initialize(par)?;
        let grid = match derive_grid(
            &user,
            self.wall_mode,
            par.hydrodynamic_radius(),
            par.viscosity,
            par.needs_torque,
        ) {
            Ok(grid) => grid,
            Err(err) => {
                // No partial state survives a failed initialization.
                self.base.clean();
                return Err(err);
            }
        };
        match self.engine_mut()?.initialize(&grid, par.number_particles) {
            Ok(()) => {}
            Err(err) => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.clear();
                }
                self.base.clean();
                return Err(err);
            }
        }
        self.grid = Some(grid);
        Ok(())
    }

    fn set_positions(&mut self, positions: &[Real]) -> Result<()> {
        self.base.mark_positions_set(positions.len())?;
        self.engine_mut()?.set_positions(positions)
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
        }
        if let Some(t) = torques {
            MobilityBase::check_buffer("torques", t.len(), len)?;
        }
        if let Some(ang) = angular.as_deref() {
            MobilityBase::check_buffer("angular", ang.len(), len)?;
        }
        self.engine_mut()?.mdot(forces, torques, linear, angular)
    }

    fn clean(&mut self) -> Result<()> {
        if let Some(engine) = self.engine.as_mut() {
            engine.clear();
        }
        self.grid = None;
        self.base.clean();
        Ok(())
    }
}

impl Drop for DpStokes {
    // Engine resources are released even when the caller forgets clean.
    fn drop(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    fn params(lx: Real, zmin: Real, zmax: Real) -> DpStokesParams {
        DpStokesParams {
            dt: 1.0,
            lx,
            ly: lx,
            zmin,
            zmax,
            allow_changing_box_size: false,
        }
    }

    #[test]
    fn test_wall_mode_mapping() {
        for (z, mode) in [
            ("open", WallMode::NoWall),
            ("single_wall", WallMode::Bottom),
            ("two_walls", WallMode::Slit),
        ] {
            let solver = DpStokes::from_tokens("periodic", "periodic", z).unwrap();
            assert_eq!(solver.wall_mode(), mode);
        }
    }

    #[test]
    fn test_rejects_non_doubly_periodic() {
        assert!(DpStokes::from_tokens("open", "open", "open").is_err());
        assert!(DpStokes::from_tokens("periodic", "open", "open").is_err());
        assert!(DpStokes::from_tokens("periodic", "periodic", "periodic").is_err());
        assert!(DpStokes::from_tokens("periodic", "periodic", "unspecified").is_err());
    }

    #[test]
    fn test_in_plane_grid_is_even() {
        // lx=10.3 with h=1.05 (radius = 1.05 * 1.205): L/h ≈ 9.81, the
        // even candidate of {9, 10} is 10.
        let radius = 1.05 * RADIUS_TO_H_FORCE;
        let grid = derive_grid(
            &params(10.3, -6.0, 6.0),
            WallMode::Slit,
            radius,
            1.0,
            false,
        )
        .unwrap();
        assert_eq!(grid.nx, 10);
        assert_eq!(grid.ny, 10);

        // Sweep a range of box sizes: the pick is always even.
        for i in 0..40 {
            let lx = 8.0 + 0.17 * i as Real;
            let grid =
                derive_grid(&params(lx, -6.0, 6.0), WallMode::Slit, 1.0, 1.0, false).unwrap();
            assert_eq!(grid.nx % 2, 0, "lx={lx} gave odd nx={}", grid.nx);
        }
    }

    #[test]
    fn test_vertical_node_count_is_odd() {
        for i in 0..30 {
            let lz = 6.0 + 0.31 * i as Real;
            let grid = derive_grid(
                &params(16.0, -lz / 2.0, lz / 2.0),
                WallMode::Slit,
                1.0,
                1.0,
                false,
            )
            .unwrap();
            assert_eq!(grid.nz % 2, 1, "lz={lz} gave even nz={}", grid.nz);
        }
    }

    #[test]
    fn test_force_kernel_constants() {
        let grid =
            derive_grid(&params(16.0, -6.0, 6.0), WallMode::Slit, 1.0, 1.0, false).unwrap();
        assert_relative_eq!(grid.w, 4.0);
        assert_relative_eq!(grid.alpha, 2.0);
        assert!(grid.w_d.is_none());
        assert!(grid.beta_d.is_none());
        assert!(grid.alpha_d.is_none());
    }

    #[test]
    fn test_torque_kernel_constants() {
        let grid =
            derive_grid(&params(16.0, -6.0, 6.0), WallMode::Slit, 1.0, 1.0, true).unwrap();
        assert_relative_eq!(grid.w, 6.0);
        assert_relative_eq!(grid.w_d.unwrap(), 6.0);
        assert_relative_eq!(grid.alpha, 3.0);
        assert_relative_eq!(grid.alpha_d.unwrap(), 3.0);
        assert_relative_eq!(grid.beta_d.unwrap(), BETA_D_PER_W * 6.0);
    }

    #[test]
    fn test_box_resizing_matches_grid() {
        let radius = 1.0;
        let user = DpStokesParams {
            allow_changing_box_size: true,
            ..params(16.1, -6.0, 6.0)
        };
        let grid = derive_grid(&user, WallMode::Slit, radius, 1.0, false).unwrap();
        let h = radius / RADIUS_TO_H_FORCE;
        assert_relative_eq!(grid.lx, grid.nx as Real * h, max_relative = 1e-12);
        assert_eq!(grid.lx, grid.ly);
        // Free-fit β is untouched on this branch.
        assert_relative_eq!(grid.beta, BETA_PER_W_FORCE * 4.0);
    }

    #[test]
    fn test_fixed_box_corrects_beta() {
        let radius = 1.0;
        let user = params(16.1, -6.0, 6.0);
        let grid = derive_grid(&user, WallMode::Slit, radius, 1.0, false).unwrap();
        // Box kept, spacing recomputed, β taken from the inverse fit.
        assert_relative_eq!(grid.lx, 16.1);
        let h = 16.1 / grid.nx as Real;
        let expected = poly_eval(&CBETAM_INV, (radius / (grid.w * h)) as f64) as Real;
        assert_relative_eq!(grid.beta, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_open_sides_are_buffered() {
        let radius = 1.0;
        let user = params(16.0, -6.0, 6.0);
        let slit = derive_grid(&user, WallMode::Slit, radius, 1.0, false).unwrap();
        let bottom = derive_grid(&user, WallMode::Bottom, radius, 1.0, false).unwrap();
        let nowall = derive_grid(&user, WallMode::NoWall, radius, 1.0, false).unwrap();

        let h = 16.0 / slit.nx as Real;
        let buffer = 1.5 * slit.w * h / 2.0;
        assert_relative_eq!(slit.zmin, -6.0);
        assert_relative_eq!(slit.zmax, 6.0);
        assert_relative_eq!(bottom.zmin, -6.0);
        assert_relative_eq!(bottom.zmax, 6.0 + buffer, max_relative = 1e-12);
        assert_relative_eq!(nowall.zmin, -6.0 - buffer, max_relative = 1e-12);
        assert_relative_eq!(nowall.zmax, 6.0 + buffer, max_relative = 1e-12);
    }

    /// Diagonal-mobility stand-in for the accelerated engine, with shared
    /// flags so tests can observe forwarding and release.
    struct ProbeEngine {
        mobility: Real,
        fail_initialize: bool,
        initialized: Rc<Cell<bool>>,
        cleared: Rc<Cell<usize>>,
        positions_seen: Rc<Cell<usize>>,
    }

    impl StokesEngine for ProbeEngine {
        fn initialize(&mut self, grid: &GridParams, _number_particles: usize) -> Result<()> {
            if self.fail_initialize {
                return Err(MobilityError::engine("probe engine refused setup"));
            }
            assert!(grid.nx % 2 == 0 && grid.nz % 2 == 1);
            self.initialized.set(true);
            Ok(())
        }

        fn set_positions(&mut self, positions: &[Real]) -> Result<()> {
            self.positions_seen.set(positions.len());
            Ok(())
        }

        fn mdot(
            &mut self,
            forces: Option<&[Real]>,
            _torques: Option<&[Real]>,
            linear: &mut [Real],
            _angular: Option<&mut [Real]>,
        ) -> Result<()> {
            if let Some(f) = forces {
                for (v, force) in linear.iter_mut().zip(f) {
                    *v = force * self.mobility;
                }
            }
            Ok(())
        }

        fn clear(&mut self) {
            self.cleared.set(self.cleared.get() + 1);
        }
    }

    fn probe_solver(fail_initialize: bool) -> (DpStokes, Rc<Cell<bool>>, Rc<Cell<usize>>) {
        let initialized = Rc::new(Cell::new(false));
        let cleared = Rc::new(Cell::new(0));
        let engine = ProbeEngine {
            mobility: 0.25,
            fail_initialize,
            initialized: initialized.clone(),
            cleared: cleared.clone(),
            positions_seen: Rc::new(Cell::new(0)),
        };
        let mut solver = DpStokes::from_tokens("periodic", "periodic", "open").unwrap();
        solver
            .set_dp_stokes_parameters(params(16.0, -6.0, 6.0), Box::new(engine))
            .unwrap();
        (solver, initialized, cleared)
    }

    #[test]
    fn test_initialize_requires_parameters_first() {
        let mut solver = DpStokes::from_tokens("periodic", "periodic", "open").unwrap();
        let err = solver.initialize(&Parameters::default()).unwrap_err();
        assert!(matches!(err, MobilityError::Usage(_)));
    }

    #[test]
    fn test_forwarding_through_engine() {
        let (mut solver, initialized, _) = probe_solver(false);
        let n = 4;
        solver
            .initialize(&Parameters {
                number_particles: n,
                ..Default::default()
            })
            .unwrap();
        assert!(initialized.get());
        solver.set_positions(&vec![0.0; 3 * n]).unwrap();
        let forces = vec![2.0 as Real; 3 * n];
        let mut linear = vec![0.0 as Real; 3 * n];
        solver.mdot(Some(&forces), None, &mut linear, None).unwrap();
        for v in &linear {
            assert_relative_eq!(*v, 0.5);
        }
    }

    #[test]
    fn test_mdot_checks_buffer_lengths() {
        let (mut solver, _, _) = probe_solver(false);
        let n = 2;
        solver
            .initialize(&Parameters {
                number_particles: n,
                ..Default::default()
            })
            .unwrap();
        solver.set_positions(&vec![0.0; 3 * n]).unwrap();
        let forces = vec![1.0 as Real; 3 * n];
        let torques = vec![1.0 as Real; 3 * n];
        let mut linear = vec![0.0 as Real; 3 * n];
        let mut short_angular = vec![0.0 as Real; 3 * n - 1];
        assert!(matches!(
            solver.mdot(
                Some(&forces),
                Some(&torques),
                &mut linear,
                Some(&mut short_angular),
            ),
            Err(MobilityError::Usage(_))
        ));
        let mut angular = vec![0.0 as Real; 3 * n];
        assert!(solver
            .mdot(Some(&forces), Some(&torques), &mut linear, Some(&mut angular))
            .is_ok());
    }

    #[test]
    fn test_engine_failure_leaves_clean_usable() {
        let (mut solver, _, cleared) = probe_solver(true);
        let err = solver
            .initialize(&Parameters {
                number_particles: 1,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, MobilityError::Engine(_)));
        // Engine resources were dropped on the error path, and clean is
        // still callable.
        assert!(cleared.get() >= 1);
        solver.clean().unwrap();
        solver.clean().unwrap();
    }

    #[test]
    fn test_clean_then_reinitialize() {
        let (mut solver, _, cleared) = probe_solver(false);
        let par = Parameters {
            number_particles: 2,
            ..Default::default()
        };
        solver.initialize(&par).unwrap();
        solver.clean().unwrap();
        assert_eq!(cleared.get(), 1);
        solver.initialize(&par).unwrap();
        solver.set_positions(&vec![0.0; 6]).unwrap();
    }
}
