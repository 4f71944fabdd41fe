//! Empirical kernel-shape fits.
//!
//! The Exponential-of-Semicircle spreading kernel's shape parameter β is
//! tied to the ratio between hydrodynamic radius and kernel support by an
//! empirical polynomial fit. When the box size is held fixed the lattice
//! spacing is adjusted instead, and β must be recovered by inverting the
//! fit at the new ratio.

/// Evaluate a polynomial with coefficients ordered from the highest
/// degree down to the constant term.
pub fn poly_eval(coefficients: &[f64], x: f64) -> f64 {
    let mut acc = 0.0;
    for &c in coefficients {
        acc = acc * x + c;
    }
    acc
}

/// Inverse fit β(a / (w·h)) for the force spreading kernel. Fit data, not
/// derived here.
pub const CBETAM_INV: [f64; 11] = [
    4131643418.193291,
    -10471683395.26777,
    11833009228.6429,
    -7851132955.882548,
    3388121732.651829,
    -994285251.2185925,
    201183449.7086889,
    -27776767.88241613,
    2515647.646492857,
    -136305.2970161326,
    3445.959503226691,
];
