//! Boundary geometry selectors.
//!
//! A `Configuration` fixes one periodicity mode per spatial axis. It is
//! built once, validated by the concrete solver at construction time, and
//! never changes for the lifetime of the solver instance.

use crate::error::{MobilityError, Result};
use std::fmt;
use std::str::FromStr;

/// Boundary condition along one spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodicityMode {
    /// Unbounded fluid in this direction.
    Open,
    /// Not specified; solvers that care must reject it.
    #[default]
    Unspecified,
    /// A single no-slip wall bounds this direction from below.
    SingleWall,
    /// Two no-slip walls (slit channel).
    TwoWalls,
    /// Periodic images in this direction.
    Periodic,
}

impl PeriodicityMode {
    /// Wire token, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Unspecified => "unspecified",
            Self::SingleWall => "single_wall",
            Self::TwoWalls => "two_walls",
            Self::Periodic => "periodic",
        }
    }
}

impl fmt::Display for PeriodicityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodicityMode {
    type Err = MobilityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Self::Open),
            "unspecified" => Ok(Self::Unspecified),
            "single_wall" => Ok(Self::SingleWall),
            "two_walls" => Ok(Self::TwoWalls),
            "periodic" => Ok(Self::Periodic),
            other => Err(MobilityError::invalid_parameters(format!(
                "unrecognized periodicity token \"{other}\" (expected one of \
                 open, unspecified, single_wall, two_walls, periodic)"
            ))),
        }
    }
}

/// Boundary geometry of a solver instance: one periodicity mode per axis.
///
/// Immutable once built. Each solver checks the triple against the
/// geometries it supports when constructed and rejects everything else
/// with a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Configuration {
    pub periodicity_x: PeriodicityMode,
    pub periodicity_y: PeriodicityMode,
    pub periodicity_z: PeriodicityMode,
}

impl Configuration {
    /// Build from one mode per axis.
    pub fn new(x: PeriodicityMode, y: PeriodicityMode, z: PeriodicityMode) -> Self {
        Self {
            periodicity_x: x,
            periodicity_y: y,
            periodicity_z: z,
        }
    }

    /// Parse from wire tokens, e.g. `("periodic", "periodic", "open")`.
    pub fn from_tokens(x: &str, y: &str, z: &str) -> Result<Self> {
        Ok(Self::new(x.parse()?, y.parse()?, z.parse()?))
    }

    /// Fully open boundaries on all three axes.
    pub fn open() -> Self {
        Self::new(
            PeriodicityMode::Open,
            PeriodicityMode::Open,
            PeriodicityMode::Open,
        )
    }

    /// Periodic in the plane, `z` as given (the doubly-periodic family).
    pub fn doubly_periodic(z: PeriodicityMode) -> Self {
        Self::new(PeriodicityMode::Periodic, PeriodicityMode::Periodic, z)
    }

    /// True when all three axes are open.
    pub fn is_fully_open(&self) -> bool {
        *self == Self::open()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.periodicity_x, self.periodicity_y, self.periodicity_z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for mode in [
            PeriodicityMode::Open,
            PeriodicityMode::Unspecified,
            PeriodicityMode::SingleWall,
            PeriodicityMode::TwoWalls,
            PeriodicityMode::Periodic,
        ] {
            assert_eq!(mode.as_str().parse::<PeriodicityMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_bad_token_rejected() {
        assert!("periodicasdas".parse::<PeriodicityMode>().is_err());
        assert!(Configuration::from_tokens("periodicasdas", "periodic", "open").is_err());
    }

    #[test]
    fn test_from_tokens() {
        let conf = Configuration::from_tokens("periodic", "periodic", "single_wall").unwrap();
        assert_eq!(conf.periodicity_x, PeriodicityMode::Periodic);
        assert_eq!(conf.periodicity_z, PeriodicityMode::SingleWall);
        assert!(!conf.is_fully_open());
        assert!(Configuration::open().is_fully_open());
    }
}
