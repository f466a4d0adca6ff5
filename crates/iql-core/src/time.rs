//! Simulation time

use std::fmt::Display;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// Point in (or span of) simulation time, in seconds
///
/// The host advances the clock monotonically; the core only ever reads it.
/// Lifetimes such as a message TTL use the same unit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(pub f64);

impl SimTime {
    /// Start of the simulation
    pub const ZERO: SimTime = SimTime(0.0);

    /// Create a time from seconds
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Create a time from minutes
    pub fn from_mins(mins: f64) -> Self {
        Self(mins * 60.0)
    }

    /// Get the value in seconds
    pub fn as_secs(self) -> f64 {
        self.0
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 += rhs.0;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let mut t = SimTime::from_secs(10.0);
        t += SimTime::from_mins(1.0);
        assert_eq!(t, SimTime(70.0));
        assert_eq!(t - SimTime(20.0), SimTime(50.0));
        assert!(SimTime::ZERO < t);
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&SimTime(1.5)).unwrap();
        assert_eq!(json, "1.5");
    }
}
