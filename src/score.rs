//! HardSoftScore - two-level score with hard and soft constraints.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

/// A score with separate hard and soft constraint levels.
///
/// Hard scores are compared first; soft scores only break ties.
///
/// # Examples
///
/// ```
/// use dance_timetable::score::HardSoftScore;
///
/// let broken = HardSoftScore::of(-1, 100);
/// let feasible = HardSoftScore::of(0, -200);
///
/// // Feasible solutions are always better than infeasible ones
/// assert!(feasible > broken);
/// assert!(HardSoftScore::of(0, -50) > feasible);
/// assert_eq!(feasible.to_string(), "0hard/-200soft");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HardSoftScore {
    hard: i64,
    soft: i64,
}

impl HardSoftScore {
    pub const ZERO: HardSoftScore = HardSoftScore { hard: 0, soft: 0 };
    pub const ONE_HARD: HardSoftScore = HardSoftScore { hard: 1, soft: 0 };
    pub const ONE_SOFT: HardSoftScore = HardSoftScore { hard: 0, soft: 1 };

    #[inline]
    pub const fn of(hard: i64, soft: i64) -> Self {
        HardSoftScore { hard, soft }
    }

    #[inline]
    pub const fn of_hard(hard: i64) -> Self {
        HardSoftScore { hard, soft: 0 }
    }

    #[inline]
    pub const fn of_soft(soft: i64) -> Self {
        HardSoftScore { hard: 0, soft }
    }

    #[inline]
    pub const fn hard(&self) -> i64 {
        self.hard
    }

    #[inline]
    pub const fn soft(&self) -> i64 {
        self.soft
    }

    /// A solution is feasible when no hard constraint is broken.
    #[inline]
    pub const fn is_feasible(&self) -> bool {
        self.hard >= 0
    }

    /// Multiplies both levels by a constant.
    pub const fn multiply(&self, factor: i64) -> Self {
        HardSoftScore::of(self.hard * factor, self.soft * factor)
    }

    /// Collapses the score to a single number for temperature-based acceptors.
    ///
    /// One hard point outweighs any realistic soft total.
    #[inline]
    pub fn to_scalar(&self) -> f64 {
        self.hard as f64 * 1_000_000.0 + self.soft as f64
    }
}

impl Ord for HardSoftScore {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.hard.cmp(&other.hard) {
            Ordering::Equal => self.soft.cmp(&other.soft),
            other => other,
        }
    }
}

impl PartialOrd for HardSoftScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for HardSoftScore {
    type Output = HardSoftScore;

    fn add(self, rhs: Self) -> Self::Output {
        HardSoftScore::of(self.hard + rhs.hard, self.soft + rhs.soft)
    }
}

impl AddAssign for HardSoftScore {
    fn add_assign(&mut self, rhs: Self) {
        self.hard += rhs.hard;
        self.soft += rhs.soft;
    }
}

impl Sub for HardSoftScore {
    type Output = HardSoftScore;

    fn sub(self, rhs: Self) -> Self::Output {
        HardSoftScore::of(self.hard - rhs.hard, self.soft - rhs.soft)
    }
}

impl Neg for HardSoftScore {
    type Output = HardSoftScore;

    fn neg(self) -> Self::Output {
        HardSoftScore::of(-self.hard, -self.soft)
    }
}

impl std::iter::Sum for HardSoftScore {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(HardSoftScore::ZERO, Add::add)
    }
}

impl fmt::Debug for HardSoftScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HardSoftScore({}, {})", self.hard, self.soft)
    }
}

impl fmt::Display for HardSoftScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}hard/{}soft", self.hard, self.soft)
    }
}

/// Error returned when a score string is not of the form `{hard}hard/{soft}soft`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid score '{0}': expected format like '0hard/-5soft'")]
pub struct ParseScoreError(String);

impl FromStr for HardSoftScore {
    type Err = ParseScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseScoreError(s.to_string());
        let (hard, soft) = s.trim().split_once('/').ok_or_else(err)?;
        let hard = hard
            .strip_suffix("hard")
            .and_then(|h| h.parse::<i64>().ok())
            .ok_or_else(err)?;
        let soft = soft
            .strip_suffix("soft")
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(err)?;
        Ok(HardSoftScore::of(hard, soft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_dominates_soft() {
        assert!(HardSoftScore::of(0, -1_000) > HardSoftScore::of(-1, 1_000));
        assert!(HardSoftScore::of(-2, 5) < HardSoftScore::of(-1, 0));
        assert!(HardSoftScore::of(0, 3) > HardSoftScore::of(0, 2));
    }

    #[test]
    fn test_feasibility() {
        assert!(HardSoftScore::of(0, -10).is_feasible());
        assert!(!HardSoftScore::of(-1, 10).is_feasible());
    }

    #[test]
    fn test_arithmetic() {
        let a = HardSoftScore::of(-1, 5);
        let b = HardSoftScore::of(-2, -3);
        assert_eq!(a + b, HardSoftScore::of(-3, 2));
        assert_eq!(a - b, HardSoftScore::of(1, 8));
        assert_eq!(-a, HardSoftScore::of(1, -5));
        assert_eq!(HardSoftScore::ONE_SOFT.multiply(-4), HardSoftScore::of_soft(-4));
        let total: HardSoftScore = vec![a, b, HardSoftScore::ONE_HARD].into_iter().sum();
        assert_eq!(total, HardSoftScore::of(-2, 2));
    }

    #[test]
    fn test_display_and_parse() {
        let score = HardSoftScore::of(-100, -37);
        assert_eq!(score.to_string(), "-100hard/-37soft");
        assert_eq!("-100hard/-37soft".parse::<HardSoftScore>(), Ok(score));
        assert_eq!(" 0hard/12soft ".parse::<HardSoftScore>(), Ok(HardSoftScore::of(0, 12)));
        assert!("12/13".parse::<HardSoftScore>().is_err());
        assert!("xhard/1soft".parse::<HardSoftScore>().is_err());
    }
}
