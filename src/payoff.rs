//! Per-player win probabilities with explicit uncertainty.
//!
//! The probabilities of a payoff need not sum to 1. The missing mass is the
//! share of outcomes the search has not resolved yet, so a payoff is both an
//! estimate and a bound: player `n` wins with probability somewhere in
//! `[prob(n), prob(n) + uncertainty())`.

use std::fmt;

use crate::state::NUM_PLAYERS;
use crate::Prob;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Payoff {
    prob: [Prob; NUM_PLAYERS],
}

impl Payoff {
    /// Nothing known: every player at 0, uncertainty 1.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Player `n` wins outright.
    pub fn winner(n: usize) -> Self {
        let mut p = Self::zero();
        p.prob[n] = 1.0;
        p
    }

    pub fn from_probs(prob: [Prob; NUM_PLAYERS]) -> Self {
        Payoff { prob }
    }

    pub fn prob(&self, n: usize) -> Prob {
        self.prob[n]
    }

    pub fn probs(&self) -> &[Prob; NUM_PLAYERS] {
        &self.prob
    }

    pub fn total(&self) -> Prob {
        self.prob.iter().sum()
    }

    pub fn uncertainty(&self) -> Prob {
        1.0 - self.total()
    }

    /// `self += other * weight`
    pub fn add_scaled(&mut self, other: &Payoff, weight: Prob) {
        for (p, o) in self.prob.iter_mut().zip(other.prob.iter()) {
            *p += o * weight;
        }
    }

    /// Per-player minimum of two payoffs: what both agree a player wins at least.
    pub fn merge_min(first: &Payoff, second: &Payoff) -> Payoff {
        let mut res = Payoff::zero();
        for n in 0..NUM_PLAYERS {
            res.prob[n] = first.prob[n].min(second.prob[n]);
        }
        res
    }

    /// Player `n`'s win probability as an interval.
    pub fn range(&self, n: usize) -> Interval<Prob> {
        Interval::new(self.prob[n], self.prob[n] + self.uncertainty())
    }
}

/// Uncertainty of a payoff that may not have been computed yet.
pub fn uncertainty(payoff: Option<&Payoff>) -> Prob {
    payoff.map_or(1.0, Payoff::uncertainty)
}

impl fmt::Display for Payoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for p in &self.prob {
            write!(f, "{:.3} ", p)?;
        }
        write!(f, ")")
    }
}

/// Half-open interval `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval<T> {
    min: T,
    max: T,
}

impl<T: PartialOrd + Copy> Interval<T> {
    /// The bounds may be given in either order.
    pub fn new(a: T, b: T) -> Self {
        if a < b {
            Interval { min: a, max: b }
        } else {
            Interval { min: b, max: a }
        }
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    /// Every point of `self` is below every point of `other`.
    pub fn is_below(&self, other: &Interval<T>) -> bool {
        self.max < other.min
    }

    pub fn is_above(&self, other: &Interval<T>) -> bool {
        self.min > other.max
    }

    pub fn overlaps(&self, other: &Interval<T>) -> bool {
        !self.is_below(other) && !self.is_above(other)
    }
}

impl Interval<Prob> {
    pub fn width(&self) -> Prob {
        self.max - self.min
    }
}

impl Default for Interval<Prob> {
    fn default() -> Self {
        Interval::new(0.0, 1.0)
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3},{:.3})", self.min, self.max)
    }
}
