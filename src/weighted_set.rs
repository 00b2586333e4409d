//! Weighted sets: a mapping from items to non-negative probability mass.
//!
//! Used both for boards (weights over spin outcomes) and for the
//! distribution of states that results from applying a board to a state.
//! Items are kept ordered so iteration, and therefore every float sum built
//! from it, is the same from run to run.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::Prob;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSet<T: Ord> {
    terms: BTreeMap<T, Prob>,
}

impl<T: Ord> Default for WeightedSet<T> {
    fn default() -> Self {
        WeightedSet {
            terms: BTreeMap::new(),
        }
    }
}

impl<T: Ord> WeightedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding a single item with all of the mass.
    pub fn single(item: T) -> Self {
        let mut set = Self::new();
        set.add(1.0, item);
        set
    }

    /// Accumulate `weight` onto `item`. Adding an existing item sums the weights.
    pub fn add(&mut self, weight: Prob, item: T) {
        *self.terms.entry(item).or_insert(0.0) += weight;
    }

    /// Weight of `item`, or 0 if it is not in the set.
    pub fn get(&self, item: &T) -> Prob {
        self.terms.get(item).copied().unwrap_or(0.0)
    }

    /// Remove `value` and give half of its mass to each of `low` and `high`.
    ///
    /// Shrinks the number of distinct items at the cost of accuracy. Spreading
    /// an item that is not present moves no mass.
    pub fn spread(&mut self, value: &T, low: T, high: T) {
        if let Some(weight) = self.terms.remove(value) {
            self.add(weight / 2.0, low);
            self.add(weight / 2.0, high);
        }
    }

    /// Sum of all weights.
    pub fn weight(&self) -> Prob {
        self.terms.values().sum()
    }

    /// Scale every weight so the total is 1.0. An empty or massless set is left as is.
    pub fn normalize(&mut self) {
        let total = self.weight();
        if total > 0.0 {
            for w in self.terms.values_mut() {
                *w /= total;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, Prob)> {
        self.terms.iter().map(|(item, &w)| (item, w))
    }

    /// Items ordered by ascending weight.
    pub fn sorted_by_weight(&self) -> Vec<(&T, Prob)> {
        self.iter()
            .sorted_by(|a, b| a.1.total_cmp(&b.1))
            .collect()
    }

    /// Same items, and every weight within `epsilon` of the other set's.
    pub fn approx_eq(&self, other: &Self, epsilon: Prob) -> bool {
        self.len() == other.len()
            && self.terms.iter().all(|(item, &w)| match other.terms.get(item) {
                Some(&o) => (w - o).abs() <= epsilon,
                None => false,
            })
    }
}
