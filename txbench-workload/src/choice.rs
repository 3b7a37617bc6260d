//! Weighted selection between labeled outcomes.
//!
//! A [`WeightedChoice`] draws one of its labels with probability proportional to the label's
//! weight. Weights are added incrementally through a [`WeightedChoiceBuilder`] and do not need to
//! sum to one: the effective probability of a label is its weight divided by the total of all
//! weights added.
//!
//! Drawing is backed by a [`WeightedIndex`], which searches the cumulative weights with a single
//! uniform sample, so a seeded RNG replays the exact same sequence of labels.

use std::fmt;

use rand::Rng;
use rand_distr::Distribution;
use rand_distr::weighted::{Error as WeightedError, WeightedIndex};

use crate::error::{ConfigError, Result};

/// Builder collecting `(weight, label)` pairs for a [`WeightedChoice`].
#[derive(Debug)]
pub struct WeightedChoiceBuilder<T> {
    weights: Vec<f64>,
    labels: Vec<T>,
}

impl<T: fmt::Debug> WeightedChoiceBuilder<T> {
    /// Appends a label with the given weight.
    ///
    /// A weight of exactly `0.0` is allowed; such a label is never drawn.
    pub fn add_value(mut self, weight: f64, label: T) -> Self {
        self.weights.push(weight);
        self.labels.push(label);
        self
    }

    /// Validates the weights and creates the choice.
    ///
    /// Fails if any weight is negative or not finite, or if the weights sum to zero.
    pub fn build(self) -> Result<WeightedChoice<T>> {
        for (weight, label) in self.weights.iter().zip(&self.labels) {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    label: format!("{label:?}"),
                    weight: *weight,
                });
            }
        }

        let index = WeightedIndex::new(&self.weights).map_err(|err| match err {
            WeightedError::InvalidInput | WeightedError::InsufficientNonZero => {
                ConfigError::NonPositiveTotalWeight
            }
            err => ConfigError::Distribution(err.to_string()),
        })?;

        Ok(WeightedChoice {
            total: self.weights.iter().sum(),
            weights: self.weights,
            labels: self.labels,
            index,
        })
    }
}

/// A random selector over labels with configured relative probabilities.
///
/// Instances are immutable once built. All randomness comes from the RNG passed to
/// [`next`](Self::next), so separate instances sharing nothing but an RNG type draw independently.
#[derive(Clone, Debug)]
pub struct WeightedChoice<T> {
    weights: Vec<f64>,
    labels: Vec<T>,
    total: f64,
    index: WeightedIndex<f64>,
}

impl<T> WeightedChoice<T> {
    /// Starts building a new choice.
    pub fn builder() -> WeightedChoiceBuilder<T> {
        WeightedChoiceBuilder {
            weights: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// The sum of all weights.
    pub fn total_weight(&self) -> f64 {
        self.total
    }

    /// The effective probability of the `index`-th label that was added.
    pub fn probability(&self, index: usize) -> Option<f64> {
        self.weights.get(index).map(|weight| weight / self.total)
    }

    /// Iterates over all labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &T> {
        self.labels.iter()
    }

    /// Draws one label.
    pub fn next<R: Rng>(&self, rng: &mut R) -> &T {
        &self.labels[self.index.sample(rng)]
    }
}
