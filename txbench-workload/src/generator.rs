//! Integer generators for key indices.
//!
//! [`KeySequence`] hands out consecutive key indices to inserting threads. A [`KeySpace`] bundles
//! the two sequences a benchmark shares between all of its threads: one for the load phase and
//! one for inserts issued during the measured transaction phase.
//!
//! [`KeyChooser`] implementations pick existing keys for reads and updates according to a
//! popularity distribution.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Zipf};

use crate::config::{RequestDistribution, WorkloadConfig};
use crate::error::{ConfigError, Result};

/// A shared, monotonically advancing counter of key indices.
///
/// Clones share the same counter.
#[derive(Clone, Debug)]
pub struct KeySequence {
    next: Arc<AtomicU64>,
}

impl KeySequence {
    /// Creates a sequence yielding `start`, `start + 1`, ...
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Claims the next index.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Claims the next index if it is below `limit`.
    pub fn next_below(&self, limit: u64) -> Option<u64> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                (next < limit).then_some(next + 1)
            })
            .ok()
    }

    /// The index the next call to [`next`](Self::next) would return.
    ///
    /// All indices below this value have been handed out.
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// The key sequences shared by all threads of one benchmark.
#[derive(Clone, Debug)]
pub struct KeySpace {
    /// First key index of the keyspace.
    pub start: u64,
    /// End of the records inserted by the load phase.
    pub load_end: u64,
    /// Keys inserted by the load phase, `start..load_end`.
    pub load: KeySequence,
    /// Keys inserted during the transaction phase, starting at `load_end`.
    pub transaction: KeySequence,
}

impl KeySpace {
    /// Creates the key sequences for the given configuration.
    pub fn new(config: &WorkloadConfig) -> Self {
        let start = config.insert_start;
        let load_end = start.saturating_add(config.record_count);

        Self {
            start,
            load_end,
            load: KeySequence::starting_at(start),
            transaction: KeySequence::starting_at(load_end),
        }
    }

    /// Claims the next key of the load phase, or `None` once all records have been claimed.
    pub fn next_load_key(&self) -> Option<u64> {
        self.load.next_below(self.load_end)
    }

    /// Returns `true` once the load phase has claimed all of its records.
    pub fn load_exhausted(&self) -> bool {
        self.load.current() >= self.load_end
    }

    /// Number of keys that are known to have been handed out for insertion.
    pub fn known_keys(&self) -> u64 {
        self.transaction.current().saturating_sub(self.start)
    }
}

/// Picks the index of an existing key.
pub trait KeyChooser: fmt::Debug + Send {
    /// Draws a key index from `start..end`.
    ///
    /// Callers guarantee that the range is not empty.
    fn next_keynum(&mut self, rng: &mut SmallRng, start: u64, end: u64) -> u64;
}

/// Creates the chooser configured by [`WorkloadConfig::request_distribution`].
pub fn key_chooser(config: &WorkloadConfig) -> Result<Box<dyn KeyChooser>> {
    Ok(match config.request_distribution {
        RequestDistribution::Uniform => Box::new(UniformChooser),
        RequestDistribution::Zipfian => Box::new(ZipfianChooser::new(config.zipfian_constant)?),
        RequestDistribution::Latest => Box::new(LatestChooser(ZipfianChooser::new(
            config.zipfian_constant,
        )?)),
    })
}

/// Every key is equally likely.
#[derive(Debug)]
pub struct UniformChooser;

impl KeyChooser for UniformChooser {
    fn next_keynum(&mut self, rng: &mut SmallRng, start: u64, end: u64) -> u64 {
        rng.random_range(start..end)
    }
}

/// Popularity decreases with the key index, following a zipfian distribution.
///
/// The underlying distribution is rebuilt whenever the number of keys changes.
pub struct ZipfianChooser {
    exponent: f64,
    distribution: Option<(u64, Zipf<f64>)>,
}

impl ZipfianChooser {
    /// Creates a chooser with the given zipfian exponent.
    pub fn new(exponent: f64) -> Result<Self> {
        // validate the exponent eagerly instead of on the first draw
        Zipf::new(1.0, exponent).map_err(|err| ConfigError::Distribution(err.to_string()))?;

        Ok(Self {
            exponent,
            distribution: None,
        })
    }

    /// Draws a rank in `0..items`, where rank 0 is the most popular.
    fn rank(&mut self, rng: &mut SmallRng, items: u64) -> u64 {
        let zipf = match self.distribution.take() {
            Some((cached, zipf)) if cached == items => zipf,
            _ => Zipf::new(items as f64, self.exponent)
                .unwrap_or_else(|err| unreachable!("exponent was validated: {err}")),
        };

        // samples are in `1..=items`
        let rank = (zipf.sample(rng) as u64).clamp(1, items) - 1;
        self.distribution = Some((items, zipf));
        rank
    }
}

impl fmt::Debug for ZipfianChooser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipfianChooser")
            .field("exponent", &self.exponent)
            .field("items", &self.distribution.as_ref().map(|(items, _)| items))
            .finish()
    }
}

impl KeyChooser for ZipfianChooser {
    fn next_keynum(&mut self, rng: &mut SmallRng, start: u64, end: u64) -> u64 {
        start + self.rank(rng, end - start)
    }
}

/// Recently inserted keys are the most popular.
#[derive(Debug)]
pub struct LatestChooser(ZipfianChooser);

impl KeyChooser for LatestChooser {
    fn next_keynum(&mut self, rng: &mut SmallRng, start: u64, end: u64) -> u64 {
        end - 1 - self.0.rank(rng, end - start)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use rand::SeedableRng;

    use super::*;

    #[test]
    fn load_keys_stop_at_record_count() {
        let config = WorkloadConfig {
            insert_start: 3,
            record_count: 2,
            ..Default::default()
        };
        let keys = KeySpace::new(&config);

        assert!(!keys.load_exhausted());
        assert_eq!(keys.next_load_key(), Some(3));
        assert_eq!(keys.next_load_key(), Some(4));
        assert_eq!(keys.next_load_key(), None);
        assert_eq!(keys.next_load_key(), None);
        assert_eq!(keys.load.current(), 5);
        assert!(keys.load_exhausted());
    }

    #[test]
    fn sequence_is_shared_between_threads() {
        let sequence = KeySequence::starting_at(0);

        let mut claimed: Vec<u64> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let sequence = sequence.clone();
                    scope.spawn(move || {
                        std::iter::from_fn(|| sequence.next_below(1000)).collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        claimed.sort_unstable();
        assert_eq!(claimed, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn keyspace_continues_after_loaded_records() {
        let config = WorkloadConfig {
            insert_start: 10,
            record_count: 5,
            ..Default::default()
        };
        let keys = KeySpace::new(&config);

        assert_eq!(keys.next_load_key(), Some(10));
        assert_eq!(keys.transaction.next(), 15);
        assert_eq!(keys.known_keys(), 6);
    }

    #[test]
    fn choosers_stay_in_range() {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut choosers: Vec<Box<dyn KeyChooser>> = vec![
            Box::new(UniformChooser),
            Box::new(ZipfianChooser::new(0.99).unwrap()),
            Box::new(LatestChooser(ZipfianChooser::new(0.99).unwrap())),
        ];

        for chooser in &mut choosers {
            for end in [101, 150, 1000] {
                for _ in 0..1000 {
                    let keynum = chooser.next_keynum(&mut rng, 100, end);
                    assert!((100..end).contains(&keynum), "{chooser:?} drew {keynum}");
                }
            }
        }
    }

    #[test]
    fn latest_prefers_recent_keys() {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut chooser = LatestChooser(ZipfianChooser::new(0.99).unwrap());

        let recent = (0..10_000)
            .filter(|_| chooser.next_keynum(&mut rng, 0, 1000) >= 900)
            .count();
        assert!(recent > 5000, "only {recent} draws among the newest keys");
    }

    #[test]
    fn zipfian_rejects_invalid_exponent() {
        assert!(matches!(
            ZipfianChooser::new(f64::NAN),
            Err(ConfigError::Distribution(_))
        ));
    }
}
