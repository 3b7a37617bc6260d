//! Synthesis of record keys, field names and field values.

use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Zipf};

use crate::backend::{FieldSet, FieldValueMap};
use crate::config::{FieldLengthDistribution, WorkloadConfig};
use crate::error::{ConfigError, Result};
use crate::generator::{KeyChooser, KeySpace, key_chooser};

/// Distribution of value lengths, in bytes.
#[derive(Debug)]
enum FieldLength {
    Constant(usize),
    Uniform(usize),
    Zipfian(Zipf<f64>, usize),
}

impl FieldLength {
    fn new(config: &WorkloadConfig) -> Result<Self> {
        let max = config.field_length;
        Ok(match config.field_length_distribution {
            FieldLengthDistribution::Constant => Self::Constant(max),
            FieldLengthDistribution::Uniform => Self::Uniform(max),
            FieldLengthDistribution::Zipfian => {
                let zipf = Zipf::new(max as f64, config.zipfian_constant)
                    .map_err(|err| ConfigError::Distribution(err.to_string()))?;
                Self::Zipfian(zipf, max)
            }
        })
    }

    fn sample(&self, rng: &mut SmallRng) -> usize {
        match self {
            Self::Constant(len) => *len,
            Self::Uniform(max) => rng.random_range(1..=*max),
            Self::Zipfian(zipf, max) => (zipf.sample(rng) as usize).clamp(1, *max),
        }
    }
}

/// Builds record keys, field names and payloads for one worker.
///
/// Each synthesizer owns its RNG. Key popularity is bounded by the keys handed out so far by the
/// shared [`KeySpace`].
#[derive(Debug)]
pub struct KeyValueSynthesizer {
    key_prefix: String,
    zero_padding: usize,
    field_names: Vec<String>,
    field_length: FieldLength,
    key_chooser: Box<dyn KeyChooser>,
    keys: KeySpace,
    rng: SmallRng,
}

impl KeyValueSynthesizer {
    /// Creates a synthesizer for the given configuration.
    pub fn new(config: &WorkloadConfig, keys: KeySpace, seed: u64) -> Result<Self> {
        let field_names = (0..config.field_count)
            .map(|index| format!("{}{index}", config.field_name_prefix))
            .collect();

        Ok(Self {
            key_prefix: config.key_prefix.clone(),
            zero_padding: config.zero_padding,
            field_names,
            field_length: FieldLength::new(config)?,
            key_chooser: key_chooser(config)?,
            keys,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// The key sequences this synthesizer draws from.
    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// The names of all fields of a record, in index order.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Builds the record key for a key index.
    ///
    /// Distinct indices always yield distinct keys.
    pub fn build_key_name(&self, index: u64) -> String {
        format!(
            "{}{index:0>width$}",
            self.key_prefix,
            width = self.zero_padding
        )
    }

    /// Draws the index of an existing key according to the request distribution.
    pub fn next_keynum(&mut self) -> u64 {
        let start = self.keys.start;
        // never empty: the keyspace holds at least one record
        let end = self.keys.transaction.current().max(start + 1);
        self.key_chooser.next_keynum(&mut self.rng, start, end)
    }

    /// Builds a payload with a fresh value for every field.
    pub fn build_values(&mut self) -> FieldValueMap {
        let mut values = FieldValueMap::new();
        for index in 0..self.field_names.len() {
            let value = self.build_value();
            values.insert(self.field_names[index].clone(), value);
        }
        values
    }

    /// Builds a payload with a fresh value for a single, uniformly chosen field.
    pub fn build_update(&mut self) -> FieldValueMap {
        let field = self.choose_field().to_owned();
        let value = self.build_value();
        FieldValueMap::from([(field, value)])
    }

    /// Chooses a single field uniformly at random, for reads that do not fetch all fields.
    pub fn build_field_set(&mut self) -> FieldSet {
        FieldSet::from([self.choose_field().to_owned()])
    }

    fn choose_field(&mut self) -> &str {
        let index = self.rng.random_range(0..self.field_names.len());
        &self.field_names[index]
    }

    fn build_value(&mut self) -> Bytes {
        let len = self.field_length.sample(&mut self.rng);
        (0..len)
            .map(|_| self.rng.random_range(b' '..=b'~'))
            .collect::<Vec<u8>>()
            .into()
    }
}
