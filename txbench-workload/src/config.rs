//! Workload configuration.
//!
//! [`WorkloadConfig`] carries every option that shapes the generated workload. It deserializes
//! with serde and fills in defaults for missing options. Each option also accepts its classic
//! single-word property name as an alias, so `readproportion: 0.5` and `read_proportion: 0.5` are
//! equivalent:
//!
//! ```yaml
//! record_count: 10000
//! readproportion: 0.9
//! updateproportion: 0.1
//! singletonproportion: 0.5
//! truesingleton: true
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Distribution of record keys chosen by reads and updates.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestDistribution {
    /// Every existing key is equally likely.
    #[default]
    Uniform,
    /// Low key indices are the most popular.
    Zipfian,
    /// The most recently inserted keys are the most popular.
    Latest,
}

/// Distribution of the byte length of synthesized field values.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldLengthDistribution {
    /// Every value has exactly `field_length` bytes.
    #[default]
    Constant,
    /// Lengths are uniform in `1..=field_length`.
    Uniform,
    /// Lengths follow a zipfian distribution over `1..=field_length`, favoring short values.
    Zipfian,
}

/// Options controlling key, value and operation-mix generation.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Name of the table all operations run against.
    ///
    /// Defaults to `"usertable"`.
    pub table: String,

    /// Number of records inserted during the load phase.
    ///
    /// Defaults to `1000`.
    #[serde(alias = "recordcount")]
    pub record_count: u64,

    /// Index of the first key inserted during the load phase.
    #[serde(alias = "insertstart")]
    pub insert_start: u64,

    /// Number of fields per record.
    ///
    /// Defaults to `10`.
    #[serde(alias = "fieldcount")]
    pub field_count: usize,

    /// Maximum length of a field value in bytes.
    ///
    /// Defaults to `100`.
    #[serde(alias = "fieldlength")]
    pub field_length: usize,

    /// How value lengths are distributed up to [`field_length`](Self::field_length).
    #[serde(alias = "fieldlengthdistribution")]
    pub field_length_distribution: FieldLengthDistribution,

    /// Prefix of all field names, followed by the field index.
    ///
    /// Defaults to `"field"`.
    #[serde(alias = "fieldnameprefix")]
    pub field_name_prefix: String,

    /// Prefix of all record keys, followed by the key index.
    ///
    /// Defaults to `"user"`.
    #[serde(alias = "keyprefix")]
    pub key_prefix: String,

    /// Minimum number of digits of the key index; shorter indices are padded with zeros.
    ///
    /// Defaults to `1`, which disables padding.
    #[serde(alias = "zeropadding")]
    pub zero_padding: usize,

    /// Reads fetch all fields when set, a single random field otherwise.
    ///
    /// Defaults to `true`.
    #[serde(alias = "readallfields")]
    pub read_all_fields: bool,

    /// Updates rewrite all fields when set, a single random field otherwise.
    #[serde(alias = "writeallfields")]
    pub write_all_fields: bool,

    /// Weight of reads, both in the transaction mix and among singleton operations.
    ///
    /// Defaults to `0.95`.
    #[serde(alias = "readproportion")]
    pub read_proportion: f64,

    /// Weight of updates in the transaction mix.
    ///
    /// Defaults to `0.05`.
    #[serde(alias = "updateproportion")]
    pub update_proportion: f64,

    /// Weight of inserts in the transaction mix.
    #[serde(alias = "insertproportion")]
    pub insert_proportion: f64,

    /// Weight of read-modify-writes in the transaction mix.
    #[serde(alias = "readmodifywriteproportion")]
    pub read_modify_write_proportion: f64,

    /// Popularity distribution of keys for reads and updates.
    #[serde(alias = "requestdistribution")]
    pub request_distribution: RequestDistribution,

    /// Exponent of the zipfian distributions.
    ///
    /// Defaults to `0.99`.
    #[serde(alias = "zipfianconstant")]
    pub zipfian_constant: f64,

    /// Share of logical operations executed as singleton operations.
    ///
    /// Defaults to `0.5`.
    #[serde(alias = "singletonproportion")]
    pub singleton_proportion: f64,

    /// Singleton operations use the backend's atomic fast path when set, and an explicit
    /// begin/commit pair otherwise.
    ///
    /// Defaults to `true`.
    #[serde(alias = "truesingleton")]
    pub true_singleton: bool,

    /// Number of keys inserted per transaction by the singleton engine's load phase.
    ///
    /// Defaults to `1`.
    #[serde(alias = "batchsize")]
    pub insert_batch_size: usize,

    /// Number of statements of the chosen type executed inside one ordinary transaction.
    ///
    /// Defaults to `1`.
    #[serde(alias = "transactionlength")]
    pub transaction_length: usize,

    /// Seed for all random generators. A random seed is used when absent.
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            table: "usertable".to_owned(),
            record_count: 1000,
            insert_start: 0,
            field_count: 10,
            field_length: 100,
            field_length_distribution: FieldLengthDistribution::Constant,
            field_name_prefix: "field".to_owned(),
            key_prefix: "user".to_owned(),
            zero_padding: 1,
            read_all_fields: true,
            write_all_fields: false,
            read_proportion: 0.95,
            update_proportion: 0.05,
            insert_proportion: 0.0,
            read_modify_write_proportion: 0.0,
            request_distribution: RequestDistribution::Uniform,
            zipfian_constant: 0.99,
            singleton_proportion: 0.5,
            true_singleton: true,
            insert_batch_size: 1,
            transaction_length: 1,
            seed: None,
        }
    }
}

impl WorkloadConfig {
    /// Checks all options for values outside of their valid range.
    pub fn validate(&self) -> Result<()> {
        let proportions = [
            ("read_proportion", self.read_proportion),
            ("update_proportion", self.update_proportion),
            ("insert_proportion", self.insert_proportion),
            (
                "read_modify_write_proportion",
                self.read_modify_write_proportion,
            ),
            ("singleton_proportion", self.singleton_proportion),
        ];
        for (field, value) in proportions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("{value} is not within [0, 1]"),
                });
            }
        }

        let positive = [
            ("record_count", self.record_count),
            ("field_count", self.field_count as u64),
            ("field_length", self.field_length as u64),
            ("insert_batch_size", self.insert_batch_size as u64),
            ("transaction_length", self.transaction_length as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be at least 1".to_owned(),
                });
            }
        }

        if !self.zipfian_constant.is_finite() || self.zipfian_constant <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "zipfian_constant",
                reason: format!("{} is not a positive number", self.zipfian_constant),
            });
        }

        if self.insert_start.checked_add(self.record_count).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "record_count",
                reason: "key range overflows".to_owned(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        WorkloadConfig::default().validate().unwrap();
    }

    #[test]
    fn accepts_property_aliases() {
        let config: WorkloadConfig = serde_yaml::from_str(
            r#"
            recordcount: 500
            readproportion: 0.25
            updateproportion: 0.75
            singletonproportion: 1.0
            truesingleton: false
            writeallfields: true
            readallfields: false
            requestdistribution: latest
            "#,
        )
        .unwrap();

        assert_eq!(config.record_count, 500);
        assert_eq!(config.read_proportion, 0.25);
        assert_eq!(config.update_proportion, 0.75);
        assert_eq!(config.singleton_proportion, 1.0);
        assert!(!config.true_singleton);
        assert!(config.write_all_fields);
        assert!(!config.read_all_fields);
        assert_eq!(config.request_distribution, RequestDistribution::Latest);

        // untouched options keep their defaults
        assert_eq!(config.table, "usertable");
        assert_eq!(config.field_count, 10);
    }

    #[test]
    fn rejects_out_of_range_proportions() {
        let config = WorkloadConfig {
            singleton_proportion: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "singleton_proportion",
                ..
            })
        ));

        let config = WorkloadConfig {
            read_proportion: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_records() {
        let config = WorkloadConfig {
            field_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "field_count",
                ..
            })
        ));
    }
}
