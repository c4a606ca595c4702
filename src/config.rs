//! Run configuration.
//!
//! [`Config`] is the CLI surface in struct form: the clustering resolution,
//! the raw alignment scores, output destinations, and behavior flags. It is
//! validated once at startup; everything downstream can assume the ranges
//! hold.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::db::AbundanceStyle;
use crate::score::CostSet;

/// Hard ceiling on worker threads.
pub const MAX_THREADS: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum differences between a record and the one that links it.
    pub resolution: u32,
    pub threads: usize,
    /// Score for a nucleotide match.
    pub match_reward: i64,
    /// Penalty for a mismatch, positive as given on the command line.
    pub mismatch_penalty: i64,
    pub gap_opening_penalty: i64,
    pub gap_extension_penalty: i64,
    /// Refuse links from a parent to a more abundant child.
    pub no_valley: bool,
    /// Report the swarm link graph.
    pub break_swarms: bool,
    /// Mothur list format on the main output.
    pub mothur: bool,
    /// Abundance annotated as `;size=N` instead of a trailing `_N`.
    pub usearch_abundance: bool,
    /// Variant-enumeration engine when the resolution is 1.
    pub alternative_algorithm: bool,
    /// Input FASTA; `None` or `-` reads stdin.
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub statistics_file: Option<PathBuf>,
    pub uclust_file: Option<PathBuf>,
    pub internal_structure_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            resolution: 1,
            threads: 1,
            match_reward: 5,
            mismatch_penalty: 4,
            gap_opening_penalty: 12,
            gap_extension_penalty: 4,
            no_valley: false,
            break_swarms: false,
            mothur: false,
            usearch_abundance: false,
            alternative_algorithm: false,
            input_file: None,
            output_file: None,
            statistics_file: None,
            uclust_file: None,
            internal_structure_file: None,
            log_file: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.resolution < 1 {
            bail!("Resolution (-d) must be at least 1");
        }
        if self.threads < 1 || self.threads > MAX_THREADS {
            bail!("Thread count (-t) must be between 1 and {}", MAX_THREADS);
        }
        if self.gap_opening_penalty < 0
            || self.gap_extension_penalty < 0
            || self.gap_opening_penalty + self.gap_extension_penalty < 1
        {
            bail!("Gap penalties must be non-negative and sum to at least 1");
        }
        if self.match_reward < 1 {
            bail!("Match reward (-m) must be at least 1");
        }
        if self.mismatch_penalty < 1 {
            bail!("Mismatch penalty (-p) must be at least 1");
        }
        Ok(())
    }

    /// Normalized cost triple for the alignment engines.
    pub fn costs(&self) -> Result<CostSet> {
        CostSet::from_scores(
            self.match_reward,
            -self.mismatch_penalty,
            self.gap_opening_penalty,
            self.gap_extension_penalty,
        )
    }

    pub fn abundance_style(&self) -> AbundanceStyle {
        if self.usearch_abundance {
            AbundanceStyle::Usearch
        } else {
            AbundanceStyle::Trailing
        }
    }

    /// The variant engine serves only resolution 1; any other resolution
    /// quietly keeps the alignment kernel.
    pub fn use_unit_engine(&self) -> bool {
        self.alternative_algorithm && self.resolution == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_scores_convert_to_the_reduced_triple() {
        let c = Config::default().costs().unwrap();
        assert_eq!(
            (c.mismatch, c.gap_open, c.gap_extend, c.divisor),
            (9, 12, 7, 2)
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut c = Config {
            resolution: 0,
            ..Config::default()
        };
        assert!(c.validate().is_err());

        c = Config {
            threads: 0,
            ..Config::default()
        };
        assert!(c.validate().is_err());
        c.threads = MAX_THREADS + 1;
        assert!(c.validate().is_err());

        c = Config {
            gap_opening_penalty: 0,
            gap_extension_penalty: 0,
            ..Config::default()
        };
        assert!(c.validate().is_err());

        c = Config {
            match_reward: 0,
            ..Config::default()
        };
        assert!(c.validate().is_err());

        c = Config {
            mismatch_penalty: 0,
            ..Config::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn unit_engine_needs_both_the_flag_and_resolution_one() {
        let mut c = Config {
            alternative_algorithm: true,
            ..Config::default()
        };
        assert!(c.use_unit_engine());
        c.resolution = 2;
        assert!(!c.use_unit_engine());
        c.resolution = 1;
        c.alternative_algorithm = false;
        assert!(!c.use_unit_engine());
    }
}
