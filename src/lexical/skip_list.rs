//! Multi-level skip lists over postings.
//!
//! Level 0 holds one record every `skip_0` keys; each higher level holds one
//! record for every `skip_n` records of the level below. Record payloads
//! are written and decoded by caller-supplied callbacks, so the skip list
//! only knows how many bytes they occupy.
//!
//! ```text
//! level 2: [c|p]                                     one per skip_0 * skip_n^2 keys
//! level 1: [c|p]            [c|p]            [c|p]   one per skip_0 * skip_n keys
//! level 0: [p][p][p][p][p]..[p][p][p][p][p]..[p]     one per skip_0 keys
//! ```
//!
//! `c` is the offset of the matching record one level down, `p` the payload.
//!
//! Serialized form: `[num_levels: vint]` followed, from the highest level to
//! level 0, by `[byte_length: vlong][level bytes]`.

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};

pub mod reader;
pub mod writer;

pub use reader::{ReaderState, SkipReader};
pub use writer::{SkipWriter, WriterState};

/// Skip list geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipConfig {
    /// Keys between consecutive level 0 records.
    pub skip_0: u64,

    /// Fan-in between consecutive levels.
    pub skip_n: u64,

    /// Upper bound on the number of levels.
    pub max_levels: usize,
}

impl Default for SkipConfig {
    fn default() -> Self {
        SkipConfig {
            skip_0: 128,
            skip_n: 8,
            max_levels: 10,
        }
    }
}

impl SkipConfig {
    pub fn validate(&self) -> Result<()> {
        if self.skip_0 == 0 {
            return Err(PilumError::invalid_config("skip_0 must be positive"));
        }
        if self.skip_n < 2 {
            return Err(PilumError::invalid_config(format!(
                "skip_n must be at least 2, got {}",
                self.skip_n
            )));
        }
        Ok(())
    }
}

/// Keys covered by one record at `level`.
pub(crate) fn level_step(skip_0: u64, skip_n: u64, level: usize) -> u64 {
    let factor = u32::try_from(level)
        .ok()
        .and_then(|exp| skip_n.checked_pow(exp))
        .unwrap_or(u64::MAX);
    skip_0.saturating_mul(factor)
}

/// Levels needed to index `count` keys, capped at `max_levels`.
pub fn num_levels(skip_0: u64, skip_n: u64, max_levels: usize, count: u64) -> usize {
    if skip_0 == 0 || count < skip_0 {
        return 0;
    }
    let mut blocks = count / skip_0;
    let mut levels = 1;
    while blocks >= skip_n && levels < max_levels {
        blocks /= skip_n;
        levels += 1;
    }
    levels.min(max_levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_levels() {
        assert_eq!(num_levels(8, 8, 10, 0), 0);
        assert_eq!(num_levels(8, 8, 10, 7), 0);
        assert_eq!(num_levels(8, 8, 10, 8), 1);
        assert_eq!(num_levels(8, 8, 10, 63), 1);
        assert_eq!(num_levels(8, 8, 10, 64), 2);
        assert_eq!(num_levels(8, 8, 10, 1932), 3);
        assert_eq!(num_levels(8, 8, 2, 1932), 2);
        assert_eq!(num_levels(128, 8, 10, u64::MAX), 10);
    }

    #[test]
    fn test_level_step() {
        assert_eq!(level_step(8, 8, 0), 8);
        assert_eq!(level_step(8, 8, 2), 512);
        assert_eq!(level_step(128, 8, 40), u64::MAX);
    }

    #[test]
    fn test_config() {
        assert!(SkipConfig::default().validate().is_ok());
        let config: SkipConfig = serde_json::from_str(r#"{"skip_0": 16}"#).unwrap();
        assert_eq!(config.skip_0, 16);
        assert_eq!(config.skip_n, 8);

        let bad = SkipConfig {
            skip_n: 1,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
