//! Engine configuration

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// How voxels are split between workers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Partition {
    /// One contiguous range of the flattened grid per worker
    #[default]
    Slice,
    /// x-columns handed out on demand, for better load balance when fit
    /// cost varies a lot between voxels
    Column,
}

impl FromStr for Partition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slice" | "slices" => Ok(Partition::Slice),
            "column" | "columns" => Ok(Partition::Column),
            _ => Err(ConfigError::InvalidSpec(format!("unknown partition mode '{}'", s))),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Slice => write!(f, "slice"),
            Partition::Column => write!(f, "column"),
        }
    }
}

/// Worker pool settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of workers (1 runs on the calling thread)
    pub threads: usize,
    pub partition: Partition,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            partition: Partition::Slice,
        }
    }
}

impl EngineConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidParameter("threads must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_from_str() {
        assert_eq!("slice".parse::<Partition>().unwrap(), Partition::Slice);
        assert_eq!("Column".parse::<Partition>().unwrap(), Partition::Column);
        assert!("rows".parse::<Partition>().is_err());
    }

    #[test]
    fn test_config_validate() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::default().with_threads(0).validate().is_err());
    }
}
