use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    addr::LevelConfig,
    cache::{WriteAccounting, WritePolicy},
    hierarchy::HierarchyConfig,
    metrics::{Latency, MissRateCombine},
};

pub const DEFAULT_ASSOCIATIVITIES: [u64; 6] = [1, 2, 4, 8, 16, 32];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("an L2 sweep needs an `l2` level in the configuration")]
    MissingL2,
    #[error("no associativity to sweep")]
    NoAssociativity,
}

/// Which level the sweep axis varies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepTarget {
    /// Both first-level caches get the swept geometry.
    #[default]
    L1,
    /// Only the shared second level is swept; first levels stay fixed.
    L2,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepAxis {
    #[serde(default)]
    pub target: SweepTarget,
    pub associativities: Vec<u64>,
    /// Empty keeps the target level's configured block size.
    #[serde(default)]
    pub block_sizes: Vec<u64>,
}

/// One `(associativity, block size)` point of a sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepPoint {
    pub associativity: u64,
    pub block_size: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub policy: WritePolicy,
    #[serde(default)]
    pub accounting: WriteAccounting,
    pub l1: LevelConfig,
    #[serde(default)]
    pub l2: Option<LevelConfig>,
    #[serde(default)]
    pub latency: Latency,
    #[serde(default)]
    pub combine: MissRateCombine,
    pub sweep: SweepAxis,
}

impl SweepConfig {
    /// Split L1 caches only, associativity swept.
    pub fn l1_default() -> Self {
        Self {
            policy: WritePolicy::default(),
            accounting: WriteAccounting::default(),
            l1: LevelConfig {
                size: 1024,
                block_size: 32,
                associativity: 1,
            },
            l2: None,
            latency: Latency::default(),
            combine: MissRateCombine::default(),
            sweep: SweepAxis {
                target: SweepTarget::L1,
                associativities: DEFAULT_ASSOCIATIVITIES.to_vec(),
                block_sizes: Vec::new(),
            },
        }
    }

    /// 2-way L1 caches in front of a shared L2 whose associativity is swept.
    pub fn l2_default() -> Self {
        let mut config = Self::l1_default();
        config.l1.associativity = 2;
        config.l2 = Some(LevelConfig {
            size: 16384,
            block_size: 128,
            associativity: 1,
        });
        config.sweep.target = SweepTarget::L2;
        config
    }

    pub fn deser(file: impl std::io::Read) -> Result<Self> {
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks what geometry validation cannot see: the swept level must exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep.target == SweepTarget::L2 && self.l2.is_none() {
            return Err(ConfigError::MissingL2);
        }
        if self.sweep.associativities.is_empty() {
            return Err(ConfigError::NoAssociativity);
        }
        Ok(())
    }

    pub fn points(&self) -> Vec<SweepPoint> {
        let base = match self.sweep.target {
            SweepTarget::L1 => self.l1.block_size,
            SweepTarget::L2 => self.l2.map_or(self.l1.block_size, |l2| l2.block_size),
        };
        let block_sizes = if self.sweep.block_sizes.is_empty() {
            vec![base]
        } else {
            self.sweep.block_sizes.clone()
        };
        block_sizes
            .iter()
            .flat_map(|&block_size| {
                self.sweep
                    .associativities
                    .iter()
                    .map(move |&associativity| SweepPoint {
                        associativity,
                        block_size,
                    })
            })
            .collect()
    }

    /// Concrete configuration for one point. Geometry is validated later,
    /// when the hierarchy is built.
    pub fn hierarchy(&self, point: SweepPoint) -> HierarchyConfig {
        let swept = |level: LevelConfig| LevelConfig {
            associativity: point.associativity,
            block_size: point.block_size,
            ..level
        };
        let (l1, l2) = match self.sweep.target {
            SweepTarget::L1 => (swept(self.l1), self.l2),
            SweepTarget::L2 => (self.l1, self.l2.map(swept)),
        };
        HierarchyConfig {
            policy: self.policy,
            accounting: self.accounting,
            l1i: l1,
            l1d: l1,
            l2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points() {
        let mut c = SweepConfig::l1_default();
        assert_eq!(6, c.points().len());
        assert!(c.points().iter().all(|p| p.block_size == 32));
        c.sweep.block_sizes = vec![16, 64];
        c.sweep.associativities = vec![1, 2];
        let points: Vec<_> = c
            .points()
            .into_iter()
            .map(|p| (p.block_size, p.associativity))
            .collect();
        assert_eq!(vec![(16, 1), (16, 2), (64, 1), (64, 2)], points);
    }
    #[test]
    fn test_hierarchy_l1_target() {
        let c = SweepConfig::l1_default();
        let h = c.hierarchy(SweepPoint {
            associativity: 8,
            block_size: 64,
        });
        assert_eq!(8, h.l1i.associativity);
        assert_eq!(64, h.l1d.block_size);
        assert_eq!(1024, h.l1d.size);
        assert_eq!(None, h.l2);
    }
    #[test]
    fn test_hierarchy_l2_target() {
        let c = SweepConfig::l2_default();
        let p = c.points()[3];
        assert_eq!(128, p.block_size);
        let h = c.hierarchy(p);
        assert_eq!(2, h.l1i.associativity);
        assert_eq!(32, h.l1i.block_size);
        assert_eq!(8, h.l2.unwrap().associativity);
    }
    #[test]
    fn test_deser() {
        let json = r#"{
            "policy": "write_through",
            "accounting": "always_miss",
            "l1": { "size": 2048, "block_size": 64, "associativity": 1 },
            "latency": { "hit_time": 2.0, "l2_hit_time": 12.0, "miss_penalty": 80.0 },
            "sweep": { "associativities": [1, 4] }
        }"#;
        let c = SweepConfig::deser(json.as_bytes()).unwrap();
        assert_eq!(WritePolicy::WriteThrough, c.policy);
        assert_eq!(WriteAccounting::AlwaysMiss, c.accounting);
        assert_eq!(MissRateCombine::Mean, c.combine);
        assert_eq!(SweepTarget::L1, c.sweep.target);
        assert_eq!(80., c.latency.miss_penalty);
        assert_eq!(2, c.points().len());
        assert!(SweepConfig::deser("{}".as_bytes()).is_err());
    }
    #[test]
    fn test_validate() {
        assert_eq!(Ok(()), SweepConfig::l1_default().validate());
        assert_eq!(Ok(()), SweepConfig::l2_default().validate());
        let mut c = SweepConfig::l1_default();
        c.sweep.target = SweepTarget::L2;
        assert_eq!(Err(ConfigError::MissingL2), c.validate());
        let mut c = SweepConfig::l1_default();
        c.sweep.associativities.clear();
        assert_eq!(Err(ConfigError::NoAssociativity), c.validate());
        let json = r#"{
            "l1": { "size": 1024, "block_size": 32, "associativity": 1 },
            "sweep": { "target": "l2", "associativities": [1, 2] }
        }"#;
        let e = SweepConfig::deser(json.as_bytes()).unwrap_err();
        assert_eq!(Some(&ConfigError::MissingL2), e.downcast_ref::<ConfigError>());
    }
}
