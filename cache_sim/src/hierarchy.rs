use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::{
    addr::{Addr, GeometryError, LevelConfig},
    cache::{Access, Cache, WriteAccounting, WritePolicy},
    metrics::HierarchyStats,
};

/// Reference type, numbered as in trace files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum RefKind {
    DataRead = 0,
    DataWrite = 1,
    InstrFetch = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reference {
    pub kind: RefKind,
    pub addr: Addr,
}

impl Reference {
    pub fn new(kind: RefKind, addr: u64) -> Self {
        Self {
            kind,
            addr: Addr::new(addr),
        }
    }
}

/// Geometry and policy of every level of one simulated configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    pub policy: WritePolicy,
    #[serde(default)]
    pub accounting: WriteAccounting,
    pub l1i: LevelConfig,
    pub l1d: LevelConfig,
    #[serde(default)]
    pub l2: Option<LevelConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefOutcome {
    pub l1: Access,
    /// Present iff the first level missed and a second level exists.
    pub l2: Option<Access>,
}

/// Split L1 instruction/data caches, optionally backed by a shared L2.
pub struct CacheHierarchy {
    l1i: Cache,
    l1d: Cache,
    l2: Option<Cache>,
}

impl CacheHierarchy {
    pub fn new(config: &HierarchyConfig) -> Result<Self, GeometryError> {
        let l1i = Cache::new(config.l1i.geometry()?, config.policy);
        let l1d = Cache::new(config.l1d.geometry()?, config.policy).with_accounting(config.accounting);
        let l2 = match config.l2 {
            Some(l2) => Some(Cache::new(l2.geometry()?, config.policy)),
            None => None,
        };
        Ok(Self { l1i, l1d, l2 })
    }

    pub fn l1i(&self) -> &Cache {
        &self.l1i
    }
    pub fn l1d(&self) -> &Cache {
        &self.l1d
    }
    pub fn l2(&self) -> Option<&Cache> {
        self.l2.as_ref()
    }

    /// Routes one reference. The first-level access fills the missing block
    /// itself (dirty for a write-back data write), then the shared level is
    /// read at the same address and fills on its own miss.
    pub fn access(&mut self, r: Reference) -> RefOutcome {
        let l1 = match r.kind {
            RefKind::InstrFetch => self.l1i.read(r.addr),
            RefKind::DataRead => self.l1d.read(r.addr),
            RefKind::DataWrite => self.l1d.write(r.addr),
        };
        let l2 = match &mut self.l2 {
            Some(l2) if !l1.hit => Some(l2.read(r.addr)),
            _ => None,
        };
        RefOutcome { l1, l2 }
    }

    pub fn run<'a>(&mut self, trace: impl IntoIterator<Item = &'a Reference>) -> usize {
        trace.into_iter().map(|&r| self.access(r)).count()
    }

    pub fn stats(&self) -> HierarchyStats {
        HierarchyStats {
            l1i: *self.l1i.stats(),
            l1d: *self.l1d.stats(),
            l2: self.l2.as_ref().map(|c| *c.stats()),
        }
    }
}
