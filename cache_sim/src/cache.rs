use serde::{Deserialize, Serialize};

use crate::{
    addr::{compose, Addr, Decoded, Geometry},
    metrics::LevelStats,
    set::CacheSet,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Every write goes to the backing store immediately; blocks never get dirty.
    WriteThrough,
    /// Writes stay in the cache until the dirty block is evicted.
    #[default]
    WriteBack,
}

impl WritePolicy {
    fn tracks_dirty(self) -> bool {
        self == WritePolicy::WriteBack
    }
}

/// How a write is credited in the statistics. The cache state after the
/// access is the same in both modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAccounting {
    /// A write is a hit iff the tag was resident.
    #[default]
    Lookup,
    /// Every write is counted as a miss.
    AlwaysMiss,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    /// Raw tag lookup result.
    pub hit: bool,
    /// Result as recorded in the level's counters.
    pub credited_hit: bool,
    /// Base address of a dirty victim flushed by this access.
    pub write_back: Option<Addr>,
}

#[derive(Clone, Copy)]
enum Op {
    Read,
    Write,
}

/// A single set-associative cache level with LRU replacement.
pub struct Cache {
    geometry: Geometry,
    sets: Vec<CacheSet>,
    policy: WritePolicy,
    accounting: WriteAccounting,
    /// last stamp handed out; `0` is reserved for invalid blocks
    clock: u64,
    stats: LevelStats,
}

impl Cache {
    pub fn new(geometry: Geometry, policy: WritePolicy) -> Self {
        log::debug!("new {policy:?} cache: {geometry}");
        Self {
            geometry,
            sets: (0..geometry.num_sets())
                .map(|_| CacheSet::new(geometry.associativity() as usize))
                .collect(),
            policy,
            accounting: WriteAccounting::default(),
            clock: 0,
            stats: LevelStats::default(),
        }
    }
    pub fn with_accounting(mut self, accounting: WriteAccounting) -> Self {
        self.accounting = accounting;
        self
    }
    pub fn stats(&self) -> &LevelStats {
        &self.stats
    }
    pub fn sets(&self) -> &[CacheSet] {
        &self.sets
    }

    pub fn read(&mut self, addr: Addr) -> Access {
        self.access(addr, Op::Read)
    }

    pub fn write(&mut self, addr: Addr) -> Access {
        self.access(addr, Op::Write)
    }

    /// Lookup without touching replacement state or counters.
    pub fn contains(&self, addr: Addr) -> bool {
        let Decoded { set_index, tag } = self.geometry.decode(addr);
        self.sets[set_index].find(tag).is_some()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn access(&mut self, addr: Addr, op: Op) -> Access {
        let Decoded { set_index, tag } = self.geometry.decode(addr);
        let stamp = self.tick();
        let dirty = matches!(op, Op::Write) && self.policy.tracks_dirty();
        let (block_size, num_sets) = (self.geometry.block_size(), self.geometry.num_sets());
        let set = &mut self.sets[set_index];
        let (hit, write_back) = match set.find(tag) {
            Some(slot) => {
                if dirty {
                    set.mark_dirty(slot);
                }
                set.touch(slot, stamp);
                (true, None)
            }
            None => {
                let slot = set.select_victim();
                let write_back = set
                    .install(slot, tag, dirty, stamp)
                    .filter(|victim| victim.dirty)
                    .map(|victim| {
                        let victim = Decoded {
                            set_index,
                            tag: victim.tag,
                        };
                        compose(victim, 0, block_size, num_sets)
                    });
                (false, write_back)
            }
        };
        let credited_hit = match (op, self.accounting) {
            (Op::Write, WriteAccounting::AlwaysMiss) => false,
            _ => hit,
        };
        self.stats.record(credited_hit);
        if write_back.is_some() {
            self.stats.record_write_back();
        }
        Access {
            hit,
            credited_hit,
            write_back,
        }
    }
}
