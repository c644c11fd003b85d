use crate::{
    addr::GeometryError,
    hierarchy::{CacheHierarchy, HierarchyConfig, RefOutcome, Reference},
    metrics::HierarchyStats,
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

#[cfg(feature = "stat")]
pub use self::stat::SimStat;

/// Replays a trace against one freshly built hierarchy.
pub struct Simulator {
    hierarchy: CacheHierarchy,
    references: usize,
    #[cfg(feature = "stat")]
    stat_builder: stat::SimStatBuilder,
}

impl Simulator {
    pub fn new(config: &HierarchyConfig) -> Result<Self, GeometryError> {
        Ok(Self {
            hierarchy: CacheHierarchy::new(config)?,
            references: 0,
            #[cfg(feature = "stat")]
            stat_builder: stat::SimStatBuilder::new(),
        })
    }
    pub fn step(&mut self, r: Reference) -> RefOutcome {
        self.references += 1;
        self.hierarchy.access(r)
    }
    pub fn run(&mut self, trace: &[Reference]) {
        self.references += self.hierarchy.run(trace);
        self.exit_sim();
    }
    pub fn exit_sim(&mut self) {
        #[cfg(feature = "stat")]
        {
            self.stat_builder.references(self.references);
            self.stat_builder.stop_timer();
        }
    }
    pub fn references(&self) -> usize {
        self.references
    }
    pub fn stats(&self) -> HierarchyStats {
        self.hierarchy.stats()
    }
}

#[cfg(feature = "stat")]
impl Simulator {
    pub fn sim_stat(&self) -> SimStat {
        self.stat_builder.finish()
    }
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(self.sim_stat()));
        buf.push(Box::new(self.stats()));
    }
}

#[cfg(feature = "stat")]
mod stat {
    use std::{fmt, time};

    use crate::stat::*;

    pub struct SimStatBuilder {
        begin: time::Instant,
        references: Option<usize>,
        elapsed: Option<time::Duration>,
    }

    impl SimStatBuilder {
        pub fn new() -> Self {
            Self {
                begin: time::Instant::now(),
                references: None,
                elapsed: None,
            }
        }
        pub fn references(&mut self, references: usize) {
            self.references = Some(references)
        }
        pub fn stop_timer(&mut self) {
            self.elapsed = Some(time::Instant::now() - self.begin)
        }
        /// Unfinished runs report the time elapsed so far.
        pub fn finish(&self) -> SimStat {
            SimStat {
                references: self.references.unwrap_or_default(),
                elapsed: self.elapsed.unwrap_or_else(|| self.begin.elapsed()),
            }
        }
    }

    impl Default for SimStatBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    #[derive(Clone, Copy, Debug)]
    pub struct SimStat {
        pub references: usize,
        pub elapsed: time::Duration,
    }

    impl Stat for SimStat {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
    }

    impl StatView for &'_ SimStat {
        fn header(&self) -> &'static str {
            "simulator stat"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for &'_ SimStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let ms = format!("{} ms", self.elapsed.as_millis());
            writeln!(f, "  elapsed total: {ms:>9}")?;
            let references = format!("#{}", self.references);
            writeln!(f, "  references total: {references:>10}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        addr::LevelConfig,
        cache::{WriteAccounting, WritePolicy},
        hierarchy::RefKind,
    };

    fn config() -> HierarchyConfig {
        let l1 = LevelConfig {
            size: 1024,
            block_size: 32,
            associativity: 2,
        };
        HierarchyConfig {
            policy: WritePolicy::WriteBack,
            accounting: WriteAccounting::Lookup,
            l1i: l1,
            l1d: l1,
            l2: Some(LevelConfig {
                size: 16384,
                block_size: 128,
                associativity: 4,
            }),
        }
    }

    #[test]
    fn test_run() {
        let trace: Vec<_> = (0u64..64)
            .flat_map(|i| {
                [
                    Reference::new(RefKind::InstrFetch, 0x400000 + 4 * i),
                    Reference::new(RefKind::DataRead, 0x10000000 + 64 * i),
                    Reference::new(RefKind::DataWrite, 0x10000000 + 64 * i + 8),
                ]
            })
            .collect();
        let mut sim = Simulator::new(&config()).unwrap();
        sim.run(&trace);
        assert_eq!(trace.len(), sim.references());
        let stats = sim.stats();
        assert_eq!(64, stats.l1i.accesses());
        assert_eq!(128, stats.l1d.accesses());
        // 4-byte fetches over 32-byte blocks: one miss per block
        assert_eq!(8, stats.l1i.misses);
        // the write always follows the read of the same block
        assert_eq!(64, stats.l1d.hits);
        assert_eq!(stats.l1i.misses + stats.l1d.misses, stats.l2.unwrap().accesses());
    }
    #[test]
    fn test_fresh_state_per_simulator() {
        let trace = [Reference::new(RefKind::DataRead, 0x40)];
        let mut a = Simulator::new(&config()).unwrap();
        a.run(&trace);
        a.run(&trace);
        let mut b = Simulator::new(&config()).unwrap();
        b.run(&trace);
        assert_eq!(1, a.stats().l1d.hits);
        assert_eq!(0, b.stats().l1d.hits);
    }
    #[cfg(feature = "stat")]
    #[test]
    fn test_collect_stat() {
        let mut sim = Simulator::new(&config()).unwrap();
        sim.step(Reference::new(RefKind::InstrFetch, 0x0));
        sim.exit_sim();
        assert_eq!(1, sim.sim_stat().references);
        assert_eq!(2, sim.collect_stat().len());
    }
}
