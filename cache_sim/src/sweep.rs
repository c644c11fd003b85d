use crate::{
    addr::GeometryError,
    config::{ConfigError, SweepConfig, SweepPoint},
    hierarchy::Reference,
    metrics::HierarchyStats,
    report::SweepRecord,
    sim::Simulator,
};

#[cfg(feature = "stat")]
use crate::{
    sim::SimStat,
    stat::{AddStats, Stats},
};

pub struct SweepRun {
    pub record: SweepRecord,
    pub stats: HierarchyStats,
    #[cfg(feature = "stat")]
    pub sim: SimStat,
}

#[cfg(feature = "stat")]
impl AddStats for SweepRun {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(self.sim));
        buf.push(Box::new(self.stats));
    }
}

pub struct SweepOutcome {
    pub point: SweepPoint,
    pub result: Result<SweepRun, GeometryError>,
}

/// Simulates a single point on its own hierarchy.
pub fn run_point(config: &SweepConfig, point: SweepPoint, trace: &[Reference]) -> SweepOutcome {
    let result = Simulator::new(&config.hierarchy(point)).map(|mut sim| {
        sim.run(trace);
        let stats = sim.stats();
        let record = SweepRecord::new(point, &stats, &config.latency, config.combine);
        log::info!("{record}");
        SweepRun {
            record,
            stats,
            #[cfg(feature = "stat")]
            sim: sim.sim_stat(),
        }
    });
    SweepOutcome { point, result }
}

/// Runs every point of the sweep against the same in-memory trace. Points
/// share no state; with `parallel` they run on the rayon pool. Outcomes keep
/// sweep order. A configuration that fails validation runs no point.
pub fn run(config: &SweepConfig, trace: &[Reference]) -> Result<Vec<SweepOutcome>, ConfigError> {
    config.validate()?;
    let points = config.points();
    cfg_if::cfg_if! {
        if #[cfg(feature = "parallel")] {
            use rayon::prelude::*;
            let outcomes = points
                .into_par_iter()
                .map(|point| run_point(config, point, trace))
                .collect();
        } else {
            let outcomes = points
                .into_iter()
                .map(|point| run_point(config, point, trace))
                .collect();
        }
    }
    Ok(outcomes)
}

/// Records of the points that ran. Points rejected at construction are
/// logged and left out.
pub fn records(outcomes: &[SweepOutcome]) -> Vec<SweepRecord> {
    outcomes
        .iter()
        .filter_map(|o| match &o.result {
            Ok(run) => Some(run.record),
            Err(e) => {
                log::warn!(
                    "skipped assoc {} / block {} B: {e}",
                    o.point.associativity,
                    o.point.block_size
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{addr::LevelConfig, cache::WritePolicy, config::SweepTarget, hierarchy::RefKind};

    fn trace() -> Vec<Reference> {
        // two blocks 1024 bytes apart, alternating: conflict in a direct-mapped
        // 1 KiB cache, no conflict with two ways
        (0..100)
            .map(|i| Reference::new(RefKind::DataRead, if i % 2 == 0 { 0x0 } else { 0x400 }))
            .collect()
    }

    #[test]
    fn test_sweep_associativity() {
        let mut config = SweepConfig::l1_default();
        config.sweep.associativities = vec![1, 2];
        let outcomes = run(&config, &trace()).unwrap();
        let records = records(&outcomes);
        assert_eq!(2, records.len());
        assert_eq!(1, records[0].associativity);
        assert_eq!(100, records[0].l1d.misses);
        assert_eq!(2, records[1].associativity);
        assert_eq!(2, records[1].l1d.misses);
        assert_eq!(0, records[1].l1i.accesses);
        assert!(records.iter().all(|r| r.l2.is_none()));
    }
    #[test]
    fn test_bad_point_isolated() {
        let mut config = SweepConfig::l1_default();
        config.sweep.associativities = vec![1, 64, 2];
        let outcomes = run(&config, &trace()).unwrap();
        assert_eq!(3, outcomes.len());
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(GeometryError::Indivisible { associativity: 64, .. })
        ));
        let records = records(&outcomes);
        assert_eq!(vec![1, 2], records.iter().map(|r| r.associativity).collect::<Vec<_>>());
        assert_eq!(2, records[1].l1d.misses);
    }
    #[test]
    fn test_oversized_point_isolated() {
        let mut config = SweepConfig::l2_default();
        config.l2 = config.l2.map(|l2| LevelConfig { size: 1 << 60, ..l2 });
        config.sweep.associativities = vec![1, 2];
        config.sweep.block_sizes = vec![1, 1 << 50];
        let outcomes = run(&config, &trace()).unwrap();
        assert_eq!(4, outcomes.len());
        assert!(outcomes[..2]
            .iter()
            .all(|o| matches!(o.result, Err(GeometryError::TooLarge { .. }))));
        let records = records(&outcomes);
        assert_eq!(2, records.len());
        assert!(records.iter().all(|r| r.block_size == 1 << 50));
        assert_eq!(2, records[0].l1d.misses);
    }
    #[test]
    fn test_missing_l2_rejected() {
        let mut config = SweepConfig::l1_default();
        config.sweep.target = SweepTarget::L2;
        assert_eq!(Some(ConfigError::MissingL2), run(&config, &trace()).err());
    }
    #[test]
    fn test_sweep_l2() {
        let mut config = SweepConfig::l2_default();
        config.policy = WritePolicy::WriteThrough;
        config.sweep.associativities = vec![1, 4];
        assert_eq!(SweepTarget::L2, config.sweep.target);
        let records = records(&run(&config, &trace()).unwrap());
        assert_eq!(2, records.len());
        for r in &records {
            // L1 is fixed at 2 ways: only the two compulsory misses reach L2
            assert_eq!(2, r.l1d.misses);
            let l2 = r.l2.unwrap();
            assert_eq!(2, l2.accesses);
            assert_eq!(2, l2.misses);
            assert_eq!(0, l2.write_backs);
        }
    }
}
