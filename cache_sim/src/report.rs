use std::fmt;

use anyhow::Result;
use serde::Serialize;

use crate::{
    config::SweepPoint,
    metrics::{HierarchyStats, Latency, LevelStats, MissRateCombine},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelReport {
    pub accesses: u64,
    pub misses: u64,
    pub write_backs: u64,
    pub hit_rate: f64,
    pub amat: f64,
}

impl LevelReport {
    fn new(stats: &LevelStats, amat: f64) -> Self {
        Self {
            accesses: stats.accesses(),
            misses: stats.misses,
            write_backs: stats.write_backs,
            hit_rate: stats.hit_rate(),
            amat,
        }
    }
}

/// Result of one sweep point, ready for the report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepRecord {
    pub associativity: u64,
    pub block_size: u64,
    pub l1i: LevelReport,
    pub l1d: LevelReport,
    /// Carries the hierarchical AMAT.
    pub l2: Option<LevelReport>,
}

impl SweepRecord {
    pub fn new(
        point: SweepPoint,
        stats: &HierarchyStats,
        latency: &Latency,
        combine: MissRateCombine,
    ) -> Self {
        let l2 = stats.l2.map(|l2| {
            let l1_miss_rate = combine.combine(&stats.l1i, &stats.l1d);
            LevelReport::new(&l2, latency.hierarchical_amat(l1_miss_rate, &l2))
        });
        Self {
            associativity: point.associativity,
            block_size: point.block_size,
            l1i: LevelReport::new(&stats.l1i, latency.single_level_amat(&stats.l1i)),
            l1d: LevelReport::new(&stats.l1d, latency.single_level_amat(&stats.l1d)),
            l2,
        }
    }
}

impl fmt::Display for SweepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "assoc {:>3} / block {:>4} B: L1I hit {:.4} AMAT {:.2}, L1D hit {:.4} AMAT {:.2}",
            self.associativity,
            self.block_size,
            self.l1i.hit_rate,
            self.l1i.amat,
            self.l1d.hit_rate,
            self.l1d.amat
        )?;
        if let Some(l2) = &self.l2 {
            write!(f, ", L2 hit {:.4} AMAT {:.2}", l2.hit_rate, l2.amat)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Row {
    #[serde(rename = "Assoc.")]
    associativity: u64,
    #[serde(rename = "Block size")]
    block_size: u64,
    #[serde(rename = "L1I accesses")]
    l1i_accesses: u64,
    #[serde(rename = "L1I misses")]
    l1i_misses: u64,
    #[serde(rename = "L1I hit rate")]
    l1i_hit_rate: String,
    #[serde(rename = "L1I AMAT")]
    l1i_amat: String,
    #[serde(rename = "L1D accesses")]
    l1d_accesses: u64,
    #[serde(rename = "L1D misses")]
    l1d_misses: u64,
    #[serde(rename = "L1D hit rate")]
    l1d_hit_rate: String,
    #[serde(rename = "L1D AMAT")]
    l1d_amat: String,
    #[serde(rename = "L1D write-backs")]
    l1d_write_backs: u64,
    #[serde(rename = "L2 accesses")]
    l2_accesses: Option<u64>,
    #[serde(rename = "L2 misses")]
    l2_misses: Option<u64>,
    #[serde(rename = "L2 hit rate")]
    l2_hit_rate: Option<String>,
    #[serde(rename = "L2 AMAT")]
    l2_amat: Option<String>,
    #[serde(rename = "L2 write-backs")]
    l2_write_backs: Option<u64>,
}

fn rate(v: f64) -> String {
    format!("{v:.4}")
}

fn amat(v: f64) -> String {
    format!("{v:.2}")
}

impl From<&SweepRecord> for Row {
    fn from(r: &SweepRecord) -> Self {
        Self {
            associativity: r.associativity,
            block_size: r.block_size,
            l1i_accesses: r.l1i.accesses,
            l1i_misses: r.l1i.misses,
            l1i_hit_rate: rate(r.l1i.hit_rate),
            l1i_amat: amat(r.l1i.amat),
            l1d_accesses: r.l1d.accesses,
            l1d_misses: r.l1d.misses,
            l1d_hit_rate: rate(r.l1d.hit_rate),
            l1d_amat: amat(r.l1d.amat),
            l1d_write_backs: r.l1d.write_backs,
            l2_accesses: r.l2.map(|l2| l2.accesses),
            l2_misses: r.l2.map(|l2| l2.misses),
            l2_hit_rate: r.l2.map(|l2| rate(l2.hit_rate)),
            l2_amat: r.l2.map(|l2| amat(l2.amat)),
            l2_write_backs: r.l2.map(|l2| l2.write_backs),
        }
    }
}

pub fn write_csv(out: impl std::io::Write, records: &[SweepRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for r in records {
        writer.serialize(Row::from(r))?;
    }
    writer.flush()?;
    Ok(())
}
