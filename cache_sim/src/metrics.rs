use serde::{Deserialize, Serialize};

/// Per-level counters. `hits + misses` is the number of accesses the level
/// has seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    pub hits: u64,
    pub misses: u64,
    pub write_backs: u64,
}

impl LevelStats {
    pub fn record(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }
    pub fn record_write_back(&mut self) {
        self.write_backs += 1;
    }
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }
    /// `0.0` for a level that was never accessed.
    pub fn miss_rate(&self) -> f64 {
        match self.accesses() {
            0 => 0.,
            n => self.misses as f64 / n as f64,
        }
    }
    /// `0.0` for a level that was never accessed.
    pub fn hit_rate(&self) -> f64 {
        match self.accesses() {
            0 => 0.,
            _ => 1. - self.miss_rate(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HierarchyStats {
    pub l1i: LevelStats,
    pub l1d: LevelStats,
    pub l2: Option<LevelStats>,
}

/// How the instruction and data miss rates merge into the single L1 miss
/// rate fed to the second level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissRateCombine {
    /// Plain average of the two rates.
    #[default]
    Mean,
    /// Misses over accesses of both caches together.
    Pooled,
}

impl MissRateCombine {
    pub fn combine(self, l1i: &LevelStats, l1d: &LevelStats) -> f64 {
        match self {
            MissRateCombine::Mean => (l1i.miss_rate() + l1d.miss_rate()) / 2.,
            MissRateCombine::Pooled => {
                let pooled = LevelStats {
                    hits: l1i.hits + l1d.hits,
                    misses: l1i.misses + l1d.misses,
                    write_backs: 0,
                };
                pooled.miss_rate()
            }
        }
    }
}

/// Latency parameters in cycles. Configuration, never cache state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Latency {
    /// H1
    pub hit_time: f64,
    /// H2
    pub l2_hit_time: f64,
    /// M
    pub miss_penalty: f64,
}

impl Default for Latency {
    fn default() -> Self {
        Self {
            hit_time: 1.,
            l2_hit_time: 10.,
            miss_penalty: 100.,
        }
    }
}

impl Latency {
    /// `H1 + missRate * M`
    pub fn single_level_amat(&self, level: &LevelStats) -> f64 {
        self.hit_time + level.miss_rate() * self.miss_penalty
    }
    /// `H1 + missRate(L1) * (H2 + missRate(L2) * M)`
    pub fn hierarchical_amat(&self, l1_miss_rate: f64, l2: &LevelStats) -> f64 {
        self.hit_time + l1_miss_rate * (self.l2_hit_time + l2.miss_rate() * self.miss_penalty)
    }
}

#[cfg(feature = "stat")]
mod stat {
    use std::fmt;

    use super::*;
    use crate::stat::*;

    const COLUMN_WIDTH: usize = 14;
    const LABEL_WIDTH: usize = 14;

    impl Stat for HierarchyStats {
        fn view(&self, max_width: usize) -> Box<dyn StatView + '_> {
            Box::new(HierarchyStatView::new(self, max_width))
        }
    }

    pub struct HierarchyStatView<'a> {
        stat: &'a HierarchyStats,
        side_by_side: bool,
    }

    impl<'a> HierarchyStatView<'a> {
        pub fn new(stat: &'a HierarchyStats, max_width: usize) -> Self {
            let mut view = Self {
                stat,
                side_by_side: true,
            };
            view.side_by_side = view.table_width() <= max_width;
            view
        }
        fn levels(&self) -> Vec<(&'static str, &'a LevelStats)> {
            let mut levels = vec![("L1I", &self.stat.l1i), ("L1D", &self.stat.l1d)];
            if let Some(l2) = &self.stat.l2 {
                levels.push(("L2", l2));
            }
            levels
        }
        fn table_width(&self) -> usize {
            LABEL_WIDTH + self.levels().len() * COLUMN_WIDTH
        }
    }

    impl StatView for HierarchyStatView<'_> {
        fn header(&self) -> &'static str {
            "cache stat"
        }
        fn width(&self) -> usize {
            if self.side_by_side {
                self.table_width()
            } else {
                33
            }
        }
    }

    fn pct(v: f64) -> String {
        format!("{:.4}", 100. * v)
    }

    impl fmt::Display for HierarchyStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let levels = self.levels();
            if self.side_by_side {
                write!(f, "{:>LABEL_WIDTH$}", "")?;
                for (name, _) in &levels {
                    write!(f, "{name:>COLUMN_WIDTH$}")?;
                }
                writeln!(f)?;
                let rows: [(&str, fn(&LevelStats) -> String); 4] = [
                    ("hit", |s| s.hits.to_string()),
                    ("miss", |s| s.misses.to_string()),
                    ("hit rate (%)", |s| pct(s.hit_rate())),
                    ("write-back", |s| s.write_backs.to_string()),
                ];
                for (label, cell) in rows {
                    write!(f, "{label:>LABEL_WIDTH$}")?;
                    for (_, s) in &levels {
                        write!(f, "{:>COLUMN_WIDTH$}", cell(s))?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            } else {
                for (name, s) in levels {
                    let hit_pct = pct(s.hit_rate());
                    let miss_pct = pct(s.miss_rate());
                    writeln!(f, "  {name}")?;
                    writeln!(f, "          hit: {:>10} ({hit_pct:>8}%)", s.hits)?;
                    writeln!(f, "         miss: {:>10} ({miss_pct:>8}%)", s.misses)?;
                    writeln!(f, "   write-back: {:>10}", s.write_backs)?;
                }
                Ok(())
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_view_layout() {
            let stats = HierarchyStats {
                l1i: LevelStats {
                    hits: 3,
                    misses: 1,
                    write_backs: 0,
                },
                l1d: LevelStats::default(),
                l2: Some(LevelStats::default()),
            };
            let wide = stats.view(120);
            assert_eq!(LABEL_WIDTH + 3 * COLUMN_WIDTH, wide.width());
            let s = format!("{wide}");
            assert!(s.lines().next().unwrap().ends_with("L2"));
            assert!(s.contains("75.0000"));
            let narrow = stats.view(20);
            assert_eq!(33, narrow.width());
            assert!(format!("{narrow}").contains("  L1D\n"));
        }
    }
}
