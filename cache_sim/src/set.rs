/// One slot of a set. `recency` holds the cache clock value of the last hit
/// or fill; an invalid block keeps `0`, which the clock never hands out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub valid: bool,
    pub tag: Option<u64>,
    pub dirty: bool,
    pub recency: u64,
}

impl Block {
    fn holds(&self, tag: u64) -> bool {
        self.valid && self.tag == Some(tag)
    }
}

/// Block evicted to make room for a fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evicted {
    pub tag: u64,
    pub dirty: bool,
}

pub struct CacheSet {
    blocks: Vec<Block>,
}

impl CacheSet {
    pub fn new(associativity: usize) -> Self {
        Self {
            blocks: vec![Block::default(); associativity],
        }
    }

    /// Slot index of the valid block holding `tag`. Slots are scanned in
    /// ascending order.
    pub fn find(&self, tag: u64) -> Option<usize> {
        self.blocks.iter().position(|b| b.holds(tag))
    }

    /// Invalid slots come first (lowest index), then the least recently used
    /// valid slot. Ties go to the lowest index.
    pub fn select_victim(&self) -> usize {
        self.blocks
            .iter()
            .enumerate()
            .min_by_key(|&(i, b)| (b.valid, b.recency, i))
            .map(|(i, _)| i)
            .unwrap_or_default()
    }

    pub fn touch(&mut self, slot: usize, stamp: u64) {
        self.blocks[slot].recency = stamp;
    }

    pub fn mark_dirty(&mut self, slot: usize) {
        self.blocks[slot].dirty = true;
    }

    /// Overwrites `slot` with a fresh block for `tag` and returns what was
    /// there before, if it was valid.
    pub fn install(&mut self, slot: usize, tag: u64, dirty: bool, stamp: u64) -> Option<Evicted> {
        let old = std::mem::replace(
            &mut self.blocks[slot],
            Block {
                valid: true,
                tag: Some(tag),
                dirty,
                recency: stamp,
            },
        );
        old.valid.then(|| Evicted {
            tag: old.tag.unwrap_or_default(),
            dirty: old.dirty,
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn num_valid(&self) -> usize {
        self.blocks.iter().filter(|b| b.valid).count()
    }
}
