use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(u64);

impl Addr {
    pub fn new(v: u64) -> Self {
        Self(v)
    }
    pub fn inner(self) -> u64 {
        self.0
    }
    pub fn disp(&self, amount: u64) -> Self {
        Self(self.0 + amount)
    }
}

impl Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("total size must be positive")]
    ZeroSize,
    #[error("block size must be positive")]
    ZeroBlockSize,
    #[error("associativity must be positive")]
    ZeroAssociativity,
    #[error("block size {block_size} x associativity {associativity} does not divide total size {total_size}")]
    Indivisible {
        total_size: u64,
        block_size: u64,
        associativity: u64,
    },
    #[error("{num_blocks} blocks exceed the simulated maximum of {max}")]
    TooLarge { num_blocks: u64, max: u64 },
}

/// Upper bound on blocks per level.
pub const MAX_BLOCKS: u64 = 1 << 24;

/// Shape of a single cache level. Only constructible through [`Geometry::new`],
/// so `num_sets * associativity * block_size == total_size` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    total_size: u64,
    block_size: u64,
    associativity: u64,
    num_sets: u64,
}

impl Geometry {
    pub fn new(total_size: u64, block_size: u64, associativity: u64) -> Result<Self, GeometryError> {
        if total_size == 0 {
            return Err(GeometryError::ZeroSize);
        }
        if block_size == 0 {
            return Err(GeometryError::ZeroBlockSize);
        }
        if associativity == 0 {
            return Err(GeometryError::ZeroAssociativity);
        }
        let set_bytes = block_size
            .checked_mul(associativity)
            .filter(|&b| b <= total_size && total_size % b == 0)
            .ok_or(GeometryError::Indivisible {
                total_size,
                block_size,
                associativity,
            })?;
        let num_blocks = total_size / block_size;
        if num_blocks > MAX_BLOCKS {
            return Err(GeometryError::TooLarge {
                num_blocks,
                max: MAX_BLOCKS,
            });
        }
        Ok(Self {
            total_size,
            block_size,
            associativity,
            num_sets: total_size / set_bytes,
        })
    }
    pub fn block_size(&self) -> u64 {
        self.block_size
    }
    pub fn associativity(&self) -> u64 {
        self.associativity
    }
    pub fn num_sets(&self) -> u64 {
        self.num_sets
    }
    pub fn decode(&self, addr: Addr) -> Decoded {
        decode(addr, self.block_size, self.num_sets)
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} B / {} B blocks / {}-way ({} sets)",
            self.total_size, self.block_size, self.associativity, self.num_sets
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub set_index: usize,
    pub tag: u64,
}

/// Splits `addr` into set index and tag. The block offset is dropped since
/// lookups happen at block granularity.
#[inline]
pub fn decode(addr: Addr, block_size: u64, num_sets: u64) -> Decoded {
    let block = addr.inner() / block_size;
    Decoded {
        set_index: (block % num_sets) as usize,
        tag: block / num_sets,
    }
}

/// Inverse of [`decode`] for a given offset inside the block.
pub fn compose(decoded: Decoded, offset: u64, block_size: u64, num_sets: u64) -> Addr {
    Addr::new((decoded.tag * num_sets + decoded.set_index as u64) * block_size + offset)
}

/// Level geometry as written in configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub size: u64,
    pub block_size: u64,
    pub associativity: u64,
}

impl LevelConfig {
    pub fn geometry(&self) -> Result<Geometry, GeometryError> {
        Geometry::new(self.size, self.block_size, self.associativity)
    }
}
