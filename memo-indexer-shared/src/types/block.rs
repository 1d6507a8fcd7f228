use bitcoin::BlockHash;
use chrono::{DateTime, Utc};

/// A confirmed block as recorded by the entity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub height: u64,
    pub hash: BlockHash,
    pub timestamp: DateTime<Utc>,
}

impl Block {
    pub fn block_ref(&self) -> BlockRef {
        BlockRef {
            height: self.height,
            timestamp: self.timestamp,
        }
    }
}

/// Block association of an action: the height it was confirmed at and the
/// block timestamp. Looked up on demand from the block table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub height: u64,
    pub timestamp: DateTime<Utc>,
}
