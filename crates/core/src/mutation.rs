//! In-place block edits.
//!
//! Inserting a block shifts every following index by one. Indices computed
//! before a batch of insertions stay valid only if the insertions are
//! applied from the highest index down; [`InsertionBatch`] does exactly that.

use crate::types::{Block, Run};
use crate::{Error, Result};
use std::cmp::Reverse;

/// Replace the text of a block, keeping the format of its first run.
///
/// Every other run is emptied. A block without runs receives a single plain run.
pub fn replace_text(blocks: &mut [Block], index: usize, text: &str) -> Result<()> {
    let len = blocks.len();
    let block = blocks
        .get_mut(index)
        .ok_or(Error::InvalidIndex { index, len })?;

    match block.runs.split_first_mut() {
        Some((first, rest)) => {
            first.text = text.to_string();
            for run in rest {
                run.text.clear();
            }
        }
        None => block.runs.push(Run::new(text)),
    }

    Ok(())
}

/// Insert a new block immediately before `index`. `index == len` appends.
pub fn insert_before(blocks: &mut Vec<Block>, index: usize, text: &str, style: &str) -> Result<()> {
    insert_block(blocks, index, Block::new(style, text))
}

/// Insert an already built block immediately before `index`.
pub fn insert_block(blocks: &mut Vec<Block>, index: usize, block: Block) -> Result<()> {
    if index > blocks.len() {
        return Err(Error::InvalidIndex {
            index,
            len: blocks.len(),
        });
    }
    blocks.insert(index, block);
    Ok(())
}

/// Insertions addressed by indices of the unmodified story.
///
/// Several insertions at one index end up in submission order.
#[derive(Debug, Clone, Default)]
pub struct InsertionBatch {
    pending: Vec<(usize, Block)>,
}

impl InsertionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a block to go before `index`.
    pub fn insert(&mut self, index: usize, block: Block) {
        self.pending.push((index, block));
    }

    /// Queue a text block to go before `index`.
    pub fn insert_text(&mut self, index: usize, text: impl Into<String>, style: impl Into<String>) {
        self.insert(index, Block::new(style, text));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply every insertion, highest index first. Returns the number of blocks added.
    ///
    /// Nothing is inserted when any index is out of bounds.
    pub fn apply(self, blocks: &mut Vec<Block>) -> Result<usize> {
        let len = blocks.len();
        if let Some(&(index, _)) = self.pending.iter().find(|(i, _)| *i > len) {
            return Err(Error::InvalidIndex { index, len });
        }

        let mut pending: Vec<(usize, usize, Block)> = self
            .pending
            .into_iter()
            .enumerate()
            .map(|(seq, (index, block))| (index, seq, block))
            .collect();
        pending.sort_by_key(|&(index, seq, _)| (Reverse(index), Reverse(seq)));

        let count = pending.len();
        for (index, _, block) in pending {
            blocks.insert(index, block);
        }

        log::debug!("Inserted {} blocks", count);
        Ok(count)
    }
}
