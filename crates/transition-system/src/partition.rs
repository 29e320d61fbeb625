use std::fmt;

/// A state-equivalence relation: the union of all blocks is the full state
/// set, and each block contains distinct states (spec.md §4.7, §4.4).
///
/// Implemented by every shrink strategy's output and consumed by
/// [`crate::TransitionSystem::apply_shrink`].
pub trait StatePartition {
    fn block_number(&self, state: usize) -> usize;

    fn num_of_blocks(&self) -> usize;
}

/// The simplest [`StatePartition`]: an explicit `state -> block` table.
#[derive(Clone)]
pub struct IndexedPartition {
    blocks: Vec<usize>,
    num_of_blocks: usize,
}

impl IndexedPartition {
    /// A partition with every state in its own singleton block.
    pub fn identity(num_of_states: usize) -> IndexedPartition {
        IndexedPartition {
            blocks: (0..num_of_states).collect(),
            num_of_blocks: num_of_states,
        }
    }

    /// A partition with every state collapsed into a single block.
    pub fn trivial(num_of_states: usize) -> IndexedPartition {
        IndexedPartition {
            blocks: vec![0; num_of_states],
            num_of_blocks: if num_of_states == 0 { 0 } else { 1 },
        }
    }

    pub fn from_blocks(blocks: Vec<usize>) -> IndexedPartition {
        let num_of_blocks = blocks.iter().max().map_or(0, |max| max + 1);
        IndexedPartition { blocks, num_of_blocks }
    }

    pub fn set_block(&mut self, state: usize, block: usize) {
        self.blocks[state] = block;
        self.num_of_blocks = self.num_of_blocks.max(block + 1);
    }
}

impl StatePartition for IndexedPartition {
    fn block_number(&self, state: usize) -> usize {
        self.blocks[state]
    }

    fn num_of_blocks(&self) -> usize {
        self.num_of_blocks
    }
}

impl fmt::Debug for IndexedPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for block in 0..self.num_of_blocks {
            if block > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{{")?;
            let mut first = true;
            for (state, &b) in self.blocks.iter().enumerate() {
                if b == block {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{state}")?;
                    first = false;
                }
            }
            write!(f, "}}")?;
        }
        write!(f, "}}")
    }
}
