//! Sparse per-block error bitmap.
//!
//! A fixed-radix trie maps a block number to one bit. Every level consumes
//! six bits of the block number, most significant first, and indexes a
//! 64-slot array. The last array level holds `u64` words, each covering 64
//! consecutive blocks.
//!
//! ```text
//!  block number (6 * (DEPTH + 2) bits)
//!  ┌──────┬──────┬──────┬──────┬──────┬──────┐
//!  │ lvl0 │ lvl1 │ lvl2 │ lvl3 │ word │ bit  │
//!  └──┬───┴──┬───┴──┬───┴──┬───┴──┬───┴──┬───┘
//!     │      │      │      │      │      └─ bit inside the leaf word
//!     └──────┴──────┴──────┴──────┴─ child index at each level
//! ```
//!
//! Subtrees are allocated on the first "mark bad" that lands in them. A
//! missing subtree means every block below it is good, so clearing a bit in
//! an unallocated region never allocates. Memory therefore grows with the
//! number of distinct bad-block events, not with the address space.

/// Number of internal levels above the leaf level.
pub const DEPTH: u32 = 4;

/// Children per node, and bits per leaf word.
pub const FANOUT: usize = 64;

const BITS_PER_LEVEL: u32 = 6;
const LEVEL_MASK: u64 = (FANOUT as u64) - 1;

/// Number of distinct block numbers the index can address: `64^(DEPTH + 2)`.
pub const CAPACITY: u64 = 1 << (BITS_PER_LEVEL * (DEPTH + 2));

#[derive(Debug)]
enum Node {
    Branch(Box<[Option<Node>; FANOUT]>),
    Leaf(Box<[u64; FANOUT]>),
}

impl Node {
    fn empty_for_level(level: u32) -> Self {
        if level == DEPTH {
            Node::Leaf(Box::new([0; FANOUT]))
        } else {
            Node::Branch(Box::new([const { None }; FANOUT]))
        }
    }

    fn count_nodes(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Branch(children) => {
                1 + children
                    .iter()
                    .flatten()
                    .map(Node::count_nodes)
                    .sum::<usize>()
            }
        }
    }

    fn count_set(&self) -> u64 {
        match self {
            Node::Leaf(words) => words.iter().map(|w| u64::from(w.count_ones())).sum(),
            Node::Branch(children) => children.iter().flatten().map(Node::count_set).sum(),
        }
    }
}

/// Child index of `block` at trie `level` (0 is the root).
fn slot(block: u64, level: u32) -> usize {
    let shift = BITS_PER_LEVEL * (DEPTH + 1 - level);
    ((block >> shift) & LEVEL_MASK) as usize
}

fn bit_mask(block: u64) -> u64 {
    1 << (block & LEVEL_MASK)
}

/// Sparse bitmap over `0..CAPACITY` block numbers.
///
/// All bits start at 0 ("good"). Not synchronized; the device wraps it in a
/// lock.
#[derive(Debug)]
pub struct SparseBitIndex {
    root: Node,
}

impl Default for SparseBitIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseBitIndex {
    /// Create an index with only the root allocated.
    pub fn new() -> Self {
        Self {
            root: Node::empty_for_level(0),
        }
    }

    /// Return the bit for `block`. Never allocates.
    ///
    /// # Panics
    ///
    /// Panics if `block >= CAPACITY`.
    pub fn get(&self, block: u64) -> bool {
        assert!(block < CAPACITY, "block {block} outside index range");
        let mut node = &self.root;
        let mut level = 0;
        loop {
            match node {
                Node::Leaf(words) => return words[slot(block, level)] & bit_mask(block) != 0,
                Node::Branch(children) => match &children[slot(block, level)] {
                    Some(child) => node = child,
                    None => return false,
                },
            }
            level += 1;
        }
    }

    /// Set the bit for `block` to `value`.
    ///
    /// Setting a bit allocates the missing nodes on its path. Clearing a bit
    /// whose subtree was never allocated is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if `block >= CAPACITY`.
    pub fn set_bit(&mut self, block: u64, value: bool) {
        assert!(block < CAPACITY, "block {block} outside index range");
        let mut node = &mut self.root;
        let mut level = 0;
        loop {
            match node {
                Node::Leaf(words) => {
                    let word = &mut words[slot(block, level)];
                    if value {
                        *word |= bit_mask(block);
                    } else {
                        *word &= !bit_mask(block);
                    }
                    return;
                }
                Node::Branch(children) => {
                    let child = &mut children[slot(block, level)];
                    if child.is_none() {
                        if !value {
                            return;
                        }
                        *child = Some(Node::empty_for_level(level + 1));
                    }
                    match child {
                        Some(next) => node = next,
                        None => return,
                    }
                }
            }
            level += 1;
        }
    }

    /// Mark `block` bad.
    pub fn set(&mut self, block: u64) {
        self.set_bit(block, true);
    }

    /// Mark `block` good.
    pub fn unset(&mut self, block: u64) {
        self.set_bit(block, false);
    }

    /// Number of allocated nodes, root and leaves included.
    pub fn allocated_nodes(&self) -> usize {
        self.root.count_nodes()
    }

    /// Number of bits currently set.
    pub fn count_set(&self) -> u64 {
        self.root.count_set()
    }
}
