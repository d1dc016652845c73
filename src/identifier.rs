//! Short CSS identifier allocation.
//!
//! The transpiler hands out [`UniqueId`]s for every distinct thing it discovers.
//! Those keys are sparse: plenty of them never reach the output. An
//! [`IdentifierAllocator`] turns the keys that are actually looked up into the
//! densest possible names, in first-lookup order.

use std::collections::HashMap;

const ALPHABET: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Allocation key for one semantic entity within a single transpile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueId(u32);

/// Hands out monotonically increasing [`UniqueId`]s.
#[derive(Debug, Default)]
pub struct UniqueIdSource {
    next: u32,
}

impl UniqueIdSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> UniqueId {
        let id = UniqueId(self.next);
        self.next += 1;
        id
    }

    /// Number of keys handed out so far.
    pub fn issued(&self) -> usize {
        self.next as usize
    }
}

/// Encodes a registry index as lowercase letters.
///
/// `0` is `"a"`. Past that, each step prepends the remainder digit and divides
/// the rest away, so there is never a leading `a` and `26` becomes `"ba"`.
pub fn encode(mut number: usize) -> String {
    if number == 0 {
        return "a".to_string();
    }

    let mut reversed = Vec::new();
    while number > 0 {
        let remainder = number % ALPHABET.len();
        reversed.push(ALPHABET[remainder]);
        number -= remainder;
        number /= ALPHABET.len();
    }

    reversed.iter().rev().map(|&b| b as char).collect()
}

/// Maps [`UniqueId`]s to short names, one namespace per instance.
#[derive(Debug, Default)]
pub struct IdentifierAllocator {
    ordinals: HashMap<UniqueId, usize>,
    names: Vec<String>,
}

impl IdentifierAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the name for `id`, registering it on first use.
    pub fn allocate(&mut self, id: UniqueId) -> String {
        if let Some(&ordinal) = self.ordinals.get(&id) {
            return self.names[ordinal].clone();
        }

        let ordinal = self.names.len();
        let name = encode(ordinal);
        self.ordinals.insert(id, ordinal);
        self.names.push(name.clone());
        name
    }

    /// Number of distinct names handed out.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
