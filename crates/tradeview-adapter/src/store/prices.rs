/*
[INPUT]:  Price entry batches from the price channel
[OUTPUT]: Last-known aggregate price per symbol
[POS]:    State layer - price table store
[UPDATE]: When price entry fields or merge rules change
*/

use std::collections::BTreeMap;

use crate::types::PriceEntry;

/// Last-write-wins price table keyed by symbol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTable {
    entries: BTreeMap<String, PriceEntry>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch into the table; symbols not in the batch are untouched.
    /// Returns how many rows changed.
    pub fn apply(&mut self, entries: Vec<PriceEntry>) -> usize {
        let mut changed = 0;
        for entry in entries {
            if self.entries.get(&entry.symbol) == Some(&entry) {
                continue;
            }
            self.entries.insert(entry.symbol.clone(), entry);
            changed += 1;
        }
        changed
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceEntry> {
        self.entries.get(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceEntry> {
        self.entries.values()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
