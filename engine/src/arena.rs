use std::collections::HashMap;
use std::fmt;

/// Dense index of a symbol inside one pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Symbol → dense id lookup backing the per-symbol state vectors.
///
/// Ids are assigned on first sight and never reused, so every `Vec` indexed
/// by [`SymbolId`] only ever grows by one slot per new symbol.
#[derive(Debug, Default)]
pub struct SymbolTable {
    index: HashMap<String, SymbolId>,
    names: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the symbol's id, and whether it was just created.
    pub fn intern(&mut self, symbol: &str) -> (SymbolId, bool) {
        if let Some(id) = self.index.get(symbol) {
            return (*id, false);
        }

        let id = SymbolId(self.names.len() as u32);
        self.names.push(symbol.to_owned());
        self.index.insert(symbol.to_owned(), id);
        (id, true)
    }

    pub fn get(&self, symbol: &str) -> Option<SymbolId> {
        self.index.get(symbol).copied()
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SymbolId> + use<> {
        (0..self.names.len() as u32).map(SymbolId)
    }
}

#[cfg(test)]
pub(crate) fn id(n: u32) -> SymbolId {
    SymbolId(n)
}
