use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Symbols the learning pass (C8 step 7) or an operator has flagged as
/// poor buy candidates (`trades >= 3 AND winrate < 25%`). Distinct from
/// [`super::protected_coins::ProtectedCoins`]: a blacklisted symbol may
/// still be sold if somehow held, it just never triggers a new BUY.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blacklist {
    symbols: HashSet<String>,
}

impl Blacklist {
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn add(&mut self, symbol: impl Into<String>) {
        self.symbols.insert(symbol.into());
    }

    pub fn remove(&mut self, symbol: &str) {
        self.symbols.remove(symbol);
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_contains() {
        let mut bl = Blacklist::default();
        bl.add("DOGE/KRW");
        assert!(bl.contains("DOGE/KRW"));
        bl.remove("DOGE/KRW");
        assert!(!bl.contains("DOGE/KRW"));
    }
}
