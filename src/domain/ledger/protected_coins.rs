use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Symbols that are never sold regardless of signal — either seeded at a
/// tenant's first boot from pre-existing exchange holdings, or added
/// manually via the dashboard/chat blacklist endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtectedCoins {
    symbols: HashSet<String>,
}

impl ProtectedCoins {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_symbol_is_reported() {
        let mut coins = ProtectedCoins::default();
        coins.add("BTC/KRW");
        assert!(coins.contains("BTC/KRW"));
        assert!(!coins.contains("ETH/KRW"));
    }

    #[test]
    fn remove_clears_protection() {
        let mut coins = ProtectedCoins::default();
        coins.add("BTC/KRW");
        coins.remove("BTC/KRW");
        assert!(!coins.contains("BTC/KRW"));
    }
}
