use std::fmt;

/// Structured replacement for regex-parsed reason strings (spec §9
/// redesign flag): a bitset over the eight contributing signal families.
/// The human-readable label is derived from this, never parsed back out
/// of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReasonSet(u8);

impl ReasonSet {
    pub const RSI: ReasonSet = ReasonSet(1 << 0);
    pub const BB: ReasonSet = ReasonSet(1 << 1);
    pub const VOL: ReasonSet = ReasonSet(1 << 2);
    pub const MACD: ReasonSet = ReasonSet(1 << 3);
    pub const MTF: ReasonSet = ReasonSet(1 << 4);
    pub const SENT: ReasonSet = ReasonSet(1 << 5);
    pub const PAT: ReasonSet = ReasonSet(1 << 6);
    pub const CHART: ReasonSet = ReasonSet(1 << 7);

    pub const fn empty() -> Self {
        ReasonSet(0)
    }

    pub fn insert(&mut self, other: ReasonSet) {
        self.0 |= other.0;
    }

    pub fn contains(&self, other: ReasonSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: ReasonSet) -> ReasonSet {
        ReasonSet(self.0 | other.0)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        ReasonSet(bits)
    }

    const ALL: [(ReasonSet, &'static str); 8] = [
        (ReasonSet::RSI, "rsi"),
        (ReasonSet::BB, "bb"),
        (ReasonSet::VOL, "vol"),
        (ReasonSet::MACD, "macd"),
        (ReasonSet::MTF, "mtf"),
        (ReasonSet::SENT, "sent"),
        (ReasonSet::PAT, "pat"),
        (ReasonSet::CHART, "chart"),
    ];

    /// Human-readable label derived from the bitset, e.g. `"rsi+bb+mtf"`.
    pub fn label(&self) -> String {
        let parts: Vec<&str> = Self::ALL.iter().filter(|(flag, _)| self.contains(*flag)).map(|(_, name)| *name).collect();
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join("+")
        }
    }
}

impl fmt::Display for ReasonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_label_is_none() {
        assert_eq!(ReasonSet::empty().label(), "none");
    }

    #[test]
    fn union_reports_all_contained_members() {
        let rs = ReasonSet::RSI.union(ReasonSet::MTF);
        assert!(rs.contains(ReasonSet::RSI));
        assert!(rs.contains(ReasonSet::MTF));
        assert!(!rs.contains(ReasonSet::BB));
        assert_eq!(rs.label(), "rsi+mtf");
    }

    #[test]
    fn bits_round_trip() {
        let rs = ReasonSet::BB.union(ReasonSet::CHART);
        assert_eq!(ReasonSet::from_bits(rs.bits()), rs);
    }
}
