//! Core identifiers: Ticker, AccountId

use std::borrow::Borrow;
use std::fmt;

/// Conventional ticker for the cash position.
pub const CASH: &str = "CASH";

/// Asset identifier (e.g. `"VTI"`, `"bitcoin"`).
///
/// Tickers are case-sensitive: crypto assets are keyed by their lowercase
/// coin id while exchange-listed assets use their uppercase symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Ticker(String);

impl Ticker {
    pub fn new(s: impl Into<String>) -> Self {
        Ticker(s.into())
    }

    /// The cash ticker.
    pub fn cash() -> Self {
        Ticker(CASH.to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_cash(&self) -> bool {
        self.0 == CASH
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Ticker {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Ticker(s.to_string())
    }
}

impl From<String> for Ticker {
    fn from(s: String) -> Self {
        Ticker(s)
    }
}

impl From<&Ticker> for Ticker {
    fn from(t: &Ticker) -> Self {
        t.clone()
    }
}

impl PartialEq<str> for Ticker {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Ticker {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Account identifier assigned by the owning portfolio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn ticker_display_and_eq() {
        let t = Ticker::new("VTI");
        assert_eq!(format!("{t}"), "VTI");
        assert_eq!(t, "VTI");
        assert_eq!(t.as_str(), "VTI");
    }

    #[test]
    fn ticker_is_case_sensitive() {
        assert_ne!(Ticker::new("bitcoin"), Ticker::new("BITCOIN"));
    }

    #[test]
    fn ticker_borrow_lookup() {
        let set: BTreeSet<Ticker> = ["VTI", "BND"].into_iter().map(Ticker::from).collect();
        assert!(set.contains("VTI"));
        assert!(!set.contains("VXUS"));
    }

    #[test]
    fn cash_ticker() {
        assert!(Ticker::cash().is_cash());
        assert!(!Ticker::new("cash").is_cash());
    }

    #[test]
    fn account_id_display() {
        assert_eq!(format!("{}", AccountId(3)), "A3");
    }
}
