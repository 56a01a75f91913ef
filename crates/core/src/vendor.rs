//! Vendor tags and per-vendor column mappings.
//!
//! Each vendor variant owns a pure mapping from its CSV header names to the
//! canonical record fields. Adding a vendor means adding a variant and its
//! mapping here; nothing downstream branches on the source.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Canonical fields a vendor column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
    AdjOpen,
    AdjHigh,
    AdjLow,
    AdjClose,
    AdjVolume,
    DivCash,
    SplitFactor,
}

impl Field {
    /// Whether this field counts as a price column for header validation.
    pub fn is_price(self) -> bool {
        matches!(
            self,
            Field::Open
                | Field::High
                | Field::Low
                | Field::Close
                | Field::AdjOpen
                | Field::AdjHigh
                | Field::AdjLow
                | Field::AdjClose
        )
    }
}

/// Data vendor whose CSV layout we know how to normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Tiingo,
    Fmp,
    Yahoo,
}

impl Vendor {
    /// All known vendors, in canonical order.
    pub fn all() -> &'static [Vendor] {
        &[Vendor::Tiingo, Vendor::Fmp, Vendor::Yahoo]
    }

    /// The subfolder / tag name for this vendor.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Tiingo => "tiingo",
            Vendor::Fmp => "fmp",
            Vendor::Yahoo => "yahoo",
        }
    }

    /// Header-name → canonical-field mapping for this vendor.
    ///
    /// Columns not listed here are tolerated in the file and ignored.
    pub fn column_map(&self) -> &'static [(&'static str, Field)] {
        match self {
            Vendor::Tiingo => &[
                ("date", Field::Date),
                ("open", Field::Open),
                ("high", Field::High),
                ("low", Field::Low),
                ("close", Field::Close),
                ("volume", Field::Volume),
                ("adjOpen", Field::AdjOpen),
                ("adjHigh", Field::AdjHigh),
                ("adjLow", Field::AdjLow),
                ("adjClose", Field::AdjClose),
                ("adjVolume", Field::AdjVolume),
                ("divCash", Field::DivCash),
                ("splitFactor", Field::SplitFactor),
            ],
            Vendor::Fmp => &[
                ("date", Field::Date),
                ("open", Field::Open),
                ("high", Field::High),
                ("low", Field::Low),
                ("close", Field::Close),
                ("volume", Field::Volume),
                ("adjClose", Field::AdjClose),
            ],
            Vendor::Yahoo => &[
                ("Date", Field::Date),
                ("Open", Field::Open),
                ("High", Field::High),
                ("Low", Field::Low),
                ("Close", Field::Close),
                ("Adj Close", Field::AdjClose),
                ("Volume", Field::Volume),
            ],
        }
    }
}

impl Default for Vendor {
    fn default() -> Self {
        Vendor::Tiingo
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiingo" => Ok(Vendor::Tiingo),
            "fmp" => Ok(Vendor::Fmp),
            // The original feed scripts tagged Yahoo exports "yfinance".
            "yahoo" | "yfinance" => Ok(Vendor::Yahoo),
            other => Err(CoreError::UnknownVendor(other.to_string())),
        }
    }
}
