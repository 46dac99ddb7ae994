//! Markets the screener knows how to label.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    India,
    Australia,
}

impl Market {
    pub fn currency(&self) -> &'static str {
        match self {
            Self::India => "₹",
            Self::Australia => "A$",
        }
    }

    /// Unit the data source reports market capitalisation in.
    pub fn market_cap_unit(&self) -> &'static str {
        match self {
            Self::India => "Cr",
            Self::Australia => "L",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::India => "india",
            Self::Australia => "australia",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
