//! Domain types for the screener.

pub mod bar;
pub mod market;
pub mod snapshot;

pub use bar::{PriceBar, SeriesError, TimeSeries};
pub use market::Market;
pub use snapshot::{Fundamentals, Snapshot, UNKNOWN_SECTOR};

/// Symbol type alias
pub type Symbol = String;
