//! Genre tags — doubling as musical mood and route-event category.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque tag from a fixed set. Modeled as a newtype over an interned
/// string rather than a closed Rust enum: the snippet library and forecasts
/// both name genres freely (e.g. `tunnelEntrance`, `highwayExit`, or a
/// song-specific mood like `low`/`high`), and rejecting unrecognized genres
/// is a parsing concern (`Error::MalformedForecast`), not a type-level one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Genre(pub String);

/// The fixed set of genre tags a forecast may name (section 3's catalogue:
/// two moods plus three route-event categories). `TransitionSpec::new` is
/// the parsing boundary that checks against this set.
pub const KNOWN_GENRES: &[&str] = &["high", "low", "tunnelEntrance", "highwayExit", "trafficLight"];

impl Genre {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        KNOWN_GENRES.contains(&self.0.as_str())
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Genre {
    fn from(s: &str) -> Self {
        Genre::new(s)
    }
}

impl From<String> for Genre {
    fn from(s: String) -> Self {
        Genre::new(s)
    }
}
