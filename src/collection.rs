//! Named collections
//!
//! Every collection is served under the same route set and is stored
//! under the same key in the JSON data file and in the database.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six collections the backend knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Services,
    Destinations,
    Users,
    ServiceBookings,
    DestinationBookings,
    Admin,
}

impl Collection {
    /// Name used in routes, the data file and the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Services => "services",
            Collection::Destinations => "destinations",
            Collection::Users => "users",
            Collection::ServiceBookings => "serviceBookings",
            Collection::DestinationBookings => "destinationBookings",
            Collection::Admin => "admin",
        }
    }

    /// Get all collections
    pub fn all() -> &'static [Collection] {
        &[
            Collection::Services,
            Collection::Destinations,
            Collection::Users,
            Collection::ServiceBookings,
            Collection::DestinationBookings,
            Collection::Admin,
        ]
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownCollection(s.to_string()))
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
