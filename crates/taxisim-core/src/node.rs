//! Named points on the airport surface.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::geo::{self, GeoPos};

/// Coordinates are compared at five decimal places (about a meter).
const COORD_SCALE: f64 = 1e5;

/// A named point at a geo position.
///
/// Equality and hashing use the name plus the rounded coordinates, so a node
/// that went through serialization still matches the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub pos: GeoPos,
}

impl Node {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            pos: GeoPos::new(lat, lng),
        }
    }

    pub fn at(name: impl Into<String>, pos: GeoPos) -> Self {
        Self {
            name: name.into(),
            pos,
        }
    }

    pub fn distance_to(&self, other: &Node) -> f64 {
        geo::distance_ft(self.pos, other.pos)
    }

    pub fn is_close_to(&self, other: &Node, threshold_ft: f64) -> bool {
        self.distance_to(other) < threshold_ft
    }

    fn key(&self) -> (&str, i64, i64) {
        (
            self.name.as_str(),
            (self.pos.lat * COORD_SCALE).round() as i64,
            (self.pos.lng * COORD_SCALE).round() as i64,
        )
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:.5}, {:.5})", self.name, self.pos.lat, self.pos.lng)
    }
}
