//! Node-level conflict detection.
//!
//! A conflict is two or more aircraft sharing a nominal location at the same
//! instant. Pairs are checked once in callsign order so the result does not
//! depend on how the aircraft list happens to be ordered.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveTime;
use serde::Serialize;

use crate::aircraft::Aircraft;
use crate::node::Node;

#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub callsigns: BTreeSet<String>,
    pub node: Node,
    pub time: NaiveTime,
}

impl PartialEq for Conflict {
    fn eq(&self, other: &Self) -> bool {
        self.callsigns == other.callsigns && self.node == other.node
    }
}

impl Eq for Conflict {}

impl Hash for Conflict {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.callsigns.hash(state);
        self.node.hash(state);
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.callsigns.iter().map(String::as_str).collect();
        write!(f, "conflict at {} [{}] {}", self.time, names.join(", "), self.node.name)
    }
}

/// One conflict per colliding node, ordered by the lowest callsign involved.
pub fn detect_conflicts<'a, I>(aircraft: I, now: NaiveTime, close_ft: f64) -> Vec<Conflict>
where
    I: IntoIterator<Item = &'a Aircraft>,
{
    let mut sorted: Vec<&Aircraft> = aircraft.into_iter().collect();
    sorted.sort_by(|a, b| a.callsign.cmp(&b.callsign));

    let mut conflicts: Vec<Conflict> = Vec::new();
    for (i, first) in sorted.iter().enumerate() {
        for second in &sorted[i + 1..] {
            if !first.location().is_close_to(second.location(), close_ft) {
                continue;
            }
            let group = conflicts
                .iter_mut()
                .find(|c| c.node.is_close_to(first.location(), close_ft));
            match group {
                Some(conflict) => {
                    conflict.callsigns.insert(first.callsign.clone());
                    conflict.callsigns.insert(second.callsign.clone());
                }
                None => conflicts.push(Conflict {
                    callsigns: [first.callsign.clone(), second.callsign.clone()].into(),
                    node: first.location().clone(),
                    time: now,
                }),
            }
        }
    }
    conflicts
}
