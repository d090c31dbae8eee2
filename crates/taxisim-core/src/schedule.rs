//! Scheduler output: one itinerary per aircraft plus counters.

use std::collections::BTreeMap;

use crate::itinerary::Itinerary;

#[derive(Debug, Clone, Default)]
pub struct Schedule {
    itineraries: BTreeMap<String, Itinerary>,
    /// Delays added while resolving predicted conflicts.
    pub n_delay_added: u32,
    /// Conflicts still predicted when the scheduler gave up.
    pub n_unsolvable_conflicts: u32,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, callsign: impl Into<String>, itinerary: Itinerary) {
        self.itineraries.insert(callsign.into(), itinerary);
    }

    pub fn get(&self, callsign: &str) -> Option<&Itinerary> {
        self.itineraries.get(callsign)
    }

    pub fn get_mut(&mut self, callsign: &str) -> Option<&mut Itinerary> {
        self.itineraries.get_mut(callsign)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Itinerary)> {
        self.itineraries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.itineraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itineraries.is_empty()
    }
}
