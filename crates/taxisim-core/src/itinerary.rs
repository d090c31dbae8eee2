//! Time-stamped waypoint plans installed on pilots.

use std::collections::VecDeque;

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::ItineraryError;
use crate::geo::{self, GeoPos};
use crate::node::Node;

/// One waypoint: expected arrival time and expected departure time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub node: Node,
    pub eat: NaiveTime,
    /// `None` only for the final target.
    pub edt: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    uncertainty_delayed: bool,
}

impl Target {
    pub fn new(node: Node, eat: NaiveTime, edt: Option<NaiveTime>) -> Self {
        Self {
            node,
            eat,
            edt,
            uncertainty_delayed: false,
        }
    }
}

/// Ordered queue of targets plus the most recently popped one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    targets: VecDeque<Target>,
    past_target: Option<Target>,
    /// Number of targets popped so far.
    index: usize,
    n_scheduler_delay: u32,
    n_uncertainty_delay: u32,
}

impl Itinerary {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets: targets.into(),
            past_target: None,
            index: 0,
            n_scheduler_delay: 0,
            n_uncertainty_delay: 0,
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn past_target(&self) -> Option<&Target> {
        self.past_target.as_ref()
    }

    pub fn next_target(&self) -> Result<&Target, ItineraryError> {
        self.targets.front().ok_or(ItineraryError::Empty)
    }

    pub fn is_last(&self) -> bool {
        self.targets.len() == 1
    }

    pub fn pop_target(&mut self) -> Result<Target, ItineraryError> {
        let target = self.targets.pop_front().ok_or(ItineraryError::Empty)?;
        self.past_target = Some(target.clone());
        self.index += 1;
        Ok(target)
    }

    /// Shift every edt and every eat but the first by `delta`.
    pub fn add_delay(&mut self, delta: TimeDelta) {
        self.shift(delta);
    }

    pub fn remove_delay(&mut self, delta: TimeDelta) {
        self.shift(-delta);
    }

    fn shift(&mut self, delta: TimeDelta) {
        for (i, target) in self.targets.iter_mut().enumerate() {
            if let Some(edt) = target.edt.as_mut() {
                *edt += delta;
            }
            if i > 0 {
                target.eat += delta;
            }
        }
    }

    pub fn add_scheduler_delay(&mut self, delta: TimeDelta) {
        self.add_delay(delta);
        self.n_scheduler_delay += 1;
    }

    /// Delay caused by a surprise hold at the current target.
    pub fn add_uncertainty_delay(&mut self, delta: TimeDelta) {
        self.add_delay(delta);
        self.n_uncertainty_delay += 1;
        if let Some(head) = self.targets.front_mut() {
            head.uncertainty_delayed = true;
        }
    }

    /// The head target already absorbed an uncertainty hold.
    pub fn is_delayed_by_uncertainty_now(&self) -> bool {
        self.targets.front().is_some_and(|t| t.uncertainty_delayed)
    }

    pub fn n_scheduler_delay(&self) -> u32 {
        self.n_scheduler_delay
    }

    pub fn n_uncertainty_delay(&self) -> u32 {
        self.n_uncertainty_delay
    }

    /// At least two targets remain and the head has not been left yet.
    pub fn is_valid(&self, now: NaiveTime) -> bool {
        self.targets.len() >= 2 && self.targets.front().is_some_and(|t| t.edt.is_some_and(|edt| edt >= now))
    }

    /// Interpolated position between the past target and the next one.
    pub fn true_location(&self, now: NaiveTime) -> Result<GeoPos, ItineraryError> {
        let next = self.next_target()?;
        let Some(past) = &self.past_target else {
            return Ok(next.node.pos);
        };
        let left = past.edt.unwrap_or(past.eat);
        let span = (next.eat - left).num_milliseconds();
        if span <= 0 {
            return Ok(next.node.pos);
        }
        let elapsed = (now - left).num_milliseconds();
        let ratio = elapsed as f64 / span as f64;
        Ok(geo::interpolate(past.node.pos, next.node.pos, ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn three_targets() -> Itinerary {
        Itinerary::new(vec![
            Target::new(Node::new("N1", 47.812, -122.079), t(0, 2, 0), Some(t(0, 3, 0))),
            Target::new(Node::new("N2", 47.822, -122.079), t(0, 5, 0), Some(t(0, 7, 0))),
            Target::new(Node::new("N3", 47.822, -122.069), t(0, 9, 0), None),
        ])
    }

    #[test]
    fn test_delay_round_trip() {
        let original = three_targets();
        let mut iti = original.clone();

        iti.add_delay(TimeDelta::seconds(60));
        let targets: Vec<&Target> = iti.targets().collect();
        assert_eq!(targets[0].eat, t(0, 2, 0));
        assert_eq!(targets[0].edt, Some(t(0, 4, 0)));
        assert_eq!(targets[1].eat, t(0, 6, 0));
        assert_eq!(targets[1].edt, Some(t(0, 8, 0)));
        assert_eq!(targets[2].eat, t(0, 10, 0));
        assert_eq!(targets[2].edt, None);

        iti.remove_delay(TimeDelta::seconds(60));
        assert_eq!(iti, original);
    }

    #[test]
    fn test_delay_round_trip_many_sizes() {
        for secs in [0, 1, 7, 59, 600, 3599] {
            let original = three_targets();
            let mut iti = original.clone();
            iti.add_delay(TimeDelta::seconds(secs));
            iti.remove_delay(TimeDelta::seconds(secs));
            assert_eq!(iti, original, "delta {secs}");
        }
    }

    #[test]
    fn test_pop_and_peek() {
        let mut iti = three_targets();
        assert_eq!(iti.next_target().unwrap().node.name, "N1");
        assert_eq!(iti.pop_target().unwrap().node.name, "N1");
        assert_eq!(iti.past_target().unwrap().node.name, "N1");
        assert_eq!(iti.index(), 1);
        iti.pop_target().unwrap();
        assert!(iti.is_last());
        iti.pop_target().unwrap();
        assert!(iti.is_empty());
        assert_eq!(iti.pop_target(), Err(ItineraryError::Empty));
        assert_eq!(iti.next_target(), Err(ItineraryError::Empty));
    }

    #[test]
    fn test_is_valid() {
        let iti = three_targets();
        assert!(iti.is_valid(t(0, 1, 0)));
        assert!(iti.is_valid(t(0, 3, 0)));
        assert!(!iti.is_valid(t(0, 3, 1)));

        let single = Itinerary::new(vec![Target::new(Node::new("N", 0.0, 0.0), t(0, 0, 0), None)]);
        assert!(!single.is_valid(t(0, 0, 0)));
    }

    #[test]
    fn test_true_location_interpolates() {
        let mut iti = three_targets();
        assert_eq!(iti.true_location(t(0, 0, 0)).unwrap(), GeoPos::new(47.812, -122.079));

        iti.pop_target().unwrap();
        // Left N1 at 00:03, due at N2 at 00:05.
        assert_eq!(iti.true_location(t(0, 3, 0)).unwrap(), GeoPos::new(47.812, -122.079));
        let mid = iti.true_location(t(0, 4, 0)).unwrap();
        assert!((mid.lat - 47.817).abs() < 1e-9);
        assert_eq!(iti.true_location(t(0, 6, 0)).unwrap(), GeoPos::new(47.822, -122.079));
    }

    #[test]
    fn test_uncertainty_bookkeeping() {
        let mut iti = three_targets();
        assert!(!iti.is_delayed_by_uncertainty_now());
        iti.add_uncertainty_delay(TimeDelta::seconds(30));
        assert!(iti.is_delayed_by_uncertainty_now());
        assert_eq!(iti.n_uncertainty_delay(), 1);
        iti.pop_target().unwrap();
        assert!(!iti.is_delayed_by_uncertainty_now());

        iti.add_scheduler_delay(TimeDelta::seconds(10));
        assert_eq!(iti.n_scheduler_delay(), 1);
    }
}
