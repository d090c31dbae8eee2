//! Aircraft and the pilot that follows its installed itinerary.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPos;
use crate::itinerary::Itinerary;
use crate::node::Node;

/// Observable aircraft state, derived from the itinerary window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Unknown,
    Stop,
    Moving,
    Hold,
    Flying,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Stop => "stop",
            Self::Moving => "moving",
            Self::Hold => "hold",
            Self::Flying => "flying",
        };
        f.write_str(s)
    }
}

/// Owns the installed itinerary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pilot {
    itinerary: Option<Itinerary>,
}

impl Pilot {
    pub fn itinerary(&self) -> Option<&Itinerary> {
        self.itinerary.as_ref()
    }

    pub fn itinerary_mut(&mut self) -> Option<&mut Itinerary> {
        self.itinerary.as_mut()
    }

    /// Install a copy of `itinerary`. Empty plans and plans whose head was
    /// due to be left before `now` are discarded.
    pub fn install(&mut self, callsign: &str, itinerary: &Itinerary, now: NaiveTime) -> bool {
        let stale = match itinerary.next_target() {
            Ok(head) => head.edt.is_some_and(|edt| edt < now),
            Err(_) => true,
        };
        if stale {
            tracing::warn!("{}: discarding stale itinerary at {}", callsign, now);
            return false;
        }
        self.itinerary = Some(itinerary.clone());
        true
    }

    pub fn clear(&mut self) {
        self.itinerary = None;
    }
}

/// An aircraft on the surface. Identity is the callsign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aircraft {
    pub callsign: String,
    pub model: String,
    location: Node,
    state: State,
    pilot: Pilot,
}

impl Aircraft {
    pub fn new(callsign: impl Into<String>, model: impl Into<String>, location: Node) -> Self {
        Self {
            callsign: callsign.into(),
            model: model.into(),
            location,
            state: State::Stop,
            pilot: Pilot::default(),
        }
    }

    /// Nominal location: the node last teleported to.
    pub fn location(&self) -> &Node {
        &self.location
    }

    pub fn set_location(&mut self, node: Node) {
        if node != self.location {
            tracing::trace!("{}: {} -> {}", self.callsign, self.location.name, node.name);
        }
        self.location = node;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn pilot(&self) -> &Pilot {
        &self.pilot
    }

    pub fn pilot_mut(&mut self) -> &mut Pilot {
        &mut self.pilot
    }

    pub fn itinerary(&self) -> Option<&Itinerary> {
        self.pilot.itinerary()
    }

    pub fn install_itinerary(&mut self, itinerary: &Itinerary, now: NaiveTime) -> bool {
        self.pilot.install(&self.callsign, itinerary, now)
    }

    /// Advance along the itinerary to `now` and derive the new state.
    pub fn tick(&mut self, now: NaiveTime, close_ft: f64) {
        let Some(itinerary) = self.pilot.itinerary.as_mut() else {
            self.state = State::Stop;
            return;
        };

        let mut arrived: Option<Node> = None;
        while let Ok(head) = itinerary.next_target() {
            let left = head.edt.is_some_and(|edt| edt <= now);
            let reached_end = itinerary.is_last() && head.eat <= now;
            if !(left || reached_end) {
                break;
            }
            let Ok(popped) = itinerary.pop_target() else {
                break;
            };
            arrived = Some(popped.node);
        }
        let heading_to = itinerary.next_target().ok().map(|t| t.node.clone());
        let window = itinerary.next_target().ok().map(|t| (t.eat, t.edt));

        if let Some(node) = arrived {
            if !self.location.is_close_to(&node, close_ft) {
                self.set_location(node);
            }
        }
        if let Some(node) = heading_to {
            if !self.location.is_close_to(&node, close_ft) {
                self.set_location(node);
            }
        }

        self.state = match window {
            None => {
                self.pilot.clear();
                State::Stop
            }
            Some((eat, _)) if now < eat => State::Moving,
            Some((_, Some(edt))) if now < edt => State::Hold,
            Some(_) => State::Unknown,
        };
    }

    /// Interpolated position while moving, otherwise the nominal location.
    pub fn true_location(&self, now: NaiveTime) -> GeoPos {
        if self.state != State::Moving {
            return self.location.pos;
        }
        self.itinerary()
            .and_then(|i| i.true_location(now).ok())
            .unwrap_or(self.location.pos)
    }
}

impl PartialEq for Aircraft {
    fn eq(&self, other: &Self) -> bool {
        self.callsign == other.callsign
    }
}

impl Eq for Aircraft {}

impl Hash for Aircraft {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.callsign.hash(state);
    }
}
