//! Random surprise holds at gates and spots.

use chrono::TimeDelta;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::airport::Airport;
use crate::config::UncertaintyConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Uncertainty {
    prob_hold: f64,
    seed: u64,
    delay: TimeDelta,
    at_gate: bool,
    at_spot: bool,
    at_runway: bool,
}

impl Uncertainty {
    pub fn new(prob_hold: f64, seed: u64, delay: TimeDelta) -> Self {
        Self {
            prob_hold: prob_hold.clamp(0.0, 1.0),
            seed,
            delay,
            at_gate: true,
            at_spot: true,
            at_runway: false,
        }
    }

    /// `None` when uncertainty is disabled.
    pub fn from_config(config: &UncertaintyConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let mut uncertainty = Self::new(
            config.prob_hold,
            config.seed,
            TimeDelta::seconds(i64::from(config.delay_time)),
        );
        uncertainty.at_gate = config.at_gate;
        uncertainty.at_spot = config.at_spot;
        uncertainty.at_runway = config.at_runway;
        Some(uncertainty)
    }

    pub fn delay(&self) -> TimeDelta {
        self.delay
    }

    /// Roll once for every eligible aircraft, in callsign order, and delay
    /// the winners. Returns the delayed callsigns.
    pub fn inject(&self, airport: &mut Airport, tick_index: u64) -> Vec<String> {
        let close_ft = airport.proximity().close_node_ft;
        let mut eligible: Vec<String> = airport
            .aircraft()
            .iter()
            .filter(|a| {
                let Some(itinerary) = a.itinerary() else {
                    return false;
                };
                if itinerary.is_delayed_by_uncertainty_now() {
                    return false;
                }
                let surface = airport.surface();
                // Standing at the last waypoint before the runway start.
                let lining_up = || {
                    itinerary.targets().nth(1).is_some_and(|after| {
                        surface
                            .runways
                            .iter()
                            .any(|r| r.start().is_close_to(&after.node, close_ft))
                    })
                };
                (self.at_gate && surface.is_gate(a.location(), close_ft))
                    || (self.at_spot && surface.is_spot(a.location(), close_ft))
                    || (self.at_runway && lining_up())
            })
            .map(|a| a.callsign.clone())
            .collect();
        eligible.sort();

        let mut rng = StdRng::seed_from_u64(tick_seed(self.seed, tick_index));
        let mut delayed = Vec::new();
        for callsign in eligible {
            if !rng.random_bool(self.prob_hold) {
                continue;
            }
            let Some(itinerary) = airport
                .get_aircraft_mut(&callsign)
                .and_then(|a| a.pilot_mut().itinerary_mut())
            else {
                continue;
            };
            itinerary.add_uncertainty_delay(self.delay);
            tracing::trace!("uncertainty: {} held for {}s", callsign, self.delay.num_seconds());
            delayed.push(callsign);
        }
        delayed
    }
}

/// Per-tick seed from the root seed and the tick index.
pub fn tick_seed(seed: u64, tick_index: u64) -> u64 {
    // splitmix64 finaliser over the combined value
    let mut z = seed ^ tick_index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
