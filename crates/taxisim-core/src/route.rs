//! A concrete sequence of links between two nodes.

use crate::error::RoutingError;
use crate::link::Link;
use crate::node::Node;

/// One waypoint of a route with the along-route distance from the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub node: Node,
    pub distance_ft: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    start: Node,
    end: Node,
    links: Vec<Link>,
}

impl Route {
    pub fn new(start: Node, end: Node) -> Self {
        Self {
            start,
            end,
            links: Vec::new(),
        }
    }

    pub fn start(&self) -> &Node {
        &self.start
    }

    pub fn end(&self) -> &Node {
        &self.end
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Append a link that must begin where the route currently ends.
    pub fn add_link(&mut self, link: Link, threshold_ft: f64) -> Result<(), RoutingError> {
        let tail = self.links.last().map(|l| l.end()).unwrap_or(&self.start);
        if !tail.is_close_to(link.start(), threshold_ft) {
            return Err(RoutingError::NotConnected {
                link: link.name().to_string(),
                from: self.start.name.clone(),
                to: self.end.name.clone(),
            });
        }
        self.links.push(link);
        Ok(())
    }

    /// Sum of link lengths in feet.
    pub fn distance(&self) -> f64 {
        self.links.iter().map(Link::length).sum()
    }

    /// Links chain from `start` to `end` with every joint within `threshold_ft`.
    pub fn is_completed(&self, threshold_ft: f64) -> bool {
        let Some(first) = self.links.first() else {
            return self.start.is_close_to(&self.end, threshold_ft);
        };
        let Some(last) = self.links.last() else {
            return false;
        };
        first.start().is_close_to(&self.start, threshold_ft)
            && last.end().is_close_to(&self.end, threshold_ft)
            && self
                .links
                .windows(2)
                .all(|w| w[0].end().is_close_to(w[1].start(), threshold_ft))
    }

    /// Start, the start of every link after the first, then end.
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes = vec![self.start.clone()];
        nodes.extend(self.links.iter().skip(1).map(|l| l.start().clone()));
        nodes.push(self.end.clone());
        nodes
    }

    /// Waypoints for an itinerary.
    ///
    /// Runs of nodes that are the same physical point collapse into the first
    /// one, except that the final waypoint is always `end`.
    pub fn legs(&self, threshold_ft: f64) -> Vec<Leg> {
        let mut legs = vec![Leg {
            node: self.start.clone(),
            distance_ft: 0.0,
        }];
        let mut pending = 0.0;
        for link in &self.links {
            pending += link.length();
            let Some(prev) = legs.last() else {
                continue;
            };
            if link.end().is_close_to(&prev.node, threshold_ft) {
                continue;
            }
            legs.push(Leg {
                node: link.end().clone(),
                distance_ft: pending,
            });
            pending = 0.0;
        }

        if legs.len() == 1 {
            if self.start != self.end {
                legs.push(Leg {
                    node: self.end.clone(),
                    distance_ft: pending,
                });
            }
        } else if let Some(last) = legs.last_mut() {
            last.node = self.end.clone();
            last.distance_ft += pending;
        }
        legs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 10.0;

    fn n(name: &str, lat: f64, lng: f64) -> Node {
        Node::new(name, lat, lng)
    }

    fn gate_to_runway() -> Route {
        let g1 = n("G1", 47.812, -122.079);
        let pb0 = n("PB#0", 47.812, -122.079);
        let pb1 = n("PB#1", 47.822, -122.079);
        let s1 = n("S1", 47.822, -122.079);
        let r = n("R1#0", 47.822, -122.069);

        let mut route = Route::new(g1.clone(), r.clone());
        route.add_link(Link::connector(&g1, &pb0), EPS).unwrap();
        route
            .add_link(Link::new("PB", vec![pb0, pb1.clone()]).unwrap(), EPS)
            .unwrap();
        route.add_link(Link::connector(&pb1, &s1), EPS).unwrap();
        route
            .add_link(Link::new("T1", vec![s1, r]).unwrap(), EPS)
            .unwrap();
        route
    }

    #[test]
    fn test_route_distance_matches_links() {
        let route = gate_to_runway();
        let sum: f64 = route.links().iter().map(Link::length).sum();
        assert_eq!(route.distance(), sum);
        assert!(route.is_completed(EPS));
        assert_eq!(route.nodes().len(), 5);
    }

    #[test]
    fn test_add_link_rejects_gap() {
        let mut route = Route::new(n("A", 0.0, 0.0), n("C", 0.0, 0.02));
        let err = route
            .add_link(Link::new("BC", vec![n("B", 0.0, 0.01), n("C", 0.0, 0.02)]).unwrap(), EPS)
            .unwrap_err();
        assert!(matches!(err, RoutingError::NotConnected { .. }));
        assert!(!route.is_completed(EPS));
    }

    #[test]
    fn test_legs_collapse_fused_nodes() {
        let route = gate_to_runway();
        let legs = route.legs(EPS);
        let names: Vec<&str> = legs.iter().map(|l| l.node.name.as_str()).collect();
        assert_eq!(names, vec!["G1", "PB#1", "R1#0"]);
        assert_eq!(legs[0].distance_ft, 0.0);
        let total: f64 = legs.iter().map(|l| l.distance_ft).sum();
        assert!((total - route.distance()).abs() < 1e-9);
    }

    #[test]
    fn test_trivial_route() {
        let a = n("A", 1.0, 1.0);
        let route = Route::new(a.clone(), a.clone());
        assert!(route.is_completed(EPS));
        assert_eq!(route.distance(), 0.0);
        assert_eq!(route.legs(EPS).len(), 1);
    }
}
