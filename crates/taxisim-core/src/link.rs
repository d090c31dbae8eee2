//! Polylines connecting surface nodes.

use serde::Serialize;

use crate::error::SurfaceError;
use crate::geo::{feet_to_lat, feet_to_lng, Proximity};
use crate::node::Node;

/// Name used for zero-length links between fused nodes.
pub const CLOSE_NODE_LINK: &str = "CLOSE_NODE_LINK";

/// A named, ordered polyline of at least two nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    name: String,
    nodes: Vec<Node>,
    length: f64,
}

impl Link {
    pub fn new(name: impl Into<String>, nodes: Vec<Node>) -> Result<Self, SurfaceError> {
        let name = name.into();
        if nodes.len() < 2 {
            return Err(SurfaceError::TooFewNodes(name));
        }
        let length = nodes.windows(2).map(|w| w[0].distance_to(&w[1])).sum();
        Ok(Self {
            name,
            nodes,
            length,
        })
    }

    /// Zero-length edge joining two nodes that are the same physical point.
    pub fn connector(from: &Node, to: &Node) -> Self {
        Self {
            name: CLOSE_NODE_LINK.to_string(),
            nodes: vec![from.clone(), to.clone()],
            length: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Sum of segment distances in feet.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn start(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn end(&self) -> &Node {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn is_connector(&self) -> bool {
        self.name == CLOSE_NODE_LINK && self.length == 0.0
    }

    /// Same link traversed the other way; keeps the name.
    pub fn reversed(&self) -> Link {
        let mut nodes = self.nodes.clone();
        nodes.reverse();
        Link {
            name: self.name.clone(),
            nodes,
            length: self.length,
        }
    }

    /// True if `node` lies on an interior point of the link.
    pub fn contains_node(&self, node: &Node, proximity: &Proximity) -> bool {
        self.segment_containing(node, proximity).is_some()
    }

    /// Index of the first segment that `node` lies on, excluding the endpoints.
    fn segment_containing(&self, node: &Node, proximity: &Proximity) -> Option<usize> {
        if !self.bounds_contain(node, proximity.close_node_link_ft) {
            return None;
        }
        if node.is_close_to(self.start(), proximity.close_node_ft)
            || node.is_close_to(self.end(), proximity.close_node_ft)
        {
            return None;
        }
        self.nodes.windows(2).position(|w| {
            let slack = w[0].distance_to(node) + node.distance_to(&w[1]) - w[0].distance_to(&w[1]);
            slack < proximity.close_node_link_ft
        })
    }

    fn bounds_contain(&self, node: &Node, margin_ft: f64) -> bool {
        let mut min_lat = f64::INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        let mut min_lng = f64::INFINITY;
        let mut max_lng = f64::NEG_INFINITY;
        for n in &self.nodes {
            min_lat = min_lat.min(n.pos.lat);
            max_lat = max_lat.max(n.pos.lat);
            min_lng = min_lng.min(n.pos.lng);
            max_lng = max_lng.max(n.pos.lng);
        }
        let d_lat = feet_to_lat(margin_ft, node.pos.lat);
        let d_lng = feet_to_lng(margin_ft, node.pos.lat);
        node.pos.lat >= min_lat - d_lat
            && node.pos.lat <= max_lat + d_lat
            && node.pos.lng >= min_lng - d_lng
            && node.pos.lng <= max_lng + d_lng
    }

    /// Split into `<name>-b1` and `<name>-b2` at `node`.
    ///
    /// If `node` coincides with an interior vertex, it replaces that vertex.
    pub fn break_at(&self, node: &Node, proximity: &Proximity) -> Result<(Link, Link), SurfaceError> {
        if node.is_close_to(self.start(), proximity.close_node_ft)
            || node.is_close_to(self.end(), proximity.close_node_ft)
        {
            return Err(SurfaceError::BreakAtEndpoint {
                node: node.name.clone(),
                link: self.name.clone(),
            });
        }
        let Some(i) = self.segment_containing(node, proximity) else {
            return Err(SurfaceError::NodeNotOnLink {
                node: node.name.clone(),
                link: self.name.clone(),
            });
        };

        let last = self.nodes.len() - 1;
        let (head_end, tail_start) = if i > 0 && node.is_close_to(&self.nodes[i], proximity.close_node_ft) {
            (i, i + 1)
        } else if i + 1 < last && node.is_close_to(&self.nodes[i + 1], proximity.close_node_ft) {
            (i + 1, i + 2)
        } else {
            (i + 1, i + 1)
        };

        let mut head: Vec<Node> = self.nodes[..head_end].to_vec();
        head.push(node.clone());
        let mut tail = vec![node.clone()];
        tail.extend_from_slice(&self.nodes[tail_start..]);

        Ok((
            Link::new(format!("{}-b1", self.name), head)?,
            Link::new(format!("{}-b2", self.name), tail)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_link() -> Link {
        Link::new(
            "T1",
            vec![
                Node::new("T1#0", 47.812, -122.079),
                Node::new("T1#1", 47.822, -122.079),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_link_needs_two_nodes() {
        let err = Link::new("X", vec![Node::new("a", 0.0, 0.0)]).unwrap_err();
        assert!(matches!(err, SurfaceError::TooFewNodes(name) if name == "X"));
    }

    #[test]
    fn test_length_and_reverse() {
        let link = straight_link();
        assert!((link.length() - 3648.0).abs() < 5.0);
        let rev = link.reversed();
        assert_eq!(rev.name(), "T1");
        assert_eq!(rev.start(), link.end());
        assert_eq!(rev.end(), link.start());
        assert_eq!(rev.length(), link.length());
    }

    #[test]
    fn test_contains_node_excludes_endpoints() {
        let prox = Proximity::default();
        let link = straight_link();
        let middle = Node::new("S1", 47.817, -122.079);
        let off_axis = Node::new("X", 47.817, -122.078);
        let at_start = Node::new("G1", 47.812, -122.079);

        assert!(link.contains_node(&middle, &prox));
        assert!(!link.contains_node(&off_axis, &prox));
        assert!(!link.contains_node(&at_start, &prox));

        let slack = link.start().distance_to(&middle) + middle.distance_to(link.end())
            - link.start().distance_to(link.end());
        assert!(slack < prox.close_node_link_ft);
    }

    #[test]
    fn test_break_at_splits_in_two() {
        let prox = Proximity::default();
        let link = straight_link();
        let middle = Node::new("S1", 47.817, -122.079);

        let (b1, b2) = link.break_at(&middle, &prox).unwrap();
        assert_eq!(b1.name(), "T1-b1");
        assert_eq!(b2.name(), "T1-b2");
        assert_eq!(b1.start(), link.start());
        assert_eq!(b1.end(), &middle);
        assert_eq!(b2.start(), &middle);
        assert_eq!(b2.end(), link.end());
        assert!((b1.length() + b2.length() - link.length()).abs() < 0.5);
    }

    #[test]
    fn test_break_at_replaces_interior_vertex() {
        let prox = Proximity::default();
        let link = Link::new(
            "T2",
            vec![
                Node::new("a", 47.812, -122.079),
                Node::new("b", 47.817, -122.079),
                Node::new("c", 47.817, -122.070),
            ],
        )
        .unwrap();
        let spot = Node::new("S1", 47.817, -122.079);
        let (b1, b2) = link.break_at(&spot, &prox).unwrap();
        assert_eq!(b1.nodes().len(), 2);
        assert_eq!(b2.nodes().len(), 2);
        assert_eq!(b1.end(), &spot);
        assert_eq!(b2.end().name, "c");
    }

    #[test]
    fn test_break_at_rejects_endpoint_and_outside_nodes() {
        let prox = Proximity::default();
        let link = straight_link();
        let end = Node::new("R", 47.822, -122.079);
        assert!(matches!(
            link.break_at(&end, &prox),
            Err(SurfaceError::BreakAtEndpoint { .. })
        ));
        let away = Node::new("X", 47.9, -122.0);
        assert!(matches!(
            link.break_at(&away, &prox),
            Err(SurfaceError::NodeNotOnLink { .. })
        ));
    }

    #[test]
    fn test_connector_has_zero_length() {
        let a = Node::new("a", 1.0, 1.0);
        let b = Node::new("b", 1.0, 1.0);
        let link = Link::connector(&a, &b);
        assert!(link.is_connector());
        assert_eq!(link.length(), 0.0);
        assert_eq!(link.start(), &a);
    }
}
