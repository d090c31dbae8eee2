//! Airport surface: gates, spots and the links between them.
//!
//! A surface is read from a directory of JSON files (one per role) and then
//! normalised with [`Surface::break_links`] before routing.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::SurfaceError;
use crate::geo::{GeoPos, Proximity};
use crate::link::Link;
use crate::node::Node;

pub const METADATA_FILE: &str = "airport-metadata.json";
pub const GATES_FILE: &str = "gates.json";
pub const SPOTS_FILE: &str = "spots.json";
pub const RUNWAYS_FILE: &str = "runways.json";
pub const TAXIWAYS_FILE: &str = "taxiways.json";
pub const PUSHBACK_WAYS_FILE: &str = "pushback_ways.json";

#[derive(Debug, Deserialize)]
struct RawPoint {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    name: String,
    center: RawPoint,
    #[serde(default)]
    corners: Vec<RawPoint>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    name: String,
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    name: String,
    /// GeoJSON order: [lng, lat].
    nodes: Vec<[f64; 2]>,
}

/// Collections of surface elements grouped by role.
#[derive(Debug, Clone)]
pub struct Surface {
    pub name: String,
    pub center: GeoPos,
    pub corners: Vec<GeoPos>,
    pub gates: Vec<Node>,
    pub spots: Vec<Node>,
    pub runways: Vec<Link>,
    pub taxiways: Vec<Link>,
    pub pushback_ways: Vec<Link>,
}

impl Surface {
    /// Surface with no elements; fill the role vectors directly.
    pub fn new(name: impl Into<String>, center: GeoPos) -> Self {
        Self {
            name: name.into(),
            center,
            corners: Vec::new(),
            gates: Vec::new(),
            spots: Vec::new(),
            runways: Vec::new(),
            taxiways: Vec::new(),
            pushback_ways: Vec::new(),
        }
    }

    /// Load every role file from `dir`.
    pub fn load(dir: &Path) -> Result<Self, SurfaceError> {
        let meta: RawMetadata = read_json(&dir.join(METADATA_FILE))?;
        let mut surface = Surface::new(meta.name, GeoPos::new(meta.center.lat, meta.center.lng));
        surface.corners = meta
            .corners
            .into_iter()
            .map(|p| GeoPos::new(p.lat, p.lng))
            .collect();

        surface.gates = load_nodes(&dir.join(GATES_FILE))?;
        surface.spots = load_nodes(&dir.join(SPOTS_FILE))?;
        surface.runways = load_links(&dir.join(RUNWAYS_FILE))?;
        surface.taxiways = load_links(&dir.join(TAXIWAYS_FILE))?;
        surface.pushback_ways = load_links(&dir.join(PUSHBACK_WAYS_FILE))?;

        tracing::info!(
            "Loaded surface {}: {} gates, {} spots, {} runways, {} taxiways, {} pushback ways",
            surface.name,
            surface.gates.len(),
            surface.spots.len(),
            surface.runways.len(),
            surface.taxiways.len(),
            surface.pushback_ways.len()
        );
        Ok(surface)
    }

    /// Named nodes: gates then spots.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.gates.iter().chain(self.spots.iter())
    }

    /// All links: runways, taxiways, then pushback ways.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.runways
            .iter()
            .chain(self.taxiways.iter())
            .chain(self.pushback_ways.iter())
    }

    /// Endpoints of every runway link.
    pub fn runway_nodes(&self) -> Vec<Node> {
        self.runways
            .iter()
            .flat_map(|r| [r.start().clone(), r.end().clone()])
            .collect()
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes().find(|n| n.name == name)
    }

    pub fn get_link(&self, name: &str) -> Option<&Link> {
        self.links().find(|l| l.name() == name)
    }

    pub fn is_gate(&self, node: &Node, threshold_ft: f64) -> bool {
        self.gates.iter().any(|g| g.is_close_to(node, threshold_ft))
    }

    pub fn is_spot(&self, node: &Node, threshold_ft: f64) -> bool {
        self.spots.iter().any(|s| s.is_close_to(node, threshold_ft))
    }

    /// Split taxiways and pushback ways wherever a gate, a spot, or another
    /// link's endpoint sits in their interior. Runways are never split.
    ///
    /// Returns the number of splits performed.
    pub fn break_links(&mut self, proximity: &Proximity) -> Result<usize, SurfaceError> {
        let mut candidates: Vec<Node> = self.nodes().cloned().collect();
        for link in self.links() {
            candidates.push(link.start().clone());
            candidates.push(link.end().clone());
        }

        let mut splits = 0;
        for node in &candidates {
            splits += break_links_at(&mut self.taxiways, node, proximity)?;
            splits += break_links_at(&mut self.pushback_ways, node, proximity)?;
        }
        if splits > 0 {
            tracing::debug!("Surface {}: broke links {} time(s)", self.name, splits);
        }
        Ok(splits)
    }
}

fn break_links_at(links: &mut Vec<Link>, node: &Node, proximity: &Proximity) -> Result<usize, SurfaceError> {
    let mut splits = 0;
    let mut i = 0;
    while i < links.len() {
        if links[i].contains_node(node, proximity) {
            let (head, tail) = links[i].break_at(node, proximity)?;
            links[i] = head;
            links.push(tail);
            splits += 1;
            // The shortened link may still contain the node on another segment.
            continue;
        }
        i += 1;
    }
    Ok(splits)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SurfaceError> {
    let data = fs::read_to_string(path).map_err(|source| SurfaceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| SurfaceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_nodes(path: &Path) -> Result<Vec<Node>, SurfaceError> {
    let raw: Vec<RawNode> = read_json(path)?;
    raw.into_iter()
        .map(|r| {
            let node = Node::new(r.name, r.lat, r.lng);
            if node.pos.is_valid() {
                Ok(node)
            } else {
                Err(SurfaceError::InvalidCoordinate(node.name))
            }
        })
        .collect()
}

fn load_links(path: &Path) -> Result<Vec<Link>, SurfaceError> {
    let raw: Vec<RawLink> = read_json(path)?;
    raw.into_iter()
        .map(|r| {
            let nodes = r
                .nodes
                .iter()
                .enumerate()
                .map(|(i, [lng, lat])| {
                    let node = Node::new(format!("{}#{}", r.name, i), *lat, *lng);
                    if node.pos.is_valid() {
                        Ok(node)
                    } else {
                        Err(SurfaceError::InvalidCoordinate(node.name))
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            Link::new(r.name, nodes)
        })
        .collect()
}
