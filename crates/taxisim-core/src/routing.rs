//! Shortest taxi routes over the surface graph.
//!
//! The graph is every named node plus every link endpoint. Nodes closer than
//! the close-node threshold are joined with zero-length connector edges; every
//! link is inserted in both directions. One shortest-path tree is computed
//! toward each runway start, since the scheduler only ever asks for routes to
//! a runway.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RoutingError;
use crate::geo::Proximity;
use crate::link::Link;
use crate::node::Node;
use crate::route::Route;
use crate::surface::Surface;

const CACHE_MAGIC: &[u8; 4] = b"TXRC";
const CACHE_VERSION: u32 = 1;
/// Distinguishes temp files of concurrent writers in one process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenNode {
    dist: FloatOrd,
    index: usize,
}

/// Distances and next hops from every node toward one destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PathTree {
    dist: Vec<f64>,
    next: Vec<Option<usize>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachePayload {
    nodes: Vec<Node>,
    destinations: Vec<usize>,
    trees: Vec<PathTree>,
}

/// Precomputed shortest routes toward every runway start.
#[derive(Debug, Clone)]
pub struct RoutingExpert {
    nodes: Vec<Node>,
    index: HashMap<Node, usize>,
    /// `adjacency[u][v]` is the link oriented from `u` to `v`.
    adjacency: Vec<BTreeMap<usize, Link>>,
    destinations: Vec<usize>,
    /// Lowest index among the nodes close to each node.
    canonical: Vec<usize>,
    trees: HashMap<usize, PathTree>,
    proximity: Proximity,
    fingerprint: [u8; 32],
}

impl RoutingExpert {
    /// Build the graph and compute every tree.
    pub fn new(surface: &Surface, proximity: Proximity) -> Result<Self, RoutingError> {
        let mut expert = Self::graph(surface, proximity);
        expert.compute_trees();
        expert.verify()?;
        Ok(expert)
    }

    /// Like [`RoutingExpert::new`] but reuses a matching cache file in
    /// `cache_dir`, writing one when none matches.
    pub fn with_cache(surface: &Surface, proximity: Proximity, cache_dir: &Path) -> Result<Self, RoutingError> {
        let mut expert = Self::graph(surface, proximity);
        let path = expert.cache_path(cache_dir);

        match expert.load_cache(&path) {
            Ok(true) => {
                tracing::info!("Loaded routing table from {}", path.display());
                return Ok(expert);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Ignoring routing cache: {}", e),
        }

        expert.compute_trees();
        expert.verify()?;
        expert.save_cache(&path)?;
        tracing::info!("Saved routing table to {}", path.display());
        Ok(expert)
    }

    fn graph(surface: &Surface, proximity: Proximity) -> Self {
        let mut nodes: Vec<Node> = Vec::new();
        let mut index: HashMap<Node, usize> = HashMap::new();
        let mut intern = |node: &Node, nodes: &mut Vec<Node>| -> usize {
            *index.entry(node.clone()).or_insert_with(|| {
                nodes.push(node.clone());
                nodes.len() - 1
            })
        };

        for node in surface.nodes() {
            intern(node, &mut nodes);
        }
        let links: Vec<&Link> = surface.links().collect();
        let mut ends = Vec::with_capacity(links.len());
        for link in &links {
            let u = intern(link.start(), &mut nodes);
            let v = intern(link.end(), &mut nodes);
            ends.push((u, v));
        }
        let destinations: Vec<usize> = {
            let mut d: Vec<usize> = surface
                .runways
                .iter()
                .map(|r| intern(r.start(), &mut nodes))
                .collect();
            d.sort_unstable();
            d.dedup();
            d
        };

        let mut adjacency: Vec<BTreeMap<usize, Link>> = vec![BTreeMap::new(); nodes.len()];
        let mut canonical: Vec<usize> = (0..nodes.len()).collect();
        let mut connectors = 0usize;
        for u in 0..nodes.len() {
            for v in 0..nodes.len() {
                if u != v && nodes[u].is_close_to(&nodes[v], proximity.close_node_ft) {
                    adjacency[u].insert(v, Link::connector(&nodes[u], &nodes[v]));
                    canonical[u] = canonical[u].min(v);
                    connectors += 1;
                }
            }
        }
        for (link, (u, v)) in links.iter().zip(ends) {
            if u == v {
                continue;
            }
            insert_shorter(&mut adjacency[u], v, (*link).clone());
            insert_shorter(&mut adjacency[v], u, link.reversed());
        }

        let fingerprint = fingerprint(&nodes, &links, &proximity);
        tracing::debug!(
            "Routing graph: {} nodes, {} links, {} connectors, {} destinations",
            nodes.len(),
            links.len(),
            connectors,
            destinations.len()
        );

        Self {
            nodes,
            index,
            adjacency,
            destinations,
            canonical,
            trees: HashMap::new(),
            proximity,
            fingerprint,
        }
    }

    fn compute_trees(&mut self) {
        self.trees = self
            .destinations
            .iter()
            .map(|&d| (d, self.shortest_path_tree(d)))
            .collect();
    }

    /// Dijkstra from `dest` over reversed edges. Zero-length connectors are
    /// fine because a node only improves on a strictly shorter distance.
    fn shortest_path_tree(&self, dest: usize) -> PathTree {
        let n = self.nodes.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut next = vec![None; n];
        let mut open: BinaryHeap<Reverse<OpenNode>> = BinaryHeap::new();

        dist[dest] = 0.0;
        open.push(Reverse(OpenNode {
            dist: FloatOrd(0.0),
            index: dest,
        }));

        while let Some(Reverse(current)) = open.pop() {
            let u = current.index;
            if current.dist.0 > dist[u] {
                continue;
            }
            for &w in self.adjacency[u].keys() {
                // Edge w -> u is the one an aircraft at w would take.
                let Some(edge) = self.adjacency[w].get(&u) else {
                    continue;
                };
                let candidate = dist[u] + edge.length();
                if candidate < dist[w] {
                    dist[w] = candidate;
                    next[w] = Some(u);
                    open.push(Reverse(OpenNode {
                        dist: FloatOrd(candidate),
                        index: w,
                    }));
                }
            }
        }

        PathTree { dist, next }
    }

    /// Every reachable node must yield a completed route toward every
    /// destination.
    fn verify(&self) -> Result<(), RoutingError> {
        for (&dest, tree) in &self.trees {
            for src in 0..self.nodes.len() {
                if !tree.dist[src].is_finite() {
                    continue;
                }
                let route = self.reconstruct(src, dest, tree)?;
                if !route.is_completed(self.proximity.close_node_ft) {
                    return Err(RoutingError::IncompleteRoute {
                        from: self.nodes[src].name.clone(),
                        to: self.nodes[dest].name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn reconstruct(&self, src: usize, dest: usize, tree: &PathTree) -> Result<Route, RoutingError> {
        let mut route = Route::new(self.nodes[src].clone(), self.nodes[dest].clone());
        let mut current = src;
        let mut hops = 0usize;
        while current != dest {
            let incomplete = || RoutingError::IncompleteRoute {
                from: self.nodes[src].name.clone(),
                to: self.nodes[dest].name.clone(),
            };
            let next = tree.next[current].ok_or_else(incomplete)?;
            let link = self.adjacency[current].get(&next).ok_or_else(incomplete)?;
            route.add_link(link.clone(), self.proximity.close_node_ft)?;
            current = next;
            hops += 1;
            if hops > self.nodes.len() {
                return Err(incomplete());
            }
        }
        Ok(route)
    }

    /// Shortest route from `src` to `dst`, where `dst` is a runway start.
    ///
    /// Returns `None` when either node is unknown to the graph, `dst` is not
    /// a routing destination, or the two are disconnected.
    pub fn shortest_route(&self, src: &Node, dst: &Node) -> Option<Route> {
        let &s = self.index.get(src)?;
        let &d = self.index.get(dst)?;
        let tree = self.trees.get(&d)?;
        if !tree.dist[s].is_finite() {
            return None;
        }
        self.reconstruct(s, d, tree).ok()
    }

    /// The representative of the nodes fused with `node`. Named gates and
    /// spots win over link vertices at the same place.
    pub fn canonical(&self, node: &Node) -> Node {
        match self.index.get(node) {
            Some(&i) => self.nodes[self.canonical[i]].clone(),
            None => node.clone(),
        }
    }

    pub fn is_destination(&self, node: &Node) -> bool {
        self.index
            .get(node)
            .is_some_and(|i| self.trees.contains_key(i))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn destinations(&self) -> impl Iterator<Item = &Node> {
        self.destinations.iter().map(|&i| &self.nodes[i])
    }

    pub fn proximity(&self) -> &Proximity {
        &self.proximity
    }

    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(format!("routing-{}.bin", &self.fingerprint_hex()[..16]))
    }

    /// Ok(false) when there is no file or it belongs to another graph.
    fn load_cache(&mut self, path: &Path) -> Result<bool, RoutingError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(RoutingError::CacheIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut reader = BufReader::new(file);
        let format_err = |reason: String| RoutingError::CacheFormat {
            path: path.to_path_buf(),
            reason,
        };

        let mut header = [0u8; 4 + 4 + 32];
        reader
            .read_exact(&mut header)
            .map_err(|e| format_err(format!("short header: {e}")))?;
        if &header[..4] != CACHE_MAGIC {
            return Err(format_err("bad magic".to_string()));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != CACHE_VERSION {
            tracing::info!("Routing cache version {} is stale, recomputing", version);
            return Ok(false);
        }
        if header[8..] != self.fingerprint {
            return Ok(false);
        }

        let payload: CachePayload =
            bincode::deserialize_from(&mut reader).map_err(|e| format_err(e.to_string()))?;
        if payload.nodes != self.nodes || payload.destinations != self.destinations {
            return Ok(false);
        }
        if payload.trees.len() != payload.destinations.len()
            || payload.trees.iter().any(|t| t.dist.len() != self.nodes.len() || t.next.len() != self.nodes.len())
        {
            return Err(format_err("tree size mismatch".to_string()));
        }
        self.trees = payload.destinations.into_iter().zip(payload.trees).collect();
        Ok(true)
    }

    /// Write to a temp file in the same directory, then rename into place.
    fn save_cache(&self, path: &Path) -> Result<(), RoutingError> {
        let io_err = |source: std::io::Error| RoutingError::CacheIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let seq = TMP_SEQ.fetch_add(1, AtomicOrdering::Relaxed);
        let tmp = path.with_extension(format!("tmp-{}-{}", std::process::id(), seq));

        let payload = CachePayload {
            nodes: self.nodes.clone(),
            destinations: self.destinations.clone(),
            trees: self
                .destinations
                .iter()
                .filter_map(|d| self.trees.get(d).cloned())
                .collect(),
        };

        {
            let file = File::create(&tmp).map_err(io_err)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(CACHE_MAGIC).map_err(io_err)?;
            writer.write_all(&CACHE_VERSION.to_le_bytes()).map_err(io_err)?;
            writer.write_all(&self.fingerprint).map_err(io_err)?;
            bincode::serialize_into(&mut writer, &payload).map_err(|e| RoutingError::CacheFormat {
                path: tmp.clone(),
                reason: e.to_string(),
            })?;
            writer.flush().map_err(io_err)?;
        }
        fs::rename(&tmp, path).map_err(io_err)
    }
}

fn insert_shorter(edges: &mut BTreeMap<usize, Link>, to: usize, link: Link) {
    match edges.get(&to) {
        Some(existing) if existing.length() <= link.length() => {}
        _ => {
            edges.insert(to, link);
        }
    }
}

fn fingerprint(nodes: &[Node], links: &[&Link], proximity: &Proximity) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(proximity.close_node_ft.to_le_bytes());
    for link in links {
        for node in [link.start(), link.end()] {
            hasher.update(node.pos.lat.to_le_bytes());
            hasher.update(node.pos.lng.to_le_bytes());
        }
    }
    for node in nodes {
        hasher.update(node.pos.lat.to_le_bytes());
        hasher.update(node.pos.lng.to_le_bytes());
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_routes_from_both_gates_reach_runway() {
        let surface = fixtures::two_gate_surface();
        let prox = fixtures::proximity();
        let routing = RoutingExpert::new(&surface, prox).unwrap();
        let runway_start = surface.runways[0].start().clone();
        assert!(routing.is_destination(&runway_start));

        for gate in &surface.gates {
            let route = routing.shortest_route(gate, &runway_start).unwrap();
            assert_eq!(route.start(), gate);
            assert_eq!(route.end(), &runway_start);
            assert!(route.is_completed(prox.close_node_ft));
            let sum: f64 = route.links().iter().map(Link::length).sum();
            assert_eq!(route.distance(), sum);
            for pair in route.links().windows(2) {
                assert!(pair[0].end().is_close_to(pair[1].start(), prox.close_node_ft));
            }
        }
    }

    #[test]
    fn test_route_passes_through_spot() {
        let surface = fixtures::two_gate_surface();
        let prox = fixtures::proximity();
        let routing = RoutingExpert::new(&surface, prox).unwrap();
        let route = routing
            .shortest_route(&surface.gates[0], surface.runways[0].start())
            .unwrap();
        let legs = route.legs(prox.close_node_ft);
        assert_eq!(legs.len(), 3);
        assert!(surface.is_spot(&legs[1].node, prox.close_node_ft));
        assert!((legs[1].distance_ft - 3648.0).abs() < 5.0);
        assert_eq!(routing.canonical(&legs[1].node), surface.spots[0]);
        assert_eq!(&routing.canonical(&legs[2].node), surface.runways[0].start());
    }

    #[test]
    fn test_non_destination_and_disconnected_return_none() {
        let mut surface = fixtures::two_gate_surface();
        surface.gates.push(Node::new("G9", 47.9, -122.2));
        let prox = fixtures::proximity();
        let routing = RoutingExpert::new(&surface, prox).unwrap();
        let runway_start = surface.runways[0].start().clone();

        let island = surface.get_node("G9").unwrap();
        assert!(routing.shortest_route(island, &runway_start).is_none());
        assert!(routing
            .shortest_route(&surface.gates[0], &surface.spots[0])
            .is_none());
    }

    #[test]
    fn test_shorter_parallel_edge_wins() {
        let a = Node::new("a", 0.0, 0.0);
        let b = Node::new("b", 0.0, 0.01);
        let mut edges = BTreeMap::new();
        let detour = Link::new("long", vec![a.clone(), Node::new("m", 0.01, 0.005), b.clone()]).unwrap();
        let direct = Link::new("short", vec![a, b]).unwrap();
        insert_shorter(&mut edges, 1, detour);
        insert_shorter(&mut edges, 1, direct);
        assert_eq!(edges[&1].name(), "short");
    }

    #[test]
    fn test_cache_round_trip_and_fingerprint_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let surface = fixtures::two_gate_surface();
        let prox = fixtures::proximity();

        let built = RoutingExpert::with_cache(&surface, prox, dir.path()).unwrap();
        let path = built.cache_path(dir.path());
        assert!(path.exists());

        let mut loaded = RoutingExpert::graph(&surface, prox);
        assert!(loaded.load_cache(&path).unwrap());
        let runway_start = surface.runways[0].start();
        assert_eq!(
            loaded.shortest_route(&surface.gates[1], runway_start),
            built.shortest_route(&surface.gates[1], runway_start)
        );

        // Same file presented to a different graph is ignored.
        let mut other_surface = surface.clone();
        other_surface.gates.push(Node::new("G3", 47.802, -122.079057));
        let mut other = RoutingExpert::graph(&other_surface, prox);
        assert!(!other.load_cache(&path).unwrap());
    }

    #[test]
    fn test_corrupt_cache_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let surface = fixtures::two_gate_surface();
        let prox = fixtures::proximity();
        let mut expert = RoutingExpert::graph(&surface, prox);
        let path = expert.cache_path(dir.path());
        fs::write(&path, b"nope").unwrap();
        assert!(expert.load_cache(&path).is_err());

        // with_cache recovers by recomputing.
        let rebuilt = RoutingExpert::with_cache(&surface, prox, dir.path()).unwrap();
        assert!(rebuilt
            .shortest_route(&surface.gates[0], surface.runways[0].start())
            .is_some());
    }
}
