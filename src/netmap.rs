use crate::risk::RiskTier;
use serde::Serialize;
use std::f64::consts::PI;

const RING_RADIUS: f64 = 3.0;
const PORT_NODE_COLOR: &str = "#00ff41";

/// One positioned node in the topology diagram.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MapNode {
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub color: &'static str,
}

/// Edge between two node indices.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEdge {
    pub from: usize,
    pub to: usize,
}

/// Radial topology layout for a scanned target: the target sits at the
/// origin, colored by risk tier, and each open port gets a node on a
/// surrounding ring with an edge back to the target. Purely presentational;
/// consumed by the web UI renderer.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NetworkMap {
    pub nodes: Vec<MapNode>,
    pub edges: Vec<MapEdge>,
}

impl NetworkMap {
    pub fn layout(target: &str, open_ports: &[u16], risk: RiskTier) -> Self {
        let step = 2.0 * PI / open_ports.len().max(1) as f64;

        let mut nodes = Vec::with_capacity(open_ports.len() + 1);
        nodes.push(MapNode {
            label: target.to_string(),
            x: 0.0,
            y: 0.0,
            color: risk.color(),
        });

        let mut edges = Vec::with_capacity(open_ports.len());
        for (i, port) in open_ports.iter().enumerate() {
            let angle = i as f64 * step;
            nodes.push(MapNode {
                label: format!("Port {port}"),
                x: RING_RADIUS * angle.cos(),
                y: RING_RADIUS * angle.sin(),
                color: PORT_NODE_COLOR,
            });
            edges.push(MapEdge { from: 0, to: i + 1 });
        }

        Self { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_sits_at_origin_colored_by_tier() {
        let map = NetworkMap::layout("10.0.0.1", &[22, 80], RiskTier::High);
        assert_eq!(map.nodes[0].label, "10.0.0.1");
        assert_eq!((map.nodes[0].x, map.nodes[0].y), (0.0, 0.0));
        assert_eq!(map.nodes[0].color, "red");
    }

    #[test]
    fn one_ring_node_and_edge_per_open_port() {
        let map = NetworkMap::layout("10.0.0.1", &[22, 80, 443, 8080], RiskTier::Medium);
        assert_eq!(map.nodes.len(), 5);
        assert_eq!(map.edges.len(), 4);
        assert!(map.edges.iter().all(|e| e.from == 0));
        assert_eq!(map.nodes[1].label, "Port 22");
        // Ring nodes stay on the circle.
        for node in &map.nodes[1..] {
            let r = (node.x * node.x + node.y * node.y).sqrt();
            assert!((r - 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn no_open_ports_yields_lone_target_node() {
        let map = NetworkMap::layout("10.0.0.1", &[], RiskTier::Low);
        assert_eq!(map.nodes.len(), 1);
        assert!(map.edges.is_empty());
        assert_eq!(map.nodes[0].color, "green");
    }
}
