//! Final graph assembly for the rendering and export collaborators.
//!
//! Graphs are plain vertex/edge values: every participant is a vertex (in
//! canonical vertex order) whether or not it has edges, statuses and color
//! categories ride along as vertex attributes, and edges come from the
//! window builders. Layout and drawing happen elsewhere.

use crate::contact::{ContactAggregate, PairKey};
use crate::identity::{IdentityResolver, VertexId};
use crate::infection::TransmissionEdge;
use crate::input::ParticipantId;
use crate::lineage::LineageResolver;
use crate::status::{Status, StatusBoard};

/// Named color category for a status, as consumed by the plotting
/// collaborators. Both infected categories share a color.
#[must_use]
pub fn status_color(status: Status) -> &'static str {
    match status {
        Status::Susceptible => "cornflowerblue",
        Status::InfectedIndex | Status::InfectedPeer => "darkorange",
        Status::Dead => "darkgrey",
        Status::Recovered => "mediumseagreen",
        Status::Vaccinated => "darkorchid",
    }
}

/// One graph vertex with its exported attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vertex {
    pub participant: ParticipantId,
    pub status: Status,
    pub color: &'static str,
}

fn vertices(resolver: &IdentityResolver, board: &StatusBoard) -> Vec<Vertex> {
    (0..resolver.vertex_count())
        .map(|index| {
            let vertex = VertexId(index);
            let status = board.get(vertex);
            Vertex {
                participant: resolver
                    .participant_of(vertex)
                    .expect("vertex indices are dense"),
                status,
                color: status_color(status),
            }
        })
        .collect()
}

/// Effective reproduction number summary over one infection network.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct REffective {
    pub mean: f64,
    pub std_dev: f64,
}

/// Directed infection-transmission network.
#[derive(Clone, Debug)]
pub struct InfectionNetwork {
    vertices: Vec<Vertex>,
    /// Peer-transmission edges only; sentinel sources have no vertex.
    edges: Vec<TransmissionEdge>,
}

impl InfectionNetwork {
    #[must_use]
    pub fn build(
        resolver: &IdentityResolver,
        board: &StatusBoard,
        transmissions: &[TransmissionEdge],
    ) -> InfectionNetwork {
        InfectionNetwork {
            vertices: vertices(resolver, board),
            edges: transmissions
                .iter()
                .filter(|edge| edge.peer_pair().is_some())
                .cloned()
                .collect(),
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[must_use]
    pub fn edges(&self) -> &[TransmissionEdge] {
        &self.edges
    }

    /// Mean and population standard deviation of out-degree across vertices
    /// with at least one incident edge, or `None` when the network has no
    /// edges at all.
    #[must_use]
    pub fn r_effective(&self) -> Option<REffective> {
        let mut out_degree = vec![0usize; self.vertices.len()];
        let mut degree = vec![0usize; self.vertices.len()];
        for edge in &self.edges {
            let (source, target) = edge.peer_pair().expect("only peer edges are stored");
            out_degree[source.0] += 1;
            degree[source.0] += 1;
            degree[target.0] += 1;
        }
        let samples: Vec<f64> = degree
            .iter()
            .zip(&out_degree)
            .filter(|(&degree, _)| degree > 0)
            .map(|(_, &out)| out as f64)
            .collect();
        if samples.is_empty() {
            return None;
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let variance =
            samples.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        Some(REffective {
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

/// Undirected, duration-weighted contact network.
#[derive(Clone, Debug)]
pub struct ContactNetwork {
    vertices: Vec<Vertex>,
    edges: Vec<(PairKey, u32)>,
}

impl ContactNetwork {
    #[must_use]
    pub fn build(
        resolver: &IdentityResolver,
        board: &StatusBoard,
        aggregate: &ContactAggregate,
    ) -> ContactNetwork {
        ContactNetwork {
            vertices: vertices(resolver, board),
            edges: aggregate
                .iter()
                .map(|(&pair, &minutes)| (pair, minutes))
                .collect(),
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Edges with their accumulated contact minutes, in aggregation order.
    #[must_use]
    pub fn edges(&self) -> &[(PairKey, u32)] {
        &self.edges
    }
}

/// Directed graph of transitions between derived pathogen lineages. Vertices
/// are mutation nodes, labeled by mutation ID.
#[derive(Clone, Debug)]
pub struct LineageNetwork {
    labels: Vec<String>,
    edges: Vec<(usize, usize)>,
}

impl LineageNetwork {
    #[must_use]
    pub fn build(resolver: &LineageResolver) -> LineageNetwork {
        LineageNetwork {
            labels: resolver.node_labels(),
            edges: resolver.transitions().to_vec(),
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infection::TransmissionSource;
    use crate::input::{P2pId, Participant};

    fn resolver(n: i64) -> IdentityResolver {
        let participants: Vec<Participant> = (0..n)
            .map(|i| Participant {
                id: ParticipantId(i),
                p2p_id: P2pId(format!("p{i}")),
            })
            .collect();
        IdentityResolver::new(&participants)
    }

    fn peer_edge(source: usize, target: usize) -> TransmissionEdge {
        TransmissionEdge {
            source: TransmissionSource::Peer(VertexId(source)),
            target: VertexId(target),
            time: 0,
            strain: "A".to_string(),
        }
    }

    #[test]
    fn every_participant_is_a_vertex() {
        let resolver = resolver(4);
        let board = StatusBoard::new(4);
        let network = InfectionNetwork::build(&resolver, &board, &[]);
        assert_eq!(network.vertex_count(), 4);
        assert!(network
            .vertices()
            .iter()
            .all(|v| v.status == Status::Susceptible && v.color == "cornflowerblue"));
    }

    #[test]
    fn sentinel_edges_are_excluded_from_the_graph() {
        let resolver = resolver(4);
        let board = StatusBoard::new(4);
        let edges = vec![
            TransmissionEdge {
                source: TransmissionSource::IndexCase,
                target: VertexId(0),
                time: 0,
                strain: "A".to_string(),
            },
            peer_edge(0, 1),
        ];
        let network = InfectionNetwork::build(&resolver, &board, &edges);
        assert_eq!(network.edges().len(), 1);
        assert_eq!(network.edges()[0].target, VertexId(1));
    }

    #[test]
    fn r_effective_uses_out_degree_of_connected_vertices() {
        let resolver = resolver(5);
        let board = StatusBoard::new(5);
        let edges = vec![peer_edge(0, 1), peer_edge(0, 2), peer_edge(1, 3)];
        let network = InfectionNetwork::build(&resolver, &board, &edges);
        // Connected vertices 0..=3 have out-degrees [2, 1, 0, 0]; vertex 4
        // is isolated and excluded.
        let r = network.r_effective().unwrap();
        assert!((r.mean - 0.75).abs() < 1e-9);
        assert!((r.std_dev - 0.6875f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn r_effective_is_none_without_edges() {
        let resolver = resolver(3);
        let board = StatusBoard::new(3);
        let network = InfectionNetwork::build(&resolver, &board, &[]);
        assert!(network.r_effective().is_none());
    }

    #[test]
    fn contact_network_keeps_aggregation_order() {
        let resolver = resolver(4);
        let board = StatusBoard::new(4);
        let mut aggregate = ContactAggregate::default();
        aggregate.insert(PairKey::new(VertexId(2), VertexId(1)), 7);
        aggregate.insert(PairKey::new(VertexId(0), VertexId(3)), 10);
        let network = ContactNetwork::build(&resolver, &board, &aggregate);
        assert_eq!(network.vertex_count(), 4);
        assert_eq!(network.edges().len(), 2);
        assert_eq!(network.edges()[0], (PairKey::new(VertexId(1), VertexId(2)), 7));
        assert_eq!(network.edges()[1], (PairKey::new(VertexId(0), VertexId(3)), 10));
    }

    #[test]
    fn status_colors_match_the_export_table() {
        assert_eq!(status_color(Status::InfectedIndex), "darkorange");
        assert_eq!(status_color(Status::InfectedPeer), "darkorange");
        assert_eq!(status_color(Status::Dead), "darkgrey");
        assert_eq!(status_color(Status::Vaccinated), "darkorchid");
    }
}
