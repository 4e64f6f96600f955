//! Infection-transmission edge construction with conflict resolution.
//!
//! Each infection event in a window becomes a candidate directed edge from
//! its resolved source to the infected participant. Two duplicate
//! suppression policies exist: per-run reconstruction rejects any candidate
//! whose target already accepted an edge within the time tolerance
//! (classifying the rejection as a duplicate or a multi-source conflict),
//! while animation frames only suppress exact repeats of the same pair,
//! favoring completeness.

use crate::anomalies::Anomalies;
use crate::config::IdSchema;
use crate::identity::{IdentityResolver, VertexId};
use crate::input::{Event, EventPayload, InfectionSource};
use crate::log::warn;

/// Resolved source of a transmission edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransmissionSource {
    /// Index case; no source vertex exists.
    IndexCase,
    /// Environmental or unknown-peer source.
    Environmental,
    /// Peer transmission from a resolved participant.
    Peer(VertexId),
}

/// One accepted transmission edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransmissionEdge {
    pub source: TransmissionSource,
    pub target: VertexId,
    pub time: i64,
    pub strain: String,
}

impl TransmissionEdge {
    /// The (source, target) vertex pair for peer transmissions; sentinel
    /// sources have no pair.
    #[must_use]
    pub fn peer_pair(&self) -> Option<(VertexId, VertexId)> {
        match self.source {
            TransmissionSource::Peer(source) => Some((source, self.target)),
            _ => None,
        }
    }
}

/// Duplicate-suppression policy for candidate edges.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Reject a candidate whose target accepted an edge within the given
    /// tolerance, in seconds. Used for per-run reconstruction.
    TimeTolerance(i64),
    /// Reject only an exact repeat of an accepted (source, target) pair.
    /// Used for animation frames.
    ExactPair,
}

pub struct InfectionNetworkBuilder<'a> {
    resolver: &'a IdentityResolver,
    schema: IdSchema,
    policy: DedupPolicy,
}

impl<'a> InfectionNetworkBuilder<'a> {
    #[must_use]
    pub fn new(
        resolver: &'a IdentityResolver,
        schema: IdSchema,
        policy: DedupPolicy,
    ) -> InfectionNetworkBuilder<'a> {
        InfectionNetworkBuilder {
            resolver,
            schema,
            policy,
        }
    }

    /// Builds the accepted edge list for one window, in event order.
    ///
    /// Unresolvable participants and rejected candidates are logged and
    /// counted; nothing here aborts the run.
    #[must_use]
    pub fn build(&self, window: &[&Event]) -> (Vec<TransmissionEdge>, Anomalies) {
        let mut edges: Vec<TransmissionEdge> = Vec::new();
        let mut anomalies = Anomalies::default();

        for event in window {
            let EventPayload::Infection(source) = &event.payload else {
                continue;
            };
            let Some(target) = self.resolver.vertex_of(event.participant) else {
                warn!("Cannot find participant {}", event.participant);
                anomalies.missing_peers += 1;
                continue;
            };
            match source {
                InfectionSource::Case0 { strain } => {
                    edges.push(TransmissionEdge {
                        source: TransmissionSource::IndexCase,
                        target,
                        time: event.time,
                        strain: strain.clone(),
                    });
                }
                InfectionSource::Environmental { strain } => {
                    edges.push(TransmissionEdge {
                        source: TransmissionSource::Environmental,
                        target,
                        time: event.time,
                        strain: strain.clone(),
                    });
                }
                InfectionSource::Peer { peer, strain } => {
                    let Some(source_vertex) = self.resolver.resolve_peer_vertex(peer, self.schema)
                    else {
                        warn!("Cannot find peer {}", peer);
                        anomalies.missing_peers += 1;
                        continue;
                    };
                    if self.accept_peer_edge(
                        &edges,
                        source_vertex,
                        target,
                        event.time,
                        &mut anomalies,
                    ) {
                        edges.push(TransmissionEdge {
                            source: TransmissionSource::Peer(source_vertex),
                            target,
                            time: event.time,
                            strain: strain.clone(),
                        });
                    }
                }
            }
        }

        (edges, anomalies)
    }

    // Applies the dedup policy against previously accepted peer edges.
    fn accept_peer_edge(
        &self,
        edges: &[TransmissionEdge],
        source: VertexId,
        target: VertexId,
        time: i64,
        anomalies: &mut Anomalies,
    ) -> bool {
        match self.policy {
            DedupPolicy::TimeTolerance(tolerance) => {
                for edge in edges {
                    let Some((prior_source, prior_target)) = edge.peer_pair() else {
                        continue;
                    };
                    if prior_target != target || (time - edge.time).abs() > tolerance {
                        continue;
                    }
                    if prior_source == source {
                        warn!(
                            "Duplicated infection: {} was already infected by {} within {}s",
                            self.participant_label(target),
                            self.participant_label(source),
                            tolerance
                        );
                        anomalies.duplicate_infections += 1;
                    } else {
                        warn!(
                            "Multiple infection: {} is being infected by {} but was already infected by {} within {}s",
                            self.participant_label(target),
                            self.participant_label(source),
                            self.participant_label(prior_source),
                            tolerance
                        );
                        anomalies.multiple_sources += 1;
                    }
                    return false;
                }
                true
            }
            DedupPolicy::ExactPair => {
                let repeated = edges
                    .iter()
                    .any(|edge| edge.peer_pair() == Some((source, target)));
                if repeated {
                    warn!(
                        "Duplicated infection {} {}",
                        self.participant_label(source),
                        self.participant_label(target)
                    );
                    anomalies.duplicate_infections += 1;
                }
                !repeated
            }
        }
    }

    fn participant_label(&self, vertex: VertexId) -> String {
        match self.resolver.participant_of(vertex) {
            Some(id) => id.to_string(),
            None => format!("vertex {vertex}"),
        }
    }
}
