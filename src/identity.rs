//! Identity resolution across the run's three identifier spaces.
//!
//! Every participant carries an internal ID and a legacy peer-to-peer ID;
//! the resolver assigns each a dense vertex index in encounter order, which
//! is the canonical vertex ordering for every derived graph. A participant
//! referenced by an event but absent from the maps is an anomaly for the
//! caller to log and count, never a fatal error.

use rustc_hash::FxHashMap as HashMap;

use crate::config::IdSchema;
use crate::input::{P2pId, Participant, ParticipantId};
use crate::log::warn;

/// Dense vertex index, `0..n-1`, stable for the lifetime of a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct IdentityResolver {
    id_to_vertex: HashMap<ParticipantId, VertexId>,
    p2p_to_id: HashMap<P2pId, ParticipantId>,
    id_to_p2p: HashMap<ParticipantId, P2pId>,
    vertex_to_id: Vec<ParticipantId>,
}

impl IdentityResolver {
    /// Builds the bidirectional maps from the participant table. Vertex
    /// indices follow the table's order. Rows that would violate the 1:1
    /// correspondence between identifier spaces are warning-logged and
    /// dropped.
    #[must_use]
    pub fn new(participants: &[Participant]) -> IdentityResolver {
        let mut resolver = IdentityResolver {
            id_to_vertex: HashMap::default(),
            p2p_to_id: HashMap::default(),
            id_to_p2p: HashMap::default(),
            vertex_to_id: Vec::with_capacity(participants.len()),
        };
        for participant in participants {
            if resolver.id_to_vertex.contains_key(&participant.id) {
                warn!("Duplicate participant ID {}", participant.id);
                continue;
            }
            if resolver.p2p_to_id.contains_key(&participant.p2p_id) {
                warn!("Duplicate p2p ID {}", participant.p2p_id.0);
                continue;
            }
            let vertex = VertexId(resolver.vertex_to_id.len());
            resolver.id_to_vertex.insert(participant.id, vertex);
            resolver
                .p2p_to_id
                .insert(participant.p2p_id.clone(), participant.id);
            resolver
                .id_to_p2p
                .insert(participant.id, participant.p2p_id.clone());
            resolver.vertex_to_id.push(participant.id);
        }
        resolver
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_to_id.len()
    }

    #[must_use]
    pub fn vertex_of(&self, id: ParticipantId) -> Option<VertexId> {
        self.id_to_vertex.get(&id).copied()
    }

    #[must_use]
    pub fn participant_of(&self, vertex: VertexId) -> Option<ParticipantId> {
        self.vertex_to_id.get(vertex.0).copied()
    }

    #[must_use]
    pub fn p2p_to_participant(&self, p2p: &str) -> Option<ParticipantId> {
        self.p2p_to_id.get(&P2pId(p2p.to_string())).copied()
    }

    #[must_use]
    pub fn p2p_of(&self, id: ParticipantId) -> Option<&P2pId> {
        self.id_to_p2p.get(&id)
    }

    /// Resolves a raw peer reference from an event to a participant,
    /// honoring the schema the run was recorded under. Legacy peers need the
    /// extra p2p hop.
    #[must_use]
    pub fn resolve_peer(&self, raw: &str, schema: IdSchema) -> Option<ParticipantId> {
        match schema {
            IdSchema::Internal => {
                let id = parse_internal_id(raw)?;
                let id = ParticipantId(id);
                self.id_to_vertex.contains_key(&id).then_some(id)
            }
            IdSchema::Legacy => self.p2p_to_participant(raw),
        }
    }

    /// Like [`resolve_peer`](Self::resolve_peer) but straight to the vertex.
    #[must_use]
    pub fn resolve_peer_vertex(&self, raw: &str, schema: IdSchema) -> Option<VertexId> {
        self.vertex_of(self.resolve_peer(raw, schema)?)
    }
}

// Internal IDs are integers, but columns that passed through a spreadsheet
// tool sometimes carry them as floats ("3.0").
fn parse_internal_id(raw: &str) -> Option<i64> {
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }
    let float = raw.parse::<f64>().ok()?;
    (float.fract() == 0.0).then_some(float as i64)
}
