//! Per-participant epidemiological status, threaded across windows.
//!
//! The board is the single mutable accumulator of the sweep: each window's
//! events fold into it and the updated board feeds the next window. Terminal
//! outcomes (dead, recovered, vaccinated) are never regressed by a later
//! infection event.

use crate::anomalies::Anomalies;
use crate::config::IdSchema;
use crate::identity::{IdentityResolver, VertexId};
use crate::input::{Event, EventPayload, InfectionSource, OutcomeKind};
use crate::log::warn;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Susceptible,
    /// Infected as an index case, or promoted retroactively as an
    /// infection source.
    InfectedIndex,
    /// Infected through peer transmission.
    InfectedPeer,
    Dead,
    Recovered,
    Vaccinated,
}

impl Status {
    /// The numeric code used by the platform's exports.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Status::Susceptible => 0,
            Status::InfectedIndex => 1,
            Status::InfectedPeer => 2,
            Status::Dead => 3,
            Status::Recovered => 4,
            Status::Vaccinated => 5,
        }
    }

    #[must_use]
    pub fn is_infected(self) -> bool {
        matches!(self, Status::InfectedIndex | Status::InfectedPeer)
    }

    /// Terminal statuses are never overwritten by an infection.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Dead | Status::Recovered | Status::Vaccinated)
    }
}

/// Population counts for one time bucket.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub susceptible: usize,
    pub infected: usize,
    pub dead: usize,
    pub recovered: usize,
    pub vaccinated: usize,
}

/// One status slot per vertex.
#[derive(Clone, Debug)]
pub struct StatusBoard {
    statuses: Vec<Status>,
}

impl StatusBoard {
    /// A fresh board with every participant susceptible. Used only for the
    /// first window; later windows consume the previous board.
    #[must_use]
    pub fn new(vertex_count: usize) -> StatusBoard {
        StatusBoard {
            statuses: vec![Status::Susceptible; vertex_count],
        }
    }

    #[must_use]
    pub fn get(&self, vertex: VertexId) -> Status {
        self.statuses[vertex.0]
    }

    #[must_use]
    pub fn statuses(&self) -> &[Status] {
        &self.statuses
    }

    /// Folds one window of events into the board.
    ///
    /// Infection events set the target per descriptor kind (CASE0 → index,
    /// PEER → peer); a resolvable source that is still susceptible is
    /// promoted retroactively with a consistency warning, since its own
    /// history should already have marked it infected. Outcome events set
    /// terminal states unconditionally.
    pub fn update(
        &mut self,
        window: &[&Event],
        resolver: &IdentityResolver,
        schema: IdSchema,
    ) -> Anomalies {
        let mut anomalies = Anomalies::default();
        for event in window {
            match &event.payload {
                EventPayload::Infection(source) => {
                    self.apply_infection(event, source, resolver, schema, &mut anomalies);
                }
                EventPayload::Outcome(outcome) => {
                    let Some(vertex) = resolver.vertex_of(event.participant) else {
                        warn!("Cannot find participant {}", event.participant);
                        anomalies.missing_peers += 1;
                        continue;
                    };
                    self.statuses[vertex.0] = match outcome {
                        OutcomeKind::Dead => Status::Dead,
                        OutcomeKind::Recovered => Status::Recovered,
                        OutcomeKind::Vaccinated => Status::Vaccinated,
                    };
                }
                EventPayload::Contact { .. } => {}
            }
        }
        anomalies
    }

    fn apply_infection(
        &mut self,
        event: &Event,
        source: &InfectionSource,
        resolver: &IdentityResolver,
        schema: IdSchema,
        anomalies: &mut Anomalies,
    ) {
        let Some(target) = resolver.vertex_of(event.participant) else {
            warn!("Cannot find participant {}", event.participant);
            anomalies.missing_peers += 1;
            return;
        };
        match source {
            InfectionSource::Case0 { .. } => {
                self.set_infected(target, Status::InfectedIndex);
            }
            InfectionSource::Peer { peer, .. } => {
                self.set_infected(target, Status::InfectedPeer);
                match resolver.resolve_peer_vertex(peer, schema) {
                    Some(source_vertex) => {
                        if self.statuses[source_vertex.0] == Status::Susceptible {
                            self.statuses[source_vertex.0] = Status::InfectedIndex;
                            warn!(
                                "Infecting peer did not have correct status: {}",
                                source_vertex
                            );
                            anomalies.status_promotions += 1;
                        }
                    }
                    None => {
                        warn!("Cannot find peer {}", peer);
                        anomalies.missing_peers += 1;
                    }
                }
            }
            // Environmental sources carry no peer to promote and do not
            // change the target's categorical status.
            InfectionSource::Environmental { .. } => {}
        }
    }

    fn set_infected(&mut self, vertex: VertexId, status: Status) {
        if !self.statuses[vertex.0].is_terminal() {
            self.statuses[vertex.0] = status;
        }
    }

    /// The five exported population counts; both infected categories fold
    /// into one bucket.
    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for status in &self.statuses {
            match status {
                Status::Susceptible => counts.susceptible += 1,
                Status::InfectedIndex | Status::InfectedPeer => counts.infected += 1,
                Status::Dead => counts.dead += 1,
                Status::Recovered => counts.recovered += 1,
                Status::Vaccinated => counts.vaccinated += 1,
            }
        }
        counts
    }
}
