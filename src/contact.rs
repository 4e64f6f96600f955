//! Contact aggregation over a window, keyed by unordered participant pair.
//!
//! Contact durations accumulate as rounded minutes per canonical pair, so
//! the two halves of a spanning contact and repeated contacts between the
//! same pair collapse into one weighted edge. Transmission pairs that lack
//! any recorded contact are backfilled with a default duration, since a
//! transmission implies a contact the devices failed to log.

use indexmap::IndexMap;

use crate::anomalies::Anomalies;
use crate::config::IdSchema;
use crate::identity::{IdentityResolver, VertexId};
use crate::infection::TransmissionEdge;
use crate::input::{Event, EventPayload};
use crate::log::warn;

/// Canonical unordered vertex pair: the lower index always comes first, so
/// (a, b) and (b, a) collide.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: VertexId,
    high: VertexId,
}

impl PairKey {
    #[must_use]
    pub fn new(a: VertexId, b: VertexId) -> PairKey {
        if a.0 <= b.0 {
            PairKey { low: a, high: b }
        } else {
            PairKey { low: b, high: a }
        }
    }

    #[must_use]
    pub fn low(&self) -> VertexId {
        self.low
    }

    #[must_use]
    pub fn high(&self) -> VertexId {
        self.high
    }
}

/// Accumulated contact minutes per pair. Insertion order is preserved so
/// derived edge lists are deterministic.
pub type ContactAggregate = IndexMap<PairKey, u32>;

pub struct ContactNetworkBuilder<'a> {
    resolver: &'a IdentityResolver,
    schema: IdSchema,
    default_minutes: u32,
}

impl<'a> ContactNetworkBuilder<'a> {
    #[must_use]
    pub fn new(
        resolver: &'a IdentityResolver,
        schema: IdSchema,
        default_minutes: u32,
    ) -> ContactNetworkBuilder<'a> {
        ContactNetworkBuilder {
            resolver,
            schema,
            default_minutes,
        }
    }

    /// Aggregates one window of contact events, then backfills missing
    /// contacts for the window's transmission edges.
    #[must_use]
    pub fn build(
        &self,
        window: &[&Event],
        transmissions: &[TransmissionEdge],
    ) -> (ContactAggregate, Anomalies) {
        let mut aggregate = ContactAggregate::default();
        let mut anomalies = Anomalies::default();

        for event in window {
            let EventPayload::Contact { peer, duration_ms } = &event.payload else {
                continue;
            };
            let Some(own) = self.resolver.vertex_of(event.participant) else {
                warn!("Cannot find participant {}", event.participant);
                anomalies.missing_peers += 1;
                continue;
            };
            let Some(other) = self.resolver.resolve_peer_vertex(peer, self.schema) else {
                warn!("Cannot find peer {}", peer);
                anomalies.missing_peers += 1;
                continue;
            };
            let minutes = (duration_ms / 60_000.0).round() as u32;
            *aggregate.entry(PairKey::new(own, other)).or_insert(0) += minutes;
        }

        // A transmission implies a contact; backfill pairs the devices
        // failed to record.
        for edge in transmissions {
            let Some((source, target)) = edge.peer_pair() else {
                continue;
            };
            let key = PairKey::new(source, target);
            if !aggregate.contains_key(&key) {
                aggregate.insert(key, self.default_minutes);
                warn!("Cannot find contact between {} and {}", source, target);
                anomalies.inferred_contacts += 1;
            }
        }

        (aggregate, anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infection::TransmissionSource;
    use crate::input::{P2pId, Participant, ParticipantId};

    fn resolver() -> IdentityResolver {
        let participants: Vec<Participant> = (0..6)
            .map(|i| Participant {
                id: ParticipantId(i),
                p2p_id: P2pId(format!("p{i}")),
            })
            .collect();
        IdentityResolver::new(&participants)
    }

    fn contact(owner: i64, peer: &str, duration_ms: f64, time: i64) -> Event {
        Event {
            participant: ParticipantId(owner),
            time,
            payload: EventPayload::Contact {
                peer: peer.to_string(),
                duration_ms,
            },
        }
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
    fn pair_key_is_canonical() {
        let key = PairKey::new(VertexId(5), VertexId(2));
        assert_eq!(key, PairKey::new(VertexId(2), VertexId(5)));
        assert_eq!(key.low(), VertexId(2));
        assert_eq!(key.high(), VertexId(5));
    }

    #[test]
    fn durations_accumulate_per_pair() {
        let resolver = resolver();
        let builder = ContactNetworkBuilder::new(&resolver, IdSchema::Internal, 10);
        // 3 minutes from one direction, 7 from the other: same pair.
        let events = [
            contact(1, "2", 180_000.0, 100),
            contact(2, "1", 420_000.0, 200),
        ];
        let refs: Vec<&Event> = events.iter().collect();
        let (aggregate, anomalies) = builder.build(&refs, &[]);
        assert_eq!(aggregate.len(), 1);
        assert_eq!(aggregate[&PairKey::new(VertexId(1), VertexId(2))], 10);
        assert_eq!(anomalies.total(), 0);
    }

    #[test]
    fn durations_round_to_minutes() {
        let resolver = resolver();
        let builder = ContactNetworkBuilder::new(&resolver, IdSchema::Internal, 10);
        let events = [contact(1, "2", 150_000.0, 100)];
        let refs: Vec<&Event> = events.iter().collect();
        let (aggregate, _) = builder.build(&refs, &[]);
        // 2.5 minutes rounds to 3.
        assert_eq!(aggregate[&PairKey::new(VertexId(1), VertexId(2))], 3);
    }

    #[test]
    fn transmission_without_contact_is_backfilled() {
        let resolver = resolver();
        let builder = ContactNetworkBuilder::new(&resolver, IdSchema::Internal, 10);
        let (aggregate, anomalies) = builder.build(&[], &[peer_edge(2, 5)]);
        assert_eq!(aggregate[&PairKey::new(VertexId(2), VertexId(5))], 10);
        assert_eq!(anomalies.inferred_contacts, 1);
    }

    #[test]
    fn recorded_contact_is_not_overwritten_by_backfill() {
        let resolver = resolver();
        let builder = ContactNetworkBuilder::new(&resolver, IdSchema::Internal, 10);
        let events = [contact(2, "5", 420_000.0, 100)];
        let refs: Vec<&Event> = events.iter().collect();
        let (aggregate, anomalies) = builder.build(&refs, &[peer_edge(5, 2)]);
        assert_eq!(aggregate[&PairKey::new(VertexId(2), VertexId(5))], 7);
        assert_eq!(anomalies.inferred_contacts, 0);
    }

    #[test]
    fn unknown_peer_is_counted_and_skipped() {
        let resolver = resolver();
        let builder = ContactNetworkBuilder::new(&resolver, IdSchema::Internal, 10);
        let events = [contact(1, "99", 60_000.0, 100)];
        let refs: Vec<&Event> = events.iter().collect();
        let (aggregate, anomalies) = builder.build(&refs, &[]);
        assert!(aggregate.is_empty());
        assert_eq!(anomalies.missing_peers, 1);
    }

    #[test]
    fn legacy_peers_resolve_through_the_p2p_map() {
        let resolver = resolver();
        let builder = ContactNetworkBuilder::new(&resolver, IdSchema::Legacy, 10);
        let events = [contact(1, "p4", 60_000.0, 100)];
        let refs: Vec<&Event> = events.iter().collect();
        let (aggregate, _) = builder.build(&refs, &[]);
        assert_eq!(aggregate[&PairKey::new(VertexId(1), VertexId(4))], 1);
    }
}
