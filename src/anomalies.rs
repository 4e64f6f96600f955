//! Counters for the recoverable anomalies encountered during a run.
//!
//! Every anomaly in these categories is logged and counted where it occurs;
//! the correct response is always "skip and count", never "abort".

/// Per-component anomaly counters, merged into run totals by the sweep.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Anomalies {
    /// Events referencing a participant or peer absent from the identity maps.
    pub missing_peers: u64,
    /// Infection candidates rejected as duplicates of an accepted edge.
    pub duplicate_infections: u64,
    /// Infection candidates rejected because the target already has an
    /// accepted edge from a different source within the tolerance.
    pub multiple_sources: u64,
    /// Contact pairs backfilled from a transmission with a default duration.
    pub inferred_contacts: u64,
    /// Infection sources retroactively promoted from Susceptible.
    pub status_promotions: u64,
}

impl Anomalies {
    pub fn merge(&mut self, other: &Anomalies) {
        self.missing_peers += other.missing_peers;
        self.duplicate_infections += other.duplicate_infections;
        self.multiple_sources += other.multiple_sources;
        self.inferred_contacts += other.inferred_contacts;
        self.status_promotions += other.status_promotions;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.missing_peers
            + self.duplicate_infections
            + self.multiple_sources
            + self.inferred_contacts
            + self.status_promotions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_counters() {
        let mut totals = Anomalies {
            missing_peers: 1,
            ..Default::default()
        };
        totals.merge(&Anomalies {
            missing_peers: 2,
            inferred_contacts: 3,
            ..Default::default()
        });
        assert_eq!(totals.missing_peers, 3);
        assert_eq!(totals.inferred_contacts, 3);
        assert_eq!(totals.total(), 6);
    }
}
