//! The batch sweep: one sequential pass over consecutive time windows.
//!
//! The sweep owns the run's only mutable accumulator, the status board,
//! and threads it from each window into the next. Every other per-window
//! product (transmission edges, contact aggregate, population counts) is
//! derived fresh from that window's events. Windows only read the shared
//! identity and event data, so everything here is single-threaded by
//! construction.

use chrono::{Duration, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::anomalies::Anomalies;
use crate::config::SimProperties;
use crate::contact::{ContactAggregate, ContactNetworkBuilder};
use crate::error::EpinetError;
use crate::identity::IdentityResolver;
use crate::infection::{DedupPolicy, InfectionNetworkBuilder, TransmissionEdge};
use crate::input::{Dataset, Event, EventPayload, InfectionSource, OutcomeKind, ParticipantId};
use crate::log::info;
use crate::status::{StatusBoard, StatusCounts};
use crate::window::{select, TimeWindows};

/// Format of the human-readable label attached to each time bucket.
const TIME_LABEL_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Everything reconstructed from one window `(t0, t1]`.
#[derive(Clone, Debug)]
pub struct WindowSnapshot {
    pub t0: i64,
    pub t1: i64,
    /// Label for the window's end time, in the simulation timezone.
    pub label: String,
    /// Population counts after this window's events.
    pub counts: StatusCounts,
    pub transmissions: Vec<TransmissionEdge>,
    pub contacts: ContactAggregate,
}

/// Output of a full sweep.
#[derive(Debug)]
pub struct SweepOutput {
    pub snapshots: Vec<WindowSnapshot>,
    /// The status accumulator after the final window.
    pub final_board: StatusBoard,
    /// Run totals of every recoverable anomaly.
    pub anomalies: Anomalies,
}

/// Rounds an epoch timestamp to the nearest hour in the given timezone.
///
/// # Errors
/// Returns an `EpinetError` if the timestamp cannot be represented in the
/// timezone (e.g. it falls into a DST gap after truncation).
pub fn hour_rounded(t: i64, timezone: Tz) -> Result<i64, EpinetError> {
    let instant = timezone
        .timestamp_opt(t, 0)
        .single()
        .ok_or_else(|| EpinetError::EpinetError(format!("Unrepresentable timestamp {t}")))?;
    let truncated = instant
        .with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .ok_or_else(|| EpinetError::EpinetError(format!("Cannot truncate timestamp {t}")))?;
    let rounded = if instant.minute() >= 30 {
        truncated + Duration::hours(1)
    } else {
        truncated
    };
    Ok(rounded.timestamp())
}

/// The sweep's time bounds: the configured observation window when present,
/// otherwise the hour-rounded first/last event times.
///
/// # Errors
/// Returns an `EpinetError` for an empty run with no observation window, or
/// for invalid configured bounds.
pub fn sweep_bounds(dataset: &Dataset, properties: &SimProperties) -> Result<(i64, i64), EpinetError> {
    if let Some(bounds) = properties.observation_window()? {
        return Ok(bounds);
    }
    let (first, last) = dataset
        .time_extent()
        .ok_or_else(|| EpinetError::from("No events and no observation window configured"))?;
    let timezone = properties.timezone()?;
    Ok((
        hour_rounded(first, timezone)?,
        hour_rounded(last, timezone)?,
    ))
}

/// Runs the full window sweep over the dataset's events.
///
/// The conflict tolerance for duplicate/multi-source infection suppression
/// equals the window width, matching the reconstruction the platform's
/// per-run exports use.
///
/// # Errors
/// Returns an `EpinetError` for configuration problems (bounds, timezone);
/// data anomalies never fail the sweep.
pub fn run_sweep(
    dataset: &Dataset,
    resolver: &IdentityResolver,
    properties: &SimProperties,
) -> Result<SweepOutput, EpinetError> {
    let timezone = properties.timezone()?;
    let (tmin, tmax) = sweep_bounds(dataset, properties)?;
    let delta = properties.time_delta_sec();
    let schema = properties.id_schema();

    let infection_builder =
        InfectionNetworkBuilder::new(resolver, schema, DedupPolicy::TimeTolerance(delta));
    let contact_builder =
        ContactNetworkBuilder::new(resolver, schema, properties.default_contact_min);

    let mut board = StatusBoard::new(resolver.vertex_count());
    let mut anomalies = Anomalies::default();
    let mut snapshots = Vec::new();

    for (t0, t1) in TimeWindows::new(tmin, tmax, delta) {
        let window = select(&dataset.events, t0, t1);
        anomalies.merge(&board.update(&window, resolver, schema));

        let (transmissions, infection_anomalies) = infection_builder.build(&window);
        anomalies.merge(&infection_anomalies);

        let (contacts, contact_anomalies) = contact_builder.build(&window, &transmissions);
        anomalies.merge(&contact_anomalies);

        let label = timezone
            .timestamp_opt(t1, 0)
            .single()
            .map(|d| d.format(TIME_LABEL_FORMAT).to_string())
            .unwrap_or_default();

        snapshots.push(WindowSnapshot {
            t0,
            t1,
            label,
            counts: board.counts(),
            transmissions,
            contacts,
        });
    }

    info!(
        "Swept {} windows with {} anomalies",
        snapshots.len(),
        anomalies.total()
    );

    Ok(SweepOutput {
        snapshots,
        final_board: board,
        anomalies,
    })
}

/// Run-level totals reported once per dataset.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Participants in the run.
    pub participants: usize,
    /// Participants with at least one recorded event.
    pub cases: usize,
    /// Outcome events reporting a death.
    pub deaths: usize,
    /// Outcome events reporting a recovery.
    pub survivors: usize,
    /// Infection events whose source resolved (index cases included).
    pub known_source: usize,
    /// Peer infections whose source could not be resolved.
    pub missing_source: usize,
}

/// Tallies the dataset the way the platform's console summary does.
#[must_use]
pub fn summarize(
    dataset: &Dataset,
    resolver: &IdentityResolver,
    properties: &SimProperties,
) -> RunSummary {
    let schema = properties.id_schema();
    let mut summary = RunSummary {
        participants: dataset.participants.len(),
        ..Default::default()
    };

    let mut with_events: Vec<ParticipantId> = dataset.events.iter().map(|e| e.participant).collect();
    with_events.sort_unstable();
    with_events.dedup();
    summary.cases = with_events.len();

    for event in &dataset.events {
        match &event.payload {
            EventPayload::Outcome(OutcomeKind::Dead) => summary.deaths += 1,
            EventPayload::Outcome(OutcomeKind::Recovered) => summary.survivors += 1,
            EventPayload::Infection(InfectionSource::Case0 { .. }) => summary.known_source += 1,
            EventPayload::Infection(InfectionSource::Peer { peer, .. }) => {
                if resolver.resolve_peer(peer, schema).is_some() {
                    summary.known_source += 1;
                } else {
                    summary.missing_source += 1;
                }
            }
            _ => {}
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{EventPayload, P2pId, Participant};

    fn properties() -> SimProperties {
        SimProperties {
            title: "test".to_string(),
            sim_id: 1,
            sim_tz: "UTC".to_string(),
            time_step_min: 10,
            time0: None,
            time1: None,
            use_new_id_schema: true,
            pathogen_id: 0,
            default_contact_min: 10,
        }
    }

    fn dataset(events: Vec<Event>) -> (Dataset, IdentityResolver) {
        let participants: Vec<Participant> = (0..4)
            .map(|i| Participant {
                id: ParticipantId(i),
                p2p_id: P2pId(format!("p{i}")),
            })
            .collect();
        let resolver = IdentityResolver::new(&participants);
        (
            Dataset {
                participants,
                events,
                mutations: Vec::new(),
                reference_sequence: "AAAA".to_string(),
            },
            resolver,
        )
    }

    fn infection(target: i64, descriptor: &str, time: i64) -> Event {
        Event {
            participant: ParticipantId(target),
            time,
            payload: EventPayload::Infection(InfectionSource::parse(descriptor).unwrap()),
        }
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

    fn outcome(target: i64, outcome: OutcomeKind, time: i64) -> Event {
        Event {
            participant: ParticipantId(target),
            time,
            payload: EventPayload::Outcome(outcome),
        }
    }

    #[test]
    fn hour_rounding_matches_the_platform() {
        let tz: Tz = "UTC".parse().unwrap();
        // 00:29:59 rounds down, 00:30:00 rounds up.
        assert_eq!(hour_rounded(1799, tz).unwrap(), 0);
        assert_eq!(hour_rounded(1800, tz).unwrap(), 3600);
        assert_eq!(hour_rounded(3600, tz).unwrap(), 3600);
    }

    #[test]
    fn status_threads_across_windows() {
        // Window 1: index case. Window 2: peer spread. Window 3: recovery.
        let events = vec![
            infection(0, "CASE0:A", 300),
            infection(1, "PEER[0:A]", 700),
            outcome(0, OutcomeKind::Recovered, 1400),
        ];
        let (dataset, resolver) = dataset(events);
        let mut properties = properties();
        properties.time0 = Some("Jan 01 1970 12:00AM".to_string());
        properties.time1 = Some("Jan 01 1970 12:29AM".to_string());

        let output = run_sweep(&dataset, &resolver, &properties).unwrap();
        assert_eq!(output.snapshots.len(), 3);
        assert_eq!(output.snapshots[0].counts.infected, 1);
        assert_eq!(output.snapshots[1].counts.infected, 2);
        assert_eq!(output.snapshots[2].counts.infected, 1);
        assert_eq!(output.snapshots[2].counts.recovered, 1);
        assert_eq!(output.snapshots[2].counts.susceptible, 2);
    }

    #[test]
    fn transmissions_backfill_contacts() {
        let events = vec![infection(1, "PEER[0:A]", 300)];
        let (dataset, resolver) = dataset(events);
        let mut properties = properties();
        properties.time0 = Some("Jan 01 1970 12:00AM".to_string());
        properties.time1 = Some("Jan 01 1970 12:00AM".to_string());

        let output = run_sweep(&dataset, &resolver, &properties).unwrap();
        let first = &output.snapshots[0];
        assert_eq!(first.transmissions.len(), 1);
        assert_eq!(first.contacts.len(), 1);
        assert_eq!(output.anomalies.inferred_contacts, 1);
    }

    #[test]
    fn labels_use_the_simulation_timezone() {
        let events = vec![contact(0, "1", 60_000.0, 300)];
        let (dataset, resolver) = dataset(events);
        let mut properties = properties();
        properties.time0 = Some("Mar 05 2022 9:00AM".to_string());
        properties.time1 = Some("Mar 05 2022 9:00AM".to_string());

        let output = run_sweep(&dataset, &resolver, &properties).unwrap();
        assert_eq!(output.snapshots[0].label, "03/05/2022 09:10");
    }

    #[test]
    fn bounds_default_to_the_hour_rounded_extent() {
        let events = vec![
            contact(0, "1", 0.0, 1799),
            contact(0, "1", 0.0, 9000),
        ];
        let (dataset, resolver) = dataset(events);
        let properties = properties();
        let (tmin, tmax) = sweep_bounds(&dataset, &properties).unwrap();
        assert_eq!(tmin, 0);
        assert_eq!(tmax, 10_800);
    }

    #[test]
    fn empty_run_without_bounds_is_an_error() {
        let (dataset, _resolver) = dataset(Vec::new());
        assert!(sweep_bounds(&dataset, &properties()).is_err());
    }

    #[test]
    fn summary_tallies_sources_and_outcomes() {
        let events = vec![
            infection(0, "CASE0:A", 100),
            infection(1, "PEER[0:A]", 200),
            infection(2, "PEER[99:A]", 300),
            outcome(0, OutcomeKind::Dead, 400),
            outcome(1, OutcomeKind::Recovered, 500),
        ];
        let (dataset, resolver) = dataset(events);
        let summary = summarize(&dataset, &resolver, &properties());
        assert_eq!(summary.participants, 4);
        assert_eq!(summary.cases, 3);
        assert_eq!(summary.deaths, 1);
        assert_eq!(summary.survivors, 1);
        assert_eq!(summary.known_source, 2);
        assert_eq!(summary.missing_source, 1);
    }
}
