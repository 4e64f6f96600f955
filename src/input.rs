//! Input tables and the event model.
//!
//! Four collaborator-provided CSV tables describe a run: participants,
//! histories (the unified event table), mutations, and reference sequences.
//! Everything is loaded once, filtered to the configured simulation ID, and
//! parsed eagerly: infection source descriptors such as `PEER[3:B]` become
//! [`InfectionSource`] variants at ingestion so no downstream logic ever
//! re-parses strings.
//!
//! The platform also produces raw per-participant device logs
//! (most-recent-first); [`parse_participant_log`] reads one and restores
//! chronological order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_derive::Deserialize;

use crate::config::SimProperties;
use crate::error::EpinetError;
use crate::lineage::{Mutation, MutationDelta, MutationId};
use crate::log::warn;

/// Internal participant identifier, unique within a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct ParticipantId(pub i64);

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Legacy peer-to-peer identifier, unique within a run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct P2pId(pub String);

/// One participant row, scoped to a single simulation run.
#[derive(Clone, Debug)]
pub struct Participant {
    pub id: ParticipantId,
    pub p2p_id: P2pId,
}

/// Health outcome reported by an outcome event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
    Dead,
    Recovered,
    Vaccinated,
}

/// Parsed infection source descriptor.
///
/// The raw column encodes the source as `CASE0:<strain>` (index case),
/// `PEER[<id>:<strain>]` (peer transmission; the ID encoding depends on the
/// schema flag) or `SOURCE:<strain>` (environmental source).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InfectionSource {
    Case0 { strain: String },
    Peer { peer: String, strain: String },
    Environmental { strain: String },
}

impl InfectionSource {
    /// Parses a raw source descriptor.
    ///
    /// Legacy `PEER` descriptors may omit the strain, which defaults to `0`.
    ///
    /// # Errors
    /// Returns an `EpinetError` for a descriptor with an unknown tag or a
    /// malformed `PEER` payload.
    pub fn parse(raw: &str) -> Result<InfectionSource, EpinetError> {
        if let Some(rest) = raw.strip_prefix("CASE0") {
            return Ok(InfectionSource::Case0 {
                strain: strip_payload(rest).to_string(),
            });
        }
        if let Some(rest) = raw.strip_prefix("SOURCE") {
            return Ok(InfectionSource::Environmental {
                strain: strip_payload(rest).to_string(),
            });
        }
        if let Some(rest) = raw.strip_prefix("PEER") {
            let inner = rest
                .strip_prefix('[')
                .and_then(|r| r.strip_suffix(']'))
                .ok_or_else(|| {
                    EpinetError::EpinetError(format!("Malformed PEER descriptor: {raw}"))
                })?;
            let (peer, strain) = match inner.split_once(':') {
                Some((peer, strain)) => (peer, strain),
                None => (inner, "0"),
            };
            if peer.is_empty() {
                return Err(EpinetError::EpinetError(format!(
                    "Empty peer in descriptor: {raw}"
                )));
            }
            return Ok(InfectionSource::Peer {
                peer: peer.to_string(),
                strain: strain.to_string(),
            });
        }
        Err(EpinetError::EpinetError(format!(
            "Unknown infection source descriptor: {raw}"
        )))
    }

    #[must_use]
    pub fn strain(&self) -> &str {
        match self {
            InfectionSource::Case0 { strain }
            | InfectionSource::Peer { strain, .. }
            | InfectionSource::Environmental { strain } => strain,
        }
    }
}

// Payloads appear either as `:<payload>` or `[<payload>]`.
fn strip_payload(rest: &str) -> &str {
    if let Some(colon) = rest.strip_prefix(':') {
        colon
    } else {
        rest.strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .unwrap_or(rest)
    }
}

/// Kind-specific payload of an event.
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    Contact {
        /// Raw peer identifier; its encoding depends on the schema flag.
        peer: String,
        duration_ms: f64,
    },
    Infection(InfectionSource),
    Outcome(OutcomeKind),
}

/// One event from the unified history table.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub participant: ParticipantId,
    /// Nominal event time, epoch seconds. For contacts this is the end time.
    pub time: i64,
    pub payload: EventPayload,
}

impl Event {
    /// Effective start time: contacts begin `duration` before their nominal
    /// time; instantaneous events start at it.
    #[must_use]
    pub fn start(&self) -> i64 {
        match &self.payload {
            EventPayload::Contact { duration_ms, .. } => {
                self.time - (*duration_ms / 1000.0) as i64
            }
            _ => self.time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParticipantRow {
    sim_id: i64,
    id: i64,
    p2p_id: String,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    sim_id: i64,
    user_id: i64,
    #[serde(rename = "type")]
    kind: String,
    time: i64,
    #[serde(default)]
    peer_id: Option<String>,
    #[serde(default)]
    contact_length: Option<f64>,
    #[serde(default)]
    inf: Option<String>,
    #[serde(default)]
    out: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MutationRow {
    sim_id: i64,
    id: i64,
    prev_mutation_id: i64,
    delta: String,
}

#[derive(Debug, Deserialize)]
struct SequenceRow {
    pathogen_id: i64,
    sequence: String,
}

/// All inputs of one run, filtered to a single simulation ID.
#[derive(Debug)]
pub struct Dataset {
    pub participants: Vec<Participant>,
    pub events: Vec<Event>,
    pub mutations: Vec<Mutation>,
    pub reference_sequence: String,
}

impl Dataset {
    /// Loads `participants.csv`, `histories.csv`, `mutations.csv` and
    /// `sequences.csv` from `data_dir`, keeping only rows for the configured
    /// simulation. Rows with malformed payloads are warning-logged and
    /// skipped; they never abort the load.
    ///
    /// # Errors
    /// Returns an `EpinetError` if a file cannot be read, a row cannot be
    /// deserialized, or no reference sequence exists for the pathogen.
    pub fn load(data_dir: &Path, properties: &SimProperties) -> Result<Dataset, EpinetError> {
        Ok(Dataset {
            participants: load_participants(&data_dir.join("participants.csv"), properties.sim_id)?,
            events: load_events(&data_dir.join("histories.csv"), properties.sim_id)?,
            mutations: load_mutations(&data_dir.join("mutations.csv"), properties.sim_id)?,
            reference_sequence: load_reference_sequence(
                &data_dir.join("sequences.csv"),
                properties.pathogen_id,
            )?,
        })
    }

    /// Earliest and latest nominal event times, or `None` for an empty run.
    #[must_use]
    pub fn time_extent(&self) -> Option<(i64, i64)> {
        let first = self.events.iter().map(|e| e.time).min()?;
        let last = self.events.iter().map(|e| e.time).max()?;
        Some((first, last))
    }
}

fn load_participants(path: &Path, sim_id: i64) -> Result<Vec<Participant>, EpinetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut participants = Vec::new();
    for result in reader.deserialize() {
        let row: ParticipantRow = result?;
        if row.sim_id != sim_id {
            continue;
        }
        participants.push(Participant {
            id: ParticipantId(row.id),
            p2p_id: P2pId(row.p2p_id),
        });
    }
    Ok(participants)
}

fn load_events(path: &Path, sim_id: i64) -> Result<Vec<Event>, EpinetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut events = Vec::new();
    for result in reader.deserialize() {
        let row: HistoryRow = result?;
        if row.sim_id != sim_id {
            continue;
        }
        match event_from_row(&row) {
            Ok(event) => events.push(event),
            Err(error) => {
                warn!(
                    "Skipping malformed {} event for participant {}: {}",
                    row.kind, row.user_id, error
                );
            }
        }
    }
    Ok(events)
}

fn event_from_row(row: &HistoryRow) -> Result<Event, EpinetError> {
    let payload = match row.kind.as_str() {
        "contact" => EventPayload::Contact {
            peer: row
                .peer_id
                .clone()
                .ok_or_else(|| EpinetError::from("Contact event is missing peer_id"))?,
            // Missing contact lengths are treated as instantaneous.
            duration_ms: row.contact_length.unwrap_or(0.0),
        },
        "infection" => {
            let raw = row
                .inf
                .as_deref()
                .ok_or_else(|| EpinetError::from("Infection event is missing its descriptor"))?;
            EventPayload::Infection(InfectionSource::parse(raw)?)
        }
        "outcome" => {
            let raw = row
                .out
                .as_deref()
                .ok_or_else(|| EpinetError::from("Outcome event is missing its outcome"))?;
            EventPayload::Outcome(parse_outcome(raw)?)
        }
        other => {
            return Err(EpinetError::EpinetError(format!(
                "Unknown event kind: {other}"
            )))
        }
    };
    Ok(Event {
        participant: ParticipantId(row.user_id),
        time: row.time,
        payload,
    })
}

fn parse_outcome(raw: &str) -> Result<OutcomeKind, EpinetError> {
    match raw {
        "DEAD" => Ok(OutcomeKind::Dead),
        "RECOVERED" => Ok(OutcomeKind::Recovered),
        "VACCINATED" => Ok(OutcomeKind::Vaccinated),
        other => Err(EpinetError::EpinetError(format!(
            "Unknown outcome: {other}"
        ))),
    }
}

fn load_mutations(path: &Path, sim_id: i64) -> Result<Vec<Mutation>, EpinetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut mutations = Vec::new();
    for result in reader.deserialize() {
        let row: MutationRow = result?;
        if row.sim_id != sim_id {
            continue;
        }
        match MutationDelta::parse(&row.delta) {
            Ok(delta) => mutations.push(Mutation {
                id: MutationId(row.id),
                prev: MutationId(row.prev_mutation_id),
                delta,
            }),
            Err(error) => {
                warn!("Skipping mutation {} with malformed delta: {}", row.id, error);
            }
        }
    }
    // Resolution order is ascending mutation ID.
    mutations.sort_by_key(|m| m.id);
    Ok(mutations)
}

fn load_reference_sequence(path: &Path, pathogen_id: i64) -> Result<String, EpinetError> {
    let mut reader = csv::Reader::from_path(path)?;
    for result in reader.deserialize() {
        let row: SequenceRow = result?;
        if row.pathogen_id == pathogen_id {
            return Ok(row.sequence);
        }
    }
    Err(EpinetError::EpinetError(format!(
        "No reference sequence for pathogen {pathogen_id}"
    )))
}

/// One line of a raw per-participant device log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLogEvent {
    pub time: i64,
    pub kind: String,
    pub data: Option<String>,
}

/// Parses one raw device log.
///
/// Logs are bracketed `{time:<epoch>,<TYPE>:<payload>},` lines wrapped by a
/// header and footer line, and are written most-recent-first; the returned
/// events are restored to chronological order.
///
/// # Errors
/// Returns an `EpinetError` if the log cannot be read or a line does not
/// carry a parsable timestamp.
pub fn parse_participant_log<R: BufRead>(reader: R) -> Result<Vec<RawLogEvent>, EpinetError> {
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
    let mut events = Vec::new();
    if lines.len() < 3 {
        return Ok(events);
    }
    for line in &lines[1..lines.len() - 1] {
        let line = line.trim();
        // Strip the leading `{` and the trailing `},`.
        let Some(body) = line.strip_prefix('{').and_then(|l| l.strip_suffix("},")) else {
            warn!("Skipping malformed log line: {line}");
            continue;
        };
        let (time_field, event_field) = body
            .split_once(',')
            .ok_or_else(|| EpinetError::EpinetError(format!("Malformed log line: {line}")))?;
        let time = time_field
            .split_once(':')
            .map(|(_, t)| t)
            .ok_or_else(|| EpinetError::EpinetError(format!("Malformed log line: {line}")))?
            .parse::<i64>()?;
        let (kind, data) = match event_field.split_once(':') {
            Some((kind, data)) => (kind.to_string(), Some(data.to_string())),
            None => (event_field.to_string(), None),
        };
        events.push(RawLogEvent { time, kind, data });
    }
    events.reverse();
    Ok(events)
}

/// Case identifier encoded in a device-log file name: everything before the
/// final `-` of the base name.
#[must_use]
pub fn case_id_from_log_name(file_name: &str) -> &str {
    match file_name.rfind('-') {
        Some(index) => &file_name[..index],
        None => file_name,
    }
}

/// Reads every `*.{ext}` device log under `folder`, keyed by case ID.
///
/// # Errors
/// Returns an `EpinetError` if the directory or a log file cannot be read.
pub fn load_event_logs(
    folder: &Path,
    ext: &str,
) -> Result<Vec<(String, Vec<RawLogEvent>)>, EpinetError> {
    let mut logs = Vec::new();
    let mut paths: Vec<_> = std::fs::read_dir(folder)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(ext))
        .collect();
    paths.sort();
    for path in paths {
        let Some(file_name) = path.file_stem().and_then(|n| n.to_str()) else {
            continue;
        };
        let case_id = case_id_from_log_name(file_name).to_string();
        let file = File::open(&path)?;
        let events = parse_participant_log(BufReader::new(file))?;
        logs.push((case_id, events));
    }
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_case0_descriptor() {
        let source = InfectionSource::parse("CASE0:A").unwrap();
        assert_eq!(
            source,
            InfectionSource::Case0 {
                strain: "A".to_string()
            }
        );
        assert_eq!(source.strain(), "A");
    }

    #[test]
    fn parse_peer_descriptor_new_schema() {
        let source = InfectionSource::parse("PEER[3:B]").unwrap();
        assert_eq!(
            source,
            InfectionSource::Peer {
                peer: "3".to_string(),
                strain: "B".to_string()
            }
        );
    }

    #[test]
    fn parse_peer_descriptor_without_strain() {
        // Legacy descriptors may carry only the peer ID.
        let source = InfectionSource::parse("PEER[a1f2]").unwrap();
        assert_eq!(
            source,
            InfectionSource::Peer {
                peer: "a1f2".to_string(),
                strain: "0".to_string()
            }
        );
    }

    #[test]
    fn parse_environmental_descriptor() {
        let source = InfectionSource::parse("SOURCE:C").unwrap();
        assert_eq!(
            source,
            InfectionSource::Environmental {
                strain: "C".to_string()
            }
        );
    }

    #[test]
    fn malformed_descriptors_are_errors() {
        assert!(InfectionSource::parse("PEER[3:B").is_err());
        assert!(InfectionSource::parse("PEER[]").is_err());
        assert!(InfectionSource::parse("BOGUS:1").is_err());
    }

    #[test]
    fn contact_event_start_accounts_for_duration() {
        let event = Event {
            participant: ParticipantId(1),
            time: 1000,
            payload: EventPayload::Contact {
                peer: "2".to_string(),
                duration_ms: 30_000.0,
            },
        };
        assert_eq!(event.start(), 970);

        let event = Event {
            participant: ParticipantId(1),
            time: 1000,
            payload: EventPayload::Outcome(OutcomeKind::Recovered),
        };
        assert_eq!(event.start(), 1000);
    }

    #[test]
    fn device_log_is_reversed_to_chronological_order() {
        let log = "HEADER\n\
                   {time:300,OUT:RECOVERED},\n\
                   {time:200,INF:CASE0:A},\n\
                   {time:100,BLE:started},\n\
                   FOOTER\n";
        let events = parse_participant_log(Cursor::new(log)).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].time, 100);
        assert_eq!(events[0].kind, "BLE");
        assert_eq!(events[2].time, 300);
        assert_eq!(events[2].data.as_deref(), Some("RECOVERED"));
    }

    #[test]
    fn malformed_device_log_lines_are_skipped() {
        // The second line is truncated mid-payload on a multibyte character
        // and the third has no braces at all; both are dropped, the rest of
        // the log still parses.
        let log = "HEADER\n\
                   {time:200,INF:CASE0:A},\n\
                   {time:100,BLE:caf\u{20ac}\n\
                   garbage\n\
                   FOOTER\n";
        let events = parse_participant_log(Cursor::new(log)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, 200);
    }

    #[test]
    fn short_device_log_yields_no_events() {
        let events = parse_participant_log(Cursor::new("HEADER\nFOOTER\n")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn case_id_strips_the_device_suffix() {
        assert_eq!(case_id_from_log_name("case-12-3fa9"), "case-12");
        assert_eq!(case_id_from_log_name("plain"), "plain");
    }
}
