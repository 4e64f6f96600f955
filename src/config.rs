//! Run configuration, deserialized from a JSON properties file.
//!
//! Every component takes the pieces of configuration it needs explicitly;
//! there is no process-wide configuration state.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde_derive::Deserialize;

use crate::error::EpinetError;

/// Format of the optional observation-window bound strings, interpreted as
/// local times in the simulation timezone, e.g. `"Mar 05 2022 9:00AM"`.
const OBSERVATION_BOUND_FORMAT: &str = "%b %d %Y %I:%M%p";

/// Default contact duration, in minutes, backfilled for transmissions that
/// are missing an associated contact event.
const DEFAULT_CONTACT_MINUTES: u32 = 10;

/// Which encoding a peer identifier uses inside contact and infection
/// records. Simulations recorded before the schema change carry the legacy
/// peer-to-peer ID; later ones carry the internal participant ID directly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IdSchema {
    /// Peer columns and `PEER[..]` descriptors hold the legacy p2p ID.
    Legacy,
    /// Peer columns and `PEER[..]` descriptors hold the internal ID.
    Internal,
}

/// Immutable properties of one simulation run.
#[derive(Debug, Clone, Deserialize)]
pub struct SimProperties {
    pub title: String,
    pub sim_id: i64,
    /// IANA timezone name the simulation ran in, e.g. `America/New_York`.
    pub sim_tz: String,
    /// Width of a reconstruction window, in minutes. Also the conflict
    /// tolerance for duplicate/multi-source infection suppression.
    pub time_step_min: i64,
    /// Optional observation window bounds; both or neither must be present.
    #[serde(default)]
    pub time0: Option<String>,
    #[serde(default)]
    pub time1: Option<String>,
    #[serde(default)]
    pub use_new_id_schema: bool,
    /// Mutation IDs at or below this value belong to the reference pathogen
    /// lineage; greater IDs are derived lineages.
    #[serde(default)]
    pub pathogen_id: i64,
    #[serde(default = "default_contact_minutes")]
    pub default_contact_min: u32,
}

fn default_contact_minutes() -> u32 {
    DEFAULT_CONTACT_MINUTES
}

impl SimProperties {
    /// Loads properties from a JSON file.
    ///
    /// # Errors
    /// Returns an `EpinetError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<SimProperties, EpinetError> {
        let file = File::open(path)?;
        let properties: SimProperties = serde_json::from_reader(BufReader::new(file))?;
        Ok(properties)
    }

    #[must_use]
    pub fn id_schema(&self) -> IdSchema {
        if self.use_new_id_schema {
            IdSchema::Internal
        } else {
            IdSchema::Legacy
        }
    }

    /// Window width in seconds.
    #[must_use]
    pub fn time_delta_sec(&self) -> i64 {
        60 * self.time_step_min
    }

    /// # Errors
    /// Returns an `EpinetError` if `sim_tz` is not a known IANA timezone.
    pub fn timezone(&self) -> Result<Tz, EpinetError> {
        self.sim_tz
            .parse::<Tz>()
            .map_err(|e| EpinetError::EpinetError(format!("Invalid timezone {}: {e}", self.sim_tz)))
    }

    /// Epoch-second bounds of the configured observation window, if any.
    ///
    /// # Errors
    /// Returns an `EpinetError` if only one bound is present or a bound does
    /// not parse as a local time in the simulation timezone.
    pub fn observation_window(&self) -> Result<Option<(i64, i64)>, EpinetError> {
        let (time0, time1) = match (&self.time0, &self.time1) {
            (Some(time0), Some(time1)) => (time0, time1),
            (None, None) => return Ok(None),
            _ => {
                return Err(EpinetError::EpinetError(
                    "Properties must supply both time0 and time1, or neither".to_string(),
                ))
            }
        };
        let timezone = self.timezone()?;
        Ok(Some((
            parse_local(time0, timezone)?,
            parse_local(time1, timezone)?,
        )))
    }
}

fn parse_local(value: &str, timezone: Tz) -> Result<i64, EpinetError> {
    let naive = NaiveDateTime::parse_from_str(value, OBSERVATION_BOUND_FORMAT)
        .map_err(|e| EpinetError::EpinetError(format!("Invalid time bound {value}: {e}")))?;
    let local = timezone
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| {
            EpinetError::EpinetError(format!("Ambiguous or nonexistent local time {value}"))
        })?;
    Ok(local.timestamp())
}
