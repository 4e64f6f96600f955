//! Time-window selection over the event table.
//!
//! A window `(t0, t]` includes an event if the event either started or ended
//! inside it: its effective start (nominal time minus contact duration) or
//! its nominal time falls in the half-open interval. A long contact can
//! therefore appear in two consecutive windows, once for its start and once
//! for its end; consumers deduplicate by pair-key accumulation, not by event
//! identity.

use crate::input::Event;

/// Whether `event` is visible in the window `(t0, t1]`.
#[must_use]
pub fn overlaps(event: &Event, t0: i64, t1: i64) -> bool {
    let start = event.start();
    (t0 < start && start <= t1) || (t0 < event.time && event.time <= t1)
}

/// Events visible in `(t0, t1]`, in table order.
#[must_use]
pub fn select<'a>(events: &'a [Event], t0: i64, t1: i64) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|event| overlaps(event, t0, t1))
        .collect()
}

/// Consecutive windows `(t, t + step]` sweeping from `start` while the
/// window's lower bound has not passed `end`. The final window may extend
/// beyond `end` by less than one step.
#[derive(Copy, Clone, Debug)]
pub struct TimeWindows {
    next: i64,
    end: i64,
    step: i64,
}

impl TimeWindows {
    /// # Panics
    /// Panics if `step` is not positive.
    #[must_use]
    pub fn new(start: i64, end: i64, step: i64) -> TimeWindows {
        assert!(step > 0, "window step must be positive");
        TimeWindows {
            next: start,
            end,
            step,
        }
    }
}

impl Iterator for TimeWindows {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<(i64, i64)> {
        if self.next > self.end {
            return None;
        }
        let t0 = self.next;
        self.next += self.step;
        Some((t0, t0 + self.step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{EventPayload, OutcomeKind, ParticipantId};

    fn outcome_at(time: i64) -> Event {
        Event {
            participant: ParticipantId(1),
            time,
            payload: EventPayload::Outcome(OutcomeKind::Recovered),
        }
    }

    fn contact_at(time: i64, duration_ms: f64) -> Event {
        Event {
            participant: ParticipantId(1),
            time,
            payload: EventPayload::Contact {
                peer: "2".to_string(),
                duration_ms,
            },
        }
    }

    #[test]
    fn window_bounds_are_half_open_on_the_left() {
        let events = vec![outcome_at(100), outcome_at(200)];
        // time == t1 is included, time == t0 is excluded.
        let selected = select(&events, 100, 200);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].time, 200);
    }

    #[test]
    fn spanning_contact_appears_in_both_windows() {
        // Contact over [95, 105]: starts in (0, 100], ends in (100, 200].
        let events = vec![contact_at(105, 10_000.0)];
        assert_eq!(select(&events, 0, 100).len(), 1);
        assert_eq!(select(&events, 100, 200).len(), 1);
        assert_eq!(select(&events, 200, 300).len(), 0);
    }

    #[test]
    fn contact_outside_the_window_is_invisible() {
        let events = vec![contact_at(105, 10_000.0)];
        assert!(select(&events, 300, 400).is_empty());
    }

    #[test]
    fn windows_cover_the_sweep_range() {
        let windows: Vec<_> = TimeWindows::new(0, 250, 100).collect();
        assert_eq!(windows, vec![(0, 100), (100, 200), (200, 300)]);
    }

    #[test]
    fn sweep_with_equal_bounds_yields_one_window() {
        let windows: Vec<_> = TimeWindows::new(50, 50, 100).collect();
        assert_eq!(windows, vec![(50, 150)]);
    }
}
