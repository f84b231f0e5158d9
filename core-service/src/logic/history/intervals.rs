//! Interval algebra over state timelines
//!
//! All interval lists returned by `merge_intervals`, `active_intervals`,
//! `subtract` and `clip` are sorted, non-overlapping and non-empty.

use chrono::{DateTime, Utc};

use crate::logic::host::HistoryEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// A span during which an entity held one state
#[derive(Debug, Clone, PartialEq)]
pub struct StateInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub state: String,
}

/// Turn ordered state changes into contiguous spans covering [start, end].
///
/// The opening state is the last event at or before `start`; when every
/// event is later, the first event's state is assumed back to `start`.
/// Consecutive events with the same state collapse into one span.
pub fn intervalize(
    events: &[HistoryEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<StateInterval> {
    if events.is_empty() || end <= start {
        return Vec::new();
    }

    let mut sorted: Vec<&HistoryEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.changed_at);

    let opening = sorted
        .iter()
        .rev()
        .find(|e| e.changed_at <= start)
        .unwrap_or(&sorted[0]);

    let mut spans = Vec::new();
    let mut state = opening.state.clone();
    let mut cursor = start;

    for event in sorted
        .iter()
        .filter(|e| e.changed_at > start && e.changed_at < end)
    {
        if event.state == state {
            continue;
        }
        if event.changed_at > cursor {
            spans.push(StateInterval {
                start: cursor,
                end: event.changed_at,
                state: std::mem::take(&mut state),
            });
            cursor = event.changed_at;
        }
        state = event.state.clone();
    }

    spans.push(StateInterval {
        start: cursor,
        end,
        state,
    });
    spans
}

/// Union: sort, then merge overlapping or touching intervals
pub fn merge_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.retain(|i| i.end > i.start);
    intervals.sort_by_key(|i| i.start);

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                if interval.end > last.end {
                    last.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Merged spans whose state satisfies `is_active`
pub fn active_intervals<F>(spans: &[StateInterval], is_active: F) -> Vec<Interval>
where
    F: Fn(&str) -> bool,
{
    merge_intervals(
        spans
            .iter()
            .filter(|s| is_active(&s.state))
            .map(|s| Interval::new(s.start, s.end))
            .collect(),
    )
}

pub fn total_duration(intervals: &[Interval]) -> f64 {
    intervals.iter().map(Interval::duration_secs).sum()
}

/// Overlap in seconds between two merged lists
pub fn overlap_duration(a: &[Interval], b: &[Interval]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut total = 0.0;
    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);
        if end > start {
            total += Interval::new(start, end).duration_secs();
        }
        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    total
}

/// `a` minus `b`, both merged
pub fn subtract(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    let mut out = Vec::new();
    for interval in a {
        let mut cursor = interval.start;
        for cut in b.iter().filter(|c| c.end > interval.start && c.start < interval.end) {
            if cut.start > cursor {
                out.push(Interval::new(cursor, cut.start));
            }
            if cut.end > cursor {
                cursor = cut.end;
            }
        }
        if interval.end > cursor {
            out.push(Interval::new(cursor, interval.end));
        }
    }
    out
}

/// Restrict a merged list to [start, end]
pub fn clip(intervals: &[Interval], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Interval> {
    intervals
        .iter()
        .filter(|i| i.end > start && i.start < end)
        .map(|i| Interval::new(i.start.max(start), i.end.min(end)))
        .collect()
}
