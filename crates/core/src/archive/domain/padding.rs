use crate::shared::constants::UNBOUNDED_TIME;
use crate::shared::error::{ArchiveError, Result};

/// One frame of a clip as seen by padding resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelinePoint {
    pub time: f64,
    /// `None` when the frame has no metadata.
    pub shot: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Backward,
    Forward,
}

/// Resolves `[start, end]` plus `padding` against a clip's frames.
///
/// `points` must be sorted by time. An [`UNBOUNDED_TIME`] boundary stands
/// for the clip's own extent. With no shot information or zero padding the
/// range is clamped to the clip. Otherwise each boundary snaps to its
/// nearest frame and grows outward frame by frame while the padding budget
/// lasts and the shot does not change.
pub fn resolve_padding(
    points: &[TimelinePoint],
    has_shots: bool,
    start: f64,
    end: f64,
    padding: f64,
) -> Result<(f64, f64)> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(ArchiveError::Range("clip has no frames".to_string()));
    };
    let start = if start == UNBOUNDED_TIME { first.time } else { start };
    let end = if end == UNBOUNDED_TIME { last.time } else { end };
    let padding = if padding > 0.0 { padding } else { 0.0 };

    if start.is_nan() || end.is_nan() || start > end {
        return Err(ArchiveError::Range(format!("invalid range [{start}, {end}]")));
    }
    if start > last.time || end < first.time {
        return Err(ArchiveError::Range(format!(
            "[{start}, {end}] does not overlap clip [{}, {}]",
            first.time, last.time
        )));
    }

    if !has_shots || padding == 0.0 {
        return Ok((start.max(first.time), end.min(last.time)));
    }

    Ok((
        grow(points, start, padding, Direction::Backward),
        grow(points, end, padding, Direction::Forward),
    ))
}

fn grow(points: &[TimelinePoint], boundary: f64, padding: f64, direction: Direction) -> f64 {
    let mut index = nearest_index(points, boundary);
    let anchor = points[index];

    // Snapping to the anchor frame spends (or refunds) part of the budget.
    let mut budget = match direction {
        Direction::Backward => padding + (anchor.time - boundary),
        Direction::Forward => padding + (boundary - anchor.time),
    };

    loop {
        let next = match direction {
            Direction::Backward => index.checked_sub(1),
            Direction::Forward => Some(index + 1).filter(|n| *n < points.len()),
        };
        let Some(next) = next else { break };
        if points[next].shot != anchor.shot {
            break;
        }
        let step = (points[next].time - points[index].time).abs();
        if budget - step < 0.0 {
            break;
        }
        budget -= step;
        index = next;
    }
    points[index].time
}

/// Index of the point closest to `time`; the earlier point wins a tie.
fn nearest_index(points: &[TimelinePoint], time: f64) -> usize {
    let after = points.partition_point(|p| p.time < time);
    if after == 0 {
        return 0;
    }
    if after == points.len() {
        return points.len() - 1;
    }
    let before = after - 1;
    if points[after].time - time < time - points[before].time {
        after
    } else {
        before
    }
}
