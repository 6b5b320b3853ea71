use std::cmp::Ordering;
use std::fmt;

/// A point on a clip's timeline, identified by clip time, frame number, or both.
///
/// Comparison uses `time` when both sides carry one and falls back to
/// `frame_number` otherwise. A timestamp with neither component is the
/// invalid sentinel and sorts before every valid timestamp.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeStamp {
    time: Option<f64>,
    frame_number: Option<u32>,
}

impl TimeStamp {
    pub const INVALID: TimeStamp = TimeStamp {
        time: None,
        frame_number: None,
    };

    pub fn new(time: Option<f64>, frame_number: Option<u32>) -> Self {
        Self {
            time: time.filter(|t| t.is_finite()),
            frame_number,
        }
    }

    pub fn from_time(time: f64) -> Self {
        Self::new(Some(time), None)
    }

    pub fn from_frame(frame_number: u32) -> Self {
        Self::new(None, Some(frame_number))
    }

    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub fn frame_number(&self) -> Option<u32> {
        self.frame_number
    }

    pub fn is_valid(&self) -> bool {
        self.time.is_some() || self.frame_number.is_some()
    }

    /// Distance along the shared axis of both timestamps, used by nearest seeks.
    pub(crate) fn distance(&self, other: &TimeStamp) -> Option<f64> {
        match (self.time, other.time) {
            (Some(a), Some(b)) => Some((a - b).abs()),
            _ => match (self.frame_number, other.frame_number) {
                (Some(a), Some(b)) => Some((f64::from(a) - f64::from(b)).abs()),
                _ => None,
            },
        }
    }

    // Rank used when the two sides share no component.
    fn rank(&self) -> u8 {
        match (self.time, self.frame_number) {
            (None, None) => 0,
            (None, Some(_)) => 1,
            (Some(_), _) => 2,
        }
    }
}

impl PartialEq for TimeStamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeStamp {}

impl PartialOrd for TimeStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.time, other.time) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            _ => match (self.frame_number, other.frame_number) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }
}

impl From<f64> for TimeStamp {
    fn from(time: f64) -> Self {
        TimeStamp::from_time(time)
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.time, self.frame_number) {
            (Some(t), Some(n)) => write!(f, "{t} (frame {n})"),
            (Some(t), None) => write!(f, "{t}"),
            (None, Some(n)) => write!(f, "frame {n}"),
            (None, None) => write!(f, "<invalid>"),
        }
    }
}

/// How a timestamp lookup resolves when no key matches exactly.
///
/// `LowerBound` is a ceiling (smallest key at or after the target) and
/// `UpperBound` is a floor (largest key at or before the target).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SeekMode {
    #[default]
    Exact,
    /// Closest key; an exact tie between two keys resolves to the earlier one.
    Nearest,
    LowerBound,
    UpperBound,
}
