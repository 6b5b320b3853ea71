use crate::shared::constants::UNBOUNDED_TIME;

/// A temporal request against an archive catalog.
///
/// `start_time`/`end_time` of [`UNBOUNDED_TIME`] leave that side of the
/// range open. `padding` is extra time to grow the range by on each side.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipRequest {
    pub mission_id: String,
    pub stream_id: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub padding: f64,
}

impl ClipRequest {
    pub fn new(mission_id: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            mission_id: mission_id.into(),
            stream_id: None,
            start_time,
            end_time,
            padding: 0.0,
        }
    }

    pub fn with_stream(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    /// The request range with open sides mapped to infinities.
    pub fn bounds(&self) -> (f64, f64) {
        let start = if self.start_time == UNBOUNDED_TIME {
            f64::NEG_INFINITY
        } else {
            self.start_time
        };
        let end = if self.end_time == UNBOUNDED_TIME {
            f64::INFINITY
        } else {
            self.end_time
        };
        (start, end)
    }

    /// Stream filter, treating an empty id as "any stream".
    pub fn stream_filter(&self) -> Option<&str> {
        self.stream_id.as_deref().filter(|s| !s.is_empty())
    }
}
