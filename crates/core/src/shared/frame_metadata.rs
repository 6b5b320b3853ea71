/// A geographic corner coordinate in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Per-frame geo-registration data recorded alongside an archived clip.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameMetadata {
    pub time: i64,
    /// Row-major 3x3 image-to-reference homography.
    pub homography: [f64; 9],
    /// Upper-left, upper-right, lower-right, lower-left.
    pub corners: [GeoPoint; 4],
    pub gsd: Option<f64>,
    pub frame_number: Option<i64>,
    /// Frame whose image plane the homography maps into.
    pub homography_reference_frame: Option<i64>,
    pub image_width: Option<i64>,
    pub image_height: Option<i64>,
}

impl FrameMetadata {
    pub const IDENTITY_HOMOGRAPHY: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    pub fn new(time: i64) -> Self {
        Self {
            time,
            homography: Self::IDENTITY_HOMOGRAPHY,
            corners: [GeoPoint::default(); 4],
            gsd: None,
            frame_number: None,
            homography_reference_frame: None,
            image_width: None,
            image_height: None,
        }
    }

    /// Frames sharing a homography reference frame belong to one shot.
    pub fn shot_id(&self) -> Option<i64> {
        self.homography_reference_frame
    }
}
