pub mod clip_request;
pub mod clip_uri;
pub mod padding;
