pub mod binary;
pub mod constants;
pub mod error;
pub mod frame_image;
pub mod frame_metadata;
pub mod shared_stream;
pub mod time_indexed_map;
pub mod time_stamp;
