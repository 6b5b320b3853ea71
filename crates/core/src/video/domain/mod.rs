pub mod frame_codec;
pub mod frame_ptr;
pub mod video_sequence;
