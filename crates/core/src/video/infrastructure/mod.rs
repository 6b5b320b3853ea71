pub mod image_codec;
pub mod video_buffer;
