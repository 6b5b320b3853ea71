pub mod archive_catalog;
pub mod archive_clip;
pub mod archive_frame_source;
pub mod archive_writer;
pub mod data_file;
pub mod index_file;
pub mod manifest;
pub mod metadata_file;
pub mod path_resolver;
