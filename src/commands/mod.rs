pub mod ask;
pub mod build_index;
pub mod init;
pub mod status;
