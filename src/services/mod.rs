pub mod cleanup;
pub mod context;
pub mod local;
pub mod media;
pub mod records;
pub mod s3;
pub mod storage;
