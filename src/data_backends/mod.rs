pub mod client_handle;
pub mod location_handler;
pub mod s3_backend;
pub mod storage_backend;
