pub mod conversion_stream;
pub mod convert;
pub mod health;
pub mod models;
pub mod response_handler;
pub mod static_files;
pub mod utils;
