pub mod handlers;
pub mod routes;
pub mod upstream;
pub mod utils;
