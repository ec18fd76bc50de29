pub mod handler;
pub mod middleware;
pub mod payload;
pub mod server;
