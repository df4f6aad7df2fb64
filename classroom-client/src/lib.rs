pub mod client;
pub mod config;
pub mod feed;
pub mod record;
pub mod session;
