pub mod boundary;
pub mod color;
pub mod config;
pub mod error;
pub mod filter;
pub mod interaction;
pub mod mock;
pub mod render;
pub mod server;
pub mod session;
pub mod stats;
pub mod types;
pub mod view;
