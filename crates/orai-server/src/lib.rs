pub mod api;
pub mod config;
pub mod scheduler;
pub mod state;
