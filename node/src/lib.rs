pub mod agent;
pub mod config;
pub mod fault_injection;
pub mod lifecycle;
pub mod routes;
pub mod server;
pub mod state;
