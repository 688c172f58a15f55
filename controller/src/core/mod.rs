pub mod handoff;
pub mod monitor;
pub mod pair;
pub mod retry;
pub mod routes;
pub mod state;
