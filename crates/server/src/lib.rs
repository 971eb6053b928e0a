pub mod errors;
pub mod openapi;
pub mod routes;
pub mod rpc;
pub mod startup;
pub mod state;

pub use startup::{run, run_until, serve};
