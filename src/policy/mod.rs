//! Policy-server REST integration: the authenticated client and the tool
//! executor that maps catalog operations onto it.

pub mod client;
pub mod executor;

pub use client::PolicyClient;
pub use executor::PolicyToolExecutor;
