pub mod controllers;
pub mod dto;
pub mod error;
#[cfg(test)]
pub mod memory;
pub mod middleware;
pub mod notifier;
pub mod repositories;
pub mod routes;
pub mod state;
