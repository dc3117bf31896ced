pub mod auth_controller;
pub mod health_controller;
