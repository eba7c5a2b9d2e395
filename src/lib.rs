pub mod api;
pub mod config;
pub mod doe;
pub mod domain;
pub mod state;
pub mod telemetry;
pub mod topology;
