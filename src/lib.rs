pub mod api;
pub mod catalog;
pub mod cli;
pub mod database_ops;
pub mod normalization;
pub mod telemetry;

pub mod util {
    pub mod env;
}
