pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod geo;
pub mod privacy;
pub mod state;
pub mod ua;

pub use error::{Error, Result};
