pub mod api;
pub mod config;
pub mod context;
pub mod core;
pub mod db;
pub mod logging;
pub mod upload;
