pub mod acquisition;
pub mod bluetooth;
pub mod config;
pub mod controller;
pub mod error;
pub mod exposure;
pub mod lux;
pub mod models;
pub mod presenter;
pub mod protocol;
pub mod stats;
pub mod utils;
