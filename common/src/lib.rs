// Common library shared by the wiki API server and its tests

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod storage;
pub mod telemetry;
pub mod tree;
