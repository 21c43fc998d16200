// Live traffic analytics engine; modules are public so integration tests can reach them

pub mod capture;
pub mod classifier;
pub mod config;
pub mod error;
pub mod models;
pub mod render;
pub mod ring;
pub mod routes;
pub mod snapshot;
pub mod store;
pub mod version;
pub mod window;
pub mod worker;
