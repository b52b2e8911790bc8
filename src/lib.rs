pub mod app;
pub mod authz;
pub mod db;
pub mod docs;
pub mod errors;
pub mod jwt;
pub mod models;
pub mod notify;
pub mod ratelimit;
pub mod repo;
pub mod routes;
pub mod services;
pub mod utils;

pub use app::{create_app, create_app_with, AppState};
