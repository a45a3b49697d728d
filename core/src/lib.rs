pub mod backup;
pub mod db;
pub mod insight;
pub mod models;
pub mod service;
pub mod store;
pub mod units;
pub mod views;
