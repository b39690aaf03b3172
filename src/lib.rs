pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod intelligence;
pub mod models;
pub mod providers;
pub mod scheduler;
