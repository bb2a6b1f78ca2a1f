pub mod api;
pub mod batch;
pub mod config;
pub mod health;
pub mod humanize;
pub mod observability;
pub mod storage;
