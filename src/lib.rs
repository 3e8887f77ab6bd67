pub mod autosave;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod persist;
pub mod remote;
pub mod tenant;
