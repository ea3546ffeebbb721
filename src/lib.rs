pub mod backend;
pub mod cli;
pub mod config;
#[cfg(feature = "gui")]
pub mod gui;
pub mod logging;
pub mod notifications;
pub mod realtime;
pub mod status_events;
pub mod surface;
pub mod thread_manager;
pub mod tracker;
pub mod types;
