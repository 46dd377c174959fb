pub mod config;
pub mod mixpoints;
pub mod scoring;
pub mod sequence;
pub mod session;
pub mod track;

/// Application name for XDG paths
pub const APP_NAME: &str = "mixplan";
