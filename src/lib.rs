pub mod client;
pub mod config;
pub mod crds;
pub mod date_time;
pub mod error;
pub mod external;
pub mod identity;
pub mod modules;
pub mod reconciler;
pub mod resources;
pub mod telemetry;
