pub mod models;
pub mod services;

pub use models::{RecoveryTier, VisibilityEvent, WatchdogConfig};
pub use services::{LoadingFlag, LoadingRegistry, RecoveryHooks, RecoveryWatchdog, VisibilityEvents};
