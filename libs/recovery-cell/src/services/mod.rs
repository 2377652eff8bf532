pub mod loading;
pub mod visibility;
pub mod watchdog;

pub use loading::{LoadingFlag, LoadingRegistry};
pub use visibility::VisibilityEvents;
pub use watchdog::{RecoveryHooks, RecoveryWatchdog};
