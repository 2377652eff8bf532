pub mod alerts;
pub mod calls;
pub mod patients;
pub mod refetch;
pub mod stats;

pub use alerts::EscalatedAlertsService;
pub use calls::CallFeedService;
pub use patients::PatientDirectoryService;
pub use refetch::{RefetchGuard, REFETCH_INTERVAL};
pub use stats::DashboardStatsService;
