pub mod models;
pub mod services;

pub use models::{
    CallRecord, CallSummary, DashboardStats, NewPatient, PatientRecord, PatientUpdate,
    RiskSummaryRow, StaffUser, SymptomReport,
};
pub use services::{
    CallFeedService, DashboardStatsService, EscalatedAlertsService, PatientDirectoryService,
    RefetchGuard, REFETCH_INTERVAL,
};
