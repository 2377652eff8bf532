pub mod models;
pub mod services;

pub use models::{ConnectionTestResult, ConnectivityReport};
pub use services::ConnectivityDiagnostics;
