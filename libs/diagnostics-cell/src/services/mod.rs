pub mod probe;

pub use probe::ConnectivityDiagnostics;
