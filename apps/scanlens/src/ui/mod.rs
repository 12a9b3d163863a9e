//! UI layer: the scan screen shell.

pub mod app;

pub use app::ScanApp;
