//! The live scanning pipeline: camera lifecycle, the periodic decode driver
//! and the session that collects its results.

pub mod controller;
pub mod driver;
pub mod session;
pub mod state;

pub use controller::ScanController;
pub use driver::{DecodeDriver, DriverContext, DriverHandle, DriverStats, DriverStatsSnapshot};
pub use session::{lock_session, ScanSession, SessionSummary, SharedSession};
pub use state::{DriverState, ScannerStatus};
