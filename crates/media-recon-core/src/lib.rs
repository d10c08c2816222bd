pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod inventory;
pub mod outcome;
pub mod output;
pub mod paths;
pub mod probe;
pub mod progress;
pub mod reconcile;
pub mod remediate;
pub mod restore;
pub mod service;
pub mod window;

pub use config::AppConfig;
pub use engine::{DeletionRunOptions, DeletionRunResult, ReconcileEngine};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use service::{ArrClient, EntityKind};
pub use window::TimeWindow;
