pub mod compare;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod entity;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod path;
pub mod pixels;
pub mod progress;
pub mod quality;
pub mod scanner;
pub mod store;

pub use compare::{CompareResult, Comparator};
pub use config::AppConfig;
pub use engine::{ScanEngine, ScanResult};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
