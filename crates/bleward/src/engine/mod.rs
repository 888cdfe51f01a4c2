mod classify;
mod monitor;
pub mod scheduler;

pub use classify::classify;
pub use classify::Classification;
pub use monitor::CycleError;
pub use monitor::CycleReport;
pub use monitor::Monitor;
