pub mod command;
pub mod config;
pub mod constants;
pub mod describe;
pub mod errors;
pub mod output;
pub mod payload;
pub mod persistence;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod solar;
pub mod task;

// Re-export commonly used types
pub use command::{CommandProcessor, InputMessage};
pub use config::{Config, ConfigManager};
pub use errors::{SchedulerError, SchedulerResult};
pub use output::{OutputMessage, OutputMode};
pub use persistence::PersistenceStore;
pub use registry::{TaskFilter, TaskRegistry};
pub use schedule::{ScheduleSpec, ScheduleTimeZone};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerStatus};
pub use task::{Task, TaskState};
