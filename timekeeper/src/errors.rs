//! Custom error types for the scheduler
//!
//! Provides structured error handling with context for the failure classes the
//! registry and command layer distinguish: invalid schedules, unknown names,
//! malformed tokens and snapshot I/O.

use std::fmt;

/// Main error type for the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// Schedule spec failed validation; the task was not created or changed
    Validation(ValidationError),

    /// A single-target command named a schedule that does not exist
    Lookup(LookupError),

    /// A coordinate or date token could not be parsed
    Parse(ParseError),

    /// Snapshot read/write failure
    Persistence(PersistenceError),

    /// Payload could not be resolved for an outgoing message
    Payload(String),
}

/// Schedule validation error variants
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Schedule options are missing entirely
    MissingSpec,

    /// Name is empty
    MissingName,

    /// Cron/dates schedule has no expression
    MissingExpression { name: String },

    /// Expression is neither a cron expression nor a date sequence
    InvalidExpression { name: String, expression: String },

    /// Solar schedule has no location
    MissingLocation { name: String },

    /// Solar type is neither "all" nor "selected"
    InvalidSolarType { name: String },

    /// Selected solar schedule has no events
    MissingSolarEvents { name: String },

    /// Solar event list resolved to nothing
    EmptySolarEvents { name: String },

    /// Solar event name is not in the vocabulary
    InvalidSolarEvent { name: String, event: String },

    /// Expression type is not cron, dates or solar
    InvalidExpressionType { name: String, expression_type: String },

    /// Payload type is not recognised
    InvalidPayloadType { name: String, payload_type: String },

    /// A schedule with this name is already registered
    DuplicateName { name: String },

    /// Time zone name is not a known IANA zone
    InvalidTimeZone { zone: String },
}

/// Lookup error variants
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    /// No schedule with that name
    ScheduleNotFound { name: String, action: String },

    /// Read-only lookup (status/export/debug) found nothing
    NotFound { name: String },

    /// Command needs a schedule name but none was given
    MissingName { command: String },

    /// Command is not part of the vocabulary
    UnknownCommand { command: String },
}

/// Token parsing error variants
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Location string is not a recognised coordinate format
    Coordinate { input: String, reason: String },

    /// Date entry is not a recognised date format
    Date { input: String },
}

/// Persistence error variants
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// Snapshot file could not be read
    ReadFailed { path: String, reason: String },

    /// Snapshot file could not be written
    WriteFailed { path: String, reason: String },

    /// Snapshot content is not valid JSON for the format
    DecodeFailed { path: String, reason: String },

    /// Snapshot was written by an incompatible version
    VersionMismatch { path: String, found: u32 },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Validation(e) => write!(f, "{}", e),
            SchedulerError::Lookup(e) => write!(f, "{}", e),
            SchedulerError::Parse(e) => write!(f, "Parse error: {}", e),
            SchedulerError::Persistence(e) => write!(f, "Persistence error: {}", e),
            SchedulerError::Payload(msg) => write!(f, "Payload error: {}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingSpec => write!(f, "Schedule options are undefined"),
            ValidationError::MissingName => write!(f, "Schedule name property missing"),
            ValidationError::MissingExpression { name } => {
                write!(f, "Schedule '{}' - expression property missing", name)
            }
            ValidationError::InvalidExpression { name, expression } => {
                write!(
                    f,
                    "Schedule '{}' - expression '{}' must be either a cron expression, a date, an array of dates or a CSV of dates",
                    name, expression
                )
            }
            ValidationError::MissingLocation { name } => {
                write!(f, "Schedule '{}' - location property missing", name)
            }
            ValidationError::InvalidSolarType { name } => {
                write!(
                    f,
                    "Schedule '{}' - solarType property invalid or missing. Must be either \"all\" or \"selected\"",
                    name
                )
            }
            ValidationError::MissingSolarEvents { name } => {
                write!(f, "Schedule '{}' - solarEvents property missing", name)
            }
            ValidationError::EmptySolarEvents { name } => {
                write!(f, "Schedule '{}' - solarEvents property is empty", name)
            }
            ValidationError::InvalidSolarEvent { name, event } => {
                write!(f, "Schedule '{}' - solarEvents entry '{}' is invalid", name, event)
            }
            ValidationError::InvalidExpressionType {
                name,
                expression_type,
            } => {
                write!(
                    f,
                    "Schedule '{}' - invalid schedule type '{}'. Expected expressionType to be 'cron', 'dates' or 'solar'",
                    name, expression_type
                )
            }
            ValidationError::InvalidPayloadType { name, payload_type } => {
                write!(
                    f,
                    "Schedule '{}' - payloadType '{}' is not valid",
                    name, payload_type
                )
            }
            ValidationError::DuplicateName { name } => {
                write!(f, "Schedule '{}' already exists", name)
            }
            ValidationError::InvalidTimeZone { zone } => {
                write!(f, "Unknown time zone '{}'", zone)
            }
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::ScheduleNotFound { name, action } => {
                write!(f, "{} failed. Cannot find schedule named '{}'", action, name)
            }
            LookupError::NotFound { name } => write!(f, "{} not found", name),
            LookupError::MissingName { command } => {
                write!(
                    f,
                    "Invalid payload! Control topic '{}' expects the name of the schedule",
                    command
                )
            }
            LookupError::UnknownCommand { command } => {
                write!(f, "Unknown command '{}'", command)
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Coordinate { input, reason } => {
                write!(f, "Could not parse location '{}': {}", input, reason)
            }
            ParseError::Date { input } => write!(f, "Could not parse date '{}'", input),
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::ReadFailed { path, reason } => {
                write!(f, "Failed to read '{}': {}", path, reason)
            }
            PersistenceError::WriteFailed { path, reason } => {
                write!(f, "Failed to write '{}': {}", path, reason)
            }
            PersistenceError::DecodeFailed { path, reason } => {
                write!(f, "Failed to decode '{}': {}", path, reason)
            }
            PersistenceError::VersionMismatch { path, found } => {
                write!(
                    f,
                    "Invalid version {} in '{}' - cannot load dynamic schedules",
                    found, path
                )
            }
        }
    }
}

impl std::error::Error for SchedulerError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for LookupError {}
impl std::error::Error for ParseError {}
impl std::error::Error for PersistenceError {}

impl From<ValidationError> for SchedulerError {
    fn from(err: ValidationError) -> Self {
        SchedulerError::Validation(err)
    }
}

impl From<LookupError> for SchedulerError {
    fn from(err: LookupError) -> Self {
        SchedulerError::Lookup(err)
    }
}

impl From<ParseError> for SchedulerError {
    fn from(err: ParseError) -> Self {
        SchedulerError::Parse(err)
    }
}

impl From<PersistenceError> for SchedulerError {
    fn from(err: PersistenceError) -> Self {
        SchedulerError::Persistence(err)
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
