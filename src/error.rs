//! Error Types for SML
//!
//! One error type for loading and running programs, plus the limits a
//! caller can put around a run.

use crate::registers::Register;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Unified error type for SML operations
#[derive(Debug, Clone, PartialEq)]
pub enum SmlError {
    /// A label name was bound twice while building a program
    DuplicateLabel { label: String, existing: usize },
    /// A jump referenced a label that was never bound
    UnknownLabel { label: String },
    /// A jump would move the program counter past the end of the program
    InvalidProgramCounter { target: usize, length: usize },
    /// `div` with a zero divisor
    DivisionByZero { register: Register },
    /// A fault raised by the instruction at `address`
    ExecutionError { address: usize, cause: Box<SmlError> },
    /// Failed to translate SML source text
    ParseError(String),
    /// I/O operation failed
    IoError(String),
    /// Resource limit exceeded
    ResourceLimitExceeded(String),
    /// Invalid configuration
    ConfigError(String),
}

impl SmlError {
    /// The innermost error, looking through `ExecutionError` wrappers.
    pub fn cause(&self) -> &SmlError {
        match self {
            SmlError::ExecutionError { cause, .. } => cause.cause(),
            other => other,
        }
    }

    /// Address of the failing instruction, if the error came out of a run.
    pub fn address(&self) -> Option<usize> {
        match self {
            SmlError::ExecutionError { address, .. } => Some(*address),
            _ => None,
        }
    }
}

impl fmt::Display for SmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmlError::DuplicateLabel { label, existing } => write!(
                f,
                "Duplicate label '{}' (already bound to address {})",
                label, existing
            ),
            SmlError::UnknownLabel { label } => write!(f, "Unknown label '{}'", label),
            SmlError::InvalidProgramCounter { target, length } => write!(
                f,
                "Invalid program counter {} (program has {} instructions)",
                target, length
            ),
            SmlError::DivisionByZero { register } => {
                write!(f, "Division by zero (divisor register {})", register)
            }
            SmlError::ExecutionError { address, cause } => {
                write!(f, "Execution error at address {}: {}", address, cause)
            }
            SmlError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            SmlError::IoError(msg) => write!(f, "I/O error: {}", msg),
            SmlError::ResourceLimitExceeded(msg) => {
                write!(f, "Resource limit exceeded: {}", msg)
            }
            SmlError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SmlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SmlError::ExecutionError { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias for SML operations
pub type Result<T> = std::result::Result<T, SmlError>;

// Conversion from std::io::Error
impl From<std::io::Error> for SmlError {
    fn from(err: std::io::Error) -> Self {
        SmlError::IoError(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SmlError {
    fn from(err: serde_json::Error) -> Self {
        SmlError::ConfigError(format!("JSON error: {}", err))
    }
}

/// Limits for loading and running a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Maximum program source size in bytes
    pub max_source_size: usize,
    /// Maximum number of instructions in a program
    pub max_instructions: usize,
    /// Maximum number of executed steps in one run
    pub max_steps: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_source_size: 1024 * 1024, // 1 MB
            max_instructions: 10_000,     // 10K instructions
            max_steps: 1_000_000,         // 1M steps
        }
    }
}

impl ExecutionLimits {
    /// Create strict limits for untrusted programs
    pub fn strict() -> Self {
        Self {
            max_source_size: 64 * 1024, // 64 KB
            max_instructions: 1000,     // 1K instructions
            max_steps: 100_000,         // 100K steps
        }
    }

    /// Create relaxed limits for trusted programs
    pub fn trusted() -> Self {
        Self {
            max_source_size: 10 * 1024 * 1024, // 10 MB
            max_instructions: 1_000_000,       // 1M instructions
            max_steps: 1_000_000_000,          // 1B steps
        }
    }

    /// Load limits from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let limits: Self = serde_json::from_str(text)?;
        if limits.max_steps == 0 {
            return Err(SmlError::ConfigError(
                "max_steps must be greater than zero".to_string(),
            ));
        }
        Ok(limits)
    }

    /// Check if source size is within limits
    pub fn check_source_size(&self, size: usize) -> Result<()> {
        if size > self.max_source_size {
            return Err(SmlError::ResourceLimitExceeded(format!(
                "Source size {} bytes exceeds limit {} bytes",
                size, self.max_source_size
            )));
        }
        Ok(())
    }

    /// Check if instruction count is within limits
    pub fn check_instruction_count(&self, count: usize) -> Result<()> {
        if count > self.max_instructions {
            return Err(SmlError::ResourceLimitExceeded(format!(
                "Instruction count {} exceeds limit {}",
                count, self.max_instructions
            )));
        }
        Ok(())
    }

    /// Check if the executed step count is within limits
    pub fn check_steps(&self, steps: u64) -> Result<()> {
        if steps > self.max_steps {
            return Err(SmlError::ResourceLimitExceeded(format!(
                "Step count {} exceeds limit {}",
                steps, self.max_steps
            )));
        }
        Ok(())
    }
}
