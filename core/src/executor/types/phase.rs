//! Execution phase enums for each statement type
//!
//! Each statement type has its own Phase enum that tracks which execution step
//! it's currently at. These are serialized as u8 for efficiency.

use serde::{Deserialize, Serialize};

/// Execution phase for Block statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockPhase {
    Execute = 0,
}

/// Execution phase for statements that may hold a suspension point
/// (expression statements, declarations and assignments)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum YieldPhase {
    /// Evaluate the expression; a `yield` suspends here
    Eval = 0,
    /// Resumed after a `yield`; consume the value the driver sent
    Resumed = 1,
}

/// Execution phase for While statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WhilePhase {
    /// Evaluate the test; run the body again or exit
    Check = 0,
}

/// Execution phase for For-of statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ForPhase {
    /// Evaluate the iterable into a snapshot of items
    Init = 0,
    /// Bind the next item and run the body
    Next = 1,
}

/// Execution phase for Try statements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TryPhase {
    /// Register the finally cleanup and start the try block
    Enter = 0,
    /// Executing the try block
    Body = 1,
    /// Executing the catch block (error was caught)
    Catch = 2,
    /// Running the finally clause; nothing raised here is caught by this try
    Finally = 3,
}

/// Execution phase for Cleanup frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CleanupPhase {
    /// Push the cleanup body
    Run = 0,
    /// Body finished; restore the interrupted control flow
    Restore = 1,
}
