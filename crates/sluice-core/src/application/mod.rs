//! Application services - the workflow coordination logic.

/// Job execution service
pub mod job_execution_service;
