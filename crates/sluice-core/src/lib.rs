//!
//! Sluice Core - domain model and workflow coordinator for Sluice
//!
//! This crate defines the job aggregate, the repository and container
//! provider ports, and the execution service that drives the
//! provision → wait → teardown workflow. Provider implementations and
//! the HTTP surface live in sibling crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - core business models, entities, and rules
pub mod domain;

/// Application services - core application logic
pub mod application;

/// Error types
pub mod error;

// Re-export key types
pub use error::CoreError;

pub use domain::job::{BufferedEvent, Job, JobId, JobStatus, COMPLETION_EVENT};
pub use domain::provider::{ContainerGroup, ContainerGroupSpec, ContainerProvider};
pub use domain::repository::JobRepository;

pub use application::job_execution_service::{
    DomainEventHandler, ExecutionSettings, JobExecutionService, JobRequest, JobSummary,
    LoggingEventHandler,
};
