use crate::{
    domain::events::{
        CompletionReceived, ContainerDeleted, ContainerProvisioned, DomainEvent, JobAccepted,
        JobCompleted, JobFailed,
    },
    CoreError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The well-known external event name that unblocks a waiting job.
///
/// Both the worker's HTTP callback and the completion-queue relay raise
/// this event.
pub const COMPLETION_EVENT: &str = "job.finished";

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Job has been accepted but no resources exist yet
    Accepted,

    /// Worker container group is being created
    Provisioning,

    /// Worker is running; job is waiting for the completion signal
    AwaitingCompletion,

    /// Worker container group is being deleted
    TearingDown,

    /// Job finished and its resources were released
    Completed,

    /// Job failed
    Failed,
}

impl JobStatus {
    /// Whether the job can no longer change state
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accepted" => Ok(JobStatus::Accepted),
            "provisioning" => Ok(JobStatus::Provisioning),
            "awaitingcompletion" | "awaiting_completion" => Ok(JobStatus::AwaitingCompletion),
            "tearingdown" | "tearing_down" => Ok(JobStatus::TearingDown),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(CoreError::ValidationError(format!(
                "Unknown job status: {}",
                s
            ))),
        }
    }
}

/// Value object: Job ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a fresh job ID
    pub fn new() -> Self {
        JobId(Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An external event delivered before the job was ready to consume it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedEvent {
    /// Event name as delivered
    pub name: String,

    /// Event payload as delivered
    pub payload: Value,
}

/// Aggregate: a single extraction job and the container group backing it
#[derive(Debug, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier
    pub id: JobId,

    /// The video URL the worker container will process
    pub video_url: String,

    /// Derived container group name; set once provisioning starts
    pub container_group: Option<String>,

    /// Public IP of the provisioned group, when the provider reports one
    pub public_ip: Option<String>,

    /// FQDN of the provisioned group, when the provider reports one
    pub fqdn: Option<String>,

    /// Current status
    pub status: JobStatus,

    /// Error message if the job failed
    pub error: Option<String>,

    /// External events that arrived before the job was waiting for them
    pub buffered_events: Vec<BufferedEvent>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,

    /// Domain events
    #[serde(skip)]
    pub events: Vec<Box<dyn DomainEvent>>,
}

// Manually implement Clone so domain events stay with the original
impl Clone for Job {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            video_url: self.video_url.clone(),
            container_group: self.container_group.clone(),
            public_ip: self.public_ip.clone(),
            fqdn: self.fqdn.clone(),
            status: self.status,
            error: self.error.clone(),
            buffered_events: self.buffered_events.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            events: Vec::new(),
        }
    }
}

impl Job {
    /// Create a new job for the given video URL
    pub fn new(video_url: String) -> Self {
        let id = JobId::new();
        let now = Utc::now();

        let mut job = Self {
            id: id.clone(),
            video_url: video_url.clone(),
            container_group: None,
            public_ip: None,
            fqdn: None,
            status: JobStatus::Accepted,
            error: None,
            buffered_events: Vec::new(),
            created_at: now,
            updated_at: now,
            events: Vec::with_capacity(8),
        };

        job.record_event(Box::new(JobAccepted {
            job_id: id,
            video_url,
            timestamp: now,
        }));

        job
    }

    /// Update the timestamp
    #[inline]
    pub fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move the job into provisioning, fixing the container group name
    pub fn begin_provisioning(&mut self, container_group: String) -> Result<(), CoreError> {
        if self.status != JobStatus::Accepted {
            return Err(CoreError::JobExecutionError(format!(
                "Cannot begin provisioning in status: {:?}",
                self.status
            )));
        }

        self.container_group = Some(container_group);
        self.status = JobStatus::Provisioning;
        self.update_timestamp();
        Ok(())
    }

    /// Record the provisioned container group and start waiting for completion
    pub fn await_completion(
        &mut self,
        public_ip: Option<String>,
        fqdn: Option<String>,
    ) -> Result<(), CoreError> {
        if self.status != JobStatus::Provisioning {
            return Err(CoreError::JobExecutionError(format!(
                "Cannot await completion in status: {:?}",
                self.status
            )));
        }

        let container_group = self.container_group.clone().ok_or_else(|| {
            CoreError::JobExecutionError("Job has no container group name".to_string())
        })?;

        self.public_ip = public_ip;
        self.fqdn = fqdn;
        self.status = JobStatus::AwaitingCompletion;

        self.record_event(Box::new(ContainerProvisioned {
            job_id: self.id.clone(),
            container_group,
            timestamp: Utc::now(),
        }));

        self.update_timestamp();
        Ok(())
    }

    /// Record the external completion signal
    pub fn record_completion(&mut self) -> Result<(), CoreError> {
        if self.status != JobStatus::AwaitingCompletion {
            return Err(CoreError::JobExecutionError(format!(
                "Cannot record completion in status: {:?}",
                self.status
            )));
        }

        self.record_event(Box::new(CompletionReceived {
            job_id: self.id.clone(),
            timestamp: Utc::now(),
        }));

        self.update_timestamp();
        Ok(())
    }

    /// Move the job into teardown
    pub fn begin_teardown(&mut self) -> Result<(), CoreError> {
        if self.status != JobStatus::AwaitingCompletion {
            return Err(CoreError::JobExecutionError(format!(
                "Cannot begin teardown in status: {:?}",
                self.status
            )));
        }

        self.status = JobStatus::TearingDown;
        self.update_timestamp();
        Ok(())
    }

    /// Complete the job after its container group was deleted
    pub fn complete(&mut self) -> Result<(), CoreError> {
        if self.status != JobStatus::TearingDown {
            return Err(CoreError::JobExecutionError(format!(
                "Cannot complete job in status: {:?}",
                self.status
            )));
        }

        let container_group = self.container_group.clone().unwrap_or_default();
        self.status = JobStatus::Completed;

        self.record_event(Box::new(ContainerDeleted {
            job_id: self.id.clone(),
            container_group,
            timestamp: Utc::now(),
        }));
        self.record_event(Box::new(JobCompleted {
            job_id: self.id.clone(),
            timestamp: Utc::now(),
        }));

        self.update_timestamp();
        Ok(())
    }

    /// Set the job as failed
    pub fn fail(&mut self, error: String) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::JobExecutionError(format!(
                "Cannot fail job in status: {:?}",
                self.status
            )));
        }

        self.status = JobStatus::Failed;
        self.error = Some(error.clone());

        self.record_event(Box::new(JobFailed {
            job_id: self.id.clone(),
            error,
            timestamp: Utc::now(),
        }));

        self.update_timestamp();
        Ok(())
    }

    /// Buffer an external event for later consumption
    pub fn buffer_event(&mut self, name: &str, payload: Value) {
        self.buffered_events.push(BufferedEvent {
            name: name.to_string(),
            payload,
        });
        self.update_timestamp();
    }

    /// Check whether an event with the given name is buffered
    #[inline]
    pub fn has_buffered(&self, name: &str) -> bool {
        self.buffered_events.iter().any(|e| e.name == name)
    }

    /// Remove and return the first buffered event with the given name
    pub fn take_buffered(&mut self, name: &str) -> Option<BufferedEvent> {
        let position = self.buffered_events.iter().position(|e| e.name == name)?;
        self.update_timestamp();
        Some(self.buffered_events.remove(position))
    }

    /// Record a domain event
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Get and clear all domain events
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }
}
