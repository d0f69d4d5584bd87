use crate::domain::job::JobId;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Domain event trait for all events in the system
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the job ID this event is associated with
    fn job_id(&self) -> &JobId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Event: Job accepted for orchestration
#[derive(Debug)]
pub struct JobAccepted {
    /// The unique identifier of the job
    pub job_id: JobId,

    /// The video URL submitted with the job
    pub video_url: String,

    /// The timestamp when the job was accepted
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for JobAccepted {
    fn event_type(&self) -> &'static str {
        "job.accepted"
    }

    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Worker container group provisioned
#[derive(Debug)]
pub struct ContainerProvisioned {
    /// The unique identifier of the job
    pub job_id: JobId,

    /// The name of the provisioned container group
    pub container_group: String,

    /// The timestamp when the container group was provisioned
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ContainerProvisioned {
    fn event_type(&self) -> &'static str {
        "job.container_provisioned"
    }

    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Completion signal received from the worker
#[derive(Debug)]
pub struct CompletionReceived {
    /// The unique identifier of the job
    pub job_id: JobId,

    /// The timestamp when the signal arrived
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for CompletionReceived {
    fn event_type(&self) -> &'static str {
        "job.completion_received"
    }

    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Worker container group deleted
#[derive(Debug)]
pub struct ContainerDeleted {
    /// The unique identifier of the job
    pub job_id: JobId,

    /// The name of the deleted container group
    pub container_group: String,

    /// The timestamp when the container group was deleted
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ContainerDeleted {
    fn event_type(&self) -> &'static str {
        "job.container_deleted"
    }

    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Job completed
#[derive(Debug)]
pub struct JobCompleted {
    /// The unique identifier of the job
    pub job_id: JobId,

    /// The timestamp when the job completed
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for JobCompleted {
    fn event_type(&self) -> &'static str {
        "job.completed"
    }

    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Job failed
#[derive(Debug)]
pub struct JobFailed {
    /// The unique identifier of the job
    pub job_id: JobId,

    /// The error message
    pub error: String,

    /// The timestamp when the job failed
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for JobFailed {
    fn event_type(&self) -> &'static str {
        "job.failed"
    }

    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn create_test_job_id() -> JobId {
        JobId(Uuid::new_v4().to_string())
    }

    #[test]
    fn test_job_accepted_event() {
        let job_id = create_test_job_id();
        let timestamp = Utc::now();

        let event = JobAccepted {
            job_id: job_id.clone(),
            video_url: "https://youtu.be/test".to_string(),
            timestamp,
        };

        assert_eq!(event.event_type(), "job.accepted");
        assert_eq!(event.job_id(), &job_id);
        assert_eq!(event.timestamp(), timestamp);
    }

    #[test]
    fn test_container_provisioned_event() {
        let job_id = create_test_job_id();
        let timestamp = Utc::now();

        let event = ContainerProvisioned {
            job_id: job_id.clone(),
            container_group: format!("extract-{}", job_id.0),
            timestamp,
        };

        assert_eq!(event.event_type(), "job.container_provisioned");
        assert_eq!(event.job_id(), &job_id);
        assert_eq!(event.timestamp(), timestamp);
    }

    #[test]
    fn test_completion_received_event() {
        let job_id = create_test_job_id();
        let timestamp = Utc::now();

        let event = CompletionReceived {
            job_id: job_id.clone(),
            timestamp,
        };

        assert_eq!(event.event_type(), "job.completion_received");
        assert_eq!(event.job_id(), &job_id);
        assert_eq!(event.timestamp(), timestamp);
    }

    #[test]
    fn test_container_deleted_event() {
        let job_id = create_test_job_id();
        let timestamp = Utc::now();

        let event = ContainerDeleted {
            job_id: job_id.clone(),
            container_group: format!("extract-{}", job_id.0),
            timestamp,
        };

        assert_eq!(event.event_type(), "job.container_deleted");
        assert_eq!(event.job_id(), &job_id);
        assert_eq!(event.timestamp(), timestamp);
    }

    #[test]
    fn test_job_completed_event() {
        let job_id = create_test_job_id();
        let timestamp = Utc::now();

        let event = JobCompleted {
            job_id: job_id.clone(),
            timestamp,
        };

        assert_eq!(event.event_type(), "job.completed");
        assert_eq!(event.job_id(), &job_id);
        assert_eq!(event.timestamp(), timestamp);
    }

    #[test]
    fn test_job_failed_event() {
        let job_id = create_test_job_id();
        let timestamp = Utc::now();

        let event = JobFailed {
            job_id: job_id.clone(),
            error: "provisioning failed".to_string(),
            timestamp,
        };

        assert_eq!(event.event_type(), "job.failed");
        assert_eq!(event.job_id(), &job_id);
        assert_eq!(event.timestamp(), timestamp);
    }
}
