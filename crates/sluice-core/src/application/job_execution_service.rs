use crate::{
    domain::events::DomainEvent,
    domain::job::{Job, JobId, JobStatus, COMPLETION_EVENT},
    domain::provider::{ContainerGroupSpec, ContainerProvider},
    domain::repository::JobRepository,
    CoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Handler for domain events raised by job aggregates
pub trait DomainEventHandler: Send + Sync {
    /// Handle a single domain event
    fn handle(&self, event: &dyn DomainEvent);
}

/// Event handler that emits domain events as structured logs
#[derive(Debug, Default)]
pub struct LoggingEventHandler;

impl DomainEventHandler for LoggingEventHandler {
    fn handle(&self, event: &dyn DomainEvent) {
        debug!(
            event_type = event.event_type(),
            job_id = %event.job_id(),
            "domain event"
        );
    }
}

/// Request to start a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// The video URL the worker container will process
    pub video_url: String,
}

/// Summary information about a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job ID
    pub id: String,

    /// Current status
    pub status: String,

    /// The submitted video URL
    pub video_url: String,

    /// Creation timestamp
    pub created_at: String,

    /// Last updated timestamp
    pub updated_at: String,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.0.clone(),
            status: format!("{:?}", job.status),
            video_url: job.video_url.clone(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Settings for the job execution service
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    /// Prefix for derived container group names
    pub container_name_prefix: String,

    /// Base URL the worker's completion callback is built from
    pub callback_base_url: String,

    /// How long a job may wait for its completion signal before it is
    /// expired and its container group torn down
    pub completion_timeout: Option<Duration>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            container_name_prefix: "extract".to_string(),
            callback_base_url: "http://localhost:8080".to_string(),
            completion_timeout: None,
        }
    }
}

/// Service coordinating the job workflow: provision a container group,
/// wait for the external completion signal, tear the group down.
#[derive(Clone)]
pub struct JobExecutionService {
    /// Repository for jobs
    job_repo: Arc<dyn JobRepository>,

    /// Container platform client
    provider: Arc<dyn ContainerProvider>,

    /// Event handler
    event_handler: Arc<dyn DomainEventHandler>,

    /// Settings
    settings: ExecutionSettings,
}

impl JobExecutionService {
    /// Create a new job execution service
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        provider: Arc<dyn ContainerProvider>,
        event_handler: Arc<dyn DomainEventHandler>,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            job_repo,
            provider,
            event_handler,
            settings,
        }
    }

    /// The callback URL a worker container uses to signal completion
    pub fn completion_callback_url(&self, job_id: &JobId) -> String {
        format!(
            "{}/v1/jobs/{}/events/{}",
            self.settings.callback_base_url.trim_end_matches('/'),
            job_id,
            COMPLETION_EVENT
        )
    }

    /// Start a new job: provision its container group and leave it waiting
    /// for the completion signal.
    pub async fn start_job(&self, request: JobRequest) -> Result<JobId, CoreError> {
        let video_url = request.video_url.trim().to_string();
        if video_url.is_empty() {
            return Err(CoreError::ValidationError(
                "video URL must not be empty".to_string(),
            ));
        }
        if !video_url.starts_with("http://") && !video_url.starts_with("https://") {
            return Err(CoreError::ValidationError(format!(
                "video URL must be http(s): {}",
                video_url
            )));
        }

        let mut job = Job::new(video_url);
        let job_id = job.id.clone();
        self.job_repo.save(&job).await?;
        self.handle_events(&mut job);

        let container_group = format!("{}-{}", self.settings.container_name_prefix, job_id);
        job.begin_provisioning(container_group.clone())?;
        self.job_repo.save(&job).await?;

        info!(%job_id, %container_group, "provisioning container group");

        let spec = ContainerGroupSpec {
            name: container_group.clone(),
            video_url: job.video_url.clone(),
            callback_url: self.completion_callback_url(&job_id),
        };

        let group = match self.provider.create_container_group(&spec).await {
            Ok(group) => group,
            Err(e) => {
                job.fail(format!("container provisioning failed: {}", e))?;
                self.job_repo.save(&job).await?;
                self.handle_events(&mut job);
                return Err(e);
            }
        };

        // The completion signal may already have arrived and been buffered
        // against the stored copy while the group was provisioning; reload
        // it so the buffer is not lost.
        let mut job = self
            .job_repo
            .find_by_id(&job_id)
            .await?
            .ok_or_else(|| CoreError::JobNotFound(job_id.0.clone()))?;
        job.await_completion(group.ip_address, group.fqdn)?;
        self.job_repo.save(&job).await?;
        self.handle_events(&mut job);

        if job.take_buffered(COMPLETION_EVENT).is_some() {
            info!(%job_id, "completion signal arrived during provisioning");
            job.record_completion()?;
            self.finish_job(job).await?;
            return Ok(job_id);
        }

        if let Some(timeout) = self.settings.completion_timeout {
            let service = self.clone();
            let watchdog_id = job_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Err(e) = service.expire_job(&watchdog_id).await {
                    warn!(job_id = %watchdog_id, error = %e, "failed to expire job");
                }
            });
        }

        Ok(job_id)
    }

    /// Deliver an external event to a job.
    ///
    /// Completion events unblock a waiting job; events that arrive before
    /// the job is waiting are buffered, matching the buffering the hosted
    /// workflow runtime used to provide.
    pub async fn raise_event(
        &self,
        job_id: &JobId,
        event_name: &str,
        payload: Value,
    ) -> Result<(), CoreError> {
        let mut job = self
            .job_repo
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| CoreError::JobNotFound(job_id.0.clone()))?;

        if event_name != COMPLETION_EVENT {
            debug!(%job_id, event_name, "buffering non-completion event");
            job.buffer_event(event_name, payload);
            self.job_repo.save(&job).await?;
            return Ok(());
        }

        match job.status {
            JobStatus::Accepted | JobStatus::Provisioning => {
                info!(%job_id, "buffering early completion signal");
                job.buffer_event(event_name, payload);
                self.job_repo.save(&job).await?;
                Ok(())
            }
            JobStatus::AwaitingCompletion => {
                info!(%job_id, "completion signal received");
                job.record_completion()?;
                self.finish_job(job).await
            }
            status => Err(CoreError::JobExecutionError(format!(
                "Cannot deliver {} to job {} in status: {:?}",
                event_name, job_id, status
            ))),
        }
    }

    /// Expire a job that never received its completion signal: tear the
    /// container group down and mark the job failed.
    pub async fn expire_job(&self, job_id: &JobId) -> Result<(), CoreError> {
        let mut job = match self.job_repo.find_by_id(job_id).await? {
            Some(job) => job,
            None => return Ok(()),
        };
        if job.status != JobStatus::AwaitingCompletion {
            return Ok(());
        }

        warn!(%job_id, "job did not receive a completion signal in time");
        job.begin_teardown()?;
        self.job_repo.save(&job).await?;

        let container_group = job.container_group.clone().unwrap_or_default();
        let error = match self.provider.delete_container_group(&container_group).await {
            Ok(()) => "completion timed out".to_string(),
            Err(e) => format!("completion timed out; teardown also failed: {}", e),
        };

        job.fail(error)?;
        self.job_repo.save(&job).await?;
        self.handle_events(&mut job);
        Ok(())
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: &JobId) -> Result<Option<Job>, CoreError> {
        self.job_repo.find_by_id(job_id).await
    }

    /// List job summaries with an optional status filter
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobSummary>, CoreError> {
        let jobs = self.job_repo.list_jobs(status.as_ref()).await?;
        Ok(jobs.iter().map(JobSummary::from).collect())
    }

    /// Tear down a job's container group and complete the job
    async fn finish_job(&self, mut job: Job) -> Result<(), CoreError> {
        let job_id = job.id.clone();
        job.begin_teardown()?;
        self.job_repo.save(&job).await?;

        let container_group = job.container_group.clone().ok_or_else(|| {
            CoreError::JobExecutionError(format!("Job {} has no container group", job_id))
        })?;

        info!(%job_id, %container_group, "deleting container group");

        if let Err(e) = self.provider.delete_container_group(&container_group).await {
            job.fail(format!("container teardown failed: {}", e))?;
            self.job_repo.save(&job).await?;
            self.handle_events(&mut job);
            return Err(e);
        }

        job.complete()?;
        self.job_repo.save(&job).await?;
        self.handle_events(&mut job);

        info!(%job_id, "job completed");
        Ok(())
    }

    /// Dispatch recorded domain events to the event handler
    fn handle_events(&self, job: &mut Job) {
        for event in job.take_events() {
            self.event_handler.handle(event.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider::ContainerGroup;
    use crate::domain::repository::memory::MemoryJobRepository;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Test double recording provider calls; can fail on demand and can
    /// signal completion from inside create to exercise event buffering.
    #[derive(Default)]
    struct FakeProvider {
        created: Mutex<Vec<ContainerGroupSpec>>,
        deleted: Mutex<Vec<String>>,
        fail_create: bool,
        fail_delete: bool,
        signal_during_create: tokio::sync::RwLock<Option<JobExecutionService>>,
    }

    impl std::fmt::Debug for FakeProvider {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FakeProvider").finish()
        }
    }

    #[async_trait]
    impl ContainerProvider for FakeProvider {
        async fn create_container_group(
            &self,
            spec: &ContainerGroupSpec,
        ) -> Result<ContainerGroup, CoreError> {
            if self.fail_create {
                return Err(CoreError::ProviderError("quota exceeded".to_string()));
            }

            if let Some(service) = self.signal_during_create.read().await.as_ref() {
                let job_id = JobId(
                    spec.name
                        .strip_prefix("extract-")
                        .unwrap_or(&spec.name)
                        .to_string(),
                );
                service
                    .raise_event(&job_id, COMPLETION_EVENT, json!({"exitCode": 0}))
                    .await
                    .unwrap();
            }

            self.created.lock().unwrap().push(spec.clone());
            Ok(ContainerGroup {
                name: spec.name.clone(),
                ip_address: Some("10.0.0.4".to_string()),
                fqdn: Some(format!("{}.eastus.azurecontainer.io", spec.name)),
            })
        }

        async fn delete_container_group(&self, name: &str) -> Result<(), CoreError> {
            if self.fail_delete {
                return Err(CoreError::ProviderError("delete rejected".to_string()));
            }
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn container_group_exists(&self, name: &str) -> Result<bool, CoreError> {
            let created = self.created.lock().unwrap();
            let deleted = self.deleted.lock().unwrap();
            Ok(created.iter().any(|s| s.name == name) && !deleted.iter().any(|n| n == name))
        }

        async fn health_check(&self) -> Result<bool, CoreError> {
            Ok(true)
        }
    }

    fn create_service(provider: Arc<FakeProvider>) -> JobExecutionService {
        create_service_with_settings(provider, ExecutionSettings::default())
    }

    fn create_service_with_settings(
        provider: Arc<FakeProvider>,
        settings: ExecutionSettings,
    ) -> JobExecutionService {
        JobExecutionService::new(
            Arc::new(MemoryJobRepository::new()),
            provider,
            Arc::new(LoggingEventHandler),
            settings,
        )
    }

    fn request(url: &str) -> JobRequest {
        JobRequest {
            video_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_start_job_provisions_and_waits() {
        let provider = Arc::new(FakeProvider::default());
        let service = create_service(provider.clone());

        let job_id = service
            .start_job(request("https://youtu.be/test"))
            .await
            .unwrap();

        let job = service.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::AwaitingCompletion);
        assert_eq!(
            job.container_group.as_deref(),
            Some(format!("extract-{}", job_id).as_str())
        );
        assert_eq!(job.public_ip.as_deref(), Some("10.0.0.4"));

        let created = provider.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].video_url, "https://youtu.be/test");
        assert_eq!(
            created[0].callback_url,
            format!("http://localhost:8080/v1/jobs/{}/events/job.finished", job_id)
        );
    }

    #[tokio::test]
    async fn test_start_job_rejects_invalid_url() {
        let service = create_service(Arc::new(FakeProvider::default()));

        let empty = service.start_job(request("   ")).await;
        assert!(matches!(empty, Err(CoreError::ValidationError(_))));

        let not_http = service.start_job(request("ftp://example.com/v")).await;
        assert!(matches!(not_http, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_start_job_provision_failure_fails_job() {
        let provider = Arc::new(FakeProvider {
            fail_create: true,
            ..Default::default()
        });
        let service = create_service(provider);

        let result = service.start_job(request("https://youtu.be/test")).await;
        assert!(matches!(result, Err(CoreError::ProviderError(_))));

        let failed = service.list_jobs(Some(JobStatus::Failed)).await.unwrap();
        assert_eq!(failed.len(), 1);

        let job_id = JobId(failed[0].id.clone());
        let job = service.get_job(&job_id).await.unwrap().unwrap();
        assert!(job.error.as_deref().unwrap().contains("provisioning failed"));
    }

    #[tokio::test]
    async fn test_completion_event_finishes_job() {
        let provider = Arc::new(FakeProvider::default());
        let service = create_service(provider.clone());

        let job_id = service
            .start_job(request("https://youtu.be/test"))
            .await
            .unwrap();

        service
            .raise_event(&job_id, COMPLETION_EVENT, json!({"exitCode": 0}))
            .await
            .unwrap();

        let job = service.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        let deleted = provider.deleted.lock().unwrap();
        assert_eq!(deleted.as_slice(), [format!("extract-{}", job_id)]);
    }

    #[tokio::test]
    async fn test_raise_event_unknown_job() {
        let service = create_service(Arc::new(FakeProvider::default()));

        let result = service
            .raise_event(&JobId::new(), COMPLETION_EVENT, Value::Null)
            .await;
        assert!(matches!(result, Err(CoreError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_completion_rejected() {
        let provider = Arc::new(FakeProvider::default());
        let service = create_service(provider.clone());

        let job_id = service
            .start_job(request("https://youtu.be/test"))
            .await
            .unwrap();
        service
            .raise_event(&job_id, COMPLETION_EVENT, Value::Null)
            .await
            .unwrap();

        let second = service
            .raise_event(&job_id, COMPLETION_EVENT, Value::Null)
            .await;
        assert!(matches!(second, Err(CoreError::JobExecutionError(_))));

        // The job stays completed and nothing was deleted twice
        let job = service.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(provider.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_completion_event_is_buffered() {
        let service = create_service(Arc::new(FakeProvider::default()));

        let job_id = service
            .start_job(request("https://youtu.be/test"))
            .await
            .unwrap();
        service
            .raise_event(&job_id, "progress", json!({"percent": 40}))
            .await
            .unwrap();

        let job = service.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::AwaitingCompletion);
        assert!(job.has_buffered("progress"));
    }

    #[tokio::test]
    async fn test_completion_during_provisioning_is_drained() {
        let provider = Arc::new(FakeProvider::default());
        let service = create_service(provider.clone());
        *provider.signal_during_create.write().await = Some(service.clone());

        let job_id = service
            .start_job(request("https://youtu.be/test"))
            .await
            .unwrap();

        // The signal arrived while the job was provisioning; start_job must
        // drain the buffer and run teardown exactly once.
        let job = service.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(provider.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_teardown_failure_fails_job() {
        let provider = Arc::new(FakeProvider {
            fail_delete: true,
            ..Default::default()
        });
        let service = create_service(provider);

        let job_id = service
            .start_job(request("https://youtu.be/test"))
            .await
            .unwrap();

        let result = service
            .raise_event(&job_id, COMPLETION_EVENT, Value::Null)
            .await;
        assert!(matches!(result, Err(CoreError::ProviderError(_))));

        let job = service.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("teardown failed"));
    }

    #[tokio::test]
    async fn test_completion_timeout_expires_job() {
        let provider = Arc::new(FakeProvider::default());
        let service = create_service_with_settings(
            provider.clone(),
            ExecutionSettings {
                completion_timeout: Some(Duration::from_millis(50)),
                ..Default::default()
            },
        );

        let job_id = service
            .start_job(request("https://youtu.be/test"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        let job = service.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(provider.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timely_completion_beats_watchdog() {
        let provider = Arc::new(FakeProvider::default());
        let service = create_service_with_settings(
            provider.clone(),
            ExecutionSettings {
                completion_timeout: Some(Duration::from_millis(100)),
                ..Default::default()
            },
        );

        let job_id = service
            .start_job(request("https://youtu.be/test"))
            .await
            .unwrap();
        service
            .raise_event(&job_id, COMPLETION_EVENT, Value::Null)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        let job = service.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(provider.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_jobs_summaries() {
        let service = create_service(Arc::new(FakeProvider::default()));

        let job_id = service
            .start_job(request("https://youtu.be/test"))
            .await
            .unwrap();

        let all = service.list_jobs(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, job_id.0);
        assert_eq!(all[0].status, "AwaitingCompletion");
        assert_eq!(all[0].video_url, "https://youtu.be/test");

        let completed = service.list_jobs(Some(JobStatus::Completed)).await.unwrap();
        assert!(completed.is_empty());
    }
}
