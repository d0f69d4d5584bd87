//! Repository traits for the Sluice core
//!
//! External crates can implement these traits to provide different
//! persistence mechanisms; the in-memory implementation below is the
//! default runtime store.

use async_trait::async_trait;

use super::job::{Job, JobId, JobStatus};
use crate::CoreError;

/// Repository for jobs
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Find a job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, CoreError>;

    /// Save a job
    async fn save(&self, job: &Job) -> Result<(), CoreError>;

    /// Delete a job
    async fn delete(&self, id: &JobId) -> Result<(), CoreError>;

    /// List jobs with an optional status filter
    async fn list_jobs(&self, status: Option<&JobStatus>) -> Result<Vec<Job>, CoreError>;
}

/// In-memory repository implementations
pub mod memory {
    use super::*;
    use dashmap::DashMap;

    /// In-memory job repository over a concurrent map
    pub struct MemoryJobRepository {
        jobs: std::sync::Arc<DashMap<String, Job>>,
    }

    impl MemoryJobRepository {
        /// Create a new memory job repository
        pub fn new() -> Self {
            Self {
                jobs: std::sync::Arc::new(DashMap::with_capacity(32)),
            }
        }
    }

    impl Default for MemoryJobRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl JobRepository for MemoryJobRepository {
        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, CoreError> {
            Ok(self.jobs.get(&id.0).map(|job| job.clone()))
        }

        async fn save(&self, job: &Job) -> Result<(), CoreError> {
            self.jobs.insert(job.id.0.clone(), job.clone());
            Ok(())
        }

        async fn delete(&self, id: &JobId) -> Result<(), CoreError> {
            self.jobs.remove(&id.0);
            Ok(())
        }

        async fn list_jobs(&self, status: Option<&JobStatus>) -> Result<Vec<Job>, CoreError> {
            let mut result = Vec::new();

            for job in self.jobs.iter() {
                if let Some(status) = status {
                    if job.status == *status {
                        result.push(job.clone());
                    }
                } else {
                    result.push(job.clone());
                }
            }

            Ok(result)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_save_and_find() {
            let repo = MemoryJobRepository::new();
            let job = Job::new("https://youtu.be/test".to_string());

            repo.save(&job).await.unwrap();

            let found = repo.find_by_id(&job.id).await.unwrap().unwrap();
            assert_eq!(found.id, job.id);
            assert_eq!(found.status, JobStatus::Accepted);
        }

        #[tokio::test]
        async fn test_find_missing_returns_none() {
            let repo = MemoryJobRepository::new();

            let found = repo.find_by_id(&JobId::new()).await.unwrap();
            assert!(found.is_none());
        }

        #[tokio::test]
        async fn test_delete() {
            let repo = MemoryJobRepository::new();
            let job = Job::new("https://youtu.be/test".to_string());

            repo.save(&job).await.unwrap();
            repo.delete(&job.id).await.unwrap();

            assert!(repo.find_by_id(&job.id).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_list_jobs_with_status_filter() {
            let repo = MemoryJobRepository::new();

            let accepted = Job::new("https://youtu.be/a".to_string());
            repo.save(&accepted).await.unwrap();

            let mut failed = Job::new("https://youtu.be/b".to_string());
            failed.fail("boom".to_string()).unwrap();
            repo.save(&failed).await.unwrap();

            let all = repo.list_jobs(None).await.unwrap();
            assert_eq!(all.len(), 2);

            let only_failed = repo.list_jobs(Some(&JobStatus::Failed)).await.unwrap();
            assert_eq!(only_failed.len(), 1);
            assert_eq!(only_failed[0].id, failed.id);
        }
    }
}
