//! Background renewal runner
//!
//! Renewal triggers are queued on a bounded channel and executed one at a
//! time by a single worker task. The worker is the only writer of the output
//! directory and the cache. Every job gets a status record that can be polled
//! until it finishes; the most recent [`STATUS_HISTORY`] records are kept.

use crate::cache::MetadataCache;
use crate::error::{ApiError, ApiResult};
use crate::notify::Notifier;
use chrono::{DateTime, Utc};
use lrmeta_common::config::TomlConfig;
use lrmeta_common::ResourcePath;
use lrmeta_ingest::{NormalizeOptions, Normalizer};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Number of job status records retained
pub const STATUS_HISTORY: usize = 100;

/// What to renew
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenewalRequest {
    /// `None` renews the whole store
    pub scope: Option<Vec<ResourcePath>>,
    pub debug: bool,
    pub offline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Status record of one renewal job
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobStatus {
    pub task_id: Uuid,
    pub state: JobState,
    /// Requested paths, `null` for a full renewal
    pub resource_paths: Option<Vec<String>>,
    pub debug: bool,
    pub offline: bool,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl JobStatus {
    fn pending(task_id: Uuid, request: &RenewalRequest) -> Self {
        Self {
            task_id,
            state: JobState::Pending,
            resource_paths: request
                .scope
                .as_ref()
                .map(|paths| paths.iter().map(ToString::to_string).collect()),
            debug: request.debug,
            offline: request.offline,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, JobState::Succeeded | JobState::Failed)
    }
}

#[derive(Default)]
struct JobLog {
    order: VecDeque<Uuid>,
    records: HashMap<Uuid, JobStatus>,
}

impl JobLog {
    fn insert(&mut self, status: JobStatus) {
        self.order.push_back(status.task_id);
        self.records.insert(status.task_id, status);
        while self.order.len() > STATUS_HISTORY {
            if let Some(oldest) = self.order.pop_front() {
                self.records.remove(&oldest);
            }
        }
    }

    fn update(&mut self, task_id: Uuid, apply: impl FnOnce(&mut JobStatus)) {
        if let Some(status) = self.records.get_mut(&task_id) {
            apply(status);
        }
    }
}

struct Job {
    task_id: Uuid,
    request: RenewalRequest,
}

/// Handle for submitting renewals and polling their status
#[derive(Clone)]
pub struct RenewalRunner {
    sender: mpsc::Sender<Job>,
    jobs: Arc<RwLock<JobLog>>,
}

/// Consumer side of the renewal queue
pub struct RenewalWorker {
    receiver: mpsc::Receiver<Job>,
    jobs: Arc<RwLock<JobLog>>,
}

/// Create the queue; at most `max_pending` renewals wait behind the running one
pub fn renewal_queue(max_pending: usize) -> (RenewalRunner, RenewalWorker) {
    let (sender, receiver) = mpsc::channel(max_pending.max(1));
    let jobs = Arc::new(RwLock::new(JobLog::default()));
    (
        RenewalRunner {
            sender,
            jobs: Arc::clone(&jobs),
        },
        RenewalWorker { receiver, jobs },
    )
}

impl RenewalRunner {
    /// Queue a renewal and return its task ID without waiting for it
    pub async fn submit(&self, request: RenewalRequest) -> ApiResult<Uuid> {
        let permit = self.sender.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => ApiError::Conflict(
                "Cache renewal already running and the queue is full, try again later".to_string(),
            ),
            TrySendError::Closed(()) => {
                ApiError::Internal("Renewal worker is not running".to_string())
            }
        })?;

        let task_id = Uuid::new_v4();
        self.jobs
            .write()
            .await
            .insert(JobStatus::pending(task_id, &request));
        info!(
            task_id = %task_id,
            scope = %describe_scope(&request.scope),
            "Cache renewal queued"
        );
        permit.send(Job { task_id, request });
        Ok(task_id)
    }

    pub async fn status(&self, task_id: Uuid) -> Option<JobStatus> {
        self.jobs.read().await.records.get(&task_id).cloned()
    }
}

impl RenewalWorker {
    /// Run queued jobs until every [`RenewalRunner`] handle is dropped
    pub fn spawn(
        self,
        config: Arc<TomlConfig>,
        cache: Arc<MetadataCache>,
        notifier: Notifier,
    ) -> JoinHandle<()> {
        let RenewalWorker { mut receiver, jobs } = self;
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                execute(&jobs, job, &config, &cache, &notifier).await;
            }
            info!("Renewal worker stopped");
        })
    }
}

async fn execute(
    jobs: &RwLock<JobLog>,
    job: Job,
    config: &Arc<TomlConfig>,
    cache: &Arc<MetadataCache>,
    notifier: &Notifier,
) {
    let task_id = job.task_id;
    jobs.write().await.update(task_id, |status| {
        status.state = JobState::Running;
        status.started_at = Some(Utc::now());
    });
    info!(
        task_id = %task_id,
        scope = %describe_scope(&job.request.scope),
        debug = job.request.debug,
        offline = job.request.offline,
        "Starting cache renewal"
    );

    let (warnings, failure) =
        run_isolated(renew(job.request, Arc::clone(config), Arc::clone(cache))).await;

    match &failure {
        Some(message) => error!(task_id = %task_id, "Cache renewal failed: {}", message),
        None if !warnings.is_empty() => warn!(
            task_id = %task_id,
            warnings = warnings.len(),
            "Cache renewal completed with warnings"
        ),
        None => info!(task_id = %task_id, "Cache renewal completed"),
    }

    if let Some(text) = renewal_message(&warnings, failure.as_deref()) {
        notifier.send(&text).await;
    }

    jobs.write().await.update(task_id, |status| {
        status.state = if failure.is_some() {
            JobState::Failed
        } else {
            JobState::Succeeded
        };
        status.finished_at = Some(Utc::now());
        status.warnings = warnings;
        status.error = failure;
    });
}

/// Warnings and failure message of one renewal
type Outcome = (Vec<String>, Option<String>);

/// Run a renewal on its own task so a panic fails the job instead of the worker
async fn run_isolated<F>(run: F) -> Outcome
where
    F: Future<Output = Outcome> + Send + 'static,
{
    match tokio::spawn(run).await {
        Ok(outcome) => outcome,
        Err(e) => (Vec::new(), Some(format!("Renewal task aborted: {}", e))),
    }
}

/// Normalize and refresh the cache; returns the warnings and the failure, if any
///
/// Renewals always validate records against the schema.
async fn renew(
    request: RenewalRequest,
    config: Arc<TomlConfig>,
    cache: Arc<MetadataCache>,
) -> Outcome {
    let options = NormalizeOptions {
        debug: request.debug,
        offline: request.offline,
        validate: true,
    };
    let normalizer = Normalizer::new(config.as_ref().clone(), options);

    match normalizer.run(request.scope.as_deref()).await {
        Ok(report) => match cache.apply_report(&report).await {
            Ok(()) => (report.warnings, None),
            Err(e) => (report.warnings, Some(format!("Failed to reload cache: {}", e))),
        },
        Err(e) => (Vec::new(), Some(e.to_string())),
    }
}

/// Chat message for a finished renewal, `None` when there is nothing to report
pub fn renewal_message(warnings: &[String], failure: Option<&str>) -> Option<String> {
    if warnings.is_empty() && failure.is_none() {
        return None;
    }
    let mut lines = Vec::with_capacity(warnings.len() + 1);
    lines.push(match failure {
        Some(_) => "Cache renewal failed.".to_string(),
        None => "Cache renewal completed.".to_string(),
    });
    if let Some(message) = failure {
        lines.push(format!("ERROR: {}", message));
    }
    lines.extend(warnings.iter().map(|w| format!("WARNING: {}", w)));
    Some(lines.join("\n"))
}

fn describe_scope(scope: &Option<Vec<ResourcePath>>) -> String {
    match scope {
        None => "all".to_string(),
        Some(paths) => paths
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lrmeta_ingest::OutputLayout;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_full_queue_is_rejected() {
        let (runner, _worker) = renewal_queue(1);
        let first = runner.submit(RenewalRequest::default()).await.unwrap();
        let second = runner.submit(RenewalRequest::default()).await;
        assert!(matches!(second, Err(ApiError::Conflict(_))));

        let status = runner.status(first).await.unwrap();
        assert_eq!(status.state, JobState::Pending);
        assert!(status.resource_paths.is_none());
    }

    #[tokio::test]
    async fn test_stopped_worker_is_internal_error() {
        let (runner, worker) = renewal_queue(3);
        drop(worker);
        let result = runner.submit(RenewalRequest::default()).await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[test]
    fn test_status_history_is_bounded() {
        let mut log = JobLog::default();
        let ids: Vec<Uuid> = (0..STATUS_HISTORY + 5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            log.insert(JobStatus::pending(*id, &RenewalRequest::default()));
        }
        assert_eq!(log.records.len(), STATUS_HISTORY);
        assert!(!log.records.contains_key(&ids[0]));
        assert!(log.records.contains_key(&ids[ids.len() - 1]));
    }

    #[test]
    fn test_renewal_message() {
        assert_eq!(renewal_message(&[], None), None);
        let warnings = vec!["Collection 'x' lists unknown resource 'y'".to_string()];
        assert_eq!(
            renewal_message(&warnings, None).unwrap(),
            "Cache renewal completed.\nWARNING: Collection 'x' lists unknown resource 'y'"
        );
        assert!(renewal_message(&[], Some("store missing"))
            .unwrap()
            .starts_with("Cache renewal failed.\nERROR: store missing"));
    }

    #[tokio::test]
    async fn test_panicking_run_becomes_failure() {
        let failing = async {
            let outcome: Option<Outcome> = None;
            outcome.expect("renewal produced no outcome")
        };
        let (warnings, failure) = run_isolated(failing).await;
        assert!(warnings.is_empty());
        assert!(failure.unwrap().starts_with("Renewal task aborted"));

        let expected: Outcome = (vec!["w".to_string()], None);
        let returned = expected.clone();
        assert_eq!(run_isolated(async move { returned }).await, expected);
    }

    async fn wait_finished(runner: &RenewalRunner, task_id: Uuid) -> JobStatus {
        for _ in 0..200 {
            if let Some(status) = runner.status(task_id).await {
                if status.is_finished() {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("renewal {} did not finish", task_id);
    }

    #[tokio::test]
    async fn test_worker_runs_renewal_and_fills_cache() {
        let temp = TempDir::new().unwrap();
        let yaml = temp.path().join("metadata/yaml/corpus");
        std::fs::create_dir_all(&yaml).unwrap();
        std::fs::write(yaml.join("attasidor.yaml"), "name:\n  eng: 8 Pages\n").unwrap();
        let config = Arc::new(TomlConfig {
            metadata_dir: temp.path().join("metadata"),
            static_dir: temp.path().join("static"),
            ..TomlConfig::default()
        });
        let cache = Arc::new(MetadataCache::new(
            OutputLayout::new(&config.static_dir),
            false,
        ));
        let (runner, worker) = renewal_queue(3);
        worker.spawn(Arc::clone(&config), Arc::clone(&cache), Notifier::disabled());

        let task_id = runner
            .submit(RenewalRequest {
                offline: true,
                ..RenewalRequest::default()
            })
            .await
            .unwrap();
        let status = wait_finished(&runner, task_id).await;

        assert_eq!(status.state, JobState::Succeeded);
        assert!(status.error.is_none());
        assert!(cache.len().await > 0);
    }

    #[tokio::test]
    async fn test_missing_store_fails_job() {
        let temp = TempDir::new().unwrap();
        let config = Arc::new(TomlConfig {
            metadata_dir: temp.path().join("absent"),
            static_dir: temp.path().join("static"),
            ..TomlConfig::default()
        });
        let cache = Arc::new(MetadataCache::new(
            OutputLayout::new(&config.static_dir),
            false,
        ));
        let (runner, worker) = renewal_queue(3);
        worker.spawn(config, cache, Notifier::disabled());

        let task_id = runner.submit(RenewalRequest::default()).await.unwrap();
        let status = wait_finished(&runner, task_id).await;
        assert_eq!(status.state, JobState::Failed);
        assert!(status.error.is_some());
        assert!(status.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_worker_keeps_running_after_failed_job() {
        let temp = TempDir::new().unwrap();
        let config = Arc::new(TomlConfig {
            metadata_dir: temp.path().join("metadata"),
            static_dir: temp.path().join("static"),
            ..TomlConfig::default()
        });
        let cache = Arc::new(MetadataCache::new(
            OutputLayout::new(&config.static_dir),
            false,
        ));
        let (runner, worker) = renewal_queue(3);
        worker.spawn(Arc::clone(&config), Arc::clone(&cache), Notifier::disabled());

        let offline = RenewalRequest {
            offline: true,
            ..RenewalRequest::default()
        };
        let first = runner.submit(offline.clone()).await.unwrap();
        assert_eq!(wait_finished(&runner, first).await.state, JobState::Failed);

        let yaml = temp.path().join("metadata/yaml/lexicon");
        std::fs::create_dir_all(&yaml).unwrap();
        std::fs::write(yaml.join("saldo.yaml"), "name:\n  swe: SALDO\n").unwrap();

        let second = runner.submit(offline).await.unwrap();
        let status = wait_finished(&runner, second).await;
        assert_eq!(status.state, JobState::Succeeded);
        assert!(cache.len().await > 0);
    }
}
