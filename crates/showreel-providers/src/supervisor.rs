// Central job supervisor: one loop drives every outstanding provider job
// with bounded back-off; callers wait on completion signals instead of
// sleeping and re-checking themselves.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use showreel_types::{ProductionError, ProductionResult};

use crate::contract::{JobHandle, JobState, VideoProvider};

// Back-off never drops below the floor or exceeds the cap.
const DEFAULT_MIN_POLL: Duration = Duration::from_secs(3);
const DEFAULT_MAX_POLL: Duration = Duration::from_secs(30);

struct Ticket {
    provider: Arc<dyn VideoProvider>,
    handle: JobHandle,
    timeout: Duration,
    cancel: CancellationToken,
    reply: oneshot::Sender<ProductionResult<String>>,
}

struct ActiveJob {
    ticket: Ticket,
    next_poll: Instant,
    interval: Duration,
    deadline: Instant,
}

#[derive(Clone)]
pub struct JobSupervisor {
    tx: mpsc::Sender<Ticket>,
    min_poll: Duration,
}

impl JobSupervisor {
    pub fn start() -> Self {
        Self::start_with(DEFAULT_MIN_POLL, DEFAULT_MAX_POLL)
    }

    /// Intervals are injectable so tests run in milliseconds.
    pub fn start_with(min_poll: Duration, max_poll: Duration) -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(drive(rx, min_poll, max_poll));
        Self { tx, min_poll }
    }

    /// Register a pending job and wait for its terminal state. Resolves to
    /// the media URL on success.
    pub async fn watch(
        &self,
        provider: Arc<dyn VideoProvider>,
        handle: JobHandle,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> ProductionResult<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job_id = handle.job_id.clone();
        self.tx
            .send(Ticket {
                provider,
                handle,
                timeout,
                cancel,
                reply: reply_tx,
            })
            .await
            .map_err(|_| {
                ProductionError::ProviderTransient("job supervisor is not running".to_string())
            })?;

        reply_rx.await.unwrap_or(Err(ProductionError::PollTimeout {
            job_id,
            timeout_secs: timeout.as_secs(),
        }))
    }

    pub fn min_poll(&self) -> Duration {
        self.min_poll
    }
}

async fn drive(mut rx: mpsc::Receiver<Ticket>, min_poll: Duration, max_poll: Duration) {
    let mut jobs: Vec<ActiveJob> = Vec::new();
    let mut closed = false;

    loop {
        let wake = jobs.iter().map(|j| j.next_poll).min();

        let incoming = match (closed, wake) {
            // Every handle dropped; just finish the jobs already in flight.
            (true, Some(wake)) => {
                tokio::time::sleep_until(wake).await;
                None
            }
            (true, None) => return,
            (false, Some(wake)) => tokio::select! {
                ticket = rx.recv() => Some(ticket),
                _ = tokio::time::sleep_until(wake) => None,
            },
            (false, None) => Some(rx.recv().await),
        };

        match incoming {
            Some(Some(ticket)) => {
                let now = Instant::now();
                let first_poll = ticket.handle.next_poll_after.max(min_poll);
                jobs.push(ActiveJob {
                    deadline: now + ticket.timeout,
                    next_poll: now + first_poll,
                    interval: first_poll,
                    ticket,
                });
                continue;
            }
            Some(None) => {
                closed = true;
                if jobs.is_empty() {
                    return;
                }
            }
            None => {}
        }

        let now = Instant::now();
        let mut still_active = Vec::with_capacity(jobs.len());
        for mut job in jobs {
            if job.ticket.cancel.is_cancelled() {
                let _ = job
                    .ticket
                    .provider
                    .cancel(&job.ticket.handle.job_id)
                    .await;
                let _ = job.ticket.reply.send(Err(ProductionError::Cancelled));
                continue;
            }

            if now >= job.deadline {
                let job_id = job.ticket.handle.job_id.clone();
                tracing::warn!(job_id = %job_id, "job exceeded its polling deadline");
                let _ = job.ticket.provider.cancel(&job_id).await;
                let _ = job.ticket.reply.send(Err(ProductionError::PollTimeout {
                    job_id,
                    timeout_secs: job.ticket.timeout.as_secs(),
                }));
                continue;
            }

            if now < job.next_poll {
                still_active.push(job);
                continue;
            }

            match job.ticket.provider.poll(&job.ticket.handle.job_id).await {
                Ok(JobState::Succeeded { url }) => {
                    let _ = job.ticket.reply.send(Ok(url));
                }
                Ok(JobState::Failed { reason }) => {
                    let _ = job
                        .ticket
                        .reply
                        .send(Err(ProductionError::ProviderPermanent(reason)));
                }
                Ok(JobState::Cancelled) => {
                    let _ = job.ticket.reply.send(Err(ProductionError::Cancelled));
                }
                Ok(JobState::Queued | JobState::Running) => {
                    job.interval = (job.interval * 2).min(max_poll);
                    job.next_poll = now + job.interval;
                    still_active.push(job);
                }
                Err(err) if err.is_transient() => {
                    // Transient poll errors ride the same back-off curve.
                    tracing::debug!(job_id = %job.ticket.handle.job_id, %err, "poll failed");
                    job.interval = (job.interval * 2).min(max_poll);
                    job.next_poll = now + job.interval;
                    still_active.push(job);
                }
                Err(err) => {
                    let _ = job.ticket.reply.send(Err(err));
                }
            }
        }
        jobs = still_active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{
        GenerateOutcome, ImplementationStatus, ProviderProfile, VideoRequest,
    };
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedProvider {
        polls: AtomicU32,
        states: Vec<JobState>,
        cancels: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(states: Vec<JobState>) -> Self {
            Self {
                polls: AtomicU32::new(0),
                states,
                cancels: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl VideoProvider for ScriptedProvider {
        fn profile(&self) -> ProviderProfile {
            ProviderProfile {
                name: "scripted".into(),
                capabilities: vec![],
                min_duration_sec: 1.0,
                max_duration_sec: 10.0,
                aspect_ratios: vec!["16:9".into()],
                status: ImplementationStatus::Implemented,
                requires_seed_image: false,
            }
        }

        async fn generate(&self, _request: &VideoRequest) -> ProductionResult<GenerateOutcome> {
            unreachable!("supervisor tests poll only")
        }

        async fn poll(&self, _job_id: &str) -> ProductionResult<JobState> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self
                .states
                .get(n)
                .cloned()
                .unwrap_or_else(|| self.states.last().cloned().unwrap()))
        }

        async fn cancel(&self, _job_id: &str) -> ProductionResult<()> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn download(&self, _url: &str, _local_path: &Path) -> ProductionResult<u64> {
            Ok(0)
        }

        fn estimate_cost(
            &self,
            _duration_sec: f64,
            _options: &BTreeMap<String, serde_json::Value>,
        ) -> f64 {
            0.0
        }

        async fn validate_credentials(&self) -> bool {
            true
        }
    }

    fn handle() -> JobHandle {
        JobHandle {
            job_id: "job-1".into(),
            provider_tag: "scripted".into(),
            next_poll_after: Duration::from_millis(1),
            estimated_cost_usd: 0.1,
            expected_duration_sec: 5.0,
        }
    }

    #[tokio::test]
    async fn drives_job_through_to_success() {
        let supervisor =
            JobSupervisor::start_with(Duration::from_millis(1), Duration::from_millis(4));
        let provider = Arc::new(ScriptedProvider::new(vec![
            JobState::Queued,
            JobState::Running,
            JobState::Succeeded {
                url: "https://cdn.example.com/video.mp4".into(),
            },
        ]));

        let url = supervisor
            .watch(
                provider.clone(),
                handle(),
                Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/video.mp4");
        assert!(provider.polls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn failed_job_maps_to_permanent_error() {
        let supervisor =
            JobSupervisor::start_with(Duration::from_millis(1), Duration::from_millis(4));
        let provider = Arc::new(ScriptedProvider::new(vec![
            JobState::Running,
            JobState::Failed {
                reason: "content policy".into(),
            },
        ]));

        let err = supervisor
            .watch(
                provider,
                handle(),
                Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProductionError::ProviderPermanent(_)));
    }

    #[tokio::test]
    async fn stuck_job_times_out_and_cancels_provider_side() {
        let supervisor =
            JobSupervisor::start_with(Duration::from_millis(1), Duration::from_millis(2));
        let provider = Arc::new(ScriptedProvider::new(vec![JobState::Running]));

        let err = supervisor
            .watch(
                provider.clone(),
                handle(),
                Duration::from_millis(20),
                CancellationToken::new(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProductionError::PollTimeout { .. }));
        assert_eq!(provider.cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_surfaces_cancelled() {
        let supervisor =
            JobSupervisor::start_with(Duration::from_millis(1), Duration::from_millis(2));
        let provider = Arc::new(ScriptedProvider::new(vec![JobState::Running]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = supervisor
            .watch(provider, handle(), Duration::from_secs(5), cancel)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProductionError::Cancelled));
    }
}
