use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use leadclaim_core::{AppError, AppResult, AuthContext, Region};
use leadclaim_domain::{
    ClaimAttempt, ClaimEndpoint, ClaimResult, Job, JobId, JobPayload, JobStatus, OpportunityId,
    PushEvent, PushEventRecord,
};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::claim_ports::{
    AuthTokenCache, ClaimResultRepository, ClaimStrategy, JobRepository, LeadListingSource,
    PushChannelConnector, PushConnection, PushEventLog, QueueStats, RecordStatus, TokenProvider,
};

pub(crate) fn region() -> Region {
    Region::new("Central FL").unwrap_or_else(|_| unreachable!())
}

pub(crate) fn opportunity(value: &str) -> OpportunityId {
    OpportunityId::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn attempt(code: u16) -> ClaimAttempt {
    ClaimAttempt {
        code,
        endpoint: ClaimEndpoint::Primary,
        latency_ms: 12,
        response_excerpt: None,
    }
}

#[derive(Default)]
pub(crate) struct FakeJobRepository {
    jobs: Mutex<Vec<Job>>,
    claim_limits: Mutex<Vec<usize>>,
    failing_claims: Mutex<u32>,
}

impl FakeJobRepository {
    pub(crate) fn failing_claims(count: u32) -> Self {
        Self {
            failing_claims: Mutex::new(count),
            ..Self::default()
        }
    }

    pub(crate) async fn claim_limits(&self) -> Vec<usize> {
        self.claim_limits.lock().await.clone()
    }

    pub(crate) async fn all_jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl JobRepository for FakeJobRepository {
    async fn enqueue(&self, payload: JobPayload) -> AppResult<JobId> {
        let job = Job::queued(payload);
        let job_id = job.id;
        self.jobs.lock().await.push(job);
        Ok(job_id)
    }

    async fn claim_batch(&self, limit: usize) -> AppResult<Vec<Job>> {
        self.claim_limits.lock().await.push(limit);
        {
            let mut failing = self.failing_claims.lock().await;
            if *failing > 0 {
                *failing -= 1;
                return Err(AppError::Unavailable("job store offline".to_owned()));
            }
        }

        let mut jobs = self.jobs.lock().await;
        let mut claimed = Vec::new();
        for job in jobs
            .iter_mut()
            .filter(|job| job.status == JobStatus::Queued)
            .take(limit)
        {
            job.transition_to(JobStatus::Processing)?;
            claimed.push(job.clone());
        }

        Ok(claimed)
    }

    async fn mark_done(&self, job_id: JobId) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or_else(|| AppError::NotFound(format!("job '{job_id}' does not exist")))?;
        job.transition_to(JobStatus::Done)
    }

    async fn find_job(&self, job_id: JobId) -> AppResult<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .await
            .iter()
            .find(|job| job.id == job_id)
            .cloned())
    }

    async fn queue_stats(&self) -> AppResult<QueueStats> {
        let jobs = self.jobs.lock().await;
        let count = |status: JobStatus| {
            jobs.iter().filter(|job| job.status == status).count() as u64
        };

        Ok(QueueStats {
            queued_jobs: count(JobStatus::Queued),
            processing_jobs: count(JobStatus::Processing),
            done_jobs: count(JobStatus::Done),
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeClaimResultRepository {
    results: Mutex<HashMap<(String, String), ClaimResult>>,
    fail: bool,
}

impl FakeClaimResultRepository {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.results.lock().await.len()
    }
}

#[async_trait]
impl ClaimResultRepository for FakeClaimResultRepository {
    async fn insert_result(&self, result: ClaimResult) -> AppResult<RecordStatus> {
        if self.fail {
            return Err(AppError::Unavailable("result store offline".to_owned()));
        }

        let key = (
            result.opportunity_id.as_str().to_owned(),
            result.region.as_str().to_owned(),
        );
        let mut results = self.results.lock().await;
        let status = match results.get(&key) {
            None => RecordStatus::Inserted,
            Some(existing) if existing.status.is_success() => return Ok(RecordStatus::Unchanged),
            Some(_) => RecordStatus::Superseded,
        };
        results.insert(key, result);
        Ok(status)
    }

    async fn find_result(
        &self,
        opportunity_id: &OpportunityId,
        region: &Region,
    ) -> AppResult<Option<ClaimResult>> {
        Ok(self
            .results
            .lock()
            .await
            .get(&(opportunity_id.as_str().to_owned(), region.as_str().to_owned()))
            .cloned())
    }

    async fn list_recent(&self, limit: usize) -> AppResult<Vec<ClaimResult>> {
        let mut results: Vec<ClaimResult> = self.results.lock().await.values().cloned().collect();
        results.sort_by(|left, right| right.recorded_at.cmp(&left.recorded_at));
        results.truncate(limit);
        Ok(results)
    }
}

pub(crate) struct FakeClaimStrategy {
    code: u16,
    delay: std::time::Duration,
    calls: Mutex<Vec<(String, Option<i64>)>>,
    started: Mutex<Vec<Instant>>,
}

impl FakeClaimStrategy {
    pub(crate) fn returning(code: u16) -> Self {
        Self::slow(code, std::time::Duration::ZERO)
    }

    pub(crate) fn slow(code: u16, delay: std::time::Duration) -> Self {
        Self {
            code,
            delay,
            calls: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn calls(&self) -> Vec<(String, Option<i64>)> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn started(&self) -> Vec<Instant> {
        self.started.lock().await.clone()
    }
}

#[async_trait]
impl ClaimStrategy for FakeClaimStrategy {
    async fn claim(
        &self,
        opportunity_id: &OpportunityId,
        _auth: &AuthContext,
        dealer_id: Option<i64>,
    ) -> ClaimAttempt {
        self.started.lock().await.push(Instant::now());
        self.calls
            .lock()
            .await
            .push((opportunity_id.as_str().to_owned(), dealer_id));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        attempt(self.code)
    }
}

pub(crate) struct FakeTokenProvider {
    lifetime: Duration,
    fail: bool,
    calls: Mutex<u32>,
}

impl Default for FakeTokenProvider {
    fn default() -> Self {
        Self::valid_for(Duration::minutes(30))
    }
}

impl FakeTokenProvider {
    pub(crate) fn valid_for(lifetime: Duration) -> Self {
        Self {
            lifetime,
            fail: false,
            calls: Mutex::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) async fn calls(&self) -> u32 {
        *self.calls.lock().await
    }
}

#[async_trait]
impl TokenProvider for FakeTokenProvider {
    async fn fetch_token(&self, region: &Region) -> AppResult<AuthContext> {
        let call_number = {
            let mut calls = self.calls.lock().await;
            *calls += 1;
            *calls
        };
        if self.fail {
            return Err(AppError::Unauthorized(format!(
                "token service refused region '{region}'"
            )));
        }

        Ok(AuthContext::new(
            region.clone(),
            format!("token-{call_number}"),
            Utc::now() + self.lifetime,
        ))
    }
}

#[derive(Default)]
pub(crate) struct FakeTokenCache {
    entries: Mutex<HashMap<Region, AuthContext>>,
    fail: bool,
}

impl FakeTokenCache {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl AuthTokenCache for FakeTokenCache {
    async fn get_token(&self, region: &Region) -> AppResult<Option<AuthContext>> {
        if self.fail {
            return Err(AppError::Unavailable("cache offline".to_owned()));
        }
        Ok(self.entries.lock().await.get(region).cloned())
    }

    async fn set_token(&self, context: &AuthContext, _ttl_seconds: u32) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Unavailable("cache offline".to_owned()));
        }
        self.entries
            .lock()
            .await
            .insert(context.region().clone(), context.clone());
        Ok(())
    }
}

pub(crate) struct FakeListingSource {
    listing: Value,
    bearer_tokens: Mutex<Vec<Option<String>>>,
}

impl FakeListingSource {
    pub(crate) fn returning(listing: Value) -> Self {
        Self {
            listing,
            bearer_tokens: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn bearer_tokens(&self) -> Vec<Option<String>> {
        self.bearer_tokens.lock().await.clone()
    }
}

#[async_trait]
impl LeadListingSource for FakeListingSource {
    async fn fetch_listing(&self, auth: Option<&AuthContext>) -> AppResult<Value> {
        self.bearer_tokens
            .lock()
            .await
            .push(auth.map(|auth| auth.bearer_token().to_owned()));
        Ok(self.listing.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakePushConnector {
    sessions: Mutex<VecDeque<Vec<PushEvent>>>,
    hang: bool,
    connects: Mutex<u32>,
}

impl FakePushConnector {
    pub(crate) fn with_sessions(sessions: Vec<Vec<PushEvent>>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            ..Self::default()
        }
    }

    pub(crate) fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub(crate) async fn connects(&self) -> u32 {
        *self.connects.lock().await
    }
}

#[async_trait]
impl PushChannelConnector for FakePushConnector {
    async fn connect(&self, _auth: &AuthContext) -> AppResult<Box<dyn PushConnection>> {
        *self.connects.lock().await += 1;
        if self.hang {
            return Ok(Box::new(FakePushConnection {
                events: VecDeque::new(),
                hang: true,
            }));
        }

        let events = self
            .sessions
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| AppError::Transport("hub refused connection".to_owned()))?;
        Ok(Box::new(FakePushConnection {
            events: events.into(),
            hang: false,
        }))
    }
}

struct FakePushConnection {
    events: VecDeque<PushEvent>,
    hang: bool,
}

#[async_trait]
impl PushConnection for FakePushConnection {
    async fn next_event(&mut self) -> AppResult<Option<PushEvent>> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(self.events.pop_front())
    }
}

#[derive(Default)]
pub(crate) struct FakePushEventLog {
    records: Mutex<Vec<PushEventRecord>>,
    fail: bool,
}

impl FakePushEventLog {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) async fn records(&self) -> Vec<PushEventRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl PushEventLog for FakePushEventLog {
    async fn append(&self, record: PushEventRecord) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Unavailable("event log offline".to_owned()));
        }
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> AppResult<Vec<PushEventRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        if self.fail {
            return Err(AppError::Unavailable("event log offline".to_owned()));
        }
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|record| record.recorded_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}
