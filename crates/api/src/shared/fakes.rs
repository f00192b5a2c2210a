use crate::scheduler::Scheduler;
use nudge_domain::Repository;
use nudge_infra::{
    IIssueTracker, INotifier, IRepositoryRepo, ISys, InstallationToken, IssueTrackerError,
    ManualSys, NudgeContext, RateLimitStatus,
};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub issue_number: i64,
    pub body: String,
}

/// Issue tracker that records comments instead of posting them
pub struct FakeIssueTracker {
    comments: Mutex<Vec<PostedComment>>,
    comment_failure: Mutex<Option<u16>>,
    rate_limit: Mutex<RateLimitStatus>,
    credentials_issued: AtomicUsize,
}

impl FakeIssueTracker {
    pub fn new() -> Self {
        Self {
            comments: Mutex::new(Vec::new()),
            comment_failure: Mutex::new(None),
            rate_limit: Mutex::new(RateLimitStatus {
                remaining: 5000,
                reset_at: 0,
            }),
            credentials_issued: AtomicUsize::new(0),
        }
    }

    /// Every following comment fails with the given HTTP status
    pub fn fail_comments_with(&self, status: Option<u16>) {
        *self.comment_failure.lock().unwrap() = status;
    }

    pub fn set_rate_limit(&self, status: RateLimitStatus) {
        *self.rate_limit.lock().unwrap() = status;
    }

    pub fn comments(&self) -> Vec<PostedComment> {
        self.comments.lock().unwrap().clone()
    }

    pub fn credentials_issued(&self) -> usize {
        self.credentials_issued.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IIssueTracker for FakeIssueTracker {
    async fn create_issue_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        issue_number: i64,
        body: &str,
    ) -> Result<(), IssueTrackerError> {
        if let Some(status) = *self.comment_failure.lock().unwrap() {
            return Err(IssueTrackerError::Status {
                status,
                message: "Comment failed".into(),
            });
        }
        self.comments.lock().unwrap().push(PostedComment {
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            issue_number,
            body: body.into(),
        });
        Ok(())
    }

    async fn get_rate_limit_status(
        &self,
        _token: &str,
    ) -> Result<RateLimitStatus, IssueTrackerError> {
        Ok(self.rate_limit.lock().unwrap().clone())
    }

    async fn issue_installation_credential(
        &self,
        installation_id: i64,
    ) -> Result<InstallationToken, IssueTrackerError> {
        self.credentials_issued.fetch_add(1, Ordering::SeqCst);
        Ok(InstallationToken {
            token: format!("token-{}", installation_id),
            expires_at: i64::MAX,
        })
    }
}

/// Repository store whose every call fails, like a database that is down
pub struct UnreachableRepositoryRepo;

#[async_trait::async_trait]
impl IRepositoryRepo for UnreachableRepositoryRepo {
    async fn insert(&self, _repository: &Repository) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }

    async fn save(&self, _repository: &Repository) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }

    async fn find(&self, _repository_id: &str) -> anyhow::Result<Option<Repository>> {
        anyhow::bail!("connection refused")
    }
}

/// Notification channel that records messages
pub struct FakeNotifier {
    messages: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl INotifier for FakeNotifier {
    async fn send_message(&self, text: &str) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("Channel unavailable");
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// Tue Nov 14 2023 22:13:20 UTC
pub const NOW: i64 = 1_700_000_000_000;

/// In-memory context with a manual clock, fake external services and the
/// active repository `octo/repo` (installation 42)
pub struct TestEnv {
    pub ctx: NudgeContext,
    pub sys: Arc<ManualSys>,
    pub tracker: Arc<FakeIssueTracker>,
    pub notifier: Arc<FakeNotifier>,
    pub scheduler: Arc<Scheduler>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let sys = Arc::new(ManualSys::new(NOW));
        let tracker = Arc::new(FakeIssueTracker::new());
        let notifier = Arc::new(FakeNotifier::new());

        let mut ctx = NudgeContext::create_inmemory();
        ctx.sys = sys.clone() as Arc<dyn ISys>;
        ctx.services.issue_tracker = tracker.clone() as Arc<dyn IIssueTracker>;
        ctx.services.notifier = Some(notifier.clone() as Arc<dyn INotifier>);

        ctx.repos
            .repositories
            .insert(&Repository::new("octo/repo".into(), Some(42)))
            .await
            .unwrap();

        let scheduler = Arc::new(Scheduler::new(&ctx));
        Self {
            ctx,
            sys,
            tracker,
            notifier,
            scheduler,
        }
    }
}
