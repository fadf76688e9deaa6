use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use handoff_core::{AppError, AppResult, Clock, FixedClock, SubjectId};
use handoff_domain::{AppTag, ShortCodeRecord};
use tokio::sync::Mutex;

use super::{IssueShortCodeInput, ShortCodeRepository, ShortCodeService};

/// Moves forward by `step` every time it is read.
struct SteppingClock {
    inner: FixedClock,
    step: Duration,
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let now = self.inner.now();
        self.inner.advance(self.step);
        now
    }
}

#[derive(Default)]
struct FakeShortCodeRepository {
    rows: Mutex<HashMap<String, ShortCodeRecord>>,
    unavailable: AtomicBool,
    steal_next_mark: AtomicBool,
}

impl FakeShortCodeRepository {
    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StorageUnavailable(
                "connection refused".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ShortCodeRepository for FakeShortCodeRepository {
    async fn insert_short_code(&self, record: &ShortCodeRecord) -> AppResult<()> {
        self.check_available()?;
        self.rows
            .lock()
            .await
            .insert(record.code_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_short_code(&self, code_hash: &str) -> AppResult<Option<ShortCodeRecord>> {
        self.check_available()?;
        Ok(self.rows.lock().await.get(code_hash).cloned())
    }

    async fn mark_short_code_used(&self, code_hash: &str, now: DateTime<Utc>) -> AppResult<bool> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.get_mut(code_hash) else {
            return Ok(false);
        };

        if self.steal_next_mark.swap(false, Ordering::SeqCst) {
            row.used = true;
        }

        if row.used || row.is_expired_at(now) {
            return Ok(false);
        }

        row.used = true;
        Ok(true)
    }

    async fn delete_expired_short_codes(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        let initial = rows.len();
        rows.retain(|_, row| row.expires_at >= before);
        Ok((initial - rows.len()) as u64)
    }
}

fn fixture() -> (ShortCodeService, Arc<FakeShortCodeRepository>, Arc<FixedClock>) {
    let repository = Arc::new(FakeShortCodeRepository::default());
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let service = ShortCodeService::new(repository.clone(), clock.clone());
    (service, repository, clock)
}

fn input(redirect_url: Option<&str>) -> IssueShortCodeInput {
    let (Ok(subject_id), Ok(app)) = (SubjectId::new(42), AppTag::new("calculator")) else {
        panic!("valid fixture identifiers");
    };
    IssueShortCodeInput {
        subject_id,
        email: "Jordan@Crew.Example".to_owned(),
        app,
        redirect_url: redirect_url.map(str::to_owned),
    }
}

async fn issue_code(service: &ShortCodeService) -> String {
    match service.issue(input(None)).await {
        Ok(issued) => issued.code,
        Err(error) => panic!("issue failed: {error}"),
    }
}

#[tokio::test]
async fn issued_code_redeems_once_then_reports_used() {
    let (service, _, _) = fixture();
    let code = issue_code(&service).await;

    let first = service.redeem(&code).await;
    let Ok(record) = first else {
        panic!("first redemption should succeed");
    };
    assert_eq!(record.subject_id.as_i64(), 42);
    assert_eq!(record.email, "jordan@crew.example");
    assert!(record.used);

    assert!(matches!(
        service.redeem(&code).await,
        Err(AppError::AlreadyUsed)
    ));
}

#[tokio::test]
async fn raw_code_is_never_stored() {
    let (service, repository, _) = fixture();
    let code = issue_code(&service).await;

    let rows = repository.rows.lock().await;
    assert_eq!(rows.len(), 1);
    assert!(!rows.contains_key(&code));
}

#[tokio::test]
async fn code_expires_after_sixty_seconds() {
    let (service, _, clock) = fixture();
    let code = issue_code(&service).await;

    clock.advance(Duration::seconds(60));
    assert!(matches!(service.redeem(&code).await, Err(AppError::Expired)));
}

#[tokio::test]
async fn code_is_redeemable_just_before_expiry() {
    let (service, _, clock) = fixture();
    let code = issue_code(&service).await;

    clock.advance(Duration::seconds(59));
    assert!(service.redeem(&code).await.is_ok());
}

#[tokio::test]
async fn malformed_and_unknown_codes_are_distinguished() {
    let (service, _, _) = fixture();

    assert!(matches!(
        service.redeem("not-a-code").await,
        Err(AppError::InvalidFormat(_))
    ));
    assert!(matches!(
        service.redeem(&"0".repeat(32)).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn lost_conditional_update_reports_already_used() {
    let (service, repository, _) = fixture();
    let code = issue_code(&service).await;

    repository.steal_next_mark.store(true, Ordering::SeqCst);
    assert!(matches!(
        service.redeem(&code).await,
        Err(AppError::AlreadyUsed)
    ));
}

#[tokio::test]
async fn storage_outage_fails_closed() {
    let (service, repository, _) = fixture();
    let code = issue_code(&service).await;

    repository.unavailable.store(true, Ordering::SeqCst);
    assert!(matches!(
        service.redeem(&code).await,
        Err(AppError::StorageUnavailable(_))
    ));

    repository.unavailable.store(false, Ordering::SeqCst);
    assert!(service.redeem(&code).await.is_ok());
}

#[tokio::test]
async fn redirect_url_must_be_a_safe_target() {
    let (service, _, _) = fixture();

    assert!(matches!(
        service.issue(input(Some("javascript:alert(1)"))).await,
        Err(AppError::Validation(_))
    ));

    let issued = service
        .issue(input(Some("https://pay.example.com/return")))
        .await;
    assert_eq!(
        issued.ok().and_then(|issued| issued.record.redirect_url),
        Some("https://pay.example.com/return".to_owned())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exactly_one_concurrent_redemption_succeeds() {
    let (service, _, _) = fixture();
    let code = issue_code(&service).await;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let service = service.clone();
        let code = code.clone();
        tasks.spawn(async move { service.redeem(&code).await });
    }

    let mut successes = 0;
    let mut already_used = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(_)) => successes += 1,
            Ok(Err(AppError::AlreadyUsed)) => already_used += 1,
            other => panic!("unexpected redemption outcome: {other:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(already_used, 15);
}

#[tokio::test]
async fn code_expiring_between_read_and_write_is_not_marked() {
    let repository = Arc::new(FakeShortCodeRepository::default());
    let clock = Arc::new(SteppingClock {
        inner: FixedClock::new(Utc::now()),
        step: Duration::seconds(30),
    });
    let service = ShortCodeService::new(repository.clone(), clock);
    let code = issue_code(&service).await;

    // read at +30s passes; the conditional write at +60s must not.
    assert!(matches!(service.redeem(&code).await, Err(AppError::Expired)));
    assert!(repository.rows.lock().await.values().all(|row| !row.used));
}

#[tokio::test]
async fn spent_and_expired_codes_keep_their_issuing_app() {
    let (service, _, clock) = fixture();
    let spent = issue_code(&service).await;
    assert!(service.redeem(&spent).await.is_ok());

    let rejection = service.redeem_for_redirect(&spent).await.err();
    assert!(matches!(
        rejection.as_ref().map(|rejection| &rejection.error),
        Some(AppError::AlreadyUsed)
    ));
    assert_eq!(
        rejection.and_then(|rejection| rejection.app).map(|app| app.to_string()),
        Some("calculator".to_owned())
    );

    let stale = issue_code(&service).await;
    clock.advance(Duration::seconds(61));
    let rejection = service.redeem_for_redirect(&stale).await.err();
    assert_eq!(
        rejection.and_then(|rejection| rejection.app).map(|app| app.to_string()),
        Some("calculator".to_owned())
    );

    let unknown = service.redeem_for_redirect(&"f".repeat(32)).await.err();
    assert!(unknown.is_some_and(|rejection| rejection.app.is_none()));
}
