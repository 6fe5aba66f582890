//! Reconciler tests on virtual time.

use std::sync::Arc;
use std::time::Duration;

use loyalty_shared::{FaultClass, Points, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::Instant;

use super::{Reconciler, ReconcilerSettings};
use crate::accrual::AccrualStatus;
use crate::order::{OrderRegistry, OrderStatus, SubmitOutcome};
use crate::retry::RetryPolicy;
use crate::store::{LoyaltyStore, StoreError};
use crate::testing::{FlakyStore, ScriptedAuthority, Step, number};

const POLL: Duration = Duration::from_secs(1);
const FAILURE: Duration = Duration::from_secs(5);

struct Harness {
    store: Arc<FlakyStore>,
    authority: Arc<ScriptedAuthority>,
    registry: OrderRegistry,
    reconciler: Reconciler,
    user: UserId,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(FlakyStore::new());
        let authority = Arc::new(ScriptedAuthority::new());
        let registry = OrderRegistry::new(
            store.clone(),
            RetryPolicy::new(
                vec![Duration::from_secs(1), Duration::from_secs(3)],
                FaultClass::ConnectionException,
            ),
        );
        let reconciler = Reconciler::new(
            registry.clone(),
            authority.clone(),
            ReconcilerSettings {
                poll_interval: POLL,
                failure_delay: FAILURE,
                max_concurrent: 4,
            },
        );
        let user = store.create_user("alice").await.unwrap();
        Self {
            store,
            authority,
            registry,
            reconciler,
            user,
        }
    }

    async fn submit(&self, raw: &str) {
        let outcome = self.registry.submit(self.user, &number(raw)).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted(_)));
    }

    async fn status(&self, raw: &str) -> OrderStatus {
        self.store.inner.order(&number(raw)).await.unwrap().status
    }

    async fn current(&self) -> Points {
        self.store.read_balance(self.user).await.unwrap().current
    }
}

#[tokio::test(start_paused = true)]
async fn test_processed_on_first_poll_credits_once() {
    let h = Harness::new().await;
    h.submit("4561261212345467").await;
    h.authority
        .script(&number("4561261212345467"), [Step::processed(50)]);

    assert!(h.reconciler.spawn(number("4561261212345467")));
    h.reconciler.wait_idle().await;

    assert_eq!(h.status("4561261212345467").await, OrderStatus::Processed);
    assert_eq!(h.current().await, Points::whole(50));
    assert_eq!(h.authority.queries(), 1);
    assert_eq!(h.reconciler.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_polls_until_terminal() {
    let h = Harness::new().await;
    let n = number("79927398713");
    h.submit("79927398713").await;
    h.authority.script(
        &n,
        [
            Step::Report(AccrualStatus::New, None),
            Step::processing(),
            Step::Report(AccrualStatus::Processed, Some(Points::new(dec!(729.98)))),
        ],
    );
    let start = Instant::now();

    h.reconciler.spawn(n.clone());
    h.reconciler.wait_idle().await;

    assert_eq!(h.authority.queries(), 3);
    assert_eq!(start.elapsed(), POLL * 2);
    assert_eq!(h.status("79927398713").await, OrderStatus::Processed);
    assert_eq!(h.current().await, Points::new(dec!(729.98)));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_is_terminal_without_credit() {
    let h = Harness::new().await;
    let n = number("12345678903");
    h.submit("12345678903").await;
    h.authority.script(&n, [Step::processing(), Step::invalid()]);

    h.reconciler.spawn(n);
    h.reconciler.wait_idle().await;

    assert_eq!(h.status("12345678903").await, OrderStatus::Invalid);
    assert!(h.current().await.is_zero());
}

#[tokio::test(start_paused = true)]
async fn test_query_failures_wait_failure_delay() {
    let h = Harness::new().await;
    let n = number("2377225624");
    h.submit("2377225624").await;
    h.authority.script(
        &n,
        [
            Step::Unavailable,
            Step::NotRegistered,
            Step::processed(10),
        ],
    );
    let start = Instant::now();

    h.reconciler.spawn(n);
    h.reconciler.wait_idle().await;

    assert_eq!(start.elapsed(), FAILURE * 2);
    assert_eq!(h.current().await, Points::whole(10));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_honours_retry_after() {
    let h = Harness::new().await;
    let n = number("2377225624");
    h.submit("2377225624").await;
    h.authority.script(
        &n,
        [
            Step::RateLimited(Some(Duration::from_secs(60))),
            Step::RateLimited(None),
            Step::processed(1),
        ],
    );
    let start = Instant::now();

    h.reconciler.spawn(n);
    h.reconciler.wait_idle().await;

    assert_eq!(start.elapsed(), Duration::from_secs(60) + FAILURE);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_spawn_is_rejected_while_in_flight() {
    let h = Harness::new().await;
    let n = number("79927398713");
    h.submit("79927398713").await;
    h.authority.script(&n, [Step::processing(), Step::processed(5)]);

    assert!(h.reconciler.spawn(n.clone()));
    assert!(!h.reconciler.spawn(n.clone()));
    assert!(h.reconciler.is_in_flight(&n));

    h.reconciler.wait_idle().await;

    assert!(!h.reconciler.is_in_flight(&n));
    assert_eq!(h.current().await, Points::whole(5));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_terminal_report_credits_once() {
    let h = Harness::new().await;
    let n = number("4561261212345467");
    h.submit("4561261212345467").await;
    h.authority.script(&n, [Step::processed(50)]);

    h.reconciler.spawn(n.clone());
    h.reconciler.wait_idle().await;
    h.reconciler.spawn(n);
    h.reconciler.wait_idle().await;

    assert_eq!(h.authority.queries(), 2);
    assert_eq!(h.current().await, Points::whole(50));
}

#[tokio::test(start_paused = true)]
async fn test_transient_storage_failure_is_retried_after_failure_delay() {
    let h = Harness::new().await;
    let n = number("79927398713");
    h.submit("79927398713").await;
    h.authority.script(&n, [Step::processed(7)]);
    h.store
        .fail_next(3, &StoreError::Connection("connection reset".into()));
    let calls_before = h.store.calls();
    let start = Instant::now();

    h.reconciler.spawn(n);
    h.reconciler.wait_idle().await;

    // three attempts with 1s + 3s backoff, then the failure delay, then success
    assert_eq!(start.elapsed(), Duration::from_secs(4) + FAILURE);
    assert_eq!(h.authority.queries(), 2);
    assert_eq!(h.store.calls() - calls_before, 4);
    assert_eq!(h.current().await, Points::whole(7));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_storage_failure_abandons_order() {
    let h = Harness::new().await;
    let n = number("79927398713");
    h.authority.script(&n, [Step::processed(7)]);

    // never submitted: the store reports the order as unknown
    h.reconciler.spawn(n.clone());
    h.reconciler.wait_idle().await;

    assert_eq!(h.authority.queries(), 1);
    assert!(!h.reconciler.is_in_flight(&n));
}

#[tokio::test(start_paused = true)]
async fn test_overflowing_credit_abandons_order_unchanged() {
    let h = Harness::new().await;
    let n = number("79927398713");
    h.store
        .credit_balance(h.user, Points::new(Decimal::MAX))
        .await
        .unwrap();
    h.submit("79927398713").await;
    h.authority.script(&n, [Step::processed(1)]);

    h.reconciler.spawn(n.clone());
    h.reconciler.wait_idle().await;

    assert_eq!(h.authority.queries(), 1);
    assert!(!h.reconciler.is_in_flight(&n));
    assert_eq!(h.status("79927398713").await, OrderStatus::New);
    assert_eq!(h.current().await, Points::new(Decimal::MAX));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_completes_while_waiting_for_idle() {
    let h = Harness::new().await;
    let n = number("79927398713");
    h.submit("79927398713").await;
    h.authority.script(&n, [Step::processing()]);
    h.reconciler.spawn(n.clone());

    tokio::join!(h.reconciler.wait_idle(), h.reconciler.shutdown());

    assert!(!h.reconciler.is_in_flight(&n));
    assert!(!h.reconciler.spawn(n));
}

#[tokio::test(start_paused = true)]
async fn test_recover_resumes_unresolved_orders() {
    let h = Harness::new().await;
    for raw in ["79927398713", "12345678903", "4561261212345467"] {
        h.submit(raw).await;
    }
    h.store
        .apply_accrual(&number("12345678903"), OrderStatus::Processing, None)
        .await
        .unwrap();
    h.store
        .apply_accrual(&number("4561261212345467"), OrderStatus::Invalid, None)
        .await
        .unwrap();
    h.authority.script(&number("79927398713"), [Step::processed(3)]);
    h.authority.script(&number("12345678903"), [Step::processed(4)]);

    let started = h.reconciler.recover().await.unwrap();
    h.reconciler.wait_idle().await;

    assert_eq!(started, 2);
    assert_eq!(h.current().await, Points::whole(7));
    assert_eq!(h.status("4561261212345467").await, OrderStatus::Invalid);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_leaves_order_resumable() {
    let h = Harness::new().await;
    let n = number("79927398713");
    h.submit("79927398713").await;
    h.authority.script(&n, [Step::processing()]);

    h.reconciler.spawn(n.clone());
    tokio::time::sleep(POLL * 3).await;
    h.reconciler.shutdown().await;

    assert_eq!(h.reconciler.in_flight(), 0);
    assert!(!h.reconciler.spawn(n.clone()));
    assert_eq!(h.status("79927398713").await, OrderStatus::Processing);

    let restarted = Reconciler::new(
        h.registry.clone(),
        h.authority.clone(),
        ReconcilerSettings::default(),
    );
    h.authority.script(&n, [Step::processed(9)]);
    assert_eq!(restarted.recover().await.unwrap(), 1);
    restarted.wait_idle().await;

    assert_eq!(h.status("79927398713").await, OrderStatus::Processed);
    assert_eq!(h.current().await, Points::whole(9));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_orders_credit_without_lost_updates() {
    let h = Harness::new().await;
    let numbers = ["79927398713", "12345678903", "4561261212345467", "2377225624", "18", "0"];
    for raw in numbers {
        h.submit(raw).await;
        h.authority
            .script(&number(raw), [Step::processing(), Step::processed(10)]);
    }

    for raw in numbers {
        h.reconciler.spawn(number(raw));
    }
    h.reconciler.wait_idle().await;

    assert_eq!(h.current().await, Points::whole(60));
}
