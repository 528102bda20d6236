//! Admission properties of the sliding window gate over the in-process store.

use std::sync::Arc;
use std::time::Duration;

use slidegate::error::GateError;
use slidegate::ratelimit::{MemoryWindowStore, MockClock, Policy, RateLimiterGate};
use slidegate::verification::VerificationThrottle;

fn gate(
    prefix: &str,
    interval_ms: u64,
    rate: u64,
    store: &Arc<MemoryWindowStore>,
    clock: &MockClock,
) -> RateLimiterGate {
    let policy = Policy::new(prefix, Duration::from_millis(interval_ms), rate).unwrap();
    RateLimiterGate::with_clock(policy, store.clone(), Arc::new(clock.clone()))
}

#[tokio::test]
async fn test_documented_scenario() {
    let store = Arc::new(MemoryWindowStore::new());
    let clock = MockClock::new(0);
    let gate = gate("ip-limiter", 1000, 3, &store, &clock);

    let expected = [(0, true), (100, true), (200, true), (300, false), (1050, true)];
    for (t, admitted) in expected {
        clock.set(t);
        assert_eq!(gate.allow("198.51.100.7").await.unwrap(), admitted, "t={}", t);
    }
}

#[tokio::test]
async fn test_rate_plus_one_denied_for_many_rates() {
    for rate in [1, 2, 5, 17] {
        let store = Arc::new(MemoryWindowStore::new());
        let clock = MockClock::new(1_700_000_000_000);
        let gate = gate("ip-limiter", 10_000, rate, &store, &clock);

        for _ in 0..rate {
            clock.advance(3);
            assert!(gate.allow("subject").await.unwrap());
        }
        clock.advance(3);
        assert!(!gate.allow("subject").await.unwrap(), "rate={}", rate);
    }
}

#[tokio::test]
async fn test_exhausted_subject_recovers_after_interval() {
    let store = Arc::new(MemoryWindowStore::new());
    let clock = MockClock::new(0);
    let gate = gate("ip-limiter", 5_000, 4, &store, &clock);

    for _ in 0..4 {
        assert!(gate.allow("subject").await.unwrap());
    }
    assert!(!gate.allow("subject").await.unwrap());

    clock.advance(5_001);
    for _ in 0..4 {
        assert!(gate.allow("subject").await.unwrap());
    }
    assert!(!gate.allow("subject").await.unwrap());
}

#[tokio::test]
async fn test_prefixes_isolate_quotas() {
    let store = Arc::new(MemoryWindowStore::new());
    let clock = MockClock::new(0);
    let ip = gate("ip-limiter", 1000, 2, &store, &clock);
    let other = gate("other-limiter", 1000, 2, &store, &clock);

    assert!(ip.allow("shared").await.unwrap());
    assert!(ip.allow("shared").await.unwrap());
    assert!(!ip.allow("shared").await.unwrap());

    assert!(other.allow("shared").await.unwrap());
    assert!(other.allow("shared").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_checks_admit_exactly_rate() {
    let store = Arc::new(MemoryWindowStore::new());
    let clock = MockClock::new(0);
    let gate = gate("ip-limiter", 60_000, 25, &store, &clock);

    let tasks: Vec<_> = (0..200)
        .map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.allow("contended").await })
        })
        .collect();

    let mut admitted = 0;
    for task in futures::future::join_all(tasks).await {
        if task.unwrap().unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 25);
    assert_eq!(store.record_len("ip-limiter:contended"), Some(25));
}

#[tokio::test]
async fn test_idle_records_expire() {
    let store = Arc::new(MemoryWindowStore::new());
    let clock = MockClock::new(0);
    let gate = gate("ip-limiter", 1000, 3, &store, &clock);

    gate.allow("a").await.unwrap();
    gate.allow("b").await.unwrap();
    assert_eq!(store.len(), 2);

    assert_eq!(store.purge_expired(1000), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_can_send_denial_surfaces_send_rate_limited() {
    let store = Arc::new(MemoryWindowStore::new());
    let send = Policy::new("code-send", Duration::from_secs(60), 1).unwrap();
    let check = Policy::new("code-check", Duration::from_secs(600), 3).unwrap();
    let throttle = VerificationThrottle::new(send, check, store).unwrap();

    assert!(throttle.can_send("login", "+15551230000").await.unwrap());
    assert!(!throttle.can_send("login", "+15551230000").await.unwrap());

    let err = throttle.require_send("login", "+15551230000").await.unwrap_err();
    assert!(matches!(err, GateError::SendRateLimited));
    assert!(err.is_rate_limited());
}
