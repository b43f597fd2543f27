use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{DateTime, Utc};
use tipline_core::clock::FixedClock;
use tipline_core::{
    JournalistStore, LoginSessionManager, LoginThrottle, SqliteStore, TiplineConfig, TiplineError,
};

const PASSWORD: &str = "correct horse battery staple";
const THREADS: usize = 12;
const MAX_ATTEMPTS: u64 = 5;
const NOW: i64 = 1_700_000_000;

fn setup() -> (Arc<LoginSessionManager>, Arc<SqliteStore>) {
    let config = TiplineConfig::for_testing();
    let store = Arc::new(SqliteStore::open_in_memory().expect("store should open"));
    let manager = LoginSessionManager::new(
        store.clone(),
        Arc::new(FixedClock::at_unix(NOW)),
        &config,
    );
    manager
        .create_journalist("alice", PASSWORD, false)
        .expect("create should succeed");
    (Arc::new(manager), store)
}

#[test]
fn test_concurrent_attempts_are_never_under_throttled() {
    let (_, store) = setup();
    let journalist = store
        .find_by_username("alice")
        .expect("lookup should succeed")
        .expect("journalist should exist");
    let throttle = LoginThrottle::new(60, MAX_ATTEMPTS);
    let now = DateTime::<Utc>::from_timestamp(NOW, 0).expect("timestamp should be valid");
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let id = journalist.id;
            thread::spawn(move || {
                barrier.wait();
                throttle.record_attempt(store.as_ref(), &id, now)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread should not panic"))
        .collect();

    let passed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(passed as u64, MAX_ATTEMPTS);

    let mut counts: Vec<u64> = results
        .iter()
        .filter_map(|r| match r {
            Err(TiplineError::LoginThrottled { attempts, .. }) => Some(*attempts),
            _ => None,
        })
        .collect();
    counts.sort_unstable();
    let expected: Vec<u64> = (MAX_ATTEMPTS + 1..=THREADS as u64).collect();
    assert_eq!(counts, expected);

    assert_eq!(
        store
            .login_attempts(&journalist.id)
            .expect("attempts should load")
            .len(),
        THREADS
    );
}

#[test]
fn test_concurrent_logins_share_one_window() {
    let (manager, _) = setup();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.login("alice", "wrong password here", "000000")
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread should not panic"))
        .collect();

    let throttled = results
        .iter()
        .filter(|r| matches!(r, Err(TiplineError::LoginThrottled { .. })))
        .count();
    assert_eq!(throttled, THREADS - MAX_ATTEMPTS as usize);
    assert!(results.iter().all(|r| r.is_err()));
}
