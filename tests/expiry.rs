// ==============================================
// WALL-CLOCK EXPIRY TESTS (integration)
// ==============================================
//
// These drive the real background sweeper, so they sleep. Granularities
// are tens of milliseconds and every present/absent check keeps at least
// two granularities of slack against scheduler jitter: a "present" check
// runs well before the entry's tick can be reached, an "absent" check runs
// well after a punctual-or-late sweeper must have drained it.

use std::time::Duration;

use tickcache::{Cache, CacheBuilder, CachePolicy, CancellationToken};

const TICK: Duration = Duration::from_millis(20);

fn build(capacity: usize, policy: CachePolicy) -> (Cache<String, String>, CancellationToken) {
    let token = CancellationToken::new();
    let cache = CacheBuilder::new(capacity)
        .policy(policy)
        .granularity(TICK)
        .build(token.clone());
    (cache, token)
}

fn set(cache: &Cache<String, String>, key: &str, value: &str, ttl: Duration) {
    cache.insert_with_ttl(key.to_string(), value.to_string(), ttl);
}

fn get(cache: &Cache<String, String>, key: &str) -> Option<String> {
    cache.get(&key.to_string())
}

fn sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

const REPLACING: [CachePolicy; 3] = [CachePolicy::Lru, CachePolicy::Lfu, CachePolicy::Arc];

// ==============================================
// Expiry
// ==============================================

#[test]
fn entry_expires_after_its_ttl() {
    for policy in REPLACING {
        let (cache, _token) = build(1, policy);

        set(&cache, "test", "string", Duration::from_millis(120));
        sleep_ms(40);
        assert_eq!(
            get(&cache, "test").as_deref(),
            Some("string"),
            "{policy:?}: expired early"
        );

        sleep_ms(220);
        assert_eq!(get(&cache, "test"), None, "{policy:?}: still present");
        assert_eq!(cache.len(), 0, "{policy:?}");
    }
}

#[test]
fn short_ttl_expires_on_schedule() {
    // TTL shorter than the check interval, capacity 1.
    let (cache, _token) = build(1, CachePolicy::Lru);

    set(&cache, "t", "x", Duration::from_millis(60));
    sleep_ms(20);
    assert_eq!(get(&cache, "t").as_deref(), Some("x"));

    sleep_ms(140);
    assert_eq!(get(&cache, "t"), None);
}

#[test]
fn sub_granularity_ttl_lives_one_tick() {
    let (cache, _token) = build(4, CachePolicy::Lru);

    // 1ms TTL with 20ms ticks: due at the first tick, not instantly.
    set(&cache, "t", "x", Duration::from_millis(1));
    assert_eq!(get(&cache, "t").as_deref(), Some("x"));

    sleep_ms(80);
    assert_eq!(get(&cache, "t"), None);
}

// ==============================================
// Re-set moves the expiry
// ==============================================

#[test]
fn reset_extends_expiration() {
    for policy in REPLACING {
        let (cache, _token) = build(10, policy);

        set(&cache, "test", "string", Duration::from_millis(100));
        sleep_ms(40);
        set(&cache, "test", "new string", Duration::from_millis(100));

        // The old binding (due ~100ms in) must not fire at ~100ms.
        sleep_ms(60);
        assert_eq!(
            get(&cache, "test").as_deref(),
            Some("new string"),
            "{policy:?}: old expiry fired"
        );

        // The new binding (due ~140ms in) must fire eventually.
        sleep_ms(200);
        assert_eq!(get(&cache, "test"), None, "{policy:?}: never expired");
    }
}

// ==============================================
// Capacity eviction combined with TTL
// ==============================================

#[test]
fn policy_eviction_and_expiration_cooperate() {
    for policy in REPLACING {
        let (cache, _token) = build(2, policy);

        set(&cache, "k1", "v1", Duration::from_millis(100));
        set(&cache, "k2", "v2", Duration::from_millis(100));
        set(&cache, "k3", "v3", Duration::from_millis(200));

        // Nothing expired yet, so the third insert evicted by policy; in
        // every policy the victim is k1 (oldest, least used, T1 tail).
        assert_eq!(get(&cache, "k1"), None, "{policy:?}: k1 survived");

        // Once k2 expires there is room again.
        sleep_ms(140);
        set(&cache, "k4", "v4", Duration::from_millis(100));
        assert_eq!(
            get(&cache, "k3").as_deref(),
            Some("v3"),
            "{policy:?}: k3 lost"
        );
        assert_eq!(
            get(&cache, "k4").as_deref(),
            Some("v4"),
            "{policy:?}: k4 lost"
        );
    }
}

#[test]
fn lru_eviction_prefers_tail() {
    let (cache, _token) = build(2, CachePolicy::Lru);

    set(&cache, "k1", "v1", Duration::from_secs(10));
    set(&cache, "k2", "v2", Duration::from_secs(10));
    set(&cache, "k3", "v3", Duration::from_secs(20));

    assert_eq!(get(&cache, "k1"), None);
    assert_eq!(get(&cache, "k2").as_deref(), Some("v2"));
    assert_eq!(get(&cache, "k3").as_deref(), Some("v3"));
}

#[test]
fn lfu_eviction_prefers_low_frequency() {
    let (cache, _token) = build(2, CachePolicy::Lfu);

    set(&cache, "a", "1", Duration::from_secs(10));
    set(&cache, "b", "2", Duration::from_secs(10));
    get(&cache, "a");
    get(&cache, "a");
    set(&cache, "c", "3", Duration::from_secs(10));

    // "b" has the lowest frequency and goes first.
    assert_eq!(get(&cache, "b"), None);
    assert_eq!(get(&cache, "a").as_deref(), Some("1"));
    assert_eq!(get(&cache, "c").as_deref(), Some("3"));
}

#[test]
fn arc_ghost_hit_restores_value() {
    let (cache, _token) = build(2, CachePolicy::Arc);

    set(&cache, "a", "1", Duration::from_secs(10));
    set(&cache, "b", "2", Duration::from_secs(10));
    set(&cache, "c", "3", Duration::from_secs(10)); // demotes "a" to a ghost

    assert_eq!(get(&cache, "a"), None);

    // Re-setting the ghost re-admits it as a frequent entry.
    set(&cache, "a", "9", Duration::from_secs(10));
    assert_eq!(get(&cache, "a").as_deref(), Some("9"));
    assert_eq!(cache.len(), 2);
}

// ==============================================
// NoEviction: TTL-only lifecycle
// ==============================================

#[test]
fn no_eviction_grows_until_ttl() {
    let (cache, _token) = build(2, CachePolicy::NoEviction);

    set(&cache, "a", "1", Duration::from_millis(40));
    set(&cache, "b", "2", Duration::from_millis(40));
    set(&cache, "c", "3", Duration::from_millis(40));
    assert_eq!(cache.len(), 3, "capacity must be ignored");

    sleep_ms(140);
    assert_eq!(cache.len(), 0);
}

// ==============================================
// Mixed lifetimes
// ==============================================

#[test]
fn pinned_entries_outlive_expiring_neighbours() {
    let (cache, _token) = build(4, CachePolicy::Lru);

    cache.insert("pinned".to_string(), "stays".to_string());
    set(&cache, "fleeting", "goes", Duration::from_millis(40));

    sleep_ms(140);
    assert_eq!(get(&cache, "fleeting"), None);
    assert_eq!(get(&cache, "pinned").as_deref(), Some("stays"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn pinned_entry_can_become_expiring() {
    let (cache, _token) = build(4, CachePolicy::Lru);

    cache.insert("k".to_string(), "v1".to_string());
    set(&cache, "k", "v2", Duration::from_millis(40));

    sleep_ms(140);
    assert_eq!(get(&cache, "k"), None);
}

// ==============================================
// Cancellation
// ==============================================

#[test]
fn cancelled_sweeper_stops_expiring() {
    let (cache, token) = build(4, CachePolicy::Lru);

    token.cancel();
    // Give the sweeper a tick to observe the token and exit.
    sleep_ms(60);

    set(&cache, "t", "x", Duration::from_millis(20));
    sleep_ms(100);

    // The epoch no longer advances, so the entry cannot expire; the cache
    // itself keeps working.
    assert_eq!(get(&cache, "t").as_deref(), Some("x"));
    cache.insert("u".to_string(), "y".to_string());
    assert_eq!(get(&cache, "u").as_deref(), Some("y"));
}
