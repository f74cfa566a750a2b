//! Persistent exponential backoff for the dispatch pipeline.
//!
//! The agent runs once per captured event, so the failure counter and the
//! time of the last failure live in the settings store between runs. Reads
//! happen once at startup and writes after the send; nothing serializes those
//! two steps across processes, so concurrent invocations may overwrite each
//! other's state.

use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use waka_core::{DispatchError, DispatchResult, Handle, Heartbeat, Stage};
use waka_store::{Key, SettingsStore, StoreError};

/// Total seconds after the anchor when backoff always lets a retry through.
pub const RESET_AFTER_SECS: i64 = 3600;
/// Seconds multiplied by `2^retries`.
pub const FACTOR_SECS: i64 = 15;

pub const SECTION: &str = "internal";
pub const RETRIES_KEY: &str = "backoff_retries";
pub const AT_KEY: &str = "backoff_at";

/// Error message of the veto.
pub const BACKOFF_MESSAGE: &str = "won't send heartbeat due to backoff";

pub fn retries_key() -> Key {
    Key::new(SECTION, RETRIES_KEY)
}

pub fn at_key() -> Key {
    Key::new(SECTION, AT_KEY)
}

// ── State ──

/// Consecutive failure count and the time of the most recent failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackoffState {
    pub retries: u32,
    pub at: Option<OffsetDateTime>,
}

impl BackoffState {
    pub fn new(retries: u32, at: Option<OffsetDateTime>) -> Self {
        Self { retries, at }
    }

    /// Read persisted state. Missing or malformed values count as zero/unset.
    pub fn load(store: &dyn SettingsStore) -> Self {
        let retries = match store.get(&retries_key()) {
            Ok(Some(raw)) if !raw.trim().is_empty() => match raw.trim().parse::<u32>() {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("failed to parse {RETRIES_KEY} {raw:?}: {e}");
                    0
                }
            },
            Ok(_) => 0,
            Err(e) => {
                tracing::warn!("failed to read {RETRIES_KEY}: {e}");
                0
            }
        };

        let at = match store.get(&at_key()) {
            Ok(Some(raw)) if !raw.trim().is_empty() => {
                match OffsetDateTime::parse(raw.trim(), &Rfc3339) {
                    Ok(at) => Some(at),
                    Err(e) => {
                        tracing::warn!("failed to parse {AT_KEY} {raw:?}: {e}");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("failed to read {AT_KEY}: {e}");
                None
            }
        };

        Self { retries, at }
    }

    pub fn is_idle(&self) -> bool {
        self.retries == 0 && self.at.is_none()
    }
}

/// Whether a send attempt at `now` falls inside the backoff window.
///
/// The window is `FACTOR_SECS * 2^retries` seconds after `at`, capped at
/// `RESET_AFTER_SECS`.
pub fn should_backoff(retries: u32, at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    let at = match at {
        Some(at) if retries >= 1 => at,
        _ => return false,
    };

    let delay = 2i64
        .checked_pow(retries)
        .and_then(|p| p.checked_mul(FACTOR_SECS))
        .unwrap_or(i64::MAX);
    // Past the representable range means the exponential term never expires.
    let retry_at = at.checked_add(Duration::seconds(delay));
    let reset_at = at.checked_add(Duration::seconds(RESET_AFTER_SECS));

    tracing::debug!(
        "exponential backoff tried {retries} times since {at}, will retry at {}",
        retry_at.map_or_else(|| "never".to_string(), |t| t.to_string())
    );

    let before_retry = retry_at.map_or(true, |t| now < t);
    let before_reset = reset_at.map_or(true, |t| now < t);
    before_retry && before_reset
}

fn format_at(at: OffsetDateTime) -> String {
    let at = at.replace_nanosecond(0).unwrap_or(at);
    at.format(&Rfc3339).unwrap_or_default()
}

/// Persist `retries` and `at` in one write; `None` stores an empty `backoff_at`.
pub fn update_backoff_settings(
    store: &dyn SettingsStore,
    retries: u32,
    at: Option<OffsetDateTime>,
) -> Result<(), StoreError> {
    let at = at.map(format_at).unwrap_or_default();
    store.set_keys(&[(retries_key(), retries.to_string()), (at_key(), at)])
}

// ── Stage ──

type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Pipeline stage that vetoes sends during backoff and records outcomes.
pub struct WithBackoff {
    state: BackoffState,
    store: Arc<dyn SettingsStore>,
    clock: Clock,
}

impl WithBackoff {
    pub fn new(state: BackoffState, store: Arc<dyn SettingsStore>) -> Self {
        Self {
            state,
            store,
            clock: Arc::new(OffsetDateTime::now_utc),
        }
    }

    /// Replace the time source.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> OffsetDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }
}

struct BackoffHandle {
    state: BackoffState,
    store: Arc<dyn SettingsStore>,
    clock: Clock,
    next: Box<dyn Handle>,
}

impl Stage for WithBackoff {
    fn name(&self) -> &'static str {
        "backoff"
    }

    fn wrap(self: Box<Self>, next: Box<dyn Handle>) -> Box<dyn Handle> {
        Box::new(BackoffHandle {
            state: self.state,
            store: self.store,
            clock: self.clock,
            next,
        })
    }
}

impl Handle for BackoffHandle {
    fn handle(&self, batch: Vec<Heartbeat>) -> DispatchResult {
        tracing::debug!("execute heartbeat backoff algorithm");

        if should_backoff(self.state.retries, self.state.at, (self.clock)()) {
            return Err(DispatchError::backoff(BACKOFF_MESSAGE));
        }

        match self.next.handle(batch) {
            Err(err) => {
                tracing::debug!("incrementing backoff due to error");
                let retries = self.state.retries.saturating_add(1);
                let now = (self.clock)();
                if let Err(e) = update_backoff_settings(self.store.as_ref(), retries, Some(now)) {
                    tracing::warn!("failed to update backoff settings: {e}");
                }
                Err(err)
            }
            Ok(results) => {
                if self.state.at.is_some() {
                    if let Err(e) = update_backoff_settings(self.store.as_ref(), 0, None) {
                        tracing::warn!("failed to reset backoff settings: {e}");
                    }
                }
                Ok(results)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use time::macros::datetime;

    use waka_core::{Category, EntityType, HeartbeatResult, Pipeline};
    use waka_store::{IniFileStore, MemoryStore};

    use super::*;

    const NOW: OffsetDateTime = datetime!(2026-10-17 12:00:00 UTC);

    fn beat() -> Heartbeat {
        Heartbeat::new(
            "/tmp/main.go",
            EntityType::File,
            Category::Coding,
            1585598060.0,
            "wakatime/13.0.7",
        )
    }

    fn ok_terminal(calls: Rc<Cell<usize>>) -> impl Handle {
        move |hh: Vec<Heartbeat>| -> DispatchResult {
            calls.set(calls.get() + 1);
            Ok(hh.iter().map(|_| HeartbeatResult::accepted(201)).collect())
        }
    }

    fn failing_terminal(calls: Rc<Cell<usize>>) -> impl Handle {
        move |_hh: Vec<Heartbeat>| -> DispatchResult {
            calls.set(calls.get() + 1);
            Err(DispatchError::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    fn stored(store: &MemoryStore) -> (Option<String>, Option<String>) {
        let snap = store.snapshot();
        (snap.get(&retries_key()).cloned(), snap.get(&at_key()).cloned())
    }

    // ── should_backoff ──

    #[test]
    fn no_backoff_without_failures() {
        assert!(!should_backoff(0, Some(NOW), NOW));
        assert!(!should_backoff(0, None, NOW));
        for n in [1, 5, 50, u32::MAX] {
            assert!(!should_backoff(n, None, NOW));
        }
    }

    #[test]
    fn backoff_inside_exponential_window() {
        // 15 * 2^5 = 480s > 100s
        assert!(should_backoff(5, Some(NOW - Duration::seconds(100)), NOW));
        // 15 * 2^1 = 30s
        assert!(should_backoff(1, Some(NOW - Duration::seconds(29)), NOW));
        assert!(!should_backoff(1, Some(NOW - Duration::seconds(30)), NOW));
        assert!(!should_backoff(1, Some(NOW - Duration::seconds(31)), NOW));
    }

    #[test]
    fn reset_ceiling_overrides_exponential_term() {
        // 15 * 2^10 = 15360s, still capped at one hour.
        assert!(should_backoff(10, Some(NOW - Duration::seconds(3599)), NOW));
        assert!(!should_backoff(10, Some(NOW - Duration::seconds(3600)), NOW));
        assert!(!should_backoff(5, Some(NOW - Duration::seconds(4000)), NOW));
    }

    #[test]
    fn huge_retry_counts_do_not_overflow() {
        assert!(should_backoff(u32::MAX, Some(NOW - Duration::seconds(10)), NOW));
        assert!(!should_backoff(u32::MAX, Some(NOW - Duration::seconds(3600)), NOW));
        assert!(should_backoff(62, Some(NOW), NOW));
    }

    // ── state loading ──

    #[test]
    fn load_missing_is_idle() {
        let state = BackoffState::load(&MemoryStore::new());
        assert!(state.is_idle());
    }

    #[test]
    fn load_parses_persisted_values() {
        let store = MemoryStore::with_values([
            (retries_key(), "3"),
            (at_key(), "2026-10-17T11:59:00Z"),
        ]);
        let state = BackoffState::load(&store);
        assert_eq!(state.retries, 3);
        assert_eq!(state.at, Some(datetime!(2026-10-17 11:59:00 UTC)));
    }

    #[test]
    fn load_treats_garbage_as_unset() {
        let store = MemoryStore::with_values([(retries_key(), "many"), (at_key(), "yesterday")]);
        assert!(BackoffState::load(&store).is_idle());

        let store = MemoryStore::with_values([(retries_key(), "2"), (at_key(), "")]);
        assert_eq!(BackoffState::load(&store), BackoffState::new(2, None));
    }

    // ── stage ──

    #[test]
    fn veto_skips_next_and_leaves_state() {
        let store = Arc::new(MemoryStore::new());
        let calls = Rc::new(Cell::new(0));
        let state = BackoffState::new(5, Some(NOW - Duration::seconds(100)));
        let handle = Pipeline::new()
            .stage(WithBackoff::new(state, store.clone()).with_clock(|| NOW))
            .build(ok_terminal(calls.clone()));

        let err = handle.handle(vec![beat()]).unwrap_err();
        assert!(err.is_backoff());
        assert_eq!(err.to_string(), BACKOFF_MESSAGE);
        assert_eq!(calls.get(), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn failure_from_idle_records_first_failure() {
        let store = Arc::new(MemoryStore::new());
        let calls = Rc::new(Cell::new(0));
        let handle = Pipeline::new()
            .stage(WithBackoff::new(BackoffState::default(), store.clone()).with_clock(|| NOW))
            .build(failing_terminal(calls.clone()));

        let err = handle.handle(vec![beat()]).unwrap_err();
        assert!(!err.is_backoff());
        assert!(err.transport_cause::<std::io::Error>().is_some());
        assert_eq!(calls.get(), 1);
        assert_eq!(
            stored(&store),
            (Some("1".into()), Some("2026-10-17T12:00:00Z".into()))
        );
        assert_eq!(BackoffState::load(store.as_ref()), BackoffState::new(1, Some(NOW)));
    }

    #[test]
    fn failure_after_window_bumps_count_and_refreshes_anchor() {
        let store = Arc::new(MemoryStore::new());
        let calls = Rc::new(Cell::new(0));
        let state = BackoffState::new(2, Some(NOW - Duration::seconds(600)));
        let handle = Pipeline::new()
            .stage(WithBackoff::new(state, store.clone()).with_clock(|| NOW))
            .build(failing_terminal(calls.clone()));

        assert!(handle.handle(vec![beat()]).is_err());
        assert_eq!(calls.get(), 1);
        assert_eq!(BackoffState::load(store.as_ref()), BackoffState::new(3, Some(NOW)));
    }

    #[test]
    fn success_after_failures_resets() {
        let store = Arc::new(MemoryStore::with_values([
            (retries_key(), "4"),
            (at_key(), "2026-10-17T10:00:00Z"),
        ]));
        let calls = Rc::new(Cell::new(0));
        let state = BackoffState::load(store.as_ref());
        let handle = Pipeline::new()
            .stage(WithBackoff::new(state, store.clone()).with_clock(|| NOW))
            .build(ok_terminal(calls.clone()));

        let results = handle.handle(vec![beat(), beat()]).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(calls.get(), 1);
        assert_eq!(store.write_count(), 1);
        assert_eq!(stored(&store), (Some("0".into()), Some(String::new())));
        assert!(BackoffState::load(store.as_ref()).is_idle());
    }

    #[test]
    fn success_from_idle_does_not_write() {
        let store = Arc::new(MemoryStore::new());
        let calls = Rc::new(Cell::new(0));
        let handle = Pipeline::new()
            .stage(WithBackoff::new(BackoffState::default(), store.clone()).with_clock(|| NOW))
            .build(ok_terminal(calls.clone()));

        handle.handle(vec![beat()]).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(store.write_count(), 0);
    }

    struct BrokenStore;

    impl SettingsStore for BrokenStore {
        fn get(&self, _key: &Key) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }

        fn set_keys(&self, _entries: &[(Key, String)]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }
    }

    #[test]
    fn persistence_failure_surfaces_original_error() {
        let calls = Rc::new(Cell::new(0));
        let handle = Pipeline::new()
            .stage(WithBackoff::new(BackoffState::default(), Arc::new(BrokenStore)).with_clock(|| NOW))
            .build(failing_terminal(calls.clone()));

        let err = handle.handle(vec![beat()]).unwrap_err();
        assert!(err.transport_cause::<std::io::Error>().is_some());
    }

    #[test]
    fn persistence_failure_on_reset_keeps_results() {
        let calls = Rc::new(Cell::new(0));
        let state = BackoffState::new(1, Some(NOW - Duration::seconds(3600)));
        let handle = Pipeline::new()
            .stage(WithBackoff::new(state, Arc::new(BrokenStore)).with_clock(|| NOW))
            .build(ok_terminal(calls.clone()));

        assert_eq!(handle.handle(vec![beat()]).unwrap().len(), 1);
        assert!(BackoffState::load(&BrokenStore).is_idle());
    }

    #[test]
    fn state_survives_restart_through_ini_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".wakatime").join("wakatime-internal.cfg");
        let calls = Rc::new(Cell::new(0));

        // First process: send fails.
        let store: Arc<dyn SettingsStore> = Arc::new(IniFileStore::new(&path));
        let handle = Pipeline::new()
            .stage(WithBackoff::new(BackoffState::load(store.as_ref()), store.clone()).with_clock(|| NOW))
            .build(failing_terminal(calls.clone()));
        assert!(handle.handle(vec![beat()]).is_err());

        // Second process 10s later: vetoed without touching the network.
        let store: Arc<dyn SettingsStore> = Arc::new(IniFileStore::new(&path));
        let state = BackoffState::load(store.as_ref());
        assert_eq!(state, BackoffState::new(1, Some(NOW)));
        let later = NOW + Duration::seconds(10);
        let handle = Pipeline::new()
            .stage(WithBackoff::new(state, store.clone()).with_clock(move || later))
            .build(failing_terminal(calls.clone()));
        assert!(handle.handle(vec![beat()]).unwrap_err().is_backoff());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn backoff_outermost_then_sanitize_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        let calls = Rc::new(Cell::new(0));
        let config = waka_core::SanitizeConfig {
            file_patterns: vec![regex::Regex::new(".*").unwrap()],
            ..Default::default()
        };
        let state = BackoffState::new(5, Some(NOW - Duration::seconds(4000)));
        let seen = calls.clone();
        let handle = Pipeline::new()
            .stage(WithBackoff::new(state, store.clone()).with_clock(|| NOW))
            .stage(waka_core::WithSanitization::new(config))
            .build(move |hh: Vec<Heartbeat>| -> DispatchResult {
                seen.set(seen.get() + 1);
                assert_eq!(hh[0].entity, "HIDDEN.go");
                assert_eq!(hh[0].project, None);
                assert_eq!(hh[0].branch, None);
                assert_eq!(hh[0].category, Category::Coding);
                assert_eq!(hh[0].entity_type, EntityType::File);
                assert_eq!(hh[0].time, 1585598060.0);
                assert_eq!(hh[0].user_agent, "wakatime/13.0.7");
                Ok(vec![HeartbeatResult::accepted(201)])
            });

        let mut h = beat();
        h.project = Some("wakatime".into());
        h.branch = Some("main".into());
        h.line_number = Some(42);

        // Past the reset ceiling: allowed, sanitized, then state reset.
        let results = handle.handle(vec![h]).unwrap();
        assert_eq!(results, vec![HeartbeatResult::accepted(201)]);
        assert_eq!(calls.get(), 1);
        assert_eq!(stored(&store), (Some("0".into()), Some(String::new())));
    }
}
