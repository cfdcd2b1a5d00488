//! Thread-safe, TTL-bounded cache for MX lookups.
//!
//! Concurrent lookups for the same domain are deduplicated: a single
//! resolver query runs and every waiter receives its result. Errors are
//! cached for the same TTL as successes, so a dead domain is not re-queried
//! on every address. There is no background eviction; expired entries are
//! refreshed lazily when read again, which bounds memory by the caller's
//! domain working set.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::system_conf::read_system_conf;
use trust_dns_resolver::Resolver;

/// A single MX record: the exchange hostname and its preference (lower is
/// preferred). Exchanges are returned as the resolver reports them, which
/// usually includes a trailing dot.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize)
)]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// Failure of a cached MX lookup. Cloneable so negative results can be
/// cached and handed to every waiter; the resolver failure is carried as
/// display text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    #[error("resolver initialization failed: {0}")]
    ResolverInit(String),
    #[error("MX lookup failed: {0}")]
    Lookup(String),
}

/// Performs the actual MX query. Implemented by the system resolver and by
/// test stubs; an empty record list means the domain exists without MX.
pub trait ResolveMx: Send + Sync {
    fn resolve_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError>;
}

/// System resolver configured from `/etc/resolv.conf`, initialised on first
/// use so cache construction stays infallible.
struct SystemResolver {
    timeout: Duration,
    inner: OnceLock<Result<Resolver, DnsError>>,
}

impl SystemResolver {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            inner: OnceLock::new(),
        }
    }

    fn resolver(&self) -> Result<&Resolver, DnsError> {
        let timeout = self.timeout;
        let inner = self.inner.get_or_init(move || {
            let (config, mut opts) = read_system_conf()
                .map_err(|err| DnsError::ResolverInit(err.to_string()))?;
            opts.timeout = timeout;
            Resolver::new(config, opts).map_err(|err| DnsError::ResolverInit(err.to_string()))
        });
        match inner {
            Ok(resolver) => Ok(resolver),
            Err(err) => Err(err.clone()),
        }
    }
}

impl ResolveMx for SystemResolver {
    fn resolve_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        let resolver = self.resolver()?;
        match resolver.mx_lookup(domain) {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| MxRecord::new(mx.preference(), mx.exchange().to_utf8()))
                .collect()),
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                _ => Err(DnsError::Lookup(err.to_string())),
            },
        }
    }
}

enum EntryState {
    /// The owning lookup is still on the network.
    Pending,
    Ready {
        outcome: Result<Vec<MxRecord>, DnsError>,
        expires: Instant,
    },
}

/// One cache slot. `state` is written exactly once by the thread performing
/// the lookup, which then broadcasts on `ready`; after that the entry is
/// read-only.
struct Entry {
    state: Mutex<EntryState>,
    ready: Condvar,
}

impl Entry {
    fn pending() -> Self {
        Self {
            state: Mutex::new(EntryState::Pending),
            ready: Condvar::new(),
        }
    }

    fn complete(&self, outcome: Result<Vec<MxRecord>, DnsError>, expires: Instant) {
        let mut state = self.state.lock().expect("entry lock poisoned");
        *state = EntryState::Ready { outcome, expires };
        self.ready.notify_all();
    }

    fn wait_ready(&self) -> Result<Vec<MxRecord>, DnsError> {
        let mut state = self.state.lock().expect("entry lock poisoned");
        while matches!(*state, EntryState::Pending) {
            state = self.ready.wait(state).expect("entry lock poisoned");
        }
        match &*state {
            EntryState::Ready { outcome, .. } => outcome.clone(),
            EntryState::Pending => unreachable!("woken while pending"),
        }
    }
}

/// The MX lookup cache shared by the DNS and SMTP levels.
pub struct Cache {
    entries: Mutex<HashMap<String, Arc<Entry>>>,
    cache_ttl: Duration,
    resolver: Box<dyn ResolveMx>,
}

impl Cache {
    /// Cache backed by the system resolver. `lookup_timeout` bounds each
    /// resolver query; `cache_ttl` bounds entry lifetime, for successes and
    /// errors alike.
    pub fn new(lookup_timeout: Duration, cache_ttl: Duration) -> Self {
        Self::with_resolver(cache_ttl, SystemResolver::new(lookup_timeout))
    }

    /// Cache with an injected resolver, used by tests.
    pub fn with_resolver(cache_ttl: Duration, resolver: impl ResolveMx + 'static) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cache_ttl,
            resolver: Box::new(resolver),
        }
    }

    /// Cached MX lookup with singleflight deduplication.
    ///
    /// At most one resolver query per domain is in flight at any moment;
    /// concurrent callers block on the entry's completion broadcast and
    /// never observe a half-populated entry. Returned record lists are deep
    /// copies, so callers may sort or mutate them freely.
    pub fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        let entry = {
            let mut entries = self.entries.lock().expect("cache lock poisoned");
            if let Some(existing) = entries.get(domain).cloned() {
                let state = existing.state.lock().expect("entry lock poisoned");
                match &*state {
                    EntryState::Ready { outcome, expires } if *expires > Instant::now() => {
                        trace!(domain, "MX cache hit");
                        return outcome.clone();
                    }
                    EntryState::Pending => {
                        drop(state);
                        drop(entries);
                        trace!(domain, "joining in-flight MX lookup");
                        return existing.wait_ready();
                    }
                    // Expired: replaced with a fresh pending entry below.
                    EntryState::Ready { .. } => {}
                }
            }
            let entry = Arc::new(Entry::pending());
            entries.insert(domain.to_string(), Arc::clone(&entry));
            entry
        };

        // The map lock is released; only this thread owns the pending entry.
        debug!(domain, "resolving MX records");
        let outcome = self.resolver.resolve_mx(domain);
        entry.complete(outcome.clone(), Instant::now() + self.cache_ttl);
        outcome
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    /// Counting stub resolver shared with the SMTP checker tests.
    pub(crate) struct StubResolver {
        pub records: Vec<MxRecord>,
        pub error: Option<DnsError>,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    impl StubResolver {
        pub(crate) fn with_records(records: Vec<MxRecord>) -> Self {
            Self {
                records,
                error: None,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn with_error(error: DnsError) -> Self {
            Self {
                records: Vec::new(),
                error: Some(error),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ResolveMx for StubResolver {
        fn resolve_mx(&self, _domain: &str) -> Result<Vec<MxRecord>, DnsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            match &self.error {
                Some(err) => Err(err.clone()),
                None => Ok(self.records.clone()),
            }
        }
    }

    fn cache_with(resolver: StubResolver, ttl: Duration) -> (Arc<Cache>, Arc<StubResolver>) {
        let resolver = Arc::new(resolver);
        let cache = Arc::new(Cache::with_resolver(ttl, ArcResolver(Arc::clone(&resolver))));
        (cache, resolver)
    }

    struct ArcResolver(Arc<StubResolver>);

    impl ResolveMx for ArcResolver {
        fn resolve_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
            self.0.resolve_mx(domain)
        }
    }

    #[test]
    fn caches_successful_lookups() {
        let stub = StubResolver::with_records(vec![MxRecord::new(10, "mx.example.com.")]);
        let (cache, resolver) = cache_with(stub, Duration::from_secs(60));

        let records = cache.lookup_mx("example.com").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(resolver.call_count(), 1);

        let records = cache.lookup_mx("example.com").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(resolver.call_count(), 1);
    }

    #[test]
    fn different_domains_get_separate_entries() {
        let stub = StubResolver::with_records(vec![MxRecord::new(10, "mx.test.")]);
        let (cache, resolver) = cache_with(stub, Duration::from_secs(60));

        cache.lookup_mx("a.com").unwrap();
        cache.lookup_mx("b.com").unwrap();
        assert_eq!(resolver.call_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_entries_are_refreshed() {
        let stub = StubResolver::with_records(vec![MxRecord::new(10, "mx.test.")]);
        let (cache, resolver) = cache_with(stub, Duration::from_millis(50));

        cache.lookup_mx("example.com").unwrap();
        assert_eq!(resolver.call_count(), 1);

        thread::sleep(Duration::from_millis(100));

        cache.lookup_mx("example.com").unwrap();
        assert_eq!(resolver.call_count(), 2);
    }

    #[test]
    fn concurrent_lookups_share_one_flight() {
        let stub = StubResolver {
            delay: Duration::from_millis(30),
            ..StubResolver::with_records(vec![MxRecord::new(10, "mx.test.")])
        };
        let (cache, resolver) = cache_with(stub, Duration::from_secs(60));

        thread::scope(|scope| {
            for _ in 0..50 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    let records = cache.lookup_mx("example.com").unwrap();
                    assert_eq!(records.len(), 1);
                });
            }
        });

        assert_eq!(resolver.call_count(), 1);
    }

    #[test]
    fn errors_are_cached_too() {
        let stub = StubResolver::with_error(DnsError::Lookup("no such host".to_string()));
        let (cache, resolver) = cache_with(stub, Duration::from_secs(60));

        assert!(cache.lookup_mx("bad.com").is_err());
        assert!(cache.lookup_mx("bad.com").is_err());
        assert_eq!(resolver.call_count(), 1);
    }

    #[test]
    fn returned_records_are_defensive_copies() {
        let stub = StubResolver::with_records(vec![
            MxRecord::new(20, "mx2."),
            MxRecord::new(10, "mx1."),
        ]);
        let (cache, _) = cache_with(stub, Duration::from_secs(60));

        let mut first = cache.lookup_mx("example.com").unwrap();
        first[0].exchange = "modified.".to_string();
        first.sort_by_key(|record| record.preference);

        let second = cache.lookup_mx("example.com").unwrap();
        assert_eq!(second[0].exchange, "mx2.");
        assert_eq!(second[1].exchange, "mx1.");
    }
}
