//! Layered read-through cache for the supported-ticker list.
//!
//! Lookup walks three tiers in order:
//!
//! 1. `FreshMemory`: the in-memory list, if younger than the TTL (24h default)
//! 2. `DiskFallback`: re-extract the archive saved by an earlier download
//! 3. `RemoteFetch`: download, persist and extract a fresh archive
//!
//! Whatever a tier produces is written back to the tiers above it. An empty
//! end result clears every tier and the whole walk is retried once; a second
//! empty result is returned as-is.

use super::archive::ArchiveStore;
use super::download::ArchiveSource;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Memory validity window when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Tier of the cache that produced a lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    FreshMemory,
    DiskFallback,
    RemoteFetch,
}

/// Result of one [`TickerCache::get_with_tier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub tickers: Vec<String>,
    /// Tier that answered the final attempt.
    pub tier: Tier,
    /// 1 normally, 2 when the first walk came back empty.
    pub attempts: u8,
}

#[derive(Debug)]
struct MemoryEntry {
    tickers: Vec<String>,
    created_at: Instant,
}

pub struct TickerCache {
    source: Box<dyn ArchiveSource>,
    store: ArchiveStore,
    ttl: Duration,
    // Held for the whole lookup so concurrent callers share one download.
    memory: Mutex<Option<MemoryEntry>>,
}

impl TickerCache {
    pub fn new(source: impl ArchiveSource + 'static, store: ArchiveStore) -> Self {
        Self {
            source: Box::new(source),
            store,
            ttl: DEFAULT_TTL,
            memory: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, Option<MemoryEntry>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The ticker list, empty if every tier failed twice.
    pub fn get(&self) -> Vec<String> {
        self.get_with_tier().tickers
    }

    /// Like [`get`](Self::get), also reporting which tier answered.
    pub fn get_with_tier(&self) -> Lookup {
        let mut memory = self.lock();

        let mut attempts = 0;
        loop {
            attempts += 1;
            let (tickers, tier) = self.resolve(&mut memory);
            if !tickers.is_empty() {
                return Lookup {
                    tickers,
                    tier,
                    attempts,
                };
            }

            tracing::warn!(attempt = attempts, "ticker list is empty, clearing cache");
            self.clear_layers(&mut memory);

            if attempts >= 2 {
                return Lookup {
                    tickers,
                    tier,
                    attempts,
                };
            }
            tracing::debug!("retrying ticker lookup");
        }
    }

    /// Drop the in-memory list and delete the saved archive.
    pub fn clear(&self) {
        let mut memory = self.lock();
        self.clear_layers(&mut memory);
    }

    /// Age of the in-memory list, if one is held (expired or not).
    pub fn memory_age(&self) -> Option<Duration> {
        self.lock().as_ref().map(|e| e.created_at.elapsed())
    }

    fn clear_layers(&self, memory: &mut Option<MemoryEntry>) {
        *memory = None;
        self.store.clear();
    }

    fn resolve(&self, memory: &mut Option<MemoryEntry>) -> (Vec<String>, Tier) {
        let mut tier = Tier::FreshMemory;
        loop {
            match tier {
                Tier::FreshMemory => {
                    match memory.as_ref() {
                        Some(entry) if entry.created_at.elapsed() < self.ttl => {
                            tracing::debug!(count = entry.tickers.len(), "tickers from memory");
                            return (entry.tickers.clone(), tier);
                        }
                        Some(_) => {
                            tracing::debug!("in-memory tickers expired");
                            *memory = None;
                        }
                        None => {}
                    }
                    tier = Tier::DiskFallback;
                }
                Tier::DiskFallback => {
                    let tickers = self.store.extract();
                    if !tickers.is_empty() {
                        tracing::debug!(count = tickers.len(), "tickers from saved archive");
                        self.write_back(memory, &tickers);
                        return (tickers, tier);
                    }
                    tier = Tier::RemoteFetch;
                }
                Tier::RemoteFetch => {
                    let tickers = self.fetch_remote();
                    self.write_back(memory, &tickers);
                    return (tickers, tier);
                }
            }
        }
    }

    fn fetch_remote(&self) -> Vec<String> {
        let origin = self.source.describe();
        let mut stream = match self.source.open() {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(%origin, error = %e, "failed to download ticker archive");
                return Vec::new();
            }
        };

        if let Err(e) = self.store.persist(&mut stream) {
            tracing::warn!(%origin, error = %e, "failed to save ticker archive");
            return Vec::new();
        }

        let tickers = self.store.extract();
        tracing::info!(%origin, count = tickers.len(), "downloaded ticker archive");
        tickers
    }

    fn write_back(&self, memory: &mut Option<MemoryEntry>, tickers: &[String]) {
        if tickers.is_empty() {
            *memory = None;
            self.store.clear();
            return;
        }
        *memory = Some(MemoryEntry {
            tickers: tickers.to_vec(),
            created_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::archive::TICKER_ENTRY;
    use crate::data::FinanceError;
    use std::env;
    use std::fs;
    use std::io::{Cursor, Read, Write};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use zip::write::SimpleFileOptions;

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("moment_cache_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn zip_of(body: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(TICKER_ENTRY, SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    /// Serves a queue of canned responses, then keeps repeating the last one.
    struct ScriptedSource {
        responses: Vec<Option<Vec<u8>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Option<Vec<u8>>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    responses,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl ArchiveSource for ScriptedSource {
        fn describe(&self) -> String {
            "scripted".into()
        }

        fn open(&self) -> Result<Box<dyn Read + Send>, FinanceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = n.min(self.responses.len() - 1);
            match &self.responses[idx] {
                Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
                None => Err(FinanceError::NetworkUnreachable("scripted outage".into())),
            }
        }
    }

    #[test]
    fn remote_then_memory() {
        let dir = temp_cache_dir();
        let (source, calls) = ScriptedSource::new(vec![Some(zip_of("AAPL\nMSFT\n"))]);
        let cache = TickerCache::new(source, ArchiveStore::new(&dir));

        let first = cache.get_with_tier();
        assert_eq!(first.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(first.tier, Tier::RemoteFetch);
        assert_eq!(first.attempts, 1);

        let second = cache.get_with_tier();
        assert_eq!(second.tickers, first.tickers);
        assert_eq!(second.tier, Tier::FreshMemory);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn expired_memory_falls_back_to_disk() {
        let dir = temp_cache_dir();
        let (source, calls) = ScriptedSource::new(vec![Some(zip_of("AAPL\n"))]);
        let cache = TickerCache::new(source, ArchiveStore::new(&dir)).with_ttl(Duration::from_millis(10));

        assert_eq!(cache.get_with_tier().tier, Tier::RemoteFetch);
        std::thread::sleep(Duration::from_millis(15));

        let again = cache.get_with_tier();
        assert_eq!(again.tickers, vec!["AAPL"]);
        assert_eq!(again.tier, Tier::DiskFallback);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_result_retries_exactly_once() {
        let dir = temp_cache_dir();
        let (source, calls) = ScriptedSource::new(vec![None]);
        let cache = TickerCache::new(source, ArchiveStore::new(&dir));

        let lookup = cache.get_with_tier();
        assert!(lookup.tickers.is_empty());
        assert_eq!(lookup.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn retry_recovers_after_bad_download() {
        let dir = temp_cache_dir();
        let (source, calls) = ScriptedSource::new(vec![
            Some(b"truncated garbage".to_vec()),
            Some(zip_of("GOOG\n")),
        ]);
        let cache = TickerCache::new(source, ArchiveStore::new(&dir));

        let lookup = cache.get_with_tier();
        assert_eq!(lookup.tickers, vec!["GOOG"]);
        assert_eq!(lookup.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn clear_forces_a_fresh_download() {
        let dir = temp_cache_dir();
        let (source, calls) = ScriptedSource::new(vec![Some(zip_of("AAPL\n")), Some(zip_of("MSFT\n"))]);
        let cache = TickerCache::new(source, ArchiveStore::new(&dir));

        assert_eq!(cache.get(), vec!["AAPL"]);
        cache.clear();
        assert!(cache.memory_age().is_none());
        assert!(!cache.store().exists());

        assert_eq!(cache.get(), vec!["MSFT"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let _ = fs::remove_dir_all(&dir);
    }
}
