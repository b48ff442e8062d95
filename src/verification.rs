//! Entry point for callers: backend selection plus single, async and batch
//! validation.

use crate::config::ValidatorConfig;
use crate::error::ValidationError;
use crate::platform::{select, Platform, SignatureValidator};
use crate::result::{ScanSummary, SignatureResult};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{info, warn};

static HOST_SERVICE: Lazy<SignatureService> =
    Lazy::new(|| SignatureService::new(&ValidatorConfig::default()));

/// Validates `path` with the backend for the host platform and default
/// configuration. Never panics; failures are reported in `error_message`.
pub fn validate_signature(path: &str) -> SignatureResult {
    HOST_SERVICE.validate_signature(path)
}

/// A selected backend plus the worker pool its batches run on. Cheap to
/// clone; clones share the pool.
#[derive(Clone)]
pub struct SignatureService {
    validator: Arc<dyn SignatureValidator>,
    max_workers: usize,
    /// `None` runs batches on rayon's global pool.
    pool: Option<Arc<ThreadPool>>,
}

impl SignatureService {
    /// Backend for the host platform.
    pub fn new(config: &ValidatorConfig) -> Self {
        Self::for_platform(Platform::host(), config)
    }

    pub fn for_platform(platform: Platform, config: &ValidatorConfig) -> Self {
        Self::with_validator(Arc::from(select(platform, config)), config.max_workers)
    }

    /// `max_workers == 0` leaves batch sizing to rayon's global pool.
    pub fn with_validator(validator: Arc<dyn SignatureValidator>, max_workers: usize) -> Self {
        SignatureService {
            validator,
            max_workers,
            pool: build_pool(max_workers).map(Arc::new),
        }
    }

    pub fn platform(&self) -> Platform {
        self.validator.platform()
    }

    /// Blocking validation of one file.
    pub fn validate_signature(&self, path: &str) -> SignatureResult {
        self.validator.validate(path)
    }

    /// Runs the blocking validation on tokio's blocking pool.
    pub async fn validate_signature_async(&self, path: impl Into<String>) -> SignatureResult {
        let path = path.into();
        let validator = Arc::clone(&self.validator);
        let task_path = path.clone();

        match tokio::task::spawn_blocking(move || validator.validate(&task_path)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(%path, error = %e, "validation task did not complete");
                SignatureResult::failed(path, ValidationError::Unexpected(e.to_string()))
            }
        }
    }

    /// Validates every path on a bounded worker pool. Results come back in
    /// input order, but callers should key them by `file_path`.
    pub fn validate_many<S: AsRef<str> + Sync>(&self, paths: &[S]) -> Vec<SignatureResult> {
        let run = || {
            paths
                .par_iter()
                .map(|p| self.validator.validate(p.as_ref()))
                .collect::<Vec<_>>()
        };

        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    /// [`Self::validate_many`] folded into counts.
    pub fn scan<S: AsRef<str> + Sync>(&self, paths: &[S]) -> ScanSummary {
        let summary = ScanSummary::from_results(self.validate_many(paths));
        info!(
            total = summary.total_files,
            signed = summary.signed_files,
            unsigned = summary.unsigned_files,
            expired = summary.expired_signatures,
            "scan finished"
        );
        summary
    }
}

fn build_pool(max_workers: usize) -> Option<ThreadPool> {
    if max_workers == 0 {
        return None;
    }
    match ThreadPoolBuilder::new()
        .num_threads(max_workers)
        .thread_name(|i| format!("signinspect-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(error = %e, "could not build worker pool, using the global one");
            None
        }
    }
}

impl std::fmt::Debug for SignatureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureService")
            .field("platform", &self.platform())
            .field("max_workers", &self.max_workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Outcome, SignatureDetails};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Signs anything whose name ends in `.exe`, counting calls.
    #[derive(Default)]
    struct ExeSigner {
        calls: AtomicUsize,
    }

    impl SignatureValidator for ExeSigner {
        fn platform(&self) -> Platform {
            Platform::Windows
        }

        fn evaluate(&self, path: &Path) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path.extension().is_some_and(|e| e == "exe") {
                Ok(SignatureDetails::signed_and_valid("CN=Fake"))
            } else {
                Ok(SignatureDetails::unsigned())
            }
        }
    }

    fn service(max_workers: usize) -> (SignatureService, Arc<ExeSigner>) {
        let signer = Arc::new(ExeSigner::default());
        (SignatureService::with_validator(signer.clone(), max_workers), signer)
    }

    #[test]
    fn for_platform_selects_that_backend() {
        let config = ValidatorConfig::default();
        for p in [Platform::Windows, Platform::MacOs, Platform::Linux] {
            assert_eq!(SignatureService::for_platform(p, &config).platform(), p);
        }
    }

    #[test]
    fn host_facade_reports_missing_file() {
        let result = validate_signature("/path/to/nonexistent/file.exe");
        assert_eq!(result.file_path, "/path/to/nonexistent/file.exe");
        assert!(!result.is_signed && !result.is_valid);
        assert_eq!(result.error_message.as_deref(), Some("File not found"));
    }

    #[test]
    fn batch_results_match_inputs_by_path() {
        let (svc, signer) = service(2);
        let paths: Vec<String> = (0..20)
            .map(|i| format!("/bin/file{i}.{}", if i % 2 == 0 { "exe" } else { "sh" }))
            .collect();

        let results = svc.validate_many(&paths);
        assert_eq!(results.len(), paths.len());
        assert_eq!(signer.calls.load(Ordering::SeqCst), paths.len());
        for result in &results {
            assert_eq!(result.is_signed, result.file_path.ends_with(".exe"));
        }
    }

    /// Records how many threads the pool it ran on had.
    #[derive(Default)]
    struct PoolWidth {
        widths: std::sync::Mutex<Vec<usize>>,
    }

    impl SignatureValidator for PoolWidth {
        fn platform(&self) -> Platform {
            Platform::Linux
        }

        fn evaluate(&self, _path: &Path) -> Outcome {
            self.widths.lock().unwrap().push(rayon::current_num_threads());
            Ok(SignatureDetails::unsigned())
        }
    }

    #[test]
    fn batches_reuse_one_bounded_pool() {
        let recorder = Arc::new(PoolWidth::default());
        let svc = SignatureService::with_validator(recorder.clone(), 3);
        let copy = svc.clone();
        assert!(Arc::ptr_eq(svc.pool.as_ref().unwrap(), copy.pool.as_ref().unwrap()));

        svc.validate_many(&["a", "b", "c", "d"]);
        copy.validate_many(&["e", "f"]);
        let widths = recorder.widths.lock().unwrap();
        assert_eq!(widths.len(), 6);
        assert!(widths.iter().all(|w| *w == 3));
    }

    #[test]
    fn zero_workers_uses_global_pool() {
        let (svc, _) = service(0);
        assert!(svc.pool.is_none());
        assert_eq!(svc.validate_many(&["x.exe"]).len(), 1);
    }

    #[test]
    fn scan_counts_signed_and_unsigned() {
        let (svc, _) = service(0);
        let summary = svc.scan(&["a.exe", "b.exe", "c.so"]);
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.signed_files, 2);
        assert_eq!(summary.unsigned_files, 1);
        assert_eq!(summary.expired_signatures, 0);
    }

    #[tokio::test]
    async fn async_validation_matches_blocking() {
        let (svc, _) = service(1);
        let blocking = svc.validate_signature("setup.exe");
        let offloaded = svc.validate_signature_async("setup.exe").await;
        assert_eq!(blocking, offloaded);
    }
}
