mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dian_fe::batch::{BatchConfig, BatchSigner};
use dian_fe::core::*;
use dian_fe::xades::{self, SigningProvider};
use tokio::sync::watch;

use common::*;

fn batch(count: u64) -> Vec<InvoiceDocument> {
    (0..count).map(|i| sample_invoice(990000000 + i)).collect()
}

fn signer(provider: Arc<dyn SigningProvider>, config: BatchConfig) -> BatchSigner {
    init_tracing();
    BatchSigner::new(provider, common::config(), config).unwrap()
}

/// Records the highest number of concurrent `sign` calls.
struct PeakTracker {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl PeakTracker {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl SigningProvider for PeakTracker {
    fn sign(&self, canonical: &[u8]) -> Result<Vec<u8>, FacturaError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(FakeProvider::expected_signature(canonical))
    }

    fn certificate(&self) -> Result<Vec<u8>, FacturaError> {
        Ok(b"CERT".to_vec())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_document_is_signed() {
    let provider = Arc::new(FakeProvider::new());
    let (_tx, rx) = watch::channel(false);
    let report = signer(provider.clone(), BatchConfig::default())
        .sign_all(batch(6), rx)
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.succeeded_count(), 6);
    assert_eq!(provider.call_count(), 6);

    let numbers: Vec<_> = report
        .succeeded
        .iter()
        .map(|f| f.document().number().sequence)
        .collect();
    assert_eq!(numbers, (990000000..990000006).collect::<Vec<_>>());
    for finalized in &report.succeeded {
        xades::verify_enveloped_digest(finalized.xml()).unwrap();
    }
    assert_eq!(report.succeeded[0].fiscal_identifier().value, GOLDEN_CUFE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn provider_calls_are_bounded() {
    let tracker = Arc::new(PeakTracker::new(Duration::from_millis(20)));
    let config = BatchConfig {
        max_concurrency: 2,
        timeout: Duration::from_secs(10),
    };
    let (_tx, rx) = watch::channel(false);
    let report = signer(tracker.clone(), config)
        .sign_all(batch(8), rx)
        .await
        .unwrap();

    assert_eq!(report.succeeded_count(), 8);
    let peak = tracker.peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak concurrency was {peak}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timed_out_calls_keep_their_slot() {
    let tracker = Arc::new(PeakTracker::new(Duration::from_millis(200)));
    let config = BatchConfig {
        max_concurrency: 1,
        timeout: Duration::from_millis(20),
    };
    let (_tx, rx) = watch::channel(false);
    let report = signer(tracker.clone(), config)
        .sign_all(batch(4), rx)
        .await
        .unwrap();

    assert_eq!(report.failed_count(), 4);
    assert!(
        report
            .failed
            .iter()
            .all(|f| matches!(f.error, FacturaError::SigningTimeout(_)))
    );
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_failure_does_not_affect_the_rest() {
    let provider = Arc::new(FakeProvider::new().failing_on("SETP990000002"));
    let (_tx, rx) = watch::channel(false);
    let report = signer(provider, BatchConfig::default())
        .sign_all(batch(5), rx)
        .await
        .unwrap();

    assert_eq!(report.succeeded_count(), 4);
    assert_eq!(report.failed_count(), 1);
    let failure = &report.failed[0];
    assert_eq!(failure.number.to_string(), "SETP990000002");
    assert!(matches!(failure.error, FacturaError::SigningProvider(_)));
    assert!(
        report
            .succeeded
            .iter()
            .all(|f| f.document().number().sequence != 990000002)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_provider_times_out() {
    let provider = Arc::new(FakeProvider::new().slow(Duration::from_millis(300)));
    let config = BatchConfig {
        max_concurrency: 2,
        timeout: Duration::from_millis(50),
    };
    let (_tx, rx) = watch::channel(false);
    let report = signer(provider, config).sign_all(batch(2), rx).await.unwrap();

    assert_eq!(report.succeeded_count(), 0);
    assert_eq!(report.failed_count(), 2);
    for failure in &report.failed {
        assert!(matches!(
            failure.error,
            FacturaError::SigningTimeout(d) if d == Duration::from_millis(50)
        ));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancellation_fails_unfinished_documents() {
    let provider = Arc::new(FakeProvider::new().slow(Duration::from_millis(300)));
    let config = BatchConfig {
        max_concurrency: 1,
        timeout: Duration::from_secs(10),
    };
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
        // Keep the sender alive until the batch has seen the flag.
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let report = signer(provider.clone(), config)
        .sign_all(batch(3), rx)
        .await
        .unwrap();

    assert_eq!(report.succeeded_count(), 0);
    assert_eq!(report.failed_count(), 3);
    assert!(report.failed.iter().all(|f| matches!(f.error, FacturaError::Cancelled)));
    assert!(provider.call_count() <= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_batch_never_calls_provider() {
    let provider = Arc::new(FakeProvider::new());
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let report = signer(provider.clone(), BatchConfig::default())
        .sign_all(batch(4), rx)
        .await
        .unwrap();

    assert_eq!(report.failed_count(), 4);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn preparation_error_aborts_batch() {
    let provider = Arc::new(FakeProvider::new());
    let mut other = common::config();
    other.issuer.identifier = "900123456".into();
    let signer = BatchSigner::new(provider.clone(), other, BatchConfig::default()).unwrap();
    let (_tx, rx) = watch::channel(false);

    let err = signer.sign_all(batch(3), rx).await.unwrap_err();
    assert!(matches!(err, FacturaError::Validation(_)));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_certificate_is_per_document() {
    let provider = Arc::new(FakeProvider::new().without_certificate());
    let (_tx, rx) = watch::channel(false);
    let report = signer(provider, BatchConfig::default())
        .sign_all(batch(2), rx)
        .await
        .unwrap();
    assert_eq!(report.failed_count(), 2);
    assert!(
        report
            .failed
            .iter()
            .all(|f| matches!(f.error, FacturaError::CertificateNotFound(_)))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_batch_is_complete() {
    let (_tx, rx) = watch::channel(false);
    let report = signer(Arc::new(FakeProvider::new()), BatchConfig::default())
        .sign_all(Vec::new(), rx)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.succeeded_count(), 0);
}

#[test]
fn zero_concurrency_is_rejected() {
    let config = BatchConfig {
        max_concurrency: 0,
        timeout: Duration::from_secs(1),
    };
    let result = BatchSigner::new(Arc::new(FakeProvider::new()), common::config(), config);
    assert!(matches!(result, Err(FacturaError::Builder(_))));
}
