//! Bounded concurrent signing of many documents.
//!
//! Rendering and digesting are CPU-bound and run up front; only the calls
//! into the [`SigningProvider`] are pooled. At most
//! [`BatchConfig::max_concurrency`] provider calls are in flight, each
//! bounded by [`BatchConfig::timeout`]. A failed, timed-out or cancelled call
//! fails its own document and leaves every other document untouched.
//!
//! A failed document is never retried here. Retrying means preparing the
//! document again, which re-derives the payload from its canonical form.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Semaphore, watch};

use crate::core::{DocumentNumber, FacturaError, InvoiceDocument, IssuerConfig};
use crate::fiscal::assign_fiscal_identifier;
use crate::xades::{DigestedDocument, FinalizedDocument, PendingSignature, SigningProvider};

/// Limits of the signing pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum number of provider calls in flight.
    pub max_concurrency: usize,
    /// Upper bound for one certificate + sign round trip.
    pub timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A document that could not be signed.
#[derive(Debug)]
pub struct BatchFailure {
    pub number: DocumentNumber,
    pub error: FacturaError,
}

/// Outcome of a batch, in input order within each list.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<FinalizedDocument>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Sort task outcomes into a report. Document-local failures are
    /// collected; any other error fails the whole batch.
    fn collect(
        outcomes: Vec<(DocumentNumber, Result<FinalizedDocument, FacturaError>)>,
    ) -> Result<Self, FacturaError> {
        let mut report = Self::default();
        let mut fatal = None;
        for (number, result) in outcomes {
            match result {
                Ok(finalized) => report.succeeded.push(finalized),
                Err(error) if error.is_document_local() => {
                    tracing::warn!(number = %number, error = %error, "document signing failed");
                    report.failed.push(BatchFailure { number, error });
                }
                Err(error) => {
                    tracing::error!(number = %number, error = %error, "signed document could not be assembled");
                    fatal.get_or_insert(error);
                }
            }
        }
        match fatal {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }
}

/// Signs documents of one issuer through a shared provider.
pub struct BatchSigner {
    provider: Arc<dyn SigningProvider>,
    issuer: IssuerConfig,
    config: BatchConfig,
}

impl BatchSigner {
    pub fn new(
        provider: Arc<dyn SigningProvider>,
        issuer: IssuerConfig,
        config: BatchConfig,
    ) -> Result<Self, FacturaError> {
        if config.max_concurrency == 0 {
            return Err(FacturaError::Builder(
                "batch concurrency must be at least 1".into(),
            ));
        }
        Ok(Self {
            provider,
            issuer,
            config,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Sign every document.
    ///
    /// Documents without a fiscal identifier get one. Rendering or digest
    /// failures abort the batch before any provider call is made. Provider
    /// failures, timeouts and cancellation are collected per document in the
    /// report. Errors while embedding a returned signature are not
    /// document-local: they are returned once every task has finished.
    ///
    /// Setting `cancel` to `true` fails every document whose provider call
    /// has not completed yet with [`FacturaError::Cancelled`].
    pub async fn sign_all(
        &self,
        documents: Vec<InvoiceDocument>,
        cancel: watch::Receiver<bool>,
    ) -> Result<BatchReport, FacturaError> {
        let mut pending = Vec::with_capacity(documents.len());
        for document in documents {
            let document = match document.fiscal_identifier() {
                Some(_) => document,
                None => assign_fiscal_identifier(document, &self.issuer)?,
            };
            pending.push(DigestedDocument::prepare(document, &self.issuer)?.request_signature());
        }

        let total = pending.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut handles = Vec::with_capacity(total);
        for request in pending {
            let number = request.document().number().clone();
            let task = sign_one(
                Arc::clone(&self.provider),
                request,
                Arc::clone(&semaphore),
                self.config.timeout,
                cancel.clone(),
            );
            handles.push((number, tokio::spawn(task)));
        }

        let mut outcomes = Vec::with_capacity(total);
        for (number, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(FacturaError::SigningProvider(format!(
                    "signing task failed: {e}"
                ))),
            };
            outcomes.push((number, result));
        }
        let report = BatchReport::collect(outcomes)?;

        tracing::info!(
            total,
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            "signing batch completed"
        );
        Ok(report)
    }
}

async fn sign_one(
    provider: Arc<dyn SigningProvider>,
    request: PendingSignature,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    mut cancel: watch::Receiver<bool>,
) -> Result<FinalizedDocument, FacturaError> {
    let permit = tokio::select! {
        permit = semaphore.acquire_owned() => permit.map_err(|_| FacturaError::Cancelled)?,
        _ = cancelled(&mut cancel) => return Err(FacturaError::Cancelled),
    };
    if *cancel.borrow() {
        return Err(FacturaError::Cancelled);
    }

    let payload = request.payload().to_vec();
    // The permit moves into the blocking call so that a timed-out call keeps
    // its slot until the provider actually returns.
    let call = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let certificate = provider.certificate()?;
        let signature = provider.sign(&payload)?;
        Ok::<_, FacturaError>((signature, certificate))
    });

    let (signature, certificate) = tokio::select! {
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Err(_) => return Err(FacturaError::SigningTimeout(timeout)),
            Ok(Err(e)) => {
                return Err(FacturaError::SigningProvider(format!("signing call failed: {e}")));
            }
            Ok(Ok(result)) => result?,
        },
        _ = cancelled(&mut cancel) => return Err(FacturaError::Cancelled),
    };

    request
        .complete(signature, certificate, Utc::now())?
        .finalize()
}

/// Resolves once the flag is set. Never resolves if the sender is gone
/// without having cancelled.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(sequence: u64) -> DocumentNumber {
        DocumentNumber::new("SETP", sequence)
    }

    #[test]
    fn local_failures_are_reported() {
        let report = BatchReport::collect(vec![
            (number(1), Err(FacturaError::SigningTimeout(Duration::from_secs(1)))),
            (number(2), Err(FacturaError::Cancelled)),
        ])
        .unwrap();
        assert_eq!(report.failed_count(), 2);
        assert_eq!(report.failed[0].number, number(1));
    }

    #[test]
    fn assembly_errors_fail_the_batch() {
        let err = BatchReport::collect(vec![
            (number(1), Err(FacturaError::SigningProvider("hsm offline".into()))),
            (number(2), Err(FacturaError::AlreadySigned)),
            (number(3), Err(FacturaError::Xml("unbalanced".into()))),
        ])
        .unwrap_err();
        assert!(matches!(err, FacturaError::AlreadySigned));
    }
}
