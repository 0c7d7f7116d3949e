//! Background execution of one search with cooperative cancellation.

use std::any::Any;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::error::FinderError;

use super::cancel::CancellationToken;
use super::provider::{CallSiteResolver, ReferenceProvider};
use super::types::MethodRef;
use super::{RootCallerFinder, SearchOutcome, SearchReport};

/// Final status of a [`SearchJob`].
#[derive(Debug)]
pub enum JobStatus {
    Completed(SearchReport),
    Cancelled,
    Failed(FinderError),
}

impl JobStatus {
    /// Human-readable status line for the requester.
    pub fn message(&self) -> String {
        match self {
            Self::Completed(report) => format!(
                "Found {} result(s) from {} direct call(s), {} method(s) searched",
                report.results.len(), report.direct_calls, report.methods_searched
            ),
            Self::Cancelled => "search cancelled".to_string(),
            Self::Failed(e) => format!("search failed: {}", e),
        }
    }
}

/// One root-caller search running on its own worker thread.
///
/// The requester never blocks until it calls [`wait`](Self::wait); it can cancel at
/// any time through [`cancel`](Self::cancel) or a clone of the token.
pub struct SearchJob {
    target: MethodRef,
    cancel: CancellationToken,
    handle: JoinHandle<JobStatus>,
}

impl SearchJob {
    pub fn spawn<B>(backend: Arc<B>, target: MethodRef) -> Result<Self, FinderError>
    where
        B: ReferenceProvider + CallSiteResolver + 'static,
    {
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let worker_target = target.clone();

        let handle = std::thread::Builder::new()
            .name(format!("rootcallers:{}", target.display_name()))
            .spawn(move || {
                let finder = RootCallerFinder::with_backend(backend.as_ref());
                match finder.find_root_callers(&worker_target, &worker_cancel) {
                    Ok(SearchOutcome::Completed(report)) => JobStatus::Completed(report),
                    Ok(SearchOutcome::Cancelled) => JobStatus::Cancelled,
                    Err(e) => {
                        error!(target = %worker_target, error = %e, "Root caller search failed");
                        JobStatus::Failed(e)
                    }
                }
            })?;

        info!(target = %target, "Search job started");
        Ok(Self { target, cancel, handle })
    }

    pub fn target(&self) -> &MethodRef {
        &self.target
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker finishes. A worker panic becomes `Failed(Unexpected)`.
    pub fn wait(self) -> JobStatus {
        match self.handle.join() {
            Ok(status) => status,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(target = %self.target, panic = %message, "Search worker panicked");
                JobStatus::Failed(FinderError::Unexpected(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker thread panicked".to_string()
    }
}
