use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use vdir_core::{DirError, DirErrorKind, DirResult};

use crate::ObjectStoreError;

/// Runs store calls to completion on the backend runtime, bounded by the
/// configured timeout. Handles and locks keep a clone, so the runtime lives
/// as long as anything that may still call the store.
#[derive(Clone, Debug)]
pub(crate) struct Executor {
    runtime: Arc<Runtime>,
    op_timeout: Duration,
}

impl Executor {
    pub fn new(runtime: Runtime, op_timeout: Duration) -> Self {
        Self {
            runtime: Arc::new(runtime),
            op_timeout,
        }
    }

    pub fn block<T, F>(&self, context: &'static str, fut: F) -> DirResult<T>
    where
        F: Future<Output = Result<T, ObjectStoreError>>,
    {
        let timeout = self.op_timeout;
        match self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, fut).await })
        {
            Ok(result) => result.map_err(|err| err.into_dir_error(context)),
            Err(_) => Err(DirError::with_detail(
                DirErrorKind::TimedOut,
                context,
                format!("no response within {timeout:?}"),
            )),
        }
    }
}
