use bytes::Bytes;
use std::sync::Arc;
use vdir_core::{DirErrorKind, DirResult, InputSource, OutputSink};

use crate::executor::Executor;
use crate::{ObjectStore, PutCondition};

/// Buffers the whole file and uploads it once, on close.
pub(crate) struct RemoteOutput {
    pub(crate) exec: Executor,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) key: String,
    pub(crate) name: String,
    pub(crate) buffer: Vec<u8>,
}

impl OutputSink for RemoteOutput {
    fn write_all(&mut self, buf: &[u8]) -> DirResult<()> {
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> DirResult<()> {
        Ok(())
    }

    fn close(&mut self) -> DirResult<()> {
        let body = Bytes::from(std::mem::take(&mut self.buffer));
        let size = body.len();
        self.exec
            .block(
                "remote.upload",
                self.store.put(&self.key, body, PutCondition::IfAbsent),
            )
            .map_err(|err| {
                if err.kind() == DirErrorKind::AlreadyExists {
                    err.detail_with(format!("{} was created concurrently", self.name))
                } else {
                    err.detail_with(self.name.clone())
                }
            })?;
        tracing::trace!(name = %self.name, size, "uploaded object");
        Ok(())
    }
}

/// Downloaded copy of an object.
pub(crate) struct RemoteInput {
    pub(crate) data: Bytes,
}

impl InputSource for RemoteInput {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> DirResult<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}
