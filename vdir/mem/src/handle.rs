use bytes::Bytes;
use std::sync::Arc;
use vdir_core::{DirError, DirErrorKind, DirResult, InputSource, OutputSink};

use crate::storage::SharedState;

/// Buffers appended bytes and publishes them to the shared map on
/// flush and close.
pub(crate) struct MemOutput {
    pub(crate) state: SharedState,
    pub(crate) name: String,
    pub(crate) id: u64,
    pub(crate) max_bytes: Option<u64>,
    pub(crate) buffer: Vec<u8>,
    pub(crate) published: usize,
}

impl MemOutput {
    fn publish(&mut self, context: &'static str) -> DirResult<()> {
        if self.buffer.len() == self.published {
            return Ok(());
        }
        let mut state = self.state.lock();
        if let Some(limit) = self.max_bytes {
            let used = state.used_bytes_except(&self.name);
            if used + self.buffer.len() as u64 > limit {
                return Err(DirError::with_detail(
                    DirErrorKind::Io,
                    context,
                    format!("{}: memory storage limit of {limit} bytes reached", self.name),
                ));
            }
        }
        match state.files.get_mut(&self.name) {
            Some(entry) if entry.id == self.id => {
                entry.data = Bytes::copy_from_slice(&self.buffer);
            }
            _ => {
                return Err(DirError::with_detail(
                    DirErrorKind::NotFound,
                    context,
                    format!("{} was removed while being written", self.name),
                ));
            }
        }
        self.published = self.buffer.len();
        Ok(())
    }
}

impl OutputSink for MemOutput {
    fn write_all(&mut self, buf: &[u8]) -> DirResult<()> {
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> DirResult<()> {
        self.publish("mem.flush")
    }

    fn close(&mut self) -> DirResult<()> {
        self.publish("mem.close")
    }
}

/// Snapshot of a file's bytes taken when it was opened.
pub(crate) struct MemInput {
    pub(crate) data: Bytes,
}

impl MemInput {
    pub(crate) fn shared(data: Bytes) -> Arc<dyn InputSource> {
        Arc::new(Self { data })
    }
}

impl InputSource for MemInput {
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
