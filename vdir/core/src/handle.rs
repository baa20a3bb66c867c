//! File handles handed out by directories.
//!
//! Both handle types are owned by a single caller at a time and take
//! `&mut self`; they are `Send` but deliberately not shared.

use crate::backend::{InputSource, OutputSink};
use crate::open_files::HandleLease;
use crate::{DirError, DirErrorKind, DirResult};
use std::fmt;
use std::io;
use std::sync::Arc;
use xxhash_rust::xxh64::Xxh64;

const CHECKSUM_SEED: u64 = 0;

/// Append-only output stream over one file.
pub struct IndexOutput {
    name: String,
    sink: Box<dyn OutputSink>,
    position: u64,
    hasher: Option<Xxh64>,
    closed: bool,
    lease: Option<HandleLease>,
}

impl IndexOutput {
    /// Wraps a backend sink. Outputs created this way are not tracked by any
    /// directory; use [`crate::Directory::create_output`] for that.
    pub fn new(name: impl Into<String>, sink: Box<dyn OutputSink>, checksums: bool) -> Self {
        Self {
            name: name.into(),
            sink,
            position: 0,
            hasher: checksums.then(|| Xxh64::new(CHECKSUM_SEED)),
            closed: false,
            lease: None,
        }
    }

    pub(crate) fn with_lease(mut self, lease: HandleLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bytes written so far.
    pub fn file_pointer(&self) -> u64 {
        self.position
    }

    /// xxh64 of every byte written so far, if checksums are enabled.
    pub fn checksum(&self) -> Option<u64> {
        self.hasher.as_ref().map(Xxh64::digest)
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.is_revoked()
    }

    fn is_revoked(&self) -> bool {
        self.lease.as_ref().is_some_and(HandleLease::is_revoked)
    }

    fn ensure_open(&self, context: &'static str) -> DirResult<()> {
        if self.is_closed() {
            return Err(DirError::with_detail(
                DirErrorKind::Closed,
                context,
                self.name.clone(),
            ));
        }
        Ok(())
    }

    pub fn write_byte(&mut self, byte: u8) -> DirResult<()> {
        self.write_bytes(&[byte])
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> DirResult<()> {
        self.ensure_open("output.write")?;
        self.sink.write_all(buf)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(buf);
        }
        self.position += buf.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> DirResult<()> {
        self.ensure_open("output.flush")?;
        self.sink.flush()
    }

    /// Finishes the file. The checksum stays queryable afterwards; closing
    /// twice is a no-op.
    pub fn close(&mut self) -> DirResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.is_revoked() {
            self.lease = None;
            return Err(DirError::with_detail(
                DirErrorKind::Closed,
                "output.close",
                format!("{}: directory closed before the output", self.name),
            ));
        }
        let result = self.sink.close();
        self.lease = None;
        tracing::trace!(name = %self.name, length = self.position, "closed output");
        result
    }
}

impl io::Write for IndexOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        IndexOutput::flush(self).map_err(io::Error::from)
    }
}

impl fmt::Debug for IndexOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexOutput")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for IndexOutput {
    fn drop(&mut self) {
        if !self.closed {
            tracing::debug!(name = %self.name, "output dropped without close");
        }
    }
}

/// Random access input stream over one file.
pub struct IndexInput {
    name: String,
    source: Arc<dyn InputSource>,
    length: u64,
    position: u64,
    checksums: bool,
    hasher: Option<Xxh64>,
    closed: bool,
    lease: Option<HandleLease>,
}

impl IndexInput {
    pub fn new(name: impl Into<String>, source: Arc<dyn InputSource>, checksums: bool) -> Self {
        let length = source.len();
        Self {
            name: name.into(),
            source,
            length,
            position: 0,
            checksums,
            hasher: checksums.then(|| Xxh64::new(CHECKSUM_SEED)),
            closed: false,
            lease: None,
        }
    }

    pub(crate) fn with_lease(mut self, lease: HandleLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn file_pointer(&self) -> u64 {
        self.position
    }

    pub fn remaining(&self) -> u64 {
        self.length - self.position
    }

    /// xxh64 of the bytes read so far. `None` when checksums are disabled or
    /// a seek broke the sequential read.
    pub fn checksum(&self) -> Option<u64> {
        self.hasher.as_ref().map(Xxh64::digest)
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.lease.as_ref().is_some_and(HandleLease::is_revoked)
    }

    fn ensure_open(&self, context: &'static str) -> DirResult<()> {
        if self.is_closed() {
            return Err(DirError::with_detail(
                DirErrorKind::Closed,
                context,
                self.name.clone(),
            ));
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> DirResult<u8> {
        let mut byte = [0u8; 1];
        self.read_bytes(&mut byte)?;
        Ok(byte[0])
    }

    /// Fills `buf` completely or fails with `EndOfFile` without consuming.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> DirResult<()> {
        self.ensure_open("input.read")?;
        let wanted = buf.len() as u64;
        if wanted > self.remaining() {
            return Err(DirError::with_detail(
                DirErrorKind::EndOfFile,
                "input.read",
                format!(
                    "{}: read of {wanted} bytes at {} past length {}",
                    self.name, self.position, self.length
                ),
            ));
        }

        let mut filled = 0;
        while filled < buf.len() {
            let offset = self.position + filled as u64;
            let read = self.source.read_at(offset, &mut buf[filled..])?;
            if read == 0 {
                return Err(DirError::with_detail(
                    DirErrorKind::EndOfFile,
                    "input.read",
                    format!("{}: file shrank below {}", self.name, self.length),
                ));
            }
            filled += read;
        }

        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(buf);
        }
        self.position += wanted;
        Ok(())
    }

    pub fn seek(&mut self, pos: u64) -> DirResult<()> {
        self.ensure_open("input.seek")?;
        if pos > self.length {
            return Err(DirError::with_detail(
                DirErrorKind::EndOfFile,
                "input.seek",
                format!("{}: seek to {pos} past length {}", self.name, self.length),
            ));
        }
        if pos != self.position {
            self.hasher = None;
        }
        self.position = pos;
        Ok(())
    }

    /// Independent cursor over the same file, positioned at its start.
    pub fn try_clone(&self) -> DirResult<IndexInput> {
        self.ensure_open("input.clone")?;
        let mut clone = IndexInput::new(self.name.clone(), self.source.clone(), self.checksums);
        if let Some(lease) = self.lease.as_ref() {
            let lease = lease.duplicate().ok_or_else(|| {
                DirError::with_detail(DirErrorKind::Closed, "input.clone", self.name.clone())
            })?;
            clone.lease = Some(lease);
        }
        Ok(clone)
    }

    pub fn close(&mut self) -> DirResult<()> {
        if !self.closed {
            self.closed = true;
            self.lease = None;
            tracing::trace!(name = %self.name, "closed input");
        }
        Ok(())
    }
}

impl io::Read for IndexInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(usize::try_from(self.remaining()).unwrap_or(usize::MAX));
        if n == 0 {
            self.ensure_open("input.read")?;
            return Ok(0);
        }
        self.read_bytes(&mut buf[..n])?;
        Ok(n)
    }
}

impl fmt::Debug for IndexInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexInput")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("position", &self.position)
            .field("closed", &self.is_closed())
            .finish()
    }
}
