use std::fs::File;
use std::io::{BufWriter, Write};

use vdir_core::{DirError, DirErrorKind, DirResult, InputSource, OutputSink};

#[derive(Debug)]
pub struct HostOutput {
    name: String,
    writer: Option<BufWriter<File>>,
}

impl HostOutput {
    pub fn new(name: &str, file: File, buffer_size: usize) -> Self {
        Self {
            name: name.to_string(),
            writer: Some(BufWriter::with_capacity(buffer_size, file)),
        }
    }

    fn writer(&mut self, context: &'static str) -> DirResult<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| DirError::with_detail(DirErrorKind::Closed, context, self.name.clone()))
    }
}

impl OutputSink for HostOutput {
    fn write_all(&mut self, buf: &[u8]) -> DirResult<()> {
        let writer = self.writer("host.output.write")?;
        crate::io_result("host.output.write", writer.write_all(buf))
    }

    fn flush(&mut self) -> DirResult<()> {
        let writer = self.writer("host.output.flush")?;
        crate::io_result("host.output.flush", writer.flush())
    }

    fn close(&mut self) -> DirResult<()> {
        match self.writer.take() {
            Some(mut writer) => crate::io_result("host.output.close", writer.flush()),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct HostInput {
    file: File,
    len: u64,
}

impl HostInput {
    pub fn new(file: File) -> DirResult<Self> {
        let meta = crate::io_result("host.input.meta", file.metadata())?;
        Ok(Self {
            file,
            len: meta.len(),
        })
    }
}

impl InputSource for HostInput {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> DirResult<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            crate::io_result("host.input.read_at", self.file.read_at(buf, offset))
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            crate::io_result("host.input.read_at", self.file.seek_read(buf, offset))
        }
    }
}
