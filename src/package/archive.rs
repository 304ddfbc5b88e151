//! Reproducible tar archive writing with swappable gzip backends
//!
//! Every header is normalized (mtime 0, uid/gid 0, fixed modes, no user or
//! group names) so two builds of the same filtered tree produce the same tar
//! stream. The gzip stage is applied on top; in-process gzip writes a fixed
//! header (mtime 0, OS byte 255), `pigz` is run with `--no-name`.

use crate::config::options::CompressionBackend;
use crate::core::error::{PackagingError, Result};
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use tar::{Builder, EntryType, Header};
use tracing::{debug, warn};

const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;
const SYMLINK_MODE: u32 = 0o777;

/// Tar writer that emits normalized headers in caller order
pub struct ArchiveBuilder<W: Write> {
    tar: Builder<W>,
    entries: usize,
}

impl<W: Write> ArchiveBuilder<W> {
    pub fn new(writer: W) -> Self {
        let mut tar = Builder::new(writer);
        tar.mode(tar::HeaderMode::Deterministic);
        tar.follow_symlinks(false);
        Self { tar, entries: 0 }
    }

    /// Number of entries written so far
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    pub fn append_directory(&mut self, rel_path: &str) -> io::Result<()> {
        let mut header = normalized_header(EntryType::Directory, DIR_MODE, 0);
        self.tar.append_data(&mut header, rel_path, io::empty())?;
        self.entries += 1;
        Ok(())
    }

    /// Append a regular file of exactly `len` bytes read from `content`
    pub fn append_file<R: Read>(&mut self, rel_path: &str, len: u64, content: R) -> io::Result<()> {
        let mut header = normalized_header(EntryType::Regular, FILE_MODE, len);
        self.tar.append_data(&mut header, rel_path, content)?;
        self.entries += 1;
        Ok(())
    }

    /// Append a native symlink entry carrying `target` verbatim
    pub fn append_symlink(&mut self, rel_path: &str, target: &str) -> io::Result<()> {
        let mut header = normalized_header(EntryType::Symlink, SYMLINK_MODE, 0);
        self.tar.append_link(&mut header, rel_path, target)?;
        self.entries += 1;
        Ok(())
    }

    /// Write the end-of-archive marker and return the underlying writer
    pub fn into_inner(self) -> io::Result<W> {
        self.tar.into_inner()
    }
}

fn normalized_header(entry_type: EntryType, mode: u32, size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(mode);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header
}

/// Compressed output stream for an archive file
pub enum ArchiveSink {
    /// In-process gzip
    Gzip(GzEncoder<BufWriter<File>>),
    /// `pigz` child process writing straight to the output file
    Pigz {
        child: Child,
        stdin: Option<ChildStdin>,
    },
}

impl ArchiveSink {
    /// Open a compression stage writing into `output`
    ///
    /// Requesting `pigz` when it cannot be started falls back to gzip.
    pub fn open(backend: CompressionBackend, level: u32, output: File) -> Result<Self> {
        match backend {
            CompressionBackend::Gzip => Ok(Self::gzip(level, output)),
            CompressionBackend::Pigz => match Self::spawn_pigz(level, &output) {
                Ok(sink) => Ok(sink),
                Err(e) => {
                    warn!(error = %e, "pigz unavailable, falling back to gzip");
                    Ok(Self::gzip(level, output))
                },
            },
        }
    }

    fn gzip(level: u32, output: File) -> Self {
        let encoder = GzBuilder::new()
            .mtime(0)
            .operating_system(255)
            .write(BufWriter::new(output), Compression::new(level));
        Self::Gzip(encoder)
    }

    fn spawn_pigz(level: u32, output: &File) -> io::Result<Self> {
        let mut child = Command::new("pigz")
            .arg(format!("-{}", level))
            .arg("--no-name")
            .arg("--stdout")
            .stdin(Stdio::piped())
            .stdout(Stdio::from(output.try_clone()?))
            .stderr(Stdio::piped())
            .spawn()?;

        debug!(pid = child.id(), "Started pigz");
        let stdin = child.stdin.take();
        Ok(Self::Pigz { child, stdin })
    }

    /// Backend actually in use
    pub fn backend(&self) -> CompressionBackend {
        match self {
            Self::Gzip(_) => CompressionBackend::Gzip,
            Self::Pigz { .. } => CompressionBackend::Pigz,
        }
    }

    /// Flush the compressed stream and make it durable
    pub fn finish(self) -> Result<()> {
        match self {
            Self::Gzip(encoder) => {
                let writer = encoder.finish()?;
                let file = writer.into_inner().map_err(|e| e.into_error())?;
                file.sync_all()?;
                Ok(())
            },
            Self::Pigz { child, stdin } => {
                drop(stdin);
                let output = child.wait_with_output()?;
                if !output.status.success() {
                    return Err(PackagingError::compression_failed(format!(
                        "pigz exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
                Ok(())
            },
        }
    }
}

impl Write for ArchiveSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Gzip(encoder) => encoder.write(buf),
            Self::Pigz { stdin, .. } => match stdin {
                Some(stdin) => stdin.write(buf),
                None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "pigz stdin closed")),
            },
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Gzip(encoder) => encoder.flush(),
            Self::Pigz { stdin, .. } => match stdin {
                Some(stdin) => stdin.flush(),
                None => Ok(()),
            },
        }
    }
}
