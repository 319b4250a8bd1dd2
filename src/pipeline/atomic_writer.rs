//! CSV writer that only replaces its destination once every row is written.
//!
//! Rows go to a temporary file next to the destination, which is renamed over
//! it on `finish()`. Dropping the writer unfinished removes the temporary file.
//! The temporary file is opened with the mode a plain create would use, so the
//! renamed output is not left owner-only.

use crate::error::{ProcessorError, Result};
use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct AtomicCsvWriter {
    writer: Writer<BufWriter<NamedTempFile>>,
    final_path: PathBuf,
}

impl AtomicCsvWriter {
    /// Create a writer targeting `final_path`; its parent directory must exist.
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self> {
        let final_path = final_path.as_ref().to_path_buf();
        let parent_dir = final_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let temp_file = create_temp_file(parent_dir)
            .map_err(|e| ProcessorError::write(&final_path, format!("cannot create temporary file: {e}")))?;

        let writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(BufWriter::new(temp_file));

        Ok(Self { writer, final_path })
    }

    pub fn write_row<I, T>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(row)
            .map_err(|e| ProcessorError::write(&self.final_path, e))
    }

    /// Flush everything and move the file into place, returning its final path.
    pub fn finish(self) -> Result<PathBuf> {
        let final_path = self.final_path;
        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| ProcessorError::write(&final_path, format!("flush failed: {}", e.error())))?;
        let temp_file = buf_writer
            .into_inner()
            .map_err(|e| ProcessorError::write(&final_path, format!("flush failed: {}", e.error())))?;
        temp_file
            .persist(&final_path)
            .map_err(|e| ProcessorError::write(&final_path, e.error))?;
        Ok(final_path)
    }
}

/// `0o666` before the umask, matching `File::create`.
#[cfg(unix)]
fn create_temp_file(dir: &Path) -> io::Result<NamedTempFile> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    tempfile::Builder::new()
        .permissions(Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

#[cfg(not(unix))]
fn create_temp_file(dir: &Path) -> io::Result<NamedTempFile> {
    NamedTempFile::new_in(dir)
}
