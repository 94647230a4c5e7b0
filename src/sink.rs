use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::session::Reading;

pub const HEADER: &str = "time_s,value";

/// A row-oriented destination for readings. Sinks only ever see readings -
/// they must not assume anything about the transport that produced them.
pub trait Sink {
    fn write_reading(&mut self, reading: &Reading) -> std::io::Result<()>;

    fn flush(&mut self) -> std::io::Result<()>;

    /// Called exactly once when the session ends, on every exit path.
    fn finish(&mut self) -> std::io::Result<()> {
        self.flush()
    }
}

/// Writes readings as `time_s,value` rows. The header goes out with the
/// first row (or on finish, for a session without any rows). Output is
/// flushed every `flush_every` rows and unconditionally on finish.
pub struct CsvSink<W: Write> {
    writer: W,
    flush_every: usize,
    rows: usize,
    rows_since_flush: usize,
    header_written: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, flush_every: usize) -> CsvSink<W> {
        CsvSink {
            writer,
            flush_every: flush_every.max(1),
            rows: 0,
            rows_since_flush: 0,
            header_written: false,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header_once(&mut self) -> std::io::Result<()> {
        if !self.header_written {
            writeln!(self.writer, "{HEADER}")?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write> Sink for CsvSink<W> {
    fn write_reading(&mut self, reading: &Reading) -> std::io::Result<()> {
        self.write_header_once()?;
        // Debug formatting keeps the decimal point on integral values
        // ("12.0", not "12"), which spreadsheet imports prefer.
        writeln!(
            self.writer,
            "{:.6},{:?}",
            reading.elapsed_seconds, reading.value
        )?;
        self.rows += 1;
        self.rows_since_flush += 1;
        if self.rows_since_flush >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.rows_since_flush = 0;
        self.writer.flush()
    }

    fn finish(&mut self) -> std::io::Result<()> {
        self.write_header_once()?;
        self.flush()
    }
}

/// A CSV sink backed by a file on disk.
pub struct CsvFileSink {
    path: PathBuf,
    csv: CsvSink<BufWriter<File>>,
}

impl CsvFileSink {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: &Path, flush_every: usize) -> std::io::Result<CsvFileSink> {
        let file = File::create(path)?;
        Ok(CsvFileSink::from_file(path.to_path_buf(), file, flush_every))
    }

    /// Wraps a file that was already opened, e.g. one reserved by
    /// `naming::reserve_output_file`.
    pub fn from_file(path: PathBuf, file: File, flush_every: usize) -> CsvFileSink {
        CsvFileSink {
            path,
            csv: CsvSink::new(BufWriter::new(file), flush_every),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.csv.rows()
    }

    /// Closes and deletes the file, returning its path.
    pub fn discard(self) -> std::io::Result<PathBuf> {
        let CsvFileSink { path, csv } = self;
        drop(csv);
        std::fs::remove_file(&path)?;
        Ok(path)
    }
}

impl Sink for CsvFileSink {
    fn write_reading(&mut self, reading: &Reading) -> std::io::Result<()> {
        self.csv.write_reading(reading)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.csv.flush()
    }

    fn finish(&mut self) -> std::io::Result<()> {
        self.csv.finish()
    }
}
