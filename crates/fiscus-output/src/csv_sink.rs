//! CSV sink for long-form record sets.
//!
//! Loads are all-or-nothing: the frame is written to a temporary sibling
//! file and renamed over the destination, so a failed invocation never
//! leaves a partial CSV behind. Parent directories are created on demand.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use fiscus_core::error::FiscusResult;
use fiscus_core::frame::Frame;
use fiscus_core::traits::RecordSink;

/// Writes one record set to a destination path.
pub struct CsvRecordSink {
    destination: PathBuf,
}

impl CsvRecordSink {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.destination.with_file_name(name)
    }

    fn write_to(&self, path: &Path, frame: &Frame) -> FiscusResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(frame.columns())?;
        for row in frame.rows() {
            writer.write_record(row.iter().map(|cell| cell.render()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl RecordSink for CsvRecordSink {
    fn write_frame(&mut self, frame: &Frame) -> FiscusResult<()> {
        if let Some(parent) = self.destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        if let Err(err) = self.write_to(&temp, frame) {
            let _ = fs::remove_file(&temp);
            return Err(err);
        }
        fs::rename(&temp, &self.destination)?;
        info!(path = ?self.destination, rows = frame.nrows(), "saved record set");
        Ok(())
    }

    fn finish(self: Box<Self>) -> FiscusResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscus_core::frame::CellValue;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn frame() -> Frame {
        Frame::with_rows(
            vec!["name".into(), "kind".into(), "amount".into()],
            vec![
                vec!["wage".into(), "total".into(), dec!(1234.5).into()],
                vec!["sales".into(), "total".into(), CellValue::Missing],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("2021-03-tax.csv");
        let mut sink = CsvRecordSink::new(&path);
        sink.write_frame(&frame()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "name,kind,amount");
        assert_eq!(lines[1], "wage,total,1234.5");
        assert_eq!(lines[2], "sales,total,");
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collections/monthly/city/2021-03.csv");
        let mut sink = CsvRecordSink::new(&path);
        sink.write_frame(&frame()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_overwrite_is_atomic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "old").unwrap();

        let mut sink = CsvRecordSink::new(&path);
        sink.write_frame(&frame()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("name,kind,amount"));
        assert!(!dir.path().join("out.csv.tmp").exists());
    }
}
