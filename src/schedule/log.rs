use crate::schedule::IntersectionSchedule;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Configuration for the CSV schedule log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleLogConfig {
    /// Write every published schedule to CSV
    #[serde(default)]
    pub enabled: bool,

    /// Directory holding the log files
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// File name prefix; the UTC date and `.csv` are appended
    #[serde(default = "default_filename")]
    pub filename: String,
}

fn default_path() -> PathBuf {
    PathBuf::from("/var/log/allstop")
}

fn default_filename() -> String {
    "scheduling_service".to_string()
}

impl Default for ScheduleLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_path(),
            filename: default_filename(),
        }
    }
}

/// Append-only CSV log of published schedules, one file per UTC day
pub struct ScheduleLogger {
    config: ScheduleLogConfig,
    current: Option<(NaiveDate, BufWriter<File>)>,
}

impl ScheduleLogger {
    /// Create the log directory; files are opened lazily on first write
    pub fn open(config: ScheduleLogConfig) -> Result<Self> {
        fs::create_dir_all(&config.path).with_context(|| {
            format!("Failed to create schedule log directory '{}'", config.path.display())
        })?;

        info!(
            directory = %config.path.display(),
            filename = %config.filename,
            "Schedule CSV logging enabled"
        );

        Ok(Self {
            config,
            current: None,
        })
    }

    /// Format: {filename}_{YYYY-MM-DD}.csv
    pub fn file_path(&self, date: NaiveDate) -> PathBuf {
        self.config
            .path
            .join(format!("{}_{}.csv", self.config.filename, date.format("%Y-%m-%d")))
    }

    /// Append one line per schedule entry, rotating on the UTC day boundary
    pub fn log(&mut self, schedule: &IntersectionSchedule) -> Result<()> {
        if schedule.is_empty() {
            return Ok(());
        }

        let date = DateTime::from_timestamp_millis(schedule.timestamp)
            .unwrap_or_else(Utc::now)
            .date_naive();

        let needs_rotation = !matches!(&self.current, Some((open_date, _)) if *open_date == date);
        if needs_rotation {
            self.rotate(date)?;
        }

        if let Some((_, writer)) = self.current.as_mut() {
            for line in schedule.to_csv_lines() {
                writeln!(writer, "{}", line).context("Failed to write schedule log line")?;
            }
            writer.flush().context("Failed to flush schedule log")?;
        }

        Ok(())
    }

    fn rotate(&mut self, date: NaiveDate) -> Result<()> {
        if let Some((_, mut writer)) = self.current.take() {
            writer.flush().context("Failed to flush schedule log before rotation")?;
        }

        let path = self.file_path(date);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open schedule log '{}'", path.display()))?;

        info!(path = %path.display(), "Opened schedule log file");
        self.current = Some((date, BufWriter::new(file)));
        Ok(())
    }
}
