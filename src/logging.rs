use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::PathBuf,
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, Result};
use log::{LevelFilter, Log, Metadata, Record};
use serde_json::json;

use crate::env_utils::{parse_env_path, LOG_JSON_PATH_VAR};

/// Human-readable records on stderr, mirrored as JSON lines into an optional
/// file.
pub struct Logger {
    level: LevelFilter,
    json_file: Option<Mutex<File>>,
}

impl Logger {
    pub fn from_env(level: LevelFilter) -> Result<Self> {
        Self::new(level, parse_env_path(LOG_JSON_PATH_VAR)?)
    }

    pub fn new(level: LevelFilter, path: Option<PathBuf>) -> Result<Self> {
        let json_file = match path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Mutex::new(file))
            }
            None => None,
        };
        Ok(Self { level, json_file })
    }

    pub fn install(self) -> Result<()> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))
            .map_err(|err| anyhow!("logger already installed: {err}"))?;
        log::set_max_level(level);
        Ok(())
    }

    fn event(&self, level: &str, target: &str, message: &str) {
        let Some(file) = &self.json_file else {
            return;
        };
        let Ok(mut file) = file.lock() else {
            return;
        };

        let ts_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let entry = json!({
            "ts_ms": ts_ms,
            "level": level,
            "target": target,
            "msg": message,
        });

        let _ = writeln!(file, "{}", entry);
        let _ = file.flush();
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        let level = record.level().as_str().to_ascii_lowercase();
        eprintln!("[{}] {}: {}", level, record.target(), message);
        self.event(&level, record.target(), &message);
    }

    fn flush(&self) {
        if let Some(file) = &self.json_file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use log::Level;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn records_are_appended_as_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("fatsh.jsonl");
        let logger = Logger::new(LevelFilter::Debug, Some(path.clone())).unwrap();

        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("fat32::file")
                .args(format_args!("short read at cluster {}", 9))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Trace)
                .target("fat32::fat")
                .args(format_args!("filtered"))
                .build(),
        );

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["level"], "warn");
        assert_eq!(value["target"], "fat32::file");
        assert_eq!(value["msg"], "short read at cluster 9");
    }
}
