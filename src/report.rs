//! Per-file result records and the lines printed for them.

use serde::Serialize;
use std::time::Duration;

use crate::engine::Digests;
use crate::pipeline::{FileTask, TaskStatus};

const MIB: f64 = 1024.0 * 1024.0;

/// What the reporting layer receives for one input.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: String,
    pub status: TaskStatus,
    /// Size known before digesting.
    pub size: u64,
    /// Bytes digested for this input alone.
    pub processed: u64,
    pub elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digests: Option<Digests>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    pub fn from_task(task: &FileTask) -> Self {
        Self {
            path: task.display.clone(),
            status: task.status,
            size: task.size,
            processed: task.processed,
            elapsed_ms: task.elapsed.as_millis(),
            digests: task.digests.clone(),
            renamed_to: None,
            error: None,
        }
    }

    pub fn with_error(mut self, err: impl ToString) -> Self {
        self.status = TaskStatus::Failed;
        self.error = Some(err.to_string());
        self
    }
}

/// `<digest> <digest> ...  <path>` in canonical algorithm order.
pub fn text_line(result: &FileResult, uppercase: bool) -> String {
    let mut fields: Vec<String> = Vec::new();
    if let Some(digests) = &result.digests {
        for d in digests.iter() {
            fields.push(if uppercase {
                hex::encode_upper(&d.bytes)
            } else {
                hex::encode(&d.bytes)
            });
        }
    }
    format!("{}  {}", fields.join(" "), result.path)
}

fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / MIB / secs
    } else {
        0.0
    }
}

/// Speed line printed after a file with `--speed`.
pub fn speed_line(path: &str, bytes: u64, elapsed: Duration) -> String {
    format!(
        "{path} {:.3} MiB calculated in {:.3} sec, {:.3} MBps",
        bytes as f64 / MIB,
        elapsed.as_secs_f64(),
        mbps(bytes, elapsed)
    )
}

/// Summary printed at the end of a run with `--speed`.
pub fn summary_line(files: u64, bytes: u64, elapsed: Duration) -> String {
    format!(
        "Total {files} files, {:.3} MiB calculated in {:.3} sec, {:.3} MBps",
        bytes as f64 / MIB,
        elapsed.as_secs_f64(),
        mbps(bytes, elapsed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::AlgorithmId;
    use crate::engine::DigestValue;

    fn result() -> FileResult {
        FileResult {
            path: "a.txt".into(),
            status: TaskStatus::Ok,
            size: 3,
            processed: 3,
            elapsed_ms: 0,
            digests: Some(Digests(vec![
                DigestValue {
                    algorithm: AlgorithmId::Crc32,
                    bytes: vec![0x35, 0x24, 0x41, 0xc2],
                },
                DigestValue {
                    algorithm: AlgorithmId::Md5,
                    bytes: vec![0xab; 16],
                },
            ])),
            renamed_to: None,
            error: None,
        }
    }

    #[test]
    fn text_line_orders_digests_then_path() {
        let line = text_line(&result(), true);
        assert_eq!(line, format!("352441C2 {}  a.txt", "AB".repeat(16)));
    }

    #[test]
    fn json_record_shape() {
        let v = serde_json::to_value(result()).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["digests"][0]["algorithm"], "crc32");
        assert_eq!(v["digests"][0]["bytes"], "352441c2");
        assert!(v.get("error").is_none());
    }

    #[test]
    fn speed_of_zero_time_is_zero() {
        assert!(speed_line("x", 10, Duration::ZERO).ends_with("0.000 MBps"));
    }
}
