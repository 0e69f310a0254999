//! Pipeline viability checks for `GET /health`
//!
//! Every snapshot is computed fresh. System metrics come from `sysinfo`; when
//! the platform or environment cannot provide them the snapshot omits them
//! and the verdict is decided on the remaining checks.

use crate::services::separation_engine::SeparationEngine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stemsplit_common::config::ServiceConfig;
use sysinfo::{Disks, System};
use tracing::{debug, warn};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Below this much free space the service reports unhealthy
pub const MIN_FREE_DISK_GB: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Host resource readout; absent fields could not be measured
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_free_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_percent: Option<f64>,
    pub cpu_count: usize,
}

/// Checks specific to the separation pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationChecks {
    pub upload_folder_accessible: bool,
    pub separated_folder_accessible: bool,
    pub demucs_available: bool,
    pub max_file_size_mb: u64,
}

/// Point-in-time health readout
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub system: SystemMetrics,
    pub application: ApplicationChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Builds [`HealthSnapshot`]s for the configured directories and engine
#[derive(Clone)]
pub struct HealthReporter {
    config: Arc<ServiceConfig>,
    engine: Arc<dyn SeparationEngine>,
    started_at: DateTime<Utc>,
}

impl HealthReporter {
    pub fn new(
        config: Arc<ServiceConfig>,
        engine: Arc<dyn SeparationEngine>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            engine,
            started_at,
        }
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        let upload_dir = self.config.upload_dir.clone();
        let output_dir = self.config.output_dir.clone();

        let blocking = tokio::task::spawn_blocking(move || {
            (
                collect_system_metrics(&output_dir),
                is_writable(&upload_dir),
                is_writable(&output_dir),
            )
        })
        .await;

        let (system, upload_ok, output_ok) = match blocking {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "Health metrics task failed");
                (unmeasured_metrics(), false, false)
            }
        };

        let engine_ok = match self.engine.probe(self.config.engine.probe_timeout).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Engine availability probe failed");
                false
            }
        };

        let application = ApplicationChecks {
            upload_folder_accessible: upload_ok,
            separated_folder_accessible: output_ok,
            demucs_available: engine_ok,
            max_file_size_mb: self.config.max_file_size_mb(),
        };

        assemble_snapshot(system, application, self.started_at, Utc::now())
    }
}

/// Combine measured metrics and pipeline checks into a snapshot taken at `now`
///
/// Missing metrics add a note but leave the verdict to the other checks.
pub fn assemble_snapshot(
    system: SystemMetrics,
    application: ApplicationChecks,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> HealthSnapshot {
    let note = match (system.disk_free_gb, system.memory_usage_percent) {
        (Some(_), Some(_)) => None,
        _ => Some("Basic health check (system metrics unavailable)".to_string()),
    };

    HealthSnapshot {
        status: verdict(&system, &application),
        timestamp: now,
        module: "stemsplit-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: now.signed_duration_since(started_at).num_seconds().max(0) as u64,
        system,
        application,
        note,
    }
}

/// Unhealthy on low disk, missing engine, or an unwritable directory
///
/// Unmeasured disk space does not count against the verdict.
pub fn verdict(system: &SystemMetrics, application: &ApplicationChecks) -> HealthStatus {
    let low_disk = system
        .disk_free_gb
        .map(|gb| gb < MIN_FREE_DISK_GB)
        .unwrap_or(false);

    if low_disk
        || !application.demucs_available
        || !application.upload_folder_accessible
        || !application.separated_folder_accessible
    {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Healthy
    }
}

/// Directory exists, is not read-only, and accepts a new file
pub fn is_writable(dir: &Path) -> bool {
    let metadata = match std::fs::metadata(dir) {
        Ok(m) => m,
        Err(_) => return false,
    };
    if !metadata.is_dir() || metadata.permissions().readonly() {
        return false;
    }

    // Probe file is deleted when dropped
    tempfile::Builder::new()
        .prefix(".stemsplit-health-")
        .tempfile_in(dir)
        .is_ok()
}

fn unmeasured_metrics() -> SystemMetrics {
    SystemMetrics {
        disk_free_gb: None,
        memory_usage_percent: None,
        cpu_count: cpu_count(),
    }
}

fn collect_system_metrics(data_dir: &Path) -> SystemMetrics {
    if !sysinfo::IS_SUPPORTED_SYSTEM {
        return unmeasured_metrics();
    }

    let disk_free_gb = disk_free_bytes(data_dir).map(|bytes| round_to(bytes as f64 / BYTES_PER_GIB, 2));

    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    let memory_usage_percent = if total == 0 {
        None
    } else {
        Some(round_to(sys.used_memory() as f64 / total as f64 * 100.0, 1))
    };

    SystemMetrics {
        disk_free_gb,
        memory_usage_percent,
        cpu_count: cpu_count(),
    }
}

/// Free space on the disk with the longest mount point containing `path`
fn disk_free_bytes(path: &Path) -> Option<u64> {
    let target: PathBuf = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();

    disks
        .list()
        .iter()
        .filter(|disk| target.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn checks(upload: bool, output: bool, engine: bool) -> ApplicationChecks {
        ApplicationChecks {
            upload_folder_accessible: upload,
            separated_folder_accessible: output,
            demucs_available: engine,
            max_file_size_mb: 100,
        }
    }

    fn metrics(disk: Option<f64>) -> SystemMetrics {
        SystemMetrics {
            disk_free_gb: disk,
            memory_usage_percent: Some(40.0),
            cpu_count: 4,
        }
    }

    #[test]
    fn all_checks_passing_is_healthy() {
        assert_eq!(verdict(&metrics(Some(20.0)), &checks(true, true, true)), HealthStatus::Healthy);
    }

    #[test]
    fn any_failing_check_is_unhealthy() {
        assert_eq!(verdict(&metrics(Some(0.5)), &checks(true, true, true)), HealthStatus::Unhealthy);
        assert_eq!(verdict(&metrics(Some(20.0)), &checks(false, true, true)), HealthStatus::Unhealthy);
        assert_eq!(verdict(&metrics(Some(20.0)), &checks(true, false, true)), HealthStatus::Unhealthy);
        assert_eq!(verdict(&metrics(Some(20.0)), &checks(true, true, false)), HealthStatus::Unhealthy);
    }

    #[test]
    fn unmeasured_disk_does_not_fail_verdict() {
        assert_eq!(verdict(&metrics(None), &checks(true, true, true)), HealthStatus::Healthy);
    }

    #[test]
    fn unmeasured_metrics_give_reduced_healthy_snapshot() {
        let started = Utc::now();
        let now = started + chrono::Duration::seconds(90);

        let snapshot = assemble_snapshot(unmeasured_metrics(), checks(true, true, true), started, now);

        assert!(snapshot.is_healthy());
        assert_eq!(snapshot.uptime_seconds, 90);
        assert!(snapshot.note.is_some());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["system"].get("disk_free_gb").is_none());
        assert!(json["system"].get("memory_usage_percent").is_none());
        assert!(json["system"]["cpu_count"].as_u64().unwrap() >= 1);
        assert!(json["note"].is_string());
    }

    #[test]
    fn measured_metrics_carry_no_note() {
        let started = Utc::now();
        let snapshot = assemble_snapshot(metrics(Some(20.0)), checks(true, true, true), started, started);

        assert!(snapshot.note.is_none());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("note").is_none());
        assert_eq!(json["system"]["disk_free_gb"], 20.0);
    }

    #[test]
    fn missing_directory_is_not_writable() {
        let dir = TempDir::new().unwrap();
        assert!(is_writable(dir.path()));
        assert!(!is_writable(&dir.path().join("absent")));
    }

    #[test]
    fn writability_probe_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        assert!(is_writable(dir.path()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(99.96, 1), 100.0);
    }
}
