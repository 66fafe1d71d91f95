use crate::models::{TaskSnapshot, TaskStatus, TransferProgress};
use crate::utils::format::format_file_size;

pub const MSG_REQUESTING_CREDENTIAL: &str = "获取上传凭证...";
pub const MSG_INITIALIZING_TRANSFER: &str = "初始化上传...";
pub const MSG_TRANSFERRING: &str = "上传中...";
pub const MSG_TRANSFERRED: &str = "上传成功";
pub const MSG_RECORDING: &str = "保存文件信息...";
pub const MSG_SUCCEEDED: &str = "完成";
pub const MSG_FAILED_PREFIX: &str = "失败: ";

/// Network step a slice of the progress bar is reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Credential,
    Transfer,
    Record,
}

/// Inclusive percent range one step occupies on a task's bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBand {
    pub start: u8,
    pub end: u8,
}

impl ProgressBand {
    pub const fn midpoint(self) -> u8 {
        self.start + (self.end - self.start) / 2
    }

    /// Maps a byte count onto the band, rounding to the nearest percent.
    /// An empty payload counts as fully transferred.
    pub fn scale(self, progress: TransferProgress) -> u8 {
        if progress.total == 0 {
            return self.end;
        }
        let span = (self.end - self.start) as u128;
        let loaded = progress.loaded.min(progress.total) as u128;
        let total = progress.total as u128;
        let offset = (loaded * span * 2 + total) / (total * 2);
        self.start + offset as u8
    }
}

pub const PROGRESS_BANDS: [(Step, ProgressBand); 3] = [
    (Step::Credential, ProgressBand { start: 0, end: 10 }),
    (Step::Transfer, ProgressBand { start: 10, end: 90 }),
    (Step::Record, ProgressBand { start: 90, end: 100 }),
];

pub const fn band(step: Step) -> ProgressBand {
    match step {
        Step::Credential => PROGRESS_BANDS[0].1,
        Step::Transfer => PROGRESS_BANDS[1].1,
        Step::Record => PROGRESS_BANDS[2].1,
    }
}

/// Receives the per-task progress rows. Implementations only render; the
/// orchestrator is the sole writer of task state.
pub trait ProgressSink: Send + Sync {
    /// A batch is starting; one row per task, all at 0%.
    fn show_panel(&self, tasks: &[TaskSnapshot]);

    fn update(&self, task: &TaskSnapshot);

    fn hide_panel(&self);

    /// The session expired mid-batch; the client is being sent to `login_url`.
    fn session_expired(&self, _login_url: &str) {}
}

/// Sink that renders progress rows as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn show_panel(&self, tasks: &[TaskSnapshot]) {
        tracing::info!("📦 Uploading {} file(s)", tasks.len());
        for task in tasks {
            tracing::info!("   • {} ({})", task.file_name, format_file_size(task.file_size));
        }
    }

    fn update(&self, task: &TaskSnapshot) {
        match task.status {
            TaskStatus::Failed => tracing::error!(
                "❌ {} [{}%] {}",
                task.file_name,
                task.progress_percent,
                task.status_message
            ),
            TaskStatus::Succeeded => tracing::info!(
                "✅ {} [{}%] {}",
                task.file_name,
                task.progress_percent,
                task.status_message
            ),
            _ => tracing::info!(
                "⏳ {} [{}%] {}",
                task.file_name,
                task.progress_percent,
                task.status_message
            ),
        }
    }

    fn hide_panel(&self) {
        tracing::debug!("Progress panel hidden");
    }

    fn session_expired(&self, login_url: &str) {
        tracing::warn!("🔒 Session expired, please log in again at {}", login_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_cover_the_bar_contiguously() {
        assert_eq!(PROGRESS_BANDS[0].1.start, 0);
        for pair in PROGRESS_BANDS.windows(2) {
            assert_eq!(pair[0].1.end, pair[1].1.start);
        }
        assert_eq!(PROGRESS_BANDS[2].1.end, 100);
    }

    #[test]
    fn test_checkpoints() {
        assert_eq!(band(Step::Credential).start, 0);
        assert_eq!(band(Step::Credential).midpoint(), 5);
        assert_eq!(band(Step::Transfer).start, 10);
        assert_eq!(band(Step::Record).midpoint(), 95);
        assert_eq!(band(Step::Record).end, 100);
    }

    #[test]
    fn test_transfer_scaling_rounds_like_the_progress_bar() {
        let transfer = band(Step::Transfer);
        let at = |loaded, total| transfer.scale(TransferProgress { loaded, total });
        assert_eq!(at(0, 100), 10);
        assert_eq!(at(40, 100), 42);
        assert_eq!(at(1, 160), 11); // 0.5 rounds up
        assert_eq!(at(100, 100), 90);
        assert_eq!(at(200, 100), 90);
        assert_eq!(at(0, 0), 90);
    }

    #[test]
    fn test_scaling_handles_large_payloads() {
        let transfer = band(Step::Transfer);
        let total = u64::MAX;
        assert_eq!(transfer.scale(TransferProgress { loaded: total / 2, total }), 50);
    }
}
