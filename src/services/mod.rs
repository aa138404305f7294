//! Service layer: analysis orchestration, artifact storage and report export

mod detection;
mod report;
mod storage;

pub use detection::DetectionService;
pub use report::generate_report;
pub use storage::{
    cleanup_by_age, cleanup_by_count, save_png, spawn_retention_task, storage_stats, StorageStats,
};
