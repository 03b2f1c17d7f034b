pub mod doctor;
pub mod show;
pub mod summary;

use hooter::config::HooterConfig;
use hooter::streak::store::StreakStore;

/// Open the configured streaks file for a one-shot command.
fn open_store(config: &HooterConfig) -> StreakStore {
    StreakStore::new(config.resolved_streaks_path())
}
