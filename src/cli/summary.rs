use anyhow::Result;

use hooter::config::HooterConfig;
use hooter::streak::rollup::format_summary;

/// Print the daily summary for the current streaks file.
pub fn summary(config: &HooterConfig) -> Result<()> {
    let population = super::open_store(config).load_read_only()?;
    print!("{}", format_summary(&population));
    Ok(())
}
