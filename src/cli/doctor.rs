//! CLI `doctor` command: inspect the streaks file and print a health report.

use anyhow::{Context, Result};
use chrono::Utc;

use hooter::config::HooterConfig;
use hooter::streak::rollup::stale_sessions;
use hooter::streak::Population;

/// Inspect the streaks file without modifying it.
pub fn doctor(config: &HooterConfig) -> Result<()> {
    let path = config.resolved_streaks_path();

    if !path.exists() {
        println!("Streaks file: not found at {}", path.display());
        println!("Run `hooter serve` to create it.");
        return Ok(());
    }

    let bytes = std::fs::read(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    println!("Hooter Health Report");
    println!("====================");
    println!();
    println!("Streaks file:      {}", path.display());
    println!("File size:         {}", format_bytes(bytes.len() as u64));
    println!("Timezone:          {}", config.streaks.timezone);
    println!("Minimum session:   {} minutes", config.streaks.minimum_minutes);

    let tmp = hooter::streak::store::StreakStore::new(&path).temp_path();
    if tmp.exists() {
        println!("Leftover temp:     {} (an interrupted save, safe to delete)", tmp.display());
    }
    println!();

    let population: Population = match serde_json::from_slice(&bytes) {
        Ok(p) => p,
        Err(e) => {
            println!("Parse check:       FAILED ({e})");
            println!();
            println!("The tracker will treat this file as empty on its next load.");
            println!("Keep a copy before restarting: cp {0} {0}.bak", path.display());
            return Ok(());
        }
    };
    println!("Parse check:       PASSED");
    println!("Users:             {}", population.len());

    let open: Vec<_> = population.iter().filter(|(_, r)| r.is_open()).collect();
    println!("Open sessions:     {}", open.len());

    let inconsistent = population
        .values()
        .filter(|r| r.longest_streak < r.current_streak)
        .count();
    if inconsistent > 0 {
        println!("WARNING: {inconsistent} record(s) with longest < current streak");
    }

    let stale = stale_sessions(&population, Utc::now(), config.streaks.stale_after());
    if !stale.is_empty() {
        println!();
        println!(
            "Stale sessions (open longer than {}h):",
            config.streaks.stale_session_hours
        );
        for (user_id, record) in &stale {
            let since = record
                .join_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            println!("  {:<22} {:<20} since {}", user_id, record.username, since);
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
