//! CLI `show` command: one user's streak, read-only.

use anyhow::Result;

use hooter::config::HooterConfig;

/// Print the streak record for `user_id`.
pub fn show(config: &HooterConfig, user_id: &str) -> Result<()> {
    let store = super::open_store(config);

    let Some(record) = store.load_read_only()?.swap_remove(user_id) else {
        println!("{user_id} hasn't started a streak yet.");
        return Ok(());
    };

    println!("{}'s streaks:", record.username);
    println!("  Current streak:  {} days", record.current_streak);
    println!("  Longest streak:  {} days", record.longest_streak);
    match record.last_join_date {
        Some(date) => println!("  Last credited:   {date}"),
        None => println!("  Last credited:   never"),
    }
    if let Some(joined) = record.join_time {
        let tz = config.streaks.tz()?;
        println!("  In session since {}", joined.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z"));
    }

    Ok(())
}
