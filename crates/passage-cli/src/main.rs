use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use passage_api::{ApiClient, UserDetails};
use passage_core::IdentityId;
use passage_pipeline::toggle::{format_duration, next_action};
use passage_pipeline::{AttendanceAction, AttendanceRecord};

#[derive(Parser)]
#[command(name = "passage", about = "Attendance gate operator CLI")]
struct Cli {
    /// Base URL of the attendance backend
    #[arg(long, env = "PASSAGE_API_BASE_URL", default_value = "http://127.0.0.1:8000")]
    api_base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record attendance with an 8-digit entry code
    Code {
        /// The entry code
        code: String,
    },
    /// Show the latest attendance record for a user
    Status {
        /// Backend user id
        user_id: i64,
    },
    /// Summarize enrollment photos per user
    Gallery,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.api_base_url)?;

    match cli.command {
        Commands::Code { code } => run_code(&client, &code),
        Commands::Status { user_id } => run_status(&client, user_id),
        Commands::Gallery => run_gallery(&client),
    }
}

fn run_code(client: &ApiClient, code: &str) -> Result<()> {
    if code.len() != 8 || !code.bytes().all(|b| b.is_ascii_digit()) {
        bail!("entry code must be exactly 8 digits");
    }

    let user = client
        .user_by_code(code)
        .context("looking up entry code")?
        .context("this code is not associated with any user")?;

    let action = toggle_attendance(client, &user)?;
    println!("{action}: {}", Local::now().format("%d.%m.%Y"));
    println!("User: {}", user.full_name());
    Ok(())
}

fn run_status(client: &ApiClient, user_id: i64) -> Result<()> {
    let user = client.user(user_id).context("fetching user")?;
    let rows = client
        .attendance_for(user_id)
        .context("fetching attendance")?;

    match rows.last() {
        None => println!("{}: no attendance records", user.full_name()),
        Some(row) => match row.check_out {
            None => println!(
                "{}: checked in since {}",
                user.full_name(),
                row.check_in.with_timezone(&Local).format("%d.%m.%Y %H:%M")
            ),
            Some(out) => println!(
                "{}: last visit {} ({})",
                user.full_name(),
                row.check_in.with_timezone(&Local).format("%d.%m.%Y"),
                format_duration(row.check_in, out)
            ),
        },
    }
    Ok(())
}

fn run_gallery(client: &ApiClient) -> Result<()> {
    let photos = client.user_photos().context("fetching photos")?;
    let mut counts = std::collections::BTreeMap::new();
    for photo in &photos {
        *counts.entry(photo.user_id).or_insert(0u32) += 1;
    }
    println!("{} enrollment photos across {} users", photos.len(), counts.len());
    for (user_id, count) in counts {
        println!("  user {user_id}: {count} photo(s)");
    }
    Ok(())
}

/// Apply the next attendance transition for a user, mirroring what the
/// gate does for a recognized face.
fn toggle_attendance(client: &ApiClient, user: &UserDetails) -> Result<AttendanceAction> {
    let rows = client
        .attendance_for(user.user_id)
        .context("fetching attendance")?;
    let latest = rows.last().map(|row| AttendanceRecord {
        id: row.attendance_id.to_string(),
        identity: IdentityId::new(user.user_id.to_string()),
        check_in: row.check_in,
        check_out: row.check_out,
    });

    let now = Utc::now();
    let action = next_action(latest.as_ref());
    match action {
        AttendanceAction::CheckIn => {
            client
                .create_check_in(user.user_id, now)
                .context("recording check-in")?;
        }
        AttendanceAction::CheckOut => {
            let record = latest.as_ref().context("no open record to close")?;
            let duration = format_duration(record.check_in, now);
            let attendance_id: i64 = record.id.parse().context("parsing attendance id")?;
            client
                .patch_check_out(attendance_id, now, &duration)
                .context("recording check-out")?;
        }
    }
    Ok(action)
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_code_shape_validation() {
        let valid = |code: &str| code.len() == 8 && code.bytes().all(|b| b.is_ascii_digit());
        assert!(valid("12345678"));
        assert!(!valid("1234567"));
        assert!(!valid("123456789"));
        assert!(!valid("1234567a"));
        assert!(!valid(""));
    }
}
