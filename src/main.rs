mod shutdown;
mod startup;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use vacation_rescheduler::config::ConfigOverrides;
use vacation_rescheduler::error::other_error;

/// Reschedule Google Calendar meetings for vacation days
#[derive(Parser, Debug)]
#[command(name = "vacation-rescheduler")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Comma-separated list of vacation dates (YYYY-MM-DD)
    vacation_dates: String,
    /// Comma-separated list of acceptable reschedule dates (YYYY-MM-DD)
    acceptable_dates: String,
    /// Time slot start (HH:MM)
    time_slot_start: String,
    /// Time slot end (HH:MM)
    time_slot_end: String,
    /// Only output suggested changes without rescheduling
    #[arg(long)]
    dry_run: bool,
    /// Enable debug logging
    #[arg(long)]
    debug: bool,
    /// Calendar to reschedule (defaults to primary)
    #[arg(long)]
    calendar: Option<String>,
    /// Token file location (defaults to token.json)
    #[arg(long)]
    token_file: Option<PathBuf>,
    /// Minutes between candidate slot starts
    #[arg(long)]
    step_minutes: Option<u32>,
    /// Allow meetings over the lunch break
    #[arg(long)]
    no_lunch: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            calendar_id: self.calendar.clone(),
            token_file: self.token_file.clone(),
            step_minutes: self.step_minutes,
            no_lunch: self.no_lunch,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    startup::init_logging(cli.debug)?;

    info!("Starting vacation rescheduler");

    let request = startup::build_request(
        &cli.vacation_dates,
        &cli.acceptable_dates,
        &cli.time_slot_start,
        &cli.time_slot_end,
        cli.dry_run,
    )?;

    // Load configuration
    let config = startup::load_config(&cli.overrides())?;

    let result = tokio::select! {
        result = startup::run(&config, &request) => result,
        _ = shutdown::wait_for_signal() => Err(other_error("Interrupted").into()),
    };

    // Ephemeral credentials go away even when the run failed
    shutdown::cleanup(&config);

    let report = result?;
    println!("{}", report);
    Ok(())
}
