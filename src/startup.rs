use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vacation_rescheduler::components::google_calendar::time::{parse_date_list, parse_time_of_day};
use vacation_rescheduler::components::google_calendar::{GoogleCalendarClient, TokenManager};
use vacation_rescheduler::components::rescheduler::{
    reschedule, PlannerSettings, RescheduleReport, RescheduleRequest, TimeWindow,
};
use vacation_rescheduler::config::{Config, ConfigOverrides};
use vacation_rescheduler::error::{other_error, RescheduleResult};

/// Initialize logging with environment-based configuration
pub fn init_logging(debug: bool) -> miette::Result<()> {
    let default_filter = if debug {
        "debug,reqwest=warn,hyper=warn,hyper_util=warn"
    } else {
        "info,reqwest=warn,hyper=warn"
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| other_error(&format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config(overrides: &ConfigOverrides) -> miette::Result<Config> {
    match Config::load(overrides) {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Parse the positional arguments into a request
pub fn build_request(
    vacation_dates: &str,
    acceptable_dates: &str,
    time_slot_start: &str,
    time_slot_end: &str,
    dry_run: bool,
) -> RescheduleResult<RescheduleRequest> {
    let vacation_dates = parse_date_list(vacation_dates, "vacation")?;
    let acceptable_dates = parse_date_list(acceptable_dates, "acceptable")?;
    let window = TimeWindow::new(
        parse_time_of_day(time_slot_start)?,
        parse_time_of_day(time_slot_end)?,
    )?;

    Ok(RescheduleRequest {
        vacation_dates,
        acceptable_dates,
        window,
        dry_run,
    })
}

/// Authenticate and run the planner against Google Calendar
pub async fn run(config: &Config, request: &RescheduleRequest) -> miette::Result<RescheduleReport> {
    if config.scout.is_configured() {
        info!(
            "Scout API configured at {}",
            config.scout.api_url.as_deref().unwrap_or_default()
        );
    } else {
        debug!("SCOUT_API_URL or SCOUT_API_ACCESS_TOKEN not set");
    }

    let client = reqwest::Client::new();
    let token_manager = TokenManager::new(config, client.clone());

    if let Some(token_json) = &config.google_token_json {
        token_manager.seed(token_json)?;
    }

    let access_token = token_manager.get_access_token().await?;
    let api = GoogleCalendarClient::new(client, access_token)?;

    if request.dry_run {
        info!("Dry run, no meetings will be changed");
    }

    let report = reschedule(&api, PlannerSettings::from(config), request).await?;
    Ok(report)
}
