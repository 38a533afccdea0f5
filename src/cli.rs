use clap::{Args, Parser, Subcommand, ValueEnum};
use safehaven::config::{
    AppConfig, CredentialsSource, DEFAULT_CORS_ORIGINS, DEFAULT_PORT, Environment, PlacesConfig,
    SheetsConfig, StorageConfig,
};
use safehaven::store::sheets::{DEFAULT_API_BASE, DEFAULT_TOKEN_URL};
use safehaven::types::records::AlertLevel;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3001";

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(AppConfig),
    Watch(WatchArgs),
    SetAlert(SetAlertArgs),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Watch(args)) => return RunOutcome::Watch(args),
        Some(Command::SetAlert(args)) => return RunOutcome::SetAlert(args),
        None => {}
    }

    match resolve_config(&cli.server) {
        Ok(config) => RunOutcome::Serve(config),
        Err(err) => {
            eprintln!("error: {err}");
            RunOutcome::Exit(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "safehaven",
    version,
    about = "Disaster alert backend: user alert flags, SOS events and safe places"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    server: ServerArgs,
}

#[derive(Args, Debug)]
struct ServerArgs {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    bind: IpAddr,
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Comma-separated list; `*` allows any origin.
    #[arg(long, env = "CORS_ORIGIN")]
    cors_origin: Option<String>,
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    environment: Environment,
    #[arg(long, env = "STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::Memory)]
    storage: StorageBackend,
    #[arg(long, env = "GOOGLE_SHEET_ID")]
    sheet_id: Option<String>,
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_EMAIL")]
    service_account_email: Option<String>,
    #[arg(long, env = "GOOGLE_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
    #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
    credentials_file: Option<PathBuf>,
    #[arg(long, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true)]
    places_api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StorageBackend {
    Memory,
    Sheets,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll one phone's alert status and log every red alert.
    Watch(WatchArgs),
    /// Set one phone's alert status (operator write).
    SetAlert(SetAlertArgs),
}

#[derive(Args, Debug)]
pub(crate) struct WatchArgs {
    #[arg(long, env = "SAFEHAVEN_API_URL", default_value = DEFAULT_API_URL)]
    pub(crate) api_url: String,
    #[arg(long)]
    pub(crate) phone: String,
    /// `<number>[s|m|h]`, seconds when the unit is omitted.
    #[arg(long, default_value = "30s", value_parser = parse_interval)]
    pub(crate) interval: Duration,
}

#[derive(Args, Debug)]
pub(crate) struct SetAlertArgs {
    #[arg(long, env = "SAFEHAVEN_API_URL", default_value = DEFAULT_API_URL)]
    pub(crate) api_url: String,
    #[arg(long)]
    pub(crate) phone: String,
    #[arg(long)]
    pub(crate) status: AlertLevel,
}

fn resolve_config(args: &ServerArgs) -> Result<AppConfig, String> {
    Ok(AppConfig {
        bind: args.bind,
        port: args.port,
        cors_origins: resolve_cors_origins(args.cors_origin.as_deref())?,
        environment: args.environment,
        storage: resolve_storage(args)?,
        places: PlacesConfig {
            api_key: non_empty(args.places_api_key.as_deref()),
            ..PlacesConfig::default()
        },
    })
}

fn resolve_cors_origins(raw: Option<&str>) -> Result<Vec<String>, String> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_CORS_ORIGINS.iter().map(|origin| origin.to_string()).collect());
    };
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() {
        return Err("CORS origin list cannot be empty".to_string());
    }
    Ok(origins)
}

fn resolve_storage(args: &ServerArgs) -> Result<StorageConfig, String> {
    if args.storage == StorageBackend::Memory {
        return Ok(StorageConfig::Memory);
    }

    let sheet_id = non_empty(args.sheet_id.as_deref())
        .ok_or("the sheets backend requires --sheet-id (GOOGLE_SHEET_ID)")?;
    let email = non_empty(args.service_account_email.as_deref());
    let key = non_empty(args.private_key.as_deref());
    let credentials = match (email, key, args.credentials_file.as_ref()) {
        (Some(client_email), Some(private_key), _) => CredentialsSource::Inline {
            client_email,
            private_key,
        },
        (None, None, Some(path)) => CredentialsSource::File(path.clone()),
        (None, None, None) => CredentialsSource::Missing,
        _ => {
            return Err(
                "--service-account-email and --private-key must be given together".to_string(),
            );
        }
    };

    Ok(StorageConfig::Sheets(SheetsConfig {
        sheet_id,
        credentials,
        api_base: DEFAULT_API_BASE.to_string(),
        token_url: DEFAULT_TOKEN_URL.to_string(),
    }))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_interval(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("interval cannot be empty".to_string());
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid interval '{value}'; expected <number>[s|m|h]"))?;

    if amount == 0 {
        return Err("interval must be greater than 0".to_string());
    }

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        _ => return Err(format!("invalid interval '{value}'; expected <number>[s|m|h]")),
    };

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("interval '{value}' is too large"))
}
