//! civicdesk - command-line access to the municipal back-office session.
//!
//! Signs in against the backend, keeps the session between runs, switches
//! the active organization and checks navigation against the auth guard.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use civicdesk_core::config::Config;
use civicdesk_core::storage::{SharedStorage, Storage};
use civicdesk_core::{ApiClient, AuthGuard, Decision, Navigator, SessionContext};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Session = SessionContext<ApiClient, SharedStorage>;

const ENV_EMAIL: &str = "CIVICDESK_EMAIL";
const ENV_PASSWORD: &str = "CIVICDESK_PASSWORD";

/// Log file prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "civicdesk.log";

const USAGE: &str = "\
Usage: civicdesk <command> [args]

Commands:
  login [email]     Sign in and keep the session
  logout            Clear token, profile and organization
  whoami            Show the signed-in user
  status            Show token expiry and active organization
  orgs              List organizations visible to you
  org <id>          Switch the active organization
  endpoint          Print the active organization's data endpoint
  open <path>       Check whether navigating to <path> is allowed
";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Prints the outcome of a guarded navigation
struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn proceed(&mut self, path: &str) {
        println!("allowed: {}", path);
    }

    fn redirect(&mut self, path: &str) {
        println!("denied: redirect to {}", path);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({:#}), using defaults", e);
            let mut c = Config::default();
            c.apply_env();
            c
        }
    };

    let _log_guard = init_tracing(config.log_dir.as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprint!("{}", USAGE);
        return Ok(ExitCode::SUCCESS);
    };

    let api = ApiClient::with_timeout(config.base_url.clone(), config.request_timeout())
        .context("Failed to build HTTP client")?;
    let storage = config.open_storage()?;
    let mut session = SessionContext::create(api, storage)
        .with_profile_timeout(config.profile_timeout());

    let mut exit_code = ExitCode::SUCCESS;

    match command {
        "login" => login(&mut session, &config, args.get(1).cloned()).await?,
        "logout" => {
            session.logout();
            println!("Signed out.");
        }
        "whoami" => {
            session.initialize().await;
            match session.user() {
                Some(user) => println!("{}", user.display()),
                None => println!("Not signed in."),
            }
        }
        "status" => status(&mut session).await,
        "orgs" => {
            session.initialize().await;
            let orgs = session.organizations().await?;
            let active = session.organization().map(|o| o.id.clone());
            for org in orgs {
                let marker = if active.as_deref() == Some(org.id.as_str()) { "*" } else { " " };
                println!("{} {:>6}  {}", marker, org.id, org.name);
            }
        }
        "org" => {
            let Some(id) = args.get(1) else {
                bail!("Usage: civicdesk org <id>");
            };
            session.initialize().await;
            let org = session.switch_organization(id).await?;
            println!("Active organization: {} ({})", org.name, org.id);
        }
        "endpoint" => match data_endpoint(&mut session).await {
            Some(endpoint) => println!("{}", endpoint),
            None => println!("No data endpoint for the active organization."),
        },
        "open" => {
            let Some(path) = args.get(1) else {
                bail!("Usage: civicdesk open <path>");
            };
            let guard = AuthGuard::from_config(&config);
            if let Decision::Denied { .. } = guard.navigate(&mut session, path, &mut ConsoleNavigator).await {
                exit_code = ExitCode::from(2);
            }
        }
        "help" | "--help" | "-h" => eprint!("{}", USAGE),
        other => {
            eprint!("{}", USAGE);
            bail!("Unknown command: {}", other);
        }
    }

    session.teardown();
    Ok(exit_code)
}

async fn login(session: &mut Session, config: &Config, email_arg: Option<String>) -> Result<()> {
    let email = match email_arg
        .or_else(|| std::env::var(ENV_EMAIL).ok())
        .or_else(|| config.last_email.clone())
    {
        Some(email) => email,
        None => prompt_email()?,
    };

    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password(format!("Password for {}: ", email))?,
    };

    if email.is_empty() || password.is_empty() {
        bail!("Email and password required");
    }

    match session.login(&email, &password).await {
        Ok(user) => {
            info!(user = %user.id, "Signed in");
            remember_email(email);
            println!("Signed in as {}", user.display());
            Ok(())
        }
        Err(e) if e.is_bad_credentials() => bail!("Invalid email or password"),
        Err(e) => Err(e.into()),
    }
}

/// Store the email in the config file, leaving environment overrides out of it.
/// An unreadable config file is left untouched.
fn remember_email(email: String) {
    let mut stored = match Config::load_file() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Config file unreadable, not remembering email");
            return;
        }
    };
    stored.last_email = Some(email);
    if let Err(e) = stored.save() {
        warn!(error = %e, "Failed to save config");
    }
}

/// Re-validate the session, then resolve the active organization's endpoint
async fn data_endpoint<S: Storage + Clone>(session: &mut SessionContext<ApiClient, S>) -> Option<String> {
    session.initialize().await;
    session.resolve_data_endpoint()
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}

async fn status(session: &mut Session) {
    session.initialize().await;

    let Some(user) = session.user() else {
        println!("Not signed in.");
        return;
    };
    println!("User:         {}", user.display());

    let tokens = session.tokens();
    match (tokens.expires_at(), tokens.minutes_until_expiry()) {
        (Some(at), Some(minutes)) => {
            let note = if tokens.needs_refresh() { " (sign in again soon)" } else { "" };
            println!("Token expiry: {} ({} min){}", at.to_rfc3339(), minutes, note);
        }
        _ => println!("Token expiry: unknown"),
    }

    match session.organization() {
        Some(org) => {
            println!("Organization: {} ({})", org.name, org.id);
            match session.resolve_data_endpoint() {
                Some(endpoint) => println!("Data endpoint: {}", endpoint),
                None => println!("Data endpoint: none"),
            }
        }
        None => println!("Organization: none selected"),
    }
}

#[cfg(test)]
mod tests {
    use civicdesk_core::storage::{MemoryStorage, ORGANIZATION_KEY, TOKEN_KEY};

    use super::*;

    #[tokio::test]
    async fn test_endpoint_with_stale_token_signs_out() {
        let storage = MemoryStorage::new();
        storage.save(TOKEN_KEY, "stale.token.value").unwrap();
        storage
            .save(
                ORGANIZATION_KEY,
                r#"{"id":"3","name":"Obras","metadata":"{\"postgrest\":\"https://data.city.gov\"}"}"#,
            )
            .unwrap();

        // Never contacted: an undecodable token is expired before any request
        let api = ApiClient::new("http://127.0.0.1:1").unwrap();
        let mut session = SessionContext::create(api, storage.clone());
        assert_eq!(
            session.resolve_data_endpoint().as_deref(),
            Some("https://data.city.gov")
        );

        assert_eq!(data_endpoint(&mut session).await, None);
        assert_eq!(storage.load(TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.load(ORGANIZATION_KEY).unwrap(), None);
    }

    // dirs::config_dir() follows XDG_CONFIG_HOME on Linux only
    #[cfg(target_os = "linux")]
    #[test]
    fn test_remember_email_keeps_config_file() {
        let home = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", home.path());
        let path = home.path().join("civicdesk").join("config.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        // Unparsable file: left exactly as the user wrote it
        let broken = r#"{"base_url":"https://sede.city.gov/api","protected_prefix":"/painel","storage":"keyrng"}"#;
        std::fs::write(&path, broken).unwrap();
        remember_email("ana@city.gov".to_string());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);

        // Valid file: settings kept, email added
        std::fs::write(
            &path,
            r#"{"base_url":"https://sede.city.gov/api","protected_prefix":"/painel","public_path":"/entrar"}"#,
        )
        .unwrap();
        remember_email("ana@city.gov".to_string());
        let stored = Config::load_file().unwrap();
        assert_eq!(stored.base_url, "https://sede.city.gov/api");
        assert_eq!(stored.protected_prefix, "/painel");
        assert_eq!(stored.last_email.as_deref(), Some("ana@city.gov"));
    }
}
