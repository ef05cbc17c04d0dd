//! `mac-auth`: log in to a MAC access-token API and issue signed requests.
//!
//! ```bash
//! export MAC_AUTH_API_KEY=<application api key>
//! export MAC_AUTH_PASSWORD=<password>
//! mac-auth login --username bob > session.json
//! mac-auth request --session session.json get /user/bob
//! mac-auth sign --session session.json put /user/bob
//! ```
//!
//! `login` writes the exported session (API key, access token, MAC key, API version)
//! to stdout. Treat that file as a secret.

mod observability;

use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use mac_auth::{
    ApiClient, ClientConfig, LoginOutcome, Session,
    mac::SignatureParams,
    request::HttpMethod,
    session::SessionConfig,
};
use observability::{LogFormat, init_observability};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mac-auth", version, about = "MAC access-token API client")]
struct Cli {
    /// Path to the TOML configuration file (defaults apply when omitted)
    #[arg(long, short = 'c', global = true, env = "MAC_AUTH_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in and print the exported session as JSON
    Login {
        /// Application API key
        #[arg(long, env = "MAC_AUTH_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Username to log in as
        #[arg(long, short = 'u')]
        username: String,

        /// Principal type (defaults to the configured user type)
        #[arg(long)]
        user_type: Option<String>,

        /// Password; read from the environment only
        #[arg(long = "password-env", hide = true, env = "MAC_AUTH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print the Authorization header for a request
    Sign {
        /// Exported session file written by `login`
        #[arg(long, short = 's')]
        session: PathBuf,

        /// HTTP method
        #[arg(value_enum)]
        method: Method,

        /// Request URI (path and query)
        uri: String,

        /// Fixed timestamp instead of the current time
        #[arg(long, requires = "nonce")]
        timestamp: Option<String>,

        /// Fixed nonce instead of a random one
        #[arg(long, requires = "timestamp")]
        nonce: Option<String>,
    },
    /// Send a signed request and print the JSON response
    Request {
        /// Exported session file written by `login`
        #[arg(long, short = 's')]
        session: PathBuf,

        /// HTTP method
        #[arg(value_enum)]
        method: Method,

        /// Request URI (path and query)
        uri: String,

        /// JSON body for POST and PUT
        #[arg(long, short = 'd')]
        data: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    Get,
    Post,
    Put,
}

impl From<Method> for HttpMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::Get,
            Method::Post => Self::Post,
            Method::Put => Self::Put,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_observability(cli.log_format.unwrap_or_else(LogFormat::from_env), "info");

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Login { api_key, username, user_type, password } => {
            login(&config, api_key, &username, user_type.as_deref(), &password).await
        }
        Commands::Sign { session, method, uri, timestamp, nonce } => {
            let session = read_session(&config, &session)?;
            let params = SignatureParams { timestamp, nonce };
            let authorization = session
                .signer()?
                .with_port(&config.api.signing_port)
                .authorize(HttpMethod::from(method).as_str(), &uri, params)?;
            println!("{authorization}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Request { session, method, uri, data } => {
            let session = read_session(&config, &session)?;
            let body = data
                .map(|raw| serde_json::from_str::<Value>(&raw))
                .transpose()
                .context("--data is not valid JSON")?;
            if body.is_some() && method == Method::Get {
                bail!("GET requests take no body");
            }

            let client = ApiClient::from_config(&config)?;
            let response =
                client.signed(&session, method.into(), &uri, body.as_ref(), &[]).await?;
            info!(status = response.status, "request completed");

            println!("{}", serde_json::to_string_pretty(&response.body)?);
            Ok(if response.is_success() { ExitCode::SUCCESS } else { ExitCode::from(2) })
        }
    }
}

async fn login(
    config: &ClientConfig,
    api_key: String,
    username: &str,
    user_type: Option<&str>,
    password: &str,
) -> Result<ExitCode> {
    let client = ApiClient::from_config(config)?;
    let mut session = client.open_session(api_key);

    let user_type = user_type.unwrap_or(&config.api.user_type);
    let outcome = mac_auth::LoginFlow::new(client.builder(), client.transport())
        .login_as_type(&mut session, user_type, username, password)
        .await
        .context("login failed")?;

    match outcome {
        LoginOutcome::Authenticated => {
            println!("{}", serde_json::to_string_pretty(&session.export_config())?);
            Ok(ExitCode::SUCCESS)
        }
        LoginOutcome::Failed => {
            eprintln!("login rejected: wrong username or password");
            Ok(ExitCode::from(3))
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(ClientConfig::default()),
    }
}

fn read_session(config: &ClientConfig, path: &std::path::Path) -> Result<Session> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading session file {}", path.display()))?;
    let exported: SessionConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parsing session file {}", path.display()))?;
    let session = config.api.restore_session(exported)?;
    if !session.can_sign() {
        bail!("session file {} has no credentials; run `mac-auth login` first", path.display());
    }
    Ok(session)
}
