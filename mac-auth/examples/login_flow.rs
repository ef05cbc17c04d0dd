//! Login and signed calls against a live API.
//!
//! # Running this example
//!
//! ```bash
//! export MAC_AUTH_API_KEY=<application api key>
//! export MAC_AUTH_USERNAME=bob
//! export MAC_AUTH_PASSWORD=<password>
//! RUST_LOG=mac_auth=debug cargo run --example login_flow
//! ```

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::uninlined_format_args,
    reason = "examples are allowed to use println and simple formatting"
)]

use std::env;

use mac_auth::{
    ApiClient, AuthError, ClientConfig, LoginOutcome,
    store::{MemoryStore, SessionCache},
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let api_key = env::var("MAC_AUTH_API_KEY")?;
    let username = env::var("MAC_AUTH_USERNAME")?;
    let password = env::var("MAC_AUTH_PASSWORD")?;

    let config = ClientConfig::default();
    let client = ApiClient::from_config(&config)?;
    let mut session = client.open_session(api_key);

    match client.login_as(&mut session, &username, &password).await {
        Ok(LoginOutcome::Authenticated) => println!("✓ Logged in as {}", username),
        Ok(LoginOutcome::Failed) => {
            eprintln!("✗ Username or password rejected");
            return Ok(());
        }
        Err(AuthError::ServerError(status)) => {
            eprintln!("✗ API unavailable (status {})", status);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let uri = format!("/user/{}", username);
    let me = client.get(&session, &uri).await?;
    println!("GET {} -> {} {}", uri, me.status, me.body);

    session.update_identity_attribute("last_seen_by", "login_flow example")?;
    let updated = client.put(&session, &uri, &json!({"last_seen_by": "login_flow example"})).await?;
    println!("PUT {} -> {}", uri, updated.status);

    let cache = SessionCache::with_config(MemoryStore::from_config(&config.store), &config.store);
    let key = cache.save(&session).await?;
    println!("Session cached under {}", key);

    Ok(())
}
