//! Drain the APNs feedback service once and print every expired token.
//!
//! # Running
//!
//! ```bash
//! # PEM files for the push provider certificate
//! export APNS_CERT=/path/to/provider-cert.pem
//! export APNS_KEY=/path/to/provider-key.pem
//!
//! # Optional: use the sandbox service
//! export APNS_SANDBOX=1
//!
//! cargo run --example drain
//! ```
//!
//! Tokens are printed as `<hex token> <expiration>`. Compare the expiration
//! against when the device last registered before deleting anything.

use std::time::Duration;

use apns_feedback_client::{Config, FeedbackConnection, FeedbackEnvironment, ProviderIdentity};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cert_path = std::env::var("APNS_CERT")?;
    let key_path = std::env::var("APNS_KEY")?;
    let environment = if std::env::var_os("APNS_SANDBOX").is_some() {
        FeedbackEnvironment::sandbox()
    } else {
        FeedbackEnvironment::production()
    };

    let identity =
        ProviderIdentity::from_pem(&std::fs::read(cert_path)?, &std::fs::read(key_path)?)?;

    let config = Config::new(environment)
        .idle_timeout(Duration::from_secs(2))
        .provider_identity(identity);
    let connection = FeedbackConnection::new(config)?;

    let tokens = connection.drain().await?;
    println!("{} expired token(s)", tokens.len());
    for token in &tokens {
        println!("{} {}", token.token_hex(), token.expiration().to_rfc3339());
    }

    Ok(())
}
