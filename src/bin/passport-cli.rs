use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "passport-cli")]
#[command(about = "Query the passport gateway and its admin API", long_about = None)]
struct Cli {
    /// Public gateway address.
    #[arg(short, long, default_value = "http://localhost:8080")]
    gateway: String,

    /// Admin API address.
    #[arg(short, long, default_value = "http://localhost:8081")]
    admin: String,

    /// Admin API key.
    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the merged passport for a user
    Passport { user: String },
    /// Fetch a user's bookmarks
    Bookmarks { user: String },
    /// Fetch a user's contacts
    Contacts { user: String },
    /// Check gateway status
    Status,
    /// List instances with health and load
    Instances,
    /// Show circuit breaker states
    Breakers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match &cli.command {
        Commands::Passport { user } => client.get(user_url(&cli.gateway, user, "passport")?),
        Commands::Bookmarks { user } => client.get(user_url(&cli.gateway, user, "bookmarks")?),
        Commands::Contacts { user } => client.get(user_url(&cli.gateway, user, "contacts")?),
        Commands::Status => client.get(format!("{}/admin/status", cli.admin)).headers(headers),
        Commands::Instances => client
            .get(format!("{}/admin/instances", cli.admin))
            .headers(headers),
        Commands::Breakers => client.get(format!("{}/admin/breakers", cli.admin)).headers(headers),
    };

    print_response(request.send().await?).await
}

/// `{base}/{user}/{resource}` with the user key percent-encoded.
fn user_url(
    base: &str,
    user: &str,
    resource: &str,
) -> Result<reqwest::Url, Box<dyn std::error::Error>> {
    let mut url = reqwest::Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("{base} cannot be a base URL"))?
        .pop_if_empty()
        .extend([user, resource]);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    if let Some(degraded) = res.headers().get("x-passport-degraded") {
        eprintln!("Degraded: {}", degraded.to_str().unwrap_or("?"));
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
