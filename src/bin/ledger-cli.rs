use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "ledger-cli")]
#[command(about = "Submit and look up transactions through a ledger gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Notarize a business id and its hash
    Submit {
        #[arg(long)]
        business_id: String,
        #[arg(long)]
        hash: String,
    },
    /// Look a transaction up by id
    Query { tx_id: String },
    /// Show gateway readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Submit { business_id, hash } => {
            client
                .post(format!("{}/v1/transactions", base))
                .json(&serde_json::json!({ "businessId": business_id, "hash": hash }))
                .send()
                .await?
        }
        Commands::Query { tx_id } => {
            client
                .get(format!("{}/v1/transactions/{}", base, tx_id))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let json: Value = res.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Some(message) = json.get("message").and_then(Value::as_str) {
            eprintln!("Message: {}", message);
        }
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
