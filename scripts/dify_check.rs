// Quick diagnostic: run the configured workflow once and show what the relay would reply
// Run: cargo run --bin dify_check -- "your question"

#[allow(dead_code)]
#[path = "../src/config.rs"]
mod config;
#[allow(dead_code)]
#[path = "../src/dify.rs"]
mod dify;

use config::Config;
use dify::{extract_answer, workflow_url, DifyClient};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ {}", e);
            std::process::exit(1);
        }
    };

    let settings = config.dify.clone();
    let (base_url, workflow_id) = match (
        settings.require_base_url(),
        settings.require_workflow_id(),
        settings.require_api_key(),
    ) {
        (Ok(base_url), Ok(workflow_id), Ok(_)) => (base_url.to_string(), workflow_id.to_string()),
        (base, workflow, key) => {
            eprintln!("\n❌ Workflow API is not fully configured:");
            for err in [base.err(), workflow.err(), key.err()].into_iter().flatten() {
                eprintln!("   {}", err);
            }
            eprintln!("\nSet DIFY_BASE_URL, DIFY_API_KEY and DIFY_WORKFLOW_ID in your .env file.\n");
            std::process::exit(1);
        }
    };

    let query = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DIFY_CHECK_QUERY").ok())
        .unwrap_or_else(|| "Hello".to_string());

    println!(
        "1. POST {}",
        workflow_url(&base_url, settings.api_version(), &workflow_id)
    );
    println!("   query: {:?}", query);

    let client = match DifyClient::new(settings) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("\n❌ {}", e);
            std::process::exit(1);
        }
    };

    let raw = match client.run_workflow_raw(&query).await {
        Ok(raw) => raw,
        Err(e) => {
            println!("\n2. FAIL: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n2. Status: {}", raw.status);
    println!("   Body: {}", raw.body);

    if !raw.status.is_success() {
        println!("\n   FAILED - the relay would post a \"workflow service call failed\" message.");
        std::process::exit(1);
    }

    match serde_json::from_str::<serde_json::Value>(&raw.body) {
        Ok(json) => {
            println!("\n3. OK. The relay would reply with:\n");
            println!("{}", extract_answer(&json));
        }
        Err(e) => {
            println!("\n3. FAIL: response is not JSON ({})", e);
            std::process::exit(1);
        }
    }
}
