// Prints a signed curl command that replays a Slack event against a local relay
// Run: cargo run --bin slack_sign -- '{"type":"event_callback","event":{...}}'

#[allow(dead_code)]
#[path = "../src/config.rs"]
mod config;
#[allow(dead_code)]
#[path = "../src/slack.rs"]
mod slack;

use config::Config;

const SAMPLE_EVENT: &str = r#"{"type":"event_callback","event_id":"EvLOCAL","event":{"type":"app_mention","channel":"C0LOCAL","user":"U0LOCAL","text":"<@U0BOT> hello","ts":"1700000000.000100"}}"#;

fn main() {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ {}", e);
            std::process::exit(1);
        }
    };

    let signing_secret = match config.require_signing_secret() {
        Ok(secret) => secret.to_string(),
        Err(_) => {
            eprintln!("\n❌ SLACK_SIGNING_SECRET is not set in your .env file");
            eprintln!("   Copy it from your app's Basic Information page on api.slack.com\n");
            std::process::exit(1);
        }
    };

    let body = std::env::args()
        .nth(1)
        .unwrap_or_else(|| SAMPLE_EVENT.to_string());
    if let Err(e) = serde_json::from_str::<serde_json::Value>(&body) {
        eprintln!("⚠️  WARNING: body is not valid JSON ({}), the relay will answer 400", e);
    }

    let timestamp = time::OffsetDateTime::now_utc().unix_timestamp().to_string();
    let signature = slack::compute_signature(&signing_secret, &timestamp, &body);

    println!(
        "curl -i -X POST http://127.0.0.1:{}/slack/events \\",
        config.port
    );
    println!("  -H 'Content-Type: application/json' \\");
    println!("  -H 'X-Slack-Request-Timestamp: {}' \\", timestamp);
    println!("  -H 'X-Slack-Signature: {}' \\", signature);
    println!("  --data-binary '{}'", body.replace('\'', r"'\''"));
}
