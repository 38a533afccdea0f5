mod cli;

use anyhow::Context;
use safehaven::client::ApiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    safehaven::init_tracing();

    match cli::run() {
        cli::RunOutcome::Serve(config) => {
            safehaven::serve(config).await.context("server error")?;
        }
        cli::RunOutcome::Watch(args) => {
            safehaven::client::watch(&args.api_url, &args.phone, args.interval)
                .await
                .context("alert watch failed")?;
        }
        cli::RunOutcome::SetAlert(args) => {
            let client = ApiClient::new(&args.api_url)?;
            let updated = client
                .set_alert_status(&args.phone, args.status)
                .await
                .with_context(|| format!("failed to update alert status for {}", args.phone))?;
            println!(
                "{}: {} is now {}",
                updated.message, updated.phone, updated.alert_status
            );
        }
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    }
    Ok(())
}
