use clap::Parser;
use tracing::{error, info};

use bankview::config::fetch_config;
use bankview::models::{AccountId, Scope};
use bankview::push::PushMode;
use bankview::tui::{install_panic_hook, restore_terminal, run, setup_terminal};
use bankview::{BankviewError, logging};

/// Watch account balances and submit deposits from the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Accounts to open, one tab each. Without any, the global balance is shown.
    accounts: Vec<String>,

    /// Push channel: none, ws, ws-scoped or sse. Overrides BANKVIEW_PUSH_MODE.
    #[arg(long)]
    push: Option<PushMode>,

    /// Base URL of the balance service. Overrides BANKVIEW_API_URL.
    #[arg(long)]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), BankviewError> {
    let cli = Cli::parse();

    let mut app_config = fetch_config()?;
    if let Some(api_url) = cli.api_url.as_deref() {
        let websocket_url_explicit = std::env::var("BANKVIEW_WEBSOCKET_URL")
            .is_ok_and(|url| !url.trim().is_empty());
        app_config.set_api_url(api_url, websocket_url_explicit)?;
    }
    if let Some(mode) = cli.push {
        app_config.push.mode = mode;
    }

    let scopes = if cli.accounts.is_empty() {
        vec![Scope::Global]
    } else {
        cli.accounts
            .iter()
            .map(|raw| AccountId::parse(raw).map(Scope::Account))
            .collect::<Result<Vec<_>, _>>()?
    };

    logging::init(&app_config.log_file)?;
    info!(
        api_url = %app_config.backend.api_url,
        push = app_config.push.mode.as_str(),
        views = scopes.len(),
        "Starting bankview"
    );

    install_panic_hook();
    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, app_config, scopes).await;
    restore_terminal(&mut terminal)?;

    if let Err(ref e) = result {
        error!(kind = e.kind(), "Exiting with error: {e}");
    }
    result
}
