mod error;

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use claimsd_client::{Client, ClientConfig, ClientError, StatusCode};

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "claimsd", version, about = "Inspect claims from a local claims service")]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalOpts {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Claims service endpoint (overrides CLAIMSD_ENDPOINT; marks data untrusted)
    #[arg(long, global = true)]
    endpoint: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the current claims and print them as JSON
    Dump(DumpArgs),

    /// Print the table of numeric status codes
    Errors,
}

#[derive(Debug, Args)]
struct DumpArgs {
    /// Only include claims for this product
    #[arg(long)]
    product: Option<String>,

    /// Only dump the raw active-claims payload
    #[arg(long, conflicts_with = "products_only")]
    claims_only: bool,

    /// Only dump the aggregated product-claims payload
    #[arg(long)]
    products_only: bool,

    /// Keep running and re-dump whenever the claims data changes
    #[arg(long)]
    watch: bool,

    /// How long to wait for the claims service, in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        if let Some(status) = err.status_code() {
            eprintln!("status: {status}");
        }
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    tracing::debug!(command = ?cli.command, "dispatching command");

    match cli.command {
        Command::Dump(args) => dump(args, &cli.global).await,
        Command::Errors => {
            print_errors();
            Ok(())
        }
    }
}

async fn dump(args: DumpArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = build_client_config(global)?;
    let timeout = Duration::from_secs(args.timeout);

    if args.watch {
        return watch_dump(config, &args, timeout).await;
    }

    let product = args.product.as_deref();
    let claims_only = args.claims_only;
    let products_only = args.products_only;

    let payloads = Client::oneshot(config, product, timeout, move |client| async move {
        collect_payloads(&client, claims_only, products_only).await
    })
    .await?;

    print_payloads(&payloads)
}

/// Watch mode: keep the instance alive and re-dump on every refresh until
/// interrupted.
async fn watch_dump(
    config: ClientConfig,
    args: &DumpArgs,
    timeout: Duration,
) -> Result<(), CliError> {
    let client = Client::new(config);
    let scope = CancellationToken::new();
    client.initialize(&scope, args.product.as_deref())?;

    let result = run_watch(&client, args, timeout, &scope).await;

    scope.cancel();
    let _ = client.uninitialize();
    result
}

async fn run_watch(
    client: &Client,
    args: &DumpArgs,
    timeout: Duration,
    scope: &CancellationToken,
) -> Result<(), CliError> {
    let (updates_tx, mut updates) = tokio::sync::mpsc::channel(8);
    let notifier = {
        let client = client.clone();
        let scope = scope.clone();
        tokio::spawn(async move { client.notify_when_updated(&scope, updates_tx).await })
    };

    // The first successful refresh fires the first update; dump on it and
    // on every one after, until interrupted.
    let mut first = true;
    loop {
        let received = if first {
            match tokio::time::timeout(timeout, updates.recv()).await {
                Ok(received) => received,
                Err(_elapsed) => return Err(CliError::Timeout),
            }
        } else {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                received = updates.recv() => received,
            }
        };

        match received {
            Some(()) => {
                if first {
                    first = false;
                    print_payloads(
                        &collect_payloads(client, args.claims_only, args.products_only).await?,
                    )?;
                    eprintln!("watching for changes, press CTRL+C to exit ...");
                } else {
                    eprintln!("claims have been updated");
                    print_payloads(
                        &collect_payloads(client, args.claims_only, args.products_only).await?,
                    )?;
                }
            }
            // The notifier ended on its own; surface its error, if any.
            None => {
                scope.cancel();
                if let Ok(Err(e)) = notifier.await {
                    return Err(e.into());
                }
                return Ok(());
            }
        }
    }

    scope.cancel();
    let _ = notifier.await;
    Ok(())
}

/// Gather the selected payloads. Both by default; `claims_only` /
/// `products_only` narrow to one.
async fn collect_payloads(
    client: &Client,
    claims_only: bool,
    products_only: bool,
) -> Result<Vec<serde_json::Value>, ClientError> {
    let mut payloads = Vec::new();

    if !claims_only {
        payloads.push(client.begin_ensure().dump());
    }
    if !products_only {
        let scope = CancellationToken::new();
        let claims = client.current_claims(&scope).await?;
        payloads.push(claims.dump().clone());
    }

    Ok(payloads)
}

fn print_payloads(payloads: &[serde_json::Value]) -> Result<(), CliError> {
    for payload in payloads {
        println!("{}", serde_json::to_string_pretty(payload)?);
    }
    Ok(())
}

fn build_client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let endpoint = match &global.endpoint {
        Some(raw) => Some(raw.parse().map_err(|_| CliError::InvalidEndpoint {
            url: raw.clone(),
        })?),
        None => None,
    };

    Ok(ClientConfig {
        debug: global.verbose >= 2,
        endpoint,
        product_user_agent: Some(format!("claimsd-cli/{}", env!("CARGO_PKG_VERSION"))),
        ..ClientConfig::default()
    })
}

fn print_errors() {
    println!("{:>10}  {}", "CODE", "TEXT");
    for status in StatusCode::ALL {
        println!("{:>#10x}  {}", status.code(), status.text());
    }
}
