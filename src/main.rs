use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use webpush_relay::{
    config::{Config, StoreArgs, TransportArgs, storage_config},
    notifications::{NotificationDispatcher, NotificationRequest, VapidIdentity},
};

#[derive(Parser)]
#[command(name = "webpush-relay")]
#[command(about = "Registers Web Push subscriptions and sends notifications to them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service that accepts subscriptions
    Serve(Config),
    /// Send a notification to every stored device
    Send {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        transport: TransportArgs,

        #[command(flatten)]
        notification: NotificationRequest,
    },
    /// List stored devices
    Devices {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print a freshly generated VAPID key pair
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(config) => webpush_relay::run(config).await?,
        Commands::Send {
            store,
            transport,
            notification,
        } => send(&store, &transport, notification).await?,
        Commands::Devices { store } => list_devices(&store).await?,
        Commands::Keygen => keygen()?,
    }

    Ok(())
}

/// Broadcast from the command line
async fn send(
    store: &StoreArgs,
    transport: &TransportArgs,
    notification: NotificationRequest,
) -> Result<()> {
    let dispatcher =
        NotificationDispatcher::new(storage_config(store)?, Arc::new(transport.transport()?));

    let report = dispatcher
        .broadcast(&notification.into_payload())
        .await
        .context("Failed to enumerate devices")?;

    for result in &report.results {
        match result.failure() {
            None => println!("{}: delivered", result.device_name),
            Some(failure) => println!("{}: FAILED ({})", result.device_name, failure),
        }
    }
    println!(
        "{} of {} notifications delivered",
        report.delivered().count(),
        report.len()
    );

    if !report.is_success() {
        anyhow::bail!("No notification could be delivered");
    }
    Ok(())
}

async fn list_devices(store: &StoreArgs) -> Result<()> {
    let store = storage_config(store)?;
    let mut records = store.list_all().await?;
    while let Some(item) = records.next().await {
        match item {
            Ok(record) => println!(
                "{}\t{}",
                record.device_name(),
                record.subscription().endpoint()
            ),
            Err(e) => eprintln!("{}\tunreadable: {}", e.key(), e),
        }
    }
    Ok(())
}

fn keygen() -> Result<()> {
    let identity = VapidIdentity::generate("").context("Failed to generate VAPID key pair")?;
    println!("VAPID_PUBLIC_KEY={}", identity.public_key());
    println!("VAPID_PRIVATE_KEY={}", identity.private_key());
    Ok(())
}
