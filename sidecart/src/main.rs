use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;

use drawer::alert::AlertSink;
use drawer::config::{DrawerConfig, StatsdConfig};
use drawer::controller::DrawerController;
use drawer::view::DrawerView;

/// Command line driver for the cart drawer controller.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "sidecart.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the cart state without opening the drawer
    Show,
    /// Open the drawer, rolling a fresh upsell
    Open,
    /// Close the drawer
    Close,
    /// Add a product variant to the cart
    Add {
        variant: u64,
        #[arg(default_value_t = 1)]
        quantity: u32,
    },
    /// Open the drawer and add the upsell it offers
    AddUpsell,
    /// Set a cart line to a quantity, clamped into its bounds
    SetQuantity { line: u32, quantity: u32 },
    /// Step a cart line's quantity up
    Increment { line: u32 },
    /// Step a cart line's quantity down
    Decrement { line: u32 },
    /// Remove a cart line
    Remove { line: u32 },
}

/// Alerts meant for the shopper go to stderr, keeping stdout for state
/// output.
struct StderrAlertSink;

impl AlertSink for StderrAlertSink {
    fn alert(&self, message: &str) {
        eprintln!("! {message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = DrawerConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let _sentry_guard = config.observability.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    if let Some(statsd) = &config.observability.statsd {
        install_statsd(statsd)?;
    }

    let alerts: Arc<dyn AlertSink> = Arc::new(StderrAlertSink);
    let controller =
        DrawerController::new(&config, alerts).context("setting up drawer controller")?;
    controller.bootstrap().await;

    match cli.command {
        Command::Show => {}
        Command::Open => controller.open_fresh().await,
        Command::Close => controller.close(),
        Command::Add { variant, quantity } => controller.add_to_cart(variant, quantity).await,
        Command::AddUpsell => {
            controller.open_fresh().await;
            controller.add_upsell().await;
        }
        Command::SetQuantity { line, quantity } => {
            controller.set_line_quantity(line, quantity).await
        }
        Command::Increment { line } => controller.increment_line(line).await,
        Command::Decrement { line } => controller.decrement_line(line).await,
        Command::Remove { line } => controller.remove_line(line).await,
    }

    print_view(&controller.snapshot());
    Ok(())
}

fn install_statsd(statsd: &StatsdConfig) -> anyhow::Result<()> {
    let recorder = StatsdBuilder::from(statsd.host.as_str(), statsd.port)
        .build(Some(&statsd.prefix))
        .context("building statsd recorder")?;
    metrics::set_global_recorder(recorder)
        .map_err(|err| anyhow::anyhow!("installing metrics recorder: {err}"))?;
    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    for def in storefront::metrics_defs::ALL_METRICS
        .iter()
        .chain(drawer::metrics_defs::ALL_METRICS)
    {
        def.describe();
        tracing::debug!(name = def.name, kind = def.metric_type.as_str(), "described metric");
    }
}

fn print_view(view: &DrawerView) {
    println!(
        "drawer: {}",
        if view.is_open() { "open" } else { "closed" }
    );
    if let Some(bubble) = view.bubble_html() {
        println!("bubble: {bubble}");
    }
    if view.lines().is_empty() {
        println!("cart: empty");
    } else {
        for line in view.lines() {
            let key = line.key.as_deref().unwrap_or("-");
            let max = match line.max {
                Some(max) => max.to_string(),
                None => "unbounded".to_string(),
            };
            println!(
                "line {}: quantity {} (key {key}, min {}, max {max}, step {})",
                line.line, line.quantity, line.min, line.step
            );
        }
    }
    if let Some(upsell) = view.upsell() {
        let compare = upsell
            .compare_at_price
            .as_deref()
            .map(|was| format!(", was {was}"))
            .unwrap_or_default();
        println!(
            "upsell: {} at {}{compare} (variant {})",
            upsell.title, upsell.price, upsell.add_variant_id
        );
    }
}
