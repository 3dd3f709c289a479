use anyhow::Context;
use clap::Parser;
use rateintel_core::analytics::brief::build_brief;
use rateintel_core::domain::product::{is_known_term, ProductType};
use rateintel_core::domain::view::ViewState;
use rateintel_core::storage::{PgRateSource, RateSource, TableNames};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "rateintel_worker")]
struct Args {
    /// Product type to brief on (deposit / savings, or 예금 / 적금).
    #[arg(long, default_value = "deposit")]
    product_type: ProductType,

    /// Savings term in months.
    #[arg(long, default_value_t = 12)]
    term: i32,

    /// Bank every competitor is measured against. Defaults to REFERENCE_BANK.
    #[arg(long)]
    reference_bank: Option<String>,

    /// Include every change of the week instead of the collapsed list.
    #[arg(long)]
    show_all_changes: bool,

    /// Evaluate the brief as of this instant (RFC 3339). Defaults to now.
    #[arg(long)]
    now: Option<String>,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = rateintel_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, &args).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "daily brief run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &rateintel_core::config::Settings, args: &Args) -> anyhow::Result<()> {
    anyhow::ensure!(
        is_known_term(args.term),
        "unsupported term: {} months",
        args.term
    );
    let now = resolve_now(args.now.as_deref())?;
    let reference_bank = args
        .reference_bank
        .clone()
        .unwrap_or_else(|| settings.reference_bank.clone());

    let db_url = settings.require_database_url()?;
    let pool = rateintel_core::storage::connect(db_url).await?;
    let source = PgRateSource::new(pool, TableNames::from_settings(settings)?);

    let dataset = source.load().await.context("rate dataset load failed")?;
    if dataset.rejected.total() > 0 {
        tracing::warn!(
            products = dataset.rejected.products,
            comparison = dataset.rejected.comparison,
            history = dataset.rejected.history,
            "some upstream rows were rejected"
        );
    }

    let view = ViewState {
        product_type: args.product_type,
        term_months: args.term,
        bank: None,
        show_all_changes: args.show_all_changes,
    };
    let brief = build_brief(&dataset, &view, &reference_bank, now)?;

    tracing::info!(
        kst_date = %brief.kst_date,
        product_type = %brief.product_type,
        term_months = brief.term_months,
        reference_rank = ?brief.headline.reference_rank,
        threat = brief.threat.is_some(),
        "daily brief built"
    );

    let out = if args.pretty {
        serde_json::to_string_pretty(&brief)?
    } else {
        serde_json::to_string(&brief)?
    };
    println!("{out}");
    Ok(())
}

fn resolve_now(now_arg: Option<&str>) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    match now_arg {
        Some(s) => Ok(chrono::DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("--now must be RFC 3339 (got {s})"))?
            .with_timezone(&chrono::Utc)),
        None => Ok(chrono::Utc::now()),
    }
}

fn init_sentry(settings: &rateintel_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
