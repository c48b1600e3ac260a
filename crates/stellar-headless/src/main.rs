//! Headless driver: loads a save directory, plays greedily for a while of
//! simulated time, saves, and prints the export string.
//!
//! ```text
//! stellar-headless [--data DIR] [--save DIR] [--minutes N] [--away N]
//! ```
//!
//! `--data` points at optional `stellar.{ron,toml,json}` and
//! `content.{ron,toml,json}` overrides. `--away` is the number of minutes
//! the player was gone since the last save. Logging follows `RUST_LOG`.

mod store;

use std::path::PathBuf;

use stellar_core::config::EngineConfig;
use stellar_core::id::ResourceId;
use stellar_core::ledger::LedgerError;
use stellar_data::{ContentPack, DataLoadError, builtin, load_overrides};
use stellar_engine::save::{self, Documents};
use stellar_engine::{Engine, EngineError, EngineEvent, LayerError, SaveError, SaveStore};
use tracing::info;

use crate::store::FileStore;

#[derive(Debug, thiserror::Error)]
enum HeadlessError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Data(#[from] DataLoadError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error("save directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
struct Args {
    data: Option<PathBuf>,
    save: PathBuf,
    minutes: f64,
    away: f64,
}

fn parse_args() -> Result<Args, HeadlessError> {
    let mut args = Args {
        data: None,
        save: PathBuf::from("stellar-save"),
        minutes: 10.0,
        away: 0.0,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .ok_or_else(|| HeadlessError::Usage(format!("{flag} needs a value")))
        };
        match flag.as_str() {
            "--data" => args.data = Some(PathBuf::from(value()?)),
            "--save" => args.save = PathBuf::from(value()?),
            "--minutes" => args.minutes = parse_minutes(&flag, &value()?)?,
            "--away" => args.away = parse_minutes(&flag, &value()?)?,
            other => return Err(HeadlessError::Usage(format!("unknown argument '{other}'"))),
        }
    }
    Ok(args)
}

fn parse_minutes(flag: &str, raw: &str) -> Result<f64, HeadlessError> {
    raw.parse::<f64>()
        .ok()
        .filter(|m| m.is_finite() && *m >= 0.0)
        .ok_or_else(|| HeadlessError::Usage(format!("bad {flag} '{raw}'")))
}

/// Time of the previous save, if the store holds one.
fn last_saved_ms(store: &FileStore) -> Result<Option<u64>, HeadlessError> {
    let Some(text) = store.read(save::META_KEY)? else {
        return Ok(None);
    };
    Ok(Documents::decode([(save::META_KEY, text.as_str())])?.last_saved_ms())
}

/// Buy the cheapest skill until nothing is affordable, then advance if able.
fn play_greedy(engine: &mut Engine<FileStore>, now_ms: u64) -> Result<(), LayerError> {
    loop {
        let balance = engine.amount(ResourceId::Energy);
        let cheapest = engine.hierarchy().skills().graph().purchasable(balance).into_iter().next();
        let Some((id, _)) = cheapest else {
            break;
        };
        engine.purchase_skill(id.as_str(), now_ms)?;
    }
    if engine.can_advance() {
        engine.advance(now_ms)?;
    }
    Ok(())
}

fn report_events(engine: &mut Engine<FileStore>) {
    for event in engine.drain_events() {
        match event {
            EngineEvent::AchievementUnlocked(id) => info!(%id, "Achievement"),
            EngineEvent::TierAdvanced { from_tier, to_tier } => {
                info!(from_tier, to_tier, "Advanced")
            }
            EngineEvent::OfflineProgress(report) => {
                info!(seconds = report.seconds_applied, "Offline progress")
            }
            other => info!(event = ?other, "Event"),
        }
    }
}

fn run() -> Result<(), HeadlessError> {
    let args = parse_args()?;
    let (config, content): (EngineConfig, ContentPack) = match &args.data {
        Some(dir) => load_overrides(dir)?,
        None => (EngineConfig::default(), builtin::content()),
    };
    let ledger_step = config.timing.ledger_tick_seconds;
    if !(ledger_step > 0.0 && ledger_step.is_finite()) {
        return Err(HeadlessError::Usage(format!("ledger tick must be positive, got {ledger_step}")));
    }
    let automation_every = (config.timing.automation_tick_seconds / ledger_step).round().max(1.0) as u64;

    let store = FileStore::open(&args.save)?;
    info!(dir = %store.dir().display(), "Opening save");
    let mut engine = Engine::new(config, content, store)?;

    let away_ms = (args.away * 60_000.0).round() as u64;
    let mut now_ms = last_saved_ms(engine.store())?.unwrap_or(0) + away_ms;
    let loaded = engine.load(now_ms)?;
    if loaded.restored_keys.is_empty() {
        info!("No save found, starting fresh");
    } else {
        info!(keys = loaded.restored_keys.len(), "Save loaded");
    }

    let step_ms = (ledger_step * 1000.0).round() as u64;
    let steps = (args.minutes * 60.0 / ledger_step).round() as u64;
    for step in 1..=steps {
        now_ms += step_ms;
        engine.ledger_tick(ledger_step, now_ms)?;
        if step % automation_every == 0 {
            play_greedy(&mut engine, now_ms)?;
            engine.automation_tick(now_ms)?;
            report_events(&mut engine);
        }
    }

    let written = engine.save_all(now_ms)?;
    info!(
        documents = written,
        tier = engine.hierarchy().skills().current_tier(),
        energy = %engine.format(engine.amount(ResourceId::Energy)),
        achievements = engine.predicates().unlocked_count(),
        "Session saved"
    );
    println!("{}", engine.export(now_ms)?);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
