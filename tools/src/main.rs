//! market-cli: headless line driver for the marketplace core.
//!
//! Reads one command per line from stdin and prints the engine's reply,
//! which makes the whole participant/operator surface scriptable:
//!
//!   market-cli --db market.db --config market.json
//!
//!   start 100 alice
//!   workflow 100 submit
//!   text 100 alice.work@gmail.com:hunter2
//!   op 1 /pending_subs
//!   op 1 /valid_1_0.75
//!   summary 100

use anyhow::{bail, Context, Result};
use marketplace_core::command;
use marketplace_core::config::MarketConfig;
use marketplace_core::conversation::Workflow;
use marketplace_core::engine::{MarketEngine, StartOutcome};
use marketplace_core::event::MarketEvent;
use marketplace_core::rng::CodeRng;
use marketplace_core::store::MarketStore;
use marketplace_core::transport::{ChannelDirectory, Notifier, OpenDirectory};
use marketplace_core::types::AccountId;
use std::env;
use std::io::{self, BufRead, Write};

/// Prints operator notifications straight to stdout, prefixed so they
/// are distinguishable from command replies.
struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn notify(&self, operator_id: AccountId, event: &MarketEvent) -> Result<()> {
        println!("! notify operator {operator_id}: {}", serde_json::to_string(event)?);
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let config_path = args
        .windows(2)
        .find(|w| w[0] == "--config")
        .map(|w| w[1].as_str());

    let config = match config_path {
        Some(path) => MarketConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => {
            log::info!("no --config given, using built-in defaults");
            MarketConfig::default_test()
        }
    };

    println!("market-cli");
    println!("  db:     {db}");
    println!("  seed:   {seed}");
    println!("  config: {}", config_path.unwrap_or("(defaults)"));
    println!();

    let store = if db == ":memory:" {
        // Shared-memory URI so the per-subsystem connections inside the
        // engine all see the same database.
        MarketStore::in_memory_shared()?
    } else {
        MarketStore::open(db)?
    };

    let directory: Box<dyn ChannelDirectory> = Box::new(OpenDirectory);
    let mut engine = MarketEngine::build(
        store,
        config,
        directory,
        Box::new(StdoutNotifier),
        CodeRng::seeded(seed),
    )?;

    run_line_loop(&mut engine)
}

fn run_line_loop(engine: &mut MarketEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match dispatch(engine, line) {
            Ok(reply) => writeln!(stdout, "-> {reply}")?,
            Err(e) => writeln!(stdout, "!! {e}")?,
        }
        stdout.flush()?;
    }
    Ok(())
}

fn dispatch(engine: &mut MarketEngine, line: &str) -> Result<String> {
    let mut parts = line.splitn(3, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();

    match verb {
        "start" => {
            let id = required_id(parts.next())?;
            let rest = parts.next().unwrap_or_default();
            let mut rest = rest.split_whitespace();
            let handle = rest.next().context("start needs a handle")?;
            let code = rest.next();
            match engine.on_start(id, handle, code)? {
                StartOutcome::MustJoinChannel => Ok("must join channel".into()),
                StartOutcome::Ready(summary) => Ok(format!(
                    "ready: balance {:.2}, lifetime {:.2}, code {}",
                    summary.balance, summary.lifetime_earned, summary.referral_code
                )),
            }
        }
        "workflow" => {
            let id = required_id(parts.next())?;
            let workflow = match parts.next().unwrap_or_default().trim() {
                "submit" => Workflow::Submit,
                "payout" => Workflow::BindPayout,
                "withdraw" => Workflow::Withdraw,
                other => bail!("unknown workflow: {other}"),
            };
            Ok(format!("{:?}", engine.start_workflow(id, workflow)?))
        }
        "text" => {
            let id = required_id(parts.next())?;
            let text = parts.next().context("text needs a payload")?;
            Ok(format!("{:?}", engine.handle_text(id, text)?))
        }
        "method" => {
            let id = required_id(parts.next())?;
            let method = parts.next().context("method needs a name")?.trim();
            Ok(format!("{:?}", engine.select_payout_method(id, method)?))
        }
        "cancel" => {
            let id = required_id(parts.next())?;
            Ok(format!("{:?}", engine.cancel(id)?))
        }
        "summary" => {
            let id = required_id(parts.next())?;
            let s = engine.account_summary(id)?;
            Ok(format!(
                "{}: balance {:.2}, lifetime {:.2}, subs {}/{} valid, referrals {}{}",
                s.handle,
                s.balance,
                s.lifetime_earned,
                s.submissions.valid,
                s.submissions.total,
                s.referrals.referred_count,
                if s.referrals_unlocked { "" } else { " (locked)" },
            ))
        }
        "op" => {
            let id = required_id(parts.next())?;
            let text = parts.next().context("op needs a command")?.trim();
            let cmd = command::parse(text)
                .with_context(|| format!("unrecognized operator command: {text}"))?;
            Ok(format!("{:?}", engine.handle_operator(id, cmd)?))
        }
        "quit" | "exit" => std::process::exit(0),
        other => bail!("unknown verb: {other}"),
    }
}

fn required_id(arg: Option<&str>) -> Result<AccountId> {
    arg.context("missing account id")?
        .trim()
        .parse()
        .context("account id must be an integer")
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
