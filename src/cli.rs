//! CLI definition and dispatch.

use chrono::{Duration, Local};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::kis_broker::{KisBroker, KisConfig};
use crate::adapters::linear_policy::{LinearPolicy, LinearPolicyStore};
use crate::adapters::paper_broker::PaperBroker;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::config_validation::{
    env_config, parse_codes, risk_defaults, trader_config, validate_lookback_days,
};
use crate::domain::error::TraderError;
use crate::domain::execution::OrderExecutor;
use crate::domain::indicator::{FEATURE_NAMES, compute_indicators};
use crate::domain::metrics::summarize_performance;
use crate::domain::risk::{RiskSettingUpdate, Side};
use crate::domain::simulation::{TradingEnv, run_episode};
use crate::domain::split::{DEFAULT_TRAIN_RATIO, DEFAULT_VAL_RATIO, split_chronological};
use crate::domain::trading::{CycleStatus, TradingContext, run_trading_cycle};
use crate::ports::audit_port::AuditPort;
use crate::ports::broker_port::BrokerPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::policy_port::{PolicyPort, PolicyStore};
use crate::ports::settings_port::SettingsPort;

#[derive(Parser, Debug)]
#[command(name = "rltrader", about = "RL trading environment with a risk-gated order path")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Segment {
    All,
    Train,
    Validation,
    Test,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print an instrument's feature table as CSV
    Features {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        /// Only the most recent N rows
        #[arg(long)]
        last: Option<usize>,
    },
    /// Run one simulated episode over an instrument's history
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        /// Policy JSON; defaults to `{policy_dir}/{code}.json`
        #[arg(long)]
        policy: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Segment::All)]
        segment: Segment,
    },
    /// Run one trading cycle over the configured instruments
    Trade {
        #[arg(short, long)]
        config: PathBuf,
        /// Use the in-memory paper broker instead of the live API
        #[arg(long)]
        paper: bool,
    },
    /// Place a single order through the risk gate
    Order {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        side: Side,
        #[arg(long)]
        code: String,
        #[arg(long, conflicts_with = "amount", required_unless_present = "amount")]
        quantity: Option<i64>,
        /// Currency amount, converted to whole shares at the latest close
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        paper: bool,
    },
    /// Query the broker balance and record a snapshot
    Balance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        paper: bool,
    },
    /// Summarize recorded account snapshots
    Performance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Show recent orders, newest first
    Orders {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Manage risk settings
    Risk {
        #[command(subcommand)]
        action: RiskCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum RiskCommand {
    /// List stored settings
    List {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create or update the setting for a code (or ALL)
    Set {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        #[arg(long)]
        max_shares: Option<i64>,
        /// Fraction of total account value, 0..=1
        #[arg(long)]
        max_weight: Option<f64>,
        #[arg(long)]
        max_daily_buy: Option<f64>,
        #[arg(long)]
        active: Option<bool>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Features { config, code, last } => run_features(&config, &code, last),
        Command::Simulate {
            config,
            code,
            policy,
            segment,
        } => run_simulate(&config, &code, policy.as_deref(), segment),
        Command::Trade { config, paper } => run_trade(&config, paper),
        Command::Order {
            config,
            side,
            code,
            quantity,
            amount,
            paper,
        } => run_order(&config, side, &code, quantity, amount, paper),
        Command::Balance { config, paper } => run_balance(&config, paper),
        Command::Performance { config, days } => run_performance(&config, days),
        Command::Orders {
            config,
            code,
            limit,
        } => run_orders(&config, code.as_deref(), limit),
        Command::Risk { action } => match action {
            RiskCommand::List { config } => run_risk_list(&config),
            RiskCommand::Set {
                config,
                code,
                max_shares,
                max_weight,
                max_daily_buy,
                active,
            } => run_risk_set(
                &config,
                &code,
                RiskSettingUpdate {
                    max_position_shares: max_shares,
                    max_weight_pct: max_weight,
                    max_daily_buy_amount: max_daily_buy,
                    active,
                },
            ),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TraderError> {
    tracing::debug!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Price history from `[data] source`: `sqlite` (default) or `csv`.
pub fn open_data(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, TraderError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "sqlite".to_string());
    match source.trim() {
        "csv" => {
            let dir = config.require_string("data", "csv_dir")?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        "sqlite" => Ok(Box::new(open_store(config)?)),
        other => Err(TraderError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unknown source '{other}', expected sqlite or csv"),
        }),
    }
}

pub fn open_store(config: &dyn ConfigPort) -> Result<SqliteAdapter, TraderError> {
    let store = SqliteAdapter::from_config(config)?;
    store.initialize_schema()?;
    Ok(store)
}

fn open_broker(
    config: &dyn ConfigPort,
    paper: bool,
    data: &dyn DataPort,
    codes: &[String],
) -> Result<Box<dyn BrokerPort>, TraderError> {
    if !paper {
        return Ok(Box::new(KisBroker::new(KisConfig::from_config(config)?)?));
    }

    let broker = PaperBroker::new(env_config(config)?.initial_cash);
    for code in codes {
        if let Some(price) = data.latest_close(code)? {
            broker.set_price(code, price)?;
        }
    }
    tracing::info!("using paper broker");
    Ok(Box::new(broker))
}

fn run_features(config_path: &Path, code: &str, last: Option<usize>) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let data = open_data(&config)?;
    let bars = data.fetch_all(code)?;
    let features = compute_indicators(code, &bars)?;

    let skip = last.map_or(0, |n| features.len().saturating_sub(n));
    println!("date,{}", FEATURE_NAMES.join(","));
    for fv in &features[skip..] {
        let cells: Vec<String> = fv
            .raw_values()
            .iter()
            .map(|v| v.map(|x| x.to_string()).unwrap_or_default())
            .collect();
        println!("{},{}", fv.date(), cells.join(","));
    }
    Ok(())
}

fn run_simulate(
    config_path: &Path,
    code: &str,
    policy_path: Option<&Path>,
    segment: Segment,
) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let env_cfg = env_config(&config)?;
    let data = open_data(&config)?;

    let policy: Box<dyn PolicyPort> = match policy_path {
        Some(path) => Box::new(LinearPolicy::from_file(path)?),
        None => {
            let dir = config.require_string("trader", "policy_dir")?;
            LinearPolicyStore::new(PathBuf::from(dir)).load(code)?
        }
    };

    let bars = data.fetch_all(code)?;
    let features = compute_indicators(code, &bars)?;
    let split = split_chronological(&features, DEFAULT_TRAIN_RATIO, DEFAULT_VAL_RATIO)?;
    let rows = match segment {
        Segment::All => &features[..],
        Segment::Train => split.train,
        Segment::Validation => split.validation,
        Segment::Test => split.test,
    };

    let mut env = TradingEnv::new(rows.to_vec(), env_cfg)?;
    let result = run_episode(&mut env, policy.as_ref())?;
    let s = &result.summary;

    println!("code:           {code}");
    println!("steps:          {}", result.steps);
    println!("total reward:   {:.6}", result.total_reward);
    println!("start equity:   {:.0}", s.start_value);
    println!("end equity:     {:.0}", s.end_value);
    println!("return:         {:.2}%", s.total_return_pct);
    println!("max drawdown:   {:.2}%", s.max_drawdown_pct);
    println!("final position: {:.3}", result.final_position);
    Ok(())
}

fn run_trade(config_path: &Path, paper: bool) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let trader = trader_config(&config)?;
    let defaults = risk_defaults(&config)?;
    let policy_dir = config.require_string("trader", "policy_dir")?;

    let store = open_store(&config)?;
    let data = open_data(&config)?;
    let broker = open_broker(&config, paper, data.as_ref(), &trader.codes)?;
    let policies = LinearPolicyStore::new(PathBuf::from(policy_dir));

    let executor = OrderExecutor::new(broker.as_ref(), &store, &store, data.as_ref(), defaults);
    let ctx = TradingContext {
        data: data.as_ref(),
        policies: &policies,
        executor: &executor,
    };

    let outcomes = run_trading_cycle(&ctx, &trader)?;
    for o in &outcomes {
        let action = o.action.map_or("-".to_string(), |a| format!("{a:+.3}"));
        let decision = o.decision.map_or("-".to_string(), |d| d.to_string());
        let status = match &o.status {
            CycleStatus::Held => "held".to_string(),
            CycleStatus::Ordered(r) => format!("ordered {} x{}", r.side, r.quantity),
            CycleStatus::Rejected(reason) => format!("rejected: {reason}"),
            CycleStatus::Failed(reason) => format!("failed: {reason}"),
        };
        println!("{:<8} {:>7} {:<5} {}", o.code, action, decision, status);
    }
    Ok(())
}

fn run_order(
    config_path: &Path,
    side: Side,
    code: &str,
    quantity: Option<i64>,
    amount: Option<f64>,
    paper: bool,
) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let defaults = risk_defaults(&config)?;
    let store = open_store(&config)?;
    let data = open_data(&config)?;
    let broker = open_broker(&config, paper, data.as_ref(), &[code.to_string()])?;
    let executor = OrderExecutor::new(broker.as_ref(), &store, &store, data.as_ref(), defaults);

    let record = match (quantity, amount) {
        (Some(qty), _) => executor.execute_and_audit(side, code, qty)?,
        (None, Some(amount)) => executor.place_amount_order(side, code, amount)?,
        (None, None) => {
            return Err(TraderError::InvalidOrder {
                reason: "either --quantity or --amount is required".into(),
            });
        }
    };

    println!(
        "{} {} {} x{} price={} status={}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.side,
        record.code,
        record.quantity,
        record.price.map_or("-".to_string(), |p| format!("{p:.0}")),
        record.status
    );
    Ok(())
}

fn run_balance(config_path: &Path, paper: bool) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let data = open_data(&config)?;
    let codes = config
        .get_string("trader", "codes")
        .map(|s| parse_codes(&s))
        .unwrap_or_default();
    let broker = open_broker(&config, paper, data.as_ref(), &codes)?;
    let executor = OrderExecutor::new(
        broker.as_ref(),
        &store,
        &store,
        data.as_ref(),
        risk_defaults(&config)?,
    );

    let snapshot = executor.record_balance_snapshot()?;
    println!("total value:  {:.0}", snapshot.total_value);
    println!("cash:         {:.0}", snapshot.cash);
    println!("buy amount:   {:.0}", snapshot.total_buy_amount);
    println!("eval amount:  {:.0}", snapshot.total_eval_amount);
    println!("pnl:          {:.0}", snapshot.total_pnl);
    Ok(())
}

fn run_performance(config_path: &Path, days: i64) -> Result<(), TraderError> {
    let days = validate_lookback_days(days)?;
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let cutoff = Local::now().naive_local() - Duration::days(days);
    let snapshots = store.snapshots_since(cutoff)?;
    let report = summarize_performance(&snapshots);
    let s = &report.summary;

    println!("snapshots:    {}", report.series.len());
    println!("start value:  {:.0}", s.start_value);
    println!("end value:    {:.0}", s.end_value);
    println!("return:       {:.2}%", s.total_return_pct);
    println!("max drawdown: {:.2}%", s.max_drawdown_pct);
    println!("pnl sum:      {:.0}", s.pnl_sum);
    Ok(())
}

fn run_orders(config_path: &Path, code: Option<&str>, limit: usize) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    for r in store.order_history(code, limit)? {
        println!(
            "{} {:<4} {:<8} {:>6} {:>12} {}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.side,
            r.code,
            r.quantity,
            r.amount.map_or("-".to_string(), |a| format!("{a:.0}")),
            r.status
        );
    }
    Ok(())
}

fn run_risk_list(config_path: &Path) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let show = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    for s in store.list_risk_settings()? {
        println!(
            "{:<8} shares={} weight={} daily={} active={}",
            s.code,
            show(s.max_position_shares.map(|v| v.to_string())),
            show(s.max_weight_pct.map(|v| format!("{:.0}%", v * 100.0))),
            show(s.max_daily_buy_amount.map(|v| format!("{v:.0}"))),
            s.active
        );
    }
    Ok(())
}

fn run_risk_set(config_path: &Path, code: &str, update: RiskSettingUpdate) -> Result<(), TraderError> {
    if let Some(w) = update.max_weight_pct {
        if !(0.0..=1.0).contains(&w) {
            return Err(TraderError::InvalidOrder {
                reason: format!("max weight {w} must be between 0 and 1"),
            });
        }
    }
    if update.max_position_shares.is_some_and(|v| v < 0)
        || update.max_daily_buy_amount.is_some_and(|v| v < 0.0)
    {
        return Err(TraderError::InvalidOrder {
            reason: "risk limits must be non-negative".into(),
        });
    }

    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let saved = store.upsert_risk_setting(code, &update)?;
    println!(
        "saved {}: shares={:?} weight={:?} daily={:?} active={}",
        saved.code,
        saved.max_position_shares,
        saved.max_weight_pct,
        saved.max_daily_buy_amount,
        saved.active
    );
    Ok(())
}
