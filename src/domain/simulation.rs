//! Single-instrument market simulation used for training and backtesting.
//!
//! The environment turns a target position ratio into next-step equity and
//! reward. One instance drives exactly one instrument's series and must not be
//! shared between concurrent drivers.
//!
//! Equity is floored at [`EQUITY_FLOOR`] instead of modelling margin calls or
//! short settlement.

use crate::domain::error::TraderError;
use crate::domain::indicator::FeatureVector;
use crate::domain::metrics::{PerformanceSummary, summarize_equity};
use crate::domain::observation::{Observation, build_observation};
use crate::ports::policy_port::PolicyPort;
use chrono::NaiveDate;

pub const EQUITY_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub window_size: usize,
    pub initial_cash: f64,
    pub max_position: f64,
    pub transaction_cost: f64,
    pub reward_scale: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            initial_cash: 1_000_000.0,
            max_position: 1.0,
            transaction_cost: 0.0005,
            reward_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Initialized,
    Running,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionState {
    pub position: f64,
    /// Equity not allocated to the position: equity × (1 - position).
    pub cash: f64,
    pub equity: f64,
    pub equity_start: f64,
}

impl PositionState {
    fn flat(initial_cash: f64) -> Self {
        Self {
            position: 0.0,
            cash: initial_cash,
            equity: initial_cash,
            equity_start: initial_cash,
        }
    }

    pub fn cumulative_return(&self) -> f64 {
        self.equity / self.equity_start - 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    pub equity: f64,
    pub position: f64,
    pub price_return: f64,
    pub step_return: f64,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub info: StepInfo,
}

/// Cost of moving from `current` to `target` position at the given rate.
pub fn trade_cost(equity: f64, current: f64, target: f64, rate: f64) -> f64 {
    equity * (target - current).abs() * rate
}

pub struct TradingEnv {
    config: EnvConfig,
    features: Vec<FeatureVector>,
    prices: Vec<f64>,
    state: EnvState,
    cursor: usize,
    account: PositionState,
}

impl TradingEnv {
    pub fn new(features: Vec<FeatureVector>, config: EnvConfig) -> Result<Self, TraderError> {
        if config.window_size == 0 {
            return Err(TraderError::Simulation {
                reason: "window_size must be positive".into(),
            });
        }
        if !(config.max_position.is_finite() && config.max_position >= 0.0) {
            return Err(TraderError::Simulation {
                reason: format!("invalid max_position {}", config.max_position),
            });
        }
        if !(config.initial_cash.is_finite() && config.initial_cash > 0.0) {
            return Err(TraderError::Simulation {
                reason: format!("invalid initial_cash {}", config.initial_cash),
            });
        }
        if features.len() <= config.window_size + 1 {
            let code = features
                .first()
                .map(|f| f.bar.code.clone())
                .unwrap_or_default();
            return Err(TraderError::InsufficientData {
                code,
                bars: features.len(),
                minimum: config.window_size + 2,
            });
        }

        let prices = features.iter().map(|f| f.close()).collect();
        let account = PositionState::flat(config.initial_cash);
        Ok(Self {
            config,
            features,
            prices,
            state: EnvState::Initialized,
            cursor: 0,
            account,
        })
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    pub fn account(&self) -> PositionState {
        self.account
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn n_steps(&self) -> usize {
        self.features.len()
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Flat position, equity back to `initial_cash`, cursor at `window_size`.
    pub fn reset(&mut self) -> Result<(Observation, StepInfo), TraderError> {
        self.account = PositionState::flat(self.config.initial_cash);
        self.cursor = self.config.window_size;
        self.state = EnvState::Running;

        let info = StepInfo {
            equity: self.account.equity,
            position: self.account.position,
            price_return: 0.0,
            step_return: 0.0,
        };
        Ok((self.observation()?, info))
    }

    pub fn step(&mut self, raw_action: f64) -> Result<StepOutcome, TraderError> {
        match self.state {
            EnvState::Running => {}
            EnvState::Initialized => {
                return Err(TraderError::Simulation {
                    reason: "step called before reset".into(),
                });
            }
            EnvState::Terminated => {
                return Err(TraderError::Simulation {
                    reason: "step called after termination".into(),
                });
            }
        }
        if !raw_action.is_finite() {
            return Err(TraderError::Simulation {
                reason: format!("action {raw_action} is not finite"),
            });
        }

        let max = self.config.max_position;
        let target = raw_action.clamp(-max, max);

        let t = self.cursor;
        let prev_price = self.prices[t - 1];
        let curr_price = self.prices[t];
        let price_return = if prev_price <= 0.0 {
            0.0
        } else {
            (curr_price - prev_price) / prev_price
        };

        let prev_equity = self.account.equity;
        let cost = trade_cost(
            prev_equity,
            self.account.position,
            target,
            self.config.transaction_cost,
        );
        let pnl = prev_equity * target * price_return - cost;
        let equity = (prev_equity + pnl).max(EQUITY_FLOOR);
        let step_return = (equity - prev_equity) / prev_equity.max(EQUITY_FLOOR);
        let reward = self.config.reward_scale * step_return;

        self.account.position = target;
        self.account.equity = equity;
        self.account.cash = equity * (1.0 - target);
        self.cursor += 1;

        let terminated = self.cursor >= self.features.len() - 1;
        if terminated {
            self.state = EnvState::Terminated;
        }

        Ok(StepOutcome {
            observation: self.observation()?,
            reward,
            terminated,
            info: StepInfo {
                equity,
                position: target,
                price_return,
                step_return,
            },
        })
    }

    /// Date of the bar whose close priced the most recent step.
    fn last_priced_date(&self) -> NaiveDate {
        self.features[self.cursor - 1].date()
    }

    fn observation(&self) -> Result<Observation, TraderError> {
        let start = self.cursor - self.config.window_size;
        build_observation(
            &self.features[start..self.cursor],
            self.account.position,
            self.account.cumulative_return(),
            self.config.window_size,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone)]
pub struct EpisodeResult {
    pub steps: usize,
    pub total_reward: f64,
    pub final_position: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub summary: PerformanceSummary,
}

/// Resets the environment and drives it with the policy until termination.
pub fn run_episode(
    env: &mut TradingEnv,
    policy: &dyn PolicyPort,
) -> Result<EpisodeResult, TraderError> {
    let (mut observation, info) = env.reset()?;
    let start_date = env.features[env.cursor - 1].date();
    let mut equity_curve = vec![EquityPoint {
        date: start_date,
        equity: info.equity,
    }];
    let mut total_reward = 0.0;
    let mut steps = 0;

    loop {
        let action = policy.act(&observation)?;
        let outcome = env.step(action)?;
        steps += 1;
        total_reward += outcome.reward;
        equity_curve.push(EquityPoint {
            date: env.last_priced_date(),
            equity: outcome.info.equity,
        });
        observation = outcome.observation;
        if outcome.terminated {
            break;
        }
    }

    let equities: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
    tracing::debug!(
        steps,
        total_reward,
        final_equity = env.account.equity,
        "episode finished"
    );

    Ok(EpisodeResult {
        steps,
        total_reward,
        final_position: env.account.position,
        summary: summarize_equity(&equities),
        equity_curve,
    })
}
