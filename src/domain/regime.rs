//! Regime scoring across universes (composite score, exposure bands, best universe).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::error::QuantError;
use crate::domain::settings::Settings;
use crate::domain::signals::{self, TrendSignal, DEFAULT_VOL_WINDOW_DAYS};
use crate::domain::universe::Universe;
use crate::ports::price_port::PricePort;

pub const DEFAULT_VOL_REFERENCE: f64 = 0.20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseScore {
    pub as_of_date: NaiveDate,
    pub universe_name: String,
    pub composite_score: f64,
    pub trend: f64,
    pub trend_bullish: bool,
    pub momentum_6m: f64,
    pub momentum_12m: f64,
    pub momentum_rank: usize,
    pub realized_vol: f64,
    pub drawdown: f64,
    pub suggested_equity_min: f64,
    pub suggested_equity_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeDecision {
    pub as_of_date: NaiveDate,
    pub best_universe: String,
    pub best_universe_score: f64,
    pub all_universe_scores: Vec<UniverseScore>,
}

impl RegimeDecision {
    pub fn best(&self) -> Option<&UniverseScore> {
        self.all_universe_scores
            .iter()
            .find(|s| s.universe_name == self.best_universe)
    }
}

/// Inputs to the composite regime score for one universe.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub trend: TrendSignal,
    pub momentum_rank: usize,
    pub realized_vol: f64,
    pub drawdown: f64,
    /// Yield-curve slope. Not wired to any data source yet; scoring awards +10 when positive.
    pub yield_curve: Option<f64>,
}

/// Blend trend, momentum rank, volatility and drawdown into a 0–100 score.
pub fn composite_score(inputs: &ScoreInputs, vol_reference: f64) -> f64 {
    let mut score = 0.0;

    if inputs.trend.is_bullish() {
        score += 30.0;
    }

    score += 30.0 * (4.0 - inputs.momentum_rank as f64) / 3.0;

    if !inputs.realized_vol.is_nan() && inputs.realized_vol > 0.0 {
        score += 20.0 * (vol_reference / inputs.realized_vol).min(1.0);
    }

    if matches!(inputs.yield_curve, Some(slope) if slope > 0.0) {
        score += 10.0;
    }

    if !inputs.drawdown.is_nan() {
        if inputs.drawdown < -0.10 {
            score -= 40.0;
        } else if inputs.drawdown < 0.0 {
            score += 10.0 * (inputs.drawdown / -0.10);
        }
    }

    score.clamp(0.0, 100.0)
}

/// Suggested equity exposure band for a composite score.
pub fn equity_exposure_from_score(score: f64) -> (f64, f64) {
    if score >= 80.0 {
        (0.9, 1.0)
    } else if score >= 60.0 {
        (0.7, 0.9)
    } else if score >= 40.0 {
        (0.4, 0.7)
    } else {
        (0.0, 0.3)
    }
}

struct UniverseSignals {
    universe: Universe,
    trend: TrendSignal,
    momentum_6m: f64,
    momentum_12m: f64,
    realized_vol: f64,
    drawdown: f64,
}

/// Score every configured universe from its benchmark's price history.
pub fn get_universe_scores(
    prices: &dyn PricePort,
    settings: &Settings,
    as_of_date: NaiveDate,
) -> Result<Vec<UniverseScore>, QuantError> {
    if settings.universes.is_empty() {
        return Err(QuantError::NoUniverseScores {
            reason: "no universes configured".to_string(),
        });
    }

    let mut computed = Vec::with_capacity(settings.universes.len());
    for &universe in &settings.universes {
        let Some(symbol) = universe.benchmark_symbol() else {
            return Err(QuantError::NoUniverseScores {
                reason: format!("universe {universe} has no benchmark symbol"),
            });
        };
        let series = prices.load_price_series(symbol, as_of_date)?;
        if series.is_empty() {
            return Err(QuantError::NoUniverseScores {
                reason: format!("no price history for {symbol} up to {as_of_date}"),
            });
        }

        let signal = UniverseSignals {
            universe,
            trend: signals::trend(&series)?,
            momentum_6m: signals::momentum(&series, 6),
            momentum_12m: signals::momentum(&series, 12),
            realized_vol: signals::realized_vol(&series, DEFAULT_VOL_WINDOW_DAYS),
            drawdown: signals::drawdown(&series),
        };
        debug!(
            universe = %universe,
            benchmark = symbol,
            total_return_12m = signal.trend.total_return_12m,
            momentum_6m = signal.momentum_6m,
            momentum_12m = signal.momentum_12m,
            realized_vol = signal.realized_vol,
            drawdown = signal.drawdown,
            "computed universe signals"
        );
        computed.push(signal);
    }

    let momentum: Vec<(String, f64, f64)> = computed
        .iter()
        .map(|s| (s.universe.name().to_string(), s.momentum_6m, s.momentum_12m))
        .collect();
    let ranks = signals::rank_momentum(&momentum);

    let scores = computed
        .into_iter()
        .zip(ranks)
        .map(|(s, (_, rank))| {
            let score = composite_score(
                &ScoreInputs {
                    trend: s.trend,
                    momentum_rank: rank,
                    realized_vol: s.realized_vol,
                    drawdown: s.drawdown,
                    yield_curve: None,
                },
                settings.vol_reference,
            );
            let (equity_min, equity_max) = equity_exposure_from_score(score);
            UniverseScore {
                as_of_date,
                universe_name: s.universe.name().to_string(),
                composite_score: score,
                trend: s.trend.total_return_12m,
                trend_bullish: s.trend.is_bullish(),
                momentum_6m: s.momentum_6m,
                momentum_12m: s.momentum_12m,
                momentum_rank: rank,
                realized_vol: s.realized_vol,
                drawdown: s.drawdown,
                suggested_equity_min: equity_min,
                suggested_equity_max: equity_max,
            }
        })
        .collect();

    Ok(scores)
}

/// Pick the highest-scoring universe. The first universe wins ties.
pub fn select_best(
    as_of_date: NaiveDate,
    scores: Vec<UniverseScore>,
) -> Result<RegimeDecision, QuantError> {
    let mut best: Option<&UniverseScore> = None;
    for score in &scores {
        match best {
            Some(current) if score.composite_score <= current.composite_score => {}
            _ => best = Some(score),
        }
    }
    let best = best.ok_or_else(|| QuantError::NoUniverseScores {
        reason: "universe score list is empty".to_string(),
    })?;

    Ok(RegimeDecision {
        as_of_date,
        best_universe: best.universe_name.clone(),
        best_universe_score: best.composite_score,
        all_universe_scores: scores.clone(),
    })
}

pub fn get_current_regime(
    prices: &dyn PricePort,
    settings: &Settings,
    as_of_date: NaiveDate,
) -> Result<RegimeDecision, QuantError> {
    let scores = get_universe_scores(prices, settings, as_of_date)?;
    let decision = select_best(as_of_date, scores)?;
    info!(
        as_of = %as_of_date,
        best_universe = %decision.best_universe,
        score = decision.best_universe_score,
        "regime decision"
    );
    Ok(decision)
}
