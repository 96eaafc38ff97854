//! Selector builders.
//!
//! Every builder takes the shared [`PathSelectorContext`] and a by-value
//! [`SelectorConfig`]. A stopping strategy is mandatory: it is taken from the
//! context if an earlier builder created one, otherwise created from
//! `step_limit`. Without either, building fails with
//! [`ConfigError::MissingStoppingStrategy`].

use std::cell::RefCell;
use std::rc::Rc;

use super::{
    InterleavedSelector, PathSelector, PathSelectorContext, QueueOrder, QueueSelector, RandomPathSelector,
    RandomSelector, RankedSelector, ScoringSelector, WeightedRandomSelector,
};
use crate::config::{Settings, StrategyOption};
use crate::error::ConfigError;
use crate::strategies::{
    ChoosingStrategy, CoveredNewChoosing, DepthChoosing, DistanceChoosing, ScoringStrategy,
    StepsLimitStoppingStrategy, StoppingStrategy, VisitCountChoosing,
};

/// Options recognized by every selector builder.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SelectorConfig {
    pub strategy: StrategyOption,
    pub step_limit: Option<usize>,
    pub seed: Option<u64>,
}

impl SelectorConfig {
    /// Top-level exploration defaults.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            strategy: settings.strategy,
            step_limit: Some(settings.step_limit),
            seed: settings.seed_in_path_selector,
        }
    }

    /// Defaults for driving one probe method.
    pub fn for_probe(settings: &Settings) -> Self {
        Self {
            step_limit: Some(settings.probe_step_limit),
            ..Self::from_settings(settings)
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SelectorKind {
    Bfs,
    Dfs,
    MinimalDistance,
    VisitCounting,
    Random,
    RandomPath,
    Rp,
    Depth,
    CoveredNew,
}

fn stopping_strategy(
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
    selector: &'static str,
) -> Result<Rc<RefCell<dyn StoppingStrategy>>, ConfigError> {
    if let Some(stopping) = ctx.stopping_strategy() {
        return Ok(Rc::clone(stopping));
    }
    let limit = config
        .step_limit
        .ok_or(ConfigError::MissingStoppingStrategy { selector })?;
    let stopping: Rc<RefCell<dyn StoppingStrategy>> = Rc::new(RefCell::new(StepsLimitStoppingStrategy::new(limit)));
    ctx.set_stopping_strategy(Rc::clone(&stopping));
    Ok(stopping)
}

fn choosing_strategy(ctx: &mut PathSelectorContext, strategy: StrategyOption) -> Box<dyn ChoosingStrategy> {
    match strategy {
        StrategyOption::Distance => Box::new(DistanceChoosing::new(ctx.distance_statistics())),
        StrategyOption::VisitCounting => Box::new(VisitCountChoosing::new(ctx.visit_statistics())),
    }
}

fn queue_selector(
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
    order: QueueOrder,
    name: &'static str,
) -> Result<QueueSelector, ConfigError> {
    let stopping = stopping_strategy(ctx, config, name)?;
    let choosing = choosing_strategy(ctx, config.strategy);
    Ok(QueueSelector::new(order, choosing, ctx.instrumentation(stopping)))
}

pub fn bfs_selector(ctx: &mut PathSelectorContext, config: &SelectorConfig) -> Result<QueueSelector, ConfigError> {
    queue_selector(ctx, config, QueueOrder::Bfs, "bfs")
}

pub fn dfs_selector(ctx: &mut PathSelectorContext, config: &SelectorConfig) -> Result<QueueSelector, ConfigError> {
    queue_selector(ctx, config, QueueOrder::Dfs, "dfs")
}

pub fn minimal_distance_selector(
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
) -> Result<RankedSelector, ConfigError> {
    let stopping = stopping_strategy(ctx, config, "minimal-distance")?;
    let choosing = choosing_strategy(ctx, StrategyOption::Distance);
    Ok(RankedSelector::new("minimal-distance", choosing, ctx.instrumentation(stopping)))
}

pub fn visit_counting_selector(
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
) -> Result<RankedSelector, ConfigError> {
    let stopping = stopping_strategy(ctx, config, "visit-counting")?;
    let choosing = choosing_strategy(ctx, StrategyOption::VisitCounting);
    Ok(RankedSelector::new("visit-counting", choosing, ctx.instrumentation(stopping)))
}

pub fn random_selector(ctx: &mut PathSelectorContext, config: &SelectorConfig) -> Result<RandomSelector, ConfigError> {
    let stopping = stopping_strategy(ctx, config, "random")?;
    Ok(RandomSelector::new(config.seed, ctx.instrumentation(stopping)))
}

pub fn random_path_selector(
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
) -> Result<RandomPathSelector, ConfigError> {
    let stopping = stopping_strategy(ctx, config, "random-path")?;
    Ok(RandomPathSelector::new(config.seed, ctx.instrumentation(stopping)))
}

pub fn rp_selector(
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
) -> Result<WeightedRandomSelector, ConfigError> {
    let stopping = stopping_strategy(ctx, config, "rp")?;
    let choosing = choosing_strategy(ctx, config.strategy);
    Ok(WeightedRandomSelector::new(config.seed, choosing, ctx.instrumentation(stopping)))
}

/// Weighted random pick favoring shallow states.
pub fn depth_selector(
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
) -> Result<WeightedRandomSelector, ConfigError> {
    let stopping = stopping_strategy(ctx, config, "depth")?;
    Ok(WeightedRandomSelector::new(config.seed, Box::new(DepthChoosing), ctx.instrumentation(stopping)).named("depth"))
}

/// Weighted random pick favoring states that just covered new code.
pub fn covered_new_selector(
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
) -> Result<WeightedRandomSelector, ConfigError> {
    let stopping = stopping_strategy(ctx, config, "covered-new")?;
    let choosing = Box::new(CoveredNewChoosing::new(ctx.distance_statistics()));
    Ok(WeightedRandomSelector::new(config.seed, choosing, ctx.instrumentation(stopping)).named("covered-new"))
}

pub fn scoring_selector(
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
    scoring: Box<dyn ScoringStrategy>,
) -> Result<ScoringSelector, ConfigError> {
    let stopping = stopping_strategy(ctx, config, "scoring")?;
    let distance = ctx.distance_statistics();
    Ok(ScoringSelector::new(scoring, distance, ctx.instrumentation(stopping)))
}

/// Interleaves `members`, which should have been built from the same `ctx`.
pub fn interleaved_selector(
    ctx: &mut PathSelectorContext,
    members: Vec<Box<dyn PathSelector>>,
) -> Result<InterleavedSelector, ConfigError> {
    if members.is_empty() {
        return Err(ConfigError::EmptyInterleaving);
    }
    let stopping = ctx
        .stopping_strategy()
        .cloned()
        .ok_or(ConfigError::MissingStoppingStrategy { selector: "interleaved" })?;
    Ok(InterleavedSelector::new(members, ctx.instrumentation(stopping)))
}

pub fn build_selector(
    kind: SelectorKind,
    ctx: &mut PathSelectorContext,
    config: &SelectorConfig,
) -> Result<Box<dyn PathSelector>, ConfigError> {
    Ok(match kind {
        SelectorKind::Bfs => Box::new(bfs_selector(ctx, config)?),
        SelectorKind::Dfs => Box::new(dfs_selector(ctx, config)?),
        SelectorKind::MinimalDistance => Box::new(minimal_distance_selector(ctx, config)?),
        SelectorKind::VisitCounting => Box::new(visit_counting_selector(ctx, config)?),
        SelectorKind::Random => Box::new(random_selector(ctx, config)?),
        SelectorKind::RandomPath => Box::new(random_path_selector(ctx, config)?),
        SelectorKind::Rp => Box::new(rp_selector(ctx, config)?),
        SelectorKind::Depth => Box::new(depth_selector(ctx, config)?),
        SelectorKind::CoveredNew => Box::new(covered_new_selector(ctx, config)?),
    })
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::super::testing::context;
    use super::*;
    use crate::types::{Edge, Location};

    const KINDS: [SelectorKind; 9] = [
        SelectorKind::Bfs,
        SelectorKind::Dfs,
        SelectorKind::MinimalDistance,
        SelectorKind::VisitCounting,
        SelectorKind::Random,
        SelectorKind::RandomPath,
        SelectorKind::Rp,
        SelectorKind::Depth,
        SelectorKind::CoveredNew,
    ];

    fn unbounded() -> SelectorConfig {
        SelectorConfig {
            strategy: StrategyOption::Distance,
            step_limit: None,
            seed: Some(1),
        }
    }

    #[test]
    fn test_missing_stopping_strategy_fails_at_build() {
        for kind in KINDS {
            let mut ctx = context(&[(0, 1)], 2);
            let err = build_selector(kind, &mut ctx, &unbounded()).err();
            assert!(
                matches!(err, Some(ConfigError::MissingStoppingStrategy { .. })),
                "{:?} built without a stopping strategy",
                kind
            );
        }

        struct Never;
        impl ScoringStrategy for Never {
            fn score(&mut self, _state: &crate::state::ExecutionState) -> crate::strategies::Score {
                crate::strategies::Score::Infeasible
            }
        }
        let mut ctx = context(&[(0, 1)], 2);
        assert!(scoring_selector(&mut ctx, &unbounded(), Box::new(Never)).is_err());
        assert!(matches!(
            interleaved_selector(&mut ctx, Vec::new()),
            Err(ConfigError::EmptyInterleaving)
        ));
    }

    #[test]
    fn test_context_stopping_strategy_is_shared() {
        let mut ctx = context(&[(0, 1)], 2);
        let bounded = SelectorConfig {
            step_limit: Some(0),
            ..unbounded()
        };
        let first = bfs_selector(&mut ctx, &bounded).unwrap();
        let second = random_selector(&mut ctx, &unbounded()).unwrap();
        first.instrumentation().on_traverse(Edge::new(Location::new(0), Location::new(1)));
        assert!(second.should_stop());
    }

    #[test]
    fn test_probe_config() {
        let settings = Settings::default();
        let config = SelectorConfig::for_probe(&settings);
        assert_eq!(config.step_limit, Some(settings.probe_step_limit));
        assert_eq!(config.seed, settings.seed_in_path_selector);
    }
}
