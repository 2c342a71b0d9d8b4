//! Stage plan structures and functions.
//!
//! A load test is described as a series of stages, each ramping the number of
//! virtual users linearly from the previous stage's target to its own over its
//! duration. The curve always starts at 0 users.
//!
//! Stages are written as `{timespan}:{target}`, separated by `,` or `;`. For example
//! `30s:20,1m:20,30s:0` ramps up to 20 users over 30 seconds, holds 20 users for a
//! minute, then ramps back down to 0 over 30 seconds.

use chrono::prelude::*;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::util;
use crate::LoadTestError;

/// The longest plan accepted, so the run deadline always fits in an `Instant`.
pub const MAX_PLAN_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// One stage of a [`StagePlan`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// How long it takes to reach `target`.
    pub duration: Duration,
    /// How many virtual users are running when this stage ends.
    pub target: usize,
}
impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Stage { duration, target }
    }
}

/// An ordered, non-empty list of [`Stage`]s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Stage>", into = "Vec<Stage>")]
pub struct StagePlan {
    stages: Vec<Stage>,
}
impl StagePlan {
    /// Build a stage plan, which must contain at least one stage and last no longer
    /// than [`MAX_PLAN_DURATION`].
    ///
    /// # Example
    /// ```rust
    /// use std::time::Duration;
    /// use stampede::stage::{Stage, StagePlan};
    ///
    /// let plan = StagePlan::new(vec![
    ///     Stage::new(Duration::from_secs(30), 20),
    ///     Stage::new(Duration::from_secs(60), 20),
    ///     Stage::new(Duration::from_secs(30), 0),
    /// ]).unwrap();
    /// assert_eq!(plan.total_duration(), Duration::from_secs(120));
    /// assert_eq!(plan.max_target(), 20);
    /// ```
    pub fn new(stages: Vec<Stage>) -> Result<Self, LoadTestError> {
        if stages.is_empty() {
            return Err(LoadTestError::InvalidStage {
                stage: String::new(),
                detail: "at least one stage is required".to_string(),
            });
        }
        let total = stages
            .iter()
            .try_fold(Duration::ZERO, |total, stage| total.checked_add(stage.duration));
        match total {
            Some(total) if total <= MAX_PLAN_DURATION => Ok(StagePlan { stages }),
            _ => Err(LoadTestError::InvalidStage {
                stage: stages
                    .iter()
                    .map(|stage| format!("{}ms:{}", stage.duration.as_millis(), stage.target))
                    .join(","),
                detail: format!(
                    "the stages can not last longer than {} days in total",
                    MAX_PLAN_DURATION.as_secs() / (24 * 60 * 60)
                ),
            }),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The sum of all stage durations.
    pub fn total_duration(&self) -> Duration {
        // Bounded by MAX_PLAN_DURATION in new().
        self.stages.iter().map(|stage| stage.duration).sum()
    }

    /// The most virtual users the plan ever asks for.
    pub fn max_target(&self) -> usize {
        self.stages
            .iter()
            .map(|stage| stage.target)
            .max()
            .unwrap_or(0)
    }

    /// The index of the stage running at `elapsed`.
    ///
    /// Zero-duration stages are never "running", they take effect immediately. Past
    /// the end of the plan this is the last stage.
    pub fn stage_index_at(&self, elapsed: Duration) -> usize {
        let mut end = Duration::ZERO;
        for (index, stage) in self.stages.iter().enumerate() {
            end += stage.duration;
            if elapsed < end {
                return index;
            }
        }
        self.stages.len() - 1
    }

    /// The interpolated concurrency target at `elapsed`.
    ///
    /// # Example
    /// ```rust
    /// use std::time::Duration;
    /// use stampede::stage::StagePlan;
    ///
    /// let plan: StagePlan = "10s:10,10s:10,10s:0".parse().unwrap();
    /// assert_eq!(plan.target_at(Duration::ZERO), 0.0);
    /// assert_eq!(plan.target_at(Duration::from_secs(5)), 5.0);
    /// assert_eq!(plan.target_at(Duration::from_secs(15)), 10.0);
    /// assert_eq!(plan.target_at(Duration::from_secs(25)), 5.0);
    /// assert_eq!(plan.target_at(Duration::from_secs(60)), 0.0);
    /// ```
    pub fn target_at(&self, elapsed: Duration) -> f64 {
        let mut start = Duration::ZERO;
        let mut from = 0.0;
        for stage in &self.stages {
            let end = start + stage.duration;
            let to = stage.target as f64;
            if elapsed < end {
                let progress = (elapsed - start).as_secs_f64() / stage.duration.as_secs_f64();
                return from + (to - from) * progress;
            }
            from = to;
            start = end;
        }
        from
    }

    /// A lazy sequence of [`Checkpoint`]s, starting at 0 and always including the
    /// exact end of the plan.
    ///
    /// Checkpoints are at most `tick` apart. On a ramp there is also a checkpoint
    /// each time the rounded target changes, so the target never lags the curve
    /// by more than one user between two checkpoints.
    ///
    /// # Example
    /// ```rust
    /// use std::time::Duration;
    /// use stampede::stage::StagePlan;
    ///
    /// let plan: StagePlan = "2s:4".parse().unwrap();
    /// let mut targets: Vec<usize> = plan
    ///     .checkpoints(Duration::from_millis(500))
    ///     .map(|checkpoint| checkpoint.target)
    ///     .collect();
    /// targets.dedup();
    /// assert_eq!(targets, vec![0, 1, 2, 3, 4]);
    /// ```
    pub fn checkpoints(&self, tick: Duration) -> Checkpoints<'_> {
        Checkpoints {
            plan: self,
            // A zero tick would never advance.
            tick: tick.max(Duration::from_millis(1)),
            total: self.total_duration(),
            next: Some(Duration::ZERO),
        }
    }

    /// When the rounded target next changes after `elapsed`, or the running stage ends.
    ///
    /// `target` is the rounded target at `elapsed`. Returns `None` past the end of
    /// the plan.
    fn next_change(&self, elapsed: Duration, target: f64) -> Option<Duration> {
        let mut start = Duration::ZERO;
        let mut from = 0.0;
        for stage in &self.stages {
            let end = start + stage.duration;
            let to = stage.target as f64;
            if elapsed < end {
                if to == from {
                    return Some(end);
                }
                // Rounding changes half a user above or below the current target.
                let boundary = if to > from {
                    target + 0.5
                } else {
                    target - 0.5
                };
                let progress = ((boundary - from) / (to - from)).clamp(0.0, 1.0);
                let crossing = start + stage.duration.mul_f64(progress);
                if crossing <= elapsed {
                    // Already on the boundary, step just past it.
                    return Some((elapsed + Duration::from_nanos(1)).min(end));
                }
                return Some(crossing.min(end));
            }
            from = to;
            start = end;
        }
        None
    }

    /// Describe stage `index` for the run history, as it starts.
    pub fn describe(&self, index: usize) -> Option<StageHistory> {
        let stage = self.stages.get(index)?;
        let from = match index {
            0 => 0,
            _ => self.stages[index - 1].target,
        };
        Some(StageHistory::step(from, stage.target, stage.duration))
    }
}

/// Convert `"{timespan}:{target}"` formatted stages into a [`StagePlan`].
///
/// Time span can be specified as an integer, indicating seconds. Or can use integers together
/// with one or more of "h", "m", "s" and "ms", in that order. Valid formats include: 20, 20s,
/// 3m, 2h, 1h20m, 3h30m10s, 500ms, etc.
impl FromStr for StagePlan {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut stages = Vec::new();
        for definition in s.split([',', ';']) {
            let definition = definition.trim();
            // Tolerate a trailing separator.
            if definition.is_empty() {
                continue;
            }
            stages.push(parse_stage(definition)?);
        }
        StagePlan::new(stages)
    }
}

impl TryFrom<Vec<Stage>> for StagePlan {
    type Error = LoadTestError;

    fn try_from(stages: Vec<Stage>) -> Result<Self, Self::Error> {
        StagePlan::new(stages)
    }
}

impl From<StagePlan> for Vec<Stage> {
    fn from(plan: StagePlan) -> Self {
        plan.stages
    }
}

impl fmt::Display for StagePlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, stage) in self.stages.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}ms:{}", stage.duration.as_millis(), stage.target)?;
        }
        Ok(())
    }
}

fn parse_stage(definition: &str) -> Result<Stage, LoadTestError> {
    let invalid = |detail: &str| LoadTestError::InvalidStage {
        stage: definition.to_string(),
        detail: detail.to_string(),
    };

    let (duration, target) = definition.split_once(':').ok_or_else(|| {
        invalid("expected format \"{timespan}:{target}\", ie \"30s:20\" or \"1m30s:100\"")
    })?;
    let (duration, target) = (duration.trim(), target.trim());

    if duration.starts_with('-') {
        return Err(invalid("stage duration can not be negative"));
    }
    let duration = util::parse_timespan(duration).ok_or_else(|| {
        invalid("{timespan} can be integer seconds or \"500ms\", \"30s\", \"20m\", \"1h30m\", etc")
    })?;

    if target.starts_with('-') {
        return Err(invalid("stage target can not be negative"));
    }
    let target = target
        .parse::<usize>()
        .map_err(|_| invalid("{target} must be a whole number of virtual users"))?;

    Ok(Stage { duration, target })
}

/// One point on the interpolated concurrency curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    /// Time since the start of the run.
    pub elapsed: Duration,
    /// Interpolated target, rounded to the nearest whole user.
    pub target: usize,
    /// Index of the stage running at `elapsed`.
    pub stage: usize,
}

/// Iterator returned by [`StagePlan::checkpoints`].
#[derive(Debug)]
pub struct Checkpoints<'a> {
    plan: &'a StagePlan,
    tick: Duration,
    total: Duration,
    next: Option<Duration>,
}
impl Iterator for Checkpoints<'_> {
    type Item = Checkpoint;

    fn next(&mut self) -> Option<Checkpoint> {
        let elapsed = self.next?;
        let target = self.plan.target_at(elapsed).round().max(0.0);
        self.next = if elapsed >= self.total {
            None
        } else {
            let mut next = (elapsed + self.tick).min(self.total);
            if let Some(change) = self.plan.next_change(elapsed, target) {
                next = next.min(change);
            }
            Some(next)
        };
        Some(Checkpoint {
            elapsed,
            target: target as usize,
            stage: self.plan.stage_index_at(elapsed),
        })
    }
}

/// Each stage of a run performs one of the following actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StageAction {
    /// A stage that is increasing the number of virtual users.
    Increasing,
    /// A stage that is maintaining the number of virtual users.
    Maintaining,
    /// A stage that is decreasing the number of virtual users.
    Decreasing,
    /// The final entry indicating that the load test is finished.
    Finished,
}

/// A historical record of a single stage, used when reporting the metrics.
#[derive(Clone, Debug)]
pub struct StageHistory {
    /// What happened in this stage.
    pub action: StageAction,
    /// When the stage started.
    pub timestamp: DateTime<Utc>,
    /// The number of users the stage starts from.
    pub from: usize,
    /// The number of users the stage ends at.
    pub to: usize,
    /// How long the stage was planned to run.
    pub duration: Duration,
}
impl StageHistory {
    pub(crate) fn step(from: usize, to: usize, duration: Duration) -> StageHistory {
        let action = match from.cmp(&to) {
            std::cmp::Ordering::Less => StageAction::Increasing,
            std::cmp::Ordering::Equal => StageAction::Maintaining,
            std::cmp::Ordering::Greater => StageAction::Decreasing,
        };
        StageHistory {
            action,
            timestamp: Utc::now(),
            from,
            to,
            duration,
        }
    }

    pub(crate) fn finished(users: usize) -> StageHistory {
        StageHistory {
            action: StageAction::Finished,
            timestamp: Utc::now(),
            from: users,
            to: 0,
            duration: Duration::ZERO,
        }
    }
}
