// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Humanized pacing between sends.
//!
//! Each task gets a fresh [`DelayPlan`]: a normally distributed think time,
//! the base interval plus Beta(2,2) jitter, a backlog term proportional to
//! queue depth, and a short uniform operation delay right before the send.

use std::time::Duration;

use rand::Rng;
use rand_distr::{Beta, Distribution, Normal};

use herald_config::model::DelayConfig;
use herald_config::validation::{validate_delay, MAX_DELAY_SECS};
use herald_core::HeraldError;

/// Longest single wait the model ever produces.
const MAX_WAIT: Duration = Duration::from_secs(MAX_DELAY_SECS as u64);

/// Immutable pacing parameters, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayParameters {
    pub send_interval: f64,
    pub send_jitter: f64,
    pub think_time_min: f64,
    pub think_time_max: f64,
    pub operation_delay_min: f64,
    pub operation_delay_max: f64,
    pub batch_delay_factor: f64,
    pub rest_probability: f64,
    pub rest_time_min: f64,
    pub rest_time_max: f64,
}

impl DelayParameters {
    /// No waiting at all. Used by tests and benchmarks.
    pub fn zero() -> Self {
        Self {
            send_interval: 0.0,
            send_jitter: 0.0,
            think_time_min: 0.0,
            think_time_max: 0.0,
            operation_delay_min: 0.0,
            operation_delay_max: 0.0,
            batch_delay_factor: 0.0,
            rest_probability: 0.0,
            rest_time_min: 0.0,
            rest_time_max: 0.0,
        }
    }
}

impl From<&DelayConfig> for DelayParameters {
    fn from(config: &DelayConfig) -> Self {
        Self {
            send_interval: config.send_interval,
            send_jitter: config.send_jitter,
            think_time_min: config.think_time_min,
            think_time_max: config.think_time_max,
            operation_delay_min: config.operation_delay_min,
            operation_delay_max: config.operation_delay_max,
            batch_delay_factor: config.batch_delay_factor,
            rest_probability: config.rest_probability,
            rest_time_min: config.rest_time_min,
            rest_time_max: config.rest_time_max,
        }
    }
}

impl From<&DelayParameters> for DelayConfig {
    fn from(params: &DelayParameters) -> Self {
        Self {
            send_interval: params.send_interval,
            send_jitter: params.send_jitter,
            think_time_min: params.think_time_min,
            think_time_max: params.think_time_max,
            operation_delay_min: params.operation_delay_min,
            operation_delay_max: params.operation_delay_max,
            batch_delay_factor: params.batch_delay_factor,
            rest_probability: params.rest_probability,
            rest_time_min: params.rest_time_min,
            rest_time_max: params.rest_time_max,
        }
    }
}

impl Default for DelayParameters {
    fn default() -> Self {
        Self::from(&DelayConfig::default())
    }
}

/// The sampled waits for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelayPlan {
    pub think: Duration,
    pub interval: Duration,
    pub jitter: Duration,
    pub batch: Duration,
    /// Applied immediately before the send call.
    pub operation: Duration,
}

impl DelayPlan {
    /// Everything waited before the operation delay.
    pub fn pre_send(&self) -> Duration {
        self.think
            .saturating_add(self.interval)
            .saturating_add(self.jitter)
            .saturating_add(self.batch)
    }

    pub fn total(&self) -> Duration {
        self.pre_send().saturating_add(self.operation)
    }
}

/// Samples [`DelayPlan`]s from validated [`DelayParameters`].
#[derive(Debug, Clone)]
pub struct DelayModel {
    params: DelayParameters,
    think: Normal<f64>,
    jitter: Beta<f64>,
}

impl DelayModel {
    /// Fails with the same checks as the `[delay]` configuration section.
    pub fn new(params: DelayParameters) -> Result<Self, HeraldError> {
        let mut errors = Vec::new();
        validate_delay(&DelayConfig::from(&params), &mut errors);
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(HeraldError::Config(messages.join("; ")));
        }

        let mean = (params.think_time_min + params.think_time_max) / 2.0;
        let std_dev = (params.think_time_max - params.think_time_min) / 4.0;
        let think = Normal::new(mean, std_dev)
            .map_err(|e| HeraldError::Config(format!("think time distribution: {e}")))?;
        let jitter = Beta::new(2.0, 2.0)
            .map_err(|e| HeraldError::Config(format!("jitter distribution: {e}")))?;

        Ok(Self {
            params,
            think,
            jitter,
        })
    }

    pub fn params(&self) -> &DelayParameters {
        &self.params
    }

    /// Samples a plan for a task with `queue_depth` tasks waiting behind it.
    pub fn compute(&self, queue_depth: usize) -> DelayPlan {
        self.compute_with_rng(queue_depth, &mut rand::thread_rng())
    }

    pub fn compute_with_rng<R: Rng + ?Sized>(&self, queue_depth: usize, rng: &mut R) -> DelayPlan {
        let p = &self.params;
        let think = self
            .think
            .sample(rng)
            .clamp(p.think_time_min, p.think_time_max);
        let jitter = p.send_jitter * self.jitter.sample(rng);
        let batch = queue_depth as f64 * p.batch_delay_factor;
        let operation = rng.gen_range(p.operation_delay_min..=p.operation_delay_max);

        DelayPlan {
            think: secs(think),
            interval: secs(p.send_interval),
            jitter: secs(jitter),
            batch: secs(batch),
            operation: secs(operation),
        }
    }

    /// Rest taken after a successful send, if the dice say so.
    pub fn rest_after_send(&self) -> Option<Duration> {
        self.rest_after_send_with_rng(&mut rand::thread_rng())
    }

    pub fn rest_after_send_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Duration> {
        let p = &self.params;
        if p.rest_probability <= 0.0 || !rng.gen_bool(p.rest_probability) {
            return None;
        }
        Some(secs(rng.gen_range(p.rest_time_min..=p.rest_time_max)))
    }
}

/// Seconds to a `Duration`, treating negatives and NaN as zero and capping
/// at [`MAX_WAIT`].
fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).map_or(MAX_WAIT, |d| d.min(MAX_WAIT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn within(d: Duration, min: f64, max: f64) -> bool {
        let s = d.as_secs_f64();
        s >= min - 1e-6 && s <= max + 1e-6
    }

    #[test]
    fn zero_parameters_produce_zero_plan() {
        let model = DelayModel::new(DelayParameters::zero()).unwrap();
        let plan = model.compute(50);
        assert_eq!(plan, DelayPlan::default());
        assert_eq!(model.rest_after_send(), None);
    }

    #[test]
    fn batch_term_scales_with_depth() {
        let params = DelayParameters {
            batch_delay_factor: 0.5,
            ..DelayParameters::zero()
        };
        let model = DelayModel::new(params).unwrap();
        assert_eq!(model.compute(4).batch, Duration::from_secs(2));
        assert_eq!(model.compute(0).batch, Duration::ZERO);
    }

    #[test]
    fn certain_rest_is_within_range() {
        let params = DelayParameters {
            rest_probability: 1.0,
            rest_time_min: 10.0,
            rest_time_max: 30.0,
            ..DelayParameters::zero()
        };
        let model = DelayModel::new(params).unwrap();
        let rest = model.rest_after_send().expect("probability 1 always rests");
        assert!(within(rest, 10.0, 30.0));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let inverted = DelayParameters {
            think_time_min: 2.0,
            think_time_max: 1.0,
            ..DelayParameters::default()
        };
        assert!(DelayModel::new(inverted).is_err());

        let bad_probability = DelayParameters {
            rest_probability: 1.2,
            ..DelayParameters::default()
        };
        assert!(DelayModel::new(bad_probability).is_err());

        let negative = DelayParameters {
            send_interval: -0.1,
            ..DelayParameters::default()
        };
        assert!(DelayModel::new(negative).is_err());
    }

    #[test]
    fn oversized_parameters_are_rejected() {
        let huge = DelayParameters {
            send_interval: 1e20,
            ..DelayParameters::default()
        };
        let err = DelayModel::new(huge).unwrap_err();
        assert!(err.to_string().contains("delay.send_interval"));
    }

    #[test]
    fn deep_backlog_is_capped_instead_of_overflowing() {
        let params = DelayParameters {
            send_interval: MAX_DELAY_SECS,
            think_time_min: MAX_DELAY_SECS,
            think_time_max: MAX_DELAY_SECS,
            batch_delay_factor: MAX_DELAY_SECS,
            ..DelayParameters::zero()
        };
        let model = DelayModel::new(params).unwrap();
        let plan = model.compute(usize::MAX);
        assert_eq!(plan.batch, MAX_WAIT);
        assert_eq!(plan.pre_send(), MAX_WAIT * 3);

        let saturated = DelayPlan {
            think: Duration::MAX,
            operation: Duration::MAX,
            ..DelayPlan::default()
        };
        assert_eq!(saturated.total(), Duration::MAX);
    }

    #[test]
    fn secs_handles_non_finite_input() {
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(-3.0), Duration::ZERO);
        assert_eq!(secs(f64::INFINITY), MAX_WAIT);
        assert_eq!(secs(1e30), MAX_WAIT);
        assert_eq!(secs(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn defaults_match_config_defaults() {
        let params = DelayParameters::default();
        assert_eq!(params.send_interval, 2.0);
        assert_eq!(params.rest_time_max, 30.0);
        assert!(DelayModel::new(params).is_ok());
    }

    proptest! {
        #[test]
        fn components_stay_within_bounds(
            think_min in 0.0f64..5.0,
            think_span in 0.0f64..5.0,
            interval in 0.0f64..5.0,
            jitter in 0.0f64..5.0,
            op_min in 0.0f64..2.0,
            op_span in 0.0f64..2.0,
            factor in 0.0f64..1.0,
            depth in 0usize..100,
            seed in any::<u64>(),
        ) {
            let params = DelayParameters {
                send_interval: interval,
                send_jitter: jitter,
                think_time_min: think_min,
                think_time_max: think_min + think_span,
                operation_delay_min: op_min,
                operation_delay_max: op_min + op_span,
                batch_delay_factor: factor,
                rest_probability: 0.5,
                rest_time_min: 1.0,
                rest_time_max: 2.0,
            };
            let model = DelayModel::new(params).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = model.compute_with_rng(depth, &mut rng);

            prop_assert!(within(plan.think, think_min, think_min + think_span));
            prop_assert!(within(plan.interval, interval, interval));
            prop_assert!(within(plan.jitter, 0.0, jitter));
            prop_assert!(within(plan.batch, depth as f64 * factor, depth as f64 * factor));
            prop_assert!(within(plan.operation, op_min, op_min + op_span));

            if let Some(rest) = model.rest_after_send_with_rng(&mut rng) {
                prop_assert!(within(rest, 1.0, 2.0));
            }
        }
    }
}
