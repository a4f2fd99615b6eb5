use rand::distributions::Open01;
use rand::prelude::*;
use tracing::{instrument, warn};

/// Time that passes in a step without an event.
pub const DEFAULT_WAIT: f64 = 1.0;
/// Total propensity below which nothing can happen.
pub const NEGLIGIBLE_PROPENSITY: f64 = 1e-7;

/// Result of one Gillespie draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    /// The total propensity is negligible.
    Idle { wait: f64 },
    /// The drawn waiting time exceeded [`DEFAULT_WAIT`]; no event this step.
    Deferred { wait: f64 },
    /// The event at `index` fires after `wait`.
    Event { index: usize, wait: f64 },
}

impl Selection {
    pub fn wait(&self) -> f64 {
        match *self {
            Self::Idle { wait } | Self::Deferred { wait } | Self::Event { wait, .. } => wait,
        }
    }
}

/// Draws the waiting time and, if it falls within one unit, the next event.
///
/// The waiting time is exponential with rate `S = Σ propensities`; the event is chosen
/// with probability proportional to its propensity by walking the list in order.
#[instrument(level = "trace", skip_all, fields(count = propensities.len()))]
pub fn select(propensities: &[f64], rng: &mut impl Rng) -> Selection {
    let total: f64 = propensities.iter().sum();
    if total < NEGLIGIBLE_PROPENSITY {
        return Selection::Idle { wait: DEFAULT_WAIT };
    }

    let u: f64 = rng.sample(Open01);
    let wait = -u.ln() / total;
    if wait > DEFAULT_WAIT {
        return Selection::Deferred { wait: DEFAULT_WAIT };
    }

    let mut r = total * rng.r#gen::<f64>();
    for (index, &p) in propensities.iter().enumerate() {
        r -= p;
        if r < 0.0 {
            return Selection::Event { index, wait };
        }
    }

    // Rounding can leave r marginally non-negative after the last entry.
    let index = propensities
        .iter()
        .rposition(|&p| p > 0.0)
        .unwrap_or(propensities.len() - 1);
    warn!(residue = r, index, "Event walk fell through; taking the last candidate.");
    Selection::Event { index, wait }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn negligible_total_is_idle() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(select(&[], &mut rng), Selection::Idle { wait: 1.0 });
        assert_eq!(select(&[0.0, 1e-9], &mut rng), Selection::Idle { wait: 1.0 });
    }

    #[test]
    fn small_total_mostly_defers() {
        let mut rng = StdRng::seed_from_u64(2);
        let deferred = (0..100)
            .filter(|_| matches!(select(&[1e-3], &mut rng), Selection::Deferred { wait } if wait == 1.0))
            .count();
        assert!(deferred >= 95);
    }

    #[test]
    fn zero_propensity_events_never_fire() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            if let Selection::Event { index, .. } = select(&[5.0, 0.0, 5.0], &mut rng) {
                assert_ne!(index, 1);
            }
        }
    }

    #[test]
    fn event_frequencies_follow_propensities() {
        let mut rng = StdRng::seed_from_u64(4);
        let draws = 20_000;
        let mut first = 0;
        for _ in 0..draws {
            match select(&[30.0, 10.0], &mut rng) {
                Selection::Event { index: 0, .. } => first += 1,
                Selection::Event { .. } => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        let fraction = first as f64 / draws as f64;
        assert!((fraction - 0.75).abs() < 0.015, "fraction {fraction}");
    }

    #[test]
    fn waiting_times_are_exponential() {
        let mut rng = StdRng::seed_from_u64(5);
        let rate = 40.0;
        let mut waits: Vec<f64> = (0..5_000)
            .map(|_| select(&[25.0, 15.0], &mut rng).wait())
            .collect();
        waits.sort_by(f64::total_cmp);

        // Kolmogorov–Smirnov statistic against 1 - exp(-rate t).
        let n = waits.len() as f64;
        let statistic = waits
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let cdf = 1.0 - (-rate * t).exp();
                (cdf - i as f64 / n).abs().max((((i + 1) as f64) / n - cdf).abs())
            })
            .fold(0.0, f64::max);
        assert!(statistic < 1.95 / n.sqrt(), "KS statistic {statistic}");
    }
}
