/// A first-order system `dx/dt = f(t, x)` over a flat state vector.
pub trait DynamicalSystem {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field at `(t, x)` into `out`.
    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]);
}

/// Classic Runge–Kutta 4th order solver.
pub struct Rk4 {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rk4 {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }

    /// Performs one step of size `dt`.
    pub fn step(&mut self, system: &impl DynamicalSystem, t: &mut f64, state: &mut [f64], dt: f64) {
        system.apply(*t, state, &mut self.k1);
        self.advance(system, t, state, dt);
    }

    /// Performs one step of size `dt` reusing a derivative `k1` already evaluated at
    /// `(t, state)`.
    pub fn step_from(
        &mut self,
        system: &impl DynamicalSystem,
        t: &mut f64,
        state: &mut [f64],
        dt: f64,
        k1: &[f64],
    ) {
        self.k1.copy_from_slice(k1);
        self.advance(system, t, state, dt);
    }

    fn advance(&mut self, system: &impl DynamicalSystem, t: &mut f64, state: &mut [f64], dt: f64) {
        let t0 = *t;

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * 0.5;
        }
        system.apply(t0 + dt * 0.5, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * 0.5;
        }
        system.apply(t0 + dt * 0.5, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        for i in 0..state.len() {
            state[i] += dt / 6.0 * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Result of one adaptive step attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// The state advanced by `taken`; `next` is the suggested following step.
    Accepted { taken: f64, next: f64 },
    /// The error was too large; the state is unchanged and `next` is the retry size.
    Rejected { next: f64 },
}

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Dormand–Prince 5(4) solver with embedded error estimate.
///
/// Uses the first-same-as-last property: after an accepted step the derivative at the new
/// state is already known and available through [`derivative`](Self::derivative).
pub struct DormandPrince {
    k: [Vec<f64>; 7],
    tmp: Vec<f64>,
    next: Vec<f64>,
    abs_tolerance: f64,
    rel_tolerance: f64,
}

impl DormandPrince {
    const C: [f64; 6] = [1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
    const A: [&'static [f64]; 6] = [
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
        ],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
        &[
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
        ],
    ];
    /// Difference between the 5th and 4th order weights.
    const E: [f64; 7] = [
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ];

    pub fn new(dim: usize, abs_tolerance: f64, rel_tolerance: f64) -> Self {
        Self {
            k: std::array::from_fn(|_| vec![0.0; dim]),
            tmp: vec![0.0; dim],
            next: vec![0.0; dim],
            abs_tolerance,
            rel_tolerance,
        }
    }

    /// Evaluates the derivative at the starting point; call once before stepping.
    pub fn prime(&mut self, system: &impl DynamicalSystem, t: f64, state: &[f64]) {
        system.apply(t, state, &mut self.k[0]);
    }

    /// Derivative at the current state.
    pub fn derivative(&self) -> &[f64] {
        &self.k[0]
    }

    /// Attempts a step of size `h` from `(t, state)`.
    ///
    /// On acceptance `t` and `state` advance and the derivative is refreshed; on rejection
    /// both are left untouched.
    pub fn try_step(
        &mut self,
        system: &impl DynamicalSystem,
        t: &mut f64,
        state: &mut [f64],
        h: f64,
    ) -> StepOutcome {
        let t0 = *t;
        let n = state.len();

        for stage in 0..6 {
            let weights = Self::A[stage];
            let target = if stage == 5 { &mut self.next } else { &mut self.tmp };
            for i in 0..n {
                let increment: f64 = weights
                    .iter()
                    .zip(&self.k)
                    .map(|(w, k)| w * k[i])
                    .sum();
                target[i] = state[i] + h * increment;
            }
            let input = if stage == 5 { &self.next } else { &self.tmp };
            system.apply(t0 + Self::C[stage] * h, input, &mut self.k[stage + 1]);
        }

        let mut sum_sq = 0.0;
        for i in 0..n {
            let estimate: f64 = h * Self::E
                .iter()
                .zip(&self.k)
                .map(|(e, k)| e * k[i])
                .sum::<f64>();
            let scale =
                self.abs_tolerance + self.rel_tolerance * state[i].abs().max(self.next[i].abs());
            sum_sq += (estimate / scale).powi(2);
        }
        let error = if n > 0 { (sum_sq / n as f64).sqrt() } else { 0.0 };

        if error.is_finite() && error <= 1.0 {
            state.copy_from_slice(&self.next);
            *t = t0 + h;
            self.k.swap(0, 6);
            let factor = if error > 0.0 {
                (SAFETY * error.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            } else {
                MAX_FACTOR
            };
            StepOutcome::Accepted {
                taken: h,
                next: h * factor,
            }
        } else {
            let factor = if error.is_finite() {
                (SAFETY * error.powf(-0.2)).clamp(MIN_FACTOR, 1.0)
            } else {
                MIN_FACTOR
            };
            StepOutcome::Rejected { next: h * factor }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// dx/dt = -x, exact solution x0 * exp(-t).
    struct Decay;

    impl DynamicalSystem for Decay {
        fn dimension(&self) -> usize {
            1
        }
        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    /// Harmonic oscillator, exact solution (cos t, -sin t) from (1, 0).
    struct Oscillator;

    impl DynamicalSystem for Oscillator {
        fn dimension(&self) -> usize {
            2
        }
        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -x[0];
        }
    }

    #[test]
    fn rk4_integrates_exponential_decay() {
        let mut solver = Rk4::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        for _ in 0..100 {
            solver.step(&Decay, &mut t, &mut state, 0.01);
        }
        assert!((t - 1.0).abs() < 1e-12);
        assert!((state[0] - (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn rk4_step_from_matches_step() {
        let mut a = Rk4::new(2);
        let mut b = Rk4::new(2);
        let (mut ta, mut tb) = (0.0, 0.0);
        let mut sa = [1.0, 0.0];
        let mut sb = [1.0, 0.0];
        let mut k1 = [0.0; 2];
        Oscillator.apply(0.0, &sb, &mut k1);
        a.step(&Oscillator, &mut ta, &mut sa, 0.1);
        b.step_from(&Oscillator, &mut tb, &mut sb, 0.1, &k1);
        assert_eq!(sa, sb);
        assert_eq!(ta, tb);
    }

    #[test]
    fn dormand_prince_tracks_oscillator() {
        let mut solver = DormandPrince::new(2, 1e-10, 1e-10);
        let mut t = 0.0;
        let mut state = [1.0, 0.0];
        let mut h: f64 = 0.1;
        solver.prime(&Oscillator, t, &state);
        while t < 2.0 {
            let step = h.min(2.0 - t);
            match solver.try_step(&Oscillator, &mut t, &mut state, step) {
                StepOutcome::Accepted { next, .. } | StepOutcome::Rejected { next } => h = next,
            }
        }
        assert!((state[0] - 2f64.cos()).abs() < 1e-7);
        assert!((state[1] + 2f64.sin()).abs() < 1e-7);
    }

    #[test]
    fn dormand_prince_keeps_derivative_current() {
        let mut solver = DormandPrince::new(1, 1e-8, 1e-8);
        let mut t = 0.0;
        let mut state = [2.0];
        solver.prime(&Decay, t, &state);
        if let StepOutcome::Accepted { .. } = solver.try_step(&Decay, &mut t, &mut state, 0.05) {
            assert!((solver.derivative()[0] + state[0]).abs() < 1e-15);
        } else {
            panic!("a small step on a smooth problem should be accepted");
        }
    }

    #[test]
    fn dormand_prince_rejects_oversized_step() {
        let mut solver = DormandPrince::new(1, 1e-12, 1e-12);
        let mut t = 0.0;
        let mut state = [1.0];
        solver.prime(&Decay, t, &state);
        let outcome = solver.try_step(&Decay, &mut t, &mut state, 5.0);
        assert!(matches!(outcome, StepOutcome::Rejected { next } if next < 5.0));
        assert_eq!(state, [1.0]);
        assert_eq!(t, 0.0);
    }
}
