//! Minimization of the calibration objective.
//!
//! The fitter only needs a capability: given an objective over the nine
//! correction parameters, a starting point and a mask of pinned parameters,
//! return the best point and per-parameter uncertainties. [`Minimizer`] is
//! that seam; [`SimplexMinimizer`] is the bundled implementation.

use alcorpix_core::params::PARAMETER_COUNT;
use alcorpix_core::{CorrectionParameters, FitParameters};
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Result of a minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOutcome {
    /// Best point with uncertainties (zero for pinned parameters).
    pub parameters: FitParameters,
    /// Objective value at the best point.
    pub minimum: f64,
    /// Iterations used.
    pub iterations: usize,
    /// True if the tolerance was reached at a finite objective value.
    pub converged: bool,
}

/// A minimizer of sum-of-squares objectives over correction parameters.
///
/// Implementations may evaluate the objective concurrently and repeatedly
/// at the same point.
pub trait Minimizer: Send + Sync {
    /// Minimizes `objective` starting from `initial`, keeping every
    /// parameter with `fixed[i] == true` at its initial value.
    fn minimize<F>(
        &self,
        objective: F,
        initial: &CorrectionParameters,
        fixed: &[bool; PARAMETER_COUNT],
    ) -> FitOutcome
    where
        F: Fn(&CorrectionParameters) -> f64 + Sync;

    /// Returns the name of the minimizer.
    fn name(&self) -> &'static str;
}

/// Nelder-Mead downhill simplex over the free parameters.
///
/// Uncertainties come from a central finite-difference Hessian at the
/// minimum: for a sum of squares the covariance is `2 * H^-1`.
#[derive(Debug, Clone)]
pub struct SimplexMinimizer {
    /// Maximum number of simplex iterations.
    pub max_iterations: usize,
    /// Spread of simplex values, relative to `1 + |best|`, at which
    /// iteration stops.
    pub tolerance: f64,
    /// Initial simplex step as a fraction of each parameter value.
    pub relative_step: f64,
    /// Initial simplex step for parameters starting at zero.
    pub absolute_step: f64,
}

impl Default for SimplexMinimizer {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            tolerance: 1e-10,
            relative_step: 0.1,
            absolute_step: 1e-3,
        }
    }
}

impl SimplexMinimizer {
    /// Creates a minimizer with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration limit.
    #[must_use]
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the convergence tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn step_for(&self, value: f64) -> f64 {
        if value == 0.0 {
            self.absolute_step
        } else {
            (value * self.relative_step).abs()
        }
    }
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Maps between the full parameter array and the free subset.
struct FreeSpace {
    base: [f64; PARAMETER_COUNT],
    free: Vec<usize>,
}

impl FreeSpace {
    fn new(initial: &CorrectionParameters, fixed: &[bool; PARAMETER_COUNT]) -> Self {
        Self {
            base: initial.to_array(),
            free: (0..PARAMETER_COUNT).filter(|&i| !fixed[i]).collect(),
        }
    }

    fn dim(&self) -> usize {
        self.free.len()
    }

    fn start(&self) -> Vec<f64> {
        self.free.iter().map(|&i| self.base[i]).collect()
    }

    fn expand(&self, x: &[f64]) -> CorrectionParameters {
        let mut full = self.base;
        for (&i, &value) in self.free.iter().zip(x) {
            full[i] = value;
        }
        CorrectionParameters::from_array(full)
    }
}

impl Minimizer for SimplexMinimizer {
    #[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
    fn minimize<F>(
        &self,
        objective: F,
        initial: &CorrectionParameters,
        fixed: &[bool; PARAMETER_COUNT],
    ) -> FitOutcome
    where
        F: Fn(&CorrectionParameters) -> f64 + Sync,
    {
        let space = FreeSpace::new(initial, fixed);
        let n = space.dim();
        let f = |x: &[f64]| objective(&space.expand(x));

        let start = space.start();
        if n == 0 {
            let minimum = f(&start);
            return FitOutcome {
                parameters: FitParameters::exact(*initial),
                minimum,
                iterations: 0,
                converged: minimum.is_finite(),
            };
        }

        // Simplex vertices with their values, best first after sorting.
        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((start.clone(), f(&start)));
        for k in 0..n {
            let mut vertex = start.clone();
            vertex[k] += self.step_for(start[k]);
            let value = f(&vertex);
            simplex.push((vertex, value));
        }

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            let best = simplex[0].1;
            let worst = simplex[n].1;

            if best.is_finite() && worst.is_finite() && worst - best <= self.tolerance * (1.0 + best.abs()) {
                converged = true;
                break;
            }
            iterations += 1;

            let mut centroid = vec![0.0; n];
            for (vertex, _) in &simplex[..n] {
                for (c, v) in centroid.iter_mut().zip(vertex) {
                    *c += v / n as f64;
                }
            }

            let toward = |coefficient: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&simplex[n].0)
                    .map(|(c, w)| c + coefficient * (c - w))
                    .collect()
            };

            let reflected = toward(REFLECTION);
            let f_reflected = f(&reflected);

            if f_reflected < simplex[0].1 {
                let expanded = toward(EXPANSION);
                let f_expanded = f(&expanded);
                simplex[n] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < simplex[n - 1].1 {
                simplex[n] = (reflected, f_reflected);
                continue;
            }

            let contracted = if f_reflected < simplex[n].1 {
                toward(CONTRACTION * REFLECTION)
            } else {
                toward(-CONTRACTION)
            };
            let f_contracted = f(&contracted);
            if f_contracted < simplex[n].1.min(f_reflected) {
                simplex[n] = (contracted, f_contracted);
                continue;
            }

            let best_vertex = simplex[0].0.clone();
            for (vertex, value) in simplex.iter_mut().skip(1) {
                for (v, b) in vertex.iter_mut().zip(&best_vertex) {
                    *v = b + SHRINK * (*v - b);
                }
                *value = f(vertex.as_slice());
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, minimum) = simplex.swap_remove(0);
        converged &= minimum.is_finite();

        let values = space.expand(&best);
        let mut errors = [0.0; PARAMETER_COUNT];
        if minimum.is_finite() {
            let free_errors = hessian_errors(&f, &best);
            for (&i, error) in space.free.iter().zip(free_errors) {
                errors[i] = error;
            }
        } else {
            log::warn!("minimization ended at a degenerate point; no uncertainties");
            errors = [f64::NAN; PARAMETER_COUNT];
        }

        FitOutcome {
            parameters: FitParameters { values, errors },
            minimum,
            iterations,
            converged,
        }
    }

    fn name(&self) -> &'static str {
        "Simplex"
    }
}

/// Uncertainties `sqrt(2 * (H^-1)_ii)` from a finite-difference Hessian.
///
/// Entries are evaluated in parallel. Returns NaN for every parameter when
/// the Hessian is singular.
fn hessian_errors<F>(f: &F, x: &[f64]) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    let n = x.len();
    let steps: Vec<f64> = x.iter().map(|v| (v.abs() * 1e-3).max(1e-4)).collect();
    let f0 = f(x);

    let shifted = |moves: &[(usize, f64)]| -> f64 {
        let mut point = x.to_vec();
        for &(i, sign) in moves {
            point[i] += sign * steps[i];
        }
        f(&point)
    };

    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i..n).map(move |j| (i, j))).collect();
    let entries: Vec<((usize, usize), f64)> = pairs
        .into_par_iter()
        .map(|(i, j)| {
            let value = if i == j {
                (shifted(&[(i, 1.0)]) - 2.0 * f0 + shifted(&[(i, -1.0)])) / (steps[i] * steps[i])
            } else {
                (shifted(&[(i, 1.0), (j, 1.0)])
                    - shifted(&[(i, 1.0), (j, -1.0)])
                    - shifted(&[(i, -1.0), (j, 1.0)])
                    + shifted(&[(i, -1.0), (j, -1.0)]))
                    / (4.0 * steps[i] * steps[j])
            };
            ((i, j), value)
        })
        .collect();

    let mut hessian = DMatrix::<f64>::zeros(n, n);
    for ((i, j), value) in entries {
        hessian[(i, j)] = value;
        hessian[(j, i)] = value;
    }

    match hessian.try_inverse() {
        Some(inverse) => (0..n)
            .map(|i| {
                let variance = 2.0 * inverse[(i, i)];
                if variance.is_finite() && variance >= 0.0 {
                    variance.sqrt()
                } else {
                    f64::NAN
                }
            })
            .collect(),
        None => {
            log::warn!("objective Hessian is singular; uncertainties unavailable");
            vec![f64::NAN; n]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quadratic(params: &CorrectionParameters) -> f64 {
        // minimum at offset[1] = 2, slope[2] = -1, period = 321
        let a = params.offset[1] - 2.0;
        let b = params.slope[2] + 1.0;
        let c = params.period - 321.0;
        let rest: f64 = params.offset[2..].iter().map(|v| v * v).sum::<f64>()
            + params.slope.iter().enumerate().filter(|(i, _)| *i != 2).map(|(_, v)| v * v).sum::<f64>();
        a * a + 4.0 * b * b + 0.25 * c * c + rest
    }

    #[test]
    fn test_simplex_finds_quadratic_minimum() {
        let mut fixed = [false; PARAMETER_COUNT];
        fixed[0] = true;
        let initial = CorrectionParameters::initial_guess();

        let outcome = SimplexMinimizer::new().minimize(quadratic, &initial, &fixed);
        let values = outcome.parameters.values;

        assert!(outcome.converged);
        assert_relative_eq!(values.offset[0], 0.5);
        assert_relative_eq!(values.offset[1], 2.0, epsilon = 1e-3);
        assert_relative_eq!(values.slope[2], -1.0, epsilon = 1e-3);
        assert_relative_eq!(values.period, 321.0, epsilon = 1e-2);
        assert!(outcome.minimum < 1e-5);
    }

    #[test]
    fn test_errors_follow_curvature() {
        let mut fixed = [false; PARAMETER_COUNT];
        fixed[0] = true;
        let outcome =
            SimplexMinimizer::new().minimize(quadratic, &CorrectionParameters::initial_guess(), &fixed);
        let errors = outcome.parameters.errors;

        // f = a^2 -> H = 2 -> error = sqrt(2 / 2) = 1
        assert_relative_eq!(errors[1], 1.0, epsilon = 1e-3);
        // f = 4 b^2 -> H = 8 -> error = 0.5
        assert_relative_eq!(errors[6], 0.5, epsilon = 1e-3);
        // f = c^2 / 4 -> H = 0.5 -> error = 2
        assert_relative_eq!(errors[8], 2.0, epsilon = 1e-2);
        assert_relative_eq!(errors[0], 0.0);
    }

    #[test]
    fn test_degenerate_objective_does_not_converge() {
        let fixed = [false; PARAMETER_COUNT];
        let outcome = SimplexMinimizer::new()
            .with_max_iterations(50)
            .minimize(|_| f64::INFINITY, &CorrectionParameters::initial_guess(), &fixed);
        assert!(!outcome.converged);
        assert!(outcome.minimum.is_infinite());
        assert!(outcome.parameters.errors.iter().all(|e| e.is_nan()));
    }

    #[test]
    fn test_all_fixed_returns_initial() {
        let fixed = [true; PARAMETER_COUNT];
        let initial = CorrectionParameters::initial_guess();
        let outcome = SimplexMinimizer::new().minimize(quadratic, &initial, &fixed);
        assert_eq!(outcome.parameters.values, initial);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_coupled_errors_use_inverse_hessian() {
        // f = 2a^2 + 2ab + 1.5b^2 -> H = [[4, 2], [2, 3]], H^-1 = [[0.375, -0.25], [-0.25, 0.5]]
        let f = |x: &[f64]| 2.0 * x[0] * x[0] + 2.0 * x[0] * x[1] + 1.5 * x[1] * x[1];
        let errors = hessian_errors(&f, &[0.0, 0.0]);
        assert_relative_eq!(errors[0], (2.0f64 * 0.375).sqrt(), epsilon = 1e-6);
        assert_relative_eq!(errors[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_flat_direction_gives_nan_errors() {
        // b never enters the objective, so the Hessian is singular
        let f = |x: &[f64]| x[0] * x[0];
        let errors = hessian_errors(&f, &[0.0, 0.0]);
        assert!(errors.iter().all(|e| e.is_nan()));
    }
}
