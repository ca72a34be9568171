//! Bounded quasi-Newton minimization for spectrum fits.
//!
//! Small least-squares problems (two or three free parameters) are
//! minimized with L-BFGS and a More-Thuente line search. Box bounds are
//! handled by clamping, with gradient components zeroed at active
//! bounds so the line search does not keep stepping into the clamped
//! region.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;

use crate::error::{Error, Result};

/// A scalar objective over a small parameter vector.
pub trait Objective: Send + Sync {
    /// Evaluates the objective at the given parameters.
    fn eval(&self, params: &[f64]) -> f64;

    /// Computes the gradient at the given parameters.
    ///
    /// The default is a central difference with a step scaled to the
    /// parameter magnitude.
    fn gradient(&self, params: &[f64]) -> Vec<f64> {
        let mut grad = vec![0.0; params.len()];
        for i in 0..params.len() {
            let step = 1e-7 * params[i].abs().max(1.0);

            let mut plus = params.to_vec();
            plus[i] += step;
            let mut minus = params.to_vec();
            minus[i] -= step;

            grad[i] = (self.eval(&plus) - self.eval(&minus)) / (2.0 * step);
        }
        grad
    }
}

/// Solver settings.
#[derive(Debug, Clone, Copy)]
pub struct FitConfig {
    /// Maximum number of iterations.
    pub max_iter: u64,
    /// Convergence tolerance on the gradient norm.
    pub grad_tol: f64,
    /// Convergence tolerance on the cost decrease.
    pub cost_tol: f64,
    /// Number of corrections kept for the inverse Hessian estimate.
    pub memory: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            grad_tol: 1e-8,
            cost_tol: 1e-10,
            memory: 7,
        }
    }
}

/// Result of a minimization.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// Best-fit parameters, clamped to the bounds.
    pub params: Vec<f64>,
    /// Objective value at the best parameters.
    pub cost: f64,
    /// Number of iterations performed.
    pub n_iter: u64,
    /// Whether the solver reported convergence.
    pub converged: bool,
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params
        .iter()
        .zip(bounds.iter())
        .map(|(&value, &(lo, hi))| value.clamp(lo, hi))
        .collect()
}

struct Problem<'a> {
    objective: &'a dyn Objective,
    bounds: &'a [(f64, f64)],
}

impl CostFunction for Problem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        Ok(self.objective.eval(&clamp_params(params, self.bounds)))
    }
}

impl Gradient for Problem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        let clamped = clamp_params(params, self.bounds);
        let mut grad = self.objective.gradient(&clamped);

        // At an active bound, a gradient pushing further outside is
        // zeroed; the step then stays inside the box.
        const EPS: f64 = 1e-12;
        for (i, (&value, &(lo, hi))) in clamped.iter().zip(self.bounds.iter()).enumerate() {
            if value <= lo + EPS && grad[i] > 0.0 {
                grad[i] = 0.0;
            }
            if value >= hi - EPS && grad[i] < 0.0 {
                grad[i] = 0.0;
            }
        }

        Ok(grad)
    }
}

/// L-BFGS minimizer with box bounds.
#[derive(Debug, Clone, Default)]
pub struct LbfgsFitter {
    config: FitConfig,
}

impl LbfgsFitter {
    /// Creates a fitter with the given solver settings.
    #[must_use]
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// Minimizes `objective` starting from `init` within `bounds`.
    ///
    /// Bounds may be infinite on either side for free parameters.
    ///
    /// # Errors
    /// Returns an error if the inputs are inconsistent or the solver
    /// fails to run; an unconverged but completed run is reported in
    /// the outcome, not as an error.
    pub fn minimize(
        &self,
        objective: &dyn Objective,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<FitOutcome> {
        if init.len() != bounds.len() {
            return Err(Error::Optimizer(format!(
                "parameter and bounds length mismatch: {} != {}",
                init.len(),
                bounds.len()
            )));
        }

        let init = clamp_params(init, bounds);
        let problem = Problem { objective, bounds };

        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, self.config.memory)
            .with_tolerance_grad(self.config.grad_tol)
            .map_err(|e| Error::Optimizer(format!("invalid gradient tolerance: {e}")))?
            .with_tolerance_cost(self.config.cost_tol)
            .map_err(|e| Error::Optimizer(format!("invalid cost tolerance: {e}")))?;

        let result = Executor::new(problem, solver)
            .configure(|state| state.param(init).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Optimizer(e.to_string()))?;

        let state = result.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| Error::Optimizer("no best parameters found".into()))?;

        let converged = matches!(
            state.get_termination_status(),
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );

        Ok(FitOutcome {
            params: clamp_params(best, bounds),
            cost: state.get_best_cost(),
            n_iter: state.get_iter(),
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // f(x, y) = (x - 2)^2 + (y - 3)^2, minimum at (2, 3).
    struct Quadratic;

    impl Objective for Quadratic {
        fn eval(&self, params: &[f64]) -> f64 {
            (params[0] - 2.0).powi(2) + (params[1] - 3.0).powi(2)
        }
    }

    #[test]
    fn test_unbounded_quadratic() {
        let fitter = LbfgsFitter::default();
        let bounds = [(f64::NEG_INFINITY, f64::INFINITY); 2];
        let outcome = fitter.minimize(&Quadratic, &[0.0, 0.0], &bounds).unwrap();
        assert!(outcome.converged);
        assert_relative_eq!(outcome.params[0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(outcome.params[1], 3.0, epsilon = 1e-5);
        assert!(outcome.cost < 1e-8);
    }

    #[test]
    fn test_bound_is_respected() {
        let fitter = LbfgsFitter::default();
        let bounds = [(f64::NEG_INFINITY, 1.5), (f64::NEG_INFINITY, f64::INFINITY)];
        let outcome = fitter.minimize(&Quadratic, &[0.0, 0.0], &bounds).unwrap();
        assert!(outcome.params[0] <= 1.5 + 1e-9);
        assert_relative_eq!(outcome.params[1], 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let fitter = LbfgsFitter::default();
        let bounds = [(f64::NEG_INFINITY, f64::INFINITY)];
        assert!(fitter.minimize(&Quadratic, &[0.0, 0.0], &bounds).is_err());
    }
}
