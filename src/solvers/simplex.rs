//! Derivative-free simplex minimizer
//!
//! Nelder-Mead through argmin. The initial simplex spans `rhobeg` along
//! each axis; the search stops once the standard deviation of the vertex
//! costs drops below `rhoend` or `max_iter` is hit.
//!
//! Bounds are enforced by giving points outside the box an infinite cost,
//! so the simplex never collapses onto a face. The initial simplex is
//! built inside the box.
//!
//! Model parameters usually live on very different scales (diffusivities
//! around 1e-3, fractions around 1, angles around π), so fitters map them
//! through `ParamScaling` first; `minimize_scaled` does that round trip.

use std::cell::RefCell;

use argmin::{
    core::{CostFunction, Error, Executor, TerminationReason, TerminationStatus},
    solver::neldermead::NelderMead,
};

use crate::error::{ConfigError, ConfigResult, FitError, FitResult};

/// Parameters for the simplex search
#[derive(Clone, Debug, PartialEq)]
pub struct SimplexParams {
    /// Initial simplex edge length
    pub rhobeg: f64,
    /// Standard deviation of the vertex costs at which the search stops
    pub rhoend: f64,
    /// Maximum iterations
    pub max_iter: usize,
}

impl Default for SimplexParams {
    fn default() -> Self {
        Self {
            rhobeg: 0.5,
            rhoend: 1e-12,
            max_iter: 2000,
        }
    }
}

impl SimplexParams {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.rhobeg > 0.0) || !self.rhobeg.is_finite() {
            return Err(ConfigError::InvalidParameter(format!(
                "simplex rhobeg must be positive, got {}", self.rhobeg
            )));
        }
        if !(self.rhoend > 0.0) || !self.rhoend.is_finite() {
            return Err(ConfigError::InvalidParameter(format!(
                "simplex rhoend must be positive, got {}", self.rhoend
            )));
        }
        if self.max_iter == 0 {
            return Err(ConfigError::InvalidParameter("simplex max_iter must be positive".to_string()));
        }
        Ok(())
    }
}

/// Outcome of a minimization
#[derive(Clone, Debug, PartialEq)]
pub struct SimplexResult {
    /// Best parameters found
    pub x: Vec<f64>,
    /// Cost at `x`
    pub cost: f64,
    pub iterations: usize,
    /// Whether the cost spread fell below `rhoend`
    pub converged: bool,
}

/// Affine map between physical parameters and optimizer coordinates
///
/// `forward`: z = (x - offset) / scale, `inverse`: x = z * scale + offset
#[derive(Clone, Debug, PartialEq)]
pub struct ParamScaling {
    offset: Vec<f64>,
    scale: Vec<f64>,
}

impl ParamScaling {
    pub fn new(offset: Vec<f64>, scale: Vec<f64>) -> ConfigResult<Self> {
        ConfigError::check_dim("scaling offsets", scale.len(), offset.len())?;
        if scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ConfigError::InvalidParameter("scales must be finite and nonzero".to_string()));
        }
        Ok(Self { offset, scale })
    }

    /// Pure rescaling, no offset
    pub fn from_scales(scale: Vec<f64>) -> ConfigResult<Self> {
        Self::new(vec![0.0; scale.len()], scale)
    }

    pub fn dim(&self) -> usize {
        self.scale.len()
    }

    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        x.iter().zip(&self.offset).zip(&self.scale)
            .map(|((&xi, &o), &s)| (xi - o) / s)
            .collect()
    }

    pub fn inverse(&self, z: &[f64]) -> Vec<f64> {
        z.iter().zip(&self.offset).zip(&self.scale)
            .map(|((&zi, &o), &s)| zi * s + o)
            .collect()
    }

    fn inverse_into(&self, z: &[f64], x: &mut [f64]) {
        for (((xi, &zi), &o), &s) in x.iter_mut().zip(z).zip(&self.offset).zip(&self.scale) {
            *xi = zi * s + o;
        }
    }
}

/// Box constraints in optimizer coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> ConfigResult<Self> {
        ConfigError::check_dim("upper bounds", lower.len(), upper.len())?;
        if lower.iter().zip(&upper).any(|(l, u)| !(l <= u)) {
            return Err(ConfigError::InvalidParameter("lower bound above upper bound".to_string()));
        }
        Ok(Self { lower, upper })
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.iter().zip(&self.lower).zip(&self.upper).all(|((xi, l), u)| l <= xi && xi <= u)
    }

    fn clamp(&self, x: &mut [f64]) {
        for ((xi, &l), &u) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *xi = xi.clamp(l, u);
        }
    }

    /// Step of about `rhobeg` along axis `i` from `x` that stays in the box
    fn inner_step(&self, x: &[f64], i: usize, rhobeg: f64) -> f64 {
        let (l, u) = (self.lower[i], self.upper[i]);
        if x[i] + rhobeg <= u {
            rhobeg
        } else if x[i] - rhobeg >= l {
            -rhobeg
        } else if u - x[i] >= x[i] - l {
            0.5 * (u - x[i])
        } else {
            -0.5 * (x[i] - l)
        }
    }
}

/// Cost seen by the optimizer: infinite outside the box or where the
/// user cost is not finite
struct BoxedCost<'a, F> {
    cost: RefCell<F>,
    bounds: Option<&'a Bounds>,
}

impl<'a, F: FnMut(&[f64]) -> f64> BoxedCost<'a, F> {
    fn new(cost: F, bounds: Option<&'a Bounds>) -> Self {
        Self { cost: RefCell::new(cost), bounds }
    }

    fn eval(&self, x: &[f64]) -> f64 {
        if self.bounds.is_some_and(|b| !b.contains(x)) {
            return f64::INFINITY;
        }
        let c = (self.cost.borrow_mut())(x);
        if c.is_finite() { c } else { f64::INFINITY }
    }
}

impl<F: FnMut(&[f64]) -> f64> CostFunction for BoxedCost<'_, F> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.eval(x))
    }
}

/// Nelder-Mead minimizer
#[derive(Clone, Debug)]
pub struct Simplex {
    params: SimplexParams,
    bounds: Option<Bounds>,
}

impl Simplex {
    pub fn new(params: SimplexParams) -> ConfigResult<Self> {
        params.validate()?;
        Ok(Self { params, bounds: None })
    }

    /// Restrict the search to a box (in optimizer coordinates)
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn params(&self) -> &SimplexParams {
        &self.params
    }

    /// Minimize `cost` starting from `x0`
    ///
    /// A start outside the bounds is moved onto the nearest face. Non-finite
    /// cost values are treated as +∞ so the search moves away from them; a
    /// non-finite cost at the start or at the end is a failure.
    pub fn minimize<F>(&self, cost: F, x0: &[f64]) -> FitResult<SimplexResult>
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = x0.len();
        if n == 0 {
            return Err(FitError::InvalidInput("empty parameter vector".to_string()));
        }
        if let Some(bounds) = &self.bounds {
            if bounds.lower.len() != n {
                return Err(FitError::InvalidInput(format!(
                    "bounds for {} parameters, got {}", bounds.lower.len(), n
                )));
            }
        }

        let mut start = x0.to_vec();
        if let Some(bounds) = &self.bounds {
            bounds.clamp(&mut start);
        }

        let problem = BoxedCost::new(cost, self.bounds.as_ref());
        if !problem.eval(&start).is_finite() {
            return Err(FitError::NonFinite);
        }

        let simplex = self.initial_simplex(&start);
        let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
            .with_sd_tolerance(self.params.rhoend)
            .map_err(|e| FitError::Optimizer(e.to_string()))?;

        let max_iters = self.params.max_iter as u64;
        let res = Executor::new(problem, solver)
            .configure(|state| state.max_iters(max_iters))
            .run()
            .map_err(|e| FitError::Optimizer(e.to_string()))?;

        let state = res.state;
        let x = state.best_param.ok_or(FitError::NonFinite)?;
        if !state.best_cost.is_finite() {
            return Err(FitError::NonFinite);
        }

        Ok(SimplexResult {
            x,
            cost: state.best_cost,
            iterations: state.iter as usize,
            converged: matches!(
                state.termination_status,
                TerminationStatus::Terminated(TerminationReason::SolverConverged)
            ),
        })
    }

    /// Minimize a cost defined on physical parameters, searching in scaled
    /// coordinates; `x0` and the result are physical
    pub fn minimize_scaled<F>(&self, scaling: &ParamScaling, mut cost: F, x0: &[f64]) -> FitResult<SimplexResult>
    where
        F: FnMut(&[f64]) -> f64,
    {
        if scaling.dim() != x0.len() {
            return Err(FitError::InvalidInput(format!(
                "scaling for {} parameters, got {}", scaling.dim(), x0.len()
            )));
        }

        let mut physical = vec![0.0; x0.len()];
        let z0 = scaling.forward(x0);
        let mut result = self.minimize(|z| {
            scaling.inverse_into(z, &mut physical);
            cost(&physical)
        }, &z0)?;

        result.x = scaling.inverse(&result.x);
        Ok(result)
    }

    /// `start` plus one step per axis, every vertex inside the bounds
    fn initial_simplex(&self, start: &[f64]) -> Vec<Vec<f64>> {
        let rhobeg = self.params.rhobeg;
        let mut vertices = Vec::with_capacity(start.len() + 1);
        vertices.push(start.to_vec());
        for i in 0..start.len() {
            let step = match &self.bounds {
                Some(bounds) => bounds.inner_step(start, i, rhobeg),
                None => rhobeg,
            };
            let mut v = start.to_vec();
            v[i] += step;
            vertices.push(v);
        }
        vertices
    }
}
