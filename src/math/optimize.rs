//! Bounded Nelder–Mead simplex search for scalar objectives
//!
//! Objectives handled here read bounds off discretized distributions, so they
//! are flat in places and jump between plateaus. A derivative-free simplex
//! copes with that where gradient methods stall. Trial points are clipped to
//! the search interval before every evaluation.

use crate::io::error::Result;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;
const INITIAL_STEP: f64 = 0.05;
const ZERO_START_STEP: f64 = 0.000_25;

/// Outcome of a minimization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
    /// Best point found
    pub x: f64,
    /// Objective value at `x`
    pub value: f64,
    /// Simplex iterations performed
    pub iterations: usize,
    /// Objective evaluations performed
    pub evaluations: usize,
    /// Whether both tolerances were met before the budget ran out
    pub converged: bool,
}

/// Nelder–Mead search over a closed interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    lower: f64,
    upper: f64,
    max_iterations: usize,
    max_evaluations: usize,
    x_tolerance: f64,
    f_tolerance: f64,
}

#[derive(Debug, Clone, Copy)]
struct Vertex {
    x: f64,
    f: f64,
}

struct Counted<F> {
    objective: F,
    evaluations: usize,
}

impl<F> Counted<F>
where
    F: FnMut(f64) -> Result<f64>,
{
    fn vertex(&mut self, x: f64) -> Result<Vertex> {
        self.evaluations += 1;
        let f = (self.objective)(x)?;
        // NaN would break the vertex ordering
        let f = if f.is_nan() { f64::INFINITY } else { f };
        Ok(Vertex { x, f })
    }
}

impl NelderMead {
    /// Search on `[lower, upper]` with a budget of 200 iterations and evaluations
    /// and absolute tolerances of 1e-4 on both the point and the objective
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            max_iterations: 200,
            max_evaluations: 200,
            x_tolerance: 1e-4,
            f_tolerance: 1e-4,
        }
    }

    /// Replace the iteration and evaluation budget
    pub const fn with_budget(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self.max_evaluations = max_iterations;
        self
    }

    /// Replace both convergence tolerances
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.x_tolerance = tolerance;
        self.f_tolerance = tolerance;
        self
    }

    const fn clip(&self, x: f64) -> f64 {
        x.clamp(self.lower, self.upper)
    }

    /// Minimize `objective` starting from `x0`
    ///
    /// The initial simplex is `x0` and `1.05 · x0`. Running out of budget is
    /// not an error: the best point is returned with `converged == false`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `objective`
    pub fn minimize<F>(&self, x0: f64, objective: F) -> Result<Minimum>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        let mut counted = Counted {
            objective,
            evaluations: 0,
        };

        let start = self.clip(x0);
        let mut second = if start.abs() > f64::EPSILON {
            self.clip(start * (1.0 + INITIAL_STEP))
        } else {
            self.clip(ZERO_START_STEP)
        };
        if (second - start).abs() <= f64::EPSILON {
            second = self.clip(start / (1.0 + INITIAL_STEP));
        }

        let mut best = counted.vertex(start)?;
        let mut worst = counted.vertex(second)?;
        let mut iterations = 0;

        let converged = loop {
            if worst.f < best.f {
                std::mem::swap(&mut best, &mut worst);
            }
            if (worst.x - best.x).abs() <= self.x_tolerance
                && (worst.f - best.f).abs() <= self.f_tolerance
            {
                break true;
            }
            if iterations >= self.max_iterations || counted.evaluations >= self.max_evaluations {
                break false;
            }
            iterations += 1;

            // With two vertices the centroid of all but the worst is the best vertex
            let centroid = best.x;
            let reflected =
                counted.vertex(self.clip((1.0 + REFLECTION).mul_add(centroid, -REFLECTION * worst.x)))?;

            if reflected.f < best.f {
                let stretch = REFLECTION * EXPANSION;
                let expanded =
                    counted.vertex(self.clip((1.0 + stretch).mul_add(centroid, -stretch * worst.x)))?;
                worst = if expanded.f < reflected.f {
                    expanded
                } else {
                    reflected
                };
                continue;
            }

            let contracted = if reflected.f < worst.f {
                let pull = CONTRACTION * REFLECTION;
                let outside =
                    counted.vertex(self.clip((1.0 + pull).mul_add(centroid, -pull * worst.x)))?;
                (outside.f <= reflected.f).then_some(outside)
            } else {
                let inside = counted.vertex(
                    self.clip((1.0 - CONTRACTION).mul_add(centroid, CONTRACTION * worst.x)),
                )?;
                (inside.f < worst.f).then_some(inside)
            };

            worst = match contracted {
                Some(vertex) => vertex,
                None => counted.vertex(SHRINK.mul_add(worst.x - best.x, best.x))?,
            };
        };

        if worst.f < best.f {
            best = worst;
        }

        Ok(Minimum {
            x: best.x,
            value: best.f,
            iterations,
            evaluations: counted.evaluations,
            converged,
        })
    }
}
