//! Adaptive choice between the exact and Newton line searches
//!
//! Each iteration the driver measures its block kernels; the scheduler
//! compares the modelled cost of one exact-search iteration with the
//! modelled cost of one Newton-probe iteration and drops to the cheaper
//! Newton variant only when the exact search has stopped buying much
//! improvement. The Newton path reverses the decision itself when its
//! quadratic fit turns out unreliable.

use log::{debug, info};

use super::solver::TraceMinOptions;

/// Which line search the next iteration will run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinminStrategy {
    Exact,
    Approx,
}

/// Wall-clock seconds of the most recent run of each kernel class
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct KernelTimings {
    /// operator application, X <- A Z
    pub apply_a: f64,
    /// preconditioner application, X <- K Z
    pub apply_k: f64,
    /// cross Gram products, R <- Z^T W
    pub gram: f64,
    /// block right-multiplications, X <- Z S
    pub block_scale: f64,
    /// self Gram products, R <- Z^T Z
    pub gram_self: f64,
    /// one whole exact line search
    pub linmin: f64,
}

impl KernelTimings {
    fn projection_overhead(&self, options: &TraceMinOptions) -> f64 {
        if options.project_preconditioning {
            self.gram + self.block_scale
        } else {
            0.0
        }
    }

    pub fn exact_cost(&self, options: &TraceMinOptions) -> f64 {
        2.0 * self.apply_a
            + self.apply_k
            + 4.0 * self.gram
            + 2.0 * self.block_scale
            + 2.0 * self.gram_self
            + self.linmin
            + self.projection_overhead(options)
    }

    pub fn approx_cost(&self, options: &TraceMinOptions) -> f64 {
        2.0 * self.apply_a
            + self.apply_k
            + 2.0 * self.gram
            + 2.0 * self.block_scale
            + 2.0 * self.gram_self
            + self.projection_overhead(options)
    }
}

const IMPROVEMENT_FLOOR: f64 = 0.05;
const COST_RATIO: f64 = 2.0;

#[derive(Debug)]
pub(crate) struct StrategySelector {
    strategy: LinminStrategy,
}

impl StrategySelector {
    pub fn new(options: &TraceMinOptions) -> Self {
        let strategy = if options.force_approx_linmin {
            LinminStrategy::Approx
        } else {
            LinminStrategy::Exact
        };
        StrategySelector { strategy }
    }

    pub fn current(&self) -> LinminStrategy {
        self.strategy
    }

    /// Applied at the top of every iteration; the pinning flags win over
    /// anything the measurements decided.
    pub fn enforce(&mut self, options: &TraceMinOptions) {
        if options.force_approx_linmin {
            self.strategy = LinminStrategy::Approx;
        } else if options.force_exact_linmin {
            self.strategy = LinminStrategy::Exact;
        }
    }

    /// The Newton fit rejected itself; go back to the exact search.
    pub fn revert_to_exact(&mut self, options: &TraceMinOptions) {
        if self.strategy == LinminStrategy::Approx {
            if options.verbose {
                info!("switching back to exact line minimization");
            } else {
                debug!("switching back to exact line minimization");
            }
        }
        self.strategy = LinminStrategy::Exact;
    }

    /// End-of-iteration decision from the measured timings and the
    /// improvement the last exact search produced.
    pub fn consider_switch(
        &mut self,
        improvement: f64,
        timings: &KernelTimings,
        options: &TraceMinOptions,
    ) {
        if self.strategy != LinminStrategy::Exact || options.force_exact_linmin {
            return;
        }
        let exact = timings.exact_cost(options);
        let approx = timings.approx_cost(options);
        if improvement > 0.0 && improvement <= IMPROVEMENT_FLOOR && exact > COST_RATIO * approx {
            if options.verbose {
                info!(
                    "switching to approximate line minimization \
                     (improvement {improvement:.3e}, cost ratio {:.2})",
                    exact / approx
                );
            } else {
                debug!("switching to approximate line minimization");
            }
            self.strategy = LinminStrategy::Approx;
        }
    }
}
