//! Liljencrants–Fant glottal source synthesis.
//!
//! One phonation cycle is described by [`CycleParms`] (`tp`, `te`, `ta`, `tc`).
//! [`generate_cycle`] solves the growth and decay rates so that the flow
//! derivative is continuous at the closure instant and carries no net flow,
//! samples it, integrates it into the glottal flow and band-limits the edge at
//! the closure instant.
//!
//! ```
//! use lfsyn::{generate_cycle, CycleParms, ModelParms};
//!
//! let cycle = CycleParms::new(0.2, 0.6, 0.05, 1.).unwrap();
//! let parms = ModelParms { sample_rate: 100, ..Default::default() };
//! let out = generate_cycle(&cycle, &parms).unwrap();
//! assert_eq!(out.source.len(), 101);
//! assert!(out.volume_velocity[100].abs() < 1e-3);
//! ```

mod antialias;
mod cycle;
mod formulas;
mod integrator;
mod model;
mod solver;
mod utils;

pub use antialias::*;
pub use cycle::*;
pub use formulas::*;
pub use integrator::*;
pub use model::*;
pub use solver::*;
pub use utils::{time_axis, LfError, LfResult};
