//! The optimize/report interface a solver binding implements.

use std::{
	collections::HashMap,
	fmt,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use crate::{constraints::ConClass, error::FlatError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Basis status of a variable or row.
pub enum BasisStatus {
	/// Nonbasic at its lower bound.
	AtLower,
	/// Nonbasic at its upper bound.
	AtUpper,
	/// In the basis.
	Basic,
	/// Nonbasic and free.
	Superbasic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Optional solver capabilities, each gating a [`Backend`] method.
pub enum Feature {
	/// Basis retrieval and warm basis input.
	Basis,
	/// Best known dual bound of a MIP solve.
	BestBound,
	/// Re-solving a MIP with integers fixed to retrieve LP duals.
	FixModel,
	/// Irreducible infeasible subsystem computation.
	Iis,
	/// Marking rows as lazy constraints or user cuts.
	LazyUserCuts,
	/// MIP gap reporting.
	MipGap,
	/// Primal MIP starts.
	MipStart,
	/// Unboundedness ray retrieval.
	Rays,
	/// Sensitivity range suffixes.
	Sensitivity,
	/// Primal/dual warm starts for continuous models.
	WarmStart,
}

#[derive(Clone, Debug, Default)]
/// Cooperative interruption flag shared with a signal handler.
///
/// The flag is set from a signal-safe context and polled by the solver's
/// callback; nothing here blocks.
pub struct Interrupter {
	/// The shared flag.
	flag: Arc<AtomicBool>,
}

#[derive(Clone, Debug)]
/// Everything a solve produced, in terms of the final (converted) model.
pub struct Solution {
	/// Duals per constraint family, in the order constraints were pushed.
	pub duals: HashMap<ConClass, Vec<f64>>,
	/// Solver message accompanying the status.
	pub message: String,
	/// Objective values; only index 0 is fully defined.
	pub objectives: Vec<f64>,
	/// Primal values per final variable.
	pub primal: Vec<f64>,
	/// Terminal status.
	pub status: SolveStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Terminal status of a solve, translated from solver-native codes.
pub enum SolveStatus {
	/// Proven infeasible.
	Infeasible,
	/// Infeasible or unbounded, not distinguished by the solver.
	InfOrUnb,
	/// Stopped by an interrupt.
	Interrupted,
	/// Solved to the solver's satisfaction (optimal or feasible).
	Solved,
	/// Proven unbounded.
	Unbounded,
	/// The solver stopped without a definitive answer.
	Uncertain,
	/// Nothing is known.
	Unknown,
}

/// Unsupported optional feature error.
fn unsupported(call: &'static str) -> FlatError {
	FlatError::Solver {
		call,
		code: 0,
		message: "not supported by this solver".to_string(),
	}
}

/// Driver of one solver's optimize/report cycle.
///
/// Mandatory surface is [`Self::solve`]; everything else is gated by
/// [`Self::supports`].
pub trait Backend {
	/// Current basis, when [`Feature::Basis`] is supported.
	fn basis(&self) -> Option<(Vec<BasisStatus>, Vec<BasisStatus>)> {
		None
	}

	/// Best dual bound, when [`Feature::BestBound`] is supported.
	fn best_dual_bound(&self) -> Option<f64> {
		None
	}

	/// Compute an irreducible infeasible subsystem, returning row indices of
	/// the final model, when [`Feature::Iis`] is supported.
	fn compute_iis(&mut self) -> Result<Vec<usize>, FlatError> {
		Err(unsupported("compute_iis"))
	}

	/// Translate a solver-native status code.
	fn convert_status(&self, native: i32) -> SolveStatus {
		let _ = native;
		SolveStatus::Unknown
	}

	/// Relative MIP gap, when [`Feature::MipGap`] is supported.
	fn mip_gap(&self) -> Option<f64> {
		None
	}

	/// Load a warm basis, when [`Feature::Basis`] is supported.
	fn set_basis(&mut self, vars: &[BasisStatus], cons: &[BasisStatus]) -> Result<(), FlatError> {
		let _ = (vars, cons);
		Err(unsupported("set_basis"))
	}

	/// Load a primal MIP start, when [`Feature::MipStart`] is supported.
	fn set_mip_start(&mut self, values: &[f64]) -> Result<(), FlatError> {
		let _ = values;
		Err(unsupported("set_mip_start"))
	}

	/// Run the solver until a terminal status. Blocks; cancellation is
	/// cooperative through the interrupter.
	fn solve(&mut self, interrupter: &Interrupter) -> Result<Solution, FlatError>;

	/// Whether an optional capability is available.
	fn supports(&self, feature: Feature) -> bool {
		let _ = feature;
		false
	}
}

impl Interrupter {
	/// Request an interrupt. Safe to call from a signal handler.
	pub fn interrupt(&self) {
		self.flag.store(true, Ordering::SeqCst);
	}

	/// Whether an interrupt was requested.
	pub fn is_interrupted(&self) -> bool {
		self.flag.load(Ordering::SeqCst)
	}

	/// Create a fresh, unset interrupter.
	pub fn new() -> Interrupter {
		Interrupter::default()
	}
}

impl Solution {
	/// An empty solution with the given status.
	pub fn empty(status: SolveStatus) -> Solution {
		Solution {
			duals: HashMap::new(),
			message: String::new(),
			objectives: Vec::new(),
			primal: Vec::new(),
			status,
		}
	}
}

impl fmt::Display for SolveStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SolveStatus::Infeasible => "infeasible",
			SolveStatus::InfOrUnb => "infeasible or unbounded",
			SolveStatus::Interrupted => "interrupted",
			SolveStatus::Solved => "solved",
			SolveStatus::Unbounded => "unbounded",
			SolveStatus::Uncertain => "uncertain",
			SolveStatus::Unknown => "unknown",
		};
		write!(f, "{name}")
	}
}

#[cfg(test)]
mod tests {
	use crate::backend::{Backend, Feature, Interrupter, Solution, SolveStatus};
	use crate::error::FlatError;

	/// A backend stub translating made-up native codes.
	struct StubBackend;

	impl Backend for StubBackend {
		fn convert_status(&self, native: i32) -> SolveStatus {
			match native {
				1 => SolveStatus::Solved,
				2 => SolveStatus::Infeasible,
				3 => SolveStatus::InfOrUnb,
				4 => SolveStatus::Unbounded,
				5 => SolveStatus::Interrupted,
				6 => SolveStatus::Uncertain,
				_ => SolveStatus::Unknown,
			}
		}

		fn solve(&mut self, interrupter: &Interrupter) -> Result<Solution, FlatError> {
			if interrupter.is_interrupted() {
				return Ok(Solution::empty(SolveStatus::Interrupted));
			}
			Ok(Solution::empty(SolveStatus::Solved))
		}
	}

	#[test]
	fn test_status_translation() {
		let b = StubBackend;
		assert_eq!(b.convert_status(1), SolveStatus::Solved);
		assert_eq!(b.convert_status(2), SolveStatus::Infeasible);
		assert_eq!(b.convert_status(99), SolveStatus::Unknown);
	}

	#[test]
	fn test_cooperative_interrupt() {
		let mut b = StubBackend;
		let intr = Interrupter::new();
		let handler_side = intr.clone();
		handler_side.interrupt();
		let sol = b.solve(&intr).unwrap();
		assert_eq!(sol.status, SolveStatus::Interrupted);
	}

	#[test]
	fn test_optional_features_default_off() {
		let mut b = StubBackend;
		assert!(!b.supports(Feature::Iis));
		assert!(b.compute_iis().is_err());
		assert!(b.set_mip_start(&[0.0]).is_err());
	}
}
