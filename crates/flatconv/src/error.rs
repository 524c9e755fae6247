//! Error type used by the conversion pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
/// Error raised while building, converting, or pushing a flat model.
///
/// Conversion errors are fatal for the current model but leave the process
/// healthy; nothing here poisons shared state.
pub enum FlatError {
	/// The conversion loop did not reach a fixpoint within its pass budget.
	///
	/// Rewrites map rejected types to strictly more accepted ones, so this
	/// indicates a defective rule set rather than a hard model.
	#[error("conversion did not terminate after {passes} passes")]
	ConversionLoop {
		/// Number of full passes over all constraint pools performed.
		passes: usize,
	},
	/// A functional constraint was inserted into a dedup map that already
	/// contained it. Internal defect.
	#[error("duplicate insertion into the '{keeper}' constraint map")]
	DuplicateMapInsert {
		/// Type name of the offending constraint pool.
		keeper: &'static str,
	},
	/// Writing the conversion graph export failed.
	#[error("failed to export the conversion graph: {0}")]
	GraphExport(#[from] std::io::Error),
	/// Bound tightening emptied a variable's domain.
	#[error("infeasible domain for variable x{var}: [{lb}, {ub}]")]
	InfeasibleDomain {
		/// Index of the variable.
		var: usize,
		/// Offending lower bound.
		lb: f64,
		/// Offending upper bound.
		ub: f64,
	},
	/// An option name was unknown or its value was out of range.
	#[error("invalid option '{name}': {reason}")]
	InvalidOption {
		/// The option name as given.
		name: String,
		/// Why the option was rejected.
		reason: String,
	},
	/// A rejected constraint type has no registered rewrite.
	#[error("constraint type '{con}' is not accepted by {solver}, and no conversion is implemented")]
	NoConversion {
		/// Type name of the rejected constraint.
		con: &'static str,
		/// Name of the target solver.
		solver: String,
	},
	/// A native solver call failed.
	#[error("solver call '{call}' failed with code {code}: {message}")]
	Solver {
		/// Name of the failing API call.
		call: &'static str,
		/// Native return code.
		code: i32,
		/// Solver-provided message, if any.
		message: String,
	},
	/// A reformulation needed a finite bound that the model does not supply.
	#[error("conversion of '{con}' needs finite bounds: {detail}")]
	UnboundedBigM {
		/// Type name of the constraint being converted.
		con: &'static str,
		/// What exactly was unbounded.
		detail: String,
	},
}

impl FlatError {
	/// Whether a failed conversion may keep the original constraint when the
	/// solver accepts it anyway.
	pub(crate) fn is_conversion_failure(&self) -> bool {
		matches!(
			self,
			FlatError::NoConversion { .. } | FlatError::UnboundedBigM { .. }
		)
	}
}
