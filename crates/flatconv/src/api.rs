//! The model-construction interface a solver binding implements.
//!
//! A `ModelApi` is a thin wrapper over one solver's native model-building
//! calls. It declares, per constraint kind, how well the solver handles the
//! kind natively; the converter guarantees that [`ModelApi::add_constraint`]
//! is only ever called for accepted kinds.

use std::path::Path;

use crate::{
	acceptance::{Acceptance, ConKind},
	constraints::ConItem,
	error::FlatError,
	expr::{AffineExpr, QuadExpr},
	model::{ObjSense, VarType},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Size information handed to the solver before the model is pushed.
pub struct ProblemInfo {
	/// Number of constraints across all pools.
	pub num_cons: usize,
	/// Number of objectives.
	pub num_objs: usize,
	/// Number of variables, auxiliary ones included.
	pub num_vars: usize,
}

/// One solver's model-building API.
///
/// The converter drives the sequence [`Self::init_problem`],
/// [`Self::add_variables`], objectives, [`Self::add_constraint`] per
/// remaining constraint, [`Self::finish_problem`].
pub trait ModelApi {
	/// Acceptance level of a constraint kind.
	fn acceptance(&self, kind: ConKind) -> Acceptance;

	/// Take one constraint. Only called for kinds whose resolved acceptance
	/// is not [`Acceptance::NotAccepted`].
	fn add_constraint(&mut self, item: &ConItem) -> Result<(), FlatError>;

	/// Take all variables at once.
	fn add_variables(
		&mut self,
		lbs: &[f64],
		ubs: &[f64],
		types: &[VarType],
	) -> Result<(), FlatError>;

	/// Finish the model modification phase.
	fn finish_problem(&mut self) -> Result<(), FlatError> {
		Ok(())
	}

	/// The solver's representation of `+inf` bounds.
	fn infinity(&self) -> f64 {
		f64::INFINITY
	}

	/// Start the model modification phase.
	fn init_problem(&mut self, info: &ProblemInfo) -> Result<(), FlatError> {
		let _ = info;
		Ok(())
	}

	/// The solver's representation of `-inf` bounds.
	fn minus_infinity(&self) -> f64 {
		f64::NEG_INFINITY
	}

	/// Whether one specific item of an accepted kind must be converted
	/// anyway, e.g. a power whose base can be negative.
	fn needs_item_conversion(&self, item: &ConItem) -> bool {
		let _ = item;
		false
	}

	/// Set a linear objective.
	fn set_linear_objective(
		&mut self,
		iobj: usize,
		sense: ObjSense,
		expr: &AffineExpr,
	) -> Result<(), FlatError>;

	/// Set an objective with quadratic terms.
	fn set_quadratic_objective(
		&mut self,
		iobj: usize,
		sense: ObjSense,
		expr: &QuadExpr,
	) -> Result<(), FlatError>;

	/// Name of the solver, for diagnostics.
	fn solver_name(&self) -> &str;

	/// Export the pushed model to a file (`.lp`/`.mps` by extension), when
	/// the solver supports it.
	fn write_problem(&mut self, path: &Path) -> Result<(), FlatError> {
		let _ = path;
		Err(FlatError::Solver {
			call: "write_problem",
			code: 0,
			message: format!("{} cannot export model files", self.solver_name()),
		})
	}
}
