//! # Flatconv - a flat-model conversion pipeline for optimization solvers
//!
//! Flatconv sits between a modeling-language flattener and mathematical
//! optimization solvers. It accepts a large taxonomy of structured
//! constraints (linear, quadratic, indicator, piecewise-linear, SOS,
//! complementarity, elementary nonlinear functions, logical connectives,
//! counting, conditional comparisons, min/max/abs, if-then-else), and
//! delivers to each solver only the constraint forms that solver natively
//! supports, rewriting the rest through a cascade of redefinition rules.
//!
//! Every rewrite is recorded in a value graph, so that solution values
//! (primal, duals, basis, sensitivities) reported for the final model can
//! be mapped back onto the model that was put in.
//!
//! The two integration points are the [`ModelApi`] trait, a thin wrapper
//! over one solver's model-building calls declaring which constraint kinds
//! the solver accepts, and the [`Backend`] trait driving its
//! optimize/report cycle.

pub mod acceptance;
pub mod api;
pub mod backend;
pub mod constraints;
pub mod context;
pub mod converter;
pub mod error;
pub mod expr;
pub(crate) mod helpers;
pub mod keeper;
pub mod model;
pub mod options;
pub mod value_graph;
#[cfg(test)]
pub(crate) mod tests;

pub use crate::{
	acceptance::{Acceptance, ConKind},
	api::{ModelApi, ProblemInfo},
	backend::{Backend, BasisStatus, Feature, Interrupter, Solution, SolveStatus},
	constraints::{ConClass, ConItem},
	context::Context,
	converter::{FlatConverter, ModelSolution},
	error::FlatError,
	expr::{AffineExpr, LinTerms, QuadExpr, QuadTerms},
	model::{FlatModel, ObjSense, Objective, VarId, VarType},
	options::ConvertOptions,
};
use crate::constraints::{
	abs::AbsCon,
	all_diff::AllDiffCon,
	counting::{CountCon, NumberofConstCon, NumberofVarCon},
	div::DivCon,
	if_then::IfThenCon,
	logic::{AndCon, NotCon, OrCon},
	min_max::{MaxCon, MinCon},
};

/// Create a constraint defining a variable as the absolute value of
/// another.
pub fn abs_of(var: VarId) -> AbsCon {
	AbsCon::new(var)
}

/// Create a constraint asserting that all the given integer variables take
/// different values.
pub fn all_different<Iter>(vars: Iter) -> AllDiffCon
where
	Iter: IntoIterator<Item = VarId>,
{
	AllDiffCon::new(vars.into_iter().collect())
}

/// Create a constraint defining a variable as the conjunction of binary
/// variables.
pub fn and_of<Iter>(vars: Iter) -> AndCon
where
	Iter: IntoIterator<Item = VarId>,
{
	AndCon::new(vars.into_iter().collect())
}

/// Create a constraint defining a variable as the number of nonzero
/// variables among the given ones.
pub fn count_of<Iter>(vars: Iter) -> CountCon
where
	Iter: IntoIterator<Item = VarId>,
{
	CountCon::new(vars.into_iter().collect())
}

/// Create a constraint defining a variable as the quotient of two others.
pub fn div_of(num: VarId, den: VarId) -> DivCon {
	DivCon::new(num, den)
}

/// Create a constraint selecting between two variables on a binary
/// condition.
pub fn if_then_else(cond: VarId, then_var: VarId, else_var: VarId) -> IfThenCon {
	IfThenCon::new(cond, then_var, else_var)
}

/// Create a constraint defining a variable as the maximum of the given
/// variables.
pub fn max_of<Iter>(vars: Iter) -> MaxCon
where
	Iter: IntoIterator<Item = VarId>,
{
	MaxCon::new(vars.into_iter().collect())
}

/// Create a constraint defining a variable as the minimum of the given
/// variables.
pub fn min_of<Iter>(vars: Iter) -> MinCon
where
	Iter: IntoIterator<Item = VarId>,
{
	MinCon::new(vars.into_iter().collect())
}

/// Create a constraint defining a variable as the negation of a binary
/// variable.
pub fn not_of(var: VarId) -> NotCon {
	NotCon::new(var)
}

/// Create a constraint counting how many of the given variables equal a
/// constant.
pub fn numberof_const<Iter>(value: f64, vars: Iter) -> NumberofConstCon
where
	Iter: IntoIterator<Item = VarId>,
{
	NumberofConstCon::new(value, vars.into_iter().collect())
}

/// Create a constraint counting how many of the given variables equal a
/// target variable.
pub fn numberof_var<Iter>(target: VarId, vars: Iter) -> NumberofVarCon
where
	Iter: IntoIterator<Item = VarId>,
{
	NumberofVarCon::new(target, vars.into_iter().collect())
}

/// Create a constraint defining a variable as the disjunction of binary
/// variables.
pub fn or_of<Iter>(vars: Iter) -> OrCon
where
	Iter: IntoIterator<Item = VarId>,
{
	OrCon::new(vars.into_iter().collect())
}
