//! Minimum and maximum constraints over arrays of variables.
//!
//! Both reformulate into one-sided rows plus, when the context demands the
//! other direction, a selection disjunction: one indicator per element and a
//! convexity row over the selector binaries.

use std::fmt;

use itertools::Itertools;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		algebraic::{ConSense, LinCon},
		indicator::IndicatorLin,
		ConClass, ConItem, ConSpec, Convert, Functional,
	},
	context::Context,
	converter::FlatConverter,
	error::FlatError,
	expr::LinTerms,
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = max(x_1, ..., x_n)`.
pub struct MaxCon {
	/// The compared variables.
	pub vars: Vec<VarId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = min(x_1, ..., x_n)`.
pub struct MinCon {
	/// The compared variables.
	pub vars: Vec<VarId>,
}

/// Result type when every argument is integer.
fn joint_type(model: &FlatModel, vars: &[VarId]) -> VarType {
	if vars.iter().all(|&v| model.var_type(v) == VarType::Integer) {
		VarType::Integer
	} else {
		VarType::Continuous
	}
}

/// Emit the selection disjunction: per element an indicator enforcing the
/// missing side, and a convexity row over the selectors.
fn emit_selection<A: ModelApi>(
	cvt: &mut FlatConverter<A>,
	r: VarId,
	vars: &[VarId],
	selected_side: ConSense,
) -> Result<(), FlatError> {
	let mut convexity = LinTerms::new();
	for &x in vars {
		let b = cvt.add_var(0.0, 1.0, VarType::Integer)?;
		convexity.push(1.0, b);
		let mut row = LinTerms::single(1.0, r);
		row.push(-1.0, x);
		let _ = cvt.add_constraint(IndicatorLin::new(
			b,
			true,
			LinCon {
				body: row,
				sense: selected_side,
				rhs: 0.0,
			},
		))?;
	}
	let _ = cvt.add_constraint(LinCon::eq(convexity, 1.0))?;
	Ok(())
}

impl MaxCon {
	/// Create a maximum constraint.
	pub fn new(vars: Vec<VarId>) -> MaxCon {
		MaxCon { vars }
	}
}

impl ConSpec for MaxCon {
	const CLASS: ConClass = ConClass::Max;
	const MAPPED: bool = true;
	const USES_CONTEXT: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		self.vars.clone()
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::Max(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.maxes
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.maxes
	}

	fn kind(&self) -> ConKind {
		ConKind::Max
	}
}

impl Convert for MaxCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let ctx = cvt.stored_context::<Self>(index);
		if ctx.has_positive() {
			// r >= x_i for all i
			for &x in &self.vars {
				let mut row = LinTerms::single(1.0, r);
				row.push(-1.0, x);
				let _ = cvt.add_constraint(LinCon::ge(row, 0.0))?;
			}
		}
		if ctx.has_negative() {
			// r <= x_i for the selected i
			emit_selection(cvt, r, &self.vars, ConSense::Le)?;
		}
		Ok(())
	}

	fn propagate_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_lb: f64,
		ub: f64,
		_ctx: Context,
	) -> Result<(), FlatError> {
		// max <= ub caps every argument from above.
		for &x in &self.vars {
			cvt.propagate_result_of_init_expr(x, f64::NEG_INFINITY, ub, Context::Mixed)?;
		}
		Ok(())
	}
}

impl Functional for MaxCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		self.vars
			.iter()
			.map(|&v| model.is_fixed(v).then(|| model.fixed_value(v)))
			.collect::<Option<Vec<_>>>()
			.map(|vals| vals.into_iter().fold(f64::NEG_INFINITY, f64::max))
	}

	fn result_bounds(&self, model: &FlatModel) -> (f64, f64, VarType) {
		let lb = self
			.vars
			.iter()
			.map(|&v| model.lb(v))
			.fold(f64::NEG_INFINITY, f64::max);
		let ub = self
			.vars
			.iter()
			.map(|&v| model.ub(v))
			.fold(f64::NEG_INFINITY, f64::max);
		(lb, ub, joint_type(model, &self.vars))
	}
}

impl fmt::Display for MaxCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"max({})",
			self.vars.iter().map(|v| format!("x{}", v.index())).join(", ")
		)
	}
}

impl MinCon {
	/// Create a minimum constraint.
	pub fn new(vars: Vec<VarId>) -> MinCon {
		MinCon { vars }
	}
}

impl ConSpec for MinCon {
	const CLASS: ConClass = ConClass::Min;
	const MAPPED: bool = true;
	const USES_CONTEXT: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		self.vars.clone()
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::Min(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.mins
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.mins
	}

	fn kind(&self) -> ConKind {
		ConKind::Min
	}
}

impl Convert for MinCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let ctx = cvt.stored_context::<Self>(index);
		if ctx.has_negative() {
			// r <= x_i for all i
			for &x in &self.vars {
				let mut row = LinTerms::single(1.0, r);
				row.push(-1.0, x);
				let _ = cvt.add_constraint(LinCon::le(row, 0.0))?;
			}
		}
		if ctx.has_positive() {
			// r >= x_i for the selected i
			emit_selection(cvt, r, &self.vars, ConSense::Ge)?;
		}
		Ok(())
	}

	fn propagate_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		lb: f64,
		_ub: f64,
		_ctx: Context,
	) -> Result<(), FlatError> {
		// min >= lb lifts every argument from below.
		for &x in &self.vars {
			cvt.propagate_result_of_init_expr(x, lb, f64::INFINITY, Context::Mixed)?;
		}
		Ok(())
	}
}

impl Functional for MinCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		self.vars
			.iter()
			.map(|&v| model.is_fixed(v).then(|| model.fixed_value(v)))
			.collect::<Option<Vec<_>>>()
			.map(|vals| vals.into_iter().fold(f64::INFINITY, f64::min))
	}

	fn result_bounds(&self, model: &FlatModel) -> (f64, f64, VarType) {
		let lb = self
			.vars
			.iter()
			.map(|&v| model.lb(v))
			.fold(f64::INFINITY, f64::min);
		let ub = self
			.vars
			.iter()
			.map(|&v| model.ub(v))
			.fold(f64::INFINITY, f64::min);
		(lb, ub, joint_type(model, &self.vars))
	}
}

impl fmt::Display for MinCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"min({})",
			self.vars.iter().map(|v| format!("x{}", v.index())).join(", ")
		)
	}
}
