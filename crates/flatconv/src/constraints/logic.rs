//! Logical connectives over binary variables.

use std::fmt;

use itertools::Itertools;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{algebraic::LinCon, ConClass, ConItem, ConSpec, Convert, Functional},
	context::Context,
	converter::FlatConverter,
	error::FlatError,
	expr::LinTerms,
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = x_1 and ... and x_n` over binary variables.
pub struct AndCon {
	/// The conjuncts.
	pub vars: Vec<VarId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = not x` over a binary variable.
pub struct NotCon {
	/// The negated variable.
	pub var: VarId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = x_1 or ... or x_n` over binary variables.
pub struct OrCon {
	/// The disjuncts.
	pub vars: Vec<VarId>,
}

impl AndCon {
	/// Create a conjunction constraint.
	pub fn new(vars: Vec<VarId>) -> AndCon {
		AndCon { vars }
	}
}

impl ConSpec for AndCon {
	const CLASS: ConClass = ConClass::And;
	const MAPPED: bool = true;
	const USES_CONTEXT: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		self.vars.clone()
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::And(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.ands
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.ands
	}

	fn kind(&self) -> ConKind {
		ConKind::And
	}
}

impl Convert for AndCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let ctx = cvt.stored_context::<Self>(index);
		if cvt.lb(r) > 0.5 {
			// The conjunction is asserted; fix the conjuncts directly.
			for &x in &self.vars {
				cvt.narrow_var_bounds(x, 1.0, f64::INFINITY)?;
			}
			return Ok(());
		}
		if ctx.has_positive() {
			// r = 1 forces every conjunct: x_i - r >= 0
			for &x in &self.vars {
				let mut row = LinTerms::single(1.0, x);
				row.push(-1.0, r);
				let _ = cvt.add_constraint(LinCon::ge(row, 0.0))?;
			}
		}
		if ctx.has_negative() {
			// r = 0 forces a false conjunct: sum x_i - r <= n - 1
			let mut row: LinTerms = self.vars.iter().map(|&x| (1.0, x)).collect();
			row.push(-1.0, r);
			let _ = cvt.add_constraint(LinCon::le(row, self.vars.len() as f64 - 1.0))?;
		}
		Ok(())
	}

	fn propagate_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		lb: f64,
		_ub: f64,
		ctx: Context,
	) -> Result<(), FlatError> {
		// Under negation De Morgan only applies after Not rewriting, so a
		// negative use degrades the conjuncts to mixed.
		let arg_ctx = if ctx.has_negative() { Context::Mixed } else { ctx };
		let arg_lb = if lb > 0.5 { 1.0 } else { 0.0 };
		for &x in &self.vars {
			cvt.propagate_result_of_init_expr(x, arg_lb, 1.0, arg_ctx)?;
		}
		Ok(())
	}
}

impl Functional for AndCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		if self.vars.iter().any(|&v| model.ub(v) < 0.5) {
			return Some(0.0);
		}
		if self.vars.iter().all(|&v| model.lb(v) > 0.5) {
			return Some(1.0);
		}
		None
	}

	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		(0.0, 1.0, VarType::Integer)
	}
}

impl fmt::Display for AndCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"and({})",
			self.vars.iter().map(|v| format!("x{}", v.index())).join(", ")
		)
	}
}

impl NotCon {
	/// Create a negation constraint.
	pub fn new(var: VarId) -> NotCon {
		NotCon { var }
	}
}

impl ConSpec for NotCon {
	const CLASS: ConClass = ConClass::Not;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		vec![self.var]
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::Not(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.nots
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.nots
	}

	fn kind(&self) -> ConKind {
		ConKind::Not
	}
}

impl Convert for NotCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		// r + x == 1
		let r = cvt.result_var_of::<Self>(index);
		let mut row = LinTerms::single(1.0, r);
		row.push(1.0, self.var);
		let _ = cvt.add_constraint(LinCon::eq(row, 1.0))?;
		Ok(())
	}

	fn propagate_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		lb: f64,
		ub: f64,
		ctx: Context,
	) -> Result<(), FlatError> {
		cvt.propagate_result_of_init_expr(self.var, 1.0 - ub, 1.0 - lb, ctx.flip())
	}
}

impl Functional for NotCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		model
			.is_fixed(self.var)
			.then(|| 1.0 - model.fixed_value(self.var))
	}

	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		(0.0, 1.0, VarType::Integer)
	}
}

impl fmt::Display for NotCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "not(x{})", self.var.index())
	}
}

impl OrCon {
	/// Create a disjunction constraint.
	pub fn new(vars: Vec<VarId>) -> OrCon {
		OrCon { vars }
	}
}

impl ConSpec for OrCon {
	const CLASS: ConClass = ConClass::Or;
	const MAPPED: bool = true;
	const USES_CONTEXT: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		self.vars.clone()
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::Or(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.ors
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.ors
	}

	fn kind(&self) -> ConKind {
		ConKind::Or
	}
}

impl Convert for OrCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let ctx = cvt.stored_context::<Self>(index);
		if cvt.ub(r) < 0.5 {
			// The disjunction is refuted; clear every disjunct.
			for &x in &self.vars {
				cvt.narrow_var_bounds(x, f64::NEG_INFINITY, 0.0)?;
			}
			return Ok(());
		}
		if ctx.has_positive() {
			// r = 1 forces a true disjunct: sum x_i - r >= 0
			let mut row: LinTerms = self.vars.iter().map(|&x| (1.0, x)).collect();
			row.push(-1.0, r);
			let _ = cvt.add_constraint(LinCon::ge(row, 0.0))?;
		}
		if ctx.has_negative() {
			// r = 0 clears every disjunct: x_i - r <= 0
			for &x in &self.vars {
				let mut row = LinTerms::single(1.0, x);
				row.push(-1.0, r);
				let _ = cvt.add_constraint(LinCon::le(row, 0.0))?;
			}
		}
		Ok(())
	}

	fn propagate_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_lb: f64,
		ub: f64,
		ctx: Context,
	) -> Result<(), FlatError> {
		let arg_ctx = if ctx.has_positive() { Context::Mixed } else { ctx };
		let arg_ub = if ub < 0.5 { 0.0 } else { 1.0 };
		for &x in &self.vars {
			cvt.propagate_result_of_init_expr(x, 0.0, arg_ub, arg_ctx)?;
		}
		Ok(())
	}
}

impl Functional for OrCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		if self.vars.iter().any(|&v| model.lb(v) > 0.5) {
			return Some(1.0);
		}
		if self.vars.iter().all(|&v| model.ub(v) < 0.5) {
			return Some(0.0);
		}
		None
	}

	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		(0.0, 1.0, VarType::Integer)
	}
}

impl fmt::Display for OrCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"or({})",
			self.vars.iter().map(|v| format!("x{}", v.index())).join(", ")
		)
	}
}
