//! Complementarity constraints and their disjunctive MIP encoding.
//!
//! `expr complements v` with `v` in `[l, u]` holds when `v = l` and
//! `expr >= 0`, or `expr = 0`, or `v = u` and `expr <= 0`. The encoding
//! picks the branch with selector binaries and enforces each side through
//! indicators.

use std::fmt;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		algebraic::{LinCon, QuadCon},
		indicator::{IndicatorLin, IndicatorQuad},
		ConClass, ConItem, ConSpec, Convert,
	},
	converter::FlatConverter,
	error::FlatError,
	expr::{AffineExpr, QuadExpr},
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	value_graph::Aggregation,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// An affine expression complementing a variable.
pub struct ComplLin {
	/// The complementary expression.
	pub expr: AffineExpr,
	/// The complemented variable.
	pub var: VarId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// A quadratic expression complementing a variable.
pub struct ComplQuad {
	/// The complementary expression.
	pub expr: QuadExpr,
	/// The complemented variable.
	pub var: VarId,
}

/// The rows any branch of the disjunction may need, on either expression
/// shape.
trait ComplRows {
	/// `expr == 0`
	fn eq_zero<A: ModelApi>(&self, cvt: &mut FlatConverter<A>, b: VarId) -> Result<(), FlatError>;
	/// `expr >= 0`
	fn ge_zero<A: ModelApi>(&self, cvt: &mut FlatConverter<A>, b: VarId) -> Result<(), FlatError>;
	/// `expr <= 0`
	fn le_zero<A: ModelApi>(&self, cvt: &mut FlatConverter<A>, b: VarId) -> Result<(), FlatError>;
}

/// Shared disjunction over the branches the variable's bounds allow.
fn convert_disjunction<A: ModelApi, R: ComplRows>(
	cvt: &mut FlatConverter<A>,
	rows: &R,
	var: VarId,
) -> Result<(), FlatError> {
	cvt.set_link_aggregation(Aggregation::First);
	let (l, u) = cvt.var_bounds(var);
	if !l.is_finite() && !u.is_finite() {
		// A free variable leaves only the interior branch.
		let free = cvt.add_var(1.0, 1.0, VarType::Integer)?;
		return rows.eq_zero(cvt, free);
	}
	let mut selectors = crate::expr::LinTerms::new();
	if l.is_finite() {
		// v at its lower bound, expression pressing up.
		let b = cvt.add_var(0.0, 1.0, VarType::Integer)?;
		selectors.push(1.0, b);
		let _ = cvt.add_constraint(IndicatorLin::new(
			b,
			true,
			LinCon::le(crate::expr::LinTerms::single(1.0, var), l),
		))?;
		rows.ge_zero(cvt, b)?;
	}
	{
		let b = cvt.add_var(0.0, 1.0, VarType::Integer)?;
		selectors.push(1.0, b);
		rows.eq_zero(cvt, b)?;
	}
	if u.is_finite() {
		// v at its upper bound, expression pressing down.
		let b = cvt.add_var(0.0, 1.0, VarType::Integer)?;
		selectors.push(1.0, b);
		let _ = cvt.add_constraint(IndicatorLin::new(
			b,
			true,
			LinCon::ge(crate::expr::LinTerms::single(1.0, var), u),
		))?;
		rows.le_zero(cvt, b)?;
	}
	let _ = cvt.add_constraint(LinCon::eq(selectors, 1.0))?;
	Ok(())
}

impl ComplLin {
	/// Create a linear complementarity constraint.
	pub fn new(expr: AffineExpr, var: VarId) -> ComplLin {
		ComplLin { expr, var }
	}
}

impl ComplRows for ComplLin {
	fn eq_zero<A: ModelApi>(&self, cvt: &mut FlatConverter<A>, b: VarId) -> Result<(), FlatError> {
		let _ = cvt.add_constraint(IndicatorLin::new(
			b,
			true,
			LinCon::eq(self.expr.terms.clone(), -self.expr.constant),
		))?;
		Ok(())
	}

	fn ge_zero<A: ModelApi>(&self, cvt: &mut FlatConverter<A>, b: VarId) -> Result<(), FlatError> {
		let _ = cvt.add_constraint(IndicatorLin::new(
			b,
			true,
			LinCon::ge(self.expr.terms.clone(), -self.expr.constant),
		))?;
		Ok(())
	}

	fn le_zero<A: ModelApi>(&self, cvt: &mut FlatConverter<A>, b: VarId) -> Result<(), FlatError> {
		let _ = cvt.add_constraint(IndicatorLin::new(
			b,
			true,
			LinCon::le(self.expr.terms.clone(), -self.expr.constant),
		))?;
		Ok(())
	}
}

impl ConSpec for ComplLin {
	const CLASS: ConClass = ConClass::ComplLin;

	fn arg_vars(&self) -> Vec<VarId> {
		let mut vars = self.expr.terms.vars().to_vec();
		vars.push(self.var);
		vars
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::ComplLin(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.compl_lins
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.compl_lins
	}

	fn kind(&self) -> ConKind {
		ConKind::ComplLin
	}
}

impl Convert for ComplLin {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_index: usize,
	) -> Result<(), FlatError> {
		convert_disjunction(cvt, self, self.var)
	}
}

impl fmt::Display for ComplLin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "complements({}, x{})", self.expr, self.var.index())
	}
}

impl ComplQuad {
	/// Create a quadratic complementarity constraint.
	pub fn new(expr: QuadExpr, var: VarId) -> ComplQuad {
		ComplQuad { expr, var }
	}

	/// The implied quadratic row `expr sense 0`.
	fn row(&self, sense: crate::constraints::algebraic::ConSense) -> QuadCon {
		QuadCon {
			linear: self.expr.affine.terms.clone(),
			quad: self.expr.quad.clone(),
			sense,
			rhs: -self.expr.affine.constant,
		}
	}
}

impl ComplRows for ComplQuad {
	fn eq_zero<A: ModelApi>(&self, cvt: &mut FlatConverter<A>, b: VarId) -> Result<(), FlatError> {
		let _ = cvt.add_constraint(IndicatorQuad::new(
			b,
			true,
			self.row(crate::constraints::algebraic::ConSense::Eq),
		))?;
		Ok(())
	}

	fn ge_zero<A: ModelApi>(&self, cvt: &mut FlatConverter<A>, b: VarId) -> Result<(), FlatError> {
		let _ = cvt.add_constraint(IndicatorQuad::new(
			b,
			true,
			self.row(crate::constraints::algebraic::ConSense::Ge),
		))?;
		Ok(())
	}

	fn le_zero<A: ModelApi>(&self, cvt: &mut FlatConverter<A>, b: VarId) -> Result<(), FlatError> {
		let _ = cvt.add_constraint(IndicatorQuad::new(
			b,
			true,
			self.row(crate::constraints::algebraic::ConSense::Le),
		))?;
		Ok(())
	}
}

impl ConSpec for ComplQuad {
	const CLASS: ConClass = ConClass::ComplQuad;

	fn arg_vars(&self) -> Vec<VarId> {
		let mut vars = self.expr.affine.terms.vars().to_vec();
		for (_, v1, v2) in self.expr.quad.iter() {
			vars.push(v1);
			vars.push(v2);
		}
		vars.push(self.var);
		vars
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::ComplQuad(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.compl_quads
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.compl_quads
	}

	fn kind(&self) -> ConKind {
		ConKind::ComplQuad
	}
}

impl Convert for ComplQuad {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_index: usize,
	) -> Result<(), FlatError> {
		convert_disjunction(cvt, self, self.var)
	}
}

impl fmt::Display for ComplQuad {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "complements({}, x{})", self.expr, self.var.index())
	}
}
