//! Reified comparisons: a binary result that is equivalent to a linear or
//! quadratic comparison holding.

use std::{
	fmt,
	hash::{Hash, Hasher},
};

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		algebraic::{LinCon, QuadCon},
		functional::LinFuncCon,
		indicator::{IndicatorLin, IndicatorQuad},
		ConClass, ConItem, ConSpec, Convert, Functional,
	},
	converter::FlatConverter,
	error::FlatError,
	expr::{AffineExpr, LinTerms, QuadTerms},
	helpers::{hash_f64, is_integral},
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Comparison operator of a reified comparison.
pub enum CmpOp {
	/// `<=`
	Le,
	/// `<`
	Lt,
	/// `==`
	Eq,
	/// `>=`
	Ge,
	/// `>`
	Gt,
}

#[derive(Clone, Debug, PartialEq)]
/// `r <=> (body op rhs)` with a linear body.
pub struct CondLinCon {
	/// The compared linear body.
	pub body: LinTerms,
	/// The comparison operator.
	pub op: CmpOp,
	/// The right-hand side.
	pub rhs: f64,
}

#[derive(Clone, Debug, PartialEq)]
/// `r <=> (linear + quad op rhs)` with a quadratic body.
pub struct CondQuadCon {
	/// The linear part of the compared body.
	pub linear: LinTerms,
	/// The quadratic part of the compared body.
	pub quad: QuadTerms,
	/// The comparison operator.
	pub op: CmpOp,
	/// The right-hand side.
	pub rhs: f64,
}

impl CmpOp {
	/// Whether the comparison holds for a decided body value.
	fn holds(self, body: f64, rhs: f64) -> bool {
		match self {
			CmpOp::Le => body <= rhs,
			CmpOp::Lt => body < rhs,
			CmpOp::Eq => body == rhs,
			CmpOp::Ge => body >= rhs,
			CmpOp::Gt => body > rhs,
		}
	}
}

impl fmt::Display for CmpOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CmpOp::Le => write!(f, "<="),
			CmpOp::Lt => write!(f, "<"),
			CmpOp::Eq => write!(f, "=="),
			CmpOp::Ge => write!(f, ">="),
			CmpOp::Gt => write!(f, ">"),
		}
	}
}

/// Decide a comparison from body bounds, when they already decide it.
fn decide(op: CmpOp, lb: f64, ub: f64, rhs: f64) -> Option<f64> {
	let sure_true = match op {
		CmpOp::Le => ub <= rhs,
		CmpOp::Lt => ub < rhs,
		CmpOp::Eq => lb == rhs && ub == rhs,
		CmpOp::Ge => lb >= rhs,
		CmpOp::Gt => lb > rhs,
	};
	if sure_true {
		return Some(1.0);
	}
	let sure_false = match op {
		CmpOp::Le => lb > rhs,
		CmpOp::Lt => lb >= rhs,
		CmpOp::Eq => rhs < lb || rhs > ub,
		CmpOp::Ge => ub < rhs,
		CmpOp::Gt => ub <= rhs,
	};
	if sure_false {
		return Some(0.0);
	}
	None
}

impl CondLinCon {
	/// Create a reified linear comparison.
	pub fn new(body: LinTerms, op: CmpOp, rhs: f64) -> CondLinCon {
		CondLinCon { body, op, rhs }
	}

	/// Smallest representable violation of the comparison: `1` on integral
	/// bodies, the comparison epsilon otherwise.
	fn step<A: ModelApi>(&self, cvt: &FlatConverter<A>) -> f64 {
		if cvt.model().terms_integral(&self.body) && is_integral(self.rhs) {
			1.0
		} else {
			cvt.options().cmp_eps()
		}
	}
}

impl ConSpec for CondLinCon {
	const CLASS: ConClass = ConClass::CondLin;
	const MAPPED: bool = true;
	const USES_CONTEXT: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		self.body.vars().to_vec()
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::CondLin(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.cond_lins
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.cond_lins
	}

	fn kind(&self) -> ConKind {
		match self.op {
			CmpOp::Le => ConKind::CondLinLe,
			CmpOp::Lt => ConKind::CondLinLt,
			CmpOp::Eq => ConKind::CondLinEq,
			CmpOp::Ge => ConKind::CondLinGe,
			CmpOp::Gt => ConKind::CondLinGt,
		}
	}
}

impl Convert for CondLinCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let ctx = cvt.stored_context::<Self>(index);
		let step = self.step(cvt);
		if ctx.has_positive() {
			// r = 1 => the comparison holds.
			let row = match self.op {
				CmpOp::Le => LinCon::le(self.body.clone(), self.rhs),
				CmpOp::Lt => LinCon::le(self.body.clone(), self.rhs - step),
				CmpOp::Eq => LinCon::eq(self.body.clone(), self.rhs),
				CmpOp::Ge => LinCon::ge(self.body.clone(), self.rhs),
				CmpOp::Gt => LinCon::ge(self.body.clone(), self.rhs + step),
			};
			let _ = cvt.add_constraint(IndicatorLin::new(r, true, row))?;
		}
		if ctx.has_negative() {
			// r = 0 => the comparison is violated.
			match self.op {
				CmpOp::Le => {
					let row = LinCon::ge(self.body.clone(), self.rhs + step);
					let _ = cvt.add_constraint(IndicatorLin::new(r, false, row))?;
				},
				CmpOp::Lt => {
					let row = LinCon::ge(self.body.clone(), self.rhs);
					let _ = cvt.add_constraint(IndicatorLin::new(r, false, row))?;
				},
				CmpOp::Ge => {
					let row = LinCon::le(self.body.clone(), self.rhs - step);
					let _ = cvt.add_constraint(IndicatorLin::new(r, false, row))?;
				},
				CmpOp::Gt => {
					let row = LinCon::le(self.body.clone(), self.rhs);
					let _ = cvt.add_constraint(IndicatorLin::new(r, false, row))?;
				},
				CmpOp::Eq => {
					// A violated equality deviates on one side: pick it with
					// two violation binaries.
					let below = cvt.add_var(0.0, 1.0, VarType::Integer)?;
					let above = cvt.add_var(0.0, 1.0, VarType::Integer)?;
					let low = LinCon::le(self.body.clone(), self.rhs - step);
					let _ = cvt.add_constraint(IndicatorLin::new(below, true, low))?;
					let high = LinCon::ge(self.body.clone(), self.rhs + step);
					let _ = cvt.add_constraint(IndicatorLin::new(above, true, high))?;
					let mut select = LinTerms::single(1.0, below);
					select.push(1.0, above);
					select.push(1.0, r);
					let row = if ctx.has_positive() {
						LinCon::eq(select, 1.0)
					} else {
						LinCon::ge(select, 1.0)
					};
					let _ = cvt.add_constraint(row)?;
				},
			}
		}
		Ok(())
	}
}

impl Functional for CondLinCon {
	fn fold_constant(&self, model: &FlatModel, opts: &ConvertOptions) -> Option<f64> {
		if self.op == CmpOp::Eq && !opts.preprocess_eq_result() {
			return None;
		}
		let (lb, ub) = model.terms_bounds(&self.body);
		if lb == ub {
			return Some(self.op.holds(lb, self.rhs) as u8 as f64);
		}
		decide(self.op, lb, ub, self.rhs)
	}

	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		(0.0, 1.0, VarType::Integer)
	}

	fn substitute_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
	) -> Option<Result<VarId, FlatError>> {
		// Recognize `x == 1` and `x == 0` over a binary x.
		if self.op != CmpOp::Eq || !cvt.options().preprocess_eq_binary() {
			return None;
		}
		if self.body.len() != 1 || self.body.coefs()[0] != 1.0 {
			return None;
		}
		let x = self.body.vars()[0];
		if !cvt.is_binary(x) {
			return None;
		}
		if self.rhs == 1.0 {
			Some(Ok(x))
		} else if self.rhs == 0.0 {
			let complement = AffineExpr::new(LinTerms::single(-1.0, x), 1.0);
			Some(cvt.assign_result_var(LinFuncCon::new(complement)))
		} else {
			None
		}
	}
}

impl Eq for CondLinCon {}

impl fmt::Display for CondLinCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({} {} {})", self.body, self.op, self.rhs)
	}
}

impl Hash for CondLinCon {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.body.hash(state);
		self.op.hash(state);
		hash_f64(state, self.rhs);
	}
}

impl CondQuadCon {
	/// Create a reified quadratic comparison.
	pub fn new(linear: LinTerms, quad: QuadTerms, op: CmpOp, rhs: f64) -> CondQuadCon {
		CondQuadCon {
			linear,
			quad,
			op,
			rhs,
		}
	}

	/// Smallest representable violation of the comparison.
	fn step<A: ModelApi>(&self, cvt: &FlatConverter<A>) -> f64 {
		let model = cvt.model();
		let quad_integral = self.quad.iter().all(|(c, v1, v2)| {
			is_integral(c)
				&& model.var_type(v1) == VarType::Integer
				&& model.var_type(v2) == VarType::Integer
		});
		if model.terms_integral(&self.linear) && quad_integral && is_integral(self.rhs) {
			1.0
		} else {
			cvt.options().cmp_eps()
		}
	}
}

impl ConSpec for CondQuadCon {
	const CLASS: ConClass = ConClass::CondQuad;
	const MAPPED: bool = true;
	const USES_CONTEXT: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		let mut vars = self.linear.vars().to_vec();
		for (_, v1, v2) in self.quad.iter() {
			vars.push(v1);
			vars.push(v2);
		}
		vars
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::CondQuad(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.cond_quads
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.cond_quads
	}

	fn kind(&self) -> ConKind {
		match self.op {
			CmpOp::Le => ConKind::CondQuadLe,
			CmpOp::Lt => ConKind::CondQuadLt,
			CmpOp::Eq => ConKind::CondQuadEq,
			CmpOp::Ge => ConKind::CondQuadGe,
			CmpOp::Gt => ConKind::CondQuadGt,
		}
	}
}

impl Convert for CondQuadCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let ctx = cvt.stored_context::<Self>(index);
		let step = self.step(cvt);
		let quad_row = |rhs: f64, le: bool| {
			if le {
				QuadCon::le(self.linear.clone(), self.quad.clone(), rhs)
			} else {
				QuadCon::ge(self.linear.clone(), self.quad.clone(), rhs)
			}
		};
		if ctx.has_positive() {
			let row = match self.op {
				CmpOp::Le => quad_row(self.rhs, true),
				CmpOp::Lt => quad_row(self.rhs - step, true),
				CmpOp::Eq => QuadCon::eq(self.linear.clone(), self.quad.clone(), self.rhs),
				CmpOp::Ge => quad_row(self.rhs, false),
				CmpOp::Gt => quad_row(self.rhs + step, false),
			};
			let _ = cvt.add_constraint(IndicatorQuad::new(r, true, row))?;
		}
		if ctx.has_negative() {
			match self.op {
				CmpOp::Le => {
					let _ = cvt.add_constraint(IndicatorQuad::new(
						r,
						false,
						quad_row(self.rhs + step, false),
					))?;
				},
				CmpOp::Lt => {
					let _ = cvt
						.add_constraint(IndicatorQuad::new(r, false, quad_row(self.rhs, false)))?;
				},
				CmpOp::Ge => {
					let _ = cvt.add_constraint(IndicatorQuad::new(
						r,
						false,
						quad_row(self.rhs - step, true),
					))?;
				},
				CmpOp::Gt => {
					let _ =
						cvt.add_constraint(IndicatorQuad::new(r, false, quad_row(self.rhs, true)))?;
				},
				CmpOp::Eq => {
					let below = cvt.add_var(0.0, 1.0, VarType::Integer)?;
					let above = cvt.add_var(0.0, 1.0, VarType::Integer)?;
					let _ = cvt.add_constraint(IndicatorQuad::new(
						below,
						true,
						quad_row(self.rhs - step, true),
					))?;
					let _ = cvt.add_constraint(IndicatorQuad::new(
						above,
						true,
						quad_row(self.rhs + step, false),
					))?;
					let mut select = LinTerms::single(1.0, below);
					select.push(1.0, above);
					select.push(1.0, r);
					let row = if ctx.has_positive() {
						LinCon::eq(select, 1.0)
					} else {
						LinCon::ge(select, 1.0)
					};
					let _ = cvt.add_constraint(row)?;
				},
			}
		}
		Ok(())
	}
}

impl Functional for CondQuadCon {
	fn fold_constant(&self, model: &FlatModel, opts: &ConvertOptions) -> Option<f64> {
		if self.op == CmpOp::Eq && !opts.preprocess_eq_result() {
			return None;
		}
		let (llb, lub) = model.terms_bounds(&self.linear);
		let (qlb, qub) = model.quad_terms_bounds(&self.quad);
		decide(self.op, llb + qlb, lub + qub, self.rhs)
	}

	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		(0.0, 1.0, VarType::Integer)
	}
}

impl Eq for CondQuadCon {}

impl fmt::Display for CondQuadCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let expr = crate::expr::QuadExpr::new(
			AffineExpr::new(self.linear.clone(), 0.0),
			self.quad.clone(),
		);
		write!(f, "({expr} {} {})", self.op, self.rhs)
	}
}

impl Hash for CondQuadCon {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.linear.hash(state);
		self.quad.hash(state);
		self.op.hash(state);
		hash_f64(state, self.rhs);
	}
}

#[cfg(test)]
mod tests {
	use crate::constraints::cond_cmp::{decide, CmpOp};

	#[test]
	fn test_decide_by_bounds() {
		assert_eq!(decide(CmpOp::Le, 0.0, 3.0, 5.0), Some(1.0));
		assert_eq!(decide(CmpOp::Le, 6.0, 9.0, 5.0), Some(0.0));
		assert_eq!(decide(CmpOp::Le, 0.0, 9.0, 5.0), None);
		assert_eq!(decide(CmpOp::Eq, 2.0, 2.0, 2.0), Some(1.0));
		assert_eq!(decide(CmpOp::Eq, 0.0, 1.0, 2.0), Some(0.0));
		assert_eq!(decide(CmpOp::Gt, 3.0, 9.0, 2.0), Some(1.0));
	}
}
