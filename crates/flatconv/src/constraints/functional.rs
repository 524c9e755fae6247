//! Functional constraints defining a variable as an affine or quadratic
//! expression.

use std::fmt;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		algebraic::{LinCon, QuadCon},
		ConClass, ConItem, ConSpec, Convert, Functional,
	},
	converter::FlatConverter,
	error::FlatError,
	expr::{AffineExpr, QuadExpr},
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = affine expression`.
pub struct LinFuncCon {
	/// The defining expression.
	pub expr: AffineExpr,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = quadratic expression`.
pub struct QuadFuncCon {
	/// The defining expression.
	pub expr: QuadExpr,
}

impl LinFuncCon {
	/// Wrap an affine expression.
	pub fn new(expr: AffineExpr) -> LinFuncCon {
		LinFuncCon { expr }
	}
}

impl ConSpec for LinFuncCon {
	const CLASS: ConClass = ConClass::LinFunc;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		self.expr.terms.vars().to_vec()
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::LinFunc(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.lin_funcs
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.lin_funcs
	}

	fn kind(&self) -> ConKind {
		ConKind::LinFunc
	}
}

impl Convert for LinFuncCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		// body - r == -shift
		let r = cvt.result_var_of::<Self>(index);
		let mut body = self.expr.terms.clone();
		body.push(-1.0, r);
		let _ = cvt.add_constraint(LinCon::eq(body, -self.expr.constant))?;
		Ok(())
	}
}

impl Functional for LinFuncCon {
	fn fold_constant(&self, _model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		self.expr.is_constant()
	}

	fn result_bounds(&self, model: &FlatModel) -> (f64, f64, VarType) {
		let (lb, ub) = model.affine_bounds(&self.expr);
		let ty = if model.affine_integral(&self.expr) {
			VarType::Integer
		} else {
			VarType::Continuous
		};
		(lb, ub, ty)
	}

	fn substitute_result<A: ModelApi>(
		&self,
		_cvt: &mut FlatConverter<A>,
	) -> Option<Result<VarId, FlatError>> {
		self.expr.is_variable().map(Ok)
	}
}

impl fmt::Display for LinFuncCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.expr.fmt(f)
	}
}

impl QuadFuncCon {
	/// Wrap a quadratic expression.
	pub fn new(expr: QuadExpr) -> QuadFuncCon {
		QuadFuncCon { expr }
	}
}

impl ConSpec for QuadFuncCon {
	const CLASS: ConClass = ConClass::QuadFunc;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		let mut vars = self.expr.affine.terms.vars().to_vec();
		for (_, v1, v2) in self.expr.quad.iter() {
			vars.push(v1);
			vars.push(v2);
		}
		vars
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::QuadFunc(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.quad_funcs
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.quad_funcs
	}

	fn kind(&self) -> ConKind {
		ConKind::QuadFunc
	}
}

impl Convert for QuadFuncCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let mut linear = self.expr.affine.terms.clone();
		linear.push(-1.0, r);
		let _ = cvt.add_constraint(QuadCon::eq(
			linear,
			self.expr.quad.clone(),
			-self.expr.affine.constant,
		))?;
		Ok(())
	}
}

impl Functional for QuadFuncCon {
	fn fold_constant(&self, _model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		self.expr
			.is_affine()
			.and_then(|affine| affine.is_constant())
	}

	fn result_bounds(&self, model: &FlatModel) -> (f64, f64, VarType) {
		let (lb, ub) = model.quad_expr_bounds(&self.expr);
		(lb, ub, VarType::Continuous)
	}

	fn substitute_result<A: ModelApi>(
		&self,
		_cvt: &mut FlatConverter<A>,
	) -> Option<Result<VarId, FlatError>> {
		self.expr.is_affine().and_then(|a| a.is_variable()).map(Ok)
	}
}

impl fmt::Display for QuadFuncCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.expr.fmt(f)
	}
}
