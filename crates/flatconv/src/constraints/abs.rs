//! The absolute-value constraint and its MIP reformulation.

use std::fmt;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		algebraic::LinCon,
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
/// `r = |x|`.
pub struct AbsCon {
	/// The variable whose absolute value is taken.
	pub var: VarId,
}

impl AbsCon {
	/// Create an absolute-value constraint over `var`.
	pub fn new(var: VarId) -> AbsCon {
		AbsCon { var }
	}
}

impl ConSpec for AbsCon {
	const CLASS: ConClass = ConClass::Abs;
	const MAPPED: bool = true;
	const USES_CONTEXT: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		vec![self.var]
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::Abs(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.abses
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.abses
	}

	fn kind(&self) -> ConKind {
		ConKind::Abs
	}
}

impl Convert for AbsCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let ctx = cvt.stored_context::<Self>(index);
		if ctx.has_positive() {
			// r >= x and r >= -x
			let mut above = LinTerms::single(1.0, r);
			above.push(-1.0, self.var);
			let _ = cvt.add_constraint(LinCon::ge(above, 0.0))?;
			let mut below = LinTerms::single(1.0, r);
			below.push(1.0, self.var);
			let _ = cvt.add_constraint(LinCon::ge(below, 0.0))?;
		}
		if ctx.has_negative() {
			// r <= |x| through the disjunction r <= x or r <= -x.
			let b = cvt.add_var(0.0, 1.0, VarType::Integer)?;
			let mut right = LinTerms::single(1.0, r);
			right.push(-1.0, self.var);
			let _ = cvt.add_constraint(IndicatorLin::new(b, true, LinCon::le(right, 0.0)))?;
			let mut left = LinTerms::single(1.0, r);
			left.push(1.0, self.var);
			let _ = cvt.add_constraint(IndicatorLin::new(b, false, LinCon::le(left, 0.0)))?;
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
		cvt.propagate_result_of_init_expr(self.var, -ub, ub, Context::Mixed)
	}
}

impl Functional for AbsCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		model.is_fixed(self.var).then(|| model.fixed_value(self.var).abs())
	}

	fn result_bounds(&self, model: &FlatModel) -> (f64, f64, VarType) {
		let (lb, ub) = model.var_bounds(self.var);
		let bounds = if ub < 0.0 {
			(-ub, -lb)
		} else if lb >= 0.0 {
			(lb, ub)
		} else {
			(0.0, ub.max(-lb))
		};
		(bounds.0, bounds.1, model.var_type(self.var))
	}
}

impl fmt::Display for AbsCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "abs(x{})", self.var.index())
	}
}
