//! If-then-else selection between two variables.

use std::fmt;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		algebraic::LinCon,
		indicator::IndicatorLin,
		ConClass, ConItem, ConSpec, Convert, Functional,
	},
	converter::FlatConverter,
	error::FlatError,
	expr::LinTerms,
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = if c then t else e`, with `c` binary.
pub struct IfThenCon {
	/// The binary condition.
	pub cond: VarId,
	/// Value when the condition holds.
	pub then_var: VarId,
	/// Value when the condition fails.
	pub else_var: VarId,
}

impl IfThenCon {
	/// Create an if-then-else constraint.
	pub fn new(cond: VarId, then_var: VarId, else_var: VarId) -> IfThenCon {
		IfThenCon {
			cond,
			then_var,
			else_var,
		}
	}
}

impl ConSpec for IfThenCon {
	const CLASS: ConClass = ConClass::IfThen;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		vec![self.cond, self.then_var, self.else_var]
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::IfThen(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.if_thens
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.if_thens
	}

	fn kind(&self) -> ConKind {
		ConKind::IfThen
	}
}

impl Convert for IfThenCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		// c = 1 => r - t == 0 and c = 0 => r - e == 0
		let r = cvt.result_var_of::<Self>(index);
		let mut then_row = LinTerms::single(1.0, r);
		then_row.push(-1.0, self.then_var);
		let _ = cvt.add_constraint(IndicatorLin::new(
			self.cond,
			true,
			LinCon::eq(then_row, 0.0),
		))?;
		let mut else_row = LinTerms::single(1.0, r);
		else_row.push(-1.0, self.else_var);
		let _ = cvt.add_constraint(IndicatorLin::new(
			self.cond,
			false,
			LinCon::eq(else_row, 0.0),
		))?;
		Ok(())
	}
}

impl Functional for IfThenCon {
	fn result_bounds(&self, model: &FlatModel) -> (f64, f64, VarType) {
		let (tlb, tub) = model.var_bounds(self.then_var);
		let (elb, eub) = model.var_bounds(self.else_var);
		let ty = if model.var_type(self.then_var) == VarType::Integer
			&& model.var_type(self.else_var) == VarType::Integer
		{
			VarType::Integer
		} else {
			VarType::Continuous
		};
		(tlb.min(elb), tub.max(eub), ty)
	}

	fn substitute_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
	) -> Option<Result<VarId, FlatError>> {
		// A decided condition selects its branch outright.
		if cvt.is_fixed(self.cond) {
			let branch = if cvt.fixed_value(self.cond) > 0.5 {
				self.then_var
			} else {
				self.else_var
			};
			return Some(Ok(branch));
		}
		None
	}
}

impl fmt::Display for IfThenCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"if x{} then x{} else x{}",
			self.cond.index(),
			self.then_var.index(),
			self.else_var.index()
		)
	}
}
