//! Real division, reformulated as a quadratic equality.

use std::fmt;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		algebraic::{LinCon, QuadCon},
		indicator::IndicatorLin,
		ConClass, ConItem, ConSpec, Convert, Functional,
	},
	converter::FlatConverter,
	error::FlatError,
	expr::{LinTerms, QuadTerms},
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = num / den`.
pub struct DivCon {
	/// The numerator.
	pub num: VarId,
	/// The denominator.
	pub den: VarId,
}

/// Bounds of `1/x` over an interval not known to exclude zero.
fn invert_bounds(lb: f64, ub: f64) -> (f64, f64) {
	if lb > 0.0 || ub < 0.0 {
		(1.0 / ub, 1.0 / lb)
	} else {
		(f64::NEG_INFINITY, f64::INFINITY)
	}
}

impl DivCon {
	/// Create a division constraint.
	pub fn new(num: VarId, den: VarId) -> DivCon {
		DivCon { num, den }
	}
}

impl ConSpec for DivCon {
	const CLASS: ConClass = ConClass::Div;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		vec![self.num, self.den]
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::Div(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.divs
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.divs
	}

	fn kind(&self) -> ConKind {
		ConKind::Div
	}
}

impl Convert for DivCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		// r * den - num == 0
		let r = cvt.result_var_of::<Self>(index);
		let _ = cvt.add_constraint(QuadCon::eq(
			LinTerms::single(-1.0, self.num),
			QuadTerms::single(1.0, r, self.den),
			0.0,
		))?;
		// When the denominator's range straddles zero, a sign binary keeps
		// it away from zero.
		let (dlb, dub) = cvt.var_bounds(self.den);
		if dlb < 0.0 && dub > 0.0 {
			let step = if cvt.var_type(self.den) == VarType::Integer {
				1.0
			} else {
				cvt.options().cmp_eps()
			};
			let sign = cvt.add_var(0.0, 1.0, VarType::Integer)?;
			let _ = cvt.add_constraint(IndicatorLin::new(
				sign,
				true,
				LinCon::ge(LinTerms::single(1.0, self.den), step),
			))?;
			let _ = cvt.add_constraint(IndicatorLin::new(
				sign,
				false,
				LinCon::le(LinTerms::single(1.0, self.den), -step),
			))?;
		}
		Ok(())
	}
}

impl Functional for DivCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		if model.is_fixed(self.num) && model.is_fixed(self.den) {
			let den = model.fixed_value(self.den);
			if den != 0.0 {
				return Some(model.fixed_value(self.num) / den);
			}
		}
		None
	}

	fn result_bounds(&self, model: &FlatModel) -> (f64, f64, VarType) {
		let (nlb, nub) = model.var_bounds(self.num);
		let (dlb, dub) = model.var_bounds(self.den);
		let inv = invert_bounds(dlb, dub);
		let (lb, ub) = crate::helpers::mul_bounds((nlb, nub), inv);
		(lb, ub, VarType::Continuous)
	}
}

impl fmt::Display for DivCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "x{} / x{}", self.num.index(), self.den.index())
	}
}

#[cfg(test)]
mod tests {
	use crate::constraints::div::invert_bounds;

	#[test]
	fn test_invert_bounds() {
		assert_eq!(invert_bounds(1.0, 2.0), (0.5, 1.0));
		assert_eq!(invert_bounds(-2.0, -1.0), (-1.0, -0.5));
		assert_eq!(
			invert_bounds(-1.0, 1.0),
			(f64::NEG_INFINITY, f64::INFINITY)
		);
	}
}
