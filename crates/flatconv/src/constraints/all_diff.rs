//! The all-different constraint and its value-binarization encoding.

use std::fmt;

use itertools::Itertools;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{algebraic::LinCon, ConClass, ConItem, ConSpec, Convert, Functional},
	converter::FlatConverter,
	error::FlatError,
	expr::LinTerms,
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `alldiff(x_1, ..., x_n)` over integer variables.
pub struct AllDiffCon {
	/// The pairwise different variables.
	pub vars: Vec<VarId>,
}

impl AllDiffCon {
	/// Create an all-different constraint.
	pub fn new(vars: Vec<VarId>) -> AllDiffCon {
		AllDiffCon { vars }
	}
}

impl ConSpec for AllDiffCon {
	const CLASS: ConClass = ConClass::AllDiff;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		self.vars.clone()
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::AllDiff(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.all_diffs
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.all_diffs
	}

	fn kind(&self) -> ConKind {
		ConKind::AllDiff
	}
}

impl Convert for AllDiffCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		// Only the asserted (root) form is supported.
		if let Some(r) = cvt.stored_result::<Self>(index) {
			if cvt.lb(r) <= 0.5 {
				return Err(cvt.no_conversion(ConKind::AllDiff));
			}
		}
		let lo = self.vars.iter().map(|&v| cvt.lb(v)).fold(f64::INFINITY, f64::min);
		let hi = self
			.vars
			.iter()
			.map(|&v| cvt.ub(v))
			.fold(f64::NEG_INFINITY, f64::max);
		let integer = self
			.vars
			.iter()
			.all(|&v| cvt.var_type(v) == VarType::Integer);
		if !lo.is_finite() || !hi.is_finite() || !integer {
			return Err(FlatError::UnboundedBigM {
				con: ConKind::AllDiff.name(),
				detail: "value binarization needs integer variables with finite bounds"
					.to_string(),
			});
		}

		// One assignment binary per (variable, value) pair.
		let values: Vec<i64> = (lo as i64..=hi as i64).collect();
		let mut by_value: Vec<LinTerms> = vec![LinTerms::new(); values.len()];
		for &x in &self.vars {
			let mut one_of = LinTerms::new();
			let mut weighted = LinTerms::single(1.0, x);
			for (k, &value) in values.iter().enumerate() {
				let y = cvt.add_var(0.0, 1.0, VarType::Integer)?;
				one_of.push(1.0, y);
				weighted.push(-(value as f64), y);
				by_value[k].push(1.0, y);
			}
			// Each variable takes exactly one value, and equals it.
			let _ = cvt.add_constraint(LinCon::eq(one_of, 1.0))?;
			let _ = cvt.add_constraint(LinCon::eq(weighted, 0.0))?;
		}
		// Each value is taken at most once.
		for row in by_value {
			let _ = cvt.add_constraint(LinCon::le(row, 1.0))?;
		}
		Ok(())
	}
}

impl Functional for AllDiffCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		let vals: Option<Vec<f64>> = self
			.vars
			.iter()
			.map(|&v| model.is_fixed(v).then(|| model.fixed_value(v)))
			.collect();
		vals.map(|vals| vals.iter().duplicates_by(|v| v.to_bits()).count() == 0)
			.map(|distinct| distinct as u8 as f64)
	}

	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		(0.0, 1.0, VarType::Integer)
	}
}

impl fmt::Display for AllDiffCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"alldiff({})",
			self.vars.iter().map(|v| format!("x{}", v.index())).join(", ")
		)
	}
}
