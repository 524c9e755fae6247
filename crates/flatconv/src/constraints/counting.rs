//! Counting constraints: count of nonzeros and the two numberof forms.
//!
//! All three reduce to one reified equality per element plus a linear sum
//! row tying the indicators to the result.

use std::{
	fmt,
	hash::{Hash, Hasher},
};

use itertools::Itertools;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		algebraic::LinCon,
		cond_cmp::{CmpOp, CondLinCon},
		functional::LinFuncCon,
		ConClass, ConItem, ConSpec, Convert, Functional,
	},
	converter::FlatConverter,
	error::FlatError,
	expr::{AffineExpr, LinTerms},
	helpers::hash_f64,
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = |{i : x_i != 0}|`.
pub struct CountCon {
	/// The counted variables.
	pub vars: Vec<VarId>,
}

#[derive(Clone, Debug, PartialEq)]
/// `r = |{i : x_i == value}|` for a constant value.
pub struct NumberofConstCon {
	/// The compared constant.
	pub value: f64,
	/// The counted variables.
	pub vars: Vec<VarId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = |{i : x_i == target}|` for a variable target.
pub struct NumberofVarCon {
	/// The compared variable.
	pub target: VarId,
	/// The counted variables.
	pub vars: Vec<VarId>,
}

/// Result bounds of a counter over `n` elements.
fn count_bounds(n: usize) -> (f64, f64, VarType) {
	(0.0, n as f64, VarType::Integer)
}

impl CountCon {
	/// Create a count constraint.
	pub fn new(vars: Vec<VarId>) -> CountCon {
		CountCon { vars }
	}
}

impl ConSpec for CountCon {
	const CLASS: ConClass = ConClass::Count;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		self.vars.clone()
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::Count(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.counts
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.counts
	}

	fn kind(&self) -> ConKind {
		ConKind::Count
	}
}

impl Convert for CountCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let mut sum = LinTerms::new();
		for &x in &self.vars {
			if cvt.is_binary(x) {
				sum.push(1.0, x);
			} else {
				// 1 - (x == 0) counts a nonzero.
				let zero = cvt
					.assign_result_var(CondLinCon::new(LinTerms::single(1.0, x), CmpOp::Eq, 0.0))?;
				let nonzero = cvt.assign_result_var(LinFuncCon::new(AffineExpr::new(
					LinTerms::single(-1.0, zero),
					1.0,
				)))?;
				sum.push(1.0, nonzero);
			}
		}
		sum.push(-1.0, r);
		let _ = cvt.add_constraint(LinCon::eq(sum, 0.0))?;
		Ok(())
	}
}

impl Functional for CountCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		self.vars
			.iter()
			.map(|&v| model.is_fixed(v).then(|| model.fixed_value(v)))
			.collect::<Option<Vec<_>>>()
			.map(|vals| vals.into_iter().filter(|&v| v != 0.0).count() as f64)
	}

	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		count_bounds(self.vars.len())
	}
}

impl fmt::Display for CountCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"count({})",
			self.vars.iter().map(|v| format!("x{}", v.index())).join(", ")
		)
	}
}

impl NumberofConstCon {
	/// Create a numberof constraint against a constant.
	pub fn new(value: f64, vars: Vec<VarId>) -> NumberofConstCon {
		NumberofConstCon { value, vars }
	}
}

impl ConSpec for NumberofConstCon {
	const CLASS: ConClass = ConClass::NumberofConst;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		self.vars.clone()
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::NumberofConst(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.numberof_consts
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.numberof_consts
	}

	fn kind(&self) -> ConKind {
		ConKind::NumberofConst
	}
}

impl Convert for NumberofConstCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let mut sum = LinTerms::new();
		for &x in &self.vars {
			let hit = cvt.assign_result_var(CondLinCon::new(
				LinTerms::single(1.0, x),
				CmpOp::Eq,
				self.value,
			))?;
			sum.push(1.0, hit);
		}
		sum.push(-1.0, r);
		let _ = cvt.add_constraint(LinCon::eq(sum, 0.0))?;
		Ok(())
	}
}

impl Functional for NumberofConstCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		self.vars
			.iter()
			.map(|&v| model.is_fixed(v).then(|| model.fixed_value(v)))
			.collect::<Option<Vec<_>>>()
			.map(|vals| vals.into_iter().filter(|&v| v == self.value).count() as f64)
	}

	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		count_bounds(self.vars.len())
	}
}

impl Eq for NumberofConstCon {}

impl fmt::Display for NumberofConstCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"numberof {} in ({})",
			self.value,
			self.vars.iter().map(|v| format!("x{}", v.index())).join(", ")
		)
	}
}

impl Hash for NumberofConstCon {
	fn hash<H: Hasher>(&self, state: &mut H) {
		hash_f64(state, self.value);
		self.vars.hash(state);
	}
}

impl NumberofVarCon {
	/// Create a numberof constraint against a variable target.
	pub fn new(target: VarId, vars: Vec<VarId>) -> NumberofVarCon {
		NumberofVarCon { target, vars }
	}
}

impl ConSpec for NumberofVarCon {
	const CLASS: ConClass = ConClass::NumberofVar;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		let mut vars = vec![self.target];
		vars.extend_from_slice(&self.vars);
		vars
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::NumberofVar(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.numberof_vars
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.numberof_vars
	}

	fn kind(&self) -> ConKind {
		ConKind::NumberofVar
	}
}

impl Convert for NumberofVarCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let mut sum = LinTerms::new();
		for &x in &self.vars {
			let mut diff = LinTerms::single(1.0, x);
			diff.push(-1.0, self.target);
			let hit = cvt.assign_result_var(CondLinCon::new(diff, CmpOp::Eq, 0.0))?;
			sum.push(1.0, hit);
		}
		sum.push(-1.0, r);
		let _ = cvt.add_constraint(LinCon::eq(sum, 0.0))?;
		Ok(())
	}
}

impl Functional for NumberofVarCon {
	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		count_bounds(self.vars.len())
	}
}

impl fmt::Display for NumberofVarCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"numberof x{} in ({})",
			self.target.index(),
			self.vars.iter().map(|v| format!("x{}", v.index())).join(", ")
		)
	}
}
