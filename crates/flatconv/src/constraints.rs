//! The constraint catalog: storage types, their shared traits, and the
//! per-type rewrite rules.
//!
//! Each module holds the storage type(s) of one constraint family together
//! with their conversion into solver-accepted forms. The traits below are
//! what the converter dispatches through; dispatch is static, the concrete
//! type is restored before any rule runs.

pub mod abs;
pub mod algebraic;
pub mod all_diff;
pub mod complementarity;
pub mod cond_cmp;
pub mod counting;
pub mod div;
pub mod elementary;
pub mod functional;
pub mod if_then;
pub mod indicator;
pub mod logic;
pub mod min_max;
pub mod piecewise;
pub mod sos;

use std::{fmt, hash::Hash};

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		abs::AbsCon,
		algebraic::{LinCon, LinConRange, QuadCon, QuadConRange},
		all_diff::AllDiffCon,
		complementarity::{ComplLin, ComplQuad},
		cond_cmp::{CondLinCon, CondQuadCon},
		counting::{CountCon, NumberofConstCon, NumberofVarCon},
		div::DivCon,
		elementary::ElemFuncCon,
		functional::{LinFuncCon, QuadFuncCon},
		if_then::IfThenCon,
		indicator::{IndicatorLin, IndicatorQuad},
		logic::{AndCon, NotCon, OrCon},
		min_max::{MaxCon, MinCon},
		piecewise::PlCon,
		sos::{Sos1Con, Sos2Con},
	},
	context::Context,
	converter::FlatConverter,
	error::FlatError,
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// The storage classes of constraints, one per pool of a [`FlatModel`].
///
/// Classes are coarser than [`ConKind`]: one pool can hold items of several
/// kinds (e.g. all senses of a linear constraint, or all elementary
/// functions), since their storage shape and rewrite rule coincide.
pub enum ConClass {
	/// [`AbsCon`] pool.
	Abs,
	/// [`AllDiffCon`] pool.
	AllDiff,
	/// [`AndCon`] pool.
	And,
	/// [`ComplLin`] pool.
	ComplLin,
	/// [`ComplQuad`] pool.
	ComplQuad,
	/// [`CondLinCon`] pool.
	CondLin,
	/// [`CondQuadCon`] pool.
	CondQuad,
	/// [`CountCon`] pool.
	Count,
	/// [`DivCon`] pool.
	Div,
	/// [`ElemFuncCon`] pool.
	ElemFunc,
	/// [`IfThenCon`] pool.
	IfThen,
	/// [`IndicatorLin`] pool.
	IndicatorLin,
	/// [`IndicatorQuad`] pool.
	IndicatorQuad,
	/// [`LinCon`] pool.
	LinCon,
	/// [`LinConRange`] pool.
	LinConRange,
	/// [`LinFuncCon`] pool.
	LinFunc,
	/// [`MaxCon`] pool.
	Max,
	/// [`MinCon`] pool.
	Min,
	/// [`NotCon`] pool.
	Not,
	/// [`NumberofConstCon`] pool.
	NumberofConst,
	/// [`NumberofVarCon`] pool.
	NumberofVar,
	/// [`OrCon`] pool.
	Or,
	/// [`PlCon`] pool.
	Pl,
	/// [`QuadCon`] pool.
	QuadCon,
	/// [`QuadConRange`] pool.
	QuadConRange,
	/// [`QuadFuncCon`] pool.
	QuadFunc,
	/// [`Sos1Con`] pool.
	Sos1,
	/// [`Sos2Con`] pool.
	Sos2,
}

#[derive(Clone, Debug, PartialEq)]
/// A constraint of any storage class, as handed to a
/// [`ModelApi`](crate::api::ModelApi).
///
/// Functional variants carry their assigned result variable alongside the
/// stored arguments.
#[allow(missing_docs)]
pub enum ConItem {
	Abs(AbsCon, Option<VarId>),
	AllDiff(AllDiffCon, Option<VarId>),
	And(AndCon, Option<VarId>),
	ComplLin(ComplLin),
	ComplQuad(ComplQuad),
	CondLin(CondLinCon, Option<VarId>),
	CondQuad(CondQuadCon, Option<VarId>),
	Count(CountCon, Option<VarId>),
	Div(DivCon, Option<VarId>),
	ElemFunc(ElemFuncCon, Option<VarId>),
	IfThen(IfThenCon, Option<VarId>),
	IndicatorLin(IndicatorLin),
	IndicatorQuad(IndicatorQuad),
	LinCon(LinCon),
	LinConRange(LinConRange),
	LinFunc(LinFuncCon, Option<VarId>),
	Max(MaxCon, Option<VarId>),
	Min(MinCon, Option<VarId>),
	Not(NotCon, Option<VarId>),
	NumberofConst(NumberofConstCon, Option<VarId>),
	NumberofVar(NumberofVarCon, Option<VarId>),
	Or(OrCon, Option<VarId>),
	Pl(PlCon, Option<VarId>),
	QuadCon(QuadCon),
	QuadConRange(QuadConRange),
	QuadFunc(QuadFuncCon, Option<VarId>),
	Sos1(Sos1Con),
	Sos2(Sos2Con),
}

/// Shared behavior of every storable constraint type.
pub trait ConSpec: Clone + fmt::Debug + fmt::Display + Eq + Hash + Sized {
	/// Storage class of the type.
	const CLASS: ConClass;
	/// Whether a dedup map is kept for the type.
	const MAPPED: bool = false;
	/// Whether conversion consults the stored usage context.
	const USES_CONTEXT: bool = false;

	/// Variables referenced by the constraint, excluding its result.
	fn arg_vars(&self) -> Vec<VarId>;
	/// Wrap the constraint into the unified item enum, together with its
	/// assigned result variable when there is one.
	fn into_item(self, result: Option<VarId>) -> ConItem;
	/// This type's pool in the model.
	fn keeper(model: &FlatModel) -> &Keeper<Self>;
	/// This type's pool in the model, mutable.
	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self>;
	/// Acceptance kind of this item.
	fn kind(&self) -> ConKind;
}

/// Conversion and propagation rules of a constraint type.
///
/// `convert` must emit constraints equivalent to the item (under its stored
/// context) through the converter's add methods, so that the surrounding
/// autolink scope records the rewrite in the value graph. A rule that can
/// fail must do so before emitting anything.
pub trait Convert: ConSpec {
	/// Rewrite the item at `index` into more accepted forms.
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let _ = index;
		Err(cvt.no_conversion(self.kind()))
	}

	/// Narrow argument bounds and push context downwards, given new bounds
	/// `[lb, ub]` imposed on the result variable.
	fn propagate_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		lb: f64,
		ub: f64,
		ctx: Context,
	) -> Result<(), FlatError> {
		let _ = (lb, ub, ctx);
		cvt.propagate_args_mixed(&self.arg_vars())
	}

	/// Push context from a root (asserted) constraint into the defining
	/// expressions of its arguments.
	fn propagate_root<A: ModelApi>(&self, cvt: &mut FlatConverter<A>) -> Result<(), FlatError> {
		cvt.propagate_args_mixed(&self.arg_vars())
	}

	/// Absorb an asserted constraint into variable bounds instead of
	/// storing it, when possible. Returns whether it was absorbed.
	fn try_absorb_root<A: ModelApi>(&self, cvt: &mut FlatConverter<A>) -> Result<bool, FlatError> {
		let _ = cvt;
		Ok(false)
	}
}

/// A functional constraint `r = f(args)` whose result variable the
/// converter allocates.
pub trait Functional: ConSpec {
	/// Fold to a constant when the argument bounds decide the result.
	fn fold_constant(&self, model: &FlatModel, opts: &ConvertOptions) -> Option<f64> {
		let _ = (model, opts);
		None
	}

	/// Bounds and type of the result variable, deduced from the arguments.
	fn result_bounds(&self, model: &FlatModel) -> (f64, f64, VarType);

	/// Reuse an existing variable as the result instead of allocating one.
	fn substitute_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
	) -> Option<Result<VarId, FlatError>> {
		let _ = cvt;
		None
	}
}

impl ConClass {
	/// All classes, in the fixed registration order the conversion loop
	/// follows.
	pub fn all() -> &'static [ConClass] {
		use ConClass::*;
		&[
			LinConRange, LinCon, QuadConRange, QuadCon, LinFunc, QuadFunc, Max, Min, Abs, And, Or,
			CondLin, CondQuad, Not, Div, IfThen, AllDiff, NumberofConst, NumberofVar, Count,
			ElemFunc, IndicatorLin, IndicatorQuad, Pl, Sos1, Sos2, ComplLin, ComplQuad,
		]
	}

	/// Storage type name.
	pub fn name(self) -> &'static str {
		use ConClass::*;
		match self {
			Abs => "AbsCon",
			AllDiff => "AllDiffCon",
			And => "AndCon",
			ComplLin => "ComplLin",
			ComplQuad => "ComplQuad",
			CondLin => "CondLinCon",
			CondQuad => "CondQuadCon",
			Count => "CountCon",
			Div => "DivCon",
			ElemFunc => "ElemFuncCon",
			IfThen => "IfThenCon",
			IndicatorLin => "IndicatorLin",
			IndicatorQuad => "IndicatorQuad",
			LinCon => "LinCon",
			LinConRange => "LinConRange",
			LinFunc => "LinFuncCon",
			Max => "MaxCon",
			Min => "MinCon",
			Not => "NotCon",
			NumberofConst => "NumberofConstCon",
			NumberofVar => "NumberofVarCon",
			Or => "OrCon",
			Pl => "PlCon",
			QuadCon => "QuadCon",
			QuadConRange => "QuadConRange",
			QuadFunc => "QuadFuncCon",
			Sos1 => "Sos1Con",
			Sos2 => "Sos2Con",
		}
	}
}

/// Write the `x<r> == ` prefix of a functional item with a known result.
fn write_result(f: &mut fmt::Formatter<'_>, result: Option<VarId>) -> fmt::Result {
	if let Some(r) = result {
		write!(f, "x{} == ", r.index())?;
	}
	Ok(())
}

impl ConItem {
	/// Acceptance kind of the wrapped constraint.
	pub fn kind(&self) -> ConKind {
		match self {
			ConItem::Abs(c, _) => c.kind(),
			ConItem::AllDiff(c, _) => c.kind(),
			ConItem::And(c, _) => c.kind(),
			ConItem::ComplLin(c) => c.kind(),
			ConItem::ComplQuad(c) => c.kind(),
			ConItem::CondLin(c, _) => c.kind(),
			ConItem::CondQuad(c, _) => c.kind(),
			ConItem::Count(c, _) => c.kind(),
			ConItem::Div(c, _) => c.kind(),
			ConItem::ElemFunc(c, _) => c.kind(),
			ConItem::IfThen(c, _) => c.kind(),
			ConItem::IndicatorLin(c) => c.kind(),
			ConItem::IndicatorQuad(c) => c.kind(),
			ConItem::LinCon(c) => c.kind(),
			ConItem::LinConRange(c) => c.kind(),
			ConItem::LinFunc(c, _) => c.kind(),
			ConItem::Max(c, _) => c.kind(),
			ConItem::Min(c, _) => c.kind(),
			ConItem::Not(c, _) => c.kind(),
			ConItem::NumberofConst(c, _) => c.kind(),
			ConItem::NumberofVar(c, _) => c.kind(),
			ConItem::Or(c, _) => c.kind(),
			ConItem::Pl(c, _) => c.kind(),
			ConItem::QuadCon(c) => c.kind(),
			ConItem::QuadConRange(c) => c.kind(),
			ConItem::QuadFunc(c, _) => c.kind(),
			ConItem::Sos1(c) => c.kind(),
			ConItem::Sos2(c) => c.kind(),
		}
	}

	/// Result variable of a functional item, if assigned.
	pub fn result_var(&self) -> Option<VarId> {
		match self {
			ConItem::Abs(_, r)
			| ConItem::AllDiff(_, r)
			| ConItem::And(_, r)
			| ConItem::CondLin(_, r)
			| ConItem::CondQuad(_, r)
			| ConItem::Count(_, r)
			| ConItem::Div(_, r)
			| ConItem::ElemFunc(_, r)
			| ConItem::IfThen(_, r)
			| ConItem::LinFunc(_, r)
			| ConItem::Max(_, r)
			| ConItem::Min(_, r)
			| ConItem::Not(_, r)
			| ConItem::NumberofConst(_, r)
			| ConItem::NumberofVar(_, r)
			| ConItem::Or(_, r)
			| ConItem::Pl(_, r)
			| ConItem::QuadFunc(_, r) => *r,
			_ => None,
		}
	}
}

impl fmt::Display for ConItem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write_result(f, self.result_var())?;
		match self {
			ConItem::Abs(c, _) => c.fmt(f),
			ConItem::AllDiff(c, _) => c.fmt(f),
			ConItem::And(c, _) => c.fmt(f),
			ConItem::ComplLin(c) => c.fmt(f),
			ConItem::ComplQuad(c) => c.fmt(f),
			ConItem::CondLin(c, _) => c.fmt(f),
			ConItem::CondQuad(c, _) => c.fmt(f),
			ConItem::Count(c, _) => c.fmt(f),
			ConItem::Div(c, _) => c.fmt(f),
			ConItem::ElemFunc(c, _) => c.fmt(f),
			ConItem::IfThen(c, _) => c.fmt(f),
			ConItem::IndicatorLin(c) => c.fmt(f),
			ConItem::IndicatorQuad(c) => c.fmt(f),
			ConItem::LinCon(c) => c.fmt(f),
			ConItem::LinConRange(c) => c.fmt(f),
			ConItem::LinFunc(c, _) => c.fmt(f),
			ConItem::Max(c, _) => c.fmt(f),
			ConItem::Min(c, _) => c.fmt(f),
			ConItem::Not(c, _) => c.fmt(f),
			ConItem::NumberofConst(c, _) => c.fmt(f),
			ConItem::NumberofVar(c, _) => c.fmt(f),
			ConItem::Or(c, _) => c.fmt(f),
			ConItem::Pl(c, _) => c.fmt(f),
			ConItem::QuadCon(c) => c.fmt(f),
			ConItem::QuadConRange(c) => c.fmt(f),
			ConItem::QuadFunc(c, _) => c.fmt(f),
			ConItem::Sos1(c) => c.fmt(f),
			ConItem::Sos2(c) => c.fmt(f),
		}
	}
}
