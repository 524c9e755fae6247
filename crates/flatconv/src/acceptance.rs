//! Solver acceptance levels and the per-constraint-type tag registry.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// How well a solver handles a constraint type natively.
pub enum Acceptance {
	/// The solver cannot take the constraint; it must be converted.
	NotAccepted,
	/// The solver takes the constraint, but a reformulation is usually
	/// preferable.
	AcceptedButNotRecommended,
	/// The solver handles the constraint well.
	Recommended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// The acceptance granularity of constraints.
///
/// Kinds are finer than the storage types where a sense, operator, or
/// function field changes what a solver can take: a linear `<=` row and a
/// linear range row are one storage shape apart but two different kinds.
/// Acceptance queries, `acc:<tag>` user overrides, and conversion decisions
/// all work on kinds; storage works on types.
pub enum ConKind {
	/// Linear `<=` constraint.
	LinLe,
	/// Linear `==` constraint.
	LinEq,
	/// Linear `>=` constraint.
	LinGe,
	/// Two-sided linear constraint.
	LinRange,
	/// Quadratic `<=` constraint.
	QuadLe,
	/// Quadratic `==` constraint.
	QuadEq,
	/// Quadratic `>=` constraint.
	QuadGe,
	/// Two-sided quadratic constraint.
	QuadRange,
	/// Variable defined by an affine expression.
	LinFunc,
	/// Variable defined by a quadratic expression.
	QuadFunc,
	/// Absolute value.
	Abs,
	/// Minimum of variables.
	Min,
	/// Maximum of variables.
	Max,
	/// Conjunction of binary variables.
	And,
	/// Disjunction of binary variables.
	Or,
	/// Negation of a binary variable.
	Not,
	/// Real division.
	Div,
	/// If-then-else selection.
	IfThen,
	/// Reified linear `<=` comparison.
	CondLinLe,
	/// Reified linear `<` comparison.
	CondLinLt,
	/// Reified linear `==` comparison.
	CondLinEq,
	/// Reified linear `>=` comparison.
	CondLinGe,
	/// Reified linear `>` comparison.
	CondLinGt,
	/// Reified quadratic `<=` comparison.
	CondQuadLe,
	/// Reified quadratic `<` comparison.
	CondQuadLt,
	/// Reified quadratic `==` comparison.
	CondQuadEq,
	/// Reified quadratic `>=` comparison.
	CondQuadGe,
	/// Reified quadratic `>` comparison.
	CondQuadGt,
	/// Count of nonzero arguments.
	Count,
	/// Count of arguments equal to a constant.
	NumberofConst,
	/// Count of arguments equal to a variable.
	NumberofVar,
	/// All-different over integer variables.
	AllDiff,
	/// Natural exponential.
	Exp,
	/// Exponential with a constant base.
	ExpA,
	/// Natural logarithm.
	Log,
	/// Logarithm with a constant base.
	LogA,
	/// Power with a constant exponent.
	Pow,
	/// Sine.
	Sin,
	/// Cosine.
	Cos,
	/// Tangent.
	Tan,
	/// Indicator over a linear `<=` row.
	IndLinLe,
	/// Indicator over a linear `==` row.
	IndLinEq,
	/// Indicator over a linear `>=` row.
	IndLinGe,
	/// Indicator over a quadratic `<=` row.
	IndQuadLe,
	/// Indicator over a quadratic `==` row.
	IndQuadEq,
	/// Indicator over a quadratic `>=` row.
	IndQuadGe,
	/// Piecewise-linear function.
	Pl,
	/// Special ordered set of type 1.
	Sos1,
	/// Special ordered set of type 2.
	Sos2,
	/// Complementarity with an affine expression.
	ComplLin,
	/// Complementarity with a quadratic expression.
	ComplQuad,
}

impl ConKind {
	/// Look a kind up by its `acc:` option tag.
	pub fn from_tag(tag: &str) -> Option<ConKind> {
		ConKind::all().iter().copied().find(|k| k.tag() == tag)
	}

	/// Human-readable constraint type name, used in diagnostics.
	pub fn name(self) -> &'static str {
		use ConKind::*;
		match self {
			LinLe => "LinConLE",
			LinEq => "LinConEQ",
			LinGe => "LinConGE",
			LinRange => "LinConRange",
			QuadLe => "QuadConLE",
			QuadEq => "QuadConEQ",
			QuadGe => "QuadConGE",
			QuadRange => "QuadConRange",
			LinFunc => "LinearFunctionalConstraint",
			QuadFunc => "QuadraticFunctionalConstraint",
			Abs => "AbsConstraint",
			Min => "MinConstraint",
			Max => "MaxConstraint",
			And => "AndConstraint",
			Or => "OrConstraint",
			Not => "NotConstraint",
			Div => "DivConstraint",
			IfThen => "IfThenConstraint",
			CondLinLe => "CondLinConLE",
			CondLinLt => "CondLinConLT",
			CondLinEq => "CondLinConEQ",
			CondLinGe => "CondLinConGE",
			CondLinGt => "CondLinConGT",
			CondQuadLe => "CondQuadConLE",
			CondQuadLt => "CondQuadConLT",
			CondQuadEq => "CondQuadConEQ",
			CondQuadGe => "CondQuadConGE",
			CondQuadGt => "CondQuadConGT",
			Count => "CountConstraint",
			NumberofConst => "NumberofConstConstraint",
			NumberofVar => "NumberofVarConstraint",
			AllDiff => "AllDiffConstraint",
			Exp => "ExpConstraint",
			ExpA => "ExpAConstraint",
			Log => "LogConstraint",
			LogA => "LogAConstraint",
			Pow => "PowConstraint",
			Sin => "SinConstraint",
			Cos => "CosConstraint",
			Tan => "TanConstraint",
			IndLinLe => "IndicatorConstraintLinLE",
			IndLinEq => "IndicatorConstraintLinEQ",
			IndLinGe => "IndicatorConstraintLinGE",
			IndQuadLe => "IndicatorConstraintQuadLE",
			IndQuadEq => "IndicatorConstraintQuadEQ",
			IndQuadGe => "IndicatorConstraintQuadGE",
			Pl => "PLConstraint",
			Sos1 => "SOS1Constraint",
			Sos2 => "SOS2Constraint",
			ComplLin => "ComplementarityLinear",
			ComplQuad => "ComplementarityQuadratic",
		}
	}

	/// Option tag of the kind, as used in `acc:<tag>`.
	pub fn tag(self) -> &'static str {
		use ConKind::*;
		match self {
			LinLe => "linle",
			LinEq => "lineq",
			LinGe => "linge",
			LinRange => "linrange",
			QuadLe => "quadle",
			QuadEq => "quadeq",
			QuadGe => "quadge",
			QuadRange => "quadrange",
			LinFunc => "linfunccon",
			QuadFunc => "quadfunccon",
			Abs => "abs",
			Min => "min",
			Max => "max",
			And => "and",
			Or => "or",
			Not => "not",
			Div => "div",
			IfThen => "ifthen",
			CondLinLe => "condlinle",
			CondLinLt => "condlinlt",
			CondLinEq => "condlineq",
			CondLinGe => "condlinge",
			CondLinGt => "condlingt",
			CondQuadLe => "condquadle",
			CondQuadLt => "condquadlt",
			CondQuadEq => "condquadeq",
			CondQuadGe => "condquadge",
			CondQuadGt => "condquadgt",
			Count => "count",
			NumberofConst => "numberofconst",
			NumberofVar => "numberofvar",
			AllDiff => "alldiff",
			Exp => "exp",
			ExpA => "expa",
			Log => "log",
			LogA => "loga",
			Pow => "pow",
			Sin => "sin",
			Cos => "cos",
			Tan => "tan",
			IndLinLe => "indle",
			IndLinEq => "indeq",
			IndLinGe => "indge",
			IndQuadLe => "indquadle",
			IndQuadEq => "indquadeq",
			IndQuadGe => "indquadge",
			Pl => "pl",
			Sos1 => "sos1",
			Sos2 => "sos2",
			ComplLin => "compllin",
			ComplQuad => "complquad",
		}
	}

	/// All kinds, in a fixed order.
	pub fn all() -> &'static [ConKind] {
		use ConKind::*;
		&[
			LinLe, LinEq, LinGe, LinRange, QuadLe, QuadEq, QuadGe, QuadRange, LinFunc, QuadFunc,
			Abs, Min, Max, And, Or, Not, Div, IfThen, CondLinLe, CondLinLt, CondLinEq, CondLinGe,
			CondLinGt, CondQuadLe, CondQuadLt, CondQuadEq, CondQuadGe, CondQuadGt, Count,
			NumberofConst, NumberofVar, AllDiff, Exp, ExpA, Log, LogA, Pow, Sin, Cos, Tan,
			IndLinLe, IndLinEq, IndLinGe, IndQuadLe, IndQuadEq, IndQuadGe, Pl, Sos1, Sos2,
			ComplLin, ComplQuad,
		]
	}
}

impl fmt::Display for ConKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.name())
	}
}

#[cfg(test)]
mod tests {
	use crate::acceptance::{Acceptance, ConKind};

	#[test]
	fn test_tags_are_unique() {
		let all = ConKind::all();
		for (i, a) in all.iter().enumerate() {
			for b in &all[i + 1..] {
				assert_ne!(a.tag(), b.tag(), "{a} and {b} share a tag");
			}
		}
	}

	#[test]
	fn test_tag_round_trip() {
		for &k in ConKind::all() {
			assert_eq!(ConKind::from_tag(k.tag()), Some(k));
		}
		assert_eq!(ConKind::from_tag("nosuch"), None);
	}

	#[test]
	fn test_acceptance_order() {
		assert!(Acceptance::NotAccepted < Acceptance::AcceptedButNotRecommended);
		assert!(Acceptance::AcceptedButNotRecommended < Acceptance::Recommended);
	}
}
