//! Shared test fixtures and end-to-end conversion tests.
//!
//! [`CaptureApi`] is a solver API that accepts a configurable set of
//! constraint kinds and records everything pushed to it as display text,
//! which the tests snapshot.

use std::collections::{HashMap, HashSet};

use expect_test::expect;
use itertools::Itertools;
use tracing_test::traced_test;

use crate::{
	abs_of, all_different, and_of,
	acceptance::{Acceptance, ConKind},
	api::{ModelApi, ProblemInfo},
	backend::{Solution, SolveStatus},
	constraints::{
		algebraic::{LinCon, LinConRange},
		complementarity::ComplLin,
		cond_cmp::{CmpOp, CondLinCon},
		elementary::{ElemFunc, ElemFuncCon},
		indicator::IndicatorLin,
		piecewise::{PlCon, PlPoints},
		sos::Sos1Con,
		ConClass, ConItem,
	},
	count_of, div_of,
	error::FlatError,
	expr::{AffineExpr, LinTerms, QuadExpr},
	if_then_else, max_of,
	model::{ObjSense, Objective, VarType},
	numberof_const,
	options::ConvertOptions,
	or_of,
	converter::FlatConverter,
	value_graph::Link,
};

/// A recording solver API with a configurable acceptance table.
pub(crate) struct CaptureApi {
	/// Kinds taken at level Recommended.
	accepted: HashSet<ConKind>,
	/// Kinds taken at level AcceptedButNotRecommended.
	not_recommended: HashSet<ConKind>,
	/// Per-item conversion predicate.
	needs: Option<fn(&ConItem) -> bool>,
	/// Recorded objectives, as display text.
	pub objectives: Vec<String>,
	/// Recorded constraint rows, in push order, as display text.
	pub rows: Vec<String>,
	/// Recorded variables.
	pub vars: Vec<(f64, f64, VarType)>,
	/// Whether the modification phase was closed.
	pub finished: bool,
}

impl CaptureApi {
	/// An API accepting exactly the given kinds (at level Recommended).
	pub fn new(accepted: impl IntoIterator<Item = ConKind>) -> CaptureApi {
		CaptureApi {
			accepted: accepted.into_iter().collect(),
			not_recommended: HashSet::new(),
			needs: None,
			objectives: Vec::new(),
			rows: Vec::new(),
			vars: Vec::new(),
			finished: false,
		}
	}

	/// The three one-sided linear row kinds every MIP solver takes.
	pub fn linear_kinds() -> [ConKind; 3] {
		[ConKind::LinLe, ConKind::LinEq, ConKind::LinGe]
	}

	/// Recorded rows as one line each.
	pub fn rows_text(&self) -> String {
		self.rows.iter().join("\n")
	}

	/// Recorded variables as one line each.
	pub fn vars_text(&self) -> String {
		self.vars
			.iter()
			.enumerate()
			.map(|(i, (lb, ub, ty))| format!("x{i}: [{lb}, {ub}] {ty}"))
			.join("\n")
	}

	/// Demote the given kinds to AcceptedButNotRecommended.
	pub fn with_not_recommended(mut self, kinds: impl IntoIterator<Item = ConKind>) -> CaptureApi {
		self.not_recommended = kinds.into_iter().collect();
		self
	}

	/// Install a per-item conversion predicate.
	pub fn with_needs(mut self, needs: fn(&ConItem) -> bool) -> CaptureApi {
		self.needs = Some(needs);
		self
	}
}

impl ModelApi for CaptureApi {
	fn acceptance(&self, kind: ConKind) -> Acceptance {
		if self.accepted.contains(&kind) {
			Acceptance::Recommended
		} else if self.not_recommended.contains(&kind) {
			Acceptance::AcceptedButNotRecommended
		} else {
			Acceptance::NotAccepted
		}
	}

	fn add_constraint(&mut self, item: &ConItem) -> Result<(), FlatError> {
		assert_ne!(
			self.acceptance(item.kind()),
			Acceptance::NotAccepted,
			"the converter pushed a rejected constraint: {item}"
		);
		self.rows.push(item.to_string());
		Ok(())
	}

	fn add_variables(
		&mut self,
		lbs: &[f64],
		ubs: &[f64],
		types: &[VarType],
	) -> Result<(), FlatError> {
		self.vars = lbs
			.iter()
			.zip(ubs)
			.zip(types)
			.map(|((&lb, &ub), &ty)| (lb, ub, ty))
			.collect();
		Ok(())
	}

	fn finish_problem(&mut self) -> Result<(), FlatError> {
		self.finished = true;
		Ok(())
	}

	fn init_problem(&mut self, _info: &ProblemInfo) -> Result<(), FlatError> {
		Ok(())
	}

	fn needs_item_conversion(&self, item: &ConItem) -> bool {
		self.needs.map_or(false, |f| f(item))
	}

	fn set_linear_objective(
		&mut self,
		_iobj: usize,
		sense: ObjSense,
		expr: &AffineExpr,
	) -> Result<(), FlatError> {
		self.objectives.push(format!("{sense} {expr}"));
		Ok(())
	}

	fn set_quadratic_objective(
		&mut self,
		_iobj: usize,
		sense: ObjSense,
		expr: &QuadExpr,
	) -> Result<(), FlatError> {
		self.objectives.push(format!("{sense} {expr}"));
		Ok(())
	}

	fn solver_name(&self) -> &str {
		"capture"
	}
}

/// Converter over a plain-linear capture API.
fn linear_converter() -> FlatConverter<CaptureApi> {
	FlatConverter::new(CaptureApi::new(CaptureApi::linear_kinds()))
}

/// Converter accepting linear rows plus the given extra kinds.
fn converter_with(extra: impl IntoIterator<Item = ConKind>) -> FlatConverter<CaptureApi> {
	let kinds = CaptureApi::linear_kinds().into_iter().chain(extra);
	FlatConverter::new(CaptureApi::new(kinds))
}

#[test]
fn test_max_under_upper_bound_degenerates_to_rows() {
	// min x + y  s.t.  max(x, y) <= 3, x, y in [0, 5], Max not accepted.
	let mut cvt = linear_converter();
	let xs = cvt
		.add_vars(
			&[0.0, 0.0],
			&[5.0, 5.0],
			&[VarType::Continuous, VarType::Continuous],
		)
		.unwrap();
	let r = cvt.assign_result_var(max_of(xs.clone())).unwrap();
	cvt.add_root_constraint(LinCon::le(LinTerms::single(1.0, r), 3.0))
		.unwrap();
	let mut obj = LinTerms::new();
	obj.push(1.0, xs[0]);
	obj.push(1.0, xs[1]);
	let _ = cvt.add_objective(Objective::minimize(AffineExpr::new(obj, 0.0)));
	cvt.finish_model_input().unwrap();

	// The single-variable root row became a bound on the result variable,
	// which propagated onto the arguments; the positive context keeps only
	// the one-sided rows.
	expect![[r#"
    x0: [0, 3] cont
    x1: [0, 3] cont
    x2: [0, 3] cont"#]]
	.assert_eq(&cvt.api().vars_text());
	expect![[r#"
    x2 - x0 >= 0
    x2 - x1 >= 0"#]]
	.assert_eq(&cvt.api().rows_text());
	assert_eq!(cvt.api().objectives, vec!["min x0 + x1"]);
	assert_eq!(cvt.model().maxes.num_live(), 0);
	assert!(cvt.api().finished);
}

#[test]
fn test_indicator_to_big_m() {
	// b=1 => x <= 5 with x in [0, 10]: the big-M is 10 - 5 = 5.
	let mut cvt = linear_converter();
	let x = cvt.add_var(0.0, 10.0, VarType::Continuous).unwrap();
	let b = cvt.add_var(0.0, 1.0, VarType::Integer).unwrap();
	cvt.add_root_constraint(IndicatorLin::new(b, true, LinCon::le(LinTerms::single(1.0, x), 5.0)))
		.unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x0 + 5 x1 <= 10"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_indicator_without_bounds_needs_big_m() {
	let mut cvt = linear_converter();
	let x = cvt.add_var(0.0, f64::INFINITY, VarType::Continuous).unwrap();
	let b = cvt.add_var(0.0, 1.0, VarType::Integer).unwrap();
	cvt.add_root_constraint(IndicatorLin::new(b, true, LinCon::le(LinTerms::single(1.0, x), 5.0)))
		.unwrap();
	let err = cvt.finish_model_input().unwrap_err();
	assert!(matches!(err, FlatError::UnboundedBigM { .. }));
}

#[test]
fn test_pl_to_sos2_lambda_method() {
	// Breakpoints (0,0), (1,1), (2,0) with only SOS2 available beyond
	// linear rows: three multipliers, convexity, and weights 1..=3.
	let mut cvt = converter_with([ConKind::Sos2]);
	let x = cvt.add_var(0.0, 2.0, VarType::Continuous).unwrap();
	let r = cvt.add_var(0.0, 1.0, VarType::Continuous).unwrap();
	let points = PlPoints::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.0]);
	let _ = cvt.add_with_result(PlCon::new(points, x), r).unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x2 + x3 + x4 == 1
    x0 - x3 - 2 x4 == 0
    x1 - x3 == 0
    SOS2(x2:1, x3:2, x4:3)"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_alldiff_binarization() {
	// alldiff over three variables in {1, 2, 3}: an assignment matrix with
	// row sums one, value sums at most one, and channeling rows.
	let mut cvt = linear_converter();
	let xs = cvt
		.add_vars(&[1.0; 3], &[3.0; 3], &[VarType::Integer; 3])
		.unwrap();
	let r = cvt.assign_result_var(all_different(xs)).unwrap();
	cvt.fix_as_true(r).unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x4 + x5 + x6 == 1
    x0 - x4 - 2 x5 - 3 x6 == 0
    x7 + x8 + x9 == 1
    x1 - x7 - 2 x8 - 3 x9 == 0
    x10 + x11 + x12 == 1
    x2 - x10 - 2 x11 - 3 x12 == 0
    x4 + x7 + x10 <= 1
    x5 + x8 + x11 <= 1
    x6 + x9 + x12 <= 1"#]]
	.assert_eq(&cvt.api().rows_text());
	assert_eq!(cvt.model().all_diffs.num_live(), 0);
}

#[test]
fn test_exp_to_pl_approximation() {
	// y = exp(x) on [0, 1] with PL available: one PL constraint within the
	// configured relative tolerance.
	let mut cvt = converter_with([ConKind::Pl]);
	let x = cvt.add_var(0.0, 1.0, VarType::Continuous).unwrap();
	let r = cvt
		.assign_result_var(ElemFuncCon::new(ElemFunc::Exp, x))
		.unwrap();
	assert_eq!(cvt.lb(r), 1.0);
	assert!((cvt.ub(r) - std::f64::consts::E).abs() < 1e-12);
	cvt.finish_model_input().unwrap();

	assert_eq!(cvt.api().rows.len(), 1);
	assert!(cvt.api().rows[0].starts_with("x1 == pl(("));
	assert_eq!(cvt.model().elem_funcs.num_live(), 0);
	assert_eq!(cvt.model().pls.num_live(), 1);
}

#[test]
fn test_infeasible_domain_before_any_solver_call() {
	let mut cvt = linear_converter();
	let err = cvt.add_var(5.0, 3.0, VarType::Continuous).unwrap_err();
	assert!(matches!(err, FlatError::InfeasibleDomain { var: 0, .. }));
	assert!(cvt.api().vars.is_empty());
	assert!(!cvt.api().finished);
}

#[test]
fn test_range_split_and_dual_postsolve() {
	// lb <= body <= ub without a native range form splits into two rows;
	// the range's dual is the sum of the split rows' duals.
	let mut cvt = linear_converter();
	let xs = cvt
		.add_vars(
			&[0.0, 0.0],
			&[10.0, 10.0],
			&[VarType::Continuous, VarType::Continuous],
		)
		.unwrap();
	let mut body = LinTerms::new();
	body.push(1.0, xs[0]);
	body.push(1.0, xs[1]);
	cvt.add_root_constraint(LinConRange::new(body, 1.0, 5.0))
		.unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x0 + x1 <= 5
    x0 + x1 >= 1"#]]
	.assert_eq(&cvt.api().rows_text());

	let sol = Solution {
		duals: HashMap::from([(ConClass::LinCon, vec![0.3, 0.0])]),
		message: String::new(),
		objectives: vec![5.0],
		primal: vec![2.0, 3.0],
		status: SolveStatus::Solved,
	};
	let post = cvt.postsolve_solution(&sol);
	assert_eq!(post.status, SolveStatus::Solved);
	assert_eq!(post.objective, 5.0);
	assert_eq!(post.var_values, vec![2.0, 3.0]);
	assert_eq!(post.con_duals[&ConClass::LinConRange], vec![Some(0.3)]);
}

#[test]
fn test_range_split_links_cover_new_entries() {
	let mut cvt = linear_converter();
	let x = cvt.add_var(0.0, 10.0, VarType::Continuous).unwrap();
	let mut body = LinTerms::single(1.0, x);
	body.push(2.0, x);
	cvt.add_root_constraint(LinConRange::new(body, 1.0, 5.0))
		.unwrap();
	cvt.finish_model_input().unwrap();

	// Exactly one link, whose targets cover the two rows the split emitted.
	let links = cvt.graph().links();
	assert_eq!(links.len(), 1);
	match &links[0] {
		Link::One2Many { src, dst, .. } => {
			assert_eq!(src.len, 1);
			assert_eq!(dst.iter().map(|r| r.len).sum::<usize>(), 2);
		},
		other => panic!("expected a one-to-many link, got {other:?}"),
	}
}

#[test]
fn test_functional_dedup_reuses_result() {
	let mut cvt = linear_converter();
	let x = cvt.add_var(-5.0, 5.0, VarType::Continuous).unwrap();
	let r1 = cvt.assign_result_var(abs_of(x)).unwrap();
	let r2 = cvt.assign_result_var(abs_of(x)).unwrap();
	assert_eq!(r1, r2);
	assert_eq!(cvt.model().abses.len(), 1);
}

#[test]
fn test_duplicate_map_insert_is_internal_defect() {
	let mut cvt = linear_converter();
	let x = cvt.add_var(-5.0, 5.0, VarType::Continuous).unwrap();
	let _ = cvt.add_constraint(abs_of(x)).unwrap();
	let err = cvt.add_constraint(abs_of(x)).unwrap_err();
	assert!(matches!(err, FlatError::DuplicateMapInsert { keeper: "AbsCon" }));
}

#[test]
fn test_constant_folding_yields_canonical_fixed_var() {
	let mut cvt = linear_converter();
	let x = cvt.add_var(2.0, 2.0, VarType::Continuous).unwrap();
	let r = cvt.assign_result_var(abs_of(x)).unwrap();
	assert_eq!(r, x, "abs of the fixed 2.0 is the canonical variable for 2.0");
	assert!(cvt.model().abses.is_empty());
}

#[test]
fn test_fix_as_true_asserts_conjuncts() {
	let mut cvt = linear_converter();
	let bins = cvt
		.add_vars(&[0.0, 0.0], &[1.0, 1.0], &[VarType::Integer; 2])
		.unwrap();
	let r = cvt.assign_result_var(and_of(bins.clone())).unwrap();
	cvt.fix_as_true(r).unwrap();
	cvt.finish_model_input().unwrap();

	// No rows: the assertion became variable bounds.
	assert!(cvt.api().rows.is_empty());
	expect![[r#"
    x0: [1, 1] int
    x1: [1, 1] int
    x2: [1, 1] int"#]]
	.assert_eq(&cvt.api().vars_text());
}

#[test]
fn test_or_in_mixed_context_gets_both_sides() {
	let mut cvt = linear_converter();
	let bins = cvt
		.add_vars(&[0.0, 0.0], &[1.0, 1.0], &[VarType::Integer; 2])
		.unwrap();
	let r = cvt.assign_result_var(or_of(bins)).unwrap();
	cvt.add_root_constraint(LinCon::eq(LinTerms::single(1.0, r), 1.0))
		.unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x0 + x1 - x2 >= 0
    x0 - x2 <= 0
    x1 - x2 <= 0"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_reified_comparison_cascades_to_big_m() {
	// r <=> (x <= 3) with x integer in [0, 10] and only linear rows
	// available: indicators first, then big-M on both directions.
	let mut cvt = linear_converter();
	let x = cvt.add_var(0.0, 10.0, VarType::Integer).unwrap();
	let _ = cvt
		.assign_result_var(CondLinCon::new(LinTerms::single(1.0, x), CmpOp::Le, 3.0))
		.unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x0 + 7 x1 <= 10
    -x0 - 4 x1 <= -4"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_eq_binary_preprocessing_substitutes_the_variable() {
	let mut cvt = linear_converter();
	let b = cvt.add_var(0.0, 1.0, VarType::Integer).unwrap();
	let r = cvt
		.assign_result_var(CondLinCon::new(LinTerms::single(1.0, b), CmpOp::Eq, 1.0))
		.unwrap();
	assert_eq!(r, b);
	assert!(cvt.model().cond_lins.is_empty());
}

#[test]
fn test_preprocessing_can_be_disabled() {
	let api = CaptureApi::new(CaptureApi::linear_kinds().into_iter().chain([ConKind::CondLinEq]));
	let mut cvt = FlatConverter::with_options(api, ConvertOptions::default().with_preprocess(false));
	let b = cvt.add_var(0.0, 1.0, VarType::Integer).unwrap();
	let r = cvt
		.assign_result_var(CondLinCon::new(LinTerms::single(1.0, b), CmpOp::Eq, 1.0))
		.unwrap();
	assert_ne!(r, b, "with cvt:pre:all=0 the comparison is stored verbatim");
	assert_eq!(cvt.model().cond_lins.len(), 1);
}

#[test]
fn test_count_over_binaries_is_a_sum_row() {
	let mut cvt = linear_converter();
	let bins = cvt
		.add_vars(&[0.0, 0.0], &[1.0, 1.0], &[VarType::Integer; 2])
		.unwrap();
	let _ = cvt.assign_result_var(count_of(bins)).unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x0 + x1 - x2 == 0"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_numberof_const_reifies_per_element() {
	let mut cvt = converter_with([ConKind::CondLinEq]);
	let xs = cvt
		.add_vars(&[0.0, 0.0], &[3.0, 3.0], &[VarType::Integer; 2])
		.unwrap();
	let _ = cvt.assign_result_var(numberof_const(2.0, xs)).unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x3 + x4 - x2 == 0
    x3 == (x0 == 2)
    x4 == (x1 == 2)"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_div_becomes_quadratic_equality() {
	let mut cvt = converter_with([ConKind::QuadEq]);
	let n = cvt.add_var(0.0, 10.0, VarType::Continuous).unwrap();
	let d = cvt.add_var(1.0, 5.0, VarType::Continuous).unwrap();
	let r = cvt.assign_result_var(div_of(n, d)).unwrap();
	assert_eq!(cvt.var_bounds(r), (0.0, 10.0));
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x2*x1 - x0 == 0"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_if_then_else_emits_two_indicators() {
	let mut cvt = converter_with([ConKind::IndLinEq]);
	let c = cvt.add_var(0.0, 1.0, VarType::Integer).unwrap();
	let t = cvt.add_var(0.0, 5.0, VarType::Continuous).unwrap();
	let e = cvt.add_var(-5.0, 0.0, VarType::Continuous).unwrap();
	let r = cvt.assign_result_var(if_then_else(c, t, e)).unwrap();
	assert_eq!(cvt.var_bounds(r), (-5.0, 5.0));
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x0==1 ==> (x3 - x1 == 0)
    x0==0 ==> (x3 - x2 == 0)"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_sos1_to_mip() {
	let mut cvt = linear_converter();
	let xs = cvt
		.add_vars(
			&[0.0, 0.0],
			&[10.0, 10.0],
			&[VarType::Continuous, VarType::Continuous],
		)
		.unwrap();
	cvt.add_root_constraint(Sos1Con::new(xs, vec![1.0, 2.0]))
		.unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x0 - 10 x2 <= 0
    x1 - 10 x3 <= 0
    x2 + x3 <= 1"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_complementarity_disjunction() {
	// (x0 - 2) complements x1 with x1 >= 0: either x1 sits at its lower
	// bound with the expression nonnegative, or the expression vanishes.
	let mut cvt = converter_with([
		ConKind::IndLinLe,
		ConKind::IndLinEq,
		ConKind::IndLinGe,
	]);
	let x = cvt.add_var(0.0, 10.0, VarType::Continuous).unwrap();
	let v = cvt.add_var(0.0, f64::INFINITY, VarType::Continuous).unwrap();
	let expr = AffineExpr::new(LinTerms::single(1.0, x), -2.0);
	cvt.add_root_constraint(ComplLin::new(expr, v)).unwrap();
	cvt.finish_model_input().unwrap();

	expect![[r#"
    x2 + x3 == 1
    x2==1 ==> (x1 <= 0)
    x2==1 ==> (x0 >= 2)
    x3==1 ==> (x0 == 2)"#]]
	.assert_eq(&cvt.api().rows_text());
}

#[test]
fn test_acceptance_override_forces_conversion() {
	let mut cvt = converter_with([ConKind::Max]);
	cvt.set_option("acc:max", "0").unwrap();
	let xs = cvt
		.add_vars(
			&[0.0, 0.0],
			&[5.0, 5.0],
			&[VarType::Continuous, VarType::Continuous],
		)
		.unwrap();
	let r = cvt.assign_result_var(max_of(xs)).unwrap();
	cvt.add_root_constraint(LinCon::le(LinTerms::single(1.0, r), 3.0))
		.unwrap();
	cvt.finish_model_input().unwrap();

	assert_eq!(cvt.model().maxes.num_live(), 0);
	assert_eq!(cvt.api().rows.len(), 2);
}

#[test]
fn test_relax_drops_integrality() {
	let mut cvt = linear_converter();
	cvt.set_option("alg:relax", "1").unwrap();
	let _ = cvt.add_var(0.0, 3.0, VarType::Integer).unwrap();
	cvt.finish_model_input().unwrap();
	assert_eq!(cvt.api().vars, vec![(0.0, 3.0, VarType::Continuous)]);
}

#[test]
fn test_missing_rewrite_is_a_configuration_error() {
	let mut cvt = FlatConverter::new(CaptureApi::new([]));
	let xs = cvt
		.add_vars(
			&[0.0, 0.0],
			&[5.0, 5.0],
			&[VarType::Continuous, VarType::Continuous],
		)
		.unwrap();
	let mut body = LinTerms::new();
	body.push(1.0, xs[0]);
	body.push(1.0, xs[1]);
	cvt.add_root_constraint(LinCon::le(body, 5.0)).unwrap();
	let err = cvt.finish_model_input().unwrap_err();
	match err {
		FlatError::NoConversion { con, solver } => {
			assert_eq!(con, "LinConLE");
			assert_eq!(solver, "capture");
		},
		other => panic!("expected NoConversion, got {other}"),
	}
}

#[test]
#[traced_test]
fn test_not_recommended_keeps_item_on_conversion_failure() {
	// exp over an unbounded argument cannot be sampled; at level
	// AcceptedButNotRecommended the item is kept and a warning logged.
	let api = CaptureApi::new(CaptureApi::linear_kinds()).with_not_recommended([ConKind::Exp]);
	let mut cvt = FlatConverter::new(api);
	let x = cvt
		.add_var(f64::NEG_INFINITY, f64::INFINITY, VarType::Continuous)
		.unwrap();
	let _ = cvt
		.assign_result_var(ElemFuncCon::new(ElemFunc::Exp, x))
		.unwrap();
	cvt.finish_model_input().unwrap();

	assert_eq!(cvt.model().elem_funcs.num_live(), 1);
	assert_eq!(cvt.api().rows.len(), 1);
	assert!(cvt.api().rows[0].contains("exp(x0)"));
	assert!(logs_contain("conversion failed"));
}

#[test]
fn test_needs_item_conversion_overrides_acceptance() {
	// Pow is nominally accepted, but the per-item predicate rejects it, so
	// it is approximated anyway.
	fn reject_pow(item: &ConItem) -> bool {
		matches!(item, ConItem::ElemFunc(c, _) if matches!(c.func, ElemFunc::Pow(_)))
	}
	let kinds = CaptureApi::linear_kinds()
		.into_iter()
		.chain([ConKind::Pow, ConKind::Pl]);
	let api = CaptureApi::new(kinds).with_needs(reject_pow);
	let mut cvt = FlatConverter::new(api);
	let x = cvt.add_var(-2.0, 2.0, VarType::Continuous).unwrap();
	let _ = cvt
		.assign_result_var(ElemFuncCon::new(ElemFunc::Pow(3.0), x))
		.unwrap();
	cvt.finish_model_input().unwrap();

	assert_eq!(cvt.model().elem_funcs.num_live(), 0);
	assert_eq!(cvt.model().pls.num_live(), 1);
}

#[test]
fn test_graph_export_shape() {
	let mut cvt = linear_converter();
	let x = cvt.add_var(0.0, 10.0, VarType::Continuous).unwrap();
	let mut body = LinTerms::single(1.0, x);
	body.push(2.0, x);
	cvt.add_root_constraint(LinConRange::new(body, 1.0, 5.0))
		.unwrap();
	cvt.finish_model_input().unwrap();

	let mut out = Vec::new();
	cvt.write_graph(&mut out).unwrap();
	let text = String::from_utf8(out).unwrap();
	let mut nodes = 0;
	let mut links = 0;
	for line in text.lines() {
		let value: serde_json::Value = serde_json::from_str(line).unwrap();
		if value.get("node").is_some() {
			nodes += 1;
		} else {
			assert_eq!(value["link"], "one2many");
			links += 1;
		}
	}
	assert_eq!(nodes, 30, "one node per family: vars, objs, and 28 pools");
	assert_eq!(links, 1);
}

#[test]
fn test_conversion_keeps_rejected_pools_empty() {
	// Invariant: once conversion is done, every pool of a rejected kind
	// holds no live items.
	let mut cvt = converter_with([ConKind::Sos2]);
	let x = cvt.add_var(0.0, 2.0, VarType::Continuous).unwrap();
	let r = cvt
		.assign_result_var(ElemFuncCon::new(ElemFunc::Exp, x))
		.unwrap();
	cvt.add_root_constraint(LinCon::le(LinTerms::single(1.0, r), 10.0))
		.unwrap();
	cvt.finish_model_input().unwrap();

	assert_eq!(cvt.model().elem_funcs.num_live(), 0);
	assert_eq!(cvt.model().pls.num_live(), 0);
	for row in &cvt.api().rows {
		assert!(!row.contains("pl("), "PL constraints must have been rewritten: {row}");
	}
}
