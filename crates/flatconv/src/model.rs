//! The working flat model: variables, objectives, and one constraint pool
//! per constraint type.

use std::{collections::HashMap, fmt};

use index_vec::{define_index_type, IndexVec};

use crate::{
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
		ConClass,
	},
	error::FlatError,
	expr::{AffineExpr, LinTerms, QuadExpr, QuadTerms},
	helpers::{is_integral, mul_bounds, scale_bounds},
	keeper::Keeper,
	value_graph::{NodeId, ValueGraph},
};

define_index_type! {
	/// Reference type for decision variables in a [`FlatModel`].
	pub struct VarId = u32;
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Location of the functional constraint that defines a variable's value.
pub struct ConRef {
	/// The constraint pool holding the constraint.
	pub class: ConClass,
	/// Index within the pool.
	pub index: usize,
}

#[derive(Clone, Debug)]
/// A complete flat model, ready for conversion.
///
/// Variable and constraint identities are plain indices; there is no
/// object-level ownership between them.
pub struct FlatModel {
	/// Cache of literal constants already materialized as fixed variables,
	/// keyed by bit pattern.
	fixed_vars: HashMap<u64, VarId>,
	/// The defining constraint of each variable, when there is one.
	init_exprs: IndexVec<VarId, Option<ConRef>>,
	/// Value node carrying per-objective solution values.
	pub(crate) obj_node: NodeId,
	/// The objectives, in declaration order.
	objectives: Vec<Objective>,
	/// Value node carrying per-variable solution values.
	pub(crate) var_node: NodeId,
	/// The decision variables.
	vars: IndexVec<VarId, Var>,

	/// Pool of absolute-value constraints.
	pub(crate) abses: Keeper<AbsCon>,
	/// Pool of all-different constraints.
	pub(crate) all_diffs: Keeper<AllDiffCon>,
	/// Pool of conjunction constraints.
	pub(crate) ands: Keeper<AndCon>,
	/// Pool of linear complementarity constraints.
	pub(crate) compl_lins: Keeper<ComplLin>,
	/// Pool of quadratic complementarity constraints.
	pub(crate) compl_quads: Keeper<ComplQuad>,
	/// Pool of reified linear comparisons.
	pub(crate) cond_lins: Keeper<CondLinCon>,
	/// Pool of reified quadratic comparisons.
	pub(crate) cond_quads: Keeper<CondQuadCon>,
	/// Pool of counting constraints.
	pub(crate) counts: Keeper<CountCon>,
	/// Pool of division constraints.
	pub(crate) divs: Keeper<DivCon>,
	/// Pool of elementary nonlinear function constraints.
	pub(crate) elem_funcs: Keeper<ElemFuncCon>,
	/// Pool of if-then-else constraints.
	pub(crate) if_thens: Keeper<IfThenCon>,
	/// Pool of indicators over linear rows.
	pub(crate) ind_lins: Keeper<IndicatorLin>,
	/// Pool of indicators over quadratic rows.
	pub(crate) ind_quads: Keeper<IndicatorQuad>,
	/// Pool of one-sided linear constraints.
	pub(crate) lin_cons: Keeper<LinCon>,
	/// Pool of affine functional constraints.
	pub(crate) lin_funcs: Keeper<LinFuncCon>,
	/// Pool of two-sided linear constraints.
	pub(crate) lin_ranges: Keeper<LinConRange>,
	/// Pool of maximum constraints.
	pub(crate) maxes: Keeper<MaxCon>,
	/// Pool of minimum constraints.
	pub(crate) mins: Keeper<MinCon>,
	/// Pool of negation constraints.
	pub(crate) nots: Keeper<NotCon>,
	/// Pool of count-equal-to-constant constraints.
	pub(crate) numberof_consts: Keeper<NumberofConstCon>,
	/// Pool of count-equal-to-variable constraints.
	pub(crate) numberof_vars: Keeper<NumberofVarCon>,
	/// Pool of disjunction constraints.
	pub(crate) ors: Keeper<OrCon>,
	/// Pool of piecewise-linear constraints.
	pub(crate) pls: Keeper<PlCon>,
	/// Pool of one-sided quadratic constraints.
	pub(crate) quad_cons: Keeper<QuadCon>,
	/// Pool of quadratic functional constraints.
	pub(crate) quad_funcs: Keeper<QuadFuncCon>,
	/// Pool of two-sided quadratic constraints.
	pub(crate) quad_ranges: Keeper<QuadConRange>,
	/// Pool of SOS1 constraints.
	pub(crate) sos1s: Keeper<Sos1Con>,
	/// Pool of SOS2 constraints.
	pub(crate) sos2s: Keeper<Sos2Con>,
}

#[derive(Clone, Debug, PartialEq)]
/// An objective of the model.
pub struct Objective {
	/// The optimization direction.
	pub sense: ObjSense,
	/// The objective expression; its quadratic part is empty for linear
	/// objectives.
	pub expr: QuadExpr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Direction of an objective.
pub enum ObjSense {
	/// Smaller is better.
	Minimize,
	/// Larger is better.
	Maximize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// A decision variable: interval bounds and a type.
pub struct Var {
	/// Lower bound, possibly `-inf`.
	pub lb: f64,
	/// Upper bound, possibly `+inf`.
	pub ub: f64,
	/// Continuous or integer.
	pub ty: VarType,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
/// Type of a decision variable.
pub enum VarType {
	#[default]
	/// A real-valued variable.
	Continuous,
	/// An integer-valued variable.
	Integer,
}

/// Add lower bounds, saturating at `-inf`.
fn add_lb(a: f64, b: f64) -> f64 {
	if a == f64::NEG_INFINITY || b == f64::NEG_INFINITY {
		f64::NEG_INFINITY
	} else {
		a + b
	}
}

/// Add upper bounds, saturating at `+inf`.
fn add_ub(a: f64, b: f64) -> f64 {
	if a == f64::INFINITY || b == f64::INFINITY {
		f64::INFINITY
	} else {
		a + b
	}
}

impl FlatModel {
	/// Add a new variable with the given bounds and type.
	///
	/// Integer bounds are rounded inwards; an empty domain is an
	/// infeasibility of the model.
	pub fn add_var(&mut self, lb: f64, ub: f64, ty: VarType) -> Result<VarId, FlatError> {
		let (lb, ub) = match ty {
			VarType::Continuous => (lb, ub),
			VarType::Integer => (lb.ceil(), ub.floor()),
		};
		if lb > ub {
			return Err(FlatError::InfeasibleDomain {
				var: self.vars.len(),
				lb,
				ub,
			});
		}
		let v = self.vars.push(Var { lb, ub, ty });
		let _ = self.init_exprs.push(None);
		Ok(v)
	}

	/// Add an objective.
	pub fn add_objective(&mut self, obj: Objective) {
		self.objectives.push(obj);
	}

	/// Bounds of an affine expression under the current variable bounds.
	pub fn affine_bounds(&self, expr: &AffineExpr) -> (f64, f64) {
		let (lb, ub) = self.terms_bounds(&expr.terms);
		(add_lb(lb, expr.constant), add_ub(ub, expr.constant))
	}

	/// Whether an affine expression only takes integral values.
	pub fn affine_integral(&self, expr: &AffineExpr) -> bool {
		self.terms_integral(&expr.terms) && is_integral(expr.constant)
	}

	/// Remember the canonical fixed variable for a constant.
	pub(crate) fn cache_fixed(&mut self, value: f64, var: VarId) {
		let _ = self.fixed_vars.insert(value.to_bits(), var);
	}

	/// Look up the canonical fixed variable for a constant.
	pub(crate) fn find_fixed(&self, value: f64) -> Option<VarId> {
		self.fixed_vars.get(&value.to_bits()).copied()
	}

	/// Value of a fixed variable.
	pub fn fixed_value(&self, v: VarId) -> f64 {
		debug_assert!(self.is_fixed(v));
		self.vars[v].lb
	}

	/// The defining constraint of a variable, if any.
	pub fn init_expr(&self, v: VarId) -> Option<ConRef> {
		self.init_exprs[v]
	}

	/// Whether a variable is binary.
	pub fn is_binary(&self, v: VarId) -> bool {
		let var = &self.vars[v];
		var.ty == VarType::Integer && var.lb >= 0.0 && var.ub <= 1.0
	}

	/// Whether a variable's bounds coincide.
	pub fn is_fixed(&self, v: VarId) -> bool {
		self.vars[v].lb == self.vars[v].ub
	}

	/// Lower bound of a variable.
	pub fn lb(&self, v: VarId) -> f64 {
		self.vars[v].lb
	}

	/// Narrow a variable's bounds. Bounds only ever shrink; emptying the
	/// domain is an infeasibility of the model.
	pub fn narrow_var_bounds(&mut self, v: VarId, lb: f64, ub: f64) -> Result<(), FlatError> {
		let (mut lb, mut ub) = (lb, ub);
		if self.vars[v].ty == VarType::Integer {
			lb = lb.ceil();
			ub = ub.floor();
		}
		let var = &mut self.vars[v];
		var.lb = var.lb.max(lb);
		var.ub = var.ub.min(ub);
		if var.lb > var.ub {
			return Err(FlatError::InfeasibleDomain {
				var: v.index(),
				lb: var.lb,
				ub: var.ub,
			});
		}
		Ok(())
	}

	/// Create an empty model, registering its value nodes in the graph.
	pub fn new(graph: &mut ValueGraph) -> FlatModel {
		/// A pool with a fresh value node named after its class.
		fn keeper_in<C: Clone + Eq + std::hash::Hash>(
			graph: &mut ValueGraph,
			class: ConClass,
			mapped: bool,
		) -> Keeper<C> {
			Keeper::new(class.name(), mapped, graph.add_node(class.name()))
		}

		let var_node = graph.add_node("vars");
		let obj_node = graph.add_node("objs");
		FlatModel {
			fixed_vars: HashMap::new(),
			init_exprs: IndexVec::new(),
			obj_node,
			objectives: Vec::new(),
			var_node,
			vars: IndexVec::new(),
			abses: keeper_in(graph, ConClass::Abs, true),
			all_diffs: keeper_in(graph, ConClass::AllDiff, true),
			ands: keeper_in(graph, ConClass::And, true),
			compl_lins: keeper_in(graph, ConClass::ComplLin, false),
			compl_quads: keeper_in(graph, ConClass::ComplQuad, false),
			cond_lins: keeper_in(graph, ConClass::CondLin, true),
			cond_quads: keeper_in(graph, ConClass::CondQuad, true),
			counts: keeper_in(graph, ConClass::Count, true),
			divs: keeper_in(graph, ConClass::Div, true),
			elem_funcs: keeper_in(graph, ConClass::ElemFunc, true),
			if_thens: keeper_in(graph, ConClass::IfThen, true),
			ind_lins: keeper_in(graph, ConClass::IndicatorLin, false),
			ind_quads: keeper_in(graph, ConClass::IndicatorQuad, false),
			lin_cons: keeper_in(graph, ConClass::LinCon, false),
			lin_funcs: keeper_in(graph, ConClass::LinFunc, true),
			lin_ranges: keeper_in(graph, ConClass::LinConRange, false),
			maxes: keeper_in(graph, ConClass::Max, true),
			mins: keeper_in(graph, ConClass::Min, true),
			nots: keeper_in(graph, ConClass::Not, true),
			numberof_consts: keeper_in(graph, ConClass::NumberofConst, true),
			numberof_vars: keeper_in(graph, ConClass::NumberofVar, true),
			ors: keeper_in(graph, ConClass::Or, true),
			pls: keeper_in(graph, ConClass::Pl, false),
			quad_cons: keeper_in(graph, ConClass::QuadCon, false),
			quad_funcs: keeper_in(graph, ConClass::QuadFunc, true),
			quad_ranges: keeper_in(graph, ConClass::QuadConRange, false),
			sos1s: keeper_in(graph, ConClass::Sos1, false),
			sos2s: keeper_in(graph, ConClass::Sos2, false),
		}
	}

	/// Number of variables.
	pub fn num_vars(&self) -> usize {
		self.vars.len()
	}

	/// The objectives.
	pub fn objectives(&self) -> &[Objective] {
		&self.objectives
	}

	/// Bounds of a quadratic expression under the current variable bounds.
	pub fn quad_expr_bounds(&self, expr: &QuadExpr) -> (f64, f64) {
		let (mut lb, mut ub) = self.affine_bounds(&expr.affine);
		for (c, v1, v2) in expr.quad.iter() {
			let term = scale_bounds(c, mul_bounds(self.var_bounds(v1), self.var_bounds(v2)));
			lb = add_lb(lb, term.0);
			ub = add_ub(ub, term.1);
		}
		(lb, ub)
	}

	/// Drop integrality from every variable.
	pub fn relax_integrality(&mut self) {
		for var in &mut self.vars {
			var.ty = VarType::Continuous;
		}
	}

	/// Record the defining constraint of a variable, replacing any previous
	/// one.
	pub(crate) fn set_init_expr(&mut self, v: VarId, r: ConRef) {
		self.init_exprs[v] = Some(r);
	}

	/// Bounds of a linear body under the current variable bounds.
	pub fn terms_bounds(&self, terms: &LinTerms) -> (f64, f64) {
		let mut lb = 0.0;
		let mut ub = 0.0;
		for (c, v) in terms.iter() {
			let term = scale_bounds(c, self.var_bounds(v));
			lb = add_lb(lb, term.0);
			ub = add_ub(ub, term.1);
		}
		(lb, ub)
	}

	/// Whether a linear body only takes integral values.
	pub fn terms_integral(&self, terms: &LinTerms) -> bool {
		terms
			.iter()
			.all(|(c, v)| is_integral(c) && self.var_type(v) == VarType::Integer)
	}

	/// Bounds of a variable.
	pub fn var_bounds(&self, v: VarId) -> (f64, f64) {
		(self.vars[v].lb, self.vars[v].ub)
	}

	/// All variable attributes as the parallel arrays a solver API takes.
	pub fn var_arrays(&self) -> (Vec<f64>, Vec<f64>, Vec<VarType>) {
		let lbs = self.vars.iter().map(|v| v.lb).collect();
		let ubs = self.vars.iter().map(|v| v.ub).collect();
		let types = self.vars.iter().map(|v| v.ty).collect();
		(lbs, ubs, types)
	}

	/// Type of a variable.
	pub fn var_type(&self, v: VarId) -> VarType {
		self.vars[v].ty
	}

	/// Upper bound of a variable.
	pub fn ub(&self, v: VarId) -> f64 {
		self.vars[v].ub
	}

	/// Bounds of the quadratic-terms part only.
	pub fn quad_terms_bounds(&self, quad: &QuadTerms) -> (f64, f64) {
		let mut lb = 0.0;
		let mut ub = 0.0;
		for (c, v1, v2) in quad.iter() {
			let term = scale_bounds(c, mul_bounds(self.var_bounds(v1), self.var_bounds(v2)));
			lb = add_lb(lb, term.0);
			ub = add_ub(ub, term.1);
		}
		(lb, ub)
	}
}

impl Objective {
	/// A maximization objective over an affine expression.
	pub fn maximize(expr: AffineExpr) -> Objective {
		Objective {
			sense: ObjSense::Maximize,
			expr: QuadExpr::new(expr, Default::default()),
		}
	}

	/// A minimization objective over an affine expression.
	pub fn minimize(expr: AffineExpr) -> Objective {
		Objective {
			sense: ObjSense::Minimize,
			expr: QuadExpr::new(expr, Default::default()),
		}
	}

	/// A minimization objective over a quadratic expression.
	pub fn minimize_quad(expr: QuadExpr) -> Objective {
		Objective {
			sense: ObjSense::Minimize,
			expr,
		}
	}
}

impl fmt::Display for ObjSense {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ObjSense::Minimize => write!(f, "min"),
			ObjSense::Maximize => write!(f, "max"),
		}
	}
}

impl fmt::Display for VarType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			VarType::Continuous => write!(f, "cont"),
			VarType::Integer => write!(f, "int"),
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		error::FlatError,
		expr::{AffineExpr, LinTerms},
		model::{FlatModel, VarType},
		value_graph::ValueGraph,
	};

	#[test]
	fn test_infeasible_domain() {
		let mut graph = ValueGraph::default();
		let mut model = FlatModel::new(&mut graph);
		let err = model.add_var(5.0, 3.0, VarType::Continuous).unwrap_err();
		assert!(matches!(err, FlatError::InfeasibleDomain { var: 0, .. }));
	}

	#[test]
	fn test_integer_bounds_round_inwards() {
		let mut graph = ValueGraph::default();
		let mut model = FlatModel::new(&mut graph);
		let v = model.add_var(0.5, 2.5, VarType::Integer).unwrap();
		assert_eq!(model.var_bounds(v), (1.0, 2.0));
	}

	#[test]
	fn test_narrowing_is_monotone() {
		let mut graph = ValueGraph::default();
		let mut model = FlatModel::new(&mut graph);
		let v = model.add_var(0.0, 10.0, VarType::Continuous).unwrap();
		model.narrow_var_bounds(v, 2.0, 8.0).unwrap();
		// Wider bounds must not widen the domain again.
		model.narrow_var_bounds(v, -5.0, 20.0).unwrap();
		assert_eq!(model.var_bounds(v), (2.0, 8.0));
		assert!(model.narrow_var_bounds(v, 9.0, 20.0).is_err());
	}

	#[test]
	fn test_affine_bounds() {
		let mut graph = ValueGraph::default();
		let mut model = FlatModel::new(&mut graph);
		let x = model.add_var(0.0, 5.0, VarType::Continuous).unwrap();
		let y = model.add_var(-2.0, f64::INFINITY, VarType::Continuous).unwrap();
		let mut terms = LinTerms::new();
		terms.push(2.0, x);
		terms.push(-1.0, y);
		let expr = AffineExpr::new(terms, 1.0);
		let (lb, ub) = model.affine_bounds(&expr);
		assert_eq!(lb, f64::NEG_INFINITY);
		assert_eq!(ub, 2.0 * 5.0 + 2.0 + 1.0);
	}

	#[test]
	fn test_relax_integrality() {
		let mut graph = ValueGraph::default();
		let mut model = FlatModel::new(&mut graph);
		let v = model.add_var(0.0, 1.0, VarType::Integer).unwrap();
		model.relax_integrality();
		assert_eq!(model.var_type(v), VarType::Continuous);
	}
}
