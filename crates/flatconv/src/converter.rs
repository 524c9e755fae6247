//! The central conversion driver.
//!
//! The converter accepts a flat model from the flattener, rewrites every
//! constraint the target solver does not take into accepted forms, pushes
//! the final model through the solver's [`ModelApi`], and maps solution
//! values back onto the input model through the value graph.
//!
//! A converter is single-threaded and non-reentrant; within one pool,
//! insertion order is the only iteration order, and pools are visited in a
//! fixed registration order, which keeps the indices of generated auxiliary
//! variables reproducible.

use std::{collections::HashMap, fs::File, io::BufWriter, mem::take};

use delegate::delegate;
use tracing::{debug, warn};

use crate::{
	acceptance::{Acceptance, ConKind},
	api::{ModelApi, ProblemInfo},
	backend::{Solution, SolveStatus},
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
		ConClass, ConSpec, Convert, Functional,
	},
	context::Context,
	error::FlatError,
	expr::{AffineExpr, QuadExpr},
	model::{ConRef, FlatModel, Objective, VarId, VarType},
	options::ConvertOptions,
	value_graph::{Aggregation, NodeId, NodeRange, NodeValues, ValueGraph},
};

/// Pass budget of the conversion loop. Rewrites strictly descend the
/// acceptance order, so hitting the budget means a defective rule set.
const MAX_CONVERSION_PASSES: usize = 64;

#[derive(Clone, Debug)]
/// The conversion driver for one solver, holding the working model, the
/// value graph, and the solver's model-building API.
pub struct FlatConverter<A: ModelApi> {
	/// The solver's model-building API.
	api: A,
	/// Source range of the active autolink scope, if any.
	autolink_src: Option<NodeRange>,
	/// Target ranges collected by the active autolink scope.
	autolink_targets: Vec<NodeRange>,
	/// The value graph.
	graph: ValueGraph,
	/// Whether the model has been converted and pushed.
	input_finished: bool,
	/// Aggregation of the link the active scope will record.
	link_aggr: Aggregation,
	/// The working model.
	model: FlatModel,
	/// Number of variables received from the flattener.
	n_input_vars: usize,
	/// Converter options.
	options: ConvertOptions,
	/// Per class, the indices of the items pushed to the solver, in push
	/// order. Filled by the model push, consumed by postsolve.
	pushed: HashMap<ConClass, Vec<usize>>,
}

#[derive(Clone, Debug)]
/// A solver solution mapped back onto the input model.
pub struct ModelSolution {
	/// Duals per constraint class, one entry per input item of the class;
	/// `None` where no value could be reconstructed.
	pub con_duals: HashMap<ConClass, Vec<Option<f64>>>,
	/// Value of the first objective, NaN when the solver reported none.
	pub objective: f64,
	/// Terminal status of the solve.
	pub status: SolveStatus,
	/// Values of the input variables.
	pub var_values: Vec<f64>,
}

impl<A: ModelApi> FlatConverter<A> {
	/// Resolved acceptance of a kind: user override first, then the
	/// solver's declaration.
	pub fn acceptance(&self, kind: ConKind) -> Acceptance {
		self.options.acceptance(kind, self.api.acceptance(kind))
	}

	/// Store a constraint without result-variable bookkeeping.
	///
	/// Use [`Self::assign_result_var`] for mapped functional constraints.
	pub fn add_constraint<C: ConSpec>(&mut self, con: C) -> Result<NodeRange, FlatError> {
		let index = C::keeper_mut(&mut self.model).add(con)?;
		let node = C::keeper(&self.model).node();
		let range = self.graph.extend(node, 1);
		debug_assert_eq!(range.first, index);
		self.autolink(range);
		Ok(range)
	}

	/// Add an objective.
	pub fn add_objective(&mut self, obj: Objective) -> NodeRange {
		self.model.add_objective(obj);
		let range = self.graph.extend(self.model.obj_node, 1);
		self.autolink(range);
		range
	}

	/// Store an asserted (root) constraint from the flattener, propagating
	/// context into the defining expressions of its arguments.
	pub fn add_root_constraint<C: Convert>(&mut self, con: C) -> Result<(), FlatError> {
		if self.options.preprocess_anything() && con.try_absorb_root(self)? {
			return Ok(());
		}
		con.propagate_root(self)?;
		let _ = self.add_constraint(con)?;
		Ok(())
	}

	/// Store a variable's defining constraint with an already chosen result
	/// variable, replacing any previous definition of that variable.
	pub fn add_with_result<C: ConSpec>(
		&mut self,
		con: C,
		result: VarId,
	) -> Result<NodeRange, FlatError> {
		let range = self.add_constraint(con)?;
		C::keeper_mut(&mut self.model).set_result(range.first, result);
		self.model.set_init_expr(
			result,
			ConRef {
				class: C::CLASS,
				index: range.first,
			},
		);
		Ok(range)
	}

	/// Add one variable. Coinciding bounds yield the canonical fixed
	/// variable for that value.
	pub fn add_var(&mut self, lb: f64, ub: f64, ty: VarType) -> Result<VarId, FlatError> {
		if lb == ub {
			return self.make_fixed_var(lb);
		}
		self.do_add_var(lb, ub, ty)
	}

	/// Add the flattener's variables in bulk.
	pub fn add_vars(
		&mut self,
		lbs: &[f64],
		ubs: &[f64],
		types: &[VarType],
	) -> Result<Vec<VarId>, FlatError> {
		debug_assert!(lbs.len() == ubs.len() && ubs.len() == types.len());
		lbs.iter()
			.zip(ubs)
			.zip(types)
			.map(|((&lb, &ub), &ty)| self.do_add_var(lb, ub, ty))
			.collect()
	}

	/// The solver's model-building API.
	pub fn api(&self) -> &A {
		&self.api
	}

	/// The solver's model-building API, mutable.
	pub fn api_mut(&mut self) -> &mut A {
		&mut self.api
	}

	/// The entry point for functional constraints: fold, reuse a
	/// structurally equal earlier constraint, or allocate a result variable
	/// with deduced bounds and store.
	pub fn assign_result_var<C: Functional + ConSpec>(
		&mut self,
		con: C,
	) -> Result<VarId, FlatError> {
		if self.options.preprocess_anything() {
			if let Some(value) = con.fold_constant(&self.model, &self.options) {
				return self.make_fixed_var(value);
			}
			if let Some(substitute) = con.substitute_result(self) {
				return substitute;
			}
			if C::MAPPED {
				if let Some(index) = C::keeper(&self.model).map_find(&con) {
					let keeper = C::keeper(&self.model);
					let result = keeper
						.result(index)
						.expect("a mapped functional constraint must carry its result variable");
					let range = keeper.node_range(index);
					self.autolink(range);
					return Ok(result);
				}
			}
		}
		let (lb, ub, ty) = con.result_bounds(&self.model);
		let result = self.do_add_var(lb, ub, ty)?;
		let _ = self.add_with_result(con, result)?;
		Ok(result)
	}

	/// Record a freshly created range in the active autolink scope.
	fn autolink(&mut self, range: NodeRange) {
		if self.autolink_src.is_some() {
			if let Some(last) = self.autolink_targets.last_mut() {
				if last.try_extend(&range) {
					return;
				}
			}
			self.autolink_targets.push(range);
		}
	}

	/// Value node and input-item count of a constraint class.
	fn class_info(&self, class: ConClass) -> (NodeId, usize) {
		fn info<C: ConSpec>(model: &FlatModel) -> (NodeId, usize) {
			let keeper = C::keeper(model);
			(keeper.node(), keeper.n_input())
		}
		match class {
			ConClass::Abs => info::<AbsCon>(&self.model),
			ConClass::AllDiff => info::<AllDiffCon>(&self.model),
			ConClass::And => info::<AndCon>(&self.model),
			ConClass::ComplLin => info::<ComplLin>(&self.model),
			ConClass::ComplQuad => info::<ComplQuad>(&self.model),
			ConClass::CondLin => info::<CondLinCon>(&self.model),
			ConClass::CondQuad => info::<CondQuadCon>(&self.model),
			ConClass::Count => info::<CountCon>(&self.model),
			ConClass::Div => info::<DivCon>(&self.model),
			ConClass::ElemFunc => info::<ElemFuncCon>(&self.model),
			ConClass::IfThen => info::<IfThenCon>(&self.model),
			ConClass::IndicatorLin => info::<IndicatorLin>(&self.model),
			ConClass::IndicatorQuad => info::<IndicatorQuad>(&self.model),
			ConClass::LinCon => info::<LinCon>(&self.model),
			ConClass::LinConRange => info::<LinConRange>(&self.model),
			ConClass::LinFunc => info::<LinFuncCon>(&self.model),
			ConClass::Max => info::<MaxCon>(&self.model),
			ConClass::Min => info::<MinCon>(&self.model),
			ConClass::Not => info::<NotCon>(&self.model),
			ConClass::NumberofConst => info::<NumberofConstCon>(&self.model),
			ConClass::NumberofVar => info::<NumberofVarCon>(&self.model),
			ConClass::Or => info::<OrCon>(&self.model),
			ConClass::Pl => info::<PlCon>(&self.model),
			ConClass::QuadCon => info::<QuadCon>(&self.model),
			ConClass::QuadConRange => info::<QuadConRange>(&self.model),
			ConClass::QuadFunc => info::<QuadFuncCon>(&self.model),
			ConClass::Sos1 => info::<Sos1Con>(&self.model),
			ConClass::Sos2 => info::<Sos2Con>(&self.model),
		}
	}

	/// Offer every item of one pool for conversion, returning whether any
	/// items were newly inspected.
	fn convert_keeper<C: Convert>(&mut self) -> Result<bool, FlatError> {
		let start = C::keeper(&self.model).cursor();
		let end = C::keeper(&self.model).len();
		for index in start..end {
			if C::keeper(&self.model).is_bridged(index) {
				continue;
			}
			let con = C::keeper(&self.model).get(index).clone();
			let acc = self.acceptance(con.kind());
			let item_needs = acc != Acceptance::NotAccepted && {
				let item = con.clone().into_item(self.stored_result::<C>(index));
				self.api.needs_item_conversion(&item)
			};
			match acc {
				Acceptance::Recommended if !item_needs => {},
				Acceptance::AcceptedButNotRecommended if !item_needs => {
					let name = con.kind().name();
					match self.run_conversion(con, index) {
						Ok(()) => C::keeper_mut(&mut self.model).mark_bridged(index),
						Err(err) if err.is_conversion_failure() => {
							warn!(
								constraint = name,
								%err,
								"conversion failed; passing the constraint to the solver"
							);
						},
						Err(err) => return Err(err),
					}
				},
				_ => {
					self.run_conversion(con, index)?;
					C::keeper_mut(&mut self.model).mark_bridged(index);
				},
			}
		}
		C::keeper_mut(&mut self.model).set_cursor(end);
		Ok(end > start)
	}

	/// Rewrite constraints until every remaining item is solver-acceptable.
	///
	/// Pools are visited round-robin in registration order; items emitted
	/// during a pass are picked up by the next one.
	#[tracing::instrument(level = "debug", skip(self))]
	fn convert_items(&mut self) -> Result<(), FlatError> {
		for pass in 0..=MAX_CONVERSION_PASSES {
			if pass == MAX_CONVERSION_PASSES {
				return Err(FlatError::ConversionLoop { passes: pass });
			}
			let mut any = false;
			any |= self.convert_keeper::<LinConRange>()?;
			any |= self.convert_keeper::<LinCon>()?;
			any |= self.convert_keeper::<QuadConRange>()?;
			any |= self.convert_keeper::<QuadCon>()?;
			any |= self.convert_keeper::<LinFuncCon>()?;
			any |= self.convert_keeper::<QuadFuncCon>()?;
			any |= self.convert_keeper::<MaxCon>()?;
			any |= self.convert_keeper::<MinCon>()?;
			any |= self.convert_keeper::<AbsCon>()?;
			any |= self.convert_keeper::<AndCon>()?;
			any |= self.convert_keeper::<OrCon>()?;
			any |= self.convert_keeper::<CondLinCon>()?;
			any |= self.convert_keeper::<CondQuadCon>()?;
			any |= self.convert_keeper::<NotCon>()?;
			any |= self.convert_keeper::<DivCon>()?;
			any |= self.convert_keeper::<IfThenCon>()?;
			any |= self.convert_keeper::<AllDiffCon>()?;
			any |= self.convert_keeper::<NumberofConstCon>()?;
			any |= self.convert_keeper::<NumberofVarCon>()?;
			any |= self.convert_keeper::<CountCon>()?;
			any |= self.convert_keeper::<ElemFuncCon>()?;
			any |= self.convert_keeper::<IndicatorLin>()?;
			any |= self.convert_keeper::<IndicatorQuad>()?;
			any |= self.convert_keeper::<PlCon>()?;
			any |= self.convert_keeper::<Sos1Con>()?;
			any |= self.convert_keeper::<Sos2Con>()?;
			any |= self.convert_keeper::<ComplLin>()?;
			any |= self.convert_keeper::<ComplQuad>()?;
			if !any {
				debug!(passes = pass, "conversion reached a fixpoint");
				break;
			}
		}
		Ok(())
	}

	/// Turn an affine expression into a variable: the variable itself for a
	/// plain variable, the canonical fixed variable for a constant, and a
	/// functional constraint's result otherwise.
	pub fn convert_to_var(&mut self, expr: AffineExpr) -> Result<VarId, FlatError> {
		if let Some(v) = expr.is_variable() {
			return Ok(v);
		}
		if let Some(value) = expr.is_constant() {
			return self.make_fixed_var(value);
		}
		self.assign_result_var(LinFuncCon::new(expr))
	}

	/// Turn a quadratic expression into a variable.
	pub fn convert_quad_to_var(&mut self, expr: QuadExpr) -> Result<VarId, FlatError> {
		if expr.is_affine().is_some() {
			let QuadExpr { affine, .. } = expr;
			return self.convert_to_var(affine);
		}
		self.assign_result_var(QuadFuncCon::new(expr))
	}

	delegate! {
		to self.model {
			/// Value of a fixed variable.
			pub fn fixed_value(&self, v: VarId) -> f64;
			/// Whether a variable is binary.
			pub fn is_binary(&self, v: VarId) -> bool;
			/// Whether a variable's bounds coincide.
			pub fn is_fixed(&self, v: VarId) -> bool;
			/// Lower bound of a variable.
			pub fn lb(&self, v: VarId) -> f64;
			/// Narrow a variable's bounds.
			pub fn narrow_var_bounds(&mut self, v: VarId, lb: f64, ub: f64) -> Result<(), FlatError>;
			/// Upper bound of a variable.
			pub fn ub(&self, v: VarId) -> f64;
			/// Bounds of a variable.
			pub fn var_bounds(&self, v: VarId) -> (f64, f64);
			/// Type of a variable.
			pub fn var_type(&self, v: VarId) -> VarType;
		}
	}

	/// Add a variable without fixed-value collapsing.
	fn do_add_var(&mut self, lb: f64, ub: f64, ty: VarType) -> Result<VarId, FlatError> {
		let v = self.model.add_var(lb, ub, ty)?;
		let range = self.graph.extend(self.model.var_node, 1);
		debug_assert_eq!(range.first, v.index());
		self.autolink(range);
		Ok(v)
	}

	/// Narrow a variable to true and propagate positive context into its
	/// defining expression. Used for root logical expressions.
	pub fn fix_as_true(&mut self, v: VarId) -> Result<(), FlatError> {
		self.propagate_result_of_init_expr(v, 1.0, 1.0, Context::Positive)
	}

	/// Convert the model, push it to the solver, and export the conversion
	/// graph when requested. After this the model is frozen.
	pub fn finish_model_input(&mut self) -> Result<(), FlatError> {
		debug_assert!(!self.input_finished, "model input is already finished");
		self.freeze_input();
		self.convert_items()?;
		if self.options.relax() {
			self.model.relax_integrality();
		}
		self.push_model()?;
		if let Some(path) = self.options.write_graph_file().cloned() {
			let mut out = BufWriter::new(File::create(path).map_err(FlatError::GraphExport)?);
			self.graph.export_json_lines(&mut out)?;
		}
		if let Some(path) = self.options.write_prob_file().cloned() {
			self.api.write_problem(&path)?;
		}
		self.input_finished = true;
		Ok(())
	}

	/// Record the input sizes before conversion starts.
	fn freeze_input(&mut self) {
		fn freeze<C: ConSpec>(model: &mut FlatModel) {
			C::keeper_mut(model).freeze_input();
		}
		self.n_input_vars = self.model.num_vars();
		freeze::<LinConRange>(&mut self.model);
		freeze::<LinCon>(&mut self.model);
		freeze::<QuadConRange>(&mut self.model);
		freeze::<QuadCon>(&mut self.model);
		freeze::<LinFuncCon>(&mut self.model);
		freeze::<QuadFuncCon>(&mut self.model);
		freeze::<MaxCon>(&mut self.model);
		freeze::<MinCon>(&mut self.model);
		freeze::<AbsCon>(&mut self.model);
		freeze::<AndCon>(&mut self.model);
		freeze::<OrCon>(&mut self.model);
		freeze::<CondLinCon>(&mut self.model);
		freeze::<CondQuadCon>(&mut self.model);
		freeze::<NotCon>(&mut self.model);
		freeze::<DivCon>(&mut self.model);
		freeze::<IfThenCon>(&mut self.model);
		freeze::<AllDiffCon>(&mut self.model);
		freeze::<NumberofConstCon>(&mut self.model);
		freeze::<NumberofVarCon>(&mut self.model);
		freeze::<CountCon>(&mut self.model);
		freeze::<ElemFuncCon>(&mut self.model);
		freeze::<IndicatorLin>(&mut self.model);
		freeze::<IndicatorQuad>(&mut self.model);
		freeze::<PlCon>(&mut self.model);
		freeze::<Sos1Con>(&mut self.model);
		freeze::<Sos2Con>(&mut self.model);
		freeze::<ComplLin>(&mut self.model);
		freeze::<ComplQuad>(&mut self.model);
	}

	/// The value graph built so far.
	pub fn graph(&self) -> &ValueGraph {
		&self.graph
	}

	/// Total number of live constraints across all pools.
	fn live_constraint_count(&self) -> usize {
		fn live<C: ConSpec>(model: &FlatModel) -> usize {
			C::keeper(model).num_live()
		}
		live::<LinConRange>(&self.model)
			+ live::<LinCon>(&self.model)
			+ live::<QuadConRange>(&self.model)
			+ live::<QuadCon>(&self.model)
			+ live::<LinFuncCon>(&self.model)
			+ live::<QuadFuncCon>(&self.model)
			+ live::<MaxCon>(&self.model)
			+ live::<MinCon>(&self.model)
			+ live::<AbsCon>(&self.model)
			+ live::<AndCon>(&self.model)
			+ live::<OrCon>(&self.model)
			+ live::<CondLinCon>(&self.model)
			+ live::<CondQuadCon>(&self.model)
			+ live::<NotCon>(&self.model)
			+ live::<DivCon>(&self.model)
			+ live::<IfThenCon>(&self.model)
			+ live::<AllDiffCon>(&self.model)
			+ live::<NumberofConstCon>(&self.model)
			+ live::<NumberofVarCon>(&self.model)
			+ live::<CountCon>(&self.model)
			+ live::<ElemFuncCon>(&self.model)
			+ live::<IndicatorLin>(&self.model)
			+ live::<IndicatorQuad>(&self.model)
			+ live::<PlCon>(&self.model)
			+ live::<Sos1Con>(&self.model)
			+ live::<Sos2Con>(&self.model)
			+ live::<ComplLin>(&self.model)
			+ live::<ComplQuad>(&self.model)
	}

	/// The canonical fixed variable for a constant.
	pub fn make_fixed_var(&mut self, value: f64) -> Result<VarId, FlatError> {
		if let Some(v) = self.model.find_fixed(value) {
			let range = self.graph.select(self.model.var_node, v.index());
			self.autolink(range);
			return Ok(v);
		}
		let v = self.do_add_var(value, value, VarType::Continuous)?;
		self.model.cache_fixed(value, v);
		Ok(v)
	}

	/// The working model.
	pub fn model(&self) -> &FlatModel {
		&self.model
	}

	/// Create a converter with default options.
	pub fn new(api: A) -> FlatConverter<A> {
		FlatConverter::with_options(api, ConvertOptions::default())
	}

	/// The missing-rewrite error for a rejected kind.
	pub(crate) fn no_conversion(&self, kind: ConKind) -> FlatError {
		FlatError::NoConversion {
			con: kind.name(),
			solver: self.api.solver_name().to_string(),
		}
	}

	/// Converter options.
	pub fn options(&self) -> &ConvertOptions {
		&self.options
	}

	/// Map a solver solution back onto the input model.
	///
	/// Variable values and constraint duals take separate backward walks
	/// over the same graph, each seeded with its own family of values.
	pub fn postsolve_solution(&self, sol: &Solution) -> ModelSolution {
		let mut primal = NodeValues::new(&self.graph);
		primal.seed(self.model.var_node, &sol.primal);
		self.graph.transfer_backward(&mut primal);
		let var_values = (0..self.n_input_vars)
			.map(|i| primal.get(self.model.var_node, i).unwrap_or(f64::NAN))
			.collect();

		let mut duals = NodeValues::new(&self.graph);
		for (class, values) in &sol.duals {
			let (node, _) = self.class_info(*class);
			if let Some(rows) = self.pushed.get(class) {
				for (&index, &value) in rows.iter().zip(values) {
					duals.seed_at(node, index, value);
				}
			}
		}
		self.graph.transfer_backward(&mut duals);
		let mut con_duals = HashMap::new();
		for &class in ConClass::all() {
			let (node, n_input) = self.class_info(class);
			if n_input > 0 {
				let values = (0..n_input).map(|i| duals.get(node, i)).collect();
				let _ = con_duals.insert(class, values);
			}
		}

		ModelSolution {
			con_duals,
			objective: sol.objectives.first().copied().unwrap_or(f64::NAN),
			status: sol.status,
			var_values,
		}
	}

	/// Propagate context (and nothing else) into the defining expressions
	/// of the given argument variables.
	pub(crate) fn propagate_args_mixed(&mut self, vars: &[VarId]) -> Result<(), FlatError> {
		for &v in vars {
			let (lb, ub) = self.var_bounds(v);
			self.propagate_result_of_init_expr(v, lb, ub, Context::Mixed)?;
		}
		Ok(())
	}

	/// Dispatch a result propagation into the pool holding the defining
	/// constraint.
	fn propagate_result_at(
		&mut self,
		at: ConRef,
		lb: f64,
		ub: f64,
		ctx: Context,
	) -> Result<(), FlatError> {
		match at.class {
			ConClass::Abs => self.propagate_result_in::<AbsCon>(at.index, lb, ub, ctx),
			ConClass::AllDiff => self.propagate_result_in::<AllDiffCon>(at.index, lb, ub, ctx),
			ConClass::And => self.propagate_result_in::<AndCon>(at.index, lb, ub, ctx),
			ConClass::ComplLin => self.propagate_result_in::<ComplLin>(at.index, lb, ub, ctx),
			ConClass::ComplQuad => self.propagate_result_in::<ComplQuad>(at.index, lb, ub, ctx),
			ConClass::CondLin => self.propagate_result_in::<CondLinCon>(at.index, lb, ub, ctx),
			ConClass::CondQuad => self.propagate_result_in::<CondQuadCon>(at.index, lb, ub, ctx),
			ConClass::Count => self.propagate_result_in::<CountCon>(at.index, lb, ub, ctx),
			ConClass::Div => self.propagate_result_in::<DivCon>(at.index, lb, ub, ctx),
			ConClass::ElemFunc => self.propagate_result_in::<ElemFuncCon>(at.index, lb, ub, ctx),
			ConClass::IfThen => self.propagate_result_in::<IfThenCon>(at.index, lb, ub, ctx),
			ConClass::IndicatorLin => {
				self.propagate_result_in::<IndicatorLin>(at.index, lb, ub, ctx)
			},
			ConClass::IndicatorQuad => {
				self.propagate_result_in::<IndicatorQuad>(at.index, lb, ub, ctx)
			},
			ConClass::LinCon => self.propagate_result_in::<LinCon>(at.index, lb, ub, ctx),
			ConClass::LinConRange => self.propagate_result_in::<LinConRange>(at.index, lb, ub, ctx),
			ConClass::LinFunc => self.propagate_result_in::<LinFuncCon>(at.index, lb, ub, ctx),
			ConClass::Max => self.propagate_result_in::<MaxCon>(at.index, lb, ub, ctx),
			ConClass::Min => self.propagate_result_in::<MinCon>(at.index, lb, ub, ctx),
			ConClass::Not => self.propagate_result_in::<NotCon>(at.index, lb, ub, ctx),
			ConClass::NumberofConst => {
				self.propagate_result_in::<NumberofConstCon>(at.index, lb, ub, ctx)
			},
			ConClass::NumberofVar => {
				self.propagate_result_in::<NumberofVarCon>(at.index, lb, ub, ctx)
			},
			ConClass::Or => self.propagate_result_in::<OrCon>(at.index, lb, ub, ctx),
			ConClass::Pl => self.propagate_result_in::<PlCon>(at.index, lb, ub, ctx),
			ConClass::QuadCon => self.propagate_result_in::<QuadCon>(at.index, lb, ub, ctx),
			ConClass::QuadConRange => {
				self.propagate_result_in::<QuadConRange>(at.index, lb, ub, ctx)
			},
			ConClass::QuadFunc => self.propagate_result_in::<QuadFuncCon>(at.index, lb, ub, ctx),
			ConClass::Sos1 => self.propagate_result_in::<Sos1Con>(at.index, lb, ub, ctx),
			ConClass::Sos2 => self.propagate_result_in::<Sos2Con>(at.index, lb, ub, ctx),
		}
	}

	/// Merge the context of one stored item and run its type's result
	/// propagator.
	fn propagate_result_in<C: Convert>(
		&mut self,
		index: usize,
		lb: f64,
		ub: f64,
		ctx: Context,
	) -> Result<(), FlatError> {
		let merged = C::keeper_mut(&mut self.model).merge_context(index, ctx);
		let con = C::keeper(&self.model).get(index).clone();
		con.propagate_result(self, lb, ub, merged)
	}

	/// Narrow a variable's bounds and propagate the new bounds and context
	/// into its defining expression, recursively.
	pub fn propagate_result_of_init_expr(
		&mut self,
		v: VarId,
		lb: f64,
		ub: f64,
		ctx: Context,
	) -> Result<(), FlatError> {
		self.model.narrow_var_bounds(v, lb, ub)?;
		if let Some(at) = self.model.init_expr(v) {
			self.propagate_result_at(at, lb, ub, ctx)?;
		}
		Ok(())
	}

	/// Push one pool's live items to the solver, remembering the push order
	/// for postsolve.
	fn push_keeper<C: ConSpec>(&mut self) -> Result<(), FlatError> {
		let live: Vec<usize> = C::keeper(&self.model).live().map(|(i, _)| i).collect();
		for &index in &live {
			let keeper = C::keeper(&self.model);
			let item = keeper.get(index).clone().into_item(keeper.result(index));
			self.api.add_constraint(&item)?;
		}
		if !live.is_empty() {
			let _ = self.pushed.insert(C::CLASS, live);
		}
		Ok(())
	}

	/// Push the converted model through the solver's model-building API.
	fn push_model(&mut self) -> Result<(), FlatError> {
		let info = ProblemInfo {
			num_cons: self.live_constraint_count(),
			num_objs: self.model.objectives().len(),
			num_vars: self.model.num_vars(),
		};
		self.api.init_problem(&info)?;
		let (lbs, ubs, types) = self.model.var_arrays();
		self.api.add_variables(&lbs, &ubs, &types)?;
		for (iobj, obj) in self.model.objectives().iter().enumerate() {
			if let Some(affine) = obj.expr.is_affine() {
				self.api.set_linear_objective(iobj, obj.sense, affine)?;
			} else {
				self.api.set_quadratic_objective(iobj, obj.sense, &obj.expr)?;
			}
		}
		self.push_keeper::<LinConRange>()?;
		self.push_keeper::<LinCon>()?;
		self.push_keeper::<QuadConRange>()?;
		self.push_keeper::<QuadCon>()?;
		self.push_keeper::<LinFuncCon>()?;
		self.push_keeper::<QuadFuncCon>()?;
		self.push_keeper::<MaxCon>()?;
		self.push_keeper::<MinCon>()?;
		self.push_keeper::<AbsCon>()?;
		self.push_keeper::<AndCon>()?;
		self.push_keeper::<OrCon>()?;
		self.push_keeper::<CondLinCon>()?;
		self.push_keeper::<CondQuadCon>()?;
		self.push_keeper::<NotCon>()?;
		self.push_keeper::<DivCon>()?;
		self.push_keeper::<IfThenCon>()?;
		self.push_keeper::<AllDiffCon>()?;
		self.push_keeper::<NumberofConstCon>()?;
		self.push_keeper::<NumberofVarCon>()?;
		self.push_keeper::<CountCon>()?;
		self.push_keeper::<ElemFuncCon>()?;
		self.push_keeper::<IndicatorLin>()?;
		self.push_keeper::<IndicatorQuad>()?;
		self.push_keeper::<PlCon>()?;
		self.push_keeper::<Sos1Con>()?;
		self.push_keeper::<Sos2Con>()?;
		self.push_keeper::<ComplLin>()?;
		self.push_keeper::<ComplQuad>()?;
		self.api.finish_problem()
	}

	/// Replace the defining constraint of a variable.
	pub fn redefine_variable<C: ConSpec>(&mut self, v: VarId, con: C) -> Result<(), FlatError> {
		debug_assert!(
			self.model.init_expr(v).is_some(),
			"redefining a variable that has no defining constraint"
		);
		self.add_with_result(con, v).map(|_| ())
	}

	/// Run the conversion of one item inside a fresh autolink scope; on
	/// success a link from the item to everything it emitted is recorded.
	fn run_conversion<C: Convert>(&mut self, con: C, index: usize) -> Result<(), FlatError> {
		if C::USES_CONTEXT && C::keeper(&self.model).context(index).is_none() {
			let _ = C::keeper_mut(&mut self.model).merge_context(index, Context::Mixed);
		}
		let src = C::keeper(&self.model).node_range(index);
		self.autolink_src = Some(src);
		self.autolink_targets.clear();
		self.link_aggr = Aggregation::Sum;
		let result = con.convert(self, index);
		let targets = take(&mut self.autolink_targets);
		self.autolink_src = None;
		if result.is_ok() {
			self.graph.add_link(src, targets, self.link_aggr);
		}
		result
	}

	/// Override the aggregation of the link the active conversion records.
	pub(crate) fn set_link_aggregation(&mut self, aggr: Aggregation) {
		self.link_aggr = aggr;
	}

	/// Set one converter option by its textual name.
	pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), FlatError> {
		self.options.set_option(name, value)
	}

	/// Usage context of a stored item.
	pub(crate) fn stored_context<C: ConSpec>(&self, index: usize) -> Context {
		C::keeper(&self.model).context(index)
	}

	/// Result variable of a stored item, if assigned.
	pub(crate) fn stored_result<C: ConSpec>(&self, index: usize) -> Option<VarId> {
		C::keeper(&self.model).result(index)
	}

	/// Result variable of a stored functional item.
	pub(crate) fn result_var_of<C: ConSpec>(&self, index: usize) -> VarId {
		self.stored_result::<C>(index)
			.expect("a stored functional constraint must carry its result variable")
	}

	/// Create a converter with the given options.
	pub fn with_options(api: A, options: ConvertOptions) -> FlatConverter<A> {
		let mut graph = ValueGraph::default();
		let model = FlatModel::new(&mut graph);
		FlatConverter {
			api,
			autolink_src: None,
			autolink_targets: Vec::new(),
			graph,
			input_finished: false,
			link_aggr: Aggregation::Sum,
			model,
			n_input_vars: 0,
			options,
			pushed: HashMap::new(),
		}
	}

	/// Export the conversion graph as JSON Lines.
	pub fn write_graph(&self, out: &mut dyn std::io::Write) -> Result<(), FlatError> {
		self.graph.export_json_lines(out)
	}
}
