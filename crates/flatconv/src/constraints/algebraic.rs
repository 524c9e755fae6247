//! Linear and quadratic algebraic constraints, one-sided and ranged, and
//! the sense split of range constraints for solvers without a range form.

use std::{
	fmt,
	hash::{Hash, Hasher},
};

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{ConClass, ConItem, ConSpec, Convert},
	context::Context,
	converter::FlatConverter,
	error::FlatError,
	expr::{write_constant, write_term, LinTerms, QuadTerms},
	helpers::hash_f64,
	keeper::Keeper,
	model::{FlatModel, VarId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Sense of a one-sided algebraic constraint.
pub enum ConSense {
	/// Body is at most the right-hand side.
	Le,
	/// Body equals the right-hand side.
	Eq,
	/// Body is at least the right-hand side.
	Ge,
}

#[derive(Clone, Debug, PartialEq)]
/// A one-sided linear constraint `body (<=|==|>=) rhs`.
pub struct LinCon {
	/// The linear body.
	pub body: LinTerms,
	/// The comparison sense.
	pub sense: ConSense,
	/// The right-hand side.
	pub rhs: f64,
}

#[derive(Clone, Debug, PartialEq)]
/// A two-sided linear constraint `lb <= body <= ub`.
pub struct LinConRange {
	/// The linear body.
	pub body: LinTerms,
	/// Lower side, possibly `-inf`.
	pub lb: f64,
	/// Upper side, possibly `+inf`.
	pub ub: f64,
}

#[derive(Clone, Debug, PartialEq)]
/// A one-sided quadratic constraint `linear + quad (<=|==|>=) rhs`.
pub struct QuadCon {
	/// The linear part of the body.
	pub linear: LinTerms,
	/// The quadratic part of the body.
	pub quad: QuadTerms,
	/// The comparison sense.
	pub sense: ConSense,
	/// The right-hand side.
	pub rhs: f64,
}

#[derive(Clone, Debug, PartialEq)]
/// A two-sided quadratic constraint `lb <= linear + quad <= ub`.
pub struct QuadConRange {
	/// The linear part of the body.
	pub linear: LinTerms,
	/// The quadratic part of the body.
	pub quad: QuadTerms,
	/// Lower side, possibly `-inf`.
	pub lb: f64,
	/// Upper side, possibly `+inf`.
	pub ub: f64,
}

/// Context a body term picks up inside a one-sided constraint.
///
/// In `sum(c_i x_i) <= d`, a term with a nonnegative coefficient only
/// presses its variable from above, which is the positive usage of the
/// variable's defining expression; `>=` flips, `==` needs both directions.
pub(crate) fn term_context(sense: ConSense, coef: f64) -> Context {
	let base = match sense {
		ConSense::Le => Context::Positive,
		ConSense::Ge => Context::Negative,
		ConSense::Eq => return Context::Mixed,
	};
	if coef >= 0.0 {
		base
	} else {
		base.flip()
	}
}

impl ConSense {
	/// Mirror the sense, as under negation of the body.
	pub fn reversed(self) -> ConSense {
		match self {
			ConSense::Le => ConSense::Ge,
			ConSense::Ge => ConSense::Le,
			ConSense::Eq => ConSense::Eq,
		}
	}
}

impl fmt::Display for ConSense {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConSense::Le => write!(f, "<="),
			ConSense::Eq => write!(f, "=="),
			ConSense::Ge => write!(f, ">="),
		}
	}
}

impl LinCon {
	/// An equality row.
	pub fn eq(body: LinTerms, rhs: f64) -> LinCon {
		LinCon {
			body,
			sense: ConSense::Eq,
			rhs,
		}
	}

	/// A `>=` row.
	pub fn ge(body: LinTerms, rhs: f64) -> LinCon {
		LinCon {
			body,
			sense: ConSense::Ge,
			rhs,
		}
	}

	/// A `<=` row.
	pub fn le(body: LinTerms, rhs: f64) -> LinCon {
		LinCon {
			body,
			sense: ConSense::Le,
			rhs,
		}
	}
}

impl ConSpec for LinCon {
	const CLASS: ConClass = ConClass::LinCon;

	fn arg_vars(&self) -> Vec<VarId> {
		self.body.vars().to_vec()
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::LinCon(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.lin_cons
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.lin_cons
	}

	fn kind(&self) -> ConKind {
		match self.sense {
			ConSense::Le => ConKind::LinLe,
			ConSense::Eq => ConKind::LinEq,
			ConSense::Ge => ConKind::LinGe,
		}
	}
}

impl Convert for LinCon {
	fn propagate_root<A: ModelApi>(&self, cvt: &mut FlatConverter<A>) -> Result<(), FlatError> {
		for (c, v) in self.body.iter() {
			let (lb, ub) = cvt.var_bounds(v);
			cvt.propagate_result_of_init_expr(v, lb, ub, term_context(self.sense, c))?;
		}
		Ok(())
	}

	fn try_absorb_root<A: ModelApi>(&self, cvt: &mut FlatConverter<A>) -> Result<bool, FlatError> {
		// A single-variable row is just a bound.
		if self.body.len() != 1 {
			return Ok(false);
		}
		let c = self.body.coefs()[0];
		let v = self.body.vars()[0];
		if c == 0.0 {
			return Ok(false);
		}
		let bound = self.rhs / c;
		let upper = (self.sense == ConSense::Le) == (c > 0.0);
		let (lb, ub) = match self.sense {
			ConSense::Eq => (bound, bound),
			_ if upper => (f64::NEG_INFINITY, bound),
			_ => (bound, f64::INFINITY),
		};
		cvt.propagate_result_of_init_expr(v, lb, ub, term_context(self.sense, c))?;
		Ok(true)
	}
}

impl Eq for LinCon {}

impl fmt::Display for LinCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.body, self.sense, self.rhs)
	}
}

impl Hash for LinCon {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.body.hash(state);
		self.sense.hash(state);
		hash_f64(state, self.rhs);
	}
}

impl LinConRange {
	/// Create a range row.
	pub fn new(body: LinTerms, lb: f64, ub: f64) -> LinConRange {
		LinConRange { body, lb, ub }
	}
}

impl ConSpec for LinConRange {
	const CLASS: ConClass = ConClass::LinConRange;

	fn arg_vars(&self) -> Vec<VarId> {
		self.body.vars().to_vec()
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::LinConRange(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.lin_ranges
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.lin_ranges
	}

	fn kind(&self) -> ConKind {
		ConKind::LinRange
	}
}

impl Convert for LinConRange {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_index: usize,
	) -> Result<(), FlatError> {
		// Sense split; the dual of the range is the sum of the split rows'
		// duals, of which at most one is active.
		if self.ub.is_finite() {
			let _ = cvt.add_constraint(LinCon::le(self.body.clone(), self.ub))?;
		}
		if self.lb.is_finite() {
			let _ = cvt.add_constraint(LinCon::ge(self.body.clone(), self.lb))?;
		}
		Ok(())
	}
}

impl Eq for LinConRange {}

impl fmt::Display for LinConRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} <= {} <= {}", self.lb, self.body, self.ub)
	}
}

impl Hash for LinConRange {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.body.hash(state);
		hash_f64(state, self.lb);
		hash_f64(state, self.ub);
	}
}

/// Write a quadratic body `quad + linear`.
fn write_quad_body(
	f: &mut fmt::Formatter<'_>,
	quad: &QuadTerms,
	linear: &LinTerms,
	constant: f64,
) -> fmt::Result {
	let mut first = true;
	for (c, v1, v2) in quad.iter() {
		write_term(f, &mut first, c, &format!("x{}*x{}", v1.index(), v2.index()))?;
	}
	for (c, v) in linear.iter() {
		write_term(f, &mut first, c, &format!("x{}", v.index()))?;
	}
	write_constant(f, &mut first, constant)
}

impl QuadCon {
	/// An equality row.
	pub fn eq(linear: LinTerms, quad: QuadTerms, rhs: f64) -> QuadCon {
		QuadCon {
			linear,
			quad,
			sense: ConSense::Eq,
			rhs,
		}
	}

	/// A `>=` row.
	pub fn ge(linear: LinTerms, quad: QuadTerms, rhs: f64) -> QuadCon {
		QuadCon {
			linear,
			quad,
			sense: ConSense::Ge,
			rhs,
		}
	}

	/// A `<=` row.
	pub fn le(linear: LinTerms, quad: QuadTerms, rhs: f64) -> QuadCon {
		QuadCon {
			linear,
			quad,
			sense: ConSense::Le,
			rhs,
		}
	}

	/// All variables of the body.
	pub fn body_vars(&self) -> Vec<VarId> {
		let mut vars = self.linear.vars().to_vec();
		for (_, v1, v2) in self.quad.iter() {
			vars.push(v1);
			vars.push(v2);
		}
		vars
	}
}

impl ConSpec for QuadCon {
	const CLASS: ConClass = ConClass::QuadCon;

	fn arg_vars(&self) -> Vec<VarId> {
		self.body_vars()
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::QuadCon(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.quad_cons
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.quad_cons
	}

	fn kind(&self) -> ConKind {
		match self.sense {
			ConSense::Le => ConKind::QuadLe,
			ConSense::Eq => ConKind::QuadEq,
			ConSense::Ge => ConKind::QuadGe,
		}
	}
}

impl Convert for QuadCon {
	fn propagate_root<A: ModelApi>(&self, cvt: &mut FlatConverter<A>) -> Result<(), FlatError> {
		// Quadratic terms use their factors in both directions; only the
		// linear part gets a one-sided context.
		for (c, v) in self.linear.iter() {
			let (lb, ub) = cvt.var_bounds(v);
			cvt.propagate_result_of_init_expr(v, lb, ub, term_context(self.sense, c))?;
		}
		let mut quad_vars = Vec::new();
		for (_, v1, v2) in self.quad.iter() {
			quad_vars.push(v1);
			quad_vars.push(v2);
		}
		cvt.propagate_args_mixed(&quad_vars)
	}
}

impl Eq for QuadCon {}

impl fmt::Display for QuadCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write_quad_body(f, &self.quad, &self.linear, 0.0)?;
		write!(f, " {} {}", self.sense, self.rhs)
	}
}

impl Hash for QuadCon {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.linear.hash(state);
		self.quad.hash(state);
		self.sense.hash(state);
		hash_f64(state, self.rhs);
	}
}

impl QuadConRange {
	/// Create a range row.
	pub fn new(linear: LinTerms, quad: QuadTerms, lb: f64, ub: f64) -> QuadConRange {
		QuadConRange {
			linear,
			quad,
			lb,
			ub,
		}
	}
}

impl ConSpec for QuadConRange {
	const CLASS: ConClass = ConClass::QuadConRange;

	fn arg_vars(&self) -> Vec<VarId> {
		let mut vars = self.linear.vars().to_vec();
		for (_, v1, v2) in self.quad.iter() {
			vars.push(v1);
			vars.push(v2);
		}
		vars
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::QuadConRange(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.quad_ranges
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.quad_ranges
	}

	fn kind(&self) -> ConKind {
		ConKind::QuadRange
	}
}

impl Convert for QuadConRange {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_index: usize,
	) -> Result<(), FlatError> {
		if self.ub.is_finite() {
			let _ = cvt.add_constraint(QuadCon::le(self.linear.clone(), self.quad.clone(), self.ub))?;
		}
		if self.lb.is_finite() {
			let _ = cvt.add_constraint(QuadCon::ge(self.linear.clone(), self.quad.clone(), self.lb))?;
		}
		Ok(())
	}
}

impl Eq for QuadConRange {}

impl fmt::Display for QuadConRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} <= ", self.lb)?;
		write_quad_body(f, &self.quad, &self.linear, 0.0)?;
		write!(f, " <= {}", self.ub)
	}
}

impl Hash for QuadConRange {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.linear.hash(state);
		self.quad.hash(state);
		hash_f64(state, self.lb);
		hash_f64(state, self.ub);
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		constraints::algebraic::{term_context, ConSense, LinCon},
		context::Context,
		expr::LinTerms,
		model::VarId,
	};

	#[test]
	fn test_display() {
		let mut body = LinTerms::new();
		body.push(2.0, VarId::from_usize(0));
		body.push(-1.0, VarId::from_usize(1));
		assert_eq!(LinCon::le(body.clone(), 5.0).to_string(), "2 x0 - x1 <= 5");
		assert_eq!(LinCon::eq(body.clone(), 0.0).to_string(), "2 x0 - x1 == 0");
		assert_eq!(LinCon::ge(body, -1.5).to_string(), "2 x0 - x1 >= -1.5");
	}

	#[test]
	fn test_term_context() {
		assert_eq!(term_context(ConSense::Le, 1.0), Context::Positive);
		assert_eq!(term_context(ConSense::Le, -1.0), Context::Negative);
		assert_eq!(term_context(ConSense::Ge, 1.0), Context::Negative);
		assert_eq!(term_context(ConSense::Eq, 1.0), Context::Mixed);
	}
}
