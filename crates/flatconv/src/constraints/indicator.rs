//! Indicator constraints and their big-M linearization.

use std::fmt;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		algebraic::{ConSense, LinCon, QuadCon},
		ConClass, ConItem, ConSpec, Convert,
	},
	converter::FlatConverter,
	error::FlatError,
	expr::{LinTerms, QuadTerms},
	keeper::Keeper,
	model::{FlatModel, VarId},
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `bin_var == bin_val  =>  linear row`.
pub struct IndicatorLin {
	/// The binary trigger variable.
	pub bin_var: VarId,
	/// The triggering value.
	pub bin_val: bool,
	/// The implied row.
	pub con: LinCon,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `bin_var == bin_val  =>  quadratic row`.
pub struct IndicatorQuad {
	/// The binary trigger variable.
	pub bin_var: VarId,
	/// The triggering value.
	pub bin_val: bool,
	/// The implied row.
	pub con: QuadCon,
}

/// Big-M relaxation amount for an implied `body <= rhs`: the gap between
/// the body's upper bound and the right-hand side, or the configured
/// fallback when the bound is infinite.
fn big_m_amount<A: ModelApi>(
	cvt: &FlatConverter<A>,
	body_ub: f64,
	rhs: f64,
	kind: ConKind,
	row: &dyn fmt::Display,
) -> Result<f64, FlatError> {
	if body_ub.is_finite() {
		Ok(body_ub - rhs)
	} else {
		cvt.options().big_m().ok_or_else(|| FlatError::UnboundedBigM {
			con: kind.name(),
			detail: format!("the implied row '{row}' has no finite big-M; set cvt:bigm"),
		})
	}
}

/// Emit the big-M row for `bin_var == bin_val => body <= rhs` given a row
/// builder that attaches the relaxation term.
fn emit_relaxed<A: ModelApi>(
	cvt: &mut FlatConverter<A>,
	bin_var: VarId,
	bin_val: bool,
	m: f64,
	emit: impl FnOnce(&mut FlatConverter<A>, f64, VarId, f64) -> Result<(), FlatError>,
	rhs: f64,
) -> Result<(), FlatError> {
	if m <= 0.0 {
		// The row holds regardless of the trigger.
		return Ok(());
	}
	// bin_val = 1: body + M b <= rhs + M;  bin_val = 0: body - M b <= rhs.
	if bin_val {
		emit(cvt, m, bin_var, rhs + m)
	} else {
		emit(cvt, -m, bin_var, rhs)
	}
}

impl IndicatorLin {
	/// Create an indicator over a linear row.
	pub fn new(bin_var: VarId, bin_val: bool, con: LinCon) -> IndicatorLin {
		IndicatorLin {
			bin_var,
			bin_val,
			con,
		}
	}

	/// Big-M encoding of one `<=` side with the given body and rhs.
	fn convert_le_side<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		body: &LinTerms,
		rhs: f64,
	) -> Result<(), FlatError> {
		let (_, body_ub) = cvt.model().terms_bounds(body);
		let m = big_m_amount(cvt, body_ub, rhs, self.kind(), &self.con)?;
		emit_relaxed(
			cvt,
			self.bin_var,
			self.bin_val,
			m,
			|cvt, coef, bin, new_rhs| {
				let mut row = body.clone();
				row.push(coef, bin);
				let _ = cvt.add_constraint(LinCon::le(row, new_rhs))?;
				Ok(())
			},
			rhs,
		)
	}
}

impl ConSpec for IndicatorLin {
	const CLASS: ConClass = ConClass::IndicatorLin;

	fn arg_vars(&self) -> Vec<VarId> {
		let mut vars = vec![self.bin_var];
		vars.extend_from_slice(self.con.body.vars());
		vars
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::IndicatorLin(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.ind_lins
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.ind_lins
	}

	fn kind(&self) -> ConKind {
		match self.con.sense {
			ConSense::Le => ConKind::IndLinLe,
			ConSense::Eq => ConKind::IndLinEq,
			ConSense::Ge => ConKind::IndLinGe,
		}
	}
}

impl Convert for IndicatorLin {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_index: usize,
	) -> Result<(), FlatError> {
		match self.con.sense {
			ConSense::Le => self.convert_le_side(cvt, &self.con.body, self.con.rhs),
			ConSense::Ge => {
				let mut negated = self.con.body.clone();
				negated.negate();
				self.convert_le_side(cvt, &negated, -self.con.rhs)
			},
			ConSense::Eq => {
				self.convert_le_side(cvt, &self.con.body, self.con.rhs)?;
				let mut negated = self.con.body.clone();
				negated.negate();
				self.convert_le_side(cvt, &negated, -self.con.rhs)
			},
		}
	}
}

impl fmt::Display for IndicatorLin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"x{}=={} ==> ({})",
			self.bin_var.index(),
			self.bin_val as i32,
			self.con
		)
	}
}

impl IndicatorQuad {
	/// Create an indicator over a quadratic row.
	pub fn new(bin_var: VarId, bin_val: bool, con: QuadCon) -> IndicatorQuad {
		IndicatorQuad {
			bin_var,
			bin_val,
			con,
		}
	}

	/// Big-M encoding of one `<=` side with the given body parts and rhs.
	fn convert_le_side<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		linear: &LinTerms,
		quad: &QuadTerms,
		rhs: f64,
	) -> Result<(), FlatError> {
		let (_, lin_ub) = cvt.model().terms_bounds(linear);
		let (_, quad_ub) = cvt.model().quad_terms_bounds(quad);
		let m = big_m_amount(cvt, lin_ub + quad_ub, rhs, self.kind(), &self.con)?;
		emit_relaxed(
			cvt,
			self.bin_var,
			self.bin_val,
			m,
			|cvt, coef, bin, new_rhs| {
				let mut row = linear.clone();
				row.push(coef, bin);
				let _ = cvt.add_constraint(QuadCon::le(row, quad.clone(), new_rhs))?;
				Ok(())
			},
			rhs,
		)
	}
}

impl ConSpec for IndicatorQuad {
	const CLASS: ConClass = ConClass::IndicatorQuad;

	fn arg_vars(&self) -> Vec<VarId> {
		let mut vars = vec![self.bin_var];
		vars.extend(self.con.body_vars());
		vars
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::IndicatorQuad(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.ind_quads
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.ind_quads
	}

	fn kind(&self) -> ConKind {
		match self.con.sense {
			ConSense::Le => ConKind::IndQuadLe,
			ConSense::Eq => ConKind::IndQuadEq,
			ConSense::Ge => ConKind::IndQuadGe,
		}
	}
}

impl Convert for IndicatorQuad {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_index: usize,
	) -> Result<(), FlatError> {
		match self.con.sense {
			ConSense::Le => self.convert_le_side(cvt, &self.con.linear, &self.con.quad, self.con.rhs),
			ConSense::Ge => {
				let mut linear = self.con.linear.clone();
				linear.negate();
				let quad = negate_quad(self.con.quad.clone());
				self.convert_le_side(cvt, &linear, &quad, -self.con.rhs)
			},
			ConSense::Eq => {
				self.convert_le_side(cvt, &self.con.linear, &self.con.quad, self.con.rhs)?;
				let mut linear = self.con.linear.clone();
				linear.negate();
				let quad = negate_quad(self.con.quad.clone());
				self.convert_le_side(cvt, &linear, &quad, -self.con.rhs)
			},
		}
	}
}

/// Negate every quadratic coefficient.
fn negate_quad(quad: QuadTerms) -> QuadTerms {
	let mut out = QuadTerms::new();
	for (c, v1, v2) in quad.iter() {
		out.push(-c, v1, v2);
	}
	out
}

impl fmt::Display for IndicatorQuad {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"x{}=={} ==> ({})",
			self.bin_var.index(),
			self.bin_val as i32,
			self.con
		)
	}
}
