//! Special-ordered-set constraints and their MIP encodings.

use std::{
	fmt,
	hash::{Hash, Hasher},
};

use itertools::Itertools;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{algebraic::LinCon, ConClass, ConItem, ConSpec, Convert},
	converter::FlatConverter,
	error::FlatError,
	expr::LinTerms,
	helpers::{hash_f64, hash_f64_slice},
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
};

#[derive(Clone, Debug, PartialEq)]
/// SOS1: at most one member may be nonzero.
pub struct Sos1Con {
	/// Members, sorted by weight.
	vars: Vec<VarId>,
	/// Weights, sorted and unique.
	weights: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
/// SOS2: at most two members may be nonzero, and they must be adjacent in
/// weight order.
pub struct Sos2Con {
	/// Bounds on the sum of members, when the flattener knows them.
	sum_range: Option<(f64, f64)>,
	/// Members, sorted by weight.
	vars: Vec<VarId>,
	/// Weights, sorted and unique.
	weights: Vec<f64>,
}

/// Sort members by weight, panicking on duplicate weights.
fn sort_by_weight(vars: Vec<VarId>, weights: Vec<f64>) -> (Vec<VarId>, Vec<f64>) {
	assert_eq!(
		vars.len(),
		weights.len(),
		"an SOS constraint needs one weight per member"
	);
	let mut paired: Vec<(f64, VarId)> = weights.into_iter().zip(vars).collect();
	paired.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("SOS weights must not be NaN"));
	assert!(
		paired.windows(2).all(|w| w[0].0 != w[1].0),
		"SOS weights must be unique"
	);
	let (weights, vars) = paired.into_iter().unzip();
	(vars, weights)
}

/// Finite member bound or the configured fallback, for the MIP encodings.
fn member_bound(value: f64, fallback: Option<f64>, kind: ConKind) -> Result<f64, FlatError> {
	if value.is_finite() {
		Ok(value)
	} else {
		fallback.ok_or_else(|| FlatError::UnboundedBigM {
			con: kind.name(),
			detail: "the MIP encoding needs finite bounds on every member".to_string(),
		})
	}
}

impl Sos1Con {
	/// Create an SOS1 constraint; members are sorted by weight.
	pub fn new(vars: Vec<VarId>, weights: Vec<f64>) -> Sos1Con {
		let (vars, weights) = sort_by_weight(vars, weights);
		Sos1Con { vars, weights }
	}

	/// Members, sorted by weight.
	pub fn vars(&self) -> &[VarId] {
		&self.vars
	}

	/// Weights, sorted.
	pub fn weights(&self) -> &[f64] {
		&self.weights
	}
}

impl ConSpec for Sos1Con {
	const CLASS: ConClass = ConClass::Sos1;

	fn arg_vars(&self) -> Vec<VarId> {
		self.vars.clone()
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::Sos1(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.sos1s
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.sos1s
	}

	fn kind(&self) -> ConKind {
		ConKind::Sos1
	}
}

impl Convert for Sos1Con {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_index: usize,
	) -> Result<(), FlatError> {
		// One selector binary per member; a nonzero member needs its
		// selector, and at most one selector may be set.
		let mut selectors = LinTerms::new();
		for &x in &self.vars {
			let b = cvt.add_var(0.0, 1.0, VarType::Integer)?;
			selectors.push(1.0, b);
			let (xlb, xub) = cvt.var_bounds(x);
			if xub > 0.0 {
				let ub = member_bound(xub, cvt.options().big_m(), ConKind::Sos1)?;
				let mut row = LinTerms::single(1.0, x);
				row.push(-ub, b);
				let _ = cvt.add_constraint(LinCon::le(row, 0.0))?;
			}
			if xlb < 0.0 {
				let lb = member_bound(xlb, cvt.options().big_m().map(|m| -m), ConKind::Sos1)?;
				let mut row = LinTerms::single(1.0, x);
				row.push(-lb, b);
				let _ = cvt.add_constraint(LinCon::ge(row, 0.0))?;
			}
		}
		let _ = cvt.add_constraint(LinCon::le(selectors, 1.0))?;
		Ok(())
	}
}

impl Eq for Sos1Con {}

impl fmt::Display for Sos1Con {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"SOS1({})",
			self.vars
				.iter()
				.zip(&self.weights)
				.map(|(v, w)| format!("x{}:{}", v.index(), w))
				.join(", ")
		)
	}
}

impl Hash for Sos1Con {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.vars.hash(state);
		hash_f64_slice(state, &self.weights);
	}
}

impl Sos2Con {
	/// Create an SOS2 constraint; members are sorted by weight.
	pub fn new(vars: Vec<VarId>, weights: Vec<f64>) -> Sos2Con {
		let (vars, weights) = sort_by_weight(vars, weights);
		Sos2Con {
			sum_range: None,
			vars,
			weights,
		}
	}

	/// Attach bounds on the sum of the members.
	pub fn with_sum_range(mut self, lb: f64, ub: f64) -> Sos2Con {
		self.sum_range = Some((lb, ub));
		self
	}

	/// Members, sorted by weight.
	pub fn vars(&self) -> &[VarId] {
		&self.vars
	}

	/// Weights, sorted.
	pub fn weights(&self) -> &[f64] {
		&self.weights
	}
}

impl ConSpec for Sos2Con {
	const CLASS: ConClass = ConClass::Sos2;

	fn arg_vars(&self) -> Vec<VarId> {
		self.vars.clone()
	}

	fn into_item(self, _result: Option<VarId>) -> ConItem {
		ConItem::Sos2(self)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.sos2s
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.sos2s
	}

	fn kind(&self) -> ConKind {
		ConKind::Sos2
	}
}

impl Convert for Sos2Con {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		_index: usize,
	) -> Result<(), FlatError> {
		// One binary per adjacent segment; member k may be nonzero only when
		// one of its segments is active.
		let n = self.vars.len();
		if n < 2 {
			return Ok(());
		}
		let fallback = self.sum_range.map(|(_, ub)| ub).or(cvt.options().big_m());
		let segments: Vec<VarId> = (0..n - 1)
			.map(|_| cvt.add_var(0.0, 1.0, VarType::Integer))
			.collect::<Result<_, _>>()?;
		let one_of: LinTerms = segments.iter().map(|&z| (1.0, z)).collect();
		let _ = cvt.add_constraint(LinCon::eq(one_of, 1.0))?;
		for (k, &x) in self.vars.iter().enumerate() {
			let (xlb, xub) = cvt.var_bounds(x);
			if xub > 0.0 {
				let ub = member_bound(xub, fallback, ConKind::Sos2)?;
				let mut row = LinTerms::single(1.0, x);
				if k > 0 {
					row.push(-ub, segments[k - 1]);
				}
				if k < n - 1 {
					row.push(-ub, segments[k]);
				}
				let _ = cvt.add_constraint(LinCon::le(row, 0.0))?;
			}
			if xlb < 0.0 {
				let lb = member_bound(xlb, fallback.map(|m| -m), ConKind::Sos2)?;
				let mut row = LinTerms::single(1.0, x);
				if k > 0 {
					row.push(-lb, segments[k - 1]);
				}
				if k < n - 1 {
					row.push(-lb, segments[k]);
				}
				let _ = cvt.add_constraint(LinCon::ge(row, 0.0))?;
			}
		}
		Ok(())
	}
}

impl Eq for Sos2Con {}

impl fmt::Display for Sos2Con {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"SOS2({})",
			self.vars
				.iter()
				.zip(&self.weights)
				.map(|(v, w)| format!("x{}:{}", v.index(), w))
				.join(", ")
		)
	}
}

impl Hash for Sos2Con {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.vars.hash(state);
		hash_f64_slice(state, &self.weights);
		if let Some((lb, ub)) = self.sum_range {
			hash_f64(state, lb);
			hash_f64(state, ub);
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::{constraints::sos::Sos2Con, model::VarId};

	#[test]
	fn test_members_sorted_by_weight() {
		let sos = Sos2Con::new(
			vec![VarId::from_usize(5), VarId::from_usize(3), VarId::from_usize(4)],
			vec![2.0, 1.0, 3.0],
		);
		assert_eq!(
			sos.vars(),
			&[VarId::from_usize(3), VarId::from_usize(5), VarId::from_usize(4)]
		);
		assert_eq!(sos.weights(), &[1.0, 2.0, 3.0]);
		assert_eq!(sos.to_string(), "SOS2(x3:1, x5:2, x4:3)");
	}

	#[test]
	#[should_panic(expected = "unique")]
	fn test_duplicate_weights_rejected() {
		let _ = Sos2Con::new(
			vec![VarId::from_usize(0), VarId::from_usize(1)],
			vec![1.0, 1.0],
		);
	}
}
