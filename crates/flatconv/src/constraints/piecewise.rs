//! Piecewise-linear constraints: the breakpoint form, adaptive sampling of
//! smooth functions, and the lambda-method SOS2 reformulation.

use std::{
	fmt,
	hash::{Hash, Hasher},
};

use itertools::Itertools;

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{algebraic::LinCon, sos::Sos2Con, ConClass, ConItem, ConSpec, Convert, Functional},
	converter::FlatConverter,
	error::FlatError,
	expr::LinTerms,
	helpers::hash_f64_slice,
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
	value_graph::Aggregation,
};

#[derive(Clone, Debug, PartialEq)]
/// Breakpoints of a piecewise-linear function, with strictly increasing
/// abscissae.
pub struct PlPoints {
	/// Abscissae, strictly increasing.
	pub x: Vec<f64>,
	/// Ordinates, parallel to `x`.
	pub y: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = pl(x)` defined by breakpoints.
pub struct PlCon {
	/// The breakpoints.
	pub points: PlPoints,
	/// The argument variable.
	pub arg: VarId,
}

/// Maximum bisection depth of the adaptive sampler; at 2^24 segments the
/// interval arithmetic itself dominates any further error.
const MAX_SAMPLE_DEPTH: u32 = 24;

/// Sample a smooth function into breakpoints whose secants stay within the
/// given relative tolerance of the function.
pub fn sample_function(
	f: impl Fn(f64) -> f64,
	lo: f64,
	hi: f64,
	reltol: f64,
) -> PlPoints {
	/// Recursive bisection: keep the segment when its midpoint error is
	/// within tolerance, split it otherwise.
	fn refine(
		f: &impl Fn(f64) -> f64,
		x0: f64,
		y0: f64,
		x1: f64,
		y1: f64,
		reltol: f64,
		depth: u32,
		out_x: &mut Vec<f64>,
		out_y: &mut Vec<f64>,
	) {
		let xm = 0.5 * (x0 + x1);
		let ym = f(xm);
		let secant = 0.5 * (y0 + y1);
		if depth == 0 || (secant - ym).abs() <= reltol * ym.abs().max(1.0) {
			out_x.push(x1);
			out_y.push(y1);
		} else {
			refine(f, x0, y0, xm, ym, reltol, depth - 1, out_x, out_y);
			refine(f, xm, ym, x1, y1, reltol, depth - 1, out_x, out_y);
		}
	}

	debug_assert!(lo < hi);
	let (ylo, yhi) = (f(lo), f(hi));
	let mut out_x = vec![lo];
	let mut out_y = vec![ylo];
	refine(
		&f,
		lo,
		ylo,
		hi,
		yhi,
		reltol,
		MAX_SAMPLE_DEPTH,
		&mut out_x,
		&mut out_y,
	);
	PlPoints::new(out_x, out_y)
}

impl PlPoints {
	/// Interpolated value at `x` within the breakpoint range.
	pub fn eval(&self, x: f64) -> f64 {
		debug_assert!(x >= self.x[0] && x <= self.x[self.x.len() - 1]);
		let k = self.x.partition_point(|&bx| bx < x).max(1);
		let (x0, x1) = (self.x[k - 1], self.x[k]);
		let (y0, y1) = (self.y[k - 1], self.y[k]);
		y0 + (y1 - y0) * (x - x0) / (x1 - x0)
	}

	/// Number of breakpoints.
	pub fn len(&self) -> usize {
		self.x.len()
	}

	/// Whether there are no breakpoints.
	pub fn is_empty(&self) -> bool {
		self.x.is_empty()
	}

	/// Create breakpoints; abscissae must be strictly increasing.
	pub fn new(x: Vec<f64>, y: Vec<f64>) -> PlPoints {
		assert_eq!(x.len(), y.len(), "breakpoints need one ordinate per abscissa");
		assert!(x.len() >= 2, "a piecewise-linear function needs at least two breakpoints");
		assert!(
			x.windows(2).all(|w| w[0] < w[1]),
			"breakpoint abscissae must be strictly increasing"
		);
		PlPoints { x, y }
	}

	/// Range of the ordinates.
	pub fn y_bounds(&self) -> (f64, f64) {
		let lb = self.y.iter().copied().fold(f64::INFINITY, f64::min);
		let ub = self.y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
		(lb, ub)
	}
}

impl Eq for PlPoints {}

impl Hash for PlPoints {
	fn hash<H: Hasher>(&self, state: &mut H) {
		hash_f64_slice(state, &self.x);
		hash_f64_slice(state, &self.y);
	}
}

impl PlCon {
	/// Create a piecewise-linear constraint.
	pub fn new(points: PlPoints, arg: VarId) -> PlCon {
		PlCon { points, arg }
	}
}

impl ConSpec for PlCon {
	const CLASS: ConClass = ConClass::Pl;

	fn arg_vars(&self) -> Vec<VarId> {
		vec![self.arg]
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::Pl(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.pls
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.pls
	}

	fn kind(&self) -> ConKind {
		ConKind::Pl
	}
}

impl Convert for PlCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		// Lambda method: one multiplier per breakpoint, convex combination
		// rows for the argument and the result, SOS2 adjacency over the
		// multipliers with the breakpoint ordinals as weights.
		cvt.set_link_aggregation(Aggregation::Sum);
		let r = cvt.result_var_of::<Self>(index);
		let n = self.points.len();
		let lambdas: Vec<VarId> = (0..n)
			.map(|_| cvt.add_var(0.0, 1.0, VarType::Continuous))
			.collect::<Result<_, _>>()?;

		let convexity: LinTerms = lambdas.iter().map(|&l| (1.0, l)).collect();
		let _ = cvt.add_constraint(LinCon::eq(convexity, 1.0))?;

		let mut arg_row = LinTerms::single(1.0, self.arg);
		for (&l, &bx) in lambdas.iter().zip(&self.points.x) {
			if bx != 0.0 {
				arg_row.push(-bx, l);
			}
		}
		let _ = cvt.add_constraint(LinCon::eq(arg_row, 0.0))?;

		let mut result_row = LinTerms::single(1.0, r);
		for (&l, &by) in lambdas.iter().zip(&self.points.y) {
			if by != 0.0 {
				result_row.push(-by, l);
			}
		}
		let _ = cvt.add_constraint(LinCon::eq(result_row, 0.0))?;

		let weights = (1..=n).map(|k| k as f64).collect();
		let _ = cvt.add_constraint(Sos2Con::new(lambdas, weights).with_sum_range(1.0, 1.0))?;
		Ok(())
	}
}

impl Functional for PlCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		if model.is_fixed(self.arg) {
			let x = model.fixed_value(self.arg);
			if x >= self.points.x[0] && x <= self.points.x[self.points.len() - 1] {
				return Some(self.points.eval(x));
			}
		}
		None
	}

	fn result_bounds(&self, _model: &FlatModel) -> (f64, f64, VarType) {
		let (lb, ub) = self.points.y_bounds();
		(lb, ub, VarType::Continuous)
	}
}

impl fmt::Display for PlCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"pl({})(x{})",
			self.points
				.x
				.iter()
				.zip(&self.points.y)
				.map(|(bx, by)| format!("({bx}, {by})"))
				.join(", "),
			self.arg.index()
		)
	}
}

#[cfg(test)]
mod tests {
	use crate::constraints::piecewise::{sample_function, PlPoints};

	#[test]
	fn test_interpolation() {
		let points = PlPoints::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.0]);
		assert_eq!(points.eval(0.5), 0.5);
		assert_eq!(points.eval(1.0), 1.0);
		assert_eq!(points.eval(1.5), 0.5);
		assert_eq!(points.eval(2.0), 0.0);
	}

	#[test]
	fn test_sampling_respects_tolerance() {
		let tol = 1e-5;
		let points = sample_function(f64::exp, 0.0, 1.0, tol);
		assert!(points.len() > 2);
		// The sampled approximation must track exp within a small multiple
		// of the relative tolerance everywhere, not just at the probes.
		let n = 10_000;
		for i in 0..=n {
			let x = i as f64 / n as f64;
			let approx = points.eval(x);
			let exact = x.exp();
			assert!(
				(approx - exact).abs() <= 2.0 * tol * exact.abs().max(1.0),
				"error too large at {x}: {approx} vs {exact}"
			);
		}
	}

	#[test]
	fn test_sampling_of_linear_function_is_two_points() {
		let points = sample_function(|x| 3.0 * x + 1.0, -1.0, 1.0, 1e-5);
		assert_eq!(points.len(), 2);
	}

	#[test]
	#[should_panic(expected = "strictly increasing")]
	fn test_decreasing_abscissae_rejected() {
		let _ = PlPoints::new(vec![0.0, 0.0], vec![1.0, 2.0]);
	}
}
