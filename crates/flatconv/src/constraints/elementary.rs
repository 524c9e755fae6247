//! Elementary nonlinear functions of one variable.
//!
//! Solvers with native general-function support take these as-is; everyone
//! else gets a piecewise-linear approximation sampled adaptively on the
//! argument's bound interval.

use std::{
	fmt,
	hash::{Hash, Hasher},
};

use crate::{
	acceptance::ConKind,
	api::ModelApi,
	constraints::{
		piecewise::{sample_function, PlCon},
		ConClass, ConItem, ConSpec, Convert, Functional,
	},
	context::Context,
	converter::FlatConverter,
	error::FlatError,
	helpers::hash_f64,
	keeper::Keeper,
	model::{FlatModel, VarId, VarType},
	options::ConvertOptions,
};

#[derive(Clone, Copy, Debug, PartialEq)]
/// The supported elementary functions, with their constant parameters.
pub enum ElemFunc {
	/// `cos(x)`
	Cos,
	/// `e^x`
	Exp,
	/// `a^x` for a constant positive base.
	ExpA(f64),
	/// `ln(x)`
	Log,
	/// `log_a(x)` for a constant base.
	LogA(f64),
	/// `x^p` for a constant exponent.
	Pow(f64),
	/// `sin(x)`
	Sin,
	/// `tan(x)`
	Tan,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// `r = f(x)` for an elementary function `f`.
pub struct ElemFuncCon {
	/// The applied function.
	pub func: ElemFunc,
	/// The argument variable.
	pub arg: VarId,
}

impl ElemFunc {
	/// Result bounds over an argument interval.
	pub fn bounds(self, lb: f64, ub: f64) -> (f64, f64) {
		match self {
			ElemFunc::Exp => (lb.exp(), ub.exp()),
			ElemFunc::ExpA(_) => {
				let (y0, y1) = (self.eval(lb), self.eval(ub));
				(y0.min(y1), y0.max(y1))
			},
			ElemFunc::Log => {
				if ub <= 0.0 {
					return (f64::NEG_INFINITY, f64::INFINITY);
				}
				let lo = if lb > 0.0 {
					lb.ln()
				} else {
					f64::NEG_INFINITY
				};
				(lo, ub.ln())
			},
			ElemFunc::LogA(a) => {
				let (nlo, nhi) = ElemFunc::Log.bounds(lb, ub);
				let scale = 1.0 / a.ln();
				if scale >= 0.0 {
					(nlo * scale, nhi * scale)
				} else {
					(nhi * scale, nlo * scale)
				}
			},
			ElemFunc::Pow(p) => {
				let lo = if p.fract() != 0.0 { lb.max(0.0) } else { lb };
				let mut candidates = vec![self.eval(lo), self.eval(ub)];
				if lo < 0.0 && ub > 0.0 {
					candidates.push(self.eval(0.0));
				}
				candidates.retain(|v| !v.is_nan());
				let min = candidates.iter().copied().fold(f64::INFINITY, f64::min);
				let max = candidates
					.iter()
					.copied()
					.fold(f64::NEG_INFINITY, f64::max);
				(min, max)
			},
			ElemFunc::Sin | ElemFunc::Cos => (-1.0, 1.0),
			ElemFunc::Tan => (f64::NEG_INFINITY, f64::INFINITY),
		}
	}

	/// Evaluate the function.
	pub fn eval(self, x: f64) -> f64 {
		match self {
			ElemFunc::Cos => x.cos(),
			ElemFunc::Exp => x.exp(),
			ElemFunc::ExpA(a) => a.powf(x),
			ElemFunc::Log => x.ln(),
			ElemFunc::LogA(a) => x.ln() / a.ln(),
			ElemFunc::Pow(p) => x.powf(p),
			ElemFunc::Sin => x.sin(),
			ElemFunc::Tan => x.tan(),
		}
	}

	/// Acceptance kind of the function.
	pub fn kind(self) -> ConKind {
		match self {
			ElemFunc::Cos => ConKind::Cos,
			ElemFunc::Exp => ConKind::Exp,
			ElemFunc::ExpA(_) => ConKind::ExpA,
			ElemFunc::Log => ConKind::Log,
			ElemFunc::LogA(_) => ConKind::LogA,
			ElemFunc::Pow(_) => ConKind::Pow,
			ElemFunc::Sin => ConKind::Sin,
			ElemFunc::Tan => ConKind::Tan,
		}
	}
}

impl Eq for ElemFunc {}

impl Hash for ElemFunc {
	fn hash<H: Hasher>(&self, state: &mut H) {
		std::mem::discriminant(self).hash(state);
		match self {
			ElemFunc::ExpA(a) | ElemFunc::LogA(a) | ElemFunc::Pow(a) => hash_f64(state, *a),
			_ => {},
		}
	}
}

impl ElemFuncCon {
	/// Create an elementary function constraint.
	pub fn new(func: ElemFunc, arg: VarId) -> ElemFuncCon {
		ElemFuncCon { func, arg }
	}
}

impl ConSpec for ElemFuncCon {
	const CLASS: ConClass = ConClass::ElemFunc;
	const MAPPED: bool = true;

	fn arg_vars(&self) -> Vec<VarId> {
		vec![self.arg]
	}

	fn into_item(self, result: Option<VarId>) -> ConItem {
		ConItem::ElemFunc(self, result)
	}

	fn keeper(model: &FlatModel) -> &Keeper<Self> {
		&model.elem_funcs
	}

	fn keeper_mut(model: &mut FlatModel) -> &mut Keeper<Self> {
		&mut model.elem_funcs
	}

	fn kind(&self) -> ConKind {
		self.func.kind()
	}
}

impl Convert for ElemFuncCon {
	fn convert<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		index: usize,
	) -> Result<(), FlatError> {
		let r = cvt.result_var_of::<Self>(index);
		let (lo, hi) = cvt.var_bounds(self.arg);
		if !lo.is_finite() || !hi.is_finite() {
			return Err(FlatError::UnboundedBigM {
				con: self.kind().name(),
				detail: format!(
					"piecewise-linear approximation needs finite bounds on x{}",
					self.arg.index()
				),
			});
		}
		if lo == hi {
			return cvt.narrow_var_bounds(r, self.func.eval(lo), self.func.eval(lo));
		}
		let func = self.func;
		let points = sample_function(
			|x| func.eval(x),
			lo,
			hi,
			cvt.options().pl_approx_reltol(),
		);
		let _ = cvt.add_with_result(PlCon::new(points, self.arg), r)?;
		Ok(())
	}

	fn propagate_result<A: ModelApi>(
		&self,
		cvt: &mut FlatConverter<A>,
		lb: f64,
		ub: f64,
		_ctx: Context,
	) -> Result<(), FlatError> {
		// Invert the monotone functions; leave the rest to their own bounds.
		let (alb, aub) = match self.func {
			ElemFunc::Exp => (
				if lb > 0.0 { lb.ln() } else { f64::NEG_INFINITY },
				if ub.is_finite() && ub > 0.0 {
					ub.ln()
				} else {
					f64::INFINITY
				},
			),
			ElemFunc::Log => (lb.exp(), ub.exp()),
			_ => (f64::NEG_INFINITY, f64::INFINITY),
		};
		cvt.propagate_result_of_init_expr(self.arg, alb, aub, Context::Mixed)
	}
}

impl Functional for ElemFuncCon {
	fn fold_constant(&self, model: &FlatModel, _opts: &ConvertOptions) -> Option<f64> {
		if model.is_fixed(self.arg) {
			let v = self.func.eval(model.fixed_value(self.arg));
			if v.is_finite() {
				return Some(v);
			}
		}
		None
	}

	fn result_bounds(&self, model: &FlatModel) -> (f64, f64, VarType) {
		let (lb, ub) = model.var_bounds(self.arg);
		let (rlb, rub) = self.func.bounds(lb, ub);
		(rlb, rub, VarType::Continuous)
	}
}

impl fmt::Display for ElemFuncCon {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let x = self.arg.index();
		match self.func {
			ElemFunc::Cos => write!(f, "cos(x{x})"),
			ElemFunc::Exp => write!(f, "exp(x{x})"),
			ElemFunc::ExpA(a) => write!(f, "expa({a}, x{x})"),
			ElemFunc::Log => write!(f, "log(x{x})"),
			ElemFunc::LogA(a) => write!(f, "loga({a}, x{x})"),
			ElemFunc::Pow(p) => write!(f, "pow(x{x}, {p})"),
			ElemFunc::Sin => write!(f, "sin(x{x})"),
			ElemFunc::Tan => write!(f, "tan(x{x})"),
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::constraints::elementary::ElemFunc;

	#[test]
	fn test_exp_bounds() {
		let (lb, ub) = ElemFunc::Exp.bounds(0.0, 1.0);
		assert_eq!(lb, 1.0);
		assert_eq!(ub, std::f64::consts::E);
		let (lb, _) = ElemFunc::Exp.bounds(f64::NEG_INFINITY, 0.0);
		assert_eq!(lb, 0.0);
	}

	#[test]
	fn test_log_bounds() {
		let (lb, ub) = ElemFunc::Log.bounds(0.0, 1.0);
		assert_eq!(lb, f64::NEG_INFINITY);
		assert_eq!(ub, 0.0);
	}

	#[test]
	fn test_pow_even_exponent_covers_zero() {
		let (lb, ub) = ElemFunc::Pow(2.0).bounds(-2.0, 3.0);
		assert_eq!(lb, 0.0);
		assert_eq!(ub, 9.0);
	}

	#[test]
	fn test_expa_decreasing_base() {
		let (lb, ub) = ElemFunc::ExpA(0.5).bounds(0.0, 2.0);
		assert_eq!(lb, 0.25);
		assert_eq!(ub, 1.0);
	}
}
