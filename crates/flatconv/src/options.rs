//! Configuration of the conversion pipeline.

use std::{collections::HashMap, path::PathBuf};

use crate::{
	acceptance::{Acceptance, ConKind},
	error::FlatError,
};

#[derive(Clone, Debug, Default)]
/// Options steering the conversion pipeline.
///
/// All options are reachable both through typed builder methods and through
/// the textual [`Self::set_option`] interface used by a driver's option
/// parser.
pub struct ConvertOptions {
	/// Per-kind acceptance overrides from `acc:<tag>` options.
	acc_overrides: HashMap<ConKind, Acceptance>,
	/// Fallback big-M constant for indicator linearization, `cvt:bigm`.
	big_m: Option<f64>,
	/// Comparison epsilon for strict comparisons on continuous expressions,
	/// `cvt:cmp:eps`.
	cmp_eps: Option<f64>,
	/// Relative tolerance of piecewise-linear approximation,
	/// `cvt:plapprox:reltol`.
	pl_approx_reltol: Option<f64>,
	/// Master preprocess switch, `cvt:pre:all`. On by default.
	preprocess_anything: Option<bool>,
	/// Preprocess reified equality with a binary variable, `cvt:pre:eqbinary`.
	preprocess_eq_binary: Option<bool>,
	/// Preprocess reified equality result bounds, `cvt:pre:eqresult`.
	preprocess_eq_result: Option<bool>,
	/// Relax integrality of all variables, `alg:relax`.
	relax: Option<bool>,
	/// Conversion graph export file, `tech:writegraph`.
	write_graph: Option<PathBuf>,
	/// Final model export file, `writeprob`. Written by the solver API.
	write_prob: Option<PathBuf>,
}

/// Parse a 0/1 option value.
fn parse_bool01(name: &str, value: &str) -> Result<bool, FlatError> {
	match value {
		"0" => Ok(false),
		"1" => Ok(true),
		_ => Err(FlatError::InvalidOption {
			name: name.to_string(),
			reason: format!("expected 0 or 1, got '{value}'"),
		}),
	}
}

/// Parse a positive floating-point option value.
fn parse_positive(name: &str, value: &str) -> Result<f64, FlatError> {
	match value.parse::<f64>() {
		Ok(v) if v > 0.0 => Ok(v),
		_ => Err(FlatError::InvalidOption {
			name: name.to_string(),
			reason: format!("expected a positive number, got '{value}'"),
		}),
	}
}

impl ConvertOptions {
	/// Default comparison epsilon.
	pub const DEFAULT_CMP_EPS: f64 = 1e-4;
	/// Default relative tolerance of piecewise-linear approximation.
	pub const DEFAULT_PL_APPROX_RELTOL: f64 = 1e-5;

	/// Resolved acceptance of a kind: the user override if set, otherwise the
	/// declared level.
	pub fn acceptance(&self, kind: ConKind, declared: Acceptance) -> Acceptance {
		self.acc_overrides.get(&kind).copied().unwrap_or(declared)
	}

	/// Fallback big-M constant, if configured.
	pub fn big_m(&self) -> Option<f64> {
		self.big_m
	}

	/// Comparison epsilon for strict comparisons on continuous expressions.
	pub fn cmp_eps(&self) -> f64 {
		self.cmp_eps.unwrap_or(Self::DEFAULT_CMP_EPS)
	}

	/// Whether any preprocessing is enabled together with the given sub-flag.
	pub fn can_preprocess(&self, sub: bool) -> bool {
		self.preprocess_anything() && sub
	}

	/// Relative tolerance of piecewise-linear approximation.
	pub fn pl_approx_reltol(&self) -> f64 {
		self.pl_approx_reltol
			.unwrap_or(Self::DEFAULT_PL_APPROX_RELTOL)
	}

	/// Master preprocess switch.
	pub fn preprocess_anything(&self) -> bool {
		self.preprocess_anything.unwrap_or(true)
	}

	/// Whether to recognize reified equalities against a binary variable.
	pub fn preprocess_eq_binary(&self) -> bool {
		self.can_preprocess(self.preprocess_eq_binary.unwrap_or(true))
	}

	/// Whether to presolve reified equality result bounds.
	pub fn preprocess_eq_result(&self) -> bool {
		self.can_preprocess(self.preprocess_eq_result.unwrap_or(true))
	}

	/// Whether to relax integrality of all variables.
	pub fn relax(&self) -> bool {
		self.relax.unwrap_or(false)
	}

	/// Set an option by its textual name.
	pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), FlatError> {
		if let Some(tag) = name.strip_prefix("acc:") {
			let Some(kind) = ConKind::from_tag(tag) else {
				return Err(FlatError::InvalidOption {
					name: name.to_string(),
					reason: format!("unknown constraint tag '{tag}'"),
				});
			};
			let level = match value {
				"0" => Acceptance::NotAccepted,
				"1" => Acceptance::AcceptedButNotRecommended,
				"2" => Acceptance::Recommended,
				_ => {
					return Err(FlatError::InvalidOption {
						name: name.to_string(),
						reason: format!("expected 0, 1 or 2, got '{value}'"),
					})
				},
			};
			let _ = self.acc_overrides.insert(kind, level);
			return Ok(());
		}
		match name {
			"alg:relax" => self.relax = Some(parse_bool01(name, value)?),
			"cvt:bigm" => self.big_m = Some(parse_positive(name, value)?),
			"cvt:cmp:eps" => self.cmp_eps = Some(parse_positive(name, value)?),
			"cvt:plapprox:reltol" => self.pl_approx_reltol = Some(parse_positive(name, value)?),
			"cvt:pre:all" => self.preprocess_anything = Some(parse_bool01(name, value)?),
			"cvt:pre:eqbinary" => self.preprocess_eq_binary = Some(parse_bool01(name, value)?),
			"cvt:pre:eqresult" => self.preprocess_eq_result = Some(parse_bool01(name, value)?),
			"tech:writegraph" => self.write_graph = Some(PathBuf::from(value)),
			"writeprob" => self.write_prob = Some(PathBuf::from(value)),
			_ => {
				return Err(FlatError::InvalidOption {
					name: name.to_string(),
					reason: "unknown option".to_string(),
				})
			},
		}
		Ok(())
	}

	/// Change the acceptance override of one constraint kind.
	pub fn with_acceptance(mut self, kind: ConKind, level: Acceptance) -> Self {
		let _ = self.acc_overrides.insert(kind, level);
		self
	}

	/// Change the fallback big-M constant.
	pub fn with_big_m(mut self, big_m: f64) -> Self {
		self.big_m = Some(big_m);
		self
	}

	/// Change the piecewise-linear approximation tolerance.
	pub fn with_pl_approx_reltol(mut self, reltol: f64) -> Self {
		self.pl_approx_reltol = Some(reltol);
		self
	}

	/// Change the master preprocess switch.
	pub fn with_preprocess(mut self, on: bool) -> Self {
		self.preprocess_anything = Some(on);
		self
	}

	/// Change whether to relax integrality.
	pub fn with_relax(mut self, relax: bool) -> Self {
		self.relax = Some(relax);
		self
	}

	/// Conversion graph export file, if requested.
	pub fn write_graph_file(&self) -> Option<&PathBuf> {
		self.write_graph.as_ref()
	}

	/// Final model export file, if requested.
	pub fn write_prob_file(&self) -> Option<&PathBuf> {
		self.write_prob.as_ref()
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		acceptance::{Acceptance, ConKind},
		error::FlatError,
		options::ConvertOptions,
	};

	#[test]
	fn test_acc_override() {
		let mut opts = ConvertOptions::default();
		opts.set_option("acc:max", "0").unwrap();
		assert_eq!(
			opts.acceptance(ConKind::Max, Acceptance::Recommended),
			Acceptance::NotAccepted
		);
		assert_eq!(
			opts.acceptance(ConKind::Min, Acceptance::Recommended),
			Acceptance::Recommended
		);
	}

	#[test]
	fn test_unknown_option() {
		let mut opts = ConvertOptions::default();
		assert!(matches!(
			opts.set_option("cvt:nosuch", "1"),
			Err(FlatError::InvalidOption { .. })
		));
		assert!(matches!(
			opts.set_option("acc:nosuch", "1"),
			Err(FlatError::InvalidOption { .. })
		));
	}

	#[test]
	fn test_out_of_range_value() {
		let mut opts = ConvertOptions::default();
		assert!(matches!(
			opts.set_option("alg:relax", "2"),
			Err(FlatError::InvalidOption { .. })
		));
		assert!(matches!(
			opts.set_option("acc:abs", "3"),
			Err(FlatError::InvalidOption { .. })
		));
		assert!(matches!(
			opts.set_option("cvt:plapprox:reltol", "-1"),
			Err(FlatError::InvalidOption { .. })
		));
	}

	#[test]
	fn test_preprocess_master_switch() {
		let mut opts = ConvertOptions::default();
		assert!(opts.preprocess_eq_result());
		opts.set_option("cvt:pre:all", "0").unwrap();
		assert!(!opts.preprocess_eq_result());
		assert!(!opts.preprocess_eq_binary());
	}

	#[test]
	fn test_defaults() {
		let opts = ConvertOptions::default();
		assert_eq!(opts.pl_approx_reltol(), 1e-5);
		assert_eq!(opts.cmp_eps(), 1e-4);
		assert_eq!(opts.big_m(), None);
		assert!(!opts.relax());
	}
}
