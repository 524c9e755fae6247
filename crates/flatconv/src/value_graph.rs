//! The conversion value graph.
//!
//! Every family of model items (variables, objectives, each constraint pool)
//! owns a [`ValueNode`]: a growable array with one slot per item. During
//! conversion, links are recorded from each rewritten item to the items that
//! replace it. After the solver returns, the links are replayed backwards to
//! reconstruct solution values (duals, basis statuses, sensitivities) for
//! the items of the input model.
//!
//! The graph can also be exported as JSON Lines for debugging and
//! traceability (`tech:writegraph`).

use std::io::Write;

use index_vec::{define_index_type, IndexVec};
use serde::Serialize;

use crate::error::FlatError;

define_index_type! {
	/// Reference type for value nodes in a [`ValueGraph`].
	pub struct NodeId = u32;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
/// How a one-to-many link combines target values into its source value.
pub enum Aggregation {
	#[default]
	/// Sum the seeded target values.
	Sum,
	/// Take the first seeded target value.
	First,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A directed edge of the value graph, mapping target values back to source
/// values.
pub enum Link {
	/// Element-wise copy between ranges of equal length.
	Copy {
		/// The source range.
		src: NodeRange,
		/// The target range.
		dst: NodeRange,
	},
	/// One source entry generated several target entries.
	One2Many {
		/// The source entry (a range of length one).
		src: NodeRange,
		/// The target ranges.
		dst: Vec<NodeRange>,
		/// Backward combination rule.
		aggr: Aggregation,
	},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// A contiguous slice of a value node.
pub struct NodeRange {
	/// The node.
	pub node: NodeId,
	/// First entry of the slice.
	pub first: usize,
	/// Number of entries.
	pub len: usize,
}

#[derive(Clone, Debug, Default)]
/// Per-entry solution values for every node of a [`ValueGraph`].
///
/// Entries start unset; solver-provided values are seeded, after which
/// [`ValueGraph::transfer_backward`] fills in the entries of rewritten items.
pub struct NodeValues {
	/// Values per node, parallel to the graph's nodes.
	vals: IndexVec<NodeId, Vec<Option<f64>>>,
}

#[derive(Clone, Debug)]
/// A growable typed array with one scalar slot per item of one family.
pub struct ValueNode {
	/// Family name, used in diagnostics and the graph export.
	name: String,
	/// Number of entries.
	len: usize,
}

#[derive(Clone, Debug, Default)]
/// The DAG of value nodes and links built up during conversion.
pub struct ValueGraph {
	/// All nodes, one per item family.
	nodes: IndexVec<NodeId, ValueNode>,
	/// All links, in creation order.
	links: Vec<Link>,
}

#[derive(Serialize)]
/// One exported link, as a JSON line.
struct LinkLine {
	/// Link flavor.
	link: &'static str,
	/// Source range.
	src: RangeRepr,
	/// Target ranges.
	targets: Vec<RangeRepr>,
	#[serde(skip_serializing_if = "Option::is_none")]
	/// Aggregation of a one-to-many link.
	aggregation: Option<&'static str>,
}

#[derive(Serialize)]
/// One exported node, as a JSON line.
struct NodeLine<'a> {
	/// Node index.
	node: usize,
	/// Family name.
	name: &'a str,
	/// Number of entries.
	size: usize,
}

#[derive(Serialize)]
/// Serialized form of a [`NodeRange`].
struct RangeRepr {
	/// Node index.
	node: usize,
	/// First entry.
	first: usize,
	/// Number of entries.
	len: usize,
}

impl From<NodeRange> for RangeRepr {
	fn from(r: NodeRange) -> RangeRepr {
		RangeRepr {
			node: r.node.index(),
			first: r.first,
			len: r.len,
		}
	}
}

impl NodeRange {
	/// Whether the range covers exactly one entry.
	pub fn is_single(&self) -> bool {
		self.len == 1
	}

	/// Extend this range by an adjacent range of the same node.
	///
	/// Returns false (and leaves `self` unchanged) when the other range is
	/// not a direct continuation.
	pub fn try_extend(&mut self, other: &NodeRange) -> bool {
		if self.node == other.node && self.first + self.len == other.first {
			self.len += other.len;
			true
		} else {
			false
		}
	}
}

impl NodeValues {
	/// Value of one entry.
	pub fn get(&self, node: NodeId, index: usize) -> Option<f64> {
		self.vals[node].get(index).copied().flatten()
	}

	/// Create unset values shaped after the given graph.
	pub fn new(graph: &ValueGraph) -> NodeValues {
		NodeValues {
			vals: graph.nodes.iter().map(|n| vec![None; n.len]).collect(),
		}
	}

	/// All values of one node.
	pub fn node_slice(&self, node: NodeId) -> &[Option<f64>] {
		&self.vals[node]
	}

	/// Seed a node's leading entries with solver-provided values.
	pub fn seed(&mut self, node: NodeId, values: &[f64]) {
		for (slot, &v) in self.vals[node].iter_mut().zip(values) {
			*slot = Some(v);
		}
	}

	/// Seed a single entry.
	pub fn seed_at(&mut self, node: NodeId, index: usize, value: f64) {
		self.vals[node][index] = Some(value);
	}
}

impl ValueGraph {
	/// Register a new, empty node.
	pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
		self.nodes.push(ValueNode {
			name: name.into(),
			len: 0,
		})
	}

	/// Record a link from one source range to the given target ranges.
	///
	/// A single target of matching length becomes an element-wise copy;
	/// anything else becomes a one-to-many link with the given aggregation.
	/// A link without targets is dropped: the source item vanished without a
	/// trace in the final model (e.g. it was absorbed into variable bounds).
	pub fn add_link(&mut self, src: NodeRange, dst: Vec<NodeRange>, aggr: Aggregation) {
		if dst.is_empty() {
			return;
		}
		if dst.len() == 1 && dst[0].len == src.len {
			self.links.push(Link::Copy { src, dst: dst[0] });
		} else {
			self.links.push(Link::One2Many { src, dst, aggr });
		}
	}

	/// Export the graph as JSON Lines.
	pub fn export_json_lines(&self, w: &mut dyn Write) -> Result<(), FlatError> {
		for (id, node) in self.nodes.iter_enumerated() {
			let line = NodeLine {
				node: id.index(),
				name: &node.name,
				size: node.len,
			};
			serde_json::to_writer(&mut *w, &line).map_err(std::io::Error::from)?;
			writeln!(w)?;
		}
		for link in &self.links {
			let line = match link {
				Link::Copy { src, dst } => LinkLine {
					link: "copy",
					src: (*src).into(),
					targets: vec![(*dst).into()],
					aggregation: None,
				},
				Link::One2Many { src, dst, aggr } => LinkLine {
					link: "one2many",
					src: (*src).into(),
					targets: dst.iter().copied().map(Into::into).collect(),
					aggregation: Some(match aggr {
						Aggregation::Sum => "sum",
						Aggregation::First => "first",
					}),
				},
			};
			serde_json::to_writer(&mut *w, &line).map_err(std::io::Error::from)?;
			writeln!(w)?;
		}
		Ok(())
	}

	/// Grow a node by `by` entries, returning the appended range.
	pub fn extend(&mut self, node: NodeId, by: usize) -> NodeRange {
		let first = self.nodes[node].len;
		self.nodes[node].len += by;
		NodeRange {
			node,
			first,
			len: by,
		}
	}

	/// All links in creation order.
	pub fn links(&self) -> &[Link] {
		&self.links
	}

	/// Number of entries of a node.
	pub fn node_len(&self, node: NodeId) -> usize {
		self.nodes[node].len
	}

	/// Family name of a node.
	pub fn node_name(&self, node: NodeId) -> &str {
		&self.nodes[node].name
	}

	/// A range selecting one existing entry of a node.
	pub fn select(&self, node: NodeId, index: usize) -> NodeRange {
		debug_assert!(index < self.nodes[node].len);
		NodeRange {
			node,
			first: index,
			len: 1,
		}
	}

	/// Replay all links backwards, filling unset source entries from seeded
	/// target entries.
	pub fn transfer_backward(&self, vals: &mut NodeValues) {
		for link in self.links.iter().rev() {
			match link {
				Link::Copy { src, dst } => {
					for k in 0..src.len {
						if vals.get(src.node, src.first + k).is_none() {
							if let Some(v) = vals.get(dst.node, dst.first + k) {
								vals.seed_at(src.node, src.first + k, v);
							}
						}
					}
				},
				Link::One2Many { src, dst, aggr } => {
					debug_assert!(src.is_single());
					if vals.get(src.node, src.first).is_some() {
						continue;
					}
					let mut seeded = Vec::new();
					for r in dst {
						for k in 0..r.len {
							if let Some(v) = vals.get(r.node, r.first + k) {
								seeded.push(v);
							}
						}
					}
					let combined = match aggr {
						Aggregation::Sum => (!seeded.is_empty()).then(|| seeded.iter().sum()),
						Aggregation::First => seeded.first().copied(),
					};
					if let Some(v) = combined {
						vals.seed_at(src.node, src.first, v);
					}
				},
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::value_graph::{Aggregation, Link, NodeRange, NodeValues, ValueGraph};

	#[test]
	fn test_copy_link_transfer() {
		let mut g = ValueGraph::default();
		let a = g.add_node("a");
		let b = g.add_node("b");
		let src = g.extend(a, 2);
		let dst = g.extend(b, 2);
		g.add_link(src, vec![dst], Aggregation::Sum);
		assert!(matches!(g.links()[0], Link::Copy { .. }));

		let mut vals = NodeValues::new(&g);
		vals.seed(b, &[1.5, -2.0]);
		g.transfer_backward(&mut vals);
		assert_eq!(vals.get(a, 0), Some(1.5));
		assert_eq!(vals.get(a, 1), Some(-2.0));
	}

	#[test]
	fn test_one2many_sum_and_first() {
		let mut g = ValueGraph::default();
		let a = g.add_node("a");
		let b = g.add_node("b");
		let s0 = g.extend(a, 1);
		let s1 = g.extend(a, 1);
		let d0 = g.extend(b, 2);
		let d1 = g.extend(b, 2);
		g.add_link(s0, vec![d0], Aggregation::Sum);
		g.add_link(s1, vec![d1], Aggregation::First);

		let mut vals = NodeValues::new(&g);
		vals.seed(b, &[0.25, 0.5, 7.0, 8.0]);
		g.transfer_backward(&mut vals);
		assert_eq!(vals.get(a, 0), Some(0.75));
		assert_eq!(vals.get(a, 1), Some(7.0));
	}

	#[test]
	fn test_unseeded_targets_stay_unset() {
		let mut g = ValueGraph::default();
		let a = g.add_node("a");
		let b = g.add_node("b");
		let src = g.extend(a, 1);
		let dst = g.extend(b, 3);
		g.add_link(src, vec![dst], Aggregation::Sum);
		let mut vals = NodeValues::new(&g);
		g.transfer_backward(&mut vals);
		assert_eq!(vals.get(a, 0), None);
	}

	#[test]
	fn test_chained_links() {
		// a <- b <- c: the reverse replay must resolve b before a.
		let mut g = ValueGraph::default();
		let a = g.add_node("a");
		let b = g.add_node("b");
		let c = g.add_node("c");
		let ra = g.extend(a, 1);
		let rb = g.extend(b, 1);
		let rc = g.extend(c, 1);
		g.add_link(ra, vec![rb], Aggregation::Sum);
		g.add_link(rb, vec![rc], Aggregation::Sum);

		let mut vals = NodeValues::new(&g);
		vals.seed(c, &[4.0]);
		g.transfer_backward(&mut vals);
		assert_eq!(vals.get(a, 0), Some(4.0));
	}

	#[test]
	fn test_range_extension() {
		let mut r = NodeRange {
			node: 0usize.into(),
			first: 0,
			len: 2,
		};
		assert!(r.try_extend(&NodeRange {
			node: 0usize.into(),
			first: 2,
			len: 3,
		}));
		assert_eq!(r.len, 5);
		assert!(!r.try_extend(&NodeRange {
			node: 1usize.into(),
			first: 5,
			len: 1,
		}));
	}

	#[test]
	fn test_export_shape() {
		let mut g = ValueGraph::default();
		let a = g.add_node("vars");
		let b = g.add_node("rows");
		let src = g.extend(a, 1);
		let d0 = g.extend(b, 1);
		let d1 = g.extend(b, 1);
		g.add_link(src, vec![d0, d1], Aggregation::Sum);

		let mut out = Vec::new();
		g.export_json_lines(&mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines.len(), 3);
		assert_eq!(lines[0], r#"{"node":0,"name":"vars","size":1}"#);
		assert_eq!(lines[1], r#"{"node":1,"name":"rows","size":2}"#);
		assert_eq!(
			lines[2],
			r#"{"link":"one2many","src":{"node":0,"first":0,"len":1},"targets":[{"node":1,"first":0,"len":1},{"node":1,"first":1,"len":1}],"aggregation":"sum"}"#
		);
	}
}
