//! Per-type constraint pools.

use std::{collections::HashMap, hash::Hash};

use crate::{
	context::Context,
	error::FlatError,
	model::VarId,
	value_graph::{NodeId, NodeRange},
};

#[derive(Clone, Debug)]
/// An append-only pool of constraints of one type.
///
/// Indices are stable for the model's lifetime: rewriting an item marks it
/// as bridged instead of removing it, so the pool's value node keeps one
/// entry per item ever stored. Functional types additionally keep a dedup
/// map from constraint structure to index for common-subexpression reuse.
pub struct Keeper<C> {
	/// Whether each item has been rewritten and is no longer live.
	bridged: Vec<bool>,
	/// Usage context per item.
	contexts: Vec<Context>,
	/// Conversion cursor: items before it have already been offered for
	/// conversion in an earlier pass.
	cvt_cursor: usize,
	/// Items in insertion order.
	items: Vec<C>,
	/// Dedup map, present for functional types only.
	map: Option<HashMap<C, usize>>,
	/// Number of items received from the flattener, set when model input
	/// ends.
	n_input: usize,
	/// Type name, for diagnostics.
	name: &'static str,
	/// The pool's value node.
	node: NodeId,
	/// Result variable per item, set for functional constraints.
	results: Vec<Option<VarId>>,
}

impl<C: Clone + Eq + Hash> Keeper<C> {
	/// Append a constraint, returning its index.
	///
	/// For mapped types the constraint must not already be present;
	/// callers look the map up first, so a hit here is an internal defect.
	pub fn add(&mut self, con: C) -> Result<usize, FlatError> {
		let index = self.items.len();
		if let Some(map) = &mut self.map {
			if map.insert(con.clone(), index).is_some() {
				return Err(FlatError::DuplicateMapInsert { keeper: self.name });
			}
		}
		self.items.push(con);
		self.bridged.push(false);
		self.contexts.push(Context::None);
		self.results.push(None);
		Ok(index)
	}

	/// Usage context of an item.
	pub fn context(&self, index: usize) -> Context {
		self.contexts[index]
	}

	/// The conversion cursor.
	pub fn cursor(&self) -> usize {
		self.cvt_cursor
	}

	/// Mark the end of flattener input.
	pub fn freeze_input(&mut self) {
		self.n_input = self.items.len();
	}

	/// The item at `index`.
	pub fn get(&self, index: usize) -> &C {
		&self.items[index]
	}

	/// Whether the pool holds no items at all.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Whether an item has been rewritten.
	pub fn is_bridged(&self, index: usize) -> bool {
		self.bridged[index]
	}

	/// Total number of items ever stored.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Indices and items that have not been rewritten.
	pub fn live(&self) -> impl Iterator<Item = (usize, &C)> + '_ {
		self.items
			.iter()
			.enumerate()
			.filter(|&(i, _)| !self.bridged[i])
	}

	/// Look up a structurally equal constraint.
	pub fn map_find(&self, con: &C) -> Option<usize> {
		self.map.as_ref()?.get(con).copied()
	}

	/// Mark an item as rewritten, removing it from the dedup map.
	pub fn mark_bridged(&mut self, index: usize) {
		debug_assert!(!self.bridged[index]);
		self.bridged[index] = true;
		if let Some(map) = &mut self.map {
			let _ = map.remove(&self.items[index]);
		}
	}

	/// Raise an item's context, returning the merged value.
	pub fn merge_context(&mut self, index: usize, ctx: Context) -> Context {
		self.contexts[index] = self.contexts[index].merge(ctx);
		self.contexts[index]
	}

	/// Number of items received from the flattener.
	pub fn n_input(&self) -> usize {
		self.n_input
	}

	/// Type name of the pool.
	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Create an empty pool using the given value node.
	pub fn new(name: &'static str, mapped: bool, node: NodeId) -> Keeper<C> {
		Keeper {
			bridged: Vec::new(),
			contexts: Vec::new(),
			cvt_cursor: 0,
			items: Vec::new(),
			map: mapped.then(HashMap::new),
			n_input: 0,
			name,
			node,
			results: Vec::new(),
		}
	}

	/// The pool's value node.
	pub fn node(&self) -> NodeId {
		self.node
	}

	/// The value-node range of one item.
	pub fn node_range(&self, index: usize) -> NodeRange {
		debug_assert!(index < self.items.len());
		NodeRange {
			node: self.node,
			first: index,
			len: 1,
		}
	}

	/// Number of live items.
	pub fn num_live(&self) -> usize {
		self.bridged.iter().filter(|&&b| !b).count()
	}

	/// Result variable of an item, if assigned.
	pub fn result(&self, index: usize) -> Option<VarId> {
		self.results[index]
	}

	/// Move the conversion cursor.
	pub fn set_cursor(&mut self, cursor: usize) {
		self.cvt_cursor = cursor;
	}

	/// Assign the result variable of an item.
	pub fn set_result(&mut self, index: usize, var: VarId) {
		self.results[index] = Some(var);
	}
}

#[cfg(test)]
mod tests {
	use crate::{error::FlatError, keeper::Keeper, model::VarId, value_graph::NodeId};

	#[test]
	fn test_duplicate_map_insert_is_a_defect() {
		let mut k: Keeper<(VarId, VarId)> = Keeper::new("PairCon", true, NodeId::from_usize(0));
		let con = (VarId::from_usize(0), VarId::from_usize(1));
		let i = k.add(con).unwrap();
		assert_eq!(k.map_find(&con), Some(i));
		assert!(matches!(
			k.add(con),
			Err(FlatError::DuplicateMapInsert { keeper: "PairCon" })
		));
	}

	#[test]
	fn test_bridging_clears_the_map() {
		let mut k: Keeper<(VarId, VarId)> = Keeper::new("PairCon", true, NodeId::from_usize(0));
		let con = (VarId::from_usize(0), VarId::from_usize(1));
		let i = k.add(con).unwrap();
		k.mark_bridged(i);
		assert_eq!(k.map_find(&con), None);
		assert_eq!(k.num_live(), 0);
		assert_eq!(k.len(), 1);
		// The slot is reusable for a structurally equal item.
		let j = k.add(con).unwrap();
		assert_ne!(i, j);
	}

	#[test]
	fn test_unmapped_pool_accepts_duplicates() {
		let mut k: Keeper<(VarId, VarId)> = Keeper::new("PairCon", false, NodeId::from_usize(0));
		let con = (VarId::from_usize(2), VarId::from_usize(2));
		let _ = k.add(con).unwrap();
		let _ = k.add(con).unwrap();
		assert_eq!(k.num_live(), 2);
		assert_eq!(k.map_find(&con), None);
	}
}
