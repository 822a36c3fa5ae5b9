//! Deterministic array renaming for cache-friendly solver queries.
//!
//! Two constraint sets that are identical up to which concrete arrays they
//! talk about should hit the same solver cache entry. `AlphaBuilder` walks
//! an expression (or a whole set of them, in a fixed order) and replaces
//! every array it finds with a fresh `Alpha(0)`, `Alpha(1)`, ... array,
//! numbered by the order it is first encountered - so two isomorphic
//! queries alpha-rename to the exact same expression DAG regardless of
//! which concrete symbolic names or versions their arrays happened to
//! carry.

use crate::array::{Array, ArrayId, ArraySource};
use crate::expr::{Expr, ExprId, ExprKind};
use crate::update_list::{UpdateList, UpdateListId, UpdateNode};
use crate::visitor::{rewrite, Action, Visitor};
use std::collections::HashMap;

pub struct AlphaBuilder {
    renamed: HashMap<ArrayId, ArrayId>,
    next: u32,
}

impl AlphaBuilder {
    pub fn new() -> Self {
        Self { renamed: HashMap::new(), next: 0 }
    }

    /// Rename every array reachable from `id`, reusing this builder's
    /// numbering so repeated calls on related expressions stay consistent.
    pub fn rename(&mut self, id: ExprId) -> ExprId {
        rewrite(self, id)
    }

    /// Rename a whole expression set (e.g. a path's constraints) in one
    /// pass, so an array shared across several constraints gets a single
    /// consistent alpha index.
    pub fn rename_all(&mut self, ids: &[ExprId]) -> Vec<ExprId> {
        ids.iter().map(|&id| self.rename(id)).collect()
    }

    /// The array renaming performed so far, original id to alpha id.
    pub fn mapping(&self) -> &HashMap<ArrayId, ArrayId> {
        &self.renamed
    }

    fn alpha_for(&mut self, array: ArrayId) -> ArrayId {
        if let Some(&existing) = self.renamed.get(&array) {
            return existing;
        }
        let orig = Array::get(array);
        let index = self.next;
        self.next += 1;
        let new_id = Array::create(orig.size, orig.domain_width, orig.range_width, ArraySource::Alpha { index });
        self.renamed.insert(array, new_id);
        new_id
    }

    fn alpha_update_list(&mut self, list: UpdateListId) -> UpdateListId {
        match UpdateList::get(list).node {
            UpdateNode::Root(array) => UpdateList::root(self.alpha_for(array)),
            UpdateNode::Write { index, value, rest } => {
                let new_rest = self.alpha_update_list(rest);
                let new_index = self.rename(index);
                let new_value = self.rename(value);
                UpdateList::extend(new_rest, new_index, new_value)
            }
        }
    }
}

impl Default for AlphaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Visitor for AlphaBuilder {
    fn visit(&mut self, id: ExprId) -> Action {
        if let ExprKind::Read { updates, index } = Expr::get(id).kind {
            let new_updates = self.alpha_update_list(updates);
            let new_index = self.rename(index);
            let width = Expr::get(id).width;
            return Action::ChangeTo(crate::expr::intern_read(new_updates, new_index, width));
        }
        Action::DoChildren
    }
}

/// Convenience entry point: alpha-rename a whole set of expressions (e.g.
/// the constraints along a path) with one shared, fresh builder. The
/// result is suitable as a solver-cache fingerprint: two sets that are
/// isomorphic up to array identity rename to the identical expression
/// list.
pub fn alpha_rename_set(ids: &[ExprId]) -> Vec<ExprId> {
    let mut builder = AlphaBuilder::new();
    builder.rename_all(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{arith, constant_u64, reset_arena as reset_expr_arena, ArithOp};

    fn setup() {
        reset_expr_arena();
        crate::array::reset_arena();
        crate::update_list::reset_arena();
    }

    fn symbolic_array(name: &str) -> ArrayId {
        let size = constant_u64(32, 16);
        Array::create(size, 32, 8, ArraySource::MakeSymbolic { name: name.into(), version: 0 })
    }

    #[test]
    #[serial_test::serial]
    fn isomorphic_queries_rename_to_the_same_expression() {
        setup();
        let x = symbolic_array("x");
        let ux = UpdateList::root(x);
        let read_x = crate::expr::intern_read(ux, constant_u64(32, 0), 8);
        let e1 = arith(ArithOp::Add, read_x, constant_u64(8, 1)).unwrap();

        setup();
        let y = symbolic_array("y_totally_different_name");
        let uy = UpdateList::root(y);
        let read_y = crate::expr::intern_read(uy, constant_u64(32, 0), 8);
        let e2 = arith(ArithOp::Add, read_y, constant_u64(8, 1)).unwrap();

        let r1 = AlphaBuilder::new().rename(e1);
        let r2 = AlphaBuilder::new().rename(e2);
        assert_eq!(r1, r2);
    }

    #[test]
    #[serial_test::serial]
    fn shared_array_across_two_constraints_gets_one_alpha_index() {
        setup();
        let x = symbolic_array("x");
        let ux = UpdateList::root(x);
        let a = crate::expr::intern_read(ux, constant_u64(32, 0), 8);
        let b = crate::expr::intern_read(ux, constant_u64(32, 1), 8);

        let mut builder = AlphaBuilder::new();
        let renamed = builder.rename_all(&[a, b]);
        let arr_a = match Expr::get(renamed[0]).kind {
            ExprKind::Read { updates, .. } => UpdateList::root_array(updates),
            _ => panic!("expected Read"),
        };
        let arr_b = match Expr::get(renamed[1]).kind {
            ExprKind::Read { updates, .. } => UpdateList::root_array(updates),
            _ => panic!("expected Read"),
        };
        assert_eq!(arr_a, arr_b);
        assert_eq!(builder.mapping().len(), 1);
    }
}
