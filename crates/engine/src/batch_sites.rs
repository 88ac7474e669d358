//! Maps `atp-transform`'s batch-eligibility analysis (per-`Call`-node) onto
//! the statement IDs the Sequencer actually sees at runtime.
//!
//! `atp_transform::batch::analyze_call` judges one `Call` node in isolation;
//! it never learns the *statement_id* of the single pause-candidate call
//! inside the eligible callback, because `atp-transform`'s own
//! `collect_pause_sites_in_body` renumbers statements from zero for that
//! check. This module re-walks the script with the identical
//! statement-numbering algorithm `atp_transform::sites` uses (so IDs line up
//! with the table already stored on the `ExecutionRecord`), and additionally
//! tracks, for each eligible batchable call, exactly which newly-discovered
//! pause site sits inside it.

use std::convert::Infallible;
use std::ops::ControlFlow;

use atp_transform::batch::analyze_call;
use boa_ast::expression::Call;
use boa_ast::statement::Statement;
use boa_ast::visitor::{Visitor, VisitWith};
use boa_ast::Script;
use boa_interner::Interner;

fn is_pause_candidate(name: &str) -> bool {
    name.starts_with("atp.") || name.starts_with("api.")
}

struct Collector<'a> {
    interner: &'a Interner,
    next_statement_id: u32,
    current_statement_id: u32,
    pause_site_count: usize,
    last_pause_statement_id: Option<u32>,
    batch_statement_ids: Vec<u32>,
}

impl<'ast> Visitor<'ast> for Collector<'_> {
    type BreakTy = Infallible;

    fn visit_statement(&mut self, node: &'ast Statement) -> ControlFlow<Self::BreakTy> {
        let id = self.next_statement_id;
        self.next_statement_id += 1;
        let outer = self.current_statement_id;
        self.current_statement_id = id;
        let result = node.visit_with(self);
        self.current_statement_id = outer;
        result
    }

    fn visit_call(&mut self, node: &'ast Call) -> ControlFlow<Self::BreakTy> {
        let before = self.pause_site_count;
        let result = node.visit_with(self);

        if let Some(name) = atp_transform_callee_name(node, self.interner) {
            if is_pause_candidate(&name) {
                self.pause_site_count += 1;
                self.last_pause_statement_id = Some(self.current_statement_id);
            }
        }

        if let Some(candidate) = analyze_call(node, self.interner) {
            if candidate.is_eligible() {
                let newly_added = self.pause_site_count - before;
                if newly_added == 1 {
                    if let Some(id) = self.last_pause_statement_id {
                        self.batch_statement_ids.push(id);
                    }
                }
            }
        }

        result
    }
}

fn atp_transform_callee_name(call: &Call, interner: &Interner) -> Option<String> {
    // `qualify` is a private detail of `atp-transform`'s own sites module;
    // its logic is small enough to not warrant exposing a new public seam
    // just for this cross-check, so it's inlined here.
    use boa_ast::expression::access::PropertyAccessField;
    use boa_ast::expression::Expression;

    fn resolve(expr: &Expression, interner: &Interner) -> Option<String> {
        match expr {
            Expression::Identifier(ident) => Some(interner.resolve_expect(ident.sym()).to_string()),
            Expression::PropertyAccess(access) => {
                let field = match access.field() {
                    PropertyAccessField::Simple(simple) => simple.field(),
                    PropertyAccessField::Expr(_) => return None,
                };
                let base = resolve(access.target(), interner)?;
                let field_name = interner.resolve_expect(field).to_string();
                Some(format!("{base}.{field_name}"))
            }
            _ => None,
        }
    }
    resolve(call.function(), interner)
}

/// The set of statement IDs (of the single pause-candidate call inside an
/// eligible batchable callback) that the Sequencer should treat as batch
/// sites, numbered identically to `atp_transform::sites::collect_pause_sites`.
pub fn detect_batch_statement_ids(script: &Script, interner: &Interner) -> Vec<u32> {
    let mut collector = Collector {
        interner,
        next_statement_id: 0,
        current_statement_id: 0,
        pause_site_count: 0,
        last_pause_statement_id: None,
        batch_statement_ids: Vec::new(),
    };
    let ControlFlow::Continue(()) = script.visit_with(&mut collector) else {
        unreachable!("collector never breaks")
    };
    collector.batch_statement_ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use atp_transform::transform;

    #[test]
    fn detects_the_inner_pause_site_of_an_eligible_map_call() {
        let transformed =
            transform("items.map(async (x) => { return await atp.llm.call(x); });").unwrap();
        let batch_ids = detect_batch_statement_ids(&transformed.script, &transformed.interner);
        assert_eq!(batch_ids.len(), 1);
        let inner_site = transformed
            .pause_sites
            .iter()
            .find(|s| s.qualified_name == "atp.llm.call")
            .unwrap();
        assert_eq!(batch_ids[0], inner_site.statement_id);
    }

    #[test]
    fn sync_callback_yields_no_batch_sites() {
        let transformed = transform("items.map((x) => x + 1);").unwrap();
        assert!(detect_batch_statement_ids(&transformed.script, &transformed.interner).is_empty());
    }

    #[test]
    fn plain_sequential_calls_yield_no_batch_sites() {
        let transformed =
            transform("atp.llm.call({a:1}); atp.llm.call({a:2});").unwrap();
        assert!(detect_batch_statement_ids(&transformed.script, &transformed.interner).is_empty());
    }
}
