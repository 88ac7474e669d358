use std::convert::Infallible;
use std::ops::ControlFlow;

use boa_ast::expression::Call;
use boa_ast::function::FunctionBody;
use boa_ast::statement::Statement;
use boa_ast::visitor::{Visitor, VisitWith};
use boa_ast::Script;
use boa_interner::Interner;
use serde::{Deserialize, Serialize};

use crate::qualify::qualified_callee_name;

/// A single pause-candidate call site discovered in source order.
///
/// `sequence_hint` is the order in which this site's callback would be
/// recorded on a fresh (non-replay) execution, assuming every prior site on
/// the same path actually fires — it is a hint, not a guarantee, since a
/// conditional or loop can make some sites unreachable on a given run. The
/// Sequencer (C4) is what assigns the *real* sequence number at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseSite {
    pub sequence_hint: u32,
    pub qualified_name: String,
    pub statement_id: u32,
}

fn is_pause_candidate(name: &str) -> bool {
    name.starts_with("atp.") || name.starts_with("api.")
}

struct CallSiteCollector<'a> {
    interner: &'a Interner,
    next_statement_id: u32,
    current_statement_id: u32,
    sites: Vec<PauseSite>,
}

impl<'ast> Visitor<'ast> for CallSiteCollector<'_> {
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
        // Recurse into arguments (and the callee) first: a pause-candidate
        // call nested inside this call's arguments evaluates before this
        // one does, so it must be collected first (innermost-first order).
        let result = node.visit_with(self);

        if let Some(name) = qualified_callee_name(node.function(), self.interner) {
            if is_pause_candidate(&name) {
                self.sites.push(PauseSite {
                    sequence_hint: self.sites.len() as u32,
                    qualified_name: name,
                    statement_id: self.current_statement_id,
                });
            }
        }

        result
    }
}

/// Walk the whole script in source order, returning every `atp.*`/`api.*`
/// call site with an assigned statement ID.
pub fn collect_pause_sites(script: &Script, interner: &Interner) -> Vec<PauseSite> {
    let mut collector = CallSiteCollector {
        interner,
        next_statement_id: 0,
        current_statement_id: 0,
        sites: Vec::new(),
    };
    let ControlFlow::Continue(()) = script.visit_with(&mut collector) else {
        unreachable!("collector never breaks")
    };
    collector.sites
}

/// Count pause-candidate call sites inside a function body, used by the
/// batch optimizer to check the "single pause-candidate call" condition.
pub fn collect_pause_sites_in_body(body: &FunctionBody, interner: &Interner) -> usize {
    let mut collector = CallSiteCollector {
        interner,
        next_statement_id: 0,
        current_statement_id: 0,
        sites: Vec::new(),
    };
    for item in body.statements().statements() {
        let ControlFlow::Continue(()) = item.visit_with(&mut collector) else {
            unreachable!("collector never breaks")
        };
    }
    collector.sites.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_source;

    #[test]
    fn finds_atp_and_api_call_sites() {
        let (script, interner) =
            parse_source("atp.llm.call(); api.crm.lookup(); plainCall();").unwrap();
        let sites = collect_pause_sites(&script, &interner);
        let names: Vec<&str> = sites.iter().map(|s| s.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["atp.llm.call", "api.crm.lookup"]);
    }

    #[test]
    fn nested_pause_call_in_argument_collected_first() {
        let (script, interner) =
            parse_source("atp.log.write(atp.llm.call());").unwrap();
        let sites = collect_pause_sites(&script, &interner);
        let names: Vec<&str> = sites.iter().map(|s| s.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["atp.llm.call", "atp.log.write"]);
    }

    #[test]
    fn statement_ids_increase_in_source_order() {
        let (script, interner) =
            parse_source("atp.log.write(1); atp.log.write(2);").unwrap();
        let sites = collect_pause_sites(&script, &interner);
        assert_eq!(sites.len(), 2);
        assert!(sites[0].statement_id < sites[1].statement_id);
    }

    #[test]
    fn non_pause_calls_are_ignored() {
        let (script, interner) = parse_source("doWork(); helper.run();").unwrap();
        let sites = collect_pause_sites(&script, &interner);
        assert!(sites.is_empty());
    }
}
