//! The Batch Optimizer heuristic (§4.1, §4.3).
//!
//! Array-method callbacks (`.map`, `.forEach`, `.filter`, `.some`, `.every`,
//! `.find`, `.reduce`) that each make exactly one pause-candidate call can
//! have all their pauses batched into a single round trip instead of one
//! pause per element. This module only *detects* eligible call sites; C4
//! is what actually groups the resulting callbacks under one `sub_id` set.

use boa_ast::expression::access::PropertyAccessField;
use boa_ast::expression::{ArrayLiteral, Call, Expression};
use boa_ast::function::FunctionBody;
use boa_ast::statement::{Statement, StatementListItem};
use boa_interner::Interner;

use crate::qualify::qualified_callee_name;
use crate::sites::collect_pause_sites_in_body;

const BATCHABLE_METHODS: &[&str] = &["map", "forEach", "filter", "some", "every", "find", "reduce"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCandidate {
    pub method_name: String,
    pub array_length_literal: Option<usize>,
    pub has_conditional: bool,
}

impl BatchCandidate {
    /// Conditionals are only allowed to participate in batching when the
    /// receiver is a literal array shorter than 10 elements — beyond that,
    /// the branch space is judged too large to safely pre-resolve.
    pub fn is_eligible(&self) -> bool {
        if !self.has_conditional {
            return true;
        }
        matches!(self.array_length_literal, Some(n) if n < 10)
    }
}

fn callback_body<'a>(expr: &'a Expression) -> Option<(&'a FunctionBody, bool)> {
    match expr {
        Expression::ArrowFunction(f) => Some((f.body(), false)),
        Expression::AsyncArrowFunction(f) => Some((f.body(), true)),
        Expression::FunctionExpression(f) => Some((f.body(), false)),
        Expression::AsyncFunctionExpression(f) => Some((f.body(), true)),
        _ => None,
    }
}

fn receiver_array_length(expr: &Expression) -> Option<usize> {
    match expr {
        Expression::ArrayLiteral(arr) => Some(array_literal_len(arr)),
        _ => None,
    }
}

fn array_literal_len(arr: &ArrayLiteral) -> usize {
    arr.as_ref().len()
}

fn body_contains_disallowed_control_flow(body: &FunctionBody) -> bool {
    fn statement_disallowed(stmt: &Statement) -> bool {
        matches!(
            stmt,
            Statement::While(_)
                | Statement::DoWhileLoop(_)
                | Statement::ForLoop(_)
                | Statement::ForInLoop(_)
                | Statement::ForOfLoop(_)
                | Statement::Try(_)
                | Statement::Break(_)
                | Statement::Continue(_)
        )
    }
    body.statements().statements().iter().any(|item| match item {
        StatementListItem::Statement(stmt) => statement_disallowed(stmt),
        StatementListItem::Declaration(_) => false,
    })
}

fn body_contains_conditional(body: &FunctionBody) -> bool {
    body.statements().statements().iter().any(|item| {
        matches!(item, StatementListItem::Statement(Statement::If(_)))
    })
}

/// Inspect a single `array.method(callback)` call for batch eligibility.
/// Returns `None` when the call isn't one of the batchable array methods,
/// or its argument isn't a plain function/arrow expression.
pub fn analyze_call(call: &Call, interner: &Interner) -> Option<BatchCandidate> {
    let Expression::PropertyAccess(access) = call.function() else {
        return None;
    };
    let PropertyAccessField::Simple(field) = access.field() else {
        return None;
    };
    let method_name = interner.resolve_expect(field.field()).to_string();
    if !BATCHABLE_METHODS.contains(&method_name.as_str()) {
        return None;
    }

    let [callback_arg] = call.args() else {
        return None;
    };
    let (body, is_async) = callback_body(callback_arg)?;
    if !is_async {
        // A synchronous callback can't itself contain a pause-candidate
        // call that the sandbox could suspend on.
        return None;
    }

    if body_contains_disallowed_control_flow(body) {
        return None;
    }

    let pause_calls = collect_pause_sites_in_body(body, interner);
    if pause_calls != 1 {
        return None;
    }

    Some(BatchCandidate {
        method_name,
        array_length_literal: receiver_array_length(access.target()),
        has_conditional: body_contains_conditional(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_source;
    use boa_ast::statement::{Statement, StatementListItem};

    fn first_call(code: &str) -> (boa_ast::Script, Interner) {
        parse_source(code).unwrap()
    }

    fn extract_call<'a>(script: &'a boa_ast::Script) -> &'a Call {
        let item = script.statements().statements().first().unwrap();
        let StatementListItem::Statement(Statement::Expression(Expression::Call(call))) = item
        else {
            panic!("expected a bare call-expression statement");
        };
        call
    }

    #[test]
    fn single_pause_call_async_callback_is_batchable() {
        let (script, interner) =
            first_call("items.map(async (x) => { return await atp.llm.call(x); });");
        let call = extract_call(&script);
        let candidate = analyze_call(call, &interner).unwrap();
        assert_eq!(candidate.method_name, "map");
        assert!(candidate.is_eligible());
    }

    #[test]
    fn sync_callback_is_not_batchable() {
        let (script, interner) = first_call("items.map((x) => { return x + 1; });");
        let call = extract_call(&script);
        assert!(analyze_call(call, &interner).is_none());
    }

    #[test]
    fn non_array_method_is_not_batchable() {
        let (script, interner) = first_call("obj.doThing(async (x) => x);");
        let call = extract_call(&script);
        assert!(analyze_call(call, &interner).is_none());
    }

    #[test]
    fn conditional_with_short_literal_array_is_eligible() {
        let (script, interner) = first_call(
            "[1,2,3].forEach(async (x) => { if (x) { await atp.llm.call(x); } });",
        );
        let call = extract_call(&script);
        let candidate = analyze_call(call, &interner).unwrap();
        assert!(candidate.has_conditional);
        assert_eq!(candidate.array_length_literal, Some(3));
        assert!(candidate.is_eligible());
    }

    #[test]
    fn conditional_on_unbounded_receiver_is_ineligible() {
        let (script, interner) = first_call(
            "items.forEach(async (x) => { if (x) { await atp.llm.call(x); } });",
        );
        let call = extract_call(&script);
        let candidate = analyze_call(call, &interner).unwrap();
        assert!(!candidate.is_eligible());
    }
}
