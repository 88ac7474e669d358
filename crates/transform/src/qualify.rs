use boa_ast::expression::access::PropertyAccessField;
use boa_ast::expression::Expression;
use boa_interner::Interner;

/// Resolve a call's callee expression to a dotted name (`"atp.llm.call"`,
/// `"api.crm.lookup_contact"`) when it's a simple property-access chain
/// rooted at an identifier. Anything more dynamic (computed member access,
/// a call expression as the base, etc.) returns `None` — those call sites
/// are never pause candidates since `atp.*`/`api.*` are always referenced
/// by their literal path.
pub fn qualified_callee_name(expr: &Expression, interner: &Interner) -> Option<String> {
    match expr {
        Expression::Identifier(ident) => Some(interner.resolve_expect(ident.sym()).to_string()),
        Expression::PropertyAccess(access) => {
            let field = match access.field() {
                PropertyAccessField::Simple(simple) => simple.field(),
                PropertyAccessField::Expr(_) => return None,
            };
            let base = qualified_callee_name(access.target(), interner)?;
            let field_name = interner.resolve_expect(field).to_string();
            Some(format!("{base}.{field_name}"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_source;
    use boa_ast::expression::Expression;
    use boa_ast::statement::{Statement, StatementListItem};

    fn first_call_callee_name(code: &str) -> Option<String> {
        let (script, interner) = parse_source(code).unwrap();
        let item = script.statements().statements().first()?;
        let StatementListItem::Statement(Statement::Expression(expr)) = item else {
            return None;
        };
        let Expression::Call(call) = expr else {
            return None;
        };
        qualified_callee_name(call.function(), &interner)
    }

    #[test]
    fn resolves_dotted_member_chain() {
        assert_eq!(
            first_call_callee_name("atp.llm.call();"),
            Some("atp.llm.call".to_string())
        );
    }

    #[test]
    fn resolves_plain_identifier_call() {
        assert_eq!(first_call_callee_name("doWork();"), Some("doWork".to_string()));
    }

    #[test]
    fn computed_member_access_is_unresolvable() {
        assert_eq!(first_call_callee_name("atp[\"llm\"].call();"), None);
    }
}
