use std::collections::{HashMap, HashSet};
use std::path::Path;

use oxc_allocator::{Allocator, Vec as ArenaVec};
use oxc_ast::ast::{
    CallExpression, ChainElement, Expression, ExpressionStatement, IdentifierReference, Statement,
};
use oxc_ast_visit::Visit;
use oxc_span::Span;

use crate::error::SweepResult;
use crate::model::{is_console_method, CallSite, Position, TextSpan, RECEIVER};
use crate::parser::{self, ParsedUnit};
use crate::side_effects::arguments_have_side_effects;

const SNIPPET_MAX_CHARS: usize = 80;

/// Parses `source` and returns every `console.<method>(..)` call in source order.
pub fn collect_call_sites(path: &Path, source: &str) -> SweepResult<Vec<CallSite>> {
    let allocator = Allocator::default();
    let unit = parser::parse(&allocator, path, source)?;
    Ok(classify(&unit))
}

pub fn classify(unit: &ParsedUnit<'_>) -> Vec<CallSite> {
    let mut collector = CallSiteCollector {
        unit,
        list_statements: HashSet::new(),
        statement_calls: HashMap::new(),
        sites: Vec::new(),
    };
    collector.visit_program(&unit.program);

    let mut sites = collector.sites;
    sites.sort_by_key(|s| (s.span.start, std::cmp::Reverse(s.span.end)));
    sites
}

struct CallSiteCollector<'u, 'a> {
    unit: &'u ParsedUnit<'a>,
    // expression statements that sit directly in a statement list
    list_statements: HashSet<TextSpan>,
    // call span -> statement span, for calls that are a whole expression statement
    statement_calls: HashMap<TextSpan, TextSpan>,
    sites: Vec<CallSite>,
}

impl<'a> CallSiteCollector<'_, 'a> {
    fn record(&mut self, call: &CallExpression<'a>, receiver: &IdentifierReference<'a>, method: &str) {
        let span = to_text_span(call.span);
        let position = match self.statement_calls.get(&span) {
            Some(statement) => Position::Statement {
                statement: *statement,
                in_list: self.list_statements.contains(statement),
            },
            None => Position::Expression,
        };
        let source = self.unit.source;
        let (start_line, start_column) = self.unit.lines.line_col(source, span.start);
        let (end_line, end_column) = self.unit.lines.line_col(source, span.end);

        self.sites.push(CallSite {
            method: method.to_string(),
            start_line,
            start_column,
            end_line,
            end_column,
            is_global_receiver: !self.unit.is_bound(receiver),
            has_side_effects: arguments_have_side_effects(call),
            position,
            span,
            snippet: snippet(source, span),
        });
    }
}

impl<'a> Visit<'a> for CallSiteCollector<'_, 'a> {
    fn visit_statements(&mut self, it: &ArenaVec<'a, Statement<'a>>) {
        for stmt in it.iter() {
            if let Statement::ExpressionStatement(es) = stmt {
                self.list_statements.insert(to_text_span(es.span));
            }
        }
        oxc_ast_visit::walk::walk_statements(self, it);
    }

    fn visit_expression_statement(&mut self, it: &ExpressionStatement<'a>) {
        if let Some(call) = whole_statement_call(&it.expression) {
            self.statement_calls
                .insert(to_text_span(call.span), to_text_span(it.span));
        }
        oxc_ast_visit::walk::walk_expression_statement(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Some((receiver, method)) = console_callee(&it.callee) {
            if is_console_method(method) {
                self.record(it, receiver, method);
            }
        }
        oxc_ast_visit::walk::walk_call_expression(self, it);
    }
}

/// The call that makes up an entire statement, looking through parentheses and optional chains.
fn whole_statement_call<'b, 'a>(expr: &'b Expression<'a>) -> Option<&'b CallExpression<'a>> {
    match expr {
        Expression::CallExpression(call) => Some(&**call),
        Expression::ChainExpression(chain) => match &chain.expression {
            ChainElement::CallExpression(call) => Some(&**call),
            _ => None,
        },
        Expression::ParenthesizedExpression(paren) => whole_statement_call(&paren.expression),
        _ => None,
    }
}

/// Matches `console.m`, `console?.m`, `console['m']` and returns the receiver and method name.
fn console_callee<'b, 'a>(callee: &'b Expression<'a>) -> Option<(&'b IdentifierReference<'a>, &'b str)> {
    match callee {
        Expression::StaticMemberExpression(member) => {
            let receiver = receiver_ident(&member.object)?;
            Some((receiver, member.property.name.as_str()))
        }
        Expression::ComputedMemberExpression(member) => {
            let receiver = receiver_ident(&member.object)?;
            match &member.expression {
                Expression::StringLiteral(lit) => Some((receiver, lit.value.as_str())),
                _ => None,
            }
        }
        Expression::ParenthesizedExpression(paren) => console_callee(&paren.expression),
        _ => None,
    }
}

fn receiver_ident<'b, 'a>(object: &'b Expression<'a>) -> Option<&'b IdentifierReference<'a>> {
    match object {
        Expression::Identifier(ident) if ident.name.as_str() == RECEIVER => Some(&**ident),
        _ => None,
    }
}

fn to_text_span(span: Span) -> TextSpan {
    TextSpan::new(span.start, span.end)
}

fn snippet(source: &str, span: TextSpan) -> String {
    let text = source
        .get(span.start as usize..span.end as usize)
        .unwrap_or_default();
    let first_line = text.lines().next().unwrap_or_default().trim();
    let mut out: String = first_line.chars().take(SNIPPET_MAX_CHARS).collect();
    if first_line.chars().count() > SNIPPET_MAX_CHARS || text.lines().nth(1).is_some() {
        out.push('…');
    }
    out
}
