//! Syntactic side-effect detection for call arguments.
//!
//! This is an over-approximation: any update, assignment, `await` or `yield` anywhere in an
//! argument subtree marks the call as effectful, including inside closures passed as arguments
//! even though those only run if the callee invokes them.

use oxc_ast::ast::{
    Argument, AssignmentExpression, AwaitExpression, CallExpression, UpdateExpression, YieldExpression,
};
use oxc_ast_visit::Visit;

pub fn arguments_have_side_effects(call: &CallExpression<'_>) -> bool {
    call.arguments.iter().any(argument_has_side_effects)
}

pub fn argument_has_side_effects(arg: &Argument<'_>) -> bool {
    let mut finder = EffectFinder::default();
    finder.visit_argument(arg);
    finder.found
}

#[derive(Default)]
struct EffectFinder {
    found: bool,
}

impl<'a> Visit<'a> for EffectFinder {
    fn visit_update_expression(&mut self, _it: &UpdateExpression<'a>) {
        self.found = true;
    }

    fn visit_assignment_expression(&mut self, _it: &AssignmentExpression<'a>) {
        self.found = true;
    }

    fn visit_await_expression(&mut self, _it: &AwaitExpression<'a>) {
        self.found = true;
    }

    fn visit_yield_expression(&mut self, _it: &YieldExpression<'a>) {
        self.found = true;
    }

    fn visit_argument(&mut self, it: &Argument<'a>) {
        if !self.found {
            oxc_ast_visit::walk::walk_argument(self, it);
        }
    }
}
