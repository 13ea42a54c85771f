// Copyright 2025 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Remove unreferenced variables from the IR, along with statements that have no effect.  The
// variables that are no longer referenced are marked as dead-code-eliminated.
use crate::ir::*;
use crate::*;

struct State<'a> {
    ir_meta: &'a IRMeta,
    referenced: Vec<bool>,
}

impl State<'_> {
    fn is_referenced(&self, variable_id: VariableId) -> bool {
        self.referenced[variable_id.id as usize]
    }
    fn mark_referenced(&mut self, variable_id: VariableId) {
        self.referenced[variable_id.id as usize] = true;
    }
}

pub fn run(ir: &mut IR) {
    let mut state =
        State { ir_meta: &ir.meta, referenced: vec![false; ir.meta.all_variables().len()] };

    for global in &ir.globals {
        match global {
            // Don't prune interface variables, the backend declares them regardless of use.
            &Global::Variable(id) => {
                if state.ir_meta.get_variable(id).is_interface() {
                    state.mark_referenced(id);
                }
            }
            &Global::FunctionPrototype(id) | &Global::FunctionDefinition(id, _) => {
                let ir_meta = state.ir_meta;
                ir_meta.get_function(id).params.iter().for_each(|param| {
                    state.mark_referenced(param.variable_id);
                });
            }
            Global::Struct(_) => {}
        }
    }

    traverser::visitor::for_each_function(&mut state, &ir.globals, |state, _, body| {
        traverser::visitor::for_each_expression_in_block(
            state,
            body,
            &|state: &mut State, expression| {
                if let &Expression::Symbol(id) = expression {
                    state.mark_referenced(id);
                }
            },
        );
    });

    // Remove unreferenced local variables, as long as their initializer can be dropped too, and
    // expressions whose result is unused.
    traverser::transformer::for_each_function(&mut state, &mut ir.globals, &|state, _, body| {
        traverser::transformer::for_each_statement(state, body, &|state: &mut State, statement| {
            match &statement {
                &Statement::Declare(id, ref initializer) => {
                    let has_side_effects =
                        initializer.as_ref().is_some_and(|init| init.has_side_effects());
                    if !state.is_referenced(id) && !has_side_effects {
                        return vec![];
                    }
                    state.mark_referenced(id);
                }
                Statement::Expression(expression) if !expression.has_side_effects() => {
                    return vec![];
                }
                _ => {}
            }
            vec![statement]
        });
    });

    let referenced = state.referenced;

    // Prune unreferenced global variables too.
    ir.globals.retain(|global| match global {
        &Global::Variable(id) => referenced[id.id as usize],
        _ => true,
    });

    referenced.iter().enumerate().for_each(|(id, &is_referenced)| {
        if !is_referenced {
            ir.meta.dead_code_eliminate_variable(VariableId { id: id as u32 });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_builder::{self, TestBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn unreferenced_globals_are_removed_unless_interface() {
        let mut builder = TestBuilder::new(ShaderType::Fragment);
        let unused = builder.non_const_global("unused", TYPE_ID_FLOAT, None);
        let used = builder.non_const_global("used", TYPE_ID_FLOAT, None);
        let input = builder.input("inactive", TYPE_ID_VEC4);
        builder.main(vec![Statement::assign(Expression::symbol(used), Expression::float(1.0))]);
        let mut ir = builder.build();

        run(&mut ir);

        assert!(!ir.globals.contains(&Global::Variable(unused)));
        assert!(ir.globals.contains(&Global::Variable(used)));
        assert!(ir.globals.contains(&Global::Variable(input)));
        assert!(ir.meta.get_variable(unused).is_dead_code_eliminated);
        assert!(!ir.meta.get_variable(used).is_dead_code_eliminated);
    }

    #[test]
    fn locals_and_no_op_statements_are_removed() {
        let mut builder = TestBuilder::new(ShaderType::Vertex);
        let helper = builder.function("helper", &[], TYPE_ID_FLOAT);
        builder.define(helper, vec![Statement::Return(Some(Expression::float(0.0)))]);

        let unused = builder.local("unused", TYPE_ID_FLOAT);
        let side_effect = builder.local("sideEffect", TYPE_ID_FLOAT);
        let used = builder.local("used", TYPE_ID_FLOAT);
        builder.main(vec![
            Statement::Declare(unused, Some(Expression::float(2.0))),
            Statement::Declare(side_effect, Some(Expression::call(helper, vec![]))),
            Statement::Declare(used, None),
            Statement::Expression(Expression::symbol(used)),
            Statement::Block(Block::from_statements(vec![Statement::assign(
                Expression::symbol(used),
                Expression::float(1.0),
            )])),
        ]);
        let mut ir = builder.build();

        run(&mut ir);

        assert_eq!(
            test_builder::main_body(&ir).statements,
            vec![
                Statement::Declare(side_effect, Some(Expression::call(helper, vec![]))),
                Statement::Declare(used, None),
                Statement::Block(Block::from_statements(vec![Statement::assign(
                    Expression::symbol(used),
                    Expression::float(1.0),
                )])),
            ]
        );
        assert!(ir.meta.get_variable(unused).is_dead_code_eliminated);
        assert!(!ir.meta.get_variable(side_effect).is_dead_code_eliminated);
    }

    #[test]
    fn parameters_are_kept() {
        let mut builder = TestBuilder::new(ShaderType::Vertex);
        let function = builder.function("f", &[("x", TYPE_ID_FLOAT)], TYPE_ID_VOID);
        builder.define(function, vec![]);
        builder.main(vec![Statement::call(function, vec![Expression::float(1.0)])]);
        let x = builder.param(function, 0);
        let mut ir = builder.build();

        run(&mut ir);

        assert!(!ir.meta.get_variable(x).is_dead_code_eliminated);
    }
}
