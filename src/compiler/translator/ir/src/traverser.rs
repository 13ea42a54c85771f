// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Traverser utilities for the IR.  Fundamentally, there are two types of traversers:
//
// - A visitor does a read-only traversal of the IR.
// - A transformer may mutate the IR.  The most general transformer is a rebuild of the tree of
//   globals, where a `Rebuild` implementation is given the chance to remove or replace global
//   declarations and to replace calls and symbol references.  Expressions are rebuilt bottom-up,
//   so a hook sees the already rebuilt arguments of a call.

use crate::ir::*;
use crate::*;

pub mod visitor {
    use super::*;

    // Visit every function that has a definition, along with its body.
    pub fn for_each_function<State, Visit>(state: &mut State, globals: &[Global], visit: Visit)
    where
        Visit: Fn(&mut State, FunctionId, &Block),
    {
        for global in globals {
            if let Global::FunctionDefinition(id, body) = global {
                visit(state, *id, body);
            }
        }
    }

    // Visit every statement of a block, recursing into the blocks nested in statements.  A
    // statement is visited before the blocks nested in it.
    pub fn for_each_statement<State, Visit>(state: &mut State, block: &Block, visit: &Visit)
    where
        Visit: Fn(&mut State, &Statement),
    {
        for statement in &block.statements {
            visit(state, statement);
            match statement {
                Statement::If(_, true_block, false_block) => {
                    for_each_statement(state, true_block, visit);
                    if let Some(false_block) = false_block {
                        for_each_statement(state, false_block, visit);
                    }
                }
                Statement::Loop(_, body) | Statement::Block(body) => {
                    for_each_statement(state, body, visit);
                }
                _ => {}
            }
        }
    }

    // Visit the expressions that are directly part of a statement, i.e. not those found in the
    // blocks nested in it.
    pub fn for_each_expression_in_statement<State, Visit>(
        state: &mut State,
        statement: &Statement,
        visit: &Visit,
    ) where
        Visit: Fn(&mut State, &Expression),
    {
        match statement {
            Statement::Declare(_, Some(expression))
            | Statement::Expression(expression)
            | Statement::If(expression, _, _)
            | Statement::Loop(expression, _)
            | Statement::Return(Some(expression)) => for_each_expression(state, expression, visit),
            Statement::Assign(lhs, rhs) => {
                for_each_expression(state, lhs, visit);
                for_each_expression(state, rhs, visit);
            }
            Statement::Declare(_, None)
            | Statement::Block(_)
            | Statement::Return(None)
            | Statement::Break
            | Statement::Continue
            | Statement::Discard => {}
        }
    }

    // Visit an expression and all its sub-expressions, parents first.
    pub fn for_each_expression<State, Visit>(
        state: &mut State,
        expression: &Expression,
        visit: &Visit,
    ) where
        Visit: Fn(&mut State, &Expression),
    {
        visit(state, expression);
        match expression {
            Expression::Constant(_) | Expression::Symbol(_) => {}
            Expression::AccessField(operand, _)
            | Expression::Unary(_, operand)
            | Expression::AddressOf(operand) => for_each_expression(state, operand, visit),
            Expression::Index(lhs, rhs)
            | Expression::Binary(_, lhs, rhs)
            | Expression::Texture(lhs, rhs) => {
                for_each_expression(state, lhs, visit);
                for_each_expression(state, rhs, visit);
            }
            Expression::Construct(_, args) | Expression::Call(_, args) => {
                args.iter().for_each(|arg| for_each_expression(state, arg, visit));
            }
        }
    }

    // Visit every expression in a block, including those in nested blocks.
    pub fn for_each_expression_in_block<State, Visit>(
        state: &mut State,
        block: &Block,
        visit: &Visit,
    ) where
        Visit: Fn(&mut State, &Expression),
    {
        for_each_statement(state, block, &|state, statement| {
            for_each_expression_in_statement(state, statement, visit)
        });
    }
}

pub mod transformer {
    use super::*;

    // What to do with a global declaration after visiting it.
    #[derive(Copy, Clone, PartialEq)]
    #[cfg_attr(debug_assertions, derive(Debug))]
    pub enum GlobalTransform {
        Keep,
        Remove,
    }

    #[derive(Copy, Clone, PartialEq)]
    #[cfg_attr(debug_assertions, derive(Debug))]
    pub enum VisitBody {
        Visit,
        Skip,
    }

    pub const VISIT_BODY: VisitBody = VisitBody::Visit;
    pub const SKIP_BODY: VisitBody = VisitBody::Skip;

    // The hooks of a rebuild.  Every hook has a default that leaves the tree as is, so an
    // implementation only overrides what it transforms.  Hooks that are called while rebuilding a
    // function body are given the id of that function (`owner`), before it is possibly replaced by
    // `visit_function_definition_post`.
    pub trait Rebuild {
        fn visit_global_variable(
            &mut self,
            _ir_meta: &mut IRMeta,
            _id: VariableId,
        ) -> Result<GlobalTransform> {
            Ok(GlobalTransform::Keep)
        }

        fn visit_function_prototype(
            &mut self,
            _ir_meta: &mut IRMeta,
            id: FunctionId,
        ) -> Result<FunctionId> {
            Ok(id)
        }

        fn visit_function_definition_pre(
            &mut self,
            _ir_meta: &mut IRMeta,
            _id: FunctionId,
        ) -> Result<VisitBody> {
            Ok(VISIT_BODY)
        }

        fn visit_function_definition_post(
            &mut self,
            _ir_meta: &mut IRMeta,
            id: FunctionId,
            body: Block,
        ) -> Result<(FunctionId, Block)> {
            Ok((id, body))
        }

        fn visit_call(
            &mut self,
            _ir_meta: &mut IRMeta,
            _owner: FunctionId,
            callee: FunctionId,
            args: Vec<Expression>,
        ) -> Result<Expression> {
            Ok(Expression::Call(callee, args))
        }

        fn visit_symbol(
            &mut self,
            _ir_meta: &mut IRMeta,
            _owner: FunctionId,
            id: VariableId,
        ) -> Result<Expression> {
            Ok(Expression::Symbol(id))
        }
    }

    // Rebuild the tree of globals with the given hooks.  If a hook fails, the error is returned
    // and the tree is left partially rebuilt; it's up to the caller to restore it if needed.
    pub fn rebuild<R: Rebuild>(ir: &mut IR, rebuilder: &mut R) -> Result<()> {
        let globals = std::mem::take(&mut ir.globals);
        let mut new_globals = Vec::with_capacity(globals.len());

        for global in globals {
            match global {
                Global::Variable(id) => match rebuilder.visit_global_variable(&mut ir.meta, id)? {
                    GlobalTransform::Keep => new_globals.push(Global::Variable(id)),
                    GlobalTransform::Remove => {}
                },
                Global::FunctionPrototype(id) => {
                    let id = rebuilder.visit_function_prototype(&mut ir.meta, id)?;
                    new_globals.push(Global::FunctionPrototype(id));
                }
                Global::FunctionDefinition(id, body) => {
                    let body = match rebuilder.visit_function_definition_pre(&mut ir.meta, id)? {
                        VisitBody::Visit => rebuild_block(&mut ir.meta, rebuilder, id, body)?,
                        VisitBody::Skip => body,
                    };
                    let (id, body) =
                        rebuilder.visit_function_definition_post(&mut ir.meta, id, body)?;
                    new_globals.push(Global::FunctionDefinition(id, body));
                }
                Global::Struct(_) => new_globals.push(global),
            }
        }

        ir.globals = new_globals;
        Ok(())
    }

    fn rebuild_block<R: Rebuild>(
        ir_meta: &mut IRMeta,
        rebuilder: &mut R,
        owner: FunctionId,
        block: Block,
    ) -> Result<Block> {
        let statements = block
            .statements
            .into_iter()
            .map(|statement| rebuild_statement(ir_meta, rebuilder, owner, statement))
            .collect::<Result<Vec<_>>>()?;
        Ok(Block::from_statements(statements))
    }

    fn rebuild_statement<R: Rebuild>(
        ir_meta: &mut IRMeta,
        rebuilder: &mut R,
        owner: FunctionId,
        statement: Statement,
    ) -> Result<Statement> {
        let expr = |ir_meta: &mut IRMeta, rebuilder: &mut R, expression: Expression| {
            rebuild_expression(ir_meta, rebuilder, owner, expression)
        };

        Ok(match statement {
            Statement::Declare(id, initializer) => Statement::Declare(
                id,
                initializer.map(|init| expr(ir_meta, rebuilder, init)).transpose()?,
            ),
            Statement::Expression(expression) => {
                Statement::Expression(expr(ir_meta, rebuilder, expression)?)
            }
            Statement::Assign(lhs, rhs) => {
                let lhs = expr(ir_meta, rebuilder, lhs)?;
                let rhs = expr(ir_meta, rebuilder, rhs)?;
                Statement::Assign(lhs, rhs)
            }
            Statement::If(condition, true_block, false_block) => {
                let condition = expr(ir_meta, rebuilder, condition)?;
                let true_block = rebuild_block(ir_meta, rebuilder, owner, true_block)?;
                let false_block = false_block
                    .map(|block| rebuild_block(ir_meta, rebuilder, owner, block))
                    .transpose()?;
                Statement::If(condition, true_block, false_block)
            }
            Statement::Loop(condition, body) => {
                let condition = expr(ir_meta, rebuilder, condition)?;
                Statement::Loop(condition, rebuild_block(ir_meta, rebuilder, owner, body)?)
            }
            Statement::Block(block) => {
                Statement::Block(rebuild_block(ir_meta, rebuilder, owner, block)?)
            }
            Statement::Return(value) => {
                Statement::Return(value.map(|value| expr(ir_meta, rebuilder, value)).transpose()?)
            }
            Statement::Break | Statement::Continue | Statement::Discard => statement,
        })
    }

    fn rebuild_boxed<R: Rebuild>(
        ir_meta: &mut IRMeta,
        rebuilder: &mut R,
        owner: FunctionId,
        expression: Box<Expression>,
    ) -> Result<Box<Expression>> {
        Ok(Box::new(rebuild_expression(ir_meta, rebuilder, owner, *expression)?))
    }

    fn rebuild_expression<R: Rebuild>(
        ir_meta: &mut IRMeta,
        rebuilder: &mut R,
        owner: FunctionId,
        expression: Expression,
    ) -> Result<Expression> {
        Ok(match expression {
            Expression::Constant(_) => expression,
            Expression::Symbol(id) => rebuilder.visit_symbol(ir_meta, owner, id)?,
            Expression::AccessField(base, field) => {
                Expression::AccessField(rebuild_boxed(ir_meta, rebuilder, owner, base)?, field)
            }
            Expression::Index(base, index) => Expression::Index(
                rebuild_boxed(ir_meta, rebuilder, owner, base)?,
                rebuild_boxed(ir_meta, rebuilder, owner, index)?,
            ),
            Expression::Unary(op, operand) => {
                Expression::Unary(op, rebuild_boxed(ir_meta, rebuilder, owner, operand)?)
            }
            Expression::Binary(op, lhs, rhs) => Expression::Binary(
                op,
                rebuild_boxed(ir_meta, rebuilder, owner, lhs)?,
                rebuild_boxed(ir_meta, rebuilder, owner, rhs)?,
            ),
            Expression::Construct(type_id, args) => Expression::Construct(
                type_id,
                args.into_iter()
                    .map(|arg| rebuild_expression(ir_meta, rebuilder, owner, arg))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Expression::Call(callee, args) => {
                let args = args
                    .into_iter()
                    .map(|arg| rebuild_expression(ir_meta, rebuilder, owner, arg))
                    .collect::<Result<Vec<_>>>()?;
                rebuilder.visit_call(ir_meta, owner, callee, args)?
            }
            Expression::Texture(sampler, coord) => Expression::Texture(
                rebuild_boxed(ir_meta, rebuilder, owner, sampler)?,
                rebuild_boxed(ir_meta, rebuilder, owner, coord)?,
            ),
            Expression::AddressOf(operand) => {
                Expression::AddressOf(rebuild_boxed(ir_meta, rebuilder, owner, operand)?)
            }
        })
    }

    // Run a function for each function definition, which is free to transform the body.
    pub fn for_each_function<State, Transform>(
        state: &mut State,
        globals: &mut [Global],
        transform: &Transform,
    ) where
        Transform: Fn(&mut State, FunctionId, &mut Block),
    {
        for global in globals.iter_mut() {
            if let Global::FunctionDefinition(id, body) = global {
                transform(state, *id, body);
            }
        }
    }

    // Replace every statement of a block with the statements returned by the callback, which may
    // be none to remove it.  The blocks nested in a statement are transformed before the
    // statement itself.
    pub fn for_each_statement<State, Transform>(
        state: &mut State,
        block: &mut Block,
        transform: &Transform,
    ) where
        Transform: Fn(&mut State, Statement) -> Vec<Statement>,
    {
        let statements = std::mem::take(&mut block.statements);
        for mut statement in statements {
            match &mut statement {
                Statement::If(_, true_block, false_block) => {
                    for_each_statement(state, true_block, transform);
                    if let Some(false_block) = false_block {
                        for_each_statement(state, false_block, transform);
                    }
                }
                Statement::Loop(_, body) | Statement::Block(body) => {
                    for_each_statement(state, body, transform);
                }
                _ => {}
            }
            block.statements.extend(transform(state, statement));
        }
    }
}
