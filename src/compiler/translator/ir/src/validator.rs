// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// A helper to validate the rules of IR.  This is useful particularly to be run after
// transformations, to ensure they generate valid IR.  Currently validated:
//
//   - There is exactly one main() definition.
//   - Every referenced variable is declared in an accessible scope, and is not eliminated.
//   - Only function parameters are references.
//   - Every called function is declared, and is given as many arguments as it has parameters.
//   - Fields are selected from structs, with an index in range.  Only indexable types are indexed.
//   - A function returns a value if and only if its return type is not void.

#[macro_export]
macro_rules! validate_in_debug_build_only {
    ($arg:expr) => {
        #[cfg(debug_assertions)]
        $crate::validator::validate($arg);
    };
}

#[cfg(debug_assertions)]
use crate::ir::*;
#[cfg(debug_assertions)]
use crate::*;
#[cfg(debug_assertions)]
use std::fmt;

#[cfg(debug_assertions)]
pub fn validate(ir: &IR) {
    let mut validator = Validator::new(ir);
    validator.validate();
}

#[cfg(debug_assertions)]
struct Validator<'a> {
    ir: &'a IR,
    global_variables: HashSet<VariableId>,
    declared_functions: HashSet<FunctionId>,
    // The variables visible in the current function: its parameters, then one set per nested
    // block.
    scopes: Vec<HashSet<VariableId>>,
    current_function: Option<FunctionId>,
}

#[cfg(debug_assertions)]
impl<'a> Validator<'a> {
    fn new(ir: &'a IR) -> Validator<'a> {
        let mut global_variables = HashSet::new();
        let mut declared_functions = HashSet::new();
        for global in &ir.globals {
            match global {
                &Global::Variable(id) => {
                    global_variables.insert(id);
                }
                &Global::FunctionPrototype(id) | &Global::FunctionDefinition(id, _) => {
                    declared_functions.insert(id);
                }
                Global::Struct(_) => {}
            }
        }

        Validator {
            ir,
            global_variables,
            declared_functions,
            scopes: Vec::new(),
            current_function: None,
        }
    }

    fn validate(&mut self) {
        let main_count = self
            .ir
            .globals
            .iter()
            .filter(|global| match global {
                &&Global::FunctionDefinition(id, _) => self.ir.meta.get_function(id).is_main(),
                _ => false,
            })
            .count();
        if main_count != 1 {
            self.on_error(format_args!("expected exactly one main(), found {main_count}"));
        }

        let ir = self.ir;
        for global in &ir.globals {
            match global {
                &Global::Variable(id) => self.validate_variable(id, VariableScope::Global),
                &Global::FunctionDefinition(id, ref body) => self.validate_function(id, body),
                Global::Struct(_) | Global::FunctionPrototype(_) => {}
            }
        }
    }

    fn validate_variable(&self, id: VariableId, expected_scope: VariableScope) {
        if id.id as usize >= self.ir.meta.all_variables().len() {
            self.on_error(format_args!("invalid variable id {}", id.id));
        }
        let variable = self.ir.meta.get_variable(id);
        if variable.is_dead_code_eliminated {
            self.on_error(format_args!("variable {} is declared but eliminated", id.id));
        }
        if variable.scope != expected_scope {
            self.on_error(format_args!("variable {} is declared in the wrong scope", id.id));
        }
        if variable.reference.is_some() && expected_scope != VariableScope::FunctionParam {
            self.on_error(format_args!("variable {} is a reference but not a parameter", id.id));
        }
    }

    fn validate_function(&mut self, id: FunctionId, body: &Block) {
        let params: HashSet<VariableId> =
            self.ir.meta.get_function(id).params.iter().map(|param| param.variable_id).collect();
        for &param in &params {
            self.validate_variable(param, VariableScope::FunctionParam);
        }

        self.current_function = Some(id);
        self.scopes.push(params);
        self.validate_block(body);
        self.scopes.pop();
        self.current_function = None;
    }

    fn validate_block(&mut self, block: &Block) {
        self.scopes.push(HashSet::new());
        for statement in &block.statements {
            self.validate_statement(statement);
        }
        self.scopes.pop();
    }

    fn validate_statement(&mut self, statement: &Statement) {
        match statement {
            &Statement::Declare(id, ref initializer) => {
                if let Some(initializer) = initializer {
                    self.validate_expression(initializer);
                }
                self.validate_variable(id, VariableScope::Local);
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(id);
                }
            }
            Statement::Expression(expression) => self.validate_expression(expression),
            Statement::Assign(lhs, rhs) => {
                self.validate_expression(lhs);
                self.validate_expression(rhs);
            }
            Statement::If(condition, true_block, false_block) => {
                self.validate_expression(condition);
                self.validate_block(true_block);
                if let Some(false_block) = false_block {
                    self.validate_block(false_block);
                }
            }
            Statement::Loop(condition, body) => {
                self.validate_expression(condition);
                self.validate_block(body);
            }
            Statement::Block(block) => self.validate_block(block),
            Statement::Return(value) => {
                let Some(function_id) = self.current_function else {
                    self.on_error(format_args!("return outside a function"));
                    return;
                };
                let returns_void =
                    self.ir.meta.get_function(function_id).return_type_id == TYPE_ID_VOID;
                if returns_void != value.is_none() {
                    self.on_error(format_args!(
                        "return value of function {} does not match its return type",
                        function_id.id
                    ));
                }
                if let Some(value) = value {
                    self.validate_expression(value);
                }
            }
            Statement::Break | Statement::Continue | Statement::Discard => {}
        }
    }

    fn is_accessible(&self, id: VariableId) -> bool {
        self.global_variables.contains(&id) || self.scopes.iter().any(|scope| scope.contains(&id))
    }

    fn validate_expression(&self, expression: &Expression) {
        let ir_meta = &self.ir.meta;
        match expression {
            Expression::Constant(_) => {}
            &Expression::Symbol(id) => {
                if !self.is_accessible(id) {
                    self.on_error(format_args!("variable {} is not declared in scope", id.id));
                }
                if ir_meta.get_variable(id).is_dead_code_eliminated {
                    self.on_error(format_args!("variable {} is eliminated but referenced", id.id));
                }
            }
            Expression::AccessField(base, field) => {
                self.validate_expression(base);
                let base_type = ir_meta.get_type(util::expression_type(ir_meta, base));
                if !base_type.is_struct() {
                    self.on_error(format_args!("field {field} selected from a non-struct"));
                } else if *field as usize >= base_type.get_struct_fields().len() {
                    self.on_error(format_args!("field {field} is out of range"));
                }
            }
            Expression::Index(base, index) => {
                self.validate_expression(base);
                self.validate_expression(index);
                let base_type = ir_meta.get_type(util::expression_type(ir_meta, base));
                if base_type.get_element_type_id().is_none() {
                    self.on_error(format_args!("indexing a type that is not indexable"));
                }
            }
            Expression::Unary(_, operand) | Expression::AddressOf(operand) => {
                self.validate_expression(operand)
            }
            Expression::Binary(_, lhs, rhs) | Expression::Texture(lhs, rhs) => {
                self.validate_expression(lhs);
                self.validate_expression(rhs);
            }
            Expression::Construct(_, args) => {
                args.iter().for_each(|arg| self.validate_expression(arg))
            }
            Expression::Call(function_id, args) => {
                args.iter().for_each(|arg| self.validate_expression(arg));
                if !self.declared_functions.contains(function_id) {
                    self.on_error(format_args!("call to undeclared function {}", function_id.id));
                }
                let param_count = ir_meta.get_function(*function_id).params.len();
                if param_count != args.len() {
                    self.on_error(format_args!(
                        "call to function {} with {} arguments instead of {param_count}",
                        function_id.id,
                        args.len()
                    ));
                }
            }
        }
    }

    // Helper Function to log the invalid IR and then panic!
    fn on_error(&self, validation_error_msg: fmt::Arguments) {
        tracing::error!("Invalid ANGLE IR:\n{}", debug::dump(self.ir));
        panic!("Internal error: Invalid ANGLE IR! {validation_error_msg}");
    }
}

#[cfg(all(test, debug_assertions))]
mod tests {
    use super::*;
    use crate::test_builder::TestBuilder;

    #[test]
    fn valid_ir_passes() {
        let mut builder = TestBuilder::new(ShaderType::Fragment);
        let color = builder.output("color", TYPE_ID_VEC4);
        let helper = builder.function("helper", &[("x", TYPE_ID_FLOAT)], TYPE_ID_FLOAT);
        let x = builder.param(helper, 0);
        builder.define(helper, vec![Statement::Return(Some(Expression::symbol(x)))]);
        let local = builder.local("l", TYPE_ID_FLOAT);
        builder.main(vec![
            Statement::Declare(local, Some(Expression::call(helper, vec![Expression::float(1.0)]))),
            Statement::assign(
                Expression::index(Expression::symbol(color), Expression::int(0)),
                Expression::symbol(local),
            ),
        ]);

        validate(&builder.build());
    }

    #[test]
    #[should_panic(expected = "not declared in scope")]
    fn local_used_outside_its_block_fails() {
        let mut builder = TestBuilder::new(ShaderType::Vertex);
        let local = builder.local("l", TYPE_ID_FLOAT);
        builder.main(vec![
            Statement::Block(Block::from_statements(vec![Statement::Declare(local, None)])),
            Statement::Expression(Expression::symbol(local)),
        ]);

        validate(&builder.build());
    }

    #[test]
    #[should_panic(expected = "arguments instead of 1")]
    fn call_arity_mismatch_fails() {
        let mut builder = TestBuilder::new(ShaderType::Vertex);
        let helper = builder.function("helper", &[("x", TYPE_ID_FLOAT)], TYPE_ID_VOID);
        builder.define(helper, vec![]);
        builder.main(vec![Statement::call(helper, vec![])]);

        validate(&builder.build());
    }

    #[test]
    #[should_panic(expected = "does not match its return type")]
    fn missing_return_value_fails() {
        let mut builder = TestBuilder::new(ShaderType::Vertex);
        let helper = builder.function("helper", &[], TYPE_ID_FLOAT);
        builder.define(helper, vec![Statement::Return(None)]);
        builder.main(vec![]);

        validate(&builder.build());
    }
}
