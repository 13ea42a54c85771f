// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Helpers to build IR by hand in tests, standing in for the front end.

use crate::ir::*;

pub struct TestBuilder {
    ir: IR,
}

impl TestBuilder {
    pub fn new(shader_type: ShaderType) -> TestBuilder {
        TestBuilder { ir: IR::new(shader_type) }
    }

    pub fn meta(&mut self) -> &mut IRMeta {
        &mut self.ir.meta
    }

    // Declare a global variable and add its declaration to the tree.
    pub fn global(
        &mut self,
        name: Name,
        type_id: TypeId,
        decorations: Vec<Decoration>,
        built_in: Option<BuiltIn>,
        initializer: Option<ConstantValue>,
    ) -> VariableId {
        let id = self.ir.meta.declare_variable(
            name,
            type_id,
            Precision::High,
            Decorations::new(decorations),
            built_in,
            initializer,
            VariableScope::Global,
        );
        self.ir.globals.push(Global::Variable(id));
        id
    }

    pub fn input(&mut self, name: &str, type_id: TypeId) -> VariableId {
        self.global(Name::new_interface(name), type_id, vec![Decoration::Input], None, None)
    }

    pub fn output(&mut self, name: &str, type_id: TypeId) -> VariableId {
        self.global(Name::new_interface(name), type_id, vec![Decoration::Output], None, None)
    }

    pub fn uniform(&mut self, name: &str, type_id: TypeId) -> VariableId {
        self.global(Name::new_interface(name), type_id, vec![Decoration::Uniform], None, None)
    }

    pub fn built_in(&mut self, name: &str, type_id: TypeId, built_in: BuiltIn) -> VariableId {
        self.global(Name::new_exact(name), type_id, vec![], Some(built_in), None)
    }

    pub fn non_const_global(
        &mut self,
        name: &str,
        type_id: TypeId,
        initializer: Option<ConstantValue>,
    ) -> VariableId {
        self.global(Name::new_temp(name), type_id, vec![], None, initializer)
    }

    // A `sampler2D` uniform, or an array of them.
    pub fn sampler2d(&mut self, name: &str, array_size: Option<u32>) -> VariableId {
        let image_type = ImageType {
            dimension: ImageDimension::D2,
            is_sampled: true,
            is_array: false,
            is_ms: false,
            is_shadow: false,
        };
        let mut type_id = self.ir.meta.get_image_type_id(ImageBasicType::Float, image_type);
        if let Some(size) = array_size {
            type_id = self.ir.meta.get_array_type_id(type_id, size);
        }
        self.uniform(name, type_id)
    }

    pub fn local(&mut self, name: &str, type_id: TypeId) -> VariableId {
        self.ir.meta.declare_variable(
            Name::new_temp(name),
            type_id,
            Precision::High,
            Decorations::new_none(),
            None,
            None,
            VariableScope::Local,
        )
    }

    // Declare a function with `in` parameters.  Its definition is added with `define`.
    pub fn function(
        &mut self,
        name: &str,
        params: &[(&str, TypeId)],
        return_type_id: TypeId,
    ) -> FunctionId {
        let params = params
            .iter()
            .map(|&(param_name, type_id)| {
                let variable_id = self.ir.meta.declare_variable(
                    Name::new_temp(param_name),
                    type_id,
                    Precision::High,
                    Decorations::new_none(),
                    None,
                    None,
                    VariableScope::FunctionParam,
                );
                FunctionParam::new(variable_id, FunctionParamDirection::Input)
            })
            .collect();
        let precision =
            if return_type_id == TYPE_ID_VOID { Precision::NotApplicable } else { Precision::High };
        self.ir.meta.add_function(Function::new(name, params, return_type_id, precision))
    }

    pub fn define(&mut self, function_id: FunctionId, statements: Vec<Statement>) {
        self.ir
            .globals
            .push(Global::FunctionDefinition(function_id, Block::from_statements(statements)));
    }

    pub fn param(&self, function_id: FunctionId, index: usize) -> VariableId {
        self.ir.meta.get_function(function_id).params[index].variable_id
    }

    // Declare and define `void main()`.
    pub fn main(&mut self, statements: Vec<Statement>) -> FunctionId {
        let main = self.function("main", &[], TYPE_ID_VOID);
        self.define(main, statements);
        main
    }

    pub fn build(self) -> IR {
        self.ir
    }
}

// The body of main() in the tree, wherever it is.
pub fn main_body(ir: &IR) -> &Block {
    let main = ir.get_main_function_id().unwrap();
    ir.get_function_body(main).unwrap()
}

// The index of a struct declaration in the list of globals.
pub fn position_of_struct(ir: &IR, type_id: TypeId) -> Option<usize> {
    ir.globals.iter().position(|global| global == &Global::Struct(type_id))
}
