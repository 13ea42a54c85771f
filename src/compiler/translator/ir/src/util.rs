// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Miscellaneous utility functions

use crate::ir::*;
use crate::*;

// Calculates the type of an expression.
pub fn expression_type(ir_meta: &IRMeta, expression: &Expression) -> TypeId {
    match expression {
        Expression::Constant(constant) => constant.type_id(),
        Expression::Symbol(id) => ir_meta.get_variable(*id).type_id,
        Expression::AccessField(base, field) => {
            let base_type_id = expression_type(ir_meta, base);
            ir_meta.get_type(base_type_id).get_struct_field(*field).type_id
        }
        Expression::Index(base, _) => {
            let base_type_id = expression_type(ir_meta, base);
            let base_type = ir_meta.get_type(base_type_id);
            base_type.get_element_type_id().unwrap_or_else(|| {
                panic!("Internal error: Indexing a type that is not indexable")
            })
        }
        Expression::Unary(_, operand) => expression_type(ir_meta, operand),
        Expression::Binary(op, lhs, rhs) => {
            if op.is_comparison_or_logical() {
                TYPE_ID_BOOL
            } else {
                // In scalar op vector and similar, the result takes the type of the non-scalar
                // operand.
                let lhs_type_id = expression_type(ir_meta, lhs);
                if ir_meta.get_type(lhs_type_id).is_scalar() {
                    expression_type(ir_meta, rhs)
                } else {
                    lhs_type_id
                }
            }
        }
        Expression::Construct(type_id, _) => *type_id,
        Expression::Call(function_id, _) => ir_meta.get_function(*function_id).return_type_id,
        Expression::Texture(..) => TYPE_ID_VEC4,
        Expression::AddressOf(operand) => {
            let pointee_type_id = expression_type(ir_meta, operand);
            ir_meta.find_pointer_type_id(pointee_type_id).unwrap_or(pointee_type_id)
        }
    }
}

// Create a struct type out of a list of fields.  The returned type is not yet declared in the
// tree; that's up to the caller, which decides where the declaration goes.
pub fn create_struct_type(ir_meta: &mut IRMeta, name: Name, fields: Vec<Field>) -> TypeId {
    debug_assert!(!fields.is_empty());
    ir_meta.get_struct_type_id(name, fields)
}

// Create a variable that holds an instance of a struct.  Such variables don't carry precision or
// decorations; their fields do.
pub fn create_instance_variable(
    ir_meta: &mut IRMeta,
    struct_type_id: TypeId,
    name: Name,
    scope: VariableScope,
) -> VariableId {
    debug_assert!(ir_meta.get_type(struct_type_id).is_struct());
    ir_meta.declare_variable(
        name,
        struct_type_id,
        Precision::NotApplicable,
        Decorations::new_none(),
        None,
        None,
        scope,
    )
}

// Create an `in` function parameter.
pub fn create_function_param(
    ir_meta: &mut IRMeta,
    name: Name,
    type_id: TypeId,
    precision: Precision,
) -> FunctionParam {
    let variable_id = ir_meta.declare_variable(
        name,
        type_id,
        precision,
        Decorations::new_none(),
        None,
        None,
        VariableScope::FunctionParam,
    );
    FunctionParam::new(variable_id, FunctionParamDirection::Input)
}

// The following create a new function with the same name as the original one, but with a
// different signature.  The parameters of the original function are shared with the clone; the
// original is expected to be replaced by the clone in the tree.
pub fn clone_function_and_prepend_param(
    ir_meta: &mut IRMeta,
    function_id: FunctionId,
    param: FunctionParam,
) -> FunctionId {
    let mut function = ir_meta.get_function(function_id).clone();
    function.params.insert(0, param);
    ir_meta.add_function(function)
}

pub fn clone_function_and_append_params(
    ir_meta: &mut IRMeta,
    function_id: FunctionId,
    params: Vec<FunctionParam>,
) -> FunctionId {
    let mut function = ir_meta.get_function(function_id).clone();
    function.params.extend(params);
    ir_meta.add_function(function)
}

pub fn clone_function_and_change_return_type(
    ir_meta: &mut IRMeta,
    function_id: FunctionId,
    return_type_id: TypeId,
) -> FunctionId {
    let mut function = ir_meta.get_function(function_id).clone();
    function.return_type_id = return_type_id;
    function.return_precision = Precision::NotApplicable;
    ir_meta.add_function(function)
}

// Find a field of a struct by name.
pub fn find_field(ir_meta: &IRMeta, struct_type_id: TypeId, field_name: &str) -> Result<u32> {
    let struct_type = ir_meta.get_type(struct_type_id);
    struct_type
        .get_struct_fields()
        .iter()
        .position(|field| field.name.name == field_name)
        .map(|index| index as u32)
        .ok_or_else(|| Error::MissingField {
            struct_name: struct_type.get_struct_name().name.clone(),
            field: field_name.to_string(),
        })
}

// Select a field of a struct-typed expression by name.
pub fn access_field(ir_meta: &IRMeta, base: Expression, field_name: &str) -> Result<Expression> {
    let struct_type_id = expression_type(ir_meta, &base);
    let index = find_field(ir_meta, struct_type_id, field_name)?;
    Ok(Expression::field(base, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_struct(ir_meta: &mut IRMeta) -> TypeId {
        let fields = vec![
            Field::new(
                Name::new_interface("a"),
                TYPE_ID_FLOAT,
                Precision::High,
                Decorations::new_none(),
                None,
            ),
            Field::new(
                Name::new_interface("b"),
                TYPE_ID_VEC4,
                Precision::High,
                Decorations::new_none(),
                None,
            ),
        ];
        create_struct_type(ir_meta, Name::new_exact("S"), fields)
    }

    #[test]
    fn access_field_by_name() {
        let mut ir_meta = IRMeta::new(ShaderType::Vertex);
        let struct_type_id = make_struct(&mut ir_meta);
        let instance = create_instance_variable(
            &mut ir_meta,
            struct_type_id,
            Name::new_temp("s"),
            VariableScope::Local,
        );

        let access = access_field(&ir_meta, Expression::symbol(instance), "b").unwrap();
        assert_eq!(access, Expression::field(Expression::symbol(instance), 1));
        assert_eq!(expression_type(&ir_meta, &access), TYPE_ID_VEC4);

        let missing = access_field(&ir_meta, Expression::symbol(instance), "c");
        assert!(matches!(missing, Err(Error::MissingField { .. })));
    }

    #[test]
    fn cloned_functions_keep_original_untouched() {
        let mut ir_meta = IRMeta::new(ShaderType::Fragment);
        let original_param = create_function_param(
            &mut ir_meta,
            Name::new_temp("x"),
            TYPE_ID_FLOAT,
            Precision::High,
        );
        let original = ir_meta.add_function(Function::new(
            "f",
            vec![original_param],
            TYPE_ID_VOID,
            Precision::NotApplicable,
        ));

        let prepended =
            create_function_param(&mut ir_meta, Name::new_temp("p"), TYPE_ID_INT, Precision::High);
        let with_prepended = clone_function_and_prepend_param(&mut ir_meta, original, prepended);
        let appended =
            create_function_param(&mut ir_meta, Name::new_temp("q"), TYPE_ID_INT, Precision::High);
        let with_appended =
            clone_function_and_append_params(&mut ir_meta, original, vec![appended]);
        let with_return =
            clone_function_and_change_return_type(&mut ir_meta, original, TYPE_ID_VEC4);

        assert_eq!(ir_meta.get_function(original).params, vec![original_param]);
        assert_eq!(ir_meta.get_function(with_prepended).params, vec![prepended, original_param]);
        assert_eq!(ir_meta.get_function(with_appended).params, vec![original_param, appended]);
        assert_eq!(ir_meta.get_function(with_return).return_type_id, TYPE_ID_VEC4);
        assert_eq!(ir_meta.get_function(with_return).name, ir_meta.get_function(original).name);
    }
}
