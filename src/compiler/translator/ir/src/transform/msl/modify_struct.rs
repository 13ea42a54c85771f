// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// The backend may require a struct to be laid out differently from how the shader declares it;
// for example, Metal does not accept arrays or bools in some interface structs.  Given such a
// struct, this creates a modified copy of it following the backend rules, along with a function
// that converts between the two.

use crate::invariants::Invariants;
use crate::ir::*;
use crate::*;

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ConvertType {
    // Create `void f(in Original, out Modified)`
    OriginalToModified,
    // Create `void f(in Modified, out Original)`
    ModifiedToOriginal,
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ModifyStructConfig {
    pub convert_type: ConvertType,
    // Turn every array field into one field per element.
    pub inline_arrays: bool,
    // Turn bool fields into uint.
    pub saturate_bools: bool,
    // Place the fields that stand for built-ins before the others.
    pub built_ins_first: bool,
}

// The result of a successful modification.
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ModifiedStruct {
    pub struct_type_id: TypeId,
    // The conversion function, in the direction specified by the config, and its body.
    pub convert_function_id: FunctionId,
    pub convert_function_body: Block,
}

impl ModifiedStruct {
    // The global declarations of the modified struct and its conversion function, in the order
    // they should be declared.
    pub fn into_globals(self) -> Vec<Global> {
        vec![
            Global::Struct(self.struct_type_id),
            Global::FunctionDefinition(self.convert_function_id, self.convert_function_body),
        ]
    }
}

#[derive(Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
enum PathStep {
    Field(u32),
    Index(i32),
}

// A field of the modified struct, and where it comes from in the original struct.
struct ModifiedField {
    field: Field,
    original_field: u32,
    original_path: Vec<PathStep>,
    original_type_id: TypeId,
}

// Create the modified struct if the config requires the layout of the original struct to change.
// If the original struct can be used as is, `None` is returned and nothing is created.
pub fn try_create_modified_struct(
    ir_meta: &mut IRMeta,
    invariants: &mut Invariants,
    config: &ModifyStructConfig,
    original_struct_type_id: TypeId,
    modified_struct_name: Name,
) -> Option<ModifiedStruct> {
    let original_fields = ir_meta.get_type(original_struct_type_id).get_struct_fields().to_vec();

    let mut modified_fields = Vec::new();
    let mut changed = false;
    for (index, field) in original_fields.iter().enumerate() {
        let path = vec![PathStep::Field(index as u32)];
        changed = add_modified_fields(
            ir_meta,
            config,
            index as u32,
            field,
            field.name.name.clone(),
            field.type_id,
            path,
            &mut modified_fields,
        ) || changed;
    }

    if config.built_ins_first {
        let order_before: Vec<u32> =
            modified_fields.iter().map(|modified| modified.original_field).collect();

        // Stable partition, so the relative order within the two groups is unchanged.
        let (built_ins, others): (Vec<_>, Vec<_>) =
            modified_fields.into_iter().partition(|modified| modified.field.built_in.is_some());
        modified_fields = built_ins.into_iter().chain(others).collect();

        changed = changed
            || modified_fields.iter().map(|modified| modified.original_field).ne(order_before);
    }

    if !changed {
        return None;
    }

    let modified_struct_type_id = util::create_struct_type(
        ir_meta,
        modified_struct_name.clone(),
        modified_fields.iter().map(|modified| modified.field.clone()).collect(),
    );

    // Carry invariance over to the modified fields.
    for (index, modified) in modified_fields.iter().enumerate() {
        if invariants.contains_field(original_struct_type_id, modified.original_field) {
            invariants.insert_field(modified_struct_type_id, index as u32);
        }
    }

    let (convert_function_id, convert_function_body) = create_convert_function(
        ir_meta,
        config.convert_type,
        original_struct_type_id,
        modified_struct_type_id,
        &modified_struct_name,
        &modified_fields,
    );

    Some(ModifiedStruct {
        struct_type_id: modified_struct_type_id,
        convert_function_id,
        convert_function_body,
    })
}

// Add the modified field(s) corresponding to a field (or array element) of the original struct.
// Returns whether the field had to be modified.
#[allow(clippy::too_many_arguments)]
fn add_modified_fields(
    ir_meta: &mut IRMeta,
    config: &ModifyStructConfig,
    original_field: u32,
    field: &Field,
    name: String,
    type_id: TypeId,
    path: Vec<PathStep>,
    modified_fields: &mut Vec<ModifiedField>,
) -> bool {
    if config.inline_arrays {
        if let &Type::Array(element_type_id, size) = ir_meta.get_type(type_id) {
            for element in 0..size {
                let mut element_path = path.clone();
                element_path.push(PathStep::Index(element as i32));
                add_modified_fields(
                    ir_meta,
                    config,
                    original_field,
                    field,
                    format!("{name}_{element}"),
                    element_type_id,
                    element_path,
                    modified_fields,
                );
            }
            return true;
        }
    }

    let modified_type_id =
        if config.saturate_bools { saturate_bool_type(ir_meta, type_id) } else { type_id };

    modified_fields.push(ModifiedField {
        field: Field::new(
            Name { name, source: field.name.source },
            modified_type_id,
            field.precision,
            field.decorations.clone(),
            field.built_in,
        ),
        original_field,
        original_path: path,
        original_type_id: type_id,
    });

    modified_type_id != type_id
}

// bool and bvecN become uint and uvecN, including as array elements.
fn saturate_bool_type(ir_meta: &mut IRMeta, type_id: TypeId) -> TypeId {
    match *ir_meta.get_type(type_id) {
        Type::Scalar(BasicType::Bool) => TYPE_ID_UINT,
        Type::Vector(TYPE_ID_BOOL, size) => ir_meta.get_vector_type_id(BasicType::Uint, size),
        Type::Array(element_type_id, size) => {
            let saturated_element_type_id = saturate_bool_type(ir_meta, element_type_id);
            if saturated_element_type_id == element_type_id {
                type_id
            } else {
                ir_meta.get_array_type_id(saturated_element_type_id, size)
            }
        }
        _ => type_id,
    }
}

fn apply_path(base: Expression, path: &[PathStep]) -> Expression {
    path.iter().fold(base, |expression, step| match *step {
        PathStep::Field(field) => Expression::field(expression, field),
        PathStep::Index(index) => Expression::index(expression, Expression::int(index)),
    })
}

// Copy `source` into `destination`, converting between bool and uint types if they differ.
fn add_copy(
    ir_meta: &IRMeta,
    body: &mut Block,
    destination: Expression,
    destination_type_id: TypeId,
    source: Expression,
    source_type_id: TypeId,
) {
    if destination_type_id == source_type_id {
        body.add_statement(Statement::assign(destination, source));
        return;
    }

    match (ir_meta.get_type(destination_type_id), ir_meta.get_type(source_type_id)) {
        (&Type::Array(destination_element, size), &Type::Array(source_element, source_size)) => {
            debug_assert!(size == source_size);
            for element in 0..size as i32 {
                add_copy(
                    ir_meta,
                    body,
                    Expression::index(destination.clone(), Expression::int(element)),
                    destination_element,
                    Expression::index(source.clone(), Expression::int(element)),
                    source_element,
                );
            }
        }
        _ => body.add_statement(Statement::assign(
            destination,
            Expression::Construct(destination_type_id, vec![source]),
        )),
    }
}

fn create_convert_function(
    ir_meta: &mut IRMeta,
    convert_type: ConvertType,
    original_struct_type_id: TypeId,
    modified_struct_type_id: TypeId,
    modified_struct_name: &Name,
    modified_fields: &[ModifiedField],
) -> (FunctionId, Block) {
    let original_param = ir_meta.declare_variable(
        Name::new_temp("original"),
        original_struct_type_id,
        Precision::NotApplicable,
        Decorations::new_none(),
        None,
        None,
        VariableScope::FunctionParam,
    );
    let modified_param = ir_meta.declare_variable(
        Name::new_temp("modified"),
        modified_struct_type_id,
        Precision::NotApplicable,
        Decorations::new_none(),
        None,
        None,
        VariableScope::FunctionParam,
    );

    let (name, params) = match convert_type {
        ConvertType::OriginalToModified => (
            format!("{}_fromOriginal", modified_struct_name.name),
            vec![
                FunctionParam::new(original_param, FunctionParamDirection::Input),
                FunctionParam::new(modified_param, FunctionParamDirection::Output),
            ],
        ),
        ConvertType::ModifiedToOriginal => (
            format!("{}_toOriginal", modified_struct_name.name),
            vec![
                FunctionParam::new(modified_param, FunctionParamDirection::Input),
                FunctionParam::new(original_param, FunctionParamDirection::Output),
            ],
        ),
    };

    let mut body = Block::new();
    for (index, modified) in modified_fields.iter().enumerate() {
        let modified_access = Expression::field(Expression::symbol(modified_param), index as u32);
        let original_access =
            apply_path(Expression::symbol(original_param), &modified.original_path);
        match convert_type {
            ConvertType::OriginalToModified => add_copy(
                ir_meta,
                &mut body,
                modified_access,
                modified.field.type_id,
                original_access,
                modified.original_type_id,
            ),
            ConvertType::ModifiedToOriginal => add_copy(
                ir_meta,
                &mut body,
                original_access,
                modified.original_type_id,
                modified_access,
                modified.field.type_id,
            ),
        }
    }

    let mut function = Function::new(&name, params, TYPE_ID_VOID, Precision::NotApplicable);
    function.name = Name::new_exact(name);
    (ir_meta.add_function(function), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn field(name: &str, type_id: TypeId, built_in: Option<BuiltIn>) -> Field {
        Field::new(
            Name::new_interface(name),
            type_id,
            Precision::High,
            Decorations::new_none(),
            built_in,
        )
    }

    fn config(convert_type: ConvertType) -> ModifyStructConfig {
        ModifyStructConfig {
            convert_type,
            inline_arrays: false,
            saturate_bools: false,
            built_ins_first: false,
        }
    }

    fn field_names(ir_meta: &IRMeta, type_id: TypeId) -> Vec<String> {
        ir_meta
            .get_type(type_id)
            .get_struct_fields()
            .iter()
            .map(|field| field.name.name.clone())
            .collect()
    }

    #[test]
    fn unchanged_layout_creates_nothing() {
        let mut ir_meta = IRMeta::new(ShaderType::Vertex);
        let mut invariants = Invariants::new();
        let array_type_id = ir_meta.get_array_type_id(TYPE_ID_FLOAT, 2);
        let original = util::create_struct_type(
            &mut ir_meta,
            Name::new_exact("S"),
            vec![field("a", TYPE_ID_VEC4, None), field("b", array_type_id, None)],
        );
        let type_count = ir_meta.all_types().len();

        let mut config = config(ConvertType::ModifiedToOriginal);
        config.saturate_bools = true;
        config.built_ins_first = true;
        let result = try_create_modified_struct(
            &mut ir_meta,
            &mut invariants,
            &config,
            original,
            Name::new_exact("S_metal"),
        );

        assert!(result.is_none());
        assert_eq!(ir_meta.all_types().len(), type_count);
    }

    #[test]
    fn inline_arrays_flattens_elements() {
        let mut ir_meta = IRMeta::new(ShaderType::Vertex);
        let mut invariants = Invariants::new();
        let inner_type_id = ir_meta.get_array_type_id(TYPE_ID_FLOAT, 2);
        let outer_type_id = ir_meta.get_array_type_id(inner_type_id, 2);
        let original = util::create_struct_type(
            &mut ir_meta,
            Name::new_exact("S"),
            vec![field("a", TYPE_ID_VEC4, None), field("b", outer_type_id, None)],
        );
        invariants.insert_field(original, 1);

        let mut config = config(ConvertType::ModifiedToOriginal);
        config.inline_arrays = true;
        let modified = try_create_modified_struct(
            &mut ir_meta,
            &mut invariants,
            &config,
            original,
            Name::new_exact("S_metal"),
        )
        .unwrap();

        assert_eq!(
            field_names(&ir_meta, modified.struct_type_id),
            vec!["a", "b_0_0", "b_0_1", "b_1_0", "b_1_1"]
        );
        assert!(!invariants.contains_field(modified.struct_type_id, 0));
        assert!((1..5).all(|field| invariants.contains_field(modified.struct_type_id, field)));

        // One assignment per modified field, from the modified param into the original param.
        let function = ir_meta.get_function(modified.convert_function_id);
        assert_eq!(function.params[0].direction, FunctionParamDirection::Input);
        assert_eq!(function.params[1].direction, FunctionParamDirection::Output);
        let modified_param = function.params[0].variable_id;
        let original_param = function.params[1].variable_id;
        assert_eq!(ir_meta.get_variable(modified_param).type_id, modified.struct_type_id);
        assert_eq!(modified.convert_function_body.statements.len(), 5);
        assert_eq!(
            modified.convert_function_body.statements[2],
            Statement::assign(
                Expression::index(
                    Expression::index(
                        Expression::field(Expression::symbol(original_param), 1),
                        Expression::int(0)
                    ),
                    Expression::int(1)
                ),
                Expression::field(Expression::symbol(modified_param), 2),
            )
        );
    }

    #[test]
    fn saturate_bools_converts_values() {
        let mut ir_meta = IRMeta::new(ShaderType::Fragment);
        let mut invariants = Invariants::new();
        let original = util::create_struct_type(
            &mut ir_meta,
            Name::new_exact("S"),
            vec![field("flag", TYPE_ID_BOOL, None), field("flags", TYPE_ID_BVEC3, None)],
        );

        let mut config = config(ConvertType::ModifiedToOriginal);
        config.saturate_bools = true;
        let modified = try_create_modified_struct(
            &mut ir_meta,
            &mut invariants,
            &config,
            original,
            Name::new_exact("S_metal"),
        )
        .unwrap();

        let modified_type = ir_meta.get_type(modified.struct_type_id);
        assert_eq!(modified_type.get_struct_field(0).type_id, TYPE_ID_UINT);
        assert_eq!(modified_type.get_struct_field(1).type_id, TYPE_ID_UVEC3);

        let function = ir_meta.get_function(modified.convert_function_id);
        let modified_param = function.params[0].variable_id;
        let original_param = function.params[1].variable_id;
        assert_eq!(
            modified.convert_function_body.statements[0],
            Statement::assign(
                Expression::field(Expression::symbol(original_param), 0),
                Expression::Construct(
                    TYPE_ID_BOOL,
                    vec![Expression::field(Expression::symbol(modified_param), 0)]
                ),
            )
        );
    }

    #[test]
    fn built_ins_first_reorders_and_converts_to_modified() {
        let mut ir_meta = IRMeta::new(ShaderType::Vertex);
        let mut invariants = Invariants::new();
        let original = util::create_struct_type(
            &mut ir_meta,
            Name::new_exact("S"),
            vec![
                field("v", TYPE_ID_VEC2, None),
                field("gl_Position", TYPE_ID_VEC4, Some(BuiltIn::Position)),
                field("w", TYPE_ID_FLOAT, None),
            ],
        );
        invariants.insert_field(original, 1);

        let mut config = config(ConvertType::OriginalToModified);
        config.built_ins_first = true;
        let modified = try_create_modified_struct(
            &mut ir_meta,
            &mut invariants,
            &config,
            original,
            Name::new_exact("S_metal"),
        )
        .unwrap();

        assert_eq!(field_names(&ir_meta, modified.struct_type_id), vec!["gl_Position", "v", "w"]);
        assert!(invariants.contains_field(modified.struct_type_id, 0));

        let function = ir_meta.get_function(modified.convert_function_id);
        let original_param = function.params[0].variable_id;
        let modified_param = function.params[1].variable_id;
        assert_eq!(ir_meta.get_variable(original_param).type_id, original);
        assert_eq!(
            modified.convert_function_body.statements[0],
            Statement::assign(
                Expression::field(Expression::symbol(modified_param), 0),
                Expression::field(Expression::symbol(original_param), 1),
            )
        );
    }

    #[test]
    fn built_ins_already_first_is_unchanged() {
        let mut ir_meta = IRMeta::new(ShaderType::Vertex);
        let mut invariants = Invariants::new();
        let original = util::create_struct_type(
            &mut ir_meta,
            Name::new_exact("S"),
            vec![
                field("gl_Position", TYPE_ID_VEC4, Some(BuiltIn::Position)),
                field("v", TYPE_ID_VEC2, None),
            ],
        );

        let mut config = config(ConvertType::OriginalToModified);
        config.built_ins_first = true;
        assert!(try_create_modified_struct(
            &mut ir_meta,
            &mut invariants,
            &config,
            original,
            Name::new_exact("S_metal"),
        )
        .is_none());
    }
}
