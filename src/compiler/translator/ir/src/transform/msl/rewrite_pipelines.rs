// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// In GLSL, the shader inputs, outputs, uniforms, textures and built-ins are global variables.
// Metal doesn't have global variables; all such state is given to the entry point as parameters
// (or returned from it) and has to be passed explicitly to every function that needs it.  This
// transformation gathers the global state in structs, one pipeline at a time (see `pipeline.rs`).
// For each pipeline:
//
// - The global variables that belong to the pipeline are removed and become the fields of a new
//   struct.
// - If the backend requires a different layout, a modified struct is created as well, along with a
//   function that converts between the two (see `modify_struct.rs`).
// - Every function that directly or indirectly references the pipeline variables is given an
//   instance of the struct as an extra parameter, and every call to such a function passes the
//   caller's instance.  Depending on the pipeline, main() declares the struct locally, receives it
//   as a parameter, receives its fields as separate parameters, or returns it.
// - References to the pipeline variables are replaced with accesses to the fields of the struct.
//
// Note that even the shader's own non-constant global variables are gathered this way.

use super::discover_dependent_functions::discover_dependent_functions;
use super::modify_struct;
use super::pipeline::*;
use crate::invariants::Invariants;
use crate::ir::*;
use crate::reflection::Reflection;
use crate::transform::prune_unused_declarations;
use crate::traverser::transformer::{self, GlobalTransform, Rebuild, VisitBody};
use crate::*;

pub struct Options {
    // The instance of the struct holding ANGLE's own uniforms, if any.  It must be a global
    // variable of struct type, decorated as a uniform.  It's threaded through the functions that
    // use it instead of getting a new struct.
    pub angle_uniforms: Option<VariableId>,
}

// Rewrite all pipelines, returning the struct types that were created for them.  If rewriting
// fails, the shader, the invariants and the reflection info are left as they were.
pub fn run(
    ir: &mut IR,
    options: &Options,
    invariants: &mut Invariants,
    reflection: &mut Reflection,
) -> Result<PipelineStructs> {
    let _span = tracing::info_span!("rewrite_pipelines").entered();

    let snapshot = (ir.clone(), invariants.clone(), reflection.clone());

    let result = rewrite_pipelines(ir, options, invariants, reflection);
    if let Err(error) = &result {
        tracing::warn!(%error, "failed to rewrite pipelines");
        (*ir, *invariants, *reflection) = snapshot;
    }
    result
}

fn rewrite_pipelines(
    ir: &mut IR,
    options: &Options,
    invariants: &mut Invariants,
    reflection: &mut Reflection,
) -> Result<PipelineStructs> {
    let mut pipeline_structs = PipelineStructs::default();

    for pipeline_type in PipelineType::ALL {
        let global_instance_variable = match pipeline_type {
            PipelineType::AngleUniforms => options.angle_uniforms,
            _ => None,
        };
        let pipeline = Pipeline::new(pipeline_type, global_instance_variable);
        *pipeline_structs.get_mut(pipeline_type) =
            rewrite_pipeline(ir, &pipeline, invariants, reflection)?;
    }

    Ok(pipeline_structs)
}

fn rewrite_pipeline(
    ir: &mut IR,
    pipeline: &Pipeline,
    invariants: &mut Invariants,
    reflection: &mut Reflection,
) -> Result<PipelineScoped<TypeId>> {
    let pipeline_name = pipeline.pipeline_type.name();

    let info = generate_pipeline_struct(ir, pipeline, invariants)?;
    if info.is_empty() {
        return Ok(PipelineScoped::new_empty());
    }

    let pipeline_functions = discover_dependent_functions(ir, |id| info.is_pipeline_variable(id));
    tracing::debug!(
        pipeline = pipeline_name,
        variables = info.variables.len(),
        modified_struct = !info.pipeline_struct.is_uniform(),
        dependent_functions = pipeline_functions.len(),
        "rewriting pipeline"
    );

    let main_local = create_pipeline_main_local_var(&mut ir.meta, pipeline, info.pipeline_struct);
    let main_local = update_pipeline_functions(
        ir,
        pipeline,
        &info,
        &pipeline_functions,
        main_local,
        reflection,
    )?;
    update_pipeline_symbols(ir, pipeline, &info, main_local)?;

    // The global variables are no longer referenced anywhere.
    for &variable_id in &info.variables {
        ir.meta.dead_code_eliminate_variable(variable_id);
    }

    prune_unused_declarations::run(ir);

    validate_in_debug_build_only!(ir);
    tracing::trace!(pipeline = pipeline_name, "after rewriting pipeline:\n{}", debug::dump(ir));

    Ok(info.pipeline_struct)
}

// What is known about a pipeline after its struct is generated.
#[cfg_attr(debug_assertions, derive(Debug))]
struct PipelineStructInfo {
    // The global variables of the pipeline, in declaration order.  Unless the pipeline has a global
    // instance variable, the index of a variable is the index of its field in the struct.
    variables: Vec<VariableId>,
    pipeline_struct: PipelineScoped<TypeId>,
    // At most one of these is set, and only if the struct is not uniform.
    func_original_to_modified: Option<FunctionId>,
    func_modified_to_original: Option<FunctionId>,
}

impl PipelineStructInfo {
    fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn is_pipeline_variable(&self, variable_id: VariableId) -> bool {
        self.variables.contains(&variable_id)
    }

    fn field_index(&self, variable_id: VariableId) -> Option<u32> {
        self.variables.iter().position(|&id| id == variable_id).map(|index| index as u32)
    }
}

fn expect_totally_full<T: Copy + PartialEq>(scoped: PipelineScoped<T>) -> (T, T) {
    match (scoped.internal, scoped.external) {
        (Some(internal), Some(external)) => (internal, external),
        _ => panic!("Internal error: Expected both internal and external pipeline entities"),
    }
}

// Removes the global variables of the pipeline from the tree.
struct GeneratePipelineStruct<'a> {
    pipeline: &'a Pipeline,
    variables: Vec<VariableId>,
}

impl Rebuild for GeneratePipelineStruct<'_> {
    fn visit_global_variable(
        &mut self,
        ir_meta: &mut IRMeta,
        id: VariableId,
    ) -> Result<GlobalTransform> {
        if !self.pipeline.uses(ir_meta, id) {
            return Ok(GlobalTransform::Keep);
        }

        debug_assert!(!self.variables.contains(&id));
        self.variables.push(id);
        Ok(GlobalTransform::Remove)
    }

    fn visit_function_definition_pre(
        &mut self,
        _ir_meta: &mut IRMeta,
        _id: FunctionId,
    ) -> Result<VisitBody> {
        // Only global declarations are of interest.
        Ok(transformer::SKIP_BODY)
    }
}

fn generate_pipeline_struct(
    ir: &mut IR,
    pipeline: &Pipeline,
    invariants: &mut Invariants,
) -> Result<PipelineStructInfo> {
    let mut generator = GeneratePipelineStruct { pipeline, variables: Vec::new() };
    transformer::rebuild(ir, &mut generator)?;

    let mut info = PipelineStructInfo {
        variables: generator.variables,
        pipeline_struct: PipelineScoped::new_empty(),
        func_original_to_modified: None,
        func_modified_to_original: None,
    };
    if info.is_empty() {
        return Ok(info);
    }

    // The new declarations are placed right before main().  Prototypes of dependent functions that
    // come earlier in the tree thus name the struct ahead of its declaration.
    let main_index = ir.find_main_index().ok_or(Error::MissingMain)?;
    let mut new_globals = Vec::new();

    let internal_struct = match pipeline.global_instance_variable {
        Some(instance) => {
            let type_id = ir.meta.get_variable(instance).type_id;
            debug_assert!(ir.meta.get_type(type_id).is_struct());
            type_id
        }
        None => {
            let type_id = create_internal_pipeline_struct(
                &mut ir.meta,
                pipeline,
                &info.variables,
                invariants,
            );
            new_globals.push(Global::Struct(type_id));
            type_id
        }
    };

    let modified = pipeline.external_struct_modify_config().and_then(|config| {
        modify_struct::try_create_modified_struct(
            &mut ir.meta,
            invariants,
            &config,
            internal_struct,
            pipeline.struct_type_name(Variant::Modified),
        )
    });

    match modified {
        Some(modified) => {
            debug_assert!(pipeline.pipeline_type != PipelineType::Texture);
            // This shouldn't happen by construction.
            debug_assert!(pipeline.global_instance_variable.is_none());

            if pipeline.is_pipeline_out() {
                info.func_original_to_modified = Some(modified.convert_function_id);
            } else {
                info.func_modified_to_original = Some(modified.convert_function_id);
            }
            info.pipeline_struct = PipelineScoped {
                internal: Some(internal_struct),
                external: Some(modified.struct_type_id),
            };
            new_globals.extend(modified.into_globals());
        }
        None => {
            info.pipeline_struct = PipelineScoped::new_uniform(internal_struct);
        }
    }

    ir.insert_globals(main_index, new_globals);

    Ok(info)
}

fn create_internal_pipeline_struct(
    ir_meta: &mut IRMeta,
    pipeline: &Pipeline,
    variables: &[VariableId],
    invariants: &mut Invariants,
) -> TypeId {
    let mut fields = Vec::with_capacity(variables.len());
    let mut invariant_fields = Vec::new();

    for (index, &variable_id) in variables.iter().enumerate() {
        let variable = ir_meta.get_variable(variable_id).clone();

        let field = match pipeline.pipeline_type {
            PipelineType::Texture => {
                debug_assert!(!invariants.contains_variable(variable_id));
                Field::new(
                    variable.name,
                    texture_env_type_id(ir_meta, variable.type_id),
                    Precision::NotApplicable,
                    variable.decorations,
                    None,
                )
            }
            _ => {
                if invariants.contains_variable(variable_id) {
                    invariant_fields.push(index as u32);
                }
                Field::new(
                    variable.name,
                    variable.type_id,
                    variable.precision,
                    variable.decorations,
                    variable.built_in,
                )
            }
        };
        fields.push(field);
    }

    let struct_type_id =
        util::create_struct_type(ir_meta, pipeline.struct_type_name(Variant::Original), fields);
    for field in invariant_fields {
        invariants.insert_field(struct_type_id, field);
    }

    struct_type_id
}

// A sampler is replaced by its texture environment, keeping the array size if any.
fn texture_env_type_id(ir_meta: &mut IRMeta, type_id: TypeId) -> TypeId {
    match *ir_meta.get_type(type_id) {
        Type::Image(basic_type, image_type) => {
            ir_meta.get_texture_env_type_id(basic_type, image_type)
        }
        Type::Array(element_type_id, size) => {
            // Arrays of arrays of samplers are not allowed.
            debug_assert!(!ir_meta.get_type(element_type_id).is_array());
            let element_env_type_id = texture_env_type_id(ir_meta, element_type_id);
            ir_meta.get_array_type_id(element_env_type_id, size)
        }
        _ => panic!("Internal error: Expected a sampler type"),
    }
}

// Decide which local variables main() needs to hold the pipeline struct(s).
fn create_pipeline_main_local_var(
    ir_meta: &mut IRMeta,
    pipeline: &Pipeline,
    pipeline_struct: PipelineScoped<TypeId>,
) -> PipelineScoped<VariableId> {
    let (internal_struct, external_struct) = expect_totally_full(pipeline_struct);

    let mut main_local = PipelineScoped::new_empty();

    let create_distinct_internal = |ir_meta: &mut IRMeta| {
        util::create_instance_variable(
            ir_meta,
            internal_struct,
            pipeline.struct_instance_name(Variant::Original),
            VariableScope::Local,
        )
    };

    if pipeline.pipeline_type == PipelineType::InstanceId {
        // The external instance is the parameter of main(), created when main() is updated.
        main_local.internal = Some(create_distinct_internal(ir_meta));
    } else if pipeline.always_requires_local_variable_declaration_in_main() {
        let external_name = pipeline.struct_instance_name(if pipeline_struct.is_uniform() {
            Variant::Original
        } else {
            Variant::Modified
        });
        let external = util::create_instance_variable(
            ir_meta,
            external_struct,
            external_name,
            VariableScope::Local,
        );
        main_local.external = Some(external);
        main_local.internal = Some(if pipeline_struct.is_uniform() {
            external
        } else {
            create_distinct_internal(ir_meta)
        });
    } else if !pipeline_struct.is_uniform() {
        main_local.internal = Some(create_distinct_internal(ir_meta));
    }

    main_local
}

// The instance of the internal struct that a (updated) function works with.
fn get_internal_pipeline_variable(
    ir_meta: &IRMeta,
    pipeline: &Pipeline,
    pipeline_struct: PipelineScoped<TypeId>,
    main_local: PipelineScoped<VariableId>,
    function_id: FunctionId,
) -> Result<VariableId> {
    let function = ir_meta.get_function(function_id);

    if function.is_main()
        && (pipeline.always_requires_local_variable_declaration_in_main()
            || !main_local.is_uniform())
    {
        return Ok(main_local
            .internal
            .unwrap_or_else(|| panic!("Internal error: Missing pipeline local variable in main")));
    }

    function
        .get_param(0)
        .filter(|&param| Some(ir_meta.get_variable(param).type_id) == pipeline_struct.internal)
        .ok_or_else(|| Error::MissingInstanceParam {
            function: function.name.name.clone(),
            pipeline: pipeline.pipeline_type.name(),
        })
}

// Creates the updated version of pipeline functions, and remembers the mapping.
struct PipelineFunctionEnv<'a> {
    pipeline: &'a Pipeline,
    pipeline_functions: &'a HashSet<FunctionId>,
    pipeline_struct: PipelineScoped<TypeId>,
    main_local: PipelineScoped<VariableId>,
    reflection: &'a mut Reflection,

    // Maps original functions to their updated version, and updated functions to themselves.
    function_map: HashMap<FunctionId, FunctionId>,
}

impl<'a> PipelineFunctionEnv<'a> {
    fn new(
        pipeline: &'a Pipeline,
        pipeline_functions: &'a HashSet<FunctionId>,
        pipeline_struct: PipelineScoped<TypeId>,
        main_local: PipelineScoped<VariableId>,
        reflection: &'a mut Reflection,
    ) -> Self {
        debug_assert!(pipeline_struct.is_totally_full());
        PipelineFunctionEnv {
            pipeline,
            pipeline_functions,
            pipeline_struct,
            main_local,
            reflection,
            function_map: HashMap::new(),
        }
    }

    fn is_original_pipeline_function(&self, function_id: FunctionId) -> bool {
        self.pipeline_functions.contains(&function_id)
    }

    fn is_updated_pipeline_function(&self, function_id: FunctionId) -> bool {
        self.function_map.get(&function_id) == Some(&function_id)
    }

    fn get_updated_function(
        &mut self,
        ir_meta: &mut IRMeta,
        function_id: FunctionId,
    ) -> Result<FunctionId> {
        debug_assert!(
            self.is_original_pipeline_function(function_id)
                || self.is_updated_pipeline_function(function_id)
        );

        if let Some(&updated) = self.function_map.get(&function_id) {
            return Ok(updated);
        }

        let updated = if ir_meta.get_function(function_id).is_main() {
            self.update_main(ir_meta, function_id)?
        } else {
            let (internal_struct, _) = expect_totally_full(self.pipeline_struct);
            let param = util::create_function_param(
                ir_meta,
                self.pipeline.struct_instance_name(Variant::Original),
                internal_struct,
                Precision::NotApplicable,
            );
            ir_meta.mark_as_reference(
                param.variable_id,
                if self.main_local.is_uniform() {
                    self.pipeline.external_address_space()
                } else {
                    AddressSpace::Thread
                },
            );
            util::clone_function_and_prepend_param(ir_meta, function_id, param)
        };

        self.function_map.insert(function_id, updated);
        self.function_map.insert(updated, updated);
        Ok(updated)
    }

    fn update_main(&mut self, ir_meta: &mut IRMeta, main: FunctionId) -> Result<FunctionId> {
        let (internal_struct, external_struct) = expect_totally_full(self.pipeline_struct);

        let updated = match self.pipeline.entry_shape() {
            EntryShape::ReturnExternalStruct => {
                if ir_meta.get_function(main).return_type_id != TYPE_ID_VOID {
                    return Err(Error::NonVoidMain { pipeline: self.pipeline.pipeline_type.name() });
                }
                util::clone_function_and_change_return_type(ir_meta, main, external_struct)
            }
            EntryShape::AppendFieldParams => {
                let fields = ir_meta.get_type(external_struct).get_struct_fields().to_vec();
                let params: Vec<FunctionParam> = fields
                    .into_iter()
                    .map(|field| {
                        let param = util::create_function_param(
                            ir_meta,
                            field.name,
                            field.type_id,
                            field.precision,
                        );
                        // The parameter now stands for the built-in.
                        ir_meta.get_variable_mut(param.variable_id).built_in = field.built_in;
                        param
                    })
                    .collect();
                util::clone_function_and_append_params(ir_meta, main, params)
            }
            EntryShape::AppendTextureParams => {
                let params = self.create_texture_params(ir_meta, external_struct);
                util::clone_function_and_append_params(ir_meta, main, params)
            }
            EntryShape::PrependIndexParam => {
                let param = util::create_function_param(
                    ir_meta,
                    self.pipeline.struct_instance_name(Variant::Modified),
                    TYPE_ID_UINT,
                    Precision::High,
                );
                ir_meta
                    .mark_as_reference(param.variable_id, self.pipeline.external_address_space());
                self.main_local.external = Some(param.variable_id);
                util::clone_function_and_prepend_param(ir_meta, main, param)
            }
            EntryShape::LocalDeclarationOnly => {
                debug_assert!(self.main_local.is_totally_full());
                main
            }
            EntryShape::PrependStructParam => {
                let (struct_type_id, variant) = if self.main_local.is_uniform() {
                    (internal_struct, Variant::Original)
                } else {
                    (external_struct, Variant::Modified)
                };
                let param = util::create_function_param(
                    ir_meta,
                    self.pipeline.struct_instance_name(variant),
                    struct_type_id,
                    Precision::NotApplicable,
                );
                // Stage inputs are taken by value.
                if !self.pipeline.is_pipeline_in() {
                    ir_meta.mark_as_reference(
                        param.variable_id,
                        self.pipeline.external_address_space(),
                    );
                }
                util::clone_function_and_prepend_param(ir_meta, main, param)
            }
        };

        Ok(updated)
    }

    // Every element of every texture field gets a pair of texture and sampler parameters, named
    // after the field and recorded as such for reflection.
    fn create_texture_params(
        &mut self,
        ir_meta: &mut IRMeta,
        external_struct: TypeId,
    ) -> Vec<FunctionParam> {
        let mut params = Vec::new();

        for field in ir_meta.get_type(external_struct).get_struct_fields().to_vec() {
            let (env_type_id, array_size) = texture_env_element(ir_meta, field.type_id);
            let env_fields = ir_meta.get_type(env_type_id).get_struct_fields().to_vec();
            debug_assert!(env_fields.len() == 2);

            for element in 0..array_size.unwrap_or(1) {
                for env_field in &env_fields {
                    let name = match array_size {
                        Some(_) => format!("{}_{}_{element}", field.name.name, env_field.name.name),
                        None => format!("{}_{}", field.name.name, env_field.name.name),
                    };
                    // The environment holds pointers to the handles that are passed in.
                    let handle_type_id =
                        ir_meta.get_type(env_field.type_id).get_element_type_id().unwrap_or_else(
                            || panic!("Internal error: Expected a pointer in texture environment"),
                        );
                    let param = util::create_function_param(
                        ir_meta,
                        Name { name, source: field.name.source },
                        handle_type_id,
                        Precision::NotApplicable,
                    );
                    self.reflection.add_original_name(param.variable_id, &field.name.name);
                    params.push(param);
                }
            }
        }

        params
    }
}

// The texture environment type of a field, and its array size if an array.
fn texture_env_element(ir_meta: &IRMeta, field_type_id: TypeId) -> (TypeId, Option<u32>) {
    match *ir_meta.get_type(field_type_id) {
        Type::Array(element_type_id, size) => (element_type_id, Some(size)),
        _ => (field_type_id, None),
    }
}

// Updates the signature of the pipeline functions and every call to them, and shapes main().
struct UpdatePipelineFunctions<'a> {
    pipeline: &'a Pipeline,
    env: PipelineFunctionEnv<'a>,
    func_original_to_modified: Option<FunctionId>,
    func_modified_to_original: Option<FunctionId>,
    // Constant initializers of the pipeline variables, by field index.  Only non-constant globals
    // keep them.
    initializers: Vec<(u32, ConstantValue)>,
}

impl UpdatePipelineFunctions<'_> {
    fn internal_pipeline_variable(
        &self,
        ir_meta: &IRMeta,
        function_id: FunctionId,
    ) -> Result<VariableId> {
        get_internal_pipeline_variable(
            ir_meta,
            self.pipeline,
            self.env.pipeline_struct,
            self.env.main_local,
            function_id,
        )
    }

    fn external_pipeline_variable(&self, ir_meta: &IRMeta, main: FunctionId) -> Result<VariableId> {
        let function = ir_meta.get_function(main);
        debug_assert!(function.is_main());

        self.env.main_local.external.or_else(|| function.get_param(0)).ok_or_else(|| {
            Error::MissingInstanceParam {
                function: function.name.name.clone(),
                pipeline: self.pipeline.pipeline_type.name(),
            }
        })
    }

    fn internal_local(&self) -> VariableId {
        self.env
            .main_local
            .internal
            .unwrap_or_else(|| panic!("Internal error: Missing pipeline local variable in main"))
    }

    fn call_modified_to_original(
        &self,
        ir_meta: &IRMeta,
        main: FunctionId,
        body: &mut Block,
    ) -> Result<()> {
        if self.pipeline.is_pipeline_out() {
            return Ok(());
        }
        debug_assert!(self.func_modified_to_original.is_some());
        if let Some(convert) = self.func_modified_to_original {
            let modified = self.external_pipeline_variable(ir_meta, main)?;
            body.add_statement(Statement::call(
                convert,
                vec![Expression::symbol(modified), Expression::symbol(self.internal_local())],
            ));
        }
        Ok(())
    }

    fn call_original_to_modified(
        &self,
        ir_meta: &IRMeta,
        main: FunctionId,
        body: &mut Block,
    ) -> Result<()> {
        if !self.pipeline.is_pipeline_out() {
            return Ok(());
        }
        debug_assert!(self.func_original_to_modified.is_some());
        if let Some(convert) = self.func_original_to_modified {
            let modified = self.external_pipeline_variable(ir_meta, main)?;
            body.add_statement(Statement::call(
                convert,
                vec![Expression::symbol(self.internal_local()), Expression::symbol(modified)],
            ));
        }
        Ok(())
    }

    // What main() does before returning the output struct.
    fn output_epilogue(&self, ir_meta: &IRMeta, main: FunctionId) -> Result<Block> {
        let mut epilogue = Block::new();
        if !self.env.main_local.is_uniform() {
            self.call_original_to_modified(ir_meta, main, &mut epilogue)?;
        }
        let external = self.external_pipeline_variable(ir_meta, main)?;
        epilogue.add_statement(Statement::Return(Some(Expression::symbol(external))));
        Ok(epilogue)
    }

    // Copy the field parameters of main() into the local struct.  They are the last parameters.
    fn add_field_param_copies(&self, ir_meta: &IRMeta, main: FunctionId, body: &mut Block) {
        let internal = self.internal_local();
        let internal_struct = ir_meta.get_variable(internal).type_id;
        let field_count = ir_meta.get_type(internal_struct).get_struct_fields().len();
        let params = &ir_meta.get_function(main).params;
        debug_assert!(params.len() >= field_count);

        for (field, param) in params[params.len() - field_count..].iter().enumerate() {
            body.add_statement(Statement::assign(
                Expression::field(Expression::symbol(internal), field as u32),
                Expression::symbol(param.variable_id),
            ));
        }
    }

    // Point the texture environments in the local struct to the texture and sampler parameters of
    // main().  They are the last parameters.
    fn add_texture_env_assignments(
        &self,
        ir_meta: &IRMeta,
        main: FunctionId,
        body: &mut Block,
    ) -> Result<()> {
        let internal = self.internal_local();
        let internal_struct = ir_meta.get_variable(internal).type_id;
        let fields = ir_meta.get_type(internal_struct).get_struct_fields();

        let elements: Vec<(u32, Option<u32>)> = fields
            .iter()
            .enumerate()
            .flat_map(|(index, field)| match texture_env_element(ir_meta, field.type_id) {
                (_, Some(size)) => (0..size).map(|element| (index as u32, Some(element))).collect(),
                (_, None) => vec![(index as u32, None)],
            })
            .collect();

        let params = &ir_meta.get_function(main).params;
        debug_assert!(params.len() >= 2 * elements.len());
        let mut params = params[params.len() - 2 * elements.len()..].iter();

        for (field, element) in elements {
            let field_access = Expression::field(Expression::symbol(internal), field);
            let env = match element {
                Some(element) => Expression::index(field_access, Expression::int(element as i32)),
                None => field_access,
            };

            for env_field in ["texture", "sampler"] {
                let param = params
                    .next()
                    .unwrap_or_else(|| panic!("Internal error: Missing texture parameter"));
                body.add_statement(Statement::assign(
                    util::access_field(ir_meta, env.clone(), env_field)?,
                    Expression::address_of(Expression::symbol(param.variable_id)),
                ));
            }
        }

        Ok(())
    }

    fn visit_main(
        &mut self,
        ir_meta: &mut IRMeta,
        main: FunctionId,
        body: Block,
    ) -> Result<(FunctionId, Block)> {
        if !self.env.is_original_pipeline_function(main)
            && !self.env.is_updated_pipeline_function(main)
        {
            return Ok((main, body));
        }

        let main = self.env.get_updated_function(ir_meta, main)?;
        let main_local = self.env.main_local;
        let mut body = body;

        // Early returns must return the output too.
        if self.pipeline.is_pipeline_out() {
            let epilogue = self.output_epilogue(ir_meta, main)?;
            transformer::for_each_statement(&mut (), &mut body, &|_, statement| match statement {
                Statement::Return(None) => vec![Statement::Block(epilogue.clone())],
                _ => vec![statement],
            });
        }

        let new_body = if self.pipeline.always_requires_local_variable_declaration_in_main() {
            debug_assert!(main_local.is_totally_full());
            let (internal, external) = expect_totally_full(main_local);

            let mut new_body = Block::new();
            new_body.add_variable_declaration(internal);

            match self.pipeline.pipeline_type {
                PipelineType::InvocationVertexGlobals | PipelineType::InvocationFragmentGlobals => {
                    self.add_field_param_copies(ir_meta, main, &mut new_body);
                }
                PipelineType::Texture => {
                    self.add_texture_env_assignments(ir_meta, main, &mut new_body)?;
                }
                PipelineType::InstanceId => {
                    let internal_struct = ir_meta.get_variable(internal).type_id;
                    let field_type_id =
                        ir_meta.get_type(internal_struct).get_struct_field(0).type_id;
                    new_body.add_statement(Statement::assign(
                        Expression::field(Expression::symbol(internal), 0),
                        Expression::Construct(field_type_id, vec![Expression::symbol(external)]),
                    ));
                }
                _ if !main_local.is_uniform() => {
                    new_body.add_variable_declaration(external);
                    self.call_modified_to_original(ir_meta, main, &mut new_body)?;
                }
                _ => {}
            }

            for &(field, value) in &self.initializers {
                new_body.add_statement(Statement::assign(
                    Expression::field(Expression::symbol(internal), field),
                    Expression::Constant(value),
                ));
            }

            new_body.add_statement(Statement::Block(body));

            if !main_local.is_uniform() {
                self.call_original_to_modified(ir_meta, main, &mut new_body)?;
            }

            if self.pipeline.is_pipeline_out() {
                new_body.add_statement(Statement::Return(Some(Expression::symbol(external))));
            }

            new_body
        } else if !main_local.is_uniform() {
            debug_assert!(main_local.external.is_none());

            let mut new_body = Block::new();
            new_body.add_variable_declaration(self.internal_local());
            self.call_modified_to_original(ir_meta, main, &mut new_body)?;
            new_body.add_statement(Statement::Block(body));
            self.call_original_to_modified(ir_meta, main, &mut new_body)?;
            new_body
        } else {
            body
        };

        Ok((main, new_body))
    }
}

impl Rebuild for UpdatePipelineFunctions<'_> {
    fn visit_function_prototype(
        &mut self,
        ir_meta: &mut IRMeta,
        id: FunctionId,
    ) -> Result<FunctionId> {
        if !self.env.is_original_pipeline_function(id) && !self.env.is_updated_pipeline_function(id)
        {
            return Ok(id);
        }
        self.env.get_updated_function(ir_meta, id)
    }

    fn visit_function_definition_post(
        &mut self,
        ir_meta: &mut IRMeta,
        id: FunctionId,
        body: Block,
    ) -> Result<(FunctionId, Block)> {
        if ir_meta.get_function(id).is_main() {
            return self.visit_main(ir_meta, id, body);
        }

        if !self.env.is_original_pipeline_function(id) && !self.env.is_updated_pipeline_function(id)
        {
            return Ok((id, body));
        }
        Ok((self.env.get_updated_function(ir_meta, id)?, body))
    }

    fn visit_call(
        &mut self,
        ir_meta: &mut IRMeta,
        owner: FunctionId,
        callee: FunctionId,
        args: Vec<Expression>,
    ) -> Result<Expression> {
        if !self.env.is_original_pipeline_function(callee) {
            return Ok(Expression::Call(callee, args));
        }

        let new_callee = self.env.get_updated_function(ir_meta, callee)?;
        let new_owner = self.env.get_updated_function(ir_meta, owner)?;
        let instance = self.internal_pipeline_variable(ir_meta, new_owner)?;

        let mut new_args = Vec::with_capacity(args.len() + 1);
        new_args.push(Expression::symbol(instance));
        new_args.extend(args);

        Ok(Expression::Call(new_callee, new_args))
    }
}

fn update_pipeline_functions(
    ir: &mut IR,
    pipeline: &Pipeline,
    info: &PipelineStructInfo,
    pipeline_functions: &HashSet<FunctionId>,
    main_local: PipelineScoped<VariableId>,
    reflection: &mut Reflection,
) -> Result<PipelineScoped<VariableId>> {
    let initializers = match pipeline.pipeline_type {
        PipelineType::NonConstantGlobals => info
            .variables
            .iter()
            .enumerate()
            .filter_map(|(field, &variable_id)| {
                ir.meta.get_variable(variable_id).initializer.map(|value| (field as u32, value))
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut updater = UpdatePipelineFunctions {
        pipeline,
        env: PipelineFunctionEnv::new(
            pipeline,
            pipeline_functions,
            info.pipeline_struct,
            main_local,
            reflection,
        ),
        func_original_to_modified: info.func_original_to_modified,
        func_modified_to_original: info.func_modified_to_original,
        initializers,
    };
    transformer::rebuild(ir, &mut updater)?;

    Ok(updater.env.main_local)
}

// Replaces references to the pipeline variables with accesses to the struct fields.
struct UpdatePipelineSymbols<'a> {
    pipeline: &'a Pipeline,
    info: &'a PipelineStructInfo,
    main_local: PipelineScoped<VariableId>,
}

impl Rebuild for UpdatePipelineSymbols<'_> {
    fn visit_symbol(
        &mut self,
        ir_meta: &mut IRMeta,
        owner: FunctionId,
        id: VariableId,
    ) -> Result<Expression> {
        let replacement = match self.pipeline.global_instance_variable {
            // The global instance is replaced as a whole.
            Some(instance) if instance == id => None,
            Some(_) => return Ok(Expression::Symbol(id)),
            None => match self.info.field_index(id) {
                Some(field) => Some(field),
                None => return Ok(Expression::Symbol(id)),
            },
        };

        let instance = get_internal_pipeline_variable(
            ir_meta,
            self.pipeline,
            self.info.pipeline_struct,
            self.main_local,
            owner,
        )?;

        Ok(match replacement {
            Some(field) => Expression::field(Expression::symbol(instance), field),
            None => Expression::symbol(instance),
        })
    }
}

fn update_pipeline_symbols(
    ir: &mut IR,
    pipeline: &Pipeline,
    info: &PipelineStructInfo,
    main_local: PipelineScoped<VariableId>,
) -> Result<()> {
    let mut updater = UpdatePipelineSymbols { pipeline, info, main_local };
    transformer::rebuild(ir, &mut updater)
}
