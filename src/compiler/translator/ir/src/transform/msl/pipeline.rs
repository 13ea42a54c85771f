// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// A pipeline is a category of shader state (inputs, outputs, uniforms, textures, etc) that the
// MSL backend gathers in a struct and passes explicitly to the functions that need it, as opposed
// to GLSL, where such state is accessible as global variables.  This file describes the rules of
// each pipeline: which variables belong to it, how its struct is named and laid out, and how the
// entry point receives it.

use super::modify_struct::{ConvertType, ModifyStructConfig};
use crate::ir::*;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum PipelineType {
    InstanceId,
    Texture,
    NonConstantGlobals,
    AngleUniforms,
    UserUniforms,
    VertexIn,
    VertexOut,
    FragmentIn,
    FragmentOut,
    InvocationVertexGlobals,
    InvocationFragmentGlobals,
}

impl PipelineType {
    // The order in which pipelines are rewritten.  A pipeline's classification sees the shader as
    // left by the pipelines before it.
    pub const ALL: [PipelineType; 11] = [
        PipelineType::InstanceId,
        PipelineType::Texture,
        PipelineType::NonConstantGlobals,
        PipelineType::AngleUniforms,
        PipelineType::UserUniforms,
        PipelineType::VertexIn,
        PipelineType::VertexOut,
        PipelineType::FragmentIn,
        PipelineType::FragmentOut,
        PipelineType::InvocationVertexGlobals,
        PipelineType::InvocationFragmentGlobals,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineType::InstanceId => "InstanceId",
            PipelineType::Texture => "TextureEnvs",
            PipelineType::NonConstantGlobals => "NonConstGlobals",
            PipelineType::AngleUniforms => "UniformState",
            PipelineType::UserUniforms => "UserUniforms",
            PipelineType::VertexIn => "VertexIn",
            PipelineType::VertexOut => "VertexOut",
            PipelineType::FragmentIn => "FragmentIn",
            PipelineType::FragmentOut => "FragmentOut",
            PipelineType::InvocationVertexGlobals => "InvocationVertexGlobals",
            PipelineType::InvocationFragmentGlobals => "InvocationFragmentGlobals",
        }
    }

    fn instance_name(&self) -> &'static str {
        match self {
            PipelineType::InstanceId => "instanceId",
            PipelineType::Texture => "textureEnvs",
            PipelineType::NonConstantGlobals => "nonConstGlobals",
            PipelineType::AngleUniforms => "angleUniforms",
            PipelineType::UserUniforms => "userUniforms",
            PipelineType::VertexIn => "vertexIn",
            PipelineType::VertexOut => "vertexOut",
            PipelineType::FragmentIn => "fragmentIn",
            PipelineType::FragmentOut => "fragmentOut",
            PipelineType::InvocationVertexGlobals => "invocationVertexGlobals",
            PipelineType::InvocationFragmentGlobals => "invocationFragmentGlobals",
        }
    }
}

// The name of the variable the front end creates to hold the (possibly modified for multiview)
// instance id.
pub const INSTANCE_ID_VARIABLE_NAME: &str = "ANGLE_instanceIdMod";

// Which flavor of a pipeline struct is meant.  The original struct holds the variables as declared
// in the shader, while the modified struct follows the layout the backend expects.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Variant {
    Original,
    Modified,
}

// How main() receives the pipeline struct.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum EntryShape {
    // main() returns the external struct, which it fills in a local variable.
    ReturnExternalStruct,
    // Every field of the struct is a separate parameter of main().
    AppendFieldParams,
    // Every texture element is a pair of texture and sampler parameters of main().
    AppendTextureParams,
    // main() takes the raw index as its first parameter.
    PrependIndexParam,
    // main() keeps its signature; the struct is only a local variable.
    LocalDeclarationOnly,
    // main() takes the struct as its first parameter.
    PrependStructParam,
}

// A pair of internal and external instances of a pipeline entity (struct type or variable).  The
// internal one is what the shader code works with, the external one is what crosses the boundary
// with the backend.  If the layouts don't differ, both are the same.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct PipelineScoped<T> {
    pub internal: Option<T>,
    pub external: Option<T>,
}

impl<T: Copy + PartialEq> PipelineScoped<T> {
    pub fn new_empty() -> PipelineScoped<T> {
        PipelineScoped { internal: None, external: None }
    }
    pub fn new_uniform(value: T) -> PipelineScoped<T> {
        PipelineScoped { internal: Some(value), external: Some(value) }
    }

    pub fn is_totally_empty(&self) -> bool {
        self.internal.is_none() && self.external.is_none()
    }
    pub fn is_totally_full(&self) -> bool {
        self.internal.is_some() && self.external.is_some()
    }
    // Note that a totally empty pair is also uniform.
    pub fn is_uniform(&self) -> bool {
        self.internal == self.external
    }
}

impl<T: Copy + PartialEq> Default for PipelineScoped<T> {
    fn default() -> Self {
        PipelineScoped::new_empty()
    }
}

#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Pipeline {
    pub pipeline_type: PipelineType,
    // If set, the pipeline does not get a new struct; this variable (which must be a struct
    // instance) is threaded through the functions instead.
    pub global_instance_variable: Option<VariableId>,
}

impl Pipeline {
    pub fn new(pipeline_type: PipelineType, global_instance_variable: Option<VariableId>) -> Self {
        Pipeline { pipeline_type, global_instance_variable }
    }

    // Whether a global variable belongs to this pipeline.
    pub fn uses(&self, ir_meta: &IRMeta, variable_id: VariableId) -> bool {
        let variable = ir_meta.get_variable(variable_id);
        let shader_type = ir_meta.get_shader_type();
        let has = |decoration| variable.decorations.has(decoration);

        match self.pipeline_type {
            PipelineType::InstanceId => {
                variable.name.source == NameSource::Internal
                    && variable.name.name == INSTANCE_ID_VARIABLE_NAME
            }
            PipelineType::Texture => is_sampled_image_or_array(ir_meta, variable.type_id),
            PipelineType::NonConstantGlobals => {
                !variable.is_const && variable.decorations.is_empty() && variable.built_in.is_none()
            }
            PipelineType::AngleUniforms => self.global_instance_variable == Some(variable_id),
            PipelineType::UserUniforms => has(Decoration::Uniform),
            PipelineType::VertexIn => shader_type == ShaderType::Vertex && has(Decoration::Input),
            PipelineType::VertexOut => {
                shader_type == ShaderType::Vertex
                    && (has(Decoration::Output)
                        || matches!(
                            variable.built_in,
                            Some(BuiltIn::Position | BuiltIn::PointSize | BuiltIn::ClipDistance)
                        ))
            }
            PipelineType::FragmentIn => {
                shader_type == ShaderType::Fragment && has(Decoration::Input)
            }
            PipelineType::FragmentOut => {
                shader_type == ShaderType::Fragment
                    && (has(Decoration::Output)
                        || matches!(
                            variable.built_in,
                            Some(
                                BuiltIn::FragColor
                                    | BuiltIn::FragData
                                    | BuiltIn::FragDepth
                                    | BuiltIn::SampleMask
                            )
                        ))
            }
            PipelineType::InvocationVertexGlobals => variable.built_in == Some(BuiltIn::VertexID),
            PipelineType::InvocationFragmentGlobals => matches!(
                variable.built_in,
                Some(
                    BuiltIn::FragCoord
                        | BuiltIn::FrontFacing
                        | BuiltIn::PointCoord
                        | BuiltIn::SampleID
                        | BuiltIn::SamplePosition
                        | BuiltIn::SampleMaskIn
                )
            ),
        }
    }

    pub fn struct_type_name(&self, variant: Variant) -> Name {
        let name = self.pipeline_type.name();
        match variant {
            Variant::Original => Name::new_exact(format!("ANGLE_{name}")),
            Variant::Modified => Name::new_exact(format!("ANGLE_metal_{name}")),
        }
    }

    pub fn struct_instance_name(&self, variant: Variant) -> Name {
        let name = self.pipeline_type.instance_name();
        match variant {
            Variant::Original => Name::new_exact(format!("ANGLE_{name}")),
            Variant::Modified => Name::new_exact(format!("ANGLE_metal_{name}")),
        }
    }

    // The address space main() receives the external struct from.
    pub fn external_address_space(&self) -> AddressSpace {
        match self.pipeline_type {
            PipelineType::AngleUniforms | PipelineType::UserUniforms => AddressSpace::Constant,
            _ => AddressSpace::Thread,
        }
    }

    pub fn always_requires_local_variable_declaration_in_main(&self) -> bool {
        matches!(
            self.pipeline_type,
            PipelineType::VertexOut
                | PipelineType::FragmentOut
                | PipelineType::NonConstantGlobals
                | PipelineType::InvocationVertexGlobals
                | PipelineType::InvocationFragmentGlobals
                | PipelineType::Texture
                | PipelineType::InstanceId
        )
    }

    pub fn is_pipeline_out(&self) -> bool {
        matches!(self.pipeline_type, PipelineType::VertexOut | PipelineType::FragmentOut)
    }

    // Stage inputs are passed to main() by value.
    pub fn is_pipeline_in(&self) -> bool {
        matches!(self.pipeline_type, PipelineType::VertexIn | PipelineType::FragmentIn)
    }

    pub fn entry_shape(&self) -> EntryShape {
        match self.pipeline_type {
            PipelineType::VertexOut | PipelineType::FragmentOut => {
                EntryShape::ReturnExternalStruct
            }
            PipelineType::InvocationVertexGlobals | PipelineType::InvocationFragmentGlobals => {
                EntryShape::AppendFieldParams
            }
            PipelineType::Texture => EntryShape::AppendTextureParams,
            PipelineType::InstanceId => EntryShape::PrependIndexParam,
            PipelineType::NonConstantGlobals => EntryShape::LocalDeclarationOnly,
            PipelineType::AngleUniforms
            | PipelineType::UserUniforms
            | PipelineType::VertexIn
            | PipelineType::FragmentIn => EntryShape::PrependStructParam,
        }
    }

    // How the external struct differs from the internal one, if it can.
    pub fn external_struct_modify_config(&self) -> Option<ModifyStructConfig> {
        match self.pipeline_type {
            PipelineType::VertexIn | PipelineType::FragmentIn => Some(ModifyStructConfig {
                convert_type: ConvertType::ModifiedToOriginal,
                inline_arrays: true,
                saturate_bools: false,
                built_ins_first: false,
            }),
            PipelineType::VertexOut | PipelineType::FragmentOut => Some(ModifyStructConfig {
                convert_type: ConvertType::OriginalToModified,
                inline_arrays: true,
                saturate_bools: false,
                built_ins_first: true,
            }),
            PipelineType::UserUniforms => Some(ModifyStructConfig {
                convert_type: ConvertType::ModifiedToOriginal,
                inline_arrays: false,
                saturate_bools: true,
                built_ins_first: false,
            }),
            PipelineType::InstanceId
            | PipelineType::Texture
            | PipelineType::NonConstantGlobals
            | PipelineType::AngleUniforms
            | PipelineType::InvocationVertexGlobals
            | PipelineType::InvocationFragmentGlobals => None,
        }
    }
}

fn is_sampled_image_or_array(ir_meta: &IRMeta, type_id: TypeId) -> bool {
    let type_info = ir_meta.get_type(type_id);
    match type_info {
        &Type::Array(element_type_id, _) => is_sampled_image_or_array(ir_meta, element_type_id),
        _ => type_info.is_sampled_image(),
    }
}

// The struct types produced for every pipeline, which the backend uses to generate the interface
// of the shader.  Pipelines that matched no variables are totally empty.
#[derive(Default, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct PipelineStructs {
    pub instance_id: PipelineScoped<TypeId>,
    pub texture: PipelineScoped<TypeId>,
    pub non_constant_globals: PipelineScoped<TypeId>,
    pub angle_uniforms: PipelineScoped<TypeId>,
    pub user_uniforms: PipelineScoped<TypeId>,
    pub vertex_in: PipelineScoped<TypeId>,
    pub vertex_out: PipelineScoped<TypeId>,
    pub fragment_in: PipelineScoped<TypeId>,
    pub fragment_out: PipelineScoped<TypeId>,
    pub invocation_vertex_globals: PipelineScoped<TypeId>,
    pub invocation_fragment_globals: PipelineScoped<TypeId>,
}

impl PipelineStructs {
    pub fn get(&self, pipeline_type: PipelineType) -> &PipelineScoped<TypeId> {
        match pipeline_type {
            PipelineType::InstanceId => &self.instance_id,
            PipelineType::Texture => &self.texture,
            PipelineType::NonConstantGlobals => &self.non_constant_globals,
            PipelineType::AngleUniforms => &self.angle_uniforms,
            PipelineType::UserUniforms => &self.user_uniforms,
            PipelineType::VertexIn => &self.vertex_in,
            PipelineType::VertexOut => &self.vertex_out,
            PipelineType::FragmentIn => &self.fragment_in,
            PipelineType::FragmentOut => &self.fragment_out,
            PipelineType::InvocationVertexGlobals => &self.invocation_vertex_globals,
            PipelineType::InvocationFragmentGlobals => &self.invocation_fragment_globals,
        }
    }

    pub fn get_mut(&mut self, pipeline_type: PipelineType) -> &mut PipelineScoped<TypeId> {
        match pipeline_type {
            PipelineType::InstanceId => &mut self.instance_id,
            PipelineType::Texture => &mut self.texture,
            PipelineType::NonConstantGlobals => &mut self.non_constant_globals,
            PipelineType::AngleUniforms => &mut self.angle_uniforms,
            PipelineType::UserUniforms => &mut self.user_uniforms,
            PipelineType::VertexIn => &mut self.vertex_in,
            PipelineType::VertexOut => &mut self.vertex_out,
            PipelineType::FragmentIn => &mut self.fragment_in,
            PipelineType::FragmentOut => &mut self.fragment_out,
            PipelineType::InvocationVertexGlobals => &mut self.invocation_vertex_globals,
            PipelineType::InvocationFragmentGlobals => &mut self.invocation_fragment_globals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declare(ir_meta: &mut IRMeta, name: Name, decorations: Vec<Decoration>) -> VariableId {
        ir_meta.declare_variable(
            name,
            TYPE_ID_VEC4,
            Precision::High,
            Decorations::new(decorations),
            None,
            None,
            VariableScope::Global,
        )
    }

    #[test]
    fn scoped_pair_states() {
        let empty = PipelineScoped::<u32>::new_empty();
        assert!(empty.is_totally_empty() && empty.is_uniform() && !empty.is_totally_full());

        let uniform = PipelineScoped::new_uniform(3u32);
        assert!(uniform.is_totally_full() && uniform.is_uniform());

        let split = PipelineScoped { internal: Some(1u32), external: Some(2u32) };
        assert!(split.is_totally_full() && !split.is_uniform());

        let half = PipelineScoped { internal: Some(1u32), external: None };
        assert!(!half.is_totally_full() && !half.is_totally_empty() && !half.is_uniform());
    }

    #[test]
    fn stage_interface_depends_on_shader_type() {
        let mut vertex = IRMeta::new(ShaderType::Vertex);
        let input = declare(&mut vertex, Name::new_interface("a"), vec![Decoration::Input]);
        assert!(Pipeline::new(PipelineType::VertexIn, None).uses(&vertex, input));
        assert!(!Pipeline::new(PipelineType::FragmentIn, None).uses(&vertex, input));

        let mut fragment = IRMeta::new(ShaderType::Fragment);
        let output = declare(&mut fragment, Name::new_interface("c"), vec![Decoration::Output]);
        assert!(Pipeline::new(PipelineType::FragmentOut, None).uses(&fragment, output));
        assert!(!Pipeline::new(PipelineType::VertexOut, None).uses(&fragment, output));
        assert!(!Pipeline::new(PipelineType::NonConstantGlobals, None).uses(&fragment, output));
    }

    #[test]
    fn supplied_instance_is_only_claimed_by_its_pipeline() {
        let mut ir_meta = IRMeta::new(ShaderType::Vertex);
        let supplied = declare(
            &mut ir_meta,
            Name::new_exact("ANGLE_angleUniforms"),
            vec![Decoration::Uniform],
        );
        let other = declare(&mut ir_meta, Name::new_temp("g"), vec![]);

        let angle_uniforms = Pipeline::new(PipelineType::AngleUniforms, Some(supplied));
        let globals = Pipeline::new(PipelineType::NonConstantGlobals, None);
        assert!(angle_uniforms.uses(&ir_meta, supplied));
        assert!(!angle_uniforms.uses(&ir_meta, other));
        assert!(!globals.uses(&ir_meta, supplied));
        assert!(globals.uses(&ir_meta, other));

        // Without a supplied instance, the pipeline matches nothing.
        assert!(!Pipeline::new(PipelineType::AngleUniforms, None).uses(&ir_meta, supplied));
    }

    #[test]
    fn naming_and_layout_rules() {
        let vertex_out = Pipeline::new(PipelineType::VertexOut, None);
        assert_eq!(vertex_out.struct_type_name(Variant::Original).name, "ANGLE_VertexOut");
        assert_eq!(vertex_out.struct_type_name(Variant::Modified).name, "ANGLE_metal_VertexOut");
        assert_eq!(vertex_out.struct_instance_name(Variant::Original).name, "ANGLE_vertexOut");
        assert_eq!(vertex_out.entry_shape(), EntryShape::ReturnExternalStruct);
        let config = vertex_out.external_struct_modify_config().unwrap();
        assert_eq!(config.convert_type, ConvertType::OriginalToModified);
        assert!(config.built_ins_first);

        let user_uniforms = Pipeline::new(PipelineType::UserUniforms, None);
        assert_eq!(user_uniforms.external_address_space(), AddressSpace::Constant);
        assert!(user_uniforms.external_struct_modify_config().unwrap().saturate_bools);
        assert!(!user_uniforms.always_requires_local_variable_declaration_in_main());

        let texture = Pipeline::new(PipelineType::Texture, None);
        assert!(texture.external_struct_modify_config().is_none());
        assert!(texture.always_requires_local_variable_declaration_in_main());
    }
}
