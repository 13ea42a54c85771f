// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Debug utilities.  Notably, the IR can be dumped as GLSL-like text for inspection.  The output is
// deterministic, so dumps can also be compared to tell whether the IR has changed.

use crate::ir::*;
use crate::*;

const INDENT: &str = "    ";

fn precision_str(precision: Precision) -> &'static str {
    match precision {
        Precision::NotApplicable => "",
        Precision::Low => "lowp",
        Precision::Medium => "mediump",
        Precision::High => "highp",
    }
}

fn shader_type_str(shader_type: ShaderType) -> &'static str {
    match shader_type {
        ShaderType::Vertex => "Vertex Shader",
        ShaderType::Fragment => "Fragment Shader",
        ShaderType::Compute => "Compute Shader",
    }
}

fn basic_type_str(basic: BasicType) -> &'static str {
    match basic {
        BasicType::Void => "void",
        BasicType::Float => "float",
        BasicType::Int => "int",
        BasicType::Uint => "uint",
        BasicType::Bool => "bool",
    }
}

fn vector_prefix(basic: BasicType) -> &'static str {
    match basic {
        BasicType::Float => "vec",
        BasicType::Int => "ivec",
        BasicType::Uint => "uvec",
        BasicType::Bool => "bvec",
        BasicType::Void => panic!("Internal error: Vector of void"),
    }
}

fn image_suffix_str(image_type: ImageType) -> String {
    let dimension = match image_type.dimension {
        ImageDimension::D2 => "2D",
        ImageDimension::D3 => "3D",
        ImageDimension::Cube => "Cube",
    };
    let multisample_suffix = if image_type.is_ms { "MS" } else { "" };
    let array_suffix = if image_type.is_array { "Array" } else { "" };
    let shadow_suffix = if image_type.is_shadow { "Shadow" } else { "" };
    format!("{dimension}{multisample_suffix}{array_suffix}{shadow_suffix}")
}

fn image_type_str(basic_type: ImageBasicType, image_type: ImageType) -> String {
    let prefix = match basic_type {
        ImageBasicType::Float => "",
        ImageBasicType::Int => "i",
        ImageBasicType::Uint => "u",
    };
    let base_name = if image_type.is_sampled { "sampler" } else { "image" };
    format!("{prefix}{base_name}{}", image_suffix_str(image_type))
}

fn texture_type_str(basic_type: ImageBasicType, image_type: ImageType) -> String {
    let component = match basic_type {
        ImageBasicType::Float => "float",
        ImageBasicType::Int => "int",
        ImageBasicType::Uint => "uint",
    };
    format!("texture{}<{component}>", image_suffix_str(image_type).to_lowercase())
}

fn name_str(name: &Name, id: u32) -> String {
    // Temporary names may clash, so they are disambiguated with the id.  Interface names are
    // output with the user prefix.
    match name.source {
        NameSource::ShaderInterface => format!("{USER_SYMBOL_PREFIX}{}", name.name),
        NameSource::Temporary => format!("{}_{id}", name.name),
        NameSource::Internal => name.name.clone(),
    }
}

fn type_str(ir_meta: &IRMeta, type_id: TypeId) -> String {
    match ir_meta.get_type(type_id) {
        &Type::Scalar(basic) => basic_type_str(basic).to_string(),
        &Type::Vector(element_type_id, count) => match ir_meta.get_type(element_type_id) {
            &Type::Scalar(basic) => format!("{}{count}", vector_prefix(basic)),
            _ => panic!("Internal error: Vector of non-scalar type"),
        },
        &Type::Matrix(_, count) => format!("mat{count}"),
        &Type::Image(basic_type, image_type) => image_type_str(basic_type, image_type),
        &Type::Texture(basic_type, image_type) => texture_type_str(basic_type, image_type),
        Type::Sampler => "sampler".to_string(),
        Type::Struct(name, _) => name_str(name, type_id.id),
        &Type::Array(element_type_id, size) => {
            format!("{}[{size}]", type_str(ir_meta, element_type_id))
        }
        &Type::Pointer(pointee_type_id) => format!("{}*", type_str(ir_meta, pointee_type_id)),
        Type::DeadCodeEliminated => "<eliminated>".to_string(),
    }
}

fn decoration_str(decoration: Decoration) -> String {
    match decoration {
        Decoration::Precise => "precise".to_string(),
        Decoration::Smooth => "smooth".to_string(),
        Decoration::Flat => "flat".to_string(),
        Decoration::NoPerspective => "noperspective".to_string(),
        Decoration::Centroid => "centroid".to_string(),
        Decoration::Sample => "sample".to_string(),
        Decoration::Uniform => "uniform".to_string(),
        Decoration::Input => "in".to_string(),
        Decoration::Output => "out".to_string(),
        Decoration::Location(location) => format!("layout(location = {location})"),
        Decoration::Binding(binding) => format!("layout(binding = {binding})"),
    }
}

fn built_in_str(built_in: BuiltIn) -> &'static str {
    match built_in {
        BuiltIn::VertexID => "gl_VertexID",
        BuiltIn::InstanceID => "gl_InstanceID",
        BuiltIn::Position => "gl_Position",
        BuiltIn::PointSize => "gl_PointSize",
        BuiltIn::ClipDistance => "gl_ClipDistance",
        BuiltIn::FragCoord => "gl_FragCoord",
        BuiltIn::FrontFacing => "gl_FrontFacing",
        BuiltIn::PointCoord => "gl_PointCoord",
        BuiltIn::SampleID => "gl_SampleID",
        BuiltIn::SamplePosition => "gl_SamplePosition",
        BuiltIn::SampleMaskIn => "gl_SampleMaskIn",
        BuiltIn::FragColor => "gl_FragColor",
        BuiltIn::FragData => "gl_FragData",
        BuiltIn::FragDepth => "gl_FragDepth",
        BuiltIn::SampleMask => "gl_SampleMask",
    }
}

fn address_space_str(address_space: AddressSpace) -> &'static str {
    match address_space {
        AddressSpace::Thread => "thread",
        AddressSpace::Device => "device",
        AddressSpace::Constant => "constant",
    }
}

// The qualifiers, type and name of a variable or field, e.g. `flat in highp vec4 _ucolor`.
fn declaration_str(
    ir_meta: &IRMeta,
    name: String,
    type_id: TypeId,
    precision: Precision,
    decorations: &Decorations,
    built_in: Option<BuiltIn>,
) -> String {
    let mut parts: Vec<String> =
        decorations.decorations.iter().map(|&decoration| decoration_str(decoration)).collect();
    if precision != Precision::NotApplicable {
        parts.push(precision_str(precision).to_string());
    }
    parts.push(type_str(ir_meta, type_id));
    parts.push(name);
    if let Some(built_in) = built_in {
        parts.push(format!("/* {} */", built_in_str(built_in)));
    }
    parts.join(" ")
}

fn variable_name_str(ir_meta: &IRMeta, id: VariableId) -> String {
    name_str(&ir_meta.get_variable(id).name, id.id)
}

fn variable_declaration_str(ir_meta: &IRMeta, id: VariableId) -> String {
    let variable = ir_meta.get_variable(id);
    let mut result = declaration_str(
        ir_meta,
        variable_name_str(ir_meta, id),
        variable.type_id,
        variable.precision,
        &variable.decorations,
        variable.built_in,
    );
    if variable.is_const {
        result = format!("const {result}");
    }
    if let Some(address_space) = variable.reference {
        // Written the MSL way, as `thread T &x`.
        result = format!(
            "{} {}& {}",
            address_space_str(address_space),
            type_str(ir_meta, variable.type_id),
            variable_name_str(ir_meta, id)
        );
    }
    if let Some(initializer) = variable.initializer {
        result = format!("{result} = {}", constant_str(initializer));
    }
    result
}

fn field_str(ir_meta: &IRMeta, field: &Field, index: usize) -> String {
    declaration_str(
        ir_meta,
        name_str(&field.name, index as u32),
        field.type_id,
        field.precision,
        &field.decorations,
        field.built_in,
    )
}

fn function_name_str(ir_meta: &IRMeta, id: FunctionId) -> String {
    name_str(&ir_meta.get_function(id).name, id.id)
}

fn function_param_direction_str(direction: FunctionParamDirection) -> &'static str {
    match direction {
        FunctionParamDirection::Input => "",
        FunctionParamDirection::Output => "out ",
        FunctionParamDirection::InputOutput => "inout ",
    }
}

fn function_prototype_str(ir_meta: &IRMeta, id: FunctionId) -> String {
    let function = ir_meta.get_function(id);

    let mut return_type = type_str(ir_meta, function.return_type_id);
    if function.return_precision != Precision::NotApplicable {
        return_type = format!("{} {return_type}", precision_str(function.return_precision));
    }

    let params = function
        .params
        .iter()
        .map(|param| {
            format!(
                "{}{}",
                function_param_direction_str(param.direction),
                variable_declaration_str(ir_meta, param.variable_id)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("{return_type} {}({params})", function_name_str(ir_meta, id))
}

fn constant_str(constant: ConstantValue) -> String {
    match constant {
        ConstantValue::Float(value) => format!("{value:?}"),
        ConstantValue::Int(value) => value.to_string(),
        ConstantValue::Uint(value) => format!("{value}u"),
        ConstantValue::Bool(value) => value.to_string(),
    }
}

fn unary_opcode_str(op: UnaryOpCode) -> &'static str {
    match op {
        UnaryOpCode::Negate => "-",
        UnaryOpCode::LogicalNot => "!",
        UnaryOpCode::BitwiseNot => "~",
    }
}

fn binary_opcode_str(op: BinaryOpCode) -> &'static str {
    match op {
        BinaryOpCode::Add => "+",
        BinaryOpCode::Sub => "-",
        BinaryOpCode::Mul => "*",
        BinaryOpCode::Div => "/",
        BinaryOpCode::IMod => "%",
        BinaryOpCode::Equal => "==",
        BinaryOpCode::NotEqual => "!=",
        BinaryOpCode::LessThan => "<",
        BinaryOpCode::GreaterThan => ">",
        BinaryOpCode::LessThanEqual => "<=",
        BinaryOpCode::GreaterThanEqual => ">=",
        BinaryOpCode::LogicalAnd => "&&",
        BinaryOpCode::LogicalOr => "||",
    }
}

fn expression_list_str(ir_meta: &IRMeta, expressions: &[Expression]) -> String {
    expressions
        .iter()
        .map(|expression| expression_str(ir_meta, expression))
        .collect::<Vec<_>>()
        .join(", ")
}

fn expression_str(ir_meta: &IRMeta, expression: &Expression) -> String {
    match expression {
        &Expression::Constant(constant) => constant_str(constant),
        &Expression::Symbol(id) => variable_name_str(ir_meta, id),
        Expression::AccessField(base, field) => {
            let struct_type_id = util::expression_type(ir_meta, base);
            let field_name = &ir_meta.get_type(struct_type_id).get_struct_field(*field).name;
            format!("{}.{}", expression_str(ir_meta, base), name_str(field_name, *field))
        }
        Expression::Index(base, index) => {
            format!("{}[{}]", expression_str(ir_meta, base), expression_str(ir_meta, index))
        }
        Expression::Unary(op, operand) => {
            format!("{}{}", unary_opcode_str(*op), expression_str(ir_meta, operand))
        }
        Expression::Binary(op, lhs, rhs) => format!(
            "({} {} {})",
            expression_str(ir_meta, lhs),
            binary_opcode_str(*op),
            expression_str(ir_meta, rhs)
        ),
        Expression::Construct(type_id, args) => {
            format!("{}({})", type_str(ir_meta, *type_id), expression_list_str(ir_meta, args))
        }
        Expression::Call(function_id, args) => format!(
            "{}({})",
            function_name_str(ir_meta, *function_id),
            expression_list_str(ir_meta, args)
        ),
        Expression::Texture(sampler, coord) => format!(
            "texture({}, {})",
            expression_str(ir_meta, sampler),
            expression_str(ir_meta, coord)
        ),
        Expression::AddressOf(operand) => format!("&{}", expression_str(ir_meta, operand)),
    }
}

fn append_line(result: &mut String, line: String, indent: usize) {
    result.push('\n');
    result.push_str(&INDENT.repeat(indent));
    result.push_str(&line);
}

fn dump_block(result: &mut String, ir_meta: &IRMeta, block: &Block, indent: usize) {
    append_line(result, "{".to_string(), indent);
    for statement in &block.statements {
        dump_statement(result, ir_meta, statement, indent + 1);
    }
    append_line(result, "}".to_string(), indent);
}

fn dump_statement(result: &mut String, ir_meta: &IRMeta, statement: &Statement, indent: usize) {
    match statement {
        &Statement::Declare(id, ref initializer) => {
            let declaration = variable_declaration_str(ir_meta, id);
            let line = match initializer {
                Some(initializer) => {
                    format!("{declaration} = {};", expression_str(ir_meta, initializer))
                }
                None => format!("{declaration};"),
            };
            append_line(result, line, indent);
        }
        Statement::Expression(expression) => {
            append_line(result, format!("{};", expression_str(ir_meta, expression)), indent);
        }
        Statement::Assign(lhs, rhs) => {
            let line =
                format!("{} = {};", expression_str(ir_meta, lhs), expression_str(ir_meta, rhs));
            append_line(result, line, indent);
        }
        Statement::If(condition, true_block, false_block) => {
            append_line(result, format!("if ({})", expression_str(ir_meta, condition)), indent);
            dump_block(result, ir_meta, true_block, indent);
            if let Some(false_block) = false_block {
                append_line(result, "else".to_string(), indent);
                dump_block(result, ir_meta, false_block, indent);
            }
        }
        Statement::Loop(condition, body) => {
            append_line(result, format!("while ({})", expression_str(ir_meta, condition)), indent);
            dump_block(result, ir_meta, body, indent);
        }
        Statement::Block(block) => dump_block(result, ir_meta, block, indent),
        Statement::Return(value) => {
            let line = match value {
                Some(value) => format!("return {};", expression_str(ir_meta, value)),
                None => "return;".to_string(),
            };
            append_line(result, line, indent);
        }
        Statement::Break => append_line(result, "break;".to_string(), indent),
        Statement::Continue => append_line(result, "continue;".to_string(), indent),
        Statement::Discard => append_line(result, "discard;".to_string(), indent),
    }
}

fn dump_global(result: &mut String, ir_meta: &IRMeta, global: &Global) {
    match global {
        &Global::Struct(type_id) => {
            let struct_type = ir_meta.get_type(type_id);
            append_line(result, format!("struct {}", type_str(ir_meta, type_id)), 0);
            append_line(result, "{".to_string(), 0);
            for (index, field) in struct_type.get_struct_fields().iter().enumerate() {
                append_line(result, format!("{};", field_str(ir_meta, field, index)), 1);
            }
            append_line(result, "};".to_string(), 0);
        }
        &Global::Variable(id) => {
            append_line(result, format!("{};", variable_declaration_str(ir_meta, id)), 0);
        }
        &Global::FunctionPrototype(id) => {
            append_line(result, format!("{};", function_prototype_str(ir_meta, id)), 0);
        }
        &Global::FunctionDefinition(id, ref body) => {
            append_line(result, function_prototype_str(ir_meta, id), 0);
            dump_block(result, ir_meta, body, 0);
        }
    }
}

// Dump the IR for debug purposes.
pub fn dump(ir: &IR) -> String {
    let mut result = format!("// {}", shader_type_str(ir.meta.get_shader_type()));
    for global in &ir.globals {
        dump_global(&mut result, &ir.meta, global);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_builder::TestBuilder;

    #[test]
    fn dump_is_glsl_like() {
        let mut builder = TestBuilder::new(ShaderType::Vertex);
        let color = builder.output("color", TYPE_ID_VEC4);
        let position = builder.built_in("gl_Position", TYPE_ID_VEC4, BuiltIn::Position);
        let counter = builder.non_const_global("counter", TYPE_ID_INT, Some(ConstantValue::Int(3)));
        builder.main(vec![
            Statement::assign(Expression::symbol(color), Expression::symbol(position)),
            Statement::If(
                Expression::binary(
                    BinaryOpCode::LessThan,
                    Expression::symbol(counter),
                    Expression::int(1),
                ),
                Block::from_statements(vec![Statement::Return(None)]),
                None,
            ),
        ]);
        let ir = builder.build();

        let dump = dump(&ir);
        assert!(dump.starts_with("// Vertex Shader"));
        assert!(dump.contains("out highp vec4 _ucolor;"));
        assert!(dump.contains("highp vec4 gl_Position /* gl_Position */;"));
        assert!(dump.contains(&format!("highp int counter_{} = 3;", counter.id)));
        assert!(dump.contains("void main()"));
        assert!(dump.contains("    _ucolor = gl_Position;"));
        assert!(dump.contains(&format!("    if ((counter_{} < 1))", counter.id)));
        assert!(dump.contains("        return;"));
    }

    #[test]
    fn references_are_written_as_in_msl() {
        let mut builder = TestBuilder::new(ShaderType::Fragment);
        let function = builder.function("f", &[("x", TYPE_ID_FLOAT)], TYPE_ID_VOID);
        builder.define(function, vec![]);
        let x = builder.param(function, 0);
        builder.meta().mark_as_reference(x, AddressSpace::Constant);
        let ir = builder.build();

        assert!(dump(&ir).contains(&format!("void f_{}(constant float& x_{})", function.id, x.id)));
    }
}
