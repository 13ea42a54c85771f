// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// The IR itself, consisting of a number of enums and structs.  Global declarations and function
// bodies form a tree; the types, variables and functions referenced by that tree are kept in
// tables in `IRMeta` and referred to by id.

use std::collections::HashMap;

// Strong types for ids that refer to variables, functions and types.  They are used to look
// information up in the respective tables of `IRMeta`.
#[derive(Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct VariableId {
    pub id: u32,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct FunctionId {
    pub id: u32,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct TypeId {
    pub id: u32,
}

// Fixed enums for faster type lookup
// Note: if more types are added here or the values are changed, adjust MAX_PREDEFINED_TYPE_ID.
pub const TYPE_ID_VOID: TypeId = TypeId { id: 0 };
pub const TYPE_ID_FLOAT: TypeId = TypeId { id: 1 };
pub const TYPE_ID_INT: TypeId = TypeId { id: 2 };
pub const TYPE_ID_UINT: TypeId = TypeId { id: 3 };
pub const TYPE_ID_BOOL: TypeId = TypeId { id: 4 };
// Note: vector type ids must be consecutive
pub const TYPE_ID_VEC2: TypeId = TypeId { id: 5 };
pub const TYPE_ID_VEC3: TypeId = TypeId { id: 6 };
pub const TYPE_ID_VEC4: TypeId = TypeId { id: 7 };
pub const TYPE_ID_IVEC2: TypeId = TypeId { id: 8 };
pub const TYPE_ID_IVEC3: TypeId = TypeId { id: 9 };
pub const TYPE_ID_IVEC4: TypeId = TypeId { id: 10 };
pub const TYPE_ID_UVEC2: TypeId = TypeId { id: 11 };
pub const TYPE_ID_UVEC3: TypeId = TypeId { id: 12 };
pub const TYPE_ID_UVEC4: TypeId = TypeId { id: 13 };
pub const TYPE_ID_BVEC2: TypeId = TypeId { id: 14 };
pub const TYPE_ID_BVEC3: TypeId = TypeId { id: 15 };
pub const TYPE_ID_BVEC4: TypeId = TypeId { id: 16 };
pub const TYPE_ID_MAT2: TypeId = TypeId { id: 17 };
pub const TYPE_ID_MAT3: TypeId = TypeId { id: 18 };
pub const TYPE_ID_MAT4: TypeId = TypeId { id: 19 };
// The backend's sampling state, paired with textures in the texture environment.
pub const TYPE_ID_SAMPLER: TypeId = TypeId { id: 20 };
const MAX_PREDEFINED_TYPE_ID: u32 = TYPE_ID_SAMPLER.id;

// Prefixes used for symbols.
pub const USER_SYMBOL_PREFIX: &str = "_u";

// Where a name came from.  This affects how it is output.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum NameSource {
    // A name in the shader itself, which corresponds to an interface variable (input, output,
    // etc).  The backend may rely on this name to be output with a certain prefix.
    ShaderInterface,
    // A name that must be output exactly, because it's an ANGLE-internal name or `main`.
    Internal,
    // A name that can freely be changed because it's internal to the shader.  Duplicates are
    // disambiguated when generating text.
    Temporary,
}

// A name associated with a variable, struct, struct field etc.
#[derive(Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Name {
    pub name: String,
    pub source: NameSource,
}

impl Name {
    pub fn new_temp(name: impl Into<String>) -> Name {
        Name { name: name.into(), source: NameSource::Temporary }
    }
    pub fn new_interface(name: impl Into<String>) -> Name {
        Name { name: name.into(), source: NameSource::ShaderInterface }
    }
    pub fn new_exact(name: impl Into<String>) -> Name {
        Name { name: name.into(), source: NameSource::Internal }
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Precision {
    NotApplicable,
    Low,
    Medium,
    High,
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Decoration {
    // Corresponding to GLSL qualifiers with the same name
    Precise,
    Smooth,
    Flat,
    NoPerspective,
    Centroid,
    Sample,
    Uniform,
    // Indicates that a variable (excluding built-ins) is an input to the shader
    Input,
    // Indicates that a variable (excluding built-ins) is an output of the shader
    Output,
    // The location qualifier of an input or output
    Location(u32),
    // The binding qualifier
    Binding(u32),
}

// A set of decorations that only affect variables.  They are placed in a vector that's expected to
// always be very short.
#[derive(Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Decorations {
    pub decorations: Vec<Decoration>,
}

impl Decorations {
    pub fn new_none() -> Decorations {
        Decorations { decorations: Vec::new() }
    }
    pub fn new(decorations: Vec<Decoration>) -> Decorations {
        Decorations { decorations }
    }

    pub fn has(&self, query: Decoration) -> bool {
        self.decorations.iter().any(|&decoration| decoration == query)
    }
    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum BuiltIn {
    // The BuiltIn enum value X corresponds to gl_X in GLSL.
    VertexID,
    InstanceID,
    Position,
    PointSize,
    ClipDistance,
    FragCoord,
    FrontFacing,
    PointCoord,
    SampleID,
    SamplePosition,
    SampleMaskIn,
    FragColor,
    FragData,
    FragDepth,
    SampleMask,
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum VariableScope {
    Global,
    Local,
    FunctionParam,
}

// The memory a reference points into, following the MSL address spaces.
#[derive(Copy, Clone, PartialEq, Eq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum AddressSpace {
    Thread,
    Device,
    Constant,
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ConstantValue {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
}

impl ConstantValue {
    pub fn type_id(&self) -> TypeId {
        match self {
            ConstantValue::Float(_) => TYPE_ID_FLOAT,
            ConstantValue::Int(_) => TYPE_ID_INT,
            ConstantValue::Uint(_) => TYPE_ID_UINT,
            ConstantValue::Bool(_) => TYPE_ID_BOOL,
        }
    }
}

// Information surrounding a variable.
#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Variable {
    pub name: Name,
    pub type_id: TypeId,
    pub precision: Precision,
    pub decorations: Decorations,
    pub built_in: Option<BuiltIn>,
    pub initializer: Option<ConstantValue>,
    pub scope: VariableScope,
    pub is_const: bool,
    // If set, the variable is a reference (e.g. `thread T &`) into the given address space rather
    // than a value.  Only ever set on function parameters.
    pub reference: Option<AddressSpace>,
    pub is_dead_code_eliminated: bool,
}

impl Variable {
    pub fn new(
        name: Name,
        type_id: TypeId,
        precision: Precision,
        decorations: Decorations,
        built_in: Option<BuiltIn>,
        initializer: Option<ConstantValue>,
        scope: VariableScope,
    ) -> Variable {
        Variable {
            name,
            type_id,
            precision,
            decorations,
            built_in,
            initializer,
            scope,
            is_const: false,
            reference: None,
            is_dead_code_eliminated: false,
        }
    }

    // Whether the variable is part of the shader interface, and therefore must not be pruned even
    // if unreferenced.
    pub fn is_interface(&self) -> bool {
        !self.decorations.is_empty() || self.built_in.is_some()
    }
}

// Whether a function parameter is `in`, `out` or `inout`.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum FunctionParamDirection {
    Input,
    Output,
    InputOutput,
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct FunctionParam {
    pub variable_id: VariableId,
    pub direction: FunctionParamDirection,
}

impl FunctionParam {
    pub fn new(variable_id: VariableId, direction: FunctionParamDirection) -> FunctionParam {
        FunctionParam { variable_id, direction }
    }
}

// A function is defined by its name, parameters and return type.  The body is found in the
// `Global::FunctionDefinition` that declares it.
#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Function {
    pub name: Name,
    pub params: Vec<FunctionParam>,
    pub return_type_id: TypeId,
    pub return_precision: Precision,
}

impl Function {
    pub fn new(
        name: &str,
        params: Vec<FunctionParam>,
        return_type_id: TypeId,
        return_precision: Precision,
    ) -> Function {
        Function {
            // Keep the exact name for main() only
            name: if name == "main" { Name::new_exact(name) } else { Name::new_temp(name) },
            params,
            return_type_id,
            return_precision,
        }
    }

    // Clones of main() (with a different signature) are still main().
    pub fn is_main(&self) -> bool {
        self.name.name == "main" && self.name.source == NameSource::Internal
    }

    pub fn get_param(&self, index: usize) -> Option<VariableId> {
        self.params.get(index).map(|param| param.variable_id)
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ShaderType {
    Vertex,
    Fragment,
    Compute,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum BasicType {
    Void,
    Float,
    Int,
    Uint,
    Bool,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ImageBasicType {
    Float,
    Int,
    Uint,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ImageDimension {
    // Note: D2 is 2D, but works around identifier starting with number
    D2,
    D3,
    Cube,
}

#[derive(Eq, PartialEq, Hash, Copy, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ImageType {
    pub dimension: ImageDimension,
    pub is_sampled: bool,
    pub is_array: bool,
    pub is_ms: bool,
    pub is_shadow: bool,
}

// A field of a struct.
#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Field {
    pub name: Name,
    pub type_id: TypeId,
    pub precision: Precision,
    pub decorations: Decorations,
    // Set when the field stands in for a built-in variable, such as pipeline struct fields
    // replacing gl_Position.
    pub built_in: Option<BuiltIn>,
}

impl Field {
    pub fn new(
        name: Name,
        type_id: TypeId,
        precision: Precision,
        decorations: Decorations,
        built_in: Option<BuiltIn>,
    ) -> Field {
        Field { name, type_id, precision, decorations, built_in }
    }
}

// The type of an expression.  Types can be recursive, for example a vector, matrix or array of
// another type.
#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Type {
    // Representing Void, Float, Int, Uint and Bool
    Scalar(BasicType),
    // A vector of other Scalar types
    Vector(TypeId, u32),
    // A matrix of other Vector types (which are columns)
    Matrix(TypeId, u32),
    // A GLSL sampler or image
    Image(ImageBasicType, ImageType),
    // The backend texture object a sampler is split into
    Texture(ImageBasicType, ImageType),
    // The backend sampling state a sampler is split into
    Sampler,
    Struct(Name, Vec<Field>),
    // An array of other types
    Array(TypeId, u32),
    // A pointer to a type, such as the result of `addressof`
    Pointer(TypeId),
    // An eliminated type that doesn't need to be declared in the output.
    DeadCodeEliminated,
}

impl Type {
    pub fn new_void() -> Type {
        Type::Scalar(BasicType::Void)
    }
    pub fn new_scalar(basic_type: BasicType) -> Type {
        Type::Scalar(basic_type)
    }
    pub fn new_vector(type_id: TypeId, count: u32) -> Type {
        Type::Vector(type_id, count)
    }
    pub fn new_matrix(type_id: TypeId, count: u32) -> Type {
        Type::Matrix(type_id, count)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Scalar(_))
    }
    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }
    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct(..))
    }
    pub fn is_sampled_image(&self) -> bool {
        matches!(self, Type::Image(_, image_type) if image_type.is_sampled)
    }
    pub fn is_dead_code_eliminated(&self) -> bool {
        matches!(self, Type::DeadCodeEliminated)
    }


    pub fn get_element_type_id(&self) -> Option<TypeId> {
        match self {
            &Type::Vector(id, _) | &Type::Matrix(id, _) | &Type::Array(id, _) => Some(id),
            &Type::Pointer(id) => Some(id),
            _ => None,
        }
    }

    pub fn get_struct_fields(&self) -> &[Field] {
        match self {
            Type::Struct(_, fields) => fields,
            _ => panic!("Internal error: Expected struct type"),
        }
    }
    pub fn get_struct_field(&self, field: u32) -> &Field {
        &self.get_struct_fields()[field as usize]
    }
    pub fn get_struct_name(&self) -> &Name {
        match self {
            Type::Struct(name, _) => name,
            _ => panic!("Internal error: Expected struct type"),
        }
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum UnaryOpCode {
    Negate,
    LogicalNot,
    BitwiseNot,
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum BinaryOpCode {
    Add,
    Sub,
    Mul,
    Div,
    IMod,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOpCode {
    pub fn is_comparison_or_logical(&self) -> bool {
        matches!(
            self,
            BinaryOpCode::Equal
                | BinaryOpCode::NotEqual
                | BinaryOpCode::LessThan
                | BinaryOpCode::GreaterThan
                | BinaryOpCode::LessThanEqual
                | BinaryOpCode::GreaterThanEqual
                | BinaryOpCode::LogicalAnd
                | BinaryOpCode::LogicalOr
        )
    }
}

#[derive(Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Expression {
    Constant(ConstantValue),
    Symbol(VariableId),
    // Select a field of a struct by index.
    AccessField(Box<Expression>, u32),
    // Index an array, vector or matrix.
    Index(Box<Expression>, Box<Expression>),
    Unary(UnaryOpCode, Box<Expression>),
    Binary(BinaryOpCode, Box<Expression>, Box<Expression>),
    // Construct a value of the given type; with a single scalar argument of a different type, this
    // is a numeric conversion.
    Construct(TypeId, Vec<Expression>),
    Call(FunctionId, Vec<Expression>),
    // Sample a texture: `texture(sampler, coord)`.
    Texture(Box<Expression>, Box<Expression>),
    // Take the address of an lvalue.
    AddressOf(Box<Expression>),
}

impl Expression {
    pub fn symbol(id: VariableId) -> Expression {
        Expression::Symbol(id)
    }
    pub fn field(base: Expression, index: u32) -> Expression {
        Expression::AccessField(Box::new(base), index)
    }
    pub fn index(base: Expression, index: Expression) -> Expression {
        Expression::Index(Box::new(base), Box::new(index))
    }
    pub fn int(value: i32) -> Expression {
        Expression::Constant(ConstantValue::Int(value))
    }
    pub fn float(value: f32) -> Expression {
        Expression::Constant(ConstantValue::Float(value))
    }
    pub fn binary(op: BinaryOpCode, lhs: Expression, rhs: Expression) -> Expression {
        Expression::Binary(op, Box::new(lhs), Box::new(rhs))
    }
    pub fn call(function_id: FunctionId, args: Vec<Expression>) -> Expression {
        Expression::Call(function_id, args)
    }
    pub fn texture(sampler: Expression, coord: Expression) -> Expression {
        Expression::Texture(Box::new(sampler), Box::new(coord))
    }
    pub fn address_of(operand: Expression) -> Expression {
        Expression::AddressOf(Box::new(operand))
    }

    // Whether evaluating the expression can have an effect other than producing its value.
    pub fn has_side_effects(&self) -> bool {
        match self {
            Expression::Constant(_) | Expression::Symbol(_) => false,
            Expression::Call(..) => true,
            Expression::AccessField(base, _)
            | Expression::Unary(_, base)
            | Expression::AddressOf(base) => base.has_side_effects(),
            Expression::Index(lhs, rhs)
            | Expression::Binary(_, lhs, rhs)
            | Expression::Texture(lhs, rhs) => lhs.has_side_effects() || rhs.has_side_effects(),
            Expression::Construct(_, args) => args.iter().any(|arg| arg.has_side_effects()),
        }
    }
}

#[derive(Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Statement {
    // Declare a local variable, with an optional initializer.
    Declare(VariableId, Option<Expression>),
    Expression(Expression),
    Assign(Expression, Expression),
    If(Expression, Block, Option<Block>),
    // A `while` loop.
    Loop(Expression, Block),
    Block(Block),
    Return(Option<Expression>),
    Break,
    Continue,
    Discard,
}

impl Statement {
    pub fn assign(lhs: Expression, rhs: Expression) -> Statement {
        Statement::Assign(lhs, rhs)
    }
    pub fn call(function_id: FunctionId, args: Vec<Expression>) -> Statement {
        Statement::Expression(Expression::Call(function_id, args))
    }
}

#[derive(Clone, PartialEq, Default)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new() -> Block {
        Block { statements: Vec::new() }
    }
    pub fn from_statements(statements: Vec<Statement>) -> Block {
        Block { statements }
    }

    pub fn add_statement(&mut self, statement: Statement) {
        self.statements.push(statement);
    }
    pub fn add_variable_declaration(&mut self, variable_id: VariableId) {
        self.statements.push(Statement::Declare(variable_id, None));
    }
}

// A declaration in the global scope.  The order of these is the order they are output in.
#[derive(Clone, PartialEq)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum Global {
    Struct(TypeId),
    Variable(VariableId),
    FunctionPrototype(FunctionId),
    FunctionDefinition(FunctionId, Block),
}

// Everything in the IR except the tree of globals: the types, variables and functions tables,
// and data that globally affects the shader.  Kept separate from the tree so transformations can
// hold `&mut` to both at the same time.
#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct IRMeta {
    types: Vec<Type>,
    variables: Vec<Variable>,
    functions: Vec<Function>,

    // Maps to look up the id of existing types.  This ensures that the type ids are unique and
    // there are no duplicate types.
    image_type_map: HashMap<(ImageBasicType, ImageType), TypeId>,
    texture_type_map: HashMap<(ImageBasicType, ImageType), TypeId>,
    texture_env_type_map: HashMap<(ImageBasicType, ImageType), TypeId>,
    array_type_map: HashMap<(TypeId, u32), TypeId>,
    pointer_type_map: HashMap<TypeId, TypeId>,

    shader_type: ShaderType,
}

impl IRMeta {
    pub fn new(shader_type: ShaderType) -> IRMeta {
        let types = vec![
            // Corresponding to TYPE_ID_VOID
            Type::new_void(),
            // Corresponding to TYPE_ID_FLOAT
            Type::new_scalar(BasicType::Float),
            // Corresponding to TYPE_ID_INT
            Type::new_scalar(BasicType::Int),
            // Corresponding to TYPE_ID_UINT
            Type::new_scalar(BasicType::Uint),
            // Corresponding to TYPE_ID_BOOL
            Type::new_scalar(BasicType::Bool),
            // Corresponding to TYPE_ID_VEC2
            Type::new_vector(TYPE_ID_FLOAT, 2),
            // Corresponding to TYPE_ID_VEC3
            Type::new_vector(TYPE_ID_FLOAT, 3),
            // Corresponding to TYPE_ID_VEC4
            Type::new_vector(TYPE_ID_FLOAT, 4),
            // Corresponding to TYPE_ID_IVEC2
            Type::new_vector(TYPE_ID_INT, 2),
            // Corresponding to TYPE_ID_IVEC3
            Type::new_vector(TYPE_ID_INT, 3),
            // Corresponding to TYPE_ID_IVEC4
            Type::new_vector(TYPE_ID_INT, 4),
            // Corresponding to TYPE_ID_UVEC2
            Type::new_vector(TYPE_ID_UINT, 2),
            // Corresponding to TYPE_ID_UVEC3
            Type::new_vector(TYPE_ID_UINT, 3),
            // Corresponding to TYPE_ID_UVEC4
            Type::new_vector(TYPE_ID_UINT, 4),
            // Corresponding to TYPE_ID_BVEC2
            Type::new_vector(TYPE_ID_BOOL, 2),
            // Corresponding to TYPE_ID_BVEC3
            Type::new_vector(TYPE_ID_BOOL, 3),
            // Corresponding to TYPE_ID_BVEC4
            Type::new_vector(TYPE_ID_BOOL, 4),
            // Corresponding to TYPE_ID_MAT2
            Type::new_matrix(TYPE_ID_VEC2, 2),
            // Corresponding to TYPE_ID_MAT3
            Type::new_matrix(TYPE_ID_VEC3, 3),
            // Corresponding to TYPE_ID_MAT4
            Type::new_matrix(TYPE_ID_VEC4, 4),
            // Corresponding to TYPE_ID_SAMPLER
            Type::Sampler,
        ];
        debug_assert!(types.len() as u32 == MAX_PREDEFINED_TYPE_ID + 1);

        IRMeta {
            types,
            variables: Vec::with_capacity(100),
            functions: Vec::with_capacity(20),
            image_type_map: HashMap::new(),
            texture_type_map: HashMap::new(),
            texture_env_type_map: HashMap::new(),
            array_type_map: HashMap::new(),
            pointer_type_map: HashMap::new(),
            shader_type,
        }
    }

    pub fn all_types(&self) -> &Vec<Type> {
        &self.types
    }
    pub fn all_variables(&self) -> &Vec<Variable> {
        &self.variables
    }
    pub fn all_functions(&self) -> &Vec<Function> {
        &self.functions
    }

    pub fn get_shader_type(&self) -> ShaderType {
        self.shader_type
    }

    fn add_item_and_get_id<T>(items: &mut Vec<T>, new_item: T) -> u32 {
        let item_id = items.len() as u32;
        items.push(new_item);
        item_id
    }

    fn add_type_and_get_id(types: &mut Vec<Type>, type_desc: Type) -> TypeId {
        TypeId { id: Self::add_item_and_get_id(types, type_desc) }
    }

    // Returns a predefined type id for vectors, see TYPE_ID_* constants.
    pub fn get_vector_type_id(&self, basic_type: BasicType, vector_size: u32) -> TypeId {
        debug_assert!((2..=4).contains(&vector_size));

        let offset = vector_size - 2;

        match basic_type {
            BasicType::Float => TypeId { id: TYPE_ID_VEC2.id + offset },
            BasicType::Int => TypeId { id: TYPE_ID_IVEC2.id + offset },
            BasicType::Uint => TypeId { id: TYPE_ID_UVEC2.id + offset },
            BasicType::Bool => TypeId { id: TYPE_ID_BVEC2.id + offset },
            BasicType::Void => panic!("Internal error: Not a vector-able type"),
        }
    }

    pub fn get_image_type_id(
        &mut self,
        basic_type: ImageBasicType,
        image_type: ImageType,
    ) -> TypeId {
        // Look up the image type; if one doesn't exist, create it.
        *self.image_type_map.entry((basic_type, image_type)).or_insert_with(|| {
            Self::add_type_and_get_id(&mut self.types, Type::Image(basic_type, image_type))
        })
    }

    pub fn get_texture_type_id(
        &mut self,
        basic_type: ImageBasicType,
        image_type: ImageType,
    ) -> TypeId {
        *self.texture_type_map.entry((basic_type, image_type)).or_insert_with(|| {
            Self::add_type_and_get_id(&mut self.types, Type::Texture(basic_type, image_type))
        })
    }

    // The texture environment of a sampler type is a struct holding a reference to the texture
    // and one to the sampling state, i.e.:
    //
    //     struct TextureEnv { texture2d<float> *texture; sampler *sampler; };
    //
    // One such struct is created per sampler type.
    pub fn get_texture_env_type_id(
        &mut self,
        basic_type: ImageBasicType,
        image_type: ImageType,
    ) -> TypeId {
        if let Some(&type_id) = self.texture_env_type_map.get(&(basic_type, image_type)) {
            return type_id;
        }

        let texture_type_id = self.get_texture_type_id(basic_type, image_type);
        let texture_pointer_type_id = self.get_pointer_type_id(texture_type_id);
        let sampler_pointer_type_id = self.get_pointer_type_id(TYPE_ID_SAMPLER);
        let fields = vec![
            Field::new(
                Name::new_exact("texture"),
                texture_pointer_type_id,
                Precision::NotApplicable,
                Decorations::new_none(),
                None,
            ),
            Field::new(
                Name::new_exact("sampler"),
                sampler_pointer_type_id,
                Precision::NotApplicable,
                Decorations::new_none(),
                None,
            ),
        ];
        let type_id = self.get_struct_type_id(Name::new_exact("ANGLE_TextureEnv"), fields);
        self.texture_env_type_map.insert((basic_type, image_type), type_id);
        type_id
    }

    pub fn get_struct_type_id(&mut self, name: Name, fields: Vec<Field>) -> TypeId {
        // Note: this should only make new types, not used as a way to look up a struct, that ID
        // should already be known.
        Self::add_type_and_get_id(&mut self.types, Type::Struct(name, fields))
    }

    pub fn get_array_type_id(&mut self, element_type_id: TypeId, array_size: u32) -> TypeId {
        // Look up the array type; if one doesn't exist, create it.
        *self.array_type_map.entry((element_type_id, array_size)).or_insert_with(|| {
            Self::add_type_and_get_id(&mut self.types, Type::Array(element_type_id, array_size))
        })
    }

    pub fn get_pointer_type_id(&mut self, pointee_type_id: TypeId) -> TypeId {
        // Look up the pointer type; if one doesn't exist, create it.
        *self.pointer_type_map.entry(pointee_type_id).or_insert_with(|| {
            Self::add_type_and_get_id(&mut self.types, Type::Pointer(pointee_type_id))
        })
    }

    // Look up an existing pointer type, without creating one.
    pub fn find_pointer_type_id(&self, pointee_type_id: TypeId) -> Option<TypeId> {
        self.pointer_type_map.get(&pointee_type_id).copied()
    }

    pub fn dead_code_eliminate_variable(&mut self, id: VariableId) {
        self.variables[id.id as usize].is_dead_code_eliminated = true;
    }

    pub fn add_variable(&mut self, variable: Variable) -> VariableId {
        VariableId { id: Self::add_item_and_get_id(&mut self.variables, variable) }
    }
    pub fn declare_variable(
        &mut self,
        name: Name,
        type_id: TypeId,
        precision: Precision,
        decorations: Decorations,
        built_in: Option<BuiltIn>,
        initializer: Option<ConstantValue>,
        scope: VariableScope,
    ) -> VariableId {
        debug_assert!(!self.get_type(type_id).is_dead_code_eliminated());
        let var =
            Variable::new(name, type_id, precision, decorations, built_in, initializer, scope);
        self.add_variable(var)
    }

    // Make the variable a reference in the given address space.
    pub fn mark_as_reference(&mut self, id: VariableId, address_space: AddressSpace) {
        self.variables[id.id as usize].reference = Some(address_space);
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        FunctionId { id: IRMeta::add_item_and_get_id(&mut self.functions, function) }
    }

    pub fn get_type(&self, type_id: TypeId) -> &Type {
        &self.types[type_id.id as usize]
    }
    pub fn get_variable(&self, variable_id: VariableId) -> &Variable {
        &self.variables[variable_id.id as usize]
    }
    pub fn get_variable_mut(&mut self, variable_id: VariableId) -> &mut Variable {
        &mut self.variables[variable_id.id as usize]
    }
    pub fn get_function(&self, function_id: FunctionId) -> &Function {
        &self.functions[function_id.id as usize]
    }
}

#[derive(Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct IR {
    pub meta: IRMeta,
    // The global declarations, in order.
    pub globals: Vec<Global>,
}

impl IR {
    pub fn new(shader_type: ShaderType) -> IR {
        IR { meta: IRMeta::new(shader_type), globals: Vec::with_capacity(50) }
    }

    // The index of main()'s definition in the list of globals.
    pub fn find_main_index(&self) -> Option<usize> {
        self.globals.iter().position(|global| match global {
            &Global::FunctionDefinition(id, _) => self.meta.get_function(id).is_main(),
            _ => false,
        })
    }

    pub fn get_main_function_id(&self) -> Option<FunctionId> {
        self.find_main_index().map(|index| match self.globals[index] {
            Global::FunctionDefinition(id, _) => id,
            _ => unreachable!(),
        })
    }

    pub fn get_function_body(&self, function_id: FunctionId) -> Option<&Block> {
        self.globals.iter().find_map(|global| match global {
            Global::FunctionDefinition(id, body) if *id == function_id => Some(body),
            _ => None,
        })
    }

    pub fn insert_globals(&mut self, index: usize, globals: Vec<Global>) {
        self.globals.splice(index..index, globals);
    }
}
