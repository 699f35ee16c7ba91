//! Parsed form of IDL sources.

use std::path::PathBuf;

/// The primitive type names of the IDL, in canonical order.
pub const PRIMITIVE_TYPES: &[&str] = &[
    "int8_t", "int16_t", "int32_t", "int64_t", "byte", "float", "double", "string", "boolean",
];

/// One parsed IDL source file.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    /// Path the source was read from.
    pub path: PathBuf,
    /// Dotted package name, if the file declared one.
    pub package: Option<String>,
    /// Structs in declaration order.
    pub structs: Vec<Struct>,
}

/// A struct definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    /// Short name as written in the IDL.
    pub name: String,
    /// Package inherited from the enclosing file.
    pub package: Option<String>,
    /// Members in declaration order.
    pub members: Vec<Member>,
    /// Constants in declaration order.
    pub constants: Vec<Constant>,
    /// Doc comment attached to the definition.
    pub doc: Option<String>,
}

impl Struct {
    /// Fully qualified dotted name.
    pub fn full_name(&self) -> String {
        match &self.package {
            Some(package) => format!("{package}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A struct member.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Type of the member (or of the array elements).
    pub ty: TypeRef,
    /// Member name.
    pub name: String,
    /// Array dimensions, outermost first. Empty for scalars.
    pub dims: Vec<ArrayDim>,
}

/// A constant declared inside a struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    /// Primitive type name the constant was declared with.
    pub ty: String,
    /// Constant name.
    pub name: String,
    /// Literal text exactly as written.
    pub literal: String,
    /// Resolved value for integer and hex literals.
    pub int_value: Option<i64>,
}

/// A reference to a member type, classified primitive vs user-defined.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// Full dotted name.
    pub full: String,
    /// Short name, without the package.
    pub short: String,
    /// Package, for qualified or package-local user types.
    pub package: Option<String>,
    /// Whether this is one of [`PRIMITIVE_TYPES`].
    pub primitive: bool,
}

impl TypeRef {
    /// Classify a dotted type name. Unqualified names that are not
    /// primitives take the enclosing package.
    pub fn new(dotted: &str, enclosing_package: Option<&str>) -> Self {
        if PRIMITIVE_TYPES.contains(&dotted) {
            return Self {
                full: dotted.to_owned(),
                short: dotted.to_owned(),
                package: None,
                primitive: true,
            };
        }
        match dotted.rsplit_once('.') {
            Some((package, short)) => Self {
                full: dotted.to_owned(),
                short: short.to_owned(),
                package: Some(package.to_owned()),
                primitive: false,
            },
            None => {
                let package = enclosing_package.map(str::to_owned);
                let full = match &package {
                    Some(package) => format!("{package}.{dotted}"),
                    None => dotted.to_owned(),
                };
                Self {
                    full,
                    short: dotted.to_owned(),
                    package,
                    primitive: false,
                }
            }
        }
    }
}

/// Whether an array dimension is fixed at generation time or sized by
/// another member at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimMode {
    /// Fixed size.
    Const,
    /// Sized by a previously declared integer member.
    Var,
}

/// One array dimension of a member.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDim {
    /// Constant or variable.
    pub mode: DimMode,
    /// Original size expression text: literal digits, the referenced
    /// member's name, or a symbolic constant identifier.
    pub size: String,
    /// Resolved size, present only for constant dimensions whose value is
    /// known at generation time.
    pub resolved: Option<u64>,
}
