//! The Rust source emitter.
//!
//! One file per struct. Constant dimensions become fixed-size arrays,
//! variable dimensions become `Vec`s, and sibling generated types are
//! referenced relative to the root of the emitted module tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::ast::{ArrayDim, Constant, DimMode, File, Member, Struct, TypeRef};
use crate::error::Error;
use crate::fingerprint::Resolver;
use crate::Options;

/// Primitive type names that may size a variable array dimension.
const INTEGER_TYPES: &[&str] = &["int8_t", "int16_t", "int32_t", "int64_t", "byte"];

fn rust_primitive(name: &str) -> &'static str {
    match name {
        "int8_t" => "i8",
        "int16_t" => "i16",
        "int32_t" => "i32",
        "int64_t" => "i64",
        "byte" => "u8",
        "float" => "f32",
        "double" => "f64",
        "string" => "String",
        "boolean" => "bool",
        other => unreachable!("`{other}` is not a primitive type"),
    }
}

/// Suffix of the `WriteBuffer`/`ReadBuffer` accessor pair for a
/// primitive.
fn accessor(name: &str) -> &'static str {
    match name {
        "int8_t" => "i8",
        "int16_t" => "i16",
        "int32_t" => "i32",
        "int64_t" => "i64",
        "byte" => "u8",
        "float" => "f32",
        "double" => "f64",
        "string" => "string",
        "boolean" => "bool",
        other => unreachable!("`{other}` is not a primitive type"),
    }
}

fn indent(level: usize) -> String {
    "    ".repeat(level)
}

/// Path of a sibling generated type, relative to the current module.
/// Each generated file is a module holding one struct of the same name,
/// nested under one module per package segment.
fn user_type_path(current: &Struct, target: &TypeRef) -> String {
    if target.package == current.package {
        return format!("super::{0}::{0}", target.short);
    }
    let ups = current.package.as_deref().map_or(0, |p| p.split('.').count()) + 1;
    let mut path = "super::".repeat(ups);
    if let Some(package) = &target.package {
        for segment in package.split('.') {
            path.push_str(segment);
            path.push_str("::");
        }
    }
    path.push_str(&format!("{0}::{0}", target.short));
    path
}

fn base_type(st: &Struct, ty: &TypeRef) -> String {
    if ty.primitive {
        rust_primitive(&ty.short).to_owned()
    } else {
        user_type_path(st, ty)
    }
}

/// Rust type of a member: the base type wrapped once per dimension,
/// outermost dimension outermost.
fn field_type(st: &Struct, member: &Member) -> Result<String, Error> {
    let mut ty = base_type(st, &member.ty);
    for dim in member.dims.iter().rev() {
        ty = match dim.mode {
            DimMode::Var => format!("Vec<{ty}>"),
            DimMode::Const => {
                let size = dim.resolved.ok_or_else(|| {
                    Error::BadDimension(format!(
                        "`{}` sizing `{}.{}` resolves to neither a constant nor a member",
                        dim.size, st.name, member.name
                    ))
                })?;
                format!("[{ty}; {size}]")
            }
        };
    }
    Ok(ty)
}

/// Check the validation properties the parser leaves open: constant
/// dimensions must have resolved, and variable dimensions must refer to
/// a previously declared scalar integer member.
fn validate(st: &Struct) -> Result<(), Error> {
    for member in &st.members {
        for dim in &member.dims {
            match dim.mode {
                DimMode::Const => {
                    if dim.resolved.is_none() {
                        return Err(Error::BadDimension(format!(
                            "`{}` sizing `{}.{}` resolves to neither a constant nor a member",
                            dim.size, st.name, member.name
                        )));
                    }
                }
                DimMode::Var => {
                    let count = st
                        .members
                        .iter()
                        .find(|m| m.name == dim.size)
                        .ok_or_else(|| {
                            Error::BadDimension(format!(
                                "`{}.{}` is sized by unknown member `{}`",
                                st.name, member.name, dim.size
                            ))
                        })?;
                    let scalar_integer = count.dims.is_empty()
                        && count.ty.primitive
                        && INTEGER_TYPES.contains(&count.ty.short.as_str());
                    if !scalar_integer {
                        return Err(Error::BadDimension(format!(
                            "`{}.{}` is sized by `{}`, which is not a scalar integer member",
                            st.name, member.name, dim.size
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

fn constant_literal(constant: &Constant) -> String {
    let float = matches!(constant.ty.as_str(), "float" | "double");
    match (float, constant.int_value) {
        // An integer literal in a float constant needs a float-shaped
        // literal on the Rust side.
        (true, Some(value)) => format!("{value}.0"),
        _ => constant.literal.clone(),
    }
}

fn emit_encode_member(member: &Member, out: &mut String) {
    let depth = member.dims.len();
    for i in 0..depth {
        let source = if i == 0 {
            format!("&self.{}", member.name)
        } else {
            format!("v{}", i - 1)
        };
        out.push_str(&format!("{}for v{i} in {source} {{\n", indent(2 + i)));
    }

    let by_ref = |name: &str| {
        if depth == 0 {
            format!("&self.{name}")
        } else {
            format!("v{}", depth - 1)
        }
    };
    let by_value = |name: &str| {
        if depth == 0 {
            format!("self.{name}")
        } else {
            format!("*v{}", depth - 1)
        }
    };

    let line = if member.ty.primitive {
        match member.ty.short.as_str() {
            "string" => format!("buf.write_string({})?;", by_ref(&member.name)),
            other => format!("buf.write_{}({})?;", accessor(other), by_value(&member.name)),
        }
    } else {
        format!("{}.encode(buf)?;", by_value(&member.name).trim_start_matches('*'))
    };
    out.push_str(&format!("{}{line}\n", indent(2 + depth)));

    for i in (0..depth).rev() {
        out.push_str(&format!("{}}}\n", indent(2 + i)));
    }
}

/// Expression decoding one value of `member`'s type at `dims`, with `?`
/// already applied. Multi-line forms indent their continuation lines at
/// `level`.
fn decode_expr(st: &Struct, member: &Member, dims: &[ArrayDim], depth: usize, level: usize) -> String {
    let Some((dim, rest)) = dims.split_first() else {
        return if member.ty.primitive {
            format!("buf.read_{}()?", accessor(&member.ty.short))
        } else {
            format!("{}::decode(buf)?", user_type_path(st, &member.ty))
        };
    };

    match dim.mode {
        DimMode::Const => {
            if rest.is_empty() {
                let element = if member.ty.primitive {
                    format!("|buf| buf.read_{}()", accessor(&member.ty.short))
                } else {
                    format!("|buf| {}::decode(buf)", user_type_path(st, &member.ty))
                };
                format!("read_fixed_array(buf, {element})?")
            } else {
                let inner = decode_expr(st, member, rest, depth + 1, level + 1);
                format!(
                    "read_fixed_array(buf, |buf| {{\n{i1}Ok({inner})\n{i0}}})?",
                    i1 = indent(level + 1),
                    i0 = indent(level),
                )
            }
        }
        DimMode::Var => {
            let inner = decode_expr(st, member, rest, depth + 1, level + 2);
            format!(
                "{{\n\
                 {i1}let len{depth} = element_count({count})?;\n\
                 {i1}let mut v{depth} = Vec::with_capacity(len{depth});\n\
                 {i1}for _ in 0..len{depth} {{\n\
                 {i2}v{depth}.push({inner});\n\
                 {i1}}}\n\
                 {i1}v{depth}\n\
                 {i0}}}",
                count = dim.size,
                i0 = indent(level),
                i1 = indent(level + 1),
                i2 = indent(level + 2),
            )
        }
    }
}

/// Emit the Rust source for one struct.
pub fn emit_struct<'a>(
    file: &'a File,
    st: &'a Struct,
    resolver: &mut Resolver<'a>,
) -> Result<String, Error> {
    validate(st)?;
    let fingerprint = resolver.fingerprint(st)?;

    let source_name = file
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.path.display().to_string());

    let has_const_dim = st
        .members
        .iter()
        .any(|m| m.dims.iter().any(|d| d.mode == DimMode::Const));
    let has_var_dim = st
        .members
        .iter()
        .any(|m| m.dims.iter().any(|d| d.mode == DimMode::Var));
    let mut imports = vec![
        "DecodeError",
        "EncodeError",
        "Message",
        "ReadBuffer",
        "WriteBuffer",
    ];
    if has_var_dim {
        imports.push("element_count");
    }
    if has_const_dim {
        imports.push("read_fixed_array");
    }

    let mut out = String::new();
    out.push_str(&format!(
        "// Generated by lcm-gen from `{source_name}`. DO NOT EDIT.\n\n"
    ));
    out.push_str("#![allow(non_camel_case_types)]\n");
    out.push_str("#![allow(clippy::all)]\n\n");
    out.push_str(&format!("use lcm_codec::{{{}}};\n\n", imports.join(", ")));

    if let Some(doc) = &st.doc {
        for line in doc.split('\n') {
            out.push_str(&format!("/// {line}\n"));
        }
    }
    out.push_str("#[derive(Debug, Clone, PartialEq)]\n");
    out.push_str(&format!("pub struct {} {{\n", st.name));
    for member in &st.members {
        out.push_str(&format!(
            "    pub {}: {},\n",
            member.name,
            field_type(st, member)?
        ));
    }
    out.push_str("}\n\n");

    // Inherent impl: declared constants and the constructor.
    out.push_str(&format!("impl {} {{\n", st.name));
    for constant in &st.constants {
        out.push_str(&format!(
            "    pub const {}: {} = {};\n",
            constant.name,
            rust_primitive(&constant.ty),
            constant_literal(constant)
        ));
    }
    if !st.constants.is_empty() {
        out.push('\n');
    }
    let params: Vec<String> = st
        .members
        .iter()
        .map(|m| Ok(format!("{}: {}", m.name, field_type(st, m)?)))
        .collect::<Result<_, Error>>()?;
    out.push_str("    /// Construct a value with every member supplied.\n");
    out.push_str(&format!("    pub fn new({}) -> Self {{\n", params.join(", ")));
    out.push_str(&format!(
        "        Self {{{}}}\n",
        field_list(&st.members)
    ));
    out.push_str("    }\n");
    out.push_str("}\n\n");

    out.push_str(&format!("impl Message for {} {{\n", st.name));
    out.push_str(&format!(
        "    const FINGERPRINT: u64 = {fingerprint:#018x};\n\n"
    ));

    out.push_str("    fn encode(&self, buf: &mut WriteBuffer) -> Result<(), EncodeError> {\n");
    out.push_str("        buf.write_i64(Self::FINGERPRINT as i64)?;\n");
    for member in &st.members {
        emit_encode_member(member, &mut out);
    }
    out.push_str("        Ok(())\n    }\n\n");

    out.push_str("    fn decode(buf: &mut ReadBuffer<'_>) -> Result<Self, DecodeError> {\n");
    out.push_str("        let found = buf.read_i64()? as u64;\n");
    out.push_str("        if found != Self::FINGERPRINT {\n");
    out.push_str(
        "            return Err(DecodeError::FingerprintMismatch {\n\
         \x20               expected: Self::FINGERPRINT,\n\
         \x20               found,\n\
         \x20           });\n",
    );
    out.push_str("        }\n");
    for member in &st.members {
        let expr = decode_expr(st, member, &member.dims, 0, 2);
        if member.dims.is_empty() {
            out.push_str(&format!("        let {} = {expr};\n", member.name));
        } else {
            out.push_str(&format!(
                "        let {}: {} = {expr};\n",
                member.name,
                field_type(st, member)?
            ));
        }
    }
    out.push_str(&format!(
        "        Ok(Self {{{}}})\n",
        field_list(&st.members)
    ));
    out.push_str("    }\n");
    out.push_str("}\n");

    Ok(out)
}

fn field_list(members: &[Member]) -> String {
    if members.is_empty() {
        String::new()
    } else {
        format!(" {} ", members.iter().map(|m| &m.name).join(", "))
    }
}

/// Where a struct's generated source lands under the output directory.
pub fn output_path(st: &Struct, options: &Options) -> PathBuf {
    let mut path = options.out_dir.clone();
    if options.package_dirs {
        if let Some(package) = &st.package {
            for segment in package.split('.') {
                path.push(segment);
            }
        }
    }
    path.push(format!("{}.rs", st.name));
    path
}

/// Emit and write every struct of a parsed file. The first failure
/// aborts the remainder of this file; other files are unaffected.
pub fn emit_file<'a>(
    file: &'a File,
    resolver: &mut Resolver<'a>,
    options: &Options,
) -> Result<Vec<PathBuf>, Error> {
    let mut written = Vec::with_capacity(file.structs.len());
    for st in &file.structs {
        let source = emit_struct(file, st, resolver)?;
        let path = output_path(st, options);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, source)?;
        tracing::debug!(path = %path.display(), "wrote generated struct");
        written.push(path);
    }
    Ok(written)
}

/// Write a `mod.rs` into every directory that received generated
/// sources, declaring the struct modules and package submodules, so the
/// whole tree mounts into a crate with a single `mod` statement.
///
/// The files are regenerated from scratch on every invocation.
pub fn write_module_tree(out_dir: &Path, written: &[PathBuf]) -> Result<Vec<PathBuf>, Error> {
    let mut children: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
    for path in written {
        let Ok(rel) = path.strip_prefix(out_dir) else {
            continue;
        };
        let components: Vec<_> = rel.components().collect();
        let mut dir = out_dir.to_path_buf();
        for (i, component) in components.iter().enumerate() {
            let component = Path::new(component.as_os_str());
            let module = if i == components.len() - 1 {
                component.file_stem().map(|s| s.to_string_lossy().into_owned())
            } else {
                Some(component.to_string_lossy().into_owned())
            };
            let Some(module) = module else { continue };
            children.entry(dir.clone()).or_default().insert(module);
            dir.push(component);
        }
    }

    let mut module_files = Vec::with_capacity(children.len());
    for (dir, modules) in children {
        let mut out = String::from("// Generated by lcm-gen. DO NOT EDIT.\n\n");
        for module in modules {
            out.push_str(&format!("pub mod {module};\n"));
        }
        let path = dir.join("mod.rs");
        std::fs::write(&path, out)?;
        module_files.push(path);
    }
    Ok(module_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn emit(source: &str) -> String {
        let file = parser::parse("types.lcm", source).unwrap();
        let mut resolver = Resolver::new(file.structs.iter());
        emit_struct(&file, &file.structs[0], &mut resolver).unwrap()
    }

    fn emit_err(source: &str) -> Error {
        let file = parser::parse("types.lcm", source).unwrap();
        let mut resolver = Resolver::new(file.structs.iter());
        emit_struct(&file, &file.structs[0], &mut resolver).unwrap_err()
    }

    #[test]
    fn emits_the_fingerprint_constant() {
        let out = emit("package p;\nstruct point_t { double x; double y; double z; }");
        assert!(out.contains("const FINGERPRINT: u64 = 0xae7e5fba5eeca11e;"));
        assert!(out.contains("pub struct point_t {"));
        assert!(out.contains("    pub x: f64,"));
    }

    #[test]
    fn emits_scalar_members_in_order() {
        let out = emit("struct sample_t { int64_t timestamp; double position[3]; string name; }");
        let encode = [
            "buf.write_i64(Self::FINGERPRINT as i64)?;",
            "buf.write_i64(self.timestamp)?;",
            "for v0 in &self.position {",
            "buf.write_f64(*v0)?;",
            "buf.write_string(&self.name)?;",
        ];
        let mut last = 0;
        for needle in encode {
            let at = out[last..].find(needle).expect(needle);
            last += at;
        }
        assert!(out.contains(
            "let position: [f64; 3] = read_fixed_array(buf, |buf| buf.read_f64())?;"
        ));
    }

    #[test]
    fn variable_arrays_use_the_count_member() {
        let out = emit("struct s { int16_t n; byte data[n]; }");
        assert!(out.contains("pub data: Vec<u8>,"));
        assert!(out.contains("let len0 = element_count(n)?;"));
        assert!(out.contains("v0.push(buf.read_u8()?);"));
        // Encode iterates the vector; sizes are never prefixed.
        assert!(out.contains("for v0 in &self.data {"));
        assert!(!out.contains("write_u16(self.n as"));
    }

    #[test]
    fn nested_dimensions_are_row_major() {
        let out = emit("struct s { int32_t n; double cells[3][n]; }");
        assert!(out.contains("pub cells: [Vec<f64>; 3],"));
        assert!(out.contains("read_fixed_array(buf, |buf| {"));
        assert!(out.contains("let len1 = element_count(n)?;"));
    }

    #[test]
    fn user_types_recurse_through_their_own_codec() {
        let source = "package t;\nstruct inner { int32_t a; }\nstruct outer { inner child; }";
        let file = parser::parse("types.lcm", source).unwrap();
        let mut resolver = Resolver::new(file.structs.iter());
        let out = emit_struct(&file, &file.structs[1], &mut resolver).unwrap();
        assert!(out.contains("pub child: super::inner::inner,"));
        assert!(out.contains("self.child.encode(buf)?;"));
        assert!(out.contains("let child = super::inner::inner::decode(buf)?;"));
    }

    #[test]
    fn constants_become_typed_consts() {
        let out = emit(
            "struct s { const int32_t A = 1, B = 0x1F; const double RATE = 2; const float HALF = 0.5; int8_t v; }",
        );
        assert!(out.contains("pub const A: i32 = 1;"));
        assert!(out.contains("pub const B: i32 = 0x1F;"));
        // Integer literals in float constants grow a fractional part.
        assert!(out.contains("pub const RATE: f64 = 2.0;"));
        assert!(out.contains("pub const HALF: f32 = 0.5;"));
    }

    #[test]
    fn doc_comments_carry_over() {
        let out = emit("/// A point in space.\nstruct p { double x; }");
        assert!(out.contains("/// A point in space.\n#[derive(Debug, Clone, PartialEq)]"));
    }

    #[test]
    fn booleans_and_strings_round_trip_through_helpers() {
        let out = emit("struct s { boolean ok; string label; }");
        assert!(out.contains("buf.write_bool(self.ok)?;"));
        assert!(out.contains("let ok = buf.read_bool()?;"));
        assert!(out.contains("let label = buf.read_string()?;"));
    }

    #[test]
    fn symbolic_dimensions_cannot_be_emitted() {
        let err = emit_err("struct s { double cells[WIDTH]; }");
        assert!(matches!(err, Error::BadDimension(_)));
    }

    #[test]
    fn variable_dimensions_need_integer_counts() {
        let err = emit_err("struct s { double scale; double cells[scale]; }");
        assert!(matches!(err, Error::BadDimension(_)));
    }

    #[test]
    fn paths_follow_the_package() {
        let file = parser::parse("types.lcm", "package exlcm.deep;\nstruct s { int8_t v; }").unwrap();
        let st = &file.structs[0];
        let nested = Options {
            out_dir: PathBuf::from("out"),
            package_dirs: true,
        };
        assert_eq!(output_path(st, &nested), PathBuf::from("out/exlcm/deep/s.rs"));
        let flat = Options {
            out_dir: PathBuf::from("out"),
            package_dirs: false,
        };
        assert_eq!(output_path(st, &flat), PathBuf::from("out/s.rs"));
    }
}
