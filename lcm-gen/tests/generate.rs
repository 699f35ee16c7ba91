use std::fs;
use std::path::PathBuf;

use lcm_gen::{generate, Options};

fn write_idl(dir: &tempfile::TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    path
}

#[test]
fn generates_one_file_per_struct_under_the_package_tree() {
    let dir = tempfile::tempdir().unwrap();
    let idl = write_idl(
        &dir,
        "example.lcm",
        "package exlcm;\n\
         struct point_t { double x; double y; double z; }\n\
         struct pose_t { point_t position; point_t velocity; }\n",
    );
    let out = dir.path().join("generated");

    let summary = generate(
        &[idl],
        &Options {
            out_dir: out.clone(),
            package_dirs: true,
        },
    );
    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    // Two struct files plus the two mod.rs files of the module tree.
    assert_eq!(summary.written.len(), 4);

    let point = fs::read_to_string(out.join("exlcm/point_t.rs")).unwrap();
    assert!(point.contains("const FINGERPRINT: u64 = 0xae7e5fba5eeca11e;"));
    let pose = fs::read_to_string(out.join("exlcm/pose_t.rs")).unwrap();
    assert!(pose.contains("pub position: super::point_t::point_t,"));

    let root = fs::read_to_string(out.join("mod.rs")).unwrap();
    assert!(root.contains("pub mod exlcm;"));
    let package = fs::read_to_string(out.join("exlcm/mod.rs")).unwrap();
    assert!(package.contains("pub mod point_t;"));
    assert!(package.contains("pub mod pose_t;"));
}

#[test]
fn flat_output_skips_package_directories() {
    let dir = tempfile::tempdir().unwrap();
    let idl = write_idl(&dir, "p.lcm", "package a.b;\nstruct s { int8_t v; }\n");
    let out = dir.path().join("flat");

    let summary = generate(
        &[idl],
        &Options {
            out_dir: out.clone(),
            package_dirs: false,
        },
    );
    assert!(summary.failures.is_empty());
    assert!(out.join("s.rs").exists());
    assert!(!out.join("a").exists());
    let root = fs::read_to_string(out.join("mod.rs")).unwrap();
    assert_eq!(root, "// Generated by lcm-gen. DO NOT EDIT.\n\npub mod s;\n");
}

#[test]
fn type_references_resolve_across_files_of_one_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let inner = write_idl(&dir, "inner.lcm", "package t;\nstruct inner { int32_t a; }\n");
    let outer = write_idl(&dir, "outer.lcm", "package t;\nstruct outer { inner child; }\n");
    let out = dir.path().join("gen");

    let summary = generate(
        &[inner, outer],
        &Options {
            out_dir: out.clone(),
            package_dirs: true,
        },
    );
    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    assert!(out.join("t/outer.rs").exists());
}

#[test]
fn a_bad_file_does_not_abort_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write_idl(&dir, "bad.lcm", "struct broken {");
    let good = write_idl(&dir, "good.lcm", "struct fine { int8_t v; }\n");
    let missing = dir.path().join("missing.lcm");
    let out = dir.path().join("gen");

    let summary = generate(
        &[bad, missing, good],
        &Options {
            out_dir: out.clone(),
            package_dirs: true,
        },
    );
    assert_eq!(summary.failures.len(), 2);
    // The surviving struct plus the root mod.rs.
    assert_eq!(summary.written.len(), 2);
    assert!(out.join("fine.rs").exists());
}
