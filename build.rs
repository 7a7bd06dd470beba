use std::env;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=csrc/yolov5_shim.cc");
    println!("cargo:rerun-if-env-changed=RKNN_LIB_DIR");
    println!("cargo:rerun-if-env-changed=RGA_LIB_DIR");
    println!("cargo:rerun-if-env-changed=YOLOV5_POSTPROCESS_DIR");
    println!("cargo:rerun-if-env-changed=RKNN_INCLUDE_DIR");

    // Vendor libraries are only linked for on-device builds
    if env::var_os("CARGO_FEATURE_ROCKCHIP").is_none() {
        return;
    }

    build_postprocess_shim();

    for var in ["RKNN_LIB_DIR", "RGA_LIB_DIR"] {
        if let Ok(dir) = env::var(var) {
            println!("cargo:rustc-link-search=native={}", dir);
        }
    }

    // Board images ship the runtime and librga here
    println!("cargo:rustc-link-search=native=/usr/lib");
    println!("cargo:rustc-link-search=native=/usr/lib/aarch64-linux-gnu");

    println!("cargo:rustc-link-lib=dylib=rknnrt");
    println!("cargo:rustc-link-lib=dylib=rga");
}

/// `name` directly under `root` or under one of `subdirs`
fn locate(root: &Path, subdirs: &[&str], name: &str) -> Option<PathBuf> {
    std::iter::once(root.to_path_buf())
        .chain(subdirs.iter().map(|sub| root.join(sub)))
        .map(|dir| dir.join(name))
        .find(|path| path.exists())
}

/// Compile the model-zoo YOLOv5 post-process together with its C shim.
///
/// `YOLOV5_POSTPROCESS_DIR` points at the model-zoo demo holding
/// `postprocess.h` and `postprocess.cc` (either flat or under
/// `include/` and `src/`).
fn build_postprocess_shim() {
    let root = env::var("YOLOV5_POSTPROCESS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            panic!("YOLOV5_POSTPROCESS_DIR must point at the RKNN model-zoo YOLOv5 demo sources")
        });
    let header = locate(&root, &["include"], "postprocess.h").unwrap_or_else(|| {
        panic!("postprocess.h not found under {}", root.display())
    });
    let source = locate(&root, &["src"], "postprocess.cc").unwrap_or_else(|| {
        panic!("postprocess.cc not found under {}", root.display())
    });
    println!("cargo:rerun-if-changed={}", source.display());

    let mut build = cc::Build::new();
    build
        .cpp(true)
        .flag_if_supported("-std=c++11")
        .include(header.parent().unwrap_or(&root))
        .file("csrc/yolov5_shim.cc")
        .file(&source);
    if let Ok(rknn_include) = env::var("RKNN_INCLUDE_DIR") {
        build.include(rknn_include);
    }
    build.compile("npuview_yolov5");
}
