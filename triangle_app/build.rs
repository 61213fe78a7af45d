// build.rs
// Compiles the triangle shaders to SPIR-V next to their sources

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Shader sources and the SPIR-V file each one produces
const SHADERS: [(&str, &str); 2] = [
    ("triangle.vert", "vert.spv"),
    ("triangle.frag", "frag.spv"),
];

fn needs_compile(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified());
    match (modified(source), modified(output)) {
        (Ok(src), Ok(dst)) => src > dst,
        // Compile if either file doesn't exist or we can't get metadata
        _ => true,
    }
}

fn compile_shader(glslc: &Path, source: &Path, output: &Path) -> bool {
    if !needs_compile(source, output) {
        eprintln!("info: Shader {} is up to date", source.display());
        return false;
    }

    let status = Command::new(glslc)
        .arg(source)
        .arg("-o")
        .arg(output)
        .status();

    match status {
        Ok(s) if s.success() => {
            eprintln!("info: Compiled {} -> {}", source.display(), output.display());
            true
        }
        Ok(s) => {
            eprintln!("error: glslc failed for {} with exit code: {}", source.display(), s.code().unwrap_or(-1));
            panic!("Shader compilation failed");
        }
        Err(e) => {
            eprintln!("error: Failed to run glslc for {}: {e}", source.display());
            panic!("Failed to execute shader compiler");
        }
    }
}

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").map_or_else(|_| PathBuf::from("."), PathBuf::from);
    let shader_dir = manifest_dir.join("../assets/shaders");

    println!("cargo:rerun-if-changed={}", shader_dir.display());
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var_os("SKIP_SHADERS").is_some() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        println!("cargo:warning=VULKAN_SDK not set, shader compilation skipped");
        eprintln!("hint: Install Vulkan SDK and set VULKAN_SDK environment variable");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        Path::new(&vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        Path::new(&vulkan_sdk).join("bin").join("glslc")
    };

    if !glslc.exists() {
        println!("cargo:warning=glslc not found at {}, shader compilation skipped", glslc.display());
        return;
    }

    let compiled = SHADERS
        .iter()
        .filter(|(source, output)| compile_shader(&glslc, &shader_dir.join(source), &shader_dir.join(output)))
        .count();

    if compiled > 0 {
        eprintln!("info: Successfully compiled {compiled} shader(s)");
    } else {
        eprintln!("info: All shaders are up to date");
    }
}
