// build.rs
// Compiles the GLSL shaders in resources/shaders to SPIR-V

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_STAGES: [&str; 2] = ["vert", "frag"];

fn main() {
    println!("cargo:rerun-if-changed=../../resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        eprintln!("hint: Install Vulkan SDK and set VULKAN_SDK environment variable");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };

    if !Path::new(&glslc).exists() {
        eprintln!("error: glslc not found at: {}", glslc);
        eprintln!("hint: Ensure Vulkan SDK is properly installed");
        panic!("Shader compiler not found");
    }

    let shader_dir = PathBuf::from("../../resources/shaders");
    let target_dir = PathBuf::from("../../target/shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create target directory: {}", e);
        return;
    }

    let shader_files = match std::fs::read_dir(&shader_dir) {
        Ok(files) => files,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return;
        }
    };

    let mut compiled_count = 0;
    for entry in shader_files.flatten() {
        let path = entry.path();
        let is_shader = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_STAGES.contains(&ext));
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_shader {
            continue;
        }

        // scene.vert -> scene.vert.spv, so both stages of a program can share a stem
        let out_file = target_dir.join(format!("{}.spv", file_name));

        let needs_compile = match (
            std::fs::metadata(&path).and_then(|m| m.modified()),
            std::fs::metadata(&out_file).and_then(|m| m.modified()),
        ) {
            (Ok(src), Ok(dst)) => src > dst,
            _ => true,
        };

        if !needs_compile {
            eprintln!("info: Shader {} is up to date", file_name);
            continue;
        }

        let status = Command::new(&glslc)
            .arg("--target-env=vulkan1.3")
            .arg(&path)
            .arg("-o")
            .arg(&out_file)
            .status();

        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {} -> {}.spv", file_name, file_name);
                compiled_count += 1;
            }
            Ok(s) => {
                eprintln!("error: glslc failed for {:?} with exit code: {}", path, s.code().unwrap_or(-1));
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {:?}: {}", path, e);
                panic!("Failed to execute shader compiler");
            }
        }
    }

    if compiled_count > 0 {
        eprintln!("info: Successfully compiled {} shader(s)", compiled_count);
    } else {
        eprintln!("info: All shaders are up to date");
    }
}
