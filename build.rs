// Build script to compile GLSL shaders to SPIR-V
//
// The parts load `shaders/*.spv` at runtime, so a missing glslc only
// produces a warning; the binaries will report which file is absent.

use std::path::Path;
use std::process::Command;

const SHADERS: &[&str] = &[
    "triangle.vert",
    "color.frag",
    "vertex_color.vert",
    "uniform.vert",
    "textured.vert",
    "textured.frag",
];

fn main() {
    println!("cargo:rerun-if-changed=shaders/");

    for shader in SHADERS {
        let input = format!("shaders/{shader}");
        let output = format!("shaders/{shader}.spv");
        compile_shader(&input, &output);
    }
}

fn compile_shader(input: &str, output: &str) {
    let input_path = Path::new(input);
    let output_path = Path::new(output);

    // Check if glslc is available
    let result = Command::new("glslc")
        .arg(input_path)
        .arg("-o")
        .arg(output_path)
        .status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            panic!("Failed to compile {}: exit code {:?}", input, status.code());
        }
        Err(e) => {
            println!("cargo:warning=glslc not found ({e}); {input} was not compiled");
            println!("cargo:warning=  glslc {input} -o {output}");
        }
    }
}
