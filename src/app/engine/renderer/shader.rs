use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl ShaderKind {
    fn stage(self) -> shaderc::ShaderKind {
        match self {
            ShaderKind::Vertex => shaderc::ShaderKind::Vertex,
            ShaderKind::Fragment => shaderc::ShaderKind::Fragment,
        }
    }

    pub fn stage_flags(self) -> vk::ShaderStageFlags {
        match self {
            ShaderKind::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderKind::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Vertex => f.write_str("VERTEX"),
            ShaderKind::Fragment => f.write_str("FRAGMENT"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("Error in opening file {}: {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Shader compiler unavailable.")]
    CompilerUnavailable,
    #[error("{kind} shader compilation failed: {message}")]
    Compile { kind: ShaderKind, message: String },
    #[error("Failed to create {kind} shader module: {code}")]
    Module { kind: ShaderKind, code: vk::ErrorCode },
}

/// Reads a whole text file. A failed open is logged before it is returned.
pub fn read_file(path: impl AsRef<Path>) -> Result<String, ShaderError> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|source| {
        tracing::error!("Error in opening file {}", path.display());
        ShaderError::FileOpen {
            path: path.to_owned(),
            source,
        }
    })
}

/// GLSL to SPIR-V front end.
pub struct ShaderCompiler {
    compiler: shaderc::Compiler,
}

impl ShaderCompiler {
    pub fn new() -> Result<Self, ShaderError> {
        let compiler = shaderc::Compiler::new().ok_or(ShaderError::CompilerUnavailable)?;
        Ok(Self { compiler })
    }

    pub fn compile_shader(
        &mut self,
        source: &str,
        kind: ShaderKind,
        name: &str,
    ) -> Result<Vec<u32>, ShaderError> {
        let artifact = self
            .compiler
            .compile_into_spirv(source, kind.stage(), name, "main", None)
            .map_err(|e| {
                let message = e.to_string();
                tracing::error!("Shader compilation failed ({kind}):\n{message}");
                ShaderError::Compile { kind, message }
            })?;

        if artifact.get_num_warnings() > 0 {
            tracing::warn!("{}: {}", name, artifact.get_warning_messages());
        }

        Ok(artifact.as_binary().to_vec())
    }

    pub fn compile_file(
        &mut self,
        path: impl AsRef<Path>,
        kind: ShaderKind,
    ) -> Result<Vec<u32>, ShaderError> {
        let path = path.as_ref();
        let source = read_file(path)?;
        self.compile_shader(&source, kind, &path.to_string_lossy())
    }

    /// Compiles both stages independently so each one reports its own
    /// diagnostic even when the other fails.
    pub fn compile_both(
        &mut self,
        vertex: impl AsRef<Path>,
        fragment: impl AsRef<Path>,
    ) -> (Result<Vec<u32>, ShaderError>, Result<Vec<u32>, ShaderError>) {
        let vertex = self.compile_file(vertex, ShaderKind::Vertex);
        let fragment = self.compile_file(fragment, ShaderKind::Fragment);
        (vertex, fragment)
    }
}

/// Compiled vertex and fragment stages, kept so the pipeline can be rebuilt
/// on resize without recompiling.
pub struct ShaderProgram {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderProgram {
    pub fn load(vertex: impl AsRef<Path>, fragment: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let mut compiler = ShaderCompiler::new()?;
        let (vertex, fragment) = compiler.compile_both(vertex, fragment);
        Ok(Self {
            vertex: vertex?,
            fragment: fragment?,
        })
    }

    pub fn code(&self, kind: ShaderKind) -> &[u32] {
        match kind {
            ShaderKind::Vertex => &self.vertex,
            ShaderKind::Fragment => &self.fragment,
        }
    }
}

pub unsafe fn create_shader_module(
    device: &Device,
    code: &[u32],
    kind: ShaderKind,
) -> Result<vk::ShaderModule, ShaderError> {
    let info = vk::ShaderModuleCreateInfo::builder()
        .code_size(code.len() * 4)
        .code(code);

    device
        .create_shader_module(&info, None)
        .map_err(|code| ShaderError::Module { kind, code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const VERTEX_SOURCE: &str = "#version 450\n\
        layout(location = 0) in vec3 inPosition;\n\
        void main() { gl_Position = vec4(inPosition, 1.0); }\n";

    #[test]
    fn kind_names_match_diagnostics() {
        assert_eq!(ShaderKind::Vertex.to_string(), "VERTEX");
        assert_eq!(ShaderKind::Fragment.to_string(), "FRAGMENT");
    }

    #[test]
    fn read_file_returns_contents() {
        let dir = std::env::temp_dir().join("star_fan_read_file");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("shader.vert");
        fs::write(&path, VERTEX_SOURCE).unwrap();

        assert_eq!(read_file(&path).unwrap(), VERTEX_SOURCE);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_file_reports_missing_path() {
        let path = std::env::temp_dir().join("star_fan_missing/none.frag");
        match read_file(&path) {
            Err(ShaderError::FileOpen { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn read_file_has_no_size_cap() {
        let dir = std::env::temp_dir().join("star_fan_large_file");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("big.glsl");
        let text = "// padding\n".repeat(40_000);
        fs::write(&path, &text).unwrap();

        assert_eq!(read_file(&path).unwrap().len(), text.len());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn compiles_valid_vertex_shader() {
        let mut compiler = ShaderCompiler::new().unwrap();
        let spirv = compiler
            .compile_shader(VERTEX_SOURCE, ShaderKind::Vertex, "test.vert")
            .unwrap();
        // SPIR-V magic number.
        assert_eq!(spirv[0], 0x0723_0203);
    }

    #[test]
    fn compile_error_names_stage() {
        let mut compiler = ShaderCompiler::new().unwrap();
        let error = compiler
            .compile_shader("#version 450\nvoid main() { oops }", ShaderKind::Fragment, "bad.frag")
            .unwrap_err();
        assert!(matches!(error, ShaderError::Compile { kind: ShaderKind::Fragment, .. }));
        assert!(error.to_string().starts_with("FRAGMENT"));
    }

    #[test]
    fn both_stages_compile_when_vertex_fails() {
        let dir = std::env::temp_dir().join("star_fan_both_stages");
        fs::create_dir_all(&dir).unwrap();
        let vertex = dir.join("bad.vert");
        let fragment = dir.join("bad.frag");
        fs::write(&vertex, "#version 450\nvoid main() { broken }").unwrap();
        fs::write(&fragment, "#version 450\nvoid main() { also broken }").unwrap();

        let mut compiler = ShaderCompiler::new().unwrap();
        let (v, f) = compiler.compile_both(&vertex, &fragment);
        assert!(matches!(v, Err(ShaderError::Compile { kind: ShaderKind::Vertex, .. })));
        assert!(matches!(f, Err(ShaderError::Compile { kind: ShaderKind::Fragment, .. })));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn fragment_compiles_when_vertex_file_is_missing() {
        let dir = std::env::temp_dir().join("star_fan_missing_vertex");
        fs::create_dir_all(&dir).unwrap();
        let fragment = dir.join("bad.frag");
        fs::write(&fragment, "#version 450\nvoid main() { broken }").unwrap();

        let mut compiler = ShaderCompiler::new().unwrap();
        let (v, f) = compiler.compile_both(dir.join("none.vert"), &fragment);
        assert!(matches!(v, Err(ShaderError::FileOpen { .. })));
        assert!(matches!(f, Err(ShaderError::Compile { kind: ShaderKind::Fragment, .. })));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_fails_program_load() {
        let missing = std::env::temp_dir().join("star_fan_missing/shader.vert");
        assert!(matches!(
            ShaderProgram::load(&missing, &missing),
            Err(ShaderError::FileOpen { .. })
        ));
    }
}
