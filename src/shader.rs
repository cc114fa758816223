//! Loading, validating and hot-swapping compute shaders.
//!
//! A [`ShaderSlot`] owns the program currently used by one compute stage.
//! Reloading reads the file again and asks a [`ProgramCompiler`] for a new
//! program. The old program is dropped only once the new one compiled; on
//! failure the slot keeps running the previous program.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::error::ShaderError;

/// Source language of a shader file, picked from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderLanguage {
    Wgsl,
    /// GLSL compute shader (`.comp` / `.glsl`).
    Glsl,
}

impl ShaderLanguage {
    /// Anything that is not `.comp` or `.glsl` is treated as WGSL.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("comp") | Some("glsl") => ShaderLanguage::Glsl,
            _ => ShaderLanguage::Wgsl,
        }
    }
}

/// Shader source read from disk.
#[derive(Debug, Clone)]
pub struct ShaderFile {
    pub path: PathBuf,
    pub language: ShaderLanguage,
    pub code: String,
}

impl ShaderFile {
    /// Read the whole file.
    pub fn load(path: &Path) -> Result<Self, ShaderError> {
        let code = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            language: ShaderLanguage::from_path(path),
            code,
        })
    }

    /// Label used for GPU objects and log lines.
    pub fn label(&self) -> String {
        self.path.display().to_string()
    }

    /// Hash of the source text, used to tell programs apart.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.code.hash(&mut hasher);
        hasher.finish()
    }
}

/// Parse and validate a compute shader with naga.
///
/// The returned module is only used for diagnostics; wgpu parses the source
/// again when the pipeline is built.
pub fn validate(file: &ShaderFile) -> Result<naga::Module, ShaderError> {
    let label = file.label();
    let module = match file.language {
        ShaderLanguage::Wgsl => {
            naga::front::wgsl::parse_str(&file.code).map_err(|err| ShaderError::Parse {
                label: label.clone(),
                message: err.emit_to_string(&file.code),
            })?
        }
        ShaderLanguage::Glsl => {
            let options = naga::front::glsl::Options::from(naga::ShaderStage::Compute);
            naga::front::glsl::Frontend::default()
                .parse(&options, &file.code)
                .map_err(|err| ShaderError::Parse {
                    label: label.clone(),
                    message: err.emit_to_string(&file.code),
                })?
        }
    };

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .validate(&module)
        .map_err(|err| ShaderError::Validation {
            label: label.clone(),
            message: err.emit_to_string(&file.code),
        })?;

    if workgroup_size(&module).is_none() {
        return Err(ShaderError::Validation {
            label,
            message: "no compute entry point named `main`".to_string(),
        });
    }

    Ok(module)
}

/// `@workgroup_size` of the `main` compute entry point.
pub fn workgroup_size(module: &naga::Module) -> Option<[u32; 3]> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Compute && ep.name == "main")
        .map(|ep| ep.workgroup_size)
}

/// Turns shader source into a runnable program.
pub trait ProgramCompiler {
    type Program;

    fn compile(&self, file: &ShaderFile) -> Result<Self::Program, ShaderError>;
}

/// Outcome of [`ShaderSlot::reload`].
///
/// `program` is the program the stage uses from now on: the new one when
/// `success` is set, otherwise the one that was already active.
#[derive(Debug)]
pub struct Reload<'a, P> {
    pub success: bool,
    pub program: &'a P,
    pub error: Option<ShaderError>,
}

/// Read `path` and compile it, logging the outcome.
fn compile_file<C: ProgramCompiler>(compiler: &C, path: &Path) -> Result<C::Program, ShaderError> {
    log::info!("Loading shader {}", path.display());
    ShaderFile::load(path)
        .and_then(|file| compiler.compile(&file))
        .inspect_err(|error| log::error!("{}", error))
}

/// The active program of one compute stage and where it comes from.
#[derive(Debug)]
pub struct ShaderSlot<P> {
    path: PathBuf,
    program: P,
    generation: u64,
}

impl<P> ShaderSlot<P> {
    /// Compile the initial program. Failing here is fatal for the caller.
    pub fn load<C>(compiler: &C, path: impl Into<PathBuf>) -> Result<Self, ShaderError>
    where
        C: ProgramCompiler<Program = P>,
    {
        let path = path.into();
        let program = compile_file(compiler, &path)?;
        Ok(Self {
            path,
            program,
            generation: 0,
        })
    }

    /// Read the file again and compile it.
    ///
    /// The previous program is dropped only once the new one compiled. On
    /// failure it stays active and the error is handed back in the result.
    pub fn reload<C>(&mut self, compiler: &C) -> Reload<'_, P>
    where
        C: ProgramCompiler<Program = P>,
    {
        match compile_file(compiler, &self.path) {
            Ok(program) => {
                self.program = program;
                self.generation += 1;
                Reload {
                    success: true,
                    program: &self.program,
                    error: None,
                }
            }
            Err(error) => Reload {
                success: false,
                program: &self.program,
                error: Some(error),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The active program.
    pub fn program(&self) -> &P {
        &self.program
    }

    /// Number of successful reloads since the initial load.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Compiler that only runs naga validation. Useful without a GPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidatingCompiler;

/// A validated shader: its fingerprint and the parsed module.
#[derive(Debug)]
pub struct ValidatedShader {
    pub fingerprint: u64,
    pub workgroup_size: [u32; 3],
    pub module: naga::Module,
}

impl ProgramCompiler for ValidatingCompiler {
    type Program = ValidatedShader;

    fn compile(&self, file: &ShaderFile) -> Result<ValidatedShader, ShaderError> {
        let module = validate(file)?;
        Ok(ValidatedShader {
            fingerprint: file.fingerprint(),
            workgroup_size: workgroup_size(&module).unwrap_or([1, 1, 1]),
            module,
        })
    }
}
