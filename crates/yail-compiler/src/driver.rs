//! Compiler driver that runs a saved project through the pipeline

use std::path::{Path, PathBuf};

use yail_blocks::{LanguageDef, Workspace};

use crate::assembler::{ProjectAssembler, DEFAULT_PACKAGE};
use crate::codegen::{CodeGenerator, Diagnostic, Severity};
use crate::error::{CompileError, Result};
use crate::rules::LinkRules;

/// Compilation output structure
pub struct CompileOutput {
    /// Project file that was compiled
    pub source_file: PathBuf,
    /// Name of the root form
    pub form_name: String,
    /// The assembled YAIL program
    pub yail: String,
    /// Warnings and errors attached to blocks
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity != Severity::Warning)
    }
}

/// Options for compilation
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Project file (workspace JSON)
    pub input: PathBuf,
    /// Where to write the program; `None` leaves writing to the caller
    pub output: Option<PathBuf>,
    /// Assemble for a live session instead of a packaged app
    pub repl: bool,
    /// Package prefix for the form class
    pub package: Option<String>,
    /// Language definition JSON; the built-in language when unset
    pub language: Option<PathBuf>,
    /// Log each pipeline stage at info level
    pub verbose: bool,
}

impl CompileOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            repl: false,
            package: None,
            language: None,
            verbose: false,
        }
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn repl(mut self, repl: bool) -> Self {
        self.repl = repl;
        self
    }

    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn language(mut self, path: impl Into<PathBuf>) -> Self {
        self.language = Some(path.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// The YAIL compiler
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Load, compile and assemble the project.
    pub fn compile(&self) -> Result<CompileOutput> {
        let lang = self.load_language()?;
        let workspace = self.load_workspace()?;
        let rules = LinkRules::new(&lang)?;
        self.stage("language loaded", lang.genera.len());

        let mut generator = CodeGenerator::new(&lang, &rules, &workspace).for_repl(self.options.repl);
        let code = generator.compile_workspace();
        let diagnostics = generator.take_diagnostics();
        self.stage("blocks compiled", workspace.blocks.len());

        let package = self.options.package.clone().unwrap_or_else(|| self.default_package());
        let yail = ProjectAssembler::new(&rules)
            .package(package)
            .assemble_program(&workspace.components, &code, self.options.repl)?;
        self.stage("program assembled", yail.len());

        if let Some(path) = &self.options.output {
            std::fs::write(path, &yail)?;
            tracing::info!(path = %path.display(), "wrote program");
        }

        let form_name = workspace
            .components
            .root_name()
            .unwrap_or_default()
            .to_string();
        Ok(CompileOutput {
            source_file: self.options.input.clone(),
            form_name,
            yail,
            diagnostics,
        })
    }

    fn stage(&self, what: &str, count: usize) {
        if self.options.verbose {
            tracing::info!(count, "{}", what);
        } else {
            tracing::debug!(count, "{}", what);
        }
    }

    fn load_language(&self) -> Result<LanguageDef> {
        match &self.options.language {
            Some(path) => {
                let text = read_file(path)?;
                LanguageDef::from_json(&text).map_err(|e| CompileError::json(path, e.to_string()))
            }
            None => Ok(LanguageDef::standard()),
        }
    }

    fn load_workspace(&self) -> Result<Workspace> {
        let text = read_file(&self.options.input)?;
        Workspace::from_json(&text).map_err(|e| CompileError::json(&self.options.input, e.to_string()))
    }

    /// `appinventor.ai_user.<file stem>`
    fn default_package(&self) -> String {
        let stem = self
            .options
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| {
                s.chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                    .collect::<String>()
            })
            .unwrap_or_default();
        if stem.is_empty() {
            DEFAULT_PACKAGE.to_string()
        } else {
            format!("{}.{}", DEFAULT_PACKAGE, stem)
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CompileError::FileNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_options_builder() {
        let opts = CompileOptions::new("project.json")
            .output("out.yail")
            .repl(true)
            .package("com.example")
            .verbose(true);

        assert_eq!(opts.input, PathBuf::from("project.json"));
        assert_eq!(opts.output, Some(PathBuf::from("out.yail")));
        assert!(opts.repl);
        assert_eq!(opts.package.as_deref(), Some("com.example"));
        assert!(opts.verbose);
    }

    #[test]
    fn test_default_package_from_file_stem() {
        let compiler = Compiler::new(CompileOptions::new("/tmp/my-app.json"));
        assert_eq!(compiler.default_package(), "appinventor.ai_user.my_app");
    }

    #[test]
    fn test_missing_input() {
        let compiler = Compiler::new(CompileOptions::new("/definitely/not/here.json"));
        assert!(matches!(compiler.compile(), Err(CompileError::FileNotFound(_))));
    }
}
