//! Code-centric prompt tasks delegated to a text generator.
//!
//! [`CodeService`] wraps one code file, an optional repository-context
//! string, and a generator, and exposes the review/refactor/test/document
//! tasks as one method per task. It has no logic beyond prompt templating;
//! every call is a single [`TextGenerator::generate_text`] round trip.

use std::path::Path;

use crate::client::GenerateOptions;
use crate::error::LlmError;
use crate::summarize::TextGenerator;

pub(crate) const FENCE: &str = "--------------------";

/// How a code-mutating task should return its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// A unified diff against the original file, applicable with
    /// `git apply`.
    UnifiedDiff,
    /// The complete updated file as plain text.
    FullFile,
}

/// Language hint for a source path, based on its extension.
pub fn language_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("go") => "go",
        Some("java") => "java",
        Some("c") | Some("h") => "c",
        Some("cpp") | Some("cc") | Some("hpp") => "c++",
        _ => "unknown",
    }
}

fn default_test_framework(language: &str) -> &'static str {
    match language {
        "rust" => "the built-in test harness (#[cfg(test)] modules with #[test] functions)",
        "python" => "pytest",
        "javascript" | "typescript" => "jest",
        "go" => "the built-in testing package",
        _ => "the language's standard unit-testing framework",
    }
}

/// Prompt-building service over one code file.
///
/// Borrows the generator and all inputs; construct one per file and task
/// batch. The repository context may be empty; it is always included in the
/// prompt so the model knows the field exists.
pub struct CodeService<'a> {
    generator: &'a dyn TextGenerator,
    code: &'a str,
    language: &'a str,
    context: &'a str,
    file_path: Option<&'a str>,
}

impl<'a> CodeService<'a> {
    pub fn new(generator: &'a dyn TextGenerator, code: &'a str, language: &'a str) -> Self {
        Self {
            generator,
            code,
            language,
            context: "",
            file_path: None,
        }
    }

    /// Attach repository-level context (other files, README snippets,
    /// architecture notes).
    pub fn with_context(mut self, context: &'a str) -> Self {
        self.context = context;
        self
    }

    /// Path of the file within the repository, used for diff headers so a
    /// returned patch can be applied with `git apply`.
    pub fn with_file_path(mut self, file_path: &'a str) -> Self {
        self.file_path = Some(file_path);
        self
    }

    async fn generate(&self, prompt: String) -> Result<String, LlmError> {
        self.generator
            .generate_text(&prompt, &GenerateOptions::default())
            .await
    }

    fn context_block(&self) -> String {
        format!(
            "Repository context (may be partial, use only if helpful):\n{FENCE}\n{}\n{FENCE}",
            self.context
        )
    }

    fn code_block(&self, label: &str) -> String {
        format!("{label}:\n{FENCE}\n{}\n{FENCE}", self.code)
    }

    fn output_instruction(&self, output: OutputFormat) -> String {
        match output {
            OutputFormat::FullFile => "Return the FULL updated code file as plain text. \
                 Do NOT include any explanation outside of comments or doc comments."
                .to_string(),
            OutputFormat::UnifiedDiff => {
                let file_label = self.file_path.unwrap_or("code.txt");
                format!(
                    "Return ONLY a unified diff (patch) that can be applied with `git apply` \
                     against the original code shown above.\n\n\
                     Requirements for the diff:\n\
                     - Use standard unified diff format.\n\
                     - Include `---` and `+++` headers using '{file_label}' as the file path.\n\
                     - Make sure the diff can be applied cleanly to the original content.\n\
                     - Do NOT include any prose explanation before or after the diff."
                )
            }
        }
    }

    /// Natural-language overview of the whole file.
    pub async fn describe_module(&self) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an expert software engineer.\n\n\
             You are given a code file and some additional repository context.\n\
             Describe what this file provides, in clear, concise language.\n\n\
             Focus on:\n\
             - The file's overall purpose.\n\
             - The main types and functions it defines.\n\
             - How it likely fits into the bigger system.\n\n\
             Keep the description suitable for a developer reading documentation.\n\n\
             {}\n\n\
             {}",
            self.context_block(),
            self.code_block("Code file")
        );
        self.generate(prompt).await
    }

    /// Natural-language description of one symbol defined in the file.
    pub async fn describe_symbol(&self, name: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an expert software engineer.\n\n\
             You are given a code file and some additional repository context.\n\
             Describe '{name}' in clear, concise language.\n\n\
             Focus on:\n\
             - What it does.\n\
             - Its key responsibilities.\n\
             - How it likely fits into the bigger system.\n\
             - Any important design decisions or patterns that stand out.\n\n\
             Keep the description suitable for a developer reading documentation.\n\n\
             {}\n\n\
             {}",
            self.context_block(),
            self.code_block("Code file")
        );
        self.generate(prompt).await
    }

    /// Model-extracted public interface of one symbol. Used where static
    /// extraction is not possible; the workspace analyzer extracts
    /// interfaces statically and never calls this.
    pub async fn interface_of(&self, name: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "Extract the public interface for '{name}' from the code below.\n\n\
             Requirements:\n\
             - Include the declaration line.\n\
             - Include its documentation comment if present.\n\
             - Include all public method signatures with their doc comments if present.\n\
             - Do NOT include implementation bodies; replace them with '...' or leave them empty.\n\
             - Return valid code in the same language as the original.\n\n\
             {}",
            self.code_block("Code file")
        );
        self.generate(prompt).await
    }

    /// Unit tests for the file's main public symbols, in the language's
    /// conventional framework.
    pub async fn write_unit_tests(&self) -> Result<String, LlmError> {
        let framework = default_test_framework(self.language);
        let prompt = format!(
            "You are an expert software engineer and test writer.\n\n\
             You are given the code of a file and some additional repository context.\n\
             Your task is to write unit tests for the main public types and functions \
             in the file.\n\n\
             Use the testing framework: {framework}.\n\n\
             Include clear comments that explain each test's purpose.\n\
             Follow these rules:\n\
             - Return ONLY valid test code as plain text.\n\
             - Do NOT include explanation outside of comments in the code.\n\
             - Make sure tests are realistic and cover both typical and edge cases.\n\n\
             {}\n\n\
             {}",
            self.context_block(),
            self.code_block("Code file")
        );
        self.generate(prompt).await
    }

    /// Extend the code per a natural-language request.
    pub async fn add_functionality(
        &self,
        request: &str,
        output: OutputFormat,
    ) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an expert software engineer.\n\n\
             You are given the code of a file and some additional repository context.\n\
             Your task is to add new functionality to this file.\n\n\
             New functionality description:\n{FENCE}\n{request}\n{FENCE}\n\n\
             Requirements:\n\
             - Modify ONLY the relevant parts of the code needed to support the new \
             functionality.\n\
             - Preserve existing behavior unless the description explicitly states \
             otherwise.\n\
             - Follow the existing coding style and conventions (naming, formatting, \
             documentation).\n\n\
             {}\n\n\
             {}\n\n\
             {}",
            self.output_instruction(output),
            self.context_block(),
            self.code_block("Original code file")
        );
        self.generate(prompt).await
    }

    /// Refactor toward the stated goals, preserving behavior.
    pub async fn refactor(&self, goals: &str, output: OutputFormat) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an expert software engineer.\n\n\
             You are given the code of a file and some additional repository context.\n\
             Your task is to refactor this file.\n\n\
             Refactor goals:\n{FENCE}\n{goals}\n{FENCE}\n\n\
             Requirements:\n\
             - Preserve the public behavior and interface unless the goals explicitly \
             allow changes.\n\
             - Improve readability and maintainability.\n\
             - Keep or improve type annotations and documentation where appropriate.\n\
             - Follow the existing coding style and conventions.\n\n\
             {}\n\n\
             {}\n\n\
             {}",
            self.output_instruction(output),
            self.context_block(),
            self.code_block("Original code file")
        );
        self.generate(prompt).await
    }

    /// Add or improve documentation comments, leaving the code otherwise
    /// unchanged.
    pub async fn docstrings(&self, output: OutputFormat) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an expert software engineer.\n\n\
             You are given the code of a file and some additional repository context.\n\
             Your task is to add or improve documentation comments throughout this file.\n\n\
             Requirements:\n\
             - Ensure all public types and functions have clear, informative \
             documentation comments.\n\
             - Follow the documentation style conventional for the language, and the \
             existing style if one is already present.\n\
             - Preserve existing behavior and signatures.\n\n\
             {}\n\n\
             {}\n\n\
             {}",
            self.output_instruction(output),
            self.context_block(),
            self.code_block("Original code file")
        );
        self.generate(prompt).await
    }

    /// Review-style list of concrete improvement suggestions; never
    /// modified code.
    pub async fn suggest_improvements(&self) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an expert software engineer performing a code review.\n\n\
             You are given the code of a file and some additional repository context.\n\
             Provide a list of concrete improvement suggestions for this file.\n\n\
             Focus on:\n\
             - Readability and maintainability.\n\
             - Naming and structure.\n\
             - Testability and separation of concerns.\n\
             - Error handling and edge cases.\n\
             - Type annotations and documentation.\n\n\
             Format your answer as bullet points grouped by theme. Do NOT return \
             modified code, only suggestions.\n\n\
             {}\n\n\
             {}",
            self.context_block(),
            self.code_block("Code file")
        );
        self.generate(prompt).await
    }

    /// Step-by-step explanation of one function or method.
    pub async fn explain_function(&self, name: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an expert software engineer.\n\n\
             You are given a code file and some additional repository context.\n\
             Explain the function '{name}'.\n\n\
             Focus on:\n\
             - What the function does and when it should be used.\n\
             - Its parameters and return value.\n\
             - Important branches or edge cases.\n\
             - Any side effects or interactions with other components.\n\n\
             Keep the explanation suitable for a developer reading documentation.\n\n\
             {}\n\n\
             {}",
            self.context_block(),
            self.code_block("Code file")
        );
        self.generate(prompt).await
    }

    /// Realistic example snippets using the file's interface, steered by a
    /// caller-supplied usage context.
    pub async fn usage_examples(&self, usage_context: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an expert software engineer.\n\n\
             You are given a code file, some repository context, and some additional \
             usage context.\n\n\
             Your task is to generate realistic usage examples for the code in this file.\n\n\
             Usage context (what the caller is trying to do, constraints, etc.):\n\
             {FENCE}\n{usage_context}\n{FENCE}\n\n\
             {}\n\n\
             {}\n\n\
             Requirements:\n\
             - Provide one or more concise code examples showing how to use the file's \
             public interface.\n\
             - Use realistic data and function calls.\n\
             - If relevant, show how this code interacts with other components hinted \
             at in the context.\n\
             - Return ONLY code examples as plain text (with comments allowed), no \
             prose explanation around them.",
            self.context_block(),
            self.code_block("Code file")
        );
        self.generate(prompt).await
    }

    /// Merge-request style review of a proposed diff against the held code.
    pub async fn review_diff(&self, diff: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an expert software engineer performing a code review.\n\n\
             You are given:\n\
             - The previous version of a code file (as stored in the repository).\n\
             - A diff describing the proposed changes to that file.\n\
             - Some additional repository context.\n\n\
             {}\n\n\
             Diff (proposed changes):\n{FENCE}\n{diff}\n{FENCE}\n\n\
             {}\n\n\
             Your task:\n\
             - Act as a reviewer doing a code review for a merge request.\n\
             - Identify what has changed and why it might have been changed.\n\
             - Call out potential issues, edge cases, or design concerns.\n\
             - Highlight improvements or positive aspects where relevant.\n\n\
             Output format:\n\
             1. A suggested merge request title (one line).\n\
             2. A short merge request description (2-5 bullet points).\n\
             3. A section \"Review comments\" with bullet points of concrete comments a \
             reviewer might leave (both positive and critical).\n\n\
             Do NOT output any modified code, only the review content.",
            self.code_block("Previous code file (before changes)"),
            self.context_block()
        );
        self.generate(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Echoes the prompt back, so tests can assert on what was sent.
    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate_text(
            &self,
            prompt: &str,
            _opts: &GenerateOptions,
        ) -> Result<String, LlmError> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test]
    async fn describe_symbol_includes_code_and_context() {
        let service = CodeService::new(&EchoGenerator, "fn solve() {}", "rust")
            .with_context("part of the solver crate");
        let prompt = service.describe_symbol("solve").await.unwrap();

        assert!(prompt.contains("Describe 'solve'"));
        assert!(prompt.contains("fn solve() {}"));
        assert!(prompt.contains("part of the solver crate"));
    }

    #[tokio::test]
    async fn unit_tests_prompt_names_the_framework() {
        let rust = CodeService::new(&EchoGenerator, "fn f() {}", "rust");
        let prompt = rust.write_unit_tests().await.unwrap();
        assert!(prompt.contains("#[cfg(test)]"));

        let python = CodeService::new(&EchoGenerator, "def f(): pass", "python");
        let prompt = python.write_unit_tests().await.unwrap();
        assert!(prompt.contains("pytest"));
    }

    #[tokio::test]
    async fn diff_output_instruction_carries_file_label() {
        let service = CodeService::new(&EchoGenerator, "fn f() {}", "rust")
            .with_file_path("src/solver.rs");
        let prompt = service
            .refactor("simplify", OutputFormat::UnifiedDiff)
            .await
            .unwrap();

        assert!(prompt.contains("unified diff"));
        assert!(prompt.contains("`git apply`"));
        assert!(prompt.contains("'src/solver.rs'"));
        assert!(prompt.contains("Refactor goals:"));
    }

    #[tokio::test]
    async fn interface_prompt_forbids_implementation_bodies() {
        let service = CodeService::new(&EchoGenerator, "struct Widget;", "rust");
        let prompt = service.interface_of("Widget").await.unwrap();
        assert!(prompt.contains("public interface for 'Widget'"));
        assert!(prompt.contains("Do NOT include implementation bodies"));
    }

    #[tokio::test]
    async fn full_file_output_instruction_has_no_diff_talk() {
        let service = CodeService::new(&EchoGenerator, "fn f() {}", "rust");
        let prompt = service
            .docstrings(OutputFormat::FullFile)
            .await
            .unwrap();
        assert!(prompt.contains("FULL updated code file"));
        assert!(!prompt.contains("unified diff"));
    }

    #[tokio::test]
    async fn review_diff_includes_both_versions() {
        let service = CodeService::new(&EchoGenerator, "old code", "rust");
        let prompt = service.review_diff("+new line").await.unwrap();
        assert!(prompt.contains("old code"));
        assert!(prompt.contains("+new line"));
        assert!(prompt.contains("Review comments"));
    }

    #[test]
    fn language_detection_by_extension() {
        assert_eq!(language_for(Path::new("a/b/lib.rs")), "rust");
        assert_eq!(language_for(Path::new("x.py")), "python");
        assert_eq!(language_for(Path::new("x.unknown_ext")), "unknown");
        assert_eq!(language_for(Path::new("Makefile")), "unknown");
    }
}
