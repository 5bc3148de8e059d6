//! Code-generation collaborator
//!
//! [`RuleCodegen`] knows a fixed set of (source, target) pairs and emits a
//! stub per routine with a line mapping back to the legacy source.

use crate::error::StageError;
use crate::language::{SourceLanguage, TargetLanguage};
use crate::model::{FunctionInfo, LineMapping, ParseResult, TranslationResult};
use async_trait::async_trait;

/// Translates a parse result into target-language code
#[async_trait]
pub trait CodegenEngine: Send + Sync {
    async fn translate(
        &self,
        parse: &ParseResult,
        source_file: &str,
        target: TargetLanguage,
    ) -> Result<TranslationResult, StageError>;
}

/// A supported translation pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodegenRule {
    pub from: SourceLanguage,
    pub to: TargetLanguage,
    /// Confidence assigned to every emitted mapping
    pub confidence: f64,
}

const RULES: [CodegenRule; 4] = [
    CodegenRule {
        from: SourceLanguage::Cobol,
        to: TargetLanguage::Python,
        confidence: 0.85,
    },
    CodegenRule {
        from: SourceLanguage::Pascal,
        to: TargetLanguage::Python,
        confidence: 0.90,
    },
    CodegenRule {
        from: SourceLanguage::Vb6,
        to: TargetLanguage::TypeScript,
        confidence: 0.88,
    },
    CodegenRule {
        from: SourceLanguage::Fortran,
        to: TargetLanguage::Python,
        confidence: 0.75,
    },
];

/// Table-driven stub generator
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleCodegen;

impl RuleCodegen {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Rule for a pair, if supported
    #[must_use]
    pub fn rule(from: SourceLanguage, to: TargetLanguage) -> Option<CodegenRule> {
        RULES.iter().copied().find(|r| r.from == from && r.to == to)
    }

    /// Every supported pair
    #[must_use]
    pub fn rules() -> &'static [CodegenRule] {
        &RULES
    }

    /// Translate synchronously
    ///
    /// # Errors
    /// `StageError::UnsupportedPair` when no rule covers the pair.
    pub fn generate(
        &self,
        parse: &ParseResult,
        source_file: &str,
        target: TargetLanguage,
    ) -> Result<TranslationResult, StageError> {
        let rule = Self::rule(parse.language, target).ok_or(StageError::UnsupportedPair {
            from: parse.language,
            to: target,
        })?;

        let mut out = Emitter::default();
        let mut mappings = Vec::with_capacity(parse.functions.len());
        match target {
            TargetLanguage::Python => {
                python_module(&mut out, rule, &parse.functions, &mut mappings);
            }
            TargetLanguage::TypeScript => {
                typescript_module(&mut out, rule, &parse.functions, &mut mappings);
            }
            // No rule targets these yet
            TargetLanguage::Java | TargetLanguage::Go => {
                return Err(StageError::UnsupportedPair {
                    from: parse.language,
                    to: target,
                })
            }
        }

        let mut warnings = Vec::new();
        if !parse.metadata.deprecated_patterns.is_empty() {
            let patterns: Vec<&str> = parse
                .metadata
                .deprecated_patterns
                .iter()
                .map(String::as_str)
                .collect();
            warnings.push(format!("Deprecated patterns found: {}", patterns.join(", ")));
        }

        Ok(TranslationResult {
            target_file: target.target_path(source_file),
            target_language: target,
            translated_code: out.finish(),
            mappings,
            warnings,
        })
    }
}

#[async_trait]
impl CodegenEngine for RuleCodegen {
    async fn translate(
        &self,
        parse: &ParseResult,
        source_file: &str,
        target: TargetLanguage,
    ) -> Result<TranslationResult, StageError> {
        self.generate(parse, source_file, target)
    }
}

/// Line-counting text buffer
#[derive(Default)]
struct Emitter {
    lines: Vec<String>,
}

impl Emitter {
    /// Push a line, returning its 1-based number
    fn line(&mut self, text: impl Into<String>) -> usize {
        self.lines.push(text.into());
        self.lines.len()
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn finish(self) -> String {
        let mut code = self.lines.join("\n");
        code.push('\n');
        code
    }
}

fn python_module(
    out: &mut Emitter,
    rule: CodegenRule,
    functions: &[FunctionInfo],
    mappings: &mut Vec<LineMapping>,
) {
    out.line(format!("\"\"\"Translated from {}\"\"\"", rule.from));
    out.blank();
    out.line("from typing import Any, Dict, List");
    if rule.from == SourceLanguage::Cobol {
        out.line("from decimal import Decimal");
    }
    out.blank();

    for function in functions {
        let params: Vec<String> = function
            .parameters
            .iter()
            .map(|p| TargetLanguage::Python.function_name(p))
            .collect();
        let target_line = out.line(format!(
            "def {}({}):",
            TargetLanguage::Python.function_name(&function.name),
            params.join(", ")
        ));
        out.line(format!("    \"\"\"{}\"\"\"", function.name));
        out.line("    pass");
        out.blank();
        mappings.push(LineMapping {
            source_line: function.line_start,
            target_line,
            confidence: rule.confidence,
        });
    }

    out.line("if __name__ == \"__main__\":");
    out.line("    pass");
}

fn typescript_module(
    out: &mut Emitter,
    rule: CodegenRule,
    functions: &[FunctionInfo],
    mappings: &mut Vec<LineMapping>,
) {
    out.line(format!("// Translated from {}", rule.from));
    out.blank();

    for function in functions {
        let params: Vec<String> = function
            .parameters
            .iter()
            .map(|p| format!("{}: unknown", TargetLanguage::TypeScript.function_name(p)))
            .collect();
        let target_line = out.line(format!(
            "export function {}({}): void {{",
            TargetLanguage::TypeScript.function_name(&function.name),
            params.join(", ")
        ));
        out.line(format!("  // {}", function.name));
        out.line("}");
        out.blank();
        mappings.push(LineMapping {
            source_line: function.line_start,
            target_line,
            confidence: rule.confidence,
        });
    }
}
