//! Legacy-language grammar collaborator
//!
//! [`GrammarEngine`] is the seam the parser stage delegates to. The bundled
//! [`RegexGrammar`] is line-oriented and recognises routine headers,
//! dependencies and deprecated constructs; it makes no claim to full
//! syntactic correctness.

use crate::error::StageError;
use crate::language::SourceLanguage;
use crate::model::{FunctionInfo, ParseMetadata, ParseResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Turns legacy source into a [`ParseResult`]
#[async_trait]
pub trait GrammarEngine: Send + Sync {
    async fn parse(&self, language: SourceLanguage, source: &str)
        -> Result<ParseResult, StageError>;
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid grammar pattern")
}

static CONTROL_FLOW: Lazy<Regex> = Lazy::new(|| re(r"(?i)\b(?:if|while|for|case|switch)\b"));

static COBOL_PARAGRAPH: Lazy<Regex> = Lazy::new(|| re(r"^([A-Z0-9-]+)\."));
static COBOL_CALL: Lazy<Regex> = Lazy::new(|| re(r#"(?i)\bCALL\s+["']([^"']+)["']"#));
static PASCAL_ROUTINE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)^\s*(?:class\s+)?(function|procedure)\s+([A-Za-z_][\w.]*)\s*(\([^)]*\))?")
});
static PASCAL_USES: Lazy<Regex> = Lazy::new(|| re(r"(?i)^\s*uses\s+([^;]+);"));
static VB6_ROUTINE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)^\s*(?:(?:public|private|friend|static)\s+)*(sub|function)\s+(\w+)\s*(\([^)]*\))?")
});
static VB6_DECLARE: Lazy<Regex> =
    Lazy::new(|| re(r#"(?i)^\s*(?:(?:public|private)\s+)?declare\s+(?:function|sub)\s+\w+\s+lib\s+"([^"]+)""#));
static FORTRAN_ROUTINE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)^\s*(?:(?:recursive|pure|elemental|integer|real|logical|complex|character|double\s+precision)\s+)*(subroutine|function)\s+(\w+)\s*(\([^)]*\))?")
});
static FORTRAN_USE: Lazy<Regex> = Lazy::new(|| re(r"(?i)^\s*use\s+(\w+)"));

/// (pattern, reported name)
static DEPRECATED: Lazy<Vec<(SourceLanguage, Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (SourceLanguage::Cobol, re(r"\bALTER\b"), "ALTER statement"),
        (SourceLanguage::Cobol, re(r"\bGO\s+TO\b"), "GO TO statement"),
        (SourceLanguage::Vb6, re(r"(?i)\bGoSub\b"), "GoSub statement"),
        (
            SourceLanguage::Vb6,
            re(r"(?i)\bOn\s+Error\s+Resume\s+Next\b"),
            "On Error Resume Next",
        ),
        (SourceLanguage::Fortran, re(r"(?i)^\s*COMMON\b"), "COMMON block"),
        (
            SourceLanguage::Fortran,
            re(r"(?i)^\s*EQUIVALENCE\b"),
            "EQUIVALENCE statement",
        ),
    ]
});

// Single-word COBOL statements that look like paragraph headers;
// scope terminators (`END-IF.`) are skipped too
const COBOL_STATEMENTS: [&str; 3] = ["EXIT", "GOBACK", "CONTINUE"];

/// Line-oriented grammar for the four supported languages
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexGrammar;

#[async_trait]
impl GrammarEngine for RegexGrammar {
    async fn parse(
        &self,
        language: SourceLanguage,
        source: &str,
    ) -> Result<ParseResult, StageError> {
        Ok(self.parse_source(language, source))
    }
}

impl RegexGrammar {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse synchronously
    #[must_use]
    pub fn parse_source(&self, language: SourceLanguage, source: &str) -> ParseResult {
        let lines: Vec<&str> = source.lines().collect();
        let code: Vec<(usize, &str)> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty() && !is_comment(language, line))
            .map(|(i, line)| (i + 1, *line))
            .collect();

        let mut functions = match language {
            SourceLanguage::Cobol => cobol_paragraphs(&lines, &code),
            SourceLanguage::Pascal => routines(&PASCAL_ROUTINE, &code),
            SourceLanguage::Vb6 => routines(&VB6_ROUTINE, &code),
            SourceLanguage::Fortran => routines(&FORTRAN_ROUTINE, &code),
        };
        close_spans(&mut functions, lines.len());

        ParseResult {
            language,
            functions,
            dependencies: dependencies(language, &code),
            metadata: ParseMetadata {
                lines_of_code: code.len(),
                complexity: complexity(source),
                deprecated_patterns: deprecated_patterns(language, &code),
            },
        }
    }
}

fn is_comment(language: SourceLanguage, line: &str) -> bool {
    if line.trim_start().starts_with(language.comment_prefix()) {
        return true;
    }
    // Fixed-format COBOL: indicator in column 7
    language == SourceLanguage::Cobol && matches!(line.chars().nth(6), Some('*' | '/'))
}

/// 1 plus every branching keyword
fn complexity(source: &str) -> u32 {
    let branches = CONTROL_FLOW.find_iter(source).count();
    1 + u32::try_from(branches).unwrap_or(u32::MAX - 1)
}

fn cobol_paragraphs(lines: &[&str], code: &[(usize, &str)]) -> Vec<FunctionInfo> {
    let Some(division) = lines
        .iter()
        .position(|line| line.to_ascii_uppercase().contains("PROCEDURE DIVISION"))
    else {
        return Vec::new();
    };

    code.iter()
        .filter(|(number, _)| *number > division + 1)
        .filter_map(|(number, line)| {
            let name = COBOL_PARAGRAPH.captures(line.trim())?.get(1)?.as_str();
            if COBOL_STATEMENTS.contains(&name) || name.starts_with("END-") {
                return None;
            }
            Some(FunctionInfo {
                name: name.to_string(),
                parameters: Vec::new(),
                line_start: *number,
                line_end: *number,
            })
        })
        .collect()
}

fn routines(pattern: &Regex, code: &[(usize, &str)]) -> Vec<FunctionInfo> {
    code.iter()
        .filter_map(|(number, line)| {
            let captures = pattern.captures(line)?;
            Some(FunctionInfo {
                name: captures.get(2)?.as_str().to_string(),
                parameters: captures
                    .get(3)
                    .map(|list| parameters(list.as_str()))
                    .unwrap_or_default(),
                line_start: *number,
                line_end: *number,
            })
        })
        .collect()
}

/// Names from a parenthesised parameter list
///
/// Handles `a, b: Integer; var c: Real`, `ByVal x As Long` and `n, m`.
fn parameters(list: &str) -> Vec<String> {
    list.trim_start_matches('(')
        .trim_end_matches(')')
        .split([',', ';'])
        .filter_map(|part| {
            let declared = part.split(':').next()?;
            let lowered = declared.to_ascii_lowercase();
            let declared = lowered
                .find(" as ")
                .map_or(declared, |at| &declared[..at]);
            declared
                .split_whitespace()
                .last()
                .map(str::to_string)
        })
        .collect()
}

/// Each routine runs until the line before the next one
fn close_spans(functions: &mut [FunctionInfo], total_lines: usize) {
    let starts: Vec<usize> = functions.iter().map(|f| f.line_start).collect();
    for (i, function) in functions.iter_mut().enumerate() {
        let end = starts
            .get(i + 1)
            .map_or(total_lines, |next| next.saturating_sub(1));
        function.line_end = end.max(function.line_start);
    }
}

fn dependencies(language: SourceLanguage, code: &[(usize, &str)]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim();
        if !name.is_empty() && !found.iter().any(|d| d == name) {
            found.push(name.to_string());
        }
    };

    for (_, line) in code {
        match language {
            SourceLanguage::Cobol => {
                for captures in COBOL_CALL.captures_iter(line) {
                    if let Some(name) = captures.get(1) {
                        push(name.as_str());
                    }
                }
            }
            SourceLanguage::Pascal => {
                if let Some(units) = PASCAL_USES.captures(line).and_then(|c| c.get(1)) {
                    units.as_str().split(',').for_each(&mut push);
                }
            }
            SourceLanguage::Vb6 => {
                if let Some(lib) = VB6_DECLARE.captures(line).and_then(|c| c.get(1)) {
                    push(lib.as_str());
                }
            }
            SourceLanguage::Fortran => {
                if let Some(module) = FORTRAN_USE.captures(line).and_then(|c| c.get(1)) {
                    push(module.as_str());
                }
            }
        }
    }
    found
}

fn deprecated_patterns(language: SourceLanguage, code: &[(usize, &str)]) -> BTreeSet<String> {
    DEPRECATED
        .iter()
        .filter(|(lang, _, _)| *lang == language)
        .filter(|(_, pattern, _)| code.iter().any(|(_, line)| pattern.is_match(line)))
        .map(|(_, _, name)| (*name).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HELLO_COBOL: &str = "\
       IDENTIFICATION DIVISION.
       PROGRAM-ID. HELLO.
      * greets the operator
       PROCEDURE DIVISION.
       MAIN-PARA.
           DISPLAY 'HELLO'.
           STOP RUN.
";

    fn parse(language: SourceLanguage, source: &str) -> ParseResult {
        RegexGrammar::new().parse_source(language, source)
    }

    #[test]
    fn single_cobol_paragraph() {
        let result = parse(SourceLanguage::Cobol, HELLO_COBOL);
        assert_eq!(result.functions.len(), 1);
        assert_eq!(result.functions[0].name, "MAIN-PARA");
        assert_eq!(result.functions[0].line_start, 5);
        assert_eq!(result.functions[0].line_end, 7);
        assert!(result.metadata.deprecated_patterns.is_empty());
        assert_eq!(result.metadata.lines_of_code, 6);
        assert_eq!(result.metadata.complexity, 1);
    }

    #[test]
    fn cobol_calls_and_deprecated_statements() {
        let source = "\
       PROCEDURE DIVISION.
       START-UP.
           CALL 'DATEUTIL' USING WS-DATE.
           CALL 'DATEUTIL' USING WS-OTHER.
           ALTER P1 TO PROCEED TO P2.
           GO TO FINISH.
       FINISH.
           EXIT.
";
        let result = parse(SourceLanguage::Cobol, source);
        let names: Vec<&str> = result.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["START-UP", "FINISH"]);
        assert_eq!(result.dependencies, vec!["DATEUTIL".to_string()]);
        assert_eq!(
            result.metadata.deprecated_patterns.into_iter().collect::<Vec<_>>(),
            vec!["ALTER statement".to_string(), "GO TO statement".to_string()]
        );
    }

    #[test]
    fn cobol_without_procedure_division_has_no_functions() {
        let result = parse(SourceLanguage::Cobol, "       DATA DIVISION.\n       WS-A.\n");
        assert!(result.functions.is_empty());
    }

    #[test]
    fn pascal_routines_with_parameters() {
        let source = "\
program Calc;
uses SysUtils, Math;
// helpers
function Add(a, b: Integer): Integer;
begin
  if a > 0 then Add := a + b;
end;
procedure Show(var total: Real);
begin
end;
";
        let result = parse(SourceLanguage::Pascal, source);
        assert_eq!(result.functions.len(), 2);
        assert_eq!(result.functions[0].name, "Add");
        assert_eq!(result.functions[0].parameters, vec!["a", "b"]);
        assert_eq!(result.functions[0].line_end, 7);
        assert_eq!(result.functions[1].parameters, vec!["total"]);
        assert_eq!(result.dependencies, vec!["SysUtils", "Math"]);
        assert_eq!(result.metadata.complexity, 2);
    }

    #[test]
    fn vb6_ignores_end_sub_and_flags_gosub() {
        let source = "\
' form logic
Private Sub Form_Load()
    On Error Resume Next
    GoSub Init
End Sub
Public Function Total(ByVal price As Currency, qty As Integer) As Currency
End Function
";
        let result = parse(SourceLanguage::Vb6, source);
        let names: Vec<&str> = result.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Form_Load", "Total"]);
        assert_eq!(result.functions[1].parameters, vec!["price", "qty"]);
        assert!(result.metadata.deprecated_patterns.contains("GoSub statement"));
        assert!(result.metadata.deprecated_patterns.contains("On Error Resume Next"));
    }

    #[test]
    fn fortran_routines_and_common_blocks() {
        let source = "\
! numerics
      use constants
      COMMON /SHARED/ X, Y
      integer function square(n)
      square = n * n
      end function square
      subroutine report()
      end subroutine report
";
        let result = parse(SourceLanguage::Fortran, source);
        let names: Vec<&str> = result.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["square", "report"]);
        assert_eq!(result.dependencies, vec!["constants"]);
        assert!(result.metadata.deprecated_patterns.contains("COMMON block"));
        assert_eq!(result.metadata.lines_of_code, 7);
    }
}
