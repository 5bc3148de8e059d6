//! Source and target languages

use crate::error::StageError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Legacy languages the parser understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceLanguage {
    #[serde(rename = "COBOL", alias = "cobol")]
    Cobol,
    #[serde(rename = "Pascal", alias = "pascal")]
    Pascal,
    #[serde(rename = "VB6", alias = "vb6")]
    Vb6,
    #[serde(rename = "Fortran", alias = "fortran")]
    Fortran,
}

impl SourceLanguage {
    pub const ALL: [Self; 4] = [Self::Cobol, Self::Pascal, Self::Vb6, Self::Fortran];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cobol => "COBOL",
            Self::Pascal => "Pascal",
            Self::Vb6 => "VB6",
            Self::Fortran => "Fortran",
        }
    }

    /// Full-line comment marker
    #[must_use]
    pub fn comment_prefix(self) -> &'static str {
        match self {
            Self::Cobol => "*",
            Self::Pascal => "//",
            Self::Vb6 => "'",
            Self::Fortran => "!",
        }
    }

    /// Guess the language from a file extension
    #[must_use]
    pub fn from_extension(path: &str) -> Option<Self> {
        let (_, ext) = path.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "cbl" | "cob" | "cpy" => Some(Self::Cobol),
            "pas" | "pp" | "dpr" => Some(Self::Pascal),
            "bas" | "frm" | "cls" => Some(Self::Vb6),
            "f" | "for" | "f77" | "f90" | "f95" => Some(Self::Fortran),
            _ => None,
        }
    }

    /// Target used when a request does not name one
    #[must_use]
    pub fn default_target(self) -> TargetLanguage {
        match self {
            Self::Vb6 => TargetLanguage::TypeScript,
            Self::Cobol | Self::Pascal | Self::Fortran => TargetLanguage::Python,
        }
    }
}

impl std::fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceLanguage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StageError::UnsupportedLanguage(s.to_string()))
    }
}

/// Languages the code generator can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetLanguage {
    #[serde(alias = "python")]
    Python,
    #[serde(alias = "java")]
    Java,
    #[serde(alias = "typescript")]
    TypeScript,
    #[serde(alias = "go")]
    Go,
}

impl TargetLanguage {
    pub const ALL: [Self; 4] = [Self::Python, Self::Java, Self::TypeScript, Self::Go];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::Java => "Java",
            Self::TypeScript => "TypeScript",
            Self::Go => "Go",
        }
    }

    /// File extension including the dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Python => ".py",
            Self::Java => ".java",
            Self::TypeScript => ".ts",
            Self::Go => ".go",
        }
    }

    /// Idiomatic identifier for a legacy routine name
    #[must_use]
    pub fn function_name(self, legacy: &str) -> String {
        let snake = legacy.replace('-', "_");
        match self {
            Self::Python => snake.to_lowercase(),
            Self::Java | Self::TypeScript => {
                let mut chars = snake.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_lowercase().chain(chars).collect()
                })
            }
            Self::Go => {
                let mut chars = snake.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect()
                })
            }
        }
    }

    /// Swap the extension of `source_file` for this language's
    #[must_use]
    pub fn target_path(self, source_file: &str) -> String {
        let stem_end = source_file
            .rfind('.')
            .filter(|&dot| !source_file[dot..].contains(['/', '\\']))
            .unwrap_or(source_file.len());
        format!("{}{}", &source_file[..stem_end], self.extension())
    }
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetLanguage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StageError::UnsupportedLanguage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("cobol".parse::<SourceLanguage>().unwrap(), SourceLanguage::Cobol);
        assert_eq!("VB6".parse::<SourceLanguage>().unwrap(), SourceLanguage::Vb6);
        assert_eq!(
            "typescript".parse::<TargetLanguage>().unwrap(),
            TargetLanguage::TypeScript
        );
    }

    #[test]
    fn unknown_language_is_unsupported() {
        assert!(matches!(
            "PL/I".parse::<SourceLanguage>(),
            Err(StageError::UnsupportedLanguage(lang)) if lang == "PL/I"
        ));
    }

    #[test]
    fn extension_detection() {
        assert_eq!(SourceLanguage::from_extension("src/PAYROLL.CBL"), Some(SourceLanguage::Cobol));
        assert_eq!(SourceLanguage::from_extension("num.f90"), Some(SourceLanguage::Fortran));
        assert_eq!(SourceLanguage::from_extension("Form1.frm"), Some(SourceLanguage::Vb6));
        assert_eq!(SourceLanguage::from_extension("README"), None);
        assert_eq!(SourceLanguage::from_extension("main.rs"), None);
    }

    #[test]
    fn target_path_replaces_extension() {
        assert_eq!(TargetLanguage::Python.target_path("src/payroll.cbl"), "src/payroll.py");
        assert_eq!(TargetLanguage::TypeScript.target_path("Form1.frm"), "Form1.ts");
        assert_eq!(TargetLanguage::Go.target_path("v1.2/MAIN"), "v1.2/MAIN.go");
    }

    #[test]
    fn function_names_follow_target_conventions() {
        assert_eq!(TargetLanguage::Python.function_name("MAIN-PARA"), "main_para");
        assert_eq!(TargetLanguage::TypeScript.function_name("CalcTotal"), "calcTotal");
        assert_eq!(TargetLanguage::Go.function_name("calc_total"), "Calc_total");
    }

    #[test]
    fn serde_uses_display_names() {
        assert_eq!(serde_json::to_string(&SourceLanguage::Vb6).unwrap(), "\"VB6\"");
        assert_eq!(
            serde_json::from_str::<SourceLanguage>("\"cobol\"").unwrap(),
            SourceLanguage::Cobol
        );
    }
}
