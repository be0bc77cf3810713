//! Compare the signatures of two functions, i.e. a dependency's function
//! as recorded earlier against the same function found now.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde_derive::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a function is defined
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct Location {
    pub path: PathBuf,
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
}

/// Render a location as `path:line` or `path:line:column`.
pub fn fmt_location(location: &Location) -> String {
    match location.column {
        Some(column) => format!("{}:{}:{}", location.path.display(), location.line, column),
        None => format!("{}:{}", location.path.display(), location.line),
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Deserialize)]
pub enum FunctionKind {
    #[default]
    #[serde(rename = "function")]
    Function,
    #[serde(rename = "method")]
    Method,
    #[serde(rename = "constructor")]
    Constructor,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FunctionKind::Function => write!(f, "function"),
            FunctionKind::Method => write!(f, "method"),
            FunctionKind::Constructor => write!(f, "constructor"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Identity and signature of a function
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct Ident {
    pub name: String,
    pub location: Location,
    #[serde(default)]
    pub kind: FunctionKind,
    #[serde(default)]
    pub params: Vec<Param>,
    /// `None` for functions returning nothing
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub is_async: bool,
}

/// What [`Ident::eq_report`] compares beyond the name and arguments
#[derive(Debug, Default, Clone, Copy)]
pub struct EqOptions {
    /// compare return types
    pub return_value: bool,
    /// compare the kind of function and whether it is async
    pub check_function: bool,
}

/// Differences found between two signatures
#[derive(Debug, PartialEq, Eq)]
pub struct EqReport {
    pub differences: Vec<String>,
}

impl fmt::Display for EqReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.differences.join("; "))
    }
}

impl std::error::Error for EqReport {}

fn return_type_name(return_type: Option<&str>) -> &str {
    return_type.unwrap_or("()")
}

impl Ident {
    /// Compare this signature with `other`, collecting every difference.
    /// Locations are not compared.
    pub fn eq_report(&self, other: &Ident, options: EqOptions) -> Result<(), EqReport> {
        let mut differences = vec![];

        if self.name != other.name {
            differences.push(format!("name `{}` != `{}`", self.name, other.name));
        }

        if self.params.len() != other.params.len() {
            differences.push(format!(
                "expected {} arguments, found {}",
                self.params.len(),
                other.params.len()
            ));
        }
        for (i, (ours, theirs)) in self.params.iter().zip(other.params.iter()).enumerate() {
            if ours.name != theirs.name {
                differences.push(format!(
                    "argument {i} is named `{}`, found `{}`",
                    ours.name, theirs.name
                ));
            }
            if ours.type_name != theirs.type_name {
                differences.push(format!(
                    "argument {i} `{}`: type `{}` != `{}`",
                    ours.name, ours.type_name, theirs.type_name
                ));
            }
        }

        let ours = return_type_name(self.return_type.as_deref());
        let theirs = return_type_name(other.return_type.as_deref());
        if options.return_value && ours != theirs {
            differences.push(format!("return value `{ours}` != `{theirs}`"));
        }

        if options.check_function {
            if self.kind != other.kind {
                differences.push(format!("expected a {}, found a {}", self.kind, other.kind));
            }
            if self.is_async != other.is_async {
                let asyncness = |is_async| if is_async { "async" } else { "not async" };
                differences.push(format!(
                    "expected {}, found {}",
                    asyncness(self.is_async),
                    asyncness(other.is_async)
                ));
            }
        }

        if differences.is_empty() {
            Ok(())
        } else {
            Err(EqReport { differences })
        }
    }
}

/// A function some code depends on
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct DependencyFunction {
    pub ident: Ident,
}

/// Ensure the arguments and return value of `other` match those of `expected`.
/// The file path is not checked.
pub fn functions_match(expected: &DependencyFunction, other: &DependencyFunction) -> bool {
    let match_str = fmt_location(&expected.ident.location);
    let other_str = fmt_location(&other.ident.location);
    let options = EqOptions {
        return_value: true,
        check_function: true,
    };
    match expected.ident.eq_report(&other.ident, options) {
        Ok(()) => {
            debug!("{other_str} matches {match_str}");
            true
        }
        Err(report) => {
            warn!("{other_str} does not match {match_str}: {report}");
            false
        }
    }
}

/// Read a function descriptor from a json file
pub fn load_function(path: &Path) -> Result<DependencyFunction> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid function descriptor", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Ident {
        Ident {
            name: name.to_string(),
            location: Location {
                path: PathBuf::from("src/lib.rs"),
                line: 10,
                column: Some(4),
            },
            kind: FunctionKind::Function,
            params: vec![
                Param {
                    name: "hosts".to_string(),
                    type_name: "&[Host]".to_string(),
                },
                Param {
                    name: "out".to_string(),
                    type_name: "&Path".to_string(),
                },
            ],
            return_type: Some("Result<()>".to_string()),
            is_async: false,
        }
    }

    const ALL: EqOptions = EqOptions {
        return_value: true,
        check_function: true,
    };

    #[test]
    fn test_fmt_location() {
        let mut location = Location {
            path: PathBuf::from("src/keygen.rs"),
            line: 42,
            column: Some(7),
        };
        assert_eq!(fmt_location(&location), "src/keygen.rs:42:7");
        location.column = None;
        assert_eq!(fmt_location(&location), "src/keygen.rs:42");
    }

    #[test]
    fn test_equal_signatures_ignore_location() {
        let ours = ident("generate_keys");
        let mut theirs = ours.clone();
        theirs.location = Location {
            path: PathBuf::from("vendor/other.rs"),
            line: 1,
            column: None,
        };
        assert_eq!(ours.eq_report(&theirs, ALL), Ok(()));
    }

    #[test]
    fn test_argument_differences() {
        let ours = ident("generate_keys");
        let mut theirs = ours.clone();
        theirs.params[0].name = "targets".to_string();
        theirs.params[1].type_name = "PathBuf".to_string();

        let report = ours.eq_report(&theirs, EqOptions::default()).unwrap_err();
        assert_eq!(
            report.to_string(),
            "argument 0 is named `hosts`, found `targets`; argument 1 `out`: type `&Path` != `PathBuf`"
        );

        theirs = ours.clone();
        theirs.params.pop();
        theirs.name = "generate".to_string();
        let report = ours.eq_report(&theirs, EqOptions::default()).unwrap_err();
        assert_eq!(
            report.differences,
            [
                "name `generate_keys` != `generate`",
                "expected 2 arguments, found 1"
            ]
        );
    }

    #[test]
    fn test_return_value_only_checked_on_request() {
        let ours = ident("generate_keys");
        let mut theirs = ours.clone();
        theirs.return_type = None;

        assert!(ours.eq_report(&theirs, EqOptions::default()).is_ok());
        let report = ours
            .eq_report(
                &theirs,
                EqOptions {
                    return_value: true,
                    check_function: false,
                },
            )
            .unwrap_err();
        assert_eq!(report.to_string(), "return value `Result<()>` != `()`");
    }

    #[test]
    fn test_missing_return_type_is_unit() {
        let mut ours = ident("reboot");
        ours.return_type = None;
        let mut theirs = ours.clone();
        theirs.return_type = Some("()".to_string());

        assert_eq!(ours.eq_report(&theirs, ALL), Ok(()));
        assert_eq!(theirs.eq_report(&ours, ALL), Ok(()));

        theirs.return_type = Some("bool".to_string());
        let report = ours.eq_report(&theirs, ALL).unwrap_err();
        assert_eq!(report.to_string(), "return value `()` != `bool`");
    }

    #[test]
    fn test_function_shape_only_checked_on_request() {
        let ours = ident("generate_keys");
        let mut theirs = ours.clone();
        theirs.kind = FunctionKind::Method;
        theirs.is_async = true;

        assert!(ours
            .eq_report(
                &theirs,
                EqOptions {
                    return_value: true,
                    check_function: false,
                }
            )
            .is_ok());
        let report = ours.eq_report(&theirs, ALL).unwrap_err();
        assert_eq!(
            report.differences,
            [
                "expected a function, found a method",
                "expected not async, found async"
            ]
        );
    }

    #[test]
    fn test_functions_match() {
        let expected = DependencyFunction {
            ident: ident("generate_keys"),
        };
        let mut other = expected.clone();
        other.ident.location.line = 99;
        assert!(functions_match(&expected, &other));

        other.ident.return_type = Some("Result<KeygenReport>".to_string());
        assert!(!functions_match(&expected, &other));
    }

    #[test]
    fn test_load_function() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("function.json");
        fs::write(
            &path,
            r#"{
  "ident": {
    "name": "generate_keys",
    "location": { "path": "src/lib.rs", "line": 10, "column": 4 },
    "params": [
      { "name": "hosts", "type": "&[Host]" },
      { "name": "out", "type": "&Path" }
    ],
    "return_type": "Result<()>"
  }
}"#,
        )?;
        let function = load_function(&path)?;
        assert_eq!(function.ident, ident("generate_keys"));

        fs::write(&path, r#"{ "ident": { "name": "missing_location" } }"#)?;
        let err = load_function(&path).unwrap_err();
        assert!(err.to_string().ends_with("is not a valid function descriptor"));
        Ok(())
    }
}
