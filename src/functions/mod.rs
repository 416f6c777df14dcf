//! 函数表模块：宿主可调用函数的静态注册表。
//!
//! # Function Table
//!
//! The spreadsheet host calls functions by name with positional, possibly blank,
//! arguments. Instead of associating names at runtime, every callable function is
//! listed once in a static table that is validated when the runtime is built.
//!
//! | Name | Arguments |
//! |------|-----------|
//! | `FETCHTEXT` (alias `TESTGET`) | `url` |
//! | `COMPLETE` | `userMsg, [systemMsg], [model], [extension]` |
//! | `COMPLETEWITHCONFIG` | `knowledgeModelId, apiKey, userMsg, [systemMsg], [model], [extension], [maxTokens], [temperature]` |

use crate::runtime::AddinRuntime;
use crate::{Error, ErrorContext, Result};
use futures::future::BoxFuture;
use std::collections::HashSet;

pub type FunctionHandler =
    for<'a> fn(&'a AddinRuntime, &'a [Option<String>]) -> BoxFuture<'a, Result<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
    }
}

const fn optional(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
    }
}

#[derive(Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub handler: FunctionHandler,
}

impl FunctionSpec {
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// `NAME(a, [b])`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                if p.required {
                    p.name.to_string()
                } else {
                    format!("[{}]", p.name)
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl std::fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("params", &self.params)
            .finish()
    }
}

static BUILTIN: &[FunctionSpec] = &[
    FunctionSpec {
        name: "FETCHTEXT",
        aliases: &["TESTGET"],
        description: "Gets the text from a URL.",
        params: &[required("url")],
        handler: fetch_text,
    },
    FunctionSpec {
        name: "COMPLETE",
        aliases: &[],
        description: "Chat completion using the stored Knowledge Model ID and API key.",
        params: &[
            required("userMsg"),
            optional("systemMsg"),
            optional("model"),
            optional("extension"),
        ],
        handler: complete_stored,
    },
    FunctionSpec {
        name: "COMPLETEWITHCONFIG",
        aliases: &[],
        description: "Chat completion with credentials passed as arguments.",
        params: &[
            required("knowledgeModelId"),
            required("apiKey"),
            required("userMsg"),
            optional("systemMsg"),
            optional("model"),
            optional("extension"),
            optional("maxTokens"),
            optional("temperature"),
        ],
        handler: complete_explicit,
    },
];

/// Name -> function mapping exposed to the host.
#[derive(Debug, Clone, Copy)]
pub struct FunctionTable {
    entries: &'static [FunctionSpec],
}

impl FunctionTable {
    pub fn builtin() -> Self {
        Self { entries: BUILTIN }
    }

    pub fn entries(&self) -> &'static [FunctionSpec] {
        self.entries
    }

    pub fn get(&self, name: &str) -> Option<&'static FunctionSpec> {
        self.entries.iter().find(|f| f.matches(name.trim()))
    }

    /// Startup check: upper-case identifiers, no duplicate names or aliases,
    /// required parameters before optional ones.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for f in self.entries {
            for name in std::iter::once(&f.name).chain(f.aliases.iter()) {
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '_');
                if !valid {
                    return Err(table_error(f.name, format!("invalid function name '{}'", name)));
                }
                if !seen.insert(*name) {
                    return Err(table_error(f.name, format!("duplicate function name '{}'", name)));
                }
            }
            if let Some(pos) = f.params.iter().position(|p| !p.required) {
                if f.params[pos..].iter().any(|p| p.required) {
                    return Err(table_error(
                        f.name,
                        "required parameters must precede optional ones".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Check arity and required arguments, then run the handler.
    pub async fn invoke(&self, runtime: &AddinRuntime, name: &str, args: &[Option<String>]) -> Result<String> {
        let spec = self.get(name).ok_or_else(|| Error::UnknownFunction {
            name: name.to_string(),
        })?;
        if args.len() > spec.params.len() {
            return Err(Error::invalid_parameter_with_context(
                format!(
                    "{} takes at most {} argument(s), got {}",
                    spec.name,
                    spec.params.len(),
                    args.len()
                ),
                ErrorContext::new()
                    .with_details(spec.signature())
                    .with_source("function_table"),
            ));
        }
        for (i, p) in spec.params.iter().enumerate() {
            if p.required && arg(args, i).is_none() {
                return Err(Error::missing_field(p.name));
            }
        }
        (spec.handler)(runtime, args).await
    }
}

fn table_error(function: &str, details: String) -> Error {
    Error::configuration_with_context(
        "invalid function table",
        ErrorContext::new()
            .with_field_path(function.to_string())
            .with_details(details)
            .with_source("function_table"),
    )
}

/// Positional argument exactly as the host passed it; blank cells count as omitted.
fn arg(args: &[Option<String>], i: usize) -> Option<&str> {
    args.get(i)
        .and_then(|a| a.as_deref())
        .filter(|s| !s.trim().is_empty())
}

/// Identifiers, URLs and numbers.
fn trimmed_arg(args: &[Option<String>], i: usize) -> Option<&str> {
    arg(args, i).map(str::trim)
}

fn parse_arg<T: std::str::FromStr>(args: &[Option<String>], i: usize, name: &str) -> Result<Option<T>> {
    match trimmed_arg(args, i) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            Error::invalid_parameter_with_context(
                format!("{} is not a valid number", name),
                ErrorContext::new()
                    .with_field_path(name.to_string())
                    .with_details(format!("got '{}'", raw))
                    .with_source("function_table"),
            )
        }),
    }
}

fn fetch_text<'a>(rt: &'a AddinRuntime, args: &'a [Option<String>]) -> BoxFuture<'a, Result<String>> {
    Box::pin(async move { rt.fetch_text(trimmed_arg(args, 0).unwrap_or_default()).await })
}

fn complete_stored<'a>(rt: &'a AddinRuntime, args: &'a [Option<String>]) -> BoxFuture<'a, Result<String>> {
    Box::pin(async move {
        rt.complete_with_stored_config(
            arg(args, 0).unwrap_or_default(),
            arg(args, 1),
            trimmed_arg(args, 2),
            trimmed_arg(args, 3),
        )
        .await
    })
}

fn complete_explicit<'a>(rt: &'a AddinRuntime, args: &'a [Option<String>]) -> BoxFuture<'a, Result<String>> {
    Box::pin(async move {
        let max_tokens = parse_arg::<u32>(args, 6, "maxTokens")?;
        let temperature = parse_arg::<f64>(args, 7, "temperature")?;
        rt.complete_with_explicit_config(
            trimmed_arg(args, 0).unwrap_or_default(),
            trimmed_arg(args, 1).unwrap_or_default(),
            arg(args, 2).unwrap_or_default(),
            arg(args, 3),
            trimmed_arg(args, 4),
            trimmed_arg(args, 5),
            max_tokens,
            temperature,
        )
        .await
    })
}
