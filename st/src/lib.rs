//! Stencil - a sandboxed Jinja-style template engine
//!
//! Templates compile once into a [`CompiledTemplate`] that does not depend
//! on any environment. An [`Environment`] renders it against a
//! [`RenderContext`] of plain JSON values, resolving filters and functions
//! through its [`FilterRegistry`]:
//!
//! - [`Environment::sandboxed`] renders untrusted templates. Only registered
//!   names are reachable, undefined names are errors, and loops and output
//!   are bounded by [`Limits`].
//! - [`Environment::trusted`] renders application-owned HTML with
//!   auto-escaping.
//!
//! ```
//! use stencil::{Environment, FilterRegistry, RenderContext, compile};
//!
//! let env = Environment::sandboxed(FilterRegistry::standard());
//! let template = compile("Hello, {{ name | title }}!").unwrap();
//!
//! let mut ctx = RenderContext::new();
//! ctx.insert("name".to_string(), "ada lovelace".into());
//! assert_eq!(env.render(&template, &ctx).unwrap(), "Hello, Ada Lovelace!");
//! ```

mod ast;
mod environment;
mod error;
mod escape;
mod eval;
pub mod filters;
mod lexer;
mod parser;
mod template;
pub mod value;

pub use environment::{AutoEscape, Environment, Limits, Policy};
pub use error::{Error, RenderError, SyntaxError};
pub use escape::html_escape;
pub use filters::{ContentPolicy, Filter, FilterError, FilterRegistry, FilterResult, Function, RegistryProfile};
pub use template::{CompiledTemplate, TemplateCatalog, compile, compile_named};
pub use value::RenderContext;
