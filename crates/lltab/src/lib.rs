//! # lltab
//!
//! A parser generator and runtime for LL(1) grammars described in an
//! EBNF-like notation. Given a grammar, the build half rewrites it into
//! an equivalent LL(1)-parsable form (eliminating left recursion and
//! left-factoring common prefixes), computes the predictive parse
//! table, and packages it with a lexer specification into a compact
//! binary artifact. The runtime half loads an artifact and parses
//! arbitrary input conforming to the grammar into a parse tree.
//!
//! ## Quick start
//!
//! ```rust
//! use lltab::{compile, Parser};
//!
//! // A left-recursive grammar; the pipeline rewrites it to LL(1).
//! let artifact = compile(r#"E = E "+" T | T; T = "a";"#, "E")?;
//!
//! let mut parser = Parser::new(&artifact, "a+a+a".as_bytes())?;
//! let result = parser.parse()?;
//! assert_eq!(result.metrics.tokens_consumed, 5);
//!
//! // The artifact round-trips through its binary form.
//! let bytes = artifact.encode()?;
//! let loaded = lltab::Artifact::decode(&bytes)?;
//! assert_eq!(loaded.table, artifact.table);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`bnf`] - grammar source frontend
//! - [`grammar`] - symbols, productions, the first-set graph, and the
//!   transformation passes
//! - [`table`] - the fixed-point pipeline and predictive-table builder
//! - [`regex`] - the NFA regex engine backing terminal matching
//! - [`lexer`] - the configured runtime lexer
//! - [`parser`] - the table-driven runtime parser
//! - [`artifact`] - binary artifact encoding and decoding
//! - [`error`] - error types for every failure domain
//!
//! Builds and parses are sequential computations with no global state:
//! everything is a self-contained value parameterized at construction,
//! and two builds of the same grammar produce byte-identical artifacts.

pub mod artifact;
pub mod bnf;
pub mod error;
pub mod grammar;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod regex;
pub mod stream;
pub mod table;

pub use artifact::Artifact;
pub use error::{ArtifactError, BuildError, GrammarError, ParseError};
pub use grammar::{Grammar, Production, Symbol, Terminal, TerminalId};
pub use intern::{Name, NameTable};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{ParseMetrics, ParseResult, ParseTree, Parser};
pub use regex::Regex;
pub use stream::SourceStream;
pub use table::{BuildOptions, LlTable};

/// Compile grammar source into an artifact, with `start` as the start
/// nonterminal.
pub fn compile(source: &str, start: &str) -> Result<Artifact, BuildError> {
    compile_with_options(source, start, &BuildOptions::default())
}

/// [`compile`] with explicit build options.
pub fn compile_with_options(
    source: &str,
    start: &str,
    options: &BuildOptions,
) -> Result<Artifact, BuildError> {
    let mut names = NameTable::new();
    let mut grammar = bnf::parse_grammar(source, start, &mut names)?;
    let table = table::build(&mut grammar, &mut names, options)?;
    Ok(Artifact::from_build(&table, &grammar.terminals, &names))
}
