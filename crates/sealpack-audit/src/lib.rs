//! # sealpack-audit
//!
//! Static pattern audit for package source trees.
//!
//! `Scanner` walks a directory, selects source files by extension and
//! manifests by exact name, and matches each against a `RuleSet` loaded from
//! TOML. Every matching rule contributes a finding; the report score is the
//! unclamped sum.
//!
//! `summarize_findings` optionally turns a finding list into prose through a
//! `Summarizer` such as `ChatSummarizer`. It is called by the CLI after a
//! scan, never by the scanner itself.

pub mod openai;
pub mod rule;
pub mod scanner;
pub mod summary;

pub use openai::ChatSummarizer;
pub use rule::{RuleConfig, RuleSet, ScanRule, BUILTIN_RULES};
pub use scanner::Scanner;
pub use summary::summarize_findings;
