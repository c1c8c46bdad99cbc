//! Glossa - Multilingual Prompt Analysis Pipeline
//!
//! A Rust implementation of a prompt-analysis workflow: translate a prompt
//! into many human languages, query a locally hosted LLM with each
//! translation, parse the answers with tree-sitter, and chart which
//! programming language the model tends to answer in.

pub mod analyze;
pub mod cli;
pub mod config;
pub mod error;
pub mod languages;
pub mod llm;
pub mod manifest;
pub mod parse;
pub mod pipeline;
pub mod translate;
