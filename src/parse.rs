// Syntax-aware analysis of model output.
//
// Parsing is total: any input, including empty text or binary noise, yields
// a ParsedResult. "No recognizable code" is a normal outcome recorded as a
// null detection, never an error.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tree_sitter::{Language, Node, Parser};

use crate::llm::ModelResponse;

/// Structured extraction from one model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedResult {
    /// Programming language of the first detected code block
    pub detected_language: Option<String>,
    pub code_blocks: Vec<CodeBlock>,
}

impl ParsedResult {
    /// Result for an absent or failed model response.
    pub fn empty() -> Self {
        Self {
            detected_language: None,
            code_blocks: Vec::new(),
        }
    }
}

/// One extracted code segment with structural counts from its syntax tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub source_text: String,
    pub function_count: usize,
    pub variable_count: usize,
    pub class_count: usize,
    pub call_count: usize,
    pub loop_count: usize,
}

impl CodeBlock {
    fn undetected(source_text: String) -> Self {
        Self {
            language: None,
            source_text,
            function_count: 0,
            variable_count: 0,
            class_count: 0,
            call_count: 0,
            loop_count: 0,
        }
    }
}

/// Node-kind tables for one tree-sitter grammar.
struct Grammar {
    name: &'static str,
    file_ext: &'static str,
    aliases: &'static [&'static str],
    language: fn() -> Language,
    functions: &'static [&'static str],
    variables: &'static [&'static str],
    classes: &'static [&'static str],
    calls: &'static [&'static str],
    loops: &'static [&'static str],
    /// Bare command invocations match almost any prose, so they do not
    /// count as evidence when probing an unlabeled block
    calls_are_weak_signal: bool,
}

fn lang_python() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

fn lang_rust() -> Language {
    tree_sitter_rust::LANGUAGE.into()
}

fn lang_javascript() -> Language {
    tree_sitter_javascript::LANGUAGE.into()
}

fn lang_c() -> Language {
    tree_sitter_c::LANGUAGE.into()
}

fn lang_go() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

fn lang_java() -> Language {
    tree_sitter_java::LANGUAGE.into()
}

fn lang_bash() -> Language {
    tree_sitter_bash::LANGUAGE.into()
}

static GRAMMARS: &[Grammar] = &[
    Grammar {
        name: "python",
        file_ext: "py",
        aliases: &["python", "py", "python3"],
        language: lang_python,
        functions: &["function_definition"],
        variables: &["assignment"],
        classes: &["class_definition"],
        calls: &["call"],
        loops: &["for_statement", "while_statement"],
        calls_are_weak_signal: false,
    },
    Grammar {
        name: "rust",
        file_ext: "rs",
        aliases: &["rust", "rs"],
        language: lang_rust,
        functions: &["function_item"],
        variables: &["let_declaration"],
        classes: &["struct_item", "enum_item", "trait_item"],
        calls: &["call_expression", "macro_invocation"],
        loops: &["for_expression", "while_expression", "loop_expression"],
        calls_are_weak_signal: false,
    },
    Grammar {
        name: "javascript",
        file_ext: "js",
        aliases: &["javascript", "js", "node"],
        language: lang_javascript,
        functions: &[
            "function_declaration",
            "function_expression",
            "arrow_function",
            "method_definition",
            "generator_function_declaration",
        ],
        variables: &["variable_declarator"],
        classes: &["class_declaration"],
        calls: &["call_expression"],
        loops: &["for_statement", "for_in_statement", "while_statement", "do_statement"],
        calls_are_weak_signal: false,
    },
    Grammar {
        name: "c",
        file_ext: "c",
        aliases: &["c"],
        language: lang_c,
        functions: &["function_definition"],
        variables: &["declaration"],
        classes: &["struct_specifier"],
        calls: &["call_expression"],
        loops: &["for_statement", "while_statement", "do_statement"],
        calls_are_weak_signal: false,
    },
    Grammar {
        name: "go",
        file_ext: "go",
        aliases: &["go", "golang"],
        language: lang_go,
        functions: &["function_declaration", "method_declaration", "func_literal"],
        variables: &["var_declaration", "short_var_declaration", "const_declaration"],
        classes: &["type_declaration"],
        calls: &["call_expression"],
        loops: &["for_statement"],
        calls_are_weak_signal: false,
    },
    Grammar {
        name: "java",
        file_ext: "java",
        aliases: &["java"],
        language: lang_java,
        functions: &["method_declaration", "constructor_declaration"],
        variables: &["local_variable_declaration", "field_declaration"],
        classes: &["class_declaration", "interface_declaration"],
        calls: &["method_invocation"],
        loops: &["for_statement", "enhanced_for_statement", "while_statement", "do_statement"],
        calls_are_weak_signal: false,
    },
    Grammar {
        name: "bash",
        file_ext: "sh",
        aliases: &["bash", "sh", "shell", "zsh"],
        language: lang_bash,
        functions: &["function_definition"],
        variables: &["variable_assignment"],
        classes: &[],
        calls: &["command"],
        loops: &["for_statement", "while_statement", "c_style_for_statement"],
        calls_are_weak_signal: true,
    },
];

/// File extension for a detected language name, for persisting code files.
pub fn file_extension(language: &str) -> &'static str {
    GRAMMARS
        .iter()
        .find(|g| g.name == language)
        .map(|g| g.file_ext)
        .unwrap_or("txt")
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    functions: usize,
    variables: usize,
    classes: usize,
    calls: usize,
    loops: usize,
}

struct ParseScore<'a> {
    grammar: &'a Grammar,
    error_ratio: f64,
    signal: usize,
    counts: Counts,
}

// A parse is evidence of the language only when it is mostly error-free
// and contains at least one structural construct.
const MAX_ERROR_RATIO: f64 = 0.2;

/// Parse one raw model response into code blocks with detected languages
/// and structural counts.
pub fn parse_response(raw: &str) -> ParsedResult {
    let cleaned = strip_reasoning(raw);

    let mut blocks = extract_fenced_blocks(&cleaned);
    if blocks.is_empty() {
        let body = cleaned.trim();
        if !body.is_empty() {
            blocks.push((None, body.to_string()));
        }
    }

    let code_blocks: Vec<CodeBlock> = blocks
        .into_iter()
        .map(|(label, source)| analyze_block(label.as_deref(), source))
        .collect();

    let detected_language = code_blocks.iter().find_map(|b| b.language.clone());

    ParsedResult {
        detected_language,
        code_blocks,
    }
}

/// Parse every language's model response. Absent responses produce an
/// empty result so downstream tallies still see the language.
pub fn parse_all(outputs: &ModelResponse) -> BTreeMap<String, ParsedResult> {
    let mut results = BTreeMap::new();
    for (language, output) in outputs {
        info!("Parsing code for language: {}", language);
        let parsed = match output {
            Some(raw) => parse_response(raw),
            None => ParsedResult::empty(),
        };
        results.insert(language.clone(), parsed);
    }
    results
}

/// Remove `<think>...</think>` reasoning traces some models emit before
/// their answer.
fn strip_reasoning(text: &str) -> String {
    if !text.contains("<think>") {
        return text.to_string();
    }
    let re = Regex::new(r"(?s)<think>.*?</think>").expect("valid regex");
    re.replace_all(text, "").to_string()
}

/// Extract fenced code blocks as (info string, body) pairs. An unterminated
/// fence keeps whatever was collected.
fn extract_fenced_blocks(text: &str) -> Vec<(Option<String>, String)> {
    let mut blocks = Vec::new();
    let mut current: Option<(Option<String>, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            match current.take() {
                Some((label, body)) => blocks.push((label, body.join("\n"))),
                None => {
                    let info = trimmed.trim_start_matches('`').trim();
                    let label = if info.is_empty() {
                        None
                    } else {
                        Some(info.to_lowercase())
                    };
                    current = Some((label, Vec::new()));
                }
            }
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((label, body)) = current {
        blocks.push((label, body.join("\n")));
    }

    blocks
        .into_iter()
        .filter(|(_, body)| !body.trim().is_empty())
        .collect()
}

fn grammar_for_label(label: &str) -> Option<&'static Grammar> {
    GRAMMARS.iter().find(|g| g.aliases.contains(&label))
}

fn analyze_block(label: Option<&str>, source: String) -> CodeBlock {
    let best = match label.and_then(grammar_for_label) {
        Some(grammar) => score_parse(grammar, &source).filter(acceptable),
        None => GRAMMARS
            .iter()
            .filter_map(|g| score_parse(g, &source))
            .filter(acceptable)
            .min_by(|a, b| {
                a.error_ratio
                    .total_cmp(&b.error_ratio)
                    .then(b.signal.cmp(&a.signal))
            }),
    };

    match best {
        Some(score) => {
            debug!(
                "Detected {} (error ratio {:.3}, signal {})",
                score.grammar.name, score.error_ratio, score.signal
            );
            CodeBlock {
                language: Some(score.grammar.name.to_string()),
                source_text: source,
                function_count: score.counts.functions,
                variable_count: score.counts.variables,
                class_count: score.counts.classes,
                call_count: score.counts.calls,
                loop_count: score.counts.loops,
            }
        }
        None => CodeBlock::undetected(source),
    }
}

fn acceptable(score: &ParseScore<'_>) -> bool {
    score.error_ratio <= MAX_ERROR_RATIO && score.signal > 0
}

fn score_parse<'a>(grammar: &'a Grammar, source: &str) -> Option<ParseScore<'a>> {
    let mut parser = Parser::new();
    parser.set_language(&(grammar.language)()).ok()?;
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();

    let mut counts = Counts::default();
    let mut total_nodes = 0usize;
    let mut error_nodes = 0usize;

    walk(root, &mut |node| {
        total_nodes += 1;
        if node.is_error() || node.is_missing() {
            error_nodes += 1;
        }
        let kind = node.kind();
        if grammar.functions.contains(&kind) {
            counts.functions += 1;
        } else if grammar.variables.contains(&kind) {
            counts.variables += 1;
        } else if grammar.classes.contains(&kind) {
            counts.classes += 1;
        } else if grammar.calls.contains(&kind) {
            counts.calls += 1;
        } else if grammar.loops.contains(&kind) {
            counts.loops += 1;
        }
    });

    if total_nodes == 0 {
        return None;
    }

    let mut signal = counts.functions + counts.variables + counts.classes + counts.loops;
    if !grammar.calls_are_weak_signal {
        signal += counts.calls;
    }

    Some(ParseScore {
        grammar,
        error_ratio: error_nodes as f64 / total_nodes as f64,
        signal,
        counts,
    })
}

fn walk(node: Node<'_>, visit: &mut impl FnMut(Node<'_>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, visit);
    }
}
