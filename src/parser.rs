/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Line-level lexing. Each source line is parsed on its own so that a
//! malformed line yields a single diagnostic and the remaining lines still
//! tokenize.

use crate::errors::AssemblyError;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct AsmParser;

/// The lexical shape of one source line: label definitions followed by raw
/// tokens. Directive and relocation recognition happen later, in pass 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLine {
    pub labels: Vec<String>,
    pub tokens: Vec<String>,
}

/// Removes a trailing comment, honoring quoted strings so that a comment
/// character inside a string literal does not truncate the line.
pub fn strip_comment(line: &str, comment_char: char) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == comment_char && !in_string => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Splits one comment-free source line into labels and tokens.
pub fn parse_line(line: &str, line_idx: usize) -> Result<RawLine, AssemblyError> {
    let parsed = AsmParser::parse(Rule::line, line).map_err(|error| {
        AssemblyError::SyntaxError {
            line: line_idx,
            reason: match error.variant {
                pest::error::ErrorVariant::ParsingError { .. } => {
                    "unrecognized token".to_string()
                }
                pest::error::ErrorVariant::CustomError { message } => message,
            },
        }
    })?;

    let mut raw = RawLine::default();
    for pair in parsed.flatten() {
        match pair.as_rule() {
            Rule::label_def => {
                let name = pair
                    .as_str()
                    .strip_suffix(':')
                    .unwrap_or(pair.as_str())
                    .to_string();
                raw.labels.push(name);
            }
            Rule::string | Rule::reloc_tag | Rule::group | Rule::bare => {
                raw.tokens.push(pair.as_str().to_string());
            }
            _ => {}
        }
    }
    Ok(raw)
}
