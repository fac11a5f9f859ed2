//! # Template Engine
//!
//! Parses `${key}` and `${key:arg1:arg2...}` tokens out of arbitrary text and
//! substitutes them through a caller-supplied resolver. There is no escape for
//! a literal `${`, and braces do not nest.
//!
//! A resolver that returns `None` leaves the token exactly as written, so text
//! made only of unknown tokens renders to itself.

use crate::models::Parameter;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"\$\{([^}]*)\}").unwrap();
}

/// Key of the tokens that declare script parameters.
pub const PARAM_TOKEN_KEY: &str = "param";

/// A single `${...}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The full literal text, including `${` and `}`.
    pub raw: String,
    pub key: String,
    pub args: Vec<String>,
}

impl Token {
    fn from_interior(raw: &str, interior: &str) -> Self {
        let mut parts = interior.split(':');
        let key = parts.next().unwrap_or_default().trim().to_string();
        Self {
            raw: raw.to_string(),
            key,
            args: parts.map(str::to_string).collect(),
        }
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Returns every token of `text` in order of appearance.
pub fn parse_tokens(text: &str) -> Vec<Token> {
    TOKEN_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.get(0)?.as_str();
            let interior = caps.get(1)?.as_str();
            Some(Token::from_interior(raw, interior))
        })
        .collect()
}

/// Replaces every token with the resolver's value.
/// Tokens the resolver does not know (`None`) are kept verbatim.
pub fn render_tokens<F>(text: &str, mut resolve: F) -> String
where
    F: FnMut(&Token) -> Option<String>,
{
    let mut rendered = String::with_capacity(text.len());
    let mut last_end = 0;

    for caps in TOKEN_RE.captures_iter(text) {
        let (Some(whole), Some(interior)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        rendered.push_str(text.get(last_end..whole.start()).unwrap_or_default());
        let token = Token::from_interior(whole.as_str(), interior.as_str());
        match resolve(&token) {
            Some(value) => rendered.push_str(&value),
            None => rendered.push_str(whole.as_str()),
        }
        last_end = whole.end();
    }
    rendered.push_str(text.get(last_end..).unwrap_or_default());
    rendered
}

/// Collects the parameters a script declares inline with
/// `${param:name:default:prompt}`.
///
/// The first occurrence of a name wins. Inline declarations are always
/// required: their default only pre-fills the prompt.
pub fn extract_declared_parameters(text: &str) -> Vec<Parameter> {
    let mut seen = HashSet::new();
    parse_tokens(text)
        .into_iter()
        .filter(|token| token.key == PARAM_TOKEN_KEY)
        .filter_map(|token| {
            let name = token.arg(0)?.trim();
            if name.is_empty() || !seen.insert(name.to_string()) {
                return None;
            }
            Some(Parameter {
                name: name.to_string(),
                default_value: token.arg(1).map(str::to_string),
                prompt: token.arg(2).filter(|p| !p.is_empty()).map(str::to_string),
                required: true,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens_splits_key_and_args() {
        let tokens = parse_tokens("echo ${param:name:World:Who?} in ${workspaceFolder}");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].raw, "${param:name:World:Who?}");
        assert_eq!(tokens[0].key, "param");
        assert_eq!(tokens[0].args, vec!["name", "World", "Who?"]);
        assert_eq!(tokens[1].key, "workspaceFolder");
        assert!(tokens[1].args.is_empty());
    }

    #[test]
    fn test_parse_tokens_is_non_greedy() {
        let tokens = parse_tokens("${a}${b:1}}");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].raw, "${b:1}");
    }

    #[test]
    fn test_render_keeps_unknown_tokens_verbatim() {
        let text = "run ${unknown} and ${other:x:y} then ${}";
        assert_eq!(render_tokens(text, |_| None), text);
    }

    #[test]
    fn test_render_substitutes_known_and_empty_values() {
        let rendered = render_tokens("a=${a} b=${b} c=${c}", |token| match token.key.as_str() {
            "a" => Some("1".to_string()),
            "b" => Some(String::new()),
            _ => None,
        });
        assert_eq!(rendered, "a=1 b= c=${c}");
    }

    #[test]
    fn test_render_handles_text_without_tokens() {
        assert_eq!(render_tokens("plain $HOME {x}", |_| Some("!".into())), "plain $HOME {x}");
    }

    #[test]
    fn test_extract_declared_parameters_first_occurrence_wins() {
        let params = extract_declared_parameters(
            "${param:target:dev:Which env?} ${param:target:prod} ${param:count} ${param:}",
        );
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "target");
        assert_eq!(params[0].default_value.as_deref(), Some("dev"));
        assert_eq!(params[0].prompt.as_deref(), Some("Which env?"));
        assert!(params[0].required);
        assert_eq!(params[1].name, "count");
        assert_eq!(params[1].default_value, None);
    }
}
