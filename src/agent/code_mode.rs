//! Static vetting of code-mode tool calls.
//!
//! A code-mode call carries a small program that may invoke several server
//! tools at once. Before such a call is allowed to run unattended, the
//! program text is scanned (never executed) for embedded invocations, and
//! every one of them must be covered by the auto-execution allow-list of a
//! connected code-mode client.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::clients::{ClientRegistry, WILDCARD};
use crate::console::console;
use crate::context::RequestContext;

/// A (server, tool) pair discovered inside code-mode source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedInvocation {
    pub server_name: String,
    pub tool_name: String,
}

/// Point-in-time projection of the registry: which invocations each
/// code-mode client pre-approves, plus the names of all connected
/// clients. Read-only once built.
#[derive(Debug, Default)]
pub struct AllowListSnapshot {
    client_names: Vec<String>,
    allowed: IndexMap<String, Vec<String>>,
}

impl AllowListSnapshot {
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn client_names(&self) -> &[String] {
        &self.client_names
    }

    /// Whether the invocation may run unattended: the server must be a
    /// connected client and the tool must be in its allow-list (or the
    /// allow-list carries the wildcard).
    pub fn allows(&self, server_name: &str, tool_name: &str) -> bool {
        if !self.client_names.iter().any(|c| c == server_name) {
            return false;
        }
        match self.allowed.get(server_name) {
            Some(tools) => tools.iter().any(|t| t == WILDCARD || t == tool_name),
            None => false,
        }
    }
}

/// Build the allow-list snapshot from current registry state. Clients
/// that are not code-mode clients, or that pre-approve nothing, do not
/// contribute an allow-list entry but still count as connected.
pub fn build_allow_list(ctx: &RequestContext, registry: &dyn ClientRegistry) -> AllowListSnapshot {
    let mut snapshot = AllowListSnapshot::default();

    for client_name in registry.tools_per_client(ctx).keys() {
        let Some(client) = registry.client_by_name(client_name) else {
            continue;
        };
        snapshot.client_names.push(client_name.clone());

        if !client.execution_config.is_code_mode_client {
            continue;
        }

        let configured = &client.execution_config.tools_to_auto_execute;
        if configured.is_empty() {
            continue;
        }

        let parsed: Vec<String> = configured
            .iter()
            .map(|name| {
                if name == WILDCARD {
                    name.clone()
                } else {
                    parse_tool_name(name)
                }
            })
            .collect();
        snapshot.allowed.insert(client_name.clone(), parsed);
    }

    snapshot
}

/// Translate a configured tool name into the identifier the code bindings
/// use: camelCase over `-`/`_`/`.`/space separators.
pub fn parse_tool_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut capitalize_next = false;
    for ch in name.chars() {
        if matches!(ch, '-' | '_' | '.' | ' ') {
            capitalize_next = !out.is_empty();
            continue;
        }
        if capitalize_next {
            out.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

// Receivers that belong to the language runtime, not to a server binding.
const LANGUAGE_BUILTINS: &[&str] = &[
    "console", "JSON", "Math", "Object", "Array", "Promise", "String", "Number", "Date", "Boolean",
    "RegExp",
];

fn invocation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([A-Za-z_$][A-Za-z0-9_$]*)\s*\.\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*\(")
            .expect("invocation pattern is valid")
    })
}

// Member-call spellings the scanner cannot resolve to a (server, tool)
// pair: optional chaining and computed member calls. Code using them is
// rejected outright rather than scanned past.
fn unresolvable_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\?\.\s*[A-Za-z_$(\[]|\]\s*\(").expect("unresolvable-call pattern is valid")
    })
}

/// Blank out string literals and comments so the invocation scan only
/// sees executable text. Template-literal interpolations (`${…}`) are
/// code, not text, and stay visible; offsets are preserved.
fn strip_literals_and_comments(code: &str) -> String {
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
        Template,
    }

    let mut out = String::with_capacity(code.len());
    let mut state = State::Code;
    // Brace depth of each open `${…}` interpolation, innermost last.
    let mut interpolations: Vec<usize> = Vec::new();
    let mut chars = code.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            State::Code => match ch {
                '\'' | '"' => {
                    state = State::Str(ch);
                    out.push(' ');
                }
                '`' => {
                    state = State::Template;
                    out.push(' ');
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                '{' => {
                    if let Some(depth) = interpolations.last_mut() {
                        *depth += 1;
                    }
                    out.push('{');
                }
                '}' => {
                    if let Some(depth) = interpolations.last_mut() {
                        if *depth == 0 {
                            interpolations.pop();
                            state = State::Template;
                            out.push(' ');
                        } else {
                            *depth -= 1;
                            out.push('}');
                        }
                    } else {
                        out.push('}');
                    }
                }
                _ => out.push(ch),
            },
            State::LineComment => {
                if ch == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else {
                    out.push(if ch == '\n' { '\n' } else { ' ' });
                }
            }
            State::Str(quote) => match ch {
                '\\' => {
                    chars.next();
                    out.push_str("  ");
                }
                c if c == quote => {
                    state = State::Code;
                    out.push(' ');
                }
                c => out.push(if c == '\n' { '\n' } else { ' ' }),
            },
            State::Template => match ch {
                '\\' => {
                    chars.next();
                    out.push_str("  ");
                }
                '`' => {
                    state = State::Code;
                    out.push(' ');
                }
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    interpolations.push(0);
                    state = State::Code;
                    out.push_str("  ");
                }
                c => out.push(if c == '\n' { '\n' } else { ' ' }),
            },
        }
    }

    out
}

fn scan_invocations(stripped: &str) -> Vec<ExtractedInvocation> {
    invocation_pattern()
        .captures_iter(stripped)
        .filter_map(|caps| {
            let server = caps.get(1)?.as_str();
            let tool = caps.get(2)?.as_str();
            if LANGUAGE_BUILTINS.contains(&server) {
                return None;
            }
            Some(ExtractedInvocation {
                server_name: server.to_string(),
                tool_name: tool.to_string(),
            })
        })
        .collect()
}

/// Enumerate every embedded tool invocation in the program text as a
/// (server, tool) pair, without executing any of it.
pub fn extract_invocations(code: &str) -> Vec<ExtractedInvocation> {
    scan_invocations(&strip_literals_and_comments(code))
}

/// Decide whether a code-mode call may run unattended, from its raw
/// argument payload and the current allow-list snapshot.
pub fn validate_code_arguments(arguments: &str, snapshot: &AllowListSnapshot) -> bool {
    let parsed: serde_json::Value = match serde_json::from_str(arguments) {
        Ok(value) => value,
        Err(err) => {
            console().debug(&format!("code mode: failed to parse tool arguments: {}", err));
            return false;
        }
    };

    let code = match parsed.get("code").and_then(|c| c.as_str()) {
        Some(code) if !code.is_empty() => code,
        _ => {
            console().debug("code mode: code parameter missing or empty");
            return false;
        }
    };

    // The code may arrive pre-escaped; turn literal \n sequences into
    // real line breaks before scanning.
    let code = code.replace("\\n", "\n");

    let stripped = strip_literals_and_comments(&code);
    if unresolvable_call_pattern().is_match(&stripped) {
        console().debug("code mode: member-call syntax the scanner cannot resolve, rejecting");
        return false;
    }

    let invocations = scan_invocations(&stripped);
    if invocations.is_empty() {
        console().debug("code mode: no tool invocations found, skipping validation");
        return true;
    }

    if snapshot.is_empty() {
        console().debug("code mode: no auto-execution tools configured, rejecting");
        return false;
    }

    for invocation in &invocations {
        if !snapshot.allows(&invocation.server_name, &invocation.tool_name) {
            console().debug(&format!(
                "code mode: invocation {}.{} not in auto-execute list",
                invocation.server_name, invocation.tool_name
            ));
            return false;
        }
    }

    true
}
