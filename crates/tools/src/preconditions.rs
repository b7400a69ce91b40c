//! Code Precondition Scanner
//!
//! Static checks run on `execute_python` code before it is dispatched to the
//! sandbox. Code that is guaranteed to fail there (unterminated strings,
//! raw networking, modules the sandbox refuses to import) is blocked with a
//! learning point instead of costing a round trip. Missing output is only a
//! warning.

use regex::Regex;
use std::sync::OnceLock;

/// Modules the sandbox refuses to import.
///
/// Raw sockets and event loops cannot reach the network from the sandbox;
/// HTTP client libraries (`requests`, `httpx`) are allowed.
const NETWORK_MODULES: &[&str] = &["socket", "ssl", "asyncio"];

const SANDBOX_FORBIDDEN_MODULES: &[&str] = &[
    "subprocess",
    "multiprocessing",
    "ctypes",
    "cffi",
    "pty",
    "signal",
    "resource",
    "mmap",
    "sysconfig",
    "distutils",
    "shutil",
    "code",
    "codeop",
    "compileall",
    "py_compile",
    "builtins",
    "importlib",
];

/// Why a code-execution call was blocked before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionViolation {
    pub reason: String,
    pub learning_point: String,
}

/// Outcome of scanning one code payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreconditionReport {
    /// Set when the call must not be dispatched
    pub violation: Option<PreconditionViolation>,
    /// Non-blocking observations
    pub warnings: Vec<String>,
}

impl PreconditionReport {
    pub fn is_blocked(&self) -> bool {
        self.violation.is_some()
    }

    fn block(reason: impl Into<String>, learning_point: impl Into<String>) -> Self {
        Self {
            violation: Some(PreconditionViolation {
                reason: reason.into(),
                learning_point: learning_point.into(),
            }),
            warnings: Vec::new(),
        }
    }
}

/// Compiled pattern with the name reported to the model.
struct CompiledRule {
    name: &'static str,
    regex: Regex,
}

fn import_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:import\s+([\w\.]+(?:\s*,\s*[\w\.]+)*)|from\s+([\w\.]+)\s+import\b)")
            .ok()
    })
    .as_ref()
}

/// Dangerous calls blocked even through allowed modules.
fn blocked_call_rules() -> &'static Vec<CompiledRule> {
    static RULES: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let raw: &[(&'static str, &str)] = &[
            ("os.system()", r"\bos\s*\.\s*system\s*\("),
            ("os.popen()", r"\bos\s*\.\s*popen\s*\("),
            ("os.exec*()", r"\bos\s*\.\s*execv"),
            ("os.fork()", r"\bos\s*\.\s*fork\s*\("),
            ("os.spawn*()", r"\bos\s*\.\s*spawn"),
            ("os.kill()", r"\bos\s*\.\s*kill\s*\("),
            ("__import__()", r"__import__\s*\("),
            ("eval()", r"(?:^|[^\w.])eval\s*\("),
            ("exec()", r"(?:^|[^\w.])exec\s*\("),
            ("compile()", r"(?:^|[^\w.])compile\s*\("),
            ("globals()", r"(?:^|[^\w.])globals\s*\(\s*\)"),
            ("locals()", r"(?:^|[^\w.])locals\s*\(\s*\)"),
        ];
        raw.iter()
            .filter_map(|&(name, pattern)| {
                Regex::new(pattern).ok().map(|regex| CompiledRule { name, regex })
            })
            .collect()
    })
}

fn output_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[^\w.])(?:print|display|pprint)\s*\(|sys\s*\.\s*stdout\s*\.\s*write")
            .ok()
    })
    .as_ref()
}

/// Scan Python source for conditions guaranteed to fail in the sandbox.
pub fn check_python_code(code: &str) -> PreconditionReport {
    let stripped = match strip_strings_and_comments(code) {
        Ok(s) => s,
        Err(line) => {
            return PreconditionReport::block(
                format!("Unterminated string literal on line {}", line),
                format!(
                    "Your code has an unbalanced quote on line {}. Close every string literal \
                     (use triple quotes for multi-line text) and escape quotes inside strings, \
                     then call execute_python again with {{\"code\": \"...\", \"purpose\": \"...\"}}.",
                    line
                ),
            );
        }
    };

    let imports = import_regex().map(|re| re.captures_iter(&stripped).collect::<Vec<_>>());
    for caps in imports.unwrap_or_default() {
        let modules: Vec<&str> = match (caps.get(1), caps.get(2)) {
            (Some(list), _) => list.as_str().split(',').map(str::trim).collect(),
            (None, Some(module)) => vec![module.as_str()],
            _ => continue,
        };
        for module in modules {
            let top = module.split('.').next().unwrap_or(module);
            if NETWORK_MODULES.contains(&top) {
                return PreconditionReport::block(
                    format!("Networking module '{}' is not available in the sandbox", module),
                    format!(
                        "The Python sandbox has no raw network access, so '{}' always fails. \
                         Use the data already provided in context or call a dedicated tool \
                         (e.g. get_mining_stats) instead of fetching it from Python.",
                        module
                    ),
                );
            }
            if SANDBOX_FORBIDDEN_MODULES.contains(&top) {
                return PreconditionReport::block(
                    format!("Import of '{}' is not permitted in the sandbox", module),
                    format!(
                        "The Python sandbox rejects '{}'. Stick to pure computation with the \
                         standard library (json, math, statistics, datetime, re) and print the result.",
                        module
                    ),
                );
            }
        }
    }

    for rule in blocked_call_rules() {
        if rule.regex.is_match(&stripped) {
            return PreconditionReport::block(
                format!("Call to {} is not permitted in the sandbox", rule.name),
                format!(
                    "Remove {} from your code. The sandbox only runs plain computations; \
                     print() the values you need.",
                    rule.name
                ),
            );
        }
    }

    let mut report = PreconditionReport::default();
    if !output_regex().map_or(true, |re| re.is_match(&stripped)) {
        report.warnings.push(
            "Code produces no output; add print() so the result is visible to you".to_string(),
        );
    }
    report
}

/// Replace string literal bodies with nothing and drop comments.
///
/// Returns the 1-based line where an unterminated string starts on failure.
fn strip_strings_and_comments(code: &str) -> Result<String, usize> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Comment,
        Str { quote: char, triple: bool, start_line: usize },
    }

    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut state = State::Code;
    let mut line = 1usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match state {
            State::Code => match c {
                '#' => state = State::Comment,
                '\'' | '"' => {
                    let triple = i + 2 < chars.len() && chars[i + 1] == c && chars[i + 2] == c;
                    out.push(c);
                    out.push(c);
                    state = State::Str {
                        quote: c,
                        triple,
                        start_line: line,
                    };
                    i += if triple { 3 } else { 1 };
                    continue;
                }
                '\n' => {
                    line += 1;
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::Comment => {
                if c == '\n' {
                    line += 1;
                    out.push(c);
                    state = State::Code;
                }
            }
            State::Str {
                quote,
                triple,
                start_line,
            } => {
                if c == '\\' {
                    // Skip the escaped char; a backslash-newline continues the string.
                    if i + 1 < chars.len() && chars[i + 1] == '\n' {
                        line += 1;
                    }
                    i += 2;
                    continue;
                }
                if c == '\n' {
                    if !triple {
                        return Err(start_line);
                    }
                    line += 1;
                    out.push(c);
                } else if c == quote {
                    if !triple {
                        state = State::Code;
                    } else if i + 2 < chars.len() && chars[i + 1] == quote && chars[i + 2] == quote
                    {
                        state = State::Code;
                        i += 3;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }

    match state {
        State::Str { start_line, .. } => Err(start_line),
        _ => Ok(out),
    }
}
