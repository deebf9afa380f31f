//! Ordered pattern table driving structural chunk extraction.
//!
//! This is heuristic, best-effort line matching, not parsing. Each
//! [`PatternFamily`] maps a set of alternative regular expressions to one
//! [`ChunkType`]. Families are tested in table order and the first family
//! with a matching pattern decides the chunk type; a line never produces
//! more than one chunk. Extending support for a language means adding
//! patterns to the relevant family.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ChunkType;

/// Identifiers that look like a call followed by a block but are control
/// flow, never a method declaration.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "else", "do", "try", "with", "match",
    "loop", "foreach", "elif", "except", "function", "new", "await", "typeof", "sizeof",
];

/// Regular-expression alternatives that all produce the same chunk type.
pub struct PatternFamily {
    pub chunk_type: ChunkType,
    patterns: Vec<Regex>,
}

impl PatternFamily {
    fn new(chunk_type: ChunkType, patterns: &[&str]) -> Self {
        Self {
            chunk_type,
            patterns: patterns.iter().map(|p| compile(p)).collect(),
        }
    }

    /// Whether any pattern in the family matches `line`.
    ///
    /// A pattern with a `name` capture is rejected when the captured
    /// identifier is a control-flow keyword (`if (x) {` is not a method).
    pub fn matches(&self, line: &str) -> bool {
        self.patterns.iter().any(|re| match re.captures(line) {
            Some(caps) => caps
                .name("name")
                .map(|m| !CONTROL_KEYWORDS.contains(&m.as_str()))
                .unwrap_or(true),
            None => false,
        })
    }
}

fn compile(pattern: &str) -> Regex {
    // Patterns are compile-time constants covered by unit tests.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid chunk pattern {pattern:?}: {e}"))
}

/// The ordered family table: function, class, route.
pub static FAMILIES: Lazy<Vec<PatternFamily>> = Lazy::new(|| {
    vec![
        PatternFamily::new(
            ChunkType::Function,
            &[
                // function foo(...), export default async function* foo(...)
                r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*\w*\s*\(",
                // const foo = (...) => / const foo = async x =>
                r"^\s*(?:export\s+)?(?:const|let|var)\s+\w+\s*(?::\s*[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*(?::\s*[^=]+)?=>",
                // const foo = function (...)
                r"^\s*(?:export\s+)?(?:const|let|var)\s+\w+\s*=\s*(?:async\s+)?function\b",
                // key: function (...) / key: async (...) =>
                r"^\s*\w+\s*:\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*=>)",
                // def foo(...) / async def foo(...)
                r"^\s*(?:async\s+)?def\s+\w+\s*\(",
                // fn foo(...) with Rust visibility / qualifiers
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+\w+",
                // func foo(...) / func (r *T) foo(...)
                r"^\s*func\s+(?:\([^)]*\)\s*)?\w+\s*\(",
                // class / object method: [modifiers] name(...) {
                r"^\s*(?:(?:public|private|protected|static|async|override|get|set|final|abstract|synchronized)\s+)*(?:[\w<>\[\],]+\s+)?(?P<name>\w+)\s*\([^)]*\)\s*(?::\s*[\w<>\[\]|, ]+\s*)?(?:throws\s+[\w, ]+)?\{",
            ],
        ),
        PatternFamily::new(
            ChunkType::Class,
            &[
                r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:public\s+|private\s+|protected\s+|internal\s+)?(?:final\s+|sealed\s+|data\s+|static\s+)*class\s+\w+",
                r"^\s*(?:export\s+)?(?:public\s+)?interface\s+\w+",
                r"^\s*(?:export\s+)?type\s+\w+(?:<[^>]*>)?\s*=",
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+\w+",
                r"^\s*type\s+\w+\s+(?:struct|interface)\b",
            ],
        ),
        PatternFamily::new(
            ChunkType::Route,
            &[
                // app.get('/x', ...), router.post(...), server.delete(...)
                r"\b(?:app|router|route|server|api|routes)\.(?:get|post|put|delete|patch)\s*\(",
                // @app.get("/x"), @router.post(...), @Get(), @route(...)
                r"(?i)^\s*@(?:\w+\.)?(?:get|post|put|delete|patch|route)\s*\(",
                // @GetMapping / @PostMapping / @RequestMapping
                r"^\s*@(?:Get|Post|Put|Delete|Patch|Request)Mapping\b",
            ],
        ),
    ]
});

/// The chunk type of the first family matching `line`, if any.
pub fn classify_line(line: &str) -> Option<ChunkType> {
    FAMILIES
        .iter()
        .find(|family| family.matches(line))
        .map(|family| family.chunk_type)
}

static FUNCTION_NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bfunction\s*\*?\s*(\w+)",
        r"\b(?:const|let|var|def|fn|func)\s+(?:\([^)]*\)\s*)?(\w+)",
        r"^\s*(\w+)\s*:",
        r"^\s*(?:(?:public|private|protected|static|async|override|get|set|final|abstract|synchronized)\s+)*(?:[\w<>\[\],]+\s+)?(\w+)\s*\(",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

static CLASS_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(?:class|interface|struct|enum|trait|type)\s+(\w+)")
});

/// Extract a declared function/method name from a declaration line.
///
/// Tries, in order: the name after `function`, after `const`/`let`/`var`/
/// `def`/`fn`/`func`, the key before `:`, then a bare `name(` method form.
pub fn extract_function_name(line: &str) -> Option<String> {
    FUNCTION_NAME_PATTERNS.iter().find_map(|re| {
        re.captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| !CONTROL_KEYWORDS.contains(name))
            .map(str::to_string)
    })
}

/// Extract a declared class/interface name from a declaration line.
pub fn extract_class_name(line: &str) -> Option<String> {
    CLASS_NAME_PATTERN
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
