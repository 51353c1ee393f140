use anyhow::{Context, Result};
use tree_sitter::{Language, Node, Parser};

/// Byte span of one top-level semantic unit
#[derive(Debug, Clone)]
pub struct UnitSpan {
    pub kind: String,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// AST parser for finding semantic unit boundaries in source code
pub struct AstParser {
    parser: Parser,
    language_name: String,
}

impl AstParser {
    /// Create a new AST parser for the given file extension
    pub fn new(extension: &str) -> Result<Self> {
        let (language, language_name): (Language, &str) = match extension.to_lowercase().as_str() {
            "rs" => (tree_sitter_rust::LANGUAGE.into(), "Rust"),
            "py" => (tree_sitter_python::LANGUAGE.into(), "Python"),
            "js" | "mjs" | "cjs" | "jsx" => (tree_sitter_javascript::LANGUAGE.into(), "JavaScript"),
            "ts" | "tsx" => (
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                "TypeScript",
            ),
            "go" => (tree_sitter_go::LANGUAGE.into(), "Go"),
            _ => anyhow::bail!("Unsupported language for AST parsing: {}", extension),
        };

        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .context("Failed to set parser language")?;

        Ok(Self {
            parser,
            language_name: language_name.to_string(),
        })
    }

    /// Parse source code and return the byte spans of top-level semantic
    /// units (functions, classes, impls, ...) in document order.
    ///
    /// Only direct children of the root are returned, so the spans never
    /// overlap; everything between them (imports, comments, loose
    /// statements) is left to the caller as gap text.
    pub fn top_level_units(&mut self, source_code: &str) -> Result<Vec<UnitSpan>> {
        let tree = self
            .parser
            .parse(source_code, None)
            .context("Failed to parse source code")?;

        let target_kinds = self.target_kinds();
        let root = tree.root_node();
        let mut units = Vec::new();

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if let Some(span) = Self::unit_span(&child, &target_kinds) {
                units.push(span);
            }
        }

        units.sort_by_key(|u| u.start_byte);
        Ok(units)
    }

    fn unit_span(node: &Node, target_kinds: &[&str]) -> Option<UnitSpan> {
        let kind = node.kind();
        if target_kinds.contains(&kind) {
            Some(UnitSpan {
                kind: kind.to_string(),
                start_byte: node.start_byte(),
                end_byte: node.end_byte(),
            })
        } else {
            None
        }
    }

    /// Node kinds treated as splittable units, per language
    fn target_kinds(&self) -> Vec<&'static str> {
        match self.language_name.as_str() {
            "Rust" => vec![
                "function_item",
                "impl_item",
                "trait_item",
                "struct_item",
                "enum_item",
                "mod_item",
            ],
            "Python" => vec![
                "function_definition",
                "class_definition",
                "decorated_definition",
            ],
            "JavaScript" | "TypeScript" => vec![
                "function_declaration",
                "class_declaration",
                "lexical_declaration",
                "export_statement",
            ],
            "Go" => vec![
                "function_declaration",
                "method_declaration",
                "type_declaration",
            ],
            _ => vec![],
        }
    }

    /// Get the language name
    pub fn language_name(&self) -> &str {
        &self.language_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_top_level_units() {
        let source = r#"
use std::fmt;

fn main() {
    println!("Hello, world!");
}

struct MyStruct {
    field: i32,
}

impl MyStruct {
    fn new() -> Self {
        MyStruct { field: 0 }
    }
}
"#;

        let mut parser = AstParser::new("rs").unwrap();
        let units = parser.top_level_units(source).unwrap();

        assert_eq!(units.len(), 3); // fn, struct, impl; `use` is gap text
        assert!(units.iter().any(|u| u.kind == "function_item"));
        assert!(units.iter().any(|u| u.kind == "struct_item"));
        assert!(units.iter().any(|u| u.kind == "impl_item"));
    }

    #[test]
    fn test_units_are_ordered_and_disjoint() {
        let source = "fn a() {}\n\nfn b() {}\n\nfn c() {}\n";
        let mut parser = AstParser::new("rs").unwrap();
        let units = parser.top_level_units(source).unwrap();

        assert_eq!(units.len(), 3);
        for pair in units.windows(2) {
            assert!(pair[0].end_byte <= pair[1].start_byte);
        }
    }

    #[test]
    fn test_python_nested_methods_not_duplicated() {
        let source = r#"
def hello():
    print("Hello")

class MyClass:
    def __init__(self):
        self.value = 0

    def method(self):
        return self.value
"#;

        let mut parser = AstParser::new("py").unwrap();
        let units = parser.top_level_units(source).unwrap();

        // Only the top-level function and the class; methods stay inside it
        assert_eq!(units.len(), 2);
        assert!(units.iter().any(|u| u.kind == "function_definition"));
        assert!(units.iter().any(|u| u.kind == "class_definition"));
    }

    #[test]
    fn test_javascript_parsing() {
        let source = r#"
function hello() {
    console.log("Hello");
}

class MyClass {
    method() {
        return 42;
    }
}
"#;

        let mut parser = AstParser::new("js").unwrap();
        let units = parser.top_level_units(source).unwrap();
        assert!(units.len() >= 2);
    }

    #[test]
    fn test_go_parsing() {
        let source = r#"
package main

func add(a int, b int) int {
    return a + b
}

type Point struct {
    X int
    Y int
}
"#;

        let mut parser = AstParser::new("go").unwrap();
        let units = parser.top_level_units(source).unwrap();
        assert!(units.iter().any(|u| u.kind == "function_declaration"));
        assert!(units.iter().any(|u| u.kind == "type_declaration"));
    }

    #[test]
    fn test_unsupported_language() {
        let result = AstParser::new("xyz");
        assert!(result.is_err());
    }
}
