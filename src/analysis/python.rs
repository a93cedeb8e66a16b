//! Python source front-end.

use rustpython_parser::{Parse, ast};

use super::{Import, SourceFrontEnd, SyntaxError};

/// Parses Python 3 source with `rustpython-parser` and reports every import
/// statement in the syntax tree, nested bodies included.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonFrontEnd;

impl SourceFrontEnd for PythonFrontEnd {
    fn handles(&self, extension: &str) -> bool {
        extension == ".py"
    }

    fn imports(&self, source: &str, source_path: &str) -> Result<Vec<Import>, SyntaxError> {
        let suite = ast::Suite::parse(source, source_path).map_err(|e| SyntaxError {
            message: e.to_string(),
        })?;

        let mut imports = Vec::new();
        collect_imports(&suite, &mut imports);
        Ok(imports)
    }
}

fn alias_names(aliases: &[ast::Alias]) -> Vec<String> {
    aliases.iter().map(|a| a.name.as_str().to_string()).collect()
}

fn collect_imports(body: &[ast::Stmt], out: &mut Vec<Import>) {
    for stmt in body {
        match stmt {
            ast::Stmt::Import(import) => out.push(Import::Module {
                names: alias_names(&import.names),
            }),
            ast::Stmt::ImportFrom(import) => out.push(Import::From {
                module: import.module.as_ref().map(|m| m.as_str().to_string()),
                level: import.level.as_ref().map(|l| l.to_u32()).unwrap_or(0),
                names: alias_names(&import.names),
            }),
            ast::Stmt::FunctionDef(def) => collect_imports(&def.body, out),
            ast::Stmt::AsyncFunctionDef(def) => collect_imports(&def.body, out),
            ast::Stmt::ClassDef(def) => collect_imports(&def.body, out),
            ast::Stmt::For(s) => {
                collect_imports(&s.body, out);
                collect_imports(&s.orelse, out);
            }
            ast::Stmt::AsyncFor(s) => {
                collect_imports(&s.body, out);
                collect_imports(&s.orelse, out);
            }
            ast::Stmt::While(s) => {
                collect_imports(&s.body, out);
                collect_imports(&s.orelse, out);
            }
            ast::Stmt::If(s) => {
                collect_imports(&s.body, out);
                collect_imports(&s.orelse, out);
            }
            ast::Stmt::With(s) => collect_imports(&s.body, out),
            ast::Stmt::AsyncWith(s) => collect_imports(&s.body, out),
            ast::Stmt::Match(s) => {
                for case in &s.cases {
                    collect_imports(&case.body, out);
                }
            }
            ast::Stmt::Try(s) => {
                collect_imports(&s.body, out);
                collect_handlers(&s.handlers, out);
                collect_imports(&s.orelse, out);
                collect_imports(&s.finalbody, out);
            }
            ast::Stmt::TryStar(s) => {
                collect_imports(&s.body, out);
                collect_handlers(&s.handlers, out);
                collect_imports(&s.orelse, out);
                collect_imports(&s.finalbody, out);
            }
            _ => {}
        }
    }
}

fn collect_handlers(handlers: &[ast::ExceptHandler], out: &mut Vec<Import>) {
    for handler in handlers {
        let ast::ExceptHandler::ExceptHandler(handler) = handler;
        collect_imports(&handler.body, out);
    }
}
