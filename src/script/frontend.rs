//! Script front end: name resolution and lowering over a shared
//! fragment context.
//!
//! Each accepted fragment is immutable once checked; later fragments see
//! its exported names through their import lists. Releasing a fragment
//! (undo) removes its exports from every future resolution.

use std::collections::{HashMap, HashSet};

use crate::repl::error::{CompileError, CompileResult};
use crate::repl::service::{CheckRequest, FragmentId, FrontendService, ObjectModule};
use crate::repl::unit::FragmentName;

use super::ast::{Expr, LoweredProgram, Stmt};
use super::parser::parse_source;

/// Type names known without any import.
const BUILTIN_TYPES: &[&str] = &["Int", "Double", "Bool", "String", "Unit"];

/// One checked fragment held in the shared context.
struct Fragment {
    name: FragmentName,
    stmts: Vec<Stmt>,
    exports: Vec<String>,
}

/// In-process front end for the script language.
pub struct ScriptFrontend {
    fragments: HashMap<u64, Fragment>,
    next_id: u64,
}

impl ScriptFrontend {
    /// Create an empty shared context.
    pub fn new() -> Self {
        Self {
            fragments: HashMap::new(),
            next_id: 0,
        }
    }

    /// Names visible through an import list.
    fn visible_names(&self, imports: &[FragmentId]) -> HashSet<String> {
        let mut names: HashSet<String> = BUILTIN_TYPES.iter().map(|t| t.to_string()).collect();
        for import in imports {
            if let Some(fragment) = self.fragments.get(&import.0) {
                names.extend(fragment.exports.iter().cloned());
            }
        }
        names
    }
}

impl Default for ScriptFrontend {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontendService for ScriptFrontend {
    fn runtime_support_source(&self) -> String {
        // Declarations the capture transform and print rewrites rely on.
        ["extern __repl_set_value", "extern print", "extern println", ""].join("\n")
    }

    fn check(&mut self, request: CheckRequest<'_>) -> CompileResult<FragmentId> {
        let stmts = parse_source(request.source).map_err(|err| match (err, request.filename) {
            (CompileError::Parse(msg), Some(file)) => {
                CompileError::Parse(format!("{}: {}", file, msg))
            }
            (other, _) => other,
        })?;

        let mut visible = self.visible_names(request.imports);
        let mut exports = Vec::new();
        for stmt in &stmts {
            check_stmt(stmt, &mut visible, &mut exports)?;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.fragments.insert(
            id,
            Fragment {
                name: request.fragment.clone(),
                stmts,
                exports,
            },
        );
        Ok(FragmentId(id))
    }

    fn lower(&mut self, fragment: FragmentId) -> CompileResult<Option<ObjectModule>> {
        let Some(checked) = self.fragments.get(&fragment.0) else {
            return Err(CompileError::Codegen(format!(
                "unknown fragment {}",
                fragment.0
            )));
        };
        let stmts: Vec<Stmt> = checked
            .stmts
            .iter()
            .filter(|stmt| stmt.is_executable())
            .cloned()
            .collect();
        if stmts.is_empty() {
            // Pure declaration namespace: nothing to load.
            return Ok(None);
        }
        Ok(Some(ObjectModule::new(
            checked.name.clone(),
            LoweredProgram { stmts },
        )))
    }

    fn release(&mut self, fragment: FragmentId) {
        self.fragments.remove(&fragment.0);
    }
}

fn check_stmt(
    stmt: &Stmt,
    visible: &mut HashSet<String>,
    exports: &mut Vec<String>,
) -> CompileResult<()> {
    match stmt {
        Stmt::Let { name, value } => {
            check_expr(value, visible)?;
            visible.insert(name.clone());
            exports.push(name.clone());
        }
        Stmt::Assign { name, value } => {
            if !visible.contains(name) {
                return Err(unresolved(name));
            }
            check_expr(value, visible)?;
        }
        Stmt::TypeAlias { name, target } => {
            if !visible.contains(target) {
                return Err(unresolved(target));
            }
            visible.insert(name.clone());
            exports.push(name.clone());
        }
        Stmt::Extern { name } => {
            visible.insert(name.clone());
            exports.push(name.clone());
        }
        Stmt::Expr(expr) => check_expr(expr, visible)?,
    }
    Ok(())
}

fn check_expr(expr: &Expr, visible: &HashSet<String>) -> CompileResult<()> {
    match expr {
        Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Str(_) => Ok(()),
        Expr::Var(name) => {
            if visible.contains(name) {
                Ok(())
            } else {
                Err(unresolved(name))
            }
        }
        Expr::Unary { operand, .. } => check_expr(operand, visible),
        Expr::Binary { lhs, rhs, .. } => {
            check_expr(lhs, visible)?;
            check_expr(rhs, visible)
        }
        Expr::Call { callee, args } => {
            if !visible.contains(callee) {
                return Err(unresolved(callee));
            }
            for arg in args {
                check_expr(arg, visible)?;
            }
            Ok(())
        }
    }
}

fn unresolved(name: &str) -> CompileError {
    CompileError::Sema(format!("unresolved identifier `{}`", name))
}
