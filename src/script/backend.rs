//! Script backend: an in-memory stand-in for a JIT linker.
//!
//! Linked modules form an ordered list; each holds the globals its entry
//! point bound. Symbol resolution walks that list newest first, then the
//! runtime-symbol table (seeded with the `print` builtins), so later
//! re-declarations shadow earlier ones exactly like a dynamic linker
//! search order.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::repl::error::{ExecError, ExecResult, LinkError, LinkResult};
use crate::repl::service::{JitBackend, ModuleHandle, ObjectModule, RuntimeFn};
use crate::repl::session::ENTRY_SYMBOL;
use crate::repl::unit::FragmentName;

use super::ast::{BinOp, Expr, LoweredProgram, Stmt, UnaryOp};
use super::value::ScriptValue;

/// One module resident in the link order.
struct LinkedModule {
    handle: ModuleHandle,
    name: FragmentName,
    program: LoweredProgram,
    globals: HashMap<String, ScriptValue>,
}

/// In-memory execution backend for the script language.
pub struct ScriptJit {
    modules: Vec<LinkedModule>,
    runtime_fns: HashMap<String, RuntimeFn>,
    next_handle: u64,
    initializers_ran: bool,
}

impl ScriptJit {
    /// Create an empty backend with the builtin runtime functions.
    pub fn new() -> Self {
        let mut runtime_fns: HashMap<String, RuntimeFn> = HashMap::new();
        for name in ["print", "println"] {
            runtime_fns.insert(
                name.to_string(),
                std::sync::Arc::new(|args: &[serde_json::Value]| {
                    let line = args
                        .iter()
                        .map(|arg| ScriptValue::from_json(arg).to_string())
                        .collect::<Vec<_>>()
                        .join(" ");
                    info!(target: "script::print", "{}", line);
                    serde_json::Value::Null
                }),
            );
        }
        Self {
            modules: Vec::new(),
            runtime_fns,
            next_handle: 0,
            initializers_ran: false,
        }
    }

    fn module_index(&self, handle: ModuleHandle) -> Option<usize> {
        self.modules.iter().position(|m| m.handle == handle)
    }

    /// Read a variable, newest module first.
    fn read_var(&self, name: &str) -> Option<ScriptValue> {
        self.modules
            .iter()
            .rev()
            .find_map(|module| module.globals.get(name).cloned())
    }

    /// Write to the newest module currently binding `name`.
    fn write_var(&mut self, name: &str, value: ScriptValue) -> ExecResult<()> {
        for module in self.modules.iter_mut().rev() {
            if let Some(slot) = module.globals.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        Err(ExecError::EntryFailed(format!(
            "undefined variable `{}`",
            name
        )))
    }

    fn exec_stmt(&mut self, owner: usize, stmt: &Stmt) -> ExecResult<()> {
        match stmt {
            Stmt::Let { name, value } => {
                let value = self.eval(value)?;
                self.modules[owner].globals.insert(name.clone(), value);
                Ok(())
            }
            Stmt::Assign { name, value } => {
                let value = self.eval(value)?;
                self.write_var(name, value)
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(())
            }
            // Stripped during lowering; nothing to run.
            Stmt::TypeAlias { .. } | Stmt::Extern { .. } => Ok(()),
        }
    }

    fn eval(&mut self, expr: &Expr) -> ExecResult<ScriptValue> {
        match expr {
            Expr::Int(num) => Ok(ScriptValue::Int(*num)),
            Expr::Float(num) => Ok(ScriptValue::Float(*num)),
            Expr::Bool(flag) => Ok(ScriptValue::Bool(*flag)),
            Expr::Str(text) => Ok(ScriptValue::Str(text.clone())),
            Expr::Var(name) => self
                .read_var(name)
                .ok_or_else(|| ExecError::EntryFailed(format!("undefined variable `{}`", name))),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                eval_unary(*op, value)
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                eval_binary(*op, lhs, rhs)
            }
            Expr::Call { callee, args } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg)?.to_json());
                }
                let Some(func) = self.runtime_fns.get(callee) else {
                    return Err(ExecError::EntryFailed(format!(
                        "unresolved function `{}`",
                        callee
                    )));
                };
                let result = func(&evaluated);
                Ok(ScriptValue::from_json(&result))
            }
        }
    }
}

impl Default for ScriptJit {
    fn default() -> Self {
        Self::new()
    }
}

impl JitBackend for ScriptJit {
    fn prepare(&mut self) {
        // A native backend would boot its target subsystem here.
        debug!("script backend prepared");
    }

    fn define_runtime_fn(&mut self, name: &str, func: RuntimeFn) {
        self.runtime_fns.insert(name.to_string(), func);
    }

    fn add_module(&mut self, module: ObjectModule) -> LinkResult<ModuleHandle> {
        let name = module.name().clone();
        let program = module
            .into_payload()
            .downcast::<LoweredProgram>()
            .map_err(|_| LinkError::ForeignModule(name.to_string()))?;

        let handle = ModuleHandle(self.next_handle);
        self.next_handle += 1;
        debug!(module = %name, ?handle, "module added to link order");
        self.modules.push(LinkedModule {
            handle,
            name,
            program: *program,
            globals: HashMap::new(),
        });
        Ok(handle)
    }

    fn remove_module(&mut self, handle: ModuleHandle) -> LinkResult<()> {
        let Some(index) = self.module_index(handle) else {
            return Err(LinkError::UnknownModule(handle.0));
        };
        let removed = self.modules.remove(index);
        debug!(module = %removed.name, ?handle, "module removed from link order");
        Ok(())
    }

    fn run_static_initializers(&mut self) -> ExecResult<()> {
        // Script modules have no static constructors; the pass still runs
        // exactly once per session for parity with native backends.
        self.initializers_ran = true;
        Ok(())
    }

    fn invoke_entry(&mut self, handle: ModuleHandle, symbol: &str) -> ExecResult<bool> {
        if symbol != ENTRY_SYMBOL {
            return Ok(false);
        }
        if !self.initializers_ran {
            return Err(ExecError::InitFailed(
                "static initializers have not run".into(),
            ));
        }
        let Some(index) = self.module_index(handle) else {
            return Err(ExecError::EntryFailed(format!(
                "stale module handle {}",
                handle.0
            )));
        };
        let program = self.modules[index].program.clone();
        for stmt in &program.stmts {
            self.exec_stmt(index, stmt)?;
        }
        Ok(true)
    }
}

fn eval_unary(op: UnaryOp, value: ScriptValue) -> ExecResult<ScriptValue> {
    match (op, value) {
        (UnaryOp::Neg, ScriptValue::Int(num)) => Ok(ScriptValue::Int(-num)),
        (UnaryOp::Neg, ScriptValue::Float(num)) => Ok(ScriptValue::Float(-num)),
        (UnaryOp::Not, ScriptValue::Bool(flag)) => Ok(ScriptValue::Bool(!flag)),
        (op, value) => Err(ExecError::EntryFailed(format!(
            "cannot apply {:?} to {}",
            op,
            value.type_name()
        ))),
    }
}

fn eval_binary(op: BinOp, lhs: ScriptValue, rhs: ScriptValue) -> ExecResult<ScriptValue> {
    use ScriptValue::*;

    let type_error = |lhs: &ScriptValue, rhs: &ScriptValue| {
        ExecError::EntryFailed(format!(
            "cannot apply {:?} to {} and {}",
            op,
            lhs.type_name(),
            rhs.type_name()
        ))
    };

    match op {
        BinOp::Add => match (&lhs, &rhs) {
            (Int(a), Int(b)) => Ok(Int(a + b)),
            (Str(a), Str(b)) => Ok(Str(format!("{}{}", a, b))),
            _ => numeric(op, &lhs, &rhs).ok_or_else(|| type_error(&lhs, &rhs)),
        },
        BinOp::Sub | BinOp::Mul => match (&lhs, &rhs) {
            (Int(a), Int(b)) => Ok(Int(if op == BinOp::Sub { a - b } else { a * b })),
            _ => numeric(op, &lhs, &rhs).ok_or_else(|| type_error(&lhs, &rhs)),
        },
        BinOp::Div => match (&lhs, &rhs) {
            (Int(_), Int(0)) => Err(ExecError::EntryFailed("division by zero".into())),
            (Int(a), Int(b)) => Ok(Int(a / b)),
            _ => numeric(op, &lhs, &rhs).ok_or_else(|| type_error(&lhs, &rhs)),
        },
        BinOp::Rem => match (&lhs, &rhs) {
            (Int(_), Int(0)) => Err(ExecError::EntryFailed("division by zero".into())),
            (Int(a), Int(b)) => Ok(Int(a % b)),
            _ => Err(type_error(&lhs, &rhs)),
        },
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (&lhs, &rhs) {
                (Str(a), Str(b)) => a.partial_cmp(b),
                _ => match (lhs.as_f64(), rhs.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(type_error(&lhs, &rhs)),
                },
            };
            let Some(ordering) = ordering else {
                return Err(type_error(&lhs, &rhs));
            };
            Ok(Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinOp::Eq => Ok(Bool(values_equal(&lhs, &rhs))),
        BinOp::Ne => Ok(Bool(!values_equal(&lhs, &rhs))),
        BinOp::And | BinOp::Or => match (&lhs, &rhs) {
            (Bool(a), Bool(b)) => Ok(Bool(if op == BinOp::And { *a && *b } else { *a || *b })),
            _ => Err(type_error(&lhs, &rhs)),
        },
    }
}

/// Mixed int/float arithmetic with promotion to float.
fn numeric(op: BinOp, lhs: &ScriptValue, rhs: &ScriptValue) -> Option<ScriptValue> {
    let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        _ => return None,
    };
    Some(ScriptValue::Float(result))
}

fn values_equal(lhs: &ScriptValue, rhs: &ScriptValue) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::unit::compute_fragment_name;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn module(ordinal: u64, source: &str) -> ObjectModule {
        let stmts = super::super::parser::parse_source(source).expect("parse");
        let name = compute_fragment_name(&uuid::Uuid::nil(), ordinal);
        ObjectModule::new(name, LoweredProgram { stmts })
    }

    fn run(jit: &mut ScriptJit, handle: ModuleHandle) -> ExecResult<bool> {
        jit.run_static_initializers()?;
        jit.invoke_entry(handle, ENTRY_SYMBOL)
    }

    #[test]
    fn globals_resolve_across_modules() {
        let mut jit = ScriptJit::new();
        let first = jit.add_module(module(0, "let a = 5")).unwrap();
        run(&mut jit, first).unwrap();

        let second = jit.add_module(module(1, "let b = a + 10")).unwrap();
        run(&mut jit, second).unwrap();

        assert_eq!(jit.read_var("b"), Some(ScriptValue::Int(15)));
    }

    #[test]
    fn newer_bindings_shadow_older_ones() {
        let mut jit = ScriptJit::new();
        let first = jit.add_module(module(0, "let a = 1")).unwrap();
        run(&mut jit, first).unwrap();
        let second = jit.add_module(module(1, "let a = 2")).unwrap();
        run(&mut jit, second).unwrap();

        assert_eq!(jit.read_var("a"), Some(ScriptValue::Int(2)));

        // Removing the shadowing module re-exposes the original binding.
        jit.remove_module(second).unwrap();
        assert_eq!(jit.read_var("a"), Some(ScriptValue::Int(1)));
    }

    #[test]
    fn removal_frees_a_modules_globals() {
        let mut jit = ScriptJit::new();
        let handle = jit.add_module(module(0, "let a = 5")).unwrap();
        run(&mut jit, handle).unwrap();
        jit.remove_module(handle).unwrap();

        assert_eq!(jit.read_var("a"), None);
        assert!(matches!(
            jit.remove_module(handle),
            Err(LinkError::UnknownModule(_))
        ));
    }

    #[test]
    fn runtime_fns_receive_evaluated_arguments() {
        let mut jit = ScriptJit::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        jit.define_runtime_fn(
            "record",
            Arc::new(move |args: &[serde_json::Value]| {
                sink.lock().extend(args.to_vec());
                serde_json::Value::Null
            }),
        );

        let handle = jit.add_module(module(0, "record(2 + 3)")).unwrap();
        run(&mut jit, handle).unwrap();
        assert_eq!(seen.lock().as_slice(), &[serde_json::json!(5)]);
    }

    #[test]
    fn entry_symbol_is_the_only_entry() {
        let mut jit = ScriptJit::new();
        let handle = jit.add_module(module(0, "let a = 1")).unwrap();
        assert!(!jit.invoke_entry(handle, "other_symbol").unwrap());
    }

    #[test]
    fn runtime_failures_surface_as_exec_errors() {
        let mut jit = ScriptJit::new();
        let handle = jit.add_module(module(0, "let x = 1 / 0")).unwrap();
        let err = run(&mut jit, handle).unwrap_err();
        assert!(matches!(err, ExecError::EntryFailed(msg) if msg.contains("division")));
    }

    #[test]
    fn foreign_payloads_are_rejected() {
        let mut jit = ScriptJit::new();
        let name = compute_fragment_name(&uuid::Uuid::nil(), 9);
        let module = ObjectModule::new(name, "not a lowered program");
        assert!(matches!(
            jit.add_module(module),
            Err(LinkError::ForeignModule(_))
        ));
    }
}
