//! Single-threaded interpreter for LLM-authored code-mode programs
//! (spec §4.8 Execute pipeline, §5 "the interpreter thread dispatches,
//! waits synchronously on a single-slot result channel").
//!
//! This is deliberately a restricted subset (spec §1 Non-goals: "providing
//! a general-purpose language interpreter"): straight-line statements
//! (assignment, `return`, `print`, `def`/call), dict/list/scalar literals,
//! attribute-call expressions dispatched as tool calls, and `.get(key,
//! default)` on dict-shaped values. No control flow, no arithmetic
//! operators beyond what a tool call result needs to be threaded through.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tokio::sync::oneshot;

/// A pending tool call raised by the interpreter thread, bridged to the
/// async executor via a bounded channel plus a one-shot reply (spec §5).
pub struct ToolJob {
    pub server: String,
    pub tool: String,
    pub kwargs: HashMap<String, Value>,
    pub reply: oneshot::Sender<Result<String, String>>,
}

#[derive(Debug, Clone)]
pub enum InterpreterError {
    Syntax(String),
    Runtime(String),
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterError::Syntax(m) => write!(f, "syntax error: {m}"),
            InterpreterError::Runtime(m) => write!(f, "runtime error: {m}"),
        }
    }
}

pub struct ExecutionOutcome {
    pub result: Option<Value>,
    pub logs: Vec<String>,
    pub error: Option<InterpreterError>,
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Symbol(char),
    Await,
    Def,
    Return,
    True,
    False,
    None_,
}

fn lex_line(line: &str) -> Result<Vec<Tok>, InterpreterError> {
    let mut toks = Vec::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break; // comment runs to end of line
        }
        if c.is_ascii_digit() {
            let start = i;
            let mut is_float = false;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                if chars[i] == '.' {
                    is_float = true;
                }
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            if is_float {
                toks.push(Tok::Float(text.parse().map_err(|_| InterpreterError::Syntax(format!("bad number '{text}'")))?));
            } else {
                toks.push(Tok::Int(text.parse().map_err(|_| InterpreterError::Syntax(format!("bad number '{text}'")))?));
            }
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let mut s = String::new();
            while i < chars.len() && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                    s.push(match chars[i] {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    s.push(chars[i]);
                }
                i += 1;
            }
            if i >= chars.len() {
                return Err(InterpreterError::Syntax("unterminated string literal".to_string()));
            }
            i += 1; // closing quote
            toks.push(Tok::Str(s));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            toks.push(match word.as_str() {
                "await" => Tok::Await,
                "def" => Tok::Def,
                "return" => Tok::Return,
                "True" => Tok::True,
                "False" => Tok::False,
                "None" => Tok::None_,
                _ => Tok::Ident(word),
            });
            continue;
        }
        if "():,.={}[]+".contains(c) {
            toks.push(Tok::Symbol(c));
            i += 1;
            continue;
        }
        return Err(InterpreterError::Syntax(format!("unexpected character '{c}'")));
    }
    Ok(toks)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None_,
    Var(String),
    Dict(Vec<(String, Expr)>),
    List(Vec<Expr>),
    Call { callee: Box<Expr>, kwargs: Vec<(String, Expr)>, positional: Vec<Expr> },
    Attr { base: Box<Expr>, name: String },
}

#[derive(Debug, Clone)]
enum Stmt {
    Assign(String, Expr),
    Return(Expr),
    Print(Expr),
    Expr(Expr),
    Def(String, Vec<String>, Vec<Stmt>),
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn new(toks: Vec<Tok>) -> Self {
        Self { toks, pos: 0 }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect_symbol(&mut self, c: char) -> Result<(), InterpreterError> {
        match self.next() {
            Some(Tok::Symbol(s)) if s == c => Ok(()),
            other => Err(InterpreterError::Syntax(format!("expected '{c}', found {other:?}"))),
        }
    }

    /// Parse one logical statement line (already lexed). `def`/`return`/
    /// `print`/assignment/bare-expression are distinguished by the first
    /// token(s).
    fn parse_stmt(&mut self) -> Result<Stmt, InterpreterError> {
        match self.peek() {
            Some(Tok::Return) => {
                self.next();
                let e = self.parse_expr()?;
                Ok(Stmt::Return(e))
            }
            Some(Tok::Ident(name)) if name == "print" => {
                self.next();
                self.expect_symbol('(')?;
                let e = self.parse_expr()?;
                self.expect_symbol(')')?;
                Ok(Stmt::Print(e))
            }
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                // lookahead for "name = expr"
                if matches!(self.toks.get(self.pos + 1), Some(Tok::Symbol('='))) {
                    self.pos += 2;
                    let e = self.parse_expr()?;
                    Ok(Stmt::Assign(name, e))
                } else {
                    let e = self.parse_expr()?;
                    Ok(Stmt::Expr(e))
                }
            }
            other => Err(InterpreterError::Syntax(format!("unexpected statement start: {other:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, InterpreterError> {
        let mut left = self.parse_postfix()?;
        while matches!(self.peek(), Some(Tok::Symbol('+'))) {
            self.next();
            let right = self.parse_postfix()?;
            left = Expr::Call {
                callee: Box::new(Expr::Var("__add__".to_string())),
                kwargs: vec![],
                positional: vec![left, right],
            };
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> Result<Expr, InterpreterError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Tok::Symbol('.')) => {
                    self.next();
                    let name = match self.next() {
                        Some(Tok::Ident(n)) => n,
                        other => return Err(InterpreterError::Syntax(format!("expected identifier after '.', found {other:?}"))),
                    };
                    expr = Expr::Attr { base: Box::new(expr), name };
                }
                Some(Tok::Symbol('(')) => {
                    self.next();
                    let (positional, kwargs) = self.parse_args()?;
                    expr = Expr::Call { callee: Box::new(expr), kwargs, positional };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), InterpreterError> {
        let mut positional = Vec::new();
        let mut kwargs = Vec::new();
        if matches!(self.peek(), Some(Tok::Symbol(')'))) {
            self.next();
            return Ok((positional, kwargs));
        }
        loop {
            if let Some(Tok::Ident(name)) = self.peek().cloned() {
                if matches!(self.toks.get(self.pos + 1), Some(Tok::Symbol('='))) {
                    self.pos += 2;
                    let value = self.parse_expr()?;
                    kwargs.push((name, value));
                } else {
                    positional.push(self.parse_expr()?);
                }
            } else {
                positional.push(self.parse_expr()?);
            }
            match self.next() {
                Some(Tok::Symbol(',')) => continue,
                Some(Tok::Symbol(')')) => break,
                other => return Err(InterpreterError::Syntax(format!("expected ',' or ')', found {other:?}"))),
            }
        }
        Ok((positional, kwargs))
    }

    fn parse_primary(&mut self) -> Result<Expr, InterpreterError> {
        match self.next() {
            Some(Tok::Int(n)) => Ok(Expr::Int(n)),
            Some(Tok::Float(n)) => Ok(Expr::Float(n)),
            Some(Tok::Str(s)) => Ok(Expr::Str(s)),
            Some(Tok::True) => Ok(Expr::Bool(true)),
            Some(Tok::False) => Ok(Expr::Bool(false)),
            Some(Tok::None_) => Ok(Expr::None_),
            Some(Tok::Await) => self.parse_primary(),
            Some(Tok::Ident(name)) => Ok(Expr::Var(name)),
            Some(Tok::Symbol('(')) => {
                let e = self.parse_expr()?;
                self.expect_symbol(')')?;
                Ok(e)
            }
            Some(Tok::Symbol('{')) => {
                let mut entries = Vec::new();
                if matches!(self.peek(), Some(Tok::Symbol('}'))) {
                    self.next();
                    return Ok(Expr::Dict(entries));
                }
                loop {
                    let key = match self.next() {
                        Some(Tok::Str(s)) => s,
                        Some(Tok::Ident(s)) => s,
                        other => return Err(InterpreterError::Syntax(format!("expected dict key, found {other:?}"))),
                    };
                    self.expect_symbol(':')?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    match self.next() {
                        Some(Tok::Symbol(',')) => continue,
                        Some(Tok::Symbol('}')) => break,
                        other => return Err(InterpreterError::Syntax(format!("expected ',' or '}}', found {other:?}"))),
                    }
                }
                Ok(Expr::Dict(entries))
            }
            Some(Tok::Symbol('[')) => {
                let mut items = Vec::new();
                if matches!(self.peek(), Some(Tok::Symbol(']'))) {
                    self.next();
                    return Ok(Expr::List(items));
                }
                loop {
                    items.push(self.parse_expr()?);
                    match self.next() {
                        Some(Tok::Symbol(',')) => continue,
                        Some(Tok::Symbol(']')) => break,
                        other => return Err(InterpreterError::Syntax(format!("expected ',' or ']', found {other:?}"))),
                    }
                }
                Ok(Expr::List(items))
            }
            other => Err(InterpreterError::Syntax(format!("unexpected token: {other:?}"))),
        }
    }
}

/// Parse the (already newline-normalized) program into a flat list of
/// top-level statements, lifting indented `def name(...):` blocks into
/// [`Stmt::Def`] nodes.
fn parse_program(code: &str) -> Result<Vec<Stmt>, InterpreterError> {
    let lines: Vec<&str> = code.lines().collect();
    parse_block(&lines, 0, 0).map(|(stmts, _)| stmts)
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

/// Parse statements starting at `start` whose indentation is exactly
/// `indent`, stopping at the first shallower (or blank-then-shallower)
/// line. Returns the statements and the index just past the block.
fn parse_block(lines: &[&str], start: usize, indent: usize) -> Result<(Vec<Stmt>, usize), InterpreterError> {
    let mut stmts = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let raw = lines[i];
        if raw.trim().is_empty() {
            i += 1;
            continue;
        }
        let this_indent = indent_of(raw);
        if this_indent < indent {
            break;
        }
        if this_indent > indent {
            return Err(InterpreterError::Syntax(format!("unexpected indent at line {}", i + 1)));
        }

        let trimmed = raw.trim_end();
        let body = trimmed.trim_start();

        if let Some(rest) = body.strip_prefix("def ") {
            let (name, params, header_ends_colon) = parse_def_header(rest)?;
            if !header_ends_colon {
                return Err(InterpreterError::Syntax(format!("'def' header missing ':' at line {}", i + 1)));
            }
            let (inner, next) = parse_block(lines, i + 1, indent + 4.min(indent_of_first_body_line(lines, i + 1).unwrap_or(indent + 4)))?;
            stmts.push(Stmt::Def(name, params, inner));
            i = next;
            continue;
        }

        let toks = lex_line(body)?;
        if toks.is_empty() {
            i += 1;
            continue;
        }
        let mut parser = Parser::new(toks);
        let stmt = parser.parse_stmt()?;
        stmts.push(stmt);
        i += 1;
    }
    Ok((stmts, i))
}

fn indent_of_first_body_line(lines: &[&str], from: usize) -> Option<usize> {
    lines[from..].iter().find(|l| !l.trim().is_empty()).map(|l| indent_of(l))
}

fn parse_def_header(rest: &str) -> Result<(String, Vec<String>, bool), InterpreterError> {
    let open = rest.find('(').ok_or_else(|| InterpreterError::Syntax("def missing '('".to_string()))?;
    let name = rest[..open].trim().to_string();
    let close = rest.find(')').ok_or_else(|| InterpreterError::Syntax("def missing ')'".to_string()))?;
    let params_str = &rest[open + 1..close];
    let params: Vec<String> = params_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let tail = rest[close + 1..].trim();
    Ok((name, params, tail.starts_with(':')))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum RtValue {
    Json(Value),
    Func(Vec<String>, Vec<Stmt>),
}

impl RtValue {
    fn into_json(self) -> Value {
        match self {
            RtValue::Json(v) => v,
            RtValue::Func(..) => Value::Null,
        }
    }
}

enum Flow {
    Normal,
    Returned(Value),
}

struct Env<'a> {
    vars: HashMap<String, RtValue>,
    logs: Vec<String>,
    client_names: &'a [String],
    job_tx: &'a std::sync::mpsc::SyncSender<ToolJob>,
}

impl<'a> Env<'a> {
    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, InterpreterError> {
        for stmt in stmts {
            match stmt {
                Stmt::Def(name, params, body) => {
                    self.vars.insert(name.clone(), RtValue::Func(params.clone(), body.clone()));
                }
                Stmt::Assign(name, expr) => {
                    let v = self.eval(expr)?;
                    self.vars.insert(name.clone(), v);
                }
                Stmt::Return(expr) => {
                    let v = self.eval(expr)?.into_json();
                    return Ok(Flow::Returned(v));
                }
                Stmt::Print(expr) => {
                    let v = self.eval(expr)?.into_json();
                    self.logs.push(render_for_print(&v));
                }
                Stmt::Expr(expr) => {
                    self.eval(expr)?;
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn eval(&mut self, expr: &Expr) -> Result<RtValue, InterpreterError> {
        match expr {
            Expr::Int(n) => Ok(RtValue::Json(Value::from(*n))),
            Expr::Float(n) => Ok(RtValue::Json(Value::from(*n))),
            Expr::Str(s) => Ok(RtValue::Json(Value::String(s.clone()))),
            Expr::Bool(b) => Ok(RtValue::Json(Value::Bool(*b))),
            Expr::None_ => Ok(RtValue::Json(Value::Null)),
            Expr::Var(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| InterpreterError::Runtime(not_defined_hint(name, self.client_names))),
            Expr::Dict(entries) => {
                let mut map = serde_json::Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), self.eval(v)?.into_json());
                }
                Ok(RtValue::Json(Value::Object(map)))
            }
            Expr::List(items) => {
                let mut values = Vec::new();
                for item in items {
                    values.push(self.eval(item)?.into_json());
                }
                Ok(RtValue::Json(Value::Array(values)))
            }
            Expr::Attr { base, name } => {
                // `server.tool` resolves to a callable marker; the actual
                // dispatch happens in Expr::Call so we can see the kwargs.
                if let Expr::Var(server) = base.as_ref() {
                    if self.client_names.iter().any(|c| c == server) {
                        return Ok(RtValue::Json(Value::String(format!("__tool__:{server}:{name}"))));
                    }
                }
                let base_val = self.eval(base)?.into_json();
                match (base_val, name.as_str()) {
                    (Value::Object(map), "get") => {
                        // bind as a marker; Call handles it with args
                        Ok(RtValue::Json(Value::String(format!(
                            "__dictget__:{}",
                            serde_json::to_string(&Value::Object(map)).unwrap_or_default()
                        ))))
                    }
                    _ => Err(InterpreterError::Runtime(format!(
                        "attribute error: '{name}' is not callable on this value; use dict access like value.get(\"key\", default)"
                    ))),
                }
            }
            Expr::Call { callee, kwargs, positional } => self.eval_call(callee, kwargs, positional),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        kwargs: &[(String, Expr)],
        positional: &[Expr],
    ) -> Result<RtValue, InterpreterError> {
        if let Expr::Var(name) = callee {
            if name == "__add__" {
                let a = self.eval(&positional[0])?.into_json();
                let b = self.eval(&positional[1])?.into_json();
                return Ok(RtValue::Json(add_values(&a, &b)));
            }
        }

        if let Expr::Attr { base, name } = callee {
            if let Expr::Var(server) = base.as_ref() {
                if self.client_names.iter().any(|c| c == server) {
                    let mut map = HashMap::new();
                    for (k, v) in kwargs {
                        map.insert(k.clone(), self.eval(v)?.into_json());
                    }
                    let text = self.dispatch_tool_call(server.clone(), name.clone(), map)?;
                    let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
                    return Ok(RtValue::Json(parsed));
                }
            }
            // `.get(key, default)` on a dict value.
            if name == "get" {
                let base_val = self.eval(base)?.into_json();
                if let Value::Object(map) = base_val {
                    let key = match positional.first() {
                        Some(e) => self.eval(e)?.into_json(),
                        None => return Err(InterpreterError::Runtime("get() requires a key argument".to_string())),
                    };
                    let key_str = key.as_str().map(str::to_string).unwrap_or_else(|| key.to_string());
                    let default = match positional.get(1) {
                        Some(e) => self.eval(e)?.into_json(),
                        None => Value::Null,
                    };
                    return Ok(RtValue::Json(map.get(&key_str).cloned().unwrap_or(default)));
                }
                return Err(InterpreterError::Runtime(
                    "attribute error: .get(key, default) requires a dict-shaped value".to_string(),
                ));
            }
        }

        if let Expr::Var(name) = callee {
            let func = self.vars.get(name).cloned();
            match func {
                Some(RtValue::Func(params, body)) => {
                    let mut local = Env {
                        vars: self.vars.clone(),
                        logs: Vec::new(),
                        client_names: self.client_names,
                        job_tx: self.job_tx,
                    };
                    for (i, param) in params.iter().enumerate() {
                        if let Some(arg) = positional.get(i) {
                            let v = self.eval(arg)?;
                            local.vars.insert(param.clone(), v);
                        }
                    }
                    for (k, v) in kwargs {
                        let value = self.eval(v)?;
                        local.vars.insert(k.clone(), value);
                    }
                    let flow = local.exec_block(&body)?;
                    self.logs.extend(local.logs);
                    match flow {
                        Flow::Returned(v) => Ok(RtValue::Json(v)),
                        Flow::Normal => Ok(RtValue::Json(Value::Null)),
                    }
                }
                Some(RtValue::Json(_)) => Err(InterpreterError::Runtime(format!("'{name}' is not callable"))),
                None => Err(InterpreterError::Runtime(not_defined_hint(name, self.client_names))),
            }
        } else {
            Err(InterpreterError::Runtime("expression is not callable".to_string()))
        }
    }

    fn dispatch_tool_call(&self, server: String, tool: String, kwargs: HashMap<String, Value>) -> Result<String, InterpreterError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = ToolJob { server: server.clone(), tool: tool.clone(), kwargs, reply: reply_tx };
        self.job_tx
            .send(job)
            .map_err(|_| InterpreterError::Runtime(format!("tool bridge closed while calling {server}.{tool}")))?;
        futures::executor::block_on(reply_rx)
            .map_err(|_| InterpreterError::Runtime(format!("no reply received for {server}.{tool}")))?
            .map_err(InterpreterError::Runtime)
    }
}

fn add_values(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Value::String(format!("{x}{y}")),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                Value::from(xi + yi)
            } else {
                Value::from(x.as_f64().unwrap_or(0.0) + y.as_f64().unwrap_or(0.0))
            }
        }
        _ => Value::Null,
    }
}

fn render_for_print(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn not_defined_hint(name: &str, client_names: &[String]) -> String {
    let example = client_names
        .first()
        .map(|c| format!(" e.g. {c}.<tool>(arg=value)"))
        .unwrap_or_default();
    format!(
        "'{name}' is not defined. Available servers: {}.{example}",
        client_names.join(", ")
    )
}

/// Run one `executeToolCode` program to completion (spec §4.8 Execute
/// pipeline steps 3-7). Must be called from a blocking context (e.g.
/// `tokio::task::spawn_blocking`) since tool dispatch blocks synchronously
/// on the reply channel.
pub fn run(
    code: &str,
    client_names: &[String],
    job_tx: std::sync::mpsc::SyncSender<ToolJob>,
) -> ExecutionOutcome {
    let program = match parse_program(code) {
        Ok(p) => p,
        Err(e) => {
            return ExecutionOutcome {
                result: None,
                logs: Vec::new(),
                error: Some(e),
            }
        }
    };

    let mut env = Env {
        vars: HashMap::new(),
        logs: Vec::new(),
        client_names,
        job_tx: &job_tx,
    };

    let outcome = env.exec_block(&program);
    match outcome {
        Ok(Flow::Returned(v)) => ExecutionOutcome { result: Some(v), logs: env.logs, error: None },
        Ok(Flow::Normal) => {
            let result = env.vars.remove("result").map(RtValue::into_json);
            ExecutionOutcome { result, logs: env.logs, error: None }
        }
        Err(e) => ExecutionOutcome { result: None, logs: env.logs, error: Some(e) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn run_with_bridge<F>(code: &str, client_names: &[String], handler: F) -> ExecutionOutcome
    where
        F: Fn(String, String, HashMap<String, Value>) -> Result<String, String> + Send + 'static,
    {
        let (tx, rx) = std::sync::mpsc::sync_channel::<ToolJob>(1);
        let bridge = thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                let result = handler(job.server, job.tool, job.kwargs);
                let _ = job.reply.send(result);
            }
        });
        let code = code.to_string();
        let names = client_names.to_vec();
        let outcome = thread::spawn(move || run(&code, &names, tx)).join().unwrap();
        drop(bridge);
        outcome
    }

    #[test]
    fn simple_tool_call_through_main_function() {
        let outcome = run_with_bridge(
            "def main():\n  return calc.add(x=1, y=2)\nresult = main()",
            &["calc".to_string()],
            |_s, _t, kwargs| {
                let x = kwargs["x"].as_i64().unwrap_or(0);
                let y = kwargs["y"].as_i64().unwrap_or(0);
                Ok((x + y).to_string())
            },
        );
        assert!(outcome.error.is_none());
        assert_eq!(outcome.result, Some(Value::from(3)));
    }

    #[test]
    fn print_is_captured_in_logs() {
        let outcome = run_with_bridge("print(\"hello\")\nresult = 1", &[], |_, _, _| Ok(String::new()));
        assert_eq!(outcome.logs, vec!["hello".to_string()]);
        assert_eq!(outcome.result, Some(Value::from(1)));
    }

    #[test]
    fn undefined_name_produces_runtime_error_with_hint() {
        let outcome = run_with_bridge("result = unknown_thing", &["calc".to_string()], |_, _, _| Ok(String::new()));
        let err = outcome.error.expect("expected error");
        assert!(matches!(err, InterpreterError::Runtime(_)));
        assert!(err.to_string().contains("calc"));
    }

    #[test]
    fn dict_get_with_default() {
        let outcome = run_with_bridge(
            "d = {\"a\": 1}\nresult = d.get(\"b\", 42)",
            &[],
            |_, _, _| Ok(String::new()),
        );
        assert_eq!(outcome.result, Some(Value::from(42)));
    }

    #[test]
    fn syntax_error_is_classified() {
        let outcome = run_with_bridge("def main(:\n  return 1", &[], |_, _, _| Ok(String::new()));
        assert!(matches!(outcome.error, Some(InterpreterError::Syntax(_))));
    }
}
