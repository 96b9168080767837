use std::fmt;

use log::debug;

use crate::ast;

/// Source of unique temporaries for one compiled unit. Created once per
/// unit, threaded by exclusive reference through every normalization
/// call, and never reset while the unit is alive. Independent units use
/// independent counters, so units may be compiled in parallel.
#[derive(Debug, Default)]
pub struct Counter {
    next: u64,
}

impl Counter {
    pub fn new() -> Counter {
        Counter::default()
    }

    fn fresh(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of temporaries handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next
    }
}

/// A top-level form after normalization.
#[derive(Debug, PartialEq)]
pub enum Form {
    Require { module: ast::ModuleRef },
    Def { name: String, value: Anf },
    Expr(Anf),
}

/// An atom needs no further evaluation step to reference.
#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    Int(i64),
    Float(f64),
    Char(u8),
    Str(String),
    Bool(bool),
    Ident(String),
    Temp(u64),
}

/// A tree in A-normal form: operands of an application, the test of a
/// conditional, and every `Let` value are atoms. The value slot alone
/// may also hold a single-level complex expression.
#[derive(Debug, PartialEq)]
pub enum Anf {
    Atom(Atom),
    Let {
        name: Binding,
        value: Box<Anf>,
        body: Box<Anf>,
    },
    If {
        cond: Atom,
        then: Box<Anf>,
        els: Option<Box<Anf>>,
    },
    Fn {
        params: Vec<String>,
        body: Box<Anf>,
    },
    Apply {
        callee: Atom,
        args: Vec<Atom>,
    },
    /// A statement-context sequence: the statements' values are
    /// discarded, the tail's value is the sequence's value.
    Block {
        stmts: Vec<Anf>,
        tail: Box<Anf>,
    },
}

/// What a `Let` binds: a source identifier or a synthesized temporary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Name(String),
    Temp(u64),
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Name(name) => f.write_str(name),
            Binding::Temp(id) => write!(f, "$:{id}"),
        }
    }
}

/// Normalizes a whole unit. Every form shares the one counter, so
/// temporary numbers keep increasing across forms.
pub fn normalize_program(program: ast::Program, temps: &mut Counter) -> Vec<Form> {
    let forms: Vec<_> = program
        .forms
        .into_iter()
        .map(|form| normalize_form(form, temps))
        .collect();
    debug!(
        "normalized {} forms, {} temporaries",
        forms.len(),
        temps.allocated()
    );
    forms
}

fn normalize_form(form: ast::Form, temps: &mut Counter) -> Form {
    match form {
        ast::Form::Require { module } => Form::Require { module },
        ast::Form::Def(def) => Form::Def {
            name: def.name,
            value: normalize_def_value(def.params, def.body, temps),
        },
        ast::Form::Expr(expr) => Form::Expr(normalize(vec![expr], temps)),
    }
}

/// A function definition's body is a tail-context sequence; a value
/// definition's single expression is a statement-context tree, since
/// its result is named by the definition itself.
fn normalize_def_value(
    params: Option<Vec<ast::Param>>,
    body: Vec<ast::Expr>,
    temps: &mut Counter,
) -> Anf {
    match params {
        Some(params) => {
            let mut n = Normalizer { temps };
            let body = Box::new(n.tail(body));
            Anf::Fn {
                params: params.into_iter().map(|p| p.name).collect(),
                body,
            }
        }
        None => normalize(body, temps),
    }
}

/// Normalizes a statement-context expression sequence: a single
/// expression stays unbound, several become a [`Anf::Block`].
pub fn normalize(exprs: Vec<ast::Expr>, temps: &mut Counter) -> Anf {
    assert!(!exprs.is_empty(), "expression sequences are never empty");
    let mut n = Normalizer { temps };
    let mut nodes: Vec<Anf> = exprs.into_iter().map(|e| n.stmt(e)).collect();
    let tail = nodes.pop().unwrap();
    if nodes.is_empty() {
        tail
    } else {
        Anf::Block {
            stmts: nodes,
            tail: Box::new(tail),
        }
    }
}

struct Normalizer<'a> {
    temps: &'a mut Counter,
}

/// An operand binding hoisted out of an expression: the reserved
/// temporary and the single-level complex form it names. Bindings
/// accumulate outermost-first.
type Hoisted = Vec<(u64, Anf)>;

impl Normalizer<'_> {
    /// Statement context: the expression's own result is discarded, so
    /// only its non-atomic operands are hoisted into bindings.
    fn stmt(&mut self, expr: ast::Expr) -> Anf {
        let (lets, flat) = self.flatten(expr);
        wrap(lets, flat)
    }

    /// Tail context over a sequence: the result must be nameable, so
    /// every expression is bound to a reserved temporary, allocated
    /// *before* the expression's own operands are flattened, and the
    /// last temporary is the tail atom.
    fn tail(&mut self, exprs: Vec<ast::Expr>) -> Anf {
        let mut chain = Vec::with_capacity(exprs.len());
        let mut last = 0;
        for expr in exprs {
            let temp = self.temps.fresh();
            let (lets, flat) = self.flatten(expr);
            chain.push((lets, temp, flat));
            last = temp;
        }
        let mut result = Anf::Atom(Atom::Temp(last));
        for (lets, temp, flat) in chain.into_iter().rev() {
            result = Anf::Let {
                name: Binding::Temp(temp),
                value: Box::new(flat),
                body: Box::new(result),
            };
            result = wrap(lets, result);
        }
        result
    }

    /// Flattens one expression to an atom or a single-level complex
    /// form, returning the operand bindings hoisted out of it.
    fn flatten(&mut self, expr: ast::Expr) -> (Hoisted, Anf) {
        match expr {
            ast::Expr::Literal(lit) => (Vec::new(), Anf::Atom(atom(lit))),
            ast::Expr::Ident(name) => (Vec::new(), Anf::Atom(Atom::Ident(name))),
            ast::Expr::Group(inner) => self.flatten(*inner),
            ast::Expr::Apply { callee, args } => {
                let mut lets = Vec::new();
                let callee = self.atomize(*callee, &mut lets);
                let args = args
                    .into_iter()
                    .map(|arg| self.atomize(arg, &mut lets))
                    .collect();
                (lets, Anf::Apply { callee, args })
            }
            ast::Expr::Fn { params, body } => {
                let params = params.into_iter().map(|p| p.name).collect();
                let body = Box::new(self.tail(body));
                (Vec::new(), Anf::Fn { params, body })
            }
            // Both branches are normalized before the condition; a
            // complex condition's binding then wraps the whole
            // conditional, since it must be evaluated first even though
            // its temporary carries the highest number.
            ast::Expr::If { cond, then, els } => {
                let then = Box::new(self.tail(then));
                let els = els.map(|els| Box::new(self.tail(els)));
                let mut lets = Vec::new();
                let cond = self.atomize(*cond, &mut lets);
                (lets, Anf::If { cond, then, els })
            }
        }
    }

    /// Reduces a child expression to an atom. A complex child reserves
    /// the next temporary, then flattens; its own operands take higher
    /// numbers but their bindings nest outside its binding.
    fn atomize(&mut self, expr: ast::Expr, lets: &mut Hoisted) -> Atom {
        match expr {
            ast::Expr::Literal(lit) => atom(lit),
            ast::Expr::Ident(name) => Atom::Ident(name),
            ast::Expr::Group(inner) => self.atomize(*inner, lets),
            complex => {
                let temp = self.temps.fresh();
                let (inner, flat) = self.flatten(complex);
                lets.extend(inner);
                lets.push((temp, flat));
                Atom::Temp(temp)
            }
        }
    }
}

fn wrap(lets: Hoisted, body: Anf) -> Anf {
    lets.into_iter().rev().fold(body, |body, (temp, value)| Anf::Let {
        name: Binding::Temp(temp),
        value: Box::new(value),
        body: Box::new(body),
    })
}

fn atom(lit: ast::Lit) -> Atom {
    match lit {
        ast::Lit::Int(v) => Atom::Int(v),
        ast::Lit::Float(v) => Atom::Float(v),
        ast::Lit::Char(v) => Atom::Char(v),
        ast::Lit::Str(v) => Atom::Str(v),
        ast::Lit::Bool(v) => Atom::Bool(v),
    }
}
