use std::fmt::{self, Write};

use log::debug;

use crate::anf::{Anf, Atom, Binding, Form};

type Result<T> = std::result::Result<T, Error>;

const INDENT: &str = "    ";

/// Lowers a normalized unit to C source against the boxed-value runtime
/// header.
pub fn generate(program: &[Form]) -> Result<String> {
    Generator::new().generate(program)
}

/// Accumulates the hoisted function definitions while the tree is
/// walked; the final source is assembled section by section so that
/// globals and prototypes precede every use.
struct Generator {
    functions: Vec<Function>,
    next_anon: u32,
}

struct Function {
    proto: String,
    text: String,
}

impl Generator {
    fn new() -> Generator {
        Generator {
            functions: Vec::new(),
            next_anon: 0,
        }
    }

    fn generate(mut self, program: &[Form]) -> Result<String> {
        // The toplevel routine is built first: walking it hoists every
        // named and anonymous function in first-encountered order.
        let mut top = String::new();
        for form in program {
            match form {
                Form::Require { module } => {
                    let name = module.as_str();
                    line(&mut top, 1, format_args!("extern void {name}_toplevel(void);"));
                    line(&mut top, 1, format_args!("{name}_toplevel();"));
                }
                Form::Def { name, value } => match value {
                    // A definition whose value is a function literal
                    // becomes a named function; the global keeps the
                    // source name and holds the function value.
                    Anf::Fn { params, body } => {
                        let fname = format!("{name}_fn");
                        self.function(&fname, params, body)?;
                        line(&mut top, 1, format_args!("{name} = __func(&{fname});"));
                    }
                    value => self.assign(&mut top, 1, name, value)?,
                },
                Form::Expr(node) => self.statement(&mut top, 1, node)?,
            }
        }
        debug!("emitted {} functions", self.functions.len());

        let mut code = String::with_capacity(4 * 1024);
        code.push_str("#include <tern.h>\n\n");
        let defs = program.iter().filter_map(|form| match form {
            Form::Def { name, .. } => Some(name),
            _ => None,
        });
        let mut any = false;
        for name in defs {
            any = true;
            line(&mut code, 0, format_args!("_Value {name};"));
        }
        if any {
            code.push('\n');
        }
        for function in &self.functions {
            line(&mut code, 0, format_args!("{};", function.proto));
        }
        if !self.functions.is_empty() {
            code.push('\n');
        }
        for function in &self.functions {
            code.push_str(&function.text);
            code.push('\n');
        }
        code.push_str("void toplevel(void) {\n");
        code.push_str(&top);
        code.push_str("}\n\n");
        code.push_str(
            "int main(int argc, char** argv) {\n\
             \x20   (void)argc;\n\
             \x20   (void)argv;\n\
             \x20   toplevel();\n\
             \x20   return 0;\n\
             }\n",
        );
        Ok(code)
    }

    /// Emits one function, reserving its slot up front so that nested
    /// literals discovered while generating the body number after it.
    fn function(&mut self, name: &str, params: &[String], body: &Anf) -> Result<()> {
        let mut proto = format!("static _Value {name}(");
        if params.is_empty() {
            proto.push_str("void");
        } else {
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    proto.push_str(", ");
                }
                write!(proto, "_Value {param}").expect("write to string");
            }
        }
        proto.push(')');

        let index = self.functions.len();
        self.functions.push(Function {
            proto: proto.clone(),
            text: String::new(),
        });
        let mut text = format!("{proto} {{\n");
        self.tail(&mut text, 1, body)?;
        text.push_str("}\n");
        self.functions[index].text = text;
        Ok(())
    }

    fn anon(&mut self) -> String {
        let name = format!("fn{}", self.next_anon);
        self.next_anon += 1;
        name
    }

    /// Function-body position: the node's value is returned.
    fn tail(&mut self, out: &mut String, depth: usize, node: &Anf) -> Result<()> {
        match node {
            Anf::Atom(a) => line(out, depth, format_args!("return {};", atom(a))),
            Anf::Apply { callee, args } => {
                line(out, depth, format_args!("return {};", call(callee, args)));
            }
            Anf::Let { name, value, body } => {
                self.binding(out, depth, name, value)?;
                self.tail(out, depth, body)?;
            }
            Anf::If { cond, then, els } => {
                line(out, depth, format_args!("if (__untag({})) {{", atom(cond)));
                self.tail(out, depth + 1, then)?;
                line(out, depth, format_args!("}} else {{"));
                match els {
                    Some(els) => self.tail(out, depth + 1, els)?,
                    None => line(out, depth + 1, format_args!("return __nil;")),
                }
                line(out, depth, format_args!("}}"));
            }
            Anf::Fn { params, body } => {
                let name = self.anon();
                self.function(&name, params, body)?;
                line(out, depth, format_args!("return __func(&{name});"));
            }
            Anf::Block { stmts, tail } => {
                for stmt in stmts {
                    self.statement(out, depth, stmt)?;
                }
                self.tail(out, depth, tail)?;
            }
        }
        Ok(())
    }

    /// Assignment position: the node's value lands in `dest`.
    fn assign(&mut self, out: &mut String, depth: usize, dest: &str, node: &Anf) -> Result<()> {
        match node {
            Anf::Atom(a) => line(out, depth, format_args!("{dest} = {};", atom(a))),
            Anf::Apply { callee, args } => {
                line(out, depth, format_args!("{dest} = {};", call(callee, args)));
            }
            Anf::Let { name, value, body } => {
                self.binding(out, depth, name, value)?;
                self.assign(out, depth, dest, body)?;
            }
            Anf::If { cond, then, els } => {
                line(out, depth, format_args!("if (__untag({})) {{", atom(cond)));
                self.assign(out, depth + 1, dest, then)?;
                line(out, depth, format_args!("}} else {{"));
                match els {
                    Some(els) => self.assign(out, depth + 1, dest, els)?,
                    None => line(out, depth + 1, format_args!("{dest} = __nil;")),
                }
                line(out, depth, format_args!("}}"));
            }
            Anf::Fn { params, body } => {
                let name = self.anon();
                self.function(&name, params, body)?;
                line(out, depth, format_args!("{dest} = __func(&{name});"));
            }
            Anf::Block { stmts, tail } => {
                for stmt in stmts {
                    self.statement(out, depth, stmt)?;
                }
                self.assign(out, depth, dest, tail)?;
            }
        }
        Ok(())
    }

    /// Statement position: the node's value is discarded.
    fn statement(&mut self, out: &mut String, depth: usize, node: &Anf) -> Result<()> {
        match node {
            Anf::Atom(a) => line(out, depth, format_args!("(void)({});", atom(a))),
            Anf::Apply { callee, args } => {
                line(out, depth, format_args!("(void)({});", call(callee, args)));
            }
            Anf::Let { name, value, body } => {
                self.binding(out, depth, name, value)?;
                self.statement(out, depth, body)?;
            }
            Anf::If { cond, then, els } => {
                line(out, depth, format_args!("if (__untag({})) {{", atom(cond)));
                self.statement(out, depth + 1, then)?;
                if let Some(els) = els {
                    line(out, depth, format_args!("}} else {{"));
                    self.statement(out, depth + 1, els)?;
                }
                line(out, depth, format_args!("}}"));
            }
            Anf::Fn { params, body } => {
                let name = self.anon();
                self.function(&name, params, body)?;
                line(out, depth, format_args!("(void)(__func(&{name}));"));
            }
            Anf::Block { stmts, tail } => {
                for stmt in stmts {
                    self.statement(out, depth, stmt)?;
                }
                self.statement(out, depth, tail)?;
            }
        }
        Ok(())
    }

    /// `_Value <name> = <value>;`. The value slot of a `Let` holds an
    /// atom or a single-level complex expression; anything else is a
    /// tree the normalizer never produces.
    fn binding(&mut self, out: &mut String, depth: usize, name: &Binding, value: &Anf) -> Result<()> {
        let dest = c_name(name);
        match value {
            Anf::Atom(a) => line(out, depth, format_args!("_Value {dest} = {};", atom(a))),
            Anf::Apply { callee, args } => {
                line(out, depth, format_args!("_Value {dest} = {};", call(callee, args)));
            }
            Anf::If { .. } => {
                line(out, depth, format_args!("_Value {dest};"));
                self.assign(out, depth, &dest, value)?;
            }
            Anf::Fn { params, body } => {
                let fname = self.anon();
                self.function(&fname, params, body)?;
                line(out, depth, format_args!("_Value {dest} = __func(&{fname});"));
            }
            Anf::Let { .. } => return Err(Error::Unsupported { shape: "nested let binding" }),
            Anf::Block { .. } => return Err(Error::Unsupported { shape: "block binding" }),
        }
        Ok(())
    }
}

fn c_name(binding: &Binding) -> String {
    match binding {
        Binding::Name(name) => name.clone(),
        Binding::Temp(id) => format!("_t{id}"),
    }
}

fn call(callee: &Atom, args: &[Atom]) -> String {
    let callee = atom(callee);
    if args.is_empty() {
        return format!("__call0({callee})");
    }
    let mut out = format!("__calln({callee}, {}", args.len());
    for arg in args {
        out.push_str(", ");
        out.push_str(&atom(arg));
    }
    out.push(')');
    out
}

/// The boxing call (or plain name) for an atom.
fn atom(atom: &Atom) -> String {
    match atom {
        Atom::Int(v) => format!("__int({v})"),
        Atom::Float(v) => format!("__float({v:.6})"),
        Atom::Char(b) => format!("__char('{}')", c_char(*b)),
        Atom::Str(s) => format!("__string(\"{}\")", c_string(s)),
        Atom::Bool(v) => format!("__bool({v})"),
        Atom::Ident(name) => name.clone(),
        Atom::Temp(id) => format!("_t{id}"),
    }
}

fn c_char(byte: u8) -> String {
    match byte {
        b'\n' => "\\n".to_string(),
        b'\r' => "\\r".to_string(),
        b'\t' => "\\t".to_string(),
        b'\x0b' => "\\v".to_string(),
        b'\\' => "\\\\".to_string(),
        b'\'' => "\\'".to_string(),
        _ => char::from(byte).to_string(),
    }
}

fn c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

fn line(out: &mut String, depth: usize, args: fmt::Arguments<'_>) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.write_fmt(args).expect("write to string");
    out.push('\n');
}

/// An ANF shape the lowering has no rule for. A correctly normalized
/// tree never produces one, so this marks an internal pipeline
/// inconsistency rather than a user-input problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Unsupported { shape: &'static str },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Error::Unsupported { shape } = self;
        write!(f, "unsupported ANF shape: {shape}")
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{anf, lexer, parser};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn gen(src: &str) -> String {
        let program = parser::parse(lexer::lex(src).expect("lex error")).expect("parse error");
        let mut temps = anf::Counter::new();
        let forms = anf::normalize_program(program, &mut temps);
        generate(&forms).expect("codegen error")
    }

    #[test]
    fn test_value_definitions_and_literals() {
        assert_eq!(
            gen(indoc! {r#"
                def a 123;
                def b -123;
                def d 321.0;
                def g 0b101;
                def l \space;
                def m \tab;
                def q \c;
                def r "";
                def s "
                ";
                def t true;
                def u false;
                def v l;
            "#}),
            indoc! {r#"
                #include <tern.h>

                _Value a;
                _Value b;
                _Value d;
                _Value g;
                _Value l;
                _Value m;
                _Value q;
                _Value r;
                _Value s;
                _Value t;
                _Value u;
                _Value v;

                void toplevel(void) {
                    a = __int(123);
                    b = __int(-123);
                    d = __float(321.000000);
                    g = __int(5);
                    l = __char(' ');
                    m = __char('\t');
                    q = __char('c');
                    r = __string("");
                    s = __string("\n");
                    t = __bool(true);
                    u = __bool(false);
                    v = l;
                }

                int main(int argc, char** argv) {
                    (void)argc;
                    (void)argv;
                    toplevel();
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn test_function_definitions_and_dispatch() {
        assert_eq!(
            gen(indoc! {"
                def w() 0;
                def x(a) 1;
                w()
                x(1)
                x(w())
            "}),
            indoc! {"
                #include <tern.h>

                _Value w;
                _Value x;

                static _Value w_fn(void);
                static _Value x_fn(_Value a);

                static _Value w_fn(void) {
                    _Value _t0 = __int(0);
                    return _t0;
                }

                static _Value x_fn(_Value a) {
                    _Value _t1 = __int(1);
                    return _t1;
                }

                void toplevel(void) {
                    w = __func(&w_fn);
                    x = __func(&x_fn);
                    (void)(__call0(w));
                    (void)(__calln(x, 1, __int(1)));
                    _Value _t2 = __call0(w);
                    (void)(__calln(x, 1, _t2));
                }

                int main(int argc, char** argv) {
                    (void)argc;
                    (void)argv;
                    toplevel();
                    return 0;
                }
            "}
        );
    }

    #[test]
    fn test_require_emits_extern_call() {
        assert_eq!(
            gen("require foo;"),
            indoc! {"
                #include <tern.h>

                void toplevel(void) {
                    extern void foo_toplevel(void);
                    foo_toplevel();
                }

                int main(int argc, char** argv) {
                    (void)argc;
                    (void)argv;
                    toplevel();
                    return 0;
                }
            "}
        );
    }

    #[test]
    fn test_function_literal_definition_takes_the_named_form() {
        assert_eq!(
            gen("def z fn(a,b,c) 3;;"),
            indoc! {"
                #include <tern.h>

                _Value z;

                static _Value z_fn(_Value a, _Value b, _Value c);

                static _Value z_fn(_Value a, _Value b, _Value c) {
                    _Value _t0 = __int(3);
                    return _t0;
                }

                void toplevel(void) {
                    z = __func(&z_fn);
                }

                int main(int argc, char** argv) {
                    (void)argc;
                    (void)argv;
                    toplevel();
                    return 0;
                }
            "}
        );
    }

    #[test]
    fn test_function_argument_is_hoisted_as_anonymous() {
        assert_eq!(
            gen("foo(fn() 1;)"),
            indoc! {"
                #include <tern.h>

                static _Value fn0(void);

                static _Value fn0(void) {
                    _Value _t1 = __int(1);
                    return _t1;
                }

                void toplevel(void) {
                    _Value _t0 = __func(&fn0);
                    (void)(__calln(foo, 1, _t0));
                }

                int main(int argc, char** argv) {
                    (void)argc;
                    (void)argv;
                    toplevel();
                    return 0;
                }
            "}
        );
    }

    #[test]
    fn test_conditional_definition_assigns_both_arms() {
        assert_eq!(
            gen("def m if c 1 else 2 end;"),
            indoc! {"
                #include <tern.h>

                _Value m;

                void toplevel(void) {
                    if (__untag(c)) {
                        _Value _t0 = __int(1);
                        m = _t0;
                    } else {
                        _Value _t1 = __int(2);
                        m = _t1;
                    }
                }

                int main(int argc, char** argv) {
                    (void)argc;
                    (void)argv;
                    toplevel();
                    return 0;
                }
            "}
        );
    }

    #[test]
    fn test_missing_else_yields_nil() {
        assert_eq!(
            gen("def m if c 1 end;"),
            indoc! {"
                #include <tern.h>

                _Value m;

                void toplevel(void) {
                    if (__untag(c)) {
                        _Value _t0 = __int(1);
                        m = _t0;
                    } else {
                        m = __nil;
                    }
                }

                int main(int argc, char** argv) {
                    (void)argc;
                    (void)argv;
                    toplevel();
                    return 0;
                }
            "}
        );
    }

    #[test]
    fn test_named_let_binding() {
        let mut out = String::new();
        Generator::new()
            .binding(
                &mut out,
                0,
                &Binding::Name("answer".to_string()),
                &Anf::Atom(Atom::Int(42)),
            )
            .unwrap();
        assert_eq!(out, "_Value answer = __int(42);\n");
    }

    #[test]
    fn test_nested_let_value_is_unsupported() {
        let bad = Anf::Let {
            name: Binding::Temp(0),
            value: Box::new(Anf::Let {
                name: Binding::Temp(1),
                value: Box::new(Anf::Atom(Atom::Int(1))),
                body: Box::new(Anf::Atom(Atom::Temp(1))),
            }),
            body: Box::new(Anf::Atom(Atom::Temp(0))),
        };
        assert_eq!(
            generate(&[Form::Expr(bad)]),
            Err(Error::Unsupported { shape: "nested let binding" })
        );
    }
}
