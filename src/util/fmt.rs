//! Stage-output serialization: the token dump and the parenthesized
//! S-expression renderings of the AST and the normalized tree.
//!
//! Identifiers render as `ID:name`, literals as `KIND:value`, synthesized
//! temporaries as `$:N`. Each top-level form takes one line.

use std::fmt::{self, Write};

use crate::{
    anf::{self, Anf, Atom, Binding},
    ast::{Def, Expr, Form, Lit, ModuleRef, Param, Program},
    token::{char_name, Token},
};

/// One `KIND` or `KIND:text` per line.
pub fn print_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        if token.kind.has_text() {
            let _ = writeln!(out, "{}:{}", token.kind, token);
        } else {
            let _ = writeln!(out, "{}", token.kind);
        }
    }
    out
}

pub fn print_program_string(program: &Program) -> String {
    let mut out = String::new();
    print_program(&mut out, program).expect("write to string");
    out
}

pub fn print_program(w: &mut impl Write, program: &Program) -> fmt::Result {
    for form in &program.forms {
        print_form(w, form)?;
        writeln!(w)?;
    }
    Ok(())
}

fn print_form(w: &mut impl Write, form: &Form) -> fmt::Result {
    match form {
        Form::Require { module } => {
            write!(w, "(require ")?;
            print_module(w, module)?;
            write!(w, ")")
        }
        Form::Def(def) => print_def(w, def),
        Form::Expr(expr) => print_expr(w, expr),
    }
}

fn print_module(w: &mut impl Write, module: &ModuleRef) -> fmt::Result {
    match module {
        ModuleRef::Name(name) => write!(w, "ID:{name}"),
        ModuleRef::Path(path) => write!(w, "STRING:\"{path}\""),
    }
}

/// A function definition renders with its desugared `fn` value, the way
/// a value definition of the equivalent literal would.
fn print_def(w: &mut impl Write, def: &Def) -> fmt::Result {
    write!(w, "(def ID:{} ", def.name)?;
    match &def.params {
        Some(params) => {
            write!(w, "(fn ")?;
            print_params(w, params)?;
            for expr in &def.body {
                write!(w, " ")?;
                print_expr(w, expr)?;
            }
            write!(w, ")")?;
        }
        None => print_expr(w, &def.body[0])?,
    }
    write!(w, ")")
}

fn print_params(w: &mut impl Write, params: &[Param]) -> fmt::Result {
    write!(w, "(")?;
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            write!(w, " ")?;
        }
        write!(w, "ID:{}", param.name)?;
    }
    write!(w, ")")
}

pub fn print_expr(w: &mut impl Write, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Literal(lit) => print_lit(w, lit),
        Expr::Ident(name) => write!(w, "ID:{name}"),
        Expr::Group(inner) => {
            write!(w, "(")?;
            print_expr(w, inner)?;
            write!(w, ")")
        }
        Expr::Apply { callee, args } => {
            write!(w, "(")?;
            print_expr(w, callee)?;
            for arg in args {
                write!(w, " ")?;
                print_expr(w, arg)?;
            }
            write!(w, ")")
        }
        Expr::Fn { params, body } => {
            write!(w, "(fn ")?;
            print_params(w, params)?;
            for expr in body {
                write!(w, " ")?;
                print_expr(w, expr)?;
            }
            write!(w, ")")
        }
        Expr::If { cond, then, els } => {
            write!(w, "(if ")?;
            print_expr(w, cond)?;
            for expr in then {
                write!(w, " ")?;
                print_expr(w, expr)?;
            }
            if let Some(els) = els {
                write!(w, " else")?;
                for expr in els {
                    write!(w, " ")?;
                    print_expr(w, expr)?;
                }
            }
            write!(w, ")")
        }
    }
}

fn print_lit(w: &mut impl Write, lit: &Lit) -> fmt::Result {
    match lit {
        Lit::Int(v) => write!(w, "INT:{v}"),
        Lit::Float(v) => write!(w, "FLOAT:{v:.6}"),
        Lit::Char(b) => {
            write!(w, "CHAR:\\")?;
            match char_name(*b) {
                Some(name) => write!(w, "{name}"),
                None => write!(w, "{}", char::from(*b)),
            }
        }
        Lit::Str(s) => write!(w, "STRING:\"{s}\""),
        Lit::Bool(v) => write!(w, "BOOL:{v}"),
    }
}

pub fn print_anf_string(forms: &[anf::Form]) -> String {
    let mut out = String::new();
    for form in forms {
        print_anf_form(&mut out, form).expect("write to string");
        out.push('\n');
    }
    out
}

fn print_anf_form(w: &mut impl Write, form: &anf::Form) -> fmt::Result {
    match form {
        anf::Form::Require { module } => {
            write!(w, "(require ")?;
            print_module(w, module)?;
            write!(w, ")")
        }
        anf::Form::Def { name, value } => {
            write!(w, "(def ID:{name} ")?;
            print_anf(w, value)?;
            write!(w, ")")
        }
        anf::Form::Expr(node) => print_anf(w, node),
    }
}

pub fn print_anf(w: &mut impl Write, node: &Anf) -> fmt::Result {
    match node {
        Anf::Atom(atom) => print_atom(w, atom),
        Anf::Let { name, value, body } => {
            write!(w, "(let ({name} ")?;
            print_anf(w, value)?;
            write!(w, ") ")?;
            print_anf(w, body)?;
            write!(w, ")")
        }
        Anf::If { cond, then, els } => {
            write!(w, "(if ")?;
            print_atom(w, cond)?;
            write!(w, " ")?;
            print_anf(w, then)?;
            if let Some(els) = els {
                write!(w, " ")?;
                print_anf(w, els)?;
            }
            write!(w, ")")
        }
        Anf::Fn { params, body } => {
            write!(w, "(fn (")?;
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    write!(w, " ")?;
                }
                write!(w, "ID:{param}")?;
            }
            write!(w, ") ")?;
            print_anf(w, body)?;
            write!(w, ")")
        }
        Anf::Apply { callee, args } => {
            write!(w, "(")?;
            print_atom(w, callee)?;
            for arg in args {
                write!(w, " ")?;
                print_atom(w, arg)?;
            }
            write!(w, ")")
        }
        Anf::Block { stmts, tail } => {
            write!(w, "(do")?;
            for stmt in stmts {
                write!(w, " ")?;
                print_anf(w, stmt)?;
            }
            write!(w, " ")?;
            print_anf(w, tail)?;
            write!(w, ")")
        }
    }
}

fn print_atom(w: &mut impl Write, atom: &Atom) -> fmt::Result {
    match atom {
        Atom::Int(v) => write!(w, "INT:{v}"),
        Atom::Float(v) => write!(w, "FLOAT:{v:.6}"),
        Atom::Char(b) => {
            write!(w, "CHAR:\\")?;
            match char_name(*b) {
                Some(name) => write!(w, "{name}"),
                None => write!(w, "{}", char::from(*b)),
            }
        }
        Atom::Str(s) => write!(w, "STRING:\"{s}\""),
        Atom::Bool(v) => write!(w, "BOOL:{v}"),
        Atom::Ident(name) => write!(w, "ID:{name}"),
        Atom::Temp(id) => write!(w, "{}", Binding::Temp(*id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_dump() {
        let tokens = lexer::lex("def foo 0b101 ; \"hi\" (x)").unwrap();
        assert_eq!(
            print_tokens(&tokens),
            indoc! {r#"
                ID:def
                ID:foo
                INT:5
                END
                STRING:"hi"
                LPAR
                ID:x
                RPAR
            "#}
        );
    }

    #[test]
    fn test_block_dump() {
        let node = Anf::Block {
            stmts: vec![Anf::Atom(Atom::Int(1))],
            tail: Box::new(Anf::Atom(Atom::Temp(0))),
        };
        let mut out = String::new();
        print_anf(&mut out, &node).unwrap();
        assert_eq!(out, "(do INT:1 $:0)");
    }
}
