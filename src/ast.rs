// program ::= form*
// form    ::= require | def | expr [';']
// require ::= 'require' (STRING | ID) ';'
// def     ::= 'def' ID [annot] ( '(' params ')' [annot] expr+ | expr ) ';'
// params  ::= [ID [annot] (',' ID [annot])*]
// annot   ::= ':' ID
// expr    ::= primary ('(' [expr (',' expr)*] ')')*
// primary ::= literal | ID | '(' expr ')' | if | fn
// if      ::= 'if' expr ['then'] expr+ ['else' expr+] ';'
// fn      ::= 'fn' '(' params ')' expr+ ';'
//
// `;` and the keyword `end` are one terminator token, interchangeable.
// `require`, `def`, `if`, `then`, `else` and `fn` are not reserved: they
// are ordinary identifiers matched by text in the positions above.

/// A parsed compilation unit: an ordered sequence of top-level forms.
#[derive(Debug, PartialEq, Default)]
pub struct Program {
    pub forms: Vec<Form>,
}

#[derive(Debug, PartialEq)]
pub enum Form {
    Require { module: ModuleRef },
    Def(Def),
    Expr(Expr),
}

/// The argument of a `require` form: a bare module name or a quoted
/// path. Resolving and loading the named unit is the host's concern.
#[derive(Debug, PartialEq)]
pub enum ModuleRef {
    Name(String),
    Path(String),
}

impl ModuleRef {
    pub fn as_str(&self) -> &str {
        match self {
            ModuleRef::Name(s) | ModuleRef::Path(s) => s,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Def {
    pub name: String,
    pub ty: Option<TypeRef>,
    /// `None` for a value definition, `Some` (possibly empty) for a
    /// function definition.
    pub params: Option<Vec<Param>>,
    pub ret: Option<TypeRef>,
    /// A single expression for value definitions; the function body
    /// sequence otherwise, whose last expression is the value.
    pub body: Vec<Expr>,
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeRef>,
}

/// Type annotations are carried through the tree but never checked.
pub type TypeRef = String;

#[derive(Debug, PartialEq)]
pub enum Expr {
    Literal(Lit),
    Ident(String),
    If {
        cond: Box<Expr>,
        then: Vec<Expr>,
        els: Option<Vec<Expr>>,
    },
    Fn {
        params: Vec<Param>,
        body: Vec<Expr>,
    },
    Apply {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// A parenthesized expression, kept so the tree dump mirrors the
    /// source grouping.
    Group(Box<Expr>),
}

#[derive(Debug, PartialEq)]
pub enum Lit {
    Int(i64),
    Float(f64),
    Char(u8),
    Str(String),
    Bool(bool),
}
