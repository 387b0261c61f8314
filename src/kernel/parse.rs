// A small textual syntax for expressions, used by tests and the profiling tool.
//
//   f a b                 application
//   ?m  $x  #0            metavariable, free variable, explicit de Bruijn index
//   42  "str"             literals
//   Prop  Type  Sort      sorts
//   fun (x : T) => b      lambda; also {x : T}, [inst : C], {{x : T}}, and λ
//   forall (x : T), b     dependent arrow; also ∀
//   A -> B                non-dependent arrow; also →
//   let x : T := v; b     let binding
//   proj S i e            projection of field i of structure S
//
// Binder names resolve to de Bruijn indices. Other identifiers are constants.

use std::collections::HashMap;

use super::expr::{BinderInfo, Expr, FVarId, MVarId};
use super::name::Name;
use crate::error::ParseError;

// Named variables get ids from this base up, so they never collide with numeric ones.
const NAMED_ID_BASE: u32 = 1 << 20;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Assign,
    Semi,
    Comma,
    FatArrow,
    Arrow,
    MVar(String),
    FVar(String),
    BVar(u32),
    Nat(u64),
    Str(String),
    Ident(String),
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '\''
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let mut tokens = vec![];
    let mut chars = text.char_indices().peekable();

    // Reads the identifier-like run that starts after position `start`.
    fn read_word(
        chars: &mut std::iter::Peekable<std::str::CharIndices>,
        text: &str,
        start: usize,
    ) -> String {
        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if !is_ident_char(c) {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }
        text[start..end].to_string()
    }

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ';' => Some(Token::Semi),
            ',' => Some(Token::Comma),
            '→' => Some(Token::Arrow),
            'λ' => Some(Token::Ident("fun".to_string())),
            '∀' => Some(Token::Ident("forall".to_string())),
            _ => None,
        };
        if let Some(token) = single {
            chars.next();
            tokens.push((pos, token));
            continue;
        }
        match c {
            ':' => {
                chars.next();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push((pos, Token::Assign));
                } else {
                    tokens.push((pos, Token::Colon));
                }
            }
            '=' => {
                chars.next();
                match chars.next() {
                    Some((_, '>')) => tokens.push((pos, Token::FatArrow)),
                    _ => return Err(ParseError::new(pos, "expected '=>'")),
                }
            }
            '-' => {
                chars.next();
                match chars.next() {
                    Some((_, '>')) => tokens.push((pos, Token::Arrow)),
                    _ => return Err(ParseError::new(pos, "expected '->'")),
                }
            }
            '?' | '$' => {
                chars.next();
                let word = read_word(&mut chars, text, pos + 1);
                if word.is_empty() {
                    return Err(ParseError::new(pos, "expected a variable name"));
                }
                if c == '?' {
                    tokens.push((pos, Token::MVar(word)));
                } else {
                    tokens.push((pos, Token::FVar(word)));
                }
            }
            '#' => {
                chars.next();
                let word = read_word(&mut chars, text, pos + 1);
                match word.parse::<u32>() {
                    Ok(i) => tokens.push((pos, Token::BVar(i))),
                    Err(_) => return Err(ParseError::new(pos, "expected a de Bruijn index")),
                }
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, ch)) => s.push(ch),
                        None => return Err(ParseError::new(pos, "unterminated string")),
                    }
                }
                tokens.push((pos, Token::Str(s)));
            }
            c if c.is_ascii_digit() => {
                let word = read_word(&mut chars, text, pos);
                match word.parse::<u64>() {
                    Ok(n) => tokens.push((pos, Token::Nat(n))),
                    Err(_) => return Err(ParseError::new(pos, format!("bad number '{}'", word))),
                }
            }
            c if is_ident_start(c) => {
                let word = read_word(&mut chars, text, pos);
                tokens.push((pos, Token::Ident(word)));
            }
            _ => return Err(ParseError::new(pos, format!("unexpected character '{}'", c))),
        }
    }
    Ok(tokens)
}

fn is_keyword(word: &str) -> bool {
    matches!(word, "fun" | "forall" | "let" | "proj")
}

/// Remembers which names refer to which free variables and metavariables,
/// so several expressions can share them.
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
    mvars: HashMap<String, MVarId>,
    fvars: HashMap<String, FVarId>,
}

impl ParseContext {
    pub fn new() -> ParseContext {
        ParseContext::default()
    }

    pub fn parse(&mut self, text: &str) -> Result<Expr, ParseError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: text.len(),
            binders: vec![],
            context: self,
        };
        let expr = parser.parse_expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(ParseError::new(parser.position(), "unexpected trailing input"));
        }
        Ok(expr)
    }

    pub fn mvar(&mut self, name: &str) -> MVarId {
        if let Ok(n) = name.parse::<u32>() {
            return MVarId(n);
        }
        let next = NAMED_ID_BASE + self.mvars.len() as u32;
        *self.mvars.entry(name.to_string()).or_insert(MVarId(next))
    }

    pub fn fvar(&mut self, name: &str) -> FVarId {
        if let Ok(n) = name.parse::<u32>() {
            return FVarId(n);
        }
        let next = NAMED_ID_BASE + self.fvars.len() as u32;
        *self.fvars.entry(name.to_string()).or_insert(FVarId(next))
    }
}

impl Expr {
    /// Parses an expression with a fresh context.
    pub fn parse(text: &str) -> Result<Expr, ParseError> {
        ParseContext::new().parse(text)
    }
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,

    // Names of enclosing binders, innermost last. Anonymous binders are empty strings.
    binders: Vec<String>,

    context: &'a mut ParseContext,
}

impl Parser<'_> {
    fn position(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some((p, _)) => *p,
            None => self.end,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        match self.tokens.get(self.pos) {
            Some((_, t)) => {
                self.pos += 1;
                Ok(t.clone())
            }
            None => Err(ParseError::new(self.end, "unexpected end of input")),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(ParseError::new(self.position(), format!("expected {:?}", token)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        let position = self.position();
        match self.next()? {
            Token::Ident(word) if !is_keyword(&word) => Ok(word),
            t => Err(ParseError::new(position, format!("expected a name, got {:?}", t))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_app()?;
        if self.eat(&Token::Arrow) {
            self.binders.push(String::new());
            let rhs = self.parse_expr();
            self.binders.pop();
            return Ok(Expr::forall("a", BinderInfo::Default, lhs, rhs?));
        }
        Ok(lhs)
    }

    fn starts_atom(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::LParen
                    | Token::MVar(_)
                    | Token::FVar(_)
                    | Token::BVar(_)
                    | Token::Nat(_)
                    | Token::Str(_)
                    | Token::Ident(_)
            )
        )
    }

    fn parse_app(&mut self) -> Result<Expr, ParseError> {
        if !self.starts_atom() {
            return Err(ParseError::new(self.position(), "expected an expression"));
        }
        let mut expr = self.parse_atom()?;
        while self.starts_atom() {
            let arg = self.parse_atom()?;
            expr = Expr::app(expr, arg);
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        match self.next()? {
            Token::LParen => {
                let e = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Token::MVar(name) => Ok(Expr::MVar(self.context.mvar(&name))),
            Token::FVar(name) => Ok(Expr::FVar(self.context.fvar(&name))),
            Token::BVar(i) => Ok(Expr::BVar(i)),
            Token::Nat(n) => Ok(Expr::nat(n)),
            Token::Str(s) => Ok(Expr::string(&s)),
            Token::Ident(word) => match word.as_str() {
                "fun" => self.parse_binder_expr(&Token::FatArrow, false),
                "forall" => self.parse_binder_expr(&Token::Comma, true),
                "let" => self.parse_let(),
                "proj" => {
                    let structure = self.expect_ident()?;
                    let index_position = self.position();
                    let index = match self.next()? {
                        Token::Nat(n) => n as u32,
                        _ => return Err(ParseError::new(index_position, "expected a field index")),
                    };
                    let e = self.parse_atom()?;
                    Ok(Expr::Proj(Name::new(&structure), index, e.into()))
                }
                "Prop" => Ok(Expr::Sort(0)),
                "Type" | "Sort" => Ok(Expr::Sort(1)),
                _ => match self.binders.iter().rposition(|b| *b == word) {
                    Some(i) => Ok(Expr::BVar((self.binders.len() - 1 - i) as u32)),
                    None => Ok(Expr::Const(Name::new(&word))),
                },
            },
            t => Err(ParseError::new(position, format!("unexpected {:?}", t))),
        }
    }

    // Parses binders up to `separator`, then the body, and folds them into lambdas or foralls.
    fn parse_binder_expr(&mut self, separator: &Token, is_forall: bool) -> Result<Expr, ParseError> {
        let depth = self.binders.len();
        let result = self.parse_binders_and_body(separator, is_forall);
        self.binders.truncate(depth);
        result
    }

    fn parse_binders_and_body(
        &mut self,
        separator: &Token,
        is_forall: bool,
    ) -> Result<Expr, ParseError> {
        let mut binders: Vec<(String, BinderInfo, Expr)> = vec![];
        while !self.eat(separator) {
            let position = self.position();
            let (close, info) = match self.next()? {
                Token::Ident(name) if !is_keyword(&name) => {
                    self.binders.push(name.clone());
                    binders.push((name, BinderInfo::Default, Expr::Sort(1)));
                    continue;
                }
                Token::LParen => (Token::RParen, BinderInfo::Default),
                Token::LBrace => {
                    if self.eat(&Token::LBrace) {
                        self.expect_group(&mut binders, BinderInfo::StrictImplicit, &Token::RBrace)?;
                        self.expect(&Token::RBrace)?;
                        continue;
                    }
                    (Token::RBrace, BinderInfo::Implicit)
                }
                Token::LBracket => (Token::RBracket, BinderInfo::InstImplicit),
                t => return Err(ParseError::new(position, format!("unexpected {:?} in binder", t))),
            };
            self.expect_group(&mut binders, info, &close)?;
        }
        let mut body = self.parse_expr()?;
        for (name, info, domain) in binders.into_iter().rev() {
            body = if is_forall {
                Expr::forall(&name, info, domain, body)
            } else {
                Expr::lam(&name, info, domain, body)
            };
        }
        Ok(body)
    }

    // Parses `x y : T` or an anonymous `[T]`, up to and including the closing token.
    fn expect_group(
        &mut self,
        binders: &mut Vec<(String, BinderInfo, Expr)>,
        info: BinderInfo,
        close: &Token,
    ) -> Result<(), ParseError> {
        let mut names = vec![];
        while let Some(Token::Ident(word)) = self.peek() {
            if is_keyword(word) {
                break;
            }
            names.push(word.clone());
            self.pos += 1;
        }
        let domain = if self.eat(&Token::Colon) {
            self.parse_expr()?
        } else if info == BinderInfo::InstImplicit {
            // An anonymous instance binder, like `[Add α]`. The words were the type.
            let position = self.position();
            let mut words = names.drain(..);
            let head = match words.next() {
                Some(word) => self.resolve(&word),
                None => return Err(ParseError::new(position, "empty instance binder")),
            };
            let args: Vec<Expr> = words.map(|w| self.resolve(&w)).collect();
            names.push("inst".to_string());
            Expr::mk_app(head, args)
        } else {
            Expr::Sort(1)
        };
        self.expect(close)?;
        if names.is_empty() {
            return Err(ParseError::new(self.position(), "binder without a name"));
        }
        for (k, name) in names.into_iter().enumerate() {
            binders.push((name.clone(), info, domain.lift_loose_bvars(0, k as u32)));
            self.binders.push(name);
        }
        Ok(())
    }

    fn resolve(&self, word: &str) -> Expr {
        match self.binders.iter().rposition(|b| b == word) {
            Some(i) => Expr::BVar((self.binders.len() - 1 - i) as u32),
            None => Expr::Const(Name::new(word)),
        }
    }

    fn parse_let(&mut self) -> Result<Expr, ParseError> {
        let name = self.expect_ident()?;
        let ty = if self.eat(&Token::Colon) {
            self.parse_expr()?
        } else {
            Expr::Sort(1)
        };
        self.expect(&Token::Assign)?;
        let value = self.parse_expr()?;
        self.expect(&Token::Semi)?;
        self.binders.push(name.clone());
        let body = self.parse_expr();
        self.binders.pop();
        Ok(Expr::Let(Name::new(&name), ty.into(), value.into(), body?.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(name: &str) -> Expr {
        Expr::constant(name)
    }

    #[test]
    fn test_parse_application() {
        let e = Expr::parse("HAdd.hAdd a (f b) 5").unwrap();
        let expected = Expr::mk_app(
            c("HAdd.hAdd"),
            [c("a"), Expr::app(c("f"), c("b")), Expr::nat(5)],
        );
        assert_eq!(e, expected);
    }

    #[test]
    fn test_parse_lambda_resolves_binders() {
        let e = Expr::parse("fun (x : Nat) (y : Nat) => f y x").unwrap();
        let body = Expr::mk_app(c("f"), [Expr::BVar(0), Expr::BVar(1)]);
        let expected = Expr::lam(
            "x",
            BinderInfo::Default,
            c("Nat"),
            Expr::lam("y", BinderInfo::Default, c("Nat"), body),
        );
        assert_eq!(e, expected);
    }

    #[test]
    fn test_parse_arrow_and_forall() {
        let e = Expr::parse("forall (n : Nat), P n -> Q n").unwrap();
        match e {
            Expr::ForallE(_, _, domain, body) => {
                assert_eq!(*domain, c("Nat"));
                match body.as_ref() {
                    Expr::ForallE(_, _, d, b) => {
                        assert_eq!(**d, Expr::app(c("P"), Expr::BVar(0)));
                        assert_eq!(**b, Expr::app(c("Q"), Expr::BVar(1)));
                    }
                    _ => panic!("expected an arrow"),
                }
            }
            _ => panic!("expected a forall"),
        }
    }

    #[test]
    fn test_parse_binder_kinds() {
        let e = Expr::parse("fun {α : Type} [Add α] (x : α) => x").unwrap();
        let Expr::Lam(_, info1, _, body) = e else {
            panic!("expected lambda")
        };
        assert_eq!(info1, BinderInfo::Implicit);
        let Expr::Lam(_, info2, domain2, body) = body.as_ref() else {
            panic!("expected lambda")
        };
        assert_eq!(*info2, BinderInfo::InstImplicit);
        assert_eq!(**domain2, Expr::app(c("Add"), Expr::BVar(0)));
        let Expr::Lam(_, info3, domain3, body) = body.as_ref() else {
            panic!("expected lambda")
        };
        assert_eq!(*info3, BinderInfo::Default);
        assert_eq!(**domain3, Expr::BVar(1));
        assert_eq!(**body, Expr::BVar(0));
    }

    #[test]
    fn test_parse_variables_share_context() {
        let mut ctx = ParseContext::new();
        let a = ctx.parse("f ?x $y").unwrap();
        let b = ctx.parse("g $y ?x ?0").unwrap();
        let a_args = a.get_app_args();
        let b_args = b.get_app_args();
        assert_eq!(a_args[0], b_args[1]);
        assert_eq!(a_args[1], b_args[0]);
        assert_eq!(*b_args[2], Expr::MVar(MVarId(0)));
    }

    #[test]
    fn test_parse_let_and_proj() {
        let e = Expr::parse("let x : Nat := 3; proj Prod 0 (p x)").unwrap();
        let Expr::Let(_, _, value, body) = e else {
            panic!("expected let")
        };
        assert_eq!(*value, Expr::nat(3));
        assert_eq!(
            *body,
            Expr::Proj(Name::new("Prod"), 0, Expr::app(c("p"), Expr::BVar(0)).into())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expr::parse("f (a").is_err());
        assert!(Expr::parse("fun x").is_err());
        assert!(Expr::parse("a = b").is_err());
        let err = Expr::parse("f )").unwrap_err();
        assert_eq!(err.position, 2);
    }
}
