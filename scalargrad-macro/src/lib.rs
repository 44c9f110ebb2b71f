use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    spanned::Spanned,
    BinOp, Block, Expr, ExprLit, ExprUnary, Ident, Lit, Pat, Stmt, Token, UnOp,
};

struct MacroInput {
    tape: Expr,
    stmts: Vec<Stmt>,
}

impl Parse for MacroInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let tape = input.parse()?;
        input.parse::<Token![;]>()?;
        let stmts = Block::parse_within(input)?;
        Ok(Self { tape, stmts })
    }
}

/// Record plain arithmetic on a tape.
///
/// The first argument is the tape, followed by `let` statements:
///
/// ```text
/// scalargrad! {
///     tape;
///     let x = 2.;
///     let y = 3.;
///     let z = x * y + x.pow(2) + y.relu();
/// }
/// ```
///
/// A literal binding becomes a leaf labeled with its name. Any other binding is
/// built with the fallible `Tape` operations and `?`, so the enclosing function
/// must return a `Result` whose error converts from `GradError`. Supported
/// expressions are `+ - * /`, unary `-`, parentheses, literals, variables, and
/// `relu`, `tanh` and `pow`/`powf` in method or function call form.
#[proc_macro]
pub fn scalargrad(input: TokenStream) -> TokenStream {
    let MacroInput { tape, stmts } = parse_macro_input!(input as MacroInput);

    let mut builder = Builder {
        tape,
        terms: vec![],
    };
    for stmt in &stmts {
        if let Err(err) = builder.traverse_stmt(stmt) {
            return err.to_compile_error().into();
        }
    }

    let terms = builder.terms;
    let expanded = quote! {
        #(#terms)*
    };
    TokenStream::from(expanded)
}

struct Builder {
    tape: Expr,
    terms: Vec<TokenStream2>,
}

impl Builder {
    fn var_name(&self, span: proc_macro2::Span) -> Ident {
        Ident::new(&format!("_a{}", self.terms.len()), span)
    }

    fn traverse_stmt(&mut self, input: &Stmt) -> syn::Result<()> {
        match input {
            Stmt::Local(local) => {
                let (Pat::Ident(id), Some(init)) = (&local.pat, &local.init) else {
                    return Err(syn::Error::new(
                        local.span(),
                        "expected `let name = expression;`",
                    ));
                };
                let name = &id.ident;
                let tape = &self.tape;
                let ts = if let Some(lit) = literal(&init.expr) {
                    quote! {
                        let #name = (#tape).labeled(stringify!(#name), #lit);
                    }
                } else if let Expr::Path(path) = &*init.expr {
                    quote! {
                        let #name = #path;
                    }
                } else {
                    let res = self.traverse_expr(&init.expr)?;
                    quote! {
                        let #name = #res;
                        #name.set_label(stringify!(#name));
                    }
                };
                self.terms.push(ts);
                Ok(())
            }
            Stmt::Expr(ex, _) => self.traverse_expr(ex).map(|_| ()),
            _ => Err(syn::Error::new(input.span(), "unsupported statement")),
        }
    }

    /// Emit the statements computing `input` and return the tokens naming its result.
    fn traverse_expr(&mut self, input: &Expr) -> syn::Result<TokenStream2> {
        if let Some(lit) = literal(input) {
            return Ok(lit);
        }
        let tape = self.tape.clone();
        let node = match input {
            Expr::Binary(ex) => {
                let lhs = self.traverse_expr(&ex.left)?;
                let rhs = self.traverse_expr(&ex.right)?;
                let method = match ex.op {
                    BinOp::Add(_) => quote! { add },
                    BinOp::Sub(_) => quote! { sub },
                    BinOp::Mul(_) => quote! { mul },
                    BinOp::Div(_) => quote! { div },
                    _ => return Err(syn::Error::new(ex.op.span(), "unsupported operator")),
                };
                quote! { (#tape).#method(#lhs, #rhs)? }
            }
            Expr::Unary(ExprUnary {
                op: UnOp::Neg(_),
                expr,
                ..
            }) => {
                let term = self.traverse_expr(expr)?;
                quote! { (#tape).neg(#term)? }
            }
            Expr::Paren(ex) => return self.traverse_expr(&ex.expr),
            Expr::Group(ex) => return self.traverse_expr(&ex.expr),
            Expr::Path(path) => {
                return match path.path.get_ident() {
                    Some(ident) => Ok(quote! { #ident }),
                    None => Err(syn::Error::new(path.span(), "expected a variable name")),
                }
            }
            Expr::MethodCall(call) => {
                let term = self.traverse_expr(&call.receiver)?;
                let args: Vec<&Expr> = call.args.iter().collect();
                self.apply(&call.method, term, &args)?
            }
            Expr::Call(call) => {
                let Expr::Path(func) = &*call.func else {
                    return Err(syn::Error::new(call.func.span(), "expected a function name"));
                };
                let Some(func) = func.path.get_ident() else {
                    return Err(syn::Error::new(func.span(), "expected a function name"));
                };
                let mut args = call.args.iter();
                let Some(first) = args.next() else {
                    return Err(syn::Error::new(call.span(), "missing argument"));
                };
                let term = self.traverse_expr(first)?;
                let rest: Vec<&Expr> = args.collect();
                self.apply(func, term, &rest)?
            }
            _ => return Err(syn::Error::new(input.span(), "unsupported expression")),
        };
        let name = self.var_name(input.span());
        self.terms.push(quote! {
            let #name = #node;
        });
        Ok(quote! { #name })
    }

    fn apply(&self, func: &Ident, term: TokenStream2, args: &[&Expr]) -> syn::Result<TokenStream2> {
        let tape = &self.tape;
        match (func.to_string().as_str(), args) {
            ("relu", []) => Ok(quote! { (#tape).relu(#term)? }),
            ("tanh", []) => Ok(quote! { (#tape).tanh(#term)? }),
            ("pow" | "powf", [exponent]) => Ok(quote! { (#tape).pow(#term, (#exponent) as f64)? }),
            _ => Err(syn::Error::new(
                func.span(),
                format!("unsupported function `{func}`"),
            )),
        }
    }
}

/// Numeric literals, possibly negated or parenthesized, as an `f64` expression.
fn literal(input: &Expr) -> Option<TokenStream2> {
    match input {
        Expr::Lit(ExprLit {
            lit: Lit::Float(_) | Lit::Int(_),
            ..
        }) => Some(quote! { ((#input) as f64) }),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => literal(expr).map(|lit| quote! { (-#lit) }),
        Expr::Paren(ex) => literal(&ex.expr),
        _ => None,
    }
}
