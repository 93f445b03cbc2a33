//! End-to-end behavior on boundary scenarios

use indigo_core::ast::{Decl, Expr, Node, ObjRef, Stmt};
use indigo_core::parser::{self, Mode};
use indigo_core::printer::{Config, Form};
use indigo_core::token::FileSet;

fn parse(src: &str) -> (FileSet, Option<indigo_core::ast::File>, indigo_core::scanner::ErrorList) {
    let fset = FileSet::new();
    let (file, errors) = parser::parse_file(
        &fset,
        "t.ing",
        src,
        Mode::PARSE_COMMENTS | Mode::DECLARATION_ERRORS,
    );
    (fset, file, errors)
}

#[test]
fn parenthesized_continuation_is_one_expression_list() {
    // arguments spanning indented lines inside (...) parse as a single
    // call with three arguments
    let src = "package main\n\nfunc g()\n\th(1,\n\t\t2,\n\t\t3)\n";
    let (_, file, errors) = parse(src);
    assert!(errors.is_empty(), "{errors}");
    let file = file.unwrap();
    let Decl::Func(d) = &file.decls[0] else { panic!("want func") };
    let body = d.body.as_ref().unwrap();
    let Stmt::Expr(es) = &body.list[0] else { panic!("want expr stmt") };
    let Expr::Call(call) = &es.x else { panic!("want call") };
    assert_eq!(call.args.len(), 3);
}

#[test]
fn short_form_block_prints_back_on_one_line() {
    let src = "package main\n\nfunc f(x int) int\n\tif x: return 1\n\treturn 0\n";
    let (fset, file, errors) = parse(src);
    assert!(errors.is_empty(), "{errors}");
    let file = file.unwrap();

    let Decl::Func(d) = &file.decls[0] else { panic!("want func") };
    let Stmt::If(ifstmt) = &d.body.as_ref().unwrap().list[0] else { panic!("want if") };
    assert!(ifstmt.body.small);
    assert!(ifstmt.init.is_none());
    assert!(ifstmt.else_branch.is_none());
    assert!(matches!(ifstmt.body.list.as_slice(), [Stmt::Return(_)]));

    let mut out = Vec::new();
    Config::default().fprint(&mut out, &fset, &file).unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("\tif x: return 1\n"), "got:\n{printed}");
}

#[test]
fn trailing_do_callback_becomes_last_argument() {
    let src = "package main\n\nfunc g()\n\tf(1, 2) do (x int): return x * 2\n";
    let (_, file, errors) = parse(src);
    assert!(errors.is_empty(), "{errors}");
    let file = file.unwrap();
    let Decl::Func(d) = &file.decls[0] else { panic!("want func") };
    let Stmt::Expr(es) = &d.body.as_ref().unwrap().list[0] else { panic!("want expr stmt") };
    let Expr::Call(call) = &es.x else { panic!("want call") };
    assert_eq!(call.args.len(), 3);
    let Expr::FuncLit(lit) = &call.args[2] else { panic!("want func literal") };
    assert_eq!(lit.typ.params.num_fields(), 1);
    assert!(lit.body.small);
}

#[test]
fn method_receiver_is_self() {
    let src = "package main\n\nfunc MyType.foo(n int) int: return n\n";
    let (fset, file, errors) = parse(src);
    assert!(errors.is_empty(), "{errors}");
    let file = file.unwrap();
    let Decl::Func(d) = &file.decls[0] else { panic!("want func") };
    let recv = d.recv.as_ref().expect("receiver");
    assert_eq!(recv.list[0].names[0].name, "self");
    let Expr::Ident(t) = &recv.list[0].typ else { panic!("want ident type") };
    assert_eq!(t.name, "MyType");

    // printed back in the method form
    let mut out = Vec::new();
    Config::default().fprint(&mut out, &fset, &file).unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("func MyType.foo(n int) int: return n"), "got:\n{printed}");
}

#[test]
fn redeclaration_diagnostic_format() {
    let src = "package main\n\nfunc f()\n\tvar x int\n\tvar x string\n";
    let (_, _, errors) = parse(src);
    assert_eq!(errors.len(), 1, "{errors}");
    let err = errors.iter().next().unwrap();
    assert!(err.msg.starts_with("x redeclared in this block"));
    assert!(err.msg.contains("\n\tprevious declaration at t.ing:4"));
}

#[test]
fn error_cap_forces_bailout() {
    let mut src = String::from("package main\n\n");
    for _ in 0..50 {
        src.push_str("var 1\n");
    }
    let (_, file, errors) = parse(&src);
    assert!(file.is_none(), "bailout must drop the file");
    assert!(!errors.is_empty());
    assert!(errors.len() <= 11, "cap exceeded: {} errors", errors.len());
}

#[test]
fn comments_are_ordered_and_identifiers_classified() {
    let src = "package main\n\n// a doc.\nfunc a(): use(b)\n\n// b doc.\nfunc b():\n";
    let (_, file, errors) = parse(src);
    assert!(errors.is_empty(), "{errors}");
    let file = file.unwrap();

    // comment groups appear in strict source order
    let mut last = indigo_core::token::Pos::NONE;
    for g in &file.comments {
        assert!(g.pos() > last);
        last = g.pos();
    }

    // every identifier is exactly one of: unbound, unresolved sentinel, or
    // resolved to an object of the same name
    let Decl::Func(d) = &file.decls[0] else { panic!("want func") };
    let Stmt::Expr(es) = &d.body.as_ref().unwrap().list[0] else { panic!("want expr") };
    let Expr::Call(call) = &es.x else { panic!("want call") };
    let Expr::Ident(callee) = &call.fun else { panic!("want ident") };
    // `use` is undeclared: unresolved
    assert_eq!(callee.obj.get(), ObjRef::Unresolved);
    // `b` resolves against the package scope at end of file
    let Expr::Ident(arg) = &call.args[0] else { panic!("want ident") };
    match arg.obj.get() {
        ObjRef::Obj(id) => assert_eq!(file.symbols.object(id).name, "b"),
        other => panic!("b should resolve, got {other:?}"),
    }
    assert!(file.unresolved.iter().any(|i| i.name == "use"));
}
