//! Round-trip properties of the parse/print pipeline
//!
//! Printing a parsed file and re-parsing the output must converge: the
//! second print equals the first, and the printed text parses without
//! errors.

use indigo_core::parser::{self, Mode};
use indigo_core::printer::{Config, Form, Mode as PrintMode};
use indigo_core::token::FileSet;

fn print_with(src: &str, form: Form) -> String {
    let fset = FileSet::new();
    let (file, errors) = parser::parse_file(&fset, "t.ing", src, Mode::PARSE_COMMENTS);
    assert!(errors.is_empty(), "parse errors for {src:?}: {errors}");
    let file = file.expect("no file produced");
    let mut out = Vec::new();
    Config::default()
        .with_form(form)
        .fprint(&mut out, &fset, &file)
        .expect("print failed");
    String::from_utf8(out).expect("printer produced invalid utf-8")
}

fn print_indented(src: &str) -> String {
    print_with(src, Form::Indented)
}

const CORPUS: &[&str] = &[
    "package main\n\nfunc main():\n",
    "package adder\n\nfunc add(a, b int) int: return a + b\n",
    "package main\n\nfunc f(x int) int\n\tif x > 0: return 1\n\treturn 0\n",
    "package main\n\nfunc sum(n int) int\n\ttotal := 0\n\tfor i := 0; i < n; i++\n\t\ttotal += i\n\treturn total\n",
    "package main\n\nfunc count(xs []int) int\n\tn := 0\n\tfor _, x := range xs\n\t\tn += x\n\treturn n\n",
    "package geo\n\ntype Point struct: x, y int\n\nfunc Point.abs() int: return self.x + self.y\n",
    "package cfg\n\nconst\n\tretries = 3\n\ttimeout = 60\n\nvar enabled = true\n",
    "package main\n\nimport\n\t\"fmt\"\n\t\"os\"\n\nfunc main():\n",
    "package main\n\nfunc g()\n\tf(1, 2) do (x int): return x * 2\n",
    "package main\n\nfunc grade(x int) string\n\tswitch x\n\t\tcase 1:\n\t\t\treturn \"one\"\n\t\tdefault:\n\t\t\treturn \"many\"\n",
    "package main\n\nfunc wait(c chan int)\n\tselect\n\t\tcase v := <-c:\n\t\t\tuse(v)\n\t\tdefault:\n\t\t\treturn\n",
    "package main\n\nfunc kind(x any) int\n\tswitch v := x.(type)\n\t\tcase int:\n\t\t\treturn use(v)\n\t\tdefault:\n\t\t\treturn 0\n",
    "package main\n\nfunc f()\n\tx := 1 // start\n\tuse(x)\n",
    "package io\n\ntype Reader interface\n\tread(n int) int\n\tclose() int\n",
    "package main\n\nfunc make_point() Point: return Point{x: 1, y: 2}\n",
    "package main\n\nfunc run(c chan int)\n\tgo produce(c)\n\tdefer close(c)\n\tc <- 1\n",
    "package main\n\n// Greet prints a greeting.\nfunc greet():\n",
    "package main\n\nfunc sign(x int) int\n\tif x > 0: return 1\n\telse: return -1\n",
    "package main\n\nfunc pick(x int) int\n\tif x > 0\n\t\treturn 1\n\telse\n\t\treturn 2\n",
    "package main\n\nfunc choose(x int) int\n\tif x > 10: return 2\n\telse if x > 0: return 1\n\treturn 0\n",
    "package main\n\nfunc clamp(x int) int\n\tif y := x * 2; y > 3: return y\n\treturn 0\n",
];

#[test]
fn printer_is_idempotent() {
    for src in CORPUS {
        let first = print_indented(src);
        let second = print_indented(&first);
        assert_eq!(first, second, "printing not idempotent for {src:?}");
    }
}

#[test]
fn printed_output_reparses_cleanly() {
    for src in CORPUS {
        let printed = print_indented(src);
        let fset = FileSet::new();
        let (file, errors) = parser::parse_file(&fset, "t.ing", &printed, Mode::PARSE_COMMENTS);
        assert!(
            errors.is_empty(),
            "printed output does not reparse for {src:?}:\n{printed}\nerrors: {errors}"
        );
        assert!(file.is_some());
    }
}

#[test]
fn canonical_output_is_stable() {
    for src in CORPUS {
        // translating twice from the same source yields identical output
        let a = print_with(src, Form::Canonical);
        let b = print_with(src, Form::Canonical);
        assert_eq!(a, b);
        assert!(!a.contains('\u{b}'), "alignment tabs leaked into output");
    }
}

#[test]
fn golden_indented() {
    // already-canonical indented sources print back unchanged
    let fixpoints = [
        "package main\n\nfunc main():\n",
        "package adder\n\nfunc add(a, b int) int: return a + b\n",
        "package main\n\nfunc f(x int) int\n\tif x > 0: return 1\n\treturn 0\n",
        "package geo\n\ntype Point struct: x, y int\n\nfunc Point.abs() int: return self.x + self.y\n",
        "package main\n\nfunc g()\n\tf(1, 2) do (x int): return x * 2\n",
        "package main\n\n// Greet prints a greeting.\nfunc greet():\n",
    ];
    for src in fixpoints {
        assert_eq!(print_indented(src), src, "not a fixpoint: {src:?}");
    }
}

#[test]
fn golden_canonical() {
    let cases = [
        (
            "package main\n\nfunc main():\n",
            "package main\n\nfunc main() {}\n",
        ),
        (
            "package adder\n\nfunc add(a, b int) int: return a + b\n",
            "package adder\n\nfunc add(a, b int) int {\n\treturn a + b\n}\n",
        ),
    ];
    for (src, want) in cases {
        assert_eq!(print_with(src, Form::Canonical), want);
    }
}

#[test]
fn canonical_method_uses_receiver_parameter() {
    let out = print_with(
        "package geo\n\ntype Point struct: x, y int\n\nfunc Point.abs() int: return self.x + self.y\n",
        Form::Canonical,
    );
    assert!(out.contains("func (self Point) abs() int"), "got:\n{out}");
    assert!(out.contains("return self.x + self.y"));
}

#[test]
fn canonical_do_expands_to_function_literal() {
    let out = print_with(
        "package main\n\nfunc g()\n\tf(1, 2) do (x int): return x * 2\n",
        Form::Canonical,
    );
    assert!(!out.contains(" do "), "do sugar must expand: {out}");
    assert!(out.contains("func(x int)"), "got:\n{out}");
}

#[test]
fn spaces_mode_uses_no_tabs() {
    let fset = FileSet::new();
    let src = "package main\n\nfunc f(x int) int\n\tif x > 0: return 1\n\treturn 0\n";
    let (file, errors) = parser::parse_file(&fset, "t.ing", src, Mode::PARSE_COMMENTS);
    assert!(errors.is_empty());
    let cfg = Config {
        mode: PrintMode::USE_SPACES,
        tabwidth: 4,
        form: Form::Indented,
    };
    let mut out = Vec::new();
    cfg.fprint(&mut out, &fset, &file.unwrap()).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains('\t'), "tabs in spaces mode:\n{text}");
    assert!(text.contains("\n    if x > 0: return 1"));
}

#[test]
fn operator_spacing_follows_precedence() {
    // tight binding inside a looser context drops its spaces
    let out = print_indented("package main\n\nfunc f(a, b, c int) int: return a*b + c\n");
    assert!(out.contains("a*b + c"), "got:\n{out}");

    // a uniform product at depth 1 keeps its spaces
    let out = print_indented("package main\n\nfunc f(a, b int) int: return a * b\n");
    assert!(out.contains("a * b"), "got:\n{out}");

    // comparisons are always spaced
    let out = print_indented("package main\n\nfunc f(a, b int) bool: return a+1 == b\n");
    assert!(out.contains("a+1 == b"), "got:\n{out}");
}
