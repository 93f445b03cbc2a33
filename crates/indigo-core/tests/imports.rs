//! Import sorting

use indigo_core::ast::{sort_imports, Decl, Spec};
use indigo_core::parser::{self, Mode};
use indigo_core::printer::Config;
use indigo_core::token::FileSet;

fn paths(file: &indigo_core::ast::File) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    for decl in &file.decls {
        let Decl::Gen(d) = decl else { break };
        if d.tok != indigo_core::token::Token::Import {
            break;
        }
        out.push(
            d.specs
                .iter()
                .map(|s| match s {
                    Spec::Import(i) => i.path_value().to_string(),
                    _ => String::new(),
                })
                .collect(),
        );
    }
    out
}

#[test]
fn groups_sort_independently() {
    let src = "package main\n\nimport\n\t\"os\"\n\t\"fmt\"\n\n\t\"zlib\"\n\t\"alpha\"\n";
    let fset = FileSet::new();
    let (file, errors) = parser::parse_file(&fset, "t.ing", src, Mode::PARSE_COMMENTS);
    assert!(errors.is_empty(), "{errors}");
    let mut file = file.unwrap();
    sort_imports(&fset, &mut file);
    assert_eq!(
        paths(&file),
        vec![vec![
            "fmt".to_string(),
            "os".to_string(),
            "alpha".to_string(),
            "zlib".to_string()
        ]]
    );
}

#[test]
fn sorting_is_idempotent() {
    let src = "package main\n\nimport\n\t\"os\"\n\t\"fmt\"\n\t\"archive\"\n";
    let fset = FileSet::new();
    let (file, errors) = parser::parse_file(&fset, "t.ing", src, Mode::PARSE_COMMENTS);
    assert!(errors.is_empty(), "{errors}");
    let mut file = file.unwrap();
    sort_imports(&fset, &mut file);
    let once = paths(&file);
    sort_imports(&fset, &mut file);
    assert_eq!(paths(&file), once);
    assert_eq!(once, vec![vec!["archive".to_string(), "fmt".to_string(), "os".to_string()]]);
}

#[test]
fn duplicates_without_comments_are_dropped() {
    let src = "package main\n\nimport\n\t\"fmt\"\n\t\"fmt\"\n";
    let fset = FileSet::new();
    let (file, errors) = parser::parse_file(&fset, "t.ing", src, Mode::PARSE_COMMENTS);
    assert!(errors.is_empty(), "{errors}");
    let mut file = file.unwrap();
    sort_imports(&fset, &mut file);
    assert_eq!(paths(&file), vec![vec!["fmt".to_string()]]);
}

#[test]
fn sorted_file_still_prints() {
    let src = "package main\n\nimport\n\t\"os\"\n\t\"fmt\"\n\nfunc main():\n";
    let fset = FileSet::new();
    let (file, errors) = parser::parse_file(&fset, "t.ing", src, Mode::PARSE_COMMENTS);
    assert!(errors.is_empty(), "{errors}");
    let mut file = file.unwrap();
    sort_imports(&fset, &mut file);
    let mut out = Vec::new();
    Config::default().fprint(&mut out, &fset, &file).unwrap();
    let text = String::from_utf8(out).unwrap();
    let fmt_at = text.find("\"fmt\"").unwrap();
    let os_at = text.find("\"os\"").unwrap();
    assert!(fmt_at < os_at, "imports not in order:\n{text}");
}
