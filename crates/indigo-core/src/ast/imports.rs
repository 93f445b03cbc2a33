//! Import declaration sorting

use super::{Decl, File, Node, Spec};
use crate::token::{FileSet, Token};

/// Sort the specs of each import declaration into lexicographic order by
/// path. Groups delimited by blank lines in the source are sorted
/// independently; the sort is stable, comments attached to a spec travel
/// with it, and exact duplicates without attached comments are dropped.
/// Applying the function twice yields the same file.
pub fn sort_imports(fset: &FileSet, file: &mut File) {
    for decl in &mut file.decls {
        let Decl::Gen(d) = decl else {
            // imports always come first
            break;
        };
        if d.tok != Token::Import {
            break;
        }
        if !d.is_grouped() || d.specs.len() < 2 {
            continue;
        }

        // identify blank-line-delimited runs
        let mut sorted = Vec::with_capacity(d.specs.len());
        let mut run: Vec<Spec> = Vec::new();
        let mut prev_line = 0u32;
        for spec in d.specs.drain(..) {
            let line = fset.position(spec.pos()).line;
            if !run.is_empty() && prev_line > 0 && line > prev_line + 1 {
                sort_run(&mut run);
                sorted.append(&mut run);
            }
            prev_line = fset.position(spec.end()).line;
            run.push(spec);
        }
        sort_run(&mut run);
        sorted.append(&mut run);
        d.specs = sorted;
    }
}

fn sort_key(spec: &Spec) -> (String, String) {
    match spec {
        Spec::Import(s) => (
            s.path_value().to_string(),
            s.name.as_ref().map_or_else(String::new, |n| n.name.clone()),
        ),
        _ => (String::new(), String::new()),
    }
}

fn sort_run(run: &mut Vec<Spec>) {
    run.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    // drop duplicate specs that carry no comments of their own
    let mut i = 1;
    while i < run.len() {
        let dup = sort_key(&run[i - 1]) == sort_key(&run[i])
            && match &run[i] {
                Spec::Import(s) => s.doc.is_none() && s.comment.is_none(),
                _ => false,
            };
        if dup {
            run.remove(i);
        } else {
            i += 1;
        }
    }
}
