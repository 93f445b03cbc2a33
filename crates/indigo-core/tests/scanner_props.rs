//! Scanner robustness properties

use indigo_core::scanner::{Mode, Scanner};
use indigo_core::token::{FileSet, Token};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    // The scanner terminates on arbitrary input, emits bounded token
    // counts, and keeps positions within the file.
    #[test]
    fn never_panics_and_terminates(src in ".*") {
        let fset = FileSet::new();
        let file = fset.add_file("fuzz.ing", None, src.len() as u32);
        let mut scanner = Scanner::new(file, &src, Box::new(|_, _| {}), Mode::SCAN_COMMENTS);

        let max_steps = src.len().saturating_mul(4) + 64;
        let mut steps = 0usize;
        loop {
            let (pos, tok, _) = scanner.scan();
            if pos.is_valid() {
                let resolved = fset.position(pos);
                prop_assert!(resolved.offset as usize <= src.len());
            }
            if tok == Token::Eof {
                break;
            }
            steps += 1;
            prop_assert!(
                steps <= max_steps,
                "scanner failed to terminate within {max_steps} steps"
            );
        }
    }

    // Layout tokens always balance: every Indent has a matching Dedent by
    // the end of the stream.
    #[test]
    fn indents_balance(src in "[a-z \t\n():=0-9]*") {
        let fset = FileSet::new();
        let file = fset.add_file("fuzz.ing", None, src.len() as u32);
        let mut scanner = Scanner::new(file, &src, Box::new(|_, _| {}), Mode::NONE);
        let mut depth = 0i64;
        loop {
            let (_, tok, _) = scanner.scan();
            match tok {
                Token::Indent => depth += 1,
                Token::Dedent => depth -= 1,
                Token::Eof => break,
                _ => {}
            }
            prop_assert!(depth >= 0, "dedent without matching indent");
        }
        prop_assert_eq!(depth, 0, "unbalanced layout tokens at EOF");
    }
}
