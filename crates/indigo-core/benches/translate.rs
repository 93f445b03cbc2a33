use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use indigo_core::parser::{self, Mode};
use indigo_core::printer::{Config, Form};
use indigo_core::token::FileSet;

const SMALL: &str = "package main\n\nfunc main():\n";

const MEDIUM: &str = r"package geometry

type Point struct: x, y int

func Point.abs() int: return self.x*self.x + self.y*self.y

func scale(points []Point, factor int) int
	total := 0
	for _, p := range points
		total += p.abs() * factor
	return total
";

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for (name, src) in [("small", SMALL), ("medium", MEDIUM)] {
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let fset = FileSet::new();
                let (file, errors) =
                    parser::parse_file(&fset, "bench.ing", black_box(src), Mode::PARSE_COMMENTS);
                assert!(errors.is_empty());
                black_box(file)
            });
        });
    }
    group.finish();
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");
    for (name, src) in [("small", SMALL), ("medium", MEDIUM)] {
        let fset = FileSet::new();
        let (file, errors) = parser::parse_file(&fset, "bench.ing", src, Mode::PARSE_COMMENTS);
        assert!(errors.is_empty());
        let file = file.expect("bench source must parse");
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut out = Vec::new();
                Config::default()
                    .with_form(Form::Canonical)
                    .fprint(&mut out, &fset, black_box(&file))
                    .unwrap();
                black_box(out)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_translate);
criterion_main!(benches);
