#[macro_use]
extern crate criterion;

use criterion::{Benchmark, Criterion};

use sokopush::heuristic::HeuristicKind;
use sokopush::parser;
use sokopush::solver::Solver;

const HEADER: &str = "
wall = #
field = ' -_'
destination = .
unit = @
box = $
destinationbox = *
destinationunit = +
start levels
";

// microban-style warmup level, two boxes
const TWO_BOXES: &str = "
####
# .#
#  ###
#*@  #
#  $ #
#  ###
####
";

// four boxes into a goal row
const FOUR_BOXES: &str = "
########
#      #
# $$$$ #
#@     #
# .... #
#      #
########
";

fn bench_level(c: &mut Criterion, name: &'static str, level: &str, kind: HeuristicKind, samples: usize) {
    let input = format!("{}\n{}\n", HEADER, level.trim_matches('\n'));
    let levels = parser::parse_levels(&input).unwrap();
    let map = levels[0].map.clone();

    c.bench(
        "solve",
        Benchmark::new(name, move |b| {
            let mut solver = Solver::new();
            solver.set_heuristic(kind);
            b.iter(|| {
                solver.solve(criterion::black_box(&map));
            })
        })
        .sample_size(samples),
    );
}

fn bench_two_boxes(c: &mut Criterion) {
    bench_level(c, "two-boxes", TWO_BOXES, HeuristicKind::HungarianTaxicab, 50);
}

fn bench_four_boxes(c: &mut Criterion) {
    bench_level(c, "four-boxes", FOUR_BOXES, HeuristicKind::HungarianTaxicab, 20);
}

fn bench_four_boxes_push(c: &mut Criterion) {
    bench_level(
        c,
        "four-boxes-push",
        FOUR_BOXES,
        HeuristicKind::HungarianTaxicabPush,
        20,
    );
}

criterion_group!(
    benches,
    bench_two_boxes,
    bench_four_boxes,
    bench_four_boxes_push,
);
criterion_main!(benches);
