use std::process;

use clap::{App, Arg};

use sokopush::fs;
use sokopush::heuristic::HeuristicKind;
use sokopush::parser;
use sokopush::solver::{SolveState, Solver};

fn main() {
    env_logger::init();

    let matches = App::new("sokopush")
        .about("Push-optimal Sokoban solver")
        .arg(
            Arg::with_name("push-heuristic")
                .short("p")
                .long("push-heuristic")
                .help("Use the push-reachability distance heuristic"),
        )
        .arg(
            Arg::with_name("level")
                .short("l")
                .long("level")
                .takes_value(true)
                .help("1-based level number to solve (default: all)"),
        )
        .arg(
            Arg::with_name("stats")
                .short("s")
                .long("stats")
                .help("Print timing and search statistics"),
        )
        .arg(Arg::with_name("file").required(true).help("Levels file"))
        .get_matches();

    let path = matches.value_of("file").unwrap();
    let contents = fs::read_file(path).unwrap_or_else(|err| {
        println!("Can't read file {}: {}", path, err);
        process::exit(1);
    });

    let levels = parser::parse_levels(&contents).unwrap_or_else(|err| {
        println!("Failed to parse {}: {}", path, err);
        process::exit(1);
    });

    let selected: Option<usize> = matches.value_of("level").map(|v| {
        v.parse().unwrap_or_else(|_| {
            println!("Not a level number: {}", v);
            process::exit(1);
        })
    });

    let mut solver = Solver::new();
    if matches.is_present("push-heuristic") {
        solver.set_heuristic(HeuristicKind::HungarianTaxicabPush);
    }

    for (i, level) in levels.iter().enumerate() {
        if let Some(n) = selected {
            if n != i + 1 {
                continue;
            }
        }

        println!("Solving {}...", level.name);
        solver.solve(&level.map);
        match solver.solved() {
            SolveState::Solved => {
                let plan: String = solver.result().iter().map(|m| m.to_string()).collect();
                println!("{}", plan);
                println!("Moves: {}", solver.result().len());
                println!("Pushes: {}", solver.box_movements());
            }
            _ => println!("No solution"),
        }
        if matches.is_present("stats") {
            println!("Time: {:?}", solver.elapsed());
            println!("{}", solver.stats());
        }
        println!();
    }
}
