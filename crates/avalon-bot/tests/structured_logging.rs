use avalon_bot::logging::init_logging;
use avalon_bot::{LoggingConfig, Solver, SolverConfig};
use avalon_core::game::Game;
use avalon_core::proposal::{ProposalGame, ProposalRules};
use std::fs;

#[test]
fn debug_solve_events_land_in_the_log_file() {
    // Only test in this binary, so the global subscriber is ours.
    unsafe { std::env::remove_var("RUST_LOG") }
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("solver.jsonl");
    let cfg = LoggingConfig {
        enable_structured: true,
        tracing_level: "debug".to_string(),
        file: Some(path.clone()),
    };
    let guard = init_logging(&cfg).expect("init").expect("guard");

    let rules = ProposalRules {
        rounds: 1,
        ..ProposalRules::default()
    };
    let solver = Solver::new(ProposalGame::new(rules), SolverConfig::default()).expect("config");
    let state = solver.game().initial_state();
    let belief = solver.game().initial_belief(0, 1);
    solver
        .solve(&state, 0, 1, Some(&belief), &solver.empty_tensor())
        .expect("solve succeeds");
    drop(guard);

    let contents = fs::read_to_string(&path).expect("log file");
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    let solves: Vec<_> = events
        .iter()
        .filter(|event| event["target"] == "avalon_bot::solve")
        .collect();
    assert!(!solves.is_empty(), "no solve events in {contents}");
    assert!(solves.iter().all(|event| event["level"] == "DEBUG"));
    assert!(solves.iter().any(|event| event["fields"]["player"] == 0));
    assert!(solves.iter().all(|event| event["fields"]["level"] == 1));
}
