use avalon_bot::{Evidence, MoveSet, Perspective, Solver, SolverConfig};
use avalon_core::belief::KBeliefTensor;
use avalon_core::game::Game;
use avalon_core::proposal::{
    ProposalGame, ProposalMove, ProposalObservation, ProposalRules, ProposalState, Team,
};
use std::thread;

fn short_rules() -> ProposalRules {
    ProposalRules {
        rounds: 1,
        ..ProposalRules::default()
    }
}

fn solver(memoize: bool) -> Solver<ProposalGame> {
    let config = SolverConfig {
        memoize,
        ..SolverConfig::default()
    };
    Solver::new(ProposalGame::new(short_rules()), config).expect("valid config")
}

fn assert_bitwise_eq(a: &MoveSet<ProposalMove>, b: &MoveSet<ProposalMove>) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.entries().iter().zip(b.entries()) {
        assert_eq!(x.action, y.action);
        assert_eq!(x.probability.to_bits(), y.probability.to_bits());
        let xv: Vec<u64> = x.values.iter().map(|v| v.to_bits()).collect();
        let yv: Vec<u64> = y.values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(xv, yv);
    }
    let av: Vec<u64> = a.values().iter().map(|v| v.to_bits()).collect();
    let bv: Vec<u64> = b.values().iter().map(|v| v.to_bits()).collect();
    assert_eq!(av, bv);
}

fn query_states(game: &ProposalGame) -> Vec<ProposalState> {
    let start = game.initial_state();
    let team = Team::from_members(&[1, 2]).expect("team");
    vec![start, start.with_proposal(team), start.with_proposal(team).after_mission(true)]
}

#[test]
fn disabling_the_memo_changes_no_strategy() {
    let cached = solver(true);
    let uncached = solver(false);
    let game = cached.game();
    for level in 1..=2 {
        let tensor = KBeliefTensor::initial(game, level - 1);
        for state in query_states(game) {
            for hidden in 0..3 {
                for player in 0..3 {
                    let belief = game.initial_belief(player, hidden);
                    let a = cached
                        .solve(&state, player, hidden, Some(&belief), &tensor)
                        .expect("cached solve");
                    let b = uncached
                        .solve(&state, player, hidden, Some(&belief), &tensor)
                        .expect("uncached solve");
                    assert_bitwise_eq(&a, &b);
                }
            }
        }
    }
    assert!(cached.stats().solves.hits > 0);
    assert_eq!(uncached.stats().solves.entries, 0);
}

#[test]
fn disabling_the_memo_changes_no_update() {
    let cached = solver(true);
    let uncached = solver(false);
    let game = cached.game();
    let team = Team::from_members(&[0, 1]).expect("team");
    let state = game.initial_state().with_proposal(team);
    let evidence = Evidence::Public(ProposalObservation::Mission { fails: 1 });
    let tensor = KBeliefTensor::initial(game, 1);
    let belief = game.initial_belief(0, 1);
    let perspective = Perspective::acting(0, ProposalMove::Pass);

    let a = cached
        .update_belief(&belief, &perspective, &state, &evidence, &tensor)
        .expect("cached update");
    let b = uncached
        .update_belief(&belief, &perspective, &state, &evidence, &tensor)
        .expect("uncached update");
    assert_eq!(a, b);

    let ta = cached
        .update_k_tensor(&tensor, &state, &evidence)
        .expect("cached tensor");
    let tb = uncached
        .update_k_tensor(&tensor, &state, &evidence)
        .expect("uncached tensor");
    assert_eq!(ta, tb);
}

#[test]
fn fresh_solvers_are_deterministic() {
    let first = solver(true);
    let second = solver(true);
    let game = first.game();
    let tensor = KBeliefTensor::initial(game, 1);
    let state = game.initial_state();
    let belief = game.initial_belief(0, 2);
    let a = first
        .solve(&state, 0, 2, Some(&belief), &tensor)
        .expect("solve");
    let b = second
        .solve(&state, 0, 2, Some(&belief), &tensor)
        .expect("solve");
    assert_bitwise_eq(&a, &b);
}

#[test]
fn shared_solver_gives_the_same_answers_across_threads() {
    let shared = solver(true);
    let reference = solver(true);
    let game = reference.game();
    let state = game.initial_state();
    let tensor = KBeliefTensor::initial(game, 1);

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..3)
            .map(|player| {
                let shared = &shared;
                let tensor = &tensor;
                scope.spawn(move || {
                    let belief = shared.game().initial_belief(player, 1);
                    shared
                        .solve(&state, player, 1, Some(&belief), tensor)
                        .expect("threaded solve")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread finished"))
            .collect()
    });

    for (player, threaded) in results.iter().enumerate() {
        let belief = game.initial_belief(player, 1);
        let expected = reference
            .solve(&state, player, 1, Some(&belief), &tensor)
            .expect("reference solve");
        assert_bitwise_eq(threaded, &expected);
    }
}
