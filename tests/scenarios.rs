//! End-to-end checks through the public API.

use stynker::prelude::*;

const TOL: f32 = 1.0e-3;

fn single_node_mind(capacity: Charge, gain: Charge) -> Mind {
    let nodes = vec![Node::new(0, NodeKind::Regular, capacity, gain)];
    Mind::from_parts(MindConfig::with_size(1, 0, 0), nodes, Vec::new()).unwrap()
}

#[test]
fn node_fills_over_four_dream_ticks_then_spills() {
    let mut mind = single_node_mind(10, 3);
    for _ in 0..3 {
        let ev = mind.run_cycle(Phase::Dream).unwrap();
        assert!(ev.spilled.is_empty());
    }
    assert_eq!(mind.node(0).unwrap().level, 9);

    let ev = mind.run_cycle(Phase::Dream).unwrap();
    assert_eq!(ev.spilled, vec![0]);
    let node = mind.node(0).unwrap();
    assert_eq!(node.level, 0);
    assert_eq!(node.damage, 1);
}

#[test]
fn body_bounces_back_off_the_right_wall() {
    let arena = Arena::new(&ArenaDefinition::square(10.0)).unwrap();
    let r = arena
        .resolve_displacement(Vec2::ZERO, Vec2::new(15.0, 0.0), None)
        .unwrap();
    assert!(r.position.approx_eq(Vec2::new(5.0, 0.0), TOL));
    assert!(r.velocity.approx_eq(Vec2::new(-15.0, 0.0), TOL));
    assert!(!r.won && !r.lost && !r.degenerate);
}

#[test]
fn least_damaged_nodes_are_remade_lowest_id_first() {
    let nodes = [5u64, 1, 3, 1]
        .iter()
        .enumerate()
        .map(|(id, &damage)| {
            let mut n = Node::new(id, NodeKind::Regular, 10, 1);
            n.damage = damage;
            n
        })
        .collect();
    let cfg = MindConfig::with_size(4, 0, 0).with_remodel(2, RemodelPolicy::DamageOrdered);
    let mut mind = Mind::from_parts(cfg, nodes, Vec::new()).unwrap();
    assert_eq!(mind.select_for_remodel(), vec![1, 3]);

    let ev = mind.run_cycle(Phase::Sleep).unwrap();
    assert_eq!(ev.remade, vec![1, 3]);
    assert!(mind.nodes().iter().all(|n| n.damage == 0));
}

#[test]
fn reverse_index_survives_long_remodel_runs() {
    for policy in [RemodelPolicy::DamageOrdered, RemodelPolicy::UniformRandom] {
        let cfg = MindConfig::default().with_seed(11).with_remodel(6, policy);
        let mut mind = Mind::new(cfg).unwrap();
        for round in 0..60 {
            for _ in 0..10 {
                mind.run_cycle(Phase::Dream).unwrap();
            }
            mind.run_cycle(Phase::Sleep).unwrap();
            assert!(mind.reverse_index_consistent(), "round {round} ({policy:?})");
            for (source, edge) in mind.edges() {
                assert_ne!(source, edge.target);
                assert!(edge.delay >= 1);
            }
        }
    }
}

#[test]
fn mind_image_round_trip_keeps_edges_and_pulses() {
    let mut mind = Mind::new(MindConfig::default().with_seed(5)).unwrap();
    for _ in 0..25 {
        mind.run_cycle(Phase::Dream).unwrap();
    }
    let bytes = mind.save_image_bytes().unwrap();
    assert_eq!(bytes.len(), mind.image_size_bytes().unwrap());
    let loaded = Mind::load_image_bytes(&bytes).unwrap();

    let pairs = |m: &Mind| {
        let mut v: Vec<(NodeId, Edge)> = m.edges().map(|(s, e)| (s, e.clone())).collect();
        v.sort_by_key(|(s, e)| (*s, e.target, e.weight, e.delay));
        v
    };
    assert_eq!(pairs(&mind), pairs(&loaded));
    assert_eq!(mind.nodes(), loaded.nodes());
    assert!(loaded.reverse_index_consistent());
}

#[test]
fn agent_stays_inside_a_closed_square() {
    let half = 60.0;
    let cfg = AgentConfig::default().with_arena(ArenaDefinition::square(half));
    let mut agent = Agent::new(&cfg).unwrap();
    for _ in 0..2_000 {
        let ev = agent.run_cycle(Phase::Wake).unwrap();
        assert!(!ev.is_terminal());
        assert!(!ev.degenerate);
        assert!(ev.position.x.abs() <= half + TOL, "{:?}", ev.position);
        assert!(ev.position.y.abs() <= half + TOL, "{:?}", ev.position);
    }
}

#[test]
fn reflection_preserves_speed_in_the_maze() {
    let arena = Arena::new(&ArenaDefinition::simple_maze()).unwrap();
    for (vx, vy) in [(50.0, 400.0), (-300.0, 20.0), (90.0, -90.0), (0.0, 500.0)] {
        let v = Vec2::new(vx, vy);
        let r = arena.resolve_displacement(Vec2::ZERO, v, None).unwrap();
        if !r.won && !r.lost && !r.degenerate {
            assert!((r.velocity.length() - v.length()).abs() < 0.01);
        }
    }
}

#[test]
fn same_seed_same_trajectory() {
    let cfg = AgentConfig {
        mind: MindConfig::default().with_seed(21),
        ..AgentConfig::default()
    };
    let mut a = Agent::new(&cfg).unwrap();
    let mut b = Agent::new(&cfg).unwrap();
    for phase in Schedule::parse("3*(wake:50,sleep:1),dream:20").unwrap().phases() {
        let ea = a.run_cycle(phase).unwrap();
        let eb = b.run_cycle(phase).unwrap();
        assert_eq!(ea, eb);
    }
}

#[test]
fn invalid_configs_fail_at_construction() {
    let too_many_io = MindConfig::with_size(10, 6, 6);
    assert!(matches!(Mind::new(too_many_io), Err(StynkerError::InvalidConfig(_))));

    let too_many_remakes =
        MindConfig::with_size(10, 2, 2).with_remodel(11, RemodelPolicy::DamageOrdered);
    assert!(Mind::new(too_many_remakes).is_err());

    let mut odd = AgentConfig::default();
    odd.mind.input_count = 3;
    assert!(Agent::new(&odd).is_err());
}

#[test]
fn regular_nodes_refuse_activation() {
    let mut mind = single_node_mind(10, 1);
    assert!(matches!(
        mind.activate(0),
        Err(StynkerError::InvalidOperation { id: 0, kind: NodeKind::Regular })
    ));
    assert!(matches!(mind.activate(7), Err(StynkerError::UnknownNode(7))));
}

#[test]
fn simulation_tallies_terminal_contacts() {
    let mut cfg = SimulationConfig::default();
    cfg.agent.arena = ArenaDefinition::square(40.0).with_terminals(Some(0), Some(2));
    cfg.agent.friction = 1.0;
    cfg.agents = 2;
    cfg.rounds = 1;
    cfg.schedule = Schedule::parse("5*(wake:200,sleep:1)").unwrap();

    let mut terminal = 0u64;
    let mut observer = |_t: u64, _i: usize, _p: Phase, ev: &AgentEvents| {
        if ev.is_terminal() {
            terminal += 1;
        }
    };
    let mut sim = Simulation::new(cfg).unwrap();
    let result = sim.run(&mut observer).unwrap();
    let tallied: u64 = result.agents.iter().map(|s| s.wins + s.losses).sum();
    assert_eq!(tallied, terminal);
    assert_eq!(result.ticks, 1005);
}
