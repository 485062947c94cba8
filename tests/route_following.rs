//! Planner and controller driven together over real level layouts, without
//! the ECS.

use cavern::ai::pathfinder::route_cost;
use cavern::ai::{
    AStarPlanner, Cell, Grid, PursuerController, PursuitState, ReplanOutcome, RoutePlanner, Tile,
};
use cavern::plugins::level::LevelMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CELL: u32 = 30;

/// Tick the controller, replanning every `replan_every` ticks like the
/// game's timer does, until it stands on `target`.
fn chase(
    level: &LevelMap,
    controller: &mut PursuerController,
    target: Cell,
    threats: &[Cell],
    replan_every: usize,
    max_ticks: usize,
) -> Option<usize> {
    for tick in 0..max_ticks {
        if tick % replan_every == 0 {
            let own = controller.cell();
            controller.request_replan(&level.grid, own, target, threats);
        }
        controller.advance(1.0);
        if controller.cell() == target {
            return Some(tick + 1);
        }
    }
    None
}

#[test]
fn every_bundled_spawn_reaches_the_player() {
    let level = LevelMap::load("assets/levels/level_01.txt").unwrap();
    for &spawn in &level.enemy_spawns {
        let mut controller = PursuerController::at_cell(AStarPlanner::default(), spawn, 2.0, CELL);
        let ticks = chase(&level, &mut controller, level.player_spawn, &[], 6, 20_000);
        assert!(ticks.is_some(), "pursuer from {spawn} never arrived");
    }
}

#[test]
fn walked_cells_follow_the_planned_route() {
    let level = LevelMap::parse(
        "\
#########
#P......#
#.#####.#
#.....#.#
#####.#E#
#########",
    )
    .unwrap();
    let spawn = level.enemy_spawns[0];
    let planned = AStarPlanner::default().search(&level.grid, spawn, level.player_spawn, &[]);
    assert!(!planned.is_empty());

    let mut controller = PursuerController::at_cell(AStarPlanner::default(), spawn, 3.0, CELL);
    controller.request_replan(&level.grid, spawn, level.player_spawn, &[]);

    let mut visited = vec![controller.cell()];
    while controller.state() == PursuitState::Following {
        controller.advance(1.0);
        if visited.last() != Some(&controller.cell()) {
            visited.push(controller.cell());
        }
        assert!(visited.len() <= planned.len(), "wandered off the route");
    }

    assert_eq!(visited, planned);
    assert_eq!(controller.cell(), level.player_spawn);
}

#[test]
fn moving_target_triggers_fresh_search() {
    let level = LevelMap::parse(
        "\
#######
#P....#
#.....#
#....E#
#######",
    )
    .unwrap();
    let spawn = level.enemy_spawns[0];
    let mut controller = PursuerController::at_cell(AStarPlanner::default(), spawn, 2.0, CELL);

    let first = controller.request_replan(&level.grid, spawn, Cell::new(1, 1), &[]);
    assert!(matches!(first, ReplanOutcome::Installed(_)));
    assert_eq!(
        controller.request_replan(&level.grid, spawn, Cell::new(1, 1), &[]),
        ReplanOutcome::Suppressed
    );

    let moved = controller.request_replan(&level.grid, spawn, Cell::new(3, 1), &[]);
    assert_eq!(moved, ReplanOutcome::Installed(4));
    assert_eq!(controller.route().last(), Some(&Cell::new(3, 1)));
}

#[test]
fn threat_on_one_side_costs_a_detour() {
    // Two equal ways around the central block.
    let level = LevelMap::parse(
        "\
#########
#.......#
#.#####.#
#P#####E#
#.#####.#
#.......#
#########",
    )
    .unwrap();
    let spawn = level.enemy_spawns[0];
    let planner = AStarPlanner::default();

    let free = planner.search(&level.grid, spawn, level.player_spawn, &[]);

    let below = planner.search(&level.grid, spawn, level.player_spawn, &[Cell::new(5, 4)]);
    assert!((route_cost(&free) - route_cost(&below)).abs() < 1e-9);
    assert!(below.iter().all(|c| c.row <= 3), "route went past the threat: {below:?}");

    let above = planner.search(&level.grid, spawn, level.player_spawn, &[Cell::new(1, 4)]);
    assert!((route_cost(&free) - route_cost(&above)).abs() < 1e-9);
    assert!(above.iter().all(|c| c.row >= 3), "route went past the threat: {above:?}");
}

#[test]
fn chasers_stay_on_open_floor_every_tick() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let planner = AStarPlanner::default();
    let mut chased = 0;

    while chased < 300 {
        let width = rng.gen_range(4..=16);
        let height = rng.gen_range(4..=16);
        let grid = Grid::from_fn(width, height, |_| {
            if rng.gen_bool(0.3) { Tile::Blocked } else { Tile::Open }
        });
        let open: Vec<Cell> = (0..grid.len())
            .map(|i| grid.cell_at(i))
            .filter(|&c| grid.is_open(c))
            .collect();
        if open.len() < 2 {
            continue;
        }
        let start = open[rng.gen_range(0..open.len())];
        let target = open[rng.gen_range(0..open.len())];
        if start == target || planner.search(&grid, start, target, &[]).is_empty() {
            continue;
        }
        chased += 1;

        let speed = [0.7, 2.0, 2.5, 3.3, 7.0, 29.0, 40.0][rng.gen_range(0..7)];
        let cell_size = [10, 17, 30][rng.gen_range(0..3)];
        let mut controller = PursuerController::at_cell(planner, start, speed, cell_size);

        let mut arrived = false;
        for tick in 0..5_000 {
            if tick % 6 == 0 {
                let own = controller.cell();
                controller.request_replan(&grid, own, target, &[]);
            }
            controller.advance(1.0);
            assert!(
                grid.is_open(controller.cell()),
                "left open floor at {} ({:?}) chasing {start} -> {target}",
                controller.cell(),
                controller.position()
            );
            if controller.cell() == target && controller.state() == PursuitState::Idle {
                arrived = true;
                break;
            }
        }
        assert!(arrived, "never reached {target} from {start} at speed {speed}");
    }
}
