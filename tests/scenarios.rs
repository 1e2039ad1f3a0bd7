//! Turn-resolution scenarios over the public API.
//!
//! Each scenario builds a game through the store, submits orders, resolves,
//! and checks outcomes and the committed world.

use regency::order::{Command, DefaultOrderPolicy, InvalidCommandError, RawCommand};
use regency::resolve::{Outcome, Reason, ResolveError, Resolver, TurnReport};
use regency::store::{CharacterSpec, GameStore, StoreError};
use regency::world::{CharacterId, GameId, PlayerId, Region, Stats, TurnStatus, UserId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Table {
    store: GameStore,
    game: GameId,
    players: Vec<PlayerId>,
}

impl Table {
    fn new(players: u32) -> Table {
        let store = GameStore::new();
        let game = store.create_game("scenario");
        let players = (1..=players)
            .map(|u| store.add_player(game, UserId(u), &format!("house {}", u), 100).unwrap())
            .collect();
        Table { store, game, players }
    }

    fn recruit(&self, player: usize, stats: Stats, at: Region) -> CharacterId {
        self.store
            .add_character(
                self.players[player],
                CharacterSpec {
                    name: format!("agent of {}", player),
                    stats,
                    location: Some(at),
                    ..Default::default()
                },
            )
            .unwrap()
    }

    fn order(&self, character: CharacterId, commands: Vec<Command>) {
        self.store.submit_orders(character, commands).unwrap();
    }

    fn resolve(&self) -> TurnReport {
        self.store
            .resolve_current_turn(self.game, &Resolver::default(), DefaultOrderPolicy::Hide)
            .unwrap()
    }
}

fn outcome(report: &TurnReport, character: CharacterId, slot: u8) -> (Outcome, Option<Reason>) {
    let entry = report
        .log
        .iter()
        .find(|e| e.character == character && e.slot == slot)
        .unwrap_or_else(|| panic!("no log entry for {} slot {}", character, slot));
    (entry.outcome, entry.reason)
}

fn martial(m: i32) -> Stats {
    Stats::new(m, 0, 0, 0, 0)
}

fn intrigue(i: i32) -> Stats {
    Stats::new(0, i, 0, 0, 0)
}

// ---------------------------------------------------------------------------
// Worked examples
// ---------------------------------------------------------------------------

#[test]
fn stronger_move_takes_region_weaker_is_blocked() {
    let t = Table::new(2);
    let a = t.recruit(0, martial(5), Region::Capital);
    let b = t.recruit(1, martial(3), Region::Harbor);
    t.order(a, vec![Command::Move { from: Region::Capital, to: Region::Northmarch }]);
    t.order(b, vec![Command::Move { from: Region::Harbor, to: Region::Northmarch }]);

    let report = t.resolve();
    assert_eq!(outcome(&report, a, 1).0, Outcome::Success);
    assert_eq!(outcome(&report, b, 1).0, Outcome::Blocked);

    let world = t.store.world(t.game).unwrap();
    assert_eq!(world.controller(Region::Northmarch), Some(a));
    assert_eq!(world.character(a).unwrap().location, Some(Region::Northmarch));
    assert_eq!(world.character(b).unwrap().location, Some(Region::Harbor));
}

#[test]
fn hide_defeats_assassination_in_the_same_slot() {
    let t = Table::new(2);
    let c = t.recruit(0, intrigue(9), Region::Capital);
    let d = t.recruit(1, intrigue(1), Region::Capital);
    t.order(c, vec![Command::Assassinate { target: d }]);
    t.order(d, vec![Command::Hide]);

    let report = t.resolve();
    assert_eq!(outcome(&report, c, 1), (Outcome::Blocked, Some(Reason::TargetHidden)));
    assert_eq!(outcome(&report, d, 1).0, Outcome::Success);
    assert!(t.store.world(t.game).unwrap().character(d).unwrap().alive);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn resolving_identical_inputs_twice_gives_identical_state() {
    let build = || {
        let t = Table::new(3);
        let a = t.recruit(0, Stats::new(4, 3, 2, 2, 1), Region::Capital);
        let b = t.recruit(1, Stats::new(4, 1, 3, 1, 2), Region::Eastreach);
        let c = t.recruit(2, Stats::new(2, 5, 1, 3, 0), Region::Southvale);
        t.store.set_controller(t.game, Region::Eastreach, Some(b)).unwrap();
        t.order(a, vec![Command::Move { from: Region::Capital, to: Region::Eastreach }, Command::Tax]);
        t.order(b, vec![Command::Contest { region: Region::Eastreach }, Command::Theft { target: PlayerId(3) }]);
        t.order(c, vec![Command::Theft { target: PlayerId(1) }, Command::Scheme { target: a }]);
        let report = t.resolve();
        (report, t.store.world(t.game).unwrap())
    };
    let (r1, w1) = build();
    let (r2, w2) = build();
    assert_eq!(r1, r2);
    assert_eq!(w1.characters, w2.characters);
    assert_eq!(w1.players, w2.players);
    assert_eq!(w1.control, w2.control);
}

#[test]
fn equal_movers_resolve_by_character_id() {
    let t = Table::new(2);
    let first = t.recruit(0, martial(4), Region::Capital);
    let second = t.recruit(1, martial(4), Region::Harbor);
    // Submission order must not matter.
    t.order(second, vec![Command::Move { from: Region::Harbor, to: Region::Westmoor }]);
    t.order(first, vec![Command::Move { from: Region::Capital, to: Region::Westmoor }]);

    let report = t.resolve();
    assert_eq!(outcome(&report, first, 1).0, Outcome::Success);
    assert_eq!(outcome(&report, second, 1), (Outcome::Blocked, Some(Reason::LostTieBreak)));
}

#[test]
fn the_dead_issue_no_further_orders() {
    let t = Table::new(2);
    let killer = t.recruit(0, intrigue(6), Region::Capital);
    let victim = t.recruit(1, intrigue(1), Region::Harbor);
    t.order(killer, vec![Command::Assassinate { target: victim }]);
    t.order(victim, vec![Command::Train, Command::Train]);
    let report = t.resolve();
    assert_eq!(outcome(&report, killer, 1).0, Outcome::Success);

    let err = t.store.submit_orders(victim, vec![Command::Hide]).unwrap_err();
    assert!(matches!(err, StoreError::DeadCharacter(id) if id == victim));

    // A dead character gets no implicit order either.
    let report = t.resolve();
    assert!(report.log.iter().all(|e| e.character != victim));
}

#[test]
fn one_current_turn_after_each_advance() {
    let t = Table::new(1);
    t.recruit(0, Stats::default(), Region::Capital);
    for expected in 1..=4u32 {
        let report = t.resolve();
        assert_eq!(report.sequence, expected);
        let world = t.store.world(t.game).unwrap();
        assert_eq!(world.current_turn_count(), 1);
        let current = world.current_turn().unwrap();
        assert_eq!(current.sequence, expected + 1);
        assert_eq!(current.status, TurnStatus::Open);
        assert!(world
            .turns
            .iter()
            .filter(|t| !t.current)
            .all(|t| t.status == TurnStatus::Resolved));
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn malformed_commands_never_reach_resolution() {
    let t = Table::new(1);
    let a = t.recruit(0, Stats::default(), Region::Capital);
    let mut raw = RawCommand::bare(regency::order::CommandKind::Assassinate);
    let err = t.store.submit_raw(a, &[raw]).unwrap_err();
    assert!(matches!(err, StoreError::InvalidCommand(InvalidCommandError::MissingField { .. })));

    raw.character_target = Some(a);
    assert!(t.store.submit_raw(a, &[raw]).is_ok());
}

#[test]
fn incomplete_orders_abort_the_whole_turn() {
    let t = Table::new(2);
    let a = t.recruit(0, Stats::new(0, 0, 0, 4, 0), Region::Capital);
    t.recruit(1, Stats::default(), Region::Harbor);
    t.order(a, vec![Command::Income]);
    let before = t.store.world(t.game).unwrap();

    let err = t
        .store
        .resolve_current_turn(t.game, &Resolver::default(), DefaultOrderPolicy::Require)
        .unwrap_err();
    assert!(matches!(err, StoreError::Resolve(ResolveError::IncompleteOrders(_))));
    assert_eq!(t.store.world(t.game).unwrap(), before);

    // Safe to retry once the policy allows defaults.
    let report = t.resolve();
    assert_eq!(report.sequence, 1);
}
