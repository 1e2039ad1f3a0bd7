//! Conflict resolution.
//!
//! Resolves a turn's order set slot by slot. Within a slot, tiers from the
//! precedence table resolve in order; within a tier every command is judged
//! against the same snapshot, grouped by what it contests:
//!
//! - moves and contests by region,
//! - thefts by victim player,
//! - bribes by paying player,
//! - everything else on its own.
//!
//! Groups are independent, so they are judged in parallel. Their changes are
//! then applied in character-id order, producing absolute `Effect`s and one
//! `LogEntry` per command. Ties inside a group rank by the relevant stat
//! (descending) and then by character id (ascending).

use std::collections::{BTreeMap, BTreeSet};
use std::slice;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::effect::{Effect, LogEntry, Outcome, Reason, Resolution};
use super::mutate::{apply_effect, MutationError};
use super::precedence::PrecedenceTable;
use crate::order::{Command, OrderSet, MAX_SLOTS};
use crate::world::{Character, CharacterId, PlayerId, Region, Stat, World};

/// Numeric parameters of command effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Upper bound for any stat raised by a command.
    pub max_stat: i32,
    /// Tax yield per controlled region, before the control bonus.
    pub tax_per_region: i64,
    /// Gold per point of finance for Trade.
    pub trade_rate: i64,
    /// Gold per point of intrigue margin for Theft.
    pub theft_rate: i64,
    pub bribe_cost: i64,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            max_stat: 10,
            tax_per_region: 5,
            trade_rate: 3,
            theft_rate: 10,
            bribe_cost: 20,
        }
    }
}

/// A command waiting for judgement.
#[derive(Debug, Clone, Copy)]
struct Pending {
    slot: u8,
    character: CharacterId,
    command: Command,
    implicit: bool,
}

/// A requested state change, relative to the tier snapshot.
#[derive(Debug, Clone, Copy)]
enum Change {
    Stat { character: CharacterId, stat: Stat, delta: i32 },
    Kill { character: CharacterId },
    Relocate { character: CharacterId, to: Region },
    Control { region: Region, to: Option<CharacterId> },
    Treasury { player: PlayerId, delta: i64 },
    /// Moves up to `amount` gold, limited by what the payer holds when the
    /// change is applied.
    Transfer { payer: PlayerId, payee: PlayerId, amount: i64 },
    Conceal { character: CharacterId },
    Protect { target: CharacterId, guard: CharacterId },
    Embargo { region: Region, player: PlayerId },
}

/// Judgement of one command.
#[derive(Debug)]
struct Verdict {
    pending: Pending,
    outcome: Outcome,
    reason: Option<Reason>,
    changes: Vec<Change>,
}

impl Verdict {
    fn success(pending: Pending, changes: Vec<Change>) -> Self {
        Verdict { pending, outcome: Outcome::Success, reason: None, changes }
    }

    fn blocked(pending: Pending, reason: Reason) -> Self {
        Verdict { pending, outcome: Outcome::Blocked, reason: Some(reason), changes: Vec::new() }
    }

    fn failed(pending: Pending, reason: Reason) -> Self {
        Verdict { pending, outcome: Outcome::Failed, reason: Some(reason), changes: Vec::new() }
    }
}

/// What a command competes over inside its tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Solo(CharacterId),
    MoveInto(Region),
    ContestFor(Region),
    TheftFrom(PlayerId),
    BribeBy(PlayerId),
}

fn group_key(pending: &Pending, actor: &Character) -> GroupKey {
    match pending.command {
        Command::Move { to, .. } => GroupKey::MoveInto(to),
        Command::Contest { region } => GroupKey::ContestFor(region),
        Command::Theft { target } => GroupKey::TheftFrom(target),
        Command::Bribe { .. } => GroupKey::BribeBy(actor.player),
        _ => GroupKey::Solo(pending.character),
    }
}

/// Turn-scoped stances. They shape later judgements but are never persisted.
#[derive(Debug, Clone, Default)]
struct Stances {
    hidden: BTreeSet<CharacterId>,
    /// Guards of each protected character.
    guards: BTreeMap<CharacterId, BTreeSet<CharacterId>>,
    /// Players embargoing each region.
    embargoes: BTreeMap<Region, BTreeSet<PlayerId>>,
}

/// Resolves order sets under a precedence table and effect rules.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    precedence: PrecedenceTable,
    rules: Rules,
}

impl Resolver {
    pub fn new(precedence: PrecedenceTable, rules: Rules) -> Self {
        Resolver { precedence, rules }
    }

    pub fn precedence(&self) -> &PrecedenceTable {
        &self.precedence
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Resolves every slot of `orders` against `world`.
    ///
    /// The world is not modified; the returned effects describe the
    /// successor state.
    pub fn resolve(&self, orders: &OrderSet, world: &World) -> Result<Resolution, MutationError> {
        let mut working = world.clone();
        let mut stances = Stances::default();
        let mut resolution = Resolution::default();
        let tiers = self.precedence.tiers();

        for slot in 1..=orders.depth().min(MAX_SLOTS) {
            let slot_pending: Vec<Pending> = orders
                .entries()
                .iter()
                .filter_map(|e| {
                    e.commands.get(slot - 1).map(|cmd| Pending {
                        slot: slot as u8,
                        character: e.character,
                        command: *cmd,
                        implicit: e.implicit,
                    })
                })
                .collect();

            for tier in &tiers {
                let pending: Vec<Pending> = slot_pending
                    .iter()
                    .filter(|p| tier.contains(&p.command.kind()))
                    .copied()
                    .collect();
                if pending.is_empty() {
                    continue;
                }

                for verdict in self.judge_tier(&pending, &working, &stances) {
                    let p = verdict.pending;
                    debug!(
                        slot = p.slot,
                        character = %p.character,
                        kind = %p.command.kind(),
                        outcome = %verdict.outcome,
                        "command resolved"
                    );
                    for change in &verdict.changes {
                        self.apply_change(*change, &mut working, &mut stances, &mut resolution.effects)?;
                    }
                    resolution.log.push(LogEntry {
                        slot: p.slot,
                        character: p.character,
                        command: p.command,
                        outcome: verdict.outcome,
                        reason: verdict.reason,
                        implicit: p.implicit,
                    });
                }
            }
        }

        Ok(resolution)
    }

    /// Judges one tier against a fixed snapshot. Verdicts come back in
    /// character-id order regardless of how the groups were scheduled.
    fn judge_tier(&self, pending: &[Pending], world: &World, stances: &Stances) -> Vec<Verdict> {
        let mut verdicts = Vec::new();
        let mut groups: BTreeMap<GroupKey, Vec<Pending>> = BTreeMap::new();

        for p in pending {
            match world.character(p.character) {
                Some(actor) if actor.alive => {
                    groups.entry(group_key(p, actor)).or_default().push(*p);
                }
                _ => verdicts.push(Verdict::failed(*p, Reason::Dead)),
            }
        }

        let movers = pending
            .iter()
            .filter(|p| match p.command {
                Command::Move { from, .. } => world
                    .character(p.character)
                    .is_some_and(|c| c.alive && c.location == Some(from)),
                _ => false,
            })
            .map(|p| p.character)
            .collect();

        let view = TierView { world, stances, movers, rules: &self.rules };
        let groups: Vec<(GroupKey, Vec<Pending>)> = groups.into_iter().collect();
        let judged: Vec<Vec<Verdict>> = groups
            .par_iter()
            .map(|(key, members)| view.judge_group(*key, members))
            .collect();

        verdicts.extend(judged.into_iter().flatten());
        verdicts.sort_by_key(|v| v.pending.character);
        verdicts
    }

    fn apply_change(
        &self,
        change: Change,
        world: &mut World,
        stances: &mut Stances,
        effects: &mut Vec<Effect>,
    ) -> Result<(), MutationError> {
        let mut emit = |world: &mut World, effect: Effect| -> Result<(), MutationError> {
            apply_effect(world, &effect)?;
            effects.push(effect);
            Ok(())
        };

        match change {
            Change::Stat { character, stat, delta } => {
                let from = world
                    .character(character)
                    .ok_or(MutationError::UnknownCharacter(character))?
                    .stats
                    .get(stat);
                let mut to = from.saturating_add(delta).max(0);
                if delta > 0 {
                    to = to.min(self.rules.max_stat.max(from));
                }
                if to != from {
                    emit(world, Effect::Stat { character, stat, from, to })?;
                }
            }
            Change::Kill { character } => {
                let alive = world
                    .character(character)
                    .ok_or(MutationError::UnknownCharacter(character))?
                    .alive;
                if alive {
                    emit(world, Effect::Death { character })?;
                    for region in world.regions_controlled_by(character) {
                        emit(world, Effect::Control { region, from: Some(character), to: None })?;
                    }
                }
            }
            Change::Relocate { character, to } => {
                let from = world
                    .character(character)
                    .ok_or(MutationError::UnknownCharacter(character))?
                    .location;
                if from != Some(to) {
                    emit(world, Effect::Relocate { character, from, to })?;
                }
            }
            Change::Control { region, to } => {
                let from = world.controller(region);
                if from != to {
                    emit(world, Effect::Control { region, from, to })?;
                }
            }
            Change::Treasury { player, delta } => {
                let from = world
                    .player(player)
                    .ok_or(MutationError::UnknownPlayer(player))?
                    .treasury;
                let to = from.saturating_add(delta).max(0);
                if to != from {
                    emit(world, Effect::Treasury { player, from, to })?;
                }
            }
            Change::Transfer { payer, payee, amount } => {
                let paid_from = world
                    .player(payer)
                    .ok_or(MutationError::UnknownPlayer(payer))?
                    .treasury;
                let received_from = world
                    .player(payee)
                    .ok_or(MutationError::UnknownPlayer(payee))?
                    .treasury;
                let moved = amount.min(paid_from).max(0);
                if moved > 0 && payer != payee {
                    emit(
                        world,
                        Effect::Treasury { player: payer, from: paid_from, to: paid_from - moved },
                    )?;
                    emit(
                        world,
                        Effect::Treasury {
                            player: payee,
                            from: received_from,
                            to: received_from.saturating_add(moved),
                        },
                    )?;
                }
            }
            Change::Conceal { character } => {
                stances.hidden.insert(character);
            }
            Change::Protect { target, guard } => {
                stances.guards.entry(target).or_default().insert(guard);
            }
            Change::Embargo { region, player } => {
                stances.embargoes.entry(region).or_default().insert(player);
            }
        }
        Ok(())
    }
}

/// Read-only view of the state a tier is judged against.
struct TierView<'a> {
    world: &'a World,
    stances: &'a Stances,
    /// Characters leaving their region in this tier.
    movers: BTreeSet<CharacterId>,
    rules: &'a Rules,
}

impl TierView<'_> {
    fn judge_group(&self, key: GroupKey, members: &[Pending]) -> Vec<Verdict> {
        match key {
            GroupKey::Solo(_) => members.iter().flat_map(|p| self.judge_solo(p)).collect(),
            GroupKey::MoveInto(region) => self.judge_moves(region, members),
            GroupKey::ContestFor(region) => self.judge_contests(region, members),
            GroupKey::TheftFrom(victim) => self.judge_thefts(victim, members),
            GroupKey::BribeBy(payer) => self.judge_bribes(payer, members),
        }
    }

    fn judge_solo(&self, p: &Pending) -> Vec<Verdict> {
        let Some(actor) = self.world.character(p.character) else {
            return vec![Verdict::failed(*p, Reason::Dead)];
        };
        let p = *p;

        let verdict = match p.command {
            Command::Hide => Verdict::success(p, vec![Change::Conceal { character: actor.id }]),
            Command::Guard { target } => match self.living_target(actor, target) {
                Ok(_) => Verdict::success(p, vec![Change::Protect { target, guard: actor.id }]),
                Err(reason) => Verdict::failed(p, reason),
            },
            Command::Scheme { target } => match self.living_target(actor, target) {
                Err(reason) => Verdict::failed(p, reason),
                Ok(_) if self.stances.hidden.contains(&target) => {
                    Verdict::blocked(p, Reason::TargetHidden)
                }
                Ok(victim) if actor.stats.intrigue > victim.stats.intrigue => Verdict::success(
                    p,
                    vec![Change::Stat { character: target, stat: Stat::Charisma, delta: -1 }],
                ),
                Ok(_) => Verdict::blocked(p, Reason::Outmatched),
            },
            Command::Assassinate { target } => match self.living_target(actor, target) {
                Err(reason) => Verdict::failed(p, reason),
                Ok(_) if self.stances.hidden.contains(&target) => {
                    Verdict::blocked(p, Reason::TargetHidden)
                }
                Ok(victim) => {
                    let defence = victim.stats.intrigue.saturating_add(self.guard_strength(target));
                    if actor.stats.intrigue > defence {
                        Verdict::success(p, vec![Change::Kill { character: target }])
                    } else {
                        Verdict::blocked(p, Reason::Outmatched)
                    }
                }
            },
            Command::Embargo { region } => {
                if self.world.controller(region) != Some(actor.id) {
                    Verdict::failed(p, Reason::NotController)
                } else {
                    Verdict::success(p, vec![Change::Embargo { region, player: actor.player }])
                }
            }
            Command::Tax => {
                let regions = self.world.regions_controlled_by(actor.id).len() as i64;
                if regions == 0 {
                    Verdict::failed(p, Reason::NoRegions)
                } else {
                    let per_region = self.rules.tax_per_region.saturating_add(actor.stats.control as i64);
                    let delta = regions.saturating_mul(per_region);
                    Verdict::success(p, vec![Change::Treasury { player: actor.player, delta }])
                }
            }
            Command::Trade { region } => {
                let embargoed = self
                    .stances
                    .embargoes
                    .get(&region)
                    .is_some_and(|players| players.iter().any(|pl| *pl != actor.player));
                if embargoed {
                    Verdict::blocked(p, Reason::Embargoed)
                } else {
                    let delta = (actor.stats.finance as i64).saturating_mul(self.rules.trade_rate);
                    Verdict::success(p, vec![Change::Treasury { player: actor.player, delta }])
                }
            }
            Command::Income => Verdict::success(
                p,
                vec![Change::Treasury { player: actor.player, delta: actor.stats.finance as i64 }],
            ),
            Command::Train => self.raise(p, actor, Stat::Martial),
            Command::Study => self.raise(p, actor, Stat::Intrigue),
            Command::Govern { region } => {
                if self.world.controller(region) != Some(actor.id) {
                    Verdict::failed(p, Reason::NotController)
                } else {
                    self.raise(p, actor, Stat::Control)
                }
            }
            // Contested kinds judged as a group of one.
            Command::Move { to, .. } => return self.judge_moves(to, slice::from_ref(&p)),
            Command::Contest { region } => return self.judge_contests(region, slice::from_ref(&p)),
            Command::Theft { target } => return self.judge_thefts(target, slice::from_ref(&p)),
            Command::Bribe { .. } => return self.judge_bribes(actor.player, slice::from_ref(&p)),
        };
        vec![verdict]
    }

    fn raise(&self, p: Pending, actor: &Character, stat: Stat) -> Verdict {
        if actor.stats.get(stat) >= self.rules.max_stat {
            Verdict::failed(p, Reason::StatAtCap)
        } else {
            Verdict::success(p, vec![Change::Stat { character: actor.id, stat, delta: 1 }])
        }
    }

    fn living_target(&self, actor: &Character, target: CharacterId) -> Result<&'_ Character, Reason> {
        if target == actor.id {
            return Err(Reason::SelfTarget);
        }
        match self.world.character(target) {
            None => Err(Reason::UnknownTarget),
            Some(c) if !c.alive => Err(Reason::TargetDead),
            Some(c) => Ok(c),
        }
    }

    /// Combined martial of the living guards protecting `target`.
    fn guard_strength(&self, target: CharacterId) -> i32 {
        self.stances
            .guards
            .get(&target)
            .map(|guards| {
                guards
                    .iter()
                    .filter_map(|g| self.world.character(*g))
                    .filter(|g| g.alive)
                    .fold(0i32, |sum, g| sum.saturating_add(g.stats.martial))
            })
            .unwrap_or(0)
    }

    /// Strength with which a region's controller resists `challenger`.
    ///
    /// Zero unless the controller is alive, belongs to another player,
    /// stands in the region, and is not leaving it this tier.
    fn hold_strength(&self, region: Region, challenger: &Character, stat: Stat) -> i32 {
        self.world
            .controller(region)
            .and_then(|id| self.world.character(id))
            .filter(|c| {
                c.alive
                    && c.player != challenger.player
                    && c.location == Some(region)
                    && !self.movers.contains(&c.id)
            })
            .map(|c| c.stats.get(stat))
            .unwrap_or(0)
    }

    /// Ranks contenders for a region and lets the strongest try the holder.
    fn judge_region_claim(
        &self,
        region: Region,
        mut contenders: Vec<(Pending, &Character)>,
        stat: Stat,
        changes: impl Fn(&Character) -> Vec<Change>,
    ) -> Vec<Verdict> {
        contenders.sort_by(|a, b| {
            b.1.stats
                .get(stat)
                .cmp(&a.1.stats.get(stat))
                .then(a.1.id.cmp(&b.1.id))
        });
        let Some(&(_, top)) = contenders.first() else {
            return Vec::new();
        };
        let top_strength = top.stats.get(stat);
        let wins = top_strength > self.hold_strength(region, top, stat);

        contenders
            .iter()
            .enumerate()
            .map(|(rank, (p, c))| {
                if rank == 0 && wins {
                    Verdict::success(*p, changes(c))
                } else if rank > 0 && wins && c.stats.get(stat) == top_strength {
                    Verdict::blocked(*p, Reason::LostTieBreak)
                } else {
                    Verdict::blocked(*p, Reason::Outmatched)
                }
            })
            .collect()
    }

    fn judge_moves(&self, region: Region, members: &[Pending]) -> Vec<Verdict> {
        let mut verdicts = Vec::new();
        let mut contenders = Vec::new();
        for p in members {
            let Some(actor) = self.world.character(p.character) else {
                verdicts.push(Verdict::failed(*p, Reason::Dead));
                continue;
            };
            match p.command {
                Command::Move { from, .. } if actor.location == Some(from) => {
                    contenders.push((*p, actor))
                }
                _ => verdicts.push(Verdict::failed(*p, Reason::WrongRegion)),
            }
        }
        verdicts.extend(self.judge_region_claim(region, contenders, Stat::Martial, |c| {
            vec![
                Change::Relocate { character: c.id, to: region },
                Change::Control { region, to: Some(c.id) },
            ]
        }));
        verdicts
    }

    fn judge_contests(&self, region: Region, members: &[Pending]) -> Vec<Verdict> {
        let mut verdicts = Vec::new();
        let mut contenders = Vec::new();
        for p in members {
            let Some(actor) = self.world.character(p.character) else {
                verdicts.push(Verdict::failed(*p, Reason::Dead));
                continue;
            };
            if actor.location != Some(region) {
                verdicts.push(Verdict::failed(*p, Reason::NotInRegion));
            } else if self.world.controller(region) == Some(actor.id) {
                verdicts.push(Verdict::failed(*p, Reason::AlreadyController));
            } else {
                contenders.push((*p, actor));
            }
        }
        verdicts.extend(self.judge_region_claim(region, contenders, Stat::Control, |c| {
            vec![Change::Control { region, to: Some(c.id) }]
        }));
        verdicts
    }

    /// Thieves split the victim's treasury in rank order; each takes its
    /// intrigue margin over the victim's best defender, times the theft rate.
    fn judge_thefts(&self, victim: PlayerId, members: &[Pending]) -> Vec<Verdict> {
        let Some(victim_player) = self.world.player(victim) else {
            return members.iter().map(|p| Verdict::failed(*p, Reason::UnknownTarget)).collect();
        };
        let defence = self
            .world
            .living_characters()
            .filter(|c| c.player == victim)
            .map(|c| c.stats.intrigue)
            .max()
            .unwrap_or(0);

        let mut verdicts = Vec::new();
        let mut thieves = Vec::new();
        for p in members {
            match self.world.character(p.character) {
                None => verdicts.push(Verdict::failed(*p, Reason::Dead)),
                Some(actor) if actor.player == victim => {
                    verdicts.push(Verdict::failed(*p, Reason::OwnPlayer))
                }
                Some(actor) => thieves.push((*p, actor)),
            }
        }
        thieves.sort_by(|a, b| {
            b.1.stats
                .intrigue
                .cmp(&a.1.stats.intrigue)
                .then(a.1.id.cmp(&b.1.id))
        });

        let mut remaining = victim_player.treasury.max(0);
        for (p, thief) in thieves {
            let margin = thief.stats.intrigue as i64 - defence as i64;
            if margin <= 0 {
                verdicts.push(Verdict::blocked(p, Reason::Outmatched));
                continue;
            }
            let amount = margin.saturating_mul(self.rules.theft_rate).min(remaining);
            if amount <= 0 {
                verdicts.push(Verdict::blocked(p, Reason::NothingToTake));
                continue;
            }
            remaining -= amount;
            verdicts.push(Verdict::success(
                p,
                vec![Change::Transfer { payer: victim, payee: thief.player, amount }],
            ));
        }
        verdicts
    }

    /// Bribes paid by one player draw on a shared budget, most charismatic
    /// briber first.
    fn judge_bribes(&self, payer: PlayerId, members: &[Pending]) -> Vec<Verdict> {
        let mut verdicts = Vec::new();
        let mut bribers = Vec::new();
        for p in members {
            match self.world.character(p.character) {
                Some(actor) => bribers.push((*p, actor)),
                None => verdicts.push(Verdict::failed(*p, Reason::Dead)),
            }
        }
        bribers.sort_by(|a, b| {
            b.1.stats
                .charisma
                .cmp(&a.1.stats.charisma)
                .then(a.1.id.cmp(&b.1.id))
        });

        let cost = self.rules.bribe_cost;
        let mut remaining = self.world.player(payer).map(|pl| pl.treasury).unwrap_or(0);
        for (p, briber) in bribers {
            let Command::Bribe { target } = p.command else {
                verdicts.push(Verdict::failed(p, Reason::UnknownTarget));
                continue;
            };
            if target == payer {
                verdicts.push(Verdict::failed(p, Reason::OwnPlayer));
            } else if self.world.player(target).is_none() {
                verdicts.push(Verdict::failed(p, Reason::UnknownTarget));
            } else if remaining < cost {
                verdicts.push(Verdict::failed(p, Reason::InsufficientFunds));
            } else {
                remaining -= cost;
                verdicts.push(Verdict::success(
                    p,
                    vec![
                        Change::Transfer { payer, payee: target, amount: cost },
                        Change::Stat { character: briber.id, stat: Stat::Charisma, delta: 1 },
                    ],
                ));
            }
        }
        verdicts
    }
}

/// Resolves an order set with the standard precedence table and default rules.
pub fn resolve_orders(orders: &OrderSet, world: &World) -> Result<Resolution, MutationError> {
    Resolver::default().resolve(orders, world)
}
