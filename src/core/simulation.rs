//! Tick loop over a population of agents.
//!
//! A [`Schedule`] lists phase blocks; every round runs the whole schedule for
//! every agent. Terminal contacts are tallied and reset the agent's body.
//! With selection on, the weakest agent takes over the strongest agent's
//! mind at the end of each round.

#[cfg(feature = "serde")]
use std::path::Path;

use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentEvents};
use crate::config::AgentConfig;
use crate::error::{Result, StynkerError};
use crate::mind::Phase;
use crate::observer::TickObserver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScheduleBlock {
    pub phase: Phase,
    pub ticks: u64,
}

impl ScheduleBlock {
    pub const fn new(phase: Phase, ticks: u64) -> Self {
        Self { phase, ticks }
    }
}

/// Ordered phase blocks making up one round.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Schedule {
    pub blocks: Vec<ScheduleBlock>,
}

impl Default for Schedule {
    /// 40 × (wake 100, sleep 1) followed by 40 × (dream 100, sleep 1).
    fn default() -> Self {
        let mut blocks = Vec::with_capacity(160);
        for active in [Phase::Wake, Phase::Dream] {
            for _ in 0..40 {
                blocks.push(ScheduleBlock::new(active, 100));
                blocks.push(ScheduleBlock::new(Phase::Sleep, 1));
            }
        }
        Self { blocks }
    }
}

impl Schedule {
    pub fn new(blocks: Vec<ScheduleBlock>) -> Self {
        Self { blocks }
    }

    /// Parses `phase:ticks` pairs separated by commas, with an optional
    /// `N*` prefix repeating a bracketed group: `"10*(wake:100,sleep:1),dream:5"`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut blocks = Vec::new();
        let mut rest = s.trim();
        while !rest.is_empty() {
            let (item, tail) = split_item(rest)?;
            rest = tail.trim_start_matches(',').trim();
            parse_item(item.trim(), &mut blocks)?;
        }
        let schedule = Self { blocks };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_ticks() == 0 {
            return Err(StynkerError::config("schedule has no ticks"));
        }
        Ok(())
    }

    pub fn total_ticks(&self) -> u64 {
        self.blocks.iter().map(|b| b.ticks).sum()
    }

    /// Phase of every tick in order.
    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| {
                std::iter::repeat(b.phase).take(usize::try_from(b.ticks).unwrap_or(usize::MAX))
            })
    }
}

/// Splits the first top-level comma-separated item off `s`.
fn split_item(s: &str) -> Result<(&str, &str)> {
    let mut depth = 0i32;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(StynkerError::config(format!("unbalanced ')' in schedule '{s}'")));
                }
            }
            ',' if depth == 0 => return Ok((&s[..i], &s[i..])),
            _ => {}
        }
    }
    if depth != 0 {
        return Err(StynkerError::config(format!("unbalanced '(' in schedule '{s}'")));
    }
    Ok((s, ""))
}

fn parse_item(item: &str, out: &mut Vec<ScheduleBlock>) -> Result<()> {
    if let Some((count, group)) = item.split_once('*') {
        let count: usize = count
            .trim()
            .parse()
            .map_err(|_| StynkerError::config(format!("bad repeat count in '{item}'")))?;
        let group = group
            .trim()
            .strip_prefix('(')
            .and_then(|g| g.strip_suffix(')'))
            .ok_or_else(|| StynkerError::config(format!("expected N*(...) in '{item}'")))?;
        let inner = Schedule::parse(group)?;
        for _ in 0..count {
            out.extend_from_slice(&inner.blocks);
        }
        return Ok(());
    }
    let (phase, ticks) = item
        .split_once(':')
        .ok_or_else(|| StynkerError::config(format!("expected phase:ticks, got '{item}'")))?;
    let ticks: u64 = ticks
        .trim()
        .parse()
        .map_err(|_| StynkerError::config(format!("bad tick count in '{item}'")))?;
    out.push(ScheduleBlock::new(phase.parse()?, ticks));
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    pub agent: AgentConfig,
    /// Population size; agent `i` seeds its mind with `seed + i`.
    pub agents: usize,
    pub rounds: usize,
    /// Weakest agent clones the strongest one's mind after every round.
    pub selection: bool,
    pub schedule: Schedule,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            agents: 1,
            rounds: 1,
            selection: false,
            schedule: Schedule::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        self.agent.validate()?;
        if self.agents == 0 {
            return Err(StynkerError::config("agents must be >= 1"));
        }
        self.schedule.validate()
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(feature = "serde")]
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    #[cfg(feature = "serde")]
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-agent tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AgentStats {
    pub wins: u64,
    pub losses: u64,
    pub bounces: u64,
    pub degenerate_ticks: u64,
    pub spills: u64,
    pub remade: u64,
}

impl AgentStats {
    pub fn score(&self) -> i64 {
        self.wins as i64 - self.losses as i64
    }

    fn record(&mut self, ev: &AgentEvents) {
        self.wins += u64::from(ev.won);
        self.losses += u64::from(ev.lost);
        self.bounces += ev.bounces as u64;
        self.degenerate_ticks += u64::from(ev.degenerate);
        self.spills += ev.propagation.spilled.len() as u64;
        self.remade += ev.propagation.remade.len() as u64;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Selection {
    pub round: usize,
    pub donor: usize,
    pub receiver: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationResult {
    pub ticks: u64,
    pub rounds: usize,
    pub agents: Vec<AgentStats>,
    pub selections: Vec<Selection>,
}

pub struct Simulation {
    cfg: SimulationConfig,
    agents: Vec<Agent>,
    stats: Vec<AgentStats>,
    selections: Vec<Selection>,
    ticks: u64,
}

impl Simulation {
    pub fn new(cfg: SimulationConfig) -> Result<Self> {
        cfg.validate()?;
        let base_seed = cfg.agent.mind.effective_seed();
        let agents = (0..cfg.agents)
            .map(|i| {
                let mut agent_cfg = cfg.agent.clone();
                agent_cfg.mind.seed = Some(base_seed.wrapping_add(i as u64));
                Agent::new(&agent_cfg)
            })
            .collect::<Result<Vec<_>>>()?;
        let stats = vec![AgentStats::default(); agents.len()];
        Ok(Self {
            cfg,
            agents,
            stats,
            selections: Vec::new(),
            ticks: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.cfg
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn stats(&self) -> &[AgentStats] {
        &self.stats
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs every configured round.
    pub fn run(&mut self, observer: &mut dyn TickObserver) -> Result<SimulationResult> {
        for round in 0..self.cfg.rounds {
            self.run_round(round, observer)?;
        }
        Ok(self.result())
    }

    pub fn run_round(&mut self, round: usize, observer: &mut dyn TickObserver) -> Result<()> {
        let phases: Vec<Phase> = self.cfg.schedule.phases().collect();
        for phase in phases {
            self.tick(phase, observer)?;
        }
        info!(
            round,
            ticks = self.ticks,
            scores = ?self.stats.iter().map(AgentStats::score).collect::<Vec<_>>(),
            "round finished"
        );
        if self.cfg.selection {
            self.apply_selection(round);
        }
        Ok(())
    }

    /// Advances every agent by one tick in `phase`.
    pub fn tick(&mut self, phase: Phase, observer: &mut dyn TickObserver) -> Result<()> {
        for (index, agent) in self.agents.iter_mut().enumerate() {
            let ev = agent.run_cycle(phase)?;
            observer.on_tick(self.ticks, index, phase, &ev);
            self.stats[index].record(&ev);
            if ev.is_terminal() {
                let outcome = if ev.won { "won" } else { "lost" };
                info!(
                    agent = index,
                    tick = self.ticks,
                    outcome,
                    x = ev.position.x,
                    y = ev.position.y,
                    "episode finished"
                );
                agent.reset_position();
                agent.reset_velocity();
            }
        }
        self.ticks += 1;
        Ok(())
    }

    /// Weakest agent (lowest wins − losses, last on ties) takes the strongest
    /// agent's mind (first on ties). Nothing happens when all scores match.
    fn apply_selection(&mut self, round: usize) -> Option<Selection> {
        if self.agents.len() < 2 {
            return None;
        }
        let scores: Vec<i64> = self.stats.iter().map(AgentStats::score).collect();
        let donor = (0..scores.len()).fold(0, |best, i| {
            if scores[i] > scores[best] { i } else { best }
        });
        let receiver = (0..scores.len()).fold(0, |worst, i| {
            if scores[i] <= scores[worst] { i } else { worst }
        });
        if scores[donor] == scores[receiver] {
            debug!(round, "selection skipped: scores are level");
            return None;
        }

        let (src, dst) = if donor < receiver {
            let (head, tail) = self.agents.split_at_mut(receiver);
            (&head[donor], &mut tail[0])
        } else {
            let (head, tail) = self.agents.split_at_mut(donor);
            (&tail[0], &mut head[receiver])
        };
        dst.clone_mind_from(src);
        dst.reset_position();
        dst.reset_velocity();

        let selection = Selection {
            round,
            donor,
            receiver,
        };
        info!(round, donor, receiver, "selection: mind cloned");
        self.selections.push(selection);
        Some(selection)
    }

    pub fn result(&self) -> SimulationResult {
        SimulationResult {
            ticks: self.ticks,
            rounds: self.cfg.rounds,
            agents: self.stats.clone(),
            selections: self.selections.clone(),
        }
    }
}
