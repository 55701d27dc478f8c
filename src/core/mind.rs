use std::io::{self, Read, Write};

use hashbrown::HashSet;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{MindConfig, RemodelPolicy, ValueRange};
use crate::edge::Edge;
use crate::error::{Result, StynkerError};
use crate::node::{Charge, Node, NodeId, NodeKind};
use crate::prng::Prng;
use crate::storage;

/// Operating regime for one tick. The caller picks it; the mind never
/// switches on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// Internal rehearsal: propagation only.
    #[default]
    Dream,
    /// Structural remodeling.
    Sleep,
    /// Propagation coupled to the arena.
    Wake,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Dream => "dream",
            Phase::Sleep => "sleep",
            Phase::Wake => "wake",
        }
    }
}

impl core::str::FromStr for Phase {
    type Err = StynkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dream" => Ok(Phase::Dream),
            "sleep" => Ok(Phase::Sleep),
            "wake" => Ok(Phase::Wake),
            other => Err(StynkerError::config(format!(
                "unknown phase '{other}' (expected dream, sleep or wake)"
            ))),
        }
    }
}

/// What one mind cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PropagationEvents {
    /// Every node that spilled this cycle, in id order.
    pub spilled: Vec<NodeId>,
    /// The output nodes among `spilled`.
    pub spilled_outputs: Vec<NodeId>,
    /// Nodes rebuilt by a sleep cycle.
    pub remade: Vec<NodeId>,
    /// Input node armed for the next cycle (filled in by the agent on wake).
    pub activated_next_input: Option<NodeId>,
    /// Edge pulses that reached their target.
    pub pulses_delivered: usize,
}

/// Graph of accumulator nodes joined by delayed edges.
///
/// `incoming` is derived: `a` is in `incoming[b]` exactly when `outgoing[a]`
/// holds at least one edge targeting `b`. Every mutation keeps the two in step.
#[derive(Debug, Clone)]
pub struct Mind {
    cfg: MindConfig,
    nodes: Vec<Node>,
    outgoing: Vec<Vec<Edge>>,
    incoming: Vec<HashSet<NodeId>>,
    rng: Prng,
    age_cycles: u64,
}

impl Mind {
    /// Builds a mind with random node parameters and random outgoing edges
    /// for every node.
    pub fn new(cfg: MindConfig) -> Result<Self> {
        cfg.validate()?;
        let mut rng = Prng::new(cfg.effective_seed());
        let nodes: Vec<Node> = (0..cfg.node_count)
            .map(|id| {
                let kind = NodeKind::for_index(id, cfg.input_count, cfg.output_count);
                Node::random(id, kind, &cfg, &mut rng)
            })
            .collect();

        let mut mind = Self::assemble(cfg, nodes, rng);
        for id in 0..mind.nodes.len() {
            mind.make_random_outgoing_edges(id);
        }
        debug!(
            nodes = mind.nodes.len(),
            edges = mind.edge_count(),
            "mind constructed"
        );
        Ok(mind)
    }

    /// Builds a mind from explicit nodes and `(source, edge)` pairs.
    ///
    /// Node ids must match their position, and the kinds must follow the
    /// input, output, regular layout. The node and I/O counts in `cfg` are
    /// replaced by the ones observed in `nodes`; the reverse index is rebuilt
    /// from the edges.
    pub fn from_parts(
        mut cfg: MindConfig,
        nodes: Vec<Node>,
        edges: Vec<(NodeId, Edge)>,
    ) -> Result<Self> {
        for (index, node) in nodes.iter().enumerate() {
            if node.id != index {
                return Err(StynkerError::config(format!(
                    "node at position {index} carries id {}",
                    node.id
                )));
            }
        }
        cfg.node_count = nodes.len();
        cfg.input_count = nodes.iter().filter(|n| n.kind == NodeKind::Input).count();
        cfg.output_count = nodes.iter().filter(|n| n.kind == NodeKind::Output).count();
        // Inputs first, then outputs, then regular nodes.
        for node in &nodes {
            let expected = NodeKind::for_index(node.id, cfg.input_count, cfg.output_count);
            if node.kind != expected {
                return Err(StynkerError::config(format!(
                    "node {} is {:?} but position {} is reserved for {:?} nodes",
                    node.id, node.kind, node.id, expected
                )));
            }
        }
        cfg.validate()?;

        let rng = Prng::new(cfg.effective_seed());
        let mut mind = Self::assemble(cfg, nodes, rng);
        for (source, edge) in edges {
            mind.check_id(source)?;
            mind.check_id(edge.target)?;
            if edge.delay == 0 || edge.in_flight.iter().any(|t| *t == 0) {
                return Err(StynkerError::config("edge delays and timers must be >= 1"));
            }
            mind.push_edge(source, edge);
        }
        Ok(mind)
    }

    fn assemble(cfg: MindConfig, nodes: Vec<Node>, rng: Prng) -> Self {
        let n = nodes.len();
        Self {
            cfg,
            nodes,
            outgoing: vec![Vec::new(); n],
            incoming: vec![HashSet::new(); n],
            rng,
            age_cycles: 0,
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &MindConfig {
        &self.cfg
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn outgoing(&self, id: NodeId) -> &[Edge] {
        self.outgoing.get(id).map_or(&[], |v| v.as_slice())
    }

    /// Sources with at least one edge into `id`, in ascending order.
    pub fn incoming(&self, id: NodeId) -> Vec<NodeId> {
        let mut sources: Vec<NodeId> = self
            .incoming
            .get(id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        sources.sort_unstable();
        sources
    }

    /// Every edge with its source, grouped by source in id order.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, &Edge)> + '_ {
        self.outgoing
            .iter()
            .enumerate()
            .flat_map(|(source, edges)| edges.iter().map(move |e| (source, e)))
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.iter().map(Vec::len).sum()
    }

    pub fn pulses_in_flight(&self) -> usize {
        self.edges().map(|(_, e)| e.pulses_in_flight()).sum()
    }

    pub fn input_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids_of_kind(NodeKind::Input)
    }

    pub fn output_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids_of_kind(NodeKind::Output)
    }

    fn ids_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(move |n| n.kind == kind)
            .map(|n| n.id)
    }

    /// Completed `run_cycle` calls.
    pub fn age_cycles(&self) -> u64 {
        self.age_cycles
    }

    /// True when `incoming` is exactly the transpose of `outgoing`.
    pub fn reverse_index_consistent(&self) -> bool {
        let mut expected: Vec<HashSet<NodeId>> = vec![HashSet::new(); self.nodes.len()];
        for (source, edge) in self.edges() {
            match expected.get_mut(edge.target) {
                Some(set) => {
                    set.insert(source);
                }
                None => return false,
            }
        }
        expected == self.incoming
    }

    fn check_id(&self, id: NodeId) -> Result<()> {
        if id < self.nodes.len() {
            Ok(())
        } else {
            Err(StynkerError::UnknownNode(id))
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or(StynkerError::UnknownNode(id))
    }

    // ---------------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------------

    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        weight: Charge,
        delay: u32,
    ) -> Result<()> {
        self.check_id(source)?;
        self.check_id(target)?;
        if delay == 0 {
            return Err(StynkerError::config("edge delay must be >= 1"));
        }
        self.push_edge(source, Edge::new(target, weight, delay));
        Ok(())
    }

    fn push_edge(&mut self, source: NodeId, edge: Edge) {
        self.incoming[edge.target].insert(source);
        self.outgoing[source].push(edge);
    }

    /// Removes the `source → target` slot, i.e. every edge between the two.
    ///
    /// Returns how many edges were dropped; an absent slot is not an error.
    pub fn remove_edge(&mut self, source: NodeId, target: NodeId) -> usize {
        let Some(edges) = self.outgoing.get_mut(source) else {
            return 0;
        };
        let before = edges.len();
        edges.retain(|e| e.target != target);
        let removed = before - edges.len();
        if removed > 0 {
            if let Some(set) = self.incoming.get_mut(target) {
                set.remove(&source);
            }
        }
        removed
    }

    /// Drops every edge leaving or entering `id`.
    fn detach(&mut self, id: NodeId) {
        for edge in core::mem::take(&mut self.outgoing[id]) {
            self.incoming[edge.target].remove(&id);
        }
        let sources: Vec<NodeId> = self.incoming[id].drain().collect();
        for source in sources {
            self.outgoing[source].retain(|e| e.target != id);
        }
    }

    fn random_edge_params(&mut self) -> (Charge, u32) {
        let weight = self.rng.gen_in(self.cfg.edge_weight_range);
        let delay = self.rng.gen_in(self.cfg.edge_delay_range);
        (weight, u32::try_from(delay).unwrap_or(u32::MAX).max(1))
    }

    fn edge_count_draw(&mut self) -> usize {
        let range: ValueRange = self.cfg.edge_count_range;
        usize::try_from(self.rng.gen_in(range)).unwrap_or(0)
    }

    /// Adds a random number of edges from `id` to uniformly chosen other nodes.
    fn make_random_outgoing_edges(&mut self, id: NodeId) {
        let count = self.edge_count_draw();
        for _ in 0..count {
            let Some(target) = self.rng.pick_other(self.nodes.len(), id) else {
                break;
            };
            let (weight, delay) = self.random_edge_params();
            self.push_edge(id, Edge::new(target, weight, delay));
        }
    }

    /// Adds a random number of edges into `id` from uniformly chosen other nodes.
    fn make_random_incoming_edges(&mut self, id: NodeId) {
        let count = self.edge_count_draw();
        for _ in 0..count {
            let Some(source) = self.rng.pick_other(self.nodes.len(), id) else {
                break;
            };
            let (weight, delay) = self.random_edge_params();
            self.push_edge(source, Edge::new(id, weight, delay));
        }
    }

    /// Rebuilds each listed node: fresh parameters, fresh edges in both directions.
    ///
    /// Ids are processed in the given order. Damage is not touched here; see
    /// [`Mind::reset_damage`].
    pub fn remake(&mut self, ids: &[NodeId]) -> Result<()> {
        for &id in ids {
            self.check_id(id)?;
        }
        for &id in ids {
            self.detach(id);
            self.nodes[id].remake(&self.cfg, &mut self.rng);
            self.make_random_outgoing_edges(id);
            self.make_random_incoming_edges(id);
        }
        debug_assert!(self.reverse_index_consistent());
        Ok(())
    }

    pub fn reset_damage(&mut self) {
        for node in &mut self.nodes {
            node.damage = 0;
        }
    }

    pub fn activate(&mut self, id: NodeId) -> Result<()> {
        self.node_mut(id)?.activate()
    }

    pub fn deactivate(&mut self, id: NodeId) -> Result<()> {
        self.node_mut(id)?.deactivate()
    }

    /// Copies nodes and edges (with their in-flight pulses) from `other`.
    ///
    /// The receiver keeps its own generator so the two minds diverge again on
    /// the next remodel.
    pub fn clone_structure_from(&mut self, other: &Mind) {
        self.cfg = MindConfig {
            seed: self.cfg.seed,
            ..other.cfg.clone()
        };
        self.nodes = other.nodes.clone();
        self.outgoing = other.outgoing.clone();
        self.incoming = other.incoming.clone();
    }

    // ---------------------------------------------------------------------
    // Dynamics
    // ---------------------------------------------------------------------

    pub fn run_cycle(&mut self, phase: Phase) -> Result<PropagationEvents> {
        self.age_cycles += 1;
        match phase {
            Phase::Dream | Phase::Wake => self.propagate(),
            Phase::Sleep => self.sleep(),
        }
    }

    /// One propagation pass (shared by dream and wake).
    ///
    /// Loading happens over the whole graph before any node is checked, so a
    /// node's fullness reflects every delivery of this cycle.
    fn propagate(&mut self) -> Result<PropagationEvents> {
        let ids: Vec<NodeId> = (0..self.nodes.len()).collect();
        let input_charge = self.cfg.input_charge;
        let mut events = PropagationEvents::default();

        for &id in &ids {
            let gain = self.nodes[id].gain;
            self.nodes[id].increase_level(gain);

            for edge in self.outgoing[id].iter_mut() {
                events.pulses_delivered += edge.run_cycle(&mut self.nodes[edge.target]);
            }

            let node = &mut self.nodes[id];
            if node.kind == NodeKind::Input && node.is_active() {
                node.increase_level(input_charge);
                node.deactivate()?;
            }
        }

        for &id in &ids {
            let node = &mut self.nodes[id];
            let is_output = node.kind == NodeKind::Output;
            if node.is_full() {
                if is_output {
                    node.activate()?;
                    events.spilled_outputs.push(id);
                }
                node.spill();
                events.spilled.push(id);
                for edge in self.outgoing[id].iter_mut() {
                    edge.load();
                }
            } else if is_output {
                node.deactivate()?;
            }
        }

        Ok(events)
    }

    /// Nodes the next sleep cycle would rebuild.
    pub fn select_for_remodel(&mut self) -> Vec<NodeId> {
        let count = self.cfg.remodel_count.min(self.nodes.len());
        match self.cfg.remodel_policy {
            RemodelPolicy::DamageOrdered => {
                let mut order: Vec<(u64, NodeId)> =
                    self.nodes.iter().map(|n| (n.damage, n.id)).collect();
                order.sort_unstable();
                order.into_iter().take(count).map(|(_, id)| id).collect()
            }
            RemodelPolicy::UniformRandom => self.rng.sample_distinct(self.nodes.len(), count),
        }
    }

    fn sleep(&mut self) -> Result<PropagationEvents> {
        let selected = self.select_for_remodel();
        self.remake(&selected)?;
        self.reset_damage();
        debug!(
            remade = ?selected,
            edges = self.edge_count(),
            policy = ?self.cfg.remodel_policy,
            "sleep cycle remodeled mind"
        );
        Ok(PropagationEvents {
            remade: selected,
            ..Default::default()
        })
    }

    // ---------------------------------------------------------------------
    // Image (de)serialization
    // ---------------------------------------------------------------------

    /// Serialize a versioned, chunked mind image.
    pub fn save_image_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(storage::MAGIC)?;
        storage::write_u32_le(w, storage::VERSION_CURRENT)?;

        self.write_cfg_chunk(w)?;
        self.write_prng_chunk(w)?;
        self.write_node_chunk(w)?;
        self.write_edge_chunk(w)?;
        Ok(())
    }

    /// Load a versioned, chunked mind image.
    ///
    /// Unknown chunks are skipped for forward-compatibility.
    pub fn load_image_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let magic = storage::read_exact::<8, _>(r)?;
        if &magic != storage::MAGIC {
            return Err(invalid("bad mind image magic"));
        }
        let version = storage::read_u32_le(r)?;
        if version != storage::VERSION_CURRENT {
            return Err(invalid("unsupported mind image version"));
        }

        let mut cfg: Option<MindConfig> = None;
        let mut rng_state: Option<u64> = None;
        let mut age_cycles: u64 = 0;
        let mut nodes: Option<Vec<Node>> = None;
        let mut edges: Option<Vec<(NodeId, Edge)>> = None;

        loop {
            let (tag, len) = match storage::read_chunk_header(r) {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };
            let payload = storage::read_chunk_payload_lz4(r, len)?;
            let mut cursor = io::Cursor::new(payload);
            match &tag {
                b"CFG0" => cfg = Some(Self::read_cfg_payload(&mut cursor)?),
                b"PRNG" => {
                    rng_state = Some(storage::read_u64_le(&mut cursor)?);
                    age_cycles = storage::read_u64_le(&mut cursor)?;
                }
                b"NODE" => nodes = Some(Self::read_node_payload(&mut cursor)?),
                b"EDGE" => edges = Some(Self::read_edge_payload(&mut cursor)?),
                _ => {}
            }
        }

        let cfg = cfg.ok_or_else(|| invalid("missing CFG0 chunk"))?;
        let nodes = nodes.ok_or_else(|| invalid("missing NODE chunk"))?;
        let edges = edges.unwrap_or_default();

        let mut mind = Self::from_parts(cfg, nodes, edges)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        if let Some(state) = rng_state {
            mind.rng = Prng::from_state(state);
        }
        mind.age_cycles = age_cycles;
        Ok(mind)
    }

    pub fn image_size_bytes(&self) -> io::Result<usize> {
        let mut counter = storage::CountingWriter::new();
        self.save_image_to(&mut counter)?;
        Ok(counter.written())
    }

    pub fn save_image_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.image_size_bytes()?);
        self.save_image_to(&mut buf)?;
        Ok(buf)
    }

    pub fn load_image_bytes(bytes: &[u8]) -> io::Result<Self> {
        Self::load_image_from(&mut io::Cursor::new(bytes))
    }

    fn write_cfg_chunk<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let c = &self.cfg;
        let mut p = Vec::with_capacity(128);
        storage::write_len(&mut p, c.node_count)?;
        storage::write_len(&mut p, c.input_count)?;
        storage::write_len(&mut p, c.output_count)?;
        for range in [
            c.capacity_range,
            c.gain_range,
            c.edge_count_range,
            c.edge_weight_range,
            c.edge_delay_range,
        ] {
            storage::write_i64_le(&mut p, range.min)?;
            storage::write_i64_le(&mut p, range.max)?;
        }
        storage::write_len(&mut p, c.remodel_count)?;
        storage::write_u8(&mut p, c.remodel_policy.as_u8())?;
        storage::write_i64_le(&mut p, c.input_charge)?;
        storage::write_u8(&mut p, u8::from(c.seed.is_some()))?;
        storage::write_u64_le(&mut p, c.seed.unwrap_or(0))?;
        storage::write_chunk_lz4(w, *b"CFG0", &p)
    }

    fn read_cfg_payload<R: Read>(r: &mut R) -> io::Result<MindConfig> {
        let node_count = storage::read_len(r)?;
        let input_count = storage::read_len(r)?;
        let output_count = storage::read_len(r)?;
        let mut ranges = [ValueRange::fixed(0); 5];
        for range in ranges.iter_mut() {
            let min = storage::read_i64_le(r)?;
            let max = storage::read_i64_le(r)?;
            *range = ValueRange::new(min, max);
        }
        let remodel_count = storage::read_len(r)?;
        let remodel_policy = RemodelPolicy::from_u8(storage::read_u8(r)?)
            .ok_or_else(|| invalid("unknown remodel policy"))?;
        let input_charge = storage::read_i64_le(r)?;
        let has_seed = storage::read_u8(r)? != 0;
        let seed = storage::read_u64_le(r)?;
        let [capacity_range, gain_range, edge_count_range, edge_weight_range, edge_delay_range] =
            ranges;
        Ok(MindConfig {
            node_count,
            input_count,
            output_count,
            capacity_range,
            gain_range,
            edge_count_range,
            edge_weight_range,
            edge_delay_range,
            remodel_count,
            remodel_policy,
            input_charge,
            seed: has_seed.then_some(seed),
        })
    }

    fn write_prng_chunk<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut p = Vec::with_capacity(16);
        storage::write_u64_le(&mut p, self.rng.state())?;
        storage::write_u64_le(&mut p, self.age_cycles)?;
        storage::write_chunk_lz4(w, *b"PRNG", &p)
    }

    fn write_node_chunk<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut p = Vec::with_capacity(self.nodes.len() * 40 + 4);
        storage::write_len(&mut p, self.nodes.len())?;
        for n in &self.nodes {
            storage::write_u8(&mut p, n.kind.as_u8())?;
            storage::write_i64_le(&mut p, n.capacity)?;
            storage::write_i64_le(&mut p, n.gain)?;
            storage::write_i64_le(&mut p, n.level)?;
            storage::write_u64_le(&mut p, n.damage)?;
            storage::write_u8(&mut p, u8::from(n.is_active()))?;
        }
        storage::write_chunk_lz4(w, *b"NODE", &p)
    }

    fn read_node_payload<R: Read>(r: &mut R) -> io::Result<Vec<Node>> {
        let count = storage::read_len(r)?;
        let mut nodes = Vec::with_capacity(count.min(1 << 20));
        for id in 0..count {
            let kind = NodeKind::from_u8(storage::read_u8(r)?)
                .ok_or_else(|| invalid("unknown node kind"))?;
            let capacity = storage::read_i64_le(r)?;
            let gain = storage::read_i64_le(r)?;
            let level = storage::read_i64_le(r)?;
            let damage = storage::read_u64_le(r)?;
            let active = storage::read_u8(r)? != 0;
            nodes.push(Node::restore(id, kind, capacity, gain, level, damage, active));
        }
        Ok(nodes)
    }

    fn write_edge_chunk<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut p = Vec::with_capacity(self.edge_count() * 28 + 4);
        storage::write_len(&mut p, self.edge_count())?;
        for (source, e) in self.edges() {
            storage::write_len(&mut p, source)?;
            storage::write_len(&mut p, e.target)?;
            storage::write_i64_le(&mut p, e.weight)?;
            storage::write_u32_le(&mut p, e.delay)?;
            storage::write_len(&mut p, e.in_flight.len())?;
            for t in &e.in_flight {
                storage::write_u32_le(&mut p, *t)?;
            }
        }
        storage::write_chunk_lz4(w, *b"EDGE", &p)
    }

    fn read_edge_payload<R: Read>(r: &mut R) -> io::Result<Vec<(NodeId, Edge)>> {
        let count = storage::read_len(r)?;
        let mut edges = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            let source = storage::read_len(r)?;
            let target = storage::read_len(r)?;
            let weight = storage::read_i64_le(r)?;
            let delay = storage::read_u32_le(r)?;
            let pending = storage::read_len(r)?;
            let mut in_flight = Vec::with_capacity(pending.min(1 << 16));
            for _ in 0..pending {
                in_flight.push(storage::read_u32_le(r)?);
            }
            edges.push((
                source,
                Edge {
                    target,
                    weight,
                    delay,
                    in_flight,
                },
            ));
        }
        Ok(edges)
    }
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}
