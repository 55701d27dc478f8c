mod experiments;

use std::fs::{self, File};
use std::io::BufWriter;
use std::process;

use stynker::observer::{AgentAdapter, MindAdapter};
use stynker::prelude::*;
use tracing::{error, info};

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_help();
        return;
    };
    let rest = &args[1..];
    let result = match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "run" => run(rest),
        "trace" => trace(rest),
        "inspect" => inspect(rest),
        "config" => print_default_config(),
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_help() {
    println!("stynker (spreading-activation mind in a polygonal arena)");
    println!("usage:");
    println!("  stynker run [options]        Run the schedule and print a JSON summary");
    println!("      --config <file.json>     Simulation config (defaults otherwise)");
    println!("      --arena <name>           square | hexagon | simple_maze");
    println!("      --seed <n>               Base mind seed (agent i uses seed + i)");
    println!("      --nodes <n>              Nodes per mind");
    println!("      --inputs <n>             Input nodes (even: two sensor rings)");
    println!("      --outputs <n>            Output nodes");
    println!("      --remakes <n>            Nodes rebuilt per sleep tick");
    println!("      --random-sleep           Remake random nodes instead of the least damaged");
    println!("      --agents <n>             Population size");
    println!("      --rounds <n>             Schedule repetitions");
    println!("      --schedule <pattern>     Phase blocks, e.g.");
    println!("                               \"40*(wake:100,sleep:1),40*(dream:100,sleep:1)\"");
    println!("      --selection              Worst agent clones the best mind each round");
    println!("      --save <file>            Write the best agent's mind image");
    println!("  stynker trace [--cycles <n>] Dream the hand-wired demo graph, print JSON frames");
    println!("  stynker inspect <file> [--json]  Summarise a saved mind image");
    println!("  stynker config               Print the default config as JSON");
    println!("  stynker --help");
    println!();
    println!("Logging is controlled through RUST_LOG (default: info).");
}

/// Pulls the value following `flag` out of `args`.
fn take_value<'a>(args: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<&'a str> {
    args.next()
        .map(String::as_str)
        .ok_or_else(|| StynkerError::config(format!("{flag} expects a value")))
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| StynkerError::config(format!("{flag}: '{value}' is not a valid number")))
}

#[derive(Debug, Default)]
struct RunOptions {
    config: Option<String>,
    arena: Option<String>,
    seed: Option<u64>,
    nodes: Option<usize>,
    inputs: Option<usize>,
    outputs: Option<usize>,
    remakes: Option<usize>,
    random_sleep: bool,
    agents: Option<usize>,
    rounds: Option<usize>,
    schedule: Option<String>,
    selection: bool,
    save: Option<String>,
}

impl RunOptions {
    fn parse(args: &[String]) -> Result<Self> {
        let mut opts = Self::default();
        let mut it = args.iter();
        while let Some(flag) = it.next() {
            match flag.as_str() {
                "--config" => opts.config = Some(take_value(&mut it, flag)?.to_string()),
                "--arena" => opts.arena = Some(take_value(&mut it, flag)?.to_string()),
                "--seed" => opts.seed = Some(parse_number(take_value(&mut it, flag)?, flag)?),
                "--nodes" => opts.nodes = Some(parse_number(take_value(&mut it, flag)?, flag)?),
                "--inputs" => opts.inputs = Some(parse_number(take_value(&mut it, flag)?, flag)?),
                "--outputs" => opts.outputs = Some(parse_number(take_value(&mut it, flag)?, flag)?),
                "--remakes" => opts.remakes = Some(parse_number(take_value(&mut it, flag)?, flag)?),
                "--random-sleep" => opts.random_sleep = true,
                "--agents" => opts.agents = Some(parse_number(take_value(&mut it, flag)?, flag)?),
                "--rounds" => opts.rounds = Some(parse_number(take_value(&mut it, flag)?, flag)?),
                "--schedule" => opts.schedule = Some(take_value(&mut it, flag)?.to_string()),
                "--selection" => opts.selection = true,
                "--save" => opts.save = Some(take_value(&mut it, flag)?.to_string()),
                other => return Err(StynkerError::config(format!("unknown option '{other}'"))),
            }
        }
        Ok(opts)
    }

    fn build_config(&self) -> Result<SimulationConfig> {
        let mut cfg = match &self.config {
            Some(path) => SimulationConfig::load_json(path)?,
            None => SimulationConfig::default(),
        };
        if let Some(name) = &self.arena {
            cfg.agent.arena = ArenaDefinition::preset(name)?;
        }
        let mind = &mut cfg.agent.mind;
        if let Some(seed) = self.seed {
            mind.seed = Some(seed);
        }
        if let Some(nodes) = self.nodes {
            mind.node_count = nodes;
        }
        if let Some(inputs) = self.inputs {
            mind.input_count = inputs;
        }
        if let Some(outputs) = self.outputs {
            mind.output_count = outputs;
        }
        if let Some(remakes) = self.remakes {
            mind.remodel_count = remakes;
        }
        if self.random_sleep {
            mind.remodel_policy = RemodelPolicy::UniformRandom;
        }
        if let Some(agents) = self.agents {
            cfg.agents = agents;
        }
        if let Some(rounds) = self.rounds {
            cfg.rounds = rounds;
        }
        if let Some(pattern) = &self.schedule {
            cfg.schedule = Schedule::parse(pattern)?;
        }
        cfg.selection |= self.selection;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn run(args: &[String]) -> Result<()> {
    let opts = RunOptions::parse(args)?;
    let cfg = opts.build_config()?;
    info!(
        agents = cfg.agents,
        rounds = cfg.rounds,
        ticks_per_round = cfg.schedule.total_ticks(),
        arena = %cfg.agent.arena.name,
        "starting simulation"
    );

    let mut sim = Simulation::new(cfg)?;
    let result = sim.run(&mut NullObserver)?;

    if let Some(path) = &opts.save {
        let best = result
            .agents
            .iter()
            .enumerate()
            .max_by_key(|(i, s)| (s.score(), std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let agent = &sim.agents()[best];
        let mut w = BufWriter::new(File::create(path)?);
        agent.mind().save_image_to(&mut w)?;
        info!(
            agent = best,
            path = %path,
            bytes = agent.mind().image_size_bytes()?,
            "mind image saved"
        );
    }

    let summary = serde_json::json!({
        "result": result,
        "final_positions": sim
            .agents()
            .iter()
            .map(|a| AgentAdapter::new(a).snapshot().position)
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn trace(args: &[String]) -> Result<()> {
    let mut cycles = 15usize;
    let mut it = args.iter();
    while let Some(flag) = it.next() {
        match flag.as_str() {
            "--cycles" => cycles = parse_number(take_value(&mut it, flag)?, flag)?,
            other => return Err(StynkerError::config(format!("unknown option '{other}'"))),
        }
    }
    let frames = experiments::trace::run(cycles)?;
    println!("{}", serde_json::to_string_pretty(&frames)?);
    Ok(())
}

fn inspect(args: &[String]) -> Result<()> {
    let mut path = None;
    let mut json = false;
    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            other if path.is_none() => path = Some(other),
            other => return Err(StynkerError::config(format!("unexpected argument '{other}'"))),
        }
    }
    let path = path.ok_or_else(|| StynkerError::config("inspect expects an image path"))?;

    let bytes = fs::read(path)?;
    let mind = Mind::load_image_bytes(&bytes)?;
    let snapshot = MindAdapter::new(&mind).snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let active = snapshot.nodes.iter().filter(|n| n.active).count();
    let damage: u64 = snapshot.nodes.iter().map(|n| n.damage).sum();
    println!("image:      {path} ({} bytes)", bytes.len());
    println!("age:        {} cycles", snapshot.age_cycles);
    println!(
        "nodes:      {} ({} input, {} output, {} active)",
        snapshot.nodes.len(),
        mind.config().input_count,
        mind.config().output_count,
        active
    );
    println!("edges:      {}", snapshot.edges.len());
    println!("in flight:  {} pulses", snapshot.pulses_in_flight);
    println!("damage:     {damage} total");
    println!("remodel:    {:?} x{}", mind.config().remodel_policy, mind.config().remodel_count);
    Ok(())
}

fn print_default_config() -> Result<()> {
    println!("{}", SimulationConfig::default().to_json_pretty()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mind_size_flags_override_defaults() {
        let opts = RunOptions::parse(&args(&[
            "--nodes",
            "40",
            "--inputs",
            "8",
            "--outputs",
            "4",
            "--remakes",
            "3",
            "--random-sleep",
        ]))
        .unwrap();
        let cfg = opts.build_config().unwrap();
        let mind = &cfg.agent.mind;
        assert_eq!(mind.node_count, 40);
        assert_eq!(mind.input_count, 8);
        assert_eq!(mind.output_count, 4);
        assert_eq!(mind.remodel_count, 3);
        assert_eq!(mind.remodel_policy, RemodelPolicy::UniformRandom);
    }

    #[test]
    fn bad_run_options_are_rejected() {
        assert!(RunOptions::parse(&args(&["--nodes"])).is_err());
        assert!(RunOptions::parse(&args(&["--nodes", "many"])).is_err());
        assert!(RunOptions::parse(&args(&["--fast"])).is_err());

        let odd = RunOptions::parse(&args(&["--inputs", "7"])).unwrap();
        assert!(odd.build_config().is_err());
    }
}
