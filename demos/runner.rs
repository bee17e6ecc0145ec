// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use clap::{Parser, ValueEnum};
use jani_sim::jani::{parse_files, Model, ModelFiles, ModelOptions};
use jani_sim::policy::{BoundedAtomEncoder, Policy, RandomPolicy, RulePolicy};
use jani_sim::rules::SymbolicModel;
use jani_sim::sim::ConstraintOptions;
use jani_sim::SimRng;
use rand::SeedableRng;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyKind {
    Random,
    Rules,
}

#[derive(Parser, Debug)]
#[command(name = "runner")]
#[command(author = "Kevin Laeufer <laeufer@cornell.edu>")]
#[command(version)]
#[command(about = "Runs simulation episodes of a JANI model under a policy.", long_about = None)]
struct Args {
    #[arg(value_name = "JANI", index = 1)]
    model: String,
    #[arg(long, help = "Property file with start, goal and failure conditions.")]
    property: Option<String>,
    #[arg(long, help = "Start condition, used without a property file.")]
    start: Option<String>,
    #[arg(long, help = "Goal condition, used without a property file.")]
    goal: Option<String>,
    #[arg(long, help = "Failure condition, used without a property file.")]
    failure: Option<String>,
    #[arg(long, help = "Interface that fixes the order of inputs and outputs.")]
    interface: Option<String>,
    #[arg(long, value_enum, default_value = "random")]
    policy: PolicyKind,
    #[arg(long, help = "Symbolic rule model, required for the rules policy.")]
    rules: Option<String>,
    #[arg(long, default_value_t = 100)]
    episodes: usize,
    #[arg(long, default_value_t = 256)]
    max_steps: usize,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, help = "Ignore the start condition and sample start states uniformly.")]
    random_init: bool,
    #[arg(long, help = "Forbid every earlier start assignment, not only single values.")]
    block_all: bool,
    #[arg(long, help = "Use gaussian targets instead of blocking earlier start values.")]
    no_block_previous: bool,
    #[arg(long, help = "Time limit of a single solver check in milliseconds.")]
    timeout_ms: Option<u64>,
    #[arg(long, help = "Log the communication with the SMT solver into replay.smt.")]
    smt_replay: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Goal,
    Unsafe,
    Timeout,
    /// no action is applicable in a state that is neither goal nor unsafe
    Stuck,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let files = ModelFiles {
        model: args.model.clone().into(),
        interface: args.interface.clone().map(Into::into),
        property: args.property.clone().map(Into::into),
        start: args.start.clone().map(Into::into),
        goal: args.goal.clone().map(Into::into),
        failure: args.failure.clone().map(Into::into),
    };
    let opts = ModelOptions {
        seed: args.seed,
        random_init: args.random_init,
        generator: ConstraintOptions {
            block_previous: !args.no_block_previous,
            block_all: args.block_all,
            timeout_ms: args.timeout_ms,
            save_smt_replay: args.smt_replay,
            ..Default::default()
        },
    };
    let mut model = parse_files(&files, opts).expect("failed to load model");
    info!(
        "loaded {} with {} variables and {} actions",
        args.model,
        model.variables().len(),
        model.action_count()
    );

    let mut policy: Box<dyn Policy> = match args.policy {
        PolicyKind::Random => {
            let rng = match args.seed {
                Some(seed) => SimRng::seed_from_u64(seed.wrapping_add(1)),
                None => SimRng::from_entropy(),
            };
            Box::new(RandomPolicy::new(rng))
        }
        PolicyKind::Rules => {
            let path = args
                .rules
                .as_deref()
                .expect("the rules policy requires --rules");
            let rules = SymbolicModel::load(path).expect("failed to load rule model");
            let encoder = BoundedAtomEncoder::new(&model.constants_and_variables())
                .expect("failed to build atom encoder");
            Box::new(RulePolicy::new(rules, encoder, model.actions()))
        }
    };

    let start = std::time::Instant::now();
    let mut counts = [0usize; 4];
    let mut total_steps = 0;
    for episode in 0..args.episodes {
        let (outcome, steps) = run_episode(&mut model, policy.as_mut(), args.max_steps)
            .expect("episode failed");
        debug!("episode {episode}: {outcome:?} after {steps} steps");
        counts[outcome as usize] += 1;
        total_steps += steps;
    }
    let delta = std::time::Instant::now() - start;

    println!("Executed {} episodes in {:?}", args.episodes, delta);
    println!("goal:    {}", counts[Outcome::Goal as usize]);
    println!("unsafe:  {}", counts[Outcome::Unsafe as usize]);
    println!("timeout: {}", counts[Outcome::Timeout as usize]);
    println!("stuck:   {}", counts[Outcome::Stuck as usize]);
    if args.episodes > 0 {
        println!(
            "average steps: {:.2}",
            total_steps as f64 / args.episodes as f64
        );
    }
}

fn run_episode(
    model: &mut Model,
    policy: &mut dyn Policy,
    max_steps: usize,
) -> jani_sim::Result<(Outcome, usize)> {
    let mut state = model.reset()?;
    for step in 0..max_steps {
        if model.goal_reached(&state)? {
            return Ok((Outcome::Goal, step));
        }
        if model.failure_reached(&state)? {
            return Ok((Outcome::Unsafe, step));
        }
        let action = {
            let applicable = model.applicable_actions(&state)?;
            if applicable.is_empty() {
                return Ok((Outcome::Stuck, step));
            }
            policy.act(&state, &applicable)?
        };
        match model.transition(&state, &action)? {
            Some(next) => state = next,
            None => return Ok((Outcome::Stuck, step)),
        }
    }
    if model.goal_reached(&state)? {
        Ok((Outcome::Goal, max_steps))
    } else if model.failure_reached(&state)? {
        Ok((Outcome::Unsafe, max_steps))
    } else {
        Ok((Outcome::Timeout, max_steps))
    }
}
