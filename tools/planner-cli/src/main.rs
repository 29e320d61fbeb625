mod toy_task;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::ValueEnum;
use planner_cegar::run_multiple_cegar;
use planner_cegar::run_single_cegar;
use planner_cegar::CanonicalPdbs;
use planner_cegar::CegarConfig;
use planner_cegar::MultipleCegarConfig;
use planner_merge::LinearOrder;
use planner_merge::MergeStrategy;
use planner_merge::ScoringFunction;
use planner_ms::LabelReduction;
use planner_ms::MSConfig;
use planner_shrink::AtLimit;
use planner_shrink::FPreference;
use planner_shrink::ShrinkStrategy;
use planner_task::SasTask;
use planner_task::TaskView;
use planner_transition_system::INFINITE_COST;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Clone, Debug, ValueEnum)]
enum Mode {
    /// Run the merge-and-shrink main loop to a single abstraction.
    MergeShrink,
    /// Build a CEGAR pattern collection and evaluate it as a canonical heuristic.
    Cegar,
}

#[derive(Clone, Debug, ValueEnum)]
enum MergeChoice {
    /// Fixed linear merge order, built once up front.
    Linear,
    /// DFP-style scoring with goal-relevance and total-order tiebreakers.
    ScoreBased,
}

#[derive(Clone, Debug, ValueEnum)]
enum ShrinkChoice {
    Random,
    FPreserving,
    Bisimulation,
}

#[derive(Parser, Debug)]
#[command(name = "planner-cli", about = "Builds merge-and-shrink abstractions and CEGAR pattern collections for a toy SAS+ task")]
struct Cli {
    #[arg(value_enum)]
    mode: Mode,

    #[arg(value_name = "FILE")]
    task: PathBuf,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, value_name = "SECONDS")]
    time_limit: Option<u64>,

    #[arg(long, default_value_t = 1_000_000)]
    max_states: u64,

    #[arg(long, value_enum, default_value_t = MergeChoice::ScoreBased)]
    merge: MergeChoice,

    #[arg(long, value_enum, default_value_t = ShrinkChoice::Bisimulation)]
    shrink: ShrinkChoice,

    /// Run Multiple-CEGAR instead of a single Single-CEGAR pass (mode=cegar only).
    #[arg(long)]
    multiple: bool,

    #[arg(long, default_value_t = 1_000_000)]
    max_pdb_size: usize,

    #[arg(long, default_value_t = 10_000_000)]
    max_collection_size: usize,

    #[arg(long)]
    wildcard_plans: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let raw = toy_task::load(&cli.task)?;
    let task = SasTask::try_from_raw(raw).context("the task file does not describe a valid SAS+ task")?;
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let clock = planner_task::MonotonicClock::new();
    let time_limit = cli.time_limit.map(Duration::from_secs);

    match cli.mode {
        Mode::MergeShrink => run_merge_shrink(&task, &cli, time_limit, &clock, &mut rng),
        Mode::Cegar => run_cegar(&task, &cli, time_limit, &clock, &mut rng),
    }
}

fn run_merge_shrink(task: &SasTask, cli: &Cli, time_limit: Option<Duration>, clock: &planner_task::MonotonicClock, rng: &mut StdRng) -> Result<()> {
    let merge_strategy = match cli.merge {
        MergeChoice::Linear => MergeStrategy::precomputed_tree(LinearOrder::CausalGraphGoalLevel, task, rng),
        MergeChoice::ScoreBased => MergeStrategy::score_based(vec![ScoringFunction::GoalRelevance, ScoringFunction::Dfp, ScoringFunction::TotalOrder]),
    };
    let shrink_strategy = match cli.shrink {
        ShrinkChoice::Random => ShrinkStrategy::Random,
        ShrinkChoice::FPreserving => ShrinkStrategy::FPreserving { f: FPreference::High, h: FPreference::Low },
        ShrinkChoice::Bisimulation => ShrinkStrategy::Bisimulation { greedy: false, at_limit: AtLimit::UseUp },
    };

    let mut config = MSConfig {
        max_states_after_merge: cli.max_states,
        max_states_before_merge: cli.max_states,
        shrink_threshold: cli.max_states,
        prune_unreachable: true,
        prune_irrelevant: true,
        shrink_strategy,
        merge_strategy,
        label_reduction: LabelReduction::None,
        main_loop_max_time: time_limit,
    };

    let factored = planner_ms::run(task, &mut config, clock, rng)?;

    let remaining: Vec<usize> = factored.active_indices().collect();
    println!("merge-and-shrink finished with {} active factor(s)", remaining.len());
    for index in remaining {
        let factor = factored.factor(index);
        let h = factor
            .init_state()
            .and_then(|init| factor.distances().map(|d| d.goal_d[init]))
            .unwrap_or(INFINITE_COST);
        if h == INFINITE_COST {
            println!("factor {index}: initial state is unsolvable within this factor");
        } else {
            println!("factor {index}: h(init) = {h}");
        }
    }

    Ok(())
}

fn run_cegar(task: &SasTask, cli: &Cli, time_limit: Option<Duration>, clock: &planner_task::MonotonicClock, rng: &mut StdRng) -> Result<()> {
    let wildcard_plans = cli.wildcard_plans;

    let (patterns, pdbs, concrete_plan) = if cli.multiple {
        let config = MultipleCegarConfig {
            max_pdb_size: cli.max_pdb_size,
            total_collection_max_size: cli.max_collection_size,
            total_time_limit: time_limit.unwrap_or(Duration::from_secs(60)),
            stagnation_limit: Duration::from_secs(5),
            wildcard_plans,
        };
        let result = run_multiple_cegar(task, &config, clock, rng)?;
        (result.patterns, result.pdbs, result.concrete_plan)
    } else {
        let config = CegarConfig {
            max_pdb_size: cli.max_pdb_size,
            max_collection_size: cli.max_collection_size,
            max_time: time_limit,
            wildcard_plans,
        };
        let result = run_single_cegar(task, task.goals(), &config, clock, rng, ahash::AHashSet::default())?;
        (result.patterns, result.pdbs, result.concrete_plan)
    };

    println!("CEGAR produced {} pattern(s): {:?}", patterns.len(), patterns);

    if let Some(plan) = concrete_plan {
        println!("found a concrete plan with {} step(s):", plan.len());
        for (step, group) in plan.iter().enumerate() {
            let names: Vec<&str> = group.iter().map(|&op| task.operator(op).name.as_str()).collect();
            println!("  {step}: {}", names.join(" | "));
        }
        return Ok(());
    }

    let canonical = CanonicalPdbs::new(task, pdbs);
    let initial_state: Vec<_> = (0..task.num_variables()).map(|var| task.initial_value(var)).collect();
    match canonical.value(&initial_state) {
        Some(h) => println!("canonical heuristic h(init) = {h}"),
        None => println!("initial state is unreachable within at least one pattern"),
    }

    Ok(())
}
