use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::config::{
    ExhaustionPolicy, NegativeSamplingConfig, PipelineConfig, SourceFormat, SourceSpec, UserScope,
};
use crate::constants::sampler::DEFAULT_NEGATIVES_PER_ROW;
use crate::constants::variants::{
    ALL_VARIANT, DEFAULT_MIN_INTERACTIONS, DEFAULT_RATING_THRESHOLD, DEFAULT_SUBSET_SEED,
    ENHANCED_VARIANT, ORIGINAL_VARIANT,
};
use crate::data::SourceRole;
use crate::errors::PipelineError;
use crate::pipeline::{Pipeline, PipelineReport};
use crate::types::{Rating, SourceId};
use crate::variant::VariantPolicy;

const TRAIN_SOURCE: &str = "train";
const DEV_SOURCE: &str = "dev";
const TEST_SOURCE: &str = "test";
const SIMULATED_SOURCE: &str = "simulated";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExhaustionArg {
    Fail,
    Reduce,
    Skip,
}

impl From<ExhaustionArg> for ExhaustionPolicy {
    fn from(value: ExhaustionArg) -> Self {
        match value {
            ExhaustionArg::Fail => ExhaustionPolicy::Fail,
            ExhaustionArg::Reduce => ExhaustionPolicy::ReduceK,
            ExhaustionArg::Skip => ExhaustionPolicy::SkipRow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    Original,
    Rated,
    All,
}

impl VariantArg {
    fn variant_name(self) -> &'static str {
        match self {
            VariantArg::Original => ORIGINAL_VARIANT,
            VariantArg::Rated => ENHANCED_VARIANT,
            VariantArg::All => ALL_VARIANT,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "evalset",
    disable_help_subcommand = true,
    about = "Prepare leakage-free ranking evaluation datasets",
    long_about = "Merge human and simulated interaction logs, draw K unseen negatives for every dev/test row, and publish train/dev/test tables per dataset variant.",
    after_help = "Every source feeds the seen-set, so negatives never include an item the user touched in any log, even when that log is excluded from a variant's train pool."
)]
struct PrepareCli {
    #[arg(long, value_name = "PATH", help = "Train adjacency list (user item item ...)")]
    train: PathBuf,
    #[arg(long, value_name = "PATH", help = "Dev adjacency list")]
    dev: PathBuf,
    #[arg(long, value_name = "PATH", help = "Test adjacency list")]
    test: PathBuf,
    #[arg(
        long,
        value_name = "PATH",
        help = "Simulated interactions: a directory of <user_id>.json logs or a feedback TSV; repeat as needed"
    )]
    simulated: Vec<PathBuf>,
    #[arg(long, value_name = "DIR", help = "Root directory receiving one folder per variant")]
    output: PathBuf,
    #[arg(
        long,
        default_value_t = DEFAULT_NEGATIVES_PER_ROW,
        value_parser = parse_positive_usize,
        help = "Negatives drawn per dev/test row (K)"
    )]
    negatives: usize,
    #[arg(
        long = "rating-threshold",
        default_value_t = DEFAULT_RATING_THRESHOLD,
        help = "Minimum rating for simulated interactions in the rated variant"
    )]
    rating_threshold: Rating,
    #[arg(
        long = "min-interactions",
        value_name = "N",
        help = "Keep only users with at least N train interactions"
    )]
    min_interactions: Option<usize>,
    #[arg(
        long = "max-users",
        value_name = "N",
        value_parser = parse_positive_usize,
        help = "Cap active users with a seeded uniform draw"
    )]
    max_users: Option<usize>,
    #[arg(
        long = "subset-seed",
        default_value_t = DEFAULT_SUBSET_SEED,
        help = "Seed for the active-user draw"
    )]
    subset_seed: u64,
    #[arg(
        long = "simulated-users-only",
        conflicts_with_all = ["min_interactions", "max_users"],
        help = "Keep only users present in a simulated source"
    )]
    simulated_users_only: bool,
    #[arg(long, help = "Optional deterministic seed for negative sampling")]
    seed: Option<u64>,
    #[arg(
        long = "on-exhausted",
        value_enum,
        default_value = "fail",
        help = "Behavior when a row has fewer than K eligible negatives"
    )]
    on_exhausted: ExhaustionArg,
    #[arg(
        long = "variant",
        value_enum,
        help = "Variant to publish, repeat as needed (default: all three)"
    )]
    variants: Vec<VariantArg>,
    #[arg(long, help = "Sample rows on the calling thread only")]
    sequential: bool,
}

impl PrepareCli {
    fn simulated_ids(&self) -> Vec<SourceId> {
        (0..self.simulated.len())
            .map(|idx| match idx {
                0 => SIMULATED_SOURCE.to_string(),
                n => format!("{SIMULATED_SOURCE}-{}", n + 1),
            })
            .collect()
    }

    fn scope(&self) -> UserScope {
        if self.simulated_users_only {
            return UserScope::SimulatedOnly;
        }
        match (self.min_interactions, self.max_users) {
            (None, None) => UserScope::All,
            (min, max_users) => UserScope::Active {
                min_interactions: min.unwrap_or(DEFAULT_MIN_INTERACTIONS),
                max_users,
                seed: self.subset_seed,
            },
        }
    }

    fn policies(&self) -> Result<Vec<VariantPolicy>, PipelineError> {
        let standard = VariantPolicy::standard_set(
            &[TRAIN_SOURCE.to_string()],
            &self.simulated_ids(),
            self.rating_threshold,
        );
        if self.variants.is_empty() {
            return Ok(standard);
        }
        if let Some(missing) = self.variants.iter().find(|arg| {
            !standard
                .iter()
                .any(|policy| policy.name == arg.variant_name())
        }) {
            return Err(PipelineError::Configuration(format!(
                "variant '{}' requires at least one --simulated source",
                missing.variant_name()
            )));
        }
        Ok(standard
            .into_iter()
            .filter(|policy| {
                self.variants
                    .iter()
                    .any(|arg| arg.variant_name() == policy.name)
            })
            .collect())
    }

    fn into_config(self) -> Result<PipelineConfig, PipelineError> {
        let mut sampling = NegativeSamplingConfig::default()
            .with_negatives_per_row(self.negatives)
            .with_exhaustion_policy(self.on_exhausted.into())
            .with_parallel(!self.sequential);
        if let Some(seed) = self.seed {
            sampling = sampling.with_seed(seed);
        }
        let scope = self.scope();
        let policies = self.policies()?;
        let simulated_ids = self.simulated_ids();

        let mut config = PipelineConfig::new(self.output)
            .with_source(SourceSpec::new(
                TRAIN_SOURCE,
                SourceRole::Train,
                self.train,
                SourceFormat::Adjacency,
            ))
            .with_source(SourceSpec::new(
                DEV_SOURCE,
                SourceRole::Dev,
                self.dev,
                SourceFormat::Adjacency,
            ))
            .with_source(SourceSpec::new(
                TEST_SOURCE,
                SourceRole::Test,
                self.test,
                SourceFormat::Adjacency,
            ))
            .with_sampling(sampling)
            .with_scope(scope);
        for (id, path) in simulated_ids.into_iter().zip(self.simulated) {
            let format = if path.is_dir() {
                SourceFormat::SimulationLog
            } else {
                SourceFormat::Feedback
            };
            config = config.with_source(SourceSpec::new(id, SourceRole::Simulated, path, format));
        }
        Ok(policies
            .into_iter()
            .fold(config, |config, policy| config.with_variant(policy)))
    }
}

/// Run the dataset preparation CLI.
///
/// `args_iter` excludes the program name.
pub fn run_prepare<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<PrepareCli, _>(std::iter::once("evalset".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let report = Pipeline::new(cli.into_config()?).run()?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("=== evaluation datasets ===");
    println!(
        "users: {} kept of {} ({} interactions dropped by scope)",
        report.scope.users_kept, report.scope.users_before, report.scope.interactions_dropped
    );
    println!(
        "merged: {} sources, {} interactions, {} users, {} malformed skipped",
        report.merge.sources, report.merge.interactions, report.merge.users, report.merge.malformed
    );
    println!("item universe: {}", report.universe_items);
    println!("sampling seed: {}", report.base_seed);
    for (label, sampling) in [("dev", &report.dev), ("test", &report.test)] {
        println!(
            "{label}: {} rows, {} full, {} reduced, {} skipped",
            sampling.rows, sampling.full, sampling.reduced, sampling.skipped
        );
    }
    println!();
    for (stats, dir) in report.variants.iter().zip(&report.published) {
        println!("[{}] -> {}", stats.variant, dir.display());
        println!(
            "  train: {}  dev: {}  test: {}",
            stats.train_rows, stats.dev_rows, stats.test_rows
        );
        println!(
            "  filtered: {}  duplicates dropped: {}",
            stats.filtered_out, stats.duplicates_dropped
        );
        if let Some(composition) = &stats.composition {
            for share in &composition.per_source {
                println!(
                    "  {}: {} ({:.2}%)",
                    share.source,
                    share.count,
                    share.share * 100.0
                );
            }
        }
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
