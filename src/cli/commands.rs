//! Command dispatch: load tables, run the analysis, report, write results.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::batch::{BatchReport, Neurons};
use crate::application::cable::{cable_length, dist_to_root};
use crate::application::confidence::arbor_confidence;
use crate::application::flow::flow_centrality;
use crate::application::prune::{prune_by_strahler, PruneTarget};
use crate::application::segregation::segregation;
use crate::application::split::{find_cut_point, split_axon_dendrite};
use crate::application::stitch::stitch;
use crate::application::strahler::strahler_index;
use crate::cli::args::{Cli, Commands, ConfigCommands, OutputArgs};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{FlowMethod, NodeType, StitchMethod, StrahlerMethod, TreeArena};
use crate::infrastructure::ServiceContainer;
use crate::tree_traits::TopologyView;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Ok(());
    };
    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref())?;
    let parallel = settings.batch.parallel && !cli.sequential;
    let ctx = Context {
        services: ServiceContainer::new(settings),
        parallel,
    };
    debug!("parallel: {}", ctx.parallel);

    match command {
        Commands::Classify { file, out } => cmd_classify(&ctx, file, out),
        Commands::Strahler { file, method, out } => cmd_strahler(&ctx, file, method.as_deref(), out),
        Commands::Confidence { file, out } => cmd_confidence(&ctx, file, out),
        Commands::Flow {
            file,
            method,
            polypre,
            out,
        } => cmd_flow(&ctx, file, method.as_deref(), *polypre, out),
        Commands::Bending { file, polypre, out } => {
            cmd_flow(&ctx, file, Some("bending"), *polypre, out)
        }
        Commands::Split {
            file,
            method,
            cut_only,
            no_primary_neurite,
            no_reroot,
            out,
        } => cmd_split(
            &ctx,
            file,
            method.as_deref(),
            *cut_only,
            *no_primary_neurite,
            *no_reroot,
            out,
        ),
        Commands::Prune {
            file,
            indices,
            min,
            max,
            keep_top,
            relocate,
            force,
            out,
        } => {
            let target = prune_target(indices, *min, *max, *keep_top)?;
            cmd_prune(&ctx, file, target, *relocate, *force, out)
        }
        Commands::Stitch {
            files,
            method,
            prefer,
            out,
        } => cmd_stitch(&ctx, files, method.as_deref(), prefer, out),
        Commands::Segregation { file } => cmd_segregation(&ctx, file),
        Commands::Cable { file, out } => cmd_cable(&ctx, file, out),
        Commands::Topology { file } => cmd_topology(&ctx, file),
        Commands::Config { command } => cmd_config(&ctx, command),
        Commands::Completion { .. } => Ok(()),
    }
}

struct Context {
    services: ServiceContainer,
    parallel: bool,
}

impl Context {
    fn settings(&self) -> &Settings {
        &self.services.settings
    }

    fn load(&self, file: &Path) -> CliResult<Neurons> {
        Ok(Neurons::from(self.services.load_neurons(file)?))
    }

    fn save<'a>(&self, out: &OutputArgs, trees: impl IntoIterator<Item = &'a TreeArena>) -> CliResult<()> {
        if let Some(path) = &out.output {
            self.services.save_neurons(path, trees)?;
            output::action("Written", &path.display());
        }
        Ok(())
    }
}

fn label(tree: &TreeArena) -> String {
    match (tree.skeleton_id, tree.name.as_str()) {
        (Some(id), "") => id.to_string(),
        (Some(id), name) => format!("{} ({})", name, id),
        (None, "") => "neuron".to_string(),
        (None, name) => name.to_string(),
    }
}

/// Run `f` on every neuron in place, print each success with `show`, write
/// the surviving trees and turn failures into a non-zero exit.
fn run_and_report<T, F, S>(ctx: &Context, file: &Path, out: &OutputArgs, f: F, show: S) -> CliResult<()>
where
    T: Send,
    F: Fn(&mut TreeArena) -> crate::domain::DomainResult<T> + Sync + Send,
    S: Fn(&TreeArena, &T),
{
    let mut neurons = ctx.load(file)?;
    let report = neurons.run_in_place(ctx.parallel, f);
    for (index, value) in &report.succeeded {
        let tree = &neurons.trees()[*index];
        output::header(&label(tree));
        show(tree, value);
    }
    let ok: Vec<&TreeArena> = report
        .succeeded
        .iter()
        .map(|(i, _)| &neurons.trees()[*i])
        .collect();
    ctx.save(out, ok)?;
    finish(&report, neurons.len())
}

fn finish<T>(report: &BatchReport<T>, total: usize) -> CliResult<()> {
    for failure in &report.failed {
        output::failure(&format!(
            "neuron {} ({:?}): {}",
            failure.index, failure.skeleton_id, failure.error
        ));
    }
    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::Batch {
            failed: report.failed.len(),
            total,
        })
    }
}

#[instrument(skip(ctx))]
fn cmd_classify(ctx: &Context, file: &Path, out: &OutputArgs) -> CliResult<()> {
    run_and_report(
        ctx,
        file,
        out,
        |tree| tree.classify(),
        |tree, _| {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for node in tree.nodes() {
                if let Some(t) = node.derived.node_type {
                    *counts.entry(t.to_string()).or_default() += 1;
                }
            }
            for (kind, n) in counts {
                output::metric(&kind, &n);
            }
        },
    )
}

#[instrument(skip(ctx))]
fn cmd_strahler(ctx: &Context, file: &Path, method: Option<&str>, out: &OutputArgs) -> CliResult<()> {
    let method = match method {
        Some(m) => m.parse::<StrahlerMethod>()?,
        None => ctx.settings().strahler_method()?,
    };
    run_and_report(
        ctx,
        file,
        out,
        |tree| strahler_index(tree, method),
        |tree, _| {
            let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
            for node in tree.nodes() {
                if let Some(i) = node.derived.strahler_index {
                    *counts.entry(i).or_default() += 1;
                }
            }
            for (index, n) in counts.iter().rev() {
                output::metric(&format!("index {}", index), &format!("{} nodes", n));
            }
        },
    )
}

#[instrument(skip(ctx))]
fn cmd_confidence(ctx: &Context, file: &Path, out: &OutputArgs) -> CliResult<()> {
    let factors = ctx.settings().confidence_factors()?;
    run_and_report(
        ctx,
        file,
        out,
        |tree| arbor_confidence(tree, &factors),
        |tree, _| {
            let lowest = tree
                .nodes()
                .filter_map(|n| n.derived.arbor_confidence.map(|c| (n.id, c)))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((id, c)) = lowest {
                output::metric("lowest", &format!("{:.3} at node {}", c, id));
            }
        },
    )
}

#[instrument(skip(ctx))]
fn cmd_flow(
    ctx: &Context,
    file: &Path,
    method: Option<&str>,
    polypre: bool,
    out: &OutputArgs,
) -> CliResult<()> {
    let method = match method {
        Some(m) => m.parse::<FlowMethod>()?,
        None => ctx.settings().flow_method()?,
    };
    let polypre = polypre || ctx.settings().analysis.polypre;
    run_and_report(
        ctx,
        file,
        out,
        |tree| flow_centrality(tree, method, polypre),
        |tree, _| {
            let computed: Vec<(i64, i64)> = tree
                .nodes()
                .filter_map(|n| n.derived.flow_centrality.map(|f| (n.id, f)))
                .collect();
            let peak = computed.iter().max_by_key(|(id, f)| (*f, -*id));
            output::metric(&format!("{} nodes", method), &computed.len());
            if let Some((id, f)) = peak {
                output::metric("maximum", &format!("{} at node {}", f, id));
            }
        },
    )
}

#[instrument(skip(ctx))]
fn cmd_split(
    ctx: &Context,
    file: &Path,
    method: Option<&str>,
    cut_only: bool,
    no_primary_neurite: bool,
    no_reroot: bool,
    out: &OutputArgs,
) -> CliResult<()> {
    let mut opts = ctx.settings().split_options()?;
    if let Some(m) = method {
        opts.method = m.parse()?;
    }
    opts.primary_neurite &= !no_primary_neurite;
    opts.reroot_soma &= !no_reroot;

    let neurons = ctx.load(file)?;
    if cut_only {
        let report = neurons.run(ctx.parallel, |tree| find_cut_point(tree, &opts));
        for (index, (_, cut)) in &report.succeeded {
            output::action(&label(&neurons.trees()[*index]), &format!("cut at node {}", cut));
        }
        return finish(&report, neurons.len());
    }

    let report = neurons.run(ctx.parallel, |tree| split_axon_dendrite(tree, &opts));
    let mut fragments: Vec<TreeArena> = Vec::new();
    for (index, (_, split)) in &report.succeeded {
        output::header(&label(&neurons.trees()[*index]));
        output::metric("cut", &split.cut);
        for fragment in split.fragments() {
            output::detail(&format!(
                "{:<24}{:>7} nodes {:>5} pre {:>5} post",
                fragment.name,
                fragment.len(),
                fragment.n_presynapses(),
                fragment.n_postsynapses()
            ));
        }
        fragments.extend(split.clone().into_fragments());
    }
    ctx.save(out, &fragments)?;
    finish(&report, neurons.len())
}

fn prune_target(
    indices: &[u32],
    min: Option<u32>,
    max: Option<u32>,
    keep_top: Option<usize>,
) -> CliResult<PruneTarget> {
    match (indices.is_empty(), min.zip(max), keep_top) {
        (false, None, None) => Ok(PruneTarget::Indices(indices.iter().copied().collect())),
        (true, Some((min, max)), None) if min <= max => Ok(PruneTarget::Range { min, max }),
        (true, None, Some(n)) => Ok(PruneTarget::KeepTop(n)),
        _ => Err(CliError::InvalidArgs(
            "give one of --indices, --min/--max (min <= max) or --keep-top".to_string(),
        )),
    }
}

#[instrument(skip(ctx))]
fn cmd_prune(
    ctx: &Context,
    file: &Path,
    target: PruneTarget,
    relocate: bool,
    force: bool,
    out: &OutputArgs,
) -> CliResult<()> {
    let mut opts = ctx.settings().prune_options(target)?;
    opts.relocate_connectors |= relocate;
    opts.force_strahler_update = force;
    run_and_report(
        ctx,
        file,
        out,
        |tree| prune_by_strahler(tree, &opts),
        |tree, report| {
            output::metric("removed", &report.removed_nodes);
            output::metric("remaining", &tree.len());
            output::metric("relocated", &report.relocated_connectors);
            output::metric("dropped", &report.dropped_connectors);
            if !report.new_roots.is_empty() {
                output::warning(&format!("new roots: {:?}", report.new_roots));
            }
        },
    )
}

#[instrument(skip(ctx))]
fn cmd_stitch(
    ctx: &Context,
    files: &[std::path::PathBuf],
    method: Option<&str>,
    prefer: &[i64],
    out: &OutputArgs,
) -> CliResult<()> {
    let method = match method {
        Some(m) => m.parse::<StitchMethod>()?,
        None => ctx.settings().stitch_method()?,
    };
    let mut trees = Vec::new();
    for file in files {
        trees.extend(ctx.services.load_neurons(file)?);
    }
    let n_inputs = trees.len();
    let stitched = stitch(trees, method, prefer)?;
    output::success(&format!(
        "stitched {} fragments into {} nodes, {} root(s)",
        n_inputs,
        stitched.len(),
        stitched.roots().len()
    ));
    ctx.save(out, [&stitched])
}

#[instrument(skip(ctx))]
fn cmd_segregation(ctx: &Context, file: &Path) -> CliResult<()> {
    let opts = ctx.settings().segregation_options()?;
    let trees = ctx.services.load_neurons(file)?;
    let neurons = if trees.len() == 1 {
        Neurons::from(trees.into_iter().next().ok_or_else(|| {
            CliError::InvalidArgs("no neuron in file".to_string())
        })?)
    } else {
        Neurons::from(trees)
    };
    let index = segregation(&neurons, &opts)?;
    output::action("Segregation index", &format!("{:.4}", index));
    Ok(())
}

#[instrument(skip(ctx))]
fn cmd_cable(ctx: &Context, file: &Path, out: &OutputArgs) -> CliResult<()> {
    run_and_report(
        ctx,
        file,
        out,
        |tree| {
            dist_to_root(tree)?;
            Ok(cable_length(tree))
        },
        |tree, length| {
            let furthest = tree
                .nodes()
                .filter_map(|n| n.derived.dist_to_root)
                .fold(0.0_f64, f64::max);
            let ends = tree
                .nodes()
                .filter(|n| n.derived.node_type == Some(NodeType::End))
                .count();
            output::metric("cable length", &format!("{:.1}", length));
            output::metric("max path", &format!("{:.1}", furthest));
            output::metric("nodes", &tree.len());
            output::metric("branch points", &tree.branch_points().len());
            output::metric("ends", &ends);
            output::metric("connectors", &tree.n_connectors());
        },
    )
}

#[instrument(skip(ctx))]
fn cmd_topology(ctx: &Context, file: &Path) -> CliResult<()> {
    let neurons = ctx.load(file)?;
    for tree in neurons.trees() {
        output::info(&tree.to_tree_string());
    }
    Ok(())
}

fn cmd_config(ctx: &Context, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::info(&ctx.settings().to_toml()?);
        }
        ConfigCommands::Path => {
            let global = global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(no config directory)".to_string());
            let exists = global_config_path().is_some_and(|p| ctx.services.fs.exists(&p));
            let state = if exists { "" } else { " (absent)" };
            output::action("Global", &format!("{}{}", global, state));
        }
        ConfigCommands::Template => {
            output::info(&Settings::template());
        }
    }
    Ok(())
}
