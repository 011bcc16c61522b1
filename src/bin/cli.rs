//! Net.Create CLI - run the filter, focus and comment engines over JSON files
//!
//! Usage: netcreate-cli [OPTIONS] <COMMAND>
//!
//! Every command reads plain JSON (graph, template, comment database) and
//! prints either a table or, with --json, machine-readable output.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use netcreate::{
    comments::{CommentStore, CommentVObj},
    db::{load_ncdata, NcData},
    filter::{FilterAction, FilterGroupKind, FilterMgr, FilterOutcome, FiltersUpdate, Operator},
    server::LocalServer,
    session::Session,
    settings::{self, Settings},
    template::Template,
    utils,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "NETCREATE_LOG";
const CLI_UADDR: &str = "UADDR_CLI";

// ============================================================================
// Main CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "netcreate-cli")]
#[command(version, about = "Net.Create filter, focus and comment engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Data directory holding settings.json (default: $NETCREATE_DATA_DIR or platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute node degrees and edge sizes
    Metrics {
        /// Graph JSON ({nodes, edges})
        graph: PathBuf,
    },
    /// Apply filters to a graph and print the filtered view
    Filter {
        graph: PathBuf,
        /// Template JSON the filters are imported from
        #[arg(long, short)]
        template: PathBuf,
        #[arg(long, short, value_enum)]
        action: Option<ActionArg>,
        /// Node filter as KEY:OPERATOR:VALUE, e.g. label:contains:rome
        #[arg(long = "node", value_name = "KEY:OP:VALUE")]
        node_filters: Vec<String>,
        /// Edge filter as KEY:OPERATOR:VALUE
        #[arg(long = "edge", value_name = "KEY:OP:VALUE")]
        edge_filters: Vec<String>,
        /// Opacity for faded nodes
        #[arg(long)]
        node_transparency: Option<f64>,
        /// Opacity for faded edges
        #[arg(long)]
        edge_transparency: Option<f64>,
    },
    /// Keep only nodes within a number of hops of a source node
    Focus {
        graph: PathBuf,
        /// Source node id
        #[arg(long, short)]
        source: u64,
        /// Hops (default: focus_range from settings)
        #[arg(long, short)]
        range: Option<u32>,
    },
    /// List the filters a template produces
    Filters {
        template: PathBuf,
    },
    /// Print the threaded comments of one collection
    Comments {
        /// Comment database JSON ({comments, readby, users, commentTypes})
        db: PathBuf,
        /// Collection reference (e.g. n12, e7)
        #[arg(long, short)]
        cref: String,
        /// Viewing user (default: user_id from settings)
        #[arg(long, short)]
        user: Option<String>,
        /// Mark the whole collection read by the user and write the database back
        #[arg(long)]
        mark_read: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Filter,
    Fade,
    Reduce,
    Focus,
}

impl From<ActionArg> for FilterAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Filter => FilterAction::Filter,
            ActionArg::Fade => FilterAction::Fade,
            ActionArg::Reduce => FilterAction::Reduce,
            ActionArg::Focus => FilterAction::Focus,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> Result<(), String> {
    // Handle completions first (no settings needed)
    if let Commands::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "netcreate-cli", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = cli.data_dir.clone().unwrap_or_else(settings::data_dir);
    let settings = Settings::load(&settings::settings_path(&data_dir));
    tracing::debug!("data dir: {}", data_dir.display());

    match cli.command {
        Commands::Metrics { graph } => handle_metrics(&graph, cli.json),
        Commands::Filter { graph, template, action, node_filters, edge_filters, node_transparency, edge_transparency } => {
            let update = FiltersUpdate {
                filter_action: action.map(FilterAction::from),
                node_transparency,
                edge_transparency,
                focus_range: None,
            };
            handle_filter(&graph, &template, update, &node_filters, &edge_filters, &settings, cli.json)
        }
        Commands::Focus { graph, source, range } => handle_focus(&graph, source, range, &settings, cli.json),
        Commands::Filters { template } => handle_filters(&template, &settings, cli.json),
        Commands::Comments { db, cref, user, mark_read } => {
            let uid = user.or_else(|| settings.user_id.clone()).unwrap_or_default();
            handle_comments(&db, &cref, &uid, mark_read, &settings, cli.json).await
        }
        Commands::Completions { .. } => Ok(()),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn read_graph(path: &Path) -> Result<NcData, String> {
    load_ncdata(path).map_err(|e| format!("Failed to read graph {}: {}", path.display(), e))
}

fn read_template(path: &Path) -> Result<Template, String> {
    Template::load(path).map_err(|e| format!("Failed to read template {}: {}", path.display(), e))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", out);
    Ok(())
}

fn parse_operator(op: &str) -> Result<Operator, String> {
    serde_json::from_value(serde_json::Value::String(op.to_string()))
        .map_err(|_| format!("Unknown operator '{}'", op))
}

/// Apply one KEY:OP:VALUE argument to the filter with that key.
fn define_from_arg(
    session: &Session<LocalServer>,
    group: FilterGroupKind,
    arg: &str,
) -> Result<(), String> {
    let mut parts = arg.splitn(3, ':');
    let key = parts.next().unwrap_or_default();
    let op = parts
        .next()
        .ok_or_else(|| format!("Filter '{}' is not KEY:OP:VALUE", arg))?;
    let value = parts.next().unwrap_or_default();

    let defs = session.state().filter_defs();
    let mut filter = defs
        .group(group)
        .filters
        .iter()
        .find(|f| f.key == key)
        .cloned()
        .ok_or_else(|| format!("Template has no {} field '{}'", group.as_str(), key))?;
    filter.operator = Some(parse_operator(op)?);
    filter.value = Some(value.to_string());
    session
        .filters()
        .define_filter(session.state(), group, filter)
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn print_outcome(outcome: &FilterOutcome, summary: &str, json: bool) -> Result<(), String> {
    if json {
        return print_json(&outcome.data);
    }
    if !summary.is_empty() {
        println!("{}", summary);
    }
    println!("{} nodes, {} edges ({} nodes removed)", outcome.data.nodes.len(), outcome.data.edges.len(), outcome.removed_nodes.len());
    for node in &outcome.data.nodes {
        let alpha = node.filtered_transparency.unwrap_or(1.0);
        let hops = node.bacon_value.map(|b| format!("  hops={}", b)).unwrap_or_default();
        println!("  {:>6}  {:<32} degrees={:<4} alpha={:.2}{}", node.id, utils::safe_truncate(&node.label, 32), node.degrees, alpha, hops);
    }
    for edge in &outcome.data.edges {
        let alpha = edge.filtered_transparency.unwrap_or(1.0);
        println!(
            "  {:>6}  {} -> {}  size={}  alpha={:.2}",
            edge.id,
            edge.source_label.as_deref().unwrap_or("?"),
            edge.target_label.as_deref().unwrap_or("?"),
            edge.size,
            alpha
        );
    }
    Ok(())
}

// ============================================================================
// Command Handlers
// ============================================================================

fn handle_metrics(graph: &Path, json: bool) -> Result<(), String> {
    let mut data = read_graph(graph)?;
    utils::recalculate_all_node_degrees(&mut data);
    utils::recalculate_all_edge_sizes(&mut data);

    if json {
        return print_json(&data);
    }
    println!("Nodes:");
    for node in &data.nodes {
        println!("  {:>6}  {:<32} degrees={}", node.id, utils::safe_truncate(&node.label, 32), node.degrees);
    }
    println!("Edges:");
    for edge in &data.edges {
        println!("  {:>6}  {} - {}  size={}", edge.id, edge.source, edge.target, edge.size);
    }
    Ok(())
}

fn handle_filter(
    graph: &Path,
    template: &Path,
    update: FiltersUpdate,
    node_filters: &[String],
    edge_filters: &[String],
    settings: &Settings,
    json: bool,
) -> Result<(), String> {
    let data = read_graph(graph)?;
    let template = read_template(template)?;
    let server = Arc::new(LocalServer::with_data(data.clone()));
    let mut session = Session::new(server, CLI_UADDR, "", settings);
    session.load(data, template);

    session.filters().update_filters(session.state(), update);
    for arg in node_filters {
        define_from_arg(&session, FilterGroupKind::Nodes, arg)?;
    }
    for arg in edge_filters {
        define_from_arg(&session, FilterGroupKind::Edges, arg)?;
    }

    let outcome = session.refilter();
    print_outcome(&outcome, &FilterMgr::summary(&session.state().filter_defs()), json)
}

fn handle_focus(graph: &Path, source: u64, range: Option<u32>, settings: &Settings, json: bool) -> Result<(), String> {
    let data = read_graph(graph)?;
    let server = Arc::new(LocalServer::with_data(data.clone()));
    let mut session = Session::new(server, CLI_UADDR, "", settings);
    session.load(data, Template::default());

    let update = FiltersUpdate {
        filter_action: Some(FilterAction::Focus),
        focus_range: Some(range.unwrap_or(settings.focus_range)),
        ..Default::default()
    };
    session.filters().update_filters(session.state(), update);
    let outcome = session
        .filters()
        .set_focus_source(session.state(), Some(source))
        .map_err(|e| e.to_string())?;
    print_outcome(&outcome, &FilterMgr::summary(&session.state().filter_defs()), json)
}

fn handle_filters(template: &Path, settings: &Settings, json: bool) -> Result<(), String> {
    let template = read_template(template)?;
    let defs = FilterMgr::new(settings).build_filters(&template);
    if json {
        return print_json(&defs);
    }
    for (title, group) in [("Node filters", &defs.nodes), ("Edge filters", &defs.edges)] {
        println!("{} (fade to {:.2}):", title, group.transparency);
        for f in &group.filters {
            let options = if f.options.is_empty() { String::new() } else { format!("  [{}]", f.options.join(", ")) };
            println!("  {:<4} {:<20} {:<8} {}{}", f.id, f.key, f.filter_type.as_str(), f.keylabel, options);
        }
    }
    Ok(())
}

async fn handle_comments(db: &Path, cref: &str, uid: &str, mark_read: bool, settings: &Settings, json: bool) -> Result<(), String> {
    let store = CommentStore::load(db).map_err(|e| format!("Failed to read comments {}: {}", db.display(), e))?;
    let server = Arc::new(LocalServer::new());
    let mut session = Session::new(server, CLI_UADDR, uid, settings);
    session.load_comments(store);
    session.open_comments(cref);

    let vobjs = session.state().comment_vobjs(cref);
    if json {
        print_json(&vobjs)?;
    } else {
        print_thread(&session, cref, &vobjs);
    }

    if mark_read {
        if uid.is_empty() {
            return Err("--mark-read needs a user (--user or user_id in settings)".to_string());
        }
        session.close_comments(cref).await.map_err(|e| e.to_string())?;
        session
            .comments()
            .store()
            .save(db)
            .map_err(|e| format!("Failed to write comments {}: {}", db.display(), e))?;
        tracing::info!("marked {} read for {}", cref, uid);
    }
    Ok(())
}

fn print_thread(session: &Session<LocalServer>, cref: &str, vobjs: &[CommentVObj]) {
    let uid = session.uid();
    let comments = session.comments();
    let stats = comments.store().stats(cref, uid);
    println!("{}: {} comments, {} unread", cref, stats.count, stats.unread);
    for v in vobjs {
        let Some(c) = comments.store().get(&v.comment_id) else { continue };
        let indent = "  ".repeat(v.level as usize + 1);
        let marker = if v.is_marked_read { " " } else { "*" };
        let author = comments.store().user_name(&c.commenter_id);
        let edited = if v.modifytime_string.is_empty() { String::new() } else { format!(" (edited {})", v.modifytime_string) };
        println!("{}{}{} - {}{}", indent, marker, author, v.createtime_string, edited);
        if c.comment_is_marked_deleted {
            println!("{}  [deleted]", indent);
            continue;
        }
        let ctype = comments.store().comment_type(&c.comment_type);
        for (i, text) in c.commenter_text.iter().enumerate() {
            match ctype.prompts.get(i) {
                Some(p) if !p.prompt.is_empty() && ctype.prompts.len() > 1 => println!("{}  {}: {}", indent, p.prompt, text),
                _ => println!("{}  {}", indent, text),
            }
        }
    }
}
