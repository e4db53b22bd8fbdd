//! analysis subcommands - run the pipeline or its individual stages

use anyhow::Context;
use clap::{Args, Subcommand};
use docgen::{AnalysisReport, ArtifactStore, ExplainerConfig, History, OpenAiExplainer, Pipeline};
use extract::{ExtractOptions, LogicalSource, MacroExtractor, Strategy};
use flow::{Dialect, DotGenerator, FlowRenderer, MermaidGenerator, RendererConfig, ScanOptions, SymbolScanner};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Extraction and scanning options shared by every subcommand
#[derive(Args, Clone, Debug)]
pub struct SourceArgs {
    /// Discovery strategy (plain-text, compiled-project, all)
    #[arg(long, default_value = "all")]
    pub strategy: String,
    /// Omit the "Filename: X" marker before each fragment
    #[arg(long)]
    pub no_markers: bool,
    /// Also recognise Function/Property blocks and access modifiers
    #[arg(long)]
    pub extended: bool,
}

impl SourceArgs {
    pub fn extractor(&self) -> anyhow::Result<MacroExtractor> {
        let strategy = Strategy::from_str(&self.strategy)
            .ok_or_else(|| anyhow::anyhow!("Unsupported strategy: {}", self.strategy))?;
        Ok(MacroExtractor::new(ExtractOptions {
            strategy,
            origin_markers: !self.no_markers,
            scratch_root: None,
        }))
    }

    pub fn scanner(&self) -> SymbolScanner {
        let dialect = if self.extended {
            Dialect::Extended
        } else {
            Dialect::SubOnly
        };
        SymbolScanner::new(ScanOptions { dialect })
    }
}

/// Artifact and summarization options for full analyses
#[derive(Args, Clone, Debug)]
pub struct OutputArgs {
    /// Artifact root directory (default: the local data dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Hours to keep request artifacts before they are removed
    #[arg(long, default_value = "24")]
    pub retention_hours: u64,
    /// Do not call the summarization service
    #[arg(long)]
    pub no_explain: bool,
}

impl OutputArgs {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(3600))
    }

    pub fn pipeline(&self, source: &SourceArgs) -> anyhow::Result<Pipeline> {
        let root = self.output.clone().unwrap_or_else(ArtifactStore::default_root);
        let store = ArtifactStore::new(root).with_retention(self.retention());

        let explainer = if self.no_explain {
            None
        } else {
            OpenAiExplainer::from_config(ExplainerConfig::from_env())
        };
        if explainer.is_none() && !self.no_explain {
            info!("OPENAI_API_KEY not set, explanations disabled");
        }

        Ok(Pipeline::new(
            source.extractor()?,
            source.scanner(),
            FlowRenderer::new(RendererConfig::from_env()),
            store,
        )
        .with_explainer(explainer))
    }
}

#[derive(Subcommand)]
pub enum AnalyzeCommands {
    /// Extract, scan, render and document one spreadsheet
    Analyze {
        /// Spreadsheet file (.xlsm, .xlsb, ...)
        file: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
    /// Print the extracted macro source
    Extract {
        /// Spreadsheet file
        file: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print procedures and call edges
    Graph {
        /// Spreadsheet file
        file: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
    /// Print the call graph as DOT or Mermaid text
    Diagram {
        /// Spreadsheet file
        file: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
        /// Format (dot, mermaid)
        #[arg(short, long, default_value = "dot")]
        format: String,
        /// Max nodes (mermaid)
        #[arg(long, default_value = "100")]
        max_nodes: usize,
        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List recent analyses
    History {
        /// Number of entries
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(cmd: AnalyzeCommands) -> anyhow::Result<()> {
    match cmd {
        AnalyzeCommands::Analyze { file, source, output, json } => {
            cmd_analyze(&file, &source, &output, json).await
        }
        AnalyzeCommands::Extract { file, source } => cmd_extract(&file, &source),
        AnalyzeCommands::Graph { file, source, json } => cmd_graph(&file, &source, json),
        AnalyzeCommands::Diagram { file, source, format, max_nodes, output } => {
            cmd_diagram(&file, &source, &format, max_nodes, output.as_deref())
        }
        AnalyzeCommands::History { limit, json } => cmd_history(limit, json),
    }
}

fn read_upload(file: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(file).with_context(|| format!("Cannot read {}", file.display()))
}

fn file_label(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

fn load_source(file: &Path, source: &SourceArgs) -> anyhow::Result<LogicalSource> {
    let bytes = read_upload(file)?;
    Ok(source.extractor()?.extract(&bytes))
}

/// Record an analysis; history is best effort
pub fn record_history(history: &History, report: &AnalysisReport) {
    if let Err(e) = history.record(&report.history_record()) {
        warn!("Failed to record history: {}", e);
    }
}

async fn cmd_analyze(file: &Path, source: &SourceArgs, output: &OutputArgs, json: bool) -> anyhow::Result<()> {
    let bytes = read_upload(file)?;
    let pipeline = output.pipeline(source)?;

    let report = pipeline.analyze(&file_label(file), &bytes).await?;

    match History::open(&History::default_path()) {
        Ok(history) => record_history(&history, &report),
        Err(e) => warn!("History unavailable: {}", e),
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Request: {}", report.request_id);
    if report.no_code_found {
        println!("No VBA macro code found in {}", report.file_name);
    } else {
        println!(
            "Procedures: {}, call edges: {}",
            report.graph.procedures.len(),
            report.graph.edges.len()
        );
    }
    println!("Document: {}", report.document.display());
    match &report.call_graph_diagram {
        Some(path) => println!("Call graph: {}", path.display()),
        None if !report.graph.is_empty() => println!("Call graph: omitted (renderer failed)"),
        None => {}
    }
    if let Some(path) = &report.steps_diagram {
        println!("Steps diagram: {}", path.display());
    }

    Ok(())
}

fn cmd_extract(file: &Path, source: &SourceArgs) -> anyhow::Result<()> {
    let logical = load_source(file, source)?;
    if logical.has_code() {
        print!("{}", logical.as_str());
        if !logical.as_str().ends_with('\n') {
            println!();
        }
    } else {
        eprintln!("No VBA macro code found in {}", file.display());
    }
    Ok(())
}

fn cmd_graph(file: &Path, source: &SourceArgs, json: bool) -> anyhow::Result<()> {
    let logical = load_source(file, source)?;
    let graph = source.scanner().scan(logical.as_str());

    if json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    }

    println!("Procedures: {}", graph.procedures.len());
    for (i, procedure) in graph.procedures.iter().enumerate() {
        println!("  {} (line {})", procedure.name, procedure.line);
        for edge in graph.calls_from(i) {
            let marker = if graph.resolve(&edge.to_symbol).is_some() { "" } else { " (external)" };
            println!("    -> {}{} (line {})", edge.to_symbol, marker, edge.line);
        }
    }
    Ok(())
}

fn cmd_diagram(
    file: &Path,
    source: &SourceArgs,
    format: &str,
    max_nodes: usize,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let logical = load_source(file, source)?;
    let graph = source.scanner().scan(logical.as_str());

    let text = match format {
        "dot" => DotGenerator::to_text(&DotGenerator::call_graph(&graph)),
        "mermaid" => {
            let mermaid = MermaidGenerator::new().with_max_nodes(max_nodes).generate_call_graph(&graph);
            format!("```mermaid\n{}\n```", mermaid)
        }
        _ => anyhow::bail!("Unsupported format: {}", format),
    };

    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", text))?;
            println!("Saved to: {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn cmd_history(limit: usize, json: bool) -> anyhow::Result<()> {
    let history = History::open(&History::default_path())?;
    let records = history.recent(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No analyses recorded");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {}  {}  procedures={} edges={}{}",
            record.created_at.as_deref().unwrap_or("-"),
            record.request_id,
            record.file_name,
            record.procedure_count,
            record.edge_count,
            if record.code_found { "" } else { "  (no code)" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(strategy: &str, extended: bool) -> SourceArgs {
        SourceArgs {
            strategy: strategy.to_string(),
            no_markers: false,
            extended,
        }
    }

    #[test]
    fn test_extractor_rejects_unknown_strategy() {
        assert!(args("all", false).extractor().is_ok());
        assert!(args("compiled", false).extractor().is_ok());
        assert!(args("xml", false).extractor().is_err());
    }

    #[test]
    fn test_no_markers_flag() {
        let mut source = args("plain-text", false);
        source.no_markers = true;
        assert!(!source.extractor().unwrap().options().origin_markers);
    }

    #[test]
    fn test_extended_flag_selects_dialect() {
        let graph = args("all", true).scanner().scan("Function F()\nEnd Function");
        assert_eq!(graph.procedures.len(), 1);
        let graph = args("all", false).scanner().scan("Function F()\nEnd Function");
        assert!(graph.is_empty());
    }

    #[test]
    fn test_retention_saturates() {
        let mut output = OutputArgs {
            output: None,
            retention_hours: 24,
            no_explain: true,
        };
        assert_eq!(output.retention(), Duration::from_secs(86_400));
        output.retention_hours = u64::MAX;
        assert_eq!(output.retention(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_file_label_uses_file_name() {
        assert_eq!(file_label(Path::new("/tmp/in/Book1.xlsm")), "Book1.xlsm");
    }
}
