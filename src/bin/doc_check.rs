use anyhow::Context;
use clap::Parser;
use multiphase_analyzer::document::{DocumentReport, ProjectDescriptionDocument};
use multiphase_analyzer::utils::logger;

#[derive(Parser)]
#[command(name = "doc-check")]
#[command(about = "Check the structure of the project description document")]
struct Args {
    /// Markdown file to check
    #[arg(short, long, default_value = "README.md")]
    path: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    tracing::info!("📄 Checking {}", args.path);

    let raw = std::fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path))?;
    let document = ProjectDescriptionDocument::parse(&raw);
    let report = DocumentReport::evaluate(&document, &raw);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("📋 Document Report: {}", args.path);
        println!("  Title: {}", report.title.as_deref().unwrap_or("(none)"));
        println!("  Sections: {}", document.sections().len());
        println!("  Diagram blocks: {}", document.diagrams().len());
        println!("  Fence delimiters: {}", report.fence_delimiters);
        for problem in report.problems() {
            println!("  ❌ {}", problem);
        }
    }

    if report.is_clean() {
        tracing::info!("✅ Document structure is valid");
        Ok(())
    } else {
        tracing::error!("❌ Document has {} problem(s)", report.problems().len());
        std::process::exit(1);
    }
}
