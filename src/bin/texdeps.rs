extern crate texdeps;

use std::io::prelude::*;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use fs_err as fs;
use tracing_subscriber::EnvFilter;

use texdeps::common::{path_to_string, readable_canonical_path};
use texdeps::query::expand_home;
use texdeps::tools::{check_build_tool, required_tools};
use texdeps::{ScanParameters, ScanQuery, ScanReport, SystemTools, TexEngine};

#[derive(Parser, Debug)]
#[command(
    name = "texdeps",
    version,
    about = "Recover the build dependencies of a multi-file LaTeX document"
)]
struct Args {
    /// Top-level document (the .tex extension may be omitted)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Log what is being scanned and resolved
    #[arg(short, long)]
    verbose: bool,

    /// Report absolute file paths instead of paths relative to the document directory
    #[arg(long = "absolute-paths")]
    absolute_paths: bool,

    /// Report tools by their absolute location
    #[arg(long = "absolute-executables")]
    absolute_executables: bool,

    /// TeX engine used to build the document (latex, pdflatex, lualatex, xelatex)
    #[arg(short, long, value_name = "ENGINE")]
    engine: Option<TexEngine>,

    /// Texmf tree to search for styles and classes; replaces the detected ones
    #[arg(long = "texmf", value_name = "DIR")]
    texmf: Vec<PathBuf>,

    /// Additional directory to search for figures
    #[arg(long = "graphics-path", value_name = "DIR")]
    graphics_paths: Vec<PathBuf>,

    /// Read the scan parameters from a JSON file; command line flags take precedence
    #[arg(short, long, value_name = "JSON")]
    parameters: Option<PathBuf>,

    /// Path for output in JSON format
    #[arg(short = 'j', long = "output-json-path", value_name = "OUTPUT_JSON_PATH")]
    output_json_path: Option<PathBuf>,

    /// Check that make and the tools needed by the build passes are installed
    #[arg(long = "check-tools")]
    check_tools: bool,
}

fn print_section<P: AsRef<Path>>(title: &str, entries: &[P]) {
    if entries.is_empty() {
        return;
    }
    println!("{}:", title);
    for e in entries {
        println!("\t{}", path_to_string(e));
    }
}

fn print_report(report: &ScanReport) {
    let m = &report.manifest;
    print_section("Source files", m.source_files());
    print_section("Class files", m.class_files());
    print_section("Style files", m.style_files());
    print_section("Figures", m.figure_files());
    print_section("Duplicate figures", m.duplicate_figure_files());
    print_section("Bibliographies", m.bibliography_files());
    print_section("Graphics paths", m.graphics_paths());
    print_section("Sub paths", m.sub_paths());
    print_section("Texmf roots", m.texmf_roots());
    print_section("Texmf package paths", m.texmf_package_paths());

    if !m.packages().is_empty() {
        println!(
            "Packages: {}",
            m.packages().iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }
    println!("Figure extensions: {}", m.figure_extensions().join(", "));
    println!("Bibliography backend: {}", m.bibliography_backend());
    println!(
        "Passes: bibliography {}, index {}, glossary {}",
        m.needs_bibliography_pass(),
        m.needs_index_pass(),
        m.needs_glossary_pass()
    );

    if !report.diagnostics.is_empty() {
        println!("\nDiagnostics:");
        for d in &report.diagnostics {
            println!("\t{}", d);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let mut query = ScanQuery::deduce_from_entry_file(&args.input).with_context(|| {
        format!(
            "Could not open {} as the top-level document",
            path_to_string(&args.input)
        )
    })?;

    if let Some(parameters_path) = &args.parameters {
        query.parameters = ScanParameters::from_json_file(parameters_path).with_context(|| {
            format!("Could not read parameters from {}", path_to_string(parameters_path))
        })?;
    }

    // overrides (must be last)

    query.parameters.verbose |= args.verbose;
    query.parameters.use_absolute_file_paths |= args.absolute_paths;
    query.parameters.use_absolute_executable_paths |= args.absolute_executables;
    if let Some(engine) = args.engine {
        query.parameters.tex_engine = engine;
    }
    if !args.texmf.is_empty() {
        query.parameters.texmf_roots = args.texmf.iter().map(expand_home).collect();
    }
    query
        .parameters
        .graphics_paths
        .extend(args.graphics_paths.iter().map(expand_home));

    if query.parameters.verbose {
        println!(
            "Scanning {} in project directory {}",
            readable_canonical_path(&query.target.entry_file)?,
            readable_canonical_path(&query.target.base_dir)?
        );
        let roots: Vec<String> = query.parameters.texmf_roots.iter().map(path_to_string).collect();
        println!("Texmf roots: {}\n", roots.join(", "));
    }

    let tools = SystemTools;
    let report = texdeps::scan(&query, &tools)?;

    print_report(&report);

    if args.check_tools {
        println!("\nChecking tools...\n");
        let make = check_build_tool(&tools, "make")?;
        println!("\tmake => {}", path_to_string(make));
        for t in required_tools(&report.manifest, &query.parameters, &tools) {
            let location = t
                .path
                .as_ref()
                .map(path_to_string)
                .unwrap_or_else(|| "not found".to_owned());
            println!("\t{} => {}", t.name, location);
        }
    }

    // JSON representation

    if let Some(json_output_path) = &args.output_json_path {
        let js = serde_json::to_string_pretty(&report).context("Error serializing")?;

        let display = json_output_path.display();
        let mut file = fs::File::create(json_output_path)
            .with_context(|| format!("couldn't create {}", display))?;
        file.write_all(js.as_bytes())
            .with_context(|| format!("couldn't write to {}", display))?;

        if query.parameters.verbose {
            println!("successfully wrote to {}", display);
        }
    }

    Ok(())
}
