//! apiforge CLI - generate and run functional tests from an OpenAPI document

mod storage;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use apiforge_core::{
    Config, EndpointFilter, ExecutionResult, SuiteReport, SuiteSummary, TestCase, TestCategory,
    VerdictPolicy, to_http_file,
};
use apiforge_runner::{
    ExecutionEngine, HeuristicGenerator, LlmSynthesizer, NoProgress, PlaintextCredentials, ProgressSink,
    ReplayOverrides, SpecResolver, SuiteStatus,
};

/// Process exit code for tool errors.
const EXIT_TOOL_ERROR: u8 = 3;

#[derive(Parser)]
#[command(name = "apiforge")]
#[command(about = "Generate and run black-box functional tests from an OpenAPI document")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Strict mode (caveats fail the run). Use --strict false to disable.
    #[arg(long, global = true, default_value_t = false, action = ArgAction::Set)]
    strict: bool,

    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: .apiforge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate test cases and write them as JSON
    Generate {
        #[command(flatten)]
        selection: Selection,

        /// Write cases here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Generate (or load) test cases and execute them
    Run {
        #[command(flatten)]
        selection: Selection,

        /// Execute cases from this file instead of generating
        #[arg(long)]
        cases: Option<PathBuf>,

        /// Output directory for reports and reproductions
        #[arg(short = 'd', long, default_value = ".apiforge")]
        output_dir: PathBuf,

        /// Dump every result to JSONL files
        #[arg(long)]
        dump: bool,

        /// Directory for dump files (default: .apiforge/dumps)
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },

    /// Re-run one case with optional overrides
    Replay {
        /// Descriptor file produced by `generate`
        #[arg(long)]
        cases: PathBuf,

        /// Case name to replay
        #[arg(long)]
        name: String,

        /// Replacement payload (JSON)
        #[arg(long)]
        payload: Option<String>,

        /// Extra header, repeatable: `--header X-Trace=abc`
        #[arg(long = "header", value_name = "KEY=VALUE")]
        headers: Vec<String>,
    },

    /// Initialize config file
    Init,

    /// Check config, spec and LLM settings
    Doctor,

    /// Export JSON Schema for the interchange format
    Schema {
        /// Schema of the test-case file instead of the run report
        #[arg(long)]
        cases: bool,
    },
}

#[derive(clap::Args)]
struct Selection {
    /// Categories to generate (comma-separated, default: config or all)
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    /// Restrict to one operation, repeatable: `--endpoint "POST /pets"`
    #[arg(long = "endpoint", value_name = "METHOD /path")]
    endpoints: Vec<String>,

    /// Use heuristic generation even when `[llm]` is configured
    #[arg(long)]
    heuristic: bool,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_TOOL_ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(cfg)
}

fn generate(cfg: &Config, selection: &Selection) -> Result<Vec<TestCase>> {
    let spec = SpecResolver::parse_file(&cfg.spec)?;

    let categories: Vec<TestCategory> = if selection.categories.is_empty() {
        cfg.categories.clone()
    } else {
        selection
            .categories
            .iter()
            .map(|c| c.parse::<TestCategory>())
            .collect::<Result<_, _>>()?
    };
    let endpoints: Vec<EndpointFilter> = if selection.endpoints.is_empty() {
        cfg.endpoints.clone()
    } else {
        selection.endpoints.iter().map(|e| EndpointFilter::parse(e)).collect()
    };

    let cases = match &cfg.llm {
        Some(llm) if !selection.heuristic => LlmSynthesizer::from_config(llm)?
            .with_fixtures(cfg.fixtures.clone())
            .generate_all(&spec, Some(endpoints.as_slice()), Some(categories.as_slice()))?,
        _ => HeuristicGenerator::new(&spec)
            .with_fixtures(cfg.fixtures.clone())
            .generate_all_tests(Some(endpoints.as_slice()), Some(categories.as_slice())),
    };
    Ok(cases)
}

fn read_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))
}

/// Parse `KEY=VALUE` header arguments.
fn parse_headers(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|h| match h.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
            _ => bail!("invalid header '{h}', expected KEY=VALUE"),
        })
        .collect()
}

/// One stderr line per finished case.
struct TerminalProgress;

impl ProgressSink for TerminalProgress {
    fn on_result(&mut self, index: usize, result: &ExecutionResult, summary: &SuiteSummary) {
        let status = result
            .actual_status
            .map_or_else(|| "---".to_string(), |s| s.to_string());
        eprintln!(
            "[{}/{}] {:<18} {status} {}",
            index + 1,
            summary.total,
            result.verdict.as_str(),
            result.name
        );
    }

    fn on_status(&mut self, status: SuiteStatus) {
        if status == SuiteStatus::Failed {
            eprintln!("Every case errored. Check base_url and connectivity.");
        }
    }
}

fn print_terminal(report: &SuiteReport, exit_code: i32) {
    let s = &report.summary;
    let icon = if exit_code == 0 { "PASS" } else { "FAIL" };
    println!(
        "\n{icon}: {} total, {} passed ({} with caveat), {} failed, {} errors",
        s.total, s.passed, s.passed_with_caveat, s.failed, s.errors
    );
    if s.security_findings > 0 {
        println!("  Security findings: {}", s.security_findings);
    }
    println!("  Exit code: {exit_code}");

    let failures: Vec<&ExecutionResult> = report.failures().collect();
    if !failures.is_empty() {
        println!("\nFailures ({}):", failures.len());
        for r in failures {
            let severity = r.severity.map(|s| format!("[{s}] ")).unwrap_or_default();
            println!(
                "  {severity}{} {} {} -> {} ({})",
                r.verdict,
                r.method,
                r.endpoint,
                r.actual_status
                    .map_or_else(|| "no response".to_string(), |s| s.to_string()),
                r.name
            );
            if let Some(msg) = r.error.as_deref().filter(|m| !m.is_empty()) {
                println!("         {msg}");
            }
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let policy = VerdictPolicy { strict: cli.strict };

    match cli.command {
        Commands::Generate { selection, out } => {
            let cfg = load_config(cli.config.as_deref())?;
            let cases = generate(&cfg, &selection)?;
            let json = serde_json::to_string_pretty(&cases)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("write {}", path.display()))?;
                    if cli.output != OutputFormat::Silent {
                        eprintln!("Generated {} cases → {}", cases.len(), path.display());
                    }
                }
                None => println!("{json}"),
            }
            Ok(0)
        }

        Commands::Run {
            selection,
            cases,
            output_dir,
            dump,
            dump_dir,
        } => {
            let cfg = load_config(cli.config.as_deref())?;

            if cli.output != OutputFormat::Silent {
                eprintln!("Config:");
                eprintln!("  spec:     {}", cfg.spec.display());
                eprintln!("  base_url: {}", cfg.base_url);
                if !cfg.headers.is_empty() {
                    eprintln!("  headers:  {} configured", cfg.headers.len());
                }
                if let Some(auth) = &cfg.auth {
                    eprintln!("  auth:     {}", auth.auth_type.as_str());
                }
                eprintln!();
            }

            let cases = match cases {
                Some(path) => read_cases(&path)?,
                None => generate(&cfg, &selection)?,
            };
            if cases.is_empty() {
                eprintln!("Error: No test cases to run. Check spec, categories and endpoints.");
                return Ok(i32::from(EXIT_TOOL_ERROR));
            }

            let mut engine = ExecutionEngine::from_config(&cfg, &PlaintextCredentials)?;
            let started = Instant::now();
            let report = if cli.output == OutputFormat::Terminal {
                engine.run_suite(&cases, &mut TerminalProgress)
            } else {
                engine.run_suite(&cases, &mut NoProgress)
            };
            let duration_secs = started.elapsed().as_secs_f64();
            let exit_code = policy.exit_code(&report.summary);

            match cli.output {
                OutputFormat::Terminal => {
                    print_terminal(&report, exit_code);
                    if report.failures().next().is_some() {
                        let http_path = output_dir.join("reproductions.http");
                        let written = std::fs::create_dir_all(&output_dir).and_then(|()| {
                            std::fs::write(&http_path, to_http_file(&report.results, "base_url"))
                        });
                        match written {
                            Ok(()) => println!("Reproductions: {}", http_path.display()),
                            Err(e) => eprintln!("Warning: failed to write .http file: {e}"),
                        }
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Silent => {}
            }

            if dump || cfg.dump {
                let dump_path = dump_dir
                    .or_else(|| cfg.dump_dir.clone())
                    .unwrap_or_else(|| output_dir.join("dumps"));
                match apiforge_core::dump::write_dump(&report.results, &dump_path, true) {
                    Ok(index) => {
                        if cli.output != OutputFormat::Silent {
                            eprintln!(
                                "Dump: {} results → {} ({} files)",
                                index.total,
                                dump_path.display(),
                                index.operations.len()
                            );
                        }
                    }
                    Err(e) => eprintln!("Warning: failed to write dump: {e}"),
                }
            }

            let data = storage::ReportData {
                config: &cfg,
                report: &report,
                exit_code,
                duration_secs,
            };
            match storage::save_report(&output_dir.join("reports"), &data, Utc::now()) {
                Ok(path) => {
                    if cli.output != OutputFormat::Silent {
                        eprintln!("Report saved: {}", path.display());
                    }
                }
                Err(e) => eprintln!("Warning: failed to save report: {e}"),
            }

            Ok(exit_code)
        }

        Commands::Replay {
            cases,
            name,
            payload,
            headers,
        } => {
            let cfg = load_config(cli.config.as_deref())?;
            let cases = read_cases(&cases)?;
            let Some(case) = cases.iter().find(|c| c.name == name) else {
                bail!("no case named '{name}' in the descriptor file");
            };
            let overrides = ReplayOverrides {
                payload: payload
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()
                    .context("--payload is not valid JSON")?,
                headers: parse_headers(&headers)?,
                assertions: None,
            };

            let mut engine = ExecutionEngine::from_config(&cfg, &PlaintextCredentials)?;
            let started = Utc::now();
            let result = engine.replay(case, &overrides);
            let report = SuiteReport::from_results(vec![result], started, Utc::now());
            let exit_code = policy.exit_code(&report.summary);

            match cli.output {
                OutputFormat::Terminal => {
                    for r in &report.results {
                        println!(
                            "{}: {} {} -> {}",
                            r.verdict,
                            r.method,
                            r.endpoint,
                            r.actual_status
                                .map_or_else(|| "no response".to_string(), |s| s.to_string())
                        );
                        if let Some(msg) = &r.error {
                            println!("  {msg}");
                        }
                        if let Some(resp) = r.last_response() {
                            println!("\n{}", resp.body);
                        }
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report.results)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(exit_code)
        }

        Commands::Init => {
            let config_path = ".apiforge.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path to your OpenAPI document");
            println!("  - base_url: server to test");
            println!("  - auth: credentials for the target");
            println!("  - llm: provider and model for LLM generation");
            Ok(0)
        }

        Commands::Doctor => {
            println!("apiforge doctor");
            println!("===============\n");

            let cfg = match load_config(cli.config.as_deref()) {
                Ok(cfg) => {
                    println!("[OK] Config file");
                    cfg
                }
                Err(e) => {
                    println!("[NG] Config file: {e:#}");
                    return Ok(1);
                }
            };

            let mut ready = true;
            match SpecResolver::parse_file(&cfg.spec) {
                Ok(spec) => println!(
                    "[OK] Spec {} ({} endpoints)",
                    cfg.spec.display(),
                    spec.get_endpoints().len()
                ),
                Err(e) => {
                    ready = false;
                    println!("[NG] Spec {}: {e}", cfg.spec.display());
                }
            }

            match &cfg.auth {
                Some(auth) => match auth.credential_blob() {
                    Ok(_) => println!("[OK] Auth ({})", auth.auth_type.as_str()),
                    Err(e) => {
                        ready = false;
                        println!("[NG] Auth: {e}");
                    }
                },
                None => println!("[--] Auth (none configured)"),
            }

            match &cfg.llm {
                Some(llm) => match LlmSynthesizer::from_config(llm) {
                    Ok(_) => println!("[OK] LLM ({} / {})", llm.provider, llm.model),
                    Err(e) => {
                        ready = false;
                        println!("[NG] LLM: {e}");
                    }
                },
                None => println!("[--] LLM (heuristic generation)"),
            }

            if ready {
                println!("\nReady to run!");
                Ok(0)
            } else {
                Ok(1)
            }
        }

        Commands::Schema { cases } => {
            let schema = if cases {
                apiforge_core::schema::generate_case_schema()
            } else {
                apiforge_core::schema::generate_schema()
            };
            println!("{schema}");
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiforge_core::Verdict;

    #[test]
    fn headers_parse_key_value_pairs() {
        let parsed = parse_headers(&["X-Trace=abc".to_string(), "A = b=c".to_string()]).unwrap();
        assert_eq!(parsed["X-Trace"], "abc");
        assert_eq!(parsed["A"], "b=c");
        assert!(parse_headers(&["novalue".to_string()]).is_err());
        assert!(parse_headers(&["=x".to_string()]).is_err());
    }

    #[test]
    fn cli_parses_run_selection() {
        let cli = Cli::try_parse_from([
            "apiforge",
            "run",
            "--categories",
            "happy_path,security",
            "--endpoint",
            "POST /pets",
            "--output",
            "json",
        ])
        .unwrap();
        let Commands::Run { selection, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(selection.categories, ["happy_path", "security"]);
        assert_eq!(selection.endpoints, ["POST /pets"]);
        assert!(cli.output == OutputFormat::Json);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().join("openapi.json");
        std::fs::write(
            &spec,
            r#"{"openapi": "3.0.0", "info": {"title": "t", "version": "1"}, "paths": {}}"#,
        )
        .unwrap();
        let cfg = Config {
            spec,
            ..Config::default()
        };
        let selection = Selection {
            categories: vec!["fuzzing".into()],
            endpoints: Vec::new(),
            heuristic: true,
        };
        let err = generate(&cfg, &selection).unwrap_err();
        assert!(err.to_string().contains("unknown test category"));
    }

    #[test]
    fn heuristic_generation_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().join("openapi.json");
        std::fs::write(
            &spec,
            r#"{"openapi": "3.0.0", "info": {"title": "t", "version": "1"},
                "paths": {"/pets": {"get": {"responses": {"200": {"description": "ok"}}}}}}"#,
        )
        .unwrap();
        let cfg = Config {
            spec,
            ..Config::default()
        };
        let selection = Selection {
            categories: vec!["happy_path".into()],
            endpoints: Vec::new(),
            heuristic: false,
        };
        let cases = generate(&cfg, &selection).unwrap();
        assert!(!cases.is_empty());
        assert!(cases.iter().all(|c| c.category == TestCategory::HappyPath));
    }

    #[test]
    fn verdict_labels_fit_progress_column() {
        for v in [Verdict::Passed, Verdict::PassedWithCaveat, Verdict::Failed, Verdict::Error] {
            assert!(v.as_str().len() <= 18);
        }
    }
}
