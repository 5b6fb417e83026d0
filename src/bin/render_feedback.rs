use std::env;
use std::fs;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use essay_feedback::controller::{HttpTransport, SubmissionController, TextLimits};
use essay_feedback::feedback::{FeedbackPresenter, Region};
use essay_feedback::schemas::essay::{ingest, Mode, SubmissionResponse, WidgetConfig};

const USAGE: &str = "usage: render_feedback --essay <file> (--result <file> | --submit <url>) \
                     [--exam] [--hide-score] [--timeout <seconds>]";

#[derive(Debug)]
enum Source {
    Result(String),
    Submit(String),
}

#[derive(Debug)]
struct Args {
    essay_path: String,
    source: Source,
    mode: Mode,
    show_score_in_exam: bool,
    timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    essay_feedback::init_cli_tracing("warn")?;
    let args = parse_args()?;

    let essay = fs::read_to_string(&args.essay_path)
        .with_context(|| format!("Failed to read {}", args.essay_path))?;

    let html = match &args.source {
        Source::Result(path) => render_stored(&args, path, &essay)?,
        Source::Submit(url) => submit(&args, url, &essay).await?,
    };

    println!("{html}");
    Ok(())
}

fn render_stored(args: &Args, path: &str, essay: &str) -> Result<String> {
    let payload = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let value: Value =
        serde_json::from_str(&payload).with_context(|| format!("Invalid JSON in {path}"))?;

    let mut result = match ingest(value) {
        SubmissionResponse::Success(result) => result,
        SubmissionResponse::Failure(error) => {
            bail!("{path} holds a failed submission ({})", error.error.code())
        }
        SubmissionResponse::Malformed => bail!("{path} is not a submission result"),
    };
    if args.mode == Mode::Exam {
        result.mode = Some(Mode::Exam);
    }

    let view = FeedbackPresenter::new(args.mode).present(&result, essay, args.show_score_in_exam);
    Ok(view.to_html())
}

async fn submit(args: &Args, url: &str, essay: &str) -> Result<String> {
    let transport = HttpTransport::new(url, args.timeout)?;
    let config = WidgetConfig {
        mode: args.mode,
        show_score_in_exam: args.show_score_in_exam,
        ..WidgetConfig::default()
    };
    let notify = |region: Region| tracing::debug!(?region, "Feedback region updated");
    let mut controller = SubmissionController::new(config, transport, notify)
        .map_err(|err| anyhow!("invalid widget config: {err}"))?;

    let limits = TextLimits::from(controller.config());
    for advisory in controller.on_text_changed(essay).advisories(limits) {
        eprintln!("note: {advisory}");
    }

    match controller.submit(essay).await {
        Ok(report) => Ok(report.view.to_html()),
        Err(err) => {
            let view = controller.last_error().map(|view| view.to_html()).unwrap_or_default();
            eprintln!("submission failed: {err}");
            println!("{view}");
            std::process::exit(2);
        }
    }
}

fn parse_args() -> Result<Args> {
    let mut essay_path = None;
    let mut source = None;
    let mut mode = Mode::Practice;
    let mut show_score_in_exam = true;
    let mut timeout = Duration::from_secs(200);

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--essay" => {
                essay_path = Some(args.next().ok_or_else(|| anyhow!("--essay missing value"))?);
            }
            "--result" => {
                let path = args.next().ok_or_else(|| anyhow!("--result missing value"))?;
                source = Some(Source::Result(path));
            }
            "--submit" => {
                let url = args.next().ok_or_else(|| anyhow!("--submit missing value"))?;
                source = Some(Source::Submit(url));
            }
            "--timeout" => {
                let raw = args.next().ok_or_else(|| anyhow!("--timeout missing value"))?;
                let seconds: u64 =
                    raw.parse().map_err(|_| anyhow!("--timeout expects seconds, got {raw}"))?;
                timeout = Duration::from_secs(seconds);
            }
            "--exam" => mode = Mode::Exam,
            "--hide-score" => show_score_in_exam = false,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ => return Err(anyhow!("Unknown argument: {arg}\n{USAGE}")),
        }
    }

    Ok(Args {
        essay_path: essay_path.ok_or_else(|| anyhow!("--essay is required\n{USAGE}"))?,
        source: source.ok_or_else(|| anyhow!("--result or --submit is required\n{USAGE}"))?,
        mode,
        show_score_in_exam,
        timeout,
    })
}
