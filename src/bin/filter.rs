use std::collections::VecDeque;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

use consent_gate::domain::{CmpBackend, VendorRef};
use consent_gate::markup::{GatedContentMarkup, DEFAULT_ATTRIBUTE_PREFIX};
use consent_gate::telemetry::{init_tracing, TelemetryConfig};
use consent_gate::transform::{EmbedAction, EmbedPolicy, EmbedRewriteTransform, EmbedRule};
use consent_gate::VendorPurposeRegistry;

fn print_help() {
    eprintln!(
        "\
consent-gate-filter

Rewrites the iframes of an HTML fragment into consent-gated markup.

USAGE:
  consent-gate-filter [options]

OPTIONS:
  --backend <liveramp|sourcepoint>  (defaults to env CMP_BACKEND, then liveramp)
  --input <path>                    (optional) Input file (default: stdin)
  --output <path>                   (optional) Output file (default: stdout)
  --allow <pattern>                 (repeatable) Keep iframes whose src matches
  --gate <pattern>=<vendor>         (repeatable) Gate matching iframes under a
                                    catalogued vendor name
  --attribute-prefix <prefix>       (default: data-cmp)

Rules given on the command line are checked before the built-in ones.
Iframes matching no rule are removed.

ENV:
  LOG_LEVEL / RUST_LOG, LOG_JSON
"
    );
}

struct Options {
    backend: CmpBackend,
    input: Option<String>,
    output: Option<String>,
    rules: Vec<EmbedRule>,
    attribute_prefix: String,
}

fn parse_args(mut args: VecDeque<String>) -> anyhow::Result<Option<Options>> {
    let mut backend: Option<CmpBackend> = None;
    let mut input = None;
    let mut output = None;
    let mut rules = Vec::new();
    let mut attribute_prefix = DEFAULT_ATTRIBUTE_PREFIX.to_string();

    while let Some(arg) = args.pop_front() {
        match arg.as_str() {
            "--backend" => {
                let raw = args
                    .pop_front()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --backend"))?;
                backend = Some(raw.parse()?);
            }
            "--input" => {
                input = Some(
                    args.pop_front()
                        .ok_or_else(|| anyhow::anyhow!("missing value for --input"))?,
                );
            }
            "--output" => {
                output = Some(
                    args.pop_front()
                        .ok_or_else(|| anyhow::anyhow!("missing value for --output"))?,
                );
            }
            "--allow" => {
                let pattern = args
                    .pop_front()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --allow"))?;
                rules.push(EmbedRule::allow(&pattern)?);
            }
            "--gate" => {
                let raw = args
                    .pop_front()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --gate"))?;
                let (pattern, vendor) = raw
                    .rsplit_once('=')
                    .ok_or_else(|| anyhow::anyhow!("--gate expects <pattern>=<vendor>"))?;
                rules.push(EmbedRule::gate(pattern, VendorRef::name(vendor))?);
            }
            "--attribute-prefix" => {
                attribute_prefix = args
                    .pop_front()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --attribute-prefix"))?;
            }
            "-h" | "--help" => return Ok(None),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }

    let backend = match backend {
        Some(backend) => backend,
        None => match std::env::var("CMP_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => CmpBackend::LiveRamp,
        },
    };

    Ok(Some(Options {
        backend,
        input,
        output,
        rules,
        attribute_prefix,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(options) = parse_args(args)? else {
        print_help();
        return Ok(());
    };

    init_tracing(&TelemetryConfig::from_env())?;

    let registry = Arc::new(VendorPurposeRegistry::for_backend(options.backend));
    let mut policy = EmbedPolicy::default_for(&registry)?;
    for rule in options.rules.into_iter().rev() {
        if let EmbedAction::Gate(vendor) = rule.action() {
            registry.require(vendor)?;
        }
        policy.prepend(rule);
    }

    let transform = EmbedRewriteTransform::new(
        policy,
        registry,
        GatedContentMarkup::new(&options.attribute_prefix),
    );

    let html = match &options.input {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let out = transform.rewrite(&html);
    info!(
        backend = %options.backend,
        gated = out.gated,
        allowed = out.allowed,
        removed = out.removed,
        "Filter finished"
    );

    match &options.output {
        Some(path) => tokio::fs::write(path, out.html.as_bytes()).await?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(out.html.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}
