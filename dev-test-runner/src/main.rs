//! Runs every case under `fixtures/`: derive the schema from `schema.xsd`,
//! push it through the JSON schema codec, transcode `input.xml` and compare
//! the JSON lines with `expected.jsonl`.
//!
//! Usage: `dev-test-runner [FILTER_REGEX] [--fixtures DIR]`
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use regex::Regex;
use serde::Deserialize;

use xsd_osi::stream::{EmitDepth, StreamingTranscoder};
use xsd_osi::xml::{parse_document, EventReader};
use xsd_osi::{avsc, build, BuildOptions, DefaultZone, Transcoder, TranscoderConfig};

/// Optional `case.json` next to the fixture files.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CaseManifest {
    root: Option<String>,
    split: bool,
    stream: bool,
    timezone: Option<String>,
    /// Error kind the case must fail with, e.g. `FieldResolutionError`.
    expect_error: Option<String>,
}

enum Outcome {
    Pass,
    Fail(String),
}

fn main() -> anyhow::Result<()> {
    let mut filter = None;
    let mut fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("fixtures");
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fixtures" => fixtures = PathBuf::from(args.next().context("--fixtures needs a directory")?),
            pattern => filter = Some(Regex::new(pattern).with_context(|| format!("bad filter regex `{pattern}`"))?),
        }
    }

    let mut cases: Vec<PathBuf> = std::fs::read_dir(&fixtures)
        .with_context(|| format!("cannot list {}", fixtures.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.join("schema.xsd").is_file())
        .filter(|path| match &filter {
            Some(re) => re.is_match(&path.file_name().unwrap_or_default().to_string_lossy()),
            None => true,
        })
        .collect();
    cases.sort();

    let mut failed = 0;
    for case in &cases {
        let name = case.file_name().unwrap_or_default().to_string_lossy().into_owned();
        let outcome = run_case(case).unwrap_or_else(|e| Outcome::Fail(format!("{e:#}")));
        match outcome {
            Outcome::Pass => eprintln!("{} {name}", "✅ pass".green()),
            Outcome::Fail(reason) => {
                failed += 1;
                eprintln!("{} {name}\n    {reason}", "❌ fail".red());
            }
        }
    }

    eprintln!("—— {} cases, {} failed ——", cases.len(), failed);
    if failed > 0 {
        bail!("{failed} fixture case(s) failed");
    }
    Ok(())
}

fn run_case(dir: &Path) -> anyhow::Result<Outcome> {
    let manifest: CaseManifest = match std::fs::read(dir.join("case.json")) {
        Ok(bytes) => {
            let de = &mut serde_json::Deserializer::from_slice(&bytes);
            serde_path_to_error::deserialize(de).map_err(|e| anyhow::anyhow!("case.json at {}: {}", e.path(), e.inner()))?
        }
        Err(_) => CaseManifest::default(),
    };

    let result = transcode_case(dir, &manifest);
    match (&manifest.expect_error, result) {
        (Some(kind), Err(error)) => {
            let got = error.chain().find_map(|c| c.downcast_ref::<xsd_osi::Error>()).map(xsd_osi::Error::kind);
            if got == Some(kind.as_str()) {
                Ok(Outcome::Pass)
            } else {
                Ok(Outcome::Fail(format!("expected {kind}, got {error:#}")))
            }
        }
        (Some(kind), Ok(_)) => Ok(Outcome::Fail(format!("expected {kind}, but transcoding succeeded"))),
        (None, Err(error)) => Err(error),
        (None, Ok(lines)) => {
            let expected = read_expected(&dir.join("expected.jsonl"))?;
            if lines == expected {
                Ok(Outcome::Pass)
            } else {
                Ok(Outcome::Fail(format!(
                    "expected:\n{}\n    got:\n{}",
                    render(&expected),
                    render(&lines)
                )))
            }
        }
    }
}

fn transcode_case(dir: &Path, manifest: &CaseManifest) -> anyhow::Result<Vec<serde_json::Value>> {
    let model = xsd_osi::xsd::load(&dir.join("schema.xsd"), Some(dir))?;
    let derived = build(&model, &BuildOptions { root: manifest.root.clone() })?;
    // the transcoder always works from the schema as written to disk
    let graph = avsc::from_str(&avsc::to_string_pretty(&derived)?)?;

    let default_zone = match &manifest.timezone {
        Some(zone) => zone.parse::<DefaultZone>()?,
        None => DefaultZone::Utc,
    };
    let config = TranscoderConfig { default_zone, ..TranscoderConfig::default() };
    let input = std::fs::read_to_string(dir.join("input.xml")).context("reading input.xml")?;

    if !manifest.stream && !manifest.split {
        let value = Transcoder::new(&graph, config).transcode_document(&parse_document(&input)?)?;
        let root = graph.root().context("schema has no root")?;
        return Ok(vec![value.to_json(&graph, root)]);
    }
    let depth = if manifest.split { EmitDepth::Children } else { EmitDepth::Root };
    let mut lines = Vec::new();
    for emitted in StreamingTranscoder::new(&graph, config, depth).run(EventReader::from_text(&input)) {
        let emitted = emitted?;
        lines.push(emitted.value.to_json(&graph, emitted.node));
    }
    Ok(lines)
}

fn read_expected(path: &Path) -> anyhow::Result<Vec<serde_json::Value>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).with_context(|| format!("bad line in {}: {line}", path.display())))
        .collect()
}

fn render(lines: &[serde_json::Value]) -> String {
    lines.iter().map(|v| format!("      {v}")).collect::<Vec<_>>().join("\n")
}
