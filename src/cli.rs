//! CLI: xsd → schema, schema + xml → JSON lines
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::datum::{DefaultZone, Transcoder, TranscoderConfig};
use crate::ir::SchemaGraph;
use crate::lower::{build, BuildOptions};
use crate::stream::{EmitDepth, Emitted, StreamingTranscoder};
use crate::xml::{read_document, EventReader, DEFAULT_MAX_DEPTH};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// derive a record schema from an XSD and transcode XML documents against it
#[derive(Parser, Debug)]
#[command(name = "xsd-osi", version)]
pub struct CommandLineInterface {
    /// debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// trace logging (implies --verbose)
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// derive the schema and write it as Avro-style JSON
    Schema(SchemaOut),
    /// transcode XML documents into JSON lines
    Transcode(TranscodeOut),
}

#[derive(Args, Debug)]
struct SchemaOut {
    /// entry .xsd file
    #[arg(long)]
    xsd: PathBuf,

    /// directory that includes and imports resolve against (defaults to the xsd's directory)
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// root element to derive from, by local name or `name{namespace}`
    #[arg(long)]
    root: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TranscodeOut {
    /// schema .json file written by the `schema` command
    #[arg(long)]
    schema: PathBuf,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// output file for all values (stdout if omitted)
    #[arg(short, long, conflicts_with = "out_dir")]
    out: Option<PathBuf>,

    /// write one `<input stem>.json` per input into this directory, in parallel
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// read inputs as an event stream instead of building the whole tree
    #[arg(long)]
    stream: bool,

    /// emit one value per child of the document element
    #[arg(long)]
    split: bool,

    /// zone for date-times without an offset: UTC, ±HH:MM or an IANA name
    #[arg(long, default_value = "UTC")]
    timezone: DefaultZone,

    /// deepest element nesting accepted before an input is rejected
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

/// Per-input transcoding settings shared by every worker.
struct Job<'g> {
    graph: &'g SchemaGraph,
    config: TranscoderConfig,
    depth: EmitDepth,
    stream: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Default `tracing` filter directive for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.trace {
            "trace"
        } else if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Schema(target) => target.run(),
            Command::Transcode(target) => target.run(),
        }
    }
}

impl SchemaOut {
    fn run(&self) -> anyhow::Result<()> {
        let model = crate::xsd::load(&self.xsd, self.base_dir.as_deref())
            .with_context(|| format!("failed to load {}", self.xsd.display()))?;
        let options = BuildOptions { root: self.root.clone() };
        let graph = build(&model, &options).with_context(|| format!("failed to derive a schema from {}", self.xsd.display()))?;
        info!(nodes = graph.len(), "schema derived");
        let schema_src = crate::avsc::to_string_pretty(&graph)?;
        let mut sink = open_sink(self.out.as_deref())?;
        writeln!(sink, "{schema_src}")?;
        sink.flush()?;
        Ok(())
    }
}

impl TranscodeOut {
    fn run(&self) -> anyhow::Result<()> {
        let graph = crate::avsc::read_file(&self.schema)
            .with_context(|| format!("failed to read schema {}", self.schema.display()))?;
        let job = Job {
            graph: &graph,
            config: TranscoderConfig { default_zone: self.timezone, max_depth: self.max_depth },
            depth: if self.split { EmitDepth::Children } else { EmitDepth::Root },
            stream: self.stream,
        };

        if self.input.iter().any(|i| i == "-") {
            anyhow::ensure!(self.input.len() == 1, "stdin ('-') cannot be combined with other inputs");
            anyhow::ensure!(self.out_dir.is_none(), "--out-dir needs file inputs");
            let mut sink = open_sink(self.out.as_deref())?;
            let count = job.stream_from(io::stdin().lock(), &mut sink).context("failed to transcode stdin")?;
            debug!(values = count, "stdin done");
            sink.flush()?;
            return Ok(());
        }

        let source_paths = resolve_file_path_patterns(&self.input)?;
        match self.out_dir.as_ref() {
            Some(dir) => {
                std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
                source_paths.par_iter().try_for_each(|source_path| {
                    let stem = source_path.file_stem().unwrap_or(source_path.as_os_str());
                    let out = dir.join(stem).with_extension("json");
                    let mut sink = open_sink(Some(&out))?;
                    job.transcode_file(source_path, &mut sink)?;
                    sink.flush()?;
                    Ok::<_, anyhow::Error>(())
                })?;
            }
            None => {
                let mut sink = open_sink(self.out.as_deref())?;
                for source_path in &source_paths {
                    job.transcode_file(source_path, &mut sink)?;
                }
                sink.flush()?;
            }
        }
        Ok(())
    }
}

impl Job<'_> {
    fn transcode_file(&self, source_path: &Path, sink: &mut dyn Write) -> anyhow::Result<usize> {
        let context = || format!("failed to transcode {}", source_path.display());
        let count = if self.stream {
            let file = File::open(source_path).with_context(context)?;
            self.stream_from(BufReader::new(file), sink).with_context(context)?
        } else {
            let root = read_document(source_path, self.config.max_depth).with_context(context)?;
            let values = self.in_memory(&root).with_context(context)?;
            for emitted in &values {
                write_json_line(sink, self.graph, emitted)?;
            }
            values.len()
        };
        info!(file = %source_path.display(), values = count, "transcoded");
        Ok(count)
    }

    fn in_memory(&self, root: &crate::xml::XmlElement) -> crate::Result<Vec<Emitted>> {
        match self.depth {
            EmitDepth::Root => {
                let transcoder = Transcoder::new(self.graph, self.config.clone());
                let value = transcoder.transcode_document(root)?;
                let node = self
                    .graph
                    .root()
                    .ok_or_else(|| crate::Error::SchemaConstruction("schema graph has no root".to_string()))?;
                Ok(vec![Emitted { node, value }])
            }
            EmitDepth::Children => {
                let mut stream = StreamingTranscoder::new(self.graph, self.config.clone(), self.depth);
                let mut values = Vec::new();
                stream.replay(root, &mut values)?;
                stream.finish()?;
                Ok(values)
            }
        }
    }

    fn stream_from(&self, input: impl io::BufRead, sink: &mut dyn Write) -> anyhow::Result<usize> {
        let stream = StreamingTranscoder::new(self.graph, self.config.clone(), self.depth);
        let mut count = 0;
        for emitted in stream.run(EventReader::new(input)) {
            write_json_line(sink, self.graph, &emitted?)?;
            count += 1;
        }
        Ok(count)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_json_line(sink: &mut dyn Write, graph: &SchemaGraph, emitted: &Emitted) -> anyhow::Result<()> {
    let json = emitted.value.to_json(graph, emitted.node);
    serde_json::to_writer(&mut *sink, &json)?;
    sink.write_all(b"\n")?;
    Ok(())
}

fn open_sink(out: Option<&Path>) -> anyhow::Result<Box<dyn Write + Send>> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let before = out.len();
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
            }
            anyhow::ensure!(out.len() > before, "glob pattern matched no files: {pattern}");
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}
