//! daisy-nav - Walk a DAISY talking book phrase by phrase

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use daisy_nav::util::parse_clock_secs;
use daisy_nav::{BookSource, DirSource, Engine, Entry, MediaGroup, SearchHit, ZipSource};

#[derive(Parser)]
#[command(name = "daisy-nav")]
#[command(version, about = "Walk a DAISY talking book phrase by phrase", long_about = None)]
#[command(after_help = "EXAMPLES:
    daisy-nav book/                       First ten phrases
    daisy-nav book.zip --steps 0          Whole book
    daisy-nav book/ --skip pagenum        Skip page numbers
    daisy-nav book/ --seek 1:02:30        Phrases from 1h02m30s on
    daisy-nav book/ --goto ch2.smil#p12   Phrases from an element on
    RUST_LOG=daisy_nav=debug daisy-nav book/   With navigation logs")]
struct Cli {
    /// Book directory, ncc.html, package (.opf) file, or zip archive
    #[arg(value_name = "BOOK")]
    book: String,

    /// Number of phrases to print (0 for all)
    #[arg(short = 'n', long, default_value_t = 10)]
    steps: usize,

    /// Start at an elapsed time (seconds or H:MM:SS)
    #[arg(long, value_name = "TIME", conflicts_with = "goto")]
    seek: Option<String>,

    /// Start at DOCUMENT#ELEMENT
    #[arg(long, value_name = "DOC#ID")]
    goto: Option<String>,

    /// Turn off a skip option (repeatable)
    #[arg(long, value_name = "ID")]
    skip: Vec<String>,

    /// Walk backwards from the end
    #[arg(short, long)]
    back: bool,

    /// Print phrases as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Phrase<'a> {
    document: &'a str,
    element: &'a str,
    #[serde(flatten)]
    group: &'a MediaGroup,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn open_source(path: &str) -> Result<Box<dyn BookSource>, String> {
    let is_zip = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    let source: Box<dyn BookSource> = if is_zip {
        Box::new(ZipSource::open(path).map_err(|e| e.to_string())?)
    } else {
        Box::new(DirSource::open(path).map_err(|e| e.to_string())?)
    };
    Ok(source)
}

fn run(cli: &Cli) -> Result<(), String> {
    let mut engine = Engine::new(open_source(&cli.book)?);

    let entry = if cli.back { Entry::End } else { Entry::Start };
    let opened = engine.open(entry).map_err(|e| e.to_string())?;

    for id in &cli.skip {
        if !engine.change_skip_option(id, false) {
            eprintln!("warning: unknown skip option {id}");
        }
    }

    let mut phrase = if let Some(time) = &cli.seek {
        let secs = parse_clock_secs(time).ok_or_else(|| format!("invalid time: {time}"))?;
        let secs = i64::try_from(secs).map_err(|_| format!("time out of range: {time}"))?;
        let outcome = engine.seek(secs).map_err(|e| e.to_string())?;
        report_hit(&outcome.hit, cli.json);
        Ok(outcome.group)
    } else if let Some(target) = &cli.goto {
        let (document, element) = target.split_once('#').unwrap_or((target.as_str(), ""));
        engine.load_position(document, element)
    } else if cli.skip.is_empty() {
        Ok(opened)
    } else if cli.back {
        // the opening phrase may belong to a structure that is now skipped
        engine.last()
    } else {
        engine.first()
    };

    let mut printed = 0;
    loop {
        let group = match phrase {
            Ok(group) => group,
            Err(e) if e.is_boundary() => return Ok(()),
            Err(e) => return Err(e.to_string()),
        };
        print_phrase(&engine, &group, cli.json)?;
        printed += 1;
        if cli.steps != 0 && printed >= cli.steps {
            return Ok(());
        }
        phrase = if cli.back {
            engine.previous()
        } else {
            engine.next()
        };
    }
}

fn report_hit(hit: &SearchHit, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(hit) {
            eprintln!("{line}");
        }
        return;
    }
    eprint!("seek: {} (+{}s)", hit.document, hit.document_offset_secs);
    if let Some(fragment) = &hit.fragment {
        eprint!(
            ", clip {} at {}ms in {}",
            fragment.audio_id, fragment.file_offset_ms, fragment.audio_src
        );
    }
    eprintln!();
}

fn print_phrase<S: BookSource>(
    engine: &Engine<S>,
    group: &MediaGroup,
    json: bool,
) -> Result<(), String> {
    let document = engine.current_document_path().unwrap_or_default();
    let element = engine.current_element_id().unwrap_or_default();

    if json {
        let phrase = Phrase {
            document,
            element,
            group,
        };
        let line = serde_json::to_string(&phrase).map_err(|e| e.to_string())?;
        println!("{line}");
        return Ok(());
    }

    let text = group.text.as_ref().map(|t| t.src.as_str()).unwrap_or("-");
    let audio = match group.audio.as_slice() {
        [] => "-".to_string(),
        [clip] => format!("{} {}-{}", clip.src, clip.clip_begin, clip.clip_end),
        [first, .., last] => format!(
            "{} {}-{} ({} clips)",
            first.src,
            first.clip_begin,
            last.clip_end,
            group.audio.len()
        ),
    };
    let escape = if group.could_escape { " [esc]" } else { "" };
    println!("{document}#{element}\t{text}\t{audio}{escape}");
    Ok(())
}
