//! Book source tests.
//!
//! DAISY 2.02 and DAISY 3 layouts read from a directory and from a zip
//! archive, driven through the engine.

use std::fs;
use std::io::{Cursor, Write};

use daisy_nav::{BookSource, DirSource, Engine, Entry, Error, ZipSource};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn smil(prefix: &str, start: &str, phrases: usize) -> String {
    let mut body = String::new();
    for i in 1..=phrases {
        body.push_str(&format!(
            r#"<par endsync="last" id="{prefix}{i}"><text src="book.html#{prefix}_t{i}" id="{prefix}_t{i}" /><audio src="{prefix}.mp3" clip-begin="npt={b}.000s" clip-end="npt={e}.000s" id="{prefix}_a{i}" /></par>"#,
            b = (i - 1) * 5,
            e = i * 5,
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<smil>
<head>
<meta name="ncc:totalElapsedTime" content="{start}" />
<meta name="ncc:timeInThisSmil" content="0:00:{dur:02}" />
</head>
<body><seq>{body}</seq></body>
</smil>"#,
        dur = phrases * 5,
    )
}

const NCC: &str = r#"<?xml version="1.0" encoding="windows-1252"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Sample</title></head>
<body>
<h1 class="title" id="h1"><a href="one.smil#x1">Title</a></h1>
<span class="page-normal" id="pg1"><a href="one.smil#x2">1</a></span>
<h2 id="h2"><a href="chapter%20two.smil#y1">Chapter</a></h2>
</body>
</html>"#;

const OPF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://openebook.org/namespaces/oeb-package/1.0/">
  <manifest>
    <item href="one.smil" id="s1" media-type="application/smil"/>
    <item href="chapter two.smil" id="s2" media-type="application/smil"/>
    <item href="book.xml" id="x" media-type="application/x-dtbook+xml"/>
  </manifest>
  <spine>
    <itemref idref="s1"/>
    <itemref idref="x"/>
    <itemref idref="s2"/>
  </spine>
</package>"#;

fn write_book(dir: &TempDir, entry: (&str, &str)) {
    fs::write(dir.path().join(entry.0), entry.1).unwrap();
    fs::write(dir.path().join("one.smil"), smil("x", "0:00:00", 2)).unwrap();
    fs::write(dir.path().join("chapter two.smil"), smil("y", "0:00:10", 1)).unwrap();
}

fn walk<S: BookSource>(engine: &mut Engine<S>) -> Vec<String> {
    let mut ids = Vec::new();
    let mut phrase = engine.open(Entry::Start);
    while let Ok(group) = phrase {
        ids.push(group.id);
        phrase = engine.next();
    }
    ids
}

// ============================================================================
// Directory
// ============================================================================

#[test]
fn test_dir_source_ncc() {
    let dir = TempDir::new().unwrap();
    write_book(&dir, ("ncc.html", NCC));

    let mut source = DirSource::open(dir.path()).unwrap();
    assert_eq!(source.spine().unwrap(), vec!["one.smil", "chapter%20two.smil"]);

    let mut engine = Engine::new(source);
    assert_eq!(walk(&mut engine), ["x1", "x2", "y1"]);
    assert_eq!(engine.current_document_path(), Some("chapter%20two.smil"));
}

#[test]
fn test_dir_source_entry_file() {
    let dir = TempDir::new().unwrap();
    write_book(&dir, ("ncc.html", NCC));

    let source = DirSource::open(dir.path().join("ncc.html")).unwrap();
    assert_eq!(source.root(), dir.path());
    let mut engine = Engine::new(source);
    assert_eq!(walk(&mut engine), ["x1", "x2", "y1"]);
}

#[test]
fn test_dir_source_package() {
    let dir = TempDir::new().unwrap();
    write_book(&dir, ("book.opf", OPF));

    let mut source = DirSource::open(dir.path()).unwrap();
    assert_eq!(source.spine().unwrap(), vec!["one.smil", "chapter two.smil"]);

    let mut engine = Engine::new(source);
    assert_eq!(walk(&mut engine), ["x1", "x2", "y1"]);
}

#[test]
fn test_dir_source_seek() {
    let dir = TempDir::new().unwrap();
    write_book(&dir, ("ncc.html", NCC));

    let mut engine = Engine::new(DirSource::open(dir.path()).unwrap());
    engine.open(Entry::Start).unwrap();
    let outcome = engine.seek(7).unwrap();
    assert_eq!(outcome.group.id, "x2");
    assert_eq!(
        outcome.hit.fragment.map(|f| f.file_offset_ms),
        Some(7_000)
    );
    assert_eq!(engine.seek(12).unwrap().group.id, "y1");
}

#[test]
fn test_dir_source_without_entry() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("one.smil"), smil("x", "0:00:00", 1)).unwrap();
    assert!(matches!(
        DirSource::open(dir.path()),
        Err(Error::MissingElement(_))
    ));
}

#[test]
fn test_dir_source_missing_document() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("ncc.html"), NCC).unwrap();
    fs::write(dir.path().join("one.smil"), smil("x", "0:00:00", 2)).unwrap();

    let mut source = DirSource::open(dir.path()).unwrap();
    assert!(matches!(
        source.load("chapter%20two.smil"),
        Err(Error::DocumentNotFound(_))
    ));

    // The book stops short at the missing document.
    let mut engine = Engine::new(source);
    engine.open(Entry::Start).unwrap();
    engine.next().unwrap();
    assert!(engine.next().is_err());
    assert_eq!(engine.current_element_id(), Some("x2"));
}

#[test]
fn test_cp1252_ncc() {
    let dir = TempDir::new().unwrap();
    let mut ncc = NCC.replace("<title>Sample</title>", "<title>Caf</title>").into_bytes();
    let at = ncc.windows(4).position(|w| w == b"Caf<").unwrap() + 3;
    ncc.insert(at, 0xE9);
    fs::write(dir.path().join("ncc.html"), ncc).unwrap();

    let mut source = DirSource::open(dir.path()).unwrap();
    assert_eq!(source.spine().unwrap().len(), 2);
}

// ============================================================================
// Zip
// ============================================================================

fn zip_book(entries: &[(&str, String)]) -> Cursor<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    let mut cursor = writer.finish().unwrap();
    cursor.set_position(0);
    cursor
}

#[test]
fn test_zip_source_nested_ncc() {
    let archive = zip_book(&[
        ("book/ncc.html", NCC.to_string()),
        ("book/one.smil", smil("x", "0:00:00", 2)),
        ("book/chapter two.smil", smil("y", "0:00:10", 1)),
    ]);

    let mut source = ZipSource::from_reader(archive).unwrap();
    assert_eq!(
        source.spine().unwrap(),
        vec!["book/one.smil", "book/chapter%20two.smil"]
    );

    let mut engine = Engine::new(source);
    assert_eq!(walk(&mut engine), ["x1", "x2", "y1"]);
    assert_eq!(engine.load_position("book/one.smil", "x2").unwrap().id, "x2");
}

#[test]
fn test_zip_source_case_mismatch() {
    let archive = zip_book(&[
        ("NCC.HTML", NCC.to_string()),
        ("ONE.SMIL", smil("x", "0:00:00", 2)),
        ("Chapter Two.smil", smil("y", "0:00:10", 1)),
    ]);

    let mut engine = Engine::new(ZipSource::from_reader(archive).unwrap());
    assert_eq!(walk(&mut engine), ["x1", "x2", "y1"]);
}

#[test]
fn test_zip_source_without_entry() {
    let archive = zip_book(&[("one.smil", smil("x", "0:00:00", 1))]);
    assert!(matches!(
        ZipSource::from_reader(archive),
        Err(Error::MissingElement(_))
    ));
}

#[test]
fn test_zip_source_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.zip");
    let archive = zip_book(&[
        ("ncc.html", NCC.to_string()),
        ("one.smil", smil("x", "0:00:00", 2)),
        ("chapter two.smil", smil("y", "0:00:10", 1)),
    ]);
    fs::write(&path, archive.into_inner()).unwrap();

    let mut engine = Engine::new(ZipSource::open(&path).unwrap());
    assert_eq!(walk(&mut engine), ["x1", "x2", "y1"]);
}
