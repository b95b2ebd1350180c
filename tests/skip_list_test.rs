//! Skip list write/seek round trips.

use std::cell::{Cell, RefCell};

use pilum::error::Result;
use pilum::lexical::skip_list::{SkipConfig, SkipReader, SkipWriter, WriterState};
use pilum::lexical::{DocId, doc_limits};
use pilum::storage::Directory;
use pilum::storage::data_io::{DataInput, DataOutput, IndexInput};
use pilum::storage::memory::MemoryDirectory;

const COUNT: u64 = 1932;

fn config() -> SkipConfig {
    SkipConfig {
        skip_0: 8,
        skip_n: 8,
        max_levels: 10,
    }
}

/// Checkpoint after `i` docs records the last doc id `i - 1` and a
/// postings pointer derived from it.
fn write_skip_list(dir: &dyn Directory, config: SkipConfig, count: u64) -> Result<()> {
    let mut writer = SkipWriter::new(config)?;
    writer.prepare(config.max_levels, count);
    for i in 1..=count {
        if writer.is_skip_point(i) {
            let doc = (i - 1) as u32;
            writer.skip(i, |_, out: &mut dyn DataOutput| {
                out.write_vint(doc)?;
                out.write_vlong(doc as u64 * 10)
            })?;
        }
    }

    let mut out = dir.create_output("postings.skip")?;
    // Something before the skip data, as a postings file would have.
    out.write_vint(0xCAFE)?;
    writer.flush(&mut *out)?;
    out.write_vint(0xBEEF)?;
    assert_eq!(writer.state(), WriterState::Flushed);
    out.close()
}

fn open_reader(
    dir: &dyn Directory,
    config: SkipConfig,
) -> Result<(SkipReader, Box<dyn IndexInput>)> {
    let mut input = dir.open_input("postings.skip")?;
    assert_eq!(input.read_vint()?, 0xCAFE);
    let mut reader = SkipReader::new(config)?;
    reader.prepare(&mut *input)?;
    Ok((reader, input))
}

fn read_record(input: &mut dyn IndexInput) -> Result<(DocId, u64)> {
    if input.eof() {
        return Ok((doc_limits::eof(), 0));
    }
    Ok((input.read_vint()?, input.read_vlong()?))
}

fn expected(target: u64) -> u64 {
    (target / 8 * 8).min(COUNT / 8 * 8)
}

#[test]
fn test_boundary_table() -> Result<()> {
    let dir = MemoryDirectory::default();
    write_skip_list(&dir, config(), COUNT)?;
    let (mut reader, mut input) = open_reader(&dir, config())?;
    assert_eq!(reader.num_levels(), 3);
    // The stream continues right after the skip data.
    assert_eq!(input.read_vint()?, 0xBEEF);

    let table = [
        (5, 0),
        (7, 0),
        (8, 8),
        (63, 56),
        (64, 64),
        (511, 504),
        (512, 512),
        (1000, 1000),
        (1927, 1920),
        (1928, 1928),
        (1931, 1928),
        (5000, 1928),
    ];
    for (target, skipped) in table {
        reader.reset()?;
        let seek = reader.seek(target, |_, input| Ok(read_record(input)?.0))?;
        assert_eq!(seek, skipped, "target {target}");
    }
    Ok(())
}

#[test]
fn test_seek_every_target_in_order() -> Result<()> {
    let dir = MemoryDirectory::default();
    write_skip_list(&dir, config(), COUNT)?;
    let (mut reader, _input) = open_reader(&dir, config())?;

    for target in 0..COUNT as u32 + 20 {
        let skipped = reader.seek(target, |_, input| Ok(read_record(input)?.0))?;
        assert_eq!(skipped, expected(target as u64), "target {target}");
    }
    Ok(())
}

#[test]
fn test_payload_of_last_checkpoint() -> Result<()> {
    let dir = MemoryDirectory::default();
    write_skip_list(&dir, config(), COUNT)?;
    let (mut reader, _input) = open_reader(&dir, config())?;

    for target in [9u32, 100, 513, 1500, 1930] {
        reader.reset()?;
        let last = RefCell::new(None);
        let skipped = reader.seek(target, |level, input| {
            let (doc, pointer) = read_record(input)?;
            if level == 0 && doc < target {
                *last.borrow_mut() = Some((doc, pointer));
            }
            Ok(doc)
        })?;

        let (doc, pointer) = last.into_inner().unwrap();
        assert_eq!(doc as u64, skipped - 1, "target {target}");
        assert_eq!(pointer, (skipped - 1) * 10);
    }
    Ok(())
}

#[test]
fn test_repeated_seek_reads_nothing() -> Result<()> {
    let dir = MemoryDirectory::default();
    write_skip_list(&dir, config(), COUNT)?;
    let (mut reader, _input) = open_reader(&dir, config())?;

    let calls = Cell::new(0usize);
    let mut read = |_: usize, input: &mut dyn IndexInput| {
        calls.set(calls.get() + 1);
        read_record(input).map(|(doc, _)| doc)
    };

    assert_eq!(reader.seek(700, &mut read)?, 696);
    let first = calls.replace(0);
    assert!(first > 0);
    assert_eq!(reader.seek(700, &mut read)?, 696);
    assert_eq!(calls.get(), 0);

    // A reset re-reads from the top level.
    reader.reset()?;
    assert_eq!(reader.seek(20, &mut read)?, 16);
    assert!(calls.get() > 0);
    Ok(())
}

#[test]
fn test_short_list_has_no_levels() -> Result<()> {
    let dir = MemoryDirectory::default();
    write_skip_list(&dir, config(), 7)?;
    let (mut reader, mut input) = open_reader(&dir, config())?;
    assert_eq!(reader.num_levels(), 0);
    assert_eq!(input.read_vint()?, 0xBEEF);
    assert_eq!(reader.seek(6, |_, _| panic!("no records"))?, 0);
    Ok(())
}

#[test]
fn test_level_cap() -> Result<()> {
    let capped = SkipConfig {
        max_levels: 2,
        ..config()
    };
    let dir = MemoryDirectory::default();
    write_skip_list(&dir, capped, COUNT)?;
    let (mut reader, _input) = open_reader(&dir, capped)?;
    assert_eq!(reader.num_levels(), 2);
    assert_eq!(reader.seek(1500, |_, input| Ok(read_record(input)?.0))?, 1496);
    Ok(())
}
