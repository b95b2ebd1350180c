//! Term dictionaries persisted through both directory backends.

use std::ops::Bound;
use std::sync::Arc;

use pilum::error::{PilumError, Result};
use pilum::lexical::term_dict::{TermDictionary, TermDictionaryWriter, TermInfo};
use pilum::storage::data_io::{DataInput, DataOutput};
use pilum::storage::file::FileDirectoryConfig;
use pilum::storage::tracking::TrackingDirectory;
use pilum::storage::{Directory, DirectoryFactory, StorageConfig};
use tempfile::TempDir;

fn vocabulary() -> Vec<(String, TermInfo)> {
    let mut offset = 0;
    let mut terms: Vec<String> = ["search", "seek", "segment", "skip", "term", "terms", "text"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for i in 0..200 {
        terms.push(format!("word{i:04}"));
    }
    terms.sort();

    terms
        .into_iter()
        .enumerate()
        .map(|(i, term)| {
            let info = TermInfo {
                postings_offset: offset,
                skip_offset: offset + 16,
                doc_freq: (i % 7) as u32 + 1,
                total_term_freq: (i % 13) as u64 + 1,
            };
            offset += 64 + i as u64;
            (term, info)
        })
        .collect()
}

fn write_dictionary(dir: &dyn Directory, name: &str) -> Result<Vec<(String, TermInfo)>> {
    let vocabulary = vocabulary();
    let mut writer = TermDictionaryWriter::new();
    for (term, info) in &vocabulary {
        writer.add(term.as_bytes(), info)?;
    }
    assert_eq!(writer.len(), vocabulary.len());
    writer.finish(dir, name)?;
    Ok(vocabulary)
}

#[test]
fn test_reopen_from_disk() -> Result<()> {
    let tmp = TempDir::new().unwrap();
    let config = StorageConfig::File(FileDirectoryConfig::new(tmp.path()));

    let vocabulary = {
        let dir = DirectoryFactory::create(config.clone())?;
        write_dictionary(dir.as_ref(), "_0.tdict")?
    };

    let dir = DirectoryFactory::create(config)?;
    let dict = TermDictionary::open(dir.as_ref(), "_0.tdict")?;
    assert_eq!(dict.len(), vocabulary.len());
    for (term, info) in &vocabulary {
        assert_eq!(dict.get(term.as_bytes())?, Some(*info), "term {term}");
    }
    assert_eq!(dict.get(b"sea")?, None);
    assert_eq!(dict.get(b"words")?, None);

    let all: Vec<String> = dict
        .terms()
        .map(|entry| entry.map(|(term, _)| String::from_utf8(term).unwrap()))
        .collect::<Result<_>>()?;
    let expected: Vec<String> = vocabulary.iter().map(|(term, _)| term.clone()).collect();
    assert_eq!(all, expected);
    Ok(())
}

#[test]
fn test_prefix_and_range() -> Result<()> {
    let dir = DirectoryFactory::create(StorageConfig::default())?;
    write_dictionary(dir.as_ref(), "terms")?;
    let dict = TermDictionary::open(dir.as_ref(), "terms")?;

    let se: Vec<Vec<u8>> = dict
        .prefix(b"se")
        .map(|entry| entry.map(|(term, _)| term))
        .collect::<Result<_>>()?;
    assert_eq!(se, vec![b"search".to_vec(), b"seek".to_vec(), b"segment".to_vec()]);

    let words = dict.prefix(b"word01").count();
    assert_eq!(words, 100);

    let lower: &[u8] = b"term";
    let upper: &[u8] = b"word0002";
    let range: Vec<Vec<u8>> = dict
        .range(Bound::Excluded(lower), Bound::Excluded(upper))
        .map(|entry| entry.map(|(term, _)| term))
        .collect::<Result<_>>()?;
    assert_eq!(
        range,
        vec![
            b"terms".to_vec(),
            b"text".to_vec(),
            b"word0000".to_vec(),
            b"word0001".to_vec()
        ]
    );
    Ok(())
}

#[test]
fn test_corrupted_file_is_detected() -> Result<()> {
    let dir = DirectoryFactory::create(StorageConfig::default())?;
    write_dictionary(dir.as_ref(), "terms")?;

    let mut input = dir.open_input("terms")?;
    let mut bytes = vec![0u8; input.length() as usize];
    input.read_exact_bytes(&mut bytes)?;

    for position in [0, bytes.len() / 2, bytes.len() - 9] {
        let mut damaged = bytes.clone();
        damaged[position] ^= 0x01;
        let mut out = dir.create_output("damaged")?;
        out.write_bytes(&damaged)?;
        out.close()?;

        let err = TermDictionary::open(dir.as_ref(), "damaged").unwrap_err();
        assert!(
            matches!(err, PilumError::Corruption(_)),
            "position {position}: {err}"
        );
    }

    let mut out = dir.create_output("short")?;
    out.write_bytes(&bytes[..6])?;
    out.close()?;
    assert!(matches!(
        TermDictionary::open(dir.as_ref(), "short"),
        Err(PilumError::Corruption(_))
    ));
    Ok(())
}

#[test]
fn test_tracking_records_dictionary_file() -> Result<()> {
    let inner = DirectoryFactory::create(StorageConfig::default())?;
    let tracking = TrackingDirectory::new(Arc::clone(&inner));
    write_dictionary(&tracking, "_1.tdict")?;
    assert_eq!(tracking.files(), vec!["_1.tdict"]);
    assert!(TermDictionary::open(inner.as_ref(), "_1.tdict").is_ok());
    Ok(())
}
