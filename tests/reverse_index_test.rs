use crocus::index::construction::{FullIndexWriter, PrioIndexWriter};
use crocus::index::files::{self, IndexGeneration, IndexKind};
use crocus::{
    CodedSequence, EntrySource, FilterStep, FullReverseIndexReader, IndexQuery,
    PrioReverseIndexReader, QueryArena, QueryBuffer, StatefulIndex, encode_document_id,
};

use rand::Rng;
use tempfile::TempDir;

fn drain(source: &mut EntrySource<'_>, chunk: usize) -> Vec<u64> {
    let mut buffer = QueryBuffer::new(chunk);
    let mut out = Vec::new();
    while source.has_more() {
        source.read(&mut buffer).unwrap();
        out.extend_from_slice(buffer.data());
    }
    out
}

fn build_full_index(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf, std::path::PathBuf) {
    let words = dir.path().join("words.dat");
    let docs = dir.path().join("docs.dat");
    let positions = dir.path().join("positions.dat");

    let mut writer = FullIndexWriter::new();
    writer.add(50, 100, &[1, 3, 5]);
    writer.add(50, 104, &[2, 8]);
    writer.add(50, 106, &[10]);
    writer.add(51, 104, &[4]);
    writer.add(52, 100, &[7]);
    writer.add(52, 106, &[9, 12]);
    writer.write(&words, &docs, &positions).unwrap();

    (words, docs, positions)
}

#[test]
fn test_full_index_document_streaming() {
    let dir = TempDir::new().unwrap();
    let (words, docs, positions) = build_full_index(&dir);

    let reader = FullReverseIndexReader::new("full", &words, &docs, &positions).unwrap();
    assert!(reader.is_ready());

    let mut source = reader.documents(50);
    assert_eq!(source.index_name(), "full");
    assert_eq!(drain(&mut source, 32), vec![100, 104, 106]);

    // A buffer smaller than the posting list forces chunked reads.
    let mut source = reader.documents(50);
    assert_eq!(drain(&mut source, 2), vec![100, 104, 106]);

    // Unknown terms stream nothing.
    let mut source = reader.documents(999);
    assert!(!source.has_more());
    assert_eq!(drain(&mut source, 8), Vec::<u64>::new());

    assert_eq!(reader.num_documents(50), 3);
    assert_eq!(reader.num_documents(51), 1);
    assert_eq!(reader.num_documents(999), 0);

    assert!(reader.word_offset(50) >= 0);
    assert_eq!(reader.word_offset(999), -1);
}

#[test]
fn test_full_index_skip() {
    let dir = TempDir::new().unwrap();
    let (words, docs, positions) = build_full_index(&dir);
    let reader = FullReverseIndexReader::new("full", &words, &docs, &positions).unwrap();

    let mut source = reader.documents(50);
    source.skip(2).unwrap();
    assert_eq!(drain(&mut source, 8), vec![106]);
}

#[test]
fn test_also_not_filters() {
    let dir = TempDir::new().unwrap();
    let (words, docs, positions) = build_full_index(&dir);
    let reader = FullReverseIndexReader::new("full", &words, &docs, &positions).unwrap();

    // Candidates from term 50, narrowed to those also matching 52.
    let mut query = IndexQuery::new(reader.documents(50)).with_filter(reader.also(52));
    let mut buffer = QueryBuffer::new(32);
    query.read_more(&mut buffer).unwrap();
    assert_eq!(buffer.data(), &[100, 106]);

    // Exclusion drops documents matching 51.
    let mut query = IndexQuery::new(reader.documents(50)).with_filter(reader.not(51));
    query.read_more(&mut buffer).unwrap();
    assert_eq!(buffer.data(), &[100, 106]);

    // An AND against an unknown term can never match.
    assert!(matches!(reader.also(999), FilterStep::NoPass));
    let mut query = IndexQuery::new(reader.documents(50)).with_filter(reader.also(999));
    query.read_more(&mut buffer).unwrap();
    assert!(buffer.is_empty());

    // A NOT against an unknown term passes everything.
    assert!(matches!(reader.not(999), FilterStep::LetThrough));

    // Single-candidate tests agree with the bulk filtering.
    assert!(reader.also(52).test(100));
    assert!(!reader.also(52).test(104));
    assert!(!reader.not(52).test(100));
    assert!(reader.not(52).test(104));
}

#[test]
fn test_position_data_retrieval() {
    let dir = TempDir::new().unwrap();
    let (words, docs, positions) = build_full_index(&dir);
    let reader = FullReverseIndexReader::new("full", &words, &docs, &positions).unwrap();

    let mut arena = QueryArena::new();
    let data = reader.get_term_data(&mut arena, 50, &[100, 104, 105, 106]);

    assert_eq!(data.len(), 4);
    assert_eq!(data[0].unwrap().positions().values(), vec![1, 3, 5]);
    assert_eq!(data[1].unwrap().positions().values(), vec![2, 8]);
    assert!(data[2].is_none(), "unknown document stays absent");
    assert_eq!(data[3].unwrap().positions().values(), vec![10]);

    // Unknown term: the batch completes with every slot absent.
    arena.reset();
    let data = reader.get_term_data(&mut arena, 999, &[100]);
    assert!(data[0].is_none());
}

#[test]
fn test_degraded_reader_returns_empty_results() {
    let dir = TempDir::new().unwrap();

    let reader = FullReverseIndexReader::new(
        "full",
        &dir.path().join("no-words.dat"),
        &dir.path().join("no-docs.dat"),
        &dir.path().join("no-positions.dat"),
    )
    .unwrap();

    assert!(!reader.is_ready());
    assert_eq!(reader.num_documents(1), 0);

    let mut source = reader.documents(1);
    assert_eq!(drain(&mut source, 8), Vec::<u64>::new());

    let prio = PrioReverseIndexReader::new(
        "prio",
        &dir.path().join("no-words.dat"),
        &dir.path().join("no-docs.dat"),
    )
    .unwrap();
    assert!(!prio.is_ready());
    assert_eq!(prio.num_documents(1), 0);
}

#[test]
fn test_corrupt_footer_degrades_reader() {
    let dir = TempDir::new().unwrap();
    let (words, docs, positions) = build_full_index(&dir);

    // Flip a payload byte; the checksum catches it at open.
    let mut bytes = std::fs::read(&docs).unwrap();
    bytes[10] ^= 0xFF;
    std::fs::write(&docs, &bytes).unwrap();

    let reader = FullReverseIndexReader::new("full", &words, &docs, &positions).unwrap();
    assert!(!reader.is_ready());
    assert_eq!(reader.num_documents(50), 0);
}

#[test]
fn test_prio_index_simple_stream() {
    let dir = TempDir::new().unwrap();
    let words = dir.path().join("words.dat");
    let docs = dir.path().join("docs.dat");

    let mut writer = PrioIndexWriter::new();
    writer.add(50, 100);
    writer.add(50, 104);
    writer.add(50, 106);
    writer.write(&words, &docs).unwrap();

    let reader = PrioReverseIndexReader::new("prio", &words, &docs).unwrap();
    assert!(reader.is_ready());
    assert_eq!(reader.num_documents(50), 3);

    let mut source = reader.documents(50);
    assert_eq!(source.index_name(), "prio");
    assert_eq!(drain(&mut source, 32), vec![100, 104, 106]);

    let mut source = reader.documents(999);
    assert!(!source.has_more());
}

/// Random document ids covering every record shape: ordinal bumps,
/// domain changes with ordinal resets, and rank promotions.
fn random_document_ids(n: usize) -> Vec<u64> {
    let mut rng = rand::rng();

    let mut rank: u8 = 0;
    let mut domain: u32 = 0;
    let mut ordinal: u32 = 0;

    let mut ids = Vec::with_capacity(n);
    for _ in 0..n {
        let mut scenario = rng.random_range(0..3);
        if rank == 63 && scenario == 2 {
            scenario = 0;
        }

        if scenario == 0 {
            ordinal += rng.random_range(1..100);
        } else if scenario == 1 {
            domain += rng.random_range(1..1000);
            ordinal = rng.random_range(0..10_000);
        } else {
            rank = (rank + 1).min(63);
            domain = rng.random_range(0..10_000);
            ordinal = rng.random_range(0..10_000);
        }

        ids.push(encode_document_id(rank, domain, ordinal));
    }

    ids.sort_unstable();
    ids.dedup();
    ids
}

#[test]
fn test_prio_index_large_random_round_trip() {
    let dir = TempDir::new().unwrap();
    let words = dir.path().join("words.dat");
    let docs = dir.path().join("docs.dat");

    let ids = random_document_ids(10_000);

    let mut writer = PrioIndexWriter::new();
    for &id in &ids {
        writer.add(50, id);
    }
    writer.write(&words, &docs).unwrap();

    let reader = PrioReverseIndexReader::new("prio", &words, &docs).unwrap();
    assert_eq!(reader.num_documents(50), ids.len());

    // Small buffer: the decoder crosses many refill boundaries.
    let mut source = reader.documents(50);
    let decoded = drain(&mut source, 32);
    assert_eq!(decoded, ids);

    let mut prev = 0;
    for &id in &decoded {
        assert!(id > prev, "stream must be strictly ascending");
        prev = id;
    }
}

#[test]
fn test_prio_decode_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let words = dir.path().join("words.dat");
    let docs = dir.path().join("docs.dat");

    let ids = random_document_ids(2_000);

    let mut writer = PrioIndexWriter::new();
    for &id in &ids {
        writer.add(7, id);
    }
    writer.write(&words, &docs).unwrap();

    let reader = PrioReverseIndexReader::new("prio", &words, &docs).unwrap();

    let first = drain(&mut reader.documents(7), 64);
    let second = drain(&mut reader.documents(7), 17);

    assert_eq!(first, second);
    assert_eq!(first, ids);
}

#[test]
fn test_prio_skip() {
    let dir = TempDir::new().unwrap();
    let words = dir.path().join("words.dat");
    let docs = dir.path().join("docs.dat");

    let mut writer = PrioIndexWriter::new();
    for doc in [100u64, 104, 106, 190, 201] {
        writer.add(50, doc);
    }
    writer.write(&words, &docs).unwrap();

    let reader = PrioReverseIndexReader::new("prio", &words, &docs).unwrap();
    let mut source = reader.documents(50);
    source.skip(3).unwrap();
    assert_eq!(drain(&mut source, 8), vec![190, 201]);
}

fn write_generation(dir: &std::path::Path, generation: IndexGeneration, doc: u64) {
    let mut writer = FullIndexWriter::new();
    writer.add(50, doc, &[1]);
    writer
        .write(
            &files::words_file(dir, IndexKind::Full, generation),
            &files::docs_file(dir, IndexKind::Full, generation),
            &files::positions_file(dir, generation),
        )
        .unwrap();

    let mut writer = PrioIndexWriter::new();
    writer.add(50, doc);
    writer
        .write(
            &files::words_file(dir, IndexKind::Prio, generation),
            &files::docs_file(dir, IndexKind::Prio, generation),
        )
        .unwrap();
}

#[test]
fn test_snapshot_swap_keeps_old_readers_alive() {
    let dir = TempDir::new().unwrap();
    let index = StatefulIndex::new(dir.path());

    write_generation(dir.path(), IndexGeneration::Current, 100);
    index.switch_index().unwrap();

    let old_snapshot = index.get_reader().unwrap();
    assert!(old_snapshot.is_ready());
    assert_eq!(drain(&mut old_snapshot.documents_full(50), 8), vec![100]);

    // Stage and promote a new generation while the old snapshot is held.
    write_generation(dir.path(), IndexGeneration::Next, 222);
    index.switch_index().unwrap();

    let new_snapshot = index.get_reader().unwrap();
    assert_eq!(drain(&mut new_snapshot.documents_full(50), 8), vec![222]);
    assert_eq!(drain(&mut new_snapshot.documents_prio(50), 8), vec![222]);

    // The in-flight reference still answers from the old generation's
    // maps; it unmaps only when this Arc drops.
    assert_eq!(drain(&mut old_snapshot.documents_prio(50), 8), vec![100]);
    assert_eq!(old_snapshot.num_hits(50), 1);

    drop(old_snapshot);
    assert_eq!(new_snapshot.num_hits_prio(50), 1);
}

#[test]
fn test_combined_reader_term_data() {
    let dir = TempDir::new().unwrap();
    write_generation(dir.path(), IndexGeneration::Current, 321);

    let index = StatefulIndex::new(dir.path());
    index.switch_index().unwrap();
    let snapshot = index.get_reader().unwrap();

    let mut arena = QueryArena::new();
    let data = snapshot.get_term_data(&mut arena, 50, &[321]);
    assert_eq!(data[0].unwrap().positions().values(), vec![1]);

    assert!(matches!(snapshot.also(50), FilterStep::Retain(_)));
    assert!(matches!(snapshot.not(50), FilterStep::Reject(_)));
}
