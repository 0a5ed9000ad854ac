//! Concurrent Reader Tests
//!
//! One writer appends and commits while reader threads query:
//! - Every doc below an observed committed limit has its final value
//! - Searches never return docs beyond the limit or with the wrong value
//! - Reallocating growth never invalidates a reader's view

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use aerodb_attribute::attribute::{
    AttributeConfig, GrowStrategy, QueryTermSimple, SingleBoolAttribute, TermFieldMatchData,
};

const DOCS: u32 = 5_000;
const READERS: usize = 4;

fn expected(doc: u32) -> bool {
    doc % 3 == 0
}

/// Values below the committed limit are always the committed values.
#[test]
fn test_readers_see_only_committed_values() {
    // Small initial capacity forces many reallocating grows
    let config = AttributeConfig::single_bool("flag")
        .with_grow_strategy(GrowStrategy::new(64, 0.5, 0));
    let mut attr = SingleBoolAttribute::new(config).unwrap();
    let reader = attr.reader();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..READERS {
            let reader = reader.clone();
            let done = &done;
            scope.spawn(move || {
                let mut last_limit = 0;
                while !done.load(Ordering::Acquire) {
                    let limit = reader.committed_doc_id_limit();
                    assert!(limit >= last_limit, "committed limit went backwards");
                    last_limit = limit;

                    let start = limit.saturating_sub(64);
                    for doc in start..limit {
                        assert_eq!(reader.get(doc), expected(doc), "doc {}", doc);
                    }
                }
            });
        }

        for _ in 0..READERS {
            let reader = reader.clone();
            let done = &done;
            scope.spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let context =
                        reader.create_search_context(&QueryTermSimple::from_text("true"));
                    let mut match_data = TermFieldMatchData::new();
                    let hits = context.create_filter_iterator(&mut match_data, true).hits();
                    for doc in hits {
                        assert!(expected(doc), "unexpected hit {}", doc);
                    }
                }
            });
        }

        for _ in 0..DOCS {
            let doc = attr.add_doc();
            attr.update(doc, expected(doc));
            attr.commit();
        }
        done.store(true, Ordering::Release);
    });

    assert_eq!(attr.committed_doc_id_limit(), DOCS);
    let set = (0..DOCS).filter(|&doc| expected(doc)).count() as u32;
    assert_eq!(attr.count_set_bits(), set);

    // All readers are gone, so nothing stays on hold
    attr.commit();
    assert_eq!(attr.held_buffers(), 0);
}

/// A snapshot taken before growth stays readable after the writer moves on.
#[test]
fn test_snapshot_survives_growth_on_another_thread() {
    let config = AttributeConfig::single_bool("flag")
        .with_grow_strategy(GrowStrategy::new(64, 1.0, 0));
    let mut attr = SingleBoolAttribute::new(config).unwrap();
    attr.add_docs(64);
    attr.update(63, true);
    attr.commit();

    let reader = attr.reader();
    let snapshot = reader.bit_vector();

    let writer = thread::spawn(move || {
        attr.add_docs(10_000);
        attr.commit();
        attr
    });
    let attr = writer.join().unwrap();

    assert!(snapshot.test_bit(63));
    assert_eq!(snapshot.size(), 64);
    assert_eq!(attr.num_docs(), 10_000);
    assert!(reader.get(63));
}
