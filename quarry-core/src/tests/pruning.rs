//! Pruning must never change the top-k: the matcher run with a bounded
//! heap has to agree with a brute-force scorer that never skips.

use rand::prelude::*;

use crate::db::{Database, WritableDatabase};
use crate::document::Document;
use crate::matcher::Hit;
use crate::query::{Query, Searcher};
use crate::registry::Registry;
use crate::weight::Weight;

const TERMS: [&str; 4] = ["north", "south", "east", "west"];

fn random_db(rng: &mut StdRng, num_docs: u32) -> Database {
    let db = WritableDatabase::inmemory();
    for _ in 0..num_docs {
        let mut doc = Document::new();
        doc.add_term("anchor", rng.gen_range(1..4));
        for (i, term) in TERMS.iter().enumerate() {
            // Term frequencies vary so maxweights differ per child.
            if rng.gen_bool(0.08 * (i + 1) as f64) {
                doc.add_term(*term, rng.gen_range(1..8));
            }
        }
        db.add_document(&doc).unwrap();
    }
    db.reopen()
}

fn assert_same_hits(pruned: &[Hit], brute: &[Hit], scheme: &str) {
    assert_eq!(
        pruned.len(),
        brute.len(),
        "{}: result counts differ",
        scheme
    );
    for (p, b) in pruned.iter().zip(brute.iter()) {
        assert_eq!(p.docid, b.docid, "{}: docid order differs", scheme);
        assert!(
            (p.weight - b.weight).abs() < 1e-9,
            "{}: weight differs for doc {}: {} vs {}",
            scheme,
            p.docid,
            p.weight,
            b.weight
        );
    }
}

#[test]
fn test_topk_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(42);
    let db = random_db(&mut rng, 10_000);
    let num_docs = db.num_docs();
    let registry = Registry::new();

    let query = Query::Or(TERMS.iter().map(|t| Query::term(*t)).collect());
    for scheme_name in ["bm25", "bm25+", "pl2+", "inl2", "dph", "lmdirichlet", "tfidf"] {
        let proto: Box<dyn Weight> = registry
            .get_weighting_scheme(scheme_name)
            .unwrap()
            .clone_boxed();

        let mut pruned_searcher = Searcher::new(db.reopen());
        pruned_searcher.set_scheme(proto.clone_boxed());
        let pruned = pruned_searcher.search(&query, 10).unwrap();

        // A heap big enough for every document never fills, so w_min stays
        // zero and nothing is skipped.
        let mut brute_searcher = Searcher::new(db.reopen());
        brute_searcher.set_scheme(proto);
        let mut brute = brute_searcher
            .search(&query, num_docs as usize + 1)
            .unwrap();
        brute.truncate(10);

        assert_same_hits(&pruned, &brute, scheme_name);
    }
}

#[test]
fn test_topk_matches_brute_force_with_and_not() {
    let mut rng = StdRng::seed_from_u64(99);
    let db = random_db(&mut rng, 2_000);
    let num_docs = db.num_docs();

    let query = Query::AndNot(
        Box::new(Query::Or(vec![
            Query::term("north"),
            Query::term("south"),
            Query::term("east"),
        ])),
        Box::new(Query::term("west")),
    );

    let searcher = Searcher::new(db.reopen());
    let pruned = searcher.search(&query, 10).unwrap();
    let mut brute = searcher.search(&query, num_docs as usize + 1).unwrap();
    brute.truncate(10);
    assert_same_hits(&pruned, &brute, "bm25/and_not");
}
