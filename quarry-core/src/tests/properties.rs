//! Invariant checks across the iterator algebra and the scheme layer.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::prelude::*;

use crate::DocId;
use crate::db::{Shard, WritableDatabase};
use crate::document::Document;
use crate::postlist::{AndNotPostList, MultiAndPostList, MultiOrPostList, PostList, TermPostList};
use crate::query::{Query, Searcher};
use crate::registry::Registry;
use crate::stats::{CollectionStats, TermFreqs, WeightContext};
use crate::weight::BoolWeight;

fn random_shard(rng: &mut StdRng, num_docs: u32, terms: &[&str]) -> Arc<Shard> {
    let shard = Arc::new(Shard::new());
    for _ in 0..num_docs {
        let mut doc = Document::new();
        doc.add_term("filler", rng.gen_range(1..20));
        for term in terms {
            if rng.gen_bool(0.4) {
                doc.add_term(*term, rng.gen_range(1..6));
            }
        }
        shard.add_document(&doc).unwrap();
    }
    shard
}

fn bool_leaf(shard: &Arc<Shard>, term: &str) -> Option<Box<dyn PostList>> {
    let postings = shard.term_postings(term.as_bytes())?;
    Some(Box::new(TermPostList::new(
        term.as_bytes().to_vec(),
        postings,
        shard.clone(),
        Box::new(BoolWeight),
    )))
}

fn term_docids(shard: &Arc<Shard>, term: &str) -> BTreeSet<DocId> {
    shard
        .term_postings(term.as_bytes())
        .map(|tp| tp.postings.iter().map(|p| p.docid).collect())
        .unwrap_or_default()
}

fn drain(pl: &mut dyn PostList) -> Vec<DocId> {
    let mut out = Vec::new();
    loop {
        pl.next(0.0).unwrap();
        if pl.at_end() {
            break;
        }
        out.push(pl.docid());
    }
    out
}

#[test]
fn test_leaf_never_exceeds_wdf_bound() {
    let mut rng = StdRng::seed_from_u64(7);
    let shard = random_shard(&mut rng, 200, &["alpha", "beta"]);
    for term in ["alpha", "beta", "filler"] {
        let postings = shard.term_postings(term.as_bytes()).unwrap();
        let leaf = TermPostList::new(
            term.as_bytes().to_vec(),
            postings.clone(),
            shard.clone(),
            Box::new(BoolWeight),
        );
        for p in &postings.postings {
            assert!(p.wdf <= leaf.wdf_upper_bound());
        }
    }
}

#[test]
fn test_and_emits_exact_intersection() {
    let mut rng = StdRng::seed_from_u64(11);
    for round in 0..5 {
        let shard = random_shard(&mut rng, 150, &["x", "y"]);
        let expected: Vec<DocId> = term_docids(&shard, "x")
            .intersection(&term_docids(&shard, "y"))
            .copied()
            .collect();
        let children = vec![
            bool_leaf(&shard, "x").unwrap(),
            bool_leaf(&shard, "y").unwrap(),
        ];
        let mut and = MultiAndPostList::new(children, shard.num_docs());
        and.recalc_maxweight();
        assert_eq!(drain(&mut and), expected, "round {}", round);
    }
}

#[test]
fn test_and_not_emits_exact_difference() {
    let mut rng = StdRng::seed_from_u64(13);
    for round in 0..5 {
        let shard = random_shard(&mut rng, 150, &["x", "y"]);
        let expected: Vec<DocId> = term_docids(&shard, "x")
            .difference(&term_docids(&shard, "y"))
            .copied()
            .collect();
        let mut and_not = AndNotPostList::new(
            bool_leaf(&shard, "x").unwrap(),
            bool_leaf(&shard, "y").unwrap(),
        );
        assert_eq!(drain(&mut and_not), expected, "round {}", round);
    }
}

#[test]
fn test_or_emits_exact_union() {
    let mut rng = StdRng::seed_from_u64(17);
    let shard = random_shard(&mut rng, 150, &["x", "y", "z"]);
    let mut expected = term_docids(&shard, "x");
    expected.extend(term_docids(&shard, "y"));
    expected.extend(term_docids(&shard, "z"));
    let expected: Vec<DocId> = expected.into_iter().collect();

    let children = vec![
        bool_leaf(&shard, "x").unwrap(),
        bool_leaf(&shard, "y").unwrap(),
        bool_leaf(&shard, "z").unwrap(),
    ];
    let mut or = MultiOrPostList::new(children);
    or.recalc_maxweight();
    assert_eq!(drain(&mut or), expected);
}

#[test]
fn test_combinator_weight_never_exceeds_maxweight() {
    let mut rng = StdRng::seed_from_u64(19);
    let shard = random_shard(&mut rng, 300, &["x", "y", "z"]);
    let stats = shard.collection_stats();
    let registry = Registry::new();

    for scheme_name in ["bm25", "pl2+", "inl2", "lmdirichlet", "tfidf"] {
        let proto = registry.get_weighting_scheme(scheme_name).unwrap();
        let children: Vec<Box<dyn PostList>> = ["x", "y", "z"]
            .iter()
            .map(|t| {
                let postings = shard.term_postings(t.as_bytes()).unwrap();
                let scheme =
                    crate::query::init_scheme_for_term(proto, &shard, &stats, t.as_bytes(), 1, 1.0);
                Box::new(TermPostList::new(
                    t.as_bytes().to_vec(),
                    postings,
                    shard.clone(),
                    scheme,
                )) as Box<dyn PostList>
            })
            .collect();
        let mut or = MultiOrPostList::new(children);
        let mut max = or.recalc_maxweight();
        loop {
            or.next(0.0).unwrap();
            if or.at_end() {
                break;
            }
            let (doclen, unique, wdfmax) = shard.doc_data(or.docid()).unwrap();
            let weight = or.get_weight(doclen, unique, wdfmax);
            assert!(
                weight <= max + 1e-9,
                "{}: weight {} exceeds maxweight {} at doc {}",
                scheme_name,
                weight,
                max,
                or.docid()
            );
            // Recalculation between steps must never raise the bound.
            let next_max = or.recalc_maxweight();
            assert!(next_max <= max + 1e-9);
            max = next_max;
        }
    }
}

#[test]
fn test_max_part_dominates_for_every_registered_scheme() {
    let mut rng = StdRng::seed_from_u64(23);
    let stats = CollectionStats {
        collection_size: 5000,
        total_length: 400_000,
        doclength_lower_bound: 4,
        doclength_upper_bound: 900,
        wdf_upper_bound: 40,
        unique_terms_lower_bound: 2,
        unique_terms_upper_bound: 350,
        rset_size: 0,
        query_length: 2,
    };
    let registry = Registry::new();

    for name in [
        "bb2",
        "bm25",
        "bm25+",
        "bool",
        "coord",
        "dlh",
        "dph",
        "ifb2",
        "ineb2",
        "inl2",
        "lm2stage",
        "lmabsdiscount",
        "lmdirichlet",
        "lmjm",
        "pl2",
        "pl2+",
        "tfidf",
    ] {
        let proto = registry.get_weighting_scheme(name).unwrap();
        let ctx = WeightContext {
            stats,
            freqs: TermFreqs::new(600, 0, 2400),
            wqf: 2,
            wdf_upper_bound: 40,
        };
        let mut scheme = proto.clone_boxed();
        scheme.init(&ctx.restricted_to(scheme.needs()), 1.0);
        let mut extra = proto.clone_boxed();
        extra.init(&ctx.restricted_to(extra.needs()), 0.0);

        for _ in 0..500 {
            let doclen = rng.gen_range(stats.doclength_lower_bound..=stats.doclength_upper_bound);
            let wdf = rng.gen_range(0..=ctx.wdf_upper_bound.min(doclen));
            let unique = rng.gen_range(
                stats.unique_terms_lower_bound..=stats.unique_terms_upper_bound.min(doclen.max(2)),
            );
            let part = scheme.sum_part(wdf, doclen, unique, wdf.max(1));
            assert!(
                scheme.max_part() >= part - 1e-9,
                "{}: max_part {} < sum_part {} (wdf={} doclen={} unique={})",
                name,
                scheme.max_part(),
                part,
                wdf,
                doclen,
                unique
            );
            let extra_part = extra.sum_extra(doclen, unique);
            assert!(
                extra.max_extra() >= extra_part - 1e-9,
                "{}: max_extra {} < sum_extra {}",
                name,
                extra.max_extra(),
                extra_part
            );
        }
    }
}

#[test]
fn test_scheme_roundtrip_for_all_registered() {
    let registry = Registry::new();
    for name in [
        "bb2", "bm25", "bm25+", "bool", "coord", "dlh", "dph", "ifb2", "ineb2", "inl2",
        "lm2stage", "lmabsdiscount", "lmdirichlet", "lmjm", "pl2", "pl2+", "tfidf",
    ] {
        let proto = registry.get_weighting_scheme(name).unwrap();
        let bytes = proto.serialise();
        let restored = proto.unserialise(&bytes).unwrap();
        assert_eq!(restored.name(), name);
        assert_eq!(restored.serialise(), bytes, "{} round-trip drifted", name);
    }

    // Representative parameter grid for pl2+.
    let proto = registry.get_weighting_scheme("pl2+").unwrap();
    for c in [0.1, 1.0, 2.7] {
        for delta in [0.1, 1.0, 2.7] {
            let built = proto
                .from_parameters(&format!("{} {}", c, delta))
                .unwrap();
            let restored = proto.unserialise(&built.serialise()).unwrap();
            assert_eq!(restored.serialise(), built.serialise());
        }
    }
}

#[test]
fn test_and_weights_are_sum_of_children() {
    // Terms A in {1,3,5,7}, B in {3,4,5,8}: intersection {3,5} with
    // weight(A,d) + weight(B,d).
    let db = WritableDatabase::inmemory();
    let mut layout: Vec<Vec<&str>> = vec![Vec::new(); 8];
    for d in [1u32, 3, 5, 7] {
        layout[(d - 1) as usize].push("aterm");
    }
    for d in [3u32, 4, 5, 8] {
        layout[(d - 1) as usize].push("bterm");
    }
    for terms in &layout {
        let mut doc = Document::new();
        doc.add_term("filler", 1);
        for t in terms {
            doc.add_term(*t, 2);
        }
        db.add_document(&doc).unwrap();
    }
    let searcher = Searcher::new(db.reopen());

    let and = Query::And(vec![Query::term("aterm"), Query::term("bterm")]);
    let hits = searcher.search(&and, 10).unwrap();
    let mut got: Vec<DocId> = hits.iter().map(|h| h.docid).collect();
    got.sort_unstable();
    assert_eq!(got, vec![3, 5]);

    let a_hits = searcher.search(&Query::term("aterm"), 10).unwrap();
    let b_hits = searcher.search(&Query::term("bterm"), 10).unwrap();
    for hit in &hits {
        let a = a_hits.iter().find(|h| h.docid == hit.docid).unwrap();
        let b = b_hits.iter().find(|h| h.docid == hit.docid).unwrap();
        assert!(
            (hit.weight - (a.weight + b.weight)).abs() < 1e-9,
            "doc {}: {} != {} + {}",
            hit.docid,
            hit.weight,
            a.weight,
            b.weight
        );
    }
}
