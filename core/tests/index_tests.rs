use search_core::index::{DocId, InvertedIndex};
use search_core::query::{evaluate, PostingsLookup, Query, QueryMode};
use search_core::tokenizer::{term_frequencies, tokenize, TokenizeOptions};

const CORPUS: &[(DocId, &str)] = &[
    (1, "the quick brown fox"),
    (2, "the quick red fox"),
    (3, "cats and dogs"),
    (10, "a fox among dogs, quick quick"),
    (42, "nothing in common"),
];

fn build_in_order(order: &[usize]) -> InvertedIndex {
    let opts = TokenizeOptions::default();
    let mut index = InvertedIndex::new();
    for &i in order {
        let (id, text) = CORPUS[i];
        index.add_document(id, &term_frequencies(tokenize(text, &opts))).unwrap();
    }
    index.finalize();
    index
}

#[test]
fn serialization_ignores_insertion_order() {
    let baseline = build_in_order(&[0, 1, 2, 3, 4]).serialize().unwrap();
    for order in [[4, 3, 2, 1, 0], [2, 0, 4, 1, 3], [3, 4, 0, 2, 1]] {
        assert_eq!(build_in_order(&order).serialize().unwrap(), baseline, "{order:?}");
    }
}

#[test]
fn postings_are_sorted_and_counted() {
    let index = build_in_order(&[3, 1, 0]);
    let quick = index.get("quick").unwrap();
    let ids: Vec<DocId> = quick.iter().map(|p| p.doc_id).collect();
    assert_eq!(ids, vec![1, 2, 10]);
    assert_eq!(quick[2].tf, 2);
    assert!(index.postings.values().flatten().all(|p| p.tf >= 1));
}

#[test]
fn round_trip_preserves_lookups() {
    let index = build_in_order(&[0, 1, 2, 3, 4]);
    let restored = InvertedIndex::deserialize(&index.serialize().unwrap()).unwrap();

    assert!(restored.is_finalized());
    assert_eq!(restored.doc_count, index.doc_count);
    assert_eq!(restored.postings, index.postings);
    for term in index.postings.keys() {
        assert_eq!(restored.postings(term), index.postings(term));
    }
    assert_eq!(restored.serialize().unwrap(), index.serialize().unwrap());
}

#[test]
fn restored_index_is_read_only() {
    let index = build_in_order(&[0]);
    let mut restored = InvertedIndex::deserialize(&index.serialize().unwrap()).unwrap();
    assert!(restored.add_document(99, &term_frequencies(["x"])).is_err());
}

#[test]
fn deserialize_trusts_stored_order() {
    let bytes = br#"{"docCount":2,"postings":{"a":[{"docId":9,"tf":1},{"docId":3,"tf":1}]}}"#;
    let index = InvertedIndex::deserialize(bytes).unwrap();
    let ids: Vec<DocId> = index.get("a").unwrap().iter().map(|p| p.doc_id).collect();
    assert_eq!(ids, vec![9, 3]);
}

#[test]
fn deserialize_rejects_garbage() {
    assert!(InvertedIndex::deserialize(b"not json").is_err());
    assert!(InvertedIndex::deserialize(br#"{"docCount":1,"postings":{"a":[{"docId":1,"tf":0}]}}"#).is_err());
    assert!(InvertedIndex::deserialize(br#"{"docCount":1,"postings":{"a":[{"docId":-1,"tf":1}]}}"#).is_err());
}

#[test]
fn and_never_grows_or_never_shrinks() {
    let index = build_in_order(&[0, 1, 2, 3, 4]);
    let terms = ["fox", "quick", "dogs", "red", "brown"];
    for n in 1..terms.len() {
        let shorter = terms[..n].join(" ");
        let longer = terms[..=n].join(" ");

        let and_short = evaluate(&Query::parse(&shorter, QueryMode::And, None), &index).doc_ids;
        let and_long = evaluate(&Query::parse(&longer, QueryMode::And, None), &index).doc_ids;
        assert!(and_long.iter().all(|id| and_short.contains(id)), "{longer}");

        let or_short = evaluate(&Query::parse(&shorter, QueryMode::Or, None), &index).doc_ids;
        let or_long = evaluate(&Query::parse(&longer, QueryMode::Or, None), &index).doc_ids;
        assert!(or_short.iter().all(|id| or_long.contains(id)), "{longer}");
    }
}
