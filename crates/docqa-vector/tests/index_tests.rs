use docqa_core::{Chunk, Error, Provenance};
use docqa_vector::VectorIndex;

fn chunk(i: usize) -> Chunk {
    Chunk::new(format!("chunk number {i}"), Provenance::new(format!("docs/file{i}.pdf"), Some(i as u32 + 1)), 0)
}

fn index(vectors: Vec<Vec<f32>>) -> VectorIndex {
    let chunks = (0..vectors.len()).map(chunk).collect();
    VectorIndex::build(chunks, vectors).expect("build")
}

#[test]
fn search_orders_by_cosine_similarity() {
    let idx = index(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]]);
    let hits = idx.search(&[1.0, 0.1], 3).unwrap();
    let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
    assert_eq!(texts, vec!["chunk number 1", "chunk number 2", "chunk number 0"]);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert!((hits[0].score - (1.0 / 1.01f32.sqrt())).abs() < 1e-5);
}

#[test]
fn returns_min_of_k_and_len() {
    let idx = index(vec![vec![1.0, 0.0], vec![0.5, 0.5], vec![0.0, 1.0]]);
    assert_eq!(idx.search(&[1.0, 0.0], 2).unwrap().len(), 2);
    assert_eq!(idx.search(&[1.0, 0.0], 3).unwrap().len(), 3);
    assert_eq!(idx.search(&[1.0, 0.0], 50).unwrap().len(), 3);
}

#[test]
fn ties_keep_insertion_order() {
    let idx = index(vec![vec![0.0, 1.0], vec![2.0, 0.0], vec![1.0, 0.0], vec![3.0, 0.0]]);
    let hits = idx.search(&[1.0, 0.0], 4).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["file1:2:0", "file2:3:0", "file3:4:0", "file0:1:0"]);
}

#[test]
fn zero_k_is_rejected_and_index_is_untouched() {
    let idx = index(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    let before = idx.entries().to_vec();
    assert!(matches!(idx.search(&[1.0, 0.0], 0), Err(Error::InvalidArgument(_))));
    assert_eq!(idx.entries(), before.as_slice());
    assert_eq!(idx.search(&[1.0, 0.0], 2).unwrap().len(), 2);
}

#[test]
fn empty_index_returns_nothing() {
    let idx = VectorIndex::build(Vec::new(), Vec::new()).unwrap();
    assert!(idx.is_empty());
    assert_eq!(idx.dim(), None);
    for k in [1, 5, 100] {
        assert!(idx.search(&[0.3, 0.4, 0.5], k).unwrap().is_empty());
    }
}

#[test]
fn mixed_dimensions_fail_to_build() {
    let err = VectorIndex::build(vec![chunk(0), chunk(1)], vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }), "got {err:?}");
}

#[test]
fn length_mismatch_fails_to_build() {
    let err = VectorIndex::build(vec![chunk(0)], vec![vec![1.0], vec![0.5]]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn query_with_wrong_dimension_is_rejected() {
    let idx = index(vec![vec![1.0, 0.0]]);
    assert!(matches!(idx.search(&[1.0, 0.0, 0.0], 1), Err(Error::DimensionMismatch { expected: 2, actual: 3 })));
}

#[test]
fn zero_vectors_score_zero() {
    let idx = index(vec![vec![0.0, 0.0], vec![1.0, 0.0]]);
    let hits = idx.search(&[1.0, 0.0], 2).unwrap();
    assert_eq!(hits[1].score, 0.0);
    assert_eq!(hits[1].chunk.id, "file0:1:0");
}
