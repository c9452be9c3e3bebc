mod common;

use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use common::{write_pdf, HANDBOOK_PAGES};
use docqa_core::traits::EmbeddingProvider;
use docqa_core::Error;
use docqa_embed::HashEmbedder;
use docqa_rag::{ingest, Retriever};
use docqa_vector::VectorIndex;

fn embedder() -> Arc<dyn EmbeddingProvider> { Arc::new(HashEmbedder::new(128)) }

#[tokio::test]
async fn ingest_writes_a_loadable_index() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    write_pdf(&docs.join("handbook.pdf"), &HANDBOOK_PAGES);
    fs::write(docs.join("notes.txt"), "Parking is free for all staff.\n\nBring your badge.").unwrap();
    fs::write(docs.join("broken.pdf"), b"not a pdf").unwrap();
    let index_path = tmp.path().join("index");

    let report = ingest(&docs, &index_path, 1000, 200, embedder()).await.unwrap();

    assert_eq!(report.documents, 4);
    assert_eq!(report.chunks, 4);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.ends_with("broken.pdf"));

    let index = VectorIndex::load(&index_path).await.unwrap();
    assert_eq!(index.len(), 4);
    assert_eq!(index.dim(), Some(128));
    assert_eq!(index.embedder_id(), Some("hash:xxh64:d128"));
}

#[tokio::test]
async fn small_chunks_split_long_documents() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    let text = "word ".repeat(100);
    fs::write(docs.join("long.txt"), &text).unwrap();

    let report = ingest(&docs, &tmp.path().join("index"), 50, 10, embedder()).await.unwrap();

    assert_eq!(report.documents, 1);
    assert!(report.chunks > 10);
}

#[tokio::test]
async fn empty_corpus_writes_an_empty_index() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    let index_path = tmp.path().join("index");

    let report = ingest(&docs, &index_path, 1000, 200, embedder()).await.unwrap();
    assert_eq!(report.chunks, 0);

    let index = Arc::new(VectorIndex::load(&index_path).await.unwrap());
    assert!(index.is_empty());
    let retriever = Retriever::new(embedder(), index);
    assert!(retriever.retrieve("anything at all", 3).unwrap().is_empty());
    assert!(matches!(retriever.retrieve("anything", 0), Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn reingest_replaces_the_previous_index() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("a.txt"), "First version.").unwrap();
    let index_path = tmp.path().join("index");
    ingest(&docs, &index_path, 1000, 200, embedder()).await.unwrap();

    fs::write(docs.join("b.txt"), "Second file.").unwrap();
    ingest(&docs, &index_path, 1000, 200, embedder()).await.unwrap();

    assert_eq!(VectorIndex::load(&index_path).await.unwrap().len(), 2);
}

#[tokio::test]
async fn bad_arguments_fail_before_loading() {
    let tmp = TempDir::new().unwrap();
    let res = ingest(&tmp.path().join("missing"), &tmp.path().join("index"), 100, 100, embedder()).await;
    assert!(matches!(res, Err(Error::InvalidArgument(_))));

    let res = ingest(&tmp.path().join("missing"), &tmp.path().join("index"), 100, 10, embedder()).await;
    assert!(matches!(res, Err(Error::Load(_))));
}
