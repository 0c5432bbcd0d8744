mod utils;

use expense_repo::document_repo::{DocumentFilter, DocumentRepoError, NewDocument};
use expense_repo::file_store::FileStoreError;
use expense_repo::filter::PageOptions;
use std::collections::HashSet;
use std::path::Path;
use utils::{build_repos, tag_set, upload};

#[actix_rt::test]
async fn test_create_and_get_document() {
    let repos = build_repos().await;

    let created = repos
        .document_repo
        .create_document(
            NewDocument::new("Invoice", Some("March".to_string()), HashSet::new()),
            upload("invoice.pdf", b"%PDF-1.4 content"),
        )
        .await
        .unwrap();
    assert_eq!(created.file_size, 16);
    assert_eq!(created.original_name, "invoice.pdf");
    assert!(created.tags.is_empty());
    assert!(created.file_path.ends_with(&format!("{}.pdf", created.id)));

    let stored = repos
        .document_repo
        .get_document(&created.id)
        .await
        .unwrap();
    assert_eq!(stored.title, "Invoice");
    assert_eq!(stored.description.as_deref(), Some("March"));
    assert_eq!(stored.file_path, created.file_path);
    assert_eq!(stored.file_size, 16);

    let file = repos
        .document_repo
        .get_document_file(&created.id)
        .await
        .unwrap();
    assert_eq!(file.original_name, "invoice.pdf");
    assert_eq!(
        std::fs::read(file.path).unwrap(),
        b"%PDF-1.4 content".to_vec()
    );
}

#[actix_rt::test]
async fn test_missing_title() {
    let repos = build_repos().await;

    let result = repos
        .document_repo
        .create_document(
            NewDocument::new("", None, HashSet::new()),
            upload("notes.txt", b"notes"),
        )
        .await;
    assert!(matches!(result, Err(DocumentRepoError::Invalid(_))));

    let documents = repos.dir.path().join("storage/documents");
    assert_eq!(std::fs::read_dir(documents).unwrap().count(), 0);
}

#[actix_rt::test]
async fn test_update_metadata_only() {
    let repos = build_repos().await;
    let ids = repos.create_tags(&["a", "b"]).await;

    let created = repos
        .document_repo
        .create_document(
            NewDocument::new("Lease", None, tag_set(&[&ids[0]])),
            upload("lease.pdf", b"lease"),
        )
        .await
        .unwrap();

    let updated = repos
        .document_repo
        .update_document(
            &created.id,
            NewDocument::new("Lease 2024", Some("signed".to_string()), tag_set(&[&ids[1]])),
            None,
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Lease 2024");
    assert_eq!(updated.description.as_deref(), Some("signed"));
    assert_eq!(updated.tags, tag_set(&[&ids[1]]));
    assert_eq!(updated.file_path, created.file_path);
    assert_eq!(updated.original_name, "lease.pdf");
    assert!(Path::new(&created.file_path).exists());
}

#[actix_rt::test]
async fn test_update_replaces_file() {
    let repos = build_repos().await;

    let created = repos
        .document_repo
        .create_document(
            NewDocument::new("Scan", None, HashSet::new()),
            upload("scan.png", b"old image"),
        )
        .await
        .unwrap();

    let updated = repos
        .document_repo
        .update_document(
            &created.id,
            NewDocument::new("Scan", None, HashSet::new()),
            Some(upload("scan.pdf", b"new pdf")),
        )
        .await
        .unwrap();
    assert_ne!(updated.file_path, created.file_path);
    assert!(!Path::new(&created.file_path).exists());
    assert_eq!(updated.original_name, "scan.pdf");
    assert_eq!(updated.file_size, 7);

    let file = repos
        .document_repo
        .get_document_file(&created.id)
        .await
        .unwrap();
    assert_eq!(file.path, updated.file_path);
    assert_eq!(std::fs::read(file.path).unwrap(), b"new pdf".to_vec());
}

#[actix_rt::test]
async fn test_update_same_extension_overwrites() {
    let repos = build_repos().await;

    let created = repos
        .document_repo
        .create_document(
            NewDocument::new("Receipt", None, HashSet::new()),
            upload("receipt.pdf", b"first"),
        )
        .await
        .unwrap();
    let updated = repos
        .document_repo
        .update_document(
            &created.id,
            NewDocument::new("Receipt", None, HashSet::new()),
            Some(upload("receipt-v2.pdf", b"second")),
        )
        .await
        .unwrap();
    assert_eq!(updated.file_path, created.file_path);
    assert_eq!(std::fs::read(&updated.file_path).unwrap(), b"second".to_vec());
}

#[actix_rt::test]
async fn test_update_missing_document() {
    let repos = build_repos().await;

    let result = repos
        .document_repo
        .update_document(
            "missing",
            NewDocument::new("Ghost", None, HashSet::new()),
            Some(upload("ghost.pdf", b"boo")),
        )
        .await;
    assert!(matches!(result, Err(DocumentRepoError::DocumentNotFound(id)) if id == "missing"));

    let documents = repos.dir.path().join("storage/documents");
    assert_eq!(std::fs::read_dir(documents).unwrap().count(), 0);
}

#[actix_rt::test]
async fn test_delete_document() {
    let repos = build_repos().await;
    let ids = repos.create_tags(&["a"]).await;

    let created = repos
        .document_repo
        .create_document(
            NewDocument::new("Warranty", None, tag_set(&[&ids[0]])),
            upload("warranty.pdf", b"pdf"),
        )
        .await
        .unwrap();

    repos
        .document_repo
        .delete_document(&created.id)
        .await
        .unwrap();
    assert!(!Path::new(&created.file_path).exists());
    assert!(matches!(
        repos.document_repo.get_document(&created.id).await,
        Err(DocumentRepoError::DocumentNotFound(_))
    ));
    assert!(matches!(
        repos.document_repo.delete_document(&created.id).await,
        Err(DocumentRepoError::DocumentNotFound(_))
    ));
    let usage = repos.tag_repo.get_tag_usage().await.unwrap();
    assert_eq!(usage[0].document_count, 0);
}

#[actix_rt::test]
async fn test_delete_with_missing_file_rolls_back() {
    let repos = build_repos().await;

    let created = repos
        .document_repo
        .create_document(
            NewDocument::new("Manual", None, HashSet::new()),
            upload("manual.pdf", b"pdf"),
        )
        .await
        .unwrap();
    std::fs::remove_file(&created.file_path).unwrap();

    let result = repos.document_repo.delete_document(&created.id).await;
    assert!(matches!(
        result,
        Err(DocumentRepoError::File(FileStoreError::Missing(_)))
    ));
    // The row survives a failed file removal.
    let stored = repos
        .document_repo
        .get_document(&created.id)
        .await
        .unwrap();
    assert_eq!(stored.title, "Manual");
}

#[actix_rt::test]
async fn test_document_pagination() {
    let repos = build_repos().await;
    let mut created_ids = Vec::new();
    for title in ["one", "two", "three", "four"] {
        let document = repos
            .document_repo
            .create_document(
                NewDocument::new(title, None, HashSet::new()),
                upload("file.txt", title.as_bytes()),
            )
            .await
            .unwrap();
        created_ids.push(document.id);
    }

    let first = repos
        .document_repo
        .get_documents(DocumentFilter::default(), PageOptions::from_offset(0, 2))
        .await
        .unwrap();
    let second = repos
        .document_repo
        .get_documents(DocumentFilter::default(), PageOptions::from_offset(2, 2))
        .await
        .unwrap();
    assert_eq!(first.total, 4);
    assert_eq!(first.results.len(), 2);
    assert_eq!(second.results.len(), 2);

    let mut seen: Vec<String> = first
        .results
        .into_iter()
        .chain(second.results)
        .map(|d| d.id)
        .collect();
    seen.sort();
    seen.dedup();
    created_ids.sort();
    assert_eq!(seen, created_ids);
}

#[actix_rt::test]
async fn test_document_tag_filter() {
    let repos = build_repos().await;
    let ids = repos.create_tags(&["taxes", "home"]).await;

    let taxes = repos
        .document_repo
        .create_document(
            NewDocument::new("Return", None, tag_set(&[&ids[0], &ids[1]])),
            upload("return.pdf", b"pdf"),
        )
        .await
        .unwrap();
    repos
        .document_repo
        .create_document(
            NewDocument::new("Deed", None, tag_set(&[&ids[1]])),
            upload("deed.pdf", b"pdf"),
        )
        .await
        .unwrap();

    let page = repos
        .document_repo
        .get_documents(
            DocumentFilter {
                tag: Some(ids[0].clone()),
            },
            PageOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.results[0].id, taxes.id);
    assert_eq!(page.results[0].tags, tag_set(&[&ids[0], &ids[1]]));
}
