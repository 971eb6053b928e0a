//! Behavior every [`NoteRepository`] must share, run against each adapter
//! from its own test module.

use std::collections::HashSet;

use models::Note;

use super::NoteRepository;
use crate::context::OpContext;
use crate::errors::StorageError;

/// Runs the whole suite and finally closes `repo` twice.
pub(crate) async fn run_all<R: NoteRepository + ?Sized>(repo: &R) {
    let ctx = OpContext::background();
    create_then_get_round_trips(repo, &ctx).await;
    list_returns_exactly_created_notes(repo, &ctx).await;
    update_replaces_fields(repo, &ctx).await;
    update_missing_is_not_found_and_does_not_insert(repo, &ctx).await;
    delete_is_final(repo, &ctx).await;
    duplicate_create_is_rejected(repo, &ctx).await;
    lifecycle_scenario(repo, &ctx).await;
    cancelled_context_is_honored(repo).await;
    close_is_idempotent(repo, &ctx).await;
}

async fn clear<R: NoteRepository + ?Sized>(repo: &R, ctx: &OpContext) {
    let notes = repo.list(ctx).await.expect("list for cleanup");
    for note in notes {
        repo.delete(ctx, &note.id).await.expect("delete during cleanup");
    }
}

async fn create_then_get_round_trips<R: NoteRepository + ?Sized>(repo: &R, ctx: &OpContext) {
    clear(repo, ctx).await;
    let note = Note::with_id("contract-round-trip", "Test Title", "Test Content");
    repo.create(ctx, &note).await.expect("create");

    let got = repo.get(ctx, &note.id).await.expect("get");
    assert_eq!(got.id, note.id);
    assert_eq!(got.title, note.title);
    assert_eq!(got.content, note.content);
    assert_eq!(got.created_at, note.created_at);

    let missing = repo.get(ctx, "contract-never-created").await;
    assert_eq!(missing, Err(StorageError::not_found("contract-never-created")));
}

async fn list_returns_exactly_created_notes<R: NoteRepository + ?Sized>(repo: &R, ctx: &OpContext) {
    clear(repo, ctx).await;
    assert!(repo.list(ctx).await.expect("list empty").is_empty());

    let ids = ["contract-list-1", "contract-list-2", "contract-list-3"];
    for (i, id) in ids.iter().enumerate() {
        let note = Note::with_id(*id, format!("Title {i}"), format!("Content {i}"));
        repo.create(ctx, &note).await.expect("create");
    }

    let listed = repo.list(ctx).await.expect("list");
    assert_eq!(listed.len(), ids.len());
    let listed_ids: HashSet<&str> = listed.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(listed_ids, ids.into_iter().collect::<HashSet<_>>());
}

async fn update_replaces_fields<R: NoteRepository + ?Sized>(repo: &R, ctx: &OpContext) {
    clear(repo, ctx).await;
    let note = Note::with_id("contract-update", "Original Title", "Original Content");
    repo.create(ctx, &note).await.expect("create");

    let mut changed = note.clone();
    changed.title = "Updated Title".into();
    changed.content = "Updated Content".into();
    let committed = repo.update(ctx, changed).await.expect("update");
    assert!(committed.updated_at >= note.created_at);

    let got = repo.get(ctx, &note.id).await.expect("get updated");
    assert_eq!(got.title, "Updated Title");
    assert_eq!(got.content, "Updated Content");
    assert!(got.updated_at >= note.created_at);
    assert_eq!(got.updated_at, committed.updated_at);
}

async fn update_missing_is_not_found_and_does_not_insert<R: NoteRepository + ?Sized>(
    repo: &R,
    ctx: &OpContext,
) {
    clear(repo, ctx).await;
    let ghost = Note::with_id("contract-ghost", "Non-existent", "This note doesn't exist in storage");
    assert_eq!(repo.update(ctx, ghost).await, Err(StorageError::not_found("contract-ghost")));
    assert_eq!(repo.get(ctx, "contract-ghost").await, Err(StorageError::not_found("contract-ghost")));
    assert!(repo.list(ctx).await.expect("list").is_empty());
}

async fn delete_is_final<R: NoteRepository + ?Sized>(repo: &R, ctx: &OpContext) {
    clear(repo, ctx).await;
    let note = Note::with_id("contract-delete", "To Delete", "This note will be deleted");
    repo.create(ctx, &note).await.expect("create");

    repo.delete(ctx, &note.id).await.expect("delete");
    assert_eq!(repo.get(ctx, &note.id).await, Err(StorageError::not_found(&note.id)));
    assert_eq!(repo.delete(ctx, &note.id).await, Err(StorageError::not_found(&note.id)));
    assert_eq!(
        repo.delete(ctx, "contract-non-existent-id").await,
        Err(StorageError::not_found("contract-non-existent-id"))
    );
}

async fn duplicate_create_is_rejected<R: NoteRepository + ?Sized>(repo: &R, ctx: &OpContext) {
    clear(repo, ctx).await;
    let first = Note::with_id("dup", "first", "kept");
    repo.create(ctx, &first).await.expect("first create");

    let second = Note::with_id("dup", "second", "rejected");
    assert_eq!(repo.create(ctx, &second).await, Err(StorageError::AlreadyExists("dup".into())));

    let stored = repo.get(ctx, "dup").await.expect("get dup");
    assert_eq!(stored.title, "first");
    assert_eq!(repo.list(ctx).await.expect("list").len(), 1);
}

async fn lifecycle_scenario<R: NoteRepository + ?Sized>(repo: &R, ctx: &OpContext) {
    clear(repo, ctx).await;
    repo.create(ctx, &Note::with_id("n1", "T", "C")).await.expect("create n1");
    assert_eq!(repo.get(ctx, "n1").await.expect("get n1").title, "T");

    let mut next = repo.get(ctx, "n1").await.expect("get n1");
    next.title = "T2".into();
    next.content = "C2".into();
    repo.update(ctx, next).await.expect("update n1");
    let got = repo.get(ctx, "n1").await.expect("get n1 after update");
    assert_eq!((got.title.as_str(), got.content.as_str()), ("T2", "C2"));

    repo.delete(ctx, "n1").await.expect("delete n1");
    assert_eq!(repo.get(ctx, "n1").await, Err(StorageError::not_found("n1")));
}

async fn cancelled_context_is_honored<R: NoteRepository + ?Sized>(repo: &R) {
    let (ctx, handle) = OpContext::cancellable();
    handle.cancel();
    assert_eq!(repo.get(&ctx, "n1").await, Err(StorageError::Cancelled));
    assert_eq!(repo.create(&ctx, &Note::with_id("cancelled", "T", "C")).await, Err(StorageError::Cancelled));
    assert_eq!(repo.list(&ctx).await, Err(StorageError::Cancelled));

    let live = OpContext::background();
    assert_eq!(repo.get(&live, "cancelled").await, Err(StorageError::not_found("cancelled")));
}

async fn close_is_idempotent<R: NoteRepository + ?Sized>(repo: &R, ctx: &OpContext) {
    clear(repo, ctx).await;
    repo.close(ctx).await.expect("first close");
    repo.close(ctx).await.expect("second close");
}
