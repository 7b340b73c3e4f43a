// src/policy/comment_rules.rs

//! Who may comment where.
//!
//! * A post's author may leave up to [`AUTHOR_COMMENT_LIMIT`] comments on it, anywhere.
//! * Everyone else gets one top-level comment per post and at most
//!   [`NON_AUTHOR_COMMENT_LIMIT`] comments in total. Their replies may only target a
//!   comment written by the post author, or a comment that is a direct reply to
//!   their own top-level comment.
//!
//! Every check is a fresh read against the store. Counting and inserting are
//! separate statements, so two concurrent requests from the same user can both
//! pass the quota check; the quotas are best-effort under concurrent load.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    config::{AUTHOR_COMMENT_LIMIT, NON_AUTHOR_COMMENT_LIMIT},
    error::AppError,
};

/// The slice of a comment row the rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct CommentRef {
    pub id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
}

/// Read access the rules need. Implemented for `PgPool`; tests use an in-memory store.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Number of comments `user_id` has on `post_id`, top-level and replies alike.
    async fn count_user_comments(&self, post_id: i64, user_id: i64) -> Result<i64, AppError>;

    async fn find_comment(&self, comment_id: i64) -> Result<Option<CommentRef>, AppError>;

    /// The caller's earliest top-level comment on the post, if any.
    async fn top_level_comment(&self, post_id: i64, user_id: i64)
    -> Result<Option<i64>, AppError>;
}

/// Why a comment was refused. The message is shown to the caller as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    AuthorLimitReached,
    AlreadyCommented,
    CommentLimitReached,
    ParentNotFound,
    ReplyNotPermitted,
}

impl DenyReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::AuthorLimitReached => "author comment limit reached",
            DenyReason::AlreadyCommented => "already commented",
            DenyReason::CommentLimitReached => "comment limit reached",
            DenyReason::ParentNotFound => "parent not found",
            DenyReason::ReplyNotPermitted => {
                "can only reply to the post author or to whoever replied to you"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentDecision {
    Allowed,
    Denied(DenyReason),
}

impl CommentDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CommentDecision::Allowed)
    }

    pub fn reason(&self) -> Option<&'static str> {
        match self {
            CommentDecision::Allowed => None,
            CommentDecision::Denied(reason) => Some(reason.message()),
        }
    }
}

/// Decides whether `user_id` may add a comment to `post_id`.
///
/// `parent_id` is the comment being replied to; `None` means a new top-level comment.
/// The parent is assumed to belong to the same post.
pub async fn can_comment<S: CommentStore + ?Sized>(
    store: &S,
    user_id: i64,
    post_id: i64,
    post_author_id: i64,
    parent_id: Option<i64>,
) -> Result<CommentDecision, AppError> {
    let user_comment_count = store.count_user_comments(post_id, user_id).await?;

    if user_id == post_author_id {
        if user_comment_count < AUTHOR_COMMENT_LIMIT {
            return Ok(CommentDecision::Allowed);
        }
        return Ok(CommentDecision::Denied(DenyReason::AuthorLimitReached));
    }

    let Some(parent_id) = parent_id else {
        if user_comment_count == 0 {
            return Ok(CommentDecision::Allowed);
        }
        return Ok(CommentDecision::Denied(DenyReason::AlreadyCommented));
    };

    if user_comment_count >= NON_AUTHOR_COMMENT_LIMIT {
        return Ok(CommentDecision::Denied(DenyReason::CommentLimitReached));
    }

    let Some(parent) = store.find_comment(parent_id).await? else {
        return Ok(CommentDecision::Denied(DenyReason::ParentNotFound));
    };

    if parent.user_id == post_author_id {
        return Ok(CommentDecision::Allowed);
    }

    // Depth is fixed at two: parent must hang directly off the caller's top-level comment.
    let own_top_level = store.top_level_comment(post_id, user_id).await?;
    if own_top_level.is_some() && parent.parent_id == own_top_level {
        return Ok(CommentDecision::Allowed);
    }

    Ok(CommentDecision::Denied(DenyReason::ReplyNotPermitted))
}

/// Only the author may edit a comment. Unknown comment ids are simply `false`.
pub async fn can_edit_comment<S: CommentStore + ?Sized>(
    store: &S,
    user_id: i64,
    comment_id: i64,
) -> Result<bool, AppError> {
    Ok(store
        .find_comment(comment_id)
        .await?
        .is_some_and(|c| c.user_id == user_id))
}

/// The comment's author or the post's author may delete it. Unknown comment ids are `false`.
pub async fn can_delete_comment<S: CommentStore + ?Sized>(
    store: &S,
    user_id: i64,
    comment_id: i64,
    post_author_id: i64,
) -> Result<bool, AppError> {
    Ok(store
        .find_comment(comment_id)
        .await?
        .is_some_and(|c| c.user_id == user_id || user_id == post_author_id))
}

#[async_trait]
impl CommentStore for PgPool {
    async fn count_user_comments(&self, post_id: i64, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND user_id = $2",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(self)
        .await?;

        Ok(count)
    }

    async fn find_comment(&self, comment_id: i64) -> Result<Option<CommentRef>, AppError> {
        let comment = sqlx::query_as::<_, CommentRef>(
            "SELECT id, user_id, parent_id FROM comments WHERE id = $1",
        )
        .bind(comment_id)
        .fetch_optional(self)
        .await?;

        Ok(comment)
    }

    async fn top_level_comment(
        &self,
        post_id: i64,
        user_id: i64,
    ) -> Result<Option<i64>, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM comments
            WHERE post_id = $1 AND user_id = $2 AND parent_id IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(self)
        .await?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const POST: i64 = 1;
    const AUTHOR: i64 = 100;
    const ALICE: i64 = 200;
    const BOB: i64 = 300;

    #[derive(Clone, Copy)]
    struct Row {
        id: i64,
        post_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
    }

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<Row>>,
    }

    impl MemoryStore {
        /// Appends a comment on `POST` and returns its id.
        fn add(&self, user_id: i64, parent_id: Option<i64>) -> i64 {
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as i64 + 1;
            rows.push(Row {
                id,
                post_id: POST,
                user_id,
                parent_id,
            });
            id
        }
    }

    #[async_trait]
    impl CommentStore for MemoryStore {
        async fn count_user_comments(&self, post_id: i64, user_id: i64) -> Result<i64, AppError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|r| r.post_id == post_id && r.user_id == user_id)
                .count() as i64)
        }

        async fn find_comment(&self, comment_id: i64) -> Result<Option<CommentRef>, AppError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().find(|r| r.id == comment_id).map(|r| CommentRef {
                id: r.id,
                user_id: r.user_id,
                parent_id: r.parent_id,
            }))
        }

        async fn top_level_comment(
            &self,
            post_id: i64,
            user_id: i64,
        ) -> Result<Option<i64>, AppError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .find(|r| r.post_id == post_id && r.user_id == user_id && r.parent_id.is_none())
                .map(|r| r.id))
        }
    }

    /// A store whose reads always fail.
    struct BrokenStore;

    #[async_trait]
    impl CommentStore for BrokenStore {
        async fn count_user_comments(&self, _: i64, _: i64) -> Result<i64, AppError> {
            Err(AppError::InternalServerError("connection lost".to_string()))
        }

        async fn find_comment(&self, _: i64) -> Result<Option<CommentRef>, AppError> {
            Err(AppError::InternalServerError("connection lost".to_string()))
        }

        async fn top_level_comment(&self, _: i64, _: i64) -> Result<Option<i64>, AppError> {
            Err(AppError::InternalServerError("connection lost".to_string()))
        }
    }

    #[tokio::test]
    async fn author_gets_ten_comments_then_denied() {
        let store = MemoryStore::default();
        for _ in 0..10 {
            let decision = can_comment(&store, AUTHOR, POST, AUTHOR, None).await.unwrap();
            assert!(decision.is_allowed());
            store.add(AUTHOR, None);
        }

        let top = can_comment(&store, AUTHOR, POST, AUTHOR, None).await.unwrap();
        assert_eq!(top, CommentDecision::Denied(DenyReason::AuthorLimitReached));

        let reply = can_comment(&store, AUTHOR, POST, AUTHOR, Some(1)).await.unwrap();
        assert_eq!(reply.reason(), Some("author comment limit reached"));
    }

    #[tokio::test]
    async fn author_reply_ignores_reply_graph() {
        let store = MemoryStore::default();
        let alice_top = store.add(ALICE, None);
        let bob_reply = store.add(BOB, Some(alice_top));

        let decision = can_comment(&store, AUTHOR, POST, AUTHOR, Some(bob_reply))
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn first_top_level_comment_allowed() {
        let store = MemoryStore::default();
        let decision = can_comment(&store, ALICE, POST, AUTHOR, None).await.unwrap();
        assert_eq!(decision, CommentDecision::Allowed);
        assert_eq!(decision.reason(), None);
    }

    #[tokio::test]
    async fn second_top_level_comment_denied() {
        let store = MemoryStore::default();
        store.add(ALICE, None);

        let decision = can_comment(&store, ALICE, POST, AUTHOR, None).await.unwrap();
        assert_eq!(decision, CommentDecision::Denied(DenyReason::AlreadyCommented));
        assert_eq!(decision.reason(), Some("already commented"));
    }

    #[tokio::test]
    async fn reply_to_post_author_allowed() {
        let store = MemoryStore::default();
        store.add(ALICE, None);
        let author_comment = store.add(AUTHOR, None);

        let decision = can_comment(&store, ALICE, POST, AUTHOR, Some(author_comment))
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn first_comment_may_be_a_reply_to_author() {
        let store = MemoryStore::default();
        let author_comment = store.add(AUTHOR, None);

        let decision = can_comment(&store, ALICE, POST, AUTHOR, Some(author_comment))
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn reply_to_whoever_replied_to_you_allowed() {
        let store = MemoryStore::default();
        let alice_top = store.add(ALICE, None);
        let bob_reply = store.add(BOB, Some(alice_top));

        let decision = can_comment(&store, ALICE, POST, AUTHOR, Some(bob_reply))
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn reply_to_unrelated_third_party_denied() {
        let store = MemoryStore::default();
        store.add(ALICE, None);
        let bob_top = store.add(BOB, None);

        let decision = can_comment(&store, ALICE, POST, AUTHOR, Some(bob_top))
            .await
            .unwrap();
        assert_eq!(decision, CommentDecision::Denied(DenyReason::ReplyNotPermitted));
        assert_eq!(
            decision.reason(),
            Some("can only reply to the post author or to whoever replied to you")
        );
    }

    #[tokio::test]
    async fn reply_without_own_top_level_cannot_use_reply_chain() {
        let store = MemoryStore::default();
        let bob_top = store.add(BOB, None);
        // A reply whose parent is Bob's top-level comment, not the caller's.
        let carol_reply = store.add(400, Some(bob_top));

        let decision = can_comment(&store, ALICE, POST, AUTHOR, Some(carol_reply))
            .await
            .unwrap();
        assert_eq!(decision, CommentDecision::Denied(DenyReason::ReplyNotPermitted));
    }

    #[tokio::test]
    async fn two_comments_exhaust_non_author_quota() {
        let store = MemoryStore::default();
        let alice_top = store.add(ALICE, None);
        let author_comment = store.add(AUTHOR, None);
        store.add(ALICE, Some(author_comment));
        let bob_reply = store.add(BOB, Some(alice_top));

        // Both targets would otherwise qualify.
        for target in [author_comment, bob_reply] {
            let decision = can_comment(&store, ALICE, POST, AUTHOR, Some(target))
                .await
                .unwrap();
            assert_eq!(decision, CommentDecision::Denied(DenyReason::CommentLimitReached));
        }

        let top = can_comment(&store, ALICE, POST, AUTHOR, None).await.unwrap();
        assert!(!top.is_allowed());
    }

    #[tokio::test]
    async fn reply_to_missing_parent_denied() {
        let store = MemoryStore::default();
        let decision = can_comment(&store, ALICE, POST, AUTHOR, Some(999)).await.unwrap();
        assert_eq!(decision, CommentDecision::Denied(DenyReason::ParentNotFound));
    }

    #[tokio::test]
    async fn concurrent_checks_at_boundary_both_pass() {
        // Documented race: the check does not reserve a slot.
        let store = MemoryStore::default();
        let (a, b) = tokio::join!(
            can_comment(&store, ALICE, POST, AUTHOR, None),
            can_comment(&store, ALICE, POST, AUTHOR, None),
        );
        assert!(a.unwrap().is_allowed());
        assert!(b.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn edit_only_by_comment_author() {
        let store = MemoryStore::default();
        let id = store.add(ALICE, None);

        assert!(can_edit_comment(&store, ALICE, id).await.unwrap());
        assert!(!can_edit_comment(&store, BOB, id).await.unwrap());
        // Post author has no edit rights over other people's comments.
        assert!(!can_edit_comment(&store, AUTHOR, id).await.unwrap());
        assert!(!can_edit_comment(&store, ALICE, 999).await.unwrap());
    }

    #[tokio::test]
    async fn delete_by_comment_author_or_post_author() {
        let store = MemoryStore::default();
        let id = store.add(ALICE, None);

        assert!(can_delete_comment(&store, ALICE, id, AUTHOR).await.unwrap());
        assert!(can_delete_comment(&store, AUTHOR, id, AUTHOR).await.unwrap());
        assert!(!can_delete_comment(&store, BOB, id, AUTHOR).await.unwrap());
        assert!(!can_delete_comment(&store, AUTHOR, 999, AUTHOR).await.unwrap());
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let err = can_comment(&BrokenStore, ALICE, POST, AUTHOR, None).await;
        assert!(matches!(err, Err(AppError::InternalServerError(_))));

        assert!(can_edit_comment(&BrokenStore, ALICE, 1).await.is_err());
        assert!(can_delete_comment(&BrokenStore, ALICE, 1, AUTHOR).await.is_err());
    }
}
