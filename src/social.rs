//! Friend requests and the friends relationship derived from them.

use crate::db::{Database, Friend, FriendRequest, FriendStatus, User};
use crate::error::{AppError, Result};

/// Social graph service.
#[derive(Debug, Clone)]
pub struct SocialService {
    db: Database,
}

impl SocialService {
    /// Create a new social service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Send a request from `sender` to user `receiver_id`.
    pub fn send(&self, sender: &User, receiver_id: i64) -> Result<FriendRequest> {
        if sender.id == receiver_id {
            return Err(AppError::Validation(
                "You cannot send a friend request to yourself".to_string(),
            ));
        }

        let receiver = self
            .db
            .get_user_by_id(receiver_id)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let request = self.db.create_friend_request(sender, &receiver)?;
        tracing::debug!(from = sender.id, to = receiver.id, "Friend request sent");
        Ok(request)
    }

    /// Accept the pending request between `actor` and `other_id`.
    pub fn accept(&self, actor: &User, other_id: i64) -> Result<FriendRequest> {
        let mut request = self
            .db
            .get_pending_between(actor.id, other_id)?
            .ok_or_else(|| AppError::NotFound("Friend request not found".to_string()))?;

        if request.receiver_id != actor.id {
            return Err(AppError::Auth(
                "Only the receiver can accept a friend request".to_string(),
            ));
        }

        self.db.accept_friend_request(request.id)?;
        request.status = FriendStatus::Accepted;
        tracing::debug!(id = request.id, "Friend request accepted");
        Ok(request)
    }

    /// Drop the pending request `sender_id` sent to `actor`.
    pub fn reject(&self, actor: &User, sender_id: i64) -> Result<()> {
        if !self.db.delete_pending_request(sender_id, actor.id)? {
            return Err(AppError::NotFound("Friend request not found".to_string()));
        }
        Ok(())
    }

    /// Cancel a request or end a friendship with `other_id`.
    pub fn delete(&self, actor: &User, other_id: i64) -> Result<()> {
        if !self.db.delete_requests_between(actor.id, other_id)? {
            return Err(AppError::NotFound("Friend request not found".to_string()));
        }
        Ok(())
    }

    /// Senders of pending requests addressed to `user_id`.
    pub fn incoming(&self, user_id: i64) -> Result<Vec<Friend>> {
        Ok(self
            .db
            .list_incoming_pending(user_id)?
            .iter()
            .map(|req| req.other_party(user_id))
            .collect())
    }

    /// Accepted friends of `user_id`.
    pub fn friends(&self, user_id: i64) -> Result<Vec<Friend>> {
        Ok(self
            .db
            .list_accepted(user_id)?
            .iter()
            .map(|req| req.other_party(user_id))
            .collect())
    }

    /// Every stored request.
    pub fn list_all(&self) -> Result<Vec<FriendRequest>> {
        self.db.list_friend_requests()
    }
}
