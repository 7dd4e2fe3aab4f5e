//! Delivery targets for notifications

use async_trait::async_trait;
use sqlx::PgPool;

use super::{Notification, NotificationError};

/// Where the worker sends notifications
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Writes notifications into the `notifications` table
#[derive(Debug, Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, message, priority, created_at)
            VALUES ($1, $2, $3, $4, 'normal', $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
