//! PostgreSQL-backed chat store

use async_trait::async_trait;
use livechat_shared::{Chat, ChatStatus, Message, NewMessage, OwnerIdentity};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{ChatStore, NewUser, StoreError, StoreResult, UserRecord};

/// Chat columns plus the owner's username when the owner is a registered user
const CHAT_SELECT: &str = r#"
    SELECT c.id, c.owner_kind, c.owner_key, u.username AS owner_name,
           c.status, c.created_at, c.updated_at
    FROM chats c
    LEFT JOIN users u ON c.owner_kind = 'user' AND u.id::text = c.owner_key
"#;

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: Uuid,
    owner_kind: String,
    owner_key: String,
    owner_name: Option<String>,
    status: ChatStatus,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<ChatRow> for Chat {
    type Error = StoreError;

    fn try_from(row: ChatRow) -> Result<Self, Self::Error> {
        let owner = OwnerIdentity::from_parts(&row.owner_kind, &row.owner_key)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Chat {
            id: row.id,
            owner,
            owner_name: row.owner_name,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    chat_id: Uuid,
    sender: livechat_shared::Sender,
    author_id: Option<Uuid>,
    display_name: String,
    content: String,
    created_at: OffsetDateTime,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            chat_id: row.chat_id,
            sender: row.sender,
            author_id: row.author_id,
            display_name: row.display_name,
            content: row.content,
            timestamp: row.created_at,
        }
    }
}

/// Chat store backed by a Postgres pool
#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn find_active_chat(&self, owner: &OwnerIdentity) -> StoreResult<Option<Chat>> {
        let sql = format!(
            "{} WHERE c.owner_kind = $1 AND c.owner_key = $2 AND c.status = 'active'",
            CHAT_SELECT
        );

        let row = sqlx::query_as::<_, ChatRow>(&sql)
            .bind(owner.kind())
            .bind(owner.key())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Chat::try_from).transpose()
    }

    async fn find_chat(&self, chat_id: Uuid) -> StoreResult<Option<Chat>> {
        let sql = format!("{} WHERE c.id = $1", CHAT_SELECT);

        let row = sqlx::query_as::<_, ChatRow>(&sql)
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Chat::try_from).transpose()
    }

    async fn insert_chat(&self, owner: &OwnerIdentity) -> StoreResult<Chat> {
        // The partial unique index on active chats rejects a second insert
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            WITH inserted AS (
                INSERT INTO chats (id, owner_kind, owner_key, status)
                VALUES ($1, $2, $3, 'active')
                RETURNING id, owner_kind, owner_key, status, created_at, updated_at
            )
            SELECT i.id, i.owner_kind, i.owner_key, u.username AS owner_name,
                   i.status, i.created_at, i.updated_at
            FROM inserted i
            LEFT JOIN users u ON i.owner_kind = 'user' AND u.id::text = i.owner_key
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner.kind())
        .bind(owner.key())
        .fetch_one(&self.pool)
        .await?;

        Chat::try_from(row)
    }

    async fn list_chats(&self, owner: Option<&OwnerIdentity>) -> StoreResult<Vec<Chat>> {
        let rows = match owner {
            Some(owner) => {
                let sql = format!(
                    "{} WHERE c.owner_kind = $1 AND c.owner_key = $2 ORDER BY c.updated_at DESC",
                    CHAT_SELECT
                );
                sqlx::query_as::<_, ChatRow>(&sql)
                    .bind(owner.kind())
                    .bind(owner.key())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{} ORDER BY c.updated_at DESC", CHAT_SELECT);
                sqlx::query_as::<_, ChatRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Chat::try_from).collect()
    }

    async fn close_chat(&self, chat_id: Uuid) -> StoreResult<Chat> {
        let result = sqlx::query(
            r#"
            UPDATE chats
            SET status = 'closed', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(chat_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(chat_id = %chat_id, "Chat missing or already closed");
        }

        self.find_chat(chat_id).await?.ok_or(StoreError::NotFound)
    }

    async fn append_message(&self, message: NewMessage) -> StoreResult<Message> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query("UPDATE chats SET updated_at = NOW() WHERE id = $1")
            .bind(message.chat_id)
            .execute(&mut *tx)
            .await?;

        if bumped.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, chat_id, sender, author_id, display_name, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, chat_id, sender, author_id, display_name, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message.chat_id)
        .bind(message.sender)
        .bind(message.author_id)
        .bind(&message.display_name)
        .bind(&message.content)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_id, sender, author_id, display_name, content, created_at
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, password_hash, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, password_hash, role, created_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
