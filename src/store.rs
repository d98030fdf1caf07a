use crate::{
    chat::{
        AuthoredMessage, Conversation, ConversationId, ConversationQuery, ConversationStatus,
        Message, NewConversation, NewMessage,
    },
    entity::{Actor, ActorId, Role},
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite, SqlitePool,
};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str = r#"
    c.id, c.user_id, c.target_role, c.title, c.description, c.lat, c.lng,
    c.image_url, c.status, c.created_at, p.full_name AS requester_name
"#;

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new Store instance.
    /// This will automatically create the database file if it doesn't exist.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let db_url = format!("sqlite://{}", db_path.to_string_lossy());
        let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Ok(Self { pool })
    }

    /// A private in-memory database. One connection, kept open, so every
    /// query sees the same data.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        Ok(Self { pool })
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS murojaatlar (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                target_role TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                lat REAL NOT NULL,
                lng REAL NOT NULL,
                image_url TEXT,
                status TEXT NOT NULL,
                created_at DATETIME NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_murojaatlar_user ON murojaatlar(user_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_murojaatlar_role ON murojaatlar(target_role, created_at DESC);

            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                murojaat_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at DATETIME NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_murojaat ON messages(murojaat_id, created_at, seq);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    /// Persist a message, stamping it with a fresh id and the current time.
    pub async fn insert_message(&self, msg: &NewMessage) -> Result<Message> {
        self.insert_message_at(msg, Utc::now()).await
    }

    pub(crate) async fn insert_message_at(
        &self,
        msg: &NewMessage,
        created_at: DateTime<Utc>,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: msg.conversation_id.clone(),
            sender_id: msg.sender_id.clone(),
            text: msg.text.clone(),
            created_at,
        };

        sqlx::query(
            r#"
            INSERT INTO messages (id, murojaat_id, sender_id, text, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(message.conversation_id.as_str())
        .bind(message.sender_id.as_str())
        .bind(&message.text)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to save message")?;

        Ok(message)
    }

    /// Full history of a conversation, oldest first. Messages sharing a
    /// timestamp keep insertion order.
    pub async fn messages_for(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT id, murojaat_id, sender_id, text, created_at
            FROM messages
            WHERE murojaat_id = ?
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(conversation_id.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch chat history")?;

        rows.iter().map(message_from_row).collect()
    }

    /// Like [`Store::messages_for`], joined with author profiles.
    pub async fn authored_messages_for(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<AuthoredMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.murojaat_id, m.sender_id, m.text, m.created_at,
                   p.full_name AS author_name, p.role AS author_role
            FROM messages m
            LEFT JOIN profiles p ON p.id = m.sender_id
            WHERE m.murojaat_id = ?
            ORDER BY m.created_at ASC, m.seq ASC
            "#,
        )
        .bind(conversation_id.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch chat history with authors")?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let author_role: Option<String> = row.try_get("author_role")?;
            messages.push(AuthoredMessage {
                message: message_from_row(row)?,
                author_name: row.try_get("author_name")?,
                author_role: author_role.map(|r| r.parse::<Role>()).transpose()?,
            });
        }

        Ok(messages)
    }

    /// Number of messages in a conversation written by someone other than
    /// `actor_id`.
    pub async fn count_messages_not_from(
        &self,
        conversation_id: &ConversationId,
        actor_id: &ActorId,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE murojaat_id = ? AND sender_id != ?",
        )
        .bind(conversation_id.as_str())
        .bind(actor_id.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to count messages")?;

        Ok(count)
    }

    pub async fn insert_conversation(&self, new: &NewConversation) -> Result<Conversation> {
        let id = ConversationId::new(Uuid::new_v4().to_string());
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO murojaatlar
                (id, user_id, target_role, title, description, lat, lng, image_url, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.as_str())
        .bind(new.requester_id.as_str())
        .bind(new.target_role.as_str())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.lat)
        .bind(new.lng)
        .bind(&new.image_url)
        .bind(ConversationStatus::Pending.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("Failed to save request")?;

        self.get_conversation(&id)
            .await?
            .context("Saved request could not be read back")
    }

    pub async fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let sql = format!(
            "SELECT {} FROM murojaatlar c LEFT JOIN profiles p ON p.id = c.user_id WHERE c.id = ?",
            CONVERSATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch request")?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    /// Requests matching `query`, newest first.
    pub async fn list_conversations(&self, query: &ConversationQuery) -> Result<Vec<Conversation>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM murojaatlar c LEFT JOIN profiles p ON p.id = c.user_id WHERE 1 = 1",
            CONVERSATION_COLUMNS
        ));

        if let Some(requester) = &query.requester_id {
            builder.push(" AND c.user_id = ").push_bind(requester.0.clone());
        }
        if let Some(role) = query.target_role {
            builder.push(" AND c.target_role = ").push_bind(role.as_str());
        }
        if let Some(status) = query.status {
            builder.push(" AND c.status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY c.created_at DESC, c.rowid DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list requests")?;

        rows.iter().map(conversation_from_row).collect()
    }

    /// Returns false when no request has this id.
    pub async fn update_status(
        &self,
        id: &ConversationId,
        status: ConversationStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE murojaatlar SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to update request status")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_profile(&self, id: &ActorId) -> Result<Option<Actor>> {
        let row = sqlx::query("SELECT id, full_name, phone, role FROM profiles WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch profile")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = row.try_get("role")?;
        Ok(Some(Actor {
            id: ActorId::new(row.try_get::<String, _>("id")?),
            full_name: row.try_get("full_name")?,
            phone: row.try_get("phone")?,
            role: role.parse()?,
        }))
    }

    /// Save or update a profile.
    pub async fn save_profile(&self, actor: &Actor) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name, phone, role)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                phone = excluded.phone,
                role = excluded.role
            "#,
        )
        .bind(actor.id.as_str())
        .bind(&actor.full_name)
        .bind(&actor.phone)
        .bind(actor.role.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to save profile")?;

        Ok(())
    }
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: ConversationId::new(row.try_get::<String, _>("murojaat_id")?),
        sender_id: ActorId::new(row.try_get::<String, _>("sender_id")?),
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
    })
}

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation> {
    let target_role: String = row.try_get("target_role")?;
    let status: String = row.try_get("status")?;

    Ok(Conversation {
        id: ConversationId::new(row.try_get::<String, _>("id")?),
        requester_id: ActorId::new(row.try_get::<String, _>("user_id")?),
        requester_name: row.try_get("requester_name")?,
        target_role: target_role.parse()?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        lat: row.try_get("lat")?,
        lng: row.try_get("lng")?,
        image_url: row.try_get("image_url")?,
        status: status.parse().map_err(anyhow::Error::msg)?,
        created_at: row.try_get("created_at")?,
    })
}
