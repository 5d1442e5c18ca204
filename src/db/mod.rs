pub mod models;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/mindcare".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

/// Masks credentials before the URL is logged.
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<Arc<PgPool>, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!("Initializing database connection pool...");
    tracing::debug!(url = %redact_url(&config.url), "Database URL");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    Ok(Arc::new(pool))
}

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id UUID PRIMARY KEY,
        nickname TEXT NOT NULL,
        age_range TEXT NOT NULL,
        primary_concerns TEXT[] NOT NULL DEFAULT '{}',
        preferred_therapist_gender TEXT,
        preferred_language TEXT NOT NULL DEFAULT 'Swahili',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS mood_entries (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL,
        mood_value INTEGER NOT NULL CHECK (mood_value BETWEEN 1 AND 10),
        note TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_mood_entries_user_created ON mood_entries(user_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS journal_entries (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL,
        audio_url TEXT,
        transcript TEXT,
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_journal_entries_user_created ON journal_entries(user_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS therapists (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID UNIQUE NOT NULL,
        name TEXT NOT NULL,
        title TEXT NOT NULL,
        specialties TEXT[] NOT NULL DEFAULT '{}',
        languages TEXT[] NOT NULL DEFAULT '{}',
        location TEXT NOT NULL,
        bio TEXT,
        education TEXT,
        price TEXT,
        online BOOLEAN NOT NULL DEFAULT true,
        in_person BOOLEAN NOT NULL DEFAULT true,
        rating DOUBLE PRECISION NOT NULL DEFAULT 0,
        reviews INTEGER NOT NULL DEFAULT 0,
        image_url TEXT,
        approved BOOLEAN NOT NULL DEFAULT false,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_therapists_approved ON therapists(approved)",
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL,
        therapist_id UUID NOT NULL REFERENCES therapists(id) ON DELETE CASCADE,
        appointment_date TIMESTAMPTZ NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'confirmed', 'cancelled', 'completed')),
        type TEXT NOT NULL CHECK (type IN ('online', 'in_person')),
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_appointments_user ON appointments(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_therapist ON appointments(therapist_id)",
    r#"
    CREATE TABLE IF NOT EXISTS user_points (
        user_id UUID PRIMARY KEY,
        total_points BIGINT NOT NULL DEFAULT 0,
        level BIGINT NOT NULL DEFAULT 1,
        streak_days INTEGER NOT NULL DEFAULT 0,
        last_activity_date DATE,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS point_activities (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL,
        action TEXT NOT NULL,
        points BIGINT NOT NULL,
        description TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_point_activities_user_action ON point_activities(user_id, action)",
    r#"
    CREATE TABLE IF NOT EXISTS user_achievements (
        user_id UUID NOT NULL,
        achievement_id TEXT NOT NULL,
        achieved_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (user_id, achievement_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS flagged_messages (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        message_id TEXT NOT NULL,
        reporter_id UUID NOT NULL,
        author_id UUID,
        reporter_name TEXT NOT NULL,
        content TEXT NOT NULL,
        reason TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'reviewed', 'dismissed')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        reviewed_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_flagged_messages_created ON flagged_messages(created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS user_violations (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID,
        flagged_message_id UUID NOT NULL REFERENCES flagged_messages(id) ON DELETE CASCADE,
        rule_id INTEGER NOT NULL,
        severity INTEGER NOT NULL CHECK (severity BETWEEN 1 AND 3),
        action TEXT NOT NULL CHECK (action IN ('warning', 'suspension', 'ban')),
        reason TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_violations_user ON user_violations(user_id)",
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    for statement in MIGRATIONS {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!(
        statements = MIGRATIONS.len(),
        "Database migrations completed successfully"
    );

    Ok(())
}
