use sqlx::postgres::PgPoolOptions;

/// Drops and recreates the schema, then seeds the fixed player roster.
#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL env var not set");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    for table in ["match_participants", "matches", "weekly_top3", "players"] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&pool)
            .await
            .expect("Failed to drop table");
    }

    sqlx::query(
        "CREATE TABLE players (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            avatar TEXT NOT NULL DEFAULT '',
            total_rating DOUBLE PRECISION NOT NULL DEFAULT 0,
            total_matches INTEGER NOT NULL DEFAULT 0,
            average_rating DOUBLE PRECISION NOT NULL DEFAULT 0,
            total_kills INTEGER NOT NULL DEFAULT 0,
            total_deaths INTEGER NOT NULL DEFAULT 0,
            total_assists INTEGER NOT NULL DEFAULT 0,
            average_kills DOUBLE PRECISION NOT NULL DEFAULT 0,
            average_deaths DOUBLE PRECISION NOT NULL DEFAULT 0,
            average_assists DOUBLE PRECISION NOT NULL DEFAULT 0,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&pool)
    .await
    .expect("Failed to create players table");

    sqlx::query(
        "CREATE TABLE matches (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            match_date TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&pool)
    .await
    .expect("Failed to create matches table");

    sqlx::query(
        "CREATE TABLE match_participants (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            match_id UUID NOT NULL REFERENCES matches(id),
            player_id UUID NOT NULL REFERENCES players(id),
            rating DOUBLE PRECISION NOT NULL,
            kills INTEGER NOT NULL,
            deaths INTEGER NOT NULL,
            assists INTEGER NOT NULL,
            lane TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&pool)
    .await
    .expect("Failed to create match_participants table");

    sqlx::query(
        "CREATE TABLE weekly_top3 (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            week_start_date DATE NOT NULL UNIQUE,
            week_end_date DATE NOT NULL,
            top1_player_id UUID NOT NULL,
            top1_player_name TEXT NOT NULL,
            top1_player_avatar TEXT NOT NULL,
            top1_score DOUBLE PRECISION NOT NULL,
            top2_player_id UUID NOT NULL,
            top2_player_name TEXT NOT NULL,
            top2_player_avatar TEXT NOT NULL,
            top2_score DOUBLE PRECISION NOT NULL,
            top3_player_id UUID NOT NULL,
            top3_player_name TEXT NOT NULL,
            top3_player_avatar TEXT NOT NULL,
            top3_score DOUBLE PRECISION NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&pool)
    .await
    .expect("Failed to create weekly_top3 table");

    for name in ["Rafa", "Pedro", "Lucas", "Thiago", "Dudu"] {
        let avatar = format!(
            "https://api.dicebear.com/7.x/adventurer/svg?seed={}",
            name.to_lowercase()
        );
        sqlx::query("INSERT INTO players (name, avatar) VALUES ($1, $2)")
            .bind(name)
            .bind(avatar)
            .execute(&pool)
            .await
            .expect("Failed to seed player");
    }

    println!("Database schema created and roster seeded");
}
