use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use crate::models::{DailyGrid, FavoriteItem, FilterMode, HistoryItem, HistoryKind, WinningDraw};

/// Nombre maximal d'entrées conservées dans l'historique.
pub const HISTORY_CAP: u32 = 100;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS daily_grids (
    date        TEXT PRIMARY KEY,
    n1          INTEGER NOT NULL,
    n2          INTEGER NOT NULL,
    n3          INTEGER NOT NULL,
    n4          INTEGER NOT NULL,
    n5          INTEGER NOT NULL,
    n6          INTEGER NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS favorites (
    id          TEXT PRIMARY KEY,
    n1          INTEGER NOT NULL,
    n2          INTEGER NOT NULL,
    n3          INTEGER NOT NULL,
    n4          INTEGER NOT NULL,
    n5          INTEGER NOT NULL,
    n6          INTEGER NOT NULL,
    memo        TEXT,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    n1          INTEGER NOT NULL,
    n2          INTEGER NOT NULL,
    n3          INTEGER NOT NULL,
    n4          INTEGER NOT NULL,
    n5          INTEGER NOT NULL,
    n6          INTEGER NOT NULL,
    date        TEXT NOT NULL,
    kind        TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS filters (
    number      INTEGER PRIMARY KEY,
    mode        TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS winning_draws (
    round         INTEGER PRIMARY KEY,
    date          TEXT NOT NULL,
    n1            INTEGER NOT NULL,
    n2            INTEGER NOT NULL,
    n3            INTEGER NOT NULL,
    n4            INTEGER NOT NULL,
    n5            INTEGER NOT NULL,
    n6            INTEGER NOT NULL,
    bonus         INTEGER NOT NULL,
    total_sales   INTEGER NOT NULL DEFAULT 0,
    first_prize   INTEGER NOT NULL DEFAULT 0,
    first_winners INTEGER NOT NULL DEFAULT 0,
    cached_at     INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS cache_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const LATEST_ROUND_KEY: &str = "latest_round";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("lotto645.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Grille du jour

pub fn upsert_daily_grid(conn: &Connection, grid: &DailyGrid) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO daily_grids (date, n1, n2, n3, n4, n5, n6, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            grid.date,
            grid.numbers[0],
            grid.numbers[1],
            grid.numbers[2],
            grid.numbers[3],
            grid.numbers[4],
            grid.numbers[5],
            grid.created_at,
        ],
    )
    .context("Échec de l'enregistrement de la grille du jour")?;
    Ok(())
}

pub fn fetch_daily_grid(conn: &Connection, date: &str) -> Result<Option<DailyGrid>> {
    let grid = conn
        .query_row(
            "SELECT date, n1, n2, n3, n4, n5, n6, created_at FROM daily_grids WHERE date = ?1",
            [date],
            |row| {
                Ok(DailyGrid {
                    date: row.get(0)?,
                    numbers: [
                        row.get::<_, u8>(1)?,
                        row.get::<_, u8>(2)?,
                        row.get::<_, u8>(3)?,
                        row.get::<_, u8>(4)?,
                        row.get::<_, u8>(5)?,
                        row.get::<_, u8>(6)?,
                    ],
                    created_at: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(grid)
}

// ---------------------------------------------------------------------------
// Favoris

pub fn insert_favorite(
    conn: &Connection,
    numbers: &[u8; 6],
    memo: Option<&str>,
) -> Result<FavoriteItem> {
    let item = FavoriteItem {
        id: Uuid::new_v4().to_string(),
        numbers: *numbers,
        memo: memo.map(|m| m.to_string()),
        created_at: Utc::now().to_rfc3339(),
    };
    conn.execute(
        "INSERT INTO favorites (id, n1, n2, n3, n4, n5, n6, memo, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            item.id,
            item.numbers[0],
            item.numbers[1],
            item.numbers[2],
            item.numbers[3],
            item.numbers[4],
            item.numbers[5],
            item.memo,
            item.created_at,
        ],
    )
    .context("Échec de l'ajout du favori")?;
    Ok(item)
}

/// Favoris du plus récent au plus ancien.
pub fn fetch_favorites(conn: &Connection) -> Result<Vec<FavoriteItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, n1, n2, n3, n4, n5, n6, memo, created_at
         FROM favorites ORDER BY created_at DESC, rowid DESC",
    )?;
    let items = stmt
        .query_map([], |row| {
            Ok(FavoriteItem {
                id: row.get(0)?,
                numbers: [
                    row.get::<_, u8>(1)?,
                    row.get::<_, u8>(2)?,
                    row.get::<_, u8>(3)?,
                    row.get::<_, u8>(4)?,
                    row.get::<_, u8>(5)?,
                    row.get::<_, u8>(6)?,
                ],
                memo: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn remove_favorite(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn
        .execute("DELETE FROM favorites WHERE id = ?1", [id])
        .context("Échec de la suppression du favori")?;
    Ok(changed > 0)
}

/// Identifiant du favori portant exactement ces numéros (triés), s'il existe.
pub fn find_favorite_by_numbers(conn: &Connection, numbers: &[u8; 6]) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM favorites
             WHERE n1 = ?1 AND n2 = ?2 AND n3 = ?3 AND n4 = ?4 AND n5 = ?5 AND n6 = ?6",
            rusqlite::params![
                numbers[0],
                numbers[1],
                numbers[2],
                numbers[3],
                numbers[4],
                numbers[5],
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Historique

/// Ajoute une entrée et tronque l'historique aux HISTORY_CAP plus récentes.
pub fn append_history(conn: &Connection, numbers: &[u8; 6], kind: HistoryKind) -> Result<()> {
    conn.execute(
        "INSERT INTO history (n1, n2, n3, n4, n5, n6, date, kind)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            numbers[0],
            numbers[1],
            numbers[2],
            numbers[3],
            numbers[4],
            numbers[5],
            Utc::now().to_rfc3339(),
            kind.as_str(),
        ],
    )
    .context("Échec de l'ajout à l'historique")?;
    conn.execute(
        "DELETE FROM history WHERE id NOT IN (SELECT id FROM history ORDER BY id DESC LIMIT ?1)",
        [HISTORY_CAP],
    )
    .context("Échec de la troncature de l'historique")?;
    Ok(())
}

pub fn fetch_history(conn: &Connection, limit: u32) -> Result<Vec<HistoryItem>> {
    let mut stmt = conn.prepare(
        "SELECT n1, n2, n3, n4, n5, n6, date, kind
         FROM history ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok((
                [
                    row.get::<_, u8>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, u8>(2)?,
                    row.get::<_, u8>(3)?,
                    row.get::<_, u8>(4)?,
                    row.get::<_, u8>(5)?,
                ],
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut items = Vec::with_capacity(rows.len());
    for (numbers, date, kind) in rows {
        items.push(HistoryItem {
            numbers,
            date,
            kind: HistoryKind::parse(&kind)?,
        });
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// Filtres de génération

pub fn fetch_filters(conn: &Connection, mode: FilterMode) -> Result<Vec<u8>> {
    let mut stmt =
        conn.prepare("SELECT number FROM filters WHERE mode = ?1 ORDER BY number")?;
    let numbers = stmt
        .query_map([mode.as_str()], |row| row.get::<_, u8>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(numbers)
}

/// Remplace l'ensemble des numéros d'un mode.
pub fn replace_filters(conn: &Connection, mode: FilterMode, numbers: &[u8]) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;
    tx.execute("DELETE FROM filters WHERE mode = ?1", [mode.as_str()])?;
    for &n in numbers {
        tx.execute(
            "INSERT OR REPLACE INTO filters (number, mode) VALUES (?1, ?2)",
            rusqlite::params![n, mode.as_str()],
        )?;
    }
    tx.commit().context("Échec du commit")?;
    Ok(())
}

pub fn clear_filters(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM filters", [])
        .context("Échec de la réinitialisation des filtres")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Cache des tirages officiels

pub fn upsert_winning_draw(conn: &Connection, draw: &WinningDraw, cached_at: i64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO winning_draws
         (round, date, n1, n2, n3, n4, n5, n6, bonus, total_sales, first_prize, first_winners, cached_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            draw.round,
            draw.date,
            draw.numbers[0],
            draw.numbers[1],
            draw.numbers[2],
            draw.numbers[3],
            draw.numbers[4],
            draw.numbers[5],
            draw.bonus,
            draw.total_sales,
            draw.first_prize,
            draw.first_winners,
            cached_at,
        ],
    )
    .context("Échec de la mise en cache du tirage")?;
    Ok(())
}

/// Tirage en cache avec son horodatage de mise en cache (secondes Unix).
pub fn fetch_winning_draw(conn: &Connection, round: u32) -> Result<Option<(WinningDraw, i64)>> {
    let row = conn
        .query_row(
            "SELECT round, date, n1, n2, n3, n4, n5, n6, bonus, total_sales, first_prize, first_winners, cached_at
             FROM winning_draws WHERE round = ?1",
            [round],
            |row| {
                Ok((
                    WinningDraw {
                        round: row.get(0)?,
                        date: row.get(1)?,
                        numbers: [
                            row.get::<_, u8>(2)?,
                            row.get::<_, u8>(3)?,
                            row.get::<_, u8>(4)?,
                            row.get::<_, u8>(5)?,
                            row.get::<_, u8>(6)?,
                            row.get::<_, u8>(7)?,
                        ],
                        bonus: row.get(8)?,
                        total_sales: row.get(9)?,
                        first_prize: row.get(10)?,
                        first_winners: row.get(11)?,
                    },
                    row.get::<_, i64>(12)?,
                ))
            },
        )
        .optional()?;
    Ok(row)
}

pub fn set_latest_round(conn: &Connection, round: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?1, ?2)",
        rusqlite::params![LATEST_ROUND_KEY, round.to_string()],
    )
    .context("Échec de l'enregistrement du dernier tirage connu")?;
    Ok(())
}

pub fn fetch_latest_round(conn: &Connection) -> Result<Option<u32>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM cache_meta WHERE key = ?1",
            [LATEST_ROUND_KEY],
            |row| row.get(0),
        )
        .optional()?;
    match value {
        Some(v) => {
            let round = v
                .parse::<u32>()
                .with_context(|| format!("Numéro de tirage invalide en cache : '{}'", v))?;
            Ok(Some(round))
        }
        None => Ok(None),
    }
}

pub fn count_winning_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM winning_draws", [], |row| row.get(0))?;
    Ok(count)
}

/// Les N tirages en cache les plus récents, par numéro de tirage décroissant.
pub fn fetch_recent_winning_draws(conn: &Connection, limit: u32) -> Result<Vec<WinningDraw>> {
    let mut stmt = conn.prepare(
        "SELECT round, date, n1, n2, n3, n4, n5, n6, bonus, total_sales, first_prize, first_winners
         FROM winning_draws ORDER BY round DESC LIMIT ?1",
    )?;
    let draws = stmt
        .query_map([limit], |row| {
            Ok(WinningDraw {
                round: row.get(0)?,
                date: row.get(1)?,
                numbers: [
                    row.get::<_, u8>(2)?,
                    row.get::<_, u8>(3)?,
                    row.get::<_, u8>(4)?,
                    row.get::<_, u8>(5)?,
                    row.get::<_, u8>(6)?,
                    row.get::<_, u8>(7)?,
                ],
                bonus: row.get(8)?,
                total_sales: row.get(9)?,
                first_prize: row.get(10)?,
                first_winners: row.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(draws)
}
