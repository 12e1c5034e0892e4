use std::collections::HashSet;

use anyhow::{bail, Result};
use chrono::{Local, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lotto645_db::db;
use lotto645_db::models::{DailyGrid, FilterMode, HistoryKind, GRID_LEN, POOL_SIZE};
use lotto645_db::rusqlite::Connection;

pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Date locale du jour, format YYYY-MM-DD.
pub fn today_string() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Tire 6 numéros distincts dans 1-45, triés par ordre croissant.
/// Les numéros exclus sortent du pool, les numéros imposés sont toujours
/// repris. Si 6 numéros ou plus sont imposés, les 6 premiers font la grille.
pub fn generate_grid(excluded: &[u8], included: &[u8], rng: &mut StdRng) -> Result<[u8; 6]> {
    let excluded_set: HashSet<u8> = excluded.iter().copied().collect();
    let valid_included: Vec<u8> = included
        .iter()
        .copied()
        .filter(|n| !excluded_set.contains(n) && (1..=POOL_SIZE).contains(n))
        .collect();

    if valid_included.len() >= GRID_LEN {
        let mut grid = [0u8; 6];
        grid.copy_from_slice(&valid_included[..GRID_LEN]);
        grid.sort();
        return Ok(grid);
    }

    let mut numbers = valid_included;
    let mut pool: Vec<u8> = (1..=POOL_SIZE)
        .filter(|n| !excluded_set.contains(n) && !numbers.contains(n))
        .collect();

    while numbers.len() < GRID_LEN && !pool.is_empty() {
        let idx = rng.random_range(0..pool.len());
        numbers.push(pool.swap_remove(idx));
    }

    if numbers.len() < GRID_LEN {
        bail!("Pool insuffisant : trop de numéros exclus pour former une grille");
    }

    let mut grid = [0u8; 6];
    grid.copy_from_slice(&numbers);
    grid.sort();
    Ok(grid)
}

/// Grille du jour. Une grille déjà tirée pour la date locale est rendue telle
/// quelle ; sinon une nouvelle est générée avec les filtres enregistrés.
/// `fresh` indique qu'elle vient d'être tirée.
pub struct TodayGrid {
    pub grid: DailyGrid,
    pub fresh: bool,
}

pub fn today_grid(conn: &Connection, rng: &mut StdRng) -> Result<TodayGrid> {
    let date = today_string();
    if let Some(grid) = db::fetch_daily_grid(conn, &date)? {
        return Ok(TodayGrid { grid, fresh: false });
    }
    let grid = draw_and_store(conn, &date, rng, HistoryKind::Daily)?;
    Ok(TodayGrid { grid, fresh: true })
}

/// Regénère la grille du jour, écrase l'ancienne et journalise la relance.
pub fn refresh_today(conn: &Connection, rng: &mut StdRng) -> Result<TodayGrid> {
    let date = today_string();
    let grid = draw_and_store(conn, &date, rng, HistoryKind::Refresh)?;
    Ok(TodayGrid { grid, fresh: true })
}

fn draw_and_store(
    conn: &Connection,
    date: &str,
    rng: &mut StdRng,
    kind: HistoryKind,
) -> Result<DailyGrid> {
    let excluded = db::fetch_filters(conn, FilterMode::Exclude)?;
    let included = db::fetch_filters(conn, FilterMode::Include)?;
    let numbers = generate_grid(&excluded, &included, rng)?;

    let grid = DailyGrid {
        date: date.to_string(),
        numbers,
        created_at: Utc::now().to_rfc3339(),
    };
    db::upsert_daily_grid(conn, &grid)?;
    db::append_history(conn, &numbers, kind)?;
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotto645_db::db::migrate;
    use lotto645_db::models::validate_grid;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_generate_grid_valid_and_sorted() {
        let mut rng = make_rng(Some(42));
        for _ in 0..50 {
            let grid = generate_grid(&[], &[], &mut rng).unwrap();
            assert!(validate_grid(&grid).is_ok());
            let mut sorted = grid;
            sorted.sort();
            assert_eq!(grid, sorted);
        }
    }

    #[test]
    fn test_generate_grid_seed_reproducible() {
        let a = generate_grid(&[], &[], &mut make_rng(Some(7))).unwrap();
        let b = generate_grid(&[], &[], &mut make_rng(Some(7))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_grid_respects_exclusions() {
        let excluded: Vec<u8> = (10..=45).collect();
        let mut rng = make_rng(Some(1));
        for _ in 0..20 {
            let grid = generate_grid(&excluded, &[], &mut rng).unwrap();
            assert!(grid.iter().all(|n| *n < 10));
        }
    }

    #[test]
    fn test_generate_grid_forces_inclusions() {
        let mut rng = make_rng(Some(1));
        for _ in 0..20 {
            let grid = generate_grid(&[], &[13, 27], &mut rng).unwrap();
            assert!(grid.contains(&13));
            assert!(grid.contains(&27));
        }
    }

    #[test]
    fn test_generate_grid_six_inclusions_make_the_grid() {
        let mut rng = make_rng(Some(1));
        let grid = generate_grid(&[], &[45, 1, 30, 2, 20, 10], &mut rng).unwrap();
        assert_eq!(grid, [1, 2, 10, 20, 30, 45]);
    }

    #[test]
    fn test_generate_grid_excluded_inclusion_dropped() {
        // Un numéro à la fois exclu et imposé est traité comme exclu
        let mut rng = make_rng(Some(1));
        for _ in 0..20 {
            let grid = generate_grid(&[13], &[13, 27], &mut rng).unwrap();
            assert!(!grid.contains(&13));
            assert!(grid.contains(&27));
        }
    }

    #[test]
    fn test_generate_grid_pool_exhausted() {
        let excluded: Vec<u8> = (1..=40).collect();
        let mut rng = make_rng(Some(1));
        assert!(generate_grid(&excluded, &[], &mut rng).is_err());
    }

    #[test]
    fn test_today_grid_stable_within_day() {
        let conn = test_conn();
        let mut rng = make_rng(Some(3));

        let first = today_grid(&conn, &mut rng).unwrap();
        assert!(first.fresh);

        let second = today_grid(&conn, &mut rng).unwrap();
        assert!(!second.fresh);
        assert_eq!(first.grid.numbers, second.grid.numbers);
    }

    #[test]
    fn test_refresh_today_overwrites_and_logs() {
        let conn = test_conn();

        let first = today_grid(&conn, &mut make_rng(Some(3))).unwrap();

        // En excluant les numéros de la première grille, la relance
        // produit forcément une grille différente
        db::replace_filters(&conn, FilterMode::Exclude, &first.grid.numbers).unwrap();
        let refreshed = refresh_today(&conn, &mut make_rng(Some(4))).unwrap();
        assert_ne!(first.grid.numbers, refreshed.grid.numbers);

        // La grille du jour est remplacée, pas dupliquée
        let current = today_grid(&conn, &mut make_rng(Some(5))).unwrap();
        assert_eq!(current.grid.numbers, refreshed.grid.numbers);

        let history = db::fetch_history(&conn, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, HistoryKind::Refresh);
        assert_eq!(history[1].kind, HistoryKind::Daily);
    }

    #[test]
    fn test_today_grid_honors_stored_filters() {
        let conn = test_conn();
        db::replace_filters(&conn, FilterMode::Exclude, &(20..=45).collect::<Vec<u8>>()).unwrap();
        db::replace_filters(&conn, FilterMode::Include, &[7]).unwrap();

        let today = today_grid(&conn, &mut make_rng(Some(3))).unwrap();
        assert!(today.grid.numbers.contains(&7));
        assert!(today.grid.numbers.iter().all(|n| *n < 20));
    }
}
