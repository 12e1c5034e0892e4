use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDateTime, Timelike};
use rayon::prelude::*;

use lotto645_db::db;
use lotto645_db::models::WinningDraw;
use lotto645_db::rusqlite::Connection;

use crate::client::ApiClient;

/// Heure du tirage (avec marge de publication) : samedi 21h00 locale.
const DRAW_HOUR: u32 = 21;

/// Requêtes réseau simultanées lors d'une synchronisation multi-tirages.
pub const BATCH_SIZE: usize = 10;

/// Délai avant le prochain tirage. Si on est déjà samedi 21h00 ou plus tard,
/// le tirage visé est celui du samedi suivant.
pub fn next_draw_delay(now: NaiveDateTime) -> Duration {
    // 0 = dimanche, 6 = samedi
    let day = now.weekday().num_days_from_sunday();
    let mut days_until_sat = (6 + 7 - day) % 7;
    if days_until_sat == 0 && now.hour() >= DRAW_HOUR {
        days_until_sat = 7;
    }
    let next = now
        .date()
        .checked_add_days(Days::new(days_until_sat as u64))
        .and_then(|d| d.and_hms_opt(DRAW_HOUR, 0, 0))
        .unwrap_or(now);
    next - now
}

/// Une entrée « dernier tirage » est fraîche tant que son âge reste inférieur
/// au délai jusqu'au prochain tirage : passé un samedi 21h00, elle expire.
pub fn is_fresh(cached_at: i64, now: DateTime<Local>) -> bool {
    let age = now.timestamp() - cached_at;
    age < next_draw_delay(now.naive_local()).num_seconds()
}

/// Provenance du dernier tirage retourné.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatestSource {
    /// Cache fraîche, aucun appel réseau.
    CacheFresh,
    /// Cache périmée servie telle quelle, revalidation en arrière-plan.
    CacheStale,
    /// Aucune cache : réponse réseau directe.
    Network,
}

pub struct LatestFetch {
    pub draw: WinningDraw,
    pub source: LatestSource,
    pub revalidation: Option<Revalidation>,
}

/// Poignée sur la revalidation en arrière-plan d'une cache périmée.
pub struct Revalidation {
    handle: JoinHandle<Option<WinningDraw>>,
}

impl Revalidation {
    /// Attend la fin de la revalidation. `Some` si un tirage plus récent que
    /// celui servi depuis la cache est arrivé. Un échec réseau est avalé :
    /// la cache déjà servie reste la réponse.
    pub fn wait(self) -> Option<WinningDraw> {
        self.handle.join().ok().flatten()
    }
}

/// Dernier tirage, stratégie stale-while-revalidate :
/// cache fraîche → cache ; cache périmée → cache + revalidation en fond ;
/// pas de cache → réseau obligatoire.
pub fn fetch_latest(client: &ApiClient, conn: &Connection, db_path: &Path) -> Result<LatestFetch> {
    let now = Local::now();

    let cached = match db::fetch_latest_round(conn)? {
        Some(round) => db::fetch_winning_draw(conn, round)?,
        None => None,
    };

    if let Some((draw, cached_at)) = cached {
        if is_fresh(cached_at, now) {
            return Ok(LatestFetch {
                draw,
                source: LatestSource::CacheFresh,
                revalidation: None,
            });
        }
        let revalidation = spawn_revalidation(client.clone(), db_path.to_path_buf(), draw.round);
        return Ok(LatestFetch {
            draw,
            source: LatestSource::CacheStale,
            revalidation: Some(revalidation),
        });
    }

    let draw = client.latest()?;
    store_latest(conn, &draw)?;
    Ok(LatestFetch {
        draw,
        source: LatestSource::Network,
        revalidation: None,
    })
}

fn spawn_revalidation(client: ApiClient, db_path: PathBuf, known_round: u32) -> Revalidation {
    let handle = std::thread::spawn(move || {
        let draw = client.latest().ok()?;
        // Connexion propre au thread : la mise à jour de la cache est
        // rejouable, un échec ici laisse simplement l'entrée périmée.
        if let Ok(conn) = db::open_db(&db_path) {
            let _ = db::migrate(&conn).and_then(|_| store_latest(&conn, &draw));
        }
        if draw.round != known_round {
            Some(draw)
        } else {
            None
        }
    });
    Revalidation { handle }
}

/// Enregistre un tirage sous sa clé de tirage ET comme dernier tirage connu.
/// Réécrire un même tirage rafraîchit son horodatage de cache.
fn store_latest(conn: &Connection, draw: &WinningDraw) -> Result<()> {
    db::upsert_winning_draw(conn, draw, Local::now().timestamp())?;
    db::set_latest_round(conn, draw.round)?;
    Ok(())
}

/// Tirage d'un numéro donné. Les tirages passés sont immuables : une entrée
/// en cache est servie définitivement, sans réseau.
pub fn fetch_round(client: &ApiClient, conn: &Connection, round: u32) -> Result<WinningDraw> {
    if let Some((draw, _)) = db::fetch_winning_draw(conn, round)? {
        return Ok(draw);
    }
    let draw = client.round(round)?;
    db::upsert_winning_draw(conn, &draw, Local::now().timestamp())
        .context("Tirage récupéré mais impossible à mettre en cache")?;
    Ok(draw)
}

/// Tirages à récupérer : `count` numéros en partant de `latest_round`,
/// en descendant, sans passer sous le tirage 1.
fn pending_rounds(latest_round: u32, count: u32) -> Vec<u32> {
    (0..count)
        .filter_map(|i| latest_round.checked_sub(i))
        .filter(|&r| r >= 1)
        .collect()
}

/// Récupère plusieurs tirages par lots bornés de BATCH_SIZE : les entrées en
/// cache sont résolues localement, les manquantes partent en parallèle sur le
/// réseau. Les échecs individuels sont ignorés, les résultats sont rendus par
/// numéro de tirage décroissant. `on_progress(traités, total)` après chaque lot.
pub fn fetch_multiple_rounds(
    client: &ApiClient,
    conn: &Connection,
    latest_round: u32,
    count: u32,
    mut on_progress: impl FnMut(u32, u32),
) -> Result<Vec<WinningDraw>> {
    let rounds = pending_rounds(latest_round, count);
    let total = rounds.len() as u32;
    let mut results = Vec::with_capacity(rounds.len());
    let mut processed = 0u32;

    for batch in rounds.chunks(BATCH_SIZE) {
        let mut fetched: Vec<(u32, Option<WinningDraw>)> = Vec::with_capacity(batch.len());
        let mut misses = Vec::new();

        for &round in batch {
            match db::fetch_winning_draw(conn, round)? {
                Some((draw, _)) => fetched.push((round, Some(draw))),
                None => misses.push(round),
            }
        }

        let from_network: Vec<(u32, Option<WinningDraw>)> = misses
            .par_iter()
            .map(|&round| (round, client.round(round).ok()))
            .collect();

        let cached_at = Local::now().timestamp();
        for (round, draw) in from_network {
            if let Some(ref d) = draw {
                db::upsert_winning_draw(conn, d, cached_at)?;
            }
            fetched.push((round, draw));
        }

        fetched.sort_by(|a, b| b.0.cmp(&a.0));
        results.extend(fetched.into_iter().filter_map(|(_, d)| d));

        processed += batch.len() as u32;
        on_progress(processed, total);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use lotto645_db::db::{migrate, open_db, upsert_winning_draw};
    use lotto645_db::rusqlite::Connection;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    /// Client pointant vers un port fermé : tout appel réseau échoue vite.
    fn offline_client() -> ApiClient {
        ApiClient::new("http://127.0.0.1:9").unwrap()
    }

    fn test_draw(round: u32) -> WinningDraw {
        WinningDraw {
            round,
            date: "2025-07-19".to_string(),
            numbers: [3, 9, 18, 21, 33, 45],
            bonus: 7,
            total_sales: 0,
            first_prize: 0,
            first_winners: 0,
        }
    }

    #[test]
    fn test_next_draw_delay_midweek() {
        // Mercredi midi → samedi 21h00 : 3 jours et 9 heures
        let delay = next_draw_delay(naive(2026, 8, 5, 12, 0, 0));
        assert_eq!(delay.num_seconds(), 3 * 86_400 + 9 * 3_600);
    }

    #[test]
    fn test_next_draw_delay_saturday_before_draw() {
        let delay = next_draw_delay(naive(2026, 8, 8, 20, 59, 59));
        assert_eq!(delay.num_seconds(), 1);
    }

    #[test]
    fn test_next_draw_delay_saturday_after_draw() {
        // Samedi 21h00 pile : le tirage visé est celui de la semaine suivante
        let delay = next_draw_delay(naive(2026, 8, 8, 21, 0, 0));
        assert_eq!(delay.num_seconds(), 7 * 86_400);
    }

    #[test]
    fn test_next_draw_delay_sunday() {
        let delay = next_draw_delay(naive(2026, 8, 9, 10, 0, 0));
        assert_eq!(delay.num_seconds(), 6 * 86_400 + 11 * 3_600);
    }

    #[test]
    fn test_is_fresh() {
        // Mercredi midi, heure locale
        let now = Local.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap();

        // En cache depuis une heure : fraîche
        assert!(is_fresh(now.timestamp() - 3_600, now));
        // En cache depuis quatre jours : un samedi 21h00 est passé entre-temps
        assert!(!is_fresh(now.timestamp() - 4 * 86_400, now));
    }

    #[test]
    fn test_fetch_round_prefers_cache() {
        let conn = test_conn();
        upsert_winning_draw(&conn, &test_draw(1181), 0).unwrap();

        // Le client est hors ligne : seul le cache peut répondre
        let draw = fetch_round(&offline_client(), &conn, 1181).unwrap();
        assert_eq!(draw.round, 1181);
    }

    #[test]
    fn test_fetch_round_miss_requires_network() {
        let conn = test_conn();
        assert!(fetch_round(&offline_client(), &conn, 1181).is_err());
    }

    #[test]
    fn test_fetch_latest_fresh_cache_skips_network() {
        let conn = test_conn();
        let draw = test_draw(1181);
        upsert_winning_draw(&conn, &draw, Local::now().timestamp()).unwrap();
        lotto645_db::db::set_latest_round(&conn, 1181).unwrap();

        let latest = fetch_latest(&offline_client(), &conn, Path::new("unused.db")).unwrap();
        assert_eq!(latest.source, LatestSource::CacheFresh);
        assert_eq!(latest.draw.round, 1181);
        assert!(latest.revalidation.is_none());
    }

    #[test]
    fn test_fetch_latest_stale_cache_served_with_revalidation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lotto645.db");
        let conn = open_db(&path).unwrap();
        migrate(&conn).unwrap();

        let draw = test_draw(1181);
        // Mise en cache il y a trente jours : forcément périmée
        upsert_winning_draw(&conn, &draw, Local::now().timestamp() - 30 * 86_400).unwrap();
        lotto645_db::db::set_latest_round(&conn, 1181).unwrap();

        let latest = fetch_latest(&offline_client(), &conn, &path).unwrap();
        assert_eq!(latest.source, LatestSource::CacheStale);
        assert_eq!(latest.draw.round, 1181);

        // La revalidation échoue (hors ligne) : avalée, pas de nouveau tirage
        let update = latest.revalidation.unwrap().wait();
        assert!(update.is_none());
    }

    #[test]
    fn test_fetch_latest_empty_cache_offline_fails() {
        let conn = test_conn();
        assert!(fetch_latest(&offline_client(), &conn, Path::new("unused.db")).is_err());
    }

    #[test]
    fn test_pending_rounds_stops_at_one() {
        assert_eq!(pending_rounds(1181, 3), vec![1181, 1180, 1179]);
        assert_eq!(pending_rounds(3, 5), vec![3, 2, 1]);
        assert_eq!(pending_rounds(1, 2), vec![1]);
    }

    #[test]
    fn test_fetch_multiple_rounds_from_cache_only() {
        let conn = test_conn();
        upsert_winning_draw(&conn, &test_draw(1180), 0).unwrap();
        upsert_winning_draw(&conn, &test_draw(1181), 0).unwrap();

        let mut calls = Vec::new();
        let draws = fetch_multiple_rounds(&offline_client(), &conn, 1181, 2, |done, total| {
            calls.push((done, total));
        })
        .unwrap();

        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].round, 1181);
        assert_eq!(draws[1].round, 1180);
        assert_eq!(calls, vec![(2, 2)]);
    }

    #[test]
    fn test_fetch_multiple_rounds_drops_failures() {
        let conn = test_conn();
        upsert_winning_draw(&conn, &test_draw(1181), 0).unwrap();

        // 1180 et 1179 manquent et le réseau est hors ligne : ignorés
        let draws = fetch_multiple_rounds(&offline_client(), &conn, 1181, 3, |_, _| {}).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].round, 1181);
    }
}
