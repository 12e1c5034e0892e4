mod display;
mod generate;
mod stats;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use lotto645_api::cache::{self, LatestSource};
use lotto645_api::client::{ApiClient, DEFAULT_API_URL};
use lotto645_db::db::{self, db_path, migrate, open_db};
use lotto645_db::models::{check_grid, validate_grid, FilterMode, GRID_LEN, POOL_SIZE};
use lotto645_db::rusqlite::Connection;

/// Un pool de génération doit garder au moins une grille complète.
const MAX_EXCLUDED: usize = (POOL_SIZE as usize) - GRID_LEN;

#[derive(Parser)]
#[command(name = "lotto645", about = "Compagnon Lotto 6/45 : grilles, favoris et résultats officiels")]
struct Cli {
    /// URL de l'API des tirages officiels
    #[arg(long, global = true, default_value = DEFAULT_API_URL)]
    api_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Afficher la grille du jour (générée si nécessaire)
    Grille {
        /// Regénérer la grille du jour
        #[arg(long)]
        nouveau: bool,

        /// Enregistrer la grille du jour dans les favoris
        #[arg(long)]
        favori: bool,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Gérer les grilles favorites
    Favoris {
        #[command(subcommand)]
        action: FavorisAction,
    },

    /// Historique des grilles générées
    Historique {
        /// Nombre d'entrées à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Filtres de génération (numéros exclus ou imposés)
    Filtres {
        #[command(subcommand)]
        action: FiltresAction,
    },

    /// Afficher un tirage officiel et vérifier les favoris
    Tirage {
        /// Numéro de tirage (défaut : dernier tirage)
        #[arg(short, long)]
        round: Option<u32>,
    },

    /// Vérifier une grille contre un tirage officiel
    Verifier {
        /// 6 numéros (1-45)
        numbers: Vec<u8>,

        /// Numéro de tirage (défaut : dernier tirage)
        #[arg(short, long)]
        round: Option<u32>,
    },

    /// Statistiques de fréquence sur les derniers tirages
    Stats {
        /// Nombre de tirages à analyser
        #[arg(short, long, default_value = "50")]
        tirages: u32,
    },

    /// Afficher le chemin de la base de données
    DbPath,
}

#[derive(Subcommand)]
enum FavorisAction {
    /// Lister les grilles favorites
    Lister,

    /// Ajouter une grille aux favoris
    Ajouter {
        /// 6 numéros (1-45)
        numbers: Vec<u8>,

        /// Note libre attachée à la grille
        #[arg(short, long)]
        memo: Option<String>,
    },

    /// Retirer une grille des favoris
    Retirer {
        /// Identifiant du favori (voir : lotto645 favoris lister)
        id: String,
    },
}

#[derive(Subcommand)]
enum FiltresAction {
    /// Afficher les filtres enregistrés
    Afficher,

    /// Exclure des numéros de la génération
    Exclure { numbers: Vec<u8> },

    /// Imposer des numéros dans chaque grille (6 au plus)
    Inclure { numbers: Vec<u8> },

    /// Retirer des numéros des deux listes
    Retirer { numbers: Vec<u8> },

    /// Effacer tous les filtres
    Reinitialiser,
}

fn main() -> Result<()> {
    let Cli { api_url, command } = Cli::parse();
    let path = db_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match command {
        Command::Grille { nouveau, favori, seed } => cmd_grille(&conn, nouveau, favori, seed),
        Command::Favoris { action } => cmd_favoris(&conn, action),
        Command::Historique { last } => cmd_historique(&conn, last),
        Command::Filtres { action } => cmd_filtres(&conn, action),
        Command::Tirage { round } => cmd_tirage(&conn, &path, &api_url, round),
        Command::Verifier { numbers, round } => cmd_verifier(&conn, &path, &api_url, &numbers, round),
        Command::Stats { tirages } => cmd_stats(&conn, &path, &api_url, tirages),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn cmd_grille(conn: &Connection, nouveau: bool, favori: bool, seed: Option<u64>) -> Result<()> {
    let mut rng = generate::make_rng(seed);
    let today = if nouveau {
        generate::refresh_today(conn, &mut rng)?
    } else {
        generate::today_grid(conn, &mut rng)?
    };
    display::display_daily_grid(&today.grid.date, &today.grid.numbers, today.fresh);

    if favori {
        match db::find_favorite_by_numbers(conn, &today.grid.numbers)? {
            Some(_) => println!("\nCette grille est déjà dans les favoris."),
            None => {
                let item = db::insert_favorite(conn, &today.grid.numbers, None)?;
                println!("\nGrille enregistrée dans les favoris ({}).", item.id);
            }
        }
    }
    Ok(())
}

fn cmd_favoris(conn: &Connection, action: FavorisAction) -> Result<()> {
    match action {
        FavorisAction::Lister => {
            display::display_favorites(&db::fetch_favorites(conn)?);
        }
        FavorisAction::Ajouter { numbers, memo } => {
            let grid = parse_grid(&numbers)?;
            if db::find_favorite_by_numbers(conn, &grid)?.is_some() {
                bail!("Cette grille est déjà dans les favoris");
            }
            let item = db::insert_favorite(conn, &grid, memo.as_deref())?;
            println!("Favori ajouté ({}).", item.id);
        }
        FavorisAction::Retirer { id } => {
            if db::remove_favorite(conn, &id)? {
                println!("Favori retiré.");
            } else {
                println!("Aucun favori avec l'identifiant {}.", id);
            }
        }
    }
    Ok(())
}

fn cmd_historique(conn: &Connection, last: u32) -> Result<()> {
    display::display_history(&db::fetch_history(conn, last)?);
    Ok(())
}

fn cmd_filtres(conn: &Connection, action: FiltresAction) -> Result<()> {
    let mut excluded: BTreeSet<u8> = db::fetch_filters(conn, FilterMode::Exclude)?
        .into_iter()
        .collect();
    let mut included: BTreeSet<u8> = db::fetch_filters(conn, FilterMode::Include)?
        .into_iter()
        .collect();

    match action {
        FiltresAction::Afficher => {
            display_filter_sets(&excluded, &included);
            return Ok(());
        }
        FiltresAction::Exclure { numbers } => {
            validate_filter_numbers(&numbers)?;
            for n in numbers {
                // Un numéro ne peut pas être à la fois exclu et imposé
                included.remove(&n);
                excluded.insert(n);
            }
            if excluded.len() > MAX_EXCLUDED {
                bail!("Au plus {} numéros peuvent être exclus", MAX_EXCLUDED);
            }
        }
        FiltresAction::Inclure { numbers } => {
            validate_filter_numbers(&numbers)?;
            for n in numbers {
                excluded.remove(&n);
                included.insert(n);
            }
            if included.len() > GRID_LEN {
                bail!("Au plus {} numéros peuvent être imposés", GRID_LEN);
            }
        }
        FiltresAction::Retirer { numbers } => {
            for n in numbers {
                excluded.remove(&n);
                included.remove(&n);
            }
        }
        FiltresAction::Reinitialiser => {
            db::clear_filters(conn)?;
            println!("Filtres réinitialisés.");
            return Ok(());
        }
    }

    let excluded: Vec<u8> = excluded.into_iter().collect();
    let included: Vec<u8> = included.into_iter().collect();
    db::replace_filters(conn, FilterMode::Exclude, &excluded)?;
    db::replace_filters(conn, FilterMode::Include, &included)?;
    display::display_filters(&excluded, &included);
    Ok(())
}

fn display_filter_sets(excluded: &BTreeSet<u8>, included: &BTreeSet<u8>) {
    let excluded: Vec<u8> = excluded.iter().copied().collect();
    let included: Vec<u8> = included.iter().copied().collect();
    display::display_filters(&excluded, &included);
}

fn cmd_tirage(conn: &Connection, path: &Path, api_url: &str, round: Option<u32>) -> Result<()> {
    let client = ApiClient::new(api_url)?;

    let Some(round) = round else {
        return show_latest(conn, path, &client);
    };

    let draw = cache::fetch_round(&client, conn, round)?;
    display::display_winning_card(&draw);
    display::display_favorite_checks(&db::fetch_favorites(conn)?, &draw);
    Ok(())
}

fn show_latest(conn: &Connection, path: &Path, client: &ApiClient) -> Result<()> {
    let latest = cache::fetch_latest(client, conn, path)?;
    display::display_winning_card(&latest.draw);
    if latest.source == LatestSource::CacheStale {
        println!("(servi depuis la cache, revalidation en cours...)");
    }

    let favorites = db::fetch_favorites(conn)?;
    display::display_favorite_checks(&favorites, &latest.draw);

    if let Some(revalidation) = latest.revalidation {
        if let Some(updated) = revalidation.wait() {
            println!("\n⟳ Nouveau tirage publié :");
            display::display_winning_card(&updated);
            display::display_favorite_checks(&favorites, &updated);
        }
    }
    Ok(())
}

fn cmd_verifier(
    conn: &Connection,
    path: &Path,
    api_url: &str,
    numbers: &[u8],
    round: Option<u32>,
) -> Result<()> {
    let grid = parse_grid(numbers)?;
    let client = ApiClient::new(api_url)?;

    let draw = match round {
        Some(n) => cache::fetch_round(&client, conn, n)?,
        None => cache::fetch_latest(&client, conn, path)?.draw,
    };

    let result = check_grid(&grid, &draw);
    display::display_check(&grid, &draw, &result);
    Ok(())
}

fn cmd_stats(conn: &Connection, path: &Path, api_url: &str, tirages: u32) -> Result<()> {
    if tirages == 0 {
        bail!("Il faut au moins un tirage à analyser");
    }
    let client = ApiClient::new(api_url)?;

    let draws = match cache::fetch_latest(&client, conn, path) {
        Ok(latest) => {
            let requested = tirages.min(latest.draw.round);
            let pb = ProgressBar::new(requested as u64);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap()
                .progress_chars("=> "),
            );

            let draws = cache::fetch_multiple_rounds(
                &client,
                conn,
                latest.draw.round,
                tirages,
                |done, total| {
                    pb.set_length(total as u64);
                    pb.set_position(done as u64);
                },
            )?;
            pb.finish_and_clear();

            display::display_sync_summary(draws.len(), requested as usize);
            draws
        }
        Err(err) => {
            // Réseau indisponible : on retombe sur les tirages déjà en cache
            if db::count_winning_draws(conn)? == 0 {
                return Err(err);
            }
            let cached = db::fetch_recent_winning_draws(conn, tirages)?;
            eprintln!(
                "Réseau indisponible, statistiques sur {} tirages en cache.",
                cached.len()
            );
            cached
        }
    };

    let freq = stats::compute_frequency(&draws);
    display::display_frequency(&freq, draws.len());
    display::display_hot_cold(&stats::hot_numbers(&freq), &stats::cold_numbers(&freq));
    Ok(())
}

fn parse_grid(numbers: &[u8]) -> Result<[u8; 6]> {
    if numbers.len() != GRID_LEN {
        bail!("Entrez exactement {} numéros (1-{})", GRID_LEN, POOL_SIZE);
    }
    let mut grid = [0u8; 6];
    grid.copy_from_slice(numbers);
    grid.sort();
    validate_grid(&grid)?;
    Ok(grid)
}

fn validate_filter_numbers(numbers: &[u8]) -> Result<()> {
    for &n in numbers {
        if n < 1 || n > POOL_SIZE {
            bail!("Numéro {} hors limites (1-{})", n, POOL_SIZE);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grid_sorts_and_validates() {
        assert_eq!(parse_grid(&[45, 1, 30, 2, 20, 10]).unwrap(), [1, 2, 10, 20, 30, 45]);
        assert!(parse_grid(&[1, 2, 3]).is_err());
        assert!(parse_grid(&[1, 2, 3, 4, 5, 46]).is_err());
        assert!(parse_grid(&[1, 1, 3, 4, 5, 6]).is_err());
    }
}
