use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use lotto645_db::models::{
    check_grid, FavoriteItem, HistoryItem, HistoryKind, MatchResult, Rank, WinningDraw,
};

use crate::stats::NumberFrequency;

/// Largeur maximale des barres de fréquence.
const BAR_WIDTH: u32 = 30;

pub fn format_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:2}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

/// Montant en wons, milliers séparés par des espaces.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{} ₩", sign, grouped)
}

fn rank_cell(rank: Option<Rank>) -> Cell {
    match rank {
        Some(r) => {
            let color = match r {
                Rank::First => Color::Red,
                Rank::Second => Color::DarkYellow,
                Rank::Third => Color::Yellow,
                Rank::Fourth => Color::Green,
                Rank::Fifth => Color::Blue,
            };
            Cell::new(r.to_string()).fg(color)
        }
        None => Cell::new("perdante").fg(Color::DarkGrey),
    }
}

pub fn display_daily_grid(date: &str, numbers: &[u8; 6], fresh: bool) {
    let title = if fresh {
        format!("🎲 Grille du jour ({date}), fraîchement tirée")
    } else {
        format!("🎲 Grille du jour ({date})")
    };
    println!("\n{title}\n");
    println!("   {}", format_numbers(numbers));
}

pub fn display_favorites(favorites: &[FavoriteItem]) {
    if favorites.is_empty() {
        println!("Aucune grille favorite. Ajoutez-en une : lotto645 favoris ajouter");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Identifiant", "Numéros", "Mémo", "Ajoutée le"]);

    for item in favorites {
        let memo = item.memo.clone().unwrap_or_else(|| "—".to_string());
        table.add_row(vec![
            item.id.clone(),
            format_numbers(&item.numbers),
            memo,
            item.created_at.clone(),
        ]);
    }
    println!("{table}");
}

pub fn display_history(items: &[HistoryItem]) {
    if items.is_empty() {
        println!("Historique vide.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Date", "Numéros", "Type"]);

    for item in items {
        let kind = match item.kind {
            HistoryKind::Daily => "quotidienne",
            HistoryKind::Refresh => "relance",
        };
        table.add_row(vec![
            item.date.clone(),
            format_numbers(&item.numbers),
            kind.to_string(),
        ]);
    }
    println!("{table}");
}

pub fn display_filters(excluded: &[u8], included: &[u8]) {
    println!("\n🔧 Filtres de génération\n");

    let excluded_str = if excluded.is_empty() {
        "aucun".to_string()
    } else {
        format_numbers(excluded)
    };
    let included_str = if included.is_empty() {
        "aucun".to_string()
    } else {
        format_numbers(included)
    };

    println!("  Exclus  : {}", excluded_str);
    println!("  Imposés : {}", included_str);
}

pub fn display_winning_card(draw: &WinningDraw) {
    println!("\n🏆 Tirage {} ({})\n", draw.round, draw.date);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Numéros"),
        Cell::new(format!(
            "{}  +  {:2}",
            format_numbers(&draw.numbers),
            draw.bonus
        )),
    ]);
    table.add_row(vec![
        Cell::new("Gain 1er rang"),
        Cell::new(format_amount(draw.first_prize)),
    ]);
    table.add_row(vec![
        Cell::new("Gagnants 1er rang"),
        Cell::new(draw.first_winners.to_string()),
    ]);
    if draw.total_sales > 0 {
        table.add_row(vec![
            Cell::new("Ventes totales"),
            Cell::new(format_amount(draw.total_sales)),
        ]);
    }
    println!("{table}");
}

/// Dresse le bilan de chaque favori face au tirage donné.
pub fn display_favorite_checks(favorites: &[FavoriteItem], winning: &WinningDraw) {
    if favorites.is_empty() {
        println!("\nAucune grille favorite à vérifier.");
        return;
    }

    println!("\n⭐ Mes grilles face au tirage {}\n", winning.round);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Numéros", "Bons numéros", "Bonus", "Rang", "Mémo"]);

    for item in favorites {
        let result = check_grid(&item.numbers, winning);
        table.add_row(vec![
            Cell::new(format_numbers(&item.numbers)),
            Cell::new(match_summary(&result)),
            Cell::new(if result.has_bonus_match { "oui" } else { "—" }),
            rank_cell(result.rank),
            Cell::new(item.memo.as_deref().unwrap_or("—")),
        ]);
    }
    println!("{table}");
}

pub fn display_check(numbers: &[u8; 6], winning: &WinningDraw, result: &MatchResult) {
    println!("\n⭐ Grille {} face au tirage {}\n", format_numbers(numbers), winning.round);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![Cell::new("Bons numéros"), Cell::new(match_summary(result))]);
    table.add_row(vec![
        Cell::new("Bonus"),
        Cell::new(if result.has_bonus_match { "oui" } else { "—" }),
    ]);
    table.add_row(vec![Cell::new("Rang"), rank_cell(result.rank)]);
    println!("{table}");
}

fn match_summary(result: &MatchResult) -> String {
    if result.match_count == 0 {
        "aucun".to_string()
    } else {
        format!(
            "{} ({})",
            result.match_count,
            format_numbers(&result.matched_numbers)
        )
    }
}

pub fn display_frequency(freq: &[NumberFrequency], draw_count: usize) {
    println!("\n📊 Fréquences sur les {} derniers tirages\n", draw_count);

    let max_count = freq.iter().map(|f| f.count).max().unwrap_or(0).max(1);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Numéro", "", "Sorties"]);

    for f in freq {
        let width = (f.count * BAR_WIDTH / max_count) as usize;
        let bar = "█".repeat(width);
        table.add_row(vec![
            Cell::new(format!("{:2}", f.number)),
            Cell::new(bar),
            Cell::new(f.count.to_string()),
        ]);
    }
    println!("{table}");
}

pub fn display_hot_cold(hot: &[NumberFrequency], cold: &[NumberFrequency]) {
    let hot_str = format_numbers(&hot.iter().map(|f| f.number).collect::<Vec<_>>());
    let cold_str = format_numbers(&cold.iter().map(|f| f.number).collect::<Vec<_>>());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Chauds").fg(Color::Green),
        Cell::new(hot_str),
    ]);
    table.add_row(vec![Cell::new("Froids").fg(Color::Red), Cell::new(cold_str)]);
    println!("{table}");
}

pub fn display_sync_summary(fetched: usize, requested: usize) {
    if fetched < requested {
        println!(
            "⚠ {} tirages récupérés sur {} demandés (réseau indisponible pour le reste)",
            fetched, requested
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_numbers() {
        assert_eq!(format_numbers(&[3, 9, 18]), " 3 -  9 - 18");
    }

    #[test]
    fn test_format_amount_groups_thousands() {
        assert_eq!(format_amount(0), "0 ₩");
        assert_eq!(format_amount(999), "999 ₩");
        assert_eq!(format_amount(1_000), "1 000 ₩");
        assert_eq!(format_amount(2_345_678_900), "2 345 678 900 ₩");
    }
}
