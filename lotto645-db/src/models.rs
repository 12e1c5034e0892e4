use anyhow::{bail, Result};

/// Taille du pool de numéros (1-45).
pub const POOL_SIZE: u8 = 45;
/// Nombre de numéros par grille.
pub const GRID_LEN: usize = 6;

/// Tirage officiel tel que publié par l'API.
#[derive(Debug, Clone, PartialEq)]
pub struct WinningDraw {
    pub round: u32,
    pub date: String,
    pub numbers: [u8; 6],
    pub bonus: u8,
    pub total_sales: i64,
    pub first_prize: i64,
    pub first_winners: u32,
}

/// Grille du jour : une seule grille générée par date calendaire.
#[derive(Debug, Clone)]
pub struct DailyGrid {
    pub date: String,
    pub numbers: [u8; 6],
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct FavoriteItem {
    pub id: String,
    pub numbers: [u8; 6],
    pub memo: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct HistoryItem {
    pub numbers: [u8; 6],
    pub date: String,
    pub kind: HistoryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Daily,
    Refresh,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Daily => "daily",
            HistoryKind::Refresh => "refresh",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(HistoryKind::Daily),
            "refresh" => Ok(HistoryKind::Refresh),
            other => bail!("Type d'historique inconnu : {}", other),
        }
    }
}

/// Mode d'un filtre de génération : un numéro est soit exclu du pool,
/// soit imposé dans chaque grille, jamais les deux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Exclude,
    Include,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Exclude => "exclude",
            FilterMode::Include => "include",
        }
    }
}

/// Rang de gain d'une grille face à un tirage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rank::First => write!(f, "1er rang"),
            Rank::Second => write!(f, "2e rang"),
            Rank::Third => write!(f, "3e rang"),
            Rank::Fourth => write!(f, "4e rang"),
            Rank::Fifth => write!(f, "5e rang"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched_numbers: Vec<u8>,
    pub match_count: usize,
    pub has_bonus_match: bool,
    pub rank: Option<Rank>,
}

pub fn validate_grid(numbers: &[u8; 6]) -> Result<()> {
    for &n in numbers {
        if n < 1 || n > POOL_SIZE {
            bail!("Numéro {} hors limites (1-{})", n, POOL_SIZE);
        }
    }
    for i in 0..numbers.len() {
        for j in (i + 1)..numbers.len() {
            if numbers[i] == numbers[j] {
                bail!("Numéro en double : {}", numbers[i]);
            }
        }
    }
    Ok(())
}

/// 6 bons numéros : 1er rang. 5 + bonus : 2e. 5 : 3e. 4 : 4e. 3 : 5e.
pub fn determine_rank(match_count: usize, has_bonus_match: bool) -> Option<Rank> {
    match (match_count, has_bonus_match) {
        (6, _) => Some(Rank::First),
        (5, true) => Some(Rank::Second),
        (5, false) => Some(Rank::Third),
        (4, _) => Some(Rank::Fourth),
        (3, _) => Some(Rank::Fifth),
        _ => None,
    }
}

/// Compare une grille aux numéros d'un tirage. Le bonus est vérifié à part,
/// il ne compte pas dans les numéros correspondants.
pub fn check_grid(numbers: &[u8; 6], winning: &WinningDraw) -> MatchResult {
    let matched_numbers: Vec<u8> = numbers
        .iter()
        .copied()
        .filter(|n| winning.numbers.contains(n))
        .collect();
    let match_count = matched_numbers.len();
    let has_bonus_match = numbers.contains(&winning.bonus);

    MatchResult {
        rank: determine_rank(match_count, has_bonus_match),
        matched_numbers,
        match_count,
        has_bonus_match,
    }
}
