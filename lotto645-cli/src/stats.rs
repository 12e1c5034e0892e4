use lotto645_db::models::{WinningDraw, POOL_SIZE};

/// Nombre de numéros mis en avant dans les listes chaud/froid.
const HIGHLIGHT_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct NumberFrequency {
    pub number: u8,
    pub count: u32,
}

/// Fréquence d'apparition de chaque numéro (1-45) dans les tirages donnés.
/// Le bonus ne compte pas.
pub fn compute_frequency(draws: &[WinningDraw]) -> Vec<NumberFrequency> {
    let mut counts = vec![0u32; POOL_SIZE as usize];
    for draw in draws {
        for &n in &draw.numbers {
            let idx = (n - 1) as usize;
            if idx < counts.len() {
                counts[idx] += 1;
            }
        }
    }
    (1..=POOL_SIZE)
        .map(|n| NumberFrequency {
            number: n,
            count: counts[(n - 1) as usize],
        })
        .collect()
}

/// Tri par fréquence décroissante, numéro croissant à égalité.
fn sorted_by_count(freq: &[NumberFrequency]) -> Vec<NumberFrequency> {
    let mut sorted = freq.to_vec();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then(a.number.cmp(&b.number)));
    sorted
}

/// Les 6 numéros les plus fréquents.
pub fn hot_numbers(freq: &[NumberFrequency]) -> Vec<NumberFrequency> {
    sorted_by_count(freq).into_iter().take(HIGHLIGHT_LEN).collect()
}

/// Les 6 numéros les moins fréquents, du plus froid au moins froid.
pub fn cold_numbers(freq: &[NumberFrequency]) -> Vec<NumberFrequency> {
    let sorted = sorted_by_count(freq);
    sorted
        .into_iter()
        .rev()
        .take(HIGHLIGHT_LEN)
        .collect()
}
