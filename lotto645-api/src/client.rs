use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use lotto645_db::models::{validate_grid, WinningDraw, GRID_LEN};

pub const DEFAULT_API_URL: &str = "https://api.lotto.daytive.com";

/// Charge utile JSON de l'API (camelCase côté serveur).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WinningPayload {
    round: u32,
    date: String,
    numbers: Vec<u8>,
    bonus_number: u8,
    #[serde(default)]
    total_sales: i64,
    #[serde(default)]
    first_prize: i64,
    #[serde(default)]
    first_winners: u32,
}

impl WinningPayload {
    fn into_draw(self) -> Result<WinningDraw> {
        if self.numbers.len() != GRID_LEN {
            bail!(
                "Tirage {} : {} numéros reçus au lieu de {}",
                self.round,
                self.numbers.len(),
                GRID_LEN
            );
        }
        let mut numbers = [0u8; 6];
        numbers.copy_from_slice(&self.numbers);
        numbers.sort();
        validate_grid(&numbers)
            .with_context(|| format!("Tirage {} invalide", self.round))?;

        Ok(WinningDraw {
            round: self.round,
            date: self.date,
            numbers,
            bonus: self.bonus_number,
            total_sales: self.total_sales,
            first_prize: self.first_prize,
            first_winners: self.first_winners,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .context("Impossible d'initialiser le client HTTP")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Dernier tirage publié par l'API.
    pub fn latest(&self) -> Result<WinningDraw> {
        self.get(&format!("{}/round/latest", self.base_url))
            .context("Impossible de récupérer le dernier tirage")
    }

    /// Tirage d'un numéro donné.
    pub fn round(&self, round: u32) -> Result<WinningDraw> {
        self.get(&format!("{}/round/{}", self.base_url, round))
            .with_context(|| format!("Impossible de récupérer le tirage {}", round))
    }

    fn get(&self, url: &str) -> Result<WinningDraw> {
        let response = self.http.get(url).send()?;
        if !response.status().is_success() {
            bail!("Réponse HTTP {}", response.status());
        }
        let payload: WinningPayload = response.json().context("Réponse JSON invalide")?;
        payload.into_draw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "round": 1181,
        "date": "2025-07-19",
        "numbers": [21, 3, 45, 9, 33, 18],
        "bonusNumber": 7,
        "totalSales": 118238000000,
        "firstPrize": 2345678900,
        "firstWinners": 11
    }"#;

    #[test]
    fn test_payload_parse_and_sort() {
        let payload: WinningPayload = serde_json::from_str(SAMPLE).unwrap();
        let draw = payload.into_draw().unwrap();

        assert_eq!(draw.round, 1181);
        // Les numéros sont normalisés en ordre croissant
        assert_eq!(draw.numbers, [3, 9, 18, 21, 33, 45]);
        assert_eq!(draw.bonus, 7);
        assert_eq!(draw.first_winners, 11);
    }

    #[test]
    fn test_payload_missing_money_fields_default() {
        let json = r#"{"round": 12, "date": "2004-01-01", "numbers": [1, 2, 3, 4, 5, 6], "bonusNumber": 7}"#;
        let payload: WinningPayload = serde_json::from_str(json).unwrap();
        let draw = payload.into_draw().unwrap();
        assert_eq!(draw.total_sales, 0);
        assert_eq!(draw.first_prize, 0);
    }

    #[test]
    fn test_payload_wrong_count_rejected() {
        let json = r#"{"round": 12, "date": "2004-01-01", "numbers": [1, 2, 3], "bonusNumber": 7}"#;
        let payload: WinningPayload = serde_json::from_str(json).unwrap();
        assert!(payload.into_draw().is_err());
    }

    #[test]
    fn test_payload_out_of_range_rejected() {
        let json = r#"{"round": 12, "date": "2004-01-01", "numbers": [1, 2, 3, 4, 5, 46], "bonusNumber": 7}"#;
        let payload: WinningPayload = serde_json::from_str(json).unwrap();
        assert!(payload.into_draw().is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("https://api.example.com/").unwrap();
        assert_eq!(client.base_url, "https://api.example.com");
    }
}
