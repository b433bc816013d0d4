//! Lifetime profile statistics updated after each match

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::client::{DocumentClient, StoreError};

#[derive(Debug, Clone, Default, Deserialize)]
struct ProfileStats {
    #[serde(default)]
    matches: u32,
    #[serde(default)]
    wins: u32,
    #[serde(default)]
    points: u64,
}

#[derive(Debug, Deserialize)]
struct Profile {
    stats: Option<ProfileStats>,
}

/// Reads and writes the per-player lifetime stats document
#[derive(Clone)]
pub struct StatsStore {
    client: DocumentClient,
}

impl StatsStore {
    pub fn new(client: DocumentClient) -> Self {
        Self { client }
    }

    /// Fold one finished match into a player's lifetime record. A missing
    /// profile, or one without a stats block, is skipped without error:
    /// guests play matches that are never persisted. Returns whether a write
    /// happened.
    pub async fn update_player_stats(
        &self,
        uid: &str,
        did_win: bool,
        points: u32,
    ) -> Result<bool, StoreError> {
        let path = format!("profiles/{uid}");
        let Some(doc) = self.client.get_document(&path).await? else {
            debug!(uid, "no profile document, skipping stats update");
            return Ok(false);
        };

        let profile: Profile = match serde_json::from_value(doc) {
            Ok(p) => p,
            Err(err) => {
                warn!(uid, error = %err, "profile document is malformed, skipping");
                return Ok(false);
            }
        };
        let Some(stats) = profile.stats else {
            debug!(uid, "profile has no stats block, skipping stats update");
            return Ok(false);
        };

        let updated = json!({
            "stats": {
                "matches": stats.matches + 1,
                "wins": stats.wins + u32::from(did_win),
                "points": stats.points + u64::from(points),
            }
        });
        self.client.patch_document(&path, &updated).await?;
        debug!(uid, did_win, points, "player stats updated");
        Ok(true)
    }
}
