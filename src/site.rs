use crate::models::{League, MatchId};

pub const DEFAULT_BASE_URL: &str = "https://www.flashscore.com";

/// URL templates of the results site
#[derive(Debug, Clone, PartialEq)]
pub struct SiteUrls {
    base: String,
}

impl SiteUrls {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    #[cfg(test)]
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn listing(&self, league: &League) -> String {
        format!("{}/football/{}/results/", self.base, league.listing_path())
    }

    pub fn statistics(&self, id: &MatchId) -> String {
        format!("{}/match/{}/#/match-summary/match-statistics/0", self.base, id)
    }

    pub fn lineups(&self, id: &MatchId) -> String {
        format!("{}/match/{}/#/match-summary/lineups", self.base, id)
    }

    pub fn odds(&self, id: &MatchId) -> String {
        format!("{}/match/{}/#/odds-comparison/1x2-odds/full-time", self.base, id)
    }

    /// Unrelated pages that a visitor could plausibly wander to from a match page
    pub fn decoys(&self, id: &MatchId) -> Vec<String> {
        vec![
            format!("{}/", self.base),
            format!("{}/football/", self.base),
            format!("{}/football/england/premier-league/", self.base),
            format!("{}/football/spain/laliga/", self.base),
            format!("{}/football/germany/bundesliga/", self.base),
            format!("{}/match/{}/#/match-summary/match-summary", self.base, id),
            format!("{}/match/{}/#/h2h/overall", self.base, id),
            format!("{}/match/{}/#/standings/table/overall", self.base, id),
        ]
    }
}

impl Default for SiteUrls {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_url_template() {
        let urls = SiteUrls::default();
        let league = League::new("Poland", "PKO BP Ekstraklasa", "2022-2023");
        assert_eq!(
            urls.listing(&league),
            "https://www.flashscore.com/football/poland/pko-bp-ekstraklasa-2022-2023/results/"
        );
    }

    #[test]
    fn test_match_url_templates() {
        let urls = SiteUrls::default();
        let id = MatchId::from("K2hAaVxr");
        assert_eq!(
            urls.statistics(&id),
            "https://www.flashscore.com/match/K2hAaVxr/#/match-summary/match-statistics/0"
        );
        assert_eq!(
            urls.lineups(&id),
            "https://www.flashscore.com/match/K2hAaVxr/#/match-summary/lineups"
        );
        assert_eq!(
            urls.odds(&id),
            "https://www.flashscore.com/match/K2hAaVxr/#/odds-comparison/1x2-odds/full-time"
        );
    }

    #[test]
    fn test_trailing_slash_in_base_is_ignored() {
        let urls = SiteUrls::new("http://localhost:8080/");
        assert_eq!(urls.base(), "http://localhost:8080");
        assert_eq!(
            urls.lineups(&MatchId::from("x")),
            "http://localhost:8080/match/x/#/match-summary/lineups"
        );
    }

    #[test]
    fn test_decoys_never_include_stage_urls() {
        let urls = SiteUrls::default();
        let id = MatchId::from("abc");
        let decoys = urls.decoys(&id);
        assert!(!decoys.is_empty());
        assert!(!decoys.contains(&urls.statistics(&id)));
        assert!(!decoys.contains(&urls.lineups(&id)));
        assert!(!decoys.contains(&urls.odds(&id)));
    }
}
