use crate::error::CrawlError;
use crate::models::MatchId;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

pub const MATCH_ID_PREFIX: &str = "g_1_";
pub const MATCH_ID_SELECTOR: &str = "[id^='g_1_']";
pub const LOAD_MORE_SELECTOR: &str = "div.event__more";
pub const CONSENT_SELECTOR: &str = "#onetrust-accept-btn-handler";

const HOME_TEAM_SELECTOR: &str = "div.duelParticipant__home";
const AWAY_TEAM_SELECTOR: &str = "div.duelParticipant__away";
const START_TIME_SELECTOR: &str = "div.duelParticipant__startTime";
const SCORE_SELECTOR: &str = "div.duelParticipant__score";
const STAT_ROW_SELECTOR: &str = "div._row_rz3ch_9";
const SECTION_SELECTOR: &str = "div.section";
const COACH_MARKER: &str = "Coaches";
const PARTICIPANT_LINK_SELECTOR: &str = "a.lf__participantName";
const ODDS_ROW_SELECTOR: &str = "div.ui-table__row";
const ODDS_CELL_SELECTOR: &str = ".oddsCell__odd";

/// Kickoff and team names from the match header
#[derive(Debug, Clone, PartialEq)]
pub struct MatchHeader {
    pub home_team: String,
    pub away_team: String,
    pub date_time: String,
}

/// One statistics row: `home` is the left value, `away` the right one
#[derive(Debug, Clone, PartialEq)]
pub struct StatLine {
    pub label: String,
    pub home: f64,
    pub away: f64,
}

/// Home win, draw and away win odds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Odds {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

/// Coach names in page order: the left link is the home coach, the right one the away coach.
/// The page carries no side label, so this ordering is the whole contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Coaches {
    pub home: String,
    pub away: String,
}

fn first_element<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    Selector::parse(css)
        .ok()
        .and_then(|sel| document.select(&sel).next())
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>()
}

fn required_text(document: &Html, css: &str) -> Result<String, CrawlError> {
    first_element(document, css)
        .map(|el| element_text(&el).trim().to_string())
        .ok_or_else(|| CrawlError::ElementNotFound {
            what: css.to_string(),
        })
}

/// Text extraction rules for the match pages
pub struct PageParser {
    digit_run: Regex,
    stat_number: Regex,
}

impl PageParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            digit_run: Regex::new(r"\d+")?,
            stat_number: Regex::new(r"[-+]?\d*\.?\d+|[-+]?\d+")?,
        })
    }

    pub fn header(&self, html: &str) -> Result<MatchHeader, CrawlError> {
        let document = Html::parse_document(html);
        Ok(MatchHeader {
            home_team: required_text(&document, HOME_TEAM_SELECTOR)?,
            away_team: required_text(&document, AWAY_TEAM_SELECTOR)?,
            date_time: required_text(&document, START_TIME_SELECTOR)?,
        })
    }

    pub fn score(&self, html: &str) -> Result<(i64, i64), CrawlError> {
        let document = Html::parse_document(html);
        let text = required_text(&document, SCORE_SELECTOR)?;
        self.parse_score(&text)
    }

    /// Exactly two digit runs: home goals then away goals
    pub fn parse_score(&self, text: &str) -> Result<(i64, i64), CrawlError> {
        let runs: Vec<&str> = self.digit_run.find_iter(text).map(|m| m.as_str()).collect();
        let [home, away] = runs.as_slice() else {
            return Err(CrawlError::ParseArity {
                what: "score".to_string(),
                expected: 2,
                found: runs.len(),
            });
        };

        let goals = |run: &str| {
            run.parse::<i64>().map_err(|_| CrawlError::MalformedValue {
                what: "score".to_string(),
                text: text.to_string(),
            })
        };
        Ok((goals(*home)?, goals(*away)?))
    }

    /// Raw texts of every statistics row, in page order
    pub fn stat_rows(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse(STAT_ROW_SELECTOR) else {
            return Vec::new();
        };
        document
            .select(&selector)
            .map(|row| element_text(&row))
            .collect()
    }

    /// Label is the row text stripped to ASCII letters; the row must carry exactly
    /// two numbers, left for home and right for away.
    pub fn parse_stat_row(&self, text: &str) -> Result<StatLine, CrawlError> {
        let label: String = text.chars().filter(|c| c.is_ascii_alphabetic()).collect();
        let numbers: Vec<&str> = self
            .stat_number
            .find_iter(text)
            .map(|m| m.as_str())
            .collect();

        let [home, away] = numbers.as_slice() else {
            return Err(CrawlError::ParseArity {
                what: format!("statistic row '{}'", label),
                expected: 2,
                found: numbers.len(),
            });
        };

        let value = |token: &str| {
            token.parse::<f64>().map_err(|_| CrawlError::MalformedValue {
                what: format!("statistic row '{}'", label),
                text: token.to_string(),
            })
        };
        Ok(StatLine {
            home: value(*home)?,
            away: value(*away)?,
            label,
        })
    }

    pub fn coaches(&self, html: &str) -> Result<Coaches, CrawlError> {
        let document = Html::parse_document(html);
        let (Ok(section_sel), Ok(link_sel)) = (
            Selector::parse(SECTION_SELECTOR),
            Selector::parse(PARTICIPANT_LINK_SELECTOR),
        ) else {
            return Err(CrawlError::ElementNotFound {
                what: "coaches section".to_string(),
            });
        };

        let section = document
            .select(&section_sel)
            .find(|section| element_text(section).contains(COACH_MARKER))
            .ok_or_else(|| CrawlError::ElementNotFound {
                what: "coaches section".to_string(),
            })?;

        let names: Vec<String> = section
            .select(&link_sel)
            .take(2)
            .map(|link| element_text(&link).trim().to_string())
            .collect();

        match <[String; 2]>::try_from(names) {
            Ok([home, away]) => Ok(Coaches { home, away }),
            Err(names) => Err(CrawlError::ParseArity {
                what: "coach links".to_string(),
                expected: 2,
                found: names.len(),
            }),
        }
    }

    /// Reads the first odds row. Labeled odds cells are preferred; a row without
    /// cells falls back to slicing its text at fixed character offsets (4, 8).
    /// The row text is trimmed before slicing, so leading whitespace does not shift
    /// the offsets; the raw, untrimmed text would be cut differently.
    pub fn odds(&self, html: &str) -> Result<Odds, CrawlError> {
        let document = Html::parse_document(html);
        let row = first_element(&document, ODDS_ROW_SELECTOR).ok_or_else(|| {
            CrawlError::ElementNotFound {
                what: ODDS_ROW_SELECTOR.to_string(),
            }
        })?;

        let cells: Vec<String> = Selector::parse(ODDS_CELL_SELECTOR)
            .map(|sel| {
                row.select(&sel)
                    .map(|cell| element_text(&cell).trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let parts = if cells.is_empty() {
            tracing::debug!("Odds row has no labeled cells, using fixed offsets");
            Self::split_fixed_offsets(element_text(&row).trim())?
        } else {
            cells
        };

        let [home, draw, away] = parts.as_slice() else {
            return Err(CrawlError::ParseArity {
                what: "odds cells".to_string(),
                expected: 3,
                found: parts.len(),
            });
        };

        let value = |text: &str| {
            text.trim()
                .parse::<f64>()
                .map_err(|_| CrawlError::MalformedValue {
                    what: "odds".to_string(),
                    text: text.to_string(),
                })
        };
        Ok(Odds {
            home: value(home.as_str())?,
            draw: value(draw.as_str())?,
            away: value(away.as_str())?,
        })
    }

    fn split_fixed_offsets(text: &str) -> Result<Vec<String>, CrawlError> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() < 9 {
            return Err(CrawlError::MalformedValue {
                what: "odds row".to_string(),
                text: text.to_string(),
            });
        }
        Ok(vec![
            chars[..4].iter().collect(),
            chars[4..8].iter().collect(),
            chars[8..].iter().collect(),
        ])
    }

    /// Every element id carrying the match prefix, prefix removed, in document order.
    /// A bare prefix names no match and is skipped.
    pub fn match_ids(&self, html: &str) -> Vec<MatchId> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse(MATCH_ID_SELECTOR) else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("id"))
            .filter_map(|id| id.strip_prefix(MATCH_ID_PREFIX))
            .filter(|id| !id.is_empty())
            .map(MatchId::from)
            .collect()
    }
}
