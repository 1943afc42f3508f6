use serde::Serialize;

use crate::db::Pokemon;
use crate::queries::pokemon::PokemonDetail;
use crate::queries::ranking::RankEntry;
use crate::queries::search::SearchHit;
use crate::queries::types::PokemonRef;

/// Output format requested by a tool caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    /// Unknown or missing values fall back to text.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }

    pub fn presenter(self) -> &'static dyn Presenter {
        match self {
            Self::Text => &TextPresenter,
            Self::Json => &JsonPresenter,
        }
    }
}

/// Renders query results. Both implementations take the same shapes, so
/// callers pick one per request.
pub trait Presenter: Sync {
    fn pokemon(&self, pokemon: &Pokemon) -> String;
    fn detail(&self, detail: &PokemonDetail) -> String;
    fn search(&self, hits: &[SearchHit], total: Option<i64>) -> String;
    fn ranking(&self, metric: &str, entries: &[RankEntry]) -> String;
    fn members(&self, relation: &str, name: &str, members: &[PokemonRef]) -> String;
    fn names(&self, label: &str, names: &[String]) -> String;
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub struct TextPresenter;

impl Presenter for TextPresenter {
    fn pokemon(&self, p: &Pokemon) -> String {
        format!(
            "#{} {} (gen {}) height {} weight {} base exp {}",
            p.id, p.name, p.generation, p.height, p.weight, p.base_experience
        )
    }

    fn detail(&self, d: &PokemonDetail) -> String {
        let mut lines = vec![self.pokemon(&d.pokemon)];
        lines.push(format!("Types: {}", d.type_names().join(", ")));

        let abilities: Vec<String> = d
            .abilities
            .iter()
            .map(|a| {
                if a.is_hidden {
                    format!("{} (hidden)", a.name)
                } else {
                    a.name.clone()
                }
            })
            .collect();
        lines.push(format!("Abilities: {}", abilities.join(", ")));

        lines.push("Stats:".to_string());
        for s in &d.stats {
            lines.push(format!("  {:<16}{:>4}", s.name.as_str(), s.base_stat));
        }
        lines.push(format!("  {:<16}{:>4}", "total", d.total()));
        lines.join("\n")
    }

    fn search(&self, hits: &[SearchHit], total: Option<i64>) -> String {
        if hits.is_empty() {
            return "No pokemon matched.".to_string();
        }
        let mut lines: Vec<String> = hits
            .iter()
            .map(|h| format!("#{} {} (gen {}) [{}]", h.id, h.name, h.generation, h.types.join(", ")))
            .collect();
        if let Some(total) = total {
            lines.push(format!("Showing {} of {total}", hits.len()));
        }
        lines.join("\n")
    }

    fn ranking(&self, metric: &str, entries: &[RankEntry]) -> String {
        if entries.is_empty() {
            return format!("No pokemon ranked by {metric}.");
        }
        let mut lines = vec![format!("Top {} by {metric}:", entries.len())];
        for (i, e) in entries.iter().enumerate() {
            lines.push(format!("{:>3}. {} (#{}, gen {}) {}", i + 1, e.name, e.id, e.generation, e.value));
        }
        lines.join("\n")
    }

    fn members(&self, relation: &str, name: &str, members: &[PokemonRef]) -> String {
        if members.is_empty() {
            return format!("No pokemon with {relation} '{name}'.");
        }
        let mut lines = vec![format!("Pokemon with {relation} '{name}':")];
        for m in members {
            lines.push(format!("  #{} {} (gen {}, slot {})", m.id, m.name, m.generation, m.slot));
        }
        lines.join("\n")
    }

    fn names(&self, label: &str, names: &[String]) -> String {
        format!("{label}: {}", names.join(", "))
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub struct JsonPresenter;

impl JsonPresenter {
    fn render<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

#[derive(Serialize)]
struct DetailView<'a> {
    #[serde(flatten)]
    detail: &'a PokemonDetail,
    total: i64,
}

#[derive(Serialize)]
struct SearchView<'a> {
    results: &'a [SearchHit],
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<i64>,
}

#[derive(Serialize)]
struct RankingView<'a> {
    metric: &'a str,
    entries: &'a [RankEntry],
}

impl Presenter for JsonPresenter {
    fn pokemon(&self, pokemon: &Pokemon) -> String {
        Self::render(pokemon)
    }

    fn detail(&self, detail: &PokemonDetail) -> String {
        Self::render(&DetailView {
            detail,
            total: detail.total(),
        })
    }

    fn search(&self, hits: &[SearchHit], total: Option<i64>) -> String {
        Self::render(&SearchView {
            results: hits,
            total,
        })
    }

    fn ranking(&self, metric: &str, entries: &[RankEntry]) -> String {
        Self::render(&RankingView { metric, entries })
    }

    fn members(&self, _relation: &str, _name: &str, members: &[PokemonRef]) -> String {
        Self::render(members)
    }

    fn names(&self, _label: &str, names: &[String]) -> String {
        Self::render(names)
    }
}
