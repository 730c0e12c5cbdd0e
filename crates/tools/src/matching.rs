//! Token-overlap ranking of referentiel plants against a free-text query.
//!
//! The model asks for "Tomate Marmande" or just "tomate"; scoring is the
//! number of shared lowercase tokens between the query and the plant's
//! full name, with a boost when the whole query appears as a substring.

use crate::store::Plant;
use std::collections::HashSet;

const PHRASE_BOOST: usize = 5;

/// Rank plants by relevance to `query`, best first, zero-score dropped.
pub fn rank_plants(plants: &[Plant], query: &str) -> Vec<Plant> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }
    let q_tokens: HashSet<&str> = q.split_whitespace().collect();

    let mut scored: Vec<(usize, &Plant)> = plants
        .iter()
        .filter_map(|p| {
            let full = p.full_name().to_lowercase();
            let p_tokens: HashSet<&str> = full.split_whitespace().collect();
            let mut score = q_tokens.intersection(&p_tokens).count();
            if full.contains(&q) {
                score += PHRASE_BOOST;
            }
            (score > 0).then_some((score, p))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, p)| p.clone()).collect()
}

/// The best single match, if any plant scores at all.
pub fn best_plant_match(plants: &[Plant], query: &str) -> Option<Plant> {
    rank_plants(plants, query).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn plant(common: &str, variety: Option<&str>) -> Plant {
        Plant {
            id: Uuid::new_v4(),
            common_name: common.into(),
            variety: variety.map(String::from),
        }
    }

    #[test]
    fn exact_variety_outranks_bare_species() {
        let plants = vec![
            plant("Tomate", Some("Coeur de Boeuf")),
            plant("Tomate", Some("Marmande")),
        ];
        let ranked = rank_plants(&plants, "Tomate Marmande");
        assert_eq!(ranked[0].variety.as_deref(), Some("Marmande"));
    }

    #[test]
    fn case_insensitive_single_word() {
        let plants = vec![plant("Radis", Some("de 18 jours")), plant("Betterave", None)];
        let ranked = rank_plants(&plants, "radis");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].common_name, "Radis");
    }

    #[test]
    fn no_match_is_empty() {
        let plants = vec![plant("Courgette", None)];
        assert!(rank_plants(&plants, "ananas").is_empty());
        assert!(best_plant_match(&plants, "ananas").is_none());
        assert!(rank_plants(&plants, "  ").is_empty());
    }
}
