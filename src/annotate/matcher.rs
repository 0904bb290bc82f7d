//! Does a KB fact or item correspond to one of a turn's gold answers?

use crate::kb::{Fact, KbItem};
use crate::literals::{parse_timestamp, strip_literal, year_to_timestamp, TimestampParse};

/// True if the KB item id matches a gold answer, after literal normalization.
///
/// Timestamps match a gold answer given either as the bare year or as the
/// year's January 1st timestamp. Ids shorter than two characters are KB noise
/// and never match.
pub fn item_matches_answer(item_id: &str, gold_answers: &[String]) -> bool {
    if item_id.chars().count() < 2 {
        return false;
    }
    let value = strip_literal(item_id);
    let is_gold = |candidate: &str| gold_answers.iter().any(|answer| answer == candidate);

    if let TimestampParse::Year(year) = parse_timestamp(&value) {
        if is_gold(year) || is_gold(&year_to_timestamp(year)) {
            return true;
        }
    }
    is_gold(&value)
}

/// True if any item of the fact matches a gold answer.
pub fn fact_has_answer(fact: &[KbItem], gold_answers: &[String]) -> bool {
    fact.iter()
        .any(|item| item_matches_answer(&item.id, gold_answers))
}

/// The facts among `facts` that contain a gold answer, keeping only id and label.
pub fn answering_facts<'a>(
    facts: impl IntoIterator<Item = &'a Fact>,
    gold_answers: &[String],
) -> Vec<Fact> {
    facts
        .into_iter()
        .filter(|fact| fact_has_answer(fact, gold_answers))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_entity_match() {
        assert!(item_matches_answer("Q84", &gold(&["Q84"])));
        assert!(!item_matches_answer("Q85", &gold(&["Q84"])));
    }

    #[test]
    fn test_quoted_literal_match() {
        assert!(item_matches_answer("\"+42\"", &gold(&["42"])));
    }

    #[test]
    fn test_timestamp_matches_year_either_way() {
        let ts = "\"+1970-07-30T00:00:00Z\"";
        assert!(item_matches_answer(ts, &gold(&["1970"])));
        assert!(item_matches_answer(ts, &gold(&["1970-01-01T00:00:00Z"])));
        assert!(item_matches_answer(ts, &gold(&["1970-07-30T00:00:00Z"])));
        assert!(!item_matches_answer(ts, &gold(&["1971"])));
    }

    #[test]
    fn test_short_ids_skipped() {
        assert!(!item_matches_answer("", &gold(&[""])));
        assert!(!item_matches_answer("7", &gold(&["7"])));
    }

    #[test]
    fn test_fact_has_answer() {
        let fact = vec![
            KbItem::new("Q25191", "Christopher Nolan"),
            KbItem::new("P19", "place of birth"),
            KbItem::new("Q84", "London"),
        ];
        assert!(fact_has_answer(&fact, &gold(&["Q84"])));
        assert!(!fact_has_answer(&fact, &gold(&["Q90"])));
        assert_eq!(answering_facts(&[fact.clone()], &gold(&["Q84"])), vec![fact]);
    }
}
