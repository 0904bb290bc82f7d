//! Test conversation about Inception and the KB slice that grounds it.
//!
//! - turn 0 "Who directed Inception?" answered directly by the search space;
//! - turn 1 "Where was he born?" needs the neighborhood of turn 0's answer;
//! - turn 2 "Which river flows through it?" needs the neighborhood of turn 1's answer;
//! - turn 3 is existential and always pruned.

use crate::conversation::{Answer, Conversation, Turn};
use crate::kb::{Fact, KbItem, KbType, StaticKb};

pub fn fact(ids: &[&str]) -> Fact {
    ids.iter().map(|id| KbItem::new(*id, *id)).collect()
}

pub fn inception_kb() -> StaticKb {
    StaticKb::new()
        .with_search(
            "Who directed Inception?",
            &[("Q25188", "Inception", "Inception"), ("P57", "director", "directed")],
            vec![
                fact(&["Q25188", "P57", "Q25191"]),
                fact(&["Q25188", "P161", "Q38111"]),
            ],
        )
        .with_search(
            "Where was he born?",
            &[("P19", "place of birth", "born")],
            vec![],
        )
        .with_search(
            "Which river flows through it?",
            &[("Q4022", "river", "river")],
            vec![fact(&["Q4022", "P279", "Q355304"])],
        )
        .with_neighborhood(
            "Q25191",
            vec![
                fact(&["Q25191", "P19", "Q84"]),
                fact(&["Q25191", "P106", "Q2526255"]),
            ],
        )
        .with_neighborhood(
            "Q25188",
            vec![
                fact(&["Q25188", "P57", "Q25191"]),
                fact(&["Q25188", "P161", "Q38111"]),
            ],
        )
        .with_neighborhood(
            "Q84",
            vec![
                fact(&["Q84", "P206", "Q19686"]),
                fact(&["Q84", "P17", "Q145"]),
            ],
        )
        .with_label("Q25188", "Inception")
        .with_label("Q25191", "Christopher Nolan")
        .with_label("Q84", "London")
        .with_label("Q19686", "River Thames")
        .with_types("Q84", vec![KbType { id: "Q515".into(), label: "city".into() }])
        .with_types("Q19686", vec![KbType { id: "Q4022".into(), label: "river".into() }])
        .with_types(
            "Q25191",
            vec![
                KbType { id: "Q2526255".into(), label: "film director".into() },
                KbType { id: "Q28389".into(), label: "screenwriter".into() },
            ],
        )
        .with_frequency("Q2526255", 5_000, 1_000)
        .with_frequency("Q28389", 20_000, 3_000)
}

pub fn inception_conversation() -> Conversation {
    Conversation::new(vec![
        Turn::new(
            "Who directed Inception?",
            vec![Answer::new("Q25191", "Christopher Nolan")],
        ),
        Turn::new("Where was he born?", vec![Answer::new("Q84", "London")]),
        Turn::new(
            "Which river flows through it?",
            vec![Answer::new("Q19686", "River Thames")],
        ),
        Turn::new("Is it the capital of England?", vec![Answer::new("Yes", "Yes")]),
    ])
}

/// Turn 1 is answered by its own search and stays a leaf next to turn 0's
/// answer; turn 2 goes back to the director through turn 0's answer.
pub fn branching_kb() -> StaticKb {
    inception_kb().with_search(
        "Who starred in Inception?",
        &[("Q25188", "Inception", "Inception"), ("P161", "cast member", "starred")],
        vec![fact(&["Q25188", "P161", "Q38111"])],
    )
}

pub fn branching_conversation() -> Conversation {
    Conversation::new(vec![
        Turn::new(
            "Who directed Inception?",
            vec![Answer::new("Q25191", "Christopher Nolan")],
        ),
        Turn::new(
            "Who starred in Inception?",
            vec![Answer::new("Q38111", "Leonardo DiCaprio")],
        ),
        Turn::new("Where was he born?", vec![Answer::new("Q84", "London")]),
    ])
}
