// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drug-interaction coverage.
//!
//! Drug mentions are found by whole-word matching against a lexicon of
//! common generics plus the canonical names tools returned this turn. Words
//! like "medication" or "dose" never count as drugs.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::evidence::TurnEvidence;
use crate::finding::{CheckName, Finding};

pub const INTERACTION_TOOL: &str = "drug_interaction_check";

/// Common generics seen in primary care.
const LEXICON: &[&str] = &[
    "acetaminophen", "albuterol", "alprazolam", "amiodarone", "amlodipine", "amoxicillin",
    "apixaban", "aspirin", "atorvastatin", "azithromycin", "carvedilol", "cephalexin",
    "ciprofloxacin", "citalopram", "clopidogrel", "digoxin", "diltiazem", "escitalopram",
    "fluoxetine", "furosemide", "gabapentin", "glipizide", "hydrochlorothiazide",
    "ibuprofen", "insulin", "levothyroxine", "lisinopril", "losartan", "metformin",
    "metoprolol", "naproxen", "omeprazole", "oxycodone", "pantoprazole", "prednisone",
    "rivaroxaban", "sertraline", "simvastatin", "spironolactone", "tramadol", "warfarin",
];

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z\-]+").expect("valid regex"));

static DOSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:mg|mcg|ml|units?)\b").expect("valid regex")
});

static SAFETY_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:interact\w*|contraindicat\w*|safe(?:ly|ty)?|combin\w*|together|co-administ\w*|concomitant\w*)\b",
    )
    .expect("valid regex")
});

fn words(text: &str) -> BTreeSet<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// First word of a product label such as "Metformin 500 MG Oral Tablet".
fn leading_word(label: &str) -> Option<String> {
    WORD.find(label).map(|m| m.as_str().to_lowercase())
}

/// Drug names the tools themselves reported this turn.
fn canonical_names(evidence: &TurnEvidence<'_>) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for (tool, payload) in evidence.successes() {
        let data = &payload["data"];
        match tool {
            "get_medications" | "get_patient_summary" => {
                for med in data["medications"].as_array().into_iter().flatten() {
                    if let Some(word) = med["medication"].as_str().and_then(leading_word) {
                        names.insert(word);
                    }
                }
            }
            INTERACTION_TOOL => names.extend(interaction_coverage(data)),
            _ => {}
        }
    }
    names
}

/// Names covered by one interaction-check payload: the names asked about and
/// the ingredients they resolved to.
fn interaction_coverage(data: &serde_json::Value) -> BTreeSet<String> {
    let mut covered = BTreeSet::new();
    if let Some(resolutions) = data["resolutions"].as_object() {
        for (original, resolution) in resolutions {
            covered.extend(words(original));
            if let Some(name) = resolution["name"].as_str() {
                covered.extend(words(name));
            }
        }
    }
    covered
}

pub fn check(evidence: &TurnEvidence<'_>) -> Finding {
    let answer_words = words(evidence.answer);
    let canonical = canonical_names(evidence);
    let mentioned: BTreeSet<String> = answer_words
        .into_iter()
        .filter(|w| LEXICON.contains(&w.as_str()) || canonical.contains(w))
        .collect();

    let safety = SAFETY_LANGUAGE.is_match(evidence.answer);
    let dosage = DOSAGE.is_match(evidence.answer);
    let discussed = mentioned.len() >= 2 || (safety && (!mentioned.is_empty() || dosage));
    if !discussed {
        return Finding::pass(
            CheckName::DrugInteractions,
            "No combined medication discussion detected.",
        );
    }

    if !evidence.called(INTERACTION_TOOL) {
        return Finding::fail(
            CheckName::DrugInteractions,
            "Response discusses medications together but no drug interaction check was \
             performed. Run drug_interaction_check for these medications.",
            mentioned.into_iter().collect(),
        );
    }

    let covered: BTreeSet<String> = evidence
        .successes()
        .filter(|(tool, _)| *tool == INTERACTION_TOOL)
        .flat_map(|(_, payload)| interaction_coverage(&payload["data"]))
        .collect();
    let uncovered: Vec<String> = mentioned.difference(&covered).cloned().collect();
    if uncovered.is_empty() {
        Finding::pass(
            CheckName::DrugInteractions,
            "Drug interaction check covers the medications discussed.",
        )
    } else {
        Finding::fail(
            CheckName::DrugInteractions,
            "Response discusses medications that the interaction check did not include.",
            uncovered,
        )
    }
}
