// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flattening of FHIR search bundles into the compact records the tools
//! return to the model.
//!
//! The EHR populates optional fields inconsistently, so every accessor falls
//! back to an empty string rather than failing.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Resources contained in a bundle's `entry` array.
pub fn resources(bundle: &Value) -> impl Iterator<Item = &Value> {
    bundle["entry"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|entry| &entry["resource"])
}

fn str_or_empty(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

/// `text`, else the first coding's `display`.
fn concept_label(concept: &Value) -> String {
    concept["text"]
        .as_str()
        .or_else(|| concept["coding"][0]["display"].as_str())
        .unwrap_or_default()
        .to_string()
}

/// `valueQuantity.value`, else `valueString`.
fn observation_value(resource: &Value) -> Value {
    match &resource["valueQuantity"]["value"] {
        Value::Null => resource["valueString"]
            .as_str()
            .map_or_else(|| json!(""), |s| json!(s)),
        v => v.clone(),
    }
}

pub fn patient_records(bundle: &Value) -> Vec<Value> {
    resources(bundle)
        .map(|r| {
            let name = &r["name"][0];
            let given: Vec<&str> = name["given"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .collect();
            let display = format!(
                "{} {}",
                given.join(" "),
                name["family"].as_str().unwrap_or_default()
            );
            json!({
                "uuid": str_or_empty(&r["id"]),
                "name": display.trim(),
                "birthDate": str_or_empty(&r["birthDate"]),
                "gender": str_or_empty(&r["gender"]),
            })
        })
        .collect()
}

pub fn condition_records(bundle: &Value) -> Vec<Value> {
    resources(bundle)
        .map(|r| {
            json!({
                "condition": concept_label(&r["code"]),
                "clinical_status": str_or_empty(&r["clinicalStatus"]["coding"][0]["code"]),
                "onset": str_or_empty(&r["onsetDateTime"]),
            })
        })
        .collect()
}

pub fn medication_records(bundle: &Value) -> Vec<Value> {
    resources(bundle)
        .map(|r| {
            json!({
                "medication": concept_label(&r["medicationCodeableConcept"]),
                "status": str_or_empty(&r["status"]),
                "intent": str_or_empty(&r["intent"]),
            })
        })
        .collect()
}

pub fn lab_records(bundle: &Value) -> Vec<Value> {
    resources(bundle)
        .map(|r| {
            json!({
                "test": concept_label(&r["code"]),
                "value": observation_value(r),
                "unit": str_or_empty(&r["valueQuantity"]["unit"]),
                "date": str_or_empty(&r["effectiveDateTime"]),
                "status": str_or_empty(&r["status"]),
            })
        })
        .collect()
}

pub fn vital_records(bundle: &Value) -> Vec<Value> {
    resources(bundle)
        .map(|r| {
            json!({
                "type": concept_label(&r["code"]),
                "value": observation_value(r),
                "unit": str_or_empty(&r["valueQuantity"]["unit"]),
                "date": str_or_empty(&r["effectiveDateTime"]),
            })
        })
        .collect()
}

/// Allergen name. Coded entries carry it in `code`; free-text entries only
/// in the narrative `text.div`. Codings from the data-absent-reason system
/// are placeholders and never count.
fn allergy_substance(r: &Value) -> String {
    if let Some(text) = r["code"]["text"].as_str().filter(|s| !s.is_empty()) {
        return text.to_string();
    }
    if let Some(div) = r["text"]["div"].as_str() {
        let stripped = HTML_TAG.replace_all(div, "");
        let stripped = stripped.trim();
        if !stripped.is_empty() {
            return stripped.to_string();
        }
    }
    let coded = r["code"]["coding"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|c| {
            !c["system"]
                .as_str()
                .unwrap_or_default()
                .contains("data-absent-reason")
        })
        .find_map(|c| first_non_empty(&[&c["display"], &c["code"]]));
    if let Some(name) = coded {
        return name;
    }
    if let Some(note) = r["note"][0]["text"].as_str().filter(|s| !s.is_empty()) {
        return note.to_string();
    }
    "Not specified".to_string()
}

fn first_non_empty(values: &[&Value]) -> Option<String> {
    values
        .iter()
        .filter_map(|v| v.as_str())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn manifestation(reaction: &Value) -> String {
    let m = &reaction["manifestation"][0];
    if let Some(text) = m["text"].as_str().filter(|s| !s.is_empty()) {
        return text.to_string();
    }
    m["coding"]
        .as_array()
        .into_iter()
        .flatten()
        .find_map(|c| first_non_empty(&[&c["display"], &c["code"]]))
        .unwrap_or_default()
}

pub fn allergy_records(bundle: &Value) -> Vec<Value> {
    resources(bundle)
        .map(|r| {
            let reactions: Vec<Value> = r["reaction"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|reaction| {
                    json!({
                        "manifestation": manifestation(reaction),
                        "severity": str_or_empty(&reaction["severity"]),
                    })
                })
                .collect();
            json!({
                "substance": allergy_substance(r),
                "type": str_or_empty(&r["type"]),
                "criticality": str_or_empty(&r["criticality"]),
                "reactions": reactions,
                "onset": str_or_empty(&r["onsetDateTime"]),
                "clinical_status": str_or_empty(&r["clinicalStatus"]["coding"][0]["code"]),
            })
        })
        .collect()
}

pub fn appointment_records(bundle: &Value) -> Vec<Value> {
    resources(bundle)
        .map(|r| {
            let start = r["start"].as_str().unwrap_or_default();
            let (date, time) = start.split_once('T').unwrap_or((start, ""));
            let provider = r["participant"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|p| &p["actor"])
                .find(|actor| {
                    actor["reference"]
                        .as_str()
                        .is_some_and(|s| s.starts_with("Practitioner"))
                })
                .map(|actor| str_or_empty(&actor["display"]))
                .unwrap_or_default();
            json!({
                "date": date,
                "time": time,
                "provider": provider,
                "reason": str_or_empty(&r["reasonCode"][0]["text"]),
                "status": str_or_empty(&r["status"]),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(resources: Vec<Value>) -> Value {
        json!({
            "resourceType": "Bundle",
            "entry": resources.into_iter().map(|r| json!({"resource": r})).collect::<Vec<_>>()
        })
    }

    #[test]
    fn empty_or_missing_entries_yield_nothing() {
        assert!(medication_records(&json!({"resourceType": "Bundle"})).is_empty());
        assert!(lab_records(&json!({})).is_empty());
    }

    #[test]
    fn patient_name_joins_given_and_family() {
        let b = bundle(vec![json!({
            "id": "P1",
            "name": [{"given": ["Maria", "Elena"], "family": "Santos"}],
            "birthDate": "1958-03-14",
            "gender": "female"
        })]);
        let records = patient_records(&b);
        assert_eq!(records[0]["name"], "Maria Elena Santos");
        assert_eq!(records[0]["uuid"], "P1");
    }

    #[test]
    fn medication_falls_back_to_coding_display() {
        let b = bundle(vec![
            json!({"medicationCodeableConcept": {"text": "Metformin 500 MG"}, "status": "active", "intent": "order"}),
            json!({"medicationCodeableConcept": {"coding": [{"display": "Lisinopril"}]}, "status": "active"}),
        ]);
        let records = medication_records(&b);
        assert_eq!(records[0]["medication"], "Metformin 500 MG");
        assert_eq!(records[1]["medication"], "Lisinopril");
        assert_eq!(records[1]["intent"], "");
    }

    #[test]
    fn observation_value_prefers_quantity() {
        let b = bundle(vec![
            json!({"code": {"text": "HbA1c"}, "valueQuantity": {"value": 7.2, "unit": "%"}, "effectiveDateTime": "2026-01-05"}),
            json!({"code": {"text": "Culture"}, "valueString": "negative"}),
        ]);
        let labs = lab_records(&b);
        assert_eq!(labs[0]["value"], 7.2);
        assert_eq!(labs[0]["unit"], "%");
        assert_eq!(labs[1]["value"], "negative");
    }

    #[test]
    fn allergy_substance_from_narrative_skips_absent_reason() {
        let b = bundle(vec![json!({
            "code": {"coding": [{"system": "http://terminology.hl7.org/CodeSystem/data-absent-reason", "display": "Unknown"}]},
            "text": {"div": "<div xmlns=\"http://www.w3.org/1999/xhtml\">Penicillin</div>"},
            "criticality": "high",
            "reaction": [{"manifestation": [{"coding": [{"display": "Hives"}]}], "severity": "moderate"}],
            "clinicalStatus": {"coding": [{"code": "active"}]}
        })]);
        let records = allergy_records(&b);
        assert_eq!(records[0]["substance"], "Penicillin");
        assert_eq!(records[0]["reactions"][0]["manifestation"], "Hives");
        assert_eq!(records[0]["clinical_status"], "active");
    }

    #[test]
    fn allergy_substance_defaults_when_nothing_usable() {
        let b = bundle(vec![json!({
            "code": {"coding": [{"system": "http://terminology.hl7.org/CodeSystem/data-absent-reason", "display": "Unknown"}]}
        })]);
        assert_eq!(allergy_records(&b)[0]["substance"], "Not specified");
    }

    #[test]
    fn appointment_splits_start_and_finds_practitioner() {
        let b = bundle(vec![json!({
            "start": "2026-11-02T09:30:00+00:00",
            "participant": [
                {"actor": {"reference": "Patient/P1", "display": "Maria Santos"}},
                {"actor": {"reference": "Practitioner/9", "display": "Dr. Okafor"}}
            ],
            "reasonCode": [{"text": "Diabetes follow-up"}],
            "status": "booked"
        })]);
        let appt = &appointment_records(&b)[0];
        assert_eq!(appt["date"], "2026-11-02");
        assert_eq!(appt["time"], "09:30:00+00:00");
        assert_eq!(appt["provider"], "Dr. Okafor");
        assert_eq!(appt["reason"], "Diabetes follow-up");
    }
}
