//! Reads lab-report fields out of an extracted entity graph.
//!
//! The graph is untrusted: unknown entity types are ignored, anchors that
//! point outside the document text are skipped, and nothing here fails.

use super::types::*;

/// Text of an entity: its mention text, or else the anchored slices of the
/// document text concatenated in segment order.
pub fn entity_text(doc: &ExtractedDocument, entity: &Entity) -> String {
    if let Some(mention) = entity.mention_text.as_deref() {
        if !mention.is_empty() {
            return mention.to_string();
        }
    }

    let Some(anchor) = &entity.text_anchor else {
        return String::new();
    };

    let text = doc.text.as_str();
    let mut out = String::new();
    for segment in &anchor.text_segments {
        let end = segment.end_index.min(text.len());
        if end <= segment.start_index {
            continue;
        }
        // Segments that split a UTF-8 sequence are dropped
        if let Some(slice) = text.get(segment.start_index..end) {
            out.push_str(slice);
        }
    }
    out
}

/// Normalized value of an entity when the service supplied one, else its
/// trimmed text. Used for date-like fields.
pub fn entity_value(doc: &ExtractedDocument, entity: &Entity) -> String {
    if let Some(text) = entity
        .normalized_value
        .as_ref()
        .and_then(|nv| nv.text.as_deref())
    {
        if !text.is_empty() {
            return text.trim().to_string();
        }
    }
    entity_text(doc, entity).trim().to_string()
}

/// Flatten the graph into raw lab-report fields.
pub fn read_lab_report(doc: &ExtractedDocument) -> ExtractedLabReport {
    let mut out = ExtractedLabReport::default();

    if !doc.text.is_empty() {
        out.raw_text = Some(doc.text.clone());
    }

    for entity in &doc.entities {
        match entity.entity_type.as_str() {
            "patient_name" => out.patient_name = Some(entity_text(doc, entity)),
            "patient_dob" => out.patient_dob = Some(entity_value(doc, entity)),
            "lab_name" => out.lab_name = Some(entity_text(doc, entity)),
            "lab_phone" => out.lab_phone = Some(entity_text(doc, entity)),
            "insurance_provider" => out.insurance_provider = Some(entity_text(doc, entity)),
            "requesting_doctor" => out.requesting_doctor = Some(entity_text(doc, entity)),
            "technical_manager" => out.technical_manager = Some(entity_text(doc, entity)),
            "report_date" => out.report_date = Some(entity_value(doc, entity)),
            "test_result" => out.test_results.push(read_test_result(doc, entity)),
            other => tracing::trace!(entity_type = other, "Ignoring unknown entity"),
        }
    }

    out
}

fn read_test_result(doc: &ExtractedDocument, entity: &Entity) -> ExtractedTestResult {
    let mut result = ExtractedTestResult::default();

    for prop in &entity.properties {
        match prop.entity_type.as_str() {
            "test_name" => result.test_name = entity_text(doc, prop),
            "material" => result.material = Some(entity_text(doc, prop)),
            "method" => result.method = Some(entity_text(doc, prop)),
            "collected_at" | "collection_date" | "collection_datetime" | "collected_date" => {
                result.collected_at = Some(entity_value(doc, prop))
            }
            "release_at" | "released_at" | "release_date" | "result_date" => {
                result.release_at = Some(entity_value(doc, prop))
            }
            "test_item" => result.items.push(read_test_item(doc, prop)),
            _ => {}
        }
    }

    result
}

fn read_test_item(doc: &ExtractedDocument, entity: &Entity) -> ExtractedTestItem {
    let mut item = ExtractedTestItem::default();

    for prop in &entity.properties {
        match prop.entity_type.as_str() {
            "parameter_name" => item.parameter_name = entity_text(doc, prop),
            "result_value" => item.result_value = Some(entity_text(doc, prop)),
            "unit" => item.unit = Some(entity_text(doc, prop)),
            "reference_text" => item.reference_text = Some(entity_text(doc, prop)),
            _ => {}
        }
    }

    item
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(entity_type: &str, text: &str) -> Entity {
        Entity {
            entity_type: entity_type.into(),
            mention_text: Some(text.into()),
            ..Default::default()
        }
    }

    fn anchored(entity_type: &str, segments: &[(usize, usize)]) -> Entity {
        Entity {
            entity_type: entity_type.into(),
            text_anchor: Some(TextAnchor {
                text_segments: segments
                    .iter()
                    .map(|&(start_index, end_index)| TextSegment { start_index, end_index })
                    .collect(),
            }),
            ..Default::default()
        }
    }

    fn nested(entity_type: &str, properties: Vec<Entity>) -> Entity {
        Entity {
            entity_type: entity_type.into(),
            properties,
            ..Default::default()
        }
    }

    #[test]
    fn mention_text_wins_over_anchor() {
        let doc = ExtractedDocument {
            text: "Laboratorio Central".into(),
            entities: Vec::new(),
        };
        let mut entity = anchored("lab_name", &[(0, 11)]);
        entity.mention_text = Some("Lab X".into());
        assert_eq!(entity_text(&doc, &entity), "Lab X");
    }

    #[test]
    fn anchor_segments_are_concatenated() {
        let doc = ExtractedDocument {
            text: "Dr. Ana Lima CRM 1234".into(),
            entities: Vec::new(),
        };
        let entity = anchored("requesting_doctor", &[(0, 4), (4, 12)]);
        assert_eq!(entity_text(&doc, &entity), "Dr. Ana Lima");
    }

    #[test]
    fn out_of_range_segments_are_clamped_or_skipped() {
        let doc = ExtractedDocument {
            text: "abcdef".into(),
            entities: Vec::new(),
        };
        assert_eq!(entity_text(&doc, &anchored("x", &[(3, 100)])), "def");
        assert_eq!(entity_text(&doc, &anchored("x", &[(10, 20), (4, 2)])), "");
    }

    #[test]
    fn segments_inside_multibyte_chars_are_skipped() {
        let doc = ExtractedDocument {
            text: "Glicêmia".into(),
            entities: Vec::new(),
        };
        // 'ê' occupies bytes 4..6
        assert_eq!(entity_text(&doc, &anchored("x", &[(0, 5), (0, 4)])), "Glic");
    }

    #[test]
    fn value_prefers_normalized_text() {
        let doc = ExtractedDocument::default();
        let mut entity = mention("report_date", " 10/03/2024 ");
        assert_eq!(entity_value(&doc, &entity), "10/03/2024");
        entity.normalized_value = Some(NormalizedValue {
            text: Some("2024-03-10 ".into()),
        });
        assert_eq!(entity_value(&doc, &entity), "2024-03-10");
    }

    #[test]
    fn reads_header_and_nested_results() {
        let doc = ExtractedDocument {
            text: "LAUDO".into(),
            entities: vec![
                mention("patient_name", "Maria"),
                mention("report_date", "10/03/2024"),
                mention("barcode", "999"),
                nested(
                    "test_result",
                    vec![
                        mention("test_name", "Hemograma"),
                        mention("material", "Sangue"),
                        mention("collection_date", "10/03/2024 08h15"),
                        mention("result_date", "11/03/2024"),
                        nested(
                            "test_item",
                            vec![
                                mention("parameter_name", "Hb"),
                                mention("result_value", "13.5"),
                                mention("unit", "g/dL"),
                                mention("reference_text", "12 a 16"),
                            ],
                        ),
                    ],
                ),
            ],
        };

        let report = read_lab_report(&doc);
        assert_eq!(report.raw_text.as_deref(), Some("LAUDO"));
        assert_eq!(report.patient_name.as_deref(), Some("Maria"));
        assert_eq!(report.report_date.as_deref(), Some("10/03/2024"));
        assert!(report.lab_name.is_none());

        assert_eq!(report.test_results.len(), 1);
        let result = &report.test_results[0];
        assert_eq!(result.test_name, "Hemograma");
        assert_eq!(result.material.as_deref(), Some("Sangue"));
        assert_eq!(result.collected_at.as_deref(), Some("10/03/2024 08h15"));
        assert_eq!(result.release_at.as_deref(), Some("11/03/2024"));
        assert_eq!(
            result.items,
            vec![ExtractedTestItem {
                parameter_name: "Hb".into(),
                result_value: Some("13.5".into()),
                unit: Some("g/dL".into()),
                reference_text: Some("12 a 16".into()),
            }]
        );
    }

    #[test]
    fn test_result_without_name_reads_as_empty() {
        let doc = ExtractedDocument {
            text: String::new(),
            entities: vec![nested("test_result", vec![mention("material", "Urina")])],
        };
        let report = read_lab_report(&doc);
        assert!(report.raw_text.is_none());
        assert_eq!(report.test_results[0].test_name, "");
    }
}
