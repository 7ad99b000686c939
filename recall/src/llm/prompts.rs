//! Simple prompt templates for LLM-powered features
//!
//! These templates use basic `format!()` interpolation for type safety.
//! Missing variables will cause compile-time errors.

/// Generate a prompt for extracting entities and relations from a memory's
/// content, per the Extractor contract (§4.6). The Extractor returns raw,
/// unnormalized values — entity_type and relation_type as free-form strings,
/// confidence unclamped — normalization is the Graph's job, not this prompt's.
///
/// # Arguments
/// * `content` - The memory content to extract entities/relations from
///
/// # Returns
/// A formatted prompt string ready for LLM completion
pub fn entity_relation_extraction_prompt(content: &str) -> String {
    format!(
        r#"Extract named entities and relations between them from the following content.

Return a JSON object with two fields:
- "entities": an array of objects with "name", "type", "aliases" (array of alternate names, may be empty), "attributes" (a flat JSON object of extra facts, may be empty), and "confidence" (0.0-1.0)
- "relations": an array of objects with "from" (entity name), "to" (entity name), "type" (a short verb phrase describing the relation), "attributes" (a flat JSON object, may be empty), and "confidence" (0.0-1.0)

Entity type is free text (e.g. "person", "organization", "location", "event", "project", "technology", "concept", "document"); use "other" if nothing fits.
Only extract relations between entities that both appear in the "entities" array.
If the content names no entities, return empty arrays for both fields.

Content:
{content}

Respond with valid JSON only. Example format:
{{
  "entities": [
    {{"name": "Ada Lovelace", "type": "person", "aliases": [], "attributes": {{}}, "confidence": 0.95}},
    {{"name": "Analytical Engine", "type": "technology", "aliases": [], "attributes": {{}}, "confidence": 0.9}}
  ],
  "relations": [
    {{"from": "Ada Lovelace", "to": "Analytical Engine", "type": "designed", "attributes": {{}}, "confidence": 0.85}}
  ]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_relation_extraction_prompt_contains_content() {
        let content = "Ada Lovelace designed the Analytical Engine";
        let prompt = entity_relation_extraction_prompt(content);

        assert!(prompt.contains(content));
        assert!(prompt.contains("entities"));
        assert!(prompt.contains("relations"));
        assert!(prompt.contains("aliases"));
        assert!(prompt.contains("confidence"));
    }
}
