use docfields_core::document::TextUnit;
use docfields_core::extraction::ExtractionPrompt;
use docfields_core::schema::BatchType;

const SYSTEM_PREAMBLE: &str = "You are an intelligent data extraction system. \
Extract structured data from the given document text based on the schema below.";

const EXTRACTION_RULES: &str = r#"### RULES ###
1. Treat each record/item as a separate entity.
2. Do NOT mix data between items.
3. If a field is missing, leave it empty or null. Never invent a value.
4. Return results strictly in JSON format matching the schema, with no commentary."#;

/// Build the system and user messages for one unit.
pub fn build_prompt(batch: &BatchType, instructions: &str, unit: &TextUnit) -> ExtractionPrompt {
    let schema = batch.json_schema();
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string());

    let mut system = format!("{SYSTEM_PREAMBLE}\n\n### SCHEMA ###\n{schema}\n\n{EXTRACTION_RULES}\n");
    if !instructions.trim().is_empty() {
        system.push_str(&format!("\nAdditional context: {instructions}"));
    }

    let user = format!("Extract data from this page:\n\n{}\n", unit.content);

    ExtractionPrompt { system, user }
}

#[cfg(test)]
mod tests {
    use docfields_core::schema::{build_schema, FieldDescriptor, FieldType};

    use super::*;

    fn batch() -> BatchType {
        let fields = vec![
            FieldDescriptor::new("cheque_number", FieldType::String)
                .required()
                .with_description("Number printed on the cheque")
                .with_examples(["000123"]),
            FieldDescriptor::new("amount", FieldType::Float),
        ];
        build_schema(&fields).unwrap().1
    }

    fn unit() -> TextUnit {
        TextUnit {
            index: 3,
            content: "PAY Jane Doe  $1,200.00  No. 000981".into(),
        }
    }

    #[test]
    fn test_system_prompt_carries_schema_and_rules() {
        let prompt = build_prompt(&batch(), "", &unit());

        assert!(prompt.system.contains("### SCHEMA ###"));
        assert!(prompt.system.contains("\"cheque_number\""));
        assert!(prompt.system.contains("Number printed on the cheque"));
        assert!(prompt.system.contains("000123"));
        assert!(prompt.system.contains("Treat each record/item as a separate entity"));
        assert!(prompt.system.contains("Do NOT mix data between items"));
        assert!(prompt.system.contains("empty or null"));
        assert!(!prompt.system.contains("Additional context"));
    }

    #[test]
    fn test_instructions_appended_verbatim() {
        let guidance = "Extract cheque details including bank name and amount.";
        let prompt = build_prompt(&batch(), guidance, &unit());
        assert!(prompt
            .system
            .ends_with(&format!("Additional context: {guidance}")));
    }

    #[test]
    fn test_whitespace_instructions_are_ignored() {
        let prompt = build_prompt(&batch(), "   \n", &unit());
        assert!(!prompt.system.contains("Additional context"));
    }

    #[test]
    fn test_user_prompt_holds_unit_text() {
        let prompt = build_prompt(&batch(), "", &unit());
        assert_eq!(
            prompt.user,
            "Extract data from this page:\n\nPAY Jane Doe  $1,200.00  No. 000981\n"
        );
    }
}
