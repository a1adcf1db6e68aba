//! Prompt text and grounding-prompt assembly.

use common::storage::types::prepared_document::PreparedDocument;

/// System prompt for document-grounded answers.
pub const GROUNDED_SYSTEM_PROMPT: &str = "\
You are an assistant for Thai provincial agricultural statistics. Answer \
strictly from the context documents supplied in the user message; never use \
outside knowledge. Respond in the same language as the question. Write all \
numbers with Arabic numerals. When the question compares provinces, prefer a \
table. If the supplied documents do not contain the requested information, \
say so explicitly instead of guessing.";

/// System prompt for the generic path, when no documents matched.
pub const PERSONA_SYSTEM_PROMPT: &str = "\
You are a friendly assistant for Thai provincial agricultural statistics. \
Answer briefly in the same language as the question. If the question asks \
for provincial data you were not given, suggest naming a province.";

/// Deterministic reply when resolution found candidates but none survived
/// preparation. Returned without a model call.
pub const NO_DOCUMENTS_MESSAGE: &str = "\
ขออภัย ไม่พบเอกสารข้อมูลที่เกี่ยวข้องกับคำถามของคุณ \
กรุณาระบุชื่อจังหวัดหรือหัวข้อข้อมูลให้ชัดเจนขึ้น";

/// Assembles the grounding prompt: every prepared document rendered as a
/// delimited block, sorted by source location so citation order is stable
/// run to run, followed by the question.
pub fn build_grounded_prompt(query: &str, documents: &[PreparedDocument]) -> String {
    let mut ordered: Vec<&PreparedDocument> = documents.iter().collect();
    ordered.sort_by(|a, b| a.candidate.location.cmp(&b.candidate.location));

    let mut prompt = String::from("Context documents:\n\n");
    for document in ordered {
        prompt.push_str(&document.prompt_block());
        prompt.push('\n');
    }
    prompt.push_str("Question:\n");
    prompt.push_str(query);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::storage::types::{
        candidate_file::CandidateFile, prepared_document::DocumentBody,
    };

    fn doc(location: &str, text: &str) -> PreparedDocument {
        let (province, name) = location.split_once('/').unwrap();
        PreparedDocument {
            candidate: CandidateFile {
                location: location.to_string(),
                name: name.to_string(),
                province: province.to_string(),
                last_modified: Utc::now(),
            },
            body: DocumentBody::Text(text.to_string()),
        }
    }

    #[test]
    fn test_prompt_orders_documents_by_location() {
        let documents = vec![
            doc("Tak/summary.txt", "tak data"),
            doc("Nan/summary.txt", "nan data"),
        ];

        let prompt = build_grounded_prompt("เปรียบเทียบ Tak กับ Nan", &documents);

        let nan = prompt.find("nan data").expect("nan block present");
        let tak = prompt.find("tak data").expect("tak block present");
        assert!(nan < tak, "Nan/ sorts before Tak/");
    }

    #[test]
    fn test_prompt_ends_with_question() {
        let documents = vec![doc("Tak/summary.txt", "tak data")];

        let prompt = build_grounded_prompt("ข้าวที่ Tak", &documents);

        assert!(prompt.trim_end().ends_with("ข้าวที่ Tak"));
        assert!(prompt.contains("--- File: summary.txt ---"));
    }
}
