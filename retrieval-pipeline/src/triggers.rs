//! Swappable string-based intent classifiers.
//!
//! Both classifiers are deliberately simple substring heuristics. They are
//! kept as standalone functions so they can be unit-tested and replaced
//! (with tokenization or embeddings) without touching the resolver.

/// Broad-intent phrases: a query containing one of these asks about the
/// whole corpus rather than a single province.
const TRIGGER_PHRASES: &[&str] = &[
    "ทุกจังหวัด",
    "เปรียบเทียบ",
    "จัดอันดับ",
    "อันดับ",
    "ภาพรวม",
    "กี่จังหวัด",
    "all provinces",
    "compare",
    "ranking",
    "overview",
    "how many",
];

/// Greetings short-circuit the whole pipeline before resolution runs.
const GREETINGS: &[&str] = &[
    "สวัสดี", "ดีครับ", "ดีค่ะ", "ทักทาย", "test", "เทส", "hi", "hello",
];

/// True when the query signals broad or comparative intent even without
/// naming a province.
pub fn is_broad_scope(query: &str) -> bool {
    let query = query.to_lowercase();
    TRIGGER_PHRASES.iter().any(|phrase| query.contains(phrase))
}

/// True when the query is a bare greeting.
///
/// Either an exact match against the greeting list, or a short query (under
/// 15 characters) that contains one. The containment rule can misfire on
/// short queries that merely embed a greeting word; this mirrors the
/// observed behavior and keeps false negatives low for Thai greetings with
/// trailing particles ("สวัสดีครับ").
pub fn is_greeting(query: &str) -> bool {
    let lowered = query.trim().to_lowercase();
    let exact = GREETINGS.iter().any(|greeting| lowered == *greeting);
    let short_contained = lowered.chars().count() < 15
        && GREETINGS.iter().any(|greeting| lowered.contains(greeting));
    exact || short_contained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broad_scope_detects_thai_and_english_triggers() {
        assert!(is_broad_scope("สรุปภาพรวมทุกจังหวัด"));
        assert!(is_broad_scope("เปรียบเทียบพื้นที่ปลูกข้าว"));
        assert!(is_broad_scope("Give me an OVERVIEW of rice farming"));
        assert!(is_broad_scope("how many provinces grow longan?"));
    }

    #[test]
    fn test_broad_scope_ignores_specific_questions() {
        assert!(!is_broad_scope("พื้นที่ปลูกข้าวของตาก"));
        assert!(!is_broad_scope("rice production in Tak"));
    }

    #[test]
    fn test_greeting_exact_match() {
        assert!(is_greeting("สวัสดี"));
        assert!(is_greeting("Hello"));
        assert!(is_greeting("  hi  "));
    }

    #[test]
    fn test_greeting_short_query_containment() {
        assert!(is_greeting("สวัสดีครับ"));
        assert!(is_greeting("hello there"));
        // Long questions are never greetings even if they embed one.
        assert!(!is_greeting("hello, what is the rice acreage in Tak province?"));
    }

    #[test]
    fn test_greeting_rejects_data_questions() {
        assert!(!is_greeting("ข้อมูลลำไยของจังหวัดน่านปีล่าสุด"));
    }
}
