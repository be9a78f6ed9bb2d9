//! Diagnosis prompt templates

/// Persona given to the model as the system message.
pub const SYSTEM_PROMPT: &str = "你是一个资深的 SRE 运维专家...";

/// Build the user message for a firing alert.
///
/// Inputs are embedded verbatim; the same inputs always produce the same prompt.
pub fn build_diagnosis_prompt(summary: &str, description: &str, evidence: &str) -> String {
    format!(
        "系统收到告警: {}\n\
        故障描述: {}\n\
        现场证据: {}\n\
        请分析故障原因并给出修复建议。",
        summary, description, evidence
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::DIRECTORY_NOT_FOUND;

    #[test]
    fn test_prompt_layout() {
        let prompt = build_diagnosis_prompt(
            "CPU high",
            "CPU above 90% for 5m",
            "[ai_access_ssl.log]\nGET / 502",
        );
        assert_eq!(
            prompt,
            "系统收到告警: CPU high\n\
             故障描述: CPU above 90% for 5m\n\
             现场证据: [ai_access_ssl.log]\nGET / 502\n\
             请分析故障原因并给出修复建议。"
        );
    }

    #[test]
    fn test_prompt_is_deterministic_and_unescaped() {
        let evidence = format!("{} <script>{{}}</script>", DIRECTORY_NOT_FOUND);
        let a = build_diagnosis_prompt("磁盘 *满了*", "`df -h` 100%", &evidence);
        let b = build_diagnosis_prompt("磁盘 *满了*", "`df -h` 100%", &evidence);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert!(a.contains("磁盘 *满了*"));
        assert!(a.contains("<script>{}</script>"));
    }
}
